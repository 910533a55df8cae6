use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CertError {
    /// The template has no recognizable placeholder token.
    #[error("{message}")]
    PlaceholderNotFound { message: String },

    /// The recognition backend could not run or could not read the image.
    #[error("ocr engine failed: {0}")]
    OcrEngine(String),

    #[error("failed to load font '{name}' ({}): {reason}", path.display())]
    FontLoad {
        name: String,
        path: PathBuf,
        reason: String,
    },

    #[error("failed to render certificate: {0}")]
    Render(String),

    #[error("invalid font registry: {0}")]
    InvalidRegistry(String),
}

impl CertError {
    pub(crate) fn placeholder_not_found() -> Self {
        CertError::PlaceholderNotFound {
            message: "No valid placeholder found. Include a placeholder like NAME in the template."
                .to_string(),
        }
    }

    pub fn is_placeholder_not_found(&self) -> bool {
        matches!(self, CertError::PlaceholderNotFound { .. })
    }
}
