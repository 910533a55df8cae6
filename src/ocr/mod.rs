mod parse;
mod preprocess;
mod tesseract;

use image::DynamicImage;

use crate::error::CertError;

pub use parse::parse_tsv_words;
pub use preprocess::prepare_for_ocr;
pub use tesseract::{TesseractRecognizer, list_tesseract_languages};

/// Axis-aligned rectangle in template pixel coordinates, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> (u32, u32) {
        (
            self.x.saturating_add(self.width / 2),
            self.y.saturating_add(self.height / 2),
        )
    }

    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// One recognized word, in the order the engine reported it.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct OcrToken {
    pub text: String,
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
    pub conf: f32,
}

/// Text recognition backend.
///
/// Implementations must return word tokens in their native order; placeholder
/// lookup relies on that order to break ties between duplicate matches.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, image: &DynamicImage) -> Result<Vec<OcrToken>, CertError>;
}

impl<R: TextRecognizer + ?Sized> TextRecognizer for &R {
    fn recognize(&self, image: &DynamicImage) -> Result<Vec<OcrToken>, CertError> {
        (**self).recognize(image)
    }
}
