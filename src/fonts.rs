use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::CertError;

pub const DEFAULT_FONT: &str = "Great Vibes";

const BUILTIN_FONTS: &[(&str, &str)] = &[
    ("Alex Brush", "Alex Brush.ttf"),
    ("Great Vibes", "Great Vibes.ttf"),
    ("Authentic Signature", "Authentic Signature.ttf"),
    ("Thesignature", "Thesignature.ttf"),
];

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FontSpec {
    pub name: String,
    pub path: PathBuf,
}

impl FontSpec {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// Immutable name -> font file table with a guaranteed default entry.
#[derive(Debug, Clone)]
pub struct FontRegistry {
    fonts: BTreeMap<String, FontSpec>,
    default_name: String,
}

impl FontRegistry {
    pub fn new(
        fonts: impl IntoIterator<Item = FontSpec>,
        default_name: &str,
    ) -> Result<Self, CertError> {
        let fonts: BTreeMap<String, FontSpec> = fonts
            .into_iter()
            .map(|font| (font.name.clone(), font))
            .collect();
        if !fonts.contains_key(default_name) {
            return Err(CertError::InvalidRegistry(format!(
                "default font '{}' is not registered (registered: {})",
                default_name,
                fonts.keys().cloned().collect::<Vec<_>>().join(", ")
            )));
        }
        Ok(Self {
            fonts,
            default_name: default_name.to_string(),
        })
    }

    /// The four bundled script fonts, resolved against `font_dir`.
    pub fn builtin(font_dir: &Path) -> Self {
        let fonts = BUILTIN_FONTS
            .iter()
            .map(|(name, file)| (name.to_string(), FontSpec::new(*name, font_dir.join(file))))
            .collect();
        Self {
            fonts,
            default_name: DEFAULT_FONT.to_string(),
        }
    }

    pub fn default_font(&self) -> &FontSpec {
        // `new` and `builtin` both guarantee the default entry exists.
        &self.fonts[&self.default_name]
    }

    pub fn get(&self, name: &str) -> Option<&FontSpec> {
        self.fonts.get(name)
    }

    /// Unknown names fall back to the default font instead of failing.
    pub fn resolve(&self, requested: &str) -> &FontSpec {
        match self.fonts.get(requested.trim()) {
            Some(font) => font,
            None => {
                tracing::debug!(
                    requested,
                    fallback = %self.default_name,
                    "unknown font, using default"
                );
                self.default_font()
            }
        }
    }

    pub fn is_substituted(&self, requested: &str) -> bool {
        !self.fonts.contains_key(requested.trim())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fonts.keys().map(String::as_str)
    }

    pub fn default_name(&self) -> &str {
        &self.default_name
    }
}
