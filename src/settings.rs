use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::fonts::{DEFAULT_FONT, FontRegistry, FontSpec};
use crate::placeholder::DEFAULT_PLACEHOLDER;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub font_dir: PathBuf,
    pub default_font: String,
    /// Display name -> font file, relative to `font_dir` unless absolute.
    pub fonts: BTreeMap<String, String>,
    pub placeholder_variants: Vec<String>,
    pub ocr_command: String,
    pub ocr_languages: String,
    pub ocr_psm: u32,
    pub inpaint_radius: u32,
    pub output_dir: PathBuf,
    pub skip_existing: bool,
}

impl Default for Settings {
    fn default() -> Self {
        let fonts = [
            "Alex Brush",
            "Great Vibes",
            "Authentic Signature",
            "Thesignature",
        ]
        .into_iter()
        .map(|name| (name.to_string(), format!("{}.ttf", name)))
        .collect();
        Self {
            font_dir: PathBuf::from("assets/fonts"),
            default_font: DEFAULT_FONT.to_string(),
            fonts,
            placeholder_variants: vec![DEFAULT_PLACEHOLDER.to_string()],
            ocr_command: "tesseract".to_string(),
            ocr_languages: "eng".to_string(),
            ocr_psm: 3,
            inpaint_radius: 3,
            output_dir: PathBuf::from("certificates"),
            skip_existing: true,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    fonts: Option<FontSettings>,
    placeholder: Option<PlaceholderSettings>,
    ocr: Option<OcrSettings>,
    inpaint: Option<InpaintSettings>,
    output: Option<OutputSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct FontSettings {
    dir: Option<String>,
    default: Option<String>,
    registry: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Default, Deserialize)]
struct PlaceholderSettings {
    variants: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct OcrSettings {
    command: Option<String>,
    languages: Option<String>,
    psm: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct InpaintSettings {
    radius: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct OutputSettings {
    dir: Option<String>,
    skip_existing: Option<bool>,
}

/// Built-in defaults, then `settings.toml`, `settings.local.toml` in the
/// working directory and the home directory, then `extra_path`.
pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut ordered_paths = vec![
        PathBuf::from("settings.toml"),
        PathBuf::from("settings.local.toml"),
    ];
    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }
    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }
    load_settings_from(&ordered_paths)
}

/// Merges the existing files among `paths`, later files winning.
pub fn load_settings_from(paths: &[PathBuf]) -> Result<Settings> {
    let mut settings = Settings::default();
    let embedded: SettingsFile =
        toml::from_str(DEFAULT_SETTINGS_TOML).with_context(|| "failed to parse built-in settings")?;
    settings.merge(embedded);

    for path in paths {
        if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings.merge(parsed);
            tracing::debug!(path = %path.display(), "settings merged");
        }
    }

    Ok(settings)
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(fonts) = incoming.fonts {
            if let Some(dir) = fonts.dir.filter(|value| !value.trim().is_empty()) {
                self.font_dir = PathBuf::from(dir);
            }
            if let Some(default) = fonts.default.filter(|value| !value.trim().is_empty()) {
                self.default_font = default.trim().to_string();
            }
            if let Some(registry) = fonts.registry {
                for (name, file) in registry {
                    if !file.trim().is_empty() {
                        self.fonts.insert(name, file);
                    }
                }
            }
        }
        if let Some(placeholder) = incoming.placeholder {
            if let Some(variants) = placeholder.variants {
                let variants: Vec<String> = variants
                    .into_iter()
                    .filter(|value| !value.trim().is_empty())
                    .collect();
                if !variants.is_empty() {
                    self.placeholder_variants = variants;
                }
            }
        }
        if let Some(ocr) = incoming.ocr {
            if let Some(command) = ocr.command.filter(|value| !value.trim().is_empty()) {
                self.ocr_command = command;
            }
            if let Some(languages) = ocr.languages.filter(|value| !value.trim().is_empty()) {
                self.ocr_languages = languages;
            }
            if let Some(psm) = ocr.psm {
                self.ocr_psm = psm;
            }
        }
        if let Some(inpaint) = incoming.inpaint {
            if let Some(radius) = inpaint.radius.filter(|value| *value > 0) {
                self.inpaint_radius = radius;
            }
        }
        if let Some(output) = incoming.output {
            if let Some(dir) = output.dir.filter(|value| !value.trim().is_empty()) {
                self.output_dir = PathBuf::from(dir);
            }
            if let Some(skip) = output.skip_existing {
                self.skip_existing = skip;
            }
        }
    }

    pub fn font_registry(&self) -> Result<FontRegistry> {
        let specs = self.fonts.iter().map(|(name, file)| {
            let file = Path::new(file);
            let path = if file.is_absolute() {
                file.to_path_buf()
            } else {
                self.font_dir.join(file)
            };
            FontSpec::new(name.clone(), path)
        });
        FontRegistry::new(specs, &self.default_font).with_context(|| "invalid [fonts] settings")
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".certgen-rust"))
        }
    })
}
