use std::io::Write;
use std::path::Path;
use std::process::Command;

use image::DynamicImage;

use crate::error::CertError;
use crate::ocr::{OcrToken, TextRecognizer, parse_tsv_words};

/// Recognizer backed by the `tesseract` command line tool.
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    command: String,
    languages: String,
    psm: u32,
}

impl Default for TesseractRecognizer {
    fn default() -> Self {
        Self {
            command: "tesseract".to_string(),
            languages: "eng".to_string(),
            psm: 3,
        }
    }
}

impl TesseractRecognizer {
    pub fn new(command: impl Into<String>, languages: impl Into<String>, psm: u32) -> Self {
        Self {
            command: command.into(),
            languages: languages.into(),
            psm,
        }
    }

    fn run_tsv(&self, path: &Path) -> Result<String, CertError> {
        let output = Command::new(&self.command)
            .arg(path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.languages)
            .arg("--psm")
            .arg(self.psm.to_string())
            .arg("tsv")
            .output()
            .map_err(|err| {
                CertError::OcrEngine(format!(
                    "failed to run {} (is it installed?): {}",
                    self.command, err
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CertError::OcrEngine(format!(
                "{} failed: {}",
                self.command,
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize(&self, image: &DynamicImage) -> Result<Vec<OcrToken>, CertError> {
        let luma = image.to_luma8();
        let mut tmp = tempfile::Builder::new()
            .suffix(".png")
            .tempfile()
            .map_err(|err| CertError::OcrEngine(format!("failed to create temp file: {}", err)))?;
        DynamicImage::ImageLuma8(luma)
            .write_to(&mut tmp, image::ImageFormat::Png)
            .map_err(|err| CertError::OcrEngine(format!("failed to write temp image: {}", err)))?;
        tmp.flush().ok();

        let tsv = self.run_tsv(tmp.path())?;
        let tokens = parse_tsv_words(&tsv);
        tracing::debug!(count = tokens.len(), psm = self.psm, "tesseract tokens");
        Ok(tokens)
    }
}

pub fn list_tesseract_languages(command: &str) -> anyhow::Result<Vec<String>> {
    use anyhow::{Context, anyhow};

    let output = Command::new(command)
        .arg("--list-langs")
        .output()
        .with_context(|| format!("failed to run {} --list-langs", command))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("{} --list-langs failed: {}", command, stderr.trim()));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let langs = stdout
        .lines()
        .skip(1)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect();
    Ok(langs)
}
