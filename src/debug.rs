use anyhow::{Context, Result};
use image::{DynamicImage, RgbImage};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::compose::{blend_onto, rasterize_svg, token_boxes_svg};
use crate::ocr::OcrToken;
use crate::placeholder::PlaceholderMatch;

pub const DEBUG_IMAGE_FILE: &str = "ocr_debug.png";
pub const DEBUG_TOKENS_FILE: &str = "ocr_tokens.json";

#[derive(Debug, Serialize)]
pub struct OcrReport<'a> {
    pub placeholder: Option<&'a PlaceholderMatch>,
    pub tokens: &'a [OcrToken],
}

/// The template with every recognized word outlined.
pub fn render_token_overlay(
    template: &DynamicImage,
    tokens: &[OcrToken],
    placeholder: Option<&PlaceholderMatch>,
) -> Result<RgbImage> {
    let mut canvas = template.to_rgb8();
    let svg = token_boxes_svg(
        canvas.width(),
        canvas.height(),
        tokens,
        placeholder.map(|found| &found.bbox),
    );
    let overlay = rasterize_svg(&svg, None).with_context(|| "failed to draw ocr boxes")?;
    blend_onto(&mut canvas, &overlay);
    Ok(canvas)
}

/// Writes the outlined template and the token list into `dir`.
pub fn write_ocr_debug(
    dir: &Path,
    template: &DynamicImage,
    tokens: &[OcrToken],
    placeholder: Option<&PlaceholderMatch>,
) -> Result<(PathBuf, PathBuf)> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create debug directory: {}", dir.display()))?;

    let image_path = dir.join(DEBUG_IMAGE_FILE);
    render_token_overlay(template, tokens, placeholder)?
        .save(&image_path)
        .with_context(|| format!("failed to write {}", image_path.display()))?;

    let json_path = dir.join(DEBUG_TOKENS_FILE);
    let report = OcrReport {
        placeholder,
        tokens,
    };
    let json = serde_json::to_string_pretty(&report)?;
    fs::write(&json_path, json)
        .with_context(|| format!("failed to write {}", json_path.display()))?;

    tracing::info!(tokens = tokens.len(), dir = %dir.display(), "ocr debug output written");
    Ok((image_path, json_path))
}
