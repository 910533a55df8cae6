use image::{Rgba, RgbImage, RgbaImage};
use resvg::render;
use std::sync::Arc;
use tiny_skia::Pixmap;
use usvg::{Group, Node, Options, Rect, Tree, fontdb};

use crate::compose::layout::TextColor;
use crate::error::CertError;
use crate::ocr::{BoundingBox, OcrToken};

const TOKEN_STROKE: &str = "#00c853";
const PLACEHOLDER_STROKE: &str = "#d50000";

/// Transparent overlay holding one line of text.
///
/// `pen_x`/`baseline` are the SVG text anchor, i.e. the pen origin on the
/// baseline, not the top-left of the ink.
#[allow(clippy::too_many_arguments)]
pub fn overlay_text_svg(
    width: u32,
    height: u32,
    text: &str,
    pen_x: f32,
    baseline: f32,
    font_size: u32,
    font_family: &str,
    color: TextColor,
) -> String {
    let mut svg = svg_open(width, height);
    svg.push_str(&format!(
        r#"<text x="{x}" y="{y}" font-size="{size}" fill="{color}" font-family="{family}" xml:space="preserve">{text}</text>"#,
        x = pen_x,
        y = baseline,
        size = font_size,
        color = color.hex(),
        family = escape_xml(font_family),
        text = escape_xml(text)
    ));
    svg.push_str("</svg>");
    svg
}

/// Outline of every OCR token; the placeholder, if any, in red.
pub fn token_boxes_svg(
    width: u32,
    height: u32,
    tokens: &[OcrToken],
    placeholder: Option<&BoundingBox>,
) -> String {
    let mut svg = svg_open(width, height);
    for token in tokens {
        push_rect(&mut svg, &token.bbox, TOKEN_STROKE);
    }
    if let Some(bbox) = placeholder {
        push_rect(&mut svg, bbox, PLACEHOLDER_STROKE);
    }
    svg.push_str("</svg>");
    svg
}

fn svg_open(width: u32, height: u32) -> String {
    format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = width,
        h = height
    )
}

fn push_rect(svg: &mut String, bbox: &BoundingBox, stroke: &str) {
    svg.push_str(&format!(
        r#"<rect x="{x}" y="{y}" width="{w}" height="{h}" fill="none" stroke="{stroke}" stroke-width="2"/>"#,
        x = bbox.x,
        y = bbox.y,
        w = bbox.width,
        h = bbox.height,
        stroke = stroke
    ));
}

/// Rasterizes an SVG into a straight-alpha RGBA image of the SVG's own size.
///
/// Only `font_data` is registered with the font database, so text always
/// renders with the requested face rather than a system substitute.
pub fn rasterize_svg(svg: &str, font_data: Option<&[u8]>) -> Result<RgbaImage, CertError> {
    let tree = build_tree(svg, font_data)?;
    let size = tree.size().to_int_size();
    let mut pixmap = Pixmap::new(size.width(), size.height())
        .ok_or_else(|| CertError::Render("empty svg size".to_string()))?;
    let mut pixmap_mut = pixmap.as_mut();
    render(&tree, tiny_skia::Transform::identity(), &mut pixmap_mut);

    let mut raw = Vec::with_capacity(pixmap.pixels().len() * 4);
    for pixel in pixmap.pixels() {
        let color = pixel.demultiply();
        raw.extend_from_slice(&[color.red(), color.green(), color.blue(), color.alpha()]);
    }
    RgbaImage::from_raw(size.width(), size.height(), raw)
        .ok_or_else(|| CertError::Render("failed to build image buffer from svg".to_string()))
}

/// Ink box of the first text element after shaping, in SVG user units.
///
/// `None` when the text draws nothing, e.g. whitespace only.
pub fn text_ink_bounds(svg: &str, font_data: Option<&[u8]>) -> Result<Option<Rect>, CertError> {
    let tree = build_tree(svg, font_data)?;
    Ok(first_text_bounds(tree.root()))
}

fn first_text_bounds(group: &Group) -> Option<Rect> {
    for node in group.children() {
        match node {
            Node::Text(text) => {
                let glyphs = text.flattened();
                return glyphs.has_children().then(|| glyphs.abs_bounding_box());
            }
            Node::Group(child) => {
                if let Some(rect) = first_text_bounds(child) {
                    return Some(rect);
                }
            }
            _ => {}
        }
    }
    None
}

fn build_tree(svg: &str, font_data: Option<&[u8]>) -> Result<Tree, CertError> {
    let mut db = fontdb::Database::new();
    if let Some(data) = font_data {
        db.load_font_data(data.to_vec());
    }
    let family = db
        .faces()
        .next()
        .and_then(|face| face.families.first())
        .map(|(name, _)| name.clone());
    let mut options = Options {
        fontdb: Arc::new(db),
        ..Options::default()
    };
    if let Some(family) = family {
        options.font_family = family;
    }
    Tree::from_str(svg, &options)
        .map_err(|err| CertError::Render(format!("failed to parse svg: {}", err)))
}

/// Source-over composite of `overlay` onto `canvas`, both anchored at (0, 0).
pub fn blend_onto(canvas: &mut RgbImage, overlay: &RgbaImage) {
    let width = canvas.width().min(overlay.width());
    let height = canvas.height().min(overlay.height());
    for y in 0..height {
        for x in 0..width {
            let Rgba([r, g, b, a]) = *overlay.get_pixel(x, y);
            if a == 0 {
                continue;
            }
            let alpha = a as f32 / 255.0;
            let inv = 1.0 - alpha;
            let dst = canvas.get_pixel_mut(x, y);
            dst.0[0] = (r as f32 * alpha + dst.0[0] as f32 * inv).round() as u8;
            dst.0[1] = (g as f32 * alpha + dst.0[1] as f32 * inv).round() as u8;
            dst.0[2] = (b as f32 * alpha + dst.0[2] as f32 * inv).round() as u8;
        }
    }
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
