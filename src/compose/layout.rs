use image::RgbImage;

use crate::ocr::BoundingBox;

pub const PLACEHOLDER_MIN_SIZE: u32 = 55;
pub const PLACEHOLDER_MAX_SIZE: u32 = 85;
const PLACEHOLDER_HEIGHT_SCALE: f32 = 1.5;

pub const FALLBACK_START_SIZE: u32 = 120;
pub const FALLBACK_MIN_SIZE: u32 = 40;
pub const FALLBACK_STEP: u32 = 5;
pub const FALLBACK_FORCED_SIZE: u32 = 60;
pub const FALLBACK_WIDTH_RATIO: f32 = 0.8;

const BRIGHTNESS_THRESHOLD: u32 = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextColor {
    Black,
    White,
}

impl TextColor {
    pub fn rgb(self) -> [u8; 3] {
        match self {
            TextColor::Black => [0, 0, 0],
            TextColor::White => [255, 255, 255],
        }
    }

    pub fn hex(self) -> &'static str {
        match self {
            TextColor::Black => "#000000",
            TextColor::White => "#ffffff",
        }
    }
}

/// Ink bounds of a rendered string, relative to the pen origin on the
/// baseline with y growing downwards (so `top` is usually negative).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TextExtent {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl TextExtent {
    pub fn width(&self) -> f32 {
        (self.right - self.left).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.bottom - self.top).max(0.0)
    }
}

/// Top-left corner of the text's ink box in image pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextPlacement {
    pub x: f32,
    pub y: f32,
}

/// One size for every name rendered into the same placeholder.
pub fn placeholder_font_size(box_height: u32) -> u32 {
    let scaled = (box_height as f32 * PLACEHOLDER_HEIGHT_SCALE).round() as u32;
    scaled.clamp(PLACEHOLDER_MIN_SIZE, PLACEHOLDER_MAX_SIZE)
}

/// 120, 115, ..., 40.
pub fn fallback_size_ladder() -> impl Iterator<Item = u32> {
    (FALLBACK_MIN_SIZE..=FALLBACK_START_SIZE)
        .rev()
        .step_by(FALLBACK_STEP as usize)
}

/// Largest ladder size whose measured width fits in 80% of the image.
///
/// `measure` returns `None` when the font cannot be loaded at that size; such
/// sizes are skipped. With no fitting size the forced fallback size is used.
pub fn choose_fallback_size<F>(image_width: u32, mut measure: F) -> u32
where
    F: FnMut(u32) -> Option<f32>,
{
    let limit = image_width as f32 * FALLBACK_WIDTH_RATIO;
    fallback_size_ladder()
        .find(|size| measure(*size).is_some_and(|width| width <= limit))
        .unwrap_or(FALLBACK_FORCED_SIZE)
}

/// White on dark backgrounds, black otherwise, from the pixel at the box center.
///
/// The sample is a single pixel, not an average over the box. A center that
/// falls outside the image yields black.
pub fn contrast_color(image: &RgbImage, bbox: &BoundingBox) -> TextColor {
    let (cx, cy) = bbox.center();
    let Some(pixel) = image.get_pixel_checked(cx, cy) else {
        tracing::debug!(cx, cy, "contrast sample outside image, using black");
        return TextColor::Black;
    };
    let [r, g, b] = pixel.0;
    let brightness = (r as u32 + g as u32 + b as u32) / 3;
    if brightness < BRIGHTNESS_THRESHOLD {
        TextColor::White
    } else {
        TextColor::Black
    }
}

/// Centers the text inside `bbox`, then shifts it back inside the image.
///
/// Text wider (or taller) than the image is pinned to the left (top) edge.
pub fn place_in_box(
    extent: &TextExtent,
    bbox: &BoundingBox,
    image_width: u32,
    image_height: u32,
) -> TextPlacement {
    let text_w = extent.width();
    let text_h = extent.height();
    let x = bbox.x as f32 + (bbox.width as f32 - text_w) / 2.0;
    let y = bbox.y as f32 + (bbox.height as f32 - text_h) / 2.0;
    TextPlacement {
        x: x.min(image_width as f32 - text_w).max(0.0),
        y: y.min(image_height as f32 - text_h).max(0.0),
    }
}

pub fn place_centered(extent: &TextExtent, image_width: u32, image_height: u32) -> TextPlacement {
    TextPlacement {
        x: (image_width as f32 - extent.width()) / 2.0,
        y: (image_height as f32 - extent.height()) / 2.0,
    }
}
