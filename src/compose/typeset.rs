use std::sync::Arc;

use image::RgbImage;
use ttf_parser::{Face, name_id};

use crate::compose::layout::{TextColor, TextExtent, TextPlacement};
use crate::compose::render::{blend_onto, overlay_text_svg, rasterize_svg, text_ink_bounds};
use crate::error::CertError;
use crate::fonts::FontSpec;

/// Font loading, measuring and drawing for the composer.
pub trait Typesetter: Send + Sync {
    /// A font prepared at one pixel size.
    type Face;

    fn load_face(&self, font: &FontSpec, size: u32) -> Result<Self::Face, CertError>;

    /// Ink box of `text`, relative to the pen origin on the baseline.
    fn measure(&self, face: &Self::Face, text: &str) -> Result<TextExtent, CertError>;

    /// Draws `text` so that its ink box starts at `placement`.
    fn draw(
        &self,
        canvas: &mut RgbImage,
        face: &Self::Face,
        text: &str,
        placement: TextPlacement,
        color: TextColor,
    ) -> Result<(), CertError>;
}

/// Parsed font file shared by every size of the same face.
#[derive(Clone)]
pub struct FontData {
    data: Arc<Vec<u8>>,
    family: Option<String>,
}

impl FontData {
    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    pub fn from_bytes(data: Vec<u8>) -> Result<Self, String> {
        let count = ttf_parser::fonts_in_collection(&data).unwrap_or(1);
        let family = (0..count)
            .find_map(|index| Face::parse(&data, index).ok().map(|face| extract_family_name(&face)))
            .ok_or_else(|| "failed to parse font data".to_string())?;
        Ok(Self {
            data: Arc::new(data),
            family,
        })
    }
}

#[derive(Clone)]
pub struct SizedFace {
    font: FontData,
    size: u32,
}

/// Lays text out through usvg, so measuring and drawing share one shaping
/// pass (kerning and ligatures included), and rasterizes it with resvg.
#[derive(Debug, Clone, Copy, Default)]
pub struct SvgTypesetter;

impl SvgTypesetter {
    fn text_svg(
        face: &SizedFace,
        text: &str,
        canvas: (u32, u32),
        pen_x: f32,
        baseline: f32,
        color: TextColor,
    ) -> String {
        let family = face.font.family().unwrap_or("sans-serif");
        overlay_text_svg(canvas.0, canvas.1, text, pen_x, baseline, face.size, family, color)
    }
}

impl Typesetter for SvgTypesetter {
    type Face = SizedFace;

    fn load_face(&self, font: &FontSpec, size: u32) -> Result<SizedFace, CertError> {
        let fail = |reason: String| CertError::FontLoad {
            name: font.name.clone(),
            path: font.path.clone(),
            reason,
        };
        if size == 0 {
            return Err(fail("font size must be positive".to_string()));
        }
        let data = std::fs::read(&font.path).map_err(|err| fail(err.to_string()))?;
        let font = FontData::from_bytes(data).map_err(fail)?;
        Ok(SizedFace { font, size })
    }

    fn measure(&self, face: &SizedFace, text: &str) -> Result<TextExtent, CertError> {
        let svg = Self::text_svg(face, text, (1, 1), 0.0, 0.0, TextColor::Black);
        let bounds = text_ink_bounds(&svg, Some(face.font.data()))?;
        Ok(bounds.map_or_else(TextExtent::default, |rect| TextExtent {
            left: rect.left(),
            top: rect.top(),
            right: rect.right(),
            bottom: rect.bottom(),
        }))
    }

    fn draw(
        &self,
        canvas: &mut RgbImage,
        face: &SizedFace,
        text: &str,
        placement: TextPlacement,
        color: TextColor,
    ) -> Result<(), CertError> {
        let extent = self.measure(face, text)?;
        let pen_x = placement.x - extent.left;
        let baseline = placement.y - extent.top;
        let svg = Self::text_svg(face, text, canvas.dimensions(), pen_x, baseline, color);
        let overlay = rasterize_svg(&svg, Some(face.font.data()))?;
        blend_onto(canvas, &overlay);
        Ok(())
    }
}

fn extract_family_name(face: &Face<'_>) -> Option<String> {
    let mut fallback = None;
    for name in face.names() {
        if name.name_id == name_id::TYPOGRAPHIC_FAMILY {
            if let Some(value) = name.to_string() {
                return Some(value);
            }
        } else if name.name_id == name_id::FAMILY && fallback.is_none() {
            fallback = name.to_string();
        }
    }
    fallback
}
