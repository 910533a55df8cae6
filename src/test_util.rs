use std::sync::Mutex;

use image::{DynamicImage, GrayImage, Rgb, RgbImage};

use crate::compose::{Inpainter, TextColor, TextExtent, TextPlacement, Typesetter};
use crate::error::CertError;
use crate::fonts::FontSpec;
use crate::ocr::{OcrToken, TextRecognizer};

/// Solid-block text: 0.5 px per point per character, ink height 0.7 of the size.
#[derive(Default)]
pub(crate) struct BlockTypesetter {
    pub(crate) failing_sizes: Vec<u32>,
    pub(crate) failing_names: Vec<String>,
    pub(crate) loads: Mutex<Vec<u32>>,
}

impl Typesetter for BlockTypesetter {
    type Face = u32;

    fn load_face(&self, font: &FontSpec, size: u32) -> Result<u32, CertError> {
        self.loads.lock().expect("loads lock").push(size);
        if self.failing_sizes.contains(&size) {
            return Err(CertError::FontLoad {
                name: font.name.clone(),
                path: font.path.clone(),
                reason: "synthetic".to_string(),
            });
        }
        Ok(size)
    }

    fn measure(&self, face: &u32, text: &str) -> Result<TextExtent, CertError> {
        let size = *face as f32;
        Ok(TextExtent {
            left: 0.0,
            top: -size * 0.7,
            right: text.chars().count() as f32 * size * 0.5,
            bottom: 0.0,
        })
    }

    fn draw(
        &self,
        canvas: &mut RgbImage,
        face: &u32,
        text: &str,
        placement: TextPlacement,
        color: TextColor,
    ) -> Result<(), CertError> {
        if self.failing_names.iter().any(|name| name == text) {
            return Err(CertError::Render(format!("synthetic failure for {}", text)));
        }
        let extent = self.measure(face, text)?;
        let x0 = placement.x.max(0.0) as u32;
        let y0 = placement.y.max(0.0) as u32;
        let x1 = ((placement.x + extent.width()) as u32).min(canvas.width());
        let y1 = ((placement.y + extent.height()) as u32).min(canvas.height());
        for y in y0..y1 {
            for x in x0..x1 {
                canvas.put_pixel(x, y, Rgb(color.rgb()));
            }
        }
        Ok(())
    }
}

/// Paints every masked pixel gray 30.
pub(crate) struct FlatFill;

impl Inpainter for FlatFill {
    fn inpaint(&self, image: &RgbImage, mask: &GrayImage, _radius: u32) -> RgbImage {
        let mut out = image.clone();
        for (x, y, px) in mask.enumerate_pixels() {
            if px[0] != 0 {
                out.put_pixel(x, y, Rgb([30, 30, 30]));
            }
        }
        out
    }
}

/// Returns the same tokens for every image.
pub(crate) struct FixedTokens(pub(crate) Vec<OcrToken>);

impl TextRecognizer for FixedTokens {
    fn recognize(&self, _image: &DynamicImage) -> Result<Vec<OcrToken>, CertError> {
        Ok(self.0.clone())
    }
}
