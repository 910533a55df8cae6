mod inpaint;
mod layout;
mod render;
mod typeset;

use image::{DynamicImage, RgbImage};

use crate::error::CertError;
use crate::fonts::FontSpec;
use crate::placeholder::PlaceholderMatch;

pub use inpaint::{
    DEFAULT_INPAINT_RADIUS, Inpainter, MASK_PAINT, TeleaInpainter, placeholder_mask,
};
pub use layout::{
    FALLBACK_FORCED_SIZE, FALLBACK_MIN_SIZE, FALLBACK_START_SIZE, FALLBACK_STEP,
    FALLBACK_WIDTH_RATIO, PLACEHOLDER_MAX_SIZE, PLACEHOLDER_MIN_SIZE, TextColor, TextExtent,
    TextPlacement, choose_fallback_size, contrast_color, fallback_size_ladder, place_centered,
    place_in_box, placeholder_font_size,
};
pub use render::{blend_onto, rasterize_svg, token_boxes_svg};
pub use typeset::{FontData, SizedFace, SvgTypesetter, Typesetter};

/// Everything needed to render one certificate.
#[derive(Clone, Copy)]
pub struct RenderRequest<'a> {
    pub template: &'a DynamicImage,
    /// Non-empty, already trimmed by the caller.
    pub name: &'a str,
    pub placeholder: Option<&'a PlaceholderMatch>,
    pub font: &'a FontSpec,
}

/// Layout decisions taken for one render, exposed for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderPlan {
    pub font_size: u32,
    pub color: TextColor,
    pub placement: TextPlacement,
    pub extent: TextExtent,
}

pub struct CertificateComposer<I = TeleaInpainter, T = SvgTypesetter> {
    inpainter: I,
    typesetter: T,
    inpaint_radius: u32,
}

impl Default for CertificateComposer {
    fn default() -> Self {
        Self::new(TeleaInpainter, SvgTypesetter)
    }
}

impl<I: Inpainter, T: Typesetter> CertificateComposer<I, T> {
    pub fn new(inpainter: I, typesetter: T) -> Self {
        Self {
            inpainter,
            typesetter,
            inpaint_radius: DEFAULT_INPAINT_RADIUS,
        }
    }

    pub fn with_inpaint_radius(mut self, radius: u32) -> Self {
        self.inpaint_radius = radius.max(1);
        self
    }

    pub fn compose(&self, request: &RenderRequest<'_>) -> Result<RgbImage, CertError> {
        self.compose_with_plan(request).map(|(image, _)| image)
    }

    /// Renders the certificate and reports the size, color and position used.
    ///
    /// The template is converted into a fresh RGB buffer first; the caller's
    /// image is never touched.
    pub fn compose_with_plan(
        &self,
        request: &RenderRequest<'_>,
    ) -> Result<(RgbImage, RenderPlan), CertError> {
        let working = request.template.to_rgb8();
        match request.placeholder {
            Some(placeholder) => self.compose_in_placeholder(working, request, placeholder),
            None => self.compose_centered(working, request),
        }
    }

    fn compose_in_placeholder(
        &self,
        working: RgbImage,
        request: &RenderRequest<'_>,
        placeholder: &PlaceholderMatch,
    ) -> Result<(RgbImage, RenderPlan), CertError> {
        let bbox = &placeholder.bbox;
        let (width, height) = working.dimensions();
        if bbox.is_degenerate() {
            tracing::debug!(?bbox, "degenerate placeholder box");
        }

        let mask = placeholder_mask(width, height, bbox);
        let mut canvas = self.inpainter.inpaint(&working, &mask, self.inpaint_radius);

        let font_size = placeholder_font_size(bbox.height);
        let (face, font_size) = match self.typesetter.load_face(request.font, font_size) {
            Ok(face) => (face, font_size),
            Err(err) if font_size != PLACEHOLDER_MIN_SIZE => {
                tracing::warn!(
                    font = %request.font.name,
                    size = font_size,
                    error = %err,
                    "font load failed, retrying at minimum size"
                );
                let face = self
                    .typesetter
                    .load_face(request.font, PLACEHOLDER_MIN_SIZE)?;
                (face, PLACEHOLDER_MIN_SIZE)
            }
            Err(err) => return Err(err),
        };

        let color = contrast_color(&canvas, bbox);
        let extent = self.typesetter.measure(&face, request.name)?;
        let placement = place_in_box(&extent, bbox, width, height);
        self.typesetter
            .draw(&mut canvas, &face, request.name, placement, color)?;

        let plan = RenderPlan {
            font_size,
            color,
            placement,
            extent,
        };
        tracing::debug!(name = request.name, ?plan, "rendered into placeholder");
        Ok((canvas, plan))
    }

    fn compose_centered(
        &self,
        mut canvas: RgbImage,
        request: &RenderRequest<'_>,
    ) -> Result<(RgbImage, RenderPlan), CertError> {
        let (width, height) = canvas.dimensions();
        let font_size = choose_fallback_size(width, |size| {
            self.typesetter
                .load_face(request.font, size)
                .ok()
                .and_then(|face| self.typesetter.measure(&face, request.name).ok())
                .map(|extent| extent.width())
        });
        let face = self.typesetter.load_face(request.font, font_size)?;

        let color = TextColor::Black;
        let extent = self.typesetter.measure(&face, request.name)?;
        let placement = place_centered(&extent, width, height);
        self.typesetter
            .draw(&mut canvas, &face, request.name, placement, color)?;

        let plan = RenderPlan {
            font_size,
            color,
            placement,
            extent,
        };
        tracing::debug!(name = request.name, ?plan, "rendered with centered fallback");
        Ok((canvas, plan))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::BoundingBox;
    use crate::test_util::{BlockTypesetter, FlatFill};
    use image::Rgb;
    use std::path::PathBuf;

    fn font() -> FontSpec {
        FontSpec::new("Great Vibes", PathBuf::from("fonts/Great Vibes.ttf"))
    }

    fn placeholder(x: u32, y: u32, w: u32, h: u32) -> PlaceholderMatch {
        PlaceholderMatch {
            matched_text: "NAME".to_string(),
            bbox: BoundingBox::new(x, y, w, h),
        }
    }

    #[test]
    fn placeholder_path_samples_color_after_inpainting() {
        let template =
            DynamicImage::ImageRgb8(RgbImage::from_pixel(200, 100, Rgb([250, 250, 250])));
        let found = placeholder(50, 40, 60, 20);
        let font = font();
        let composer = CertificateComposer::new(FlatFill, BlockTypesetter::default());
        let request = RenderRequest {
            template: &template,
            name: "Al",
            placeholder: Some(&found),
            font: &font,
        };
        let (image, plan) = composer.compose_with_plan(&request).unwrap();
        assert_eq!(image.dimensions(), (200, 100));
        assert_eq!(plan.font_size, 55);
        assert_eq!(plan.color, TextColor::White);
        // Text block spans x 52..107, y 30..69; the rest of the mask keeps the fill.
        assert_eq!(image.get_pixel(80, 50), &Rgb([255, 255, 255]));
        assert_eq!(image.get_pixel(109, 58), &Rgb([30, 30, 30]));
        assert_eq!(image.get_pixel(5, 5), &Rgb([250, 250, 250]));
    }

    #[test]
    fn retries_at_minimum_size_when_first_load_fails() {
        let template = DynamicImage::ImageRgb8(RgbImage::new(400, 200));
        let found = placeholder(10, 10, 100, 50);
        let font = font();
        let typesetter = BlockTypesetter {
            failing_sizes: vec![75],
            ..Default::default()
        };
        let composer = CertificateComposer::new(FlatFill, typesetter);
        let request = RenderRequest {
            template: &template,
            name: "Bo",
            placeholder: Some(&found),
            font: &font,
        };
        let (_, plan) = composer.compose_with_plan(&request).unwrap();
        assert_eq!(plan.font_size, 55);
        assert_eq!(*composer.typesetter.loads.lock().unwrap(), vec![75, 55]);
    }

    #[test]
    fn fails_when_fallback_size_also_fails() {
        let template = DynamicImage::ImageRgb8(RgbImage::new(400, 200));
        let found = placeholder(10, 10, 100, 50);
        let font = font();
        let typesetter = BlockTypesetter {
            failing_sizes: vec![75, 55],
            ..Default::default()
        };
        let composer = CertificateComposer::new(FlatFill, typesetter);
        let request = RenderRequest {
            template: &template,
            name: "Bo",
            placeholder: Some(&found),
            font: &font,
        };
        let err = composer.compose(&request).unwrap_err();
        assert!(matches!(err, CertError::FontLoad { .. }));
    }

    #[test]
    fn no_retry_when_box_already_gives_minimum_size() {
        let template = DynamicImage::ImageRgb8(RgbImage::new(400, 200));
        let found = placeholder(10, 10, 100, 20);
        let font = font();
        let typesetter = BlockTypesetter {
            failing_sizes: vec![55],
            ..Default::default()
        };
        let composer = CertificateComposer::new(FlatFill, typesetter);
        let request = RenderRequest {
            template: &template,
            name: "Bo",
            placeholder: Some(&found),
            font: &font,
        };
        let err = composer.compose(&request).unwrap_err();
        assert!(matches!(err, CertError::FontLoad { .. }));
        assert_eq!(*composer.typesetter.loads.lock().unwrap(), vec![55]);
    }

    #[test]
    fn centered_path_shrinks_until_text_fits() {
        // 20 chars at 0.5 px/pt: width = 10 * size, limit 800 -> 80pt.
        let template =
            DynamicImage::ImageRgb8(RgbImage::from_pixel(1000, 500, Rgb([255, 255, 255])));
        let font = font();
        let composer = CertificateComposer::new(FlatFill, BlockTypesetter::default());
        let request = RenderRequest {
            template: &template,
            name: "ABCDEFGHIJKLMNOPQRST",
            placeholder: None,
            font: &font,
        };
        let (image, plan) = composer.compose_with_plan(&request).unwrap();
        assert_eq!(plan.font_size, 80);
        assert_eq!(plan.color, TextColor::Black);
        assert_eq!(plan.placement, TextPlacement { x: 100.0, y: 222.0 });
        assert_eq!(image.get_pixel(500, 250), &Rgb([0, 0, 0]));
        assert_eq!(image.get_pixel(10, 10), &Rgb([255, 255, 255]));
    }

    #[test]
    fn centered_path_forces_sixty_when_nothing_fits() {
        let template = DynamicImage::ImageRgb8(RgbImage::new(100, 100));
        let font = font();
        let composer = CertificateComposer::new(FlatFill, BlockTypesetter::default());
        let request = RenderRequest {
            template: &template,
            name: "A very long recipient name",
            placeholder: None,
            font: &font,
        };
        let (image, plan) = composer.compose_with_plan(&request).unwrap();
        assert_eq!(plan.font_size, FALLBACK_FORCED_SIZE);
        assert_eq!(image.dimensions(), (100, 100));
    }

    #[test]
    fn template_is_left_untouched() {
        let original = RgbImage::from_pixel(120, 80, Rgb([240, 240, 240]));
        let template = DynamicImage::ImageRgb8(original.clone());
        let found = placeholder(20, 20, 60, 20);
        let font = font();
        let composer = CertificateComposer::new(FlatFill, BlockTypesetter::default());
        for name in ["Ann", "Benjamin"] {
            let request = RenderRequest {
                template: &template,
                name,
                placeholder: Some(&found),
                font: &font,
            };
            composer.compose(&request).unwrap();
        }
        assert_eq!(template.to_rgb8(), original);
    }
}
