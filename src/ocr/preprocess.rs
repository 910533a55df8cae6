use image::{DynamicImage, GrayImage, Luma};

/// Converts a template to the luma image handed to the recognizer.
///
/// Transparent pixels are composited over white first so that PNG templates
/// with alpha do not read as black. The size is left untouched: token boxes
/// must map 1:1 onto the template.
pub fn prepare_for_ocr(image: &DynamicImage) -> GrayImage {
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut luma = GrayImage::new(width, height);

    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = a as f32 / 255.0;
        let r = r as f32 * alpha + 255.0 * (1.0 - alpha);
        let g = g as f32 * alpha + 255.0 * (1.0 - alpha);
        let b = b as f32 * alpha + 255.0 * (1.0 - alpha);
        let value = (0.299 * r + 0.587 * g + 0.114 * b).round().clamp(0.0, 255.0) as u8;
        luma.put_pixel(x, y, Luma([value]));
    }

    luma
}
