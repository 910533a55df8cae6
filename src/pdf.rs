use anyhow::{Context, Result, anyhow};
use printpdf::{Image, ImageTransform, Mm, PdfDocument};
use std::fs;
use std::path::Path;

pub const A4_WIDTH_MM: f32 = 210.0;
pub const A4_HEIGHT_MM: f32 = 297.0;
const IMAGE_DPI: f32 = 72.0;

/// Where a certificate image lands on an A4 portrait page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageFit {
    /// Landscape images are turned a quarter turn before placement.
    pub rotate: bool,
    pub scale: f32,
    pub offset_x_mm: f32,
    pub offset_y_mm: f32,
    pub width_mm: f32,
    pub height_mm: f32,
}

/// Uniform scale that fits a `width` x `height` pixel image on A4, centered.
pub fn fit_to_a4(width: u32, height: u32) -> PageFit {
    let rotate = width > height;
    let (width, height) = if rotate {
        (height, width)
    } else {
        (width, height)
    };
    let natural_w = px_to_mm(width.max(1));
    let natural_h = px_to_mm(height.max(1));
    let scale = (A4_WIDTH_MM / natural_w).min(A4_HEIGHT_MM / natural_h);
    let width_mm = natural_w * scale;
    let height_mm = natural_h * scale;
    PageFit {
        rotate,
        scale,
        offset_x_mm: (A4_WIDTH_MM - width_mm) / 2.0,
        offset_y_mm: (A4_HEIGHT_MM - height_mm) / 2.0,
        width_mm,
        height_mm,
    }
}

/// One A4 page per encoded certificate image.
pub fn assemble_pdf(pages: &[Vec<u8>]) -> Result<Vec<u8>> {
    if pages.is_empty() {
        return Err(anyhow!("no pages to render"));
    }

    let (doc, first_page, first_layer) =
        PdfDocument::new("certificates", Mm(A4_WIDTH_MM), Mm(A4_HEIGHT_MM), "Layer 1");
    for (idx, bytes) in pages.iter().enumerate() {
        let (page, layer) = if idx == 0 {
            (first_page, first_layer)
        } else {
            doc.add_page(
                Mm(A4_WIDTH_MM),
                Mm(A4_HEIGHT_MM),
                format!("Layer {}", idx + 1),
            )
        };

        let mut image = printpdf::image_crate::load_from_memory(bytes)
            .with_context(|| format!("failed to decode certificate page {}", idx + 1))?;
        let fit = fit_to_a4(image.width(), image.height());
        if fit.rotate {
            image = image.rotate90();
        }

        let current_layer = doc.get_page(page).get_layer(layer);
        let pdf_image = Image::from_dynamic_image(&image);
        let transform = ImageTransform {
            translate_x: Some(Mm(fit.offset_x_mm)),
            translate_y: Some(Mm(fit.offset_y_mm)),
            rotate: None,
            scale_x: Some(fit.scale),
            scale_y: Some(fit.scale),
            dpi: Some(IMAGE_DPI),
        };
        pdf_image.add_to_layer(current_layer, transform);
    }

    let mut buffer = Vec::new();
    {
        let mut writer = std::io::BufWriter::new(&mut buffer);
        doc.save(&mut writer)
            .with_context(|| "failed to write pdf")?;
    }
    Ok(buffer)
}

/// Reads the PNG files and writes them as one PDF at `output`.
pub fn write_pdf(images: &[impl AsRef<Path>], output: &Path) -> Result<()> {
    let pages = images
        .iter()
        .map(|path| {
            let path = path.as_ref();
            fs::read(path).with_context(|| format!("failed to read {}", path.display()))
        })
        .collect::<Result<Vec<_>>>()?;
    let bytes = assemble_pdf(&pages)?;
    if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(output, bytes).with_context(|| format!("failed to write {}", output.display()))?;
    tracing::info!(pages = pages.len(), path = %output.display(), "pdf written");
    Ok(())
}

fn px_to_mm(px: u32) -> f32 {
    let inches = px as f32 / IMAGE_DPI;
    inches * 25.4
}
