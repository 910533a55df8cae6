use anyhow::{Context, Result, anyhow};
use std::fs::File;
use std::path::{Path, PathBuf};

pub mod batch;
pub mod compose;
pub mod debug;
pub mod error;
pub mod fonts;
pub mod logging;
pub mod names;
pub mod ocr;
pub mod pdf;
pub mod placeholder;
pub mod settings;
#[cfg(test)]
mod test_util;

pub use batch::{BatchEntry, BatchJob, BatchOutcome, BatchSummary, generate_batch};
pub use compose::{CertificateComposer, RenderPlan, RenderRequest};
pub use error::CertError;
pub use fonts::{FontRegistry, FontSpec};
pub use ocr::{BoundingBox, OcrToken, TesseractRecognizer, TextRecognizer};
pub use placeholder::{PlaceholderLocator, PlaceholderMatch};

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub template: Option<PathBuf>,
    /// Comma or newline separated names.
    pub names: Option<String>,
    pub csv: Option<PathBuf>,
    pub font: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub pdf: Option<PathBuf>,
    pub settings_path: Option<String>,
    pub overwrite: bool,
    pub allow_missing_placeholder: bool,
    pub debug_ocr: bool,
    pub list_fonts: bool,
    pub show_ocr_languages: bool,
}

/// Runs one CLI invocation and returns what should be printed.
///
/// `input` is piped stdin, used as the name list when neither `names` nor
/// `csv` is set.
pub fn run(config: Config, input: Option<String>) -> Result<String> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = settings::load_settings(settings_path)?;
    let registry = settings.font_registry()?;

    if config.list_fonts {
        return Ok(format_font_list(&registry));
    }
    if config.show_ocr_languages {
        let languages = ocr::list_tesseract_languages(&settings.ocr_command)?;
        return Ok(languages.join("\n"));
    }

    let template_path = config
        .template
        .as_deref()
        .ok_or_else(|| anyhow!("--template is required"))?;
    let template = image::open(template_path)
        .with_context(|| format!("failed to open template: {}", template_path.display()))?;
    let names = collect_names(&config, input.as_deref())?;
    let output_dir = config
        .output_dir
        .clone()
        .unwrap_or_else(|| settings.output_dir.clone());

    let recognizer = TesseractRecognizer::new(
        settings.ocr_command.as_str(),
        settings.ocr_languages.as_str(),
        settings.ocr_psm,
    );
    let locator = PlaceholderLocator::with_variants(recognizer, &settings.placeholder_variants);
    let (found, tokens) = locator.locate_with_tokens(&template)?;

    let mut report = Vec::new();
    if config.debug_ocr {
        let (image_path, json_path) =
            debug::write_ocr_debug(&output_dir, &template, &tokens, found.as_ref())?;
        report.push(format!("ocr debug\t{}", image_path.display()));
        report.push(format!("ocr tokens\t{}", json_path.display()));
    }
    if names.is_empty() {
        if config.debug_ocr {
            return Ok(report.join("\n"));
        }
        return Err(anyhow!("no names given (use --names, --csv or stdin)"));
    }

    if found.is_none() {
        if !config.allow_missing_placeholder {
            return Err(CertError::placeholder_not_found().into());
        }
        tracing::warn!(
            template = %template_path.display(),
            "no placeholder found, names will be centered"
        );
    }

    let requested_font = config.font.as_deref().unwrap_or(registry.default_name());
    if registry.is_substituted(requested_font) {
        tracing::warn!(
            requested = requested_font,
            fallback = registry.default_name(),
            "unknown font, using default"
        );
    }
    let font = registry.resolve(requested_font);

    let composer: CertificateComposer =
        CertificateComposer::default().with_inpaint_radius(settings.inpaint_radius);
    let job = BatchJob {
        template: &template,
        placeholder: found.as_ref(),
        font,
        output_dir: &output_dir,
        overwrite: config.overwrite || !settings.skip_existing,
    };
    let entries = generate_batch(&composer, &job, &names)?;
    report.extend(format_entries(&entries));

    if let Some(pdf_path) = config.pdf.as_deref() {
        let pages = pdf_pages(&entries);
        if pages.is_empty() {
            tracing::warn!("no certificates available for the pdf");
        } else {
            pdf::write_pdf(&pages, pdf_path)?;
            report.push(format!("pdf\t{}", pdf_path.display()));
        }
    }

    let summary = BatchSummary::from_entries(&entries);
    report.push(format!(
        "{} written, {} skipped, {} failed",
        summary.written, summary.skipped, summary.failed
    ));
    Ok(report.join("\n"))
}

fn collect_names(config: &Config, input: Option<&str>) -> Result<Vec<String>> {
    let mut names = Vec::new();
    if let Some(text) = config.names.as_deref() {
        names.extend(names::parse_manual_names(text));
    }
    if let Some(path) = config.csv.as_deref() {
        let file = File::open(path)
            .with_context(|| format!("failed to open csv: {}", path.display()))?;
        let from_csv = names::read_csv_names(file)
            .with_context(|| format!("failed to read csv: {}", path.display()))?;
        if from_csv.is_empty() {
            tracing::warn!(path = %path.display(), "csv contained no names");
        }
        names.extend(from_csv);
    }
    if config.names.is_none() && config.csv.is_none() {
        if let Some(text) = input {
            names.extend(names::parse_manual_names(text));
        }
    }
    Ok(names)
}

fn format_font_list(registry: &FontRegistry) -> String {
    registry
        .names()
        .map(|name| {
            let path = registry
                .get(name)
                .map(|font| font.path.display().to_string())
                .unwrap_or_default();
            if name == registry.default_name() {
                format!("{}\t{}\t(default)", name, path)
            } else {
                format!("{}\t{}", name, path)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_entries(entries: &[BatchEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| match &entry.outcome {
            BatchOutcome::Written(path) => format!("written\t{}", path.display()),
            BatchOutcome::SkippedExisting(path) => format!("skipped\t{}", path.display()),
            BatchOutcome::Failed(reason) => format!("failed\t{}\t{}", entry.name, reason),
        })
        .collect()
}

/// Certificates on disk after the batch, each file once, in input order.
fn pdf_pages(entries: &[BatchEntry]) -> Vec<PathBuf> {
    let mut pages: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let path = match &entry.outcome {
            BatchOutcome::Written(path) | BatchOutcome::SkippedExisting(path) => path,
            BatchOutcome::Failed(_) => continue,
        };
        if !pages.contains(path) {
            pages.push(path.clone());
        }
    }
    pages
}
