use anyhow::{Context, Result, anyhow};
use image::DynamicImage;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::compose::{CertificateComposer, Inpainter, RenderRequest, Typesetter};
use crate::fonts::FontSpec;
use crate::names::output_file_name;
use crate::placeholder::PlaceholderMatch;

/// Shared inputs of one batch run.
#[derive(Clone, Copy)]
pub struct BatchJob<'a> {
    pub template: &'a DynamicImage,
    pub placeholder: Option<&'a PlaceholderMatch>,
    pub font: &'a FontSpec,
    pub output_dir: &'a Path,
    pub overwrite: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    Written(PathBuf),
    SkippedExisting(PathBuf),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntry {
    pub name: String,
    pub outcome: BatchOutcome,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn from_entries(entries: &[BatchEntry]) -> Self {
        let mut summary = Self::default();
        for entry in entries {
            match entry.outcome {
                BatchOutcome::Written(_) => summary.written += 1,
                BatchOutcome::SkippedExisting(_) => summary.skipped += 1,
                BatchOutcome::Failed(_) => summary.failed += 1,
            }
        }
        summary
    }
}

/// Renders one certificate per name into `job.output_dir`.
///
/// Entries come back in input order. A failing name is recorded and the rest
/// of the batch carries on.
pub fn generate_batch<I, T>(
    composer: &CertificateComposer<I, T>,
    job: &BatchJob<'_>,
    names: &[String],
) -> Result<Vec<BatchEntry>>
where
    I: Inpainter,
    T: Typesetter,
{
    fs::create_dir_all(job.output_dir).with_context(|| {
        format!(
            "failed to create output directory: {}",
            job.output_dir.display()
        )
    })?;

    let mut first_index: HashMap<PathBuf, usize> = HashMap::new();
    let tasks: Vec<Task> = names
        .iter()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .enumerate()
        .map(|(index, name)| {
            let path = job.output_dir.join(output_file_name(name));
            let duplicate_of = match first_index.get(&path) {
                Some(first) => Some(*first),
                None => {
                    first_index.insert(path.clone(), index);
                    None
                }
            };
            Task {
                name: name.to_string(),
                path,
                duplicate_of,
            }
        })
        .collect();
    if tasks.is_empty() {
        return Ok(Vec::new());
    }

    let workers = num_cpus::get().clamp(1, tasks.len());
    let chunk_size = tasks.len().div_ceil(workers);
    tracing::info!(
        names = tasks.len(),
        workers,
        placeholder = job.placeholder.is_some(),
        "generating certificates"
    );

    let rendered = std::thread::scope(|scope| -> Result<Vec<BatchOutcome>> {
        let handles: Vec<_> = tasks
            .chunks(chunk_size)
            .map(|chunk| {
                scope.spawn(move || {
                    chunk
                        .iter()
                        .filter(|task| task.duplicate_of.is_none())
                        .map(|task| render_one(composer, job, &task.name, &task.path))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut outcomes = Vec::with_capacity(tasks.len());
        for handle in handles {
            let chunk = handle
                .join()
                .map_err(|_| anyhow!("certificate worker panicked"))?;
            outcomes.extend(chunk);
        }
        Ok(outcomes)
    })?;

    let mut rendered = rendered.into_iter();
    let mut entries: Vec<BatchEntry> = Vec::with_capacity(tasks.len());
    for task in tasks {
        let outcome = match task.duplicate_of {
            Some(first) => duplicate_outcome(&entries[first], &task.path),
            None => rendered
                .next()
                .ok_or_else(|| anyhow!("missing outcome for {}", task.name))?,
        };
        entries.push(BatchEntry {
            name: task.name,
            outcome,
        });
    }
    Ok(entries)
}

struct Task {
    name: String,
    path: PathBuf,
    /// Index of the earlier name that maps to the same file.
    duplicate_of: Option<usize>,
}

/// A repeated output file is only skipped when the first render left it on
/// disk; otherwise the repeat shares the first failure.
fn duplicate_outcome(first: &BatchEntry, path: &Path) -> BatchOutcome {
    tracing::debug!(name = %first.name, path = %path.display(), "duplicate output name");
    match &first.outcome {
        BatchOutcome::Written(_) | BatchOutcome::SkippedExisting(_) => {
            BatchOutcome::SkippedExisting(path.to_path_buf())
        }
        BatchOutcome::Failed(reason) => BatchOutcome::Failed(reason.clone()),
    }
}

fn render_one<I, T>(
    composer: &CertificateComposer<I, T>,
    job: &BatchJob<'_>,
    name: &str,
    path: &Path,
) -> BatchOutcome
where
    I: Inpainter,
    T: Typesetter,
{
    if !job.overwrite && path.exists() {
        tracing::debug!(name, path = %path.display(), "output exists, skipping");
        return BatchOutcome::SkippedExisting(path.to_path_buf());
    }

    let request = RenderRequest {
        template: job.template,
        name,
        placeholder: job.placeholder,
        font: job.font,
    };
    let image = match composer.compose(&request) {
        Ok(image) => image,
        Err(err) => {
            tracing::warn!(name, error = %err, "certificate failed");
            return BatchOutcome::Failed(err.to_string());
        }
    };
    match image.save(path) {
        Ok(()) => BatchOutcome::Written(path.to_path_buf()),
        Err(err) => {
            tracing::warn!(name, path = %path.display(), error = %err, "failed to write certificate");
            BatchOutcome::Failed(format!("failed to write {}: {}", path.display(), err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::BoundingBox;
    use crate::test_util::{BlockTypesetter, FlatFill};
    use image::{Rgb, RgbImage};
    use tempfile::tempdir;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|name| name.to_string()).collect()
    }

    fn template() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(320, 200, Rgb([250, 250, 250])))
    }

    #[test]
    fn writes_one_png_per_name_in_order() {
        let dir = tempdir().expect("tempdir");
        let template = template();
        let found = PlaceholderMatch {
            matched_text: "NAME".to_string(),
            bbox: BoundingBox::new(100, 80, 120, 40),
        };
        let font = FontSpec::new("Great Vibes", "unused.ttf");
        let composer = CertificateComposer::new(FlatFill, BlockTypesetter::default());
        let job = BatchJob {
            template: &template,
            placeholder: Some(&found),
            font: &font,
            output_dir: dir.path(),
            overwrite: false,
        };

        let entries =
            generate_batch(&composer, &job, &names(&["Alice Smith", "  ", "Bob"])).expect("batch");
        assert_eq!(
            entries,
            vec![
                BatchEntry {
                    name: "Alice Smith".to_string(),
                    outcome: BatchOutcome::Written(dir.path().join("Alice_Smith.png")),
                },
                BatchEntry {
                    name: "Bob".to_string(),
                    outcome: BatchOutcome::Written(dir.path().join("Bob.png")),
                },
            ]
        );
        let written = image::open(dir.path().join("Bob.png")).expect("open png");
        assert_eq!((written.width(), written.height()), (320, 200));
    }

    #[test]
    fn existing_files_are_skipped_unless_overwriting() {
        let dir = tempdir().expect("tempdir");
        let existing = dir.path().join("Carol.png");
        fs::write(&existing, b"old").expect("seed file");
        let template = template();
        let font = FontSpec::new("Great Vibes", "unused.ttf");
        let composer = CertificateComposer::new(FlatFill, BlockTypesetter::default());
        let mut job = BatchJob {
            template: &template,
            placeholder: None,
            font: &font,
            output_dir: dir.path(),
            overwrite: false,
        };

        let entries = generate_batch(&composer, &job, &names(&["Carol"])).expect("batch");
        assert_eq!(entries[0].outcome, BatchOutcome::SkippedExisting(existing.clone()));
        assert_eq!(fs::read(&existing).expect("read"), b"old");

        job.overwrite = true;
        let entries = generate_batch(&composer, &job, &names(&["Carol"])).expect("batch");
        assert_eq!(entries[0].outcome, BatchOutcome::Written(existing.clone()));
        assert!(image::open(&existing).is_ok());
    }

    #[test]
    fn one_failure_does_not_stop_the_batch() {
        let dir = tempdir().expect("tempdir");
        let template = template();
        let font = FontSpec::new("Great Vibes", "unused.ttf");
        let typesetter = BlockTypesetter {
            failing_names: vec!["Broken".to_string()],
            ..Default::default()
        };
        let composer = CertificateComposer::new(FlatFill, typesetter);
        let job = BatchJob {
            template: &template,
            placeholder: None,
            font: &font,
            output_dir: dir.path(),
            overwrite: true,
        };

        let entries =
            generate_batch(&composer, &job, &names(&["Ann", "Broken", "Dan", "Ann"])).expect("batch");
        assert!(matches!(&entries[1].outcome, BatchOutcome::Failed(reason) if reason.contains("Broken")));
        assert_eq!(
            BatchSummary::from_entries(&entries),
            BatchSummary {
                written: 2,
                skipped: 1,
                failed: 1,
            }
        );
        assert!(!dir.path().join("Broken.png").exists());
    }

    #[test]
    fn repeated_name_shares_the_first_failure() {
        let dir = tempdir().expect("tempdir");
        let template = template();
        let font = FontSpec::new("Great Vibes", "unused.ttf");
        let typesetter = BlockTypesetter {
            failing_names: vec!["Broken".to_string()],
            ..Default::default()
        };
        let composer = CertificateComposer::new(FlatFill, typesetter);
        let job = BatchJob {
            template: &template,
            placeholder: None,
            font: &font,
            output_dir: dir.path(),
            overwrite: false,
        };

        let entries =
            generate_batch(&composer, &job, &names(&["Broken", "Ann", "Broken"])).expect("batch");
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].outcome, entries[2].outcome);
        assert!(matches!(&entries[2].outcome, BatchOutcome::Failed(reason) if reason.contains("Broken")));
        assert_eq!(
            BatchSummary::from_entries(&entries),
            BatchSummary {
                written: 1,
                skipped: 0,
                failed: 2,
            }
        );
        assert!(!dir.path().join("Broken.png").exists());
    }

    #[test]
    fn repeated_name_is_skipped_after_existing_file() {
        let dir = tempdir().expect("tempdir");
        let existing = dir.path().join("Carol.png");
        fs::write(&existing, b"old").expect("seed file");
        let template = template();
        let font = FontSpec::new("Great Vibes", "unused.ttf");
        let composer = CertificateComposer::new(FlatFill, BlockTypesetter::default());
        let job = BatchJob {
            template: &template,
            placeholder: None,
            font: &font,
            output_dir: dir.path(),
            overwrite: false,
        };

        let entries = generate_batch(&composer, &job, &names(&["Carol", "Carol"])).expect("batch");
        assert_eq!(
            entries.iter().map(|entry| &entry.outcome).collect::<Vec<_>>(),
            vec![
                &BatchOutcome::SkippedExisting(existing.clone()),
                &BatchOutcome::SkippedExisting(existing.clone()),
            ]
        );
    }
}
