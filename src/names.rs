use anyhow::{Context, Result};
use std::io::Read;

const NAME_COLUMN: &str = "name";

/// Splits pasted recipient names.
///
/// Text containing a comma is treated as comma separated, anything else as
/// one name per line.
pub fn parse_manual_names(text: &str) -> Vec<String> {
    let parts: Vec<&str> = if text.contains(',') {
        text.split(',').collect()
    } else {
        text.lines().collect()
    };
    parts
        .into_iter()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Values of the `name` column of a headed CSV file.
///
/// A file without that column yields no names.
pub fn read_csv_names<R: Read>(reader: R) -> Result<Vec<String>> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = csv.headers().with_context(|| "failed to read csv header")?;
    let Some(column) = headers
        .iter()
        .position(|header| header.trim_start_matches('\u{feff}') == NAME_COLUMN)
    else {
        tracing::warn!(
            headers = ?headers.iter().collect::<Vec<_>>(),
            "csv has no '{}' column",
            NAME_COLUMN
        );
        return Ok(Vec::new());
    };

    let mut names = Vec::new();
    for (index, record) in csv.records().enumerate() {
        let record = record.with_context(|| format!("failed to read csv row {}", index + 2))?;
        if let Some(name) = record.get(column).map(str::trim) {
            if !name.is_empty() {
                names.push(name.to_string());
            }
        }
    }
    Ok(names)
}

/// File name a certificate for `name` is written to.
pub fn output_file_name(name: &str) -> String {
    let stem: String = name
        .trim()
        .chars()
        .map(|ch| match ch {
            ' ' | '/' | '\\' => '_',
            other => other,
        })
        .collect();
    format!("{}.png", stem)
}
