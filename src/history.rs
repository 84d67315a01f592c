//! Two-column historical record loader: `timestamp,state-label` per line.
//!
//! This is the ingestion boundary. Lines are split and timestamps parsed
//! here; state labels stay raw strings and are validated against the closed
//! alphabet by `StateSeries::build`.

use std::path::Path;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("failed to read history file: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse history line {line}: {reason}")]
    Parse { line: usize, reason: String },
}

/// Loads `(timestamp, raw label)` records. A leading `timestamp,...` header
/// line is tolerated; blank lines are skipped.
pub fn load_from_path(
    path: impl AsRef<Path>,
) -> Result<Vec<(OffsetDateTime, String)>, HistoryError> {
    let contents = std::fs::read_to_string(path)?;
    parse(&contents)
}

fn parse(contents: &str) -> Result<Vec<(OffsetDateTime, String)>, HistoryError> {
    let mut records = Vec::new();
    for (index, raw_line) in contents.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((timestamp_field, label_field)) = line.split_once(',') else {
            return Err(HistoryError::Parse {
                line: index + 1,
                reason: "expected two comma-separated columns".to_string(),
            });
        };
        let timestamp_field = timestamp_field.trim();
        if index == 0 && timestamp_field.eq_ignore_ascii_case("timestamp") {
            continue;
        }
        let timestamp =
            OffsetDateTime::parse(timestamp_field, &Rfc3339).map_err(|e| {
                HistoryError::Parse {
                    line: index + 1,
                    reason: format!("bad timestamp {timestamp_field:?}: {e}"),
                }
            })?;
        records.push((timestamp, label_field.trim().to_string()));
    }
    Ok(records)
}
