use std::io::Read;
use std::path::Path;

use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::IngestError;
use crate::metrics::MetricsEngine;
use crate::models::{CanonicalTable, DataQuality};
use crate::normalize::{self, RawTable};

/// One loaded export. Owned by the caller and handed to the metrics engine
/// by reference; it is never modified after loading.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub source: String,
    pub table: CanonicalTable,
    pub quality: DataQuality,
}

impl Session {
    pub fn engine<'a>(&'a self, config: &'a Config) -> MetricsEngine<'a> {
        MetricsEngine::new(&self.table, config)
    }
}

pub fn read_raw<R: Read>(input: R) -> Result<RawTable, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(input);

    let headers = reader
        .headers()?
        .iter()
        .map(|header| header.trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        rows.push(record.iter().map(String::from).collect());
    }

    Ok(RawTable::new(headers, rows))
}

pub fn load_session(path: &Path, config: &Config) -> Result<Session, IngestError> {
    let file = std::fs::File::open(path)?;
    load_session_from_reader(file, &path.display().to_string(), config)
}

/// Reads, normalizes and validates one CSV export. No session is produced
/// when the file is unreadable or lacks a required field.
pub fn load_session_from_reader<R: Read>(
    input: R,
    source: &str,
    config: &Config,
) -> Result<Session, IngestError> {
    let id = Uuid::new_v4();
    let span = info_span!("session", %id, source);
    let _guard = span.enter();

    let raw = read_raw(input)?;
    debug!(headers = ?raw.headers, "read CSV header");

    let normalized = normalize::normalize(&raw);
    for collision in &normalized.collisions {
        warn!(
            field = %collision.field,
            kept = %collision.kept,
            ignored = %collision.ignored,
            "duplicate column for field"
        );
    }
    if config.strict_headers {
        if let Some(collision) = normalized.collisions.first() {
            return Err(IngestError::HeaderCollision {
                field: collision.field,
                first: collision.kept.clone(),
                second: collision.ignored.clone(),
            });
        }
    }

    if !normalize::validate_required_fields(&normalized.table, &config.required_fields) {
        return Err(IngestError::Schema {
            missing: normalize::missing_fields(&normalized.table, &config.required_fields),
        });
    }

    log_quality(&normalized.quality);
    info!(
        rows_read = normalized.quality.rows_read,
        rows_kept = normalized.quality.rows_kept,
        "data loaded"
    );

    Ok(Session {
        id,
        source: source.to_string(),
        table: normalized.table,
        quality: normalized.quality,
    })
}

fn log_quality(quality: &DataQuality) {
    if !quality.unmapped_headers.is_empty() {
        debug!(headers = ?quality.unmapped_headers, "ignoring unrecognized columns");
    }
    if quality.issue_count() == 0 {
        return;
    }
    warn!(
        dropped_missing_key = quality.dropped_missing_key,
        unparsable_dates = quality.unparsable_dates,
        non_numeric_points = quality.non_numeric_points,
        negative_points = quality.negative_points,
        due_before_created = quality.due_before_created,
        "data quality issues absorbed during normalization"
    );
}
