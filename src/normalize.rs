//! Header alias resolution and per-row value coercion.
//!
//! Nothing in here fails: malformed cells degrade to sentinels or nulls and
//! rows without an issue key are dropped. What was absorbed is tallied in
//! [`DataQuality`] for the caller to log.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use crate::models::{
    CanonicalRecord, CanonicalTable, DataQuality, Field, BACKLOG_SPRINT, NO_EPIC,
};

const HEADER_ALIASES: &[(&str, Field)] = &[
    ("issue key", Field::IssueKey),
    ("issue_key", Field::IssueKey),
    ("story points", Field::StoryPoints),
    ("points", Field::StoryPoints),
    ("storypoints", Field::StoryPoints),
    ("story_points", Field::StoryPoints),
    ("issue_type", Field::IssueType),
    ("issue type", Field::IssueType),
    ("epic_link", Field::Epic),
    ("epic link", Field::Epic),
    ("epic", Field::Epic),
    ("status", Field::Status),
    ("sprint", Field::Sprint),
    ("created", Field::Created),
    ("created_date", Field::Created),
    ("due date", Field::DueDate),
    ("due_date", Field::DueDate),
    ("priority", Field::Priority),
    ("assignee", Field::Assignee),
];

/// Day/month/year first, ISO as the fallback.
const DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%Y-%m-%d"];

/// Rows as read from a CSV file, positional against `headers`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }
}

/// Two raw headers that resolved to the same logical field. The first one
/// (in header order) is the one whose values were used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderCollision {
    pub field: Field,
    pub kept: String,
    pub ignored: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub table: CanonicalTable,
    pub quality: DataQuality,
    pub collisions: Vec<HeaderCollision>,
}

/// Column positions of every resolved logical field.
#[derive(Debug, Default)]
struct HeaderMap {
    columns: BTreeMap<Field, usize>,
    collisions: Vec<HeaderCollision>,
    unmapped: Vec<String>,
}

impl HeaderMap {
    fn resolve(headers: &[String]) -> Self {
        let mut map = HeaderMap::default();
        for (index, raw) in headers.iter().enumerate() {
            let header = raw.trim();
            let Some(field) = resolve_header(header) else {
                map.unmapped.push(header.to_string());
                continue;
            };

            match map.columns.get(&field) {
                Some(&kept) => map.collisions.push(HeaderCollision {
                    field,
                    kept: headers[kept].trim().to_string(),
                    ignored: header.to_string(),
                }),
                None => {
                    map.columns.insert(field, index);
                }
            }
        }
        map
    }

    fn cell<'a>(&self, row: &'a [String], field: Field) -> Option<&'a str> {
        let index = *self.columns.get(&field)?;
        row.get(index)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }
}

/// Maps one raw header to its logical field, ignoring case and surrounding
/// whitespace.
pub fn resolve_header(header: &str) -> Option<Field> {
    let key = header.trim().to_lowercase();
    HEADER_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, field)| *field)
}

/// Parses a date in any accepted format. A trailing time component
/// (`2024-01-15 09:30` or `2024-01-15T09:30:00`) is ignored.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    let day_part = value
        .split(|c: char| c == 'T' || c.is_whitespace())
        .next()
        .unwrap_or(value);

    [value, day_part].iter().find_map(|candidate| {
        DATE_FORMATS
            .iter()
            .find_map(|format| NaiveDate::parse_from_str(candidate, format).ok())
    })
}

/// Parses a story-point estimate. `None` when the text is not a finite
/// number.
pub fn parse_points(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|points| points.is_finite())
}

pub fn normalize(raw: &RawTable) -> Normalized {
    let headers = HeaderMap::resolve(&raw.headers);
    let mut quality = DataQuality {
        rows_read: raw.rows.len(),
        unmapped_headers: headers.unmapped.clone(),
        ..DataQuality::default()
    };
    let mut filled: BTreeMap<Field, usize> = BTreeMap::new();
    let mut records = Vec::with_capacity(raw.rows.len());

    for row in &raw.rows {
        let Some(issue_key) = headers.cell(row, Field::IssueKey) else {
            quality.dropped_missing_key += 1;
            continue;
        };

        for field in headers.columns.keys() {
            if headers.cell(row, *field).is_some() {
                *filled.entry(*field).or_default() += 1;
            }
        }

        let story_points = match headers.cell(row, Field::StoryPoints) {
            None => 0.0,
            Some(text) => match parse_points(text) {
                Some(points) if points < 0.0 => {
                    quality.negative_points += 1;
                    0.0
                }
                Some(points) => points,
                None => {
                    quality.non_numeric_points += 1;
                    0.0
                }
            },
        };

        let mut date = |field: Field| {
            let text = headers.cell(row, field)?;
            let parsed = parse_date(text);
            if parsed.is_none() {
                quality.unparsable_dates += 1;
            }
            parsed
        };
        let created = date(Field::Created);
        let due_date = date(Field::DueDate);

        if let (Some(created), Some(due)) = (created, due_date) {
            if due < created {
                quality.due_before_created += 1;
            }
        }

        let text = |field: Field| headers.cell(row, field).map(str::to_string);
        records.push(CanonicalRecord {
            issue_key: issue_key.to_string(),
            story_points,
            status: text(Field::Status),
            sprint: text(Field::Sprint).unwrap_or_else(|| BACKLOG_SPRINT.to_string()),
            epic: text(Field::Epic).unwrap_or_else(|| NO_EPIC.to_string()),
            assignee: text(Field::Assignee),
            priority: text(Field::Priority),
            issue_type: text(Field::IssueType),
            created,
            due_date,
        });
    }

    quality.rows_kept = records.len();
    if !records.is_empty() {
        quality.completeness = headers
            .columns
            .keys()
            .map(|field| {
                let count = filled.get(field).copied().unwrap_or(0);
                (*field, count as f64 / records.len() as f64)
            })
            .collect();
    }

    let fields: BTreeSet<Field> = headers.columns.keys().copied().collect();
    Normalized {
        table: CanonicalTable::new(records, fields),
        quality,
        collisions: headers.collisions,
    }
}

/// Logical fields from `required` that no raw header mapped to.
pub fn missing_fields(table: &CanonicalTable, required: &[Field]) -> Vec<Field> {
    required
        .iter()
        .copied()
        .filter(|field| !table.has_field(*field))
        .collect()
}

pub fn validate_required_fields(table: &CanonicalTable, required: &[Field]) -> bool {
    missing_fields(table, required).is_empty()
}
