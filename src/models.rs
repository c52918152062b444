use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const BACKLOG_SPRINT: &str = "Backlog";
pub const NO_EPIC: &str = "No Epic";

/// Logical column of the canonical table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    IssueKey,
    StoryPoints,
    Status,
    Sprint,
    Epic,
    Assignee,
    Priority,
    IssueType,
    Created,
    DueDate,
}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Field::IssueKey => "issue_key",
            Field::StoryPoints => "story_points",
            Field::Status => "status",
            Field::Sprint => "sprint",
            Field::Epic => "epic",
            Field::Assignee => "assignee",
            Field::Priority => "priority",
            Field::IssueType => "issue_type",
            Field::Created => "created",
            Field::DueDate => "due_date",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalRecord {
    pub issue_key: String,
    pub story_points: f64,
    pub status: Option<String>,
    pub sprint: String,
    pub epic: String,
    pub assignee: Option<String>,
    pub priority: Option<String>,
    pub issue_type: Option<String>,
    pub created: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
}

impl CanonicalRecord {
    pub fn status_in(&self, statuses: &BTreeSet<String>) -> bool {
        self.status
            .as_deref()
            .is_some_and(|status| statuses.contains(status))
    }
}

/// Normalized issues plus the logical fields the source file carried.
///
/// A field is present when some raw header mapped to it, even if every value
/// in that column was blank.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalTable {
    records: Vec<CanonicalRecord>,
    fields: BTreeSet<Field>,
}

impl CanonicalTable {
    pub fn new(records: Vec<CanonicalRecord>, fields: BTreeSet<Field>) -> Self {
        Self { records, fields }
    }

    pub fn records(&self) -> &[CanonicalRecord] {
        &self.records
    }

    pub fn fields(&self) -> &BTreeSet<Field> {
        &self.fields
    }

    pub fn has_field(&self, field: Field) -> bool {
        self.fields.contains(&field)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns a new table holding only the rows of `sprint`.
    pub fn filter_by_sprint(&self, sprint: &str) -> CanonicalTable {
        CanonicalTable {
            records: self
                .records
                .iter()
                .filter(|record| record.sprint == sprint)
                .cloned()
                .collect(),
            fields: self.fields.clone(),
        }
    }

    /// Sprint names in first-seen order.
    pub fn sprints(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut sprints = Vec::new();
        for record in &self.records {
            if seen.insert(record.sprint.as_str()) {
                sprints.push(record.sprint.clone());
            }
        }
        sprints
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BasicMetrics {
    pub total: usize,
    pub completed: usize,
    pub total_points: f64,
    pub completion_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SprintMetrics {
    pub average_velocity: f64,
    pub completion_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpicProgress {
    pub total_points: f64,
    pub completion_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpicDistribution {
    pub total_points: f64,
    pub issue_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SprintHealth {
    pub total_points: f64,
    pub completed_points: f64,
    pub completion_percentage: f64,
    pub scope_change_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BurndownPoint {
    pub date: NaiveDate,
    pub cumulative_points: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssigneeLoad {
    pub assignee: String,
    pub story_points: f64,
}

/// Row label, then status, then value.
pub type StatusMatrix<V> = BTreeMap<String, BTreeMap<String, V>>;

/// Row-level problems absorbed during normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DataQuality {
    pub rows_read: usize,
    pub rows_kept: usize,
    pub dropped_missing_key: usize,
    pub unparsable_dates: usize,
    pub non_numeric_points: usize,
    pub negative_points: usize,
    pub due_before_created: usize,
    pub unmapped_headers: Vec<String>,
    pub completeness: BTreeMap<Field, f64>,
}

impl DataQuality {
    pub fn issue_count(&self) -> usize {
        self.dropped_missing_key
            + self.unparsable_dates
            + self.non_numeric_points
            + self.negative_points
            + self.due_before_created
    }
}

/// Every metric computed once from a table. Members that depend on a missing
/// dimension are `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsBundle {
    pub basic: Option<BasicMetrics>,
    pub average_story_points: f64,
    pub status_distribution: Option<BTreeMap<String, usize>>,
    pub sprint_velocity: Option<BTreeMap<String, f64>>,
    pub sprint_metrics: Option<SprintMetrics>,
    pub sprint_completion_rates: Option<BTreeMap<String, f64>>,
    pub epic_progress: Option<BTreeMap<String, EpicProgress>>,
    pub epic_distribution: Option<BTreeMap<String, EpicDistribution>>,
    pub team_workload: Option<Vec<AssigneeLoad>>,
    pub team_velocity: Option<BTreeMap<String, BTreeMap<String, f64>>>,
    pub cycle_time: Option<BTreeMap<String, f64>>,
    pub priority_status: Option<StatusMatrix<usize>>,
    pub priority_points: Option<StatusMatrix<f64>>,
    pub epic_status: Option<StatusMatrix<usize>>,
    pub issue_types: Option<BTreeMap<String, usize>>,
    pub defect_rate: Option<f64>,
    pub defect_trend: Option<BTreeMap<String, usize>>,
}
