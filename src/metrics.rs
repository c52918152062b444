use std::collections::{BTreeMap, BTreeSet};
use std::ops::AddAssign;

use chrono::NaiveDate;

use crate::config::Config;
use crate::error::MetricsError;
use crate::models::{
    AssigneeLoad, BasicMetrics, BurndownPoint, CanonicalRecord, CanonicalTable,
    EpicDistribution, EpicProgress, Field, MetricsBundle, SprintHealth, SprintMetrics,
    StatusMatrix,
};

pub type MetricsResult<T> = Result<T, MetricsError>;

/// Read-only view over a canonical table. Every call recomputes from the
/// rows; nothing is cached.
#[derive(Debug, Clone, Copy)]
pub struct MetricsEngine<'a> {
    table: &'a CanonicalTable,
    terminal_statuses: &'a BTreeSet<String>,
    defect_types: &'a BTreeSet<String>,
}

impl<'a> MetricsEngine<'a> {
    pub fn new(table: &'a CanonicalTable, config: &'a Config) -> Self {
        Self {
            table,
            terminal_statuses: &config.terminal_statuses,
            defect_types: &config.defect_types,
        }
    }

    /// Same status and defect settings over another table.
    pub fn with_table<'b>(&self, table: &'b CanonicalTable) -> MetricsEngine<'b>
    where
        'a: 'b,
    {
        MetricsEngine {
            table,
            terminal_statuses: self.terminal_statuses,
            defect_types: self.defect_types,
        }
    }

    fn require(&self, fields: &[Field]) -> MetricsResult<()> {
        match fields.iter().find(|field| !self.table.has_field(**field)) {
            Some(field) => Err(MetricsError::MissingDimension(*field)),
            None => Ok(()),
        }
    }

    fn is_complete(&self, record: &CanonicalRecord) -> bool {
        record.status_in(self.terminal_statuses)
    }

    fn is_defect(&self, record: &CanonicalRecord) -> bool {
        record
            .issue_type
            .as_deref()
            .is_some_and(|kind| self.defect_types.contains(&kind.to_lowercase()))
    }

    fn records(&self) -> &'a [CanonicalRecord] {
        self.table.records()
    }

    pub fn basic_metrics(&self) -> MetricsResult<BasicMetrics> {
        self.require(&[Field::Status])?;
        let total = self.records().len();
        let completed = self
            .records()
            .iter()
            .filter(|record| self.is_complete(record))
            .count();
        let total_points = self.records().iter().map(|r| r.story_points).sum();

        Ok(BasicMetrics {
            total,
            completed,
            total_points,
            completion_rate: ratio(completed, total),
        })
    }

    pub fn average_story_points(&self) -> f64 {
        let records = self.records();
        if records.is_empty() {
            return 0.0;
        }
        records.iter().map(|r| r.story_points).sum::<f64>() / records.len() as f64
    }

    pub fn status_distribution(&self) -> MetricsResult<BTreeMap<String, usize>> {
        self.require(&[Field::Status])?;
        let mut counts = BTreeMap::new();
        for status in self.records().iter().filter_map(|r| r.status.as_ref()) {
            *counts.entry(status.clone()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    /// Completed story points per sprint. Sprints without a completed row
    /// do not appear.
    pub fn sprint_velocity(&self) -> MetricsResult<BTreeMap<String, f64>> {
        self.require(&[Field::Sprint, Field::Status])?;
        let mut velocity = BTreeMap::new();
        for record in self.records().iter().filter(|r| self.is_complete(r)) {
            *velocity.entry(record.sprint.clone()).or_insert(0.0) += record.story_points;
        }
        Ok(velocity)
    }

    pub fn sprint_metrics(&self) -> MetricsResult<SprintMetrics> {
        let velocity = self.sprint_velocity()?;
        let average_velocity = if velocity.is_empty() {
            0.0
        } else {
            velocity.values().sum::<f64>() / velocity.len() as f64
        };

        Ok(SprintMetrics {
            average_velocity,
            completion_rate: self.basic_metrics()?.completion_rate,
        })
    }

    /// Percentage of rows per sprint in a terminal status.
    pub fn sprint_completion_rates(&self) -> MetricsResult<BTreeMap<String, f64>> {
        self.require(&[Field::Sprint, Field::Status])?;
        let tallies = self.tally_by(|record| Some(record.sprint.as_str()));
        Ok(tallies
            .into_iter()
            .map(|(sprint, (done, total))| (sprint, 100.0 * ratio(done, total)))
            .collect())
    }

    pub fn epic_progress(&self) -> MetricsResult<BTreeMap<String, EpicProgress>> {
        self.require(&[Field::Epic, Field::Status])?;
        let points = self.points_by(|record| Some(record.epic.as_str()));
        let tallies = self.tally_by(|record| Some(record.epic.as_str()));

        Ok(tallies
            .into_iter()
            .map(|(epic, (done, total))| {
                let total_points = points.get(&epic).copied().unwrap_or(0.0);
                (
                    epic,
                    EpicProgress {
                        total_points,
                        completion_percentage: 100.0 * ratio(done, total),
                    },
                )
            })
            .collect())
    }

    pub fn epic_distribution(&self) -> MetricsResult<BTreeMap<String, EpicDistribution>> {
        self.require(&[Field::Epic])?;
        let mut distribution: BTreeMap<String, EpicDistribution> = BTreeMap::new();
        for record in self.records() {
            let entry = distribution
                .entry(record.epic.clone())
                .or_insert(EpicDistribution {
                    total_points: 0.0,
                    issue_count: 0,
                });
            entry.total_points += record.story_points;
            entry.issue_count += 1;
        }
        Ok(distribution)
    }

    /// Story points per assignee, lightest load first. Unassigned rows are
    /// left out.
    pub fn team_workload(&self) -> MetricsResult<Vec<AssigneeLoad>> {
        self.require(&[Field::Assignee])?;
        let mut loads: Vec<AssigneeLoad> = self
            .points_by(|record| record.assignee.as_deref())
            .into_iter()
            .map(|(assignee, story_points)| AssigneeLoad {
                assignee,
                story_points,
            })
            .collect();

        loads.sort_by(|a, b| {
            a.story_points
                .partial_cmp(&b.story_points)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.assignee.cmp(&b.assignee))
        });
        Ok(loads)
    }

    /// Mean days from creation to due date per epic, over completed rows
    /// carrying both dates.
    pub fn cycle_time(&self) -> MetricsResult<BTreeMap<String, f64>> {
        self.require(&[Field::Epic, Field::Created, Field::DueDate, Field::Status])?;
        let mut spans: BTreeMap<String, (i64, usize)> = BTreeMap::new();

        for record in self.records().iter().filter(|r| self.is_complete(r)) {
            let (Some(created), Some(due)) = (record.created, record.due_date) else {
                continue;
            };
            let entry = spans.entry(record.epic.clone()).or_insert((0, 0));
            entry.0 += (due - created).num_days();
            entry.1 += 1;
        }

        Ok(spans
            .into_iter()
            .map(|(epic, (days, count))| (epic, days as f64 / count as f64))
            .collect())
    }

    /// Issue counts by priority then status.
    pub fn priority_status_matrix(&self) -> MetricsResult<StatusMatrix<usize>> {
        self.require(&[Field::Priority, Field::Status])?;
        Ok(self.status_matrix(
            self.records().iter(),
            |record| record.priority.as_deref(),
            |_| 1,
        ))
    }

    /// Story points by priority then status.
    pub fn priority_points_matrix(&self) -> MetricsResult<StatusMatrix<f64>> {
        self.require(&[Field::Priority, Field::Status])?;
        Ok(self.status_matrix(
            self.records().iter(),
            |record| record.priority.as_deref(),
            |record| record.story_points,
        ))
    }

    /// Issue counts by epic then status, limited to the given sprints and
    /// epics. An empty filter keeps every row.
    pub fn epic_status_matrix(
        &self,
        sprints: &[String],
        epics: &[String],
    ) -> MetricsResult<StatusMatrix<usize>> {
        self.require(&[Field::Epic, Field::Status])?;
        if !sprints.is_empty() {
            self.require(&[Field::Sprint])?;
        }

        let rows = self.records().iter().filter(|record| {
            (sprints.is_empty() || sprints.contains(&record.sprint))
                && (epics.is_empty() || epics.contains(&record.epic))
        });
        Ok(self.status_matrix(rows, |record| Some(record.epic.as_str()), |_| 1))
    }

    /// Completed story points per sprint, split by assignee.
    pub fn team_velocity(&self) -> MetricsResult<BTreeMap<String, BTreeMap<String, f64>>> {
        self.require(&[Field::Sprint, Field::Assignee, Field::Status])?;
        let mut velocity: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
        for record in self.records().iter().filter(|r| self.is_complete(r)) {
            let Some(assignee) = record.assignee.as_ref() else {
                continue;
            };
            *velocity
                .entry(record.sprint.clone())
                .or_default()
                .entry(assignee.clone())
                .or_insert(0.0) += record.story_points;
        }
        Ok(velocity)
    }

    /// Health of one sprint. A sprint with no rows reports all zeros.
    pub fn sprint_health(&self, sprint: &str) -> MetricsResult<SprintHealth> {
        self.require(&[Field::Sprint, Field::Status])?;
        let rows: Vec<&CanonicalRecord> = self
            .records()
            .iter()
            .filter(|r| r.sprint == sprint)
            .collect();

        let total_points: f64 = rows.iter().map(|r| r.story_points).sum();
        let completed_points: f64 = rows
            .iter()
            .filter(|r| self.is_complete(r))
            .map(|r| r.story_points)
            .sum();
        let sprint_start = rows.iter().filter_map(|r| r.created).min();
        let scope_change_count = match sprint_start {
            Some(start) => rows
                .iter()
                .filter(|r| r.created.is_some_and(|created| created > start))
                .count(),
            None => 0,
        };

        Ok(SprintHealth {
            total_points,
            completed_points,
            completion_percentage: if total_points > 0.0 {
                completed_points / total_points * 100.0
            } else {
                0.0
            },
            scope_change_count,
        })
    }

    /// Cumulative story points of a sprint by creation date.
    pub fn sprint_burndown(&self, sprint: &str) -> MetricsResult<Vec<BurndownPoint>> {
        self.require(&[Field::Sprint, Field::Created])?;
        let mut daily: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for record in self.records().iter().filter(|r| r.sprint == sprint) {
            if let Some(created) = record.created {
                *daily.entry(created).or_insert(0.0) += record.story_points;
            }
        }

        let mut running = 0.0;
        Ok(daily
            .into_iter()
            .map(|(date, points)| {
                running += points;
                BurndownPoint {
                    date,
                    cumulative_points: running,
                }
            })
            .collect())
    }

    pub fn issue_type_distribution(&self) -> MetricsResult<BTreeMap<String, usize>> {
        self.require(&[Field::IssueType])?;
        let mut counts = BTreeMap::new();
        for kind in self.records().iter().filter_map(|r| r.issue_type.as_ref()) {
            *counts.entry(kind.clone()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    /// Share of rows whose issue type counts as a defect.
    pub fn defect_rate(&self) -> MetricsResult<f64> {
        self.require(&[Field::IssueType])?;
        let defects = self.records().iter().filter(|r| self.is_defect(r)).count();
        Ok(ratio(defects, self.records().len()))
    }

    /// Defect rows per sprint. Sprints without defects do not appear.
    pub fn defect_trend(&self) -> MetricsResult<BTreeMap<String, usize>> {
        self.require(&[Field::IssueType, Field::Sprint])?;
        let mut counts = BTreeMap::new();
        for record in self.records().iter().filter(|r| self.is_defect(r)) {
            *counts.entry(record.sprint.clone()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    pub fn bundle(&self) -> MetricsBundle {
        MetricsBundle {
            basic: self.basic_metrics().ok(),
            average_story_points: self.average_story_points(),
            status_distribution: self.status_distribution().ok(),
            sprint_velocity: self.sprint_velocity().ok(),
            sprint_metrics: self.sprint_metrics().ok(),
            sprint_completion_rates: self.sprint_completion_rates().ok(),
            epic_progress: self.epic_progress().ok(),
            epic_distribution: self.epic_distribution().ok(),
            team_workload: self.team_workload().ok(),
            team_velocity: self.team_velocity().ok(),
            cycle_time: self.cycle_time().ok(),
            priority_status: self.priority_status_matrix().ok(),
            priority_points: self.priority_points_matrix().ok(),
            epic_status: self.epic_status_matrix(&[], &[]).ok(),
            issue_types: self.issue_type_distribution().ok(),
            defect_rate: self.defect_rate().ok(),
            defect_trend: self.defect_trend().ok(),
        }
    }

    fn points_by<F>(&self, key: F) -> BTreeMap<String, f64>
    where
        F: Fn(&'a CanonicalRecord) -> Option<&'a str>,
    {
        let mut points = BTreeMap::new();
        for record in self.records() {
            if let Some(key) = key(record) {
                *points.entry(key.to_string()).or_insert(0.0) += record.story_points;
            }
        }
        points
    }

    /// Row key by status, every row zero-filled across the statuses seen in
    /// `rows`. Rows without a key or status are skipped.
    fn status_matrix<V, K, W>(
        &self,
        rows: impl Iterator<Item = &'a CanonicalRecord>,
        key: K,
        weight: W,
    ) -> StatusMatrix<V>
    where
        V: Copy + Default + AddAssign,
        K: Fn(&'a CanonicalRecord) -> Option<&'a str>,
        W: Fn(&'a CanonicalRecord) -> V,
    {
        let cells: Vec<(&str, &str, V)> = rows
            .filter_map(|r| Some((key(r)?, r.status.as_deref()?, weight(r))))
            .collect();
        let statuses: BTreeSet<&str> = cells.iter().map(|(_, status, _)| *status).collect();

        let mut matrix = StatusMatrix::new();
        for (row, status, value) in cells {
            let line = matrix.entry(row.to_string()).or_insert_with(|| {
                statuses
                    .iter()
                    .map(|status| (status.to_string(), V::default()))
                    .collect::<BTreeMap<String, V>>()
            });
            if let Some(cell) = line.get_mut(status) {
                *cell += value;
            }
        }
        matrix
    }

    /// `(completed, total)` row counts per key.
    fn tally_by<F>(&self, key: F) -> BTreeMap<String, (usize, usize)>
    where
        F: Fn(&'a CanonicalRecord) -> Option<&'a str>,
    {
        let mut tallies: BTreeMap<String, (usize, usize)> = BTreeMap::new();
        for record in self.records() {
            if let Some(key) = key(record) {
                let entry = tallies.entry(key.to_string()).or_insert((0, 0));
                if self.is_complete(record) {
                    entry.0 += 1;
                }
                entry.1 += 1;
            }
        }
        tallies
    }
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{normalize, RawTable};

    fn table(headers: &[&str], rows: &[&[&str]]) -> CanonicalTable {
        normalize(&RawTable::new(
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|row| row.iter().map(|v| v.to_string()).collect())
                .collect(),
        ))
        .table
    }

    fn sample() -> CanonicalTable {
        table(
            &[
                "Issue key", "Story Points", "Status", "Sprint", "Epic", "Assignee", "Priority",
                "Issue Type", "Created", "Due Date",
            ],
            &[
                &[
                    "A-1", "5", "Done", "S1", "E1", "ana", "High", "Story", "01/01/2024",
                    "2024-01-05",
                ],
                &[
                    "A-2", "3", "Closed", "S1", "E1", "ben", "Low", "Bug", "03/01/2024",
                    "2024-01-13",
                ],
                &[
                    "A-3", "8", "To Do", "S2", "E2", "ana", "High", "Story", "2024-01-10", "",
                ],
                &[
                    "A-4", "2", "In Progress", "S2", "", "", "Medium", "bug", "2024-01-12", "",
                ],
                &["A-5", "1", "Done", "", "E2", "cy", "High", "Defect", "", ""],
            ],
        )
    }

    fn done_only() -> Config {
        Config {
            terminal_statuses: BTreeSet::from(["Done".to_string()]),
            ..Config::default()
        }
    }

    #[test]
    fn basic_metrics_on_empty_table_are_zero() {
        let empty = table(&["Issue Key", "Story Points", "Status"], &[]);
        let config = Config::default();
        let engine = MetricsEngine::new(&empty, &config);
        let metrics = engine.basic_metrics().expect("status present");
        assert_eq!(metrics.total, 0);
        assert_eq!(metrics.completion_rate, 0.0);
        assert_eq!(engine.average_story_points(), 0.0);
        assert_eq!(
            engine.defect_rate(),
            Err(MetricsError::MissingDimension(Field::IssueType))
        );
    }

    #[test]
    fn basic_metrics_use_terminal_statuses() {
        let data = sample();
        let config = Config::default();
        let metrics = MetricsEngine::new(&data, &config)
            .basic_metrics()
            .expect("status present");
        assert_eq!(metrics.total, 5);
        assert_eq!(metrics.completed, 3);
        assert_eq!(metrics.total_points, 19.0);
        assert!((metrics.completion_rate - 0.6).abs() < 1e-9);

        let strict = done_only();
        let metrics = MetricsEngine::new(&data, &strict)
            .basic_metrics()
            .expect("status present");
        assert_eq!(metrics.completed, 2);
        assert!((0.0..=1.0).contains(&metrics.completion_rate));
    }

    #[test]
    fn velocity_skips_sprints_without_completed_rows() {
        let data = table(
            &["Sprint", "Status", "Points", "Issue Key"],
            &[
                &["S1", "Done", "5", "A-1"],
                &["S1", "Done", "3", "A-2"],
                &["S2", "To Do", "8", "A-3"],
            ],
        );
        let config = Config::default();
        let velocity = MetricsEngine::new(&data, &config)
            .sprint_velocity()
            .expect("sprint present");
        assert_eq!(velocity, BTreeMap::from([("S1".to_string(), 8.0)]));
    }

    #[test]
    fn sprint_metrics_average_velocity() {
        let data = sample();
        let config = Config::default();
        let metrics = MetricsEngine::new(&data, &config)
            .sprint_metrics()
            .expect("sprint present");
        // S1 = 8, Backlog = 1
        assert!((metrics.average_velocity - 4.5).abs() < 1e-9);

        let none_done = table(&["Issue Key", "Sprint", "Status"], &[&["A-1", "S1", "To Do"]]);
        let metrics = MetricsEngine::new(&none_done, &config)
            .sprint_metrics()
            .expect("sprint present");
        assert_eq!(metrics.average_velocity, 0.0);
    }

    #[test]
    fn epic_progress_bounds() {
        let data = table(
            &["Issue Key", "Points", "Status", "Epic"],
            &[
                &["A-1", "2", "Done", "E1"],
                &["A-2", "3", "Done", "E1"],
                &["A-3", "5", "To Do", "E2"],
                &["A-4", "1", "Done", ""],
            ],
        );
        let config = Config::default();
        let progress = MetricsEngine::new(&data, &config)
            .epic_progress()
            .expect("epic present");
        assert_eq!(progress["E1"].completion_percentage, 100.0);
        assert_eq!(progress["E1"].total_points, 5.0);
        assert_eq!(progress["E2"].completion_percentage, 0.0);
        assert_eq!(progress["No Epic"].total_points, 1.0);
    }

    #[test]
    fn missing_dimension_is_reported() {
        let data = table(&["Issue Key", "Points", "Status"], &[&["A-1", "2", "Done"]]);
        let config = Config::default();
        let engine = MetricsEngine::new(&data, &config);
        assert_eq!(
            engine.epic_progress(),
            Err(MetricsError::MissingDimension(Field::Epic))
        );
        assert_eq!(
            engine.sprint_velocity(),
            Err(MetricsError::MissingDimension(Field::Sprint))
        );
        assert_eq!(
            engine.cycle_time(),
            Err(MetricsError::MissingDimension(Field::Epic))
        );

        let bundle = engine.bundle();
        assert_eq!(bundle.basic.map(|basic| basic.total), Some(1));
        assert!(bundle.epic_progress.is_none());
        assert!(bundle.team_workload.is_none());
    }

    #[test]
    fn backlog_and_no_epic_buckets_collect_blank_rows() {
        let data = sample();
        let config = Config::default();
        let engine = MetricsEngine::new(&data, &config);
        let velocity = engine.sprint_velocity().expect("sprint present");
        assert_eq!(velocity.get("Backlog"), Some(&1.0));
        let epics = engine.epic_distribution().expect("epic present");
        assert_eq!(epics["No Epic"].issue_count, 1);
        assert_eq!(epics["E2"].total_points, 9.0);
    }

    #[test]
    fn team_workload_sorted_ascending() {
        let data = sample();
        let config = Config::default();
        let workload = MetricsEngine::new(&data, &config)
            .team_workload()
            .expect("assignee present");
        let names: Vec<&str> = workload.iter().map(|l| l.assignee.as_str()).collect();
        assert_eq!(names, vec!["cy", "ben", "ana"]);
        assert_eq!(workload[2].story_points, 13.0);
    }

    #[test]
    fn cycle_time_only_counts_completed_rows_with_dates() {
        let data = sample();
        let config = Config::default();
        let cycle = MetricsEngine::new(&data, &config)
            .cycle_time()
            .expect("dates present");
        // A-1: 4 days, A-2: 10 days
        assert_eq!(cycle, BTreeMap::from([("E1".to_string(), 7.0)]));
    }

    #[test]
    fn priority_matrix_is_zero_filled() {
        let data = sample();
        let config = Config::default();
        let matrix = MetricsEngine::new(&data, &config)
            .priority_status_matrix()
            .expect("priority present");
        assert_eq!(matrix["High"]["Done"], 2);
        assert_eq!(matrix["High"]["To Do"], 1);
        assert_eq!(matrix["Low"]["Done"], 0);
        assert_eq!(matrix["Medium"]["In Progress"], 1);
        assert_eq!(matrix["Low"].len(), 4);
    }

    #[test]
    fn sprint_health_counts_scope_changes() {
        let data = sample();
        let config = Config::default();
        let engine = MetricsEngine::new(&data, &config);

        let s1 = engine.sprint_health("S1").expect("sprint present");
        assert_eq!(s1.total_points, 8.0);
        assert_eq!(s1.completed_points, 8.0);
        assert_eq!(s1.completion_percentage, 100.0);
        assert_eq!(s1.scope_change_count, 1);

        let s2 = engine.sprint_health("S2").expect("sprint present");
        assert_eq!(s2.completed_points, 0.0);
        assert_eq!(s2.scope_change_count, 1);

        let unknown = engine.sprint_health("S9").expect("sprint present");
        assert_eq!(unknown.total_points, 0.0);
        assert_eq!(unknown.completion_percentage, 0.0);
    }

    #[test]
    fn burndown_accumulates_by_created_date() {
        let data = sample();
        let config = Config::default();
        let burndown = MetricsEngine::new(&data, &config)
            .sprint_burndown("S2")
            .expect("dates present");
        let totals: Vec<f64> = burndown.iter().map(|p| p.cumulative_points).collect();
        assert_eq!(totals, vec![8.0, 10.0]);
        assert_eq!(burndown[0].date, NaiveDate::from_ymd_opt(2024, 1, 10).unwrap());
    }

    #[test]
    fn defect_trend_matches_types_case_insensitively() {
        let data = sample();
        let config = Config::default();
        let engine = MetricsEngine::new(&data, &config);
        let trend = engine.defect_trend().expect("issue type present");
        assert_eq!(trend.get("S1"), Some(&1));
        assert_eq!(trend.get("S2"), Some(&1));
        assert_eq!(trend.get("Backlog"), Some(&1));

        let types = engine.issue_type_distribution().expect("issue type present");
        assert_eq!(types["Story"], 2);
        assert_eq!(types["bug"], 1);
    }

    #[test]
    fn sprint_completion_rates_per_sprint() {
        let data = sample();
        let config = Config::default();
        let rates = MetricsEngine::new(&data, &config)
            .sprint_completion_rates()
            .expect("sprint present");
        assert_eq!(rates["S1"], 100.0);
        assert_eq!(rates["S2"], 0.0);
    }

    #[test]
    fn status_distribution_counts_rows() {
        let data = sample();
        let config = Config::default();
        let statuses = MetricsEngine::new(&data, &config)
            .status_distribution()
            .expect("status present");
        assert_eq!(statuses["Done"], 2);
        assert_eq!(statuses.values().sum::<usize>(), 5);
    }

    #[test]
    fn completion_metrics_need_a_status_column() {
        let data = table(
            &["Issue key", "Sprint", "Epic"],
            &[&["A-1", "S1", "E1"], &["A-2", "S1", "E1"]],
        );
        let config = Config::default();
        let engine = MetricsEngine::new(&data, &config);
        let missing = Some(MetricsError::MissingDimension(Field::Status));

        assert_eq!(engine.basic_metrics().err(), missing);
        assert_eq!(engine.sprint_velocity().err(), missing);
        assert_eq!(engine.epic_progress().err(), missing);
        assert_eq!(engine.sprint_health("S1").err(), missing);
        assert_eq!(engine.status_distribution().err(), missing);

        let bundle = engine.bundle();
        assert!(bundle.basic.is_none());
        assert!(bundle.sprint_metrics.is_none());
        assert!(bundle.epic_distribution.is_some());
    }

    #[test]
    fn team_velocity_splits_completed_points_by_assignee() {
        let data = sample();
        let config = Config::default();
        let velocity = MetricsEngine::new(&data, &config)
            .team_velocity()
            .expect("assignee present");

        assert_eq!(velocity["S1"]["ana"], 5.0);
        assert_eq!(velocity["S1"]["ben"], 3.0);
        assert_eq!(velocity["Backlog"]["cy"], 1.0);
        assert!(!velocity.contains_key("S2"));
    }

    #[test]
    fn epic_status_matrix_honors_filters() {
        let data = sample();
        let config = Config::default();
        let engine = MetricsEngine::new(&data, &config);

        let all = engine.epic_status_matrix(&[], &[]).expect("epic present");
        assert_eq!(all["E1"]["Done"], 1);
        assert_eq!(all["E1"]["Closed"], 1);
        assert_eq!(all["E2"]["To Do"], 1);
        assert_eq!(all["E2"]["In Progress"], 0);
        assert_eq!(all["No Epic"]["In Progress"], 1);

        let s2 = engine
            .epic_status_matrix(&["S2".to_string()], &[])
            .expect("epic present");
        assert_eq!(s2.keys().collect::<Vec<_>>(), vec!["E2", "No Epic"]);
        assert_eq!(s2["E2"].len(), 2);

        let e1 = engine
            .epic_status_matrix(&[], &["E1".to_string()])
            .expect("epic present");
        assert_eq!(e1.len(), 1);
        assert_eq!(e1["E1"].values().sum::<usize>(), 2);
    }

    #[test]
    fn priority_points_matrix_sums_story_points() {
        let data = sample();
        let config = Config::default();
        let points = MetricsEngine::new(&data, &config)
            .priority_points_matrix()
            .expect("priority present");

        assert_eq!(points["High"]["Done"], 6.0);
        assert_eq!(points["High"]["To Do"], 8.0);
        assert_eq!(points["Low"]["Closed"], 3.0);
        assert_eq!(points["Low"]["Done"], 0.0);
        assert_eq!(points["Medium"]["In Progress"], 2.0);
    }

    #[test]
    fn defect_rate_is_share_of_defect_rows() {
        let data = sample();
        let config = Config::default();
        let rate = MetricsEngine::new(&data, &config)
            .defect_rate()
            .expect("issue type present");
        assert!((rate - 0.6).abs() < 1e-9);

        let empty = table(&["Issue Key", "Status", "Issue Type"], &[]);
        let rate = MetricsEngine::new(&empty, &config)
            .defect_rate()
            .expect("issue type present");
        assert_eq!(rate, 0.0);
    }
}
