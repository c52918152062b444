use std::collections::BTreeMap;
use std::fmt::Write;

use crate::ingest::Session;
use crate::metrics::{MetricsEngine, MetricsResult};
use crate::models::StatusMatrix;

const UNEXPLAINED: &str = "No explanation available";

pub fn metric_explanation(metric: &str) -> &'static str {
    match metric {
        "story_points" => "Total effort estimation for the story",
        "completion_rate" => "Percentage of completed stories in the project",
        "sprint_velocity" => "Average story points completed per sprint",
        "epic_progress" => "Completion percentage of epic based on story points",
        "cycle_time" => "Average days to complete a story",
        "defect_rate" => "Percentage of issues marked as bugs",
        _ => UNEXPLAINED,
    }
}

fn section<T>(
    output: &mut String,
    title: &str,
    metric: &str,
    result: MetricsResult<T>,
    empty_note: &str,
    render: impl Fn(&mut String, &T) -> bool,
) {
    let _ = writeln!(output);
    let _ = writeln!(output, "## {title}");
    let explanation = metric_explanation(metric);
    if explanation != UNEXPLAINED {
        let _ = writeln!(output, "_{explanation}_");
    }

    match result {
        Err(err) => {
            let _ = writeln!(output, "Not available: {err}.");
        }
        Ok(value) => {
            if !render(output, &value) {
                let _ = writeln!(output, "{empty_note}");
            }
        }
    }
}

fn render_map<V>(
    output: &mut String,
    values: &BTreeMap<String, V>,
    line: impl Fn(&str, &V) -> String,
) -> bool {
    for (key, value) in values {
        let _ = writeln!(output, "- {}", line(key, value));
    }
    !values.is_empty()
}

fn render_matrix<V>(
    output: &mut String,
    matrix: &StatusMatrix<V>,
    cell: impl Fn(&V) -> String,
) -> bool {
    render_map(output, matrix, |row, columns| {
        let cells: Vec<String> = columns
            .iter()
            .map(|(column, value)| format!("{column} {}", cell(value)))
            .collect();
        format!("{row}: {}", cells.join(", "))
    })
}

pub fn build_report(session: &Session, engine: &MetricsEngine<'_>) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Sprint Dashboard Report");
    let _ = writeln!(
        output,
        "Generated from {} (session {})",
        session.source, session.id
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overview");
    match engine.basic_metrics() {
        Ok(basic) => {
            let _ = writeln!(output, "- Total stories: {}", basic.total);
            let _ = writeln!(output, "- Completed stories: {}", basic.completed);
            let _ = writeln!(output, "- Total story points: {:.1}", basic.total_points);
            let _ = writeln!(
                output,
                "- Completion rate: {:.1}%",
                basic.completion_rate * 100.0
            );
        }
        Err(err) => {
            let _ = writeln!(output, "- Completion figures not available: {err}.");
        }
    }
    let _ = writeln!(
        output,
        "- Average story points: {:.1}",
        engine.average_story_points()
    );

    section(
        &mut output,
        "Sprint Velocity",
        "sprint_velocity",
        engine.sprint_velocity(),
        "No completed work in any sprint.",
        |out, velocity| {
            render_map(out, velocity, |sprint, points| {
                format!("{sprint}: {points:.1} points")
            })
        },
    );

    if let Ok(metrics) = engine.sprint_metrics() {
        let _ = writeln!(
            output,
            "Average velocity {:.1} points per sprint.",
            metrics.average_velocity
        );
    }

    section(
        &mut output,
        "Team Velocity",
        "team_velocity",
        engine.team_velocity(),
        "No completed work by assigned team members.",
        |out, velocity| render_matrix(out, velocity, |points| format!("{points:.1}")),
    );

    section(
        &mut output,
        "Sprint Completion",
        "completion_rate",
        engine.sprint_completion_rates(),
        "No sprints recorded.",
        |out, rates| {
            render_map(out, rates, |sprint, rate| format!("{sprint}: {rate:.1}%"))
        },
    );

    section(
        &mut output,
        "Epic Progress",
        "epic_progress",
        engine.epic_progress(),
        "No epics recorded.",
        |out, epics| {
            render_map(out, epics, |epic, progress| {
                format!(
                    "{epic}: {:.1}% complete, {:.1} points",
                    progress.completion_percentage, progress.total_points
                )
            })
        },
    );

    section(
        &mut output,
        "Epic Workflow",
        "epic_status",
        engine.epic_status_matrix(&[], &[]),
        "No epics recorded.",
        |out, matrix| render_matrix(out, matrix, |count| count.to_string()),
    );

    section(
        &mut output,
        "Team Workload",
        "story_points",
        engine.team_workload(),
        "No assigned work.",
        |out, loads| {
            for load in loads {
                let _ = writeln!(out, "- {}: {:.1} points", load.assignee, load.story_points);
            }
            !loads.is_empty()
        },
    );

    section(
        &mut output,
        "Cycle Time",
        "cycle_time",
        engine.cycle_time(),
        "No completed issues with both created and due dates.",
        |out, cycle| render_map(out, cycle, |epic, days| format!("{epic}: {days:.1} days")),
    );

    section(
        &mut output,
        "Priority by Status",
        "priority_status",
        engine.priority_status_matrix(),
        "No prioritized issues.",
        |out, matrix| render_matrix(out, matrix, |count| count.to_string()),
    );

    section(
        &mut output,
        "Priority Points by Status",
        "priority_points",
        engine.priority_points_matrix(),
        "No prioritized issues.",
        |out, matrix| render_matrix(out, matrix, |points| format!("{points:.1}")),
    );

    section(
        &mut output,
        "Defect Rate",
        "defect_rate",
        engine.defect_rate(),
        "",
        |out, rate| {
            let _ = writeln!(out, "- {:.1}% of issues are defects", rate * 100.0);
            true
        },
    );

    section(
        &mut output,
        "Defect Trend",
        "defect_trend",
        engine.defect_trend(),
        "No defects recorded.",
        |out, trend| {
            render_map(out, trend, |sprint, count| format!("{sprint}: {count} defects"))
        },
    );

    let quality = &session.quality;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Data Quality");
    let _ = writeln!(
        output,
        "- Rows kept: {} of {}",
        quality.rows_kept, quality.rows_read
    );
    let _ = writeln!(output, "- Rows without issue key: {}", quality.dropped_missing_key);
    let _ = writeln!(output, "- Unparsable dates: {}", quality.unparsable_dates);
    let _ = writeln!(
        output,
        "- Invalid story points: {}",
        quality.non_numeric_points + quality.negative_points
    );
    let _ = writeln!(output, "- Due before created: {}", quality.due_before_created);
    for (field, share) in &quality.completeness {
        let _ = writeln!(output, "- {field} completeness: {:.1}%", share * 100.0);
    }

    output
}

/// Health, status mix and burndown of one sprint. Figures that need a
/// missing column are reported as unavailable.
pub fn build_sprint_summary(session: &Session, engine: &MetricsEngine<'_>, sprint: &str) -> String {
    let mut output = String::new();
    let sprints = session.table.sprints();
    if !sprints.iter().any(|known| known == sprint) {
        let _ = writeln!(
            output,
            "Sprint {sprint} not found. Known sprints: {}",
            sprints.join(", ")
        );
        return output;
    }

    let _ = writeln!(output, "Sprint {sprint}");
    match engine.sprint_health(sprint) {
        Ok(health) => {
            let _ = writeln!(
                output,
                "- {:.1} of {:.1} points complete ({:.1}%)",
                health.completed_points, health.total_points, health.completion_percentage
            );
            let _ = writeln!(
                output,
                "- {} issues added after sprint start",
                health.scope_change_count
            );
        }
        Err(err) => {
            let _ = writeln!(output, "Sprint health unavailable: {err}");
        }
    }

    let view = session.table.filter_by_sprint(sprint);
    if let Ok(statuses) = engine.with_table(&view).status_distribution() {
        for (status, count) in statuses {
            let _ = writeln!(output, "- {status}: {count}");
        }
    }

    match engine.sprint_burndown(sprint) {
        Ok(burndown) if burndown.is_empty() => {
            let _ = writeln!(output, "No dated issues in this sprint.");
        }
        Ok(burndown) => {
            let _ = writeln!(output, "Cumulative points by created date:");
            for point in burndown {
                let _ = writeln!(output, "- {}: {:.1}", point.date, point.cumulative_points);
            }
        }
        Err(err) => {
            let _ = writeln!(output, "Burndown unavailable: {err}");
        }
    }

    output
}
