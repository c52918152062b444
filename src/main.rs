use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod ingest;
mod metrics;
mod models;
mod normalize;
mod report;

#[derive(Parser)]
#[command(name = "sprint-dashboard")]
#[command(about = "Sprint, epic and team metrics from a Jira CSV export", long_about = None)]
struct Cli {
    /// CSV export to load (defaults to the configured data path)
    #[arg(long, global = true)]
    csv: Option<PathBuf>,
    /// Optional TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print completion and velocity figures
    Summary,
    /// Show health and burndown for one sprint
    Sprint {
        #[arg(long)]
        name: String,
    },
    /// Generate a markdown report
    Report {
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Emit every metric as JSON
    Json {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print data-quality observations from normalization
    Quality,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut config = config::resolve_config(cli.config.as_deref())?;
    if let Some(csv) = cli.csv {
        config.data_path = csv;
    }

    let session = ingest::load_session(&config.data_path, &config)
        .with_context(|| format!("failed to load {}", config.data_path.display()))?;
    let engine = session.engine(&config);

    match cli.command {
        Commands::Summary => {
            if session.table.is_empty() {
                println!("No issues found in {}.", session.source);
                return Ok(());
            }

            match engine.basic_metrics() {
                Ok(basic) => {
                    println!("Total stories: {}", basic.total);
                    println!("Completed stories: {}", basic.completed);
                    println!("Total story points: {:.1}", basic.total_points);
                    println!("Completion rate: {:.1}%", basic.completion_rate * 100.0);
                }
                Err(err) => println!("Completion figures unavailable: {err}"),
            }

            match engine.sprint_metrics() {
                Ok(sprint) => println!(
                    "Average velocity: {:.1} points per sprint",
                    sprint.average_velocity
                ),
                Err(err) => println!("Sprint velocity unavailable: {err}"),
            }
        }
        Commands::Sprint { name } => {
            print!("{}", report::build_sprint_summary(&session, &engine, &name));
        }
        Commands::Report { out } => {
            let report = report::build_report(&session, &engine);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Json { out } => {
            let json = serde_json::to_string_pretty(&engine.bundle())?;
            match out {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Metrics written to {}.", path.display());
                }
                None => println!("{json}"),
            }
        }
        Commands::Quality => {
            let quality = &session.quality;
            println!("Rows kept: {} of {}", quality.rows_kept, quality.rows_read);
            println!("Rows without issue key: {}", quality.dropped_missing_key);
            println!("Unparsable dates: {}", quality.unparsable_dates);
            println!("Non-numeric story points: {}", quality.non_numeric_points);
            println!("Negative story points: {}", quality.negative_points);
            println!("Due before created: {}", quality.due_before_created);
            for (field, share) in &quality.completeness {
                println!("{field} completeness: {:.1}%", share * 100.0);
            }
            if !quality.unmapped_headers.is_empty() {
                println!("Ignored columns: {}", quality.unmapped_headers.join(", "));
            }
        }
    }

    Ok(())
}
