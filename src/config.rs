use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::models::Field;

pub const DATA_PATH_ENV: &str = "JIRA_DATA_PATH";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,
    #[serde(default = "default_terminal_statuses")]
    pub terminal_statuses: BTreeSet<String>,
    #[serde(default = "default_required_fields")]
    pub required_fields: Vec<Field>,
    #[serde(default = "default_true")]
    pub strict_headers: bool,
    #[serde(default = "default_defect_types")]
    pub defect_types: BTreeSet<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_path: default_data_path(),
            terminal_statuses: default_terminal_statuses(),
            required_fields: default_required_fields(),
            strict_headers: true,
            defect_types: default_defect_types(),
        }
    }
}

fn default_data_path() -> PathBuf {
    PathBuf::from("data/jira-export.csv")
}

fn default_terminal_statuses() -> BTreeSet<String> {
    ["Done", "Closed"].into_iter().map(String::from).collect()
}

/// Fields every metric leans on; configuration can add to them but not drop them.
const MINIMUM_REQUIRED_FIELDS: [Field; 3] = [Field::IssueKey, Field::StoryPoints, Field::Status];

fn default_required_fields() -> Vec<Field> {
    MINIMUM_REQUIRED_FIELDS.to_vec()
}

fn default_defect_types() -> BTreeSet<String> {
    ["bug", "defect"].into_iter().map(String::from).collect()
}

fn default_true() -> bool {
    true
}

impl Config {
    fn normalized(mut self) -> Self {
        self.defect_types = self
            .defect_types
            .iter()
            .map(|kind| kind.trim().to_lowercase())
            .collect();
        self.terminal_statuses = self
            .terminal_statuses
            .iter()
            .map(|status| status.trim().to_string())
            .collect();

        let mut required = default_required_fields();
        for field in self.required_fields {
            if !required.contains(&field) {
                required.push(field);
            }
        }
        self.required_fields = required;
        self
    }

    fn apply_env(mut self, data_path: Option<String>) -> Self {
        if let Some(path) = data_path.filter(|path| !path.trim().is_empty()) {
            self.data_path = PathBuf::from(path);
        }
        self
    }
}

pub fn parse_config(content: &str) -> Result<Config> {
    let cfg: Config = toml::from_str(content).context("failed to parse TOML config")?;
    Ok(cfg.normalized())
}

pub fn load_config(path: impl AsRef<Path>) -> Result<Config> {
    let content = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("failed to read config {}", path.as_ref().display()))?;
    parse_config(&content)
}

/// Defaults, then the optional TOML file, then `JIRA_DATA_PATH`.
pub fn resolve_config(path: Option<&Path>) -> Result<Config> {
    let cfg = match path {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    Ok(cfg.apply_env(std::env::var(DATA_PATH_ENV).ok()))
}
