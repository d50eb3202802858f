//! Configuration and test-data loading
//!
//! `test-config.json` is located once per run: an explicit path wins, then the
//! resources directory (`$LUMI_FLOW_RESOURCES`, else `./resources`), then the
//! working directory. A missing config is fatal; missing test data is not.

use super::types::{ActionKind, TestConfig};
use crate::error::{FlowError, Result};
use crate::locator::LocatorTable;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "test-config.json";
pub const DATA_FILE: &str = "test-data.json";
pub const RESOURCES_ENV: &str = "LUMI_FLOW_RESOURCES";
pub const DEFAULT_RESOURCES_DIR: &str = "resources";

/// Candidate locations for a resource file, in search order
pub fn search_paths(file_name: &str) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Ok(dir) = std::env::var(RESOURCES_ENV) {
        if !dir.is_empty() {
            paths.push(Path::new(&dir).join(file_name));
        }
    }
    paths.push(Path::new(DEFAULT_RESOURCES_DIR).join(file_name));
    paths.push(PathBuf::from(file_name));
    paths
}

fn locate(explicit: Option<&Path>, file_name: &str) -> std::result::Result<PathBuf, Vec<PathBuf>> {
    if let Some(path) = explicit {
        return if path.is_file() {
            Ok(path.to_path_buf())
        } else {
            Err(vec![path.to_path_buf()])
        };
    }
    let candidates = search_paths(file_name);
    candidates
        .iter()
        .find(|p| p.is_file())
        .cloned()
        .ok_or(candidates)
}

/// Load the test configuration
pub fn load_config(explicit: Option<&Path>) -> Result<(TestConfig, PathBuf)> {
    let path = locate(explicit, CONFIG_FILE).map_err(|searched| {
        let searched: Vec<String> = searched.iter().map(|p| p.display().to_string()).collect();
        FlowError::configuration(format!(
            "{} not found (searched: {})",
            CONFIG_FILE,
            searched.join(", ")
        ))
    })?;

    let content = std::fs::read_to_string(&path)?;
    let config = parse_config(&content, &path)?;
    log::info!(
        "Loaded {} flows and {} suites from {}",
        config.flows.len(),
        config.suite_executions.len(),
        path.display()
    );
    Ok((config, path))
}

/// Parse config content; `.yaml`/`.yml` files are read as YAML, anything else as JSON
pub fn parse_config(content: &str, source_path: &Path) -> Result<TestConfig> {
    let is_yaml = source_path
        .extension()
        .map_or(false, |ext| ext == "yaml" || ext == "yml");
    let config = if is_yaml {
        serde_yaml::from_str(content)?
    } else {
        serde_json::from_str(content)?
    };
    Ok(config)
}

/// One data-driven row: column -> value
pub type DataRow = HashMap<String, String>;

/// Rows of `test-data.json`, keyed by suite name
#[derive(Debug, Clone, Default)]
pub struct TestDataProvider {
    rows: HashMap<String, Vec<DataRow>>,
}

impl TestDataProvider {
    /// Load test data; a missing file yields an empty provider
    ///
    /// JSON files map suite name to an array of flat objects. CSV files carry
    /// a `suiteName` column that groups rows.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match locate(explicit, DATA_FILE) {
            Ok(path) => path,
            Err(searched) => {
                log::warn!(
                    "{} not found at {}, continuing without data-driven rows",
                    DATA_FILE,
                    searched
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                return Ok(Self::default());
            }
        };

        let provider = if path.extension().map_or(false, |ext| ext == "csv") {
            Self::from_csv(std::fs::File::open(&path)?)?
        } else {
            Self::from_json(&std::fs::read_to_string(&path)?)?
        };
        log::info!(
            "Loaded test data for {} suites from {}",
            provider.rows.len(),
            path.display()
        );
        Ok(provider)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let raw: HashMap<String, Vec<HashMap<String, serde_json::Value>>> =
            serde_json::from_str(content)?;
        let rows = raw
            .into_iter()
            .map(|(suite, rows)| {
                let rows = rows
                    .into_iter()
                    .map(|row| {
                        row.into_iter()
                            .map(|(k, v)| (k, json_scalar(v)))
                            .collect()
                    })
                    .collect();
                (suite, rows)
            })
            .collect();
        Ok(Self { rows })
    }

    pub fn from_csv<R: std::io::Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let mut rows: HashMap<String, Vec<DataRow>> = HashMap::new();
        for record in rdr.deserialize() {
            let mut record: DataRow = record?;
            let suite = record.remove("suiteName").ok_or_else(|| {
                FlowError::configuration("CSV test data needs a suiteName column")
            })?;
            rows.entry(suite).or_default().push(record);
        }
        Ok(Self { rows })
    }

    pub fn rows_for(&self, suite_name: &str) -> &[DataRow] {
        self.rows
            .get(suite_name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn json_scalar(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Report unresolved references in a loaded configuration
pub fn validate_config(config: &TestConfig) -> Vec<String> {
    let mut issues = Vec::new();
    let locators = LocatorTable::from_config(config);

    for suite in &config.suite_executions {
        if config.data_set(&suite.data_set_ref).is_none() {
            issues.push(format!(
                "suite '{}': data set '{}' not found",
                suite.suite_name, suite.data_set_ref
            ));
        }
        for flow_ref in &suite.flow_refs {
            if config.flow(flow_ref).is_none() {
                issues.push(format!(
                    "suite '{}': flow '{}' not found",
                    suite.suite_name, flow_ref
                ));
            }
        }
    }

    for flow in &config.flows {
        for step in &flow.steps {
            let location = format!("flow '{}' step '{}'", flow.flow_name, step.step_name);
            if step.is_legacy() {
                issues.push(format!("{}: legacy page/action step is not executed", location));
            }
            for action in &step.action_steps {
                if let ActionKind::Unknown(ref raw) = action.action_type {
                    issues.push(format!("{}: unknown action type '{}'", location, raw));
                    continue;
                }
                if !action.action_type.needs_locator() {
                    continue;
                }
                match (&action.locator_category, &action.locator_name) {
                    (Some(category), Some(name)) => {
                        if let Err(e) = locators.resolve(category, name) {
                            issues.push(format!("{}: {}", location, e));
                        }
                    }
                    _ => issues.push(format!(
                        "{}: {} needs locatorCategory and locatorName",
                        location,
                        action.action_type.name()
                    )),
                }
            }
        }
    }

    issues
}
