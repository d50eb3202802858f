use crate::runner::state::{RunSummary, TestReport};
use chrono::Local;
use serde::{Deserialize, Serialize};

/// Everything a report renderer needs about one run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResults {
    pub run_id: String,
    pub suites: Vec<TestReport>,
    pub summary: RunSummary,
    pub generated_at: String,
}

impl TestResults {
    pub fn new(suites: Vec<TestReport>, summary: RunSummary) -> Self {
        Self {
            run_id: summary.run_id.clone(),
            suites,
            summary,
            generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}
