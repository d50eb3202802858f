use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Final status of a suite attempt
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum SuiteStatus {
    Running,
    Passed,
    Failed,
    Skipped,
}

impl SuiteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuiteStatus::Running => "RUNNING",
            SuiteStatus::Passed => "PASSED",
            SuiteStatus::Failed => "FAILED",
            SuiteStatus::Skipped => "SKIPPED",
        }
    }
}

/// Outcome of one executed step
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub step_name: String,
    pub passed: bool,
    pub message: String,
    pub timestamp: DateTime<Local>,
}

impl StepResult {
    pub fn passed(step_name: &str, message: impl Into<String>) -> Self {
        Self {
            step_name: step_name.to_string(),
            passed: true,
            message: message.into(),
            timestamp: Local::now(),
        }
    }

    pub fn failed(step_name: &str, message: impl Into<String>) -> Self {
        Self {
            step_name: step_name.to_string(),
            passed: false,
            message: message.into(),
            timestamp: Local::now(),
        }
    }
}

/// Report of one suite attempt
///
/// Created when the suite starts, appended to as steps complete and
/// finalized exactly once through `pass`, `fail` or `skip`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestReport {
    pub suite_name: String,
    pub status: SuiteStatus,
    pub start_time: DateTime<Local>,
    pub end_time: Option<DateTime<Local>>,
    pub steps: Vec<StepResult>,
    pub failed_step: Option<String>,
    pub failure_reason: Option<String>,
    pub failure_trace: Option<String>,
    #[serde(default)]
    pub artifacts: Vec<String>,
}

impl TestReport {
    pub fn start(suite_name: &str) -> Self {
        Self {
            suite_name: suite_name.to_string(),
            status: SuiteStatus::Running,
            start_time: Local::now(),
            end_time: None,
            steps: Vec::new(),
            failed_step: None,
            failure_reason: None,
            failure_trace: None,
            artifacts: Vec::new(),
        }
    }

    pub fn add_step(&mut self, result: StepResult) {
        self.steps.push(result);
    }

    pub fn add_artifact(&mut self, path: impl Into<String>) {
        self.artifacts.push(path.into());
    }

    pub fn pass(&mut self) {
        self.finish(SuiteStatus::Passed);
    }

    pub fn fail(&mut self, step: Option<&str>, reason: &str, trace: &str) {
        self.failed_step = step.map(str::to_string);
        self.failure_reason = Some(reason.to_string());
        self.failure_trace = Some(trace.to_string());
        self.finish(SuiteStatus::Failed);
    }

    pub fn skip(&mut self, reason: &str) {
        self.failure_reason = Some(reason.to_string());
        self.finish(SuiteStatus::Skipped);
    }

    fn finish(&mut self, status: SuiteStatus) {
        if self.end_time.is_some() {
            log::warn!("Report for '{}' already finalized", self.suite_name);
            return;
        }
        self.status = status;
        self.end_time = Some(Local::now());
    }

    pub fn is_finished(&self) -> bool {
        self.end_time.is_some()
    }

    pub fn duration_ms(&self) -> u64 {
        self.end_time
            .map(|end| (end - self.start_time).num_milliseconds().max(0) as u64)
            .unwrap_or(0)
    }
}

/// Consolidated totals over a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: String,
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
    /// Integer percentage of executed suites that passed
    pub success_rate: u32,
    pub duration_ms: u64,
}

impl RunSummary {
    pub fn from_reports(run_id: &str, reports: &[TestReport], duration_ms: u64) -> Self {
        let (mut passed, mut failed, mut skipped) = (0u32, 0u32, 0u32);
        for report in reports {
            match report.status {
                SuiteStatus::Passed => passed += 1,
                SuiteStatus::Failed | SuiteStatus::Running => failed += 1,
                SuiteStatus::Skipped => skipped += 1,
            }
        }
        let executed = passed + failed;
        let success_rate = if executed == 0 {
            0
        } else {
            passed * 100 / executed
        };
        Self {
            run_id: run_id.to_string(),
            total: reports.len() as u32,
            passed,
            failed,
            skipped,
            success_rate,
            duration_ms,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}
