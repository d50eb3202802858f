//! Plain-text run report
//!
//! One section per suite attempt followed by the run summary.

use super::types::TestResults;
use crate::runner::state::TestReport;
use anyhow::{Context, Result};
use chrono::Local;
use std::path::{Path, PathBuf};

const RULE: &str = "================================================================";
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

pub fn render(results: &TestResults) -> String {
    let mut out = format!(
        "TEST EXECUTION REPORT\nGenerated: {}\nRun: {}\n{}\n",
        results.generated_at, results.run_id, RULE
    );

    for suite in &results.suites {
        out.push_str(&render_suite(suite));
    }

    let summary = &results.summary;
    out.push_str(&format!(
        "SUMMARY\nTotal suites: {}\nPassed: {}\nFailed: {}\nSkipped: {}\nSuccess rate: {}%\nTotal duration: {}ms\n",
        summary.total,
        summary.passed,
        summary.failed,
        summary.skipped,
        summary.success_rate,
        summary.duration_ms
    ));
    out
}

fn render_suite(suite: &TestReport) -> String {
    let end = suite
        .end_time
        .map(|end| end.format(TIME_FORMAT).to_string())
        .unwrap_or_else(|| "-".to_string());
    let mut section = format!(
        "Suite: {}\nStatus: {}\nStart: {}\nEnd: {}\nDuration: {}ms\n",
        suite.suite_name,
        suite.status.as_str(),
        suite.start_time.format(TIME_FORMAT),
        end,
        suite.duration_ms()
    );

    if let Some(ref step) = suite.failed_step {
        section.push_str(&format!("Failed step: {}\n", step));
    }
    if let Some(ref reason) = suite.failure_reason {
        section.push_str(&format!("Reason: {}\n", reason));
    }
    if let Some(ref trace) = suite.failure_trace {
        section.push_str("Trace:\n");
        for line in trace.lines() {
            section.push_str(&format!("    {}\n", line));
        }
    }

    if !suite.steps.is_empty() {
        section.push_str("Steps:\n");
        for step in &suite.steps {
            section.push_str(&format!(
                "  [{}] {} {} - {}\n",
                if step.passed { "PASS" } else { "FAIL" },
                step.timestamp.format("%H:%M:%S"),
                step.step_name,
                step.message
            ));
        }
    }
    for artifact in &suite.artifacts {
        section.push_str(&format!("Artifact: {}\n", artifact));
    }
    section.push_str(RULE);
    section.push('\n');
    section
}

/// Name of the per-run report file
pub fn report_file_name() -> String {
    format!("test-report-{}.txt", Local::now().format("%Y%m%d_%H%M%S"))
}

pub fn write_report(results: &TestResults, output_dir: &Path) -> Result<PathBuf> {
    let path = output_dir.join(report_file_name());
    std::fs::write(&path, render(results))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}
