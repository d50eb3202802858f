//! Suite orchestration
//!
//! Suites run strictly in configuration order. A suite's data set and flows
//! are resolved before anything touches the device; the first unrecovered
//! failure ends that suite only.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Local;
use colored::Colorize;
use tokio::sync::watch;
use tokio::time::Instant;
use uuid::Uuid;

use super::context::TestContext;
use super::events::{EventEmitter, TestEvent};
use super::executor::ActionExecutor;
use super::flow::FlowRunner;
use super::state::{RunSummary, TestReport};
use crate::driver::traits::AutomationDriver;
use crate::error::{FlowError, Result};
use crate::locator::LocatorTable;
use crate::parser::loader::{DataRow, TestDataProvider};
use crate::parser::types::{SuiteExecution, TestConfig, TestDataSet, TestFlow};
use crate::utils::config::RunnerConfig;

/// Column naming a data-driven iteration
const DATA_ID_COLUMN: &str = "dataId";

/// Reports of one run plus their totals
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub reports: Vec<TestReport>,
    pub summary: RunSummary,
    /// A stop request ended the run early; `reports` holds finished suites only
    pub interrupted: bool,
}

struct ResolvedSuite<'c> {
    data_set: &'c TestDataSet,
    flows: Vec<&'c TestFlow>,
}

pub struct SuiteOrchestrator<'a> {
    driver: &'a dyn AutomationDriver,
    config: &'a TestConfig,
    runner: &'a RunnerConfig,
    emitter: &'a EventEmitter,
    stop: Option<watch::Receiver<bool>>,
}

impl<'a> SuiteOrchestrator<'a> {
    pub fn new(
        driver: &'a dyn AutomationDriver,
        config: &'a TestConfig,
        runner: &'a RunnerConfig,
        emitter: &'a EventEmitter,
    ) -> Self {
        Self {
            driver,
            config,
            runner,
            emitter,
            stop: None,
        }
    }

    /// Stop between or during suites once `stop` turns true
    ///
    /// The suite in progress is abandoned without a report.
    pub fn with_stop_signal(mut self, stop: watch::Receiver<bool>) -> Self {
        self.stop = Some(stop);
        self
    }

    /// Run every selected suite once
    ///
    /// An empty `filter` selects all suites.
    pub async fn run(&self, filter: &[String]) -> RunOutcome {
        self.run_with(filter, None).await
    }

    /// Run each selected suite once per data row
    ///
    /// Row values override the suite's data set. Suites without rows run once
    /// with their data set alone.
    pub async fn run_data_driven(&self, data: &TestDataProvider, filter: &[String]) -> RunOutcome {
        self.run_with(filter, Some(data)).await
    }

    async fn run_with(&self, filter: &[String], data: Option<&TestDataProvider>) -> RunOutcome {
        let run_id = Uuid::new_v4().simple().to_string()[..8].to_string();
        let suites = self.selected(filter);
        let start = Instant::now();

        self.emitter.emit(TestEvent::RunStarted {
            run_id: run_id.clone(),
            suite_count: suites.len(),
        });

        let mut reports = Vec::new();
        let mut interrupted = false;
        for suite in suites {
            if self.stop_requested() {
                interrupted = true;
                break;
            }
            if !suite.enabled {
                reports.push(self.skip(suite));
                continue;
            }

            let rows = data.map(|d| d.rows_for(&suite.suite_name)).unwrap_or_default();
            if data.is_some() && rows.is_empty() {
                log::warn!(
                    "No data rows for suite '{}', running it once with its data set",
                    suite.suite_name
                );
            }

            if rows.is_empty() {
                match self
                    .until_stopped(self.run_suite(suite, &suite.suite_name, None))
                    .await
                {
                    Some(report) => reports.push(report),
                    None => interrupted = true,
                }
            } else {
                let mut iteration_reports = Vec::with_capacity(rows.len());
                for (i, row) in rows.iter().enumerate() {
                    let name = iteration_name(&suite.suite_name, row, i);
                    match self.until_stopped(self.run_suite(suite, &name, Some(row))).await {
                        Some(report) => iteration_reports.push(report),
                        None => {
                            interrupted = true;
                            break;
                        }
                    }
                    if i + 1 < rows.len() && self.until_stopped(self.reset_app()).await.is_none() {
                        interrupted = true;
                        break;
                    }
                }
                let iteration_summary =
                    RunSummary::from_reports(&run_id, &iteration_reports, 0);
                log::info!(
                    "Suite '{}': {}/{} iterations passed",
                    suite.suite_name,
                    iteration_summary.passed,
                    iteration_summary.total
                );
                reports.extend(iteration_reports);
            }

            if interrupted {
                break;
            }
            if suite.reset_after && self.until_stopped(self.reset_app()).await.is_none() {
                interrupted = true;
                break;
            }
        }

        if interrupted {
            log::warn!("Run interrupted, keeping {} finished reports", reports.len());
            self.emitter.log(format!(
                "{} Interrupted, stopping after {} suites",
                "⚠".yellow(),
                reports.len()
            ));
        }

        let summary =
            RunSummary::from_reports(&run_id, &reports, start.elapsed().as_millis() as u64);
        self.emitter.emit(TestEvent::RunFinished {
            summary: summary.clone(),
        });
        RunOutcome {
            reports,
            summary,
            interrupted,
        }
    }

    fn stop_requested(&self) -> bool {
        self.stop.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Drive `work` to completion unless a stop request arrives first
    async fn until_stopped<T>(&self, work: impl Future<Output = T>) -> Option<T> {
        let Some(stop) = self.stop.clone() else {
            return Some(work.await);
        };
        tokio::select! {
            biased;
            _ = stop_signalled(stop) => None,
            value = work => Some(value),
        }
    }

    fn selected(&self, filter: &[String]) -> Vec<&'a SuiteExecution> {
        for name in filter {
            if self.config.suite(name).is_none() {
                log::warn!("Suite '{}' is not defined in the configuration", name);
            }
        }
        self.config
            .suite_executions
            .iter()
            .filter(|s| filter.is_empty() || filter.iter().any(|f| f == &s.suite_name))
            .collect()
    }

    fn skip(&self, suite: &SuiteExecution) -> TestReport {
        log::info!("Suite '{}' is disabled, skipping", suite.suite_name);
        let mut report = TestReport::start(&suite.suite_name);
        report.skip("suite disabled");
        self.emitter.emit(TestEvent::SuiteSkipped {
            suite_name: suite.suite_name.clone(),
            reason: "disabled".into(),
        });
        report
    }

    /// Run one suite attempt under `report_name`
    pub async fn run_suite(
        &self,
        suite: &SuiteExecution,
        report_name: &str,
        row: Option<&DataRow>,
    ) -> TestReport {
        let mut report = TestReport::start(report_name);
        if let Some(ref description) = suite.description {
            log::info!("Suite '{}': {}", report_name, description);
        }
        self.emitter.emit(TestEvent::SuiteStarted {
            suite_name: report_name.to_string(),
            flow_count: suite.flow_refs.len(),
        });

        match self.resolve(suite) {
            Ok(resolved) => self.execute(resolved, report_name, row, &mut report).await,
            Err(e) => {
                log::error!("Suite '{}' misconfigured: {}", report_name, e);
                report.fail(None, &e.to_string(), &e.trace());
            }
        }

        self.emitter.emit(TestEvent::SuiteFinished {
            suite_name: report_name.to_string(),
            status: report.status,
            duration_ms: report.duration_ms(),
            error: report.failure_reason.clone(),
        });
        report
    }

    fn resolve(&self, suite: &SuiteExecution) -> Result<ResolvedSuite<'a>> {
        let data_set = self.config.data_set(&suite.data_set_ref).ok_or_else(|| {
            FlowError::configuration(format!("Data set not found: {}", suite.data_set_ref))
        })?;
        let flows = suite
            .flow_refs
            .iter()
            .map(|name| {
                self.config
                    .flow(name)
                    .ok_or_else(|| FlowError::configuration(format!("Flow not found: {}", name)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(ResolvedSuite { data_set, flows })
    }

    async fn execute(
        &self,
        resolved: ResolvedSuite<'a>,
        report_name: &str,
        row: Option<&DataRow>,
        report: &mut TestReport,
    ) {
        let mut context = TestContext::new(report_name, &self.runner.output_dir)
            .with_data(&resolved.data_set.data);
        if let Some(row) = row {
            context = context.with_data(row);
        }

        let executor = ActionExecutor::new(
            self.driver,
            LocatorTable::from_config(self.config),
            &context,
            self.runner,
            self.emitter,
        );
        let flow_runner = FlowRunner::new(&executor, self.emitter);

        for flow in resolved.flows {
            if let Err(failure) = flow_runner.run(flow, report).await {
                log::error!(
                    "Suite '{}' failed at {}: {}",
                    report_name,
                    failure.step_name,
                    failure.error
                );
                if self.runner.capture_diagnostics {
                    for path in self.capture_diagnostics(&context).await {
                        report.add_artifact(path.display().to_string());
                    }
                }
                report.fail(
                    Some(&failure.step_name),
                    &failure.error.to_string(),
                    &failure.error.trace(),
                );
                return;
            }
        }
        report.pass();
    }

    /// Persist page source and screenshot for a failed suite
    ///
    /// Each capture is best effort; the returned paths are the ones written.
    async fn capture_diagnostics(&self, context: &TestContext) -> Vec<PathBuf> {
        self.emitter.log(format!(
            "{} Capturing failure context...",
            "ℹ".blue()
        ));
        if let Err(e) = std::fs::create_dir_all(&context.output_dir) {
            log::warn!(
                "Cannot create output directory {}: {}",
                context.output_dir.display(),
                e
            );
            return Vec::new();
        }

        let uuid = Uuid::new_v4().to_string();
        let base = format!(
            "fail_{}_{}_{}",
            safe_file_name(&context.suite_name),
            Local::now().format("%H%M%S"),
            &uuid[..8]
        );
        let mut written = Vec::new();

        match self.driver.page_source().await {
            Ok(xml) => {
                let path = context.output_path(&format!("{}.xml", base));
                match std::fs::write(&path, xml) {
                    Ok(()) => written.push(path),
                    Err(e) => log::warn!("Failed to save page source: {}", e),
                }
            }
            Err(e) => log::warn!("Failed to read page source: {}", e),
        }

        match self.driver.screenshot().await {
            Ok(png) => {
                let path = context.output_path(&format!("{}.png", base));
                match std::fs::write(&path, png) {
                    Ok(()) => written.push(path),
                    Err(e) => log::warn!("Failed to save screenshot: {}", e),
                }
            }
            Err(e) => log::warn!("Failed to take screenshot: {}", e),
        }

        for path in &written {
            self.emitter
                .log(format!("{} Saved {}", "📄".green(), path.display()));
        }
        written
    }

    /// Terminate and relaunch the app under test, ignoring failures
    pub async fn reset_app(&self) {
        let Some(package) = self.app_package() else {
            log::warn!("No appPackage configured, skipping app reset");
            return;
        };
        log::info!("Resetting app {}", package);

        match self.driver.terminate_app(&package).await {
            Ok(true) => {}
            Ok(false) => log::debug!("{} was not running", package),
            Err(e) => log::warn!("Failed to terminate {}: {}", package, e),
        }
        tokio::time::sleep(Duration::from_millis(self.runner.reset_terminate_delay_ms)).await;

        if let Err(e) = self.driver.activate_app(&package).await {
            log::warn!("Failed to activate {}: {}", package, e);
        }
        tokio::time::sleep(Duration::from_millis(self.runner.reset_activate_delay_ms)).await;
    }

    fn app_package(&self) -> Option<String> {
        self.driver.capability("appPackage").or_else(|| {
            self.config
                .global_settings
                .setting("appPackage")
                .map(str::to_string)
        })
    }
}

/// Resolves once the flag turns true; never if the sender goes away first
async fn stop_signalled(mut stop: watch::Receiver<bool>) {
    if stop.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

fn iteration_name(suite_name: &str, row: &HashMap<String, String>, index: usize) -> String {
    match row.get(DATA_ID_COLUMN).filter(|id| !id.is_empty()) {
        Some(id) => format!("{}_{}", suite_name, id),
        None => format!("{}_Data_{}", suite_name, index + 1),
    }
}

fn safe_file_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
