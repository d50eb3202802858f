pub mod context;
pub mod events;
pub mod executor;
pub mod flow;
pub mod orchestrator;
pub mod resilience;
pub mod scroll_search;
pub mod state;

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;
use tokio::sync::watch;

use crate::driver::appium::{resolve_server_url, AppiumDriver, SessionCapabilities};
use crate::driver::simulated::SimulatedDriver;
use crate::driver::traits::AutomationDriver;
use crate::parser::{load_config, TestDataProvider};
use crate::report::{self, TestResults};
use crate::utils::config::RunnerConfig;

pub use events::*;
pub use orchestrator::{RunOutcome, SuiteOrchestrator};
pub use state::*;

/// Options of one `run` invocation
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub config: Option<PathBuf>,
    pub data: Option<PathBuf>,
    pub output: PathBuf,
    /// Suite names to run; empty runs all
    pub suites: Vec<String>,
    pub data_driven: bool,
    /// Drive the in-memory simulated device instead of an Appium session
    pub dry_run: bool,
    pub capture_diagnostics: bool,
}

/// Load configuration, run the selected suites and write reports
///
/// Ctrl-C stops the run; reports of the suites finished so far are still
/// written before the interruption is returned as an error.
pub async fn run_tests(options: &RunOptions) -> Result<RunSummary> {
    let (config, config_path) =
        load_config(options.config.as_deref()).context("Failed to load test configuration")?;
    println!(
        "{} Loaded {} suites from {}",
        "ℹ".blue(),
        config.suite_executions.len(),
        config_path.display()
    );

    let data = if options.data_driven {
        Some(TestDataProvider::load(options.data.as_deref()).context("Failed to load test data")?)
    } else {
        None
    };

    let runner_config = RunnerConfig {
        output_dir: options.output.clone(),
        capture_diagnostics: options.capture_diagnostics,
        ..RunnerConfig::default()
    }
    .apply_timeouts(&config.global_settings);

    let driver: Box<dyn AutomationDriver> = if options.dry_run {
        println!("  {}", "Dry run: using the simulated device".yellow());
        Box::new(SimulatedDriver::permissive())
    } else {
        let url = resolve_server_url(&config.global_settings);
        let caps = SessionCapabilities::from_settings(&config.global_settings);
        Box::new(
            AppiumDriver::connect(&url, &caps)
                .await
                .with_context(|| format!("Failed to start a session on {}", url))?,
        )
    };

    let (emitter, receiver) = EventEmitter::new();
    let listener = tokio::spawn(ConsoleEventListener::listen(receiver));

    let (stop, stop_rx) = watch::channel(false);
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Ctrl-C received, stopping the run");
            let _ = stop.send(true);
        }
    });

    let outcome = {
        let orchestrator = SuiteOrchestrator::new(&*driver, &config, &runner_config, &emitter)
            .with_stop_signal(stop_rx);
        match data {
            Some(ref data) => orchestrator.run_data_driven(data, &options.suites).await,
            None => orchestrator.run(&options.suites).await,
        }
    };
    interrupt.abort();

    drop(emitter);
    let _ = listener.await;

    if let Err(e) = driver.quit().await {
        log::warn!("Failed to close the session: {}", e);
    }

    let finished = outcome.reports.len();
    let results = TestResults::new(outcome.reports, outcome.summary.clone());
    for path in report::write_reports(&results, &runner_config.output_dir)? {
        println!("  {} Report: {}", "📄".green(), path.display());
    }

    if outcome.interrupted {
        anyhow::bail!(
            "Interrupted after {} suites; partial reports written",
            finished
        );
    }
    Ok(outcome.summary)
}
