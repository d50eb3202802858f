use super::state::{RunSummary, SuiteStatus};
use tokio::sync::broadcast;

/// Execution events for real-time console output
#[derive(Debug, Clone)]
pub enum TestEvent {
    // Run events
    RunStarted {
        run_id: String,
        suite_count: usize,
    },
    RunFinished {
        summary: RunSummary,
    },

    // Suite events
    SuiteStarted {
        suite_name: String,
        flow_count: usize,
    },
    SuiteFinished {
        suite_name: String,
        status: SuiteStatus,
        duration_ms: u64,
        error: Option<String>,
    },
    SuiteSkipped {
        suite_name: String,
        reason: String,
    },

    // Flow events
    FlowStarted {
        flow_name: String,
        step_count: usize,
    },
    FlowFinished {
        flow_name: String,
        passed: bool,
        duration_ms: u64,
    },

    // Step events
    StepStarted {
        step_name: String,
        index: usize,
        action_count: usize,
    },
    StepPassed {
        step_name: String,
        duration_ms: u64,
    },
    StepFailed {
        step_name: String,
        error: String,
        duration_ms: u64,
    },
    StepSkipped {
        step_name: String,
        reason: String,
    },

    // An optional action failed and was suppressed
    ActionSuppressed {
        action: String,
        error: String,
    },

    // Log event for coordinated output
    Log {
        message: String,
    },
}

/// Event emitter for broadcasting execution events
#[derive(Clone)]
pub struct EventEmitter {
    sender: broadcast::Sender<TestEvent>,
}

impl EventEmitter {
    pub fn new() -> (Self, broadcast::Receiver<TestEvent>) {
        let (sender, receiver) = broadcast::channel(256);
        (Self { sender }, receiver)
    }

    pub fn emit(&self, event: TestEvent) {
        let _ = self.sender.send(event);
    }

    pub fn log(&self, message: impl Into<String>) {
        self.emit(TestEvent::Log {
            message: message.into(),
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TestEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }
}

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration as StdDuration;

/// Console event listener for printing real-time updates
///
/// Runs until every emitter is dropped.
pub struct ConsoleEventListener;

impl ConsoleEventListener {
    pub async fn listen(mut receiver: broadcast::Receiver<TestEvent>) {
        use colored::Colorize;
        use indicatif::ProgressDrawTarget;
        use std::io::IsTerminal;

        // Hidden target when piped so no escape codes leak into logs
        let multi = if std::io::stdout().is_terminal() {
            MultiProgress::new()
        } else {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        };

        let mut spinner: Option<ProgressBar> = None;
        let mut step_text = String::new();

        loop {
            let event = match receiver.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    multi
                        .println(format!("  {} {} events dropped", "⚠".yellow(), missed))
                        .ok();
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            match event {
                TestEvent::RunStarted {
                    run_id,
                    suite_count,
                } => {
                    println!(
                        "\n{} Run {} started ({} suites)",
                        "▶".green().bold(),
                        run_id.cyan(),
                        suite_count
                    );
                }

                TestEvent::RunFinished { summary } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }
                    println!("\n{} Run finished", "■".blue().bold());
                    println!("  Total suites: {}", summary.total);
                    println!(
                        "  {} passed, {} failed, {} skipped",
                        summary.passed.to_string().green(),
                        summary.failed.to_string().red(),
                        summary.skipped.to_string().yellow()
                    );
                    println!("  Success rate: {}%", summary.success_rate);
                    println!("  Duration: {}ms", summary.duration_ms);
                }

                TestEvent::SuiteStarted {
                    suite_name,
                    flow_count,
                } => {
                    println!(
                        "\n{} Suite: {} ({} flows)",
                        "◆".magenta(),
                        suite_name.white().bold(),
                        flow_count
                    );
                }

                TestEvent::SuiteFinished {
                    suite_name,
                    status,
                    duration_ms,
                    error,
                } => {
                    let status_str = match status {
                        SuiteStatus::Passed => "PASSED".green().bold(),
                        SuiteStatus::Failed => "FAILED".red().bold(),
                        SuiteStatus::Skipped => "SKIPPED".yellow().bold(),
                        SuiteStatus::Running => "UNKNOWN".white().bold(),
                    };
                    println!(
                        "{} Suite {} [{}] {}ms",
                        "◇".magenta(),
                        suite_name,
                        status_str,
                        duration_ms
                    );
                    if let Some(err) = error {
                        println!("    {}", err.red());
                    }
                }

                TestEvent::SuiteSkipped { suite_name, reason } => {
                    println!(
                        "\n{} Suite {} skipped ({})",
                        "○".yellow(),
                        suite_name,
                        reason.dimmed()
                    );
                }

                TestEvent::FlowStarted {
                    flow_name,
                    step_count,
                } => {
                    println!(
                        "    {} Flow: {} ({} steps)",
                        "→".blue(),
                        flow_name.white().bold(),
                        step_count
                    );
                }

                TestEvent::FlowFinished {
                    flow_name,
                    passed,
                    duration_ms,
                } => {
                    let status_str = if passed {
                        "PASSED".green().bold()
                    } else {
                        "FAILED".red().bold()
                    };
                    println!(
                        "    {} Flow {} [{}] {}ms",
                        "←".blue(),
                        flow_name,
                        status_str,
                        duration_ms
                    );
                }

                TestEvent::StepStarted {
                    step_name,
                    index,
                    action_count,
                } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }
                    let pb = multi.add(ProgressBar::new_spinner());
                    if let Ok(style) = ProgressStyle::default_spinner()
                        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
                        .template("        {spinner} {msg}")
                    {
                        pb.set_style(style);
                    }
                    step_text = format!(
                        "[{}] {} ({} actions)",
                        index,
                        step_name,
                        action_count
                    );
                    pb.set_message(format!("{}... ", step_text.dimmed()));
                    pb.enable_steady_tick(StdDuration::from_millis(100));
                    spinner = Some(pb);
                }

                TestEvent::StepPassed { duration_ms, .. } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }
                    println!("        {} {} ({}ms)", "✓".green(), step_text, duration_ms);
                }

                TestEvent::StepFailed {
                    error, duration_ms, ..
                } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }
                    println!("        {} {} ({}ms)", "✗".red(), step_text, duration_ms);
                    println!("          {}", error.red());
                }

                TestEvent::StepSkipped { step_name, reason } => {
                    println!(
                        "        {} {} ({})",
                        "○".yellow(),
                        step_name,
                        reason.dimmed()
                    );
                }

                TestEvent::ActionSuppressed { action, error } => {
                    multi
                        .println(format!(
                            "          {} optional {} failed: {}",
                            "⚠".yellow(),
                            action,
                            error.dimmed()
                        ))
                        .ok();
                }

                TestEvent::Log { message } => {
                    multi.println(format!("          {}", message)).ok();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_listener_stops_when_emitter_dropped() {
        let (emitter, receiver) = EventEmitter::new();
        let handle = tokio::spawn(ConsoleEventListener::listen(receiver));
        emitter.log("hello");
        emitter.emit(TestEvent::StepSkipped {
            step_name: "a".into(),
            reason: "disabled".into(),
        });
        drop(emitter);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let (emitter, mut receiver) = EventEmitter::new();
        emitter.log("one");
        match receiver.recv().await.unwrap() {
            TestEvent::Log { message } => assert_eq!(message, "one"),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
