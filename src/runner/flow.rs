use super::events::{EventEmitter, TestEvent};
use super::executor::{ActionExecutor, ActionOutcome};
use super::state::{StepResult, TestReport};
use crate::error::FlowError;
use crate::parser::types::{ExecutionStep, TestFlow};
use tokio::time::Instant;

/// First unrecovered failure of a flow
#[derive(Debug)]
pub struct FlowFailure {
    /// `flow/step` name of the failing step
    pub step_name: String,
    pub error: FlowError,
}

/// Walks the enabled steps of a flow in order
pub struct FlowRunner<'a> {
    executor: &'a ActionExecutor<'a>,
    emitter: &'a EventEmitter,
}

impl<'a> FlowRunner<'a> {
    pub fn new(executor: &'a ActionExecutor<'a>, emitter: &'a EventEmitter) -> Self {
        Self { executor, emitter }
    }

    /// Run one flow, recording a step result per executed step
    ///
    /// Stops at the first step whose action fails without being optional.
    pub async fn run(
        &self,
        flow: &TestFlow,
        report: &mut TestReport,
    ) -> std::result::Result<(), FlowFailure> {
        if !flow.enabled {
            log::info!("Flow '{}' is disabled, skipping", flow.flow_name);
            return Ok(());
        }
        if let Some(ref description) = flow.description {
            log::info!("Flow '{}': {}", flow.flow_name, description);
        }

        let start = Instant::now();
        self.emitter.emit(TestEvent::FlowStarted {
            flow_name: flow.flow_name.clone(),
            step_count: flow.steps.len(),
        });

        let mut outcome = Ok(());
        for (index, step) in flow.steps.iter().enumerate() {
            if let Err(failure) = self.run_step(&flow.flow_name, index + 1, step, report).await {
                outcome = Err(failure);
                break;
            }
        }

        self.emitter.emit(TestEvent::FlowFinished {
            flow_name: flow.flow_name.clone(),
            passed: outcome.is_ok(),
            duration_ms: start.elapsed().as_millis() as u64,
        });
        outcome
    }

    async fn run_step(
        &self,
        flow_name: &str,
        index: usize,
        step: &ExecutionStep,
        report: &mut TestReport,
    ) -> std::result::Result<(), FlowFailure> {
        let step_name = format!("{}/{}", flow_name, step.step_name);

        if !step.enabled {
            log::info!("Step '{}' is disabled, skipping", step_name);
            self.emitter.emit(TestEvent::StepSkipped {
                step_name,
                reason: "disabled".into(),
            });
            return Ok(());
        }
        if step.is_legacy() {
            log::warn!(
                "Step '{}' uses the legacy page/action form, which is not executed",
                step_name
            );
            self.emitter.emit(TestEvent::StepSkipped {
                step_name,
                reason: "legacy page/action step".into(),
            });
            return Ok(());
        }
        if step.action_steps.is_empty() {
            log::warn!("Step '{}' has no actions", step_name);
            self.emitter.emit(TestEvent::StepSkipped {
                step_name,
                reason: "no actions".into(),
            });
            return Ok(());
        }

        let start = Instant::now();
        self.emitter.emit(TestEvent::StepStarted {
            step_name: step_name.clone(),
            index,
            action_count: step.action_steps.len(),
        });

        let mut suppressed = 0;
        for action in &step.action_steps {
            match self.executor.execute(action).await {
                Ok(ActionOutcome::Suppressed(_)) => suppressed += 1,
                Ok(_) => {}
                Err(error) => {
                    let duration_ms = start.elapsed().as_millis() as u64;
                    report.add_step(StepResult::failed(&step_name, error.to_string()));
                    self.emitter.emit(TestEvent::StepFailed {
                        step_name: step_name.clone(),
                        error: error.to_string(),
                        duration_ms,
                    });
                    return Err(FlowFailure { step_name, error });
                }
            }
        }

        let message = if suppressed == 0 {
            format!("{} actions completed", step.action_steps.len())
        } else {
            format!(
                "{} actions completed, {} optional failures ignored",
                step.action_steps.len(),
                suppressed
            )
        };
        report.add_step(StepResult::passed(&step_name, message));
        self.emitter.emit(TestEvent::StepPassed {
            step_name,
            duration_ms: start.elapsed().as_millis() as u64,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::simulated::{DriverCall, SimulatedDriver};
    use crate::locator::LocatorTable;
    use crate::parser::types::TestConfig;
    use crate::runner::context::TestContext;
    use crate::utils::config::RunnerConfig;
    use std::path::Path;

    fn flow(json: &str) -> TestFlow {
        serde_json::from_str(json).unwrap()
    }

    async fn run(driver: &SimulatedDriver, flow: &TestFlow) -> (TestReport, Option<FlowFailure>) {
        let config = TestConfig::default();
        let context = TestContext::new("suite", Path::new("out"));
        let runner_config = RunnerConfig::default();
        let emitter = EventEmitter::default();
        let executor = ActionExecutor::new(
            driver,
            LocatorTable::from_config(&config),
            &context,
            &runner_config,
            &emitter,
        );
        let mut report = TestReport::start("suite");
        let result = FlowRunner::new(&executor, &emitter)
            .run(flow, &mut report)
            .await;
        (report, result.err())
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_step_is_not_executed() {
        let driver = SimulatedDriver::new();
        let flow = flow(
            r#"{"flowName": "nav", "steps": [
                {"stepName": "A", "enabled": false, "actionSteps": [{"actionType": "hideKeyboard"}]},
                {"stepName": "B", "enabled": true, "actionSteps": [{"actionType": "goBack"}]}
            ]}"#,
        );

        let (report, failure) = run(&driver, &flow).await;
        assert!(failure.is_none());
        assert_eq!(driver.calls(), vec![DriverCall::NavigateBack]);
        assert_eq!(report.steps.len(), 1);
        assert_eq!(report.steps[0].step_name, "nav/B");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_stops_remaining_steps() {
        let driver = SimulatedDriver::new();
        let flow = flow(
            r#"{"flowName": "login", "steps": [
                {"stepName": "submit", "actionSteps": [{"actionType": "click"}]},
                {"stepName": "back", "actionSteps": [{"actionType": "goBack"}]}
            ]}"#,
        );

        let (report, failure) = run(&driver, &flow).await;
        let failure = failure.unwrap();
        assert_eq!(failure.step_name, "login/submit");
        assert!(failure.error.is_configuration());
        assert!(driver.calls().is_empty());
        assert_eq!(report.steps.len(), 1);
        assert!(!report.steps[0].passed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_optional_failure_lets_flow_continue() {
        let driver = SimulatedDriver::new();
        let flow = flow(
            r#"{"flowName": "login", "steps": [
                {"stepName": "dismiss", "actionSteps": [
                    {"actionType": "click", "optional": true},
                    {"actionType": "goBack"}
                ]}
            ]}"#,
        );

        let (report, failure) = run(&driver, &flow).await;
        assert!(failure.is_none());
        assert_eq!(driver.calls(), vec![DriverCall::NavigateBack]);
        assert!(report.steps[0].message.contains("1 optional failures ignored"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_legacy_and_disabled_flow_are_noops() {
        let driver = SimulatedDriver::new();
        let legacy = flow(
            r#"{"flowName": "old", "steps": [{"stepName": "s", "page": "Home", "action": "tap"}]}"#,
        );
        let (report, failure) = run(&driver, &legacy).await;
        assert!(failure.is_none());
        assert!(report.steps.is_empty());

        let disabled = flow(
            r#"{"flowName": "off", "enabled": false, "steps": [{"stepName": "s", "actionSteps": [{"actionType": "goBack"}]}]}"#,
        );
        run(&driver, &disabled).await;
        assert!(driver.calls().is_empty());
    }
}
