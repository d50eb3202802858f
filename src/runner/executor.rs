//! Generic action executor
//!
//! Interprets one declarative `ActionStep`: resolve parameters, locate the
//! element if the action needs one, perform, report. Nothing is carried over
//! between invocations.

use std::time::Duration;

use super::context::TestContext;
use super::events::{EventEmitter, TestEvent};
use super::resilience::{Located, Resilience};
use super::scroll_search::ScrollSearch;
use crate::driver::finder::Readiness;
use crate::driver::gesture::{GestureEngine, ScrollDirection};
use crate::driver::traits::{AutomationDriver, Point};
use crate::error::{FlowError, Result};
use crate::locator::{LocatorChain, LocatorTable};
use crate::parser::types::{ActionKind, ActionStep};
use crate::utils::config::RunnerConfig;

const DEFAULT_SCROLL_DIRECTION: &str = "down";
const DEFAULT_SCROLL_DISTANCE: i64 = 500;
const DEFAULT_MAX_SCROLLS: i64 = 10;
const DEFAULT_WAIT_MS: u64 = 1000;
const DEFAULT_LONG_TAP_MS: u64 = 2000;

/// Defaults of the swipe action: (startX, startY, endX, endY, duration)
const DEFAULT_SWIPE: (i64, i64, i64, i64, u64) = (500, 1000, 500, 500, 600);

/// What happened to one action
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Performed,
    /// Nothing to do (unknown action type, empty text)
    Skipped(String),
    /// Optional action failed; the error was logged and swallowed
    Suppressed(String),
}

pub struct ActionExecutor<'a> {
    driver: &'a dyn AutomationDriver,
    locators: LocatorTable<'a>,
    context: &'a TestContext,
    config: &'a RunnerConfig,
    emitter: &'a EventEmitter,
}

impl<'a> ActionExecutor<'a> {
    pub fn new(
        driver: &'a dyn AutomationDriver,
        locators: LocatorTable<'a>,
        context: &'a TestContext,
        config: &'a RunnerConfig,
        emitter: &'a EventEmitter,
    ) -> Self {
        Self {
            driver,
            locators,
            context,
            config,
            emitter,
        }
    }

    /// Execute one action
    ///
    /// Failures of optional actions are logged and reported as `Suppressed`;
    /// anything else comes back wrapped in `ActionExecution`.
    pub async fn execute(&self, step: &ActionStep) -> Result<ActionOutcome> {
        if let Some(ref description) = step.description {
            log::info!("[{}] {}", self.context.suite_name, description);
        }
        log::debug!("Executing {}", step.display_name());

        match self.perform(step).await {
            Ok(outcome) => Ok(outcome),
            Err(e) if step.optional => {
                log::warn!(
                    "Optional action {} failed, continuing: {}",
                    step.display_name(),
                    e
                );
                self.emitter.emit(TestEvent::ActionSuppressed {
                    action: step.display_name(),
                    error: e.to_string(),
                });
                Ok(ActionOutcome::Suppressed(e.to_string()))
            }
            Err(e) => {
                log::error!("Action {} failed: {}", step.display_name(), e);
                Err(FlowError::ActionExecution {
                    action: step.action_type.name().to_string(),
                    source: Box::new(e),
                })
            }
        }
    }

    async fn perform(&self, step: &ActionStep) -> Result<ActionOutcome> {
        match step.action_type {
            ActionKind::Click => self.click(step).await?,
            ActionKind::SendKeys => return self.send_keys(step).await,
            ActionKind::Clear => {
                let located = self.locate(step, Readiness::Present).await?;
                self.driver.clear(&located.element).await?;
            }
            ActionKind::Scroll => {
                let direction =
                    ScrollDirection::parse(&step.param_str("direction", DEFAULT_SCROLL_DIRECTION));
                let distance = param_i32(step, "distance", DEFAULT_SCROLL_DISTANCE)?;
                self.gestures()
                    .scroll(direction, distance, self.config.scroll_duration_ms)
                    .await?;
            }
            ActionKind::ScrollToElement => {
                let chain = self.chain(step)?;
                let direction =
                    ScrollDirection::parse(&step.param_str("direction", DEFAULT_SCROLL_DIRECTION));
                let distance = param_i32(step, "distance", DEFAULT_SCROLL_DISTANCE)?;
                let max_scrolls = param_count(step, "maxScrolls", DEFAULT_MAX_SCROLLS);
                ScrollSearch::new(self.driver, self.config)
                    .search(&chain, direction, distance, max_scrolls)
                    .await?;
            }
            ActionKind::Swipe => {
                let (sx, sy, ex, ey, duration) = DEFAULT_SWIPE;
                let from = Point::new(
                    param_i32(step, "startX", sx)?,
                    param_i32(step, "startY", sy)?,
                );
                let to = Point::new(param_i32(step, "endX", ex)?, param_i32(step, "endY", ey)?);
                self.gestures()
                    .swipe(from, to, step.param_u64("duration", duration))
                    .await?;
            }
            ActionKind::Wait => {
                let ms = step.param_u64("milliseconds", DEFAULT_WAIT_MS);
                log::debug!("Waiting {}ms", ms);
                tokio::time::sleep(Duration::from_millis(ms)).await;
            }
            ActionKind::WaitForVisible => {
                let timeout = step.param_u64("milliseconds", self.config.default_timeout_ms);
                self.locate_within(step, Readiness::Visible, timeout).await?;
            }
            ActionKind::WaitForClickable => {
                let timeout = step.param_u64("milliseconds", self.config.default_timeout_ms);
                self.locate_within(step, Readiness::Clickable, timeout)
                    .await?;
            }
            ActionKind::Tap => {
                let located = self.locate(step, Readiness::Present).await?;
                let rect = self.driver.rect(&located.element).await?;
                self.gestures().tap(rect.center()).await?;
            }
            ActionKind::LongTap => {
                let located = self.locate(step, Readiness::Present).await?;
                let rect = self.driver.rect(&located.element).await?;
                let hold = step.param_u64("duration", DEFAULT_LONG_TAP_MS);
                self.gestures().press(rect.center(), hold).await?;
            }
            ActionKind::HideKeyboard => {
                Resilience::new(self.driver, self.config)
                    .hide_keyboard()
                    .await?;
            }
            ActionKind::GoBack => self.driver.navigate_back().await?,
            ActionKind::Unknown(ref raw) => {
                log::warn!("Unknown action type '{}', skipping", raw);
                return Ok(ActionOutcome::Skipped(format!("unknown action type '{}'", raw)));
            }
        }
        Ok(ActionOutcome::Performed)
    }

    async fn click(&self, step: &ActionStep) -> Result<()> {
        let chain = self.chain(step)?;
        let timeout = self.element_timeout(step);
        let resilience = Resilience::new(self.driver, self.config);
        let located = resilience
            .locate_for_click(&chain, timeout, scroll_retries(step))
            .await?;
        resilience.click(&located).await?;
        if step.param_bool("waitForNavigation", false) {
            resilience.wait_post_click(&located.element).await;
        }
        Ok(())
    }

    async fn send_keys(&self, step: &ActionStep) -> Result<ActionOutcome> {
        let raw = step.value.as_deref().unwrap_or_default();
        if raw.is_empty() {
            log::warn!("sendKeys without a value for {}, skipping", step.display_name());
            return Ok(ActionOutcome::Skipped("empty value".into()));
        }
        let located = self.locate(step, Readiness::Present).await?;
        self.driver.clear(&located.element).await?;
        let text = self.context.substitute(raw);
        self.driver.send_keys(&located.element, &text).await?;
        Ok(ActionOutcome::Performed)
    }

    fn gestures(&self) -> GestureEngine<'a> {
        GestureEngine::new(self.driver)
    }

    fn chain(&self, step: &ActionStep) -> Result<LocatorChain> {
        match (&step.locator_category, &step.locator_name) {
            (Some(category), Some(name)) => self.locators.resolve_chain(category, name),
            _ => Err(FlowError::configuration(format!(
                "{} requires locatorCategory and locatorName",
                step.action_type.name()
            ))),
        }
    }

    /// `timeout` param in seconds, else the configured default
    fn element_timeout(&self, step: &ActionStep) -> u64 {
        let default_secs = self.config.default_timeout_ms / 1000;
        step.param_u64("timeout", default_secs) * 1000
    }

    async fn locate(&self, step: &ActionStep, readiness: Readiness) -> Result<Located> {
        let timeout = self.element_timeout(step);
        self.locate_within(step, readiness, timeout).await
    }

    async fn locate_within(
        &self,
        step: &ActionStep,
        readiness: Readiness,
        timeout_ms: u64,
    ) -> Result<Located> {
        let chain = self.chain(step)?;
        Resilience::new(self.driver, self.config)
            .locate(&chain, readiness, timeout_ms, scroll_retries(step))
            .await
    }
}

/// Integer parameter that must fit a screen coordinate
fn param_i32(step: &ActionStep, name: &str, default: i64) -> Result<i32> {
    let raw = step.param_i64(name, default);
    i32::try_from(raw).map_err(|_| {
        FlowError::configuration(format!(
            "{} parameter '{}' out of range: {}",
            step.action_type.name(),
            name,
            raw
        ))
    })
}

/// Non-negative count parameter; negatives count as zero, huge values saturate
fn param_count(step: &ActionStep, name: &str, default: i64) -> u32 {
    u32::try_from(step.param_i64(name, default).max(0)).unwrap_or(u32::MAX)
}

fn scroll_retries(step: &ActionStep) -> u32 {
    param_count(step, "scrollRetries", 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::gesture::PointerAction;
    use crate::driver::simulated::{DriverCall, SimElement, SimulatedDriver};
    use crate::driver::traits::Selector;
    use crate::parser::types::{ParamValue, TestConfig};
    use std::collections::HashMap;
    use std::path::Path;
    use tokio::time::Instant;

    fn config() -> TestConfig {
        serde_json::from_str(
            r#"{
                "locators": {
                    "login": {
                        "username": {"type": "id", "value": "com.app:id/user"},
                        "submit": {"type": "id", "value": "com.app:id/submit"},
                        "footer": {"type": "xpath", "value": "//footer"}
                    }
                }
            }"#,
        )
        .unwrap()
    }

    fn context() -> TestContext {
        let data = HashMap::from([("username".to_string(), "alice".to_string())]);
        TestContext::new("smoke", Path::new("out")).with_data(&data)
    }

    fn action(kind: &str, name: Option<&str>) -> ActionStep {
        let mut step = ActionStep::new(ActionKind::from(kind.to_string()));
        if let Some(name) = name {
            step.locator_category = Some("login".into());
            step.locator_name = Some(name.into());
        }
        step
    }

    struct Harness {
        driver: SimulatedDriver,
        config: TestConfig,
        context: TestContext,
        runner: RunnerConfig,
        emitter: EventEmitter,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                driver: SimulatedDriver::new(),
                config: config(),
                context: context(),
                runner: RunnerConfig::default(),
                emitter: EventEmitter::default(),
            }
        }

        fn executor(&self) -> ActionExecutor<'_> {
            ActionExecutor::new(
                &self.driver,
                LocatorTable::from_config(&self.config),
                &self.context,
                &self.runner,
                &self.emitter,
            )
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_keys_clears_and_substitutes() {
        let h = Harness::new();
        let field = h
            .driver
            .add_element(&Selector::Id("com.app:id/user".into()), SimElement::default());
        let mut step = action("sendKeys", Some("username"));
        step.value = Some("${testData.username}".into());

        let outcome = h.executor().execute(&step).await.unwrap();
        assert_eq!(outcome, ActionOutcome::Performed);
        assert_eq!(
            h.driver.calls(),
            vec![
                DriverCall::Clear(field.clone()),
                DriverCall::SendKeys(field.clone(), "alice".into())
            ]
        );
        assert_eq!(h.driver.value_of(&field), "alice");
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_keys_empty_value_is_noop() {
        let h = Harness::new();
        let step = action("enterText", Some("username"));
        let outcome = h.executor().execute(&step).await.unwrap();
        assert!(matches!(outcome, ActionOutcome::Skipped(_)));
        assert!(h.driver.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_sleeps_without_touching_elements() {
        let h = Harness::new();
        let mut step = action("wait", None);
        step.params
            .insert("milliseconds".into(), ParamValue::Int(500));

        let start = Instant::now();
        h.executor().execute(&step).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(500));
        assert!(h.driver.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_action_is_skipped() {
        let h = Harness::new();
        let outcome = h
            .executor()
            .execute(&action("pinchZoom", None))
            .await
            .unwrap();
        assert!(matches!(outcome, ActionOutcome::Skipped(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_required_failure_is_wrapped() {
        let h = Harness::new();
        let err = h
            .executor()
            .execute(&action("click", Some("submit")))
            .await
            .unwrap_err();
        match err {
            FlowError::ActionExecution { action, source } => {
                assert_eq!(action, "click");
                assert!(matches!(*source, FlowError::ElementNotFound { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_optional_failure_is_suppressed() {
        let h = Harness::new();
        let mut receiver = h.emitter.subscribe();
        let mut step = action("click", Some("submit"));
        step.optional = true;

        let outcome = h.executor().execute(&step).await.unwrap();
        assert!(matches!(outcome, ActionOutcome::Suppressed(_)));
        assert!(matches!(
            receiver.try_recv().unwrap(),
            TestEvent::ActionSuppressed { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_click_timeout_param_is_seconds() {
        let h = Harness::new();
        let mut step = action("click", Some("submit"));
        step.params.insert("timeout".into(), ParamValue::Int(3));

        let start = Instant::now();
        let _ = h.executor().execute(&step).await;
        // clickable for 3s, then presence for 3s
        assert_eq!(start.elapsed(), Duration::from_millis(6000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_click_waits_for_navigation_when_asked() {
        let h = Harness::new();
        let button = h.driver.add_element(
            &Selector::Id("com.app:id/submit".into()),
            SimElement {
                hides_on_click: true,
                ..Default::default()
            },
        );
        let mut step = action("click", Some("submit"));
        step.params
            .insert("waitForNavigation".into(), ParamValue::Bool(true));

        let start = Instant::now();
        h.executor().execute(&step).await.unwrap();
        assert_eq!(h.driver.calls(), vec![DriverCall::Click(button)]);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scroll_to_element_with_max_scrolls() {
        let h = Harness::new();
        let mut step = action("scrollToElement", Some("footer"));
        step.params.insert("maxScrolls".into(), ParamValue::Int(3));

        let err = h.executor().execute(&step).await.unwrap_err();
        assert!(matches!(err, FlowError::ActionExecution { .. }));
        assert_eq!(h.driver.gesture_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_swipe_defaults() {
        let h = Harness::new();
        h.executor().execute(&action("swipe", None)).await.unwrap();
        let gesture = &h.driver.gestures()[0];
        assert_eq!(
            gesture.actions[2],
            PointerAction::Move {
                x: 500,
                y: 500,
                duration_ms: 600
            }
        );
        assert_eq!(gesture.points()[0], Point::new(500, 1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_tap_holds_at_center() {
        let h = Harness::new();
        h.driver
            .add_element(&Selector::Id("com.app:id/submit".into()), SimElement::default());
        h.executor()
            .execute(&action("longTap", Some("submit")))
            .await
            .unwrap();
        let gesture = &h.driver.gestures()[0];
        assert_eq!(gesture.points(), vec![Point::new(250, 240)]);
        assert!(gesture
            .actions
            .contains(&PointerAction::Pause { duration_ms: 2000 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_locator_fields_is_configuration_error() {
        let h = Harness::new();
        let err = h
            .executor()
            .execute(&action("tap", None))
            .await
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_visible_uses_milliseconds() {
        let h = Harness::new();
        let mut step = action("waitForVisible", Some("footer"));
        step.params
            .insert("milliseconds".into(), ParamValue::Int(1500));
        let start = Instant::now();
        assert!(h.executor().execute(&step).await.is_err());
        assert_eq!(start.elapsed(), Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hide_keyboard_and_back() {
        let h = Harness::new();
        h.executor()
            .execute(&action("hideKeyboard", None))
            .await
            .unwrap();
        h.executor().execute(&action("goBack", None)).await.unwrap();
        assert_eq!(
            h.driver.calls(),
            vec![DriverCall::HideKeyboard, DriverCall::NavigateBack]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_hide_keyboard_presses_back_when_dismiss_fails() {
        let h = Harness::new();
        h.driver.fail_hide_keyboard(true);
        let outcome = h
            .executor()
            .execute(&action("hideKeyboard", None))
            .await
            .unwrap();
        assert_eq!(outcome, ActionOutcome::Performed);
        assert_eq!(
            h.driver.calls(),
            vec![DriverCall::HideKeyboard, DriverCall::NavigateBack]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_scroll_defaults_drag_up_from_center() {
        let h = Harness::new();
        h.executor().execute(&action("scroll", None)).await.unwrap();
        let gesture = &h.driver.gestures()[0];
        assert_eq!(
            gesture.points(),
            vec![Point::new(540, 1170), Point::new(540, 670)]
        );
        assert_eq!(
            gesture.actions[2],
            PointerAction::Move {
                x: 540,
                y: 670,
                duration_ms: 600
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_optional_scroll_with_extreme_distance() {
        let h = Harness::new();
        let mut step = action("scroll", None);
        step.optional = true;
        step.params
            .insert("distance".into(), ParamValue::Int(i32::MIN as i64));

        let outcome = h.executor().execute(&step).await.unwrap();
        assert_eq!(outcome, ActionOutcome::Performed);
        // clamped to the bottom edge
        assert_eq!(
            h.driver.gestures()[0].points(),
            vec![Point::new(540, 1170), Point::new(540, 2339)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_range_distance_is_configuration_error() {
        let h = Harness::new();
        let mut step = action("scroll", None);
        step.params
            .insert("distance".into(), ParamValue::Int(4_294_967_796));

        let err = h.executor().execute(&step).await.unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(h.driver.gesture_count(), 0);

        step.optional = true;
        let outcome = h.executor().execute(&step).await.unwrap();
        assert!(matches!(outcome, ActionOutcome::Suppressed(_)));
        assert_eq!(h.driver.gesture_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_swipe_rejects_out_of_range_coordinate() {
        let h = Harness::new();
        let mut step = action("swipe", None);
        step.params
            .insert("endY".into(), ParamValue::Int(i64::from(i32::MAX) + 1));
        let err = h.executor().execute(&step).await.unwrap_err();
        assert!(err.is_configuration());
        assert!(h.driver.gestures().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tap_at_center_without_hold() {
        let h = Harness::new();
        h.driver
            .add_element(&Selector::Id("com.app:id/submit".into()), SimElement::default());
        h.executor()
            .execute(&action("tap", Some("submit")))
            .await
            .unwrap();
        let gesture = &h.driver.gestures()[0];
        assert_eq!(gesture.points(), vec![Point::new(250, 240)]);
        assert!(!gesture
            .actions
            .iter()
            .any(|a| matches!(a, PointerAction::Pause { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_empties_the_field() {
        let h = Harness::new();
        let field = h
            .driver
            .add_element(&Selector::Id("com.app:id/user".into()), SimElement::default());
        h.executor()
            .execute(&action("clear", Some("username")))
            .await
            .unwrap();
        assert_eq!(h.driver.calls(), vec![DriverCall::Clear(field)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_clickable_times_out_on_disabled_element() {
        let h = Harness::new();
        h.driver.add_element(
            &Selector::XPath("//footer".into()),
            SimElement {
                enabled: false,
                ..Default::default()
            },
        );
        let mut step = action("waitForClickable", Some("footer"));
        step.params
            .insert("milliseconds".into(), ParamValue::Int(1500));

        let start = Instant::now();
        let err = h.executor().execute(&step).await.unwrap_err();
        assert_eq!(start.elapsed(), Duration::from_millis(1500));
        match err {
            FlowError::ActionExecution { source, .. } => assert!(matches!(
                *source,
                FlowError::ElementNotFound {
                    readiness: Readiness::Clickable,
                    timeout_ms: 1500,
                    ..
                }
            )),
            other => panic!("unexpected error: {other}"),
        }
    }
}
