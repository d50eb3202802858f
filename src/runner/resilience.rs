//! Retry and fallback strategies for locating and clicking
//!
//! Each chain is an ordered list of strategies evaluated with early exit. A
//! strategy's failure is logged and swallowed; the chain only fails when
//! every strategy has failed.

use crate::driver::finder::{ElementFinder, Readiness};
use crate::driver::gesture::{GestureEngine, ScrollDirection, TAP_HOLD_MS};
use crate::driver::traits::{AutomationDriver, ElementId, Selector};
use crate::error::{FlowError, Result};
use crate::locator::LocatorChain;
use crate::utils::config::RunnerConfig;
use std::fmt;
use std::future::Future;

/// Scroll distance used between locate retries
const RETRY_SCROLL_DISTANCE: i32 = 500;

/// Run `attempt` for each strategy in order and return the first success
///
/// On exhaustion every strategy is returned with the error it produced.
pub async fn first_success<S, T, F, Fut>(
    strategies: impl IntoIterator<Item = S>,
    mut attempt: F,
) -> std::result::Result<T, Vec<(S, FlowError)>>
where
    S: Clone + fmt::Display,
    F: FnMut(S) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut failures = Vec::new();
    for strategy in strategies {
        match attempt(strategy.clone()).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                log::debug!("Strategy '{}' failed: {}", strategy, e);
                failures.push((strategy, e));
            }
        }
    }
    Err(failures)
}

fn describe<S: fmt::Display>(failures: &[(S, FlowError)]) -> Vec<String> {
    failures
        .iter()
        .map(|(s, e)| format!("{}: {}", s, e))
        .collect()
}

/// Click strategies, strongest first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickTier {
    Native,
    Script,
    CoordinateTap,
}

impl ClickTier {
    pub const ORDER: [ClickTier; 3] = [ClickTier::Native, ClickTier::Script, ClickTier::CoordinateTap];
}

impl fmt::Display for ClickTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClickTier::Native => "native click",
            ClickTier::Script => "script click",
            ClickTier::CoordinateTap => "coordinate tap",
        };
        f.write_str(name)
    }
}

/// Ways to dismiss the soft keyboard, preferred first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyboardTier {
    Dismiss,
    BackKey,
}

impl KeyboardTier {
    pub const ORDER: [KeyboardTier; 2] = [KeyboardTier::Dismiss, KeyboardTier::BackKey];
}

impl fmt::Display for KeyboardTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KeyboardTier::Dismiss => "keyboard dismiss",
            KeyboardTier::BackKey => "back key",
        };
        f.write_str(name)
    }
}

/// A located element and the selector that found it
#[derive(Debug, Clone, PartialEq)]
pub struct Located {
    pub element: ElementId,
    pub selector: Selector,
}

/// Locate and click with fallbacks
pub struct Resilience<'a> {
    driver: &'a dyn AutomationDriver,
    config: &'a RunnerConfig,
}

impl<'a> Resilience<'a> {
    pub fn new(driver: &'a dyn AutomationDriver, config: &'a RunnerConfig) -> Self {
        Self { driver, config }
    }

    fn finder(&self) -> ElementFinder<'a> {
        ElementFinder::new(self.driver, self.config.poll_interval_ms)
    }

    /// Locate through the selector chain
    ///
    /// The primary selector gets the full timeout, each fallback the shorter
    /// fallback budget. With `scroll_retries` > 0 the whole chain is probed
    /// again after each of that many scrolls.
    pub async fn locate(
        &self,
        chain: &LocatorChain,
        readiness: Readiness,
        timeout_ms: u64,
        scroll_retries: u32,
    ) -> Result<Located> {
        self.locate_with(chain, readiness, timeout_ms, scroll_retries, false)
            .await
    }

    /// Like [`Self::locate`] for clickability, settling for presence per selector
    pub async fn locate_for_click(
        &self,
        chain: &LocatorChain,
        timeout_ms: u64,
        scroll_retries: u32,
    ) -> Result<Located> {
        self.locate_with(chain, Readiness::Clickable, timeout_ms, scroll_retries, true)
            .await
    }

    async fn locate_with(
        &self,
        chain: &LocatorChain,
        readiness: Readiness,
        timeout_ms: u64,
        scroll_retries: u32,
        degrade: bool,
    ) -> Result<Located> {
        let finder = self.finder();
        let budgets = chain.selectors().enumerate().map(|(i, selector)| {
            let budget = if i == 0 {
                timeout_ms
            } else {
                self.config.fallback_timeout_ms
            };
            Budgeted { selector, budget }
        });

        let outcome = first_success(budgets, |candidate| {
            let finder = &finder;
            async move {
                let element = if degrade {
                    finder
                        .find_clickable_or_present(candidate.selector, candidate.budget)
                        .await?
                } else {
                    finder
                        .find(candidate.selector, candidate.budget, readiness)
                        .await?
                };
                Ok(Located {
                    element,
                    selector: candidate.selector.clone(),
                })
            }
        })
        .await;

        let mut failures = match outcome {
            Ok(located) => return Ok(located),
            Err(failures) => failures,
        };

        // Hard driver failures are not worth scrolling for
        if let Some(pos) = failures
            .iter()
            .position(|(_, e)| !matches!(e, FlowError::ElementNotFound { .. }))
        {
            let (_, e) = failures.swap_remove(pos);
            return Err(e);
        }

        if scroll_retries > 0 {
            if let Some(located) = self.scroll_and_retry(chain, scroll_retries).await? {
                return Ok(located);
            }
        }

        log::debug!(
            "All {} selectors for {} failed: {:?}",
            failures.len(),
            chain.primary,
            describe(&failures)
        );
        Err(not_found(chain, readiness, timeout_ms))
    }

    async fn scroll_and_retry(&self, chain: &LocatorChain, retries: u32) -> Result<Option<Located>> {
        let finder = self.finder();
        let gestures = GestureEngine::new(self.driver);
        for attempt in 1..=retries {
            log::info!(
                "Scroll-and-retry {}/{} for {}",
                attempt,
                retries,
                chain.primary
            );
            gestures
                .scroll(
                    ScrollDirection::Down,
                    RETRY_SCROLL_DISTANCE,
                    self.config.scroll_duration_ms,
                )
                .await?;
            for selector in chain.selectors() {
                if let Some(element) = finder.probe(selector, self.config.fallback_timeout_ms).await {
                    return Ok(Some(Located {
                        element,
                        selector: selector.clone(),
                    }));
                }
            }
        }
        Ok(None)
    }

    /// Click through the tier chain
    pub async fn click(&self, located: &Located) -> Result<ClickTier> {
        let finder = self.finder();
        let gestures = GestureEngine::new(self.driver);

        let outcome = first_success(ClickTier::ORDER, |tier| {
            let finder = &finder;
            let gestures = &gestures;
            async move {
                match tier {
                    ClickTier::Native => {
                        let fresh = finder
                            .find(
                                &located.selector,
                                self.config.click_settle_ms,
                                Readiness::Clickable,
                            )
                            .await?;
                        self.driver.click(&fresh).await?;
                    }
                    ClickTier::Script => self.driver.script_click(&located.element).await?,
                    ClickTier::CoordinateTap => {
                        let rect = self.driver.rect(&located.element).await?;
                        gestures.press(rect.center(), TAP_HOLD_MS).await?;
                    }
                }
                Ok(tier)
            }
        })
        .await;

        match outcome {
            Ok(tier) => {
                if tier != ClickTier::Native {
                    log::info!("Clicked {} via {}", located.selector, tier);
                }
                Ok(tier)
            }
            Err(failures) => Err(FlowError::StrategiesExhausted {
                what: "click".into(),
                attempts: describe(&failures),
            }),
        }
    }

    /// Hide the soft keyboard, pressing back when the driver cannot dismiss it
    pub async fn hide_keyboard(&self) -> Result<KeyboardTier> {
        let outcome = first_success(KeyboardTier::ORDER, |tier| async move {
            match tier {
                KeyboardTier::Dismiss => self.driver.hide_keyboard().await?,
                KeyboardTier::BackKey => self.driver.navigate_back().await?,
            }
            Ok(tier)
        })
        .await;

        match outcome {
            Ok(tier) => {
                if tier != KeyboardTier::Dismiss {
                    log::info!("Keyboard hidden via {}", tier);
                }
                Ok(tier)
            }
            Err(failures) => Err(FlowError::StrategiesExhausted {
                what: "hide keyboard".into(),
                attempts: describe(&failures),
            }),
        }
    }

    /// Best-effort wait for a clicked element to go away
    pub async fn wait_post_click(&self, element: &ElementId) {
        let gone = self
            .finder()
            .wait_until_gone(element, self.config.post_click_timeout_ms)
            .await;
        if !gone {
            log::debug!(
                "Element {} still displayed {}ms after click",
                element,
                self.config.post_click_timeout_ms
            );
        }
    }
}

#[derive(Clone)]
struct Budgeted<'s> {
    selector: &'s Selector,
    budget: u64,
}

impl fmt::Display for Budgeted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}ms)", self.selector, self.budget)
    }
}

fn not_found(chain: &LocatorChain, readiness: Readiness, timeout_ms: u64) -> FlowError {
    FlowError::ElementNotFound {
        selector: chain.primary.clone(),
        readiness,
        timeout_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::simulated::{DriverCall, SimElement, SimulatedDriver};
    use crate::driver::gesture::PointerAction;
    use tokio::time::{Duration, Instant};

    fn chain() -> LocatorChain {
        LocatorChain {
            primary: Selector::Id("primary".into()),
            fallbacks: vec![
                Selector::XPath("//first".into()),
                Selector::XPath("//second".into()),
            ],
            ..LocatorChain::single(Selector::Id("primary".into()))
        }
    }

    #[tokio::test]
    async fn test_first_success_stops_early() {
        let mut tried = Vec::new();
        let result = first_success(["a", "b", "c"], |s| {
            tried.push(s);
            async move {
                if s == "b" {
                    Ok(s)
                } else {
                    Err(FlowError::GestureDispatch(s.into()))
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "b");
        assert_eq!(tried, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_first_success_reports_every_failure() {
        let result: std::result::Result<(), _> = first_success(["a", "b"], |s| async move {
            Err(FlowError::GestureDispatch(s.into()))
        })
        .await;
        let failures = result.unwrap_err();
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[1].0, "b");
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_selector_gets_short_budget() {
        let driver = SimulatedDriver::new();
        driver.add_element(&Selector::XPath("//second".into()), SimElement::default());
        let config = RunnerConfig::default();
        let resilience = Resilience::new(&driver, &config);

        let start = Instant::now();
        let located = resilience
            .locate(&chain(), Readiness::Visible, 10_000, 0)
            .await
            .unwrap();
        assert_eq!(located.selector, Selector::XPath("//second".into()));
        // primary 10s + first fallback 2s
        assert_eq!(start.elapsed(), Duration::from_millis(12_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_chain_reports_primary() {
        let driver = SimulatedDriver::new();
        let config = RunnerConfig::default();
        let resilience = Resilience::new(&driver, &config);

        let err = resilience
            .locate(&chain(), Readiness::Present, 1000, 0)
            .await
            .unwrap_err();
        match err {
            FlowError::ElementNotFound { selector, .. } => {
                assert_eq!(selector, Selector::Id("primary".into()))
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(driver.gesture_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scroll_and_retry_finds_late_element() {
        let driver = SimulatedDriver::new();
        driver.add_element(
            &Selector::Id("primary".into()),
            SimElement {
                appears_after_gestures: 2,
                ..Default::default()
            },
        );
        let config = RunnerConfig::default();
        let resilience = Resilience::new(&driver, &config);

        let located = resilience
            .locate(
                &LocatorChain::single(Selector::Id("primary".into())),
                Readiness::Visible,
                1000,
                3,
            )
            .await
            .unwrap();
        assert_eq!(located.selector, Selector::Id("primary".into()));
        assert_eq!(driver.gesture_count(), 2);
    }

    fn located(driver: &SimulatedDriver) -> Located {
        let selector = Selector::Id("btn".into());
        let element = driver.add_element(&selector, SimElement::default());
        Located { element, selector }
    }

    #[tokio::test(start_paused = true)]
    async fn test_native_click_first() {
        let driver = SimulatedDriver::new();
        let target = located(&driver);
        let config = RunnerConfig::default();
        let tier = Resilience::new(&driver, &config)
            .click(&target)
            .await
            .unwrap();
        assert_eq!(tier, ClickTier::Native);
        assert_eq!(driver.calls(), vec![DriverCall::Click(target.element)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_script_click_when_native_fails() {
        let driver = SimulatedDriver::new();
        driver.fail_native_clicks(true);
        let target = located(&driver);
        let config = RunnerConfig::default();
        let tier = Resilience::new(&driver, &config)
            .click(&target)
            .await
            .unwrap();
        assert_eq!(tier, ClickTier::Script);
    }

    #[tokio::test(start_paused = true)]
    async fn test_coordinate_tap_at_center_as_last_resort() {
        let driver = SimulatedDriver::new();
        driver.fail_native_clicks(true);
        driver.fail_script_clicks(true);
        let target = located(&driver);
        let config = RunnerConfig::default();
        let tier = Resilience::new(&driver, &config)
            .click(&target)
            .await
            .unwrap();
        assert_eq!(tier, ClickTier::CoordinateTap);

        let gestures = driver.gestures();
        assert_eq!(gestures.len(), 1);
        // default rect is (100, 200) 300x80
        assert_eq!(
            gestures[0].actions[0],
            PointerAction::Move {
                x: 250,
                y: 240,
                duration_ms: 0
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_tiers_failing() {
        let driver = SimulatedDriver::new();
        driver.fail_native_clicks(true);
        driver.fail_script_clicks(true);
        driver.fail_gestures(true);
        let target = located(&driver);
        let config = RunnerConfig::default();
        let err = Resilience::new(&driver, &config)
            .click(&target)
            .await
            .unwrap_err();
        match err {
            FlowError::StrategiesExhausted { what, attempts } => {
                assert_eq!(what, "click");
                assert_eq!(attempts.len(), 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_post_click_wait_never_fails() {
        let driver = SimulatedDriver::new();
        let target = located(&driver);
        let config = RunnerConfig::default();
        let start = Instant::now();
        Resilience::new(&driver, &config)
            .wait_post_click(&target.element)
            .await;
        assert_eq!(start.elapsed(), Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_keyboard_dismissed_directly() {
        let driver = SimulatedDriver::new();
        let config = RunnerConfig::default();
        let tier = Resilience::new(&driver, &config)
            .hide_keyboard()
            .await
            .unwrap();
        assert_eq!(tier, KeyboardTier::Dismiss);
        assert_eq!(driver.calls(), vec![DriverCall::HideKeyboard]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keyboard_falls_back_to_back_key() {
        let driver = SimulatedDriver::new();
        driver.fail_hide_keyboard(true);
        let config = RunnerConfig::default();
        let tier = Resilience::new(&driver, &config)
            .hide_keyboard()
            .await
            .unwrap();
        assert_eq!(tier, KeyboardTier::BackKey);
        assert_eq!(
            driver.calls(),
            vec![DriverCall::HideKeyboard, DriverCall::NavigateBack]
        );
    }
}
