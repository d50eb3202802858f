//! Element finder
//!
//! Polls the driver until a selector satisfies a readiness predicate.
//! Not-found and stale answers during polling mean "not ready yet"; any other
//! driver failure ends the wait immediately.

use super::common::{poll_until, wait_until, PollConfig};
use super::traits::{AutomationDriver, ElementId, Selector};
use crate::error::{DriverError, DriverResult, FlowError, Result};
use std::fmt;

/// What "ready" means for a located element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Present,
    Visible,
    Clickable,
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Readiness::Present => "present",
            Readiness::Visible => "visible",
            Readiness::Clickable => "clickable",
        };
        f.write_str(name)
    }
}

pub struct ElementFinder<'a> {
    driver: &'a dyn AutomationDriver,
    poll_interval_ms: u64,
}

impl<'a> ElementFinder<'a> {
    pub fn new(driver: &'a dyn AutomationDriver, poll_interval_ms: u64) -> Self {
        Self {
            driver,
            poll_interval_ms,
        }
    }

    /// Wait until `selector` is `readiness`-ready or `timeout_ms` elapses
    pub async fn find(
        &self,
        selector: &Selector,
        timeout_ms: u64,
        readiness: Readiness,
    ) -> Result<ElementId> {
        log::debug!(
            "Waiting up to {}ms for {} to be {}",
            timeout_ms,
            selector,
            readiness
        );
        let outcome = poll_until(
            || self.check(selector, readiness),
            PollConfig::new(timeout_ms, self.poll_interval_ms),
        )
        .await;

        match outcome {
            Some(Ok(element)) => Ok(element),
            Some(Err(e)) => Err(FlowError::Driver(e)),
            None => Err(FlowError::ElementNotFound {
                selector: selector.clone(),
                readiness,
                timeout_ms,
            }),
        }
    }

    /// Clickable first; on timeout, settle for presence
    pub async fn find_clickable_or_present(
        &self,
        selector: &Selector,
        timeout_ms: u64,
    ) -> Result<ElementId> {
        match self.find(selector, timeout_ms, Readiness::Clickable).await {
            Err(FlowError::ElementNotFound { .. }) => {
                log::debug!("{} never became clickable, waiting for presence", selector);
                self.find(selector, timeout_ms, Readiness::Present).await
            }
            other => other,
        }
    }

    /// Short visibility probe that swallows every failure
    ///
    /// The element must still report displayed after the wait succeeds.
    pub async fn probe(&self, selector: &Selector, timeout_ms: u64) -> Option<ElementId> {
        let element = self
            .find(selector, timeout_ms, Readiness::Visible)
            .await
            .ok()?;
        match self.driver.is_displayed(&element).await {
            Ok(true) => Some(element),
            _ => None,
        }
    }

    /// Wait until the element is hidden or detached
    pub async fn wait_until_gone(&self, element: &ElementId, timeout_ms: u64) -> bool {
        wait_until(
            || async {
                match self.driver.is_displayed(element).await {
                    Ok(displayed) => !displayed,
                    Err(e) => e.is_not_found(),
                }
            },
            PollConfig::new(timeout_ms, self.poll_interval_ms),
        )
        .await
    }

    async fn check(
        &self,
        selector: &Selector,
        readiness: Readiness,
    ) -> Option<DriverResult<ElementId>> {
        match self.first_ready(selector, readiness).await {
            Ok(found) => found.map(Ok),
            Err(e) if e.is_not_found() => None,
            Err(e) => Some(Err(e)),
        }
    }

    async fn first_ready(
        &self,
        selector: &Selector,
        readiness: Readiness,
    ) -> std::result::Result<Option<ElementId>, DriverError> {
        for element in self.driver.find_elements(selector).await? {
            let ready = match readiness {
                Readiness::Present => true,
                Readiness::Visible => self.driver.is_displayed(&element).await?,
                Readiness::Clickable => {
                    self.driver.is_displayed(&element).await?
                        && self.driver.is_enabled(&element).await?
                }
            };
            if ready {
                return Ok(Some(element));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::simulated::{SimElement, SimulatedDriver};
    use tokio::time::{Duration, Instant};

    fn login() -> Selector {
        Selector::Id("com.app:id/login".into())
    }

    #[tokio::test(start_paused = true)]
    async fn test_find_present_element_immediately() {
        let driver = SimulatedDriver::new();
        driver.add_element(&login(), SimElement::default());
        let finder = ElementFinder::new(&driver, 500);

        let start = Instant::now();
        finder
            .find(&login(), 10_000, Readiness::Visible)
            .await
            .unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_element_times_out_with_selector() {
        let driver = SimulatedDriver::new();
        let finder = ElementFinder::new(&driver, 500);

        let start = Instant::now();
        let err = finder
            .find(&login(), 3000, Readiness::Visible)
            .await
            .unwrap_err();
        assert_eq!(start.elapsed(), Duration::from_millis(3000));
        match err {
            FlowError::ElementNotFound {
                selector,
                readiness,
                timeout_ms,
            } => {
                assert_eq!(selector, login());
                assert_eq!(readiness, Readiness::Visible);
                assert_eq!(timeout_ms, 3000);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_answers_are_retried() {
        let driver = SimulatedDriver::new();
        driver.add_element(&login(), SimElement::default());
        driver.stale_lookups(&login(), 2);
        let finder = ElementFinder::new(&driver, 500);

        let start = Instant::now();
        finder
            .find(&login(), 10_000, Readiness::Present)
            .await
            .unwrap();
        assert_eq!(start.elapsed(), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_element_falls_back_to_presence() {
        let driver = SimulatedDriver::new();
        driver.add_element(
            &login(),
            SimElement {
                enabled: false,
                ..Default::default()
            },
        );
        let finder = ElementFinder::new(&driver, 500);

        let start = Instant::now();
        let found = finder.find_clickable_or_present(&login(), 2000).await;
        assert!(found.is_ok());
        assert_eq!(start.elapsed(), Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_ignores_hidden_elements() {
        let driver = SimulatedDriver::new();
        driver.add_element(
            &login(),
            SimElement {
                displayed: false,
                ..Default::default()
            },
        );
        let finder = ElementFinder::new(&driver, 500);
        assert!(finder.probe(&login(), 2000).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_gone_after_removal() {
        let driver = SimulatedDriver::new();
        let id = driver.add_element(&login(), SimElement::default());
        let finder = ElementFinder::new(&driver, 500);

        assert!(!finder.wait_until_gone(&id, 1000).await);
        driver.remove_element(&login());
        assert!(finder.wait_until_gone(&id, 1000).await);
    }
}
