//! Scroll until an element is genuinely visible
//!
//! Each iteration probes every selector of the chain and scrolls once if none
//! is displayed. Chains with a label hint get two more chances after the loop:
//! a label-relative lookup, then a few fixed coordinate scrolls.

use super::resilience::Located;
use crate::driver::common::{xpath_literal, xpath_upper};
use crate::driver::finder::{ElementFinder, Readiness};
use crate::driver::gesture::{GestureEngine, ScrollDirection};
use crate::driver::traits::{AutomationDriver, ElementId, Point, Selector};
use crate::error::{FlowError, Result};
use crate::locator::LocatorChain;
use crate::utils::config::RunnerConfig;

/// Finger travel time of the coordinate fallback scroll
const COORDINATE_SCROLL_MS: u64 = 450;

/// XPath candidates for a visible text label, strictest first
pub fn label_candidates(label: &str) -> Vec<Selector> {
    let exact = xpath_literal(label);
    let upper = xpath_literal(&label.to_uppercase());
    vec![
        Selector::XPath(format!("//android.widget.TextView[@text={}]", exact)),
        Selector::XPath(format!(
            "//android.widget.TextView[contains(@text, {})]",
            exact
        )),
        Selector::XPath(format!(
            "//android.widget.TextView[contains({}, {})]",
            xpath_upper("@text"),
            upper
        )),
        Selector::XPath(format!(
            "//android.widget.TextView[contains({}, {})]",
            xpath_upper("@content-desc"),
            upper
        )),
    ]
}

/// Paths from a label to the field it describes, in preference order
pub fn relative_paths(target_class: &str) -> Vec<String> {
    vec![
        format!("following-sibling::{}[1]", target_class),
        format!("ancestor::android.view.ViewGroup[1]//{}[1]", target_class),
        format!("following::{}[1]", target_class),
    ]
}

pub struct ScrollSearch<'a> {
    driver: &'a dyn AutomationDriver,
    config: &'a RunnerConfig,
}

impl<'a> ScrollSearch<'a> {
    pub fn new(driver: &'a dyn AutomationDriver, config: &'a RunnerConfig) -> Self {
        Self { driver, config }
    }

    pub async fn search(
        &self,
        chain: &LocatorChain,
        direction: ScrollDirection,
        distance: i32,
        max_scrolls: u32,
    ) -> Result<Located> {
        let finder = ElementFinder::new(self.driver, self.config.poll_interval_ms);
        let gestures = GestureEngine::new(self.driver);

        for iteration in 0..max_scrolls {
            for selector in chain.selectors() {
                if let Some(element) = finder.probe(selector, self.config.probe_timeout_ms).await {
                    log::info!(
                        "Found {} after {} scrolls",
                        selector,
                        iteration
                    );
                    return Ok(Located {
                        element,
                        selector: selector.clone(),
                    });
                }
            }
            log::debug!(
                "Scroll {}/{} looking for {}",
                iteration + 1,
                max_scrolls,
                chain.primary
            );
            gestures
                .scroll(direction, distance, self.config.scroll_duration_ms)
                .await?;
        }

        if let Some(ref label) = chain.label {
            if let Some(found) = self.label_fallback(chain, label, max_scrolls).await? {
                return Ok(found);
            }
        }

        Err(FlowError::ElementNotFound {
            selector: chain.primary.clone(),
            readiness: Readiness::Visible,
            timeout_ms: u64::from(max_scrolls) * self.config.probe_timeout_ms,
        })
    }

    async fn label_fallback(
        &self,
        chain: &LocatorChain,
        label: &str,
        max_scrolls: u32,
    ) -> Result<Option<Located>> {
        log::info!("Falling back to label '{}' for {}", label, chain.primary);
        if let Some(found) = self.near_label(label, &chain.label_target).await {
            return Ok(Some(found));
        }

        let attempts = self
            .config
            .coordinate_scroll_attempts
            .min(max_scrolls)
            .max(1);
        let gestures = GestureEngine::new(self.driver);
        for attempt in 1..=attempts {
            let size = self
                .driver
                .window_size()
                .await
                .map_err(|e| FlowError::GestureDispatch(e.to_string()))?;
            let from = Point::new(size.width / 2, size.height * 85 / 100);
            let to = Point::new(size.width / 2, size.height * 30 / 100);
            log::debug!("Coordinate scroll {}/{}", attempt, attempts);
            gestures.swipe(from, to, COORDINATE_SCROLL_MS).await?;

            for selector in chain.selectors() {
                if let Some(element) = self.first_displayed(selector).await {
                    return Ok(Some(Located {
                        element,
                        selector: selector.clone(),
                    }));
                }
            }
            if let Some(found) = self.near_label(label, &chain.label_target).await {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    /// Locate the label, then the target relative to it
    async fn near_label(&self, label: &str, target_class: &str) -> Option<Located> {
        for candidate in label_candidates(label) {
            let Some(label_element) = self.first_displayed(&candidate).await else {
                continue;
            };
            for path in relative_paths(target_class) {
                let relative = Selector::XPath(path.clone());
                let found = match self
                    .driver
                    .find_elements_from(&label_element, &relative)
                    .await
                {
                    Ok(found) => found,
                    Err(e) => {
                        log::debug!("Relative path {} failed: {}", path, e);
                        continue;
                    }
                };
                if let Some(element) = found.into_iter().next() {
                    log::info!("Located field via label-relative path: {}", path);
                    return Some(Located {
                        element,
                        selector: Selector::XPath(format!("({})/{}", candidate.value(), path)),
                    });
                }
            }
            return None;
        }
        None
    }

    async fn first_displayed(&self, selector: &Selector) -> Option<ElementId> {
        let found = self.driver.find_elements(selector).await.ok()?;
        for element in found {
            if let Ok(true) = self.driver.is_displayed(&element).await {
                return Some(element);
            }
        }
        None
    }
}
