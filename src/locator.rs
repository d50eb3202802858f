//! Locator resolution: (category, name) -> typed selector

use crate::driver::traits::Selector;
use crate::error::{FlowError, Result};
use crate::parser::types::{LocatorConfig, TestConfig};
use std::collections::HashMap;

/// Widget class searched relative to a label when none is configured
pub const DEFAULT_LABEL_TARGET: &str = "android.widget.EditText";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocatorKind {
    Id,
    XPath,
    ClassName,
    AccessibilityId,
    AndroidUiAutomator,
}

impl LocatorKind {
    /// Case-insensitive kind name; unknown or missing kinds are XPath
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return LocatorKind::XPath;
        };
        match raw.trim().to_uppercase().as_str() {
            "ID" => LocatorKind::Id,
            "XPATH" => LocatorKind::XPath,
            "CLASS_NAME" => LocatorKind::ClassName,
            "ACCESSIBILITY_ID" => LocatorKind::AccessibilityId,
            "ANDROID_UIAUTOMATOR" => LocatorKind::AndroidUiAutomator,
            other => {
                log::debug!("Unknown locator type '{}', treating as xpath", other);
                LocatorKind::XPath
            }
        }
    }

    pub fn selector(self, value: &str) -> Selector {
        let value = value.to_string();
        match self {
            LocatorKind::Id => Selector::Id(value),
            LocatorKind::XPath => Selector::XPath(value),
            LocatorKind::ClassName => Selector::ClassName(value),
            LocatorKind::AccessibilityId => Selector::AccessibilityId(value),
            LocatorKind::AndroidUiAutomator => Selector::UiAutomator(value),
        }
    }
}

fn to_selector(config: &LocatorConfig) -> Selector {
    LocatorKind::parse(config.kind.as_deref()).selector(&config.value)
}

/// Primary selector, its ordered alternatives and the label hint
#[derive(Debug, Clone, PartialEq)]
pub struct LocatorChain {
    pub primary: Selector,
    pub fallbacks: Vec<Selector>,
    pub label: Option<String>,
    pub label_target: String,
}

impl LocatorChain {
    pub fn single(primary: Selector) -> Self {
        Self {
            primary,
            fallbacks: Vec::new(),
            label: None,
            label_target: DEFAULT_LABEL_TARGET.to_string(),
        }
    }

    /// Primary first, then fallbacks in configured order
    pub fn selectors(&self) -> impl Iterator<Item = &Selector> {
        std::iter::once(&self.primary).chain(self.fallbacks.iter())
    }
}

/// Read-only view over the configured locator table
#[derive(Debug, Clone, Copy)]
pub struct LocatorTable<'a> {
    table: Option<&'a HashMap<String, HashMap<String, LocatorConfig>>>,
}

impl<'a> LocatorTable<'a> {
    pub fn from_config(config: &'a TestConfig) -> Self {
        Self {
            table: config.locators.as_ref(),
        }
    }

    pub fn resolve(&self, category: &str, name: &str) -> Result<Selector> {
        let selector = to_selector(self.entry(category, name)?);
        log::debug!("Resolved {}.{} -> {}", category, name, selector);
        Ok(selector)
    }

    pub fn resolve_chain(&self, category: &str, name: &str) -> Result<LocatorChain> {
        let entry = self.entry(category, name)?;
        Ok(LocatorChain {
            primary: to_selector(entry),
            fallbacks: entry.fallbacks.iter().map(to_selector).collect(),
            label: entry.label.clone().filter(|l| !l.trim().is_empty()),
            label_target: entry
                .label_target
                .clone()
                .unwrap_or_else(|| DEFAULT_LABEL_TARGET.to_string()),
        })
    }

    fn entry(&self, category: &str, name: &str) -> Result<&'a LocatorConfig> {
        let table = self
            .table
            .ok_or_else(|| FlowError::configuration("Locators not loaded"))?;
        let group = table.get(category).ok_or_else(|| {
            FlowError::configuration(format!("Locator category not found: {}", category))
        })?;
        group.get(name).ok_or_else(|| {
            FlowError::configuration(format!("Locator not found: {}.{}", category, name))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TestConfig {
        serde_json::from_str(
            r#"{
                "locators": {
                    "login": {
                        "username": {"type": "ID", "value": "com.app:id/user"},
                        "submit": {"value": "//android.widget.Button[@text='Login']"},
                        "menu": {"type": "accessibility_id", "value": "Open menu"},
                        "odd": {"type": "css", "value": "//odd"},
                        "name": {
                            "type": "id",
                            "value": "com.app:id/name",
                            "fallbacks": [
                                {"type": "android_uiautomator", "value": "new UiSelector().text(\"Name\")"},
                                {"type": "class_name", "value": "android.widget.EditText"}
                            ],
                            "label": "Full name"
                        }
                    }
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_kind_dispatch() {
        let config = config();
        let table = LocatorTable::from_config(&config);
        assert_eq!(
            table.resolve("login", "username").unwrap(),
            Selector::Id("com.app:id/user".into())
        );
        assert_eq!(
            table.resolve("login", "menu").unwrap(),
            Selector::AccessibilityId("Open menu".into())
        );
        assert!(matches!(
            table.resolve("login", "submit").unwrap(),
            Selector::XPath(_)
        ));
        assert!(matches!(
            table.resolve("login", "odd").unwrap(),
            Selector::XPath(_)
        ));
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let config = config();
        let table = LocatorTable::from_config(&config);
        let first = table.resolve_chain("login", "name").unwrap();
        for _ in 0..10 {
            assert_eq!(table.resolve_chain("login", "name").unwrap(), first);
        }
    }

    #[test]
    fn test_chain_order_and_label() {
        let config = config();
        let chain = LocatorTable::from_config(&config)
            .resolve_chain("login", "name")
            .unwrap();
        let kinds: Vec<&str> = chain.selectors().map(Selector::strategy).collect();
        assert_eq!(kinds, vec!["id", "-android uiautomator", "class name"]);
        assert_eq!(chain.label.as_deref(), Some("Full name"));
        assert_eq!(chain.label_target, DEFAULT_LABEL_TARGET);
    }

    #[test]
    fn test_configuration_errors() {
        let config = config();
        let table = LocatorTable::from_config(&config);
        let missing_cat = table.resolve("signup", "x").unwrap_err();
        assert!(missing_cat.to_string().contains("Locator category not found: signup"));
        let missing_name = table.resolve("login", "x").unwrap_err();
        assert!(missing_name.to_string().contains("Locator not found: login.x"));

        let empty = TestConfig::default();
        let err = LocatorTable::from_config(&empty)
            .resolve("login", "username")
            .unwrap_err();
        assert!(err.is_configuration());
    }
}
