//! Error taxonomy for flow execution
//!
//! `DriverError` is what the automation boundary reports. `FlowError` is what
//! the engine reports upward: configuration problems, elements that never
//! became ready, and wrapped action failures.

use crate::driver::finder::Readiness;
use crate::driver::traits::Selector;
use thiserror::Error;

/// Failures reported by an automation driver
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("no such element: {0}")]
    NoSuchElement(String),

    #[error("stale element reference: {0}")]
    StaleElement(String),

    #[error("driver request failed: {0}")]
    Request(String),

    #[error("{0}")]
    Other(String),
}

impl DriverError {
    /// Not-found and stale answers mean "not ready yet" while polling
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DriverError::NoSuchElement(_) | DriverError::StaleElement(_)
        )
    }
}

pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// Failures surfaced by the flow engine
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("element {selector} not {readiness} within {timeout_ms}ms")]
    ElementNotFound {
        selector: Selector,
        readiness: Readiness,
        timeout_ms: u64,
    },

    #[error("Action failed: {action} - {source}")]
    ActionExecution {
        action: String,
        #[source]
        source: Box<FlowError>,
    },

    #[error("gesture dispatch failed: {0}")]
    GestureDispatch(String),

    #[error("all {what} strategies failed: {}", .attempts.join("; "))]
    StrategiesExhausted { what: String, attempts: Vec<String> },

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid CSV: {0}")]
    Csv(#[from] csv::Error),
}

impl FlowError {
    pub fn configuration(message: impl Into<String>) -> Self {
        FlowError::Configuration(message.into())
    }

    pub fn is_configuration(&self) -> bool {
        match self {
            FlowError::Configuration(_) => true,
            FlowError::ActionExecution { source, .. } => source.is_configuration(),
            _ => false,
        }
    }

    /// Render the cause chain, one cause per line, outermost first
    pub fn trace(&self) -> String {
        let mut lines = vec![self.to_string()];
        let mut current: Option<&dyn std::error::Error> = std::error::Error::source(self);
        while let Some(cause) = current {
            lines.push(format!("caused by: {}", cause));
            current = cause.source();
        }
        lines.join("\n")
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        assert!(DriverError::NoSuchElement("x".into()).is_not_found());
        assert!(DriverError::StaleElement("x".into()).is_not_found());
        assert!(!DriverError::Request("timeout".into()).is_not_found());
    }

    #[test]
    fn test_element_not_found_display() {
        let err = FlowError::ElementNotFound {
            selector: Selector::Id("com.app:id/login".into()),
            readiness: Readiness::Visible,
            timeout_ms: 2000,
        };
        assert_eq!(
            err.to_string(),
            "element id=com.app:id/login not visible within 2000ms"
        );
    }

    #[test]
    fn test_action_execution_trace_lists_causes() {
        let err = FlowError::ActionExecution {
            action: "click".into(),
            source: Box::new(FlowError::Driver(DriverError::Request(
                "connection refused".into(),
            ))),
        };
        let trace = err.trace();
        assert!(trace.starts_with("Action failed: click - driver request failed"));
        assert!(trace.contains("caused by: driver request failed: connection refused"));
    }

    #[test]
    fn test_configuration_detected_through_wrapper() {
        let err = FlowError::ActionExecution {
            action: "tap".into(),
            source: Box::new(FlowError::configuration("Locator category not found: login")),
        };
        assert!(err.is_configuration());
        assert!(!FlowError::GestureDispatch("x".into()).is_configuration());
    }
}
