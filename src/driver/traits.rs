use crate::driver::gesture::PointerSequence;
use crate::error::DriverResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Element selector understood by the automation server
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// Select by resource ID
    Id(String),
    /// Select by XPath
    XPath(String),
    /// Select by widget class name
    ClassName(String),
    /// Select by accessibility ID (content-desc on Android)
    AccessibilityId(String),
    /// Select by UiAutomator query
    UiAutomator(String),
}

impl Selector {
    /// Location strategy name used on the wire
    pub fn strategy(&self) -> &'static str {
        match self {
            Selector::Id(_) => "id",
            Selector::XPath(_) => "xpath",
            Selector::ClassName(_) => "class name",
            Selector::AccessibilityId(_) => "accessibility id",
            Selector::UiAutomator(_) => "-android uiautomator",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Selector::Id(v)
            | Selector::XPath(v)
            | Selector::ClassName(v)
            | Selector::AccessibilityId(v)
            | Selector::UiAutomator(v) => v,
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.strategy(), self.value())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub fn center(&self) -> Point {
        Point::new(self.width / 2, self.height / 2)
    }
}

/// Element bounds: location plus size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2, self.y + self.height / 2)
    }
}

/// Opaque handle to an element returned by the server
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementId(pub String);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Automation driver boundary
///
/// Everything the flow engine needs from a device session. Every call may be
/// slow, and element calls may fail with not-found or stale answers that the
/// engine treats as "not ready yet".
#[async_trait]
pub trait AutomationDriver: Send + Sync {
    /// Find every element matching the selector (empty when none match)
    async fn find_elements(&self, selector: &Selector) -> DriverResult<Vec<ElementId>>;

    /// Find elements relative to a root element
    async fn find_elements_from(
        &self,
        root: &ElementId,
        selector: &Selector,
    ) -> DriverResult<Vec<ElementId>>;

    async fn is_displayed(&self, element: &ElementId) -> DriverResult<bool>;

    async fn is_enabled(&self, element: &ElementId) -> DriverResult<bool>;

    async fn rect(&self, element: &ElementId) -> DriverResult<Rect>;

    async fn click(&self, element: &ElementId) -> DriverResult<()>;

    /// Click through a server-side script instead of the native tap path
    async fn script_click(&self, element: &ElementId) -> DriverResult<()>;

    async fn clear(&self, element: &ElementId) -> DriverResult<()>;

    async fn send_keys(&self, element: &ElementId, text: &str) -> DriverResult<()>;

    /// Dispatch a single-finger pointer sequence
    async fn perform_gesture(&self, gesture: &PointerSequence) -> DriverResult<()>;

    async fn window_size(&self) -> DriverResult<Size>;

    /// UI hierarchy dump
    async fn page_source(&self) -> DriverResult<String>;

    /// PNG bytes of the current screen
    async fn screenshot(&self) -> DriverResult<Vec<u8>>;

    async fn hide_keyboard(&self) -> DriverResult<()>;

    async fn navigate_back(&self) -> DriverResult<()>;

    /// Stop the app; returns whether it was running
    async fn terminate_app(&self, app_id: &str) -> DriverResult<bool>;

    async fn activate_app(&self, app_id: &str) -> DriverResult<()>;

    /// Session capability negotiated at connect time
    fn capability(&self, name: &str) -> Option<String>;

    /// End the session
    async fn quit(&self) -> DriverResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_strategies() {
        assert_eq!(Selector::Id("a".into()).strategy(), "id");
        assert_eq!(Selector::ClassName("a".into()).strategy(), "class name");
        assert_eq!(
            Selector::UiAutomator("new UiSelector()".into()).strategy(),
            "-android uiautomator"
        );
        assert_eq!(
            Selector::XPath("//a".into()).to_string(),
            "xpath=//a"
        );
    }

    #[test]
    fn test_rect_center() {
        let rect = Rect {
            x: 100,
            y: 200,
            width: 50,
            height: 20,
        };
        assert_eq!(rect.center(), Point::new(125, 210));
    }
}
