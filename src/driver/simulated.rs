//! In-memory device used by `--dry-run` and by the test suite
//!
//! Elements are registered per selector. Every interaction is recorded so
//! callers can assert on what the engine actually did.

use super::gesture::PointerSequence;
use super::traits::{AutomationDriver, ElementId, Rect, Selector, Size};
use crate::error::{DriverError, DriverResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Attributes of a simulated element
#[derive(Debug, Clone)]
pub struct SimElement {
    pub displayed: bool,
    pub enabled: bool,
    pub rect: Rect,
    /// Lookups miss until this many gestures have been performed
    pub appears_after_gestures: usize,
    /// Native or script clicks hide the element (navigation)
    pub hides_on_click: bool,
}

impl Default for SimElement {
    fn default() -> Self {
        Self {
            displayed: true,
            enabled: true,
            rect: Rect {
                x: 100,
                y: 200,
                width: 300,
                height: 80,
            },
            appears_after_gestures: 0,
            hides_on_click: false,
        }
    }
}

/// One recorded interaction
#[derive(Debug, Clone, PartialEq)]
pub enum DriverCall {
    Click(ElementId),
    ScriptClick(ElementId),
    Clear(ElementId),
    SendKeys(ElementId, String),
    Gesture(PointerSequence),
    HideKeyboard,
    NavigateBack,
    TerminateApp(String),
    ActivateApp(String),
    PageSource,
    Screenshot,
}

struct SimNode {
    element: SimElement,
    value: String,
    removed: bool,
}

#[derive(Default)]
struct SimState {
    by_selector: HashMap<Selector, Vec<ElementId>>,
    relative: HashMap<(ElementId, Selector), Vec<ElementId>>,
    nodes: HashMap<ElementId, SimNode>,
    stale_lookups: HashMap<Selector, usize>,
    capabilities: HashMap<String, String>,
    calls: Vec<DriverCall>,
    gesture_count: usize,
    next_id: usize,
    fail_native_click: bool,
    fail_script_click: bool,
    fail_gestures: bool,
    fail_hide_keyboard: bool,
    permissive: bool,
}

impl SimState {
    fn insert(&mut self, element: SimElement) -> ElementId {
        self.next_id += 1;
        let id = ElementId(format!("sim-{}", self.next_id));
        self.nodes.insert(
            id.clone(),
            SimNode {
                element,
                value: String::new(),
                removed: false,
            },
        );
        id
    }

    fn visible_ids(&self, ids: &[ElementId]) -> Vec<ElementId> {
        ids.iter()
            .filter(|id| {
                self.nodes.get(*id).map_or(false, |n| {
                    !n.removed && self.gesture_count >= n.element.appears_after_gestures
                })
            })
            .cloned()
            .collect()
    }

    fn node(&self, id: &ElementId) -> DriverResult<&SimNode> {
        match self.nodes.get(id) {
            Some(node) if !node.removed => Ok(node),
            Some(_) => Err(DriverError::StaleElement(id.to_string())),
            None => Err(DriverError::NoSuchElement(id.to_string())),
        }
    }

    fn node_mut(&mut self, id: &ElementId) -> DriverResult<&mut SimNode> {
        match self.nodes.get_mut(id) {
            Some(node) if !node.removed => Ok(node),
            Some(_) => Err(DriverError::StaleElement(id.to_string())),
            None => Err(DriverError::NoSuchElement(id.to_string())),
        }
    }
}

/// Scriptable in-memory automation driver
pub struct SimulatedDriver {
    window: Size,
    state: Mutex<SimState>,
}

impl Default for SimulatedDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedDriver {
    pub fn new() -> Self {
        Self {
            window: Size {
                width: 1080,
                height: 2340,
            },
            state: Mutex::new(SimState::default()),
        }
    }

    /// Every selector resolves to a displayed element
    pub fn permissive() -> Self {
        let driver = Self::new();
        driver.lock().permissive = true;
        driver
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_element(&self, selector: &Selector, element: SimElement) -> ElementId {
        let mut state = self.lock();
        let id = state.insert(element);
        state
            .by_selector
            .entry(selector.clone())
            .or_default()
            .push(id.clone());
        id
    }

    /// Register an element found by `selector` when searched from `root`
    pub fn add_relative(
        &self,
        root: &ElementId,
        selector: &Selector,
        element: SimElement,
    ) -> ElementId {
        let mut state = self.lock();
        let id = state.insert(element);
        state
            .relative
            .entry((root.clone(), selector.clone()))
            .or_default()
            .push(id.clone());
        id
    }

    /// Detach every element registered under `selector`
    pub fn remove_element(&self, selector: &Selector) {
        let mut state = self.lock();
        let ids = state.by_selector.remove(selector).unwrap_or_default();
        for id in ids {
            if let Some(node) = state.nodes.get_mut(&id) {
                node.removed = true;
            }
        }
    }

    /// The next `count` lookups of `selector` answer with a stale reference
    pub fn stale_lookups(&self, selector: &Selector, count: usize) {
        self.lock().stale_lookups.insert(selector.clone(), count);
    }

    pub fn fail_native_clicks(&self, fail: bool) {
        self.lock().fail_native_click = fail;
    }

    pub fn fail_script_clicks(&self, fail: bool) {
        self.lock().fail_script_click = fail;
    }

    pub fn fail_gestures(&self, fail: bool) {
        self.lock().fail_gestures = fail;
    }

    pub fn fail_hide_keyboard(&self, fail: bool) {
        self.lock().fail_hide_keyboard = fail;
    }

    pub fn set_capability(&self, name: &str, value: &str) {
        self.lock()
            .capabilities
            .insert(name.to_string(), value.to_string());
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        self.lock().calls.clone()
    }

    pub fn gestures(&self) -> Vec<PointerSequence> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                DriverCall::Gesture(g) => Some(g.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn gesture_count(&self) -> usize {
        self.lock().gesture_count
    }

    /// Whether any element interaction (click, typing, clearing) was recorded
    pub fn touched_elements(&self) -> bool {
        self.lock().calls.iter().any(|c| {
            matches!(
                c,
                DriverCall::Click(_)
                    | DriverCall::ScriptClick(_)
                    | DriverCall::Clear(_)
                    | DriverCall::SendKeys(..)
            )
        })
    }

    /// Current field value as typed by the engine
    pub fn value_of(&self, id: &ElementId) -> String {
        self.lock()
            .nodes
            .get(id)
            .map(|n| n.value.clone())
            .unwrap_or_default()
    }

    fn record(&self, call: DriverCall) {
        self.lock().calls.push(call);
    }
}

#[async_trait]
impl AutomationDriver for SimulatedDriver {
    async fn find_elements(&self, selector: &Selector) -> DriverResult<Vec<ElementId>> {
        let mut state = self.lock();
        if let Some(remaining) = state.stale_lookups.get_mut(selector) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(DriverError::StaleElement(selector.to_string()));
            }
        }

        let ids = state
            .by_selector
            .get(selector)
            .map(|ids| state.visible_ids(ids))
            .unwrap_or_default();
        if ids.is_empty() && state.permissive {
            let id = state.insert(SimElement::default());
            state
                .by_selector
                .entry(selector.clone())
                .or_default()
                .push(id.clone());
            return Ok(vec![id]);
        }
        Ok(ids)
    }

    async fn find_elements_from(
        &self,
        root: &ElementId,
        selector: &Selector,
    ) -> DriverResult<Vec<ElementId>> {
        let state = self.lock();
        state.node(root)?;
        Ok(state
            .relative
            .get(&(root.clone(), selector.clone()))
            .map(|ids| state.visible_ids(ids))
            .unwrap_or_default())
    }

    async fn is_displayed(&self, element: &ElementId) -> DriverResult<bool> {
        Ok(self.lock().node(element)?.element.displayed)
    }

    async fn is_enabled(&self, element: &ElementId) -> DriverResult<bool> {
        Ok(self.lock().node(element)?.element.enabled)
    }

    async fn rect(&self, element: &ElementId) -> DriverResult<Rect> {
        Ok(self.lock().node(element)?.element.rect)
    }

    async fn click(&self, element: &ElementId) -> DriverResult<()> {
        let mut state = self.lock();
        if state.fail_native_click {
            return Err(DriverError::Other(format!(
                "element click intercepted: {}",
                element
            )));
        }
        let node = state.node_mut(element)?;
        if node.element.hides_on_click {
            node.element.displayed = false;
        }
        state.calls.push(DriverCall::Click(element.clone()));
        Ok(())
    }

    async fn script_click(&self, element: &ElementId) -> DriverResult<()> {
        let mut state = self.lock();
        if state.fail_script_click {
            return Err(DriverError::Other("script click unsupported".into()));
        }
        let node = state.node_mut(element)?;
        if node.element.hides_on_click {
            node.element.displayed = false;
        }
        state.calls.push(DriverCall::ScriptClick(element.clone()));
        Ok(())
    }

    async fn clear(&self, element: &ElementId) -> DriverResult<()> {
        let mut state = self.lock();
        state.node_mut(element)?.value.clear();
        state.calls.push(DriverCall::Clear(element.clone()));
        Ok(())
    }

    async fn send_keys(&self, element: &ElementId, text: &str) -> DriverResult<()> {
        let mut state = self.lock();
        state.node_mut(element)?.value.push_str(text);
        state
            .calls
            .push(DriverCall::SendKeys(element.clone(), text.to_string()));
        Ok(())
    }

    async fn perform_gesture(&self, gesture: &PointerSequence) -> DriverResult<()> {
        let mut state = self.lock();
        if state.fail_gestures {
            return Err(DriverError::Request("pointer actions rejected".into()));
        }
        state.gesture_count += 1;
        state.calls.push(DriverCall::Gesture(gesture.clone()));
        Ok(())
    }

    async fn window_size(&self) -> DriverResult<Size> {
        Ok(self.window)
    }

    async fn page_source(&self) -> DriverResult<String> {
        let mut state = self.lock();
        state.calls.push(DriverCall::PageSource);
        let live = state.nodes.values().filter(|n| !n.removed).count();
        Ok(format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><hierarchy nodes=\"{}\"/>",
            live
        ))
    }

    async fn screenshot(&self) -> DriverResult<Vec<u8>> {
        self.record(DriverCall::Screenshot);
        Ok(b"\x89PNG\r\n\x1a\n".to_vec())
    }

    async fn hide_keyboard(&self) -> DriverResult<()> {
        self.record(DriverCall::HideKeyboard);
        if self.lock().fail_hide_keyboard {
            return Err(DriverError::Other("soft keyboard cannot be hidden".into()));
        }
        Ok(())
    }

    async fn navigate_back(&self) -> DriverResult<()> {
        self.record(DriverCall::NavigateBack);
        Ok(())
    }

    async fn terminate_app(&self, app_id: &str) -> DriverResult<bool> {
        self.record(DriverCall::TerminateApp(app_id.to_string()));
        Ok(true)
    }

    async fn activate_app(&self, app_id: &str) -> DriverResult<()> {
        self.record(DriverCall::ActivateApp(app_id.to_string()));
        Ok(())
    }

    fn capability(&self, name: &str) -> Option<String> {
        self.lock().capabilities.get(name).cloned()
    }
}
