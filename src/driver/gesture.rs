//! Single-finger pointer gestures
//!
//! Every gesture is the same shape: move to the start instantly, press,
//! then either move to the end over a duration or hold in place, then release.

use super::traits::{AutomationDriver, Point, Size};
use crate::error::{FlowError, Result};
use serde_json::json;

/// Press held by the coordinate-tap fallback
pub const TAP_HOLD_MS: u64 = 80;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointerAction {
    Move { x: i32, y: i32, duration_ms: u64 },
    Down,
    Up,
    Pause { duration_ms: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PointerSequence {
    pub actions: Vec<PointerAction>,
}

impl PointerSequence {
    pub fn tap(at: Point) -> Self {
        Self {
            actions: vec![
                PointerAction::Move {
                    x: at.x,
                    y: at.y,
                    duration_ms: 0,
                },
                PointerAction::Down,
                PointerAction::Up,
            ],
        }
    }

    pub fn long_press(at: Point, hold_ms: u64) -> Self {
        Self {
            actions: vec![
                PointerAction::Move {
                    x: at.x,
                    y: at.y,
                    duration_ms: 0,
                },
                PointerAction::Down,
                PointerAction::Pause {
                    duration_ms: hold_ms,
                },
                PointerAction::Up,
            ],
        }
    }

    pub fn swipe(from: Point, to: Point, duration_ms: u64) -> Self {
        Self {
            actions: vec![
                PointerAction::Move {
                    x: from.x,
                    y: from.y,
                    duration_ms: 0,
                },
                PointerAction::Down,
                PointerAction::Move {
                    x: to.x,
                    y: to.y,
                    duration_ms,
                },
                PointerAction::Up,
            ],
        }
    }

    /// Copy of the sequence with every move clamped inside the viewport
    pub fn clamped(&self, viewport: Size) -> Self {
        let max_x = viewport.width.saturating_sub(1).max(0);
        let max_y = viewport.height.saturating_sub(1).max(0);
        let actions = self
            .actions
            .iter()
            .map(|action| match *action {
                PointerAction::Move { x, y, duration_ms } => PointerAction::Move {
                    x: x.clamp(0, max_x),
                    y: y.clamp(0, max_y),
                    duration_ms,
                },
                ref other => other.clone(),
            })
            .collect();
        Self { actions }
    }

    /// Points visited by the finger, in order
    pub fn points(&self) -> Vec<Point> {
        self.actions
            .iter()
            .filter_map(|a| match a {
                PointerAction::Move { x, y, .. } => Some(Point::new(*x, *y)),
                _ => None,
            })
            .collect()
    }

    /// W3C actions payload for a touch pointer named "finger"
    pub fn to_w3c_json(&self) -> serde_json::Value {
        let actions: Vec<serde_json::Value> = self
            .actions
            .iter()
            .map(|action| match action {
                PointerAction::Move { x, y, duration_ms } => json!({
                    "type": "pointerMove",
                    "duration": duration_ms,
                    "origin": "viewport",
                    "x": x,
                    "y": y,
                }),
                PointerAction::Down => json!({ "type": "pointerDown", "button": 0 }),
                PointerAction::Up => json!({ "type": "pointerUp", "button": 0 }),
                PointerAction::Pause { duration_ms } => {
                    json!({ "type": "pause", "duration": duration_ms })
                }
            })
            .collect();

        json!({
            "actions": [{
                "type": "pointer",
                "id": "finger",
                "parameters": { "pointerType": "touch" },
                "actions": actions,
            }]
        })
    }
}

/// Vertical scroll direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    /// Content moves up, finger drags upward
    Down,
    Up,
}

impl ScrollDirection {
    /// "down" (any case) scrolls down; everything else scrolls up
    pub fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "down" => ScrollDirection::Down,
            "up" => ScrollDirection::Up,
            other => {
                log::warn!("Unknown scroll direction '{}', scrolling up", other);
                ScrollDirection::Up
            }
        }
    }
}

/// Start and end points of a scroll from the viewport center
pub fn scroll_endpoints(viewport: Size, direction: ScrollDirection, distance: i32) -> (Point, Point) {
    let start = viewport.center();
    let end_y = match direction {
        ScrollDirection::Down => start.y.saturating_sub(distance),
        ScrollDirection::Up => start.y.saturating_add(distance),
    };
    (start, Point::new(start.x, end_y))
}

/// Builds pointer sequences and dispatches them through the driver
pub struct GestureEngine<'a> {
    driver: &'a dyn AutomationDriver,
}

impl<'a> GestureEngine<'a> {
    pub fn new(driver: &'a dyn AutomationDriver) -> Self {
        Self { driver }
    }

    pub async fn tap(&self, at: Point) -> Result<()> {
        self.dispatch(PointerSequence::tap(at)).await
    }

    pub async fn press(&self, at: Point, hold_ms: u64) -> Result<()> {
        self.dispatch(PointerSequence::long_press(at, hold_ms)).await
    }

    pub async fn swipe(&self, from: Point, to: Point, duration_ms: u64) -> Result<()> {
        self.dispatch(PointerSequence::swipe(from, to, duration_ms))
            .await
    }

    pub async fn scroll(
        &self,
        direction: ScrollDirection,
        distance: i32,
        duration_ms: u64,
    ) -> Result<()> {
        let viewport = self.viewport().await?;
        let (from, to) = scroll_endpoints(viewport, direction, distance);
        log::debug!(
            "Scrolling {:?} from ({}, {}) to ({}, {})",
            direction,
            from.x,
            from.y,
            to.x,
            to.y
        );
        self.send(PointerSequence::swipe(from, to, duration_ms).clamped(viewport))
            .await
    }

    async fn dispatch(&self, sequence: PointerSequence) -> Result<()> {
        let viewport = self.viewport().await?;
        self.send(sequence.clamped(viewport)).await
    }

    async fn viewport(&self) -> Result<Size> {
        self.driver
            .window_size()
            .await
            .map_err(|e| FlowError::GestureDispatch(format!("window size unavailable: {}", e)))
    }

    async fn send(&self, sequence: PointerSequence) -> Result<()> {
        self.driver
            .perform_gesture(&sequence)
            .await
            .map_err(|e| FlowError::GestureDispatch(e.to_string()))
    }
}
