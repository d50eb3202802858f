pub mod appium;
pub mod common;
pub mod finder;
pub mod gesture;
pub mod simulated;
pub mod traits;

pub use finder::{ElementFinder, Readiness};
pub use traits::{AutomationDriver, ElementId, Selector};
