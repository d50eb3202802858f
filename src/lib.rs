pub mod driver;
pub mod error;
pub mod locator;
pub mod parser;
pub mod report;
pub mod runner;
pub mod utils;

// Re-export common items
pub use error::{DriverError, FlowError};
pub use report::generate_report;
pub use runner::{run_tests, RunOptions};
