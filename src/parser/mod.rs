pub mod loader;
pub mod types;

pub use loader::{load_config, validate_config, DataRow, TestDataProvider};
