use super::types::TestResults;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub const RESULTS_FILE: &str = "results.json";

/// Print the JSON report, or save it when `output` is given
pub fn generate(results: &TestResults, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(results)?;

    if let Some(path) = output {
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("JSON report saved to: {}", path.display());
    } else {
        println!("{}", json);
    }

    Ok(())
}

/// Write `results.json` into the output directory
pub fn write_report(results: &TestResults, output_dir: &Path) -> Result<PathBuf> {
    let path = output_dir.join(RESULTS_FILE);
    std::fs::write(&path, serde_json::to_string_pretty(results)?)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

/// Read back a results file written by [`write_report`]
pub fn load(path: &Path) -> Result<TestResults> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read results file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("{} is not a results file", path.display()))
}
