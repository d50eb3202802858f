pub mod json;
pub mod junit;
pub mod text;
pub mod types;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub use types::TestResults;

/// Write the text, JSON and JUnit artifacts of a run
pub fn write_reports(results: &TestResults, output_dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;
    Ok(vec![
        text::write_report(results, output_dir)?,
        json::write_report(results, output_dir)?,
        junit::write_report(results, output_dir)?,
    ])
}

/// Re-render a saved results file
pub fn generate_report(results_path: &Path, format: &str, output: Option<&Path>) -> Result<()> {
    let results = json::load(results_path)?;

    let rendered = match format {
        "json" => return json::generate(&results, output),
        "text" | "txt" => text::render(&results),
        "junit" | "xml" => junit::generate_junit_xml(&results)?,
        _ => anyhow::bail!("Unknown format: {}", format),
    };

    match output {
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Report saved to: {}", path.display());
        }
        None => println!("{}", rendered),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::state::{RunSummary, TestReport};

    #[test]
    fn test_write_and_regenerate() {
        let dir = tempfile::tempdir().unwrap();
        let mut suite = TestReport::start("smoke");
        suite.pass();
        let reports = vec![suite];
        let results = TestResults::new(reports.clone(), RunSummary::from_reports("r", &reports, 5));

        let written = write_reports(&results, dir.path()).unwrap();
        assert_eq!(written.len(), 3);
        assert!(written.iter().all(|p| p.exists()));

        let junit = dir.path().join("regenerated.xml");
        generate_report(&dir.path().join(json::RESULTS_FILE), "junit", Some(&junit)).unwrap();
        let xml = std::fs::read_to_string(junit).unwrap();
        assert!(xml.contains(r#"<testcase name="smoke""#));

        assert!(generate_report(&dir.path().join(json::RESULTS_FILE), "pdf", None).is_err());
    }
}
