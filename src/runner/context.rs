use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{testData\.([^}]+)\}").expect("placeholder pattern is valid")
    })
}

/// Result of placeholder substitution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pub value: String,
    /// Keys referenced by the text but absent from the data
    pub missing: Vec<String>,
}

/// Replace every `${testData.KEY}` token with its value
///
/// Substitution is per token: in a text mixing known and unknown keys the
/// known tokens are replaced and the unknown ones stay as written, so
/// `"${testData.a}-${testData.b}"` with only `a` present becomes `"X-${testData.b}"`.
/// A text without any known key comes back unchanged.
pub fn substitute_placeholders(text: &str, data: &HashMap<String, String>) -> Substitution {
    let mut missing = Vec::new();
    let value = placeholder_pattern()
        .replace_all(text, |caps: &regex::Captures| {
            let key = &caps[1];
            match data.get(key) {
                Some(v) => v.clone(),
                None => {
                    if !missing.iter().any(|m| m == key) {
                        missing.push(key.to_string());
                    }
                    caps[0].to_string()
                }
            }
        })
        .into_owned();
    Substitution { value, missing }
}

/// Per-suite execution context
pub struct TestContext {
    /// Suite (or data-driven iteration) being executed
    pub suite_name: String,

    /// Test data visible to placeholders
    pub test_data: HashMap<String, String>,

    /// Output directory for diagnostics and reports
    pub output_dir: PathBuf,
}

impl TestContext {
    pub fn new(suite_name: &str, output_dir: &Path) -> Self {
        Self {
            suite_name: suite_name.to_string(),
            test_data: HashMap::new(),
            output_dir: output_dir.to_path_buf(),
        }
    }

    /// Layer data on top of what is already present; later values win
    pub fn with_data(mut self, data: &HashMap<String, String>) -> Self {
        for (k, v) in data {
            self.test_data.insert(k.clone(), v.clone());
        }
        self
    }

    /// Get the output path for a file
    pub fn output_path(&self, filename: &str) -> PathBuf {
        self.output_dir.join(filename)
    }

    /// Substitute placeholders, warning once per missing key
    pub fn substitute(&self, text: &str) -> String {
        let result = substitute_placeholders(text, &self.test_data);
        for key in &result.missing {
            log::warn!(
                "[{}] test data key '{}' not found, keeping placeholder",
                self.suite_name,
                key
            );
        }
        result.value
    }
}
