//! Which cell values count as "empty"

use dm_core::Value;
use serde::{Deserialize, Serialize};

/// Null value configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NullConfig {
    /// Text placeholders treated as missing values
    pub patterns: Vec<String>,

    /// Whether to trim whitespace before checking
    pub trim_whitespace: bool,

    /// Case sensitive matching
    pub case_sensitive: bool,
}

impl Default for NullConfig {
    fn default() -> Self {
        Self {
            patterns: vec![
                String::new(),
                "-".to_string(),
                "N/A".to_string(),
                "null".to_string(),
                "None".to_string(),
            ],
            trim_whitespace: true,
            case_sensitive: false,
        }
    }
}

impl NullConfig {
    /// Only genuinely absent or blank cells are empty
    pub fn strict() -> Self {
        Self {
            patterns: vec![String::new()],
            trim_whitespace: true,
            case_sensitive: true,
        }
    }

    /// Check if a cell should be treated as missing
    pub fn is_empty(&self, value: &Value) -> bool {
        match value {
            Value::Null => true,
            Value::Text(text) => self.is_null_text(text),
            Value::Number(_) | Value::Bool(_) => false,
        }
    }

    fn is_null_text(&self, text: &str) -> bool {
        let test_value = if self.trim_whitespace { text.trim() } else { text };

        self.patterns.iter().any(|pattern| {
            if self.case_sensitive {
                test_value == pattern
            } else {
                test_value.eq_ignore_ascii_case(pattern)
            }
        })
    }

    /// Add a null pattern
    pub fn add_pattern(&mut self, pattern: impl Into<String>) {
        let pattern = pattern.into();
        if !self.patterns.contains(&pattern) {
            self.patterns.push(pattern);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_placeholders() {
        let config = NullConfig::default();
        assert!(config.is_empty(&Value::Null));
        assert!(config.is_empty(&Value::from("  ")));
        assert!(config.is_empty(&Value::from("n/a")));
        assert!(config.is_empty(&Value::from("NULL")));
        assert!(!config.is_empty(&Value::from("0")));
        assert!(!config.is_empty(&Value::Number(0.0)));
    }

    #[test]
    fn test_strict_only_blank() {
        let config = NullConfig::strict();
        assert!(config.is_empty(&Value::from(" ")));
        assert!(!config.is_empty(&Value::from("N/A")));
    }
}
