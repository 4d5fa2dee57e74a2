use anyhow::Result;
use colored::Colorize;
use std::collections::HashSet;
use std::path::Path;

/// Checks a configuration file for keys vigil does not understand
pub struct ConfigValidator {
    /// Set of valid configuration fields that are recognized by vigil
    known_fields: HashSet<String>,
    /// Set of deprecated configuration fields that should trigger warnings
    deprecated_fields: HashSet<String>,
}

impl ConfigValidator {
    /// Create a new validator with known configuration fields
    #[must_use]
    pub fn new() -> Self {
        let mut known_fields = HashSet::new();
        let mut deprecated_fields = HashSet::new();

        // Core fields
        known_fields.insert("core.state_dir".to_string());
        known_fields.insert("core.poll_interval_secs".to_string());

        // Monitoring engine
        known_fields.insert("monitoring.root".to_string());
        known_fields.insert("monitoring.autostart".to_string());

        // Backup engine
        known_fields.insert("backup.root".to_string());
        known_fields.insert("backup.autostart".to_string());
        known_fields.insert("backup.stamp".to_string());

        // Monitoring never stamps files
        deprecated_fields.insert("monitoring.stamp".to_string());

        Self {
            known_fields,
            deprecated_fields,
        }
    }

    /// Validate a loaded configuration file and warn about issues
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub fn validate_config_file(&self, config_path: &Path) -> Result<()> {
        let warnings = self.collect_warnings(config_path)?;

        if !warnings.is_empty() {
            eprintln!("{}", "Configuration warnings:".yellow().bold());
            for warning in warnings {
                eprintln!("  {warning}");
            }
            eprintln!();
        }

        Ok(())
    }

    /// Gather one message per unknown or deprecated field
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub fn collect_warnings(&self, config_path: &Path) -> Result<Vec<String>> {
        if !config_path.exists() {
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(config_path)?;
        let parsed: toml::Value = toml::from_str(&content)?;

        let mut unknown_fields = Vec::new();
        let mut deprecated_used = Vec::new();
        self.check_table(&parsed, "", &mut unknown_fields, &mut deprecated_used);

        let mut warnings = Vec::new();
        for field in &unknown_fields {
            warnings.push(format!("Unknown configuration field: {}", field.yellow()));
        }

        for field in &deprecated_used {
            let suggestion = match field.as_str() {
                "monitoring.stamp" => {
                    "Monitoring writes log lines, not backup files. This field has no effect."
                }
                _ => "This field is deprecated and will be removed in a future version.",
            };
            warnings.push(format!(
                "Deprecated field '{}': {}",
                field.yellow(),
                suggestion.dimmed()
            ));
        }

        Ok(warnings)
    }

    /// Recursively checks a TOML table for unknown and deprecated fields
    ///
    /// # Arguments
    ///
    /// * `table` - The TOML value to validate (expected to be a table)
    /// * `prefix` - The current path prefix (e.g., "core", "backup")
    /// * `unknown` - Vector to collect unknown field paths
    /// * `deprecated` - Vector to collect deprecated field paths
    fn check_table(
        &self,
        table: &toml::Value,
        prefix: &str,
        unknown: &mut Vec<String>,
        deprecated: &mut Vec<String>,
    ) {
        if let toml::Value::Table(map) = table {
            for (key, value) in map {
                let full_key = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };

                if self.deprecated_fields.contains(&full_key) {
                    deprecated.push(full_key);
                    continue;
                }

                if let toml::Value::Table(_) = value {
                    self.check_table(value, &full_key, unknown, deprecated);
                } else if !self.known_fields.contains(&full_key) {
                    unknown.push(full_key);
                }
            }
        }
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}
