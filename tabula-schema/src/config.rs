//! Configuration file parsing for `tabula.toml`.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{SchemaError, SchemaResult};

/// Main configuration structure for `tabula.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CompilerConfig {
    /// Compilation settings.
    #[serde(default)]
    pub compiler: CompilerOptions,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl CompilerConfig {
    /// Load configuration from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> SchemaResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| SchemaError::io(path.display().to_string(), e))?;

        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> SchemaResult<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| SchemaError::TomlError { source: e })?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> SchemaResult<()> {
        if !LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(SchemaError::config(format!(
                "unknown log level: {}",
                self.logging.level
            )));
        }
        if let Some(word) = self.compiler.extra_reserved.iter().find(|w| !is_identifier(w)) {
            return Err(SchemaError::config(format!(
                "reserved word is not an identifier: {word:?}"
            )));
        }
        Ok(())
    }
}

const LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

fn is_identifier(word: &str) -> bool {
    !word.is_empty() && word.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// The `[compiler]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CompilerOptions {
    /// Treat every warning as an error when finishing a compilation.
    #[serde(default)]
    pub warnings_as_errors: bool,

    /// Identifiers to reject in addition to the built-in list.
    #[serde(default)]
    pub extra_reserved: Vec<String>,
}

/// The `[logging]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Filter directive, usually a bare level.
    #[serde(default = "default_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_level() -> String {
    "warn".to_string()
}

/// Log output formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

impl LogFormat {
    /// Parse a format name, ignoring case.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "compact" => Some(Self::Compact),
            "pretty" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = CompilerConfig::default();
        assert!(!config.compiler.warnings_as_errors);
        assert!(config.compiler.extra_reserved.is_empty());
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.format, LogFormat::Compact);
    }

    #[test]
    fn test_parse_empty_config() {
        let config = CompilerConfig::from_str("").unwrap();
        assert_eq!(config, CompilerConfig::default());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [compiler]
            warnings_as_errors = true
            extra_reserved = ["tenant", "shard"]

            [logging]
            level = "debug"
            format = "json"
        "#;

        let config = CompilerConfig::from_str(toml).unwrap();
        assert!(config.compiler.warnings_as_errors);
        assert_eq!(config.compiler.extra_reserved, vec!["tenant", "shard"]);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    // ==================== Rejection Tests ====================

    #[test]
    fn test_unknown_key_rejected() {
        let err = CompilerConfig::from_str("[compiler]\nstrict = true\n").unwrap_err();
        assert!(matches!(err, SchemaError::TomlError { .. }));
    }

    #[test]
    fn test_unknown_format_rejected() {
        let err = CompilerConfig::from_str("[logging]\nformat = \"xml\"\n").unwrap_err();
        assert!(matches!(err, SchemaError::TomlError { .. }));
    }

    #[test]
    fn test_unknown_level_rejected() {
        let err = CompilerConfig::from_str("[logging]\nlevel = \"loud\"\n").unwrap_err();
        assert_eq!(err.to_string(), "configuration error: unknown log level: loud");
    }

    #[test]
    fn test_bad_reserved_word_rejected() {
        let err =
            CompilerConfig::from_str("[compiler]\nextra_reserved = [\"two words\"]\n").unwrap_err();
        assert!(matches!(err, SchemaError::ConfigError { .. }));
    }

    // ==================== File Tests ====================

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[compiler]\nwarnings_as_errors = true").unwrap();

        let config = CompilerConfig::from_file(file.path()).unwrap();
        assert!(config.compiler.warnings_as_errors);
    }

    #[test]
    fn test_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = CompilerConfig::from_file(dir.path().join("tabula.toml")).unwrap_err();
        assert!(matches!(err, SchemaError::IoError { .. }));
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("JSON"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse("pretty"), Some(LogFormat::Pretty));
        assert_eq!(LogFormat::parse("xml"), None);
    }
}
