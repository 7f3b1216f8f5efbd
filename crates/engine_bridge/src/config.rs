use serde::Deserialize;

use crate::error::BridgeError;

pub const DEFAULT_DELIMITER: u8 = b'\n';
pub const DEFAULT_THREAD_NAME: &str = "engine";

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputLimits {
    /// Longest output line delivered to the caller; longer lines are dropped.
    pub max_line_bytes: Option<usize>,
}

/// Tunables for an [`crate::EngineBridge`].
///
/// Every field has a default, so an empty TOML document is a valid config:
///
/// ```toml
/// thread_name = "stockfish"
/// startup_lines = ["uci"]
/// strip_carriage_return = true
///
/// [limits]
/// max_line_bytes = 65536
/// ```
#[derive(Debug, Clone, Eq, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    pub delimiter: u8,
    pub strip_carriage_return: bool,
    pub thread_name: String,
    pub startup_lines: Vec<String>,
    pub limits: OutputLimits,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
            strip_carriage_return: false,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            startup_lines: Vec::new(),
            limits: OutputLimits::default(),
        }
    }
}

impl BridgeConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, BridgeError> {
        let config: Self =
            toml::from_str(input).map_err(|source| BridgeError::ConfigParse { source })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.thread_name.trim().is_empty() {
            return Err(BridgeError::InvalidConfig(
                "thread_name must not be empty".into(),
            ));
        }
        if self.limits.max_line_bytes == Some(0) {
            return Err(BridgeError::InvalidConfig(
                "limits.max_line_bytes must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = BridgeConfig::from_toml_str("").unwrap();
        assert_eq!(config, BridgeConfig::default());
        assert_eq!(config.delimiter, b'\n');
        assert_eq!(config.thread_name, "engine");
    }

    #[test]
    fn parses_all_fields() {
        let config = BridgeConfig::from_toml_str(
            r#"
            delimiter = 59
            strip_carriage_return = true
            thread_name = "stockfish"
            startup_lines = ["uci", "isready"]

            [limits]
            max_line_bytes = 128
            "#,
        )
        .unwrap();

        assert_eq!(config.delimiter, b';');
        assert!(config.strip_carriage_return);
        assert_eq!(config.thread_name, "stockfish");
        assert_eq!(config.startup_lines, vec!["uci", "isready"]);
        assert_eq!(config.limits.max_line_bytes, Some(128));
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = BridgeConfig::from_toml_str("threads = 4").unwrap_err();
        assert!(matches!(err, BridgeError::ConfigParse { .. }));
    }

    #[test]
    fn rejects_zero_line_limit() {
        let err = BridgeConfig::from_toml_str("[limits]\nmax_line_bytes = 0").unwrap_err();
        assert!(matches!(err, BridgeError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_blank_thread_name() {
        let err = BridgeConfig::from_toml_str("thread_name = \"  \"").unwrap_err();
        assert!(matches!(err, BridgeError::InvalidConfig(_)));
    }
}
