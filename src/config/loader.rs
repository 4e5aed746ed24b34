//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::{BridgeConfig, ProxyConfiguration};
use crate::config::validation::{validate_config, ConfigValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(ConfigValidationError),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Parse a TOML document without validating it.
pub fn parse_config(content: &str) -> Result<BridgeConfig, ConfigError> {
    toml::from_str(content).map_err(ConfigError::Parse)
}

/// Load and validate configuration from a TOML file.
///
/// Returns the full settings alongside the validated proxy snapshot.
pub fn load_config(path: &Path) -> Result<(BridgeConfig, ProxyConfiguration), ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config = parse_config(&content)?;

    let proxy = validate_config(&config).map_err(ConfigError::Validation)?;

    Ok((config, proxy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{ErrorPolicy, LogFormat};

    #[test]
    fn parses_full_document() {
        let config = parse_config(
            r#"
            [proxy]
            backend_base_url = "http://10.0.0.5:15000"
            allowed_origin = "http://192.168.1.8:5173"
            bind_host = "127.0.0.1"
            bind_port = "9000"

            [timeouts]
            upstream_secs = 5

            [responses]
            error_policy = "status"

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();

        let proxy = validate_config(&config).unwrap();
        assert_eq!(proxy.bind_port, 9000);
        assert_eq!(proxy.bind_host, "127.0.0.1");
        assert_eq!(config.timeouts.upstream_secs, 5);
        assert_eq!(config.timeouts.probe_interval_ms, 200);
        assert_eq!(config.responses.error_policy, ErrorPolicy::Status);
        assert_eq!(config.observability.log_format, LogFormat::Json);
    }

    #[test]
    fn out_of_range_port_in_file_is_a_validation_error() {
        let dir = std::env::temp_dir().join(format!("scanner-bridge-loader-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bridge.toml");
        fs::write(&path, "[proxy]\nbind_port = 70000\n").unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)), "got {}", err);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Path::new("/nonexistent/scanner-bridge.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
