//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Toml(toml::de::Error),
    Json(serde_json::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Toml(e) => write!(f, "TOML parse error: {}", e),
            ConfigError::Json(e) => write!(f, "JSON parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML or JSON file.
///
/// Files with a `.json` extension are parsed as JSON, everything else as TOML.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let config = parse_config(&content, is_json)?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

fn parse_config(content: &str, is_json: bool) -> Result<ProxyConfig, ConfigError> {
    if is_json {
        serde_json::from_str(content).map_err(ConfigError::Json)
    } else {
        toml::from_str(content).map_err(ConfigError::Toml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write_temp(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("{}-{}", std::process::id(), name));
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_toml() {
        let path = write_temp(
            "override.toml",
            r#"
            [upstream]
            address = "127.0.0.1:4000"

            [[response_override.overrides]]
            from = [502, 503]
            to = 503
            body = "down for maintenance"
            "#,
        );

        let config = load_config(&path).unwrap();
        assert_eq!(config.upstream.address, "127.0.0.1:4000");
        assert_eq!(config.response_override.overrides[0].from, vec![502, 503]);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_load_json() {
        let path = write_temp(
            "override.json",
            r#"{
                "response_override": {
                    "name": "json-rules",
                    "overrides": [{"from": [404], "to": 200, "body": "{}", "removeHeaders": ["Server"]}]
                }
            }"#,
        );

        let config = load_config(&path).unwrap();
        assert_eq!(config.response_override.name, "json-rules");
        assert_eq!(config.response_override.overrides[0].remove_headers, vec!["Server"]);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_rejects_config_without_rules() {
        let path = write_temp("empty.toml", "[listener]\nbind_address = \"127.0.0.1:8080\"\n");

        match load_config(&path) {
            Err(ConfigError::Validation(errors)) => {
                assert_eq!(errors, vec![ValidationError::NoOverrides]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_config(Path::new("/nonexistent/response-override.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
