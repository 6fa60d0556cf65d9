//! Configuration file loading and error types.

use std::path::Path;

use crate::Config;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("toml: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("unrecognized config extension {0:?} (expected toml/json/yaml)")]
    UnknownFormat(String),
    #[error("validation: {0}")]
    Validation(String),
}

/// Load a config file, picking the parser from the file extension.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    let data = std::fs::read_to_string(path)?;
    parse_config(&extension, &data)
}

fn parse_config(extension: &str, data: &str) -> Result<Config, ConfigError> {
    match extension {
        "toml" => Ok(toml::from_str(data)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(data)?),
        // Comments are common in hand-edited JSON; strip them first.
        "json" | "jsonc" => {
            let stripped = json_comments::StripComments::new(data.as_bytes());
            Ok(serde_json::from_reader(stripped)?)
        }
        other => Err(ConfigError::UnknownFormat(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_toml() {
        let config = parse_config(
            "toml",
            "[server]\nport = 9000\nssh_only = true\n\n[tls]\nenabled = true\n",
        )
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert!(config.server.ssh_only);
        assert!(config.tls.enabled);
        // Unlisted fields keep their defaults.
        assert_eq!(config.server.ssh_port, 22);
    }

    #[test]
    fn parses_json_with_comments() {
        let config = parse_config(
            "jsonc",
            r#"{
                // listener
                "server": { "port": 9001 }
            }"#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9001);
    }

    #[test]
    fn parses_yaml() {
        let config = parse_config("yml", "server:\n  workers: 8\n").unwrap();
        assert_eq!(config.server.workers, 8);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        assert!(matches!(
            parse_config("ini", "port=1"),
            Err(ConfigError::UnknownFormat(_))
        ));
    }
}
