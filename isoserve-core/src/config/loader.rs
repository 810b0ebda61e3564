//! Configuration loader

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Environment variable overriding the listen port
pub const ENV_PORT: &str = "ISOSERVE_PORT";
/// Environment variable overriding the listen address
pub const ENV_BIND: &str = "ISOSERVE_BIND";
/// Environment variable overriding the document root
pub const ENV_ROOT: &str = "ISOSERVE_ROOT";

/// Configuration loader for config files and the environment
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<ServerConfig> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file {}: {}", path.display(), e)))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        match ext {
            "json" => Self::from_json(&content),
            "toml" => Self::from_toml(&content),
            _ => Err(Error::Config(format!("Unknown config format: {}", ext))),
        }
    }

    /// Parse JSON configuration
    pub fn from_json(content: &str) -> Result<ServerConfig> {
        serde_json::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid JSON: {}", e)))
    }

    /// Parse TOML configuration
    pub fn from_toml(content: &str) -> Result<ServerConfig> {
        toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }

    /// Apply `ISOSERVE_*` overrides from the process environment
    pub fn apply_env(config: ServerConfig) -> Result<ServerConfig> {
        Self::apply_overrides(config, |key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable source
    pub fn apply_overrides<F>(mut config: ServerConfig, lookup: F) -> Result<ServerConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup(ENV_PORT) {
            config.port = port
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("{} is not a valid port: {:?}", ENV_PORT, port)))?;
            tracing::debug!("Port overridden by {}: {}", ENV_PORT, config.port);
        }

        if let Some(bind) = lookup(ENV_BIND) {
            config.bind = bind
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("{} is not a valid address: {:?}", ENV_BIND, bind)))?;
            tracing::debug!("Bind address overridden by {}: {}", ENV_BIND, config.bind);
        }

        if let Some(root) = lookup(ENV_ROOT) {
            if root.is_empty() {
                return Err(Error::Config(format!("{} must not be empty", ENV_ROOT)));
            }
            config.root = PathBuf::from(root);
            tracing::debug!("Document root overridden by {}: {}", ENV_ROOT, config.root.display());
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_json_loading() {
        let json = r#"{"port": 8000, "browse": false}"#;
        let config = ConfigLoader::from_json(json).unwrap();
        assert_eq!(config.port, 8000);
        assert!(!config.browse);
        assert_eq!(config.index, ServerConfig::default().index);
    }

    #[test]
    fn test_toml_loading() {
        let toml = r#"
            bind = "127.0.0.1"
            root = "public"
            index = ["main.html"]
        "#;
        let config = ConfigLoader::from_toml(toml).unwrap();
        assert_eq!(config.listen_addr().to_string(), "127.0.0.1:2561");
        assert_eq!(config.root, PathBuf::from("public"));
        assert_eq!(config.index, vec!["main.html"]);
    }

    #[test]
    fn test_invalid_toml() {
        let err = ConfigLoader::from_toml("port = \"many\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_load_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let toml_path = dir.path().join("isoserve.toml");
        std::fs::write(&toml_path, "port = 9000\n").unwrap();
        assert_eq!(ConfigLoader::load(&toml_path).unwrap().port, 9000);

        let yaml_path = dir.path().join("isoserve.yaml");
        std::fs::write(&yaml_path, "port: 9000\n").unwrap();
        assert!(matches!(ConfigLoader::load(&yaml_path), Err(Error::Config(_))));

        let missing = dir.path().join("missing.toml");
        assert!(matches!(ConfigLoader::load(&missing), Err(Error::Config(_))));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_PORT, "8081"),
            (ENV_BIND, "::1"),
            (ENV_ROOT, "/tmp/site"),
        ]
        .into_iter()
        .collect();

        let config = ConfigLoader::apply_overrides(ServerConfig::default(), |k| {
            vars.get(k).map(|v| v.to_string())
        })
        .unwrap();

        assert_eq!(config.listen_addr().to_string(), "[::1]:8081");
        assert_eq!(config.root, PathBuf::from("/tmp/site"));
    }

    #[test]
    fn test_bad_port_override() {
        let result = ConfigLoader::apply_overrides(ServerConfig::default(), |k| {
            (k == ENV_PORT).then(|| "70000".to_string())
        });
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_no_overrides_keeps_config() {
        let config = ConfigLoader::apply_overrides(ServerConfig::default(), |_| None).unwrap();
        assert_eq!(config, ServerConfig::default());
    }
}
