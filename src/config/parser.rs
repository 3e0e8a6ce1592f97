//! Configuration loading and environment handling.
//!
//! This module handles loading the reconciliation document from YAML
//! files and environment variables, with proper precedence and error
//! handling.

use std::path::Path;

use tracing::{debug, info};

use crate::error::{ConfigError, ConvergeError, Result};

use super::spec::ReconcileDoc;

/// Loader for reconciliation documents.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving relative paths.
    base_path: Option<std::path::PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads a reconciliation document from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<ReconcileDoc> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(ConvergeError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            ConvergeError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses a reconciliation document from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<ReconcileDoc> {
        debug!("Parsing YAML configuration");

        let doc: ReconcileDoc = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            ConvergeError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })?;

        debug!("Parsed configuration for kind: {}", doc.kind);
        Ok(doc)
    }

    /// Loads configuration with environment variable overrides.
    ///
    /// Environment variables are checked in the format
    /// `CONVERGE_<KEY>` (e.g. `CONVERGE_ENDPOINT`).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<ReconcileDoc> {
        let mut doc = self.load_file(path)?;
        Self::apply_env_overrides(&mut doc);
        Ok(doc)
    }

    /// Applies environment variable overrides to the document.
    fn apply_env_overrides(doc: &mut ReconcileDoc) {
        if let Ok(endpoint) = std::env::var("CONVERGE_ENDPOINT") {
            debug!("Overriding target.endpoint from environment");
            doc.target.endpoint = Some(endpoint);
        }

        if let Ok(fixtures) = std::env::var("CONVERGE_FIXTURES") {
            debug!("Overriding target.fixtures from environment");
            doc.target.fixtures = Some(fixtures);
        }

        if let Ok(timeout) = std::env::var("CONVERGE_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.parse() {
                debug!("Overriding target.timeout_secs from environment");
                doc.target.timeout_secs = Some(secs);
            }
        }
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| std::path::PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                ConvergeError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }

    /// Gets the device API token from the environment (optional; not every
    /// device requires authentication).
    #[must_use]
    pub fn get_device_token() -> Option<String> {
        std::env::var("CONVERGE_DEVICE_TOKEN").ok()
    }
}

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &[
    "converge.yaml",
    "converge.yml",
    "reconcile.yaml",
    "reconcile.yml",
];

/// Finds the configuration file in the current directory or parent
/// directories.
///
/// # Errors
///
/// Returns an error if no configuration file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<std::path::PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(ConvergeError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::spec::TransportKind;

    const SAMPLE: &str = "\
target:
  transport: rest
  endpoint: https://switch1.example.net
kind: acls
mode: replaced
resources:
- name: edge-in
  afi: ipv4
";

    #[test]
    fn test_parse_yaml_document() {
        let parser = ConfigParser::new();
        let doc = parser.parse_yaml(SAMPLE, None).unwrap();
        assert_eq!(doc.kind, "acls");
        assert_eq!(doc.target.transport, TransportKind::Rest);
        assert_eq!(
            doc.target.endpoint.as_deref(),
            Some("https://switch1.example.net")
        );
    }

    #[test]
    fn test_invalid_yaml_reports_location() {
        let parser = ConfigParser::new();
        let err = parser
            .parse_yaml("target: [", Some(Path::new("converge.yaml")))
            .unwrap_err();
        assert!(matches!(
            err,
            ConvergeError::Config(ConfigError::ParseError { location: Some(_), .. })
        ));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let parser = ConfigParser::new();
        let err = parser.load_file("/nonexistent/converge.yaml").unwrap_err();
        assert!(matches!(
            err,
            ConvergeError::Config(ConfigError::FileNotFound { .. })
        ));
    }

    #[test]
    fn test_find_config_file_searches_upward() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join("converge.yaml"), SAMPLE).unwrap();

        let found = find_config_file(&nested).unwrap();
        assert!(found.ends_with("converge.yaml"));
    }
}
