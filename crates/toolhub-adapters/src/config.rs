//! Provider configuration.
//!
//! Reads `[providers.<id>]` sections from a TOML file:
//!
//! ```toml
//! [providers.gitlab]
//! base_url = "https://gitlab.example.com/api/v4"
//!
//! [providers.stripe]
//! enabled = false
//! ```
//!
//! A missing file means defaults for every provider.  A file that exists
//! but does not parse is a configuration error.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{AdapterError, Result};
use crate::request::normalize_base;

/// Settings for one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    /// Whether the registry should build this provider at all.
    pub enabled: bool,
    /// Replaces the provider's built-in base URL.
    pub base_url: Option<String>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: None,
        }
    }
}

impl ProviderSettings {
    /// Settings that point a provider at `base_url` (tests, self-hosted).
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            enabled: true,
            base_url: Some(normalize_base(base_url)),
        }
    }

    /// The configured base URL, or `default` when none is set.
    pub fn base_url_or(&self, default: &str) -> String {
        self.base_url
            .as_deref()
            .map(normalize_base)
            .unwrap_or_else(|| default.to_string())
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolhubConfig {
    providers: BTreeMap<String, ProviderSettings>,
}

impl ToolhubConfig {
    /// Load from `path`, falling back to defaults if the file is missing.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(AdapterError::ConfigError(format!(
                    "failed to read {}: {e}",
                    path.display()
                )));
            }
        };
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let table: toml::Table = content
            .parse()
            .map_err(|e| AdapterError::ConfigError(format!("invalid TOML: {e}")))?;

        let sections = match table.get("providers") {
            None => return Ok(Self::default()),
            Some(toml::Value::Table(t)) => t,
            Some(_) => {
                return Err(AdapterError::ConfigError(
                    "`providers` must be a table".into(),
                ));
            }
        };

        let mut providers = BTreeMap::new();
        for (id, value) in sections {
            let section = value.as_table().ok_or_else(|| {
                AdapterError::ConfigError(format!("`providers.{id}` must be a table"))
            })?;

            let enabled = match section.get("enabled") {
                None => true,
                Some(v) => v.as_bool().ok_or_else(|| {
                    AdapterError::ConfigError(format!("`providers.{id}.enabled` must be a boolean"))
                })?,
            };

            let base_url = match section.get("base_url") {
                None => None,
                Some(v) => {
                    let raw = v.as_str().ok_or_else(|| {
                        AdapterError::ConfigError(format!(
                            "`providers.{id}.base_url` must be a string"
                        ))
                    })?;
                    url::Url::parse(raw).map_err(|e| {
                        AdapterError::ConfigError(format!(
                            "`providers.{id}.base_url` is not a valid URL: {e}"
                        ))
                    })?;
                    Some(normalize_base(raw))
                }
            };

            providers.insert(id.clone(), ProviderSettings { enabled, base_url });
        }

        Ok(Self { providers })
    }

    /// Settings for `provider`, defaults if it has no section.
    pub fn settings(&self, provider: &str) -> ProviderSettings {
        self.providers.get(provider).cloned().unwrap_or_default()
    }

    /// Override one provider's settings.
    pub fn set(&mut self, provider: &str, settings: ProviderSettings) {
        self.providers.insert(provider.to_string(), settings);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_provider_sections() {
        let cfg = ToolhubConfig::parse(
            r#"
            [providers.gitlab]
            base_url = "https://gitlab.example.com/api/v4/"

            [providers.stripe]
            enabled = false
            "#,
        )
        .unwrap();
        let gitlab = cfg.settings("gitlab");
        assert!(gitlab.enabled);
        assert_eq!(
            gitlab.base_url.as_deref(),
            Some("https://gitlab.example.com/api/v4")
        );
        assert!(!cfg.settings("stripe").enabled);
        assert_eq!(cfg.settings("linear"), ProviderSettings::default());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(ToolhubConfig::parse("[providers.x]\nenabled = \"yes\"").is_err());
        assert!(ToolhubConfig::parse("[providers.x]\nbase_url = \"not a url\"").is_err());
        assert!(ToolhubConfig::parse("providers = 3").is_err());
        assert!(ToolhubConfig::parse("[[[").is_err());
    }

    #[test]
    fn missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = ToolhubConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg, ToolhubConfig::default());
    }

    #[test]
    fn loads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[providers.deepl]\nenabled = false").unwrap();
        let cfg = ToolhubConfig::load(file.path()).unwrap();
        assert!(!cfg.settings("deepl").enabled);
    }

    #[test]
    fn base_url_or_prefers_override() {
        let s = ProviderSettings::with_base_url("http://127.0.0.1:9999/");
        assert_eq!(s.base_url_or("https://api.example.com"), "http://127.0.0.1:9999");
        assert_eq!(
            ProviderSettings::default().base_url_or("https://api.example.com"),
            "https://api.example.com"
        );
    }
}
