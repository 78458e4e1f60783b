//! Credential resolution.
//!
//! Providers never read the process environment directly.  An [`Env`] is
//! injected at construction so tests can substitute a [`MapEnv`].

use std::collections::HashMap;

use crate::error::{AdapterError, Result};

/// A source of named configuration values.
pub trait Env: Send + Sync {
    /// Look up `key`, returning `None` when unset.
    fn var(&self, key: &str) -> Option<String>;
}

/// Reads from the real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl Env for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// An in-memory environment.
#[derive(Debug, Clone, Default)]
pub struct MapEnv {
    vars: HashMap<String, String>,
}

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_string(), value.to_string());
        self
    }
}

impl Env for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

/// An opaque secret bound to one provider.
///
/// `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw secret, for placing into a header or query.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(****)")
    }
}

/// Read a mandatory credential.  Empty and whitespace-only values count as
/// missing.
pub fn require(env: &dyn Env, provider: &str, key: &str) -> Result<Credential> {
    optional(env, key).map(Credential::new).ok_or_else(|| {
        AdapterError::ConfigError(format!(
            "missing environment variable `{key}` required by provider `{provider}`"
        ))
    })
}

/// Read an optional setting, trimmed, with empty values treated as unset.
pub fn optional(env: &dyn Env, key: &str) -> Option<String> {
    env.var(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Extract the data-center suffix from a `<key>-<dc>` style API key.
///
/// The suffix is everything after the last `-`.  A key with no delimiter, or
/// with nothing after it, is a configuration error.
pub fn data_center(provider: &str, key: &Credential) -> Result<String> {
    match key.expose().rsplit_once('-') {
        Some((_, dc)) if !dc.is_empty() => Ok(dc.to_string()),
        _ => Err(AdapterError::ConfigError(format!(
            "{provider} API key must end with a data-center suffix such as `-us5`"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_reports_variable_name() {
        let env = MapEnv::new();
        let err = require(&env, "stripe", "STRIPE_API_KEY").unwrap_err();
        assert!(err.to_string().contains("STRIPE_API_KEY"));
        assert!(err.to_string().contains("stripe"));
    }

    #[test]
    fn blank_values_are_missing() {
        let env = MapEnv::new().with("TOKEN", "   ");
        assert!(require(&env, "p", "TOKEN").is_err());
        assert!(optional(&env, "TOKEN").is_none());
    }

    #[test]
    fn require_trims() {
        let env = MapEnv::new().with("TOKEN", " abc \n");
        assert_eq!(require(&env, "p", "TOKEN").unwrap().expose(), "abc");
    }

    #[test]
    fn debug_is_redacted() {
        let c = Credential::new("sk_live_secret");
        assert_eq!(format!("{c:?}"), "Credential(****)");
    }

    #[test]
    fn data_center_uses_trailing_segment() {
        let dc = data_center("mailchimp", &Credential::new("abc123-us5")).unwrap();
        assert_eq!(dc, "us5");
        let dc = data_center("mailchimp", &Credential::new("a-b-us21")).unwrap();
        assert_eq!(dc, "us21");
    }

    #[test]
    fn data_center_without_delimiter_is_config_error() {
        let err = data_center("mailchimp", &Credential::new("abc123")).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);
        assert!(data_center("mailchimp", &Credential::new("abc123-")).is_err());
    }
}
