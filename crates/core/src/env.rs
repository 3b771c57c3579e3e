//! Explicit environment-lookup capability.
//!
//! Components that need process environment state (API-key secrets, the
//! base environment handed to the retrieval subprocess) receive a
//! [`ProcessEnv`] through their constructor instead of reading ambient
//! globals, so tests can substitute deterministic environments.

use std::collections::HashMap;

use crate::error::Error;

/// An immutable snapshot of environment variables.
#[derive(Debug, Clone, Default)]
pub struct ProcessEnv {
    vars: HashMap<String, String>,
}

impl ProcessEnv {
    /// Snapshot the real process environment.
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Build from explicit pairs (tests, embedding).
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Return a copy with one variable set (overriding any existing value).
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Resolve a required secret by the *name* of its environment
    /// variable. Missing or blank values are configuration errors.
    pub fn resolve_secret(&self, env_name: &str) -> Result<String, Error> {
        match self.get(env_name) {
            Some(value) if !value.trim().is_empty() => Ok(value.to_string()),
            Some(_) => Err(Error::Config {
                message: format!("Secret environment variable '{env_name}' cannot be empty"),
            }),
            None => Err(Error::Config {
                message: format!("Required secret environment variable '{env_name}' is not set"),
            }),
        }
    }
}
