//! Store configuration.
//!
//! Precedence: explicit values > environment > config file > defaults.

use crate::errors::StoreError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const DEFAULT_MAX_QUERY_DEPTH: usize = 32;
pub const DEFAULT_MAX_IN_SET: usize = 1000;
pub const DEFAULT_MAX_LIMIT: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Maximum nesting of sub-queries, quantifiers and combinators.
    pub max_query_depth: usize,
    /// Maximum number of values accepted by `$in` / `$notIn`.
    pub max_in_set: usize,
    /// Upper bound applied to `find` limits.
    pub max_limit: usize,
    /// Extra operator spellings, e.g. `"$contains" = "$includes"`.
    pub operator_aliases: BTreeMap<String, String>,
    /// Backend-specific scalar operators accepted as-is.
    pub operator_extensions: Vec<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_query_depth: DEFAULT_MAX_QUERY_DEPTH,
            max_in_set: DEFAULT_MAX_IN_SET,
            max_limit: DEFAULT_MAX_LIMIT,
            operator_aliases: BTreeMap::new(),
            operator_extensions: Vec::new(),
        }
    }
}

impl StoreConfig {
    /// # Errors
    /// Returns an error if the text is not valid TOML for this structure.
    pub fn from_toml_str(s: &str) -> Result<Self, StoreError> {
        let cfg: Self = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from a TOML file, then overlay environment variables.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let mut cfg = Self::from_file(path)?;
        cfg.apply_env()?;
        Ok(cfg)
    }

    /// Load from a TOML file only, ignoring the environment.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, StoreError> {
        let s = std::fs::read_to_string(path)?;
        Self::from_toml_str(&s)
    }

    /// Defaults overlaid with environment variables.
    ///
    /// # Errors
    /// Returns an error if an environment variable holds an invalid number.
    pub fn from_env() -> Result<Self, StoreError> {
        let mut cfg = Self::default();
        cfg.apply_env()?;
        Ok(cfg)
    }

    /// Overlay `DOCSTORE_MAX_QUERY_DEPTH`, `DOCSTORE_MAX_IN_SET` and `DOCSTORE_MAX_LIMIT`.
    ///
    /// # Errors
    /// Returns an error if a variable is set but is not a positive integer.
    pub fn apply_env(&mut self) -> Result<(), StoreError> {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    /// Overlay the same variables as [`StoreConfig::apply_env`], read through `lookup`.
    ///
    /// # Errors
    /// Returns an error if a variable is set but is not a positive integer.
    pub fn apply_vars<F>(&mut self, lookup: F) -> Result<(), StoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_usize("DOCSTORE_MAX_QUERY_DEPTH", lookup("DOCSTORE_MAX_QUERY_DEPTH"))? {
            self.max_query_depth = v;
        }
        if let Some(v) = parse_usize("DOCSTORE_MAX_IN_SET", lookup("DOCSTORE_MAX_IN_SET"))? {
            self.max_in_set = v;
        }
        if let Some(v) = parse_usize("DOCSTORE_MAX_LIMIT", lookup("DOCSTORE_MAX_LIMIT"))? {
            self.max_limit = v;
        }
        self.validate()
    }

    fn validate(&self) -> Result<(), StoreError> {
        if self.max_query_depth == 0 || self.max_in_set == 0 || self.max_limit == 0 {
            return Err(StoreError::Config("limits must be greater than zero".into()));
        }
        for token in self.operator_aliases.keys().chain(self.operator_extensions.iter()) {
            if !token.starts_with('$') || token.len() < 2 {
                return Err(StoreError::Config(format!("operator '{token}' must start with '$'")));
            }
        }
        Ok(())
    }
}

fn parse_usize(name: &str, raw: Option<String>) -> Result<Option<usize>, StoreError> {
    match raw {
        Some(s) => s
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|_| StoreError::Config(format!("{name} must be a positive integer, got '{s}'"))),
        None => Ok(None),
    }
}
