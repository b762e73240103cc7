//! Compiler options loaded from TOML.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tunables shared by the argument parser and the visitors.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerOptions {
    /// Argument literal that stands for a missing value.
    pub null_token: String,
    /// `time` format descriptions tried, in order, for temporal attributes
    /// that do not declare their own format.
    pub date_formats: Vec<String>,
    /// Compiled queries select each root row once.
    pub distinct: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            null_token: "null".to_owned(),
            date_formats: vec![
                "[year]-[month]-[day]T[hour]:[minute]:[second]".to_owned(),
                "[year]-[month]-[day] [hour]:[minute]:[second]".to_owned(),
                "[year]-[month]-[day]".to_owned(),
            ],
            distinct: false,
        }
    }
}

impl CompilerOptions {
    /// Parses options from TOML text; absent keys keep their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let options: CompilerOptions =
            toml::from_str(contents).map_err(|source| ConfigError::Syntax { source })?;
        options.validate()?;
        Ok(options)
    }

    /// Reads and validates an options file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let options: CompilerOptions =
            toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        options.validate()?;
        Ok(options)
    }

    /// Checks the null token and every date format.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.null_token.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "null_token",
                reason: "must not be blank".to_owned(),
            });
        }
        for format in &self.date_formats {
            time::format_description::parse_owned::<1>(format).map_err(|err| {
                ConfigError::Invalid {
                    key: "date_formats",
                    reason: format!("'{format}': {err}"),
                }
            })?;
        }
        Ok(())
    }
}

/// Errors raised while loading [`CompilerOptions`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read compiler config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse compiler config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to parse compiler config: {source}")]
    Syntax { source: toml::de::Error },
    #[error("config key '{key}' is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },
}
