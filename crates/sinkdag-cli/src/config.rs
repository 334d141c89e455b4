// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Optional JSON settings file.
//!
//! Precedence, highest first: command-line flags, `SINKDAG_LOG` (log filter
//! only), the settings file, built-in defaults.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sinkdag::{HashAlgorithm, UnknownHashAlgorithm};
use thiserror::Error;

/// Environment variable holding a `tracing` filter directive.
pub const LOG_ENV: &str = "SINKDAG_LOG";

/// Filter used when neither the environment nor the settings file set one.
pub const DEFAULT_LOG: &str = "warn";

/// Error type for settings loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error while reading the file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// File is not valid settings JSON.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    /// `hash` names an unsupported algorithm.
    #[error(transparent)]
    Hash(#[from] UnknownHashAlgorithm),
}

/// Contents of the settings file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// `"blake3"` or `"sha256"`.
    pub hash: Option<String>,
    /// `tracing` filter directive, e.g. `"sinkdag=debug"`.
    pub log: Option<String>,
}

impl Settings {
    /// Reads settings from `path`. An empty file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let bytes = fs::read(path)?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Hash algorithm after applying the command-line override.
    pub fn hash_algorithm(&self, flag: Option<HashAlgorithm>) -> Result<HashAlgorithm, ConfigError> {
        if let Some(algorithm) = flag {
            return Ok(algorithm);
        }
        match self.hash.as_deref() {
            Some(name) => Ok(name.parse()?),
            None => Ok(HashAlgorithm::default()),
        }
    }

    /// Log filter after applying the environment override.
    pub fn log_filter(&self, env: Option<String>) -> String {
        env.filter(|value| !value.trim().is_empty())
            .or_else(|| self.log.clone())
            .unwrap_or_else(|| DEFAULT_LOG.to_owned())
    }
}
