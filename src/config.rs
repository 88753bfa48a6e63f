// In: src/config.rs

//! The single source of truth for postman build and bridge configuration.
//!
//! `PostmanConfig` is created once at the application boundary (from JSON or a
//! Python caller) and turned into the pieces the rest of the crate consumes:
//! `BuildOptions` for the row-oriented builder, a `MemoryPool` for every buffer,
//! and an `AlignmentPolicy` for imports.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::bridge::AlignmentPolicy;
use crate::error::PostmanError;
use crate::memory::{BoundedPool, MemoryPool, UnboundedPool};
use crate::table::BuildOptions;

//==================================================================================
// I. Logging Settings
//==================================================================================

/// Settings handed to `observability::init_logging`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// One of `off`, `error`, `warn`, `info`, `debug`, `trace`.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Append log lines to this file instead of stderr.
    #[serde(default)]
    pub log_file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

//==================================================================================
// II. The Unified PostmanConfig
//==================================================================================

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct PostmanConfig {
    /// Append one all-null row after the real rows of every build request.
    #[serde(default)]
    pub trailing_null_row: bool,

    /// Rows to claim up front in every column builder. `0` grows on demand.
    #[serde(default)]
    pub initial_capacity_rows: usize,

    /// Hard cap on buffer memory per build request. `None` means unbounded.
    #[serde(default)]
    pub memory_limit_bytes: Option<usize>,

    /// How imports treat buffers that are not aligned for their element type.
    #[serde(default)]
    pub alignment_policy: AlignmentPolicy,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl PostmanConfig {
    pub fn from_json(json: &str) -> Result<Self, PostmanError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            trailing_null_row: self.trailing_null_row,
            initial_capacity_rows: self.initial_capacity_rows,
        }
    }

    /// A fresh pool honouring `memory_limit_bytes`.
    pub fn memory_pool(&self) -> Arc<dyn MemoryPool> {
        match self.memory_limit_bytes {
            Some(limit) => Arc::new(BoundedPool::new(limit)),
            None => Arc::new(UnboundedPool::default()),
        }
    }
}
