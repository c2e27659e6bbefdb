//! Configuration types for the Rhai bridge.

use rb_error::{RbError, Result};
use serde::{Deserialize, Serialize};

/// Engine limits for the Rhai bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Maximum number of operations per row evaluation (0 = unlimited).
    pub max_operations: u64,

    /// Maximum expression nesting depth.
    pub max_expr_depth: usize,

    /// Maximum function call depth.
    pub max_call_levels: usize,

    /// Maximum length of a string value in bytes (0 = unlimited).
    ///
    /// The data-size limits also apply to the row handed to the snippet,
    /// so they default to unlimited.
    pub max_string_size: usize,

    /// Maximum number of elements in an array (0 = unlimited).
    pub max_array_size: usize,

    /// Maximum number of entries in a map (0 = unlimited).
    pub max_map_size: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            max_operations: 100_000,
            max_expr_depth: 64,
            max_call_levels: 16,
            max_string_size: 0,
            max_array_size: 0,
            max_map_size: 0,
        }
    }
}

impl BridgeConfig {
    /// Sets the operation budget per row.
    pub fn with_max_operations(mut self, max_operations: u64) -> Self {
        self.max_operations = max_operations;
        self
    }

    pub fn with_max_expr_depth(mut self, depth: usize) -> Self {
        self.max_expr_depth = depth;
        self
    }

    pub fn with_max_call_levels(mut self, levels: usize) -> Self {
        self.max_call_levels = levels;
        self
    }

    pub fn with_max_string_size(mut self, size: usize) -> Self {
        self.max_string_size = size;
        self
    }

    pub fn with_max_array_size(mut self, size: usize) -> Self {
        self.max_array_size = size;
        self
    }

    pub fn with_max_map_size(mut self, size: usize) -> Self {
        self.max_map_size = size;
        self
    }

    /// Checks that the limits leave room for a script to run at all.
    pub fn validate(&self) -> Result<()> {
        if self.max_expr_depth == 0 {
            return Err(RbError::Config(
                "max_expr_depth must be greater than 0".to_string(),
            ));
        }
        if self.max_call_levels == 0 {
            return Err(RbError::Config(
                "max_call_levels must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
