//! Protocol limits.

use serde::{Deserialize, Serialize};

/// Maximum snippet size read from the code channel.
pub const DEFAULT_CODE_LIMIT: usize = 128 * 1024;

/// Maximum error payload written to the error channel.
pub const DEFAULT_ERROR_LIMIT: usize = 4096;

/// Size limits of the process protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Maximum snippet size in bytes.
    pub code_limit: usize,

    /// Maximum error payload in bytes.
    pub error_limit: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            code_limit: DEFAULT_CODE_LIMIT,
            error_limit: DEFAULT_ERROR_LIMIT,
        }
    }
}

impl ProtocolConfig {
    pub fn with_code_limit(mut self, limit: usize) -> Self {
        self.code_limit = limit;
        self
    }

    pub fn with_error_limit(mut self, limit: usize) -> Self {
        self.error_limit = limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProtocolConfig::default();
        assert_eq!(config.code_limit, 131_072);
        assert_eq!(config.error_limit, 4096);
    }

    #[test]
    fn test_serde_partial() {
        let config: ProtocolConfig = serde_json::from_str(r#"{"error_limit": 10}"#).unwrap();
        assert_eq!(config.error_limit, 10);
        assert_eq!(config.code_limit, DEFAULT_CODE_LIMIT);
    }
}
