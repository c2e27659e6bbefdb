//! CLI argument definitions for rb-executor.

use clap::Parser;
pub use rb_cli_common::LogLevel;
use rb_transform::BridgeConfig;

/// Row-level transform executor for Arrow IPC batches.
///
/// Reads a Rhai snippet from CODE_FD, then transforms every batch arriving on
/// stdin and writes the result to stdout. The first fatal error is reported on
/// ERROR_FD and the process exits with status 1. Closing stdin ends the
/// session with status 0.
///
/// ## Example
///
///   rb-executor 3 4 3<snippet.rhai 4>errors.txt <batches.arrows >out.arrows
#[derive(Parser, Debug)]
#[command(name = "rb-executor")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Descriptor the snippet is read from
    #[arg(value_name = "CODE_FD")]
    pub code_fd: i32,

    /// Descriptor fatal errors are reported on
    #[arg(value_name = "ERROR_FD")]
    pub err_fd: i32,

    // === Engine limits ===
    /// Maximum operations per row (0 = unlimited)
    #[arg(long, env = "RB_MAX_OPERATIONS")]
    pub max_operations: Option<u64>,

    /// Maximum expression nesting depth
    #[arg(long, env = "RB_MAX_EXPR_DEPTH", value_parser = clap::value_parser!(u64).range(1..))]
    pub max_expr_depth: Option<u64>,

    /// Maximum function call depth
    #[arg(long, env = "RB_MAX_CALL_LEVELS", value_parser = clap::value_parser!(u64).range(1..))]
    pub max_call_levels: Option<u64>,

    /// Maximum string length in bytes (0 = unlimited)
    #[arg(long, env = "RB_MAX_STRING_SIZE")]
    pub max_string_size: Option<usize>,

    /// Maximum array length (0 = unlimited)
    #[arg(long, env = "RB_MAX_ARRAY_SIZE")]
    pub max_array_size: Option<usize>,

    /// Maximum number of map entries (0 = unlimited)
    #[arg(long, env = "RB_MAX_MAP_SIZE")]
    pub max_map_size: Option<usize>,

    // === Logging ===
    /// Log level
    #[arg(short = 'l', long, value_enum, env = "RB_LOG_LEVEL", default_value = "warn")]
    pub log_level: LogLevel,
}

impl Cli {
    /// Engine limits with the flags applied over the defaults.
    pub fn bridge_config(&self) -> BridgeConfig {
        let mut config = BridgeConfig::default();
        if let Some(max) = self.max_operations {
            config = config.with_max_operations(max);
        }
        if let Some(depth) = self.max_expr_depth {
            config = config.with_max_expr_depth(depth as usize);
        }
        if let Some(levels) = self.max_call_levels {
            config = config.with_max_call_levels(levels as usize);
        }
        if let Some(size) = self.max_string_size {
            config = config.with_max_string_size(size);
        }
        if let Some(size) = self.max_array_size {
            config = config.with_max_array_size(size);
        }
        if let Some(size) = self.max_map_size {
            config = config.with_max_map_size(size);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_descriptors() {
        let cli = Cli::try_parse_from(["rb-executor", "3", "4"]).unwrap();
        assert_eq!(cli.code_fd, 3);
        assert_eq!(cli.err_fd, 4);
        assert_eq!(cli.log_level, LogLevel::Warn);
        assert_eq!(cli.bridge_config(), BridgeConfig::default());
    }

    #[test]
    fn test_missing_descriptor() {
        assert!(Cli::try_parse_from(["rb-executor", "3"]).is_err());
    }

    #[test]
    fn test_engine_limits() {
        let cli = Cli::try_parse_from([
            "rb-executor",
            "--max-operations",
            "500",
            "--max-map-size",
            "8",
            "--log-level",
            "debug",
            "3",
            "4",
        ])
        .unwrap();

        let config = cli.bridge_config();
        assert_eq!(config.max_operations, 500);
        assert_eq!(config.max_map_size, 8);
        assert_eq!(config.max_call_levels, BridgeConfig::default().max_call_levels);
        assert_eq!(cli.log_level, LogLevel::Debug);
    }

    #[test]
    fn test_zero_depth_rejected() {
        let result = Cli::try_parse_from(["rb-executor", "--max-expr-depth", "0", "3", "4"]);
        assert!(result.is_err());
    }
}
