//! RhaiBridge - evaluates a Rhai snippet against each row.

use crate::bridge::ScriptBridge;
use crate::builtin::register_builtin_functions;
use crate::config::BridgeConfig;
use crate::conversion::{dynamic_to_value, map_to_record_skipping, value_to_dynamic};
use crate::path::FieldPath;
use crate::row::RowView;
use crate::value::Value;
use rb_error::{Result, TransformError};
use rhai::{Dynamic, Engine, Map, Scope, AST};
use std::collections::HashSet;
use tracing::debug;

/// Rhai implementation of [`ScriptBridge`].
///
/// The snippet is compiled once. Every row gets a fresh scope holding
/// `record`, the row as an object map, and the constant `row`, its index.
/// The snippet either mutates `record` or evaluates to a map that replaces
/// it; the result is merged back into the row view. Keys holding a function
/// pointer are not written back and keep their previous value.
pub struct RhaiBridge {
    /// Pre-compiled snippet.
    ast: AST,

    engine: Engine,
}

impl std::fmt::Debug for RhaiBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RhaiBridge").finish_non_exhaustive()
    }
}

impl RhaiBridge {
    /// Compiles `code` with the limits of `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the snippet does
    /// not compile.
    pub fn new(code: &str, config: &BridgeConfig) -> Result<Self> {
        config.validate()?;
        let mut engine = Self::create_engine(config);
        register_builtin_functions(&mut engine);

        let ast = engine
            .compile(code)
            .map_err(|e| TransformError::Compilation(e.to_string()))?;

        debug!(code_len = code.len(), "Compiled snippet");
        Ok(Self { ast, engine })
    }

    /// Creates a Rhai engine with safety limits.
    fn create_engine(config: &BridgeConfig) -> Engine {
        let mut engine = Engine::new();

        engine.set_max_expr_depths(config.max_expr_depth, config.max_expr_depth);
        engine.set_max_operations(config.max_operations);
        engine.set_max_string_size(config.max_string_size);
        engine.set_max_array_size(config.max_array_size);
        engine.set_max_map_size(config.max_map_size);
        engine.set_max_call_levels(config.max_call_levels);

        engine.set_optimization_level(rhai::OptimizationLevel::Full);

        engine
    }

    fn record_of(view: &RowView) -> Map {
        view.root()
            .iter()
            .map(|(key, node)| (key.into(), value_to_dynamic(&node.to_value())))
            .collect()
    }
}

impl ScriptBridge for RhaiBridge {
    fn evaluate(&self, view: &mut RowView) -> Result<()> {
        let row = view.row();
        let mut scope = Scope::new();
        scope.push("record", Self::record_of(view));
        scope.push_constant("row", row as i64);

        let result: Dynamic = self
            .engine
            .eval_ast_with_scope(&mut scope, &self.ast)
            .map_err(|e| TransformError::Execution {
                row,
                message: e.to_string(),
            })?;

        let record = if result.is_map() {
            result.try_cast::<Map>()
        } else {
            scope.get_value::<Map>("record")
        };
        let Some(record) = record else {
            // `record` was rebound to something that is not a map
            let value = scope
                .get_value::<Dynamic>("record")
                .and_then(dynamic_to_value)
                .unwrap_or(Value::Null);
            return Err(TransformError::Execution {
                row,
                message: format!("record must stay a map, found {}", value.kind()),
            }
            .into());
        };

        let mut functions = HashSet::new();
        let record = map_to_record_skipping(record, &FieldPath::row(), &mut functions);
        if !functions.is_empty() {
            debug!(row, count = functions.len(), "Skipping function pointer fields");
        }
        view.merge_retaining(record, &functions);
        Ok(())
    }
}
