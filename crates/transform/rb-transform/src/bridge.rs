//! Script bridge trait and the batch transform driving it.

use crate::results::ResultsBuffer;
use crate::row::RowView;
use arrow::record_batch::RecordBatch;
use rb_error::Result;
use rb_extension::ExtensionRegistry;
use rb_traits::Transform;
use std::sync::Arc;
use tracing::{debug, trace};

/// Evaluates the user snippet against one row.
///
/// Implementations mutate `view` in place. A failure is fatal for the
/// whole batch and should carry the row index (`view.row()`).
pub trait ScriptBridge: Send + Sync {
    fn evaluate(&self, view: &mut RowView) -> Result<()>;
}

impl<F> ScriptBridge for F
where
    F: Fn(&mut RowView) -> Result<()> + Send + Sync,
{
    fn evaluate(&self, view: &mut RowView) -> Result<()> {
        self(view)
    }
}

/// Runs a [`ScriptBridge`] over every row of a batch.
pub struct ScriptTransform<B> {
    bridge: B,
    registry: Arc<ExtensionRegistry>,
    name: String,
}

impl<B: ScriptBridge> ScriptTransform<B> {
    pub fn new(bridge: B, registry: Arc<ExtensionRegistry>) -> Self {
        Self {
            bridge,
            registry,
            name: "script".to_string(),
        }
    }

    /// Sets the name reported in logs.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn bridge(&self) -> &B {
        &self.bridge
    }
}

impl<B: ScriptBridge> Transform for ScriptTransform<B> {
    fn apply(&self, batch: Arc<RecordBatch>) -> Result<Arc<RecordBatch>> {
        let mut results = ResultsBuffer::new(batch, &self.registry)?;
        for row in 0..results.num_rows() {
            let mut view = results.start_row(row)?;
            self.bridge.evaluate(&mut view)?;
            trace!(row, "Evaluated row");
            results.finish_row(view)?;
        }
        let output = results.finish()?;
        debug!(
            transform = %self.name,
            rows = output.num_rows(),
            columns = output.num_columns(),
            "Applied script"
        );
        Ok(output)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
