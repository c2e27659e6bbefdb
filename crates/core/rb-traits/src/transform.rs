//! Transform trait for batch processing.

use arrow::record_batch::RecordBatch;
use rb_error::Result;
use std::sync::Arc;

/// Trait for batch transformations run by the executor loop.
///
/// One call receives one complete input batch and must return exactly one
/// output batch with the same number of rows.
///
/// # Zero-Copy Semantics
///
/// Implementations should hand back input columns they did not modify
/// instead of rebuilding them, so the output shares the input buffers.
pub trait Transform: Send + Sync {
    /// Applies the transform to a batch.
    fn apply(&self, batch: Arc<RecordBatch>) -> Result<Arc<RecordBatch>>;

    /// Returns the name of this transform for logging.
    fn name(&self) -> &str {
        "transform"
    }
}

/// An identity transform that passes batches through unchanged.
pub struct IdentityTransform;

impl Transform for IdentityTransform {
    fn apply(&self, batch: Arc<RecordBatch>) -> Result<Arc<RecordBatch>> {
        Ok(batch)
    }

    fn name(&self) -> &str {
        "identity"
    }
}
