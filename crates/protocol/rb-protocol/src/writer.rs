//! BatchWriter - one IPC stream per output batch.

use arrow::ipc::writer::StreamWriter;
use arrow::record_batch::RecordBatch;
use rb_error::{ProtocolError, Result};
use std::io::Write;
use tracing::trace;

/// Writes batches back to the host.
///
/// Every batch is written as a complete IPC stream of its own, since the
/// schema can change from one batch to the next.
pub struct BatchWriter<W: Write> {
    writer: W,
}

impl<W: Write> BatchWriter<W> {
    pub fn new(output: W) -> Self {
        Self { writer: output }
    }

    /// Writes `batch` as one stream and flushes the channel.
    pub fn write_batch(&mut self, batch: &RecordBatch) -> Result<()> {
        let mut stream = StreamWriter::try_new(&mut self.writer, &batch.schema())?;
        stream.write(batch)?;
        stream.finish()?;
        drop(stream);
        self.writer.flush().map_err(ProtocolError::from)?;
        trace!(rows = batch.num_rows(), "Wrote output stream");
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
