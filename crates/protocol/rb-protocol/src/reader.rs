//! BatchReader - one IPC stream per input batch.

use arrow::error::ArrowError;
use arrow::ipc::reader::StreamReader;
use arrow::record_batch::RecordBatch;
use rb_error::{ProtocolError, RbError, Result};
use std::io::{BufRead, BufReader, ErrorKind, Read};
use tracing::{debug, warn};

/// Reads batches from the host.
///
/// The host writes every batch as its own IPC stream: schema, one record
/// batch, end-of-stream marker. Streams follow each other back to back on
/// the same channel until the host closes it.
pub struct BatchReader<R: Read> {
    reader: BufReader<R>,
}

impl<R: Read> BatchReader<R> {
    pub fn new(input: R) -> Self {
        Self {
            reader: BufReader::new(input),
        }
    }

    /// Reads the next batch.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::StreamClosed`] when the host closed the
    /// channel, including in the middle of a stream.
    pub fn read_batch(&mut self) -> Result<RecordBatch> {
        let available = self.reader.fill_buf().map_err(ProtocolError::from)?;
        if available.is_empty() {
            return Err(ProtocolError::StreamClosed.into());
        }

        let mut stream = StreamReader::try_new(&mut self.reader, None).map_err(closed_or_fatal)?;
        let batch = match stream.next() {
            Some(batch) => batch.map_err(closed_or_fatal)?,
            None => {
                debug!("Input stream ended without a batch");
                return Err(ProtocolError::StreamClosed.into());
            }
        };

        // Consume the end-of-stream marker so the next stream starts cleanly
        for extra in stream.by_ref() {
            let extra = extra.map_err(closed_or_fatal)?;
            warn!(rows = extra.num_rows(), "Ignoring extra batch in input stream");
        }

        Ok(batch)
    }
}

/// A read that hits the end of the channel means the host went away.
fn closed_or_fatal(error: ArrowError) -> RbError {
    match &error {
        ArrowError::IoError(_, io) if io.kind() == ErrorKind::UnexpectedEof => {
            debug!(error = %error, "Input closed mid-stream");
            ProtocolError::StreamClosed.into()
        }
        _ => error.into(),
    }
}
