//! The executor main loop.

use crate::reader::BatchReader;
use crate::writer::BatchWriter;
use chrono::{DateTime, TimeDelta, Utc};
use rb_error::{classify_error, ErrorCategory, Result};
use rb_traits::Transform;
use serde::Serialize;
use std::io::{Read, Write};
use std::sync::Arc;
use tracing::{debug, info};

/// Counters of one executor session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Batches read from the host
    pub batches: u64,
    pub rows_in: u64,
    pub rows_out: u64,
}

impl SessionStats {
    /// Creates stats with the current time as start time.
    pub fn new() -> Self {
        Self {
            started_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    pub fn record_batch(&mut self, rows_in: usize, rows_out: usize) {
        self.batches += 1;
        self.rows_in += rows_in as u64;
        self.rows_out += rows_out as u64;
    }

    /// Marks the session as complete with the current time.
    pub fn complete(&mut self) {
        self.completed_at = Some(Utc::now());
    }

    pub fn duration(&self) -> Option<TimeDelta> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}

/// Runs the read-transform-write loop until the host closes `input`.
///
/// Each input batch goes through `transform` and comes back as one output
/// stream on `output`. A closed input ends the session successfully; any
/// other error ends it with that error.
pub fn serve<R, W, T>(input: R, output: W, transform: &T) -> Result<SessionStats>
where
    R: Read,
    W: Write,
    T: Transform + ?Sized,
{
    let mut reader = BatchReader::new(input);
    let mut writer = BatchWriter::new(output);
    let mut stats = SessionStats::new();

    loop {
        let batch = match reader.read_batch() {
            Ok(batch) => Arc::new(batch),
            Err(e) if classify_error(&e) == ErrorCategory::Shutdown => {
                stats.complete();
                info!(
                    batches = stats.batches,
                    rows_in = stats.rows_in,
                    rows_out = stats.rows_out,
                    duration_ms = stats.duration().map(|d| d.num_milliseconds()),
                    "Input closed, session finished"
                );
                return Ok(stats);
            }
            Err(e) => return Err(e),
        };

        let rows_in = batch.num_rows();
        debug!(
            rows = rows_in,
            columns = batch.num_columns(),
            transform = transform.name(),
            "Received batch"
        );
        let output = transform.apply(batch)?;
        writer.write_batch(&output)?;
        stats.record_batch(rows_in, output.num_rows());
    }
}
