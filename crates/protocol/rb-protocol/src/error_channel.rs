//! ErrorChannel - the bounded, write-once error report to the host.

use rb_error::{ProtocolError, Result};
use std::io::Write;
use tracing::{debug, warn};

/// Reports a fatal error to the host.
///
/// The channel takes at most one message. It is truncated to the byte limit
/// on a character boundary, written, flushed and the channel is closed.
pub struct ErrorChannel<W: Write> {
    writer: Option<W>,
    limit: usize,
}

impl<W: Write> ErrorChannel<W> {
    pub fn new(writer: W, limit: usize) -> Self {
        Self {
            writer: Some(writer),
            limit,
        }
    }

    /// Whether a report was already written.
    pub fn is_closed(&self) -> bool {
        self.writer.is_none()
    }

    /// Writes `message` and closes the channel.
    pub fn report(&mut self, message: &str) -> Result<()> {
        let Some(mut writer) = self.writer.take() else {
            warn!("Error channel already closed, dropping report");
            return Ok(());
        };
        let payload = truncate_utf8(message, self.limit);
        writer
            .write_all(payload.as_bytes())
            .and_then(|()| writer.flush())
            .map_err(ProtocolError::from)?;
        debug!(bytes = payload.len(), "Reported error to host");
        Ok(())
    }
}

/// Longest prefix of `message` that fits `limit` bytes without splitting a
/// character.
pub fn truncate_utf8(message: &str, limit: usize) -> &str {
    if message.len() <= limit {
        return message;
    }
    let mut end = limit;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    &message[..end]
}
