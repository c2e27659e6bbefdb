//! Snippet delivery on the code channel.

use rb_error::{ProtocolError, Result};
use std::io::Read;
use tracing::debug;

/// Reads the snippet from the code channel.
///
/// The channel is read to its end once. Snippets longer than `limit` bytes
/// or not valid UTF-8 are rejected.
pub fn read_code<R: Read>(reader: R, limit: usize) -> Result<String> {
    let mut bytes = Vec::new();
    reader
        .take(limit as u64 + 1)
        .read_to_end(&mut bytes)
        .map_err(ProtocolError::from)?;

    if bytes.len() > limit {
        return Err(ProtocolError::InvalidCode(format!("snippet exceeds {limit} bytes")).into());
    }

    let code = String::from_utf8(bytes)
        .map_err(|e| ProtocolError::InvalidCode(format!("snippet is not valid UTF-8: {e}")))?;
    debug!(bytes = code.len(), "Read snippet");
    Ok(code)
}
