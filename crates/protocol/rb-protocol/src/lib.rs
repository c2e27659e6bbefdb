//! Subprocess framing protocol for rowbridge.
//!
//! The host talks to the executor over four channels:
//!
//! - the code channel, read once by [`read_code`]
//! - stdin, a sequence of single-batch IPC streams ([`BatchReader`])
//! - stdout, one single-batch IPC stream per input batch ([`BatchWriter`])
//! - the error channel, written at most once ([`ErrorChannel`])
//!
//! [`serve`] runs the main loop on top of a [`rb_traits::Transform`].

mod code;
mod config;
mod error_channel;
mod reader;
mod session;
mod writer;

pub use code::read_code;
pub use config::{ProtocolConfig, DEFAULT_CODE_LIMIT, DEFAULT_ERROR_LIMIT};
pub use error_channel::{truncate_utf8, ErrorChannel};
pub use reader::BatchReader;
pub use session::{serve, SessionStats};
pub use writer::BatchWriter;
