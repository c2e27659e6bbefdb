//! Wiring of the channels, the snippet and the executor loop.

use crate::args::Cli;
use crate::channel::adopt;
use rb_error::{classify_error, ErrorCategory, ProtocolError, RbError, Result};
use rb_extension::ExtensionRegistry;
use rb_protocol::{read_code, serve, ErrorChannel, ProtocolConfig, SessionStats};
use rb_transform::{BridgeConfig, RhaiBridge, ScriptTransform};
use std::io::{BufWriter, Read, Write};
use std::sync::Arc;
use tracing::{error, info};

/// Opens the descriptor channels and runs the executor on stdin/stdout.
///
/// Returns the process exit code.
pub fn launch(args: &Cli) -> u8 {
    let protocol = ProtocolConfig::default();

    if args.code_fd == args.err_fd {
        let e: RbError = ProtocolError::InvalidChannel(format!(
            "code and error channels share descriptor {}",
            args.code_fd
        ))
        .into();
        error!(error = %e, "Cannot open channels");
        return ErrorCategory::Fatal.exit_code();
    }

    let errors = match adopt(args.err_fd, "error") {
        Ok(file) => file,
        Err(e) => {
            error!(error = %e, "Cannot open error channel");
            return ErrorCategory::Fatal.exit_code();
        }
    };
    let mut channel = ErrorChannel::new(errors, protocol.error_limit);

    let code = match adopt(args.code_fd, "code") {
        Ok(file) => file,
        Err(e) => return fail(&mut channel, &e),
    };

    let stdin = std::io::stdin().lock();
    let stdout = BufWriter::new(std::io::stdout().lock());
    execute(code, stdin, stdout, &mut channel, &args.bridge_config(), &protocol)
}

/// Runs one executor session over the given channels.
///
/// Returns 0 once the host closes `input`. Any other outcome is reported on
/// `channel` and returns 1.
pub fn execute<C, I, O, E>(
    code: C,
    input: I,
    output: O,
    channel: &mut ErrorChannel<E>,
    bridge: &BridgeConfig,
    protocol: &ProtocolConfig,
) -> u8
where
    C: Read,
    I: Read,
    O: Write,
    E: Write,
{
    match session(code, input, output, bridge, protocol) {
        Ok(stats) => {
            info!(
                batches = stats.batches,
                rows_in = stats.rows_in,
                rows_out = stats.rows_out,
                "Executor completed"
            );
            ErrorCategory::Shutdown.exit_code()
        }
        Err(e) => fail(channel, &e),
    }
}

fn session<C: Read, I: Read, O: Write>(
    code: C,
    input: I,
    output: O,
    bridge: &BridgeConfig,
    protocol: &ProtocolConfig,
) -> Result<SessionStats> {
    let code = read_code(code, protocol.code_limit)?;
    let bridge = RhaiBridge::new(&code, bridge)?;
    let transform = ScriptTransform::new(bridge, Arc::new(ExtensionRegistry::new()));
    serve(input, output, &transform)
}

/// Reports `e` on the error channel unless it is a clean shutdown.
fn fail<E: Write>(channel: &mut ErrorChannel<E>, e: &RbError) -> u8 {
    let category = classify_error(e);
    if category == ErrorCategory::Fatal {
        error!(error = %e, "Executor failed");
        if let Err(report) = channel.report(&e.to_string()) {
            error!(error = %report, "Failed to report error to host");
        }
    }
    category.exit_code()
}
