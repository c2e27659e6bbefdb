//! Adoption of the descriptors the host passes on the command line.

use rb_error::{ProtocolError, Result};
use std::fs::File;

/// Takes ownership of the inherited descriptor `fd`.
///
/// Standard streams are rejected: stdin and stdout carry batches and stderr
/// carries logs. The descriptor is closed when the returned file is dropped.
#[cfg(unix)]
pub fn adopt(fd: i32, channel: &str) -> Result<File> {
    use std::os::fd::FromRawFd;

    if fd <= 2 {
        return Err(ProtocolError::InvalidChannel(format!(
            "{channel} descriptor {fd} is not usable, standard streams are reserved"
        ))
        .into());
    }
    // SAFETY: the host hands `fd` to this process for its exclusive use and
    // `launch` adopts every descriptor at most once.
    Ok(unsafe { File::from_raw_fd(fd) })
}

#[cfg(not(unix))]
pub fn adopt(fd: i32, channel: &str) -> Result<File> {
    Err(ProtocolError::InvalidChannel(format!(
        "{channel} descriptor {fd}: descriptor channels need a unix host"
    ))
    .into())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use rb_error::RbError;
    use std::io::Write;
    use std::os::fd::IntoRawFd;
    use tempfile::NamedTempFile;

    #[test]
    fn test_adopt_descriptor() {
        let target = NamedTempFile::new().unwrap();
        let fd = File::create(target.path()).unwrap().into_raw_fd();

        let mut file = adopt(fd, "error").unwrap();
        file.write_all(b"boom").unwrap();
        drop(file);

        assert_eq!(std::fs::read_to_string(target.path()).unwrap(), "boom");
    }

    #[test]
    fn test_standard_streams_rejected() {
        for fd in [-1, 0, 1, 2] {
            assert!(matches!(
                adopt(fd, "code"),
                Err(RbError::Protocol(ProtocolError::InvalidChannel(_)))
            ));
        }
    }
}
