pub mod classify;
pub mod client;
pub mod server;
pub mod types;

pub use classify::{classify, error_code_for, validate_session_fields, Message};
pub use client::Detector;
pub use server::Controller;
pub use types::ConnectionState;

use std::io::{self, ErrorKind, Write};

/// Writes the whole buffer to `w`, retrying on `Interrupted` and looping
/// through partial writes. A `WouldBlock` partway through is reported to
/// the caller rather than spun on, since every send here is small enough to
/// fit a socket's send buffer in the common case and the caller's policy
/// for a would-block mid-send is to drop and log, not block the loop.
pub(crate) fn write_all_non_blocking<W: Write>(w: &mut W, mut buf: &[u8]) -> io::Result<()> {
    while !buf.is_empty() {
        match w.write(buf) {
            Ok(0) => return Err(io::Error::from(ErrorKind::WriteZero)),
            Ok(n) => buf = &buf[n..],
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
