//! A cooperative stop flag flipped by SIGINT/SIGTERM. The event loops test
//! it once per tick rather than unwinding out of a signal handler.

use std::io;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::flag;

/// Registers SIGINT and SIGTERM to set the returned flag to `true`. The
/// loop that owns the flag should check it once per iteration — via
/// [`should_stop`] — and exit cleanly once it flips.
pub fn install() -> io::Result<Arc<AtomicBool>> {
    let shutdown = Arc::new(AtomicBool::new(false));
    flag::register(SIGINT, Arc::clone(&shutdown))?;
    flag::register(SIGTERM, Arc::clone(&shutdown))?;
    Ok(shutdown)
}

pub fn should_stop(shutdown: &AtomicBool) -> bool {
    shutdown.load(std::sync::atomic::Ordering::SeqCst)
}
