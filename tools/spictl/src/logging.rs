//! Stderr sink for the driver stack's leveled log.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use spifpga_core::LogLevel;
use spifpga_core::log::{set_log_fn, set_print_fn};

static MAX_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);

fn stderr_log(level: LogLevel, args: fmt::Arguments<'_>) {
    if level as u8 <= MAX_LEVEL.load(Ordering::Relaxed) {
        eprintln!("[{}] {args}", level.name());
    }
}

fn stderr_print(args: fmt::Arguments<'_>) {
    eprint!("{args}");
}

/// Routes kernel-side logging to stderr, dropping messages less severe
/// than `level`.
pub fn init(level: LogLevel) {
    MAX_LEVEL.store(level as u8, Ordering::Relaxed);
    // SAFETY: both sinks only write to stderr and never re-enter the driver
    // stack.
    unsafe {
        set_log_fn(stderr_log);
        set_print_fn(stderr_print);
    }
}
