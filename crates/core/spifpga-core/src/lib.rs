//! Core types shared by the spifpga driver stack.
//!
//! Provides the [`SpinLock`](sync::SpinLock) used by every registry and device
//! handle, and the leveled logging macros ([`kinfo!`], [`kerr!`], ...) that
//! route through a host-installed sink.

#![cfg_attr(not(test), no_std)]

pub mod log;
pub mod sync;

pub use log::LogLevel;
