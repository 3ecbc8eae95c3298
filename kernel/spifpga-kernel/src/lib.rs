//! Platform bus and driver model for memory-mapped FPGA peripherals.
//!
//! The pieces a platform driver touches:
//!
//! - [`bus::PlatformBus`] -- device registration, driver matching, probe/remove.
//! - [`driver_api`] -- resource descriptors, the [`PlatformDriver`] trait, probe
//!   contexts and capability tokens, [`DriverError`].
//! - [`mm::IoMemSpace`] -- the physical I/O range behind the bridge and the
//!   exclusive [`MmioMapping`](mm::MmioMapping) windows carved out of it.
//! - [`fs::MiscRegistry`] -- the misc character-device table user space opens.
//! - [`uaccess`] -- bounds-checked copies to and from user buffers.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod bus;
pub mod driver_api;
pub mod fs;
pub mod mm;
pub mod uaccess;

pub use bus::PlatformBus;
pub use driver_api::{DriverError, PlatformDriver};
pub use spifpga_core::{kdebug, kerr, kinfo, ktrace, kwarn};
