//! Memory management for device register windows.

mod mmio;

pub use mmio::{IoMemSpace, MmioError, MmioMapping};
