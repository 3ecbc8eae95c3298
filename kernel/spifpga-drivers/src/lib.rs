//! Drivers for the FPGA peripherals behind the HPS bridge.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod board;
pub mod fpga_spi;

pub use fpga_spi::FpgaSpiDriver;
