//! Host control tool for the FPGA SPI driver stack.
//!
//! Usage:
//!   spictl list                         - Show devices, bindings and misc entries
//!   spictl read <device>                - Read the device's register value
//!   spictl write <device> <value>       - Write a value (decimal or 0x hex)
//!   spictl lifecycle <device> <value>   - Probe, write, read, remove, read again
//!
//! Every command brings up a fresh bus from `--config <board.toml>` (or the
//! built-in board) and tears it down on exit.

mod commands;
mod config;
mod logging;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use spifpga_core::LogLevel;
use spifpga_drivers::board;
use spifpga_kernel::PlatformBus;
use spifpga_kernel::mm::IoMemSpace;

use crate::config::Board;

#[derive(Parser)]
#[command(name = "spictl")]
#[command(about = "Drive FPGA SPI registers through the platform bus")]
struct Cli {
    /// Board description (default: built-in board)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level: error, warn, info, debug, trace (overrides the board file)
    #[arg(short, long, global = true, value_parser = config::parse_level)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List devices with state, resources and misc entries
    List,

    /// Read a device's register value
    Read {
        /// Device name (e.g. fpga_spi)
        device: String,
    },

    /// Write a value to a device's register
    Write {
        /// Device name (e.g. fpga_spi)
        device: String,

        /// Value to write, decimal or 0x-prefixed hex
        #[arg(value_parser = commands::parse_value)]
        value: u32,
    },

    /// Walk a device through probe, write, read, remove and read again
    Lifecycle {
        /// Device name (e.g. fpga_spi)
        device: String,

        /// Value to write, decimal or 0x-prefixed hex
        #[arg(value_parser = commands::parse_value)]
        value: u32,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let desc = Board::load(cli.config.as_deref())?;

    let level = cli.log_level.or(desc.log_level).unwrap_or(LogLevel::Info);
    logging::init(level);

    let iomem = match desc.aperture {
        Some((base, size)) => IoMemSpace::with_aperture(base, size),
        None => IoMemSpace::new(),
    };
    let bus = PlatformBus::with_iomem(iomem);
    board::bring_up(&bus, board::drivers(), desc.devices).context("Board bring-up failed")?;

    match cli.command {
        Commands::List => commands::list(&bus),
        Commands::Read { device } => commands::read(&bus, &device),
        Commands::Write { device, value } => commands::write(&bus, &device, value),
        Commands::Lifecycle { device, value } => commands::lifecycle(&bus, &device, value),
    }?;

    bus.shutdown();
    Ok(())
}
