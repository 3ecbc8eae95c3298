//! Subcommand implementations.

use anyhow::{Context, Result, bail};
use spifpga_kernel::PlatformBus;
use spifpga_kernel::driver_api::{DeviceState, DriverError, Resource};
use spifpga_kernel::fs::OpenFlags;
use spifpga_kernel::uaccess::{UserSliceReader, UserSliceWriter};

/// Parses a register value: decimal, or hex with a `0x` prefix.
pub fn parse_value(text: &str) -> Result<u32> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(&hex.replace('_', ""), 16),
        None => text.replace('_', "").parse(),
    };
    parsed.with_context(|| format!("invalid 32-bit value `{text}`"))
}

/// Prints every device and the misc table.
pub fn list(bus: &PlatformBus) -> Result<()> {
    println!("{:<16} {:<8} {:<14} resources", "device", "state", "driver");
    for dev in bus.devices() {
        let resources: Vec<String> = dev.resources.iter().map(ToString::to_string).collect();
        println!(
            "{:<16} {:<8} {:<14} {}",
            dev.name,
            dev.state.to_string(),
            dev.driver.unwrap_or("-"),
            resources.join(", ")
        );
    }

    println!();
    println!("misc devices (major 10):");
    for entry in bus.misc().entries() {
        println!("{:>4} {}", entry.minor, entry.name);
    }
    Ok(())
}

fn read_value(bus: &PlatformBus, device: &str) -> Result<u32, DriverError> {
    let mut file = bus.misc().open(device, OpenFlags::READ)?;
    let mut out = [0u8; 4];
    let len = out.len();
    file.read(&mut UserSliceWriter::new(&mut out, len))?;
    Ok(u32::from_ne_bytes(out))
}

fn write_value(bus: &PlatformBus, device: &str, value: u32) -> Result<usize, DriverError> {
    let mut file = bus.misc().open(device, OpenFlags::WRITE)?;
    let bytes = value.to_ne_bytes();
    file.write(&mut UserSliceReader::new(&bytes, bytes.len()))
}

/// Physical address of a device's data register.
fn register_address(bus: &PlatformBus, device: &str) -> Option<u64> {
    bus.devices()
        .into_iter()
        .find(|dev| dev.name == device)?
        .resources
        .iter()
        .find(|res| res.is_mem())
        .map(Resource::start)
}

/// Reads and prints a device's value.
pub fn read(bus: &PlatformBus, device: &str) -> Result<()> {
    let value = read_value(bus, device).with_context(|| format!("Failed to read {device}"))?;
    println!("{device}: {value:#010x}");
    Ok(())
}

/// Writes a value and prints the register as the bus sees it.
pub fn write(bus: &PlatformBus, device: &str, value: u32) -> Result<()> {
    let count =
        write_value(bus, device, value).with_context(|| format!("Failed to write {device}"))?;
    println!("{device}: accepted {count} bytes");
    if let Some(addr) = register_address(bus, device) {
        println!("{device}: register @ {addr:#x} = {:#010x}", bus.iomem().peek32(addr));
    }
    Ok(())
}

/// Probe, write, read, remove, read: prints each step's outcome.
pub fn lifecycle(bus: &PlatformBus, device: &str, value: u32) -> Result<()> {
    match bus.state(device) {
        None => bail!("{device}: no such device"),
        Some(DeviceState::Bound) => println!("probe:  already bound"),
        Some(_) => {
            bus.probe_device(device)
                .with_context(|| format!("Failed to probe {device}"))?;
            println!("probe:  bound");
        }
    }

    let count =
        write_value(bus, device, value).with_context(|| format!("Failed to write {device}"))?;
    println!("write:  {value:#010x} ({count} bytes)");

    let seen = read_value(bus, device).with_context(|| format!("Failed to read {device}"))?;
    println!("read:   {seen:#010x}");
    if seen != value {
        bail!("{device}: read back {seen:#010x}, expected {value:#010x}");
    }

    // Hold a file across remove, like a process that kept the node open.
    let mut file = bus
        .misc()
        .open(device, OpenFlags::READ)
        .with_context(|| format!("Failed to open {device}"))?;
    bus.remove_device(device)
        .with_context(|| format!("Failed to remove {device}"))?;
    println!("remove: {}", bus.state(device).unwrap_or_default());

    let mut out = [0u8; 4];
    let len = out.len();
    match file.read(&mut UserSliceWriter::new(&mut out, len)) {
        Err(DriverError::NotReady) => println!("read:   {} (as expected)", DriverError::NotReady),
        Err(err) => bail!("{device}: read after remove failed with {err}"),
        Ok(_) => bail!("{device}: read after remove succeeded"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use spifpga_drivers::board;

    use super::*;

    fn bus() -> PlatformBus {
        let bus = PlatformBus::new();
        board::bring_up(&bus, board::drivers(), board::devices()).unwrap();
        bus
    }

    #[test]
    fn parses_decimal_and_hex() {
        assert_eq!(parse_value("255").unwrap(), 255);
        assert_eq!(parse_value("0xFF").unwrap(), 255);
        assert_eq!(parse_value("0XdeadBEEF").unwrap(), 0xDEAD_BEEF);
        assert_eq!(parse_value("0xffff_ffff").unwrap(), u32::MAX);
        assert!(parse_value("0x1_0000_0000").is_err());
        assert!(parse_value("-1").is_err());
        assert!(parse_value("spi").is_err());
    }

    #[test]
    fn write_then_read_round_trip() {
        let bus = bus();
        write(&bus, "fpga_spi", 0xFF).unwrap();
        assert_eq!(read_value(&bus, "fpga_spi"), Ok(0xFF));
        assert_eq!(register_address(&bus, "fpga_spi"), Some(0xC000_0000));
    }

    #[test]
    fn lifecycle_ends_unbound() {
        let bus = bus();
        lifecycle(&bus, "fpga_spi", 0xFF).unwrap();
        assert_eq!(bus.state("fpga_spi"), Some(DeviceState::Unbound));
        // Runs again from the unbound state.
        lifecycle(&bus, "fpga_spi", 7).unwrap();
    }

    #[test]
    fn unknown_device_errors() {
        let bus = bus();
        assert!(read(&bus, "nope").is_err());
        assert!(lifecycle(&bus, "nope", 1).is_err());
        assert!(list(&bus).is_ok());
    }

    #[test]
    fn unbound_device_cannot_be_read() {
        let bus = PlatformBus::new();
        board::bring_up(&bus, Vec::new(), board::devices()).unwrap();
        assert_eq!(read_value(&bus, "fpga_spi"), Err(DriverError::NotFound));
        bus.register_driver(Arc::new(spifpga_drivers::FpgaSpiDriver::new()))
            .unwrap();
        assert_eq!(read_value(&bus, "fpga_spi"), Ok(0));
    }
}
