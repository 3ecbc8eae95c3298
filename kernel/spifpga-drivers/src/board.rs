//! Board descriptions: the platform devices wired to the HPS bridge and the
//! drivers that serve them.

use alloc::sync::Arc;
use alloc::vec::Vec;

use spifpga_kernel::PlatformBus;
use spifpga_kernel::driver_api::{DriverError, PlatformDevice, PlatformDriver, Resource};

use crate::fpga_spi::{
    CUSTOM_SPI_NAME, FPGA_SPI_COMPATIBLE, FPGA_SPI_NAME, FpgaSpiDriver, PLATFORM_SPI_NAME,
};

/// Register window of the SoC board's SPI block (lightweight bridge).
pub const FPGA_SPI_START: u64 = 0xC000_0000;
/// Last byte of the `fpga_spi` window.
pub const FPGA_SPI_END: u64 = 0xC000_003F;

/// Register window of the standalone platform SPI block.
pub const PLATFORM_SPI_START: u64 = 0x5000_0000;
/// Last byte of the `platform_spi` window.
pub const PLATFORM_SPI_END: u64 = 0x5000_1FFF;

/// Interrupt line both blocks are wired to.
pub const SPI_IRQ: u32 = 0;

/// The `fpga_spi` device.
#[must_use]
pub fn fpga_spi_device() -> PlatformDevice {
    PlatformDevice::new(FPGA_SPI_NAME)
        .with_compatible(FPGA_SPI_COMPATIBLE)
        .with_resource(Resource::mem(FPGA_SPI_START, FPGA_SPI_END).named("spi"))
        .with_resource(Resource::irq(SPI_IRQ))
}

/// The `platform_spi` device.
#[must_use]
pub fn platform_spi_device() -> PlatformDevice {
    PlatformDevice::new(PLATFORM_SPI_NAME)
        .with_resource(Resource::mem(PLATFORM_SPI_START, PLATFORM_SPI_END))
        .with_resource(Resource::irq(SPI_IRQ))
}

/// Every device on the built-in board.
#[must_use]
pub fn devices() -> Vec<PlatformDevice> {
    alloc::vec![fpga_spi_device(), platform_spi_device()]
}

/// The SPI driver under each name a board may use for the block.
#[must_use]
pub fn drivers() -> Vec<Arc<dyn PlatformDriver>> {
    alloc::vec![
        Arc::new(FpgaSpiDriver::new()) as Arc<dyn PlatformDriver>,
        Arc::new(FpgaSpiDriver::named(PLATFORM_SPI_NAME)),
        Arc::new(FpgaSpiDriver::named(CUSTOM_SPI_NAME)),
    ]
}

/// Registers `drivers`, then `devices`, on `bus`. Devices bind as they
/// arrive; probe failures are logged by the bus and do not stop bring-up.
///
/// # Errors
///
/// The first registration error (duplicate name, bad resource).
pub fn bring_up(
    bus: &PlatformBus,
    drivers: Vec<Arc<dyn PlatformDriver>>,
    devices: Vec<PlatformDevice>,
) -> Result<(), DriverError> {
    for driver in drivers {
        bus.register_driver(driver)?;
    }
    for device in devices {
        bus.register_device(device)?;
    }
    Ok(())
}
