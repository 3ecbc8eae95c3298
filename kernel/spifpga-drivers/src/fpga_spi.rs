//! FPGA custom SPI register driver.
//!
//! The IP block exposes one 32-bit data register at offset 0 of its window.
//! Probe maps the window and publishes a misc character device named after
//! the platform device; `write` latches a native-endian `u32` from the
//! caller into the register, `read` hands back the last value written.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;

use spifpga_core::sync::SpinLock;
use spifpga_core::{kdebug, kerr, kinfo, ktrace};
use spifpga_kernel::driver_api::{
    DeviceState, Driver, DriverData, DriverError, DriverInfo, PlatformDevice, PlatformDriver,
    PlatformProbeContext, ResourceFlags,
};
use spifpga_kernel::fs::misc::{CharDevice, MiscRegistration, OpenFlags};
use spifpga_kernel::mm::{MmioError, MmioMapping};
use spifpga_kernel::uaccess::{UserSliceReader, UserSliceWriter};

// ---------------------------------------------------------------------------
// Register layout
// ---------------------------------------------------------------------------

/// Register offsets from the window base.
mod reg {
    /// Data register: a write shifts the value out to the SPI block.
    pub const DATA: u64 = 0;
}

/// Smallest window that holds the data register.
const MIN_WINDOW: u64 = 4;

/// Bytes moved by one read or write.
pub const VALUE_SIZE: usize = core::mem::size_of::<u32>();

/// Driver and device name of the SoC board's SPI block.
pub const FPGA_SPI_NAME: &str = "fpga_spi";

/// Driver and device name of the standalone platform SPI block.
pub const PLATFORM_SPI_NAME: &str = "platform_spi";

/// Driver name of the earlier "custom SPI" board variant.
pub const CUSTOM_SPI_NAME: &str = "custom_spi";

/// Device-tree compatible string of the SPI IP block.
pub const FPGA_SPI_COMPATIBLE: &str = "altr,fpga_spi";

const FPGA_SPI_OF_MATCH: &[&str] = &[FPGA_SPI_COMPATIBLE];

// ---------------------------------------------------------------------------
// Device handle
// ---------------------------------------------------------------------------

struct FpgaSpiInner {
    state: DeviceState,
    regs: Option<MmioMapping>,
    /// Shadow of the last value written.
    value: u32,
}

/// One bound SPI block. Also the misc character device for it.
struct FpgaSpi {
    name: String,
    inner: SpinLock<FpgaSpiInner>,
}

impl FpgaSpi {
    fn new(name: String, regs: MmioMapping) -> Self {
        Self {
            name,
            inner: SpinLock::named(
                "FPGA_SPI",
                FpgaSpiInner {
                    state: DeviceState::Probing,
                    regs: Some(regs),
                    value: 0,
                },
            ),
        }
    }

    fn set_bound(&self) {
        let mut inner = self.inner.lock();
        debug_assert!(inner.state.can_transition_to(DeviceState::Bound));
        inner.state = DeviceState::Bound;
    }

    /// Stops new reads and writes. Waits for any read or write holding the
    /// lock; the window stays mapped until [`teardown`](Self::teardown).
    fn begin_removal(&self) {
        let mut inner = self.inner.lock();
        if inner.state == DeviceState::Bound {
            inner.state = DeviceState::Removing;
        }
    }

    /// Releases the window.
    fn teardown(&self) {
        let regs = {
            let mut inner = self.inner.lock();
            let regs = inner.regs.take();
            inner.state = DeviceState::Unbound;
            regs
        };
        drop(regs);
        kdebug!("{}: window released", self.name);
    }
}

impl CharDevice for FpgaSpi {
    fn open(&self, flags: OpenFlags) -> Result<(), DriverError> {
        ktrace!("{}: open {:?}", self.name, flags);
        Ok(())
    }

    fn read(&self, buf: &mut UserSliceWriter<'_>, _offset: u64) -> Result<usize, DriverError> {
        let inner = self.inner.lock();
        if !inner.state.is_ready() {
            return Err(DriverError::NotReady);
        }
        buf.write_u32(inner.value).inspect_err(|_| {
            kerr!("{}: failed to return current value to user space", self.name);
        })?;
        // End of file: one read returns the whole register.
        Ok(0)
    }

    fn write(&self, buf: &mut UserSliceReader<'_>, _offset: u64) -> Result<usize, DriverError> {
        let mut inner = self.inner.lock();
        if !inner.state.is_ready() {
            return Err(DriverError::NotReady);
        }
        let value = buf.read_u32().inspect_err(|_| {
            kerr!("{}: failed to read value from user space", self.name);
        })?;
        let regs = inner.regs.as_ref().ok_or(DriverError::NotReady)?;
        regs.write32(reg::DATA, value)?;
        inner.value = value;
        Ok(VALUE_SIZE)
    }

    fn release(&self) {
        ktrace!("{}: release", self.name);
    }
}

/// What the bus keeps for a bound device. Dropping it fences off I/O,
/// deregisters the character device, then releases the window.
struct FpgaSpiBinding {
    misc: Option<MiscRegistration>,
    dev: Arc<FpgaSpi>,
}

impl Drop for FpgaSpiBinding {
    fn drop(&mut self) {
        self.dev.begin_removal();
        drop(self.misc.take());
        self.dev.teardown();
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Platform driver for the FPGA SPI block.
///
/// [`new`](Self::new) matches `altr,fpga_spi` or devices named `fpga_spi`;
/// [`named`](Self::named) builds the same driver for another device name.
#[derive(Debug, Clone, Copy)]
pub struct FpgaSpiDriver {
    name: &'static str,
    of_match: &'static [&'static str],
}

impl Default for FpgaSpiDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl FpgaSpiDriver {
    /// The `fpga_spi` driver with its compatible table.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            name: FPGA_SPI_NAME,
            of_match: FPGA_SPI_OF_MATCH,
        }
    }

    /// The same driver, matching only devices called `name`.
    #[must_use]
    pub const fn named(name: &'static str) -> Self {
        Self { name, of_match: &[] }
    }
}

impl Driver for FpgaSpiDriver {
    fn info(&self) -> DriverInfo {
        DriverInfo {
            name: self.name,
            description: "Connects a SPI in the FPGA fabric to the HPS",
        }
    }
}

impl PlatformDriver for FpgaSpiDriver {
    fn of_match_table(&self) -> &'static [&'static str] {
        self.of_match
    }

    fn probe(
        &self,
        pdev: &PlatformDevice,
        ctx: PlatformProbeContext,
    ) -> Result<DriverData, DriverError> {
        let name = pdev.dev_name();
        kdebug!("{}: probe enter", name);

        let res = pdev.resource(ResourceFlags::MEM, 0).ok_or_else(|| {
            kerr!("{}: memory resource (register space) does not exist", name);
            DriverError::ResourceMissing
        })?;

        let regs = ctx.mmio.map_resource(res).inspect_err(|err| {
            kerr!("{}: {}", name, err);
        })?;
        if regs.size() < MIN_WINDOW {
            kerr!("{}: window too small for the data register", name);
            return Err(DriverError::MapFailed(MmioError::InvalidRange));
        }

        // From here on, dropping the binding undoes everything.
        let mut binding = FpgaSpiBinding {
            misc: None,
            dev: Arc::new(FpgaSpi::new(name.clone(), regs)),
        };
        let chardev: Arc<dyn CharDevice> = binding.dev.clone();
        binding.misc = Some(ctx.misc.register(&name, chardev).inspect_err(|_| {
            kerr!("{}: couldn't register misc device", name);
        })?);
        binding.dev.set_bound();

        kinfo!("{}: bound at {}", name, res);
        Ok(Box::new(binding))
    }

    fn remove(&self, pdev: &PlatformDevice, data: DriverData) -> Result<(), DriverError> {
        let binding = data.downcast::<FpgaSpiBinding>().map_err(|_| {
            kerr!("{}: remove without fpga_spi binding", pdev.dev_name());
            DriverError::NotBound
        })?;
        drop(binding);
        kdebug!("{}: removed", pdev.dev_name());
        Ok(())
    }
}
