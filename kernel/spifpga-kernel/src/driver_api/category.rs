//! Driver category traits defining lifecycle and probe patterns.

use alloc::boxed::Box;
use core::any::Any;

use super::device::PlatformDevice;
use super::driver::Driver;
use super::error::DriverError;
use super::probe_context::PlatformProbeContext;

/// Per-binding driver state stored in the bus record
/// (`platform_set_drvdata`). Handed back to [`PlatformDriver::remove`].
pub type DriverData = Box<dyn Any + Send + Sync>;

/// A driver for devices on the platform bus.
///
/// The bus calls [`probe`](Self::probe) once per matching device and keeps
/// the returned [`DriverData`] until [`remove`](Self::remove) consumes it.
pub trait PlatformDriver: Driver + Send + Sync {
    /// Device-tree compatible strings this driver handles.
    fn of_match_table(&self) -> &'static [&'static str] {
        &[]
    }

    /// Returns `true` if this driver handles `pdev`.
    ///
    /// A compatible string listed in [`of_match_table`](Self::of_match_table)
    /// wins; otherwise the device name must equal the driver name.
    fn matches(&self, pdev: &PlatformDevice) -> bool {
        pdev.compatible()
            .is_some_and(|compatible| self.of_match_table().contains(&compatible))
            || pdev.name() == self.info().name
    }

    /// Binds to `pdev`. On failure everything acquired so far must already
    /// be released.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError`] if a resource is missing or cannot be claimed.
    fn probe(
        &self,
        pdev: &PlatformDevice,
        ctx: PlatformProbeContext,
    ) -> Result<DriverData, DriverError>;

    /// Unbinds from `pdev`, consuming the state returned by probe.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError`] if `data` does not belong to this driver.
    fn remove(&self, pdev: &PlatformDevice, data: DriverData) -> Result<(), DriverError>;
}
