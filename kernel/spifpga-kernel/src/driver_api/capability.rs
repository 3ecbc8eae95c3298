//! Typed capability tokens for driver-kernel interaction.
//!
//! A driver receives only the capabilities its probe needs. Each token has a
//! `pub(crate)` constructor so only the bus can mint one; a driver cannot
//! reach the I/O memory space or the misc table any other way.

use alloc::sync::Arc;

use super::error::DriverError;
use super::resource::Resource;
use crate::fs::misc::{CharDevice, MiscRegistration, MiscRegistry};
use crate::mm::{IoMemSpace, MmioMapping};

// ---------------------------------------------------------------------------
// MmioCapability
// ---------------------------------------------------------------------------

/// Capability token for mapping device register windows.
pub struct MmioCapability {
    iomem: IoMemSpace,
}

impl MmioCapability {
    pub(crate) fn new(iomem: IoMemSpace) -> Self {
        Self { iomem }
    }

    /// Requests and maps the range of a memory resource
    /// (`devm_ioremap_resource`).
    ///
    /// # Errors
    ///
    /// [`DriverError::MapFailed`] carrying the [`MmioError`](crate::mm::MmioError)
    /// cause.
    pub fn map_resource(&self, resource: &Resource) -> Result<MmioMapping, DriverError> {
        self.iomem.map_resource(resource).map_err(DriverError::MapFailed)
    }
}

// ---------------------------------------------------------------------------
// MiscCapability
// ---------------------------------------------------------------------------

/// Capability token for registering misc character devices.
pub struct MiscCapability {
    misc: MiscRegistry,
}

impl MiscCapability {
    pub(crate) fn new(misc: MiscRegistry) -> Self {
        Self { misc }
    }

    /// Registers `device` under `name` with a dynamic minor
    /// (`misc_register`).
    ///
    /// # Errors
    ///
    /// [`DriverError::RegistrationFailed`] if the name is taken or the minor
    /// range is exhausted.
    pub fn register(
        &self,
        name: &str,
        device: Arc<dyn CharDevice>,
    ) -> Result<MiscRegistration, DriverError> {
        self.misc.register(name, device)
    }
}
