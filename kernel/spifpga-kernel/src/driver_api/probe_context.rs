//! Probe context for driver initialization.
//!
//! The bus constructs a [`PlatformProbeContext`] with exactly the
//! capabilities a platform driver needs and passes it to
//! [`PlatformDriver::probe`](super::PlatformDriver::probe).

use super::capability::{MiscCapability, MmioCapability};
use crate::fs::misc::MiscRegistry;
use crate::mm::IoMemSpace;

/// Probe context for platform drivers.
pub struct PlatformProbeContext {
    /// MMIO mapping capability.
    pub mmio: MmioCapability,
    /// Misc character device registration capability.
    pub misc: MiscCapability,
}

/// Constructs a [`PlatformProbeContext`] backed by the bus's address space
/// and misc table.
pub(crate) fn platform_probe_context(iomem: &IoMemSpace, misc: &MiscRegistry) -> PlatformProbeContext {
    PlatformProbeContext {
        mmio: MmioCapability::new(iomem.clone()),
        misc: MiscCapability::new(misc.clone()),
    }
}
