//! Platform device descriptors.
//!
//! A [`PlatformDevice`] is the static description a board file (or config)
//! hands to the bus: a name, an optional instance id, an optional
//! device-tree compatible string, and the resources the device occupies.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use super::error::DriverError;
use super::resource::{IrqLine, Resource, ResourceFlags};

/// A device on the platform bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformDevice {
    name: String,
    id: Option<u32>,
    compatible: Option<String>,
    resources: Vec<Resource>,
}

impl PlatformDevice {
    /// Starts describing a device called `name` with no resources.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: String::from(name),
            id: None,
            compatible: None,
            resources: Vec::new(),
        }
    }

    /// Sets the instance id (`.id = -1` in a C board file means "none").
    #[must_use]
    pub fn with_id(mut self, id: u32) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets the device-tree compatible string used for driver matching.
    #[must_use]
    pub fn with_compatible(mut self, compatible: &str) -> Self {
        self.compatible = Some(String::from(compatible));
        self
    }

    /// Appends a resource.
    #[must_use]
    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resources.push(resource);
        self
    }

    /// Driver-facing name, used for name-based matching.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Instance id, if any.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.id
    }

    /// Bus-unique device name: `name` or `name.id`.
    ///
    /// This is the key the bus registers the device under and the name its
    /// character interface appears as.
    #[must_use]
    pub fn dev_name(&self) -> String {
        match self.id {
            Some(id) => format!("{}.{}", self.name, id),
            None => self.name.clone(),
        }
    }

    /// Device-tree compatible string, if any.
    #[must_use]
    pub fn compatible(&self) -> Option<&str> {
        self.compatible.as_deref()
    }

    /// All declared resources in declaration order.
    #[must_use]
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// Returns the `index`-th resource of the given kind.
    #[must_use]
    pub fn resource(&self, kind: ResourceFlags, index: usize) -> Option<&Resource> {
        self.resources
            .iter()
            .filter(|res| res.flags().contains(kind))
            .nth(index)
    }

    /// Returns the `index`-th interrupt line.
    #[must_use]
    pub fn irq(&self, index: usize) -> Option<IrqLine> {
        self.resource(ResourceFlags::IRQ, index)
            .and_then(|res| u32::try_from(res.start()).ok())
            .map(IrqLine::new)
    }

    /// Checks that every resource is well formed and that the device's own
    /// memory ranges do not overlap each other.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::InvalidResource`] on the first violation.
    pub fn validate(&self) -> Result<(), DriverError> {
        for (i, res) in self.resources.iter().enumerate() {
            if !res.is_valid() {
                return Err(DriverError::InvalidResource);
            }
            if self.resources[i + 1..].iter().any(|other| res.overlaps(other)) {
                return Err(DriverError::InvalidResource);
            }
        }
        Ok(())
    }

    /// Returns `true` if any of this device's memory ranges overlaps one of
    /// `other`'s.
    #[must_use]
    pub fn conflicts_with(&self, other: &PlatformDevice) -> bool {
        self.resources
            .iter()
            .any(|res| other.resources.iter().any(|theirs| res.overlaps(theirs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spi_device() -> PlatformDevice {
        PlatformDevice::new("fpga_spi")
            .with_resource(Resource::mem(0xC000_0000, 0xC000_003F))
            .with_resource(Resource::irq(0))
    }

    #[test]
    fn dev_name_includes_instance_id() {
        assert_eq!(spi_device().dev_name(), "fpga_spi");
        assert_eq!(spi_device().with_id(1).dev_name(), "fpga_spi.1");
    }

    #[test]
    fn resource_lookup_by_kind_and_index() {
        let dev = spi_device().with_resource(Resource::mem(0xC000_1000, 0xC000_1FFF));
        assert_eq!(
            dev.resource(ResourceFlags::MEM, 0).map(Resource::start),
            Some(0xC000_0000)
        );
        assert_eq!(
            dev.resource(ResourceFlags::MEM, 1).map(Resource::start),
            Some(0xC000_1000)
        );
        assert!(dev.resource(ResourceFlags::MEM, 2).is_none());
        assert_eq!(dev.irq(0), Some(IrqLine::new(0)));
        assert_eq!(dev.irq(1), None);
    }

    #[test]
    fn device_without_mem_resource() {
        let dev = PlatformDevice::new("bare").with_resource(Resource::irq(3));
        assert!(dev.resource(ResourceFlags::MEM, 0).is_none());
        assert!(dev.validate().is_ok());
    }

    #[test]
    fn validate_rejects_malformed_and_self_overlapping_ranges() {
        let malformed = PlatformDevice::new("bad").with_resource(Resource::mem(0x2000, 0x1000));
        assert_eq!(malformed.validate(), Err(DriverError::InvalidResource));

        let overlapping = PlatformDevice::new("bad")
            .with_resource(Resource::mem(0x1000, 0x1FFF))
            .with_resource(Resource::mem(0x1800, 0x27FF));
        assert_eq!(overlapping.validate(), Err(DriverError::InvalidResource));
    }

    #[test]
    fn conflicts_only_on_shared_memory() {
        let a = spi_device();
        let b = PlatformDevice::new("other")
            .with_resource(Resource::mem(0xC000_0020, 0xC000_005F))
            .with_resource(Resource::irq(0));
        let c = PlatformDevice::new("far").with_resource(Resource::mem(0x5000_0000, 0x5000_1FFF));
        assert!(a.conflicts_with(&b));
        assert!(!a.conflicts_with(&c));
    }
}
