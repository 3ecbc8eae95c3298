//! The platform bus: device records, driver matching and binding.
//!
//! [`PlatformBus`] owns the registered devices, the registered drivers, the
//! I/O memory space and the misc device table. Registering a device or a
//! driver immediately tries to bind matching pairs; a failed probe is logged
//! and leaves the device registered and unbound.
//!
//! All lifecycle operations run under the bus lock, so probe and remove of
//! one device never interleave. Drivers take the misc/iomem locks through
//! their capabilities and their own per-device lock inside that, giving the
//! order bus → misc/iomem → device.

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use spifpga_core::sync::SpinLock;
use spifpga_core::{kdebug, kerr, kinfo, kwarn};

use crate::driver_api::probe_context::platform_probe_context;
use crate::driver_api::{
    DeviceState, DevicePath, DriverData, DriverError, PlatformDevice, PlatformDriver, Resource,
};
use crate::fs::MiscRegistry;
use crate::mm::IoMemSpace;

/// One registered device.
struct DeviceRecord {
    device: PlatformDevice,
    dev_name: String,
    path: DevicePath,
    state: DeviceState,
    driver: Option<Arc<dyn PlatformDriver>>,
    data: Option<DriverData>,
}

/// Snapshot of a device record, as returned by [`PlatformBus::devices`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformDeviceInfo {
    /// Bus-unique name (`name` or `name.id`).
    pub name: String,
    /// Topology path, `platform/<name>`.
    pub path: DevicePath,
    /// Current lifecycle state.
    pub state: DeviceState,
    /// Name of the bound driver, if any.
    pub driver: Option<&'static str>,
    /// Declared resources.
    pub resources: Vec<Resource>,
}

struct BusState {
    /// Devices in registration order.
    devices: Vec<DeviceRecord>,
    /// Drivers in registration order.
    drivers: Vec<Arc<dyn PlatformDriver>>,
}

impl BusState {
    fn position(&self, dev_name: &str) -> Option<usize> {
        self.devices.iter().position(|rec| rec.dev_name == dev_name)
    }
}

/// The platform bus.
pub struct PlatformBus {
    state: SpinLock<BusState>,
    iomem: IoMemSpace,
    misc: MiscRegistry,
}

impl Default for PlatformBus {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformBus {
    /// Creates an empty bus over an unrestricted address space.
    #[must_use]
    pub fn new() -> Self {
        Self::with_iomem(IoMemSpace::new())
    }

    /// Creates an empty bus whose drivers map windows from `iomem`.
    #[must_use]
    pub fn with_iomem(iomem: IoMemSpace) -> Self {
        Self {
            state: SpinLock::named(
                "PLATFORM_BUS",
                BusState {
                    devices: Vec::new(),
                    drivers: Vec::new(),
                },
            ),
            iomem,
            misc: MiscRegistry::new(),
        }
    }

    /// The I/O memory space behind the bus.
    #[must_use]
    pub fn iomem(&self) -> &IoMemSpace {
        &self.iomem
    }

    /// The misc character device table drivers register into.
    #[must_use]
    pub fn misc(&self) -> &MiscRegistry {
        &self.misc
    }

    /// Registers a device and binds it to the first matching driver that
    /// probes successfully.
    ///
    /// # Errors
    ///
    /// - [`DriverError::InvalidResource`] if a resource is malformed or a
    ///   memory range overlaps this device's other ranges or any registered
    ///   device's.
    /// - [`DriverError::AlreadyRegistered`] if the name is taken.
    ///
    /// A failed probe is not an error here: it is logged and the device stays
    /// registered and [`DeviceState::Unbound`].
    pub fn register_device(&self, device: PlatformDevice) -> Result<(), DriverError> {
        device.validate().inspect_err(|_| {
            kerr!("platform: {}: invalid resource", device.dev_name());
        })?;
        let dev_name = device.dev_name();

        let mut state = self.state.lock();
        if state.position(&dev_name).is_some() {
            kerr!("platform: {} already registered", dev_name);
            return Err(DriverError::AlreadyRegistered);
        }
        if let Some(other) = state
            .devices
            .iter()
            .find(|rec| rec.device.conflicts_with(&device))
        {
            kerr!(
                "platform: {}: memory range conflicts with {}",
                dev_name,
                other.dev_name
            );
            return Err(DriverError::InvalidResource);
        }

        let path = DevicePath::platform(&dev_name);
        kinfo!("platform: registered {}", path);
        state.devices.push(DeviceRecord {
            device,
            dev_name,
            path,
            state: DeviceState::Unbound,
            driver: None,
            data: None,
        });

        let BusState { devices, drivers } = &mut *state;
        if let Some(rec) = devices.last_mut() {
            // Probe failures are already logged.
            let _ = self.attach(rec, drivers);
        }
        Ok(())
    }

    /// Unregisters a device, removing its driver first if bound.
    ///
    /// # Errors
    ///
    /// [`DriverError::NotFound`] if no device has that name.
    pub fn unregister_device(&self, name: &str) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        let index = state.position(name).ok_or(DriverError::NotFound)?;
        if state.devices[index].state == DeviceState::Bound {
            // Remove failures are logged; the record goes regardless.
            let _ = Self::detach(&mut state.devices[index]);
        }
        let rec = state.devices.remove(index);
        kinfo!("platform: unregistered {}", rec.path);
        Ok(())
    }

    /// Registers a driver and binds it to every matching unbound device.
    ///
    /// Returns the number of devices the driver bound to.
    ///
    /// # Errors
    ///
    /// [`DriverError::AlreadyRegistered`] if a driver with the same name is
    /// registered.
    pub fn register_driver(&self, driver: Arc<dyn PlatformDriver>) -> Result<usize, DriverError> {
        let name = driver.info().name;
        let mut state = self.state.lock();
        if state.drivers.iter().any(|drv| drv.info().name == name) {
            kerr!("platform: driver {} already registered", name);
            return Err(DriverError::AlreadyRegistered);
        }
        state.drivers.push(Arc::clone(&driver));
        kinfo!("platform: registered driver {}", name);

        let mut bound = 0;
        for rec in &mut state.devices {
            if rec.state == DeviceState::Unbound
                && driver.matches(&rec.device)
                && self.bind(rec, &driver).is_ok()
            {
                bound += 1;
            }
        }
        Ok(bound)
    }

    /// Unbinds every device held by the driver called `name`, in reverse
    /// registration order, then unregisters the driver.
    ///
    /// # Errors
    ///
    /// [`DriverError::NotFound`] if no driver has that name.
    pub fn unregister_driver(&self, name: &str) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        let index = state
            .drivers
            .iter()
            .position(|drv| drv.info().name == name)
            .ok_or(DriverError::NotFound)?;

        for rec in state.devices.iter_mut().rev() {
            let held = rec
                .driver
                .as_ref()
                .is_some_and(|drv| drv.info().name == name);
            if held {
                // Remove failures are logged; the driver goes regardless.
                let _ = Self::detach(rec);
            }
        }
        state.drivers.remove(index);
        kinfo!("platform: unregistered driver {}", name);
        Ok(())
    }

    /// Binds an unbound device to the first matching driver that probes
    /// successfully.
    ///
    /// # Errors
    ///
    /// - [`DriverError::NotFound`] if the device is unknown or no registered
    ///   driver matches it.
    /// - [`DriverError::AlreadyRegistered`] if the device is already bound.
    /// - The error of the last failed probe.
    pub fn probe_device(&self, name: &str) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        let index = state.position(name).ok_or(DriverError::NotFound)?;
        let BusState { devices, drivers } = &mut *state;
        let rec = &mut devices[index];
        if rec.state != DeviceState::Unbound {
            return Err(DriverError::AlreadyRegistered);
        }
        self.attach(rec, drivers)
    }

    /// Removes the driver bound to a device; the device stays registered.
    ///
    /// # Errors
    ///
    /// - [`DriverError::NotFound`] if the device is unknown.
    /// - [`DriverError::NotBound`] if no driver is bound.
    /// - Whatever the driver's remove returns.
    pub fn remove_device(&self, name: &str) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        let index = state.position(name).ok_or(DriverError::NotFound)?;
        Self::detach(&mut state.devices[index])
    }

    /// Current lifecycle state of a device.
    #[must_use]
    pub fn state(&self, name: &str) -> Option<DeviceState> {
        let state = self.state.lock();
        state.position(name).map(|index| state.devices[index].state)
    }

    /// Snapshot of all devices in registration order.
    #[must_use]
    pub fn devices(&self) -> Vec<PlatformDeviceInfo> {
        let state = self.state.lock();
        state
            .devices
            .iter()
            .map(|rec| PlatformDeviceInfo {
                name: rec.dev_name.clone(),
                path: rec.path.clone(),
                state: rec.state,
                driver: rec.driver.as_ref().map(|drv| drv.info().name),
                resources: rec.device.resources().to_vec(),
            })
            .collect()
    }

    /// Names of registered drivers in registration order.
    #[must_use]
    pub fn drivers(&self) -> Vec<&'static str> {
        let state = self.state.lock();
        state.drivers.iter().map(|drv| drv.info().name).collect()
    }

    /// Unbinds every device in reverse registration order, then forgets all
    /// devices and drivers.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        if state.devices.is_empty() && state.drivers.is_empty() {
            return;
        }
        for rec in state.devices.iter_mut().rev() {
            if rec.state == DeviceState::Bound {
                // Logged by detach; shutdown continues with the rest.
                let _ = Self::detach(rec);
            }
        }
        let count = state.devices.len();
        state.devices.clear();
        state.drivers.clear();
        kinfo!("platform: shutdown complete ({} devices)", count);
    }

    /// Tries each matching driver in registration order until one binds.
    fn attach(
        &self,
        rec: &mut DeviceRecord,
        drivers: &[Arc<dyn PlatformDriver>],
    ) -> Result<(), DriverError> {
        let mut result = None;
        for driver in drivers {
            if !driver.matches(&rec.device) {
                continue;
            }
            let bound = self.bind(rec, driver);
            let done = bound.is_ok();
            result = Some(bound);
            if done {
                break;
            }
        }
        result.unwrap_or_else(|| {
            kdebug!("platform: no driver for {}", rec.path);
            Err(DriverError::NotFound)
        })
    }

    fn bind(
        &self,
        rec: &mut DeviceRecord,
        driver: &Arc<dyn PlatformDriver>,
    ) -> Result<(), DriverError> {
        debug_assert!(rec.state.can_transition_to(DeviceState::Probing));
        let name = driver.info().name;
        rec.state = DeviceState::Probing;
        kdebug!("platform: probing {} with {}", rec.path, name);

        let ctx = platform_probe_context(&self.iomem, &self.misc);
        match driver.probe(&rec.device, ctx) {
            Ok(data) => {
                rec.state = DeviceState::Bound;
                rec.driver = Some(Arc::clone(driver));
                rec.data = Some(data);
                kinfo!("platform: {} bound to {}", rec.path, name);
                Ok(())
            }
            Err(err) => {
                rec.state = DeviceState::Unbound;
                kerr!("platform: {}: probe with {} failed: {}", rec.path, name, err);
                Err(err)
            }
        }
    }

    fn detach(rec: &mut DeviceRecord) -> Result<(), DriverError> {
        let (Some(driver), Some(data)) = (rec.driver.take(), rec.data.take()) else {
            kerr!("platform: remove on {} with no driver bound", rec.path);
            return Err(DriverError::NotBound);
        };
        debug_assert!(rec.state.can_transition_to(DeviceState::Removing));
        rec.state = DeviceState::Removing;
        let result = driver.remove(&rec.device, data);
        rec.state = DeviceState::Unbound;
        match result {
            Ok(()) => kinfo!("platform: {} unbound from {}", rec.path, driver.info().name),
            Err(err) => kwarn!("platform: {}: remove failed: {}", rec.path, err),
        }
        result
    }
}

impl Drop for PlatformBus {
    fn drop(&mut self) {
        self.shutdown();
    }
}
