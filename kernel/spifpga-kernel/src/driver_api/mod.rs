//! Driver API: the contract between the platform bus and its drivers.

pub mod capability;
pub mod category;
pub mod device;
pub mod device_path;
pub mod driver;
pub mod error;
pub mod probe_context;
pub mod resource;

pub use category::{DriverData, PlatformDriver};
pub use device::PlatformDevice;
pub use device_path::DevicePath;
pub use driver::{DeviceState, Driver, DriverInfo};
pub use error::DriverError;
pub use probe_context::PlatformProbeContext;
pub use resource::{IrqLine, Resource, ResourceFlags};
