//! Driver error types.

use core::fmt;

use crate::mm::MmioError;

/// Linux-compatible errno values reported by [`DriverError::errno`].
pub mod errno {
    /// Operation not permitted.
    pub const EPERM: i32 = 1;
    /// No such file or directory.
    pub const ENOENT: i32 = 2;
    /// Try again.
    pub const EAGAIN: i32 = 11;
    /// Bad address.
    pub const EFAULT: i32 = 14;
    /// Device or resource busy.
    pub const EBUSY: i32 = 16;
    /// File exists.
    pub const EEXIST: i32 = 17;
    /// No such device.
    pub const ENODEV: i32 = 19;
    /// Invalid argument.
    pub const EINVAL: i32 = 22;
}

/// Errors that can occur during device registration, probe/remove, and
/// character-device operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverError {
    /// The device has no memory resource to map.
    ResourceMissing,
    /// Mapping the register window failed.
    MapFailed(MmioError),
    /// The character interface could not be registered.
    RegistrationFailed,
    /// A device or driver with the same name is already registered.
    AlreadyRegistered,
    /// A resource range is malformed or overlaps an existing claim.
    InvalidResource,
    /// No device, driver or character interface with that name exists.
    NotFound,
    /// No driver is bound to the device.
    NotBound,
    /// The device is not bound and ready for I/O.
    NotReady,
    /// A user buffer is not accessible for the requested copy.
    BadAddress,
    /// The file was opened without the access mode the operation needs.
    NotPermitted,
}

impl DriverError {
    /// Returns the positive errno value a Linux driver would report for this
    /// error.
    #[must_use]
    pub const fn errno(self) -> i32 {
        match self {
            Self::ResourceMissing | Self::NotBound => errno::ENODEV,
            Self::MapFailed(MmioError::Busy) | Self::RegistrationFailed => errno::EBUSY,
            Self::MapFailed(_) | Self::InvalidResource => errno::EINVAL,
            Self::AlreadyRegistered => errno::EEXIST,
            Self::NotFound => errno::ENOENT,
            Self::NotReady => errno::EAGAIN,
            Self::BadAddress => errno::EFAULT,
            Self::NotPermitted => errno::EPERM,
        }
    }
}

impl From<MmioError> for DriverError {
    fn from(err: MmioError) -> Self {
        Self::MapFailed(err)
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResourceMissing => f.write_str("memory resource missing"),
            Self::MapFailed(err) => write!(f, "failed to map register window: {err}"),
            Self::RegistrationFailed => f.write_str("character device registration failed"),
            Self::AlreadyRegistered => f.write_str("name already registered"),
            Self::InvalidResource => f.write_str("invalid or overlapping resource"),
            Self::NotFound => f.write_str("not found"),
            Self::NotBound => f.write_str("no driver bound"),
            Self::NotReady => f.write_str("device not ready"),
            Self::BadAddress => f.write_str("bad address"),
            Self::NotPermitted => f.write_str("operation not permitted"),
        }
    }
}

impl core::error::Error for DriverError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::MapFailed(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_all_variants() {
        assert_eq!(
            format!("{}", DriverError::ResourceMissing),
            "memory resource missing"
        );
        assert_eq!(
            format!("{}", DriverError::MapFailed(MmioError::Busy)),
            "failed to map register window: range already mapped"
        );
        assert_eq!(
            format!("{}", DriverError::RegistrationFailed),
            "character device registration failed"
        );
        assert_eq!(
            format!("{}", DriverError::AlreadyRegistered),
            "name already registered"
        );
        assert_eq!(
            format!("{}", DriverError::InvalidResource),
            "invalid or overlapping resource"
        );
        assert_eq!(format!("{}", DriverError::NotFound), "not found");
        assert_eq!(format!("{}", DriverError::NotBound), "no driver bound");
        assert_eq!(format!("{}", DriverError::NotReady), "device not ready");
        assert_eq!(format!("{}", DriverError::BadAddress), "bad address");
        assert_eq!(
            format!("{}", DriverError::NotPermitted),
            "operation not permitted"
        );
    }

    #[test]
    fn errno_mapping() {
        assert_eq!(DriverError::BadAddress.errno(), errno::EFAULT);
        assert_eq!(DriverError::MapFailed(MmioError::Busy).errno(), errno::EBUSY);
        assert_eq!(
            DriverError::MapFailed(MmioError::InvalidRange).errno(),
            errno::EINVAL
        );
        assert_eq!(DriverError::AlreadyRegistered.errno(), errno::EEXIST);
        assert_eq!(DriverError::ResourceMissing.errno(), errno::ENODEV);
    }

    #[test]
    fn map_failed_exposes_source() {
        use core::error::Error;
        let err = DriverError::MapFailed(MmioError::Busy);
        assert_eq!(
            err.source().map(|src| format!("{src}")),
            Some(String::from("range already mapped"))
        );
        assert!(DriverError::NotReady.source().is_none());
    }

    #[test]
    fn mmio_error_converts_into_map_failed() {
        let err: DriverError = MmioError::OutsideAperture.into();
        assert_eq!(err, DriverError::MapFailed(MmioError::OutsideAperture));
    }
}
