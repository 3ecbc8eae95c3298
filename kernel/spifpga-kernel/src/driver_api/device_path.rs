//! Hierarchical device path names.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

/// A device's position in the topology (e.g. `platform/fpga_spi`,
/// `misc/fpga_spi`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DevicePath {
    segments: Vec<String>,
}

impl DevicePath {
    /// Path of a device on the platform bus: `platform/<name>`.
    #[must_use]
    pub fn platform(name: &str) -> Self {
        Self {
            segments: alloc::vec![String::from("platform"), String::from(name)],
        }
    }

    /// Path of a misc character interface: `misc/<name>`.
    #[must_use]
    pub fn misc(name: &str) -> Self {
        Self {
            segments: alloc::vec![String::from("misc"), String::from(name)],
        }
    }

    /// Last segment of the path, the plain device name.
    #[must_use]
    pub fn leaf(&self) -> &str {
        self.segments.last().map_or("", String::as_str)
    }

    /// The path segments.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for DevicePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            f.write_str(seg)?;
        }
        Ok(())
    }
}
