//! Hardware resource descriptors: memory-mapped register ranges and IRQ lines
//! declared by a platform device.

use alloc::string::String;
use core::fmt;

use bitflags::bitflags;

bitflags! {
    /// Resource kind flags, numerically identical to Linux `IORESOURCE_*`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ResourceFlags: u32 {
        /// Memory-mapped register range.
        const MEM = 0x0000_0200;
        /// Interrupt line.
        const IRQ = 0x0000_0400;
    }
}

/// A hardware resource claimed by a platform device.
///
/// Ranges are inclusive on both ends, as in a Linux `struct resource`:
/// a 64-byte window at `0xC000_0000` is `start = 0xC000_0000`,
/// `end = 0xC000_003F`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    start: u64,
    end: u64,
    flags: ResourceFlags,
    name: Option<String>,
}

impl Resource {
    /// Creates a memory resource covering `[start, end]`.
    #[must_use]
    pub const fn mem(start: u64, end: u64) -> Self {
        Self {
            start,
            end,
            flags: ResourceFlags::MEM,
            name: None,
        }
    }

    /// Creates an interrupt resource for a single line.
    #[must_use]
    pub const fn irq(line: u32) -> Self {
        Self {
            start: line as u64,
            end: line as u64,
            flags: ResourceFlags::IRQ,
            name: None,
        }
    }

    /// Attaches a descriptive name (e.g. `"spi"`).
    #[must_use]
    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(String::from(name));
        self
    }

    /// First address (or IRQ number) of the resource.
    #[must_use]
    pub const fn start(&self) -> u64 {
        self.start
    }

    /// Last address (inclusive) of the resource.
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.end
    }

    /// Kind flags.
    #[must_use]
    pub const fn flags(&self) -> ResourceFlags {
        self.flags
    }

    /// Optional descriptive name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns `true` if this is a memory resource.
    #[must_use]
    pub const fn is_mem(&self) -> bool {
        self.flags.contains(ResourceFlags::MEM)
    }

    /// Returns `true` if this is an interrupt resource.
    #[must_use]
    pub const fn is_irq(&self) -> bool {
        self.flags.contains(ResourceFlags::IRQ)
    }

    /// Number of addresses covered, or `None` if the range is malformed
    /// (`end < start`) or spans the whole 64-bit space.
    #[must_use]
    pub const fn size(&self) -> Option<u64> {
        if self.end < self.start {
            return None;
        }
        (self.end - self.start).checked_add(1)
    }

    /// Returns `true` if the descriptor is well formed.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        if self.is_irq() {
            return self.start == self.end && self.start <= u32::MAX as u64;
        }
        self.size().is_some()
    }

    /// Returns `true` if both resources are memory ranges that share at least
    /// one address.
    #[must_use]
    pub const fn overlaps(&self, other: &Resource) -> bool {
        self.is_mem() && other.is_mem() && self.start <= other.end && other.start <= self.end
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_irq() {
            write!(f, "irq {}", self.start)?;
        } else {
            write!(f, "mem [{:#x}-{:#x}]", self.start, self.end)?;
        }
        if let Some(name) = &self.name {
            write!(f, " \"{name}\"")?;
        }
        Ok(())
    }
}

/// An interrupt line taken from a device's IRQ resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrqLine {
    line: u32,
}

impl IrqLine {
    /// Wraps an interrupt line number.
    #[must_use]
    pub const fn new(line: u32) -> Self {
        Self { line }
    }

    /// Returns the interrupt line number.
    #[must_use]
    pub const fn line(&self) -> u32 {
        self.line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mem_resource_basics() {
        let res = Resource::mem(0xC000_0000, 0xC000_003F);
        assert!(res.is_mem());
        assert!(!res.is_irq());
        assert_eq!(res.size(), Some(0x40));
        assert!(res.is_valid());
    }

    #[test]
    fn malformed_range_has_no_size() {
        let res = Resource::mem(0x2000, 0x1FFF);
        assert_eq!(res.size(), None);
        assert!(!res.is_valid());
    }

    #[test]
    fn full_address_space_is_rejected() {
        assert!(!Resource::mem(0, u64::MAX).is_valid());
    }

    #[test]
    fn irq_resource_basics() {
        let res = Resource::irq(0);
        assert!(res.is_irq());
        assert!(res.is_valid());
        assert_eq!(res.start(), 0);
    }

    #[test]
    fn overlap_detection() {
        let a = Resource::mem(0x1000, 0x103F);
        assert!(a.overlaps(&Resource::mem(0x103F, 0x2000)));
        assert!(a.overlaps(&Resource::mem(0x0000, 0x1000)));
        assert!(a.overlaps(&Resource::mem(0x1010, 0x1020)));
        assert!(!a.overlaps(&Resource::mem(0x1040, 0x107F)));
        // IRQ numbers never overlap memory ranges.
        assert!(!a.overlaps(&Resource::irq(0x1000)));
    }

    #[test]
    fn display_includes_name() {
        let res = Resource::mem(0x1000, 0x103F).named("spi");
        assert_eq!(format!("{res}"), "mem [0x1000-0x103f] \"spi\"");
        assert_eq!(format!("{}", Resource::irq(5)), "irq 5");
    }

    #[test]
    fn flags_match_linux_values() {
        assert_eq!(ResourceFlags::MEM.bits(), 0x200);
        assert_eq!(ResourceFlags::IRQ.bits(), 0x400);
    }
}
