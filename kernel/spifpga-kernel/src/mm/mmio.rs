//! I/O memory space and exclusive MMIO mappings.
//!
//! [`IoMemSpace`] stands for the physical address range behind the
//! FPGA-to-HPS bridge. Drivers carve exclusive windows out of it with
//! [`IoMemSpace::map`]; the returned [`MmioMapping`] is an RAII guard that
//! releases the claim when dropped, so a probe that fails halfway never
//! leaks a mapping.

use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use spifpga_core::sync::SpinLock;
use spifpga_core::{kdebug, ktrace};

use crate::driver_api::resource::Resource;

/// Width of one register access in bytes.
const WORD: u64 = 4;

/// Errors from mapping or accessing I/O memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmioError {
    /// Part of the range is already mapped by someone else.
    Busy,
    /// The range is empty, overflows, is not a memory range, or an access
    /// offset is misaligned or out of bounds.
    InvalidRange,
    /// The range lies outside the bridge aperture.
    OutsideAperture,
}

impl fmt::Display for MmioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => f.write_str("range already mapped"),
            Self::InvalidRange => f.write_str("invalid range"),
            Self::OutsideAperture => f.write_str("range outside bridge aperture"),
        }
    }
}

impl core::error::Error for MmioError {}

/// Mutable state of the address space.
struct IoMemState {
    /// Claimed windows: start address → size in bytes.
    claims: BTreeMap<u64, u64>,
    /// Register contents, keyed by word-aligned physical address. Addresses
    /// never written read back as zero.
    words: BTreeMap<u64, u32>,
}

struct IoMemInner {
    /// `(base, size)` of the bridge window, if restricted.
    aperture: Option<(u64, u64)>,
    state: SpinLock<IoMemState>,
}

/// The physical I/O address space shared by every device on the bus.
///
/// Cloning yields another handle to the same space.
#[derive(Clone)]
pub struct IoMemSpace {
    inner: Arc<IoMemInner>,
}

impl Default for IoMemSpace {
    fn default() -> Self {
        Self::new()
    }
}

impl IoMemSpace {
    /// Creates an unrestricted address space.
    #[must_use]
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Creates an address space that only accepts mappings inside
    /// `[base, base + size)`.
    #[must_use]
    pub fn with_aperture(base: u64, size: u64) -> Self {
        Self::build(Some((base, size)))
    }

    fn build(aperture: Option<(u64, u64)>) -> Self {
        Self {
            inner: Arc::new(IoMemInner {
                aperture,
                state: SpinLock::named(
                    "IOMEM",
                    IoMemState {
                        claims: BTreeMap::new(),
                        words: BTreeMap::new(),
                    },
                ),
            }),
        }
    }

    /// Returns the aperture as `(base, size)`, if one was configured.
    #[must_use]
    pub fn aperture(&self) -> Option<(u64, u64)> {
        self.inner.aperture
    }

    /// Claims `[start, start + size)` exclusively and maps it. The window
    /// may end at the last byte of the address space.
    ///
    /// # Errors
    ///
    /// - [`MmioError::InvalidRange`] if `size` is zero or the range overflows.
    /// - [`MmioError::OutsideAperture`] if an aperture is set and the range
    ///   is not fully inside it.
    /// - [`MmioError::Busy`] if any byte is already claimed.
    pub fn map(&self, start: u64, size: u64) -> Result<MmioMapping, MmioError> {
        if size == 0 {
            return Err(MmioError::InvalidRange);
        }
        // Inclusive last byte, so a window ending at u64::MAX is representable.
        let last = start.checked_add(size - 1).ok_or(MmioError::InvalidRange)?;

        if let Some((base, len)) = self.inner.aperture {
            let inside = len != 0 && start >= base && last <= base.saturating_add(len - 1);
            if !inside {
                return Err(MmioError::OutsideAperture);
            }
        }

        {
            let mut state = self.inner.state.lock();
            let busy = state
                .claims
                .iter()
                .any(|(&claim_start, &claim_size)| {
                    start <= claim_start + (claim_size - 1) && claim_start <= last
                });
            if busy {
                return Err(MmioError::Busy);
            }
            state.claims.insert(start, size);
        }

        ktrace!("iomem: mapped [{:#x}-{:#x}]", start, last);
        Ok(MmioMapping {
            phys_base: start,
            size,
            space: Arc::clone(&self.inner),
        })
    }

    /// Maps the range described by a memory [`Resource`].
    ///
    /// # Errors
    ///
    /// [`MmioError::InvalidRange`] if the resource is not a well-formed memory
    /// range; otherwise the errors of [`map`](Self::map).
    pub fn map_resource(&self, resource: &Resource) -> Result<MmioMapping, MmioError> {
        if !resource.is_mem() {
            return Err(MmioError::InvalidRange);
        }
        let size = resource.size().ok_or(MmioError::InvalidRange)?;
        self.map(resource.start(), size)
    }

    /// Returns `true` if `addr` lies inside a currently mapped window.
    #[must_use]
    pub fn is_mapped(&self, addr: u64) -> bool {
        let state = self.inner.state.lock();
        state
            .claims
            .range(..=addr)
            .next_back()
            .is_some_and(|(&start, &size)| addr - start < size)
    }

    /// Returns all mapped windows as `(start, size)`, sorted by address.
    #[must_use]
    pub fn mapped_ranges(&self) -> Vec<(u64, u64)> {
        let state = self.inner.state.lock();
        state.claims.iter().map(|(&start, &size)| (start, size)).collect()
    }

    /// Reads the 32-bit register at `phys` as the hardware sees it,
    /// regardless of whether it is mapped.
    #[must_use]
    pub fn peek32(&self, phys: u64) -> u32 {
        self.inner.load(phys & !(WORD - 1))
    }

    /// Stores a 32-bit value from the hardware side (e.g. the FPGA fabric
    /// updating a status register).
    pub fn poke32(&self, phys: u64, value: u32) {
        self.inner.store(phys & !(WORD - 1), value);
    }
}

impl IoMemInner {
    fn load(&self, addr: u64) -> u32 {
        self.state.lock().words.get(&addr).copied().unwrap_or(0)
    }

    fn store(&self, addr: u64, value: u32) {
        self.state.lock().words.insert(addr, value);
    }

    fn release(&self, start: u64) {
        self.state.lock().claims.remove(&start);
    }
}

/// An exclusive, mapped register window.
///
/// Unmaps (releases the claim) on drop.
pub struct MmioMapping {
    phys_base: u64,
    size: u64,
    space: Arc<IoMemInner>,
}

impl MmioMapping {
    /// Physical base address.
    #[must_use]
    pub fn phys_base(&self) -> u64 {
        self.phys_base
    }

    /// Size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    fn word_addr(&self, offset: u64) -> Result<u64, MmioError> {
        if offset % WORD != 0 {
            return Err(MmioError::InvalidRange);
        }
        let end = offset.checked_add(WORD).ok_or(MmioError::InvalidRange)?;
        if end > self.size {
            return Err(MmioError::InvalidRange);
        }
        Ok(self.phys_base + offset)
    }

    /// Reads the 32-bit register at byte `offset`.
    ///
    /// # Errors
    ///
    /// [`MmioError::InvalidRange`] if `offset` is misaligned or the access
    /// would run past the window.
    pub fn read32(&self, offset: u64) -> Result<u32, MmioError> {
        Ok(self.space.load(self.word_addr(offset)?))
    }

    /// Writes the 32-bit register at byte `offset` (one store, `iowrite32`).
    ///
    /// # Errors
    ///
    /// [`MmioError::InvalidRange`] if `offset` is misaligned or the access
    /// would run past the window.
    pub fn write32(&self, offset: u64, value: u32) -> Result<(), MmioError> {
        self.space.store(self.word_addr(offset)?, value);
        Ok(())
    }
}

impl fmt::Debug for MmioMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MmioMapping")
            .field("phys_base", &format_args!("{:#x}", self.phys_base))
            .field("size", &format_args!("{:#x}", self.size))
            .finish()
    }
}

impl Drop for MmioMapping {
    fn drop(&mut self) {
        self.space.release(self.phys_base);
        kdebug!(
            "iomem: unmapped [{:#x}-{:#x}]",
            self.phys_base,
            self.phys_base + (self.size - 1)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_and_access_registers() {
        let space = IoMemSpace::new();
        let regs = space.map(0x1000, 0x40).unwrap();
        assert_eq!(regs.phys_base(), 0x1000);
        assert_eq!(regs.size(), 0x40);
        assert_eq!(regs.read32(0).unwrap(), 0);

        regs.write32(0, 0xDEAD_BEEF).unwrap();
        regs.write32(0x3C, 7).unwrap();
        assert_eq!(regs.read32(0).unwrap(), 0xDEAD_BEEF);
        assert_eq!(space.peek32(0x1000), 0xDEAD_BEEF);
        assert_eq!(space.peek32(0x103C), 7);
    }

    #[test]
    fn out_of_window_and_misaligned_access_rejected() {
        let space = IoMemSpace::new();
        let regs = space.map(0x1000, 0x40).unwrap();
        assert_eq!(regs.read32(0x40), Err(MmioError::InvalidRange));
        assert_eq!(regs.write32(0x3E, 1), Err(MmioError::InvalidRange));
        assert_eq!(regs.read32(2), Err(MmioError::InvalidRange));
        assert_eq!(regs.read32(u64::MAX - 1), Err(MmioError::InvalidRange));
    }

    #[test]
    fn overlapping_map_is_busy() {
        let space = IoMemSpace::new();
        let _regs = space.map(0x1000, 0x40).unwrap();
        assert_eq!(space.map(0x1000, 0x40).err(), Some(MmioError::Busy));
        assert_eq!(space.map(0x0FC0, 0x44).err(), Some(MmioError::Busy));
        assert_eq!(space.map(0x103C, 0x10).err(), Some(MmioError::Busy));
        assert!(space.map(0x1040, 0x40).is_ok());
    }

    #[test]
    fn drop_releases_claim() {
        let space = IoMemSpace::new();
        let regs = space.map(0x1000, 0x40).unwrap();
        assert!(space.is_mapped(0x1000));
        assert!(space.is_mapped(0x103F));
        assert!(!space.is_mapped(0x1040));
        drop(regs);
        assert!(!space.is_mapped(0x1000));
        assert!(space.mapped_ranges().is_empty());
        assert!(space.map(0x1000, 0x40).is_ok());
    }

    #[test]
    fn register_contents_survive_remap() {
        let space = IoMemSpace::new();
        space.map(0x2000, 4).unwrap().write32(0, 42).unwrap();
        let again = space.map(0x2000, 4).unwrap();
        assert_eq!(again.read32(0).unwrap(), 42);
    }

    #[test]
    fn invalid_ranges_rejected() {
        let space = IoMemSpace::new();
        assert_eq!(space.map(0x1000, 0).err(), Some(MmioError::InvalidRange));
        assert_eq!(space.map(u64::MAX, 2).err(), Some(MmioError::InvalidRange));
        assert_eq!(
            space.map_resource(&Resource::irq(0)).err(),
            Some(MmioError::InvalidRange)
        );
        assert_eq!(
            space.map_resource(&Resource::mem(0x20, 0x10)).err(),
            Some(MmioError::InvalidRange)
        );
    }

    #[test]
    fn window_may_end_at_top_of_address_space() {
        let space = IoMemSpace::new();
        let top = Resource::mem(u64::MAX - 0x3F, u64::MAX);
        let regs = space.map_resource(&top).unwrap();
        assert_eq!(regs.size(), 0x40);
        regs.write32(0x3C, 9).unwrap();
        assert_eq!(space.peek32(u64::MAX - 3), 9);
        assert_eq!(regs.read32(0x40), Err(MmioError::InvalidRange));
        assert!(space.is_mapped(u64::MAX));
        assert_eq!(space.map(u64::MAX, 1).err(), Some(MmioError::Busy));
        drop(regs);
        assert!(space.map(u64::MAX, 1).is_ok());
    }

    #[test]
    fn aperture_limits_mappings() {
        let space = IoMemSpace::with_aperture(0xC000_0000, 0x2000_0000);
        assert_eq!(space.aperture(), Some((0xC000_0000, 0x2000_0000)));
        assert!(space.map_resource(&Resource::mem(0xC000_0000, 0xC000_003F)).is_ok());
        assert_eq!(
            space.map(0x5000_0000, 0x2000).err(),
            Some(MmioError::OutsideAperture)
        );
        assert_eq!(
            space.map(0xDFFF_FFF0, 0x20).err(),
            Some(MmioError::OutsideAperture)
        );
    }

    #[test]
    fn hardware_side_poke_is_visible_through_mapping() {
        let space = IoMemSpace::new();
        let regs = space.map(0x3000, 8).unwrap();
        space.poke32(0x3004, 0x55);
        assert_eq!(regs.read32(4).unwrap(), 0x55);
    }
}
