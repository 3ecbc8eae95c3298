//! Misc character devices (major 10).
//!
//! A driver hands the [`MiscRegistry`] a name and an `Arc<dyn CharDevice>`;
//! the registry assigns a dynamic minor and makes the device openable by
//! name. The returned [`MiscRegistration`] deregisters on drop.
//!
//! Open files keep their own reference to the device, so a file opened
//! before deregistration stays valid; the driver decides what I/O on such
//! a file means (the FPGA driver answers `NotReady`).

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use bitflags::bitflags;
use spifpga_core::sync::SpinLock;
use spifpga_core::{kdebug, kwarn};

use crate::driver_api::DriverError;
use crate::driver_api::device_path::DevicePath;
use crate::uaccess::{UserSliceReader, UserSliceWriter};

/// Major number shared by all misc devices.
pub const MISC_MAJOR: u32 = 10;

/// First minor handed out dynamically.
pub const MISC_DYNAMIC_MINOR_BASE: u32 = 128;

/// One past the last minor.
const MISC_MINOR_LIMIT: u32 = 256;

bitflags! {
    /// Flags for opening a character device.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        /// Open for reading.
        const READ  = 0b0001;
        /// Open for writing.
        const WRITE = 0b0010;
    }
}

/// File operations of a character device.
pub trait CharDevice: Send + Sync {
    /// Called on every successful open.
    ///
    /// # Errors
    ///
    /// Any [`DriverError`] aborts the open.
    fn open(&self, _flags: OpenFlags) -> Result<(), DriverError> {
        Ok(())
    }

    /// Copies device data into `buf`. Returns the count reported to the
    /// caller.
    ///
    /// # Errors
    ///
    /// Driver specific; [`DriverError::BadAddress`] when `buf` is not
    /// accessible.
    fn read(&self, buf: &mut UserSliceWriter<'_>, offset: u64) -> Result<usize, DriverError>;

    /// Consumes data from `buf`. Returns the count reported to the caller.
    ///
    /// # Errors
    ///
    /// Driver specific; [`DriverError::BadAddress`] when `buf` is not
    /// accessible.
    fn write(&self, buf: &mut UserSliceReader<'_>, offset: u64) -> Result<usize, DriverError>;

    /// Called when an open file is closed.
    fn release(&self) {}
}

/// A listing entry returned by [`MiscRegistry::entries`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiscEntryInfo {
    /// Device name.
    pub name: String,
    /// Always [`MISC_MAJOR`].
    pub major: u32,
    /// Assigned minor.
    pub minor: u32,
}

struct MiscEntry {
    minor: u32,
    device: Arc<dyn CharDevice>,
}

type MiscTable = SpinLock<BTreeMap<String, MiscEntry>>;

/// Registry of misc character devices, keyed by name.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone)]
pub struct MiscRegistry {
    table: Arc<MiscTable>,
}

impl Default for MiscRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MiscRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: Arc::new(SpinLock::named("MISC", BTreeMap::new())),
        }
    }

    /// Registers `device` under `name` with a dynamic minor.
    ///
    /// # Errors
    ///
    /// [`DriverError::RegistrationFailed`] if the name is taken or no minor
    /// is free.
    pub fn register(
        &self,
        name: &str,
        device: Arc<dyn CharDevice>,
    ) -> Result<MiscRegistration, DriverError> {
        let mut table = self.table.lock();
        if table.contains_key(name) {
            kwarn!("misc: {} already registered", name);
            return Err(DriverError::RegistrationFailed);
        }
        let minor = (MISC_DYNAMIC_MINOR_BASE..MISC_MINOR_LIMIT)
            .find(|minor| table.values().all(|entry| entry.minor != *minor))
            .ok_or(DriverError::RegistrationFailed)?;
        table.insert(String::from(name), MiscEntry { minor, device });
        drop(table);

        kdebug!("misc: registered {} ({}:{})", DevicePath::misc(name), MISC_MAJOR, minor);
        Ok(MiscRegistration {
            name: String::from(name),
            minor,
            table: Arc::clone(&self.table),
        })
    }

    /// Opens the device called `name`.
    ///
    /// # Errors
    ///
    /// - [`DriverError::NotFound`] if no such device is registered.
    /// - [`DriverError::NotPermitted`] if `flags` requests neither read nor
    ///   write access.
    /// - Whatever the device's [`CharDevice::open`] returns.
    pub fn open(&self, name: &str, flags: OpenFlags) -> Result<OpenFile, DriverError> {
        let device = {
            let table = self.table.lock();
            let entry = table.get(name).ok_or(DriverError::NotFound)?;
            Arc::clone(&entry.device)
        };
        if !flags.intersects(OpenFlags::READ | OpenFlags::WRITE) {
            return Err(DriverError::NotPermitted);
        }
        device.open(flags)?;
        Ok(OpenFile {
            name: String::from(name),
            device,
            flags,
            offset: 0,
        })
    }

    /// Returns `true` if a device called `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.table.lock().contains_key(name)
    }

    /// Lists registered devices sorted by name.
    #[must_use]
    pub fn entries(&self) -> Vec<MiscEntryInfo> {
        self.table
            .lock()
            .iter()
            .map(|(name, entry)| MiscEntryInfo {
                name: name.clone(),
                major: MISC_MAJOR,
                minor: entry.minor,
            })
            .collect()
    }
}

/// Proof that a misc device is registered. Deregisters on drop.
pub struct MiscRegistration {
    name: String,
    minor: u32,
    table: Arc<MiscTable>,
}

impl MiscRegistration {
    /// Registered name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Assigned minor number.
    #[must_use]
    pub fn minor(&self) -> u32 {
        self.minor
    }
}

impl core::fmt::Debug for MiscRegistration {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MiscRegistration")
            .field("name", &self.name)
            .field("minor", &self.minor)
            .finish_non_exhaustive()
    }
}

impl Drop for MiscRegistration {
    fn drop(&mut self) {
        let mut table = self.table.lock();
        if table.get(&self.name).is_some_and(|entry| entry.minor == self.minor) {
            table.remove(&self.name);
        }
        drop(table);
        kdebug!("misc: deregistered {}", DevicePath::misc(&self.name));
    }
}

/// An open misc device. Calls [`CharDevice::release`] on drop.
pub struct OpenFile {
    name: String,
    device: Arc<dyn CharDevice>,
    flags: OpenFlags,
    offset: u64,
}

impl OpenFile {
    /// Name the file was opened under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Flags the file was opened with.
    #[must_use]
    pub fn flags(&self) -> OpenFlags {
        self.flags
    }

    /// Current file offset.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Reads from the device into `buf`.
    ///
    /// # Errors
    ///
    /// [`DriverError::NotPermitted`] if not opened for reading, otherwise
    /// whatever the device returns.
    pub fn read(&mut self, buf: &mut UserSliceWriter<'_>) -> Result<usize, DriverError> {
        if !self.flags.contains(OpenFlags::READ) {
            return Err(DriverError::NotPermitted);
        }
        let count = self.device.read(buf, self.offset)?;
        self.offset += count as u64;
        Ok(count)
    }

    /// Writes `buf` to the device.
    ///
    /// # Errors
    ///
    /// [`DriverError::NotPermitted`] if not opened for writing, otherwise
    /// whatever the device returns.
    pub fn write(&mut self, buf: &mut UserSliceReader<'_>) -> Result<usize, DriverError> {
        if !self.flags.contains(OpenFlags::WRITE) {
            return Err(DriverError::NotPermitted);
        }
        let count = self.device.write(buf, self.offset)?;
        self.offset += count as u64;
        Ok(count)
    }
}

impl Drop for OpenFile {
    fn drop(&mut self) {
        self.device.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

    /// Stores one word; counts opens and releases.
    #[derive(Default)]
    struct Latch {
        value: AtomicU32,
        opens: AtomicUsize,
        releases: AtomicUsize,
    }

    impl CharDevice for Latch {
        fn open(&self, _flags: OpenFlags) -> Result<(), DriverError> {
            self.opens.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        fn read(&self, buf: &mut UserSliceWriter<'_>, _offset: u64) -> Result<usize, DriverError> {
            buf.write_u32(self.value.load(Ordering::Relaxed))?;
            Ok(4)
        }

        fn write(&self, buf: &mut UserSliceReader<'_>, _offset: u64) -> Result<usize, DriverError> {
            self.value.store(buf.read_u32()?, Ordering::Relaxed);
            Ok(4)
        }

        fn release(&self) {
            self.releases.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn register_assigns_dynamic_minors() {
        let misc = MiscRegistry::new();
        let a = misc.register("a", Arc::new(Latch::default())).unwrap();
        let b = misc.register("b", Arc::new(Latch::default())).unwrap();
        assert_eq!(a.minor(), MISC_DYNAMIC_MINOR_BASE);
        assert_eq!(b.minor(), MISC_DYNAMIC_MINOR_BASE + 1);

        drop(a);
        let c = misc.register("c", Arc::new(Latch::default())).unwrap();
        assert_eq!(c.minor(), MISC_DYNAMIC_MINOR_BASE);
    }

    #[test]
    fn duplicate_name_fails() {
        let misc = MiscRegistry::new();
        let _a = misc.register("spi", Arc::new(Latch::default())).unwrap();
        assert_eq!(
            misc.register("spi", Arc::new(Latch::default())).err(),
            Some(DriverError::RegistrationFailed)
        );
    }

    #[test]
    fn minors_exhaust() {
        let misc = MiscRegistry::new();
        let mut held = Vec::new();
        for i in MISC_DYNAMIC_MINOR_BASE..MISC_MINOR_LIMIT {
            held.push(misc.register(&format!("dev{i}"), Arc::new(Latch::default())).unwrap());
        }
        assert!(misc.register("one_more", Arc::new(Latch::default())).is_err());
    }

    #[test]
    fn drop_registration_removes_entry() {
        let misc = MiscRegistry::new();
        let reg = misc.register("spi", Arc::new(Latch::default())).unwrap();
        assert!(misc.contains("spi"));
        assert_eq!(
            misc.entries(),
            alloc::vec![MiscEntryInfo {
                name: String::from("spi"),
                major: MISC_MAJOR,
                minor: reg.minor(),
            }]
        );
        drop(reg);
        assert!(!misc.contains("spi"));
        assert_eq!(misc.open("spi", OpenFlags::READ).err(), Some(DriverError::NotFound));
    }

    #[test]
    fn open_read_write_release() {
        let misc = MiscRegistry::new();
        let dev = Arc::new(Latch::default());
        let _reg = misc.register("latch", dev.clone()).unwrap();

        let mut file = misc.open("latch", OpenFlags::READ | OpenFlags::WRITE).unwrap();
        assert_eq!(dev.opens.load(Ordering::Relaxed), 1);

        let input = 0x1234u32.to_ne_bytes();
        assert_eq!(file.write(&mut UserSliceReader::new(&input, 4)), Ok(4));

        let mut out = [0u8; 4];
        assert_eq!(file.read(&mut UserSliceWriter::new(&mut out, 4)), Ok(4));
        assert_eq!(u32::from_ne_bytes(out), 0x1234);
        assert_eq!(file.offset(), 8);

        drop(file);
        assert_eq!(dev.releases.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn access_mode_is_enforced() {
        let misc = MiscRegistry::new();
        let _reg = misc.register("latch", Arc::new(Latch::default())).unwrap();

        assert_eq!(
            misc.open("latch", OpenFlags::empty()).err(),
            Some(DriverError::NotPermitted)
        );

        let mut ro = misc.open("latch", OpenFlags::READ).unwrap();
        assert_eq!(
            ro.write(&mut UserSliceReader::new(&[0; 4], 4)),
            Err(DriverError::NotPermitted)
        );

        let mut wo = misc.open("latch", OpenFlags::WRITE).unwrap();
        let mut out = [0u8; 4];
        assert_eq!(
            wo.read(&mut UserSliceWriter::new(&mut out, 4)),
            Err(DriverError::NotPermitted)
        );
    }

    #[test]
    fn open_file_outlives_registration() {
        let misc = MiscRegistry::new();
        let reg = misc.register("latch", Arc::new(Latch::default())).unwrap();
        let mut file = misc.open("latch", OpenFlags::WRITE).unwrap();
        drop(reg);
        let input = 5u32.to_ne_bytes();
        assert_eq!(file.write(&mut UserSliceReader::new(&input, 4)), Ok(4));
    }
}
