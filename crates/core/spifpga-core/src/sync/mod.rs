//! Synchronization primitives.
//!
//! Provides [`SpinLock`], const-constructable so it can be placed in `static`
//! items and usable without an allocator or scheduler.

mod spinlock;

pub use spinlock::{SpinLock, SpinLockGuard};
