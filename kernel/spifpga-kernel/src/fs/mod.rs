//! Character-device file layer.

pub mod misc;

pub use misc::{CharDevice, MiscRegistration, MiscRegistry, OpenFile, OpenFlags};
