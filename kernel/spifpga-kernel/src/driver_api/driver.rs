//! Base driver trait, metadata and per-device lifecycle state.

use core::fmt;

/// Static metadata describing a driver.
#[derive(Debug, Clone, Copy)]
pub struct DriverInfo {
    /// Short name of the driver (e.g. "fpga_spi"). Also matched against
    /// device names when no compatible string matches.
    pub name: &'static str,
    /// Human-readable description.
    pub description: &'static str,
}

/// Lifecycle state of one device instance on the bus.
///
/// State machine: `Unbound → Probing → Bound → Removing → Unbound`
/// (also `Probing → Unbound` on a failed probe).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceState {
    /// Registered, no driver attached.
    #[default]
    Unbound,
    /// A driver's probe is in progress.
    Probing,
    /// Probe succeeded; read/write are valid.
    Bound,
    /// Remove is in progress.
    Removing,
}

impl DeviceState {
    /// Returns `true` if the lifecycle permits moving from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: DeviceState) -> bool {
        matches!(
            (self, next),
            (Self::Unbound, Self::Probing)
                | (Self::Probing, Self::Bound | Self::Unbound)
                | (Self::Bound, Self::Removing)
                | (Self::Removing, Self::Unbound)
        )
    }

    /// Returns `true` if character I/O is permitted in this state.
    #[must_use]
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Bound)
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unbound => "unbound",
            Self::Probing => "probing",
            Self::Bound => "bound",
            Self::Removing => "removing",
        })
    }
}

/// Base trait that all drivers implement to provide identity and metadata.
pub trait Driver {
    /// Returns static information about this driver.
    fn info(&self) -> DriverInfo;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_transitions() {
        use DeviceState::*;
        assert!(Unbound.can_transition_to(Probing));
        assert!(Probing.can_transition_to(Bound));
        assert!(Probing.can_transition_to(Unbound));
        assert!(Bound.can_transition_to(Removing));
        assert!(Removing.can_transition_to(Unbound));

        assert!(!Unbound.can_transition_to(Bound));
        assert!(!Bound.can_transition_to(Unbound));
        assert!(!Removing.can_transition_to(Bound));
        assert!(!Bound.can_transition_to(Probing));
    }

    #[test]
    fn only_bound_is_ready() {
        assert!(DeviceState::Bound.is_ready());
        assert!(!DeviceState::Unbound.is_ready());
        assert!(!DeviceState::Probing.is_ready());
        assert!(!DeviceState::Removing.is_ready());
    }

    #[test]
    fn default_is_unbound() {
        assert_eq!(DeviceState::default(), DeviceState::Unbound);
        assert_eq!(format!("{}", DeviceState::Bound), "bound");
    }
}
