//! Device state machine
//!
//! Pure bookkeeping for the Disabled / Enabled / Error lifecycle. The actor
//! performs the channel I/O and records the outcome here; every change of
//! state goes through one of the transition methods, which report the
//! `(from, to)` pair when the state actually moved.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DriverError, Result};

/// Lifecycle state of the scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DeviceState {
    /// Channel closed, no input
    #[default]
    Disabled,
    /// Channel open, scans delivered
    Enabled,
    /// Unrecoverable fault; input is discarded until the device is disabled
    Error,
}

impl DeviceState {
    /// Get human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Enabled => "enabled",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// A change of state that actually happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: DeviceState,
    pub to: DeviceState,
}

/// What an enable request has to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnableStep {
    /// The channel must be opened
    Open,
    /// Already enabled; nothing to do
    AlreadyEnabled,
}

/// Tracks the device state and the reason for the last fault
#[derive(Debug, Default)]
pub struct StateMachine {
    state: DeviceState,
    fault_reason: Option<String>,
}

impl StateMachine {
    /// Start in [`DeviceState::Disabled`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state
    pub fn state(&self) -> DeviceState {
        self.state
    }

    /// Reason given when the device entered the Error state
    pub fn fault_reason(&self) -> Option<&str> {
        self.fault_reason.as_deref()
    }

    /// Whether incoming frames are turned into scans
    pub fn accepts_input(&self) -> bool {
        self.state != DeviceState::Error
    }

    /// Decide how to handle an enable request
    pub fn plan_enable(&self) -> Result<EnableStep> {
        match self.state {
            DeviceState::Disabled => Ok(EnableStep::Open),
            DeviceState::Enabled => Ok(EnableStep::AlreadyEnabled),
            DeviceState::Error => Err(DriverError::DeviceFaulted),
        }
    }

    /// Record that the channel was opened
    pub fn enabled(&mut self) -> Option<Transition> {
        match self.state {
            DeviceState::Disabled => self.move_to(DeviceState::Enabled),
            _ => None,
        }
    }

    /// Record that the channel was closed; valid from every state
    pub fn disabled(&mut self) -> Option<Transition> {
        self.fault_reason = None;
        self.move_to(DeviceState::Disabled)
    }

    /// Record an unrecoverable fault
    ///
    /// The first reason is kept if the device is already in the Error state.
    pub fn faulted(&mut self, reason: impl Into<String>) -> Option<Transition> {
        if self.state == DeviceState::Error {
            return None;
        }
        self.fault_reason = Some(reason.into());
        self.move_to(DeviceState::Error)
    }

    fn move_to(&mut self, to: DeviceState) -> Option<Transition> {
        let from = self.state;
        if from == to {
            return None;
        }
        self.state = to;
        Some(Transition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_disabled() {
        let machine = StateMachine::new();
        assert_eq!(machine.state(), DeviceState::Disabled);
        assert!(machine.accepts_input());
        assert_eq!(machine.plan_enable().unwrap(), EnableStep::Open);
    }

    #[test]
    fn test_enable_disable_round_trip() {
        let mut machine = StateMachine::new();

        assert_eq!(
            machine.enabled(),
            Some(Transition {
                from: DeviceState::Disabled,
                to: DeviceState::Enabled
            })
        );
        assert_eq!(machine.plan_enable().unwrap(), EnableStep::AlreadyEnabled);
        assert_eq!(machine.enabled(), None);

        assert_eq!(
            machine.disabled(),
            Some(Transition {
                from: DeviceState::Enabled,
                to: DeviceState::Disabled
            })
        );
        assert_eq!(machine.disabled(), None);
    }

    #[test]
    fn test_fault_blocks_enable_until_disabled() {
        let mut machine = StateMachine::new();
        machine.enabled();

        let transition = machine.faulted("reader failed").unwrap();
        assert_eq!(transition.from, DeviceState::Enabled);
        assert_eq!(transition.to, DeviceState::Error);
        assert!(!machine.accepts_input());
        assert_eq!(machine.fault_reason(), Some("reader failed"));

        assert!(matches!(
            machine.plan_enable(),
            Err(DriverError::DeviceFaulted)
        ));
        assert_eq!(machine.enabled(), None);
        assert_eq!(machine.state(), DeviceState::Error);

        machine.disabled();
        assert_eq!(machine.state(), DeviceState::Disabled);
        assert_eq!(machine.fault_reason(), None);
        assert_eq!(machine.plan_enable().unwrap(), EnableStep::Open);
    }

    #[test]
    fn test_second_fault_keeps_first_reason() {
        let mut machine = StateMachine::new();
        assert!(machine.faulted("first").is_some());
        assert!(machine.faulted("second").is_none());
        assert_eq!(machine.fault_reason(), Some("first"));
    }
}
