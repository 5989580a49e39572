use std::fmt;

use crate::error::ScanError;
use crate::presence::Transition;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PresenceState {
    #[default]
    Unknown,
    Present,
    Absent,
}

impl fmt::Display for PresenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PresenceState::Unknown => write!(f, "unknown"),
            PresenceState::Present => write!(f, "present"),
            PresenceState::Absent => write!(f, "absent"),
        }
    }
}

/// Result of one scan worker, produced exactly once per poll cycle.
#[derive(Debug)]
pub enum ScanOutcome {
    Success(String),
    Failure(ScanError),
    TimedOut,
}

/// Armed mode as understood by remotely managed targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArmMode {
    On,
    Off,
}

impl ArmMode {
    pub fn from_armed(armed: bool) -> Self {
        if armed { ArmMode::On } else { ArmMode::Off }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ArmMode::On => "on",
            ArmMode::Off => "off",
        }
    }
}

impl fmt::Display for ArmMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a call to `Manager::run` ended up doing.
#[derive(Clone, Debug, PartialEq)]
pub enum PollReport {
    /// Another poll cycle was already in flight.
    Skipped,
    TimedOut,
    Failed,
    Unchanged(PresenceState),
    Transitioned(Transition),
}

/// Requests to start a poll cycle, coming from outside the controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollRequest {
    Interval,
    Mqtt,
}
