use crate::devices::PresentDeviceSet;
use crate::messages::PresenceState;

#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub from: PresenceState,
    pub to: PresenceState,
    pub devices: PresentDeviceSet,
}

impl Transition {
    /// Targets are armed while nobody is home.
    pub fn armed(&self) -> bool {
        self.to == PresenceState::Absent
    }
}

/// Edge-triggered presence tracking: only a change of state (or the first
/// successful scan) yields a transition.
#[derive(Debug, Default)]
pub struct PresenceStateMachine {
    state: PresenceState,
}

impl PresenceStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PresenceState {
        self.state
    }

    pub fn observe(&mut self, devices: &PresentDeviceSet) -> Option<Transition> {
        let next = if devices.is_empty() {
            PresenceState::Absent
        } else {
            PresenceState::Present
        };

        if next == self.state {
            return None;
        }

        let from = std::mem::replace(&mut self.state, next);
        Some(Transition {
            from,
            to: next,
            devices: devices.clone(),
        })
    }
}
