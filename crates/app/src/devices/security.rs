//! Locks and alarm control panels.

use serde::{Deserialize, Serialize};

use hamirror_domain::entity::EntityRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockState {
    Locked,
    Unlocked,
    Jammed,
}

impl LockState {
    fn from_hub(state: &str) -> Option<Self> {
        match state {
            "locked" => Some(Self::Locked),
            "unlocked" => Some(Self::Unlocked),
            "jammed" => Some(Self::Jammed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityMode {
    Disarmed,
    ArmedAway,
    ArmedHome,
    ArmedNight,
}

impl SecurityMode {
    fn from_hub(state: &str) -> Option<Self> {
        match state {
            "disarmed" => Some(Self::Disarmed),
            "armed_away" => Some(Self::ArmedAway),
            "armed_home" => Some(Self::ArmedHome),
            "armed_night" => Some(Self::ArmedNight),
            _ => None,
        }
    }

    /// `alarm_control_panel` service that arms into this mode.
    #[must_use]
    pub fn arm_service(self) -> Option<&'static str> {
        match self {
            Self::Disarmed => None,
            Self::ArmedAway => Some("alarm_arm_away"),
            Self::ArmedHome => Some("alarm_arm_home"),
            Self::ArmedNight => Some("alarm_arm_night"),
        }
    }
}

pub(super) fn project_lock(state: &mut Option<LockState>, record: &EntityRecord) {
    match record.state().and_then(LockState::from_hub) {
        Some(next) => *state = Some(next),
        None => tracing::debug!(entity_id = %record.id, state = ?record.state(), "ignoring lock state"),
    }
}

pub(super) fn project_alarm(mode: &mut Option<SecurityMode>, record: &EntityRecord) {
    // Transitional states (arming, pending, triggered) keep the last mode.
    match record.state().and_then(SecurityMode::from_hub) {
        Some(next) => *mode = Some(next),
        None => tracing::debug!(entity_id = %record.id, state = ?record.state(), "ignoring alarm state"),
    }
}
