//! On/off projection shared by sensors and switches.

use hamirror_domain::entity::EntityRecord;

pub(super) fn project(on: &mut Option<bool>, record: &EntityRecord) {
    match record.state() {
        Some("on") => *on = Some(true),
        Some("off") => *on = Some(false),
        other => tracing::debug!(entity_id = %record.id, state = ?other, "ignoring non on/off state"),
    }
}
