//! Covers: garage doors, blinds, gates.

use hamirror_domain::entity::EntityRecord;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverState {
    /// 0 (closed) to 100 (open).
    pub position: Option<u8>,
    pub open: Option<bool>,
}

impl CoverState {
    pub(super) fn project(&mut self, record: &EntityRecord) {
        match record.state() {
            Some("open" | "opening") => self.open = Some(true),
            Some("closed" | "closing") => self.open = Some(false),
            other => tracing::debug!(entity_id = %record.id, state = ?other, "ignoring cover state"),
        }
        if let Some(position) = record.attributes.get_f64("current_position") {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let clamped = position.clamp(0.0, 100.0).round() as u8;
            self.position = Some(clamped);
        }
    }
}
