//! Device groups aggregate every entity of one catalog device.

use std::collections::BTreeMap;

use hamirror_domain::entity::{EntityId, EntityRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMember {
    pub name: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupState {
    pub members: BTreeMap<EntityId, GroupMember>,
}

impl GroupState {
    pub(super) fn project(&mut self, record: &EntityRecord) {
        self.members.insert(
            record.id.clone(),
            GroupMember {
                name: record.display_name(),
                value: record.state.clone(),
            },
        );
    }
}
