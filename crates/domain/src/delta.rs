//! Diff-patch decoder for the hub's compact entity subscription protocol.
//!
//! Each frame carries up to three sections which are applied in a fixed
//! order: `a` (added, full compact states), `r` (removed ids) and `c`
//! (changed, `+` additions and `-` attribute removals). A change may refer
//! to an id added earlier in the same frame, and a change to an id removed
//! earlier in the same frame is skipped.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::entity::{Attributes, Context, EntityId, EntityRecord};
use crate::time::{Timestamp, from_epoch_secs};

/// Full mirror of the hub: entity id → current record.
pub type Snapshot = BTreeMap<EntityId, EntityRecord>;

/// One frame of the compact subscription protocol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeltaMessage {
    #[serde(rename = "a", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub added: BTreeMap<EntityId, CompactState>,
    #[serde(rename = "r", default, skip_serializing_if = "Vec::is_empty")]
    pub removed: Vec<EntityId>,
    #[serde(rename = "c", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub changed: BTreeMap<EntityId, EntityDiff>,
}

impl DeltaMessage {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

/// Full entity state in compact form (used by the `a` section).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompactState {
    #[serde(rename = "s", default)]
    pub state: Option<String>,
    #[serde(rename = "a", default)]
    pub attributes: Map<String, Value>,
    #[serde(rename = "c", default, skip_serializing_if = "Option::is_none")]
    pub context: Option<CompactContext>,
    #[serde(rename = "lc", default, skip_serializing_if = "Option::is_none")]
    pub last_changed: Option<f64>,
    #[serde(rename = "lu", default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<f64>,
}

/// Partial entity state carried by a `+` fragment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompactStatePatch {
    #[serde(rename = "s", default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(rename = "a", default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Map<String, Value>>,
    #[serde(rename = "c", default, skip_serializing_if = "Option::is_none")]
    pub context: Option<CompactContext>,
    #[serde(rename = "lc", default, skip_serializing_if = "Option::is_none")]
    pub last_changed: Option<f64>,
    #[serde(rename = "lu", default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<f64>,
}

/// Keys removed by a `-` fragment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeRemovals {
    #[serde(rename = "a", default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Vec<String>>,
}

/// One entry of the `c` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityDiff {
    #[serde(rename = "+", default, skip_serializing_if = "Option::is_none")]
    pub additions: Option<CompactStatePatch>,
    #[serde(rename = "-", default, skip_serializing_if = "Option::is_none")]
    pub removals: Option<AttributeRemovals>,
}

/// Context in compact form: either a bare context id or an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CompactContext {
    Id(String),
    Fields {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        parent_id: Option<String>,
        #[serde(default)]
        user_id: Option<String>,
    },
}

impl CompactContext {
    fn into_context(self) -> Context {
        let mut ctx = Context::default();
        self.merge_into(&mut ctx);
        ctx
    }

    /// A bare id only replaces `id`; an object replaces the fields it carries.
    fn merge_into(self, ctx: &mut Context) {
        match self {
            Self::Id(id) => ctx.id = Some(id),
            Self::Fields {
                id,
                parent_id,
                user_id,
            } => {
                if id.is_some() {
                    ctx.id = id;
                }
                if parent_id.is_some() {
                    ctx.parent_id = parent_id;
                }
                if user_id.is_some() {
                    ctx.user_id = user_id;
                }
            }
        }
    }
}

/// What a frame did to the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeltaReport {
    /// Ids whose record was created or replaced and is still present.
    pub upserted: BTreeSet<EntityId>,
    /// Ids deleted by the frame.
    pub removed: BTreeSet<EntityId>,
    /// Ids referenced by `c` that were not in the snapshot.
    pub unknown: Vec<EntityId>,
}

impl DeltaReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.upserted.is_empty() && self.removed.is_empty()
    }
}

/// Apply `delta` to a copy of `previous` and return the next snapshot.
#[must_use]
pub fn apply(previous: &Snapshot, delta: &DeltaMessage) -> Snapshot {
    let mut next = previous.clone();
    apply_in_place(&mut next, delta);
    next
}

/// Apply `delta` to `snapshot` (added → removed → changed).
///
/// Changes for ids missing from the snapshot are skipped and reported in
/// [`DeltaReport::unknown`]; the rest of the frame still applies.
pub fn apply_in_place(snapshot: &mut Snapshot, delta: &DeltaMessage) -> DeltaReport {
    let mut report = DeltaReport::default();

    for (id, compact) in &delta.added {
        snapshot.insert(id.clone(), expand(id, compact.clone()));
        report.upserted.insert(id.clone());
    }

    for id in &delta.removed {
        if snapshot.remove(id).is_some() {
            report.removed.insert(id.clone());
        }
        report.upserted.remove(id);
    }

    for (id, diff) in &delta.changed {
        let Some(record) = snapshot.get_mut(id) else {
            // Logged by the caller; the rest of the frame still applies.
            report.unknown.push(id.clone());
            continue;
        };
        patch(record, diff);
        report.upserted.insert(id.clone());
    }

    report
}

fn expand(id: &EntityId, compact: CompactState) -> EntityRecord {
    let last_changed = compact
        .last_changed
        .and_then(from_epoch_secs)
        .unwrap_or_else(Timestamp::default);
    let last_updated = compact
        .last_updated
        .and_then(from_epoch_secs)
        .unwrap_or(last_changed);

    EntityRecord {
        id: id.clone(),
        state: compact.state,
        attributes: Attributes::from(compact.attributes),
        context: compact
            .context
            .map(CompactContext::into_context)
            .unwrap_or_default(),
        last_changed,
        last_updated,
    }
}

fn patch(record: &mut EntityRecord, diff: &EntityDiff) {
    let additions = diff.additions.as_ref();

    if let Some(add) = additions {
        if let Some(state) = &add.state {
            record.state = Some(state.clone());
        }
        if let Some(ctx) = &add.context {
            ctx.clone().merge_into(&mut record.context);
        }
        if let Some(ts) = add.last_changed.and_then(from_epoch_secs) {
            record.last_changed = ts;
            record.last_updated = ts;
        } else if let Some(ts) = add.last_updated.and_then(from_epoch_secs) {
            record.last_updated = ts;
        }
    }

    let added_attrs = additions.and_then(|add| add.attributes.as_ref());
    let removed_attrs = diff.removals.as_ref().and_then(|rm| rm.attributes.as_ref());
    if added_attrs.is_some() || removed_attrs.is_some() {
        record.attributes = record
            .attributes
            .merged(added_attrs, removed_attrs.map_or(&[], Vec::as_slice));
    }
}
