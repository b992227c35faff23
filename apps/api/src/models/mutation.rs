use serde::{Deserialize, Serialize};

use crate::models::entity::{EntityId, Patch};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Update,
    Delete,
    Create,
}

/// A pending change described before the remote call resolves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationIntent {
    pub kind: MutationKind,
    #[serde(default)]
    pub entity_id: Option<EntityId>,
    #[serde(default)]
    pub patch: Option<Patch>,
}

impl MutationIntent {
    pub fn update(id: EntityId, patch: Patch) -> Self {
        Self {
            kind: MutationKind::Update,
            entity_id: Some(id),
            patch: Some(patch),
        }
    }

    pub fn delete(id: EntityId) -> Self {
        Self {
            kind: MutationKind::Delete,
            entity_id: Some(id),
            patch: None,
        }
    }

    pub fn create(body: Patch) -> Self {
        Self {
            kind: MutationKind::Create,
            entity_id: None,
            patch: Some(body),
        }
    }
}

/// Lifecycle of one mutation: `Idle -> Pending -> Committed | RolledBack`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationPhase {
    Idle,
    Pending,
    Committed,
    RolledBack,
}
