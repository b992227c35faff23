use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::{RemoteError, Transport};
use crate::listing::collection::{lock, Collection};
use crate::listing::config::ListConfig;
use crate::listing::loader::normalize_status;
use crate::models::entity::{Entity, EntityId, Patch};
use crate::models::mutation::{MutationIntent, MutationKind, MutationPhase};

/// Rejected before any network call is made.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Field '{0}' is required")]
    Required(String),

    #[error("The id of an entity cannot be set or changed")]
    IdInPatch,

    #[error("Patch is empty")]
    EmptyPatch,

    #[error("A {0:?} mutation needs an entity id")]
    MissingEntityId(MutationKind),

    #[error("A {0:?} mutation needs a body")]
    MissingBody(MutationKind),

    #[error("Field '{0}' is not a flag")]
    NotAFlag(String),

    #[error("'{0}' is not a known status")]
    UnknownStatus(String),
}

#[derive(Debug, Error)]
pub enum MutationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Entity '{0}' not found")]
    NotFound(EntityId),

    #[error("{kind:?} of '{id}' failed and was rolled back: {source}")]
    RolledBack {
        kind: MutationKind,
        id: EntityId,
        #[source]
        source: RemoteError,
    },

    #[error("Create failed: {0}")]
    CreateFailed(#[source] RemoteError),

    #[error("Create response did not include the new entity with its id")]
    MissingCreatedEntity,
}

impl MutationError {
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            Self::RolledBack { source, .. } | Self::CreateFailed(source) => Some(source),
            _ => None,
        }
    }
}

/// Result of a settled mutation.
#[derive(Debug, Clone, Serialize)]
pub struct MutationReport {
    pub mutation_id: Uuid,
    pub kind: MutationKind,
    pub phase: MutationPhase,
    pub entity: Option<Entity>,
}

/// Applies changes to the local collection first, then reconciles with the
/// remote call.
///
/// Mutations on the same entity id are serialized: a second request waits for
/// the first one to commit or roll back before it reads the entity.
#[derive(Debug)]
pub struct MutationApplier {
    endpoint: String,
    slots: Mutex<HashMap<EntityId, Arc<AsyncMutex<()>>>>,
    pending: Mutex<HashMap<EntityId, MutationIntent>>,
    settled: Mutex<HashMap<EntityId, MutationPhase>>,
}

/// Exclusive hold on one entity id. The slot is dropped from the map once
/// nobody else is waiting on it.
struct EntityLock<'a> {
    applier: &'a MutationApplier,
    id: EntityId,
    slot: Arc<AsyncMutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for EntityLock<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut slots = lock(&self.applier.slots);
        // map + self
        if Arc::strong_count(&self.slot) == 2 {
            slots.remove(&self.id);
        }
    }
}

/// How to undo one optimistic change.
enum Restore {
    Row { snapshot: Entity, optimistic: Entity },
    Removed { index: usize, entity: Entity },
}

/// Armed between the optimistic change and the remote answer. If the mutation
/// future is dropped in that window (client disconnect, shutdown) the change
/// is rolled back and the mutation settles as `RolledBack`.
struct Reconcile<'a> {
    applier: &'a MutationApplier,
    target: &'a Mutex<Collection>,
    id: EntityId,
    restore: Option<Restore>,
}

impl<'a> Reconcile<'a> {
    fn arm(
        applier: &'a MutationApplier,
        target: &'a Mutex<Collection>,
        id: &EntityId,
        restore: Restore,
    ) -> Self {
        Self {
            applier,
            target,
            id: id.clone(),
            restore: Some(restore),
        }
    }

    fn commit(mut self) {
        self.restore = None;
        self.applier.settle(&self.id, MutationPhase::Committed);
    }

    /// Committed deletes leave nothing to track.
    fn forget(mut self) {
        self.restore = None;
        self.applier.forget(&self.id);
    }

    fn rollback(mut self) {
        self.undo();
    }

    fn undo(&mut self) {
        let Some(restore) = self.restore.take() else {
            return;
        };
        {
            let mut collection = lock(self.target);
            match restore {
                // A reload may have replaced the row meanwhile; that is server truth.
                Restore::Row {
                    snapshot,
                    optimistic,
                } => {
                    if collection.get(&self.id) == Some(&optimistic) {
                        collection.replace(snapshot);
                    }
                }
                Restore::Removed { index, entity } => {
                    if collection.get(&self.id).is_none() {
                        collection.insert_at(index, entity);
                    }
                }
            }
        }
        self.applier.settle(&self.id, MutationPhase::RolledBack);
    }
}

impl Drop for Reconcile<'_> {
    fn drop(&mut self) {
        if self.restore.is_some() {
            warn!(
                "Mutation of {} on {} abandoned before the backend answered; rolling back",
                self.id, self.applier.endpoint
            );
            self.undo();
        }
    }
}

impl MutationApplier {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            slots: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            settled: Mutex::new(HashMap::new()),
        }
    }

    /// Where the latest mutation of `id` stands. `Idle` if it was never touched.
    pub fn phase(&self, id: &EntityId) -> MutationPhase {
        if lock(&self.pending).contains_key(id) {
            return MutationPhase::Pending;
        }
        lock(&self.settled)
            .get(id)
            .copied()
            .unwrap_or(MutationPhase::Idle)
    }

    pub fn pending(&self) -> Vec<MutationIntent> {
        lock(&self.pending).values().cloned().collect()
    }

    async fn acquire(&self, id: &EntityId) -> EntityLock<'_> {
        let slot = {
            let mut slots = lock(&self.slots);
            // Slots only the map still holds belong to waiters that were cancelled.
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            slots.entry(id.clone()).or_default().clone()
        };
        let guard = slot.clone().lock_owned().await;
        EntityLock {
            applier: self,
            id: id.clone(),
            slot,
            guard: Some(guard),
        }
    }

    fn begin(&self, mutation_id: Uuid, intent: MutationIntent) {
        if let Some(id) = &intent.entity_id {
            debug!(%mutation_id, "{:?} of {id} pending", intent.kind);
            lock(&self.pending).insert(id.clone(), intent);
        }
    }

    fn settle(&self, id: &EntityId, phase: MutationPhase) {
        lock(&self.pending).remove(id);
        lock(&self.settled).insert(id.clone(), phase);
    }

    fn forget(&self, id: &EntityId) {
        lock(&self.pending).remove(id);
        lock(&self.settled).remove(id);
    }

    /// Update whose patch is computed from the current entity once the entity
    /// lock is held, so read-modify-write patches (toggles) never race.
    pub async fn update_with<F>(
        &self,
        transport: &dyn Transport,
        config: &ListConfig,
        target: &Mutex<Collection>,
        id: &EntityId,
        make_patch: F,
    ) -> Result<MutationReport, MutationError>
    where
        F: FnOnce(&Entity) -> Result<Patch, ValidationError>,
    {
        let _entity_lock = self.acquire(id).await;
        let mutation_id = Uuid::new_v4();

        let (patch, snapshot, optimistic) = {
            let mut collection = lock(target);
            let current = collection
                .get(id)
                .cloned()
                .ok_or_else(|| MutationError::NotFound(id.clone()))?;
            let patch = make_patch(&current)?;
            validate_patch(&patch, config)?;
            let optimistic = current.patched(&patch);
            collection.replace(optimistic.clone());
            (patch, current, optimistic)
        };
        self.begin(mutation_id, MutationIntent::update(id.clone(), patch.clone()));
        let reconcile = Reconcile::arm(
            self,
            target,
            id,
            Restore::Row {
                snapshot,
                optimistic: optimistic.clone(),
            },
        );

        match transport.update(&self.endpoint, id, &patch).await {
            Ok(_) => {
                reconcile.commit();
                info!(%mutation_id, "Update of {id} on {} committed", self.endpoint);
                Ok(MutationReport {
                    mutation_id,
                    kind: MutationKind::Update,
                    phase: MutationPhase::Committed,
                    entity: Some(optimistic),
                })
            }
            Err(source) => {
                reconcile.rollback();
                warn!(%mutation_id, "Update of {id} on {} rolled back: {source}", self.endpoint);
                Err(MutationError::RolledBack {
                    kind: MutationKind::Update,
                    id: id.clone(),
                    source,
                })
            }
        }
    }

    pub async fn update(
        &self,
        transport: &dyn Transport,
        config: &ListConfig,
        target: &Mutex<Collection>,
        id: &EntityId,
        patch: Patch,
    ) -> Result<MutationReport, MutationError> {
        // Fail fast without queueing behind other mutations.
        validate_patch(&patch, config)?;
        self.update_with(transport, config, target, id, move |_| Ok(patch))
            .await
    }

    pub async fn delete(
        &self,
        transport: &dyn Transport,
        target: &Mutex<Collection>,
        id: &EntityId,
    ) -> Result<MutationReport, MutationError> {
        let _entity_lock = self.acquire(id).await;
        let mutation_id = Uuid::new_v4();

        let (index, removed) = lock(target)
            .remove(id)
            .ok_or_else(|| MutationError::NotFound(id.clone()))?;
        self.begin(mutation_id, MutationIntent::delete(id.clone()));
        let reconcile = Reconcile::arm(
            self,
            target,
            id,
            Restore::Removed {
                index,
                entity: removed,
            },
        );

        match transport.delete(&self.endpoint, id).await {
            Ok(()) => {
                reconcile.forget();
                info!(%mutation_id, "Delete of {id} on {} committed", self.endpoint);
                Ok(MutationReport {
                    mutation_id,
                    kind: MutationKind::Delete,
                    phase: MutationPhase::Committed,
                    entity: None,
                })
            }
            Err(source) => {
                reconcile.rollback();
                warn!(%mutation_id, "Delete of {id} on {} rolled back: {source}", self.endpoint);
                Err(MutationError::RolledBack {
                    kind: MutationKind::Delete,
                    id: id.clone(),
                    source,
                })
            }
        }
    }

    /// Creates wait for the server: the id is only known from the response.
    pub async fn create(
        &self,
        transport: &dyn Transport,
        config: &ListConfig,
        target: &Mutex<Collection>,
        body: Patch,
    ) -> Result<MutationReport, MutationError> {
        validate_create(&body, config)?;
        let mutation_id = Uuid::new_v4();
        debug!(%mutation_id, "Create on {} pending", self.endpoint);

        let response = transport
            .create(&self.endpoint, &body)
            .await
            .map_err(|source| {
                warn!(%mutation_id, "Create on {} failed: {source}", self.endpoint);
                MutationError::CreateFailed(source)
            })?;

        let mut entity = response
            .and_then(Entity::from_value)
            .ok_or(MutationError::MissingCreatedEntity)?;
        normalize_status(&mut entity, config);
        lock(target).upsert(entity.clone());

        info!(%mutation_id, "Created {} on {}", entity.id, self.endpoint);
        Ok(MutationReport {
            mutation_id,
            kind: MutationKind::Create,
            phase: MutationPhase::Committed,
            entity: Some(entity),
        })
    }

    pub async fn submit(
        &self,
        transport: &dyn Transport,
        config: &ListConfig,
        target: &Mutex<Collection>,
        intent: MutationIntent,
    ) -> Result<MutationReport, MutationError> {
        let MutationIntent {
            kind,
            entity_id,
            patch,
        } = intent;
        match kind {
            MutationKind::Update => {
                let id = entity_id.ok_or(ValidationError::MissingEntityId(kind))?;
                let patch = patch.ok_or(ValidationError::MissingBody(kind))?;
                self.update(transport, config, target, &id, patch).await
            }
            MutationKind::Delete => {
                let id = entity_id.ok_or(ValidationError::MissingEntityId(kind))?;
                self.delete(transport, target, &id).await
            }
            MutationKind::Create => {
                let body = patch.ok_or(ValidationError::MissingBody(kind))?;
                self.create(transport, config, target, body).await
            }
        }
    }
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

/// Updates may touch any field but may not blank a required one.
pub fn validate_patch(patch: &Patch, config: &ListConfig) -> Result<(), ValidationError> {
    if patch.is_empty() {
        return Err(ValidationError::EmptyPatch);
    }
    if patch.contains_key("id") {
        return Err(ValidationError::IdInPatch);
    }
    for field in &config.required {
        if patch.contains_key(field) && is_blank(patch.get(field)) {
            return Err(ValidationError::Required(field.clone()));
        }
    }
    Ok(())
}

/// Creates must carry every required field and leave the id to the server.
pub fn validate_create(body: &Patch, config: &ListConfig) -> Result<(), ValidationError> {
    if body.contains_key("id") {
        return Err(ValidationError::IdInPatch);
    }
    for field in &config.required {
        if is_blank(body.get(field)) {
            return Err(ValidationError::Required(field.clone()));
        }
    }
    Ok(())
}
