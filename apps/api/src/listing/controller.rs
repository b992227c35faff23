use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::backend::Transport;
use crate::labels::{Locale, StatusLabel};
use crate::listing::collection::{lock, Collection};
use crate::listing::config::ListConfig;
use crate::listing::filter::FilterEngine;
use crate::listing::loader::{LoadError, LoadOutcome, Loader};
use crate::listing::mutation::{MutationApplier, MutationError, MutationReport, ValidationError};
use crate::listing::projector::{bucket_counts, count_flagged, paginate, project, Bucket, Page};
use crate::models::entity::{Entity, EntityId, Patch};
use crate::models::mutation::{MutationIntent, MutationPhase};
use crate::models::view::{FilterState, SortSpec, ViewQuery};

const DEFAULT_STATUS_FIELD: &str = "status";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Load,
    Mutation,
    Validation,
}

/// Error state shown to the user next to the list (banner or toast).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SurfacedError {
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ViewRow {
    #[serde(flatten)]
    pub entity: Entity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_label: Option<StatusLabel>,
    /// Latest local mutation of this row, for the pending/rolled-back markers.
    pub mutation: MutationPhase,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListView {
    pub resource: String,
    /// Effective query (defaults applied) in URL form.
    pub query: Vec<(String, String)>,
    #[serde(flatten)]
    pub page: Page<ViewRow>,
    pub buckets: Vec<Bucket>,
    pub flag_counts: BTreeMap<String, usize>,
    pub revision: u64,
    pub loading: bool,
    pub error: Option<SurfacedError>,
}

/// Derived rows for one `(revision, filter, sort)` triple.
struct Memo {
    revision: u64,
    filter: FilterState,
    sort: Option<SortSpec>,
    rows: Arc<Vec<Entity>>,
    buckets: Vec<Bucket>,
    flag_counts: BTreeMap<String, usize>,
}

/// One list page's worth of state: the collection, how it is loaded, how it is
/// derived into rows and how local edits are reconciled with the backend.
pub struct ListController {
    config: ListConfig,
    engine: FilterEngine,
    transport: Arc<dyn Transport>,
    collection: Mutex<Collection>,
    loader: Loader,
    applier: MutationApplier,
    memo: Mutex<Option<Memo>>,
    error: Mutex<Option<SurfacedError>>,
    loaded: AtomicBool,
    derivations: AtomicU64,
}

impl ListController {
    pub fn new(config: ListConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            engine: FilterEngine::new(&config.searchable),
            loader: Loader::new(&config.endpoint),
            applier: MutationApplier::new(&config.endpoint),
            config,
            transport,
            collection: Mutex::new(Collection::new()),
            memo: Mutex::new(None),
            error: Mutex::new(None),
            loaded: AtomicBool::new(false),
            derivations: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &ListConfig {
        &self.config
    }

    pub fn is_loading(&self) -> bool {
        self.loader.is_loading()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    pub fn last_error(&self) -> Option<SurfacedError> {
        lock(&self.error).clone()
    }

    pub fn clear_error(&self) {
        lock(&self.error).take();
    }

    pub fn len(&self) -> usize {
        lock(&self.collection).len()
    }

    pub fn get(&self, id: &EntityId) -> Option<Entity> {
        lock(&self.collection).get(id).cloned()
    }

    pub fn pending(&self) -> Vec<MutationIntent> {
        self.applier.pending()
    }

    /// Number of times derived rows were recomputed rather than served from
    /// the memo.
    pub fn derivations(&self) -> u64 {
        self.derivations.load(Ordering::SeqCst)
    }

    /// Stops accepting load responses; the view is gone.
    pub fn close(&self) {
        self.loader.close();
    }

    fn surface(&self, kind: ErrorKind, message: String) {
        *lock(&self.error) = Some(SurfacedError { kind, message });
    }

    /// Loads once; later calls are no-ops until `refresh`.
    pub async fn ensure_loaded(&self) -> Result<(), LoadError> {
        if !self.is_loaded() {
            self.refresh().await?;
        }
        Ok(())
    }

    pub async fn refresh(&self) -> Result<LoadOutcome, LoadError> {
        let result = self
            .loader
            .load(self.transport.as_ref(), &self.config, &self.collection)
            .await;
        match &result {
            Ok(LoadOutcome::Applied { .. }) => {
                self.loaded.store(true, Ordering::SeqCst);
                self.clear_error();
            }
            Ok(LoadOutcome::Stale | LoadOutcome::Discarded) => {}
            Err(e) => self.surface(ErrorKind::Load, e.to_string()),
        }
        result
    }

    fn record<T>(&self, result: Result<T, MutationError>) -> Result<T, MutationError> {
        match &result {
            Ok(_) => self.clear_error(),
            Err(MutationError::Validation(e)) => self.surface(ErrorKind::Validation, e.to_string()),
            Err(e) => self.surface(ErrorKind::Mutation, e.to_string()),
        }
        result
    }

    pub async fn update(&self, id: &EntityId, patch: Patch) -> Result<MutationReport, MutationError> {
        let result = self
            .applier
            .update(self.transport.as_ref(), &self.config, &self.collection, id, patch)
            .await;
        self.record(result)
    }

    /// Accepts a canonical code or any known label and stores the code.
    pub async fn set_status(&self, id: &EntityId, status: &str) -> Result<MutationReport, MutationError> {
        let (field, code) = match self.config.status {
            Some(binding) => match binding.catalog.canonicalize(status) {
                Some(code) => (binding.field, code.to_string()),
                None => {
                    return self.record(Err(ValidationError::UnknownStatus(status.to_string()).into()))
                }
            },
            None => (DEFAULT_STATUS_FIELD, status.trim().to_string()),
        };
        let mut patch = Patch::new();
        patch.insert(field.to_string(), Value::String(code));
        self.update(id, patch).await
    }

    /// Flips a boolean flag such as `favorite`. The new value is computed
    /// from the entity as it is once earlier mutations on it have settled.
    pub async fn toggle_flag(&self, id: &EntityId, field: &str) -> Result<MutationReport, MutationError> {
        if !self.config.is_flag(field) {
            return self.record(Err(ValidationError::NotAFlag(field.to_string()).into()));
        }
        let result = self
            .applier
            .update_with(self.transport.as_ref(), &self.config, &self.collection, id, |current| {
                let mut patch = Patch::new();
                patch.insert(field.to_string(), json!(!current.flag(field)));
                Ok(patch)
            })
            .await;
        self.record(result)
    }

    pub async fn delete(&self, id: &EntityId) -> Result<MutationReport, MutationError> {
        let result = self
            .applier
            .delete(self.transport.as_ref(), &self.collection, id)
            .await;
        self.record(result)
    }

    pub async fn create(&self, body: Patch) -> Result<MutationReport, MutationError> {
        let result = self
            .applier
            .create(self.transport.as_ref(), &self.config, &self.collection, body)
            .await;
        self.record(result)
    }

    pub async fn submit(&self, intent: MutationIntent) -> Result<MutationReport, MutationError> {
        let result = self
            .applier
            .submit(self.transport.as_ref(), &self.config, &self.collection, intent)
            .await;
        self.record(result)
    }

    /// Filter -> sort -> bucket, memoized on the collection revision and the
    /// query; pagination and labels are applied per call.
    pub fn view(&self, query: &ViewQuery, locale: Locale) -> ListView {
        let (revision, rows, buckets, flag_counts) = self.derive(&query.filter, query.sort.as_ref());

        let labelled: Vec<ViewRow> = rows.iter().map(|e| self.row(e, locale)).collect();

        ListView {
            resource: self.config.name.clone(),
            query: query.to_query_pairs(),
            page: paginate(&labelled, query.page),
            buckets,
            flag_counts,
            revision,
            loading: self.is_loading(),
            error: self.last_error(),
        }
    }

    fn derive(
        &self,
        filter: &FilterState,
        sort: Option<&SortSpec>,
    ) -> (u64, Arc<Vec<Entity>>, Vec<Bucket>, BTreeMap<String, usize>) {
        let collection = lock(&self.collection);
        let revision = collection.revision();
        let mut memo = lock(&self.memo);

        if let Some(m) = memo.as_ref() {
            if m.revision == revision && &m.filter == filter && m.sort.as_ref() == sort {
                return (revision, m.rows.clone(), m.buckets.clone(), m.flag_counts.clone());
            }
        }

        self.derivations.fetch_add(1, Ordering::SeqCst);
        debug!("Deriving {} view at revision {revision}", self.config.name);

        let filtered = self
            .engine
            .filter(collection.entities(), &filter.search, &filter.facets);
        let projected = project(&filtered, sort, &self.config);

        let buckets = match &self.config.group {
            Some(group) => bucket_counts(&filtered, &group.field, &group.buckets),
            None => Vec::new(),
        };
        let flag_counts: BTreeMap<String, usize> = self
            .config
            .flags
            .iter()
            .map(|flag| (flag.clone(), count_flagged(&filtered, flag)))
            .collect();
        let rows: Arc<Vec<Entity>> = Arc::new(projected.into_iter().cloned().collect());

        *memo = Some(Memo {
            revision,
            filter: filter.clone(),
            sort: sort.cloned(),
            rows: rows.clone(),
            buckets: buckets.clone(),
            flag_counts: flag_counts.clone(),
        });
        (revision, rows, buckets, flag_counts)
    }

    fn row(&self, entity: &Entity, locale: Locale) -> ViewRow {
        let status_label = self.config.status.and_then(|binding| {
            entity
                .str_field(binding.field)
                .map(|code| binding.catalog.label(code, locale))
        });
        ViewRow {
            entity: entity.clone(),
            status_label,
            mutation: self.applier.phase(&entity.id),
        }
    }
}
