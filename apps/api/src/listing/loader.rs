use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::backend::{RemoteError, Transport};
use crate::listing::collection::{lock, Collection};
use crate::listing::config::ListConfig;
use crate::models::entity::{Entity, EntityId};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to load {endpoint}: {source}")]
    Remote {
        endpoint: String,
        #[source]
        source: RemoteError,
    },

    #[error("Malformed payload from {endpoint}: {reason}")]
    Malformed { endpoint: String, reason: String },

    #[error("Duplicate id '{id}' in payload from {endpoint}")]
    DuplicateId { endpoint: String, id: EntityId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LoadOutcome {
    /// The response replaced the collection.
    Applied { count: usize },
    /// A newer load was issued while this one was in flight; response dropped.
    Stale,
    /// The view was closed; nothing was touched.
    Discarded,
}

/// Fetches one collection endpoint and swaps the result into the view.
///
/// Each call takes a generation number. Only the response to the most
/// recently issued call may replace the collection, so a slow stale response
/// can never overwrite a newer one.
#[derive(Debug)]
pub struct Loader {
    endpoint: String,
    generation: AtomicU64,
    in_flight: AtomicUsize,
    closed: AtomicBool,
}

/// Holds the loading flag for the duration of one call.
struct LoadingGuard<'a>(&'a AtomicUsize);

impl<'a> LoadingGuard<'a> {
    fn acquire(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Loader {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            generation: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    /// Marks the view as gone. Responses still in flight are discarded.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// On failure the previous collection is left untouched.
    pub async fn load(
        &self,
        transport: &dyn Transport,
        config: &ListConfig,
        target: &Mutex<Collection>,
    ) -> Result<LoadOutcome, LoadError> {
        let _loading = LoadingGuard::acquire(&self.in_flight);
        if self.is_closed() {
            return Ok(LoadOutcome::Discarded);
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Loading {} (generation {generation})", self.endpoint);

        let response = transport.list(&self.endpoint).await;

        if self.is_closed() {
            debug!("Dropping response for closed view {}", self.endpoint);
            return Ok(LoadOutcome::Discarded);
        }
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(
                "Dropping stale response for {} (generation {generation})",
                self.endpoint
            );
            return Ok(LoadOutcome::Stale);
        }

        let payload = response.map_err(|source| {
            warn!("Load of {} failed: {source}", self.endpoint);
            LoadError::Remote {
                endpoint: self.endpoint.clone(),
                source,
            }
        })?;

        let entities = decode_collection(payload, config).map_err(|e| match e {
            DecodeError::Malformed(reason) => LoadError::Malformed {
                endpoint: self.endpoint.clone(),
                reason,
            },
            DecodeError::DuplicateId(id) => LoadError::DuplicateId {
                endpoint: self.endpoint.clone(),
                id,
            },
        })?;

        let count = entities.len();
        lock(target).replace_all(entities);
        info!("Loaded {count} rows from {}", self.endpoint);
        Ok(LoadOutcome::Applied { count })
    }
}

#[derive(Debug, PartialEq)]
pub enum DecodeError {
    Malformed(String),
    DuplicateId(EntityId),
}

/// Turns a list response into entities. An absent or `null` body is an
/// empty collection.
pub fn decode_collection(
    payload: Option<Value>,
    config: &ListConfig,
) -> Result<Vec<Entity>, DecodeError> {
    let items = match payload {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(DecodeError::Malformed(format!(
                "expected a JSON array, got {}",
                json_kind(&other)
            )))
        }
    };

    let mut entities = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let mut entity = Entity::from_value(item).ok_or_else(|| {
            DecodeError::Malformed(format!("element {index} is not an object with an id"))
        })?;
        normalize_status(&mut entity, config);
        entities.push(entity);
    }

    Collection::check_unique(&entities).map_err(DecodeError::DuplicateId)?;
    Ok(entities)
}

/// Rewrites a legacy status literal (e.g. a stored Arabic label) to its
/// canonical code. Unknown values are left alone.
pub fn normalize_status(entity: &mut Entity, config: &ListConfig) {
    let Some(binding) = config.status else {
        return;
    };
    let Some(raw) = entity.str_field(binding.field) else {
        return;
    };
    if let Some(code) = binding.catalog.canonicalize(raw) {
        if code != raw {
            entity
                .fields
                .insert(binding.field.to_string(), Value::String(code.to_string()));
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::CANDIDATE_STATUS;
    use crate::testing::FakeTransport;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn config() -> ListConfig {
        ListConfig::builder("candidates", "/candidates")
            .status("status", &CANDIDATE_STATUS)
            .build()
    }

    fn ids(target: &Mutex<Collection>) -> Vec<String> {
        lock(target)
            .entities()
            .iter()
            .map(|e| e.id.to_string())
            .collect()
    }

    #[test]
    fn test_decode_empty_payloads() {
        assert!(decode_collection(None, &config()).unwrap().is_empty());
        assert!(decode_collection(Some(Value::Null), &config())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_decode_rejects_non_array_and_missing_ids() {
        assert!(matches!(
            decode_collection(Some(json!({"data": []})), &config()),
            Err(DecodeError::Malformed(_))
        ));
        assert!(matches!(
            decode_collection(Some(json!([{"name": "x"}])), &config()),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_rejects_duplicate_ids() {
        let payload = json!([{"id": 1}, {"id": "1"}]);
        assert_eq!(
            decode_collection(Some(payload), &config()),
            Err(DecodeError::DuplicateId(EntityId::from("1")))
        );
    }

    #[test]
    fn test_decode_canonicalizes_legacy_status() {
        let payload = json!([
            {"id": "1", "status": "مقبول"},
            {"id": "2", "status": "new"},
            {"id": "3", "status": "SOMETHING_ELSE"}
        ]);
        let entities = decode_collection(Some(payload), &config()).unwrap();
        let statuses: Vec<_> = entities
            .iter()
            .map(|e| e.str_field("status").unwrap())
            .collect();
        assert_eq!(statuses, ["ACCEPTED", "NEW", "SOMETHING_ELSE"]);
    }

    #[tokio::test]
    async fn test_load_replaces_collection_and_resets_loading() {
        let transport = FakeTransport::new();
        transport.push_list(Ok(Some(json!([{"id": "1"}, {"id": "2"}]))));
        let loader = Loader::new("/candidates");
        let target = Mutex::new(Collection::new());

        let outcome = loader.load(&transport, &config(), &target).await.unwrap();
        assert_eq!(outcome, LoadOutcome::Applied { count: 2 });
        assert_eq!(ids(&target), ["1", "2"]);
        assert!(!loader.is_loading());
    }

    #[tokio::test]
    async fn test_failed_load_keeps_previous_collection() {
        let transport = FakeTransport::new();
        transport.push_list(Ok(Some(json!([{"id": "1"}]))));
        transport.push_list(Err(FakeTransport::server_error()));
        let loader = Loader::new("/candidates");
        let target = Mutex::new(Collection::new());

        loader.load(&transport, &config(), &target).await.unwrap();
        let err = loader.load(&transport, &config(), &target).await.unwrap_err();
        assert!(matches!(err, LoadError::Remote { .. }));
        assert_eq!(ids(&target), ["1"]);
        assert!(!loader.is_loading());
    }

    #[tokio::test]
    async fn test_empty_body_clears_to_empty_collection() {
        let transport = FakeTransport::new();
        transport.push_list(Ok(Some(json!([{"id": "1"}]))));
        transport.push_list(Ok(None));
        let loader = Loader::new("/candidates");
        let target = Mutex::new(Collection::new());

        loader.load(&transport, &config(), &target).await.unwrap();
        let outcome = loader.load(&transport, &config(), &target).await.unwrap();
        assert_eq!(outcome, LoadOutcome::Applied { count: 0 });
        assert_eq!(lock(&target).len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_response_is_discarded() {
        let transport = Arc::new(FakeTransport::new());
        // First call answers slowly, second quickly.
        transport.push_list_delayed(Ok(Some(json!([{"id": "old"}]))), Duration::from_secs(5));
        transport.push_list_delayed(Ok(Some(json!([{"id": "new"}]))), Duration::from_secs(1));
        let loader = Arc::new(Loader::new("/candidates"));
        let target = Arc::new(Mutex::new(Collection::new()));

        let slow = {
            let (transport, loader, target) = (transport.clone(), loader.clone(), target.clone());
            tokio::spawn(async move { loader.load(transport.as_ref(), &config(), &target).await })
        };
        tokio::task::yield_now().await;
        let fast = loader.load(transport.as_ref(), &config(), &target).await.unwrap();
        assert_eq!(fast, LoadOutcome::Applied { count: 1 });
        assert!(loader.is_loading());

        let slow = slow.await.unwrap().unwrap();
        assert_eq!(slow, LoadOutcome::Stale);
        assert_eq!(ids(&target), ["new"]);
        assert!(!loader.is_loading());
    }

    #[tokio::test]
    async fn test_closed_loader_discards_without_fetching() {
        let transport = FakeTransport::new();
        let loader = Loader::new("/candidates");
        let target = Mutex::new(Collection::new());
        loader.close();

        let outcome = loader.load(&transport, &config(), &target).await.unwrap();
        assert_eq!(outcome, LoadOutcome::Discarded);
        assert_eq!(transport.calls().len(), 0);
        assert!(!loader.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_while_in_flight_discards_response() {
        let transport = Arc::new(FakeTransport::new());
        transport.push_list_delayed(Ok(Some(json!([{"id": "1"}]))), Duration::from_secs(2));
        let loader = Arc::new(Loader::new("/candidates"));
        let target = Arc::new(Mutex::new(Collection::new()));

        let pending = {
            let (transport, loader, target) = (transport.clone(), loader.clone(), target.clone());
            tokio::spawn(async move { loader.load(transport.as_ref(), &config(), &target).await })
        };
        tokio::task::yield_now().await;
        loader.close();

        assert_eq!(pending.await.unwrap().unwrap(), LoadOutcome::Discarded);
        assert_eq!(lock(&target).len(), 0);
    }
}
