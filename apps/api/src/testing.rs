//! In-memory transport for controller and handler tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::oneshot;

use crate::backend::{RemoteError, Transport};
use crate::listing::collection::lock;
use crate::models::entity::{EntityId, Patch};

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub method: &'static str,
    pub endpoint: String,
    pub id: Option<String>,
    pub body: Option<Value>,
}

struct Scripted<T> {
    result: Result<T, RemoteError>,
    delay: Option<Duration>,
    gate: Option<oneshot::Receiver<()>>,
}

impl<T> Scripted<T> {
    fn now(result: Result<T, RemoteError>) -> Self {
        Self {
            result,
            delay: None,
            gate: None,
        }
    }

    async fn resolve(self) -> Result<T, RemoteError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(gate) = self.gate {
            let _ = gate.await;
        }
        self.result
    }
}

/// Scripted responses are consumed in call order per method. With nothing
/// scripted, calls succeed: lists are empty, creates echo the body with a
/// generated id.
#[derive(Default)]
pub struct FakeTransport {
    lists: Mutex<VecDeque<Scripted<Option<Value>>>>,
    updates: Mutex<VecDeque<Scripted<Option<Value>>>>,
    deletes: Mutex<VecDeque<Scripted<()>>>,
    creates: Mutex<VecDeque<Scripted<Option<Value>>>>,
    calls: Mutex<Vec<Call>>,
    next_id: AtomicU64,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn server_error() -> RemoteError {
        RemoteError::Status {
            status: 500,
            message: "boom".to_string(),
        }
    }

    pub fn push_list(&self, result: Result<Option<Value>, RemoteError>) {
        lock(&self.lists).push_back(Scripted::now(result));
    }

    pub fn push_list_delayed(&self, result: Result<Option<Value>, RemoteError>, delay: Duration) {
        lock(&self.lists).push_back(Scripted {
            result,
            delay: Some(delay),
            gate: None,
        });
    }

    pub fn push_update(&self, result: Result<Option<Value>, RemoteError>) {
        lock(&self.updates).push_back(Scripted::now(result));
    }

    /// The update call blocks until the returned sender fires (or is dropped).
    pub fn push_update_gated(&self, result: Result<Option<Value>, RemoteError>) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        lock(&self.updates).push_back(Scripted {
            result,
            delay: None,
            gate: Some(rx),
        });
        tx
    }

    pub fn push_delete(&self, result: Result<(), RemoteError>) {
        lock(&self.deletes).push_back(Scripted::now(result));
    }

    pub fn push_delete_gated(&self, result: Result<(), RemoteError>) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        lock(&self.deletes).push_back(Scripted {
            result,
            delay: None,
            gate: Some(rx),
        });
        tx
    }

    pub fn push_create(&self, result: Result<Option<Value>, RemoteError>) {
        lock(&self.creates).push_back(Scripted::now(result));
    }

    pub fn calls(&self) -> Vec<Call> {
        lock(&self.calls).clone()
    }

    pub fn calls_of(&self, method: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.method == method)
            .collect()
    }

    fn record(&self, method: &'static str, endpoint: &str, id: Option<&EntityId>, body: Option<&Patch>) {
        lock(&self.calls).push(Call {
            method,
            endpoint: endpoint.to_string(),
            id: id.map(|id| id.to_string()),
            body: body.map(|b| Value::Object(b.clone())),
        });
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn list(&self, endpoint: &str) -> Result<Option<Value>, RemoteError> {
        self.record("GET", endpoint, None, None);
        let scripted = lock(&self.lists).pop_front();
        match scripted {
            Some(s) => s.resolve().await,
            None => Ok(Some(json!([]))),
        }
    }

    async fn update(
        &self,
        endpoint: &str,
        id: &EntityId,
        patch: &Patch,
    ) -> Result<Option<Value>, RemoteError> {
        self.record("PATCH", endpoint, Some(id), Some(patch));
        let scripted = lock(&self.updates).pop_front();
        match scripted {
            Some(s) => s.resolve().await,
            None => Ok(None),
        }
    }

    async fn delete(&self, endpoint: &str, id: &EntityId) -> Result<(), RemoteError> {
        self.record("DELETE", endpoint, Some(id), None);
        let scripted = lock(&self.deletes).pop_front();
        match scripted {
            Some(s) => s.resolve().await,
            None => Ok(()),
        }
    }

    async fn create(&self, endpoint: &str, body: &Patch) -> Result<Option<Value>, RemoteError> {
        self.record("POST", endpoint, None, Some(body));
        let scripted = lock(&self.creates).pop_front();
        match scripted {
            Some(s) => s.resolve().await,
            None => {
                let mut created = body.clone();
                let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
                created.insert("id".to_string(), json!(format!("srv-{n}")));
                Ok(Some(Value::Object(created)))
            }
        }
    }
}
