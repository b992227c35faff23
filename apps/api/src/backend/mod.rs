/// Remote transport — the only way list controllers reach the upstream REST backend.
///
/// Controllers receive an `Arc<dyn Transport>` at construction, so the HTTP
/// client, its credentials and the 401 side effect stay outside the list logic.
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::models::entity::{EntityId, Patch};

pub mod http;

pub use http::HttpTransport;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream error (status {status}): {message}")]
    Status { status: u16, message: String },

    #[error("Upstream rejected the credentials")]
    Unauthorized,

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },
}

impl RemoteError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Unauthorized => Some(401),
            _ => None,
        }
    }
}

/// Generic CRUD surface of one upstream collection endpoint.
///
/// Bodies are optional because the backend is allowed to answer 2xx with no
/// content; callers decide what an absent body means.
#[async_trait]
pub trait Transport: Send + Sync {
    /// `GET {endpoint}`
    async fn list(&self, endpoint: &str) -> Result<Option<Value>, RemoteError>;

    /// `PATCH {endpoint}/{id}`
    async fn update(
        &self,
        endpoint: &str,
        id: &EntityId,
        patch: &Patch,
    ) -> Result<Option<Value>, RemoteError>;

    /// `DELETE {endpoint}/{id}`
    async fn delete(&self, endpoint: &str, id: &EntityId) -> Result<(), RemoteError>;

    /// `POST {endpoint}`
    async fn create(&self, endpoint: &str, body: &Patch) -> Result<Option<Value>, RemoteError>;
}

/// Told when the upstream answers 401. The front-end owns the actual
/// redirect-to-login; the service only needs to stop sending the dead token.
pub trait AuthObserver: Send + Sync {
    fn on_unauthorized(&self);
}

/// Default observer: a warning in the log.
pub struct LogAuthObserver;

impl AuthObserver for LogAuthObserver {
    fn on_unauthorized(&self) {
        warn!("Upstream returned 401; stored backend token cleared");
    }
}
