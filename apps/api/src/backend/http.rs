use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use super::{AuthObserver, RemoteError, Transport};
use crate::models::entity::{EntityId, Patch};

const MAX_RETRIES: u32 = 3;

/// reqwest-backed transport with bearer-token injection.
///
/// Reads retry on 429 and 5xx with exponential backoff. Writes are sent once:
/// a retried POST could create the record twice.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    token: Arc<RwLock<Option<String>>>,
    auth_observer: Arc<dyn AuthObserver>,
}

impl HttpTransport {
    pub fn new(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
        auth_observer: Arc<dyn AuthObserver>,
    ) -> Result<Self, RemoteError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: Arc::new(RwLock::new(token.filter(|t| !t.is_empty()))),
            auth_observer,
        })
    }

    pub fn set_token(&self, token: Option<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
    }

    pub fn has_token(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn url(&self, endpoint: &str, id: Option<&EntityId>) -> String {
        let endpoint = endpoint.trim_matches('/');
        match id {
            Some(id) => format!("{}/{}/{}", self.base_url, endpoint, id.as_str()),
            None => format!("{}/{}", self.base_url, endpoint),
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let token = self
            .token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Maps the status line and decodes an optional JSON body.
    async fn read_body(&self, response: Response) -> Result<Option<Value>, RemoteError> {
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            self.set_token(None);
            self.auth_observer.on_unauthorized();
            return Err(RemoteError::Unauthorized);
        }

        let body = response.text().await?;

        if !status.is_success() {
            return Err(RemoteError::Status {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        if body.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&body)?))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn list(&self, endpoint: &str) -> Result<Option<Value>, RemoteError> {
        let url = self.url(endpoint, None);
        let mut last_error: Option<RemoteError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 500ms, 1s
                let delay = Duration::from_millis(500 * (1 << (attempt - 1)));
                warn!(
                    "GET {} attempt {} failed, retrying after {}ms...",
                    url,
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = match self.authorize(self.client.get(&url)).send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(RemoteError::Http(e));
                    continue;
                }
            };

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("GET {} returned {}: {}", url, status, body);
                last_error = Some(RemoteError::Status {
                    status: status.as_u16(),
                    message: error_message(&body),
                });
                continue;
            }

            let body = self.read_body(response).await?;
            debug!("GET {} succeeded", url);
            return Ok(body);
        }

        Err(last_error.unwrap_or(RemoteError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }

    async fn update(
        &self,
        endpoint: &str,
        id: &EntityId,
        patch: &Patch,
    ) -> Result<Option<Value>, RemoteError> {
        let url = self.url(endpoint, Some(id));
        let response = self
            .authorize(self.client.patch(&url))
            .json(patch)
            .send()
            .await?;
        self.read_body(response).await
    }

    async fn delete(&self, endpoint: &str, id: &EntityId) -> Result<(), RemoteError> {
        let url = self.url(endpoint, Some(id));
        let response = self.authorize(self.client.delete(&url)).send().await?;
        self.read_body(response).await.map(|_| ())
    }

    async fn create(&self, endpoint: &str, body: &Patch) -> Result<Option<Value>, RemoteError> {
        let url = self.url(endpoint, None);
        let response = self
            .authorize(self.client.post(&url))
            .json(body)
            .send()
            .await?;
        self.read_body(response).await
    }
}

/// Pulls a human-readable message out of an upstream error body.
/// Accepts `{"message": ..}`, `{"error": ".."}` and `{"error": {"message": ..}}`.
fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return body.trim().to_string();
    };
    value
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| value.get("error").and_then(Value::as_str))
        .or_else(|| {
            value
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
        })
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string())
}
