use std::sync::Arc;

use crate::config::Config;
use crate::listing::ViewRegistry;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// One list controller per resource; each owns its own collection.
    pub views: Arc<ViewRegistry>,
}
