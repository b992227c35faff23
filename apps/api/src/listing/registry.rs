use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::backend::Transport;
use crate::listing::controller::{ListController, SurfacedError};
use crate::listing::presets::Resource;

#[derive(Debug, Clone, Serialize)]
pub struct ResourceStatus {
    pub resource: Resource,
    pub loaded: bool,
    pub loading: bool,
    pub rows: usize,
    pub pending_mutations: usize,
    /// Times the derived rows were recomputed instead of served from the memo.
    pub derivations: u64,
    pub error: Option<SurfacedError>,
}

/// One controller per resource. Views are independent: nothing is shared
/// between them except the transport.
pub struct ViewRegistry {
    controllers: BTreeMap<Resource, Arc<ListController>>,
}

impl ViewRegistry {
    pub fn new(transport: Arc<dyn Transport>, per_page: usize) -> Self {
        let controllers = Resource::ALL
            .into_iter()
            .map(|resource| {
                let controller = ListController::new(resource.config(per_page), transport.clone());
                (resource, Arc::new(controller))
            })
            .collect();
        info!("View registry initialized with {} resources", Resource::ALL.len());
        Self { controllers }
    }

    pub fn get(&self, resource: Resource) -> Option<Arc<ListController>> {
        self.controllers.get(&resource).cloned()
    }

    pub fn statuses(&self) -> Vec<ResourceStatus> {
        self.controllers
            .iter()
            .map(|(resource, controller)| ResourceStatus {
                resource: *resource,
                loaded: controller.is_loaded(),
                loading: controller.is_loading(),
                rows: controller.len(),
                pending_mutations: controller.pending().len(),
                derivations: controller.derivations(),
                error: controller.last_error(),
            })
            .collect()
    }

    /// Shutdown: responses still in flight are dropped.
    pub fn close_all(&self) {
        for controller in self.controllers.values() {
            controller.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTransport;

    #[tokio::test]
    async fn test_registry_holds_every_resource() {
        let registry = ViewRegistry::new(Arc::new(FakeTransport::new()), 20);
        let statuses = registry.statuses();
        assert_eq!(statuses.len(), Resource::ALL.len());
        assert!(statuses.iter().all(|s| !s.loaded && s.rows == 0));
    }

    #[tokio::test]
    async fn test_closed_registry_discards_loads() {
        let transport = Arc::new(FakeTransport::new());
        let registry = ViewRegistry::new(transport.clone(), 20);
        registry.close_all();
        let controller = registry.get(Resource::Jobs).unwrap();
        controller.refresh().await.unwrap();
        assert!(!controller.is_loaded());
        assert!(transport.calls().is_empty());
    }
}
