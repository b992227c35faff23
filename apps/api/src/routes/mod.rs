pub mod health;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::listing::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // List views
        .route("/api/v1/views", get(handlers::handle_list_resources))
        .route(
            "/api/v1/views/:resource",
            get(handlers::handle_get_view).post(handlers::handle_create),
        )
        .route(
            "/api/v1/views/:resource/refresh",
            post(handlers::handle_refresh),
        )
        .route(
            "/api/v1/views/:resource/mutations",
            post(handlers::handle_submit),
        )
        .route(
            "/api/v1/views/:resource/:id",
            get(handlers::handle_get_entity)
                .patch(handlers::handle_update)
                .delete(handlers::handle_delete),
        )
        .route(
            "/api/v1/views/:resource/:id/status",
            patch(handlers::handle_set_status),
        )
        .route(
            "/api/v1/views/:resource/:id/flags/:flag",
            post(handlers::handle_toggle_flag),
        )
        .with_state(state)
}
