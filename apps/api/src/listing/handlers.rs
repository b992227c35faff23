use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::AppError;
use crate::labels::Locale;
use crate::listing::controller::{ListController, ListView};
use crate::listing::loader::{LoadError, LoadOutcome};
use crate::listing::mutation::MutationReport;
use crate::listing::presets::Resource;
use crate::listing::registry::ResourceStatus;
use crate::models::entity::{Entity, EntityId, Patch};
use crate::models::mutation::{MutationIntent, MutationKind};
use crate::state::AppState;

const LOCALE_PARAM: &str = "locale";

#[derive(Serialize)]
pub struct RefreshResponse {
    #[serde(flatten)]
    pub outcome: LoadOutcome,
    pub rows: usize,
}

#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

fn controller(state: &AppState, resource: &str) -> Result<Arc<ListController>, AppError> {
    let resource: Resource = resource.parse().map_err(AppError::NotFound)?;
    state
        .views
        .get(resource)
        .ok_or_else(|| AppError::NotFound(format!("No view registered for '{resource}'")))
}

/// Mutations need the collection present so the optimistic step has a row to edit.
async fn loaded(state: &AppState, resource: &str) -> Result<Arc<ListController>, AppError> {
    let controller = controller(state, resource)?;
    controller.ensure_loaded().await?;
    Ok(controller)
}

fn locale(params: &[(String, String)]) -> Result<Locale, AppError> {
    match params.iter().find(|(k, _)| k == LOCALE_PARAM) {
        Some((_, raw)) => Locale::parse(raw)
            .ok_or_else(|| AppError::Validation(format!("Unsupported locale '{raw}'"))),
        None => Ok(Locale::default()),
    }
}

/// GET /api/v1/views
pub async fn handle_list_resources(State(state): State<AppState>) -> Json<Vec<ResourceStatus>> {
    Json(state.views.statuses())
}

/// GET /api/v1/views/:resource
///
/// A failed first load still renders: the view comes back empty with its
/// `error` set, except for an expired session which is returned as 401.
pub async fn handle_get_view(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<ListView>, AppError> {
    let controller = controller(&state, &resource)?;
    let locale = locale(&params)?;
    let query = controller
        .config()
        .parse_query(params.iter().map(|(k, v)| (k.as_str(), v.as_str())))?;

    if let Err(e) = controller.ensure_loaded().await {
        if matches!(e, LoadError::Remote { ref source, .. } if source.status() == Some(401)) {
            return Err(e.into());
        }
        warn!("Serving {resource} view without data: {e}");
    }

    Ok(Json(controller.view(&query, locale)))
}

/// POST /api/v1/views/:resource/refresh
pub async fn handle_refresh(
    State(state): State<AppState>,
    Path(resource): Path<String>,
) -> Result<Json<RefreshResponse>, AppError> {
    let controller = controller(&state, &resource)?;
    let outcome = controller.refresh().await?;
    Ok(Json(RefreshResponse {
        outcome,
        rows: controller.len(),
    }))
}

/// POST /api/v1/views/:resource
pub async fn handle_create(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    Json(body): Json<Patch>,
) -> Result<(StatusCode, Json<MutationReport>), AppError> {
    let controller = loaded(&state, &resource).await?;
    let report = controller.create(body).await?;
    Ok((StatusCode::CREATED, Json(report)))
}

/// GET /api/v1/views/:resource/:id
pub async fn handle_get_entity(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
) -> Result<Json<Entity>, AppError> {
    let controller = loaded(&state, &resource).await?;
    let id = EntityId::new(id);
    controller
        .get(&id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No {resource} with id '{id}'")))
}

/// PATCH /api/v1/views/:resource/:id
pub async fn handle_update(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
    Json(patch): Json<Patch>,
) -> Result<Json<MutationReport>, AppError> {
    let controller = loaded(&state, &resource).await?;
    let report = controller.update(&EntityId::new(id), patch).await?;
    Ok(Json(report))
}

/// PATCH /api/v1/views/:resource/:id/status
pub async fn handle_set_status(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<MutationReport>, AppError> {
    let controller = loaded(&state, &resource).await?;
    let report = controller.set_status(&EntityId::new(id), &req.status).await?;
    Ok(Json(report))
}

/// POST /api/v1/views/:resource/:id/flags/:flag
pub async fn handle_toggle_flag(
    State(state): State<AppState>,
    Path((resource, id, flag)): Path<(String, String, String)>,
) -> Result<Json<MutationReport>, AppError> {
    let controller = loaded(&state, &resource).await?;
    let report = controller.toggle_flag(&EntityId::new(id), &flag).await?;
    Ok(Json(report))
}

/// DELETE /api/v1/views/:resource/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
) -> Result<Json<MutationReport>, AppError> {
    let controller = loaded(&state, &resource).await?;
    let report = controller.delete(&EntityId::new(id)).await?;
    Ok(Json(report))
}

/// POST /api/v1/views/:resource/mutations
///
/// Generic form of the endpoints above, for clients that queue intents.
pub async fn handle_submit(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    Json(intent): Json<MutationIntent>,
) -> Result<(StatusCode, Json<MutationReport>), AppError> {
    let controller = loaded(&state, &resource).await?;
    let status = match intent.kind {
        MutationKind::Create => StatusCode::CREATED,
        MutationKind::Update | MutationKind::Delete => StatusCode::OK,
    };
    let report = controller.submit(intent).await?;
    Ok((status, Json(report)))
}
