//! HTTP routes exposing the module's declarations.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tracing::warn;

use crate::declare::DeclarationIndex;

#[derive(Debug, Serialize)]
struct DeclarationSummary {
    id: String,
    label: String,
    component: String,
}

pub(super) fn router(index: Arc<DeclarationIndex>) -> Router {
    Router::new()
        .route("/declarations", get(list_declarations))
        .route("/declarations/{id}", get(get_declaration))
        .with_state(index)
}

async fn list_declarations(State(index): State<Arc<DeclarationIndex>>) -> Json<Vec<DeclarationSummary>> {
    let summaries = index
        .nodes()
        .iter()
        .map(|node| DeclarationSummary {
            id: node.node_id().to_string(),
            label: node.label().to_string(),
            component: node.component_name().to_string(),
        })
        .collect();
    Json(summaries)
}

async fn get_declaration(
    State(index): State<Arc<DeclarationIndex>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let node = index.get(&id).ok_or(StatusCode::NOT_FOUND)?;
    let block = node.block();
    serde_json::to_value(&*block).map(Json).map_err(|e| {
        warn!(node_id = %id, error = %e, "failed to encode declaration");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}
