use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::auth::{authenticate, AuthUser};
use crate::models::ReviewLogEntry;
use crate::response::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct SubmitReviewRequest {
    quality: i64,
    #[serde(default)]
    review_duration: i64,
    #[serde(default)]
    mode: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueueQuery {
    graph_id: Option<String>,
    mode: Option<String>,
    limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct GraphQuery {
    graph_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<i64>,
}

#[derive(Debug, Serialize)]
struct HistoryResponse {
    node_id: String,
    total: usize,
    logs: Vec<ReviewLogEntry>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/queue", get(get_queue))
        .route("/statistics", get(get_statistics))
        .route("/forgetting-index/:node_id", get(get_forgetting_index))
        .route("/history/:node_id", get(get_history))
        .route("/:node_id", post(submit_review))
}

async fn submit_review(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(node_id): Path<String>,
    payload: Result<Json<SubmitReviewRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let user = require_user(&state, &headers).await?;
    let Json(payload) = payload?;
    let result = state
        .reviews()
        .record_review(
            &user.id,
            node_id.trim(),
            payload.quality,
            payload.review_duration,
            payload.mode.as_deref(),
        )
        .await?;
    Ok(Json(result))
}

async fn get_queue(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<QueueQuery>,
) -> Result<impl IntoResponse, AppError> {
    let user = require_user(&state, &headers).await?;
    let limit = query.limit.unwrap_or(state.default_queue_limit());
    let queue = state
        .reviews()
        .build_queue(
            &user.id,
            non_empty(query.graph_id.as_deref()),
            query.mode.as_deref(),
            Some(limit),
        )
        .await?;
    Ok(Json(queue))
}

async fn get_statistics(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<GraphQuery>,
) -> Result<impl IntoResponse, AppError> {
    let user = require_user(&state, &headers).await?;
    let report = state
        .reviews()
        .statistics(&user.id, non_empty(query.graph_id.as_deref()))
        .await?;
    Ok(Json(report))
}

async fn get_forgetting_index(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(node_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user = require_user(&state, &headers).await?;
    let lookup = state
        .reviews()
        .forgetting_index(&user.id, node_id.trim())
        .await?;
    Ok(Json(lookup.report()))
}

async fn get_history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(node_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, AppError> {
    let user = require_user(&state, &headers).await?;
    let node_id = node_id.trim().to_string();
    let logs = state
        .reviews()
        .review_history(&user.id, &node_id, query.limit)
        .await?;
    Ok(Json(HistoryResponse {
        node_id,
        total: logs.len(),
        logs,
    }))
}

async fn require_user(state: &AppState, headers: &HeaderMap) -> Result<AuthUser, AppError> {
    Ok(authenticate(state.db().pool(), headers).await?)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
