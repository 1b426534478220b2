//! Library view handlers: item list, item detail, dashboard

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::models::LibraryStats;
use crate::services::library::{self, ItemDetail, ItemPage};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
}

/// GET /items?page=N
pub async fn list_items(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<ItemPage>> {
    let page = library::list_items(&state.db, query.page.unwrap_or(1), state.config.page_size).await?;
    Ok(Json(page))
}

/// GET /items/:id
pub async fn item_detail(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<ItemDetail>> {
    Ok(Json(library::item_detail(&state.db, id).await?))
}

/// GET /dashboard
pub async fn dashboard(State(state): State<AppState>) -> ApiResult<Json<LibraryStats>> {
    let stats = library::library_stats(&state.db, playlog_common::time::now()).await?;
    Ok(Json(stats))
}

pub fn library_routes() -> Router<AppState> {
    Router::new()
        .route("/items", get(list_items))
        .route("/items/:id", get(item_detail))
        .route("/dashboard", get(dashboard))
}
