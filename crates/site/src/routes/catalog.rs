//! Catalog query API routes.
//!
//! REST endpoints for browsing catalogs: listing, metadata, queries, facets
//! and reloads.

use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use mspsrpi_engine::{BucketScheme, CatalogQuery, FacetCount};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::{CatalogDefinition, CatalogPage, CatalogSummary, params};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Create the catalog router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/catalogs", get(list_catalogs))
        .route("/api/catalog/{id}", get(get_catalog))
        .route("/api/catalog/{id}/query", get(query_catalog).post(query_catalog_json))
        .route("/api/catalog/{id}/facets/{field}", get(catalog_facets))
        .route("/api/catalog/{id}/reload", post(reload_catalog))
}

// -------------------------------------------------------------------------
// Response types
// -------------------------------------------------------------------------

#[derive(Serialize)]
struct CatalogResponse {
    #[serde(flatten)]
    definition: CatalogDefinition,
    /// Schemes behind the derived fields, for rendering bucket selectors.
    bucket_schemes: Vec<BucketScheme>,
    records: usize,
    generation: u64,
    loaded_at: Option<DateTime<Utc>>,
    load_error: Option<String>,
}

#[derive(Serialize)]
struct FacetResponse {
    catalog: String,
    field: String,
    values: Vec<FacetCount>,
}

#[derive(Serialize)]
struct ReloadResponse {
    catalog: String,
    records: usize,
    generation: u64,
    loaded_at: Option<DateTime<Utc>>,
    load_error: Option<String>,
}

// -------------------------------------------------------------------------
// Request types
// -------------------------------------------------------------------------

#[derive(Deserialize)]
struct QueryRequest {
    #[serde(flatten)]
    query: CatalogQuery,
    /// Column header clicked since `query.sort` was chosen.
    #[serde(default)]
    toggle: Option<String>,
}

// -------------------------------------------------------------------------
// Handlers
// -------------------------------------------------------------------------

async fn list_catalogs(State(state): State<AppState>) -> Json<Vec<CatalogSummary>> {
    Json(state.catalogs().list())
}

async fn get_catalog(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<CatalogResponse>> {
    let catalogs = state.catalogs();
    let definition = catalogs
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("unknown catalog: {id}")))?;
    let snapshot = catalogs
        .snapshot(&id)
        .ok_or_else(|| AppError::NotFound(format!("unknown catalog: {id}")))?;
    let bucket_schemes = catalogs.derived_schemes(&id)?;

    Ok(Json(CatalogResponse {
        definition: (*definition).clone(),
        bucket_schemes,
        records: snapshot.records.len(),
        generation: snapshot.generation,
        loaded_at: snapshot.loaded_at,
        load_error: snapshot.load_error.clone(),
    }))
}

async fn query_catalog(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> AppResult<Json<CatalogPage>> {
    let catalogs = state.catalogs();
    let definition = catalogs
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("unknown catalog: {id}")))?;

    let query = params::parse(&pairs, definition.page_size)?
        .into_query(definition.default_sort.as_ref());

    Ok(Json(catalogs.query(&id, query)?))
}

async fn query_catalog_json(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<Value>,
) -> AppResult<Json<CatalogPage>> {
    let catalogs = state.catalogs();
    let definition = catalogs
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("unknown catalog: {id}")))?;

    let has_page_size = request
        .get("page")
        .and_then(|p| p.get("size"))
        .is_some();
    let request: QueryRequest =
        serde_json::from_value(request).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let mut query = request.query;
    if !has_page_size {
        query.page.size = definition.page_size;
    }
    if let Some(clicked) = request.toggle {
        let current = query.sort.clone().or_else(|| definition.default_sort.clone());
        query.sort = Some(mspsrpi_engine::toggle_sort(current.as_ref(), &clicked));
    }

    Ok(Json(catalogs.query(&id, query)?))
}

async fn catalog_facets(
    State(state): State<AppState>,
    Path((id, field)): Path<(String, String)>,
) -> AppResult<Json<FacetResponse>> {
    let values = state.catalogs().facets(&id, &field)?;
    Ok(Json(FacetResponse {
        catalog: id,
        field,
        values,
    }))
}

async fn reload_catalog(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ReloadResponse>> {
    let snapshot = state.catalogs().reload(&id).await?;
    Ok(Json(ReloadResponse {
        catalog: id,
        records: snapshot.records.len(),
        generation: snapshot.generation,
        loaded_at: snapshot.loaded_at,
        load_error: snapshot.load_error.clone(),
    }))
}
