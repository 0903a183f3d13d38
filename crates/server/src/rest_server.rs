//! REST API server implementation using Axum
//!
//! This module provides the REST API server with OpenAPI documentation,
//! exposing a [`ReconciliationEngine`] over the reconciliation wire
//! protocol (spec §6: batch reconcile, properties, preview/flyout, suggest
//! endpoints, metadata).

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use reconcile_core::error::Error as CoreError;
use reconcile_core::search_models::{
    BatchRequest, BatchResponse, PreviewResponse, PropertiesResponse, ServiceMetadata,
    SuggestEntityResult, SuggestPropertyResult, SuggestTypeResult,
};
use reconcile_engine::ReconciliationEngine;
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::{IntoParams, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ReconciliationEngine>,
}

/// Build the Axum router with all endpoints.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/reconcile", post(reconcile_handler))
        .route("/properties", get(properties_handler))
        .route("/preview", get(preview_handler))
        .route("/flyout", get(flyout_handler))
        .route("/suggest/entity", get(suggest_entity_handler))
        .route("/suggest/type", get(suggest_type_handler))
        .route("/suggest/property", get(suggest_property_handler))
        .route("/metadata", get(metadata_handler))
        .route("/health", get(health_handler))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// POST /reconcile
#[utoipa::path(
    post,
    path = "/reconcile",
    responses(
        (status = 200, description = "Batch reconciliation results, keyed by request key"),
    ),
    tag = "reconcile"
)]
async fn reconcile_handler(
    State(state): State<AppState>,
    Json(batch): Json<BatchRequest>,
) -> Json<BatchResponse> {
    Json(state.engine.reconcile(batch).await)
}

#[derive(Debug, Deserialize, IntoParams)]
struct EntityTypeQuery {
    #[serde(rename = "type", default)]
    entity_type: Option<String>,
    #[serde(default)]
    query: Option<String>,
}

/// GET /properties
#[utoipa::path(
    get,
    path = "/properties",
    params(EntityTypeQuery),
    responses(
        (status = 200, description = "Property descriptors for an entity type", body = [reconcile_core::entities::PropertyDescriptor]),
        (status = 404, description = "Unknown entity type"),
    ),
    tag = "properties"
)]
async fn properties_handler(
    State(state): State<AppState>,
    Query(params): Query<EntityTypeQuery>,
) -> Result<Json<PropertiesResponse>, ApiError> {
    let response = state
        .engine
        .get_properties(params.entity_type.as_deref(), params.query.as_deref())
        .await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize, IntoParams)]
struct IdQuery {
    id: String,
}

/// GET /preview
#[utoipa::path(
    get,
    path = "/preview",
    params(IdQuery),
    responses(
        (status = 200, description = "Preview of an authority record", body = PreviewResponse),
        (status = 404, description = "No record with that id"),
        (status = 400, description = "Malformed id"),
    ),
    tag = "preview"
)]
async fn preview_handler(
    State(state): State<AppState>,
    Query(params): Query<IdQuery>,
) -> Result<Json<PreviewResponse>, ApiError> {
    let response = state.engine.preview(&params.id).await?;
    Ok(Json(response))
}

/// GET /flyout
#[utoipa::path(
    get,
    path = "/flyout",
    params(IdQuery),
    responses(
        (status = 200, description = "Inline flyout preview of an authority record", body = PreviewResponse),
        (status = 404, description = "No record with that id"),
        (status = 400, description = "Malformed id"),
    ),
    tag = "preview"
)]
async fn flyout_handler(
    State(state): State<AppState>,
    Query(params): Query<IdQuery>,
) -> Result<Json<PreviewResponse>, ApiError> {
    let response = state.engine.flyout(&params.id).await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize, IntoParams)]
struct SuggestEntityQuery {
    prefix: String,
    #[serde(rename = "type", default)]
    entity_type: Option<String>,
}

/// GET /suggest/entity
#[utoipa::path(
    get,
    path = "/suggest/entity",
    params(SuggestEntityQuery),
    responses(
        (status = 200, description = "Entity autocomplete results", body = [SuggestEntityResult]),
        (status = 404, description = "Unknown entity type"),
    ),
    tag = "suggest"
)]
async fn suggest_entity_handler(
    State(state): State<AppState>,
    Query(params): Query<SuggestEntityQuery>,
) -> Result<Json<Vec<SuggestEntityResult>>, ApiError> {
    let response = state
        .engine
        .suggest_entity(&params.prefix, params.entity_type.as_deref())
        .await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize, IntoParams)]
struct PrefixQuery {
    prefix: String,
}

/// GET /suggest/type
#[utoipa::path(
    get,
    path = "/suggest/type",
    params(PrefixQuery),
    responses(
        (status = 200, description = "Entity-type autocomplete results", body = [SuggestTypeResult]),
    ),
    tag = "suggest"
)]
async fn suggest_type_handler(
    State(state): State<AppState>,
    Query(params): Query<PrefixQuery>,
) -> Json<Vec<SuggestTypeResult>> {
    Json(state.engine.suggest_type(&params.prefix))
}

/// GET /suggest/property
#[utoipa::path(
    get,
    path = "/suggest/property",
    params(SuggestEntityQuery),
    responses(
        (status = 200, description = "Property autocomplete results", body = [SuggestPropertyResult]),
        (status = 404, description = "Unknown entity type"),
    ),
    tag = "suggest"
)]
async fn suggest_property_handler(
    State(state): State<AppState>,
    Query(params): Query<SuggestEntityQuery>,
) -> Result<Json<Vec<SuggestPropertyResult>>, ApiError> {
    let response = state
        .engine
        .suggest_property(&params.prefix, params.entity_type.as_deref())?;
    Ok(Json(response))
}

/// GET /metadata
#[utoipa::path(
    get,
    path = "/metadata",
    responses(
        (status = 200, description = "Service descriptor (identifier space, registered types, endpoint templates)", body = ServiceMetadata),
    ),
    tag = "metadata"
)]
async fn metadata_handler(State(state): State<AppState>) -> Json<ServiceMetadata> {
    Json(state.engine.metadata())
}

/// GET /health
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy")
    ),
    tag = "health"
)]
async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Error handling for API endpoints.
#[derive(Debug)]
pub struct ApiError(CoreError);

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self.0 {
            CoreError::InvalidQuery(_) | CoreError::MalformedId(_) => StatusCode::BAD_REQUEST,
            CoreError::UnknownEntityType(_) | CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::Overloaded(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError(err)
    }
}

/// OpenAPI documentation.
#[derive(OpenApi)]
#[openapi(
    paths(
        reconcile_handler,
        properties_handler,
        preview_handler,
        flyout_handler,
        suggest_entity_handler,
        suggest_type_handler,
        suggest_property_handler,
        metadata_handler,
        health_handler
    ),
    components(schemas(
        reconcile_core::entities::PropertyDescriptor,
        reconcile_core::entities::PropertyType,
        PreviewResponse,
        SuggestEntityResult,
        SuggestTypeResult,
        SuggestPropertyResult,
        ServiceMetadata,
    )),
    tags(
        (name = "reconcile", description = "Batch entity reconciliation"),
        (name = "properties", description = "Property descriptor listing"),
        (name = "preview", description = "Authority record preview/flyout"),
        (name = "suggest", description = "Autocomplete endpoints"),
        (name = "metadata", description = "Service metadata"),
        (name = "health", description = "Health check endpoints")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use reconcile_core::config::{Config, EmbeddingConfig, StorageConfig};
    use reconcile_core::entities::EntityTypeDescriptor;
    use reconcile_embeddings::{EmbeddingManager, MockEmbeddingProvider};
    use reconcile_storage::MockAuthorityStore;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let descriptor = EntityTypeDescriptor {
            name: "site".to_string(),
            display_name: "Site".to_string(),
            table: "tbl_locations".to_string(),
            id_column: "location_id".to_string(),
            label_column: "location_name".to_string(),
            secondary_fields: vec![],
            properties: vec![],
            location_type_ids: None,
        };
        let config = Config::builder(StorageConfig::default())
            .embedding(EmbeddingConfig::default())
            .entities(vec![descriptor])
            .build();
        let embeddings = Arc::new(EmbeddingManager::new(
            Arc::new(MockEmbeddingProvider::new(4)),
            &EmbeddingConfig::default(),
        ));
        let engine = ReconciliationEngine::new(config, Arc::new(MockAuthorityStore::new()), embeddings, None);
        AppState { engine: Arc::new(engine) }
    }

    #[tokio::test]
    async fn health_endpoint_returns_200() {
        let app = build_router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn metadata_endpoint_lists_registered_types() {
        let app = build_router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/metadata").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn preview_missing_id_returns_404() {
        let app = build_router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/preview?id=https://leibnizsead.se/authority/site/999")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
