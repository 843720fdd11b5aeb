//! HTTP handlers for audio resources.
//! Parameter validation happens here; the lifecycle itself is delegated to
//! `ResourceService`.

use crate::{
    errors::AppError,
    models::resource::{RESOURCE_CONTENT_TYPE, Resource},
    services::resource_service::{ResourceError, ResourceService},
    validation::parse_positive_id,
};
use axum::{
    Json,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::Response,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    pub id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedResponse {
    pub id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeletedResponse {
    pub ids: Vec<i64>,
}

/// `POST /resources` — body is the raw MP3 file.
pub async fn create_resource(
    State(service): State<ResourceService>,
    body: Bytes,
) -> Result<Json<CreatedResponse>, AppError> {
    let id = service.create(&body).await?;
    Ok(Json(CreatedResponse { id }))
}

/// `GET /resources/{id}` — the stored bytes, served as `audio/mpeg`.
pub async fn get_resource(
    State(service): State<ResourceService>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let id = parse_positive_id("id", &id)?;
    let resource = service.get(id).await?;

    let mut headers = HeaderMap::new();
    set_resource_headers(&mut headers, &resource);

    let mut response = Response::new(Body::from(resource.data));
    *response.status_mut() = StatusCode::OK;
    *response.headers_mut() = headers;
    Ok(response)
}

/// `DELETE /resources?id=1,2,3` — ids that do not exist are skipped.
pub async fn delete_resources(
    State(service): State<ResourceService>,
    Query(query): Query<DeleteQuery>,
) -> Result<Json<DeletedResponse>, AppError> {
    let csv = query
        .id
        .ok_or_else(|| ResourceError::invalid_parameter("id", "parameter is required"))?;
    let ids = service.delete(&csv).await?;
    Ok(Json(DeletedResponse { ids }))
}

fn set_resource_headers(headers: &mut HeaderMap, resource: &Resource) {
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(RESOURCE_CONTENT_TYPE),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(resource.data.len()));

    let quoted = format!("\"{}\"", resource.etag());
    if let Ok(value) = HeaderValue::from_str(&quoted) {
        headers.insert(header::ETAG, value);
    }

    if let Ok(value) = HeaderValue::from_str(&resource.created_at.to_rfc2822()) {
        headers.insert(header::LAST_MODIFIED, value);
    }
}
