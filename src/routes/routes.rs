//! Defines routes for the audio resource API.
//!
//! ## Structure
//! - `POST   /resources`        — upload an MP3, returns `{"id": n}`
//! - `GET    /resources/{id}`   — download the stored MP3
//! - `DELETE /resources?id=1,2` — bulk delete, returns `{"ids": [...]}`
//! - `GET    /healthz`, `GET /readyz` — probes

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        resource_handlers::{create_resource, delete_resources, get_resource},
    },
    services::resource_service::ResourceService,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Build the router. `max_upload_bytes` caps the request body of uploads.
pub fn routes(max_upload_bytes: usize) -> Router<ResourceService> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route(
            "/resources",
            post(create_resource)
                .delete(delete_resources)
                .layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/resources/{id}", get(get_resource))
}
