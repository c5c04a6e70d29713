//! API route handlers

pub mod admins;
pub mod applications;
pub mod auth;
pub mod classes;
pub mod contacts;
pub mod content;
pub mod exams;
pub mod students;
pub mod teachers;

use axum::{
    extract::{FromRequest, FromRequestParts, State},
    response::IntoResponse,
    Json,
};
use serde::Serialize;

use super::server::{AppState, HEALTH_PATH};
use crate::error::Error;

/// JSON request body; malformed bodies become a 400 with a detail
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(Error))]
pub struct Payload<T>(pub T);

/// Query string; bad filter values become a 400 with a detail
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(Error))]
pub struct Filter<T>(pub T);

/// Path parameters; unparsable ids become a 400 with a detail
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(Error))]
pub struct Id<T>(pub T);

#[derive(Debug, Serialize)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub database: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

// Health check

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.ping().await {
        Ok(()) => Json(HealthResponse {
            status: "ok",
            service: env!("CARGO_PKG_NAME"),
            database: "connected",
            details: None,
        }),
        Err(e) => {
            tracing::error!("health check failed: {}", e);
            Json(HealthResponse {
                status: "error",
                service: env!("CARGO_PKG_NAME"),
                database: "disconnected",
                details: Some(e.to_string()),
            })
        }
    }
}

pub async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "Welcome to the Schoolhouse API",
        "version": env!("CARGO_PKG_VERSION"),
        "health": HEALTH_PATH,
    }))
}

pub async fn not_found() -> Error {
    Error::NotFound("Resource")
}
