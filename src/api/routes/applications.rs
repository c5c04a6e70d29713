//! Admission applications. Submission is public, review needs a token.

use axum::{extract::State, http::StatusCode, Json};

use super::{Filter, Id, Payload};
use crate::api::AppState;
use crate::auth::{CurrentAdmin, Permission};
use crate::error::{Error, Result};
use crate::models::{
    Application, ApplicationFilter, ApplicationPatch, ApplicationStats, NewApplication,
};

pub async fn list(
    State(state): State<AppState>,
    admin: CurrentAdmin,
    Filter(filter): Filter<ApplicationFilter>,
) -> Result<Json<Vec<Application>>> {
    admin.require(Permission::ViewApplications)?;
    let window = filter.window()?;
    Ok(Json(state.store.list_applications(&filter, window).await?))
}

pub async fn get_one(
    State(state): State<AppState>,
    admin: CurrentAdmin,
    Id(id): Id<String>,
) -> Result<Json<Application>> {
    admin.require(Permission::ViewApplications)?;
    let application = state
        .store
        .get_application(&id)
        .await?
        .ok_or(Error::NotFound("Application"))?;
    Ok(Json(application))
}

/// Public form submission
pub async fn submit(
    State(state): State<AppState>,
    Payload(application): Payload<NewApplication>,
) -> Result<(StatusCode, Json<Application>)> {
    application.validate()?;

    let application = state.store.create_application(application).await?;
    tracing::info!(
        application_id = %application.id,
        grade = ?application.grade_applying,
        "application_submitted"
    );
    Ok((StatusCode::CREATED, Json(application)))
}

pub async fn update(
    State(state): State<AppState>,
    admin: CurrentAdmin,
    Id(id): Id<String>,
    Payload(patch): Payload<ApplicationPatch>,
) -> Result<Json<Application>> {
    admin.require(Permission::ManageApplications)?;
    patch.validate()?;

    let application = state.store.update_application(&id, patch).await?;
    tracing::info!(
        application_id = %application.id,
        status = application.status.as_str(),
        updated_by = %admin.username,
        "application_updated"
    );
    Ok(Json(application))
}

pub async fn remove(
    State(state): State<AppState>,
    admin: CurrentAdmin,
    Id(id): Id<String>,
) -> Result<StatusCode> {
    admin.require(Permission::ManageApplications)?;
    state.store.delete_application(&id).await?;

    tracing::info!(application_id = %id, deleted_by = %admin.username, "application_deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn stats(
    State(state): State<AppState>,
    admin: CurrentAdmin,
) -> Result<Json<ApplicationStats>> {
    admin.require(Permission::ViewApplications)?;
    Ok(Json(state.store.application_stats().await?))
}
