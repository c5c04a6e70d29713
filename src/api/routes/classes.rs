//! Classes and their homeroom teachers

use axum::{extract::State, http::StatusCode, Json};

use super::{Filter, Id, Payload};
use crate::api::AppState;
use crate::auth::{CurrentAdmin, Permission};
use crate::error::{Error, Result};
use crate::models::{ClassFilter, ClassPatch, ClassStats, NewClass, SchoolClass};

pub async fn list(
    State(state): State<AppState>,
    admin: CurrentAdmin,
    Filter(filter): Filter<ClassFilter>,
) -> Result<Json<Vec<SchoolClass>>> {
    admin.require(Permission::ViewClasses)?;
    let window = filter.window()?;
    Ok(Json(state.store.list_classes(&filter, window).await?))
}

pub async fn get_one(
    State(state): State<AppState>,
    admin: CurrentAdmin,
    Id(id): Id<i64>,
) -> Result<Json<SchoolClass>> {
    admin.require(Permission::ViewClasses)?;
    let class = state
        .store
        .get_class(id)
        .await?
        .ok_or(Error::NotFound("Class"))?;
    Ok(Json(class))
}

pub async fn create(
    State(state): State<AppState>,
    admin: CurrentAdmin,
    Payload(class): Payload<NewClass>,
) -> Result<(StatusCode, Json<SchoolClass>)> {
    admin.require(Permission::AddClasses)?;
    class.validate()?;

    let class = state.store.create_class(class).await?;
    tracing::info!(
        class_name = %class.class_name,
        created_by = %admin.username,
        "class_created"
    );
    Ok((StatusCode::CREATED, Json(class)))
}

pub async fn update(
    State(state): State<AppState>,
    admin: CurrentAdmin,
    Id(id): Id<i64>,
    Payload(patch): Payload<ClassPatch>,
) -> Result<Json<SchoolClass>> {
    admin.require(Permission::EditClasses)?;
    patch.validate()?;

    let class = state.store.update_class(id, patch).await?;
    tracing::info!(class_name = %class.class_name, "class_updated");
    Ok(Json(class))
}

pub async fn remove(
    State(state): State<AppState>,
    admin: CurrentAdmin,
    Id(id): Id<i64>,
) -> Result<StatusCode> {
    admin.require(Permission::DeleteClasses)?;
    state.store.delete_class(id).await?;

    tracing::info!(id, deleted_by = %admin.username, "class_deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn stats(
    State(state): State<AppState>,
    admin: CurrentAdmin,
) -> Result<Json<ClassStats>> {
    admin.require(Permission::ViewClasses)?;
    Ok(Json(state.store.class_stats().await?))
}
