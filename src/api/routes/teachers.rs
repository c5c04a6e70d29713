//! Teaching staff

use axum::{extract::State, http::StatusCode, Json};

use super::{Filter, Id, Payload};
use crate::api::AppState;
use crate::auth::{CurrentAdmin, Permission};
use crate::error::{Error, Result};
use crate::models::{HeadcountStats, NewTeacher, Teacher, TeacherFilter, TeacherPatch};

pub async fn list(
    State(state): State<AppState>,
    admin: CurrentAdmin,
    Filter(filter): Filter<TeacherFilter>,
) -> Result<Json<Vec<Teacher>>> {
    admin.require(Permission::ViewTeachers)?;
    let window = filter.window()?;
    Ok(Json(state.store.list_teachers(&filter, window).await?))
}

pub async fn get_one(
    State(state): State<AppState>,
    admin: CurrentAdmin,
    Id(id): Id<i64>,
) -> Result<Json<Teacher>> {
    admin.require(Permission::ViewTeachers)?;
    let teacher = state
        .store
        .get_teacher(id)
        .await?
        .ok_or(Error::NotFound("Teacher"))?;
    Ok(Json(teacher))
}

pub async fn create(
    State(state): State<AppState>,
    admin: CurrentAdmin,
    Payload(teacher): Payload<NewTeacher>,
) -> Result<(StatusCode, Json<Teacher>)> {
    admin.require(Permission::AddTeachers)?;
    teacher.validate()?;

    let teacher = state.store.create_teacher(teacher).await?;
    tracing::info!(
        employee_id = %teacher.employee_id,
        created_by = %admin.username,
        "teacher_created"
    );
    Ok((StatusCode::CREATED, Json(teacher)))
}

pub async fn update(
    State(state): State<AppState>,
    admin: CurrentAdmin,
    Id(id): Id<i64>,
    Payload(patch): Payload<TeacherPatch>,
) -> Result<Json<Teacher>> {
    admin.require(Permission::EditTeachers)?;
    patch.validate()?;

    let teacher = state.store.update_teacher(id, patch).await?;
    tracing::info!(employee_id = %teacher.employee_id, "teacher_updated");
    Ok(Json(teacher))
}

pub async fn remove(
    State(state): State<AppState>,
    admin: CurrentAdmin,
    Id(id): Id<i64>,
) -> Result<StatusCode> {
    admin.require(Permission::DeleteTeachers)?;
    state.store.delete_teacher(id).await?;

    tracing::info!(id, deleted_by = %admin.username, "teacher_deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn stats(
    State(state): State<AppState>,
    admin: CurrentAdmin,
) -> Result<Json<HeadcountStats>> {
    admin.require(Permission::ViewTeachers)?;
    Ok(Json(state.store.teacher_stats().await?))
}
