//! Student records

use axum::{extract::State, http::StatusCode, Json};

use super::{Filter, Id, Payload};
use crate::api::AppState;
use crate::auth::{CurrentAdmin, Permission};
use crate::error::{Error, Result};
use crate::models::{HeadcountStats, NewStudent, Student, StudentFilter, StudentPatch};

pub async fn list(
    State(state): State<AppState>,
    admin: CurrentAdmin,
    Filter(filter): Filter<StudentFilter>,
) -> Result<Json<Vec<Student>>> {
    admin.require(Permission::ViewStudents)?;
    let window = filter.window()?;
    Ok(Json(state.store.list_students(&filter, window).await?))
}

pub async fn get_one(
    State(state): State<AppState>,
    admin: CurrentAdmin,
    Id(id): Id<i64>,
) -> Result<Json<Student>> {
    admin.require(Permission::ViewStudents)?;
    let student = state
        .store
        .get_student(id)
        .await?
        .ok_or(Error::NotFound("Student"))?;
    Ok(Json(student))
}

pub async fn create(
    State(state): State<AppState>,
    admin: CurrentAdmin,
    Payload(student): Payload<NewStudent>,
) -> Result<(StatusCode, Json<Student>)> {
    admin.require(Permission::AddStudents)?;
    student.validate()?;

    let student = state.store.create_student(student).await?;
    tracing::info!(
        student_id = %student.student_id,
        created_by = %admin.username,
        "student_created"
    );
    Ok((StatusCode::CREATED, Json(student)))
}

pub async fn update(
    State(state): State<AppState>,
    admin: CurrentAdmin,
    Id(id): Id<i64>,
    Payload(patch): Payload<StudentPatch>,
) -> Result<Json<Student>> {
    admin.require(Permission::EditStudents)?;
    patch.validate()?;

    let student = state.store.update_student(id, patch).await?;
    tracing::info!(student_id = %student.student_id, "student_updated");
    Ok(Json(student))
}

pub async fn remove(
    State(state): State<AppState>,
    admin: CurrentAdmin,
    Id(id): Id<i64>,
) -> Result<StatusCode> {
    admin.require(Permission::DeleteStudents)?;
    state.store.delete_student(id).await?;

    tracing::info!(id, deleted_by = %admin.username, "student_deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn stats(
    State(state): State<AppState>,
    admin: CurrentAdmin,
) -> Result<Json<HeadcountStats>> {
    admin.require(Permission::ViewStudents)?;
    Ok(Json(state.store.student_stats().await?))
}
