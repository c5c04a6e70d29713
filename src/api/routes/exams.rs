//! Exam schedule

use axum::{extract::State, http::StatusCode, Json};

use super::{Filter, Id, Payload};
use crate::api::AppState;
use crate::auth::{CurrentAdmin, Permission};
use crate::error::{Error, Result};
use crate::models::{Exam, ExamFilter, ExamPatch, ExamStats, ExamStatsQuery, NewExam};

pub async fn list(
    State(state): State<AppState>,
    admin: CurrentAdmin,
    Filter(filter): Filter<ExamFilter>,
) -> Result<Json<Vec<Exam>>> {
    admin.require(Permission::ViewExams)?;
    let window = filter.window()?;
    Ok(Json(state.store.list_exams(&filter, window).await?))
}

pub async fn get_one(
    State(state): State<AppState>,
    admin: CurrentAdmin,
    Id(id): Id<String>,
) -> Result<Json<Exam>> {
    admin.require(Permission::ViewExams)?;
    let exam = state
        .store
        .get_exam(&id)
        .await?
        .ok_or(Error::NotFound("Exam"))?;
    Ok(Json(exam))
}

pub async fn create(
    State(state): State<AppState>,
    admin: CurrentAdmin,
    Payload(exam): Payload<NewExam>,
) -> Result<(StatusCode, Json<Exam>)> {
    admin.require(Permission::AddExams)?;
    exam.validate()?;

    let exam = state.store.create_exam(exam).await?;
    tracing::info!(
        exam_id = %exam.id,
        subject = %exam.subject,
        created_by = %admin.username,
        "exam_created"
    );
    Ok((StatusCode::CREATED, Json(exam)))
}

pub async fn update(
    State(state): State<AppState>,
    admin: CurrentAdmin,
    Id(id): Id<String>,
    Payload(patch): Payload<ExamPatch>,
) -> Result<Json<Exam>> {
    admin.require(Permission::EditExams)?;
    patch.validate()?;

    let exam = state.store.update_exam(&id, patch).await?;
    tracing::info!(exam_id = %exam.id, "exam_updated");
    Ok(Json(exam))
}

pub async fn remove(
    State(state): State<AppState>,
    admin: CurrentAdmin,
    Id(id): Id<String>,
) -> Result<StatusCode> {
    admin.require(Permission::DeleteExams)?;
    state.store.delete_exam(&id).await?;

    tracing::info!(exam_id = %id, deleted_by = %admin.username, "exam_deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn stats(
    State(state): State<AppState>,
    admin: CurrentAdmin,
    Filter(query): Filter<ExamStatsQuery>,
) -> Result<Json<ExamStats>> {
    admin.require(Permission::ViewExams)?;
    let year = query.academic_year.as_deref().filter(|y| !y.is_empty());
    Ok(Json(state.store.exam_stats(year).await?))
}
