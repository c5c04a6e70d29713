//! Website page content. The public page read is cached; every admin
//! write drops the cached copy of the page it touched.

use axum::{extract::State, http::StatusCode, Json};

use super::{Id, Payload};
use crate::api::AppState;
use crate::auth::{CurrentAdmin, Permission};
use crate::content;
use crate::error::{Error, Result};
use crate::models::{check_page_slug, NewSection, PageSection, PageSummary, SectionPatch, SeedReport};

/// Active sections of a page, no token required
pub async fn public_page(
    State(state): State<AppState>,
    Id(page_slug): Id<String>,
) -> Result<Json<Vec<PageSection>>> {
    let sections = content::public_page(state.store.as_ref(), state.cache.as_ref(), &page_slug).await?;
    Ok(Json(sections))
}

pub async fn list_pages(
    State(state): State<AppState>,
    admin: CurrentAdmin,
) -> Result<Json<Vec<PageSummary>>> {
    admin.require(Permission::ManageSiteContent)?;
    Ok(Json(state.store.list_pages().await?))
}

/// Every section of a page, hidden ones included
pub async fn page_sections(
    State(state): State<AppState>,
    admin: CurrentAdmin,
    Id(page_slug): Id<String>,
) -> Result<Json<Vec<PageSection>>> {
    admin.require(Permission::ManageSiteContent)?;
    check_page_slug(&page_slug)?;
    Ok(Json(state.store.page_sections(&page_slug, false).await?))
}

pub async fn get_section(
    State(state): State<AppState>,
    admin: CurrentAdmin,
    Id(id): Id<i64>,
) -> Result<Json<PageSection>> {
    admin.require(Permission::ManageSiteContent)?;
    let section = state
        .store
        .get_section(id)
        .await?
        .ok_or(Error::NotFound("Section"))?;
    Ok(Json(section))
}

pub async fn create_section(
    State(state): State<AppState>,
    admin: CurrentAdmin,
    Payload(section): Payload<NewSection>,
) -> Result<(StatusCode, Json<PageSection>)> {
    admin.require(Permission::ManageSiteContent)?;
    section.validate()?;

    let section = state.store.create_section(section).await?;
    state.cache.invalidate(&section.page_slug).await;

    tracing::info!(
        section_id = section.id,
        page_slug = %section.page_slug,
        section_key = %section.section_key,
        created_by = %admin.username,
        "section_created"
    );
    Ok((StatusCode::CREATED, Json(section)))
}

pub async fn update_section(
    State(state): State<AppState>,
    admin: CurrentAdmin,
    Id(id): Id<i64>,
    Payload(patch): Payload<SectionPatch>,
) -> Result<Json<PageSection>> {
    admin.require(Permission::ManageSiteContent)?;
    patch.validate()?;

    let section = state.store.update_section(id, patch).await?;
    state.cache.invalidate(&section.page_slug).await;

    tracing::info!(
        section_id = section.id,
        page_slug = %section.page_slug,
        updated_by = %admin.username,
        "section_updated"
    );
    Ok(Json(section))
}

pub async fn delete_section(
    State(state): State<AppState>,
    admin: CurrentAdmin,
    Id(id): Id<i64>,
) -> Result<StatusCode> {
    admin.require(Permission::ManageSiteContent)?;

    let section = state.store.delete_section(id).await?;
    state.cache.invalidate(&section.page_slug).await;

    tracing::info!(
        section_id = id,
        page_slug = %section.page_slug,
        deleted_by = %admin.username,
        "section_deleted"
    );
    Ok(StatusCode::NO_CONTENT)
}

pub async fn seed_page(
    State(state): State<AppState>,
    admin: CurrentAdmin,
    Id(page_slug): Id<String>,
) -> Result<Json<SeedReport>> {
    admin.require(Permission::ManageSiteContent)?;
    check_page_slug(&page_slug)?;
    let report = content::seed_page(state.store.as_ref(), state.cache.as_ref(), &page_slug).await?;
    Ok(Json(report))
}
