//! Contact inquiries

use axum::{extract::State, http::StatusCode, Json};

use super::{Filter, Id, Payload};
use crate::api::AppState;
use crate::auth::{CurrentAdmin, Permission};
use crate::error::{Error, Result};
use crate::models::{ContactFilter, ContactPatch, ContactRequest, ContactStats, NewContactRequest};

pub async fn list(
    State(state): State<AppState>,
    admin: CurrentAdmin,
    Filter(filter): Filter<ContactFilter>,
) -> Result<Json<Vec<ContactRequest>>> {
    admin.require(Permission::ViewContacts)?;
    let window = filter.window()?;
    Ok(Json(state.store.list_contacts(&filter, window).await?))
}

pub async fn get_one(
    State(state): State<AppState>,
    admin: CurrentAdmin,
    Id(id): Id<String>,
) -> Result<Json<ContactRequest>> {
    admin.require(Permission::ViewContacts)?;
    let contact = state
        .store
        .get_contact(&id)
        .await?
        .ok_or(Error::NotFound("Contact"))?;
    Ok(Json(contact))
}

pub async fn submit(
    State(state): State<AppState>,
    Payload(contact): Payload<NewContactRequest>,
) -> Result<(StatusCode, Json<ContactRequest>)> {
    contact.validate()?;

    let contact = state.store.create_contact(contact).await?;
    tracing::info!(contact_id = %contact.id, "contact_submitted");
    Ok((StatusCode::CREATED, Json(contact)))
}

pub async fn update(
    State(state): State<AppState>,
    admin: CurrentAdmin,
    Id(id): Id<String>,
    Payload(patch): Payload<ContactPatch>,
) -> Result<Json<ContactRequest>> {
    admin.require(Permission::ManageContacts)?;
    patch.validate()?;

    let contact = state.store.update_contact(&id, patch).await?;
    tracing::info!(
        contact_id = %contact.id,
        status = contact.status.as_str(),
        "contact_updated"
    );
    Ok(Json(contact))
}

pub async fn remove(
    State(state): State<AppState>,
    admin: CurrentAdmin,
    Id(id): Id<String>,
) -> Result<StatusCode> {
    admin.require(Permission::ManageContacts)?;
    state.store.delete_contact(&id).await?;

    tracing::info!(contact_id = %id, deleted_by = %admin.username, "contact_deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn stats(
    State(state): State<AppState>,
    admin: CurrentAdmin,
) -> Result<Json<ContactStats>> {
    admin.require(Permission::ViewContacts)?;
    Ok(Json(state.store.contact_stats().await?))
}
