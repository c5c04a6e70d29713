//! Login and self-service profile endpoints

use axum::{
    extract::{FromRequest, State},
    http::{header::USER_AGENT, HeaderMap},
    Json,
};
use serde::Deserialize;

use super::{Message, Payload};
use crate::api::AppState;
use crate::auth::models::{AdminChanges, AdminView, LoginResponse};
use crate::auth::password::check_new_password;
use crate::auth::{ClientIp, CurrentAdmin};
use crate::error::{Error, Result};
use crate::models::nullable;

/// OAuth2 password-grant form body
#[derive(FromRequest)]
#[from_request(via(axum::Form), rejection(Error))]
pub struct LoginForm<T>(pub T);

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default, deserialize_with = "nullable")]
    pub full_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub profile_image: Option<Option<String>>,
}

#[derive(Debug, Deserialize)]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
}

fn user_agent(headers: &HeaderMap) -> String {
    headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .chars()
        .take(100)
        .collect()
}

pub async fn login(
    State(state): State<AppState>,
    ClientIp(client_ip): ClientIp,
    headers: HeaderMap,
    form: Result<LoginForm<Credentials>>,
) -> Result<Json<LoginResponse>> {
    // Malformed bodies count against the window too
    state.limiter.check(client_ip).await?;
    let LoginForm(form) = form?;

    tracing::info!(username = %form.username, client_ip = %client_ip, "login_attempt");

    let admin = match state.store.find_admin_by_username(&form.username).await? {
        Some(admin) => {
            if state.hasher.verify(&form.password, &admin.password_hash).await? {
                Some(admin)
            } else {
                None
            }
        }
        None => {
            state.hasher.verify_dummy(&form.password).await;
            None
        }
    };

    let Some(admin) = admin else {
        tracing::warn!(
            reason = "invalid_credentials",
            username = %form.username,
            client_ip = %client_ip,
            user_agent = %user_agent(&headers),
            "login_failed"
        );
        return Err(Error::InvalidCredentials);
    };

    if !admin.is_active {
        tracing::warn!(
            reason = "inactive_user",
            username = %form.username,
            admin_id = ?admin.admin_id,
            client_ip = %client_ip,
            "login_failed"
        );
        return Err(Error::InactiveUser);
    }

    let access_token = state.tokens.issue(&admin)?;
    tracing::info!(
        username = %admin.username,
        role = admin.role.kind().as_str(),
        admin_id = ?admin.admin_id,
        client_ip = %client_ip,
        "login_success"
    );

    Ok(Json(LoginResponse {
        access_token,
        token_type: "bearer".to_string(),
        role: admin.role.kind(),
        admin_id: admin.admin_id,
        full_name: admin.full_name,
        profile_image: admin.profile_image,
    }))
}

pub async fn me(CurrentAdmin(admin): CurrentAdmin) -> Json<AdminView> {
    Json(AdminView::from(admin))
}

pub async fn update_me(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Payload(update): Payload<ProfileUpdate>,
) -> Result<Json<AdminView>> {
    let updated = state
        .store
        .update_admin(
            admin.id,
            AdminChanges {
                full_name: update.full_name,
                profile_image: update.profile_image,
                ..Default::default()
            },
        )
        .await?;

    tracing::info!(admin_id = ?updated.admin_id, "profile_updated");
    Ok(Json(AdminView::from(updated)))
}

pub async fn change_password(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Payload(change): Payload<PasswordChange>,
) -> Result<Json<Message>> {
    if !state
        .hasher
        .verify(&change.current_password, &admin.password_hash)
        .await?
    {
        return Err(Error::Validation("Current password is incorrect".to_string()));
    }
    check_new_password(&change.new_password)?;

    let password_hash = state.hasher.hash(&change.new_password).await?;
    state
        .store
        .update_admin(
            admin.id,
            AdminChanges {
                password_hash: Some(password_hash),
                ..Default::default()
            },
        )
        .await?;

    tracing::info!(admin_id = ?admin.admin_id, "password_changed");
    Ok(Message::new("Password updated successfully"))
}
