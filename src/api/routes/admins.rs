//! Administrator account management, principal only

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use super::{Id, Payload};
use crate::api::AppState;
use crate::auth::models::{
    AdminChanges, AdminView, NewAdmin, Permission, Role, RoleKind, RoleTemplate, TemplateInfo,
};
use crate::auth::password::check_new_password;
use crate::auth::CurrentAdmin;
use crate::error::{Error, Result};
use crate::models::nullable;

#[derive(Debug, Deserialize)]
pub struct CreateAdmin {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default = "default_template")]
    pub role_template: RoleTemplate,
    #[serde(default)]
    pub permissions: Option<Vec<String>>,
}

fn default_template() -> RoleTemplate {
    RoleTemplate::ViewOnly
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateAdmin {
    #[serde(default, deserialize_with = "nullable")]
    pub full_name: Option<Option<String>>,
    #[serde(default)]
    pub role: Option<RoleKind>,
    #[serde(default)]
    pub role_template: Option<RoleTemplate>,
    #[serde(default)]
    pub permissions: Option<Vec<String>>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl UpdateAdmin {
    /// Work out the admin's next role, if it changes at all.
    ///
    /// Promotion drops the permission list. An ADMIN (or a demoted
    /// principal) takes the template bundle, then the explicit list, then
    /// keeps what it had; a demoted principal with neither gets
    /// `view_dashboard`. Permission edits on a principal are ignored.
    fn next_role(&self, current: &Role) -> Result<Option<Role>> {
        let target = self.role.unwrap_or(current.kind());
        if target == RoleKind::Principal {
            return Ok(match current {
                Role::Principal => None,
                Role::Admin { .. } => Some(Role::Principal),
            });
        }

        let permissions: Option<HashSet<Permission>> = match (self.role_template, &self.permissions) {
            (Some(template), explicit) => Some(template.resolve(explicit.as_deref())?),
            (None, Some(names)) => Some(Permission::parse_set(names)?),
            (None, None) => None,
        };

        Ok(match (current, permissions) {
            (_, Some(permissions)) => Some(Role::Admin { permissions }),
            (Role::Principal, None) => Some(Role::admin([Permission::ViewDashboard])),
            (Role::Admin { .. }, None) => None,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct PermissionCatalogue {
    pub permissions: Vec<Permission>,
    pub templates: BTreeMap<&'static str, TemplateInfo>,
}

/// Permission names and role templates, for any signed-in admin
pub async fn permissions(_admin: CurrentAdmin) -> Json<PermissionCatalogue> {
    Json(PermissionCatalogue {
        permissions: Permission::ALL.to_vec(),
        templates: RoleTemplate::catalogue(),
    })
}

pub async fn list(
    State(state): State<AppState>,
    current: CurrentAdmin,
) -> Result<Json<Vec<AdminView>>> {
    current.require_principal()?;
    let admins = state.store.list_admins().await?;
    Ok(Json(admins.iter().map(AdminView::from).collect()))
}

pub async fn get_one(
    State(state): State<AppState>,
    current: CurrentAdmin,
    Id(id): Id<i64>,
) -> Result<Json<AdminView>> {
    current.require_principal()?;
    let admin = state
        .store
        .get_admin(id)
        .await?
        .ok_or(Error::NotFound("Admin"))?;
    Ok(Json(AdminView::from(admin)))
}

pub async fn create(
    State(state): State<AppState>,
    current: CurrentAdmin,
    Payload(request): Payload<CreateAdmin>,
) -> Result<(StatusCode, Json<AdminView>)> {
    current.require_principal()?;

    let username = request.username.trim().to_string();
    if username.is_empty() {
        return Err(Error::Validation("Username is required".to_string()));
    }
    check_new_password(&request.password)?;
    let permissions = request
        .role_template
        .resolve(request.permissions.as_deref())?;

    let admin = state
        .store
        .create_admin(NewAdmin {
            username,
            password_hash: state.hasher.hash(&request.password).await?,
            role: Role::Admin { permissions },
            full_name: request.full_name,
        })
        .await?;

    tracing::info!(
        admin_id = ?admin.admin_id,
        username = %admin.username,
        template = request.role_template.key(),
        created_by = %current.username,
        "admin_created"
    );
    Ok((StatusCode::CREATED, Json(AdminView::from(admin))))
}

pub async fn update(
    State(state): State<AppState>,
    current: CurrentAdmin,
    Id(id): Id<i64>,
    Payload(request): Payload<UpdateAdmin>,
) -> Result<Json<AdminView>> {
    current.require_principal()?;

    let existing = state
        .store
        .get_admin(id)
        .await?
        .ok_or(Error::NotFound("Admin"))?;
    let role = request.next_role(&existing.role)?;

    let admin = state
        .store
        .update_admin(
            id,
            AdminChanges {
                full_name: request.full_name,
                role,
                is_active: request.is_active,
                ..Default::default()
            },
        )
        .await?;

    tracing::info!(
        admin_id = ?admin.admin_id,
        role = admin.role.kind().as_str(),
        updated_by = %current.username,
        "admin_updated"
    );
    Ok(Json(AdminView::from(admin)))
}

pub async fn remove(
    State(state): State<AppState>,
    current: CurrentAdmin,
    Id(id): Id<i64>,
) -> Result<StatusCode> {
    current.require_principal()?;
    state.store.delete_admin(id).await?;

    tracing::info!(id, deleted_by = %current.username, "admin_deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(json: &str) -> UpdateAdmin {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_promotion() {
        let role = update(r#"{"role": "PRINCIPAL"}"#)
            .next_role(&Role::admin([Permission::ViewStudents]))
            .unwrap();
        assert_eq!(role, Some(Role::Principal));
    }

    #[test]
    fn test_demotion_defaults_to_dashboard() {
        let role = update(r#"{"role": "ADMIN"}"#)
            .next_role(&Role::Principal)
            .unwrap();
        assert_eq!(role, Some(Role::admin([Permission::ViewDashboard])));
    }

    #[test]
    fn test_template_replaces_permissions() {
        let role = update(r#"{"role_template": "RECEPTIONIST"}"#)
            .next_role(&Role::admin([Permission::ViewDashboard]))
            .unwrap()
            .unwrap();
        assert!(role.allows(Permission::ViewApplications));
        assert!(!role.allows(Permission::DeleteStudents));
    }

    #[test]
    fn test_explicit_permissions() {
        let role = update(r#"{"permissions": ["view_exams", "add_exams"]}"#)
            .next_role(&Role::admin([Permission::ViewDashboard]))
            .unwrap();
        assert_eq!(
            role,
            Some(Role::admin([Permission::ViewExams, Permission::AddExams]))
        );
    }

    #[test]
    fn test_permission_edits_ignored_for_principal() {
        let role = update(r#"{"permissions": ["view_exams"]}"#)
            .next_role(&Role::Principal)
            .unwrap();
        assert_eq!(role, None);
    }

    #[test]
    fn test_unknown_permission_rejected() {
        let result = update(r#"{"permissions": ["launch_rockets"]}"#)
            .next_role(&Role::admin([Permission::ViewDashboard]));
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_unrelated_update_keeps_role() {
        let role = update(r#"{"is_active": false}"#)
            .next_role(&Role::admin([Permission::ViewDashboard]))
            .unwrap();
        assert_eq!(role, None);
    }
}
