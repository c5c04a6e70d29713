//! Authentication models: administrators, roles and permissions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Permission list stored for principals
pub const PRINCIPAL_PERMISSIONS: &str = "all";

/// Named capability an ADMIN must hold to pass a gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ViewDashboard,
    ViewStudents,
    AddStudents,
    EditStudents,
    DeleteStudents,
    ViewTeachers,
    AddTeachers,
    EditTeachers,
    DeleteTeachers,
    ViewClasses,
    AddClasses,
    EditClasses,
    DeleteClasses,
    ViewExams,
    AddExams,
    EditExams,
    DeleteExams,
    ViewApplications,
    ManageApplications,
    ViewContacts,
    ManageContacts,
    ManageSiteContent,
    ManageSettings,
}

impl Permission {
    pub const ALL: [Permission; 23] = [
        Permission::ViewDashboard,
        Permission::ViewStudents,
        Permission::AddStudents,
        Permission::EditStudents,
        Permission::DeleteStudents,
        Permission::ViewTeachers,
        Permission::AddTeachers,
        Permission::EditTeachers,
        Permission::DeleteTeachers,
        Permission::ViewClasses,
        Permission::AddClasses,
        Permission::EditClasses,
        Permission::DeleteClasses,
        Permission::ViewExams,
        Permission::AddExams,
        Permission::EditExams,
        Permission::DeleteExams,
        Permission::ViewApplications,
        Permission::ManageApplications,
        Permission::ViewContacts,
        Permission::ManageContacts,
        Permission::ManageSiteContent,
        Permission::ManageSettings,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ViewDashboard => "view_dashboard",
            Permission::ViewStudents => "view_students",
            Permission::AddStudents => "add_students",
            Permission::EditStudents => "edit_students",
            Permission::DeleteStudents => "delete_students",
            Permission::ViewTeachers => "view_teachers",
            Permission::AddTeachers => "add_teachers",
            Permission::EditTeachers => "edit_teachers",
            Permission::DeleteTeachers => "delete_teachers",
            Permission::ViewClasses => "view_classes",
            Permission::AddClasses => "add_classes",
            Permission::EditClasses => "edit_classes",
            Permission::DeleteClasses => "delete_classes",
            Permission::ViewExams => "view_exams",
            Permission::AddExams => "add_exams",
            Permission::EditExams => "edit_exams",
            Permission::DeleteExams => "delete_exams",
            Permission::ViewApplications => "view_applications",
            Permission::ManageApplications => "manage_applications",
            Permission::ViewContacts => "view_contacts",
            Permission::ManageContacts => "manage_contacts",
            Permission::ManageSiteContent => "manage_site_content",
            Permission::ManageSettings => "manage_settings",
        }
    }

    /// Parse a list of wire names, rejecting anything outside the catalogue
    pub fn parse_set<S: AsRef<str>>(names: &[S]) -> Result<HashSet<Permission>> {
        names.iter().map(|n| n.as_ref().parse()).collect()
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Permission::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| Error::Validation(format!("Unknown permission: {}", s)))
    }
}

/// Role name as it appears on the wire and in storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleKind {
    Principal,
    Admin,
}

impl RoleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleKind::Principal => "PRINCIPAL",
            RoleKind::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for RoleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoleKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PRINCIPAL" => Ok(RoleKind::Principal),
            "ADMIN" => Ok(RoleKind::Admin),
            other => Err(Error::Validation(format!("Unknown role: {}", other))),
        }
    }
}

/// Authorization role. Principals bypass every permission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Principal,
    Admin { permissions: HashSet<Permission> },
}

impl Role {
    pub fn admin<I: IntoIterator<Item = Permission>>(permissions: I) -> Self {
        Role::Admin {
            permissions: permissions.into_iter().collect(),
        }
    }

    pub fn kind(&self) -> RoleKind {
        match self {
            Role::Principal => RoleKind::Principal,
            Role::Admin { .. } => RoleKind::Admin,
        }
    }

    pub fn is_principal(&self) -> bool {
        matches!(self, Role::Principal)
    }

    pub fn allows(&self, permission: Permission) -> bool {
        match self {
            Role::Principal => true,
            Role::Admin { permissions } => permissions.contains(&permission),
        }
    }

    /// Permission names in catalogue order, `["all"]` for principals
    pub fn permission_names(&self) -> Vec<String> {
        match self {
            Role::Principal => vec![PRINCIPAL_PERMISSIONS.to_string()],
            Role::Admin { permissions } => Permission::ALL
                .iter()
                .filter(|p| permissions.contains(p))
                .map(|p| p.as_str().to_string())
                .collect(),
        }
    }

    /// Rebuild a role from its stored columns. Unknown stored permission
    /// names are skipped so a retired capability cannot lock an admin out.
    pub fn from_stored(kind: &str, permissions: &[String]) -> Result<Self> {
        match kind.parse::<RoleKind>()? {
            RoleKind::Principal => Ok(Role::Principal),
            RoleKind::Admin => Ok(Role::admin(
                permissions.iter().filter_map(|p| p.parse::<Permission>().ok()),
            )),
        }
    }
}

/// Convenience bundles used to populate an admin's permissions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleTemplate {
    FullAccess,
    StudentManager,
    TeacherManager,
    ClassManager,
    ExamManager,
    Receptionist,
    ContentEditor,
    ViewOnly,
    Custom,
}

/// Template description as served to the admin UI
#[derive(Debug, Clone, Serialize)]
pub struct TemplateInfo {
    pub label: &'static str,
    pub description: &'static str,
    pub permissions: Vec<Permission>,
}

impl RoleTemplate {
    pub const ALL: [RoleTemplate; 9] = [
        RoleTemplate::FullAccess,
        RoleTemplate::StudentManager,
        RoleTemplate::TeacherManager,
        RoleTemplate::ClassManager,
        RoleTemplate::ExamManager,
        RoleTemplate::Receptionist,
        RoleTemplate::ContentEditor,
        RoleTemplate::ViewOnly,
        RoleTemplate::Custom,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            RoleTemplate::FullAccess => "FULL_ACCESS",
            RoleTemplate::StudentManager => "STUDENT_MANAGER",
            RoleTemplate::TeacherManager => "TEACHER_MANAGER",
            RoleTemplate::ClassManager => "CLASS_MANAGER",
            RoleTemplate::ExamManager => "EXAM_MANAGER",
            RoleTemplate::Receptionist => "RECEPTIONIST",
            RoleTemplate::ContentEditor => "CONTENT_EDITOR",
            RoleTemplate::ViewOnly => "VIEW_ONLY",
            RoleTemplate::Custom => "CUSTOM",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RoleTemplate::FullAccess => "Full Access",
            RoleTemplate::StudentManager => "Student Manager",
            RoleTemplate::TeacherManager => "Teacher Manager",
            RoleTemplate::ClassManager => "Class Manager",
            RoleTemplate::ExamManager => "Exam Manager",
            RoleTemplate::Receptionist => "Receptionist",
            RoleTemplate::ContentEditor => "Content Editor",
            RoleTemplate::ViewOnly => "View Only",
            RoleTemplate::Custom => "Custom",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RoleTemplate::FullAccess => "All permissions except admin management",
            RoleTemplate::StudentManager => "Manage students only",
            RoleTemplate::TeacherManager => "Manage teachers only",
            RoleTemplate::ClassManager => "Manage classes only",
            RoleTemplate::ExamManager => "Manage the exam schedule",
            RoleTemplate::Receptionist => "Handle applications and contacts",
            RoleTemplate::ContentEditor => "Edit public website content",
            RoleTemplate::ViewOnly => "Read-only access to all data",
            RoleTemplate::Custom => "Select individual permissions",
        }
    }

    pub fn permissions(&self) -> Vec<Permission> {
        use Permission::*;
        match self {
            RoleTemplate::FullAccess => Permission::ALL.to_vec(),
            RoleTemplate::StudentManager => vec![
                ViewDashboard,
                ViewStudents,
                AddStudents,
                EditStudents,
                DeleteStudents,
            ],
            RoleTemplate::TeacherManager => vec![
                ViewDashboard,
                ViewTeachers,
                AddTeachers,
                EditTeachers,
                DeleteTeachers,
            ],
            RoleTemplate::ClassManager => vec![
                ViewDashboard,
                ViewClasses,
                AddClasses,
                EditClasses,
                DeleteClasses,
            ],
            RoleTemplate::ExamManager => {
                vec![ViewDashboard, ViewExams, AddExams, EditExams, DeleteExams]
            }
            RoleTemplate::Receptionist => vec![
                ViewDashboard,
                ViewApplications,
                ManageApplications,
                ViewContacts,
                ManageContacts,
            ],
            RoleTemplate::ContentEditor => vec![ViewDashboard, ManageSiteContent],
            RoleTemplate::ViewOnly => vec![
                ViewDashboard,
                ViewStudents,
                ViewTeachers,
                ViewClasses,
                ViewExams,
                ViewApplications,
                ViewContacts,
            ],
            RoleTemplate::Custom => vec![ViewDashboard],
        }
    }

    /// Resolve the permission set for a create/update request.
    /// `Custom` takes the explicit list, falling back to the template default.
    pub fn resolve(&self, explicit: Option<&[String]>) -> Result<HashSet<Permission>> {
        match (self, explicit) {
            (RoleTemplate::Custom, Some(names)) => Permission::parse_set(names),
            _ => Ok(self.permissions().into_iter().collect()),
        }
    }

    pub fn info(&self) -> TemplateInfo {
        TemplateInfo {
            label: self.label(),
            description: self.description(),
            permissions: self.permissions(),
        }
    }

    /// Every template keyed by its wire name
    pub fn catalogue() -> BTreeMap<&'static str, TemplateInfo> {
        RoleTemplate::ALL.iter().map(|t| (t.key(), t.info())).collect()
    }
}

/// Stored administrator account
#[derive(Debug, Clone)]
pub struct Admin {
    pub id: i64,
    pub admin_id: Option<String>,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub full_name: Option<String>,
    pub profile_image: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields for inserting a new administrator
#[derive(Debug, Clone)]
pub struct NewAdmin {
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub full_name: Option<String>,
}

/// Changes applied to an existing administrator
#[derive(Debug, Clone, Default)]
pub struct AdminChanges {
    pub full_name: Option<Option<String>>,
    pub profile_image: Option<Option<String>>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub password_hash: Option<String>,
}

impl AdminChanges {
    /// Apply onto a copy of the stored row
    pub fn apply(self, admin: &mut Admin) {
        if let Some(full_name) = self.full_name {
            admin.full_name = full_name;
        }
        if let Some(profile_image) = self.profile_image {
            admin.profile_image = profile_image;
        }
        if let Some(role) = self.role {
            admin.role = role;
        }
        if let Some(is_active) = self.is_active {
            admin.is_active = is_active;
        }
        if let Some(password_hash) = self.password_hash {
            admin.password_hash = password_hash;
        }
    }

    /// True when applying would leave `admin` without the principal role
    pub fn demotes(&self, admin: &Admin) -> bool {
        admin.role.is_principal() && matches!(self.role, Some(Role::Admin { .. }))
    }
}

/// Administrator as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminView {
    pub id: i64,
    pub admin_id: Option<String>,
    pub username: String,
    pub full_name: Option<String>,
    pub profile_image: Option<String>,
    pub role: RoleKind,
    pub permissions: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Admin> for AdminView {
    fn from(admin: &Admin) -> Self {
        Self {
            id: admin.id,
            admin_id: admin.admin_id.clone(),
            username: admin.username.clone(),
            full_name: admin.full_name.clone(),
            profile_image: admin.profile_image.clone(),
            role: admin.role.kind(),
            permissions: admin.role.permission_names(),
            is_active: admin.is_active,
            created_at: admin.created_at,
        }
    }
}

impl From<Admin> for AdminView {
    fn from(admin: Admin) -> Self {
        AdminView::from(&admin)
    }
}

/// Successful login payload
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub role: RoleKind,
    pub admin_id: Option<String>,
    pub full_name: Option<String>,
    pub profile_image: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_principal_allows_everything() {
        let role = Role::Principal;
        assert!(Permission::ALL.iter().all(|p| role.allows(*p)));
        assert_eq!(role.permission_names(), vec!["all"]);
    }

    #[test]
    fn test_admin_allows_only_granted() {
        let role = Role::admin([Permission::ViewStudents]);
        assert!(role.allows(Permission::ViewStudents));
        assert!(!role.allows(Permission::DeleteStudents));
    }

    #[test]
    fn test_permission_wire_names() {
        assert_eq!(
            serde_json::to_string(&Permission::ManageSiteContent).unwrap(),
            "\"manage_site_content\""
        );
        for permission in Permission::ALL {
            assert_eq!(permission.as_str().parse::<Permission>().unwrap(), permission);
        }
        assert!("launch_missiles".parse::<Permission>().is_err());
    }

    #[test]
    fn test_permission_names_follow_catalogue_order() {
        let role = Role::admin([Permission::ManageContacts, Permission::ViewDashboard]);
        assert_eq!(role.permission_names(), vec!["view_dashboard", "manage_contacts"]);
    }

    #[test]
    fn test_from_stored_skips_unknown() {
        let role = Role::from_stored(
            "ADMIN",
            &["view_students".to_string(), "retired_perm".to_string()],
        )
        .unwrap();
        assert_eq!(role, Role::admin([Permission::ViewStudents]));

        let role = Role::from_stored("PRINCIPAL", &["all".to_string()]).unwrap();
        assert!(role.is_principal());

        assert!(Role::from_stored("JANITOR", &[]).is_err());
    }

    #[test]
    fn test_template_resolution() {
        let receptionist = RoleTemplate::Receptionist.resolve(None).unwrap();
        assert!(receptionist.contains(&Permission::ManageApplications));
        assert!(!receptionist.contains(&Permission::ViewStudents));

        let explicit = vec!["view_exams".to_string()];
        let custom = RoleTemplate::Custom.resolve(Some(&explicit)).unwrap();
        assert_eq!(custom, HashSet::from([Permission::ViewExams]));

        let bad = vec!["nope".to_string()];
        assert!(RoleTemplate::Custom.resolve(Some(&bad)).is_err());

        // Non-custom templates ignore the explicit list
        let full = RoleTemplate::FullAccess.resolve(Some(&bad)).unwrap();
        assert_eq!(full.len(), Permission::ALL.len());
    }

    #[test]
    fn test_catalogue_has_every_template() {
        let catalogue = RoleTemplate::catalogue();
        assert_eq!(catalogue.len(), RoleTemplate::ALL.len());
        assert_eq!(catalogue["VIEW_ONLY"].label, "View Only");
    }

    #[test]
    fn test_changes_detect_demotion() {
        let admin = Admin {
            id: 1,
            admin_id: Some("ADM-001".to_string()),
            username: "head".to_string(),
            password_hash: String::new(),
            role: Role::Principal,
            full_name: None,
            profile_image: None,
            is_active: true,
            created_at: Utc::now(),
        };
        let changes = AdminChanges {
            role: Some(Role::admin([Permission::ViewDashboard])),
            ..Default::default()
        };
        assert!(changes.demotes(&admin));
        assert!(!AdminChanges::default().demotes(&admin));
    }
}
