//! Persistence layer
//!
//! Handlers talk to a [`Store`] trait object. [`memory::MemoryStore`] keeps
//! every table in process and backs the test suite and database-less runs;
//! [`postgres::PgStore`] is the production implementation.
//!
//! Each trait method is a single atomic store operation. Partial updates
//! read the row, apply the patch and write the whole row back, so concurrent
//! updates of one row are last-writer-wins.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use std::sync::Arc;

use crate::auth::models::{Admin, AdminChanges, NewAdmin, Role};
use crate::auth::password::PasswordHasher;
use crate::config::{BootstrapConfig, DEFAULT_BOOTSTRAP_PASSWORD};
use crate::error::Result;
use crate::models::*;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait Store: Send + Sync {
    /// Round-trip to the backing store
    async fn ping(&self) -> Result<()>;

    // Administrators

    async fn list_admins(&self) -> Result<Vec<Admin>>;
    async fn get_admin(&self, id: i64) -> Result<Option<Admin>>;
    async fn find_admin_by_username(&self, username: &str) -> Result<Option<Admin>>;
    async fn has_principal(&self) -> Result<bool>;
    /// Fails with a conflict when the username is taken
    async fn create_admin(&self, admin: NewAdmin) -> Result<Admin>;
    /// Fails when the change would demote the last principal
    async fn update_admin(&self, id: i64, changes: AdminChanges) -> Result<Admin>;
    /// Fails when the admin is the last principal
    async fn delete_admin(&self, id: i64) -> Result<()>;

    // Students

    async fn list_students(&self, filter: &StudentFilter, window: Window) -> Result<Vec<Student>>;
    async fn get_student(&self, id: i64) -> Result<Option<Student>>;
    async fn create_student(&self, student: NewStudent) -> Result<Student>;
    async fn update_student(&self, id: i64, patch: StudentPatch) -> Result<Student>;
    async fn delete_student(&self, id: i64) -> Result<()>;
    async fn student_stats(&self) -> Result<HeadcountStats>;

    // Teachers

    async fn list_teachers(&self, filter: &TeacherFilter, window: Window) -> Result<Vec<Teacher>>;
    async fn get_teacher(&self, id: i64) -> Result<Option<Teacher>>;
    async fn create_teacher(&self, teacher: NewTeacher) -> Result<Teacher>;
    async fn update_teacher(&self, id: i64, patch: TeacherPatch) -> Result<Teacher>;
    /// Classes taught by the teacher keep existing without a class teacher
    async fn delete_teacher(&self, id: i64) -> Result<()>;
    async fn teacher_stats(&self) -> Result<HeadcountStats>;

    // Classes

    async fn list_classes(&self, filter: &ClassFilter, window: Window) -> Result<Vec<SchoolClass>>;
    async fn get_class(&self, id: i64) -> Result<Option<SchoolClass>>;
    async fn create_class(&self, class: NewClass) -> Result<SchoolClass>;
    async fn update_class(&self, id: i64, patch: ClassPatch) -> Result<SchoolClass>;
    /// Students of the class keep existing without a class
    async fn delete_class(&self, id: i64) -> Result<()>;
    async fn class_stats(&self) -> Result<ClassStats>;

    // Exams

    async fn list_exams(&self, filter: &ExamFilter, window: Window) -> Result<Vec<Exam>>;
    async fn get_exam(&self, id: &str) -> Result<Option<Exam>>;
    async fn create_exam(&self, exam: NewExam) -> Result<Exam>;
    async fn update_exam(&self, id: &str, patch: ExamPatch) -> Result<Exam>;
    async fn delete_exam(&self, id: &str) -> Result<()>;
    async fn exam_stats(&self, academic_year: Option<&str>) -> Result<ExamStats>;

    // Applications

    async fn list_applications(
        &self,
        filter: &ApplicationFilter,
        window: Window,
    ) -> Result<Vec<Application>>;
    async fn get_application(&self, id: &str) -> Result<Option<Application>>;
    async fn create_application(&self, application: NewApplication) -> Result<Application>;
    async fn update_application(&self, id: &str, patch: ApplicationPatch) -> Result<Application>;
    async fn delete_application(&self, id: &str) -> Result<()>;
    async fn application_stats(&self) -> Result<ApplicationStats>;

    // Contact requests

    async fn list_contacts(&self, filter: &ContactFilter, window: Window)
        -> Result<Vec<ContactRequest>>;
    async fn get_contact(&self, id: &str) -> Result<Option<ContactRequest>>;
    async fn create_contact(&self, contact: NewContactRequest) -> Result<ContactRequest>;
    async fn update_contact(&self, id: &str, patch: ContactPatch) -> Result<ContactRequest>;
    async fn delete_contact(&self, id: &str) -> Result<()>;
    async fn contact_stats(&self) -> Result<ContactStats>;

    // Page content

    async fn list_pages(&self) -> Result<Vec<PageSummary>>;
    /// Sections of a page in page order, optionally only the active ones
    async fn page_sections(&self, page_slug: &str, active_only: bool) -> Result<Vec<PageSection>>;
    async fn get_section(&self, id: i64) -> Result<Option<PageSection>>;
    async fn create_section(&self, section: NewSection) -> Result<PageSection>;
    async fn update_section(&self, id: i64, patch: SectionPatch) -> Result<PageSection>;
    /// Returns the removed section
    async fn delete_section(&self, id: i64) -> Result<PageSection>;
    /// Replace every section of a page in one all-or-nothing operation
    async fn replace_page(&self, page_slug: &str, sections: Vec<NewSection>)
        -> Result<Vec<PageSection>>;
}

pub type SharedStore = Arc<dyn Store>;

/// Create the configured principal when the store has none.
/// Returns the account that was created, if any.
pub async fn ensure_principal(
    store: &dyn Store,
    bootstrap: &BootstrapConfig,
    hasher: &PasswordHasher,
) -> Result<Option<Admin>> {
    if store.has_principal().await? {
        return Ok(None);
    }

    if bootstrap.password == DEFAULT_BOOTSTRAP_PASSWORD {
        tracing::warn!(
            username = %bootstrap.username,
            "creating principal with the default password, change it after first login"
        );
    }

    // An ADMIN may already hold the bootstrap username; promote it then
    if let Some(existing) = store.find_admin_by_username(&bootstrap.username).await? {
        let promoted = store
            .update_admin(
                existing.id,
                AdminChanges {
                    role: Some(Role::Principal),
                    ..Default::default()
                },
            )
            .await?;
        tracing::info!(username = %promoted.username, "promoted existing admin to principal");
        return Ok(Some(promoted));
    }

    let admin = store
        .create_admin(NewAdmin {
            username: bootstrap.username.clone(),
            password_hash: hasher.hash(&bootstrap.password).await?,
            role: Role::Principal,
            full_name: Some(bootstrap.full_name.clone()),
        })
        .await?;

    tracing::info!(
        username = %admin.username,
        admin_id = ?admin.admin_id,
        "bootstrap principal created"
    );
    Ok(Some(admin))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ensure_principal_runs_once() {
        let store = MemoryStore::new();
        let hasher = PasswordHasher::new(4);
        let bootstrap = BootstrapConfig::default();

        let created = ensure_principal(&store, &bootstrap, &hasher).await.unwrap();
        assert!(created.is_some_and(|a| a.role.is_principal()));

        let again = ensure_principal(&store, &bootstrap, &hasher).await.unwrap();
        assert!(again.is_none());
        assert_eq!(store.list_admins().await.unwrap().len(), 1);
    }
}
