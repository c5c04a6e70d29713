//! In-process store
//!
//! All tables live behind one lock, so every trait method (including the
//! last-principal checks) runs atomically with respect to the others.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::Store;
use crate::auth::models::{Admin, AdminChanges, NewAdmin};
use crate::error::{Error, Result};
use crate::models::*;

#[derive(Default)]
struct Tables {
    admins: BTreeMap<i64, Admin>,
    students: BTreeMap<i64, Student>,
    teachers: BTreeMap<i64, Teacher>,
    classes: BTreeMap<i64, SchoolClass>,
    /// Insertion order
    exams: Vec<Exam>,
    applications: Vec<Application>,
    contacts: Vec<ContactRequest>,
    sections: BTreeMap<i64, PageSection>,
    sequences: Sequences,
}

/// Per-table counters. Values are never reused, even after deletes.
#[derive(Default)]
struct Sequences {
    admins: i64,
    students: i64,
    teachers: i64,
    classes: i64,
    sections: i64,
}

fn next(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

impl Tables {
    fn principal_count(&self) -> usize {
        self.admins
            .values()
            .filter(|a| a.role.is_principal())
            .count()
    }

    fn require_class(&self, id: i64) -> Result<()> {
        if self.classes.contains_key(&id) {
            Ok(())
        } else {
            Err(Error::Validation("Referenced class does not exist".to_string()))
        }
    }

    fn require_teacher(&self, id: i64) -> Result<()> {
        if self.teachers.contains_key(&id) {
            Ok(())
        } else {
            Err(Error::Validation("Referenced teacher does not exist".to_string()))
        }
    }

    fn admission_taken(&self, admission_id: &str, except: Option<i64>) -> bool {
        self.students
            .values()
            .any(|s| Some(s.id) != except && s.admission_id.as_deref() == Some(admission_id))
    }

    fn class_name_taken(&self, name: &str, except: Option<i64>) -> bool {
        self.classes
            .values()
            .any(|c| Some(c.id) != except && c.class_name == name)
    }

    fn section_key_taken(&self, page_slug: &str, section_key: &str) -> bool {
        self.sections
            .values()
            .any(|s| s.page_slug == page_slug && s.section_key == section_key)
    }

    fn resolve_student(&self, student: &Student) -> Student {
        let mut student = student.clone();
        student.class_name = student
            .class_id
            .and_then(|id| self.classes.get(&id))
            .map(|c| c.class_name.clone());
        student
    }

    fn resolve_teacher(&self, teacher: &Teacher) -> Teacher {
        let mut teacher = teacher.clone();
        teacher.assigned_class_names = self
            .classes
            .values()
            .filter(|c| c.class_teacher_id == Some(teacher.id))
            .map(|c| c.class_name.clone())
            .collect();
        teacher
    }

    fn resolve_class(&self, class: &SchoolClass) -> SchoolClass {
        let mut class = class.clone();
        class.class_teacher_name = class
            .class_teacher_id
            .and_then(|id| self.teachers.get(&id))
            .map(|t| t.name.clone());
        class.student_count = self
            .students
            .values()
            .filter(|s| s.class_id == Some(class.id))
            .count() as i64;
        class
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn list_admins(&self) -> Result<Vec<Admin>> {
        Ok(self.tables.read().await.admins.values().cloned().collect())
    }

    async fn get_admin(&self, id: i64) -> Result<Option<Admin>> {
        Ok(self.tables.read().await.admins.get(&id).cloned())
    }

    async fn find_admin_by_username(&self, username: &str) -> Result<Option<Admin>> {
        Ok(self
            .tables
            .read()
            .await
            .admins
            .values()
            .find(|a| a.username == username)
            .cloned())
    }

    async fn has_principal(&self) -> Result<bool> {
        Ok(self.tables.read().await.principal_count() > 0)
    }

    async fn create_admin(&self, admin: NewAdmin) -> Result<Admin> {
        let mut tables = self.tables.write().await;
        if tables.admins.values().any(|a| a.username == admin.username) {
            return Err(Error::Conflict("Username already exists".to_string()));
        }

        let id = next(&mut tables.sequences.admins);
        let admin = Admin {
            id,
            admin_id: Some(format!("ADM-{:03}", id)),
            username: admin.username,
            password_hash: admin.password_hash,
            role: admin.role,
            full_name: admin.full_name,
            profile_image: None,
            is_active: true,
            created_at: Utc::now(),
        };
        tables.admins.insert(id, admin.clone());
        Ok(admin)
    }

    async fn update_admin(&self, id: i64, changes: AdminChanges) -> Result<Admin> {
        let mut tables = self.tables.write().await;
        let principals = tables.principal_count();
        let admin = tables.admins.get_mut(&id).ok_or(Error::NotFound("Admin"))?;

        if changes.demotes(admin) && principals <= 1 {
            return Err(Error::LastPrincipal("Cannot demote the last Principal"));
        }

        changes.apply(admin);
        Ok(admin.clone())
    }

    async fn delete_admin(&self, id: i64) -> Result<()> {
        let mut tables = self.tables.write().await;
        let admin = tables.admins.get(&id).ok_or(Error::NotFound("Admin"))?;
        if admin.role.is_principal() && tables.principal_count() <= 1 {
            return Err(Error::LastPrincipal("Cannot delete the last Principal"));
        }
        tables.admins.remove(&id);
        Ok(())
    }

    async fn list_students(&self, filter: &StudentFilter, window: Window) -> Result<Vec<Student>> {
        let tables = self.tables.read().await;
        let matching = tables.students.values().filter(|s| filter.matches(s));
        Ok(window
            .slice(matching)
            .into_iter()
            .map(|s| tables.resolve_student(s))
            .collect())
    }

    async fn get_student(&self, id: i64) -> Result<Option<Student>> {
        let tables = self.tables.read().await;
        Ok(tables.students.get(&id).map(|s| tables.resolve_student(s)))
    }

    async fn create_student(&self, student: NewStudent) -> Result<Student> {
        let mut tables = self.tables.write().await;
        if let Some(class_id) = student.class_id {
            tables.require_class(class_id)?;
        }

        let id = next(&mut tables.sequences.students);
        let student = student.into_student(id, id, Utc::now());
        if let Some(admission_id) = student.admission_id.as_deref() {
            if tables.admission_taken(admission_id, None) {
                return Err(Error::Conflict("Admission ID already exists".to_string()));
            }
        }

        tables.students.insert(id, student.clone());
        Ok(tables.resolve_student(&student))
    }

    async fn update_student(&self, id: i64, patch: StudentPatch) -> Result<Student> {
        let mut tables = self.tables.write().await;
        let mut student = tables
            .students
            .get(&id)
            .cloned()
            .ok_or(Error::NotFound("Student"))?;
        if let Some(class_id) = patch.target_class() {
            tables.require_class(class_id)?;
        }

        patch.apply(&mut student);
        tables.students.insert(id, student.clone());
        Ok(tables.resolve_student(&student))
    }

    async fn delete_student(&self, id: i64) -> Result<()> {
        self.tables
            .write()
            .await
            .students
            .remove(&id)
            .map(|_| ())
            .ok_or(Error::NotFound("Student"))
    }

    async fn student_stats(&self) -> Result<HeadcountStats> {
        let tables = self.tables.read().await;
        Ok(HeadcountStats::tally(
            tables
                .students
                .values()
                .map(|s| (s.is_active, s.gender.as_deref())),
        ))
    }

    async fn list_teachers(&self, filter: &TeacherFilter, window: Window) -> Result<Vec<Teacher>> {
        let tables = self.tables.read().await;
        let matching = tables.teachers.values().filter(|t| filter.matches(t));
        Ok(window
            .slice(matching)
            .into_iter()
            .map(|t| tables.resolve_teacher(t))
            .collect())
    }

    async fn get_teacher(&self, id: i64) -> Result<Option<Teacher>> {
        let tables = self.tables.read().await;
        Ok(tables.teachers.get(&id).map(|t| tables.resolve_teacher(t)))
    }

    async fn create_teacher(&self, teacher: NewTeacher) -> Result<Teacher> {
        let mut tables = self.tables.write().await;
        let id = next(&mut tables.sequences.teachers);
        let teacher = teacher.into_teacher(id, id, Utc::now());
        tables.teachers.insert(id, teacher.clone());
        Ok(teacher)
    }

    async fn update_teacher(&self, id: i64, patch: TeacherPatch) -> Result<Teacher> {
        let mut tables = self.tables.write().await;
        let teacher = tables
            .teachers
            .get_mut(&id)
            .ok_or(Error::NotFound("Teacher"))?;
        patch.apply(teacher);
        let teacher = teacher.clone();
        Ok(tables.resolve_teacher(&teacher))
    }

    async fn delete_teacher(&self, id: i64) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables
            .teachers
            .remove(&id)
            .ok_or(Error::NotFound("Teacher"))?;
        for class in tables.classes.values_mut() {
            if class.class_teacher_id == Some(id) {
                class.class_teacher_id = None;
            }
        }
        Ok(())
    }

    async fn teacher_stats(&self) -> Result<HeadcountStats> {
        let tables = self.tables.read().await;
        Ok(HeadcountStats::tally(
            tables
                .teachers
                .values()
                .map(|t| (t.is_active, t.gender.as_deref())),
        ))
    }

    async fn list_classes(&self, filter: &ClassFilter, window: Window) -> Result<Vec<SchoolClass>> {
        let tables = self.tables.read().await;
        let matching = tables.classes.values().filter(|c| filter.matches(c));
        Ok(window
            .slice(matching)
            .into_iter()
            .map(|c| tables.resolve_class(c))
            .collect())
    }

    async fn get_class(&self, id: i64) -> Result<Option<SchoolClass>> {
        let tables = self.tables.read().await;
        Ok(tables.classes.get(&id).map(|c| tables.resolve_class(c)))
    }

    async fn create_class(&self, class: NewClass) -> Result<SchoolClass> {
        let mut tables = self.tables.write().await;
        if let Some(teacher_id) = class.class_teacher_id {
            tables.require_teacher(teacher_id)?;
        }
        if tables.class_name_taken(class.class_name.trim(), None) {
            return Err(Error::Conflict("Class name already exists".to_string()));
        }

        let id = next(&mut tables.sequences.classes);
        let class = class.into_class(id, Utc::now());
        tables.classes.insert(id, class.clone());
        Ok(tables.resolve_class(&class))
    }

    async fn update_class(&self, id: i64, patch: ClassPatch) -> Result<SchoolClass> {
        let mut tables = self.tables.write().await;
        let mut class = tables
            .classes
            .get(&id)
            .cloned()
            .ok_or(Error::NotFound("Class"))?;
        if let Some(teacher_id) = patch.target_teacher() {
            tables.require_teacher(teacher_id)?;
        }

        patch.apply(&mut class);
        if tables.class_name_taken(&class.class_name, Some(id)) {
            return Err(Error::Conflict("Class name already exists".to_string()));
        }

        tables.classes.insert(id, class.clone());
        Ok(tables.resolve_class(&class))
    }

    async fn delete_class(&self, id: i64) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.classes.remove(&id).ok_or(Error::NotFound("Class"))?;
        for student in tables.students.values_mut() {
            if student.class_id == Some(id) {
                student.class_id = None;
            }
        }
        Ok(())
    }

    async fn class_stats(&self) -> Result<ClassStats> {
        Ok(ClassStats::tally(self.tables.read().await.classes.values()))
    }

    async fn list_exams(&self, filter: &ExamFilter, window: Window) -> Result<Vec<Exam>> {
        let tables = self.tables.read().await;
        let mut matching: Vec<&Exam> = tables.exams.iter().filter(|e| filter.matches(e)).collect();
        matching.sort_by(|a, b| Exam::schedule_order(a, b));
        Ok(window.slice(matching.into_iter().cloned()))
    }

    async fn get_exam(&self, id: &str) -> Result<Option<Exam>> {
        Ok(self
            .tables
            .read()
            .await
            .exams
            .iter()
            .find(|e| e.id == id)
            .cloned())
    }

    async fn create_exam(&self, exam: NewExam) -> Result<Exam> {
        let exam = exam.into_exam(Utc::now());
        self.tables.write().await.exams.push(exam.clone());
        Ok(exam)
    }

    async fn update_exam(&self, id: &str, patch: ExamPatch) -> Result<Exam> {
        let mut tables = self.tables.write().await;
        let exam = tables
            .exams
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(Error::NotFound("Exam"))?;
        patch.apply(exam, Utc::now());
        Ok(exam.clone())
    }

    async fn delete_exam(&self, id: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        let before = tables.exams.len();
        tables.exams.retain(|e| e.id != id);
        if tables.exams.len() == before {
            return Err(Error::NotFound("Exam"));
        }
        Ok(())
    }

    async fn exam_stats(&self, academic_year: Option<&str>) -> Result<ExamStats> {
        let tables = self.tables.read().await;
        Ok(ExamStats::tally(
            tables
                .exams
                .iter()
                .filter(|e| academic_year.map_or(true, |y| e.academic_year == y))
                .map(|e| e.status),
        ))
    }

    async fn list_applications(
        &self,
        filter: &ApplicationFilter,
        window: Window,
    ) -> Result<Vec<Application>> {
        let tables = self.tables.read().await;
        let newest_first = tables
            .applications
            .iter()
            .rev()
            .filter(|a| filter.matches(a))
            .cloned();
        Ok(window.slice(newest_first))
    }

    async fn get_application(&self, id: &str) -> Result<Option<Application>> {
        Ok(self
            .tables
            .read()
            .await
            .applications
            .iter()
            .find(|a| a.id == id)
            .cloned())
    }

    async fn create_application(&self, application: NewApplication) -> Result<Application> {
        let application = application.into_application(Utc::now());
        self.tables
            .write()
            .await
            .applications
            .push(application.clone());
        Ok(application)
    }

    async fn update_application(&self, id: &str, patch: ApplicationPatch) -> Result<Application> {
        let mut tables = self.tables.write().await;
        let application = tables
            .applications
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(Error::NotFound("Application"))?;
        patch.apply(application, Utc::now());
        Ok(application.clone())
    }

    async fn delete_application(&self, id: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        let before = tables.applications.len();
        tables.applications.retain(|a| a.id != id);
        if tables.applications.len() == before {
            return Err(Error::NotFound("Application"));
        }
        Ok(())
    }

    async fn application_stats(&self) -> Result<ApplicationStats> {
        let tables = self.tables.read().await;
        Ok(ApplicationStats::tally(
            tables.applications.iter().map(|a| a.status),
        ))
    }

    async fn list_contacts(
        &self,
        filter: &ContactFilter,
        window: Window,
    ) -> Result<Vec<ContactRequest>> {
        let tables = self.tables.read().await;
        let newest_first = tables
            .contacts
            .iter()
            .rev()
            .filter(|c| filter.matches(c))
            .cloned();
        Ok(window.slice(newest_first))
    }

    async fn get_contact(&self, id: &str) -> Result<Option<ContactRequest>> {
        Ok(self
            .tables
            .read()
            .await
            .contacts
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn create_contact(&self, contact: NewContactRequest) -> Result<ContactRequest> {
        let contact = contact.into_contact(Utc::now());
        self.tables.write().await.contacts.push(contact.clone());
        Ok(contact)
    }

    async fn update_contact(&self, id: &str, patch: ContactPatch) -> Result<ContactRequest> {
        let mut tables = self.tables.write().await;
        let contact = tables
            .contacts
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(Error::NotFound("Contact"))?;
        patch.apply(contact, Utc::now());
        Ok(contact.clone())
    }

    async fn delete_contact(&self, id: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        let before = tables.contacts.len();
        tables.contacts.retain(|c| c.id != id);
        if tables.contacts.len() == before {
            return Err(Error::NotFound("Contact"));
        }
        Ok(())
    }

    async fn contact_stats(&self) -> Result<ContactStats> {
        let tables = self.tables.read().await;
        Ok(ContactStats::tally(tables.contacts.iter().map(|c| c.status)))
    }

    async fn list_pages(&self) -> Result<Vec<PageSummary>> {
        let tables = self.tables.read().await;
        let mut counts: BTreeMap<&str, i64> = BTreeMap::new();
        for section in tables.sections.values() {
            *counts.entry(section.page_slug.as_str()).or_default() += 1;
        }
        Ok(counts
            .into_iter()
            .map(|(page_slug, section_count)| PageSummary {
                page_slug: page_slug.to_string(),
                section_count,
            })
            .collect())
    }

    async fn page_sections(&self, page_slug: &str, active_only: bool) -> Result<Vec<PageSection>> {
        let tables = self.tables.read().await;
        let mut sections: Vec<PageSection> = tables
            .sections
            .values()
            .filter(|s| s.page_slug == page_slug && (!active_only || s.is_active))
            .cloned()
            .collect();
        sections.sort_by(PageSection::page_order);
        Ok(sections)
    }

    async fn get_section(&self, id: i64) -> Result<Option<PageSection>> {
        Ok(self.tables.read().await.sections.get(&id).cloned())
    }

    async fn create_section(&self, section: NewSection) -> Result<PageSection> {
        let mut tables = self.tables.write().await;
        if tables.section_key_taken(&section.page_slug, &section.section_key) {
            return Err(Error::Conflict(
                "Section already exists for this page".to_string(),
            ));
        }
        let id = next(&mut tables.sequences.sections);
        let section = section.into_section(id, Utc::now());
        tables.sections.insert(id, section.clone());
        Ok(section)
    }

    async fn update_section(&self, id: i64, patch: SectionPatch) -> Result<PageSection> {
        let mut tables = self.tables.write().await;
        let section = tables
            .sections
            .get_mut(&id)
            .ok_or(Error::NotFound("Section"))?;
        patch.apply(section, Utc::now());
        Ok(section.clone())
    }

    async fn delete_section(&self, id: i64) -> Result<PageSection> {
        self.tables
            .write()
            .await
            .sections
            .remove(&id)
            .ok_or(Error::NotFound("Section"))
    }

    async fn replace_page(
        &self,
        page_slug: &str,
        sections: Vec<NewSection>,
    ) -> Result<Vec<PageSection>> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();

        // Validate the whole batch before touching the table
        let mut keys = std::collections::HashSet::new();
        for section in &sections {
            if section.page_slug != page_slug || !keys.insert(section.section_key.as_str()) {
                return Err(Error::Validation(format!(
                    "Duplicate or misplaced section '{}' in page '{}'",
                    section.section_key, page_slug
                )));
            }
        }

        tables.sections.retain(|_, s| s.page_slug != page_slug);
        let mut created = Vec::with_capacity(sections.len());
        for section in sections {
            let id = next(&mut tables.sequences.sections);
            let section = section.into_section(id, now);
            tables.sections.insert(id, section.clone());
            created.push(section);
        }
        created.sort_by(PageSection::page_order);
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::{Permission, Role};
    use serde_json::json;

    fn new_admin(username: &str, role: Role) -> NewAdmin {
        NewAdmin {
            username: username.to_string(),
            password_hash: "x".to_string(),
            role,
            full_name: None,
        }
    }

    #[tokio::test]
    async fn test_admin_ids_and_unique_username() {
        let store = MemoryStore::new();
        let first = store.create_admin(new_admin("head", Role::Principal)).await.unwrap();
        assert_eq!(first.admin_id.as_deref(), Some("ADM-001"));

        let duplicate = store.create_admin(new_admin("head", Role::Principal)).await;
        assert!(matches!(duplicate, Err(Error::Conflict(_))));
    }

    #[tokio::test]
    async fn test_last_principal_protected() {
        let store = MemoryStore::new();
        let head = store.create_admin(new_admin("head", Role::Principal)).await.unwrap();

        assert!(matches!(
            store.delete_admin(head.id).await,
            Err(Error::LastPrincipal(_))
        ));

        let demote = AdminChanges {
            role: Some(Role::admin([Permission::ViewDashboard])),
            ..Default::default()
        };
        assert!(matches!(
            store.update_admin(head.id, demote.clone()).await,
            Err(Error::LastPrincipal(_))
        ));

        let deputy = store.create_admin(new_admin("deputy", Role::Principal)).await.unwrap();
        store.update_admin(head.id, demote).await.unwrap();
        assert!(matches!(
            store.delete_admin(deputy.id).await,
            Err(Error::LastPrincipal(_))
        ));
    }

    #[tokio::test]
    async fn test_sequences_never_reuse() {
        let store = MemoryStore::new();
        let first = store
            .create_student(NewStudent {
                name: "A".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        store.delete_student(first.id).await.unwrap();

        let second = store
            .create_student(NewStudent {
                name: "B".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(second.student_id, "ST-002");
    }

    #[tokio::test]
    async fn test_student_class_must_exist() {
        let store = MemoryStore::new();
        let result = store
            .create_student(NewStudent {
                name: "A".to_string(),
                class_id: Some(42),
                ..Default::default()
            })
            .await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_deleting_teacher_unassigns_class() {
        let store = MemoryStore::new();
        let teacher = store
            .create_teacher(NewTeacher {
                name: "A. Rao".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        let class = store
            .create_class(NewClass {
                class_name: "5-A".to_string(),
                class_teacher_id: Some(teacher.id),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(class.class_teacher_name.as_deref(), Some("A. Rao"));

        let teacher = store.get_teacher(teacher.id).await.unwrap().unwrap();
        assert_eq!(teacher.assigned_class_names, vec!["5-A"]);

        store.delete_teacher(teacher.id).await.unwrap();
        let class = store.get_class(class.id).await.unwrap().unwrap();
        assert_eq!(class.class_teacher_id, None);
        assert_eq!(class.class_teacher_name, None);
    }

    #[tokio::test]
    async fn test_replace_page_is_atomic() {
        let store = MemoryStore::new();
        let section = |key: &str, slug: &str| NewSection {
            page_slug: slug.to_string(),
            section_key: key.to_string(),
            content: json!({}),
            order_index: 0,
            is_active: true,
        };
        store.create_section(section("hero", "about")).await.unwrap();

        let bad = vec![section("a", "about"), section("a", "about")];
        assert!(store.replace_page("about", bad).await.is_err());
        assert_eq!(store.page_sections("about", false).await.unwrap().len(), 1);

        let good = vec![section("a", "about"), section("b", "about")];
        let created = store.replace_page("about", good).await.unwrap();
        assert_eq!(created.len(), 2);
        let keys: Vec<String> = store
            .page_sections("about", false)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.section_key)
            .collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_section_key_unique_per_page() {
        let store = MemoryStore::new();
        let hero = |slug: &str| NewSection {
            page_slug: slug.to_string(),
            section_key: "hero".to_string(),
            content: json!({}),
            order_index: 0,
            is_active: true,
        };
        store.create_section(hero("about")).await.unwrap();
        store.create_section(hero("contact")).await.unwrap();
        assert!(matches!(
            store.create_section(hero("about")).await,
            Err(Error::Conflict(_))
        ));
    }
}
