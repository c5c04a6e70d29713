//! PostgreSQL store

use async_trait::async_trait;
use chrono::Utc;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_postgres::error::SqlState;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls, Row};

use super::Store;
use crate::auth::models::{Admin, AdminChanges, NewAdmin, Role};
use crate::error::{Error, Result};
use crate::models::*;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS admins (
    id            BIGSERIAL PRIMARY KEY,
    admin_id      TEXT UNIQUE,
    username      TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    role          TEXT NOT NULL DEFAULT 'ADMIN',
    permissions   TEXT[] NOT NULL DEFAULT '{view_dashboard}',
    full_name     TEXT,
    profile_image TEXT,
    is_active     BOOLEAN NOT NULL DEFAULT TRUE,
    created_at    TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS teachers (
    id            BIGSERIAL PRIMARY KEY,
    employee_id   TEXT NOT NULL UNIQUE,
    name          TEXT NOT NULL,
    subject       TEXT,
    department    TEXT,
    gender        TEXT,
    dob           DATE,
    qualification TEXT,
    experience    TEXT,
    designation   TEXT,
    join_date     DATE,
    salary        TEXT,
    phone         TEXT,
    email         TEXT,
    address       TEXT,
    profile_image TEXT,
    is_active     BOOLEAN NOT NULL DEFAULT TRUE,
    created_at    TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE INDEX IF NOT EXISTS ix_teacher_dept_active ON teachers (department, is_active);

CREATE TABLE IF NOT EXISTS classes (
    id               BIGSERIAL PRIMARY KEY,
    class_name       TEXT NOT NULL UNIQUE,
    grade            TEXT,
    section          TEXT,
    class_teacher_id BIGINT REFERENCES teachers (id) ON DELETE SET NULL,
    room_number      TEXT,
    capacity         INTEGER NOT NULL DEFAULT 40,
    is_active        BOOLEAN NOT NULL DEFAULT TRUE,
    created_at       TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS students (
    id                BIGSERIAL PRIMARY KEY,
    student_id        TEXT NOT NULL UNIQUE,
    roll_no           TEXT,
    name              TEXT NOT NULL,
    class_id          BIGINT REFERENCES classes (id) ON DELETE SET NULL,
    section           TEXT,
    dob               DATE,
    gender            TEXT,
    blood_group       TEXT,
    religion          TEXT,
    admission_id      TEXT UNIQUE,
    father_name       TEXT,
    father_occupation TEXT,
    mother_name       TEXT,
    mother_occupation TEXT,
    phone             TEXT,
    email             TEXT,
    address           TEXT,
    profile_image     TEXT,
    is_active         BOOLEAN NOT NULL DEFAULT TRUE,
    created_at        TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE INDEX IF NOT EXISTS ix_student_class_active ON students (class_id, is_active);

CREATE TABLE IF NOT EXISTS exams (
    id            TEXT PRIMARY KEY,
    subject       TEXT NOT NULL,
    grade         TEXT,
    academic_year TEXT NOT NULL,
    exam_date     DATE,
    start_time    TIME,
    end_time      TIME,
    duration      TEXT,
    location      TEXT,
    participants  TEXT NOT NULL DEFAULT '0',
    status        TEXT NOT NULL DEFAULT 'Scheduled',
    color         TEXT NOT NULL DEFAULT '#3B82F6',
    created_at    TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at    TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS applications (
    id              TEXT PRIMARY KEY,
    student_name    TEXT NOT NULL,
    parent_name     TEXT,
    email           TEXT,
    phone           TEXT,
    grade_applying  TEXT,
    date_of_birth   DATE,
    address         TEXT,
    previous_school TEXT,
    notes           TEXT,
    status          TEXT NOT NULL DEFAULT 'pending',
    created_at      TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at      TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS contact_requests (
    id         TEXT PRIMARY KEY,
    name       TEXT NOT NULL,
    email      TEXT,
    dial_code  TEXT NOT NULL DEFAULT '+91',
    phone      TEXT,
    subject    TEXT,
    message    TEXT,
    status     TEXT NOT NULL DEFAULT 'new',
    notes      TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS site_pages_content (
    id          BIGSERIAL PRIMARY KEY,
    page_slug   TEXT NOT NULL,
    section_key TEXT NOT NULL,
    content     TEXT NOT NULL,
    order_index INTEGER NOT NULL DEFAULT 0,
    is_active   BOOLEAN NOT NULL DEFAULT TRUE,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
    -- checked at end of statement so a page can be replaced in one statement
    CONSTRAINT site_pages_content_page_section_key
        UNIQUE (page_slug, section_key) DEFERRABLE INITIALLY IMMEDIATE
);
CREATE INDEX IF NOT EXISTS ix_page_active_order
    ON site_pages_content (page_slug, is_active, order_index);
"#;

const STUDENT_SELECT: &str = "SELECT s.*, c.class_name AS class_name \
     FROM students s LEFT JOIN classes c ON c.id = s.class_id";

const TEACHER_SELECT: &str = "SELECT t.*, ARRAY(\
         SELECT c.class_name FROM classes c WHERE c.class_teacher_id = t.id ORDER BY c.id\
     ) AS assigned_class_names \
     FROM teachers t";

const CLASS_SELECT: &str = "SELECT c.*, t.name AS class_teacher_name, \
     (SELECT COUNT(*) FROM students s WHERE s.class_id = c.id) AS student_count \
     FROM classes c LEFT JOIN teachers t ON t.id = c.class_teacher_id";

const SECTION_COLUMNS: &str =
    "id, page_slug, section_key, content, order_index, is_active, created_at, updated_at";

/// Translate constraint violations into client errors
fn map_db_error(err: tokio_postgres::Error) -> Error {
    let constraint = err
        .as_db_error()
        .and_then(|db| db.constraint())
        .unwrap_or_default()
        .to_string();

    match err.code() {
        Some(code) if *code == SqlState::UNIQUE_VIOLATION => {
            let message = match constraint.as_str() {
                "admins_username_key" => "Username already exists",
                "classes_class_name_key" => "Class name already exists",
                "students_admission_id_key" => "Admission ID already exists",
                "site_pages_content_page_section_key" => "Section already exists for this page",
                _ => "Record already exists",
            };
            Error::Conflict(message.to_string())
        }
        Some(code) if *code == SqlState::FOREIGN_KEY_VIOLATION => {
            let message = match constraint.as_str() {
                "students_class_id_fkey" => "Referenced class does not exist",
                "classes_class_teacher_id_fkey" => "Referenced teacher does not exist",
                _ => "Referenced record does not exist",
            };
            Error::Validation(message.to_string())
        }
        _ => Error::Database(err),
    }
}

/// Parse a status or role column, treating bad data as a server fault
fn parse_stored<T: FromStr<Err = Error>>(raw: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| Error::Other(format!("Unexpected stored value: {}", raw)))
}

/// Escape LIKE wildcards in user search input
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

type Param = Box<dyn ToSql + Sync + Send>;

/// WHERE clause builder with positional parameters
#[derive(Default)]
struct Conditions {
    clauses: Vec<String>,
    params: Vec<Param>,
}

impl Conditions {
    /// Add a clause; every `{}` in it refers to `value`
    fn add<T: ToSql + Sync + Send + 'static>(&mut self, clause: &str, value: T) {
        self.params.push(Box::new(value));
        let placeholder = format!("${}", self.params.len());
        self.clauses.push(clause.replace("{}", &placeholder));
    }

    fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    fn window_sql(&mut self, window: Window) -> String {
        let mut sql = String::new();
        if let Some(limit) = window.sql_limit() {
            self.params.push(Box::new(limit));
            sql.push_str(&format!(" LIMIT ${}", self.params.len()));
        }
        self.params.push(Box::new(window.sql_offset()));
        sql.push_str(&format!(" OFFSET ${}", self.params.len()));
        sql
    }

    fn params(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect()
    }
}

/// `UPDATE ... SET` builder that writes only the columns a patch names.
///
/// Assignments and the trailing WHERE clause share one parameter list, so
/// two patches touching different columns of the same row never overwrite
/// each other.
struct Update {
    table: &'static str,
    assignments: Vec<String>,
    conditions: Conditions,
}

impl Update {
    fn new(table: &'static str) -> Self {
        Self {
            table,
            assignments: Vec::new(),
            conditions: Conditions::default(),
        }
    }

    /// Queue `column = value` when the patch carries a value
    fn set<T: ToSql + Sync + Send + 'static>(&mut self, column: &str, value: Option<T>) {
        if let Some(value) = value {
            self.conditions.params.push(Box::new(value));
            self.assignments
                .push(format!("{} = ${}", column, self.conditions.params.len()));
        }
    }

    /// Extra WHERE clause without parameters
    fn guard(&mut self, clause: &str) {
        self.conditions.clauses.push(clause.to_string());
    }

    fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    fn sql(&self) -> String {
        format!(
            "UPDATE {} SET {}{}",
            self.table,
            self.assignments.join(", "),
            self.conditions.where_sql()
        )
    }
}

fn admin_from_row(row: &Row) -> Result<Admin> {
    let role: String = row.try_get("role")?;
    let permissions: Vec<String> = row.try_get("permissions")?;
    Ok(Admin {
        id: row.try_get("id")?,
        admin_id: row.try_get("admin_id")?,
        username: row.try_get("username")?,
        password_hash: row.try_get("password_hash")?,
        role: Role::from_stored(&role, &permissions)
            .map_err(|_| Error::Other(format!("Unexpected stored role: {}", role)))?,
        full_name: row.try_get("full_name")?,
        profile_image: row.try_get("profile_image")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
    })
}

fn student_from_row(row: &Row) -> Result<Student> {
    Ok(Student {
        id: row.try_get("id")?,
        student_id: row.try_get("student_id")?,
        roll_no: row.try_get("roll_no")?,
        name: row.try_get("name")?,
        class_id: row.try_get("class_id")?,
        class_name: row.try_get("class_name")?,
        section: row.try_get("section")?,
        dob: row.try_get("dob")?,
        gender: row.try_get("gender")?,
        blood_group: row.try_get("blood_group")?,
        religion: row.try_get("religion")?,
        admission_id: row.try_get("admission_id")?,
        father_name: row.try_get("father_name")?,
        father_occupation: row.try_get("father_occupation")?,
        mother_name: row.try_get("mother_name")?,
        mother_occupation: row.try_get("mother_occupation")?,
        phone: row.try_get("phone")?,
        email: row.try_get("email")?,
        address: row.try_get("address")?,
        profile_image: row.try_get("profile_image")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
    })
}

fn teacher_from_row(row: &Row) -> Result<Teacher> {
    Ok(Teacher {
        id: row.try_get("id")?,
        employee_id: row.try_get("employee_id")?,
        name: row.try_get("name")?,
        subject: row.try_get("subject")?,
        department: row.try_get("department")?,
        gender: row.try_get("gender")?,
        dob: row.try_get("dob")?,
        qualification: row.try_get("qualification")?,
        experience: row.try_get("experience")?,
        designation: row.try_get("designation")?,
        join_date: row.try_get("join_date")?,
        salary: row.try_get("salary")?,
        phone: row.try_get("phone")?,
        email: row.try_get("email")?,
        address: row.try_get("address")?,
        profile_image: row.try_get("profile_image")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        assigned_class_names: row.try_get("assigned_class_names")?,
    })
}

fn class_from_row(row: &Row) -> Result<SchoolClass> {
    Ok(SchoolClass {
        id: row.try_get("id")?,
        class_name: row.try_get("class_name")?,
        grade: row.try_get("grade")?,
        section: row.try_get("section")?,
        class_teacher_id: row.try_get("class_teacher_id")?,
        class_teacher_name: row.try_get("class_teacher_name")?,
        room_number: row.try_get("room_number")?,
        capacity: row.try_get("capacity")?,
        is_active: row.try_get("is_active")?,
        student_count: row.try_get("student_count")?,
        created_at: row.try_get("created_at")?,
    })
}

fn exam_from_row(row: &Row) -> Result<Exam> {
    let status: String = row.try_get("status")?;
    Ok(Exam {
        id: row.try_get("id")?,
        subject: row.try_get("subject")?,
        grade: row.try_get("grade")?,
        academic_year: row.try_get("academic_year")?,
        exam_date: row.try_get("exam_date")?,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
        duration: row.try_get("duration")?,
        location: row.try_get("location")?,
        participants: row.try_get("participants")?,
        status: parse_stored(&status)?,
        color: row.try_get("color")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn application_from_row(row: &Row) -> Result<Application> {
    let status: String = row.try_get("status")?;
    Ok(Application {
        id: row.try_get("id")?,
        student_name: row.try_get("student_name")?,
        parent_name: row.try_get("parent_name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        grade_applying: row.try_get("grade_applying")?,
        date_of_birth: row.try_get("date_of_birth")?,
        address: row.try_get("address")?,
        previous_school: row.try_get("previous_school")?,
        notes: row.try_get("notes")?,
        status: parse_stored(&status)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn contact_from_row(row: &Row) -> Result<ContactRequest> {
    let status: String = row.try_get("status")?;
    Ok(ContactRequest {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        dial_code: row.try_get("dial_code")?,
        phone: row.try_get("phone")?,
        subject: row.try_get("subject")?,
        message: row.try_get("message")?,
        status: parse_stored(&status)?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn section_from_row(row: &Row) -> Result<PageSection> {
    let content: String = row.try_get("content")?;
    Ok(PageSection {
        id: row.try_get("id")?,
        page_slug: row.try_get("page_slug")?,
        section_key: row.try_get("section_key")?,
        content: serde_json::from_str(&content)?,
        order_index: row.try_get("order_index")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn collect<T>(rows: &[Row], map: fn(&Row) -> Result<T>) -> Result<Vec<T>> {
    rows.iter().map(map).collect()
}

pub struct PgStore {
    client: Arc<Client>,
    /// Serializes principal-count-sensitive admin writes within this process
    role_guard: Mutex<()>,
}

impl PgStore {
    /// Connect and spawn the connection driver
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self> {
        let (client, connection) = tokio::time::timeout(timeout, tokio_postgres::connect(url, NoTls))
            .await
            .map_err(|_| {
                Error::Config(format!(
                    "Timed out connecting to database after {}s",
                    timeout.as_secs()
                ))
            })??;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("PostgreSQL connection error: {}", e);
            }
        });

        Ok(Self {
            client: Arc::new(client),
            role_guard: Mutex::new(()),
        })
    }

    /// Create tables and indexes that do not exist yet
    pub async fn migrate(&self) -> Result<()> {
        self.client.batch_execute(SCHEMA).await?;
        tracing::info!("database schema is up to date");
        Ok(())
    }

    async fn next_id(&self, table: &str) -> Result<i64> {
        let row = self
            .client
            .query_one("SELECT nextval(pg_get_serial_sequence($1, 'id'))", &[&table])
            .await?;
        Ok(row.try_get(0)?)
    }

    async fn count_principals(&self) -> Result<i64> {
        let row = self
            .client
            .query_one("SELECT COUNT(*) FROM admins WHERE role = 'PRINCIPAL'", &[])
            .await?;
        Ok(row.try_get(0)?)
    }

    async fn insert_student(&self, student: &Student) -> Result<()> {
        let sql = "INSERT INTO students (id, student_id, roll_no, name, class_id, section, dob, gender, \
         blood_group, religion, admission_id, father_name, father_occupation, mother_name, \
         mother_occupation, phone, email, address, profile_image, is_active, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, \
         $18, $19, $20, $21)";
        self.client
            .execute(
                sql,
                &[
                    &student.id,
                    &student.student_id,
                    &student.roll_no,
                    &student.name,
                    &student.class_id,
                    &student.section,
                    &student.dob,
                    &student.gender,
                    &student.blood_group,
                    &student.religion,
                    &student.admission_id,
                    &student.father_name,
                    &student.father_occupation,
                    &student.mother_name,
                    &student.mother_occupation,
                    &student.phone,
                    &student.email,
                    &student.address,
                    &student.profile_image,
                    &student.is_active,
                    &student.created_at,
                ],
            )
            .await
            .map_err(map_db_error)?;
        Ok(())
    }

    async fn insert_teacher(&self, teacher: &Teacher) -> Result<()> {
        let sql = "INSERT INTO teachers (id, employee_id, name, subject, department, gender, dob, \
         qualification, experience, designation, join_date, salary, phone, email, address, \
         profile_image, is_active, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)";
        self.client
            .execute(
                sql,
                &[
                    &teacher.id,
                    &teacher.employee_id,
                    &teacher.name,
                    &teacher.subject,
                    &teacher.department,
                    &teacher.gender,
                    &teacher.dob,
                    &teacher.qualification,
                    &teacher.experience,
                    &teacher.designation,
                    &teacher.join_date,
                    &teacher.salary,
                    &teacher.phone,
                    &teacher.email,
                    &teacher.address,
                    &teacher.profile_image,
                    &teacher.is_active,
                    &teacher.created_at,
                ],
            )
            .await
            .map_err(map_db_error)?;
        Ok(())
    }

    async fn insert_class(&self, class: &SchoolClass) -> Result<()> {
        let sql = "INSERT INTO classes (id, class_name, grade, section, class_teacher_id, room_number, \
         capacity, is_active, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)";
        self.client
            .execute(
                sql,
                &[
                    &class.id,
                    &class.class_name,
                    &class.grade,
                    &class.section,
                    &class.class_teacher_id,
                    &class.room_number,
                    &class.capacity,
                    &class.is_active,
                    &class.created_at,
                ],
            )
            .await
            .map_err(map_db_error)?;
        Ok(())
    }

    async fn insert_exam(&self, exam: &Exam) -> Result<()> {
        let sql = "INSERT INTO exams (id, subject, grade, academic_year, exam_date, start_time, end_time, \
         duration, location, participants, status, color, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)";
        self.client
            .execute(
                sql,
                &[
                    &exam.id,
                    &exam.subject,
                    &exam.grade,
                    &exam.academic_year,
                    &exam.exam_date,
                    &exam.start_time,
                    &exam.end_time,
                    &exam.duration,
                    &exam.location,
                    &exam.participants,
                    &exam.status.as_str(),
                    &exam.color,
                    &exam.created_at,
                    &exam.updated_at,
                ],
            )
            .await
            .map_err(map_db_error)?;
        Ok(())
    }

    async fn insert_application(&self, application: &Application) -> Result<()> {
        let sql = "INSERT INTO applications (id, student_name, parent_name, email, phone, grade_applying, \
         date_of_birth, address, previous_school, notes, status, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)";
        self.client
            .execute(
                sql,
                &[
                    &application.id,
                    &application.student_name,
                    &application.parent_name,
                    &application.email,
                    &application.phone,
                    &application.grade_applying,
                    &application.date_of_birth,
                    &application.address,
                    &application.previous_school,
                    &application.notes,
                    &application.status.as_str(),
                    &application.created_at,
                    &application.updated_at,
                ],
            )
            .await
            .map_err(map_db_error)?;
        Ok(())
    }

    async fn insert_contact(&self, contact: &ContactRequest) -> Result<()> {
        let sql = "INSERT INTO contact_requests (id, name, email, dial_code, phone, subject, message, \
         status, notes, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)";
        self.client
            .execute(
                sql,
                &[
                    &contact.id,
                    &contact.name,
                    &contact.email,
                    &contact.dial_code,
                    &contact.phone,
                    &contact.subject,
                    &contact.message,
                    &contact.status.as_str(),
                    &contact.notes,
                    &contact.created_at,
                    &contact.updated_at,
                ],
            )
            .await
            .map_err(map_db_error)?;
        Ok(())
    }

    /// Run `update` against row `id`, returning false when no row matched.
    /// An update with nothing to set is not sent.
    async fn execute_update<K: ToSql + Sync + Send + 'static>(
        &self,
        mut update: Update,
        id: K,
    ) -> Result<bool> {
        if update.is_empty() {
            return Ok(true);
        }
        update.conditions.add("id = {}", id);
        let updated = self
            .client
            .execute(&update.sql(), &update.conditions.params())
            .await
            .map_err(map_db_error)?;
        Ok(updated > 0)
    }

    async fn delete_by_id<T: ToSql + Sync>(
        &self,
        sql: &str,
        id: &T,
        what: &'static str,
    ) -> Result<()> {
        let deleted = self.client.execute(sql, &[id]).await.map_err(map_db_error)?;
        if deleted == 0 {
            return Err(Error::NotFound(what));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<()> {
        self.client.simple_query("SELECT 1").await?;
        Ok(())
    }

    async fn list_admins(&self) -> Result<Vec<Admin>> {
        let rows = self
            .client
            .query("SELECT * FROM admins ORDER BY id", &[])
            .await?;
        collect(&rows, admin_from_row)
    }

    async fn get_admin(&self, id: i64) -> Result<Option<Admin>> {
        let row = self
            .client
            .query_opt("SELECT * FROM admins WHERE id = $1", &[&id])
            .await?;
        row.as_ref().map(admin_from_row).transpose()
    }

    async fn find_admin_by_username(&self, username: &str) -> Result<Option<Admin>> {
        let row = self
            .client
            .query_opt("SELECT * FROM admins WHERE username = $1", &[&username])
            .await?;
        row.as_ref().map(admin_from_row).transpose()
    }

    async fn has_principal(&self) -> Result<bool> {
        Ok(self.count_principals().await? > 0)
    }

    async fn create_admin(&self, admin: NewAdmin) -> Result<Admin> {
        let id = self.next_id("admins").await?;
        let row = self
            .client
            .query_one(
                "INSERT INTO admins (id, admin_id, username, password_hash, role, permissions, full_name) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
                &[
                    &id,
                    &format!("ADM-{:03}", id),
                    &admin.username,
                    &admin.password_hash,
                    &admin.role.kind().as_str(),
                    &admin.role.permission_names(),
                    &admin.full_name,
                ],
            )
            .await
            .map_err(map_db_error)?;
        admin_from_row(&row)
    }

    async fn update_admin(&self, id: i64, changes: AdminChanges) -> Result<Admin> {
        let _guard = self.role_guard.lock().await;
        let demoting = matches!(changes.role, Some(Role::Admin { .. }));

        let mut update = Update::new("admins");
        update.set("password_hash", changes.password_hash);
        if let Some(role) = &changes.role {
            update.set("role", Some(role.kind().as_str()));
            update.set("permissions", Some(role.permission_names()));
        }
        update.set("full_name", changes.full_name);
        update.set("profile_image", changes.profile_image);
        update.set("is_active", changes.is_active);
        if demoting {
            // No-op if another writer removed the other principals meanwhile
            update.guard(
                "(role <> 'PRINCIPAL' OR \
                 (SELECT COUNT(*) FROM admins WHERE role = 'PRINCIPAL') > 1)",
            );
        }

        if !self.execute_update(update, id).await? {
            return match self.get_admin(id).await? {
                Some(_) if demoting => Err(Error::LastPrincipal("Cannot demote the last Principal")),
                _ => Err(Error::NotFound("Admin")),
            };
        }
        self.get_admin(id).await?.ok_or(Error::NotFound("Admin"))
    }

    async fn delete_admin(&self, id: i64) -> Result<()> {
        let _guard = self.role_guard.lock().await;
        let deleted = self
            .client
            .execute(
                "DELETE FROM admins WHERE id = $1 AND (role <> 'PRINCIPAL' OR \
                     (SELECT COUNT(*) FROM admins WHERE role = 'PRINCIPAL') > 1)",
                &[&id],
            )
            .await?;

        if deleted == 0 {
            return match self.get_admin(id).await? {
                Some(_) => Err(Error::LastPrincipal("Cannot delete the last Principal")),
                None => Err(Error::NotFound("Admin")),
            };
        }
        Ok(())
    }

    async fn list_students(&self, filter: &StudentFilter, window: Window) -> Result<Vec<Student>> {
        let mut conditions = Conditions::default();
        if let Some(class_id) = filter.class_id {
            conditions.add("s.class_id = {}", class_id);
        }
        if let Some(is_active) = filter.is_active {
            conditions.add("s.is_active = {}", is_active);
        }
        if let Some(term) = filter.search_term() {
            conditions.add(
                "(s.name ILIKE {} OR s.student_id ILIKE {})",
                like_pattern(term),
            );
        }

        let mut sql = format!("{}{} ORDER BY s.id", STUDENT_SELECT, conditions.where_sql());
        sql.push_str(&conditions.window_sql(window));
        let rows = self.client.query(&sql, &conditions.params()).await?;
        collect(&rows, student_from_row)
    }

    async fn get_student(&self, id: i64) -> Result<Option<Student>> {
        let sql = format!("{} WHERE s.id = $1", STUDENT_SELECT);
        let row = self.client.query_opt(&sql, &[&id]).await?;
        row.as_ref().map(student_from_row).transpose()
    }

    async fn create_student(&self, student: NewStudent) -> Result<Student> {
        let id = self.next_id("students").await?;
        let student = student.into_student(id, id, Utc::now());
        self.insert_student(&student).await?;
        self.get_student(id).await?.ok_or(Error::NotFound("Student"))
    }

    async fn update_student(&self, id: i64, patch: StudentPatch) -> Result<Student> {
        let mut update = Update::new("students");
        update.set("name", patch.name);
        update.set("roll_no", patch.roll_no);
        update.set("class_id", patch.class_id);
        update.set("section", patch.section);
        update.set("dob", patch.dob);
        update.set("gender", patch.gender);
        update.set("blood_group", patch.blood_group);
        update.set("religion", patch.religion);
        update.set("father_name", patch.father_name);
        update.set("father_occupation", patch.father_occupation);
        update.set("mother_name", patch.mother_name);
        update.set("mother_occupation", patch.mother_occupation);
        update.set("phone", patch.phone);
        update.set("email", patch.email);
        update.set("address", patch.address);
        update.set("profile_image", patch.profile_image);
        update.set("is_active", patch.is_active);

        if !self.execute_update(update, id).await? {
            return Err(Error::NotFound("Student"));
        }
        self.get_student(id).await?.ok_or(Error::NotFound("Student"))
    }

    async fn delete_student(&self, id: i64) -> Result<()> {
        self.delete_by_id("DELETE FROM students WHERE id = $1", &id, "Student")
            .await
    }

    async fn student_stats(&self) -> Result<HeadcountStats> {
        let row = self
            .client
            .query_one(
                "SELECT COUNT(*), \
                 COUNT(*) FILTER (WHERE is_active), \
                 COUNT(*) FILTER (WHERE NOT is_active), \
                 COUNT(*) FILTER (WHERE lower(gender) = 'male'), \
                 COUNT(*) FILTER (WHERE lower(gender) = 'female') \
                 FROM students",
                &[],
            )
            .await?;
        Ok(HeadcountStats {
            total: row.try_get(0)?,
            active: row.try_get(1)?,
            inactive: row.try_get(2)?,
            male: row.try_get(3)?,
            female: row.try_get(4)?,
        })
    }

    async fn list_teachers(&self, filter: &TeacherFilter, window: Window) -> Result<Vec<Teacher>> {
        let mut conditions = Conditions::default();
        if let Some(department) = filter.department.clone().filter(|d| !d.is_empty()) {
            conditions.add("t.department = {}", department);
        }
        if let Some(is_active) = filter.is_active {
            conditions.add("t.is_active = {}", is_active);
        }
        if let Some(term) = filter.search_term() {
            conditions.add(
                "(t.name ILIKE {} OR t.employee_id ILIKE {})",
                like_pattern(term),
            );
        }

        let mut sql = format!("{}{} ORDER BY t.id", TEACHER_SELECT, conditions.where_sql());
        sql.push_str(&conditions.window_sql(window));
        let rows = self.client.query(&sql, &conditions.params()).await?;
        collect(&rows, teacher_from_row)
    }

    async fn get_teacher(&self, id: i64) -> Result<Option<Teacher>> {
        let sql = format!("{} WHERE t.id = $1", TEACHER_SELECT);
        let row = self.client.query_opt(&sql, &[&id]).await?;
        row.as_ref().map(teacher_from_row).transpose()
    }

    async fn create_teacher(&self, teacher: NewTeacher) -> Result<Teacher> {
        let id = self.next_id("teachers").await?;
        let teacher = teacher.into_teacher(id, id, Utc::now());
        self.insert_teacher(&teacher).await?;
        Ok(teacher)
    }

    async fn update_teacher(&self, id: i64, patch: TeacherPatch) -> Result<Teacher> {
        let mut update = Update::new("teachers");
        update.set("name", patch.name);
        update.set("subject", patch.subject);
        update.set("department", patch.department);
        update.set("gender", patch.gender);
        update.set("dob", patch.dob);
        update.set("qualification", patch.qualification);
        update.set("experience", patch.experience);
        update.set("designation", patch.designation);
        update.set("join_date", patch.join_date);
        update.set("salary", patch.salary);
        update.set("phone", patch.phone);
        update.set("email", patch.email);
        update.set("address", patch.address);
        update.set("profile_image", patch.profile_image);
        update.set("is_active", patch.is_active);

        if !self.execute_update(update, id).await? {
            return Err(Error::NotFound("Teacher"));
        }
        self.get_teacher(id).await?.ok_or(Error::NotFound("Teacher"))
    }

    async fn delete_teacher(&self, id: i64) -> Result<()> {
        self.delete_by_id("DELETE FROM teachers WHERE id = $1", &id, "Teacher")
            .await
    }

    async fn teacher_stats(&self) -> Result<HeadcountStats> {
        let row = self
            .client
            .query_one(
                "SELECT COUNT(*), \
                 COUNT(*) FILTER (WHERE is_active), \
                 COUNT(*) FILTER (WHERE NOT is_active), \
                 COUNT(*) FILTER (WHERE lower(gender) = 'male'), \
                 COUNT(*) FILTER (WHERE lower(gender) = 'female') \
                 FROM teachers",
                &[],
            )
            .await?;
        Ok(HeadcountStats {
            total: row.try_get(0)?,
            active: row.try_get(1)?,
            inactive: row.try_get(2)?,
            male: row.try_get(3)?,
            female: row.try_get(4)?,
        })
    }

    async fn list_classes(&self, filter: &ClassFilter, window: Window) -> Result<Vec<SchoolClass>> {
        let mut conditions = Conditions::default();
        if let Some(is_active) = filter.is_active {
            conditions.add("c.is_active = {}", is_active);
        }

        let mut sql = format!("{}{} ORDER BY c.id", CLASS_SELECT, conditions.where_sql());
        sql.push_str(&conditions.window_sql(window));
        let rows = self.client.query(&sql, &conditions.params()).await?;
        collect(&rows, class_from_row)
    }

    async fn get_class(&self, id: i64) -> Result<Option<SchoolClass>> {
        let sql = format!("{} WHERE c.id = $1", CLASS_SELECT);
        let row = self.client.query_opt(&sql, &[&id]).await?;
        row.as_ref().map(class_from_row).transpose()
    }

    async fn create_class(&self, class: NewClass) -> Result<SchoolClass> {
        let id = self.next_id("classes").await?;
        let class = class.into_class(id, Utc::now());
        self.insert_class(&class).await?;
        self.get_class(id).await?.ok_or(Error::NotFound("Class"))
    }

    async fn update_class(&self, id: i64, patch: ClassPatch) -> Result<SchoolClass> {
        let mut update = Update::new("classes");
        update.set("class_name", patch.class_name.map(|n| n.trim().to_string()));
        update.set("grade", patch.grade);
        update.set("section", patch.section);
        update.set("class_teacher_id", patch.class_teacher_id);
        update.set("room_number", patch.room_number);
        update.set("capacity", patch.capacity);
        update.set("is_active", patch.is_active);

        if !self.execute_update(update, id).await? {
            return Err(Error::NotFound("Class"));
        }
        self.get_class(id).await?.ok_or(Error::NotFound("Class"))
    }

    async fn delete_class(&self, id: i64) -> Result<()> {
        self.delete_by_id("DELETE FROM classes WHERE id = $1", &id, "Class")
            .await
    }

    async fn class_stats(&self) -> Result<ClassStats> {
        let row = self
            .client
            .query_one(
                "SELECT COUNT(*), \
                 COUNT(*) FILTER (WHERE is_active), \
                 COUNT(*) FILTER (WHERE NOT is_active), \
                 COUNT(*) FILTER (WHERE class_teacher_id IS NULL) \
                 FROM classes",
                &[],
            )
            .await?;
        Ok(ClassStats {
            total: row.try_get(0)?,
            active: row.try_get(1)?,
            inactive: row.try_get(2)?,
            without_teacher: row.try_get(3)?,
        })
    }

    async fn list_exams(&self, filter: &ExamFilter, window: Window) -> Result<Vec<Exam>> {
        let mut conditions = Conditions::default();
        if let Some(year) = filter.academic_year.clone().filter(|y| !y.is_empty()) {
            conditions.add("academic_year = {}", year);
        }
        if let Some(status) = filter.status {
            conditions.add("status = {}", status.as_str());
        }
        if let Some(grade) = filter.grade.clone().filter(|g| !g.is_empty()) {
            conditions.add("grade = {}", grade);
        }

        let mut sql = format!(
            "SELECT * FROM exams{} ORDER BY exam_date DESC NULLS LAST, created_at",
            conditions.where_sql()
        );
        sql.push_str(&conditions.window_sql(window));
        let rows = self.client.query(&sql, &conditions.params()).await?;
        collect(&rows, exam_from_row)
    }

    async fn get_exam(&self, id: &str) -> Result<Option<Exam>> {
        let row = self
            .client
            .query_opt("SELECT * FROM exams WHERE id = $1", &[&id])
            .await?;
        row.as_ref().map(exam_from_row).transpose()
    }

    async fn create_exam(&self, exam: NewExam) -> Result<Exam> {
        let exam = exam.into_exam(Utc::now());
        self.insert_exam(&exam).await?;
        Ok(exam)
    }

    async fn update_exam(&self, id: &str, patch: ExamPatch) -> Result<Exam> {
        let mut update = Update::new("exams");
        update.set("subject", patch.subject);
        update.set("grade", patch.grade);
        update.set("academic_year", patch.academic_year);
        update.set("exam_date", patch.exam_date);
        update.set("start_time", time_change(patch.start_time));
        update.set("end_time", time_change(patch.end_time));
        update.set("duration", patch.duration);
        update.set("location", patch.location);
        update.set("participants", patch.participants);
        update.set("status", patch.status.map(|s| s.as_str()));
        update.set("color", patch.color);
        update.set("updated_at", Some(Utc::now()));

        if !self.execute_update(update, id.to_string()).await? {
            return Err(Error::NotFound("Exam"));
        }
        self.get_exam(id).await?.ok_or(Error::NotFound("Exam"))
    }

    async fn delete_exam(&self, id: &str) -> Result<()> {
        self.delete_by_id("DELETE FROM exams WHERE id = $1", &id, "Exam")
            .await
    }

    async fn exam_stats(&self, academic_year: Option<&str>) -> Result<ExamStats> {
        let row = self
            .client
            .query_one(
                "SELECT COUNT(*), \
                 COUNT(*) FILTER (WHERE status = 'Scheduled'), \
                 COUNT(*) FILTER (WHERE status = 'Draft'), \
                 COUNT(*) FILTER (WHERE status = 'Completed') \
                 FROM exams WHERE ($1::TEXT IS NULL OR academic_year = $1)",
                &[&academic_year],
            )
            .await?;
        Ok(ExamStats {
            total: row.try_get(0)?,
            scheduled: row.try_get(1)?,
            draft: row.try_get(2)?,
            completed: row.try_get(3)?,
        })
    }

    async fn list_applications(
        &self,
        filter: &ApplicationFilter,
        window: Window,
    ) -> Result<Vec<Application>> {
        let mut conditions = Conditions::default();
        if let Some(status) = filter.status {
            conditions.add("status = {}", status.as_str());
        }

        let mut sql = format!(
            "SELECT * FROM applications{} ORDER BY created_at DESC",
            conditions.where_sql()
        );
        sql.push_str(&conditions.window_sql(window));
        let rows = self.client.query(&sql, &conditions.params()).await?;
        collect(&rows, application_from_row)
    }

    async fn get_application(&self, id: &str) -> Result<Option<Application>> {
        let row = self
            .client
            .query_opt("SELECT * FROM applications WHERE id = $1", &[&id])
            .await?;
        row.as_ref().map(application_from_row).transpose()
    }

    async fn create_application(&self, application: NewApplication) -> Result<Application> {
        let application = application.into_application(Utc::now());
        self.insert_application(&application).await?;
        Ok(application)
    }

    async fn update_application(&self, id: &str, patch: ApplicationPatch) -> Result<Application> {
        let mut update = Update::new("applications");
        update.set("student_name", patch.student_name);
        update.set("parent_name", patch.parent_name);
        update.set("email", patch.email);
        update.set("phone", patch.phone);
        update.set("grade_applying", patch.grade_applying);
        update.set("date_of_birth", patch.date_of_birth);
        update.set("address", patch.address);
        update.set("previous_school", patch.previous_school);
        update.set("notes", patch.notes);
        update.set("status", patch.status.map(|s| s.as_str()));
        update.set("updated_at", Some(Utc::now()));

        if !self.execute_update(update, id.to_string()).await? {
            return Err(Error::NotFound("Application"));
        }
        self.get_application(id)
            .await?
            .ok_or(Error::NotFound("Application"))
    }

    async fn delete_application(&self, id: &str) -> Result<()> {
        self.delete_by_id("DELETE FROM applications WHERE id = $1", &id, "Application")
            .await
    }

    async fn application_stats(&self) -> Result<ApplicationStats> {
        let row = self
            .client
            .query_one(
                "SELECT COUNT(*), \
                 COUNT(*) FILTER (WHERE status = 'pending'), \
                 COUNT(*) FILTER (WHERE status = 'approved'), \
                 COUNT(*) FILTER (WHERE status = 'rejected') \
                 FROM applications",
                &[],
            )
            .await?;
        Ok(ApplicationStats {
            total: row.try_get(0)?,
            pending: row.try_get(1)?,
            approved: row.try_get(2)?,
            rejected: row.try_get(3)?,
        })
    }

    async fn list_contacts(
        &self,
        filter: &ContactFilter,
        window: Window,
    ) -> Result<Vec<ContactRequest>> {
        let mut conditions = Conditions::default();
        if let Some(status) = filter.status {
            conditions.add("status = {}", status.as_str());
        }

        let mut sql = format!(
            "SELECT * FROM contact_requests{} ORDER BY created_at DESC",
            conditions.where_sql()
        );
        sql.push_str(&conditions.window_sql(window));
        let rows = self.client.query(&sql, &conditions.params()).await?;
        collect(&rows, contact_from_row)
    }

    async fn get_contact(&self, id: &str) -> Result<Option<ContactRequest>> {
        let row = self
            .client
            .query_opt("SELECT * FROM contact_requests WHERE id = $1", &[&id])
            .await?;
        row.as_ref().map(contact_from_row).transpose()
    }

    async fn create_contact(&self, contact: NewContactRequest) -> Result<ContactRequest> {
        let contact = contact.into_contact(Utc::now());
        self.insert_contact(&contact).await?;
        Ok(contact)
    }

    async fn update_contact(&self, id: &str, patch: ContactPatch) -> Result<ContactRequest> {
        let mut update = Update::new("contact_requests");
        update.set("name", patch.name);
        update.set("email", patch.email);
        update.set("dial_code", patch.dial_code);
        update.set("phone", patch.phone);
        update.set("subject", patch.subject);
        update.set("message", patch.message);
        update.set("status", patch.status.map(|s| s.as_str()));
        update.set("notes", patch.notes);
        update.set("updated_at", Some(Utc::now()));

        if !self.execute_update(update, id.to_string()).await? {
            return Err(Error::NotFound("Contact"));
        }
        self.get_contact(id).await?.ok_or(Error::NotFound("Contact"))
    }

    async fn delete_contact(&self, id: &str) -> Result<()> {
        self.delete_by_id("DELETE FROM contact_requests WHERE id = $1", &id, "Contact")
            .await
    }

    async fn contact_stats(&self) -> Result<ContactStats> {
        let row = self
            .client
            .query_one(
                "SELECT COUNT(*), \
                 COUNT(*) FILTER (WHERE status = 'new'), \
                 COUNT(*) FILTER (WHERE status = 'read'), \
                 COUNT(*) FILTER (WHERE status = 'replied') \
                 FROM contact_requests",
                &[],
            )
            .await?;
        Ok(ContactStats {
            total: row.try_get(0)?,
            new: row.try_get(1)?,
            read: row.try_get(2)?,
            replied: row.try_get(3)?,
        })
    }

    async fn list_pages(&self) -> Result<Vec<PageSummary>> {
        let rows = self
            .client
            .query(
                "SELECT page_slug, COUNT(*) FROM site_pages_content \
                 GROUP BY page_slug ORDER BY page_slug",
                &[],
            )
            .await?;
        rows.iter()
            .map(|row| {
                Ok(PageSummary {
                    page_slug: row.try_get(0)?,
                    section_count: row.try_get(1)?,
                })
            })
            .collect()
    }

    async fn page_sections(&self, page_slug: &str, active_only: bool) -> Result<Vec<PageSection>> {
        let sql = format!(
            "SELECT {} FROM site_pages_content \
             WHERE page_slug = $1 AND (NOT $2 OR is_active) \
             ORDER BY order_index, id",
            SECTION_COLUMNS
        );
        let rows = self.client.query(&sql, &[&page_slug, &active_only]).await?;
        collect(&rows, section_from_row)
    }

    async fn get_section(&self, id: i64) -> Result<Option<PageSection>> {
        let sql = format!("SELECT {} FROM site_pages_content WHERE id = $1", SECTION_COLUMNS);
        let row = self.client.query_opt(&sql, &[&id]).await?;
        row.as_ref().map(section_from_row).transpose()
    }

    async fn create_section(&self, section: NewSection) -> Result<PageSection> {
        let content = serde_json::to_string(&section.content)?;
        let sql = format!(
            "INSERT INTO site_pages_content (page_slug, section_key, content, order_index, is_active) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            SECTION_COLUMNS
        );
        let row = self
            .client
            .query_one(
                &sql,
                &[
                    &section.page_slug,
                    &section.section_key,
                    &content,
                    &section.order_index,
                    &section.is_active,
                ],
            )
            .await
            .map_err(map_db_error)?;
        section_from_row(&row)
    }

    async fn update_section(&self, id: i64, patch: SectionPatch) -> Result<PageSection> {
        let content = patch.content.as_ref().map(serde_json::to_string).transpose()?;

        let mut update = Update::new("site_pages_content");
        update.set("content", content);
        update.set("order_index", patch.order_index);
        update.set("is_active", patch.is_active);
        update.set("updated_at", Some(Utc::now()));

        if !self.execute_update(update, id).await? {
            return Err(Error::NotFound("Section"));
        }
        self.get_section(id).await?.ok_or(Error::NotFound("Section"))
    }

    async fn delete_section(&self, id: i64) -> Result<PageSection> {
        let sql = format!(
            "DELETE FROM site_pages_content WHERE id = $1 RETURNING {}",
            SECTION_COLUMNS
        );
        let row = self
            .client
            .query_opt(&sql, &[&id])
            .await?
            .ok_or(Error::NotFound("Section"))?;
        section_from_row(&row)
    }

    async fn replace_page(
        &self,
        page_slug: &str,
        sections: Vec<NewSection>,
    ) -> Result<Vec<PageSection>> {
        let mut keys = Vec::with_capacity(sections.len());
        let mut contents = Vec::with_capacity(sections.len());
        let mut orders = Vec::with_capacity(sections.len());
        let mut actives = Vec::with_capacity(sections.len());
        for section in &sections {
            if section.page_slug != page_slug {
                return Err(Error::Validation(format!(
                    "Section '{}' does not belong to page '{}'",
                    section.section_key, page_slug
                )));
            }
            keys.push(section.section_key.clone());
            contents.push(serde_json::to_string(&section.content)?);
            orders.push(section.order_index);
            actives.push(section.is_active);
        }

        // One statement, so the delete and the inserts commit together
        let sql = format!(
            "WITH removed AS (DELETE FROM site_pages_content WHERE page_slug = $1), \
             inserted AS ( \
                 INSERT INTO site_pages_content (page_slug, section_key, content, order_index, is_active) \
                 SELECT $1, k, c, o, a FROM UNNEST($2::TEXT[], $3::TEXT[], $4::INT4[], $5::BOOL[]) \
                     AS seed(k, c, o, a) \
                 RETURNING {} \
             ) \
             SELECT * FROM inserted ORDER BY order_index, id",
            SECTION_COLUMNS
        );
        let rows = self
            .client
            .query(&sql, &[&page_slug, &keys, &contents, &orders, &actives])
            .await
            .map_err(map_db_error)?;
        collect(&rows, section_from_row)
    }
}
