//! Admission applications submitted from the public site

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{nullable, patch, Window};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
        }
    }
}

impl std::str::FromStr for ApplicationStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(ApplicationStatus::Pending),
            "approved" => Ok(ApplicationStatus::Approved),
            "rejected" => Ok(ApplicationStatus::Rejected),
            other => Err(Error::Validation(format!(
                "Unknown application status: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: String,
    pub student_name: String,
    pub parent_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub grade_applying: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
    pub previous_school: Option<String>,
    pub notes: Option<String>,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public submission. Status always starts as pending.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewApplication {
    pub student_name: String,
    #[serde(default)]
    pub parent_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub grade_applying: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub previous_school: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewApplication {
    pub fn validate(&self) -> Result<()> {
        if self.student_name.trim().is_empty() {
            return Err(Error::Validation("Student name is required".to_string()));
        }
        Ok(())
    }

    pub fn into_application(self, now: DateTime<Utc>) -> Application {
        Application {
            id: uuid::Uuid::new_v4().to_string(),
            student_name: self.student_name,
            parent_name: self.parent_name,
            email: self.email,
            phone: self.phone,
            grade_applying: self.grade_applying,
            date_of_birth: self.date_of_birth,
            address: self.address,
            previous_school: self.previous_school,
            notes: self.notes,
            status: ApplicationStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplicationPatch {
    #[serde(default)]
    pub student_name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub parent_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub grade_applying: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub date_of_birth: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "nullable")]
    pub address: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub previous_school: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub notes: Option<Option<String>>,
    #[serde(default)]
    pub status: Option<ApplicationStatus>,
}

impl ApplicationPatch {
    pub fn validate(&self) -> Result<()> {
        if matches!(&self.student_name, Some(name) if name.trim().is_empty()) {
            return Err(Error::Validation("Student name cannot be empty".to_string()));
        }
        Ok(())
    }

    pub fn apply(self, application: &mut Application, now: DateTime<Utc>) {
        patch(&mut application.student_name, self.student_name);
        patch(&mut application.parent_name, self.parent_name);
        patch(&mut application.email, self.email);
        patch(&mut application.phone, self.phone);
        patch(&mut application.grade_applying, self.grade_applying);
        patch(&mut application.date_of_birth, self.date_of_birth);
        patch(&mut application.address, self.address);
        patch(&mut application.previous_school, self.previous_school);
        patch(&mut application.notes, self.notes);
        patch(&mut application.status, self.status);
        application.updated_at = now;
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplicationFilter {
    pub status: Option<ApplicationStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ApplicationFilter {
    pub fn window(&self) -> Result<Window> {
        Window::new(self.limit, self.offset, None)
    }

    pub fn matches(&self, application: &Application) -> bool {
        self.status.map_or(true, |s| application.status == s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationStats {
    pub total: i64,
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
}

impl ApplicationStats {
    pub fn tally<I: IntoIterator<Item = ApplicationStatus>>(statuses: I) -> Self {
        let mut stats = ApplicationStats::default();
        for status in statuses {
            stats.total += 1;
            match status {
                ApplicationStatus::Pending => stats.pending += 1,
                ApplicationStatus::Approved => stats.approved += 1,
                ApplicationStatus::Rejected => stats.rejected += 1,
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submission_starts_pending() {
        let application: NewApplication = serde_json::from_str(
            r#"{"student_name": "R. Das", "status": "approved", "grade_applying": "Grade 3"}"#,
        )
        .unwrap();
        let application = application.into_application(Utc::now());
        assert_eq!(application.status, ApplicationStatus::Pending);
        assert_eq!(application.grade_applying.as_deref(), Some("Grade 3"));
    }

    #[test]
    fn test_status_update() {
        let mut application = NewApplication {
            student_name: "R. Das".to_string(),
            notes: Some("sibling enrolled".to_string()),
            ..Default::default()
        }
        .into_application(Utc::now());

        let patch: ApplicationPatch = serde_json::from_str(r#"{"status": "approved"}"#).unwrap();
        patch.apply(&mut application, Utc::now());
        assert_eq!(application.status, ApplicationStatus::Approved);
        assert_eq!(application.notes.as_deref(), Some("sibling enrolled"));
    }

    #[test]
    fn test_stats() {
        let stats = ApplicationStats::tally([
            ApplicationStatus::Pending,
            ApplicationStatus::Pending,
            ApplicationStatus::Rejected,
        ]);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.approved, 0);
        assert_eq!(stats.rejected, 1);
    }
}
