//! Teacher records

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{contains_ci, nullable, patch, Window, DEFAULT_PAGE_SIZE};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Teacher {
    pub id: i64,
    pub employee_id: String,
    pub name: String,
    pub subject: Option<String>,
    pub department: Option<String>,
    pub gender: Option<String>,
    pub dob: Option<NaiveDate>,
    pub qualification: Option<String>,
    pub experience: Option<String>,
    pub designation: Option<String>,
    pub join_date: Option<NaiveDate>,
    pub salary: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub profile_image: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    /// Classes this teacher is class teacher of
    #[serde(default)]
    pub assigned_class_names: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewTeacher {
    pub name: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub dob: Option<NaiveDate>,
    #[serde(default)]
    pub qualification: Option<String>,
    #[serde(default)]
    pub experience: Option<String>,
    #[serde(default)]
    pub designation: Option<String>,
    #[serde(default)]
    pub join_date: Option<NaiveDate>,
    #[serde(default)]
    pub salary: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub profile_image: Option<String>,
}

impl NewTeacher {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation("Teacher name is required".to_string()));
        }
        Ok(())
    }

    pub fn into_teacher(self, id: i64, seq: i64, now: DateTime<Utc>) -> Teacher {
        Teacher {
            id,
            employee_id: format!("EMP-{:04}", seq),
            name: self.name,
            subject: self.subject,
            department: self.department,
            gender: self.gender,
            dob: self.dob,
            qualification: self.qualification,
            experience: self.experience,
            designation: self.designation,
            join_date: self.join_date,
            salary: self.salary,
            phone: self.phone,
            email: self.email,
            address: self.address,
            profile_image: self.profile_image,
            is_active: true,
            created_at: now,
            assigned_class_names: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TeacherPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub subject: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub department: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub gender: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub dob: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "nullable")]
    pub qualification: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub experience: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub designation: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub join_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "nullable")]
    pub salary: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub address: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub profile_image: Option<Option<String>>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl TeacherPatch {
    pub fn validate(&self) -> Result<()> {
        if matches!(&self.name, Some(name) if name.trim().is_empty()) {
            return Err(Error::Validation("Teacher name cannot be empty".to_string()));
        }
        Ok(())
    }

    pub fn apply(self, teacher: &mut Teacher) {
        patch(&mut teacher.name, self.name);
        patch(&mut teacher.subject, self.subject);
        patch(&mut teacher.department, self.department);
        patch(&mut teacher.gender, self.gender);
        patch(&mut teacher.dob, self.dob);
        patch(&mut teacher.qualification, self.qualification);
        patch(&mut teacher.experience, self.experience);
        patch(&mut teacher.designation, self.designation);
        patch(&mut teacher.join_date, self.join_date);
        patch(&mut teacher.salary, self.salary);
        patch(&mut teacher.phone, self.phone);
        patch(&mut teacher.email, self.email);
        patch(&mut teacher.address, self.address);
        patch(&mut teacher.profile_image, self.profile_image);
        patch(&mut teacher.is_active, self.is_active);
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TeacherFilter {
    pub department: Option<String>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl TeacherFilter {
    pub fn window(&self) -> Result<Window> {
        Window::new(self.limit, self.offset, Some(DEFAULT_PAGE_SIZE))
    }

    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn matches(&self, teacher: &Teacher) -> bool {
        if let Some(department) = self.department.as_deref().filter(|d| !d.is_empty()) {
            if teacher.department.as_deref() != Some(department) {
                return false;
            }
        }
        if let Some(is_active) = self.is_active {
            if teacher.is_active != is_active {
                return false;
            }
        }
        if let Some(term) = self.search_term() {
            if !contains_ci(&teacher.name, term) && !contains_ci(&teacher.employee_id, term) {
                return false;
            }
        }
        true
    }
}
