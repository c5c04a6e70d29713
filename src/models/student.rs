//! Student records

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{contains_ci, nullable, patch, Window, DEFAULT_PAGE_SIZE};
use crate::error::{Error, Result};

/// Stored student joined with the name of its class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: i64,
    pub student_id: String,
    pub roll_no: Option<String>,
    pub name: String,
    pub class_id: Option<i64>,
    pub class_name: Option<String>,
    pub section: Option<String>,
    pub dob: Option<NaiveDate>,
    pub gender: Option<String>,
    pub blood_group: Option<String>,
    pub religion: Option<String>,
    pub admission_id: Option<String>,
    pub father_name: Option<String>,
    pub father_occupation: Option<String>,
    pub mother_name: Option<String>,
    pub mother_occupation: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub profile_image: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewStudent {
    pub name: String,
    #[serde(default)]
    pub roll_no: Option<String>,
    #[serde(default)]
    pub class_id: Option<i64>,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub dob: Option<NaiveDate>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub blood_group: Option<String>,
    #[serde(default)]
    pub religion: Option<String>,
    /// Generated from the student sequence when omitted
    #[serde(default)]
    pub admission_id: Option<String>,
    #[serde(default)]
    pub father_name: Option<String>,
    #[serde(default)]
    pub father_occupation: Option<String>,
    #[serde(default)]
    pub mother_name: Option<String>,
    #[serde(default)]
    pub mother_occupation: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub profile_image: Option<String>,
}

impl NewStudent {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation("Student name is required".to_string()));
        }
        Ok(())
    }

    /// Build the stored row for sequence value `seq`
    pub fn into_student(self, id: i64, seq: i64, now: DateTime<Utc>) -> Student {
        let admission_id = self
            .admission_id
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| default_admission_id(now, seq));

        Student {
            id,
            student_id: format!("ST-{:03}", seq),
            roll_no: self.roll_no,
            name: self.name,
            class_id: self.class_id,
            class_name: None,
            section: self.section,
            dob: self.dob,
            gender: self.gender,
            blood_group: self.blood_group,
            religion: self.religion,
            admission_id: Some(admission_id),
            father_name: self.father_name,
            father_occupation: self.father_occupation,
            mother_name: self.mother_name,
            mother_occupation: self.mother_occupation,
            phone: self.phone,
            email: self.email,
            address: self.address,
            profile_image: self.profile_image,
            is_active: true,
            created_at: now,
        }
    }
}

/// `ADM-<year>-<nnn>` for the year the student was enrolled
pub fn default_admission_id(now: DateTime<Utc>, seq: i64) -> String {
    format!("ADM-{}-{:03}", now.format("%Y"), seq)
}

/// Partial update. Absent fields are untouched, `null` clears.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StudentPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub roll_no: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub class_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub section: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub dob: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "nullable")]
    pub gender: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub blood_group: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub religion: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub father_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub father_occupation: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub mother_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub mother_occupation: Option<Option<String>>,
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

impl StudentPatch {
    pub fn validate(&self) -> Result<()> {
        if matches!(&self.name, Some(name) if name.trim().is_empty()) {
            return Err(Error::Validation("Student name cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Class the student is being moved into, if any
    pub fn target_class(&self) -> Option<i64> {
        self.class_id.flatten()
    }

    pub fn apply(self, student: &mut Student) {
        patch(&mut student.name, self.name);
        patch(&mut student.roll_no, self.roll_no);
        if let Some(class_id) = self.class_id {
            if class_id != student.class_id {
                student.class_name = None;
            }
            student.class_id = class_id;
        }
        patch(&mut student.section, self.section);
        patch(&mut student.dob, self.dob);
        patch(&mut student.gender, self.gender);
        patch(&mut student.blood_group, self.blood_group);
        patch(&mut student.religion, self.religion);
        patch(&mut student.father_name, self.father_name);
        patch(&mut student.father_occupation, self.father_occupation);
        patch(&mut student.mother_name, self.mother_name);
        patch(&mut student.mother_occupation, self.mother_occupation);
        patch(&mut student.phone, self.phone);
        patch(&mut student.email, self.email);
        patch(&mut student.address, self.address);
        patch(&mut student.profile_image, self.profile_image);
        patch(&mut student.is_active, self.is_active);
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StudentFilter {
    pub class_id: Option<i64>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl StudentFilter {
    pub fn window(&self) -> Result<Window> {
        Window::new(self.limit, self.offset, Some(DEFAULT_PAGE_SIZE))
    }

    /// Non-empty search term
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn matches(&self, student: &Student) -> bool {
        if let Some(class_id) = self.class_id {
            if student.class_id != Some(class_id) {
                return false;
            }
        }
        if let Some(is_active) = self.is_active {
            if student.is_active != is_active {
                return false;
            }
        }
        if let Some(term) = self.search_term() {
            if !contains_ci(&student.name, term) && !contains_ci(&student.student_id, term) {
                return false;
            }
        }
        true
    }
}
