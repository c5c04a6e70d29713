//! Classes (homerooms)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{nullable, patch, Window};
use crate::error::{Error, Result};

pub const DEFAULT_CAPACITY: i32 = 40;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchoolClass {
    pub id: i64,
    pub class_name: String,
    pub grade: Option<String>,
    pub section: Option<String>,
    pub class_teacher_id: Option<i64>,
    pub class_teacher_name: Option<String>,
    pub room_number: Option<String>,
    pub capacity: i32,
    pub is_active: bool,
    pub student_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewClass {
    pub class_name: String,
    #[serde(default)]
    pub grade: Option<String>,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub class_teacher_id: Option<i64>,
    #[serde(default)]
    pub room_number: Option<String>,
    #[serde(default)]
    pub capacity: Option<i32>,
}

fn check_capacity(capacity: Option<i32>) -> Result<()> {
    match capacity {
        Some(c) if c < 0 => Err(Error::Validation(
            "capacity must not be negative".to_string(),
        )),
        _ => Ok(()),
    }
}

impl NewClass {
    pub fn validate(&self) -> Result<()> {
        if self.class_name.trim().is_empty() {
            return Err(Error::Validation("Class name is required".to_string()));
        }
        check_capacity(self.capacity)
    }

    pub fn into_class(self, id: i64, now: DateTime<Utc>) -> SchoolClass {
        SchoolClass {
            id,
            class_name: self.class_name.trim().to_string(),
            grade: self.grade,
            section: self.section,
            class_teacher_id: self.class_teacher_id,
            class_teacher_name: None,
            room_number: self.room_number,
            capacity: self.capacity.unwrap_or(DEFAULT_CAPACITY),
            is_active: true,
            student_count: 0,
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClassPatch {
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub grade: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub section: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub class_teacher_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub room_number: Option<Option<String>>,
    #[serde(default)]
    pub capacity: Option<i32>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl ClassPatch {
    pub fn validate(&self) -> Result<()> {
        if matches!(&self.class_name, Some(name) if name.trim().is_empty()) {
            return Err(Error::Validation("Class name cannot be empty".to_string()));
        }
        check_capacity(self.capacity)
    }

    pub fn target_teacher(&self) -> Option<i64> {
        self.class_teacher_id.flatten()
    }

    pub fn apply(self, class: &mut SchoolClass) {
        patch(
            &mut class.class_name,
            self.class_name.map(|n| n.trim().to_string()),
        );
        patch(&mut class.grade, self.grade);
        patch(&mut class.section, self.section);
        if let Some(teacher_id) = self.class_teacher_id {
            if teacher_id != class.class_teacher_id {
                class.class_teacher_name = None;
            }
            class.class_teacher_id = teacher_id;
        }
        patch(&mut class.room_number, self.room_number);
        patch(&mut class.capacity, self.capacity);
        patch(&mut class.is_active, self.is_active);
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClassFilter {
    pub is_active: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ClassFilter {
    pub fn window(&self) -> Result<Window> {
        Window::new(self.limit, self.offset, None)
    }

    pub fn matches(&self, class: &SchoolClass) -> bool {
        self.is_active.map_or(true, |active| class.is_active == active)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassStats {
    pub total: i64,
    pub active: i64,
    pub inactive: i64,
    pub without_teacher: i64,
}

impl ClassStats {
    pub fn tally<'a, I: IntoIterator<Item = &'a SchoolClass>>(classes: I) -> Self {
        let mut stats = ClassStats::default();
        for class in classes {
            stats.total += 1;
            if class.is_active {
                stats.active += 1;
            } else {
                stats.inactive += 1;
            }
            if class.class_teacher_id.is_none() {
                stats.without_teacher += 1;
            }
        }
        stats
    }
}
