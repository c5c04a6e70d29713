//! Exam schedule entries

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::{nullable, patch, Window};
use crate::error::{Error, Result};

pub const DEFAULT_ACADEMIC_YEAR: &str = "2024-2025";
pub const DEFAULT_EXAM_COLOR: &str = "#3B82F6";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExamStatus {
    #[default]
    Scheduled,
    Draft,
    Completed,
}

impl ExamStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExamStatus::Scheduled => "Scheduled",
            ExamStatus::Draft => "Draft",
            ExamStatus::Completed => "Completed",
        }
    }
}

impl std::str::FromStr for ExamStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Scheduled" => Ok(ExamStatus::Scheduled),
            "Draft" => Ok(ExamStatus::Draft),
            "Completed" => Ok(ExamStatus::Completed),
            other => Err(Error::Validation(format!("Unknown exam status: {}", other))),
        }
    }
}

/// Parse a lenient time of day: `9:30`, `09:30` or `09:30:00`.
/// Seconds are accepted but not kept.
pub fn parse_time_of_day(raw: &str) -> Option<NaiveTime> {
    let mut parts = raw.trim().split(':');
    let hour: u32 = parts.next()?.trim().parse().ok()?;
    let minute: u32 = parts.next()?.trim().parse().ok()?;
    if let Some(seconds) = parts.next() {
        seconds.trim().parse::<u32>().ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    NaiveTime::from_hms_opt(hour, minute, 0)
}

mod time_of_day {
    use chrono::NaiveTime;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Option<NaiveTime>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(t) => s.serialize_some(&t.format("%H:%M:%S").to_string()),
            None => s.serialize_none(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exam {
    pub id: String,
    pub subject: String,
    pub grade: Option<String>,
    pub academic_year: String,
    pub exam_date: Option<NaiveDate>,
    #[serde(serialize_with = "time_of_day::serialize")]
    pub start_time: Option<NaiveTime>,
    #[serde(serialize_with = "time_of_day::serialize")]
    pub end_time: Option<NaiveTime>,
    pub duration: Option<String>,
    pub location: Option<String>,
    pub participants: String,
    pub status: ExamStatus,
    pub color: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Exam {
    /// Listing order: latest date first, undated exams last
    pub fn schedule_order(a: &Exam, b: &Exam) -> Ordering {
        match (a.exam_date, b.exam_date) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
        .then_with(|| a.created_at.cmp(&b.created_at))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewExam {
    pub subject: String,
    #[serde(default)]
    pub grade: Option<String>,
    #[serde(default)]
    pub academic_year: Option<String>,
    #[serde(default)]
    pub exam_date: Option<NaiveDate>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub participants: Option<String>,
    #[serde(default)]
    pub status: Option<ExamStatus>,
    #[serde(default)]
    pub color: Option<String>,
}

impl NewExam {
    pub fn validate(&self) -> Result<()> {
        if self.subject.trim().is_empty() {
            return Err(Error::Validation("Exam subject is required".to_string()));
        }
        Ok(())
    }

    pub fn into_exam(self, now: DateTime<Utc>) -> Exam {
        Exam {
            id: uuid::Uuid::new_v4().to_string(),
            subject: self.subject,
            grade: self.grade,
            academic_year: self
                .academic_year
                .unwrap_or_else(|| DEFAULT_ACADEMIC_YEAR.to_string()),
            exam_date: self.exam_date,
            start_time: self.start_time.as_deref().and_then(parse_time_of_day),
            end_time: self.end_time.as_deref().and_then(parse_time_of_day),
            duration: self.duration,
            location: self.location,
            participants: self.participants.unwrap_or_else(|| "0".to_string()),
            status: self.status.unwrap_or_default(),
            color: self.color.unwrap_or_else(|| DEFAULT_EXAM_COLOR.to_string()),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExamPatch {
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub grade: Option<Option<String>>,
    #[serde(default)]
    pub academic_year: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub exam_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "nullable")]
    pub start_time: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub end_time: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub duration: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub location: Option<Option<String>>,
    #[serde(default)]
    pub participants: Option<String>,
    #[serde(default)]
    pub status: Option<ExamStatus>,
    #[serde(default)]
    pub color: Option<String>,
}

/// Resolve a time field of a patch: `null` clears it, unparseable input
/// counts as absent
pub fn time_change(value: Option<Option<String>>) -> Option<Option<NaiveTime>> {
    match value {
        Some(None) => Some(None),
        Some(Some(raw)) => parse_time_of_day(&raw).map(Some),
        None => None,
    }
}

impl ExamPatch {
    pub fn validate(&self) -> Result<()> {
        if matches!(&self.subject, Some(subject) if subject.trim().is_empty()) {
            return Err(Error::Validation("Exam subject cannot be empty".to_string()));
        }
        Ok(())
    }

    pub fn apply(self, exam: &mut Exam, now: DateTime<Utc>) {
        patch(&mut exam.subject, self.subject);
        patch(&mut exam.grade, self.grade);
        patch(&mut exam.academic_year, self.academic_year);
        patch(&mut exam.exam_date, self.exam_date);
        patch(&mut exam.start_time, time_change(self.start_time));
        patch(&mut exam.end_time, time_change(self.end_time));
        patch(&mut exam.duration, self.duration);
        patch(&mut exam.location, self.location);
        patch(&mut exam.participants, self.participants);
        patch(&mut exam.status, self.status);
        patch(&mut exam.color, self.color);
        exam.updated_at = now;
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExamFilter {
    pub academic_year: Option<String>,
    pub status: Option<ExamStatus>,
    pub grade: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ExamFilter {
    pub fn window(&self) -> Result<Window> {
        Window::new(self.limit, self.offset, None)
    }

    pub fn matches(&self, exam: &Exam) -> bool {
        if let Some(year) = self.academic_year.as_deref().filter(|y| !y.is_empty()) {
            if exam.academic_year != year {
                return false;
            }
        }
        if let Some(status) = self.status {
            if exam.status != status {
                return false;
            }
        }
        if let Some(grade) = self.grade.as_deref().filter(|g| !g.is_empty()) {
            if exam.grade.as_deref() != Some(grade) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExamStatsQuery {
    pub academic_year: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamStats {
    pub total: i64,
    pub scheduled: i64,
    pub draft: i64,
    pub completed: i64,
}

impl ExamStats {
    pub fn tally<I: IntoIterator<Item = ExamStatus>>(statuses: I) -> Self {
        let mut stats = ExamStats::default();
        for status in statuses {
            stats.total += 1;
            match status {
                ExamStatus::Scheduled => stats.scheduled += 1,
                ExamStatus::Draft => stats.draft += 1,
                ExamStatus::Completed => stats.completed += 1,
            }
        }
        stats
    }
}
