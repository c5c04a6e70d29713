//! Contact inquiries from the public site

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{nullable, patch, Window};
use crate::error::{Error, Result};

pub const DEFAULT_DIAL_CODE: &str = "+91";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactStatus {
    #[default]
    New,
    Read,
    Replied,
}

impl ContactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactStatus::New => "new",
            ContactStatus::Read => "read",
            ContactStatus::Replied => "replied",
        }
    }
}

impl std::str::FromStr for ContactStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "new" => Ok(ContactStatus::New),
            "read" => Ok(ContactStatus::Read),
            "replied" => Ok(ContactStatus::Replied),
            other => Err(Error::Validation(format!("Unknown contact status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactRequest {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub dial_code: String,
    pub phone: Option<String>,
    pub subject: Option<String>,
    pub message: Option<String>,
    pub status: ContactStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewContactRequest {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub dial_code: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl NewContactRequest {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation("Name is required".to_string()));
        }
        Ok(())
    }

    pub fn into_contact(self, now: DateTime<Utc>) -> ContactRequest {
        ContactRequest {
            id: uuid::Uuid::new_v4().to_string(),
            name: self.name,
            email: self.email,
            dial_code: self
                .dial_code
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_DIAL_CODE.to_string()),
            phone: self.phone,
            subject: self.subject,
            message: self.message,
            status: ContactStatus::New,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Staff-side update, usually triage status and internal notes
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub email: Option<Option<String>>,
    #[serde(default)]
    pub dial_code: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub subject: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub message: Option<Option<String>>,
    #[serde(default)]
    pub status: Option<ContactStatus>,
    #[serde(default, deserialize_with = "nullable")]
    pub notes: Option<Option<String>>,
}

impl ContactPatch {
    pub fn validate(&self) -> Result<()> {
        if matches!(&self.name, Some(name) if name.trim().is_empty()) {
            return Err(Error::Validation("Name cannot be empty".to_string()));
        }
        Ok(())
    }

    pub fn apply(self, contact: &mut ContactRequest, now: DateTime<Utc>) {
        patch(&mut contact.name, self.name);
        patch(&mut contact.email, self.email);
        patch(&mut contact.dial_code, self.dial_code);
        patch(&mut contact.phone, self.phone);
        patch(&mut contact.subject, self.subject);
        patch(&mut contact.message, self.message);
        patch(&mut contact.status, self.status);
        patch(&mut contact.notes, self.notes);
        contact.updated_at = now;
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactFilter {
    pub status: Option<ContactStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ContactFilter {
    pub fn window(&self) -> Result<Window> {
        Window::new(self.limit, self.offset, None)
    }

    pub fn matches(&self, contact: &ContactRequest) -> bool {
        self.status.map_or(true, |s| contact.status == s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactStats {
    pub total: i64,
    pub new: i64,
    pub read: i64,
    pub replied: i64,
}

impl ContactStats {
    pub fn tally<I: IntoIterator<Item = ContactStatus>>(statuses: I) -> Self {
        let mut stats = ContactStats::default();
        for status in statuses {
            stats.total += 1;
            match status {
                ContactStatus::New => stats.new += 1,
                ContactStatus::Read => stats.read += 1,
                ContactStatus::Replied => stats.replied += 1,
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let contact = NewContactRequest {
            name: "P. Nair".to_string(),
            message: Some("Bus routes?".to_string()),
            ..Default::default()
        }
        .into_contact(Utc::now());

        assert_eq!(contact.dial_code, DEFAULT_DIAL_CODE);
        assert_eq!(contact.status, ContactStatus::New);
        assert!(contact.notes.is_none());
    }

    #[test]
    fn test_mark_replied_with_note() {
        let mut contact = NewContactRequest {
            name: "P. Nair".to_string(),
            ..Default::default()
        }
        .into_contact(Utc::now());

        let patch: ContactPatch =
            serde_json::from_str(r#"{"status": "replied", "notes": "called back"}"#).unwrap();
        patch.apply(&mut contact, Utc::now());
        assert_eq!(contact.status, ContactStatus::Replied);
        assert_eq!(contact.notes.as_deref(), Some("called back"));
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(serde_json::to_string(&ContactStatus::Replied).unwrap(), "\"replied\"");
        assert!("archived".parse::<ContactStatus>().is_err());
    }
}
