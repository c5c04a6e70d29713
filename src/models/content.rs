//! Page content sections for the public website

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::patch;
use crate::error::{Error, Result};

/// One ordered fragment of a page. `content` is opaque to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSection {
    pub id: i64,
    pub page_slug: String,
    pub section_key: String,
    pub content: Value,
    pub order_index: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PageSection {
    /// Page order: by index, ties broken by id
    pub fn page_order(a: &PageSection, b: &PageSection) -> std::cmp::Ordering {
        a.order_index
            .cmp(&b.order_index)
            .then_with(|| a.id.cmp(&b.id))
    }
}

fn check_identifier(kind: &str, value: &str) -> Result<()> {
    let valid = !value.is_empty()
        && value.len() <= 50
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(Error::Validation(format!(
            "{} must be 1-50 characters of letters, digits, '-' or '_'",
            kind
        )));
    }
    Ok(())
}

pub fn check_page_slug(slug: &str) -> Result<()> {
    check_identifier("page_slug", slug)
}

fn check_content(content: &Value) -> Result<()> {
    if !content.is_object() {
        return Err(Error::Validation("content must be a JSON object".to_string()));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSection {
    pub page_slug: String,
    pub section_key: String,
    pub content: Value,
    #[serde(default)]
    pub order_index: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl NewSection {
    pub fn validate(&self) -> Result<()> {
        check_page_slug(&self.page_slug)?;
        check_identifier("section_key", &self.section_key)?;
        check_content(&self.content)
    }

    pub fn into_section(self, id: i64, now: DateTime<Utc>) -> PageSection {
        PageSection {
            id,
            page_slug: self.page_slug,
            section_key: self.section_key,
            content: self.content,
            order_index: self.order_index,
            is_active: self.is_active,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SectionPatch {
    #[serde(default)]
    pub content: Option<Value>,
    #[serde(default)]
    pub order_index: Option<i32>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl SectionPatch {
    pub fn validate(&self) -> Result<()> {
        match &self.content {
            Some(content) => check_content(content),
            None => Ok(()),
        }
    }

    pub fn apply(self, section: &mut PageSection, now: DateTime<Utc>) {
        patch(&mut section.content, self.content);
        patch(&mut section.order_index, self.order_index);
        patch(&mut section.is_active, self.is_active);
        section.updated_at = now;
    }
}

/// Default section shipped for a page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedSection {
    pub section_key: String,
    #[serde(default)]
    pub order_index: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub content: Value,
}

impl SeedSection {
    pub fn into_new(self, page_slug: &str) -> NewSection {
        NewSection {
            page_slug: page_slug.to_string(),
            section_key: self.section_key,
            content: self.content,
            order_index: self.order_index,
            is_active: self.is_active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSummary {
    pub page_slug: String,
    pub section_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedReport {
    pub message: String,
    pub page_slug: String,
    pub sections: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hero() -> NewSection {
        NewSection {
            page_slug: "about".to_string(),
            section_key: "hero".to_string(),
            content: json!({"title": "About Us"}),
            order_index: 0,
            is_active: true,
        }
    }

    #[test]
    fn test_identifier_rules() {
        assert!(hero().validate().is_ok());

        let mut bad = hero();
        bad.page_slug = "../etc".to_string();
        assert!(bad.validate().is_err());

        let mut bad = hero();
        bad.section_key = String::new();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_content_must_be_object() {
        let mut bad = hero();
        bad.content = json!(["not", "an", "object"]);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_defaults_on_create() {
        let section: NewSection = serde_json::from_value(json!({
            "page_slug": "about",
            "section_key": "mission",
            "content": {}
        }))
        .unwrap();
        assert_eq!(section.order_index, 0);
        assert!(section.is_active);
    }

    #[test]
    fn test_patch_hides_section() {
        let mut section = hero().into_section(4, Utc::now());
        let patch: SectionPatch = serde_json::from_value(json!({"is_active": false})).unwrap();
        patch.apply(&mut section, Utc::now());

        assert!(!section.is_active);
        assert_eq!(section.content, json!({"title": "About Us"}));
    }

    #[test]
    fn test_page_order() {
        let now = Utc::now();
        let mut sections = vec![
            NewSection { order_index: 2, ..hero() }.into_section(1, now),
            NewSection { order_index: 0, ..hero() }.into_section(3, now),
            NewSection { order_index: 0, ..hero() }.into_section(2, now),
        ];
        sections.sort_by(PageSection::page_order);
        let ids: Vec<i64> = sections.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }
}
