//! Default page sections bundled into the binary

use rust_embed::RustEmbed;

use crate::error::{Error, Result};
use crate::models::{check_page_slug, NewSection, SeedSection};

#[derive(RustEmbed)]
#[folder = "seed/"]
struct SeedAssets;

/// Slugs that ship with default content, sorted
pub fn seeded_pages() -> Vec<String> {
    let mut pages: Vec<String> = SeedAssets::iter()
        .filter_map(|name| name.strip_suffix(".json").map(str::to_string))
        .collect();
    pages.sort();
    pages
}

/// Default sections for `page_slug`, or `None` when the page has no defaults
pub fn default_sections(page_slug: &str) -> Result<Option<Vec<NewSection>>> {
    check_page_slug(page_slug)?;

    let Some(file) = SeedAssets::get(&format!("{}.json", page_slug)) else {
        return Ok(None);
    };

    let sections: Vec<SeedSection> = serde_json::from_slice(&file.data)
        .map_err(|e| Error::Other(format!("Invalid seed content for '{}': {}", page_slug, e)))?;

    let sections = sections
        .into_iter()
        .map(|section| section.into_new(page_slug))
        .collect::<Vec<_>>();
    for section in &sections {
        section.validate()?;
    }
    Ok(Some(sections))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_bundled_pages() {
        assert_eq!(
            seeded_pages(),
            vec![
                "about",
                "academics",
                "admissions",
                "apply",
                "contact",
                "facilities",
                "footer",
                "header"
            ]
        );
    }

    #[test]
    fn test_every_bundle_is_valid() {
        for page in seeded_pages() {
            let sections = default_sections(&page).unwrap().unwrap();
            assert!(!sections.is_empty(), "{} has no sections", page);

            let keys: HashSet<&str> = sections.iter().map(|s| s.section_key.as_str()).collect();
            assert_eq!(keys.len(), sections.len(), "{} repeats a section key", page);
            assert!(sections.iter().all(|s| s.page_slug == page));
        }
    }

    #[test]
    fn test_unknown_page() {
        assert!(default_sections("gallery").unwrap().is_none());
        assert!(default_sections("../secrets").is_err());
    }
}
