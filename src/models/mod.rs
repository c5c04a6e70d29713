//! Domain records, request payloads and list filters

pub mod application;
pub mod class;
pub mod contact;
pub mod content;
pub mod exam;
pub mod student;
pub mod teacher;

pub use application::*;
pub use class::*;
pub use contact::*;
pub use content::*;
pub use exam::*;
pub use student::*;
pub use teacher::*;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

/// Largest page a list endpoint will return
pub const MAX_PAGE_SIZE: i64 = 200;

/// Default page size for student and teacher listings
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Deserialize a field that distinguishes "absent" from "null".
///
/// Use with `#[serde(default, deserialize_with = "nullable")]` on an
/// `Option<Option<T>>`: a missing key stays `None`, an explicit `null`
/// becomes `Some(None)`.
pub fn nullable<'de, T, D>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Overwrite `field` when the patch mentions it
pub(crate) fn patch<T>(field: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *field = value;
    }
}

/// Resolved limit/offset window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Window {
    pub limit: Option<usize>,
    pub offset: usize,
}

impl Window {
    /// Validate raw query values, applying `default_limit` when none was given
    pub fn new(limit: Option<i64>, offset: Option<i64>, default_limit: Option<i64>) -> Result<Self> {
        let limit = match limit.or(default_limit) {
            Some(l) if !(1..=MAX_PAGE_SIZE).contains(&l) => {
                return Err(Error::Validation(format!(
                    "limit must be between 1 and {}",
                    MAX_PAGE_SIZE
                )))
            }
            Some(l) => Some(l as usize),
            None => None,
        };

        let offset = match offset {
            Some(o) if o < 0 => {
                return Err(Error::Validation("offset must not be negative".to_string()))
            }
            Some(o) => o as usize,
            None => 0,
        };

        Ok(Self { limit, offset })
    }

    /// Apply to an already ordered iterator
    pub fn slice<T, I: IntoIterator<Item = T>>(&self, items: I) -> Vec<T> {
        let iter = items.into_iter().skip(self.offset);
        match self.limit {
            Some(limit) => iter.take(limit).collect(),
            None => iter.collect(),
        }
    }

    /// SQL LIMIT value, `None` meaning unbounded
    pub fn sql_limit(&self) -> Option<i64> {
        self.limit.map(|l| l as i64)
    }

    pub fn sql_offset(&self) -> i64 {
        self.offset as i64
    }
}

/// Case-insensitive substring match used by the search filters
pub(crate) fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Head counts shared by the student and teacher summaries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadcountStats {
    pub total: i64,
    pub active: i64,
    pub inactive: i64,
    pub male: i64,
    pub female: i64,
}

impl HeadcountStats {
    pub fn tally<'a, I>(people: I) -> Self
    where
        I: IntoIterator<Item = (bool, Option<&'a str>)>,
    {
        let mut stats = HeadcountStats::default();
        for (is_active, gender) in people {
            stats.total += 1;
            if is_active {
                stats.active += 1;
            } else {
                stats.inactive += 1;
            }
            match gender.map(str::to_lowercase).as_deref() {
                Some("male") => stats.male += 1,
                Some("female") => stats.female += 1,
                _ => {}
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "nullable")]
        phone: Option<Option<String>>,
    }

    #[test]
    fn test_nullable_distinguishes_absent_and_null() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.phone, None);

        let null: Patch = serde_json::from_str(r#"{"phone": null}"#).unwrap();
        assert_eq!(null.phone, Some(None));

        let set: Patch = serde_json::from_str(r#"{"phone": "555"}"#).unwrap();
        assert_eq!(set.phone, Some(Some("555".to_string())));
    }

    #[test]
    fn test_window_defaults_and_bounds() {
        let window = Window::new(None, None, Some(DEFAULT_PAGE_SIZE)).unwrap();
        assert_eq!(window.limit, Some(50));
        assert_eq!(window.offset, 0);

        assert_eq!(Window::new(None, None, None).unwrap().limit, None);
        assert!(Window::new(Some(0), None, None).is_err());
        assert!(Window::new(Some(201), None, None).is_err());
        assert!(Window::new(Some(10), Some(-1), None).is_err());
    }

    #[test]
    fn test_window_slice() {
        let window = Window::new(Some(2), Some(1), None).unwrap();
        assert_eq!(window.slice(vec![1, 2, 3, 4]), vec![2, 3]);
    }

    #[test]
    fn test_headcount_gender_case_insensitive() {
        let stats = HeadcountStats::tally(vec![
            (true, Some("Male")),
            (true, Some("FEMALE")),
            (false, Some("female")),
            (true, None),
        ]);
        assert_eq!(
            stats,
            HeadcountStats {
                total: 4,
                active: 3,
                inactive: 1,
                male: 1,
                female: 2
            }
        );
    }
}
