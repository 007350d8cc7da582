use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::RegistryError;

// ========== PATIENT ==========
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Patient {
    pub id: Option<i64>, // assigned by the store on first save
    pub name: String,
    pub birth_date: Option<NaiveDate>,
    pub sick: bool,
    pub score: i32,
}

pub const PATIENT_NAME_MIN: usize = 4;
pub const PATIENT_NAME_MAX: usize = 40;
pub const PATIENT_SCORE_MIN: i32 = 100;

impl Patient {
    pub fn name_violation(&self) -> Option<String> {
        let len = self.name.chars().count();
        if len == 0 {
            Some("must not be empty".to_string())
        } else if !(PATIENT_NAME_MIN..=PATIENT_NAME_MAX).contains(&len) {
            Some(format!(
                "size must be between {} and {}",
                PATIENT_NAME_MIN, PATIENT_NAME_MAX
            ))
        } else {
            None
        }
    }

    pub fn score_violation(&self) -> Option<String> {
        (self.score < PATIENT_SCORE_MIN)
            .then(|| format!("must be greater than or equal to {}", PATIENT_SCORE_MIN))
    }

    /// Reject records that break the name or score constraints.
    pub fn validate(&self) -> Result<(), RegistryError> {
        let problems: Vec<String> = [
            self.name_violation().map(|m| format!("name {}", m)),
            self.score_violation().map(|m| format!("score {}", m)),
        ]
        .into_iter()
        .flatten()
        .collect();

        if problems.is_empty() {
            Ok(())
        } else {
            Err(RegistryError::Validation(problems.join(", ")))
        }
    }
}

// ========== ACCOUNT ==========
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Role {
    pub role: String, // USER | ADMIN
}

impl Role {
    pub fn new(role: impl Into<String>) -> Self {
        Self { role: role.into() }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Account {
    pub user_id: String,
    pub username: String,
    pub password: String, // argon2 PHC string, never the plain password
    pub email: String,
    #[serde(default)]
    pub roles: BTreeSet<Role>,
}

// ========== PAGINATION ==========
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
}

impl PageRequest {
    /// Build a request from raw query values. Negative pages clamp to zero and
    /// a size below one falls back to `default_size`.
    pub fn new(page: i64, size: i64, default_size: u32) -> Self {
        let page = page.clamp(0, u32::MAX as i64) as u32;
        let size = if size < 1 {
            default_size.max(1)
        } else {
            size.min(u32::MAX as i64) as u32
        };
        Self { page, size }
    }

    pub fn offset(&self) -> usize {
        self.page as usize * self.size as usize
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Page<T> {
    pub content: Vec<T>,
    pub number: u32,
    pub size: u32,
    pub total_elements: u64,
    pub total_pages: u32,
}

impl<T> Page<T> {
    /// Slice an already ordered, already filtered result set.
    pub fn from_matches(matches: Vec<T>, request: PageRequest) -> Self {
        let total_elements = matches.len() as u64;
        let size = request.size.max(1) as u64;
        let total_pages = total_elements.div_ceil(size) as u32;
        let content = matches
            .into_iter()
            .skip(request.offset())
            .take(request.size as usize)
            .collect();
        Self {
            content,
            number: request.page,
            size: request.size,
            total_elements,
            total_pages,
        }
    }

    /// Zero-based indices used to render the page links.
    pub fn page_indices(&self) -> Vec<u32> {
        (0..self.total_pages).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patient(name: &str, score: i32) -> Patient {
        Patient {
            id: None,
            name: name.to_string(),
            birth_date: None,
            sick: false,
            score,
        }
    }

    #[test]
    fn test_patient_constraints() {
        assert!(patient("Hassan", 132).validate().is_ok());
        assert!(patient("Rita", 100).validate().is_ok());
        assert!(patient(&"x".repeat(40), 100).validate().is_ok());

        assert!(patient("Ali", 132).name_violation().is_some());
        assert!(patient(&"x".repeat(41), 132).name_violation().is_some());
        assert_eq!(patient("", 132).name_violation().as_deref(), Some("must not be empty"));
        assert!(patient("Hassan", 99).score_violation().is_some());

        let err = patient("Ali", 10).validate().unwrap_err();
        assert!(matches!(err, RegistryError::Validation(ref m) if m.contains("name") && m.contains("score")));
    }

    #[test]
    fn test_page_request_clamps_bad_values() {
        assert_eq!(PageRequest::new(-3, 0, 4), PageRequest { page: 0, size: 4 });
        assert_eq!(PageRequest::new(2, 10, 4), PageRequest { page: 2, size: 10 });
    }

    #[test]
    fn test_page_slices_and_counts() {
        let page = Page::from_matches((1..=10).collect::<Vec<i32>>(), PageRequest::new(2, 4, 4));
        assert_eq!(page.content, vec![9, 10]);
        assert_eq!(page.total_elements, 10);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.page_indices(), vec![0, 1, 2]);
    }

    #[test]
    fn test_page_past_the_end_is_empty() {
        let page = Page::from_matches(vec!["a", "b"], PageRequest::new(5, 4, 4));
        assert!(page.content.is_empty());
        assert_eq!(page.total_elements, 2);
        assert_eq!(page.total_pages, 1);
    }
}
