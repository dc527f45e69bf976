//! Input validation for board, column and task writes.
//!
//! Everything here runs before a transaction is opened, so a rejected request
//! never touches the database.

use thiserror::Error;

/// Maximum title length, in characters.
pub const MAX_TITLE_LEN: usize = 255;

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Title is required and must be a non-empty string")]
    EmptyTitle,

    #[error("Title must be less than {max} characters (got {len})")]
    TitleTooLong { len: usize, max: usize },

    #[error("{field} must be a non-negative integer (got {value})")]
    NegativeIndex { field: &'static str, value: i64 },

    #[error("Search term is required")]
    EmptySearchTerm,
}

/// Validate a title and return it trimmed.
///
/// # Examples
/// ```
/// use db::validation::validate_title;
///
/// assert_eq!(validate_title("  Backlog ").unwrap(), "Backlog");
/// assert!(validate_title("   ").is_err());
/// ```
pub fn validate_title(title: &str) -> Result<String, ValidationError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    let len = trimmed.chars().count();
    if len > MAX_TITLE_LEN {
        return Err(ValidationError::TitleTooLong {
            len,
            max: MAX_TITLE_LEN,
        });
    }
    Ok(trimmed.to_string())
}

/// Trim an optional description. Blank descriptions are stored as NULL.
pub fn normalize_description(description: Option<&str>) -> Option<String> {
    description
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
}

/// Validate an index or position supplied by a caller.
pub fn validate_index(field: &'static str, value: i64) -> Result<i64, ValidationError> {
    if value < 0 {
        Err(ValidationError::NegativeIndex { field, value })
    } else {
        Ok(value)
    }
}

pub fn validate_search_term(term: &str) -> Result<String, ValidationError> {
    let trimmed = term.trim();
    if trimmed.is_empty() {
        Err(ValidationError::EmptySearchTerm)
    } else {
        Ok(trimmed.to_string())
    }
}
