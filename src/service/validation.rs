//! Field rules for forum request bodies.

use crate::error::AppError;

pub const TITLE_MAX: usize = 50;
pub const DESCRIPTION_MAX: usize = 500;
pub const LOCATION_MAX: usize = 50;
pub const COMMENT_MAX: usize = 500;
pub const USERNAME_MAX: usize = 50;
pub const REPORT_REASON_MAX: usize = 500;

/// Required text: 1..=max characters and not only whitespace.
pub fn required_text(field: &str, value: &str, max: usize) -> Result<(), AppError> {
    if value.is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{} cannot be only whitespace", field)));
    }
    max_length(field, value, max)
}

pub fn optional_text(field: &str, value: Option<&str>, max: usize) -> Result<(), AppError> {
    match value {
        Some(v) => max_length(field, v, max),
        None => Ok(()),
    }
}

fn max_length(field: &str, value: &str, max: usize) -> Result<(), AppError> {
    let len = value.chars().count();
    if len > max {
        return Err(AppError::Validation(format!(
            "{} must be at most {} characters",
            field, max
        )));
    }
    Ok(())
}

/// Integer page size within `1..=max`, `default` when absent.
pub fn page_limit(raw: Option<&str>, default: u32, max: u32) -> Result<u32, AppError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    let limit: u32 = raw
        .trim()
        .parse()
        .map_err(|_| AppError::Validation(format!("limit must be an integer between 1 and {}", max)))?;
    if !(1..=max).contains(&limit) {
        return Err(AppError::Validation(format!("limit must be between 1 and {}", max)));
    }
    Ok(limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_text_rules() {
        assert!(required_text("title", "Pothole on 5th", TITLE_MAX).is_ok());
        assert!(matches!(required_text("title", "", TITLE_MAX), Err(AppError::Validation(m)) if m == "title is required"));
        assert!(matches!(
            required_text("title", "   ", TITLE_MAX),
            Err(AppError::Validation(m)) if m.contains("whitespace")
        ));
        assert!(required_text("title", &"x".repeat(51), TITLE_MAX).is_err());
        assert!(required_text("title", &"x".repeat(50), TITLE_MAX).is_ok());
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        assert!(required_text("title", &"é".repeat(50), TITLE_MAX).is_ok());
    }

    #[test]
    fn optional_text_allows_absent() {
        assert!(optional_text("location", None, LOCATION_MAX).is_ok());
        assert!(optional_text("location", Some(&"y".repeat(51)), LOCATION_MAX).is_err());
    }

    #[test]
    fn page_limit_bounds() {
        assert_eq!(page_limit(None, 25, 50).unwrap(), 25);
        assert_eq!(page_limit(Some("50"), 25, 50).unwrap(), 50);
        assert!(page_limit(Some("0"), 25, 50).is_err());
        assert!(page_limit(Some("51"), 25, 50).is_err());
        assert!(page_limit(Some("ten"), 25, 50).is_err());
    }
}
