// crates/core/src/error.rs
use thiserror::Error;

/// Errors raised when constructing a category.
///
/// Template parsing itself never fails (the parser degrades malformed markup
/// to literal text), so the only load-time rejection is an unusable pattern.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CategoryError {
    #[error("category has an empty pattern")]
    EmptyPattern,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_error_display() {
        assert_eq!(
            CategoryError::EmptyPattern.to_string(),
            "category has an empty pattern"
        );
    }
}
