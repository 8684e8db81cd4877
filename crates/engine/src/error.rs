// crates/engine/src/error.rs
use thiserror::Error;

/// Errors that can leave the dispatcher. Content-level problems never do:
/// a failing tag evaluates to the empty string and the response is still
/// assembled.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unknown session: {0}")]
    UnknownSession(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_error_display() {
        let err = DispatchError::UnknownSession("s-1".to_string());
        assert!(err.to_string().contains("s-1"));
    }
}
