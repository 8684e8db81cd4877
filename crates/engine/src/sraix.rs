// crates/engine/src/sraix.rs
//! External service seam for `<sraix>`.
//!
//! Adapters are registered by name; the evaluator forwards the tag's
//! attributes and evaluated body and splices the adapter's response into
//! the output. A missing adapter or a failing call yields the empty
//! string; the error surfaces only in logs.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use thiserror::Error;

/// What the evaluator hands to an adapter.
#[derive(Debug, Clone)]
pub struct ServiceRequest {
    pub service: String,
    pub attributes: HashMap<String, String>,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct ServiceResponse {
    pub body: String,
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("service timed out after {0:?}")]
    Timeout(Duration),
    #[error("service call failed: {0}")]
    Failed(String),
}

/// A remote-service adapter. Implementations own their transport, URL
/// templates, response extraction, and timeout handling.
pub trait ServiceAdapter: Send + Sync {
    fn call(&self, request: &ServiceRequest) -> Result<ServiceResponse, ServiceError>;
}

/// Name-keyed adapter registry shared by all sessions.
#[derive(Default)]
pub struct ServiceRegistry {
    adapters: RwLock<HashMap<String, Arc<dyn ServiceAdapter>>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: impl Into<String>, adapter: Arc<dyn ServiceAdapter>) {
        self.adapters.write().unwrap().insert(name.into(), adapter);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ServiceAdapter>> {
        self.adapters.read().unwrap().get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl ServiceAdapter for Echo {
        fn call(&self, request: &ServiceRequest) -> Result<ServiceResponse, ServiceError> {
            Ok(ServiceResponse {
                body: format!("echo:{}", request.body),
            })
        }
    }

    #[test]
    fn test_register_and_call() {
        let registry = ServiceRegistry::new();
        registry.register("echo", Arc::new(Echo));
        let adapter = registry.get("echo").unwrap();
        let response = adapter
            .call(&ServiceRequest {
                service: "echo".to_string(),
                attributes: HashMap::new(),
                body: "hi".to_string(),
            })
            .unwrap();
        assert_eq!(response.body, "echo:hi");
    }

    #[test]
    fn test_missing_adapter() {
        let registry = ServiceRegistry::new();
        assert!(registry.get("nope").is_none());
    }
}
