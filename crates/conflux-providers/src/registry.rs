//! Explicit driver registry
//!
//! Maps provider names to driver factories. The registry is constructed
//! once by the application and passed where it is needed; there is no
//! process-wide instance.

use std::collections::HashMap;
use std::sync::Arc;

use conflux_core::{DriverContext, Error, ProviderDriver, Result};

use crate::gemini::GeminiDriver;
use crate::ollama::OllamaDriver;
use crate::openai::OpenAiDriver;

/// Builds a driver from the shared plumbing.
pub type DriverFactory = Box<dyn Fn(DriverContext) -> Arc<dyn ProviderDriver> + Send + Sync>;

/// Name → factory map for provider drivers.
pub struct DriverRegistry {
    factories: HashMap<String, DriverFactory>,
}

impl DriverRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// A registry preloaded with the built-in drivers.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("openai", Box::new(|ctx| Arc::new(OpenAiDriver::new(ctx))));
        registry.register("gemini", Box::new(|ctx| Arc::new(GeminiDriver::new(ctx))));
        registry.register("ollama", Box::new(|ctx| Arc::new(OllamaDriver::new(ctx))));
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, factory: DriverFactory) {
        self.factories.insert(name.into(), factory);
    }

    /// Instantiate the driver registered under `name`.
    pub fn create(&self, name: &str, context: DriverContext) -> Result<Arc<dyn ProviderDriver>> {
        match self.factories.get(name) {
            Some(factory) => {
                tracing::debug!(provider = name, "driver created");
                Ok(factory(context))
            }
            None => Err(Error::Registration {
                name: name.to_string(),
            }),
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::context_with_transport;

    #[test]
    fn test_builtin_drivers_resolve() {
        let registry = DriverRegistry::with_builtin();
        for name in ["openai", "gemini", "ollama"] {
            let driver = registry
                .create(name, context_with_transport(Default::default()))
                .unwrap();
            assert_eq!(driver.name(), name);
        }
    }

    #[test]
    fn test_unknown_name_is_registration_error() {
        let registry = DriverRegistry::with_builtin();
        let err = registry
            .create("cobol-llm", context_with_transport(Default::default()))
            .err()
            .unwrap();
        match err {
            Error::Registration { name } => assert_eq!(name, "cobol-llm"),
            other => panic!("expected Registration, got {other:?}"),
        }
    }

    #[test]
    fn test_custom_registration() {
        let mut registry = DriverRegistry::new();
        assert!(registry.names().is_empty());
        registry.register("openai", Box::new(|ctx| Arc::new(OpenAiDriver::new(ctx))));
        assert_eq!(registry.names(), vec!["openai"]);
    }
}
