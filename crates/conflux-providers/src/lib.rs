//! Conflux Providers - concrete drivers for the unified operation interface
//!
//! Each driver implements one provider's endpoint calls on top of the core
//! engine: it builds a request body, obtains a tracked handle, runs the
//! exchange through the dispatcher, and reports through the callback
//! sinks. The [`DriverRegistry`] maps provider names to driver factories
//! and is constructed once by the application.

pub mod gemini;
pub mod ollama;
pub mod openai;
pub mod registry;

pub use gemini::GeminiDriver;
pub use ollama::OllamaDriver;
pub use openai::OpenAiDriver;
pub use registry::{DriverFactory, DriverRegistry};

#[cfg(test)]
pub(crate) mod testing;
