//! A Rust client for Ollama-compatible local inference servers
//!
//! This library wraps the server's generate, listing and introspection
//! endpoints behind one client that always answers with a well-formed result,
//! plus a small HTTP proxy that exposes the client to other programs.

pub mod backend;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod prompt;
pub mod server;
pub mod types;

// Re-export main types for convenience
pub use backend::InferenceBackend;
pub use client::InferenceClient;
pub use config::{ClientConfig, RoleLabels};
pub use error::{FailureKind, InferenceError, InferenceResult};
pub use models::{ConversationTurn, GenerationOptions, ModelDescriptor, Role};
pub use types::{Failure, Generation, GenerationResult, RequestId, ServerStatus};

/// Initialize the logging system. Logs go to stderr so stdout stays JSON.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
}
