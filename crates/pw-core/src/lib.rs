//! PersonaWorks domain layer.
//!
//! Characters and voices, prompt construction, chat sessions, the Stage
//! state store, telemetry, the bundle format and the platform seam. Storage
//! and providers live in the infrastructure and interaction crates.

pub mod bundle;
pub mod character;
pub mod config;
pub mod error;
pub mod platform;
pub mod prompt;
pub mod session;
pub mod state;
pub mod telemetry;

// Re-export common error type
pub use error::PwError;
