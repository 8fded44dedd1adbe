//! PersonaWorks application layer.
//!
//! # Module Structure
//!
//! - `stage`: the Stage chat flow over a [`StageContext`]
//! - `stage_bus`: telemetry hooks for one chat exchange
//! - `client`: model clients and the instrumented wrapper
//! - `studio`: the character editor
//! - `tracing_layer`: forwards `tracing` events to the telemetry bus

pub mod client;
pub mod stage;
pub mod stage_bus;
pub mod studio;
pub mod tracing_layer;

pub use client::{ChatRequest, ChatResponse, InstrumentedClient, ModelClient, PlatformClient};
pub use stage::StageContext;
pub use stage_bus::{STAGE_SCOPE, StageBus, extract_usage};
pub use studio::{Move, StudioEditor};
pub use tracing_layer::TelemetryLayer;
