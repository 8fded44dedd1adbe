//! Session domain module.
//!
//! # Module Structure
//!
//! - `model`: `Session`, `SessionKind` and the switch descriptor
//! - `message`: transcript message types (`MessageRole`, `Message`)
//! - `manager`: session lifecycle over the Stage's session list (`SessionManager`)

mod manager;
mod message;
mod model;

pub use manager::SessionManager;
pub use message::{Message, MessageRole};
pub use model::{Session, SessionDescriptor, SessionKind};
