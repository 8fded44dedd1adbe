//! Stage state store.

mod model;

pub use model::{BundleMeta, StageState};
