//! PersonaWorks platform providers.
//!
//! # Module Structure
//!
//! - `local`: lists and archetypes from JSON files, simulated completion
//! - `perchance`: Perchance-hosted data behind a [`PerchanceBridge`]
//!
//! [`create_platform`] picks the provider for a [`PlatformEnv`].

pub mod local;
pub mod perchance;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use pw_core::platform::{Platform, PlatformEnv, PlatformKind};

pub use local::LocalPlatform;
pub use perchance::{PerchanceBridge, PerchancePlatform, StaticBridge};

/// Where providers get their data.
#[derive(Clone)]
pub struct PlatformSources {
    /// Directory of `<name>.json` files for the local provider.
    pub lists_dir: PathBuf,
    /// Bridge used by the Perchance provider.
    pub bridge: Arc<dyn PerchanceBridge>,
}

impl PlatformSources {
    pub fn new(lists_dir: impl AsRef<Path>) -> Self {
        Self {
            lists_dir: lists_dir.as_ref().to_path_buf(),
            bridge: Arc::new(StaticBridge::default()),
        }
    }

    pub fn with_bridge(mut self, bridge: Arc<dyn PerchanceBridge>) -> Self {
        self.bridge = bridge;
        self
    }
}

/// Builds the provider selected by `env` (see [`PlatformEnv::detect`]).
pub fn create_platform(env: &PlatformEnv, sources: PlatformSources) -> Arc<dyn Platform> {
    let kind = env.detect();
    tracing::info!("Using {} platform", kind);
    match kind {
        PlatformKind::Local => Arc::new(LocalPlatform::new(sources.lists_dir)),
        PlatformKind::Perchance => Arc::new(PerchancePlatform::new(sources.bridge)),
    }
}
