//! Platform abstraction.
//!
//! A platform supplies named lists, voice archetypes, text completion and
//! random names. Two providers exist (see `pw-interaction`); the active one
//! is chosen from a [`PlatformEnv`].

mod normalize;

pub use normalize::{
    ListDialect, VoiceDoc, build_voice_doc, clip, normalize_archetype, normalize_list, slug,
};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::character::{Archetype, ArchetypeSummary, Gender};

/// Feature flags a provider advertises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub lists: bool,
    pub ai: bool,
}

/// Data provider behind the Studio and Stage.
///
/// Methods never fail: providers log problems and degrade to empty results.
#[async_trait::async_trait]
pub trait Platform: Send + Sync {
    /// Provider id (`local`, `perchance`).
    fn id(&self) -> &str;

    fn capabilities(&self) -> Capabilities;

    /// A named list (species, hair colors...), normalized.
    async fn get_list(&self, name: &str) -> Vec<String>;

    /// Archetypes for the voice dropdown.
    async fn get_voice_archetypes(&self) -> Vec<ArchetypeSummary>;

    /// Full archetype record, if known.
    async fn get_archetype(&self, id: &str) -> Option<Archetype>;

    /// Text completion for `prompt`.
    async fn ai_complete(&self, prompt: &str) -> String;

    /// A random full name suited to `gender`, when supported.
    async fn get_random_name(&self, gender: Gender) -> Option<String>;
}

/// Known providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
    #[default]
    Local,
    Perchance,
}

impl PlatformKind {
    /// Parses a provider name; anything unrecognized is `Local`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "perchance" => PlatformKind::Perchance,
            _ => PlatformKind::Local,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformKind::Local => "local",
            PlatformKind::Perchance => "perchance",
        }
    }
}

impl fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Environment hints used to pick a provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformEnv {
    /// `env` query parameter.
    pub query_env: Option<String>,
    /// `pw-env` meta tag.
    pub meta_env: Option<String>,
    /// Host the page was served from.
    pub host: Option<String>,
    /// Global Perchance flag.
    pub perchance_flag: bool,
}

impl PlatformEnv {
    /// Explicit hint for the provider name.
    pub fn explicit(env: impl Into<String>) -> Self {
        Self {
            query_env: Some(env.into()),
            ..Default::default()
        }
    }

    /// Query parameter, then meta tag, then host sniffing or the global flag.
    pub fn detect(&self) -> PlatformKind {
        let hinted = [&self.query_env, &self.meta_env]
            .into_iter()
            .flatten()
            .find(|s| !s.trim().is_empty());
        if let Some(env) = hinted {
            return PlatformKind::parse(env);
        }
        let host_is_perchance = self
            .host
            .as_deref()
            .is_some_and(|h| h.to_lowercase().contains("perchance.org"));
        if host_is_perchance || self.perchance_flag {
            PlatformKind::Perchance
        } else {
            PlatformKind::Local
        }
    }
}
