//! Local provider: lists and voice archetypes from JSON files on disk, a
//! simulated completion and a built-in name bank.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde_json::Value;
use tokio::sync::{Mutex, OnceCell};

use pw_core::character::{Archetype, ArchetypeSummary, Gender};
use pw_core::platform::{
    Capabilities, ListDialect, Platform, VoiceDoc, build_voice_doc, clip, normalize_list,
};

/// List name that resolves to the archetype dropdown.
pub const VOICE_ARCHETYPES_LIST: &str = "voice_archetypes";

const COMPLETION_PREVIEW: usize = 200;

const MALE_NAMES: &[&str] = &[
    "Kaelen", "Darius", "Rowan", "Jarek", "Marcus", "Theron", "Alden", "Lucan", "Corin", "Brennan",
    "Silas", "Garrick", "Liam", "Noah", "Oliver", "Elijah", "James", "Benjamin", "Lucas", "Henry",
    "Alexander", "Ethan", "William", "Michael", "Daniel", "Jacob", "Samuel", "David", "Joseph",
    "Mateo", "Jack", "Leo",
];

const FEMALE_NAMES: &[&str] = &[
    "Seris", "Maera", "Liora", "Anya", "Kara", "Mirel", "Tamsin", "Elara", "Nyra", "Sabine", "Vera",
    "Isolde", "Emma", "Olivia", "Ava", "Sophia", "Isabella", "Mia", "Amelia", "Harper", "Evelyn",
    "Abigail", "Emily", "Ella", "Elizabeth", "Sofia", "Avery", "Charlotte", "Grace", "Chloe",
    "Victoria", "Lily",
];

const NEUTRAL_NAMES: &[&str] = &[
    "Ash", "Rei", "Sage", "Ryn", "Vale", "Ari", "Noor", "Kai", "Ren", "Sol", "Quinn", "Soren",
];

const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis", "Rodriguez",
    "Martinez", "Hernandez", "Lopez", "Gonzalez", "Wilson", "Anderson", "Thomas", "Taylor", "Moore",
    "Jackson", "Martin", "Lee", "Perez", "Thompson", "White", "Harris", "Sanchez", "Clark",
    "Ramirez", "Lewis", "Robinson", "Walker", "Young", "Allen", "King", "Wright", "Scott", "Torres",
    "Nguyen", "Hill", "Flores",
];

/// First names offered for `gender`; anything but female or non-binary
/// draws from the male pool.
pub fn first_name_pool(gender: Gender) -> &'static [&'static str] {
    match gender {
        Gender::Female => FEMALE_NAMES,
        Gender::NonBinary => NEUTRAL_NAMES,
        _ => MALE_NAMES,
    }
}

pub fn last_name_pool() -> &'static [&'static str] {
    LAST_NAMES
}

/// Platform reading `<data_dir>/<name>.json`.
///
/// Lists and the archetype document are read once and memoized for the
/// lifetime of the provider, including failed reads (cached as empty).
pub struct LocalPlatform {
    data_dir: PathBuf,
    lists: Mutex<HashMap<String, Vec<String>>>,
    voice_doc: OnceCell<VoiceDoc>,
}

impl LocalPlatform {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            lists: Mutex::new(HashMap::new()),
            voice_doc: OnceCell::new(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    async fn read_json(&self, name: &str) -> anyhow::Result<Value> {
        let path = self.data_dir.join(format!("{name}.json"));
        let content = tokio::fs::read_to_string(&path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    async fn voice_doc(&self) -> &VoiceDoc {
        self.voice_doc
            .get_or_init(|| async {
                match self.read_json(VOICE_ARCHETYPES_LIST).await {
                    Ok(raw) => build_voice_doc(&raw),
                    Err(e) => {
                        tracing::warn!("[local] voice_archetypes.json not available: {}", e);
                        VoiceDoc::default()
                    }
                }
            })
            .await
    }
}

#[async_trait]
impl Platform for LocalPlatform {
    fn id(&self) -> &str {
        "local"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            lists: true,
            ai: true,
        }
    }

    async fn get_list(&self, name: &str) -> Vec<String> {
        if let Some(cached) = self.lists.lock().await.get(name) {
            return cached.clone();
        }

        let list = if name == VOICE_ARCHETYPES_LIST {
            self.voice_doc()
                .await
                .list()
                .into_iter()
                .map(|a| a.name)
                .collect()
        } else {
            match self.read_json(name).await {
                Ok(raw) => normalize_list(&raw, ListDialect::Plain),
                Err(e) => {
                    tracing::warn!("[local] list not found: {} ({})", name, e);
                    Vec::new()
                }
            }
        };

        self.lists
            .lock()
            .await
            .entry(name.to_string())
            .or_insert(list)
            .clone()
    }

    async fn get_voice_archetypes(&self) -> Vec<ArchetypeSummary> {
        self.voice_doc().await.list()
    }

    async fn get_archetype(&self, id: &str) -> Option<Archetype> {
        let id = id.trim();
        if id.is_empty() {
            return None;
        }
        self.voice_doc().await.get(id).cloned()
    }

    async fn ai_complete(&self, prompt: &str) -> String {
        format!("[[LOCAL SIM]] {}…", clip(prompt, COMPLETION_PREVIEW))
    }

    async fn get_random_name(&self, gender: Gender) -> Option<String> {
        let mut rng = rand::thread_rng();
        let first = first_name_pool(gender).choose(&mut rng)?;
        let last = LAST_NAMES.choose(&mut rng)?;
        Some(format!("{first} {last}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, body: &str) {
        std::fs::write(dir.path().join(format!("{name}.json")), body).unwrap();
    }

    #[tokio::test]
    async fn test_list_is_normalized_and_memoized() {
        let dir = TempDir::new().unwrap();
        write(&dir, "species", r#"["Elf", " elf ", "", "Human"]"#);
        let platform = LocalPlatform::new(dir.path());

        assert_eq!(platform.get_list("species").await, vec!["Elf", "Human"]);

        write(&dir, "species", r#"["Dwarf"]"#);
        assert_eq!(platform.get_list("species").await, vec!["Elf", "Human"]);
    }

    #[tokio::test]
    async fn test_missing_list_is_empty() {
        let dir = TempDir::new().unwrap();
        let platform = LocalPlatform::new(dir.path());
        assert!(platform.get_list("nope").await.is_empty());
        assert!(platform.get_voice_archetypes().await.is_empty());
        assert!(platform.get_archetype("sage").await.is_none());
    }

    #[tokio::test]
    async fn test_archetypes_from_doc() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            VOICE_ARCHETYPES_LIST,
            r#"{"items": {"sage": {"id": "sage", "name": "Sage", "formality": 70}},
                "list": ["Sage", "Wry Rogue"]}"#,
        );
        let platform = LocalPlatform::new(dir.path());

        let ids: Vec<String> = platform
            .get_voice_archetypes()
            .await
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec!["sage", "wry-rogue"]);

        let sage = platform.get_archetype(" sage ").await.unwrap();
        assert_eq!(sage.formality, 70);
        assert_eq!(sage.sentence_length, "medium");
        assert_eq!(
            platform.get_list(VOICE_ARCHETYPES_LIST).await,
            vec!["Sage", "Wry Rogue"]
        );
    }

    #[tokio::test]
    async fn test_ai_complete_clips_prompt() {
        let platform = LocalPlatform::new("/nonexistent");
        let reply = platform.ai_complete(&"x".repeat(500)).await;
        assert!(reply.starts_with("[[LOCAL SIM]] xxx"));
        assert_eq!(reply.chars().count(), "[[LOCAL SIM]] ".len() + 200 + 1);
    }

    #[tokio::test]
    async fn test_random_name_uses_gender_pool() {
        let platform = LocalPlatform::new("/nonexistent");
        for _ in 0..20 {
            let name = platform.get_random_name(Gender::NonBinary).await.unwrap();
            let (first, last) = name.split_once(' ').unwrap();
            assert!(NEUTRAL_NAMES.contains(&first));
            assert!(LAST_NAMES.contains(&last));
        }
        let name = platform.get_random_name(Gender::Unspecified).await.unwrap();
        assert!(MALE_NAMES.contains(&name.split(' ').next().unwrap()));
    }
}
