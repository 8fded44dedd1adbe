use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;

use pw_application::StageContext;
use pw_application::stage::{DEMO_FILENAME, SAVED_FILENAME};
use pw_core::config::{BundleStore, StageSettings};
use pw_core::telemetry::TelemetryBus;
use pw_infrastructure::FileBundleStore;

fn stage_with_store(store: Arc<FileBundleStore>) -> StageContext {
    StageContext::new(TelemetryBus::new(), StageSettings::default()).with_bundle_store(store)
}

#[tokio::test]
async fn test_first_run_loads_demo_and_saves_it() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(FileBundleStore::new(temp_dir.path().join("pw_chat_bundle.json")));

    let meta = stage_with_store(store.clone()).load_saved_or_demo().await.unwrap();
    assert_eq!(meta.filename, DEMO_FILENAME);

    let saved = store.load().await.unwrap().unwrap();
    assert_eq!(saved["type"], "personaworks.characters");
    assert_eq!(saved["characters"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_saved_bundle_is_restored() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(FileBundleStore::new(temp_dir.path().join("pw_chat_bundle.json")));

    let first = stage_with_store(store.clone());
    first
        .import_bundle(
            &json!({
                "type": "perchance.characters",
                "exportedAt": "2024-05-01T10:00:00.000Z",
                "characters": [{"id": "kit-1", "name": "Kit", "age": "old"}]
            }),
            Some("mine.json"),
        )
        .await
        .unwrap();

    let second = stage_with_store(store);
    let meta = second.load_saved_or_demo().await.unwrap();
    assert_eq!(meta.filename, SAVED_FILENAME);
    assert_eq!(meta.exported_at, "2024-05-01T10:00:00.000Z");
    assert_eq!(meta.count, 1);

    let state = second.read().await;
    assert_eq!(state.characters[0].name, "Kit");
    assert_eq!(state.characters[0].age, None);
    assert_eq!(state.selected_char_id.as_deref(), Some("kit-1"));
}

#[tokio::test]
async fn test_unusable_saved_bundle_falls_back_to_demo() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("pw_chat_bundle.json");
    std::fs::write(&path, r#"{"type": "something.else", "characters": []}"#).unwrap();

    let stage = stage_with_store(Arc::new(FileBundleStore::new(path)));
    let meta = stage.load_saved_or_demo().await.unwrap();
    assert_eq!(meta.filename, DEMO_FILENAME);
    assert_eq!(stage.read().await.characters.len(), 4);
}
