//! Stage chat flow.
//!
//! [`StageContext`] owns one Stage instance: the imported characters, the
//! chat tabs and the telemetry hooks. Replies are simulated: after a short
//! delay the user's own text comes back as the assistant turn, unless a
//! [`ModelClient`] is installed with [`StageContext::with_client`].

use std::sync::Arc;
use std::time::Instant;

use serde_json::{Value, json};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::task::JoinHandle;

use pw_core::bundle::{demo_bundle, parse_stage_bundle};
use pw_core::character::now_millis;
use pw_core::config::{BundleStore, StageSettings};
use pw_core::error::{PwError, Result};
use pw_core::platform::clip;
use pw_core::prompt::{
    ChatPromptInput, RECENT_TURNS_LIMIT, build_chat_prompt, build_persona_kernel,
    build_system_prompt,
};
use pw_core::session::{Message, SessionDescriptor};
use pw_core::state::{BundleMeta, StageState};
use pw_core::telemetry::TelemetryBus;

use crate::client::{ChatRequest, ModelClient};
use crate::stage_bus::StageBus;

/// Characters of a prompt carried in a `PROMPT_BUILT` event.
const PROMPT_PREVIEW_CHARS: usize = 300;
/// Characters of the user text echoed back as the simulated reply.
const ECHO_REPLY_CHARS: usize = 200;

pub const REGENERATED_REPLY: &str = "Regenerated (demo).";
pub const DEFAULT_IMPORT_FILENAME: &str = "bundle.json";
pub const DEMO_FILENAME: &str = "demo.json";
pub const SAVED_FILENAME: &str = "saved.json";

pub struct StageContext {
    state: Arc<RwLock<StageState>>,
    bus: StageBus,
    settings: StageSettings,
    bundle_store: Option<Arc<dyn BundleStore>>,
    client: Option<Arc<dyn ModelClient>>,
}

impl StageContext {
    pub fn new(bus: TelemetryBus, settings: StageSettings) -> Self {
        Self {
            state: Arc::new(RwLock::new(StageState::new())),
            bus: StageBus::new(bus),
            settings,
            bundle_store: None,
            client: None,
        }
    }

    /// Persists imported bundles and restores them in [`load_saved_or_demo`](Self::load_saved_or_demo).
    pub fn with_bundle_store(mut self, store: Arc<dyn BundleStore>) -> Self {
        self.bundle_store = Some(store);
        self
    }

    /// Completes through `client` instead of echoing. Each exchange is
    /// reported on the bus against the configured endpoint, and the response
    /// only once its reply has landed.
    pub fn with_client<C: ModelClient + 'static>(mut self, client: C) -> Self {
        self.client = Some(Arc::new(client));
        self
    }

    pub fn state(&self) -> &Arc<RwLock<StageState>> {
        &self.state
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, StageState> {
        self.state.read().await
    }

    pub async fn write(&self) -> RwLockWriteGuard<'_, StageState> {
        self.state.write().await
    }

    pub fn stage_bus(&self) -> &StageBus {
        &self.bus
    }

    pub fn settings(&self) -> &StageSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut StageSettings {
        &mut self.settings
    }

    /// Switches to the character's chat, creating it on first use.
    pub async fn open_chat(&self, character_id: &str) -> Result<String> {
        let mut state = self.state.write().await;
        if state.character(character_id).is_none() {
            return Err(PwError::not_found("character", character_id));
        }
        let session_id = match state.sessions.find_session_by_character(character_id) {
            Some(existing) => existing.id.clone(),
            None => state.sessions.create_session(character_id),
        };
        let descriptor = state.sessions.switch_to_session(&session_id);
        follow_descriptor(&mut state, &descriptor);
        Ok(session_id)
    }

    /// Makes a tab current; unknown ids are ignored.
    pub async fn switch_tab(&self, session_id: &str) -> SessionDescriptor {
        let mut state = self.state.write().await;
        let descriptor = state.sessions.switch_to_session(session_id);
        follow_descriptor(&mut state, &descriptor);
        descriptor
    }

    /// Closes a tab and returns the session that is current afterwards.
    pub async fn close_tab(&self, session_id: &str) -> Option<String> {
        let mut state = self.state.write().await;
        state.sessions.close_session(session_id).map(str::to_string)
    }

    /// Opens a chat for every selected character (or the focused one) and
    /// switches to the first of them in tab order.
    pub async fn start_chats(&self) -> Result<Option<String>> {
        let mut state = self.state.write().await;
        let mut ids = state.selected_ids().to_vec();
        if ids.is_empty() {
            ids.extend(state.selected_char_id.clone());
        }
        if ids.is_empty() {
            return Err(PwError::validation("Pick at least one character."));
        }

        for id in &ids {
            if state.sessions.find_session_by_character(id).is_none() {
                let session_id = state.sessions.create_session(id);
                if state.sessions.current_session_id().is_none() {
                    state.sessions.switch_to_session(&session_id);
                }
            }
        }

        let first = state
            .sessions
            .sessions()
            .iter()
            .find(|s| s.character_id().is_some_and(|c| ids.iter().any(|id| id == c)))
            .map(|s| s.id.clone());
        if let Some(session_id) = &first {
            let descriptor = state.sessions.switch_to_session(session_id);
            follow_descriptor(&mut state, &descriptor);
        }
        Ok(first)
    }

    /// Starts a group chat with the selected characters, or the first two
    /// characters when fewer than two are selected.
    pub async fn start_group(&self) -> Result<String> {
        let mut state = self.state.write().await;
        let mut ids = state.selected_ids().to_vec();
        if ids.len() < 2 {
            ids = state.characters.iter().take(2).map(|c| c.id.clone()).collect();
        }
        if ids.len() < 2 {
            return Err(PwError::validation("Pick at least two characters."));
        }
        let names = state.names_of(&ids);
        state.sessions.start_group_session(&ids, &names)
    }

    /// Sends `text` in the current session.
    ///
    /// Returns `None` when nothing was sent (blank text or no current
    /// session). Otherwise the handle resolves once the reply has landed or
    /// been dropped because its session was closed meanwhile.
    pub async fn send_message(&self, text: &str) -> Option<JoinHandle<()>> {
        let content = text.trim();
        if content.is_empty() {
            return None;
        }

        let mut state = self.state.write().await;
        let session = state.sessions.current_session_mut()?;
        session.push(Message::user(content));
        let session = session.clone();

        let persona = session
            .character_id()
            .and_then(|id| state.character(id))
            .cloned();
        let persona_id = match (&persona, session.is_group()) {
            (Some(c), _) => Some(c.id.clone()),
            (None, true) => Some("(group)".to_string()),
            (None, false) => None,
        };

        let kernel = build_persona_kernel(persona.as_ref());
        let prior = &session.messages[..session.messages.len() - 1];
        let recent = &prior[prior.len().saturating_sub(RECENT_TURNS_LIMIT)..];
        let full_prompt = build_chat_prompt(ChatPromptInput {
            persona: &kernel,
            recent_turns: recent,
            user_text: content,
        });
        state.last_prompt_preview = full_prompt.clone();
        drop(state);

        let model = self.settings.model.as_str();
        let temperature = self.settings.temperature;
        self.bus.prompt_built(
            persona_id.as_deref(),
            model,
            temperature,
            &clip(&full_prompt, PROMPT_PREVIEW_CHARS),
        );

        let system_preview = match (&persona, session.is_group()) {
            (Some(c), _) => build_system_prompt(c),
            (None, true) => "(group session)".to_string(),
            (None, false) => "(no persona)".to_string(),
        };
        self.bus.prompt_built(
            persona_id.as_deref(),
            model,
            temperature,
            &clip(&system_preview, PROMPT_PREVIEW_CHARS),
        );

        let state = self.state.clone();
        let session_id = session.id;
        let bus = self.bus.clone();
        self.bus.request_sent(model, &self.settings.endpoint);
        let started = Instant::now();

        if let Some(client) = self.client.clone() {
            let request = ChatRequest {
                model: model.to_string(),
                temperature,
                max_tokens: self.settings.max_tokens,
                prompt: full_prompt,
            };
            return Some(tokio::spawn(async move {
                match client.send(&request).await {
                    Ok(response) => {
                        if land_reply(&state, &session_id, response.text).await {
                            bus.response_received(&response.usage, elapsed_ms(started));
                        }
                    }
                    Err(e) => {
                        bus.error(&e);
                        tracing::warn!("Completion for session {} failed: {}", session_id, e);
                    }
                }
            }));
        }

        let delay = self.settings.reply_delay();
        let content = content.to_string();
        Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let reply = clip(&content, ECHO_REPLY_CHARS);
            let usage = json!({
                "input_tokens": quarter(system_preview.chars().count() + content.chars().count()),
                "output_tokens": quarter(reply.chars().count()),
            });
            if land_reply(&state, &session_id, reply).await {
                bus.response_received(&usage, elapsed_ms(started));
            }
        }))
    }

    /// Appends the canned regenerate reply to the current session.
    pub async fn regenerate(&self) -> bool {
        let mut state = self.state.write().await;
        match state.sessions.current_session_mut() {
            Some(session) => {
                session.push(Message::assistant(REGENERATED_REPLY));
                true
            }
            None => false,
        }
    }

    pub async fn clear_chat(&self) -> bool {
        let mut state = self.state.write().await;
        match state.sessions.current_session_mut() {
            Some(session) => {
                session.messages.clear();
                true
            }
            None => false,
        }
    }

    pub async fn load_demo(&self) -> Result<BundleMeta> {
        self.import_bundle(&demo_bundle(now_millis()), Some(DEMO_FILENAME)).await
    }

    /// Replaces the loaded characters with the bundle's.
    ///
    /// A rejected bundle leaves the state untouched. On success every tab is
    /// closed, the selection is cleared, the first character is focused and
    /// the bundle is handed to the bundle store, if any.
    pub async fn import_bundle(&self, bundle: &Value, filename: Option<&str>) -> Result<BundleMeta> {
        let parsed = parse_stage_bundle(bundle, now_millis())?;
        let meta = BundleMeta {
            exported_at: parsed.exported_at.clone(),
            filename: filename
                .filter(|f| !f.is_empty())
                .unwrap_or(DEFAULT_IMPORT_FILENAME)
                .to_string(),
            count: parsed.characters.len(),
        };

        {
            let mut state = self.state.write().await;
            state.characters = parsed.characters.clone();
            state.bundle_meta = Some(meta.clone());
            state.clear_selection();
            state.sessions.reset();
            state.selected_char_id = state.characters.first().map(|c| c.id.clone());
        }
        tracing::info!("Imported {}", meta.label());

        if let Some(store) = &self.bundle_store {
            if let Err(e) = store.save(&parsed).await {
                tracing::warn!("Failed to persist imported bundle: {}", e);
            }
        }
        Ok(meta)
    }

    /// Restores the saved bundle, falling back to the demo characters when
    /// there is none or it cannot be imported.
    pub async fn load_saved_or_demo(&self) -> Result<BundleMeta> {
        let saved = match &self.bundle_store {
            Some(store) => store.load().await.unwrap_or_else(|e| {
                tracing::warn!("Failed to read saved bundle: {}", e);
                None
            }),
            None => None,
        };
        if let Some(saved) = saved {
            match self.import_bundle(&saved, Some(SAVED_FILENAME)).await {
                Ok(meta) => return Ok(meta),
                Err(e) => tracing::warn!("Saved bundle rejected, loading demo: {}", e),
            }
        }
        self.load_demo().await
    }
}

fn follow_descriptor(state: &mut StageState, descriptor: &SessionDescriptor) {
    if let Some(id) = &descriptor.character_id {
        state.select_character(id);
    }
}

/// Appends an assistant turn unless the session is gone.
async fn land_reply(state: &RwLock<StageState>, session_id: &str, reply: String) -> bool {
    let landed = state
        .write()
        .await
        .sessions
        .append_message(session_id, Message::assistant(reply));
    if !landed {
        tracing::debug!("Session {} closed before its reply landed", session_id);
    }
    landed
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

fn quarter(chars: usize) -> u64 {
    (chars as f64 / 4.0).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use pw_core::session::MessageRole;
    use crate::client::ChatResponse;
    use pw_core::telemetry::{TelemetryEvent, TokenUsage, kinds};
    use std::sync::Mutex;

    fn stage() -> (StageContext, Arc<Mutex<Vec<TelemetryEvent>>>) {
        let bus = TelemetryBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _subscription = bus.subscribe(move |event| {
            sink.lock().unwrap().push(event.clone());
            Ok(())
        });
        let settings = StageSettings {
            reply_delay_ms: 5,
            ..StageSettings::default()
        };
        (StageContext::new(bus, settings), seen)
    }

    #[tokio::test]
    async fn test_demo_focuses_first_character() {
        let (stage, _) = stage();
        let meta = stage.load_demo().await.unwrap();
        assert_eq!(meta.filename, DEMO_FILENAME);
        assert_eq!(meta.count, 4);

        let state = stage.read().await;
        assert_eq!(state.selected_char_id.as_deref(), Some("aria-001"));
        assert!(state.sessions.is_empty());
    }

    #[tokio::test]
    async fn test_wrong_bundle_type_keeps_characters() {
        let (stage, _) = stage();
        stage.load_demo().await.unwrap();

        let err = stage
            .import_bundle(&json!({"type": "other", "version": 1, "characters": []}), None)
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(stage.read().await.characters.len(), 4);
    }

    #[tokio::test]
    async fn test_import_resets_tabs_and_selection() {
        let (stage, _) = stage();
        stage.load_demo().await.unwrap();
        stage.open_chat("daren-002").await.unwrap();
        stage.write().await.set_selected("mira-003", true);

        let meta = stage
            .import_bundle(
                &json!({"type": "personaworks.characters", "version": 1,
                        "characters": [{"name": "Solo"}]}),
                None,
            )
            .await
            .unwrap();
        assert_eq!(meta.filename, DEFAULT_IMPORT_FILENAME);

        let state = stage.read().await;
        assert!(state.sessions.is_empty());
        assert!(state.selected_ids().is_empty());
        assert_eq!(state.characters[0].name, "Solo");
        assert_eq!(state.selected_char_id.as_deref(), Some(state.characters[0].id.as_str()));
    }

    #[tokio::test]
    async fn test_open_chat_reuses_session() {
        let (stage, _) = stage();
        stage.load_demo().await.unwrap();

        let first = stage.open_chat("aria-001").await.unwrap();
        let again = stage.open_chat("aria-001").await.unwrap();
        assert_eq!(first, again);
        assert_eq!(stage.read().await.sessions.len(), 1);
        assert!(stage.open_chat("nobody").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_start_chats_requires_a_character() {
        let (stage, _) = stage();
        assert!(stage.start_chats().await.unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn test_start_chats_opens_selected() {
        let (stage, _) = stage();
        stage.load_demo().await.unwrap();
        {
            let mut state = stage.write().await;
            state.set_selected("aria-001", true);
            state.set_selected("vex-004", true);
        }

        let current = stage.start_chats().await.unwrap().unwrap();
        let state = stage.read().await;
        assert_eq!(state.sessions.len(), 2);
        // Newest tab first: vex was created last.
        let current_session = state.sessions.get_session_by_id(&current).unwrap();
        assert_eq!(current_session.character_id(), Some("vex-004"));
        assert_eq!(state.selected_char_id.as_deref(), Some("vex-004"));
    }

    #[tokio::test]
    async fn test_start_group_falls_back_to_first_two() {
        let (stage, _) = stage();
        assert!(stage.start_group().await.unwrap_err().is_validation());

        stage.load_demo().await.unwrap();
        let group_id = stage.start_group().await.unwrap();

        let state = stage.read().await;
        let group = state.sessions.current_session().unwrap();
        assert_eq!(group.id, group_id);
        assert_eq!(group.participant_ids(), ["aria-001", "daren-002"]);
        assert_eq!(group.messages.len(), 3);
        assert_eq!(group.messages[1].content, "[Aria Farwind] Checking in.");
    }

    #[tokio::test]
    async fn test_send_message_flow() {
        let (stage, seen) = stage();
        stage.load_demo().await.unwrap();
        stage.open_chat("aria-001").await.unwrap();

        assert!(stage.send_message("   ").await.is_none());
        let handle = stage.send_message("  Hello there  ").await.unwrap();
        handle.await.unwrap();

        let state = stage.read().await;
        let session = state.sessions.current_session().unwrap();
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[0].role, MessageRole::User);
        assert_eq!(session.messages[0].content, "Hello there");
        assert_eq!(session.messages[1].role, MessageRole::Assistant);
        assert_eq!(session.messages[1].content, "Hello there");
        assert!(state.last_prompt_preview.contains("[Persona Kernel]\nName: Aria Farwind"));
        assert!(state.last_prompt_preview.ends_with("[User]\nHello there\n\n[Assistant]"));

        let events = seen.lock().unwrap();
        let kinds: Vec<&str> = events.iter().map(|e| e.kind.as_str()).collect();
        assert_eq!(
            kinds,
            vec![
                kinds::PROMPT_BUILT,
                kinds::PROMPT_BUILT,
                kinds::REQUEST_SENT,
                kinds::RESPONSE_RECEIVED
            ]
        );
        assert_eq!(events[0].data["personaId"], "aria-001");
        assert!(events[1].data["promptPreview"].as_str().unwrap().starts_with("You are Aria Farwind, a Scout."));

        let aria = state.character("aria-001").unwrap();
        let system_len = build_system_prompt(aria).chars().count();
        assert_eq!(
            events[3].tokens,
            Some(TokenUsage {
                input: quarter(system_len + "Hello there".len()),
                output: quarter("Hello there".len()),
            })
        );
    }

    #[tokio::test]
    async fn test_group_send_uses_group_persona() {
        let (stage, seen) = stage();
        stage.load_demo().await.unwrap();
        stage.start_group().await.unwrap();
        stage.send_message("Status?").await.unwrap().await.unwrap();

        let events = seen.lock().unwrap();
        assert_eq!(events[0].data["personaId"], "(group)");
        assert_eq!(events[1].data["promptPreview"], "(group session)");
        assert!(!stage.read().await.last_prompt_preview.contains("[Persona Kernel]"));
    }

    #[tokio::test]
    async fn test_reply_dropped_when_session_closed() {
        let (stage, seen) = stage();
        stage.load_demo().await.unwrap();
        let session_id = stage.open_chat("aria-001").await.unwrap();

        let handle = stage.send_message("hi").await.unwrap();
        assert_eq!(stage.close_tab(&session_id).await, None);
        handle.await.unwrap();

        assert!(stage.read().await.sessions.is_empty());
        let received = seen
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.kind == kinds::RESPONSE_RECEIVED)
            .count();
        assert_eq!(received, 0);
    }

    struct SlowClient {
        delay_ms: u64,
    }

    #[async_trait::async_trait]
    impl ModelClient for SlowClient {
        async fn send(&self, request: &ChatRequest) -> anyhow::Result<ChatResponse> {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
            Ok(ChatResponse {
                text: format!("reply to {} chars", request.prompt.chars().count()),
                usage: json!({"prompt_tokens": 12, "completion_tokens": 3}),
            })
        }
    }

    struct DownClient;

    #[async_trait::async_trait]
    impl ModelClient for DownClient {
        async fn send(&self, _request: &ChatRequest) -> anyhow::Result<ChatResponse> {
            anyhow::bail!("model offline")
        }
    }

    fn kinds_of(seen: &Mutex<Vec<TelemetryEvent>>) -> Vec<String> {
        seen.lock().unwrap().iter().map(|e| e.kind.clone()).collect()
    }

    #[tokio::test]
    async fn test_client_reply_lands_in_session() {
        let (stage, seen) = stage();
        let stage = stage.with_client(SlowClient { delay_ms: 1 });
        stage.load_demo().await.unwrap();
        stage.open_chat("aria-001").await.unwrap();

        stage.send_message("Hello").await.unwrap().await.unwrap();

        let state = stage.read().await;
        let session = state.sessions.current_session().unwrap();
        assert_eq!(session.messages.len(), 2);
        assert!(session.messages[1].content.starts_with("reply to "));
        assert_eq!(
            kinds_of(&seen),
            vec![
                kinds::PROMPT_BUILT,
                kinds::PROMPT_BUILT,
                kinds::REQUEST_SENT,
                kinds::RESPONSE_RECEIVED
            ]
        );
        let events = seen.lock().unwrap();
        assert_eq!(events[3].tokens, Some(TokenUsage { input: 12, output: 3 }));
    }

    #[tokio::test]
    async fn test_client_reply_dropped_when_session_closed() {
        let (stage, seen) = stage();
        let stage = stage.with_client(SlowClient { delay_ms: 30 });
        stage.load_demo().await.unwrap();
        let session_id = stage.open_chat("aria-001").await.unwrap();

        let handle = stage.send_message("hi").await.unwrap();
        stage.close_tab(&session_id).await;
        handle.await.unwrap();

        assert!(stage.read().await.sessions.is_empty());
        assert!(!kinds_of(&seen).iter().any(|k| k == kinds::RESPONSE_RECEIVED));
    }

    #[tokio::test]
    async fn test_client_failure_reports_error() {
        let (stage, seen) = stage();
        let stage = stage.with_client(DownClient);
        stage.load_demo().await.unwrap();
        stage.open_chat("aria-001").await.unwrap();

        stage.send_message("hi").await.unwrap().await.unwrap();

        assert_eq!(stage.read().await.sessions.current_session().unwrap().messages.len(), 1);
        let kinds = kinds_of(&seen);
        assert_eq!(kinds.last().map(String::as_str), Some(kinds::ERROR));
        assert!(!kinds.iter().any(|k| k == kinds::RESPONSE_RECEIVED));
        let events = seen.lock().unwrap();
        assert_eq!(events.last().unwrap().message, "model offline");
    }

    #[tokio::test]
    async fn test_send_without_session_is_noop() {
        let (stage, seen) = stage();
        stage.load_demo().await.unwrap();
        assert!(stage.send_message("hi").await.is_none());
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_regenerate_and_clear() {
        let (stage, _) = stage();
        assert!(!stage.regenerate().await);
        stage.load_demo().await.unwrap();
        stage.open_chat("mira-003").await.unwrap();

        assert!(stage.regenerate().await);
        {
            let state = stage.read().await;
            let session = state.sessions.current_session().unwrap();
            assert_eq!(session.messages[0].content, REGENERATED_REPLY);
        }
        assert!(stage.clear_chat().await);
        assert!(stage.read().await.sessions.current_session().unwrap().messages.is_empty());
    }

    #[tokio::test]
    async fn test_switch_tab_focuses_character() {
        let (stage, _) = stage();
        stage.load_demo().await.unwrap();
        let aria = stage.open_chat("aria-001").await.unwrap();
        stage.open_chat("daren-002").await.unwrap();

        let descriptor = stage.switch_tab(&aria).await;
        assert_eq!(descriptor.character_id.as_deref(), Some("aria-001"));
        assert_eq!(stage.read().await.selected_char_id.as_deref(), Some("aria-001"));

        let unknown = stage.switch_tab("s_missing").await;
        assert_eq!(unknown, SessionDescriptor::default());
        assert_eq!(stage.read().await.sessions.current_session_id(), Some(aria.as_str()));
    }
}
