//! Model clients for the Stage.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use pw_core::platform::Platform;
use pw_core::prompt::estimate_tokens;

use crate::stage_bus::StageBus;

/// One completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub prompt: String,
}

/// A completion and the provider's usage object, in whatever shape the
/// provider reports it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub text: String,
    #[serde(default)]
    pub usage: Value,
}

#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn send(&self, request: &ChatRequest) -> anyhow::Result<ChatResponse>;
}

/// Completes through a platform provider's `ai_complete`.
///
/// Usage is estimated with the prompt budget heuristic and reported in the
/// `prompt_tokens`/`completion_tokens` shape.
pub struct PlatformClient {
    platform: Arc<dyn Platform>,
}

impl PlatformClient {
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl ModelClient for PlatformClient {
    async fn send(&self, request: &ChatRequest) -> anyhow::Result<ChatResponse> {
        let text = self.platform.ai_complete(&request.prompt).await;
        let usage = json!({
            "prompt_tokens": estimate_tokens(&request.prompt),
            "completion_tokens": estimate_tokens(&text),
        });
        Ok(ChatResponse { text, usage })
    }
}

/// Wraps a client so every call reports `REQUEST_SENT` and then either
/// `RESPONSE_RECEIVED` (with usage and latency) or `ERROR`.
///
/// Errors are passed through after being reported.
pub struct InstrumentedClient<C> {
    inner: C,
    bus: StageBus,
    endpoint: String,
}

impl<C: ModelClient> InstrumentedClient<C> {
    pub fn new(inner: C, bus: StageBus, endpoint: impl Into<String>) -> Self {
        Self {
            inner,
            bus,
            endpoint: endpoint.into(),
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

#[async_trait]
impl<C: ModelClient> ModelClient for InstrumentedClient<C> {
    async fn send(&self, request: &ChatRequest) -> anyhow::Result<ChatResponse> {
        self.bus.request_sent(&request.model, &self.endpoint);
        let started = Instant::now();
        match self.inner.send(request).await {
            Ok(response) => {
                let elapsed = started.elapsed().as_secs_f64() * 1000.0;
                self.bus.response_received(&response.usage, elapsed);
                Ok(response)
            }
            Err(e) => {
                self.bus.error(&e);
                Err(e)
            }
        }
    }
}

#[async_trait]
impl<T: ModelClient + ?Sized> ModelClient for Arc<T> {
    async fn send(&self, request: &ChatRequest) -> anyhow::Result<ChatResponse> {
        (**self).send(request).await
    }
}
