use std::sync::Arc;

use anyhow::{Context, Result};

use pw_application::{PlatformClient, STAGE_SCOPE, StageContext};
use pw_core::telemetry::{DevConsole, TelemetryBus, lock_console};

use super::context::CliContext;

/// Runs a Stage conversation with one character and prints the transcript
/// followed by the Stage's log lines and token totals.
///
/// The Stage is seeded with the saved characters, or with the last Stage
/// bundle (or the demo set) when none are saved.
pub async fn run(ctx: &CliContext, bus: TelemetryBus, character_id: &str, texts: &[String], ai: bool) -> Result<()> {
    let (console, subscription) = DevConsole::new(ctx.dev_console_config().await?).attach(&bus);

    let mut stage = StageContext::new(bus, ctx.config.stage.clone()).with_bundle_store(ctx.bundle_store.clone());
    if ai {
        stage = stage.with_client(PlatformClient::new(Arc::clone(&ctx.platform)));
    }

    let saved = ctx.repository.export_all().await?;
    if saved.characters.is_empty() {
        stage.load_saved_or_demo().await?;
    } else {
        let bundle = serde_json::to_value(&saved)?;
        stage.import_bundle(&bundle, Some("characters")).await?;
    }

    stage
        .open_chat(character_id)
        .await
        .with_context(|| format!("Cannot open a chat with {}", character_id))?;

    for text in texts {
        if let Some(pending) = stage.send_message(text).await {
            pending.await.context("Reply task failed")?;
        }
    }

    {
        let state = stage.read().await;
        if let Some(session) = state.sessions.current_session() {
            println!("=== {} ===", state.tab_label(session));
            for message in &session.messages {
                println!("{}: {}", message.role.label(), message.content);
            }
        }
    }

    subscription.unsubscribe();
    let console = lock_console(&console);
    println!("\n=== Log ===");
    for entry in console.entries().filter(|e| e.scope == STAGE_SCOPE) {
        println!("{} {}", entry.time, entry.summary());
    }
    let totals = console.totals();
    println!(
        "\nTokens in/out: {}/{} over {} request(s), avg {}ms",
        totals.input_tokens,
        totals.output_tokens,
        totals.requests,
        totals.average_latency_ms()
    );
    Ok(())
}
