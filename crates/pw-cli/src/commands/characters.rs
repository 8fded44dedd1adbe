use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;

use pw_core::bundle::parse_bundle;
use pw_core::character::Readiness;
use pw_core::prompt::{ChatPromptInput, build_chat_prompt, build_persona_kernel, build_system_prompt};

use super::context::CliContext;

pub async fn list(ctx: &CliContext) -> Result<()> {
    let characters = ctx.repository.list().await?;
    if characters.is_empty() {
        println!("No saved characters.");
        return Ok(());
    }
    for c in &characters {
        let role = if c.role.is_empty() { "-" } else { c.role.as_str() };
        let readiness = Readiness::of(c);
        let status = if readiness.is_ready() { "" } else { readiness.message() };
        println!("{:<24} {:<28} {:<16} {}", c.id, c.name, role, status);
    }
    println!("\n{} character(s)", characters.len());
    Ok(())
}

pub async fn import(ctx: &CliContext, file: &Path) -> Result<()> {
    let content = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {} as JSON", file.display()))?;

    let (bundle, rejected) = parse_bundle(&value)?;
    let summary = ctx.repository.import_bundle(&bundle).await?;
    println!(
        "✅ Imported {} character(s), {} failed",
        summary.ok,
        summary.fail + rejected
    );
    Ok(())
}

pub async fn export(ctx: &CliContext, out: Option<&Path>) -> Result<()> {
    let bundle = ctx.repository.export_all().await?;
    let json = serde_json::to_string_pretty(&bundle)?;
    match out {
        Some(path) => {
            tokio::fs::write(path, json + "\n")
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("✅ Exported {} character(s) to {}", bundle.characters.len(), path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

/// Prints the system prompt and the chat prompt a first message would use.
pub async fn prompt(ctx: &CliContext, character_id: &str, text: &str) -> Result<()> {
    let character = ctx
        .repository
        .get(character_id)
        .await?
        .with_context(|| format!("Character not found: {}", character_id))?;

    let kernel = build_persona_kernel(Some(&character));
    let chat = build_chat_prompt(ChatPromptInput {
        persona: &kernel,
        recent_turns: &[],
        user_text: text.trim(),
    });
    println!("=== System ===\n{}\n", build_system_prompt(&character));
    println!("=== Chat ===\n{chat}");
    Ok(())
}

pub async fn archetypes(ctx: &CliContext) -> Result<()> {
    let archetypes = ctx.platform.get_voice_archetypes().await;
    if archetypes.is_empty() {
        println!("No voice archetypes available from the {} platform.", ctx.platform.id());
        return Ok(());
    }
    for summary in archetypes {
        println!("{:<24} {}", summary.id, summary.name);
    }
    Ok(())
}
