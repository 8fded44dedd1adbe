//! Prompt construction for the Stage chat simulator.
//!
//! Pure functions; nothing here fails. Missing fields render as empty.

mod budget;
mod builder;

pub use budget::{estimate_tokens, trim_to_budget};
pub use builder::{
    ChatPromptInput, KERNEL_BUDGET, RECENT_TURNS_BUDGET, RECENT_TURNS_LIMIT, SYSTEM_PREAMBLE,
    build_chat_prompt, build_persona_kernel, build_system_prompt, format_recent_turns,
};
