//! Approximate token accounting.
//!
//! Four characters per token; no tokenizer is involved.

/// Estimated token count: `ceil(chars / 4)`.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Trims `text` to roughly `max_tokens` estimated tokens.
///
/// Text within budget is returned unchanged. Otherwise the text is cut to the
/// same fraction of its characters as `max_tokens` is of its estimate, then
/// snapped back to the last `". "` if that boundary lies past character 60.
pub fn trim_to_budget(text: &str, max_tokens: usize) -> String {
    let estimate = estimate_tokens(text);
    if estimate <= max_tokens {
        return text.to_string();
    }

    let ratio = max_tokens as f64 / estimate as f64;
    let keep = (text.chars().count() as f64 * ratio).floor() as usize;
    let mut cut: String = text.chars().take(keep).collect();

    if let Some(byte_idx) = cut.rfind(". ") {
        if cut[..byte_idx].chars().count() > 60 {
            cut.truncate(byte_idx + 1);
        }
    }
    cut
}
