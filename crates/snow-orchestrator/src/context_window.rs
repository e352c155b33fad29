//! Context-percentage estimation driving the auto-compression checkpoint
//! (§4.4 step 7f, §4.6). No BPE tokenizer crate is pulled in for this —
//! none of the corpus this workspace is grounded on links one, and the
//! checkpoint only needs a threshold crossing, not an exact count — so this
//! is a character-per-token heuristic (~4 chars/token, the commonly-quoted
//! average for English/code mixed text) against a fixed context window
//! size. Good enough to trip the 80% default threshold in the right
//! ballpark; see DESIGN.md for the tradeoff this accepts.

use snow_core::types::Message;

const CHARS_PER_TOKEN: usize = 4;

/// Context window size assumed for the percentage calculation. Matches the
/// advanced model's documented window; a model-specific table would be the
/// next refinement if this ever needs to be precise rather than
/// threshold-tripping.
pub const CONTEXT_WINDOW_TOKENS: usize = 200_000;

pub fn estimate_tokens(messages: &[Message]) -> usize {
    messages.iter().map(|m| m.content.len() / CHARS_PER_TOKEN).sum()
}

pub fn percentage(messages: &[Message]) -> u8 {
    let tokens = estimate_tokens(messages);
    let pct = (tokens as f64 / CONTEXT_WINDOW_TOKENS as f64) * 100.0;
    pct.min(100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use snow_core::types::Message;

    #[test]
    fn empty_history_is_zero_percent() {
        assert_eq!(percentage(&[]), 0);
    }

    #[test]
    fn large_history_crosses_threshold() {
        let big = "x".repeat(CONTEXT_WINDOW_TOKENS * CHARS_PER_TOKEN);
        let messages = vec![Message::user(big)];
        assert!(percentage(&messages) >= 80);
    }
}
