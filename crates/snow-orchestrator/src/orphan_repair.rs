//! Orphan repair (§4.3). A pure function over `&[Message]` run
//! in-memory, immediately before every outbound request — the session on
//! disk is never touched. Invariants S1/S2 describe what this function
//! restores for the outbound sequence, not what the stored log must
//! already satisfy (a mid-turn session legitimately has an unmatched
//! trailing `tool_calls`).

use std::collections::HashSet;

use snow_core::types::{Message, Role};

/// Repairs `messages` into a copy safe to send to a provider:
///
/// 1. collect every `tool_call_id` that has a matching tool message,
/// 2. collect every `tool_call_id` an assistant message declares,
/// 3. drop any assistant message with at least one undeclared-as-matched
///    `tool_calls[i].id` (i.e. a tool_call with no result),
/// 4. drop any tool message whose `tool_call_id` no assistant message
///    declared.
///
/// Step 3 drops the *whole* assistant message rather than trimming its
/// `tool_calls` array — a provider that sees a tool_calls array with
/// results for only some entries is exactly the failure mode this exists
/// to prevent.
pub fn repair(messages: &[Message]) -> Vec<Message> {
    let answered: HashSet<&str> = messages
        .iter()
        .filter(|m| m.role == Role::Tool)
        .filter_map(|m| m.tool_call_id.as_deref())
        .collect();

    let assistant_survives = |calls: &Option<Vec<snow_core::types::ToolCall>>| match calls {
        Some(calls) => calls.iter().all(|c| answered.contains(c.id.as_str())),
        None => true,
    };

    // Only ids declared by an assistant message that itself survives step 3
    // count as "declared" — an assistant dropped for an unmatched call can't
    // leave its *answered* calls' tool messages behind either, or those
    // become orphans with no preceding declaration (S2).
    let declared: HashSet<&str> = messages
        .iter()
        .filter(|m| m.role == Role::Assistant && assistant_survives(&m.tool_calls))
        .filter_map(|m| m.tool_calls.as_ref())
        .flat_map(|calls| calls.iter().map(|c| c.id.as_str()))
        .collect();

    messages
        .iter()
        .filter(|m| match m.role {
            Role::Assistant => assistant_survives(&m.tool_calls),
            Role::Tool => m.tool_call_id.as_deref().is_some_and(|id| declared.contains(id)),
            Role::User | Role::System => true,
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use snow_core::types::ToolCall;

    fn call(id: &str) -> ToolCall {
        ToolCall { id: id.to_string(), name: "filesystem-read".to_string(), arguments_json: serde_json::json!({}) }
    }

    #[test]
    fn passes_through_a_clean_history_unchanged() {
        let assistant = Message::assistant("").with_tool_calls(vec![call("a")]);
        let messages = vec![Message::user("hi"), assistant, Message::tool_result("a", "ok")];
        let repaired = repair(&messages);
        assert_eq!(repaired.len(), 3);
    }

    #[test]
    fn drops_assistant_with_unmatched_tool_call() {
        let assistant = Message::assistant("").with_tool_calls(vec![call("x")]);
        let messages = vec![Message::user("hi"), assistant];
        let repaired = repair(&messages);
        assert_eq!(repaired.len(), 1);
        assert_eq!(repaired[0].role, Role::User);
    }

    #[test]
    fn drops_tool_message_with_undeclared_tool_call_id() {
        let messages = vec![Message::user("hi"), Message::tool_result("ghost", "orphan result")];
        let repaired = repair(&messages);
        assert_eq!(repaired.len(), 1);
    }

    #[test]
    fn drops_whole_assistant_message_when_only_some_calls_answered() {
        let assistant = Message::assistant("").with_tool_calls(vec![call("a"), call("b")]);
        let messages = vec![Message::user("hi"), assistant, Message::tool_result("a", "ok")];
        let repaired = repair(&messages);
        // The assistant is dropped (call "b" unanswered), which must also
        // drop "a"'s tool result — it would otherwise be a tool message
        // with no preceding assistant declaring it (S2).
        assert_eq!(repaired.len(), 1);
        assert_eq!(repaired[0].role, Role::User);
    }

    #[test]
    fn keeps_assistant_with_no_tool_calls() {
        let messages = vec![Message::user("hi"), Message::assistant("hello there")];
        let repaired = repair(&messages);
        assert_eq!(repaired.len(), 2);
    }

    #[test]
    fn repairs_both_directions_in_one_pass() {
        let assistant = Message::assistant("").with_tool_calls(vec![call("x")]);
        let messages = vec![
            Message::user("hi"),
            assistant,
            Message::tool_result("ghost", "unrelated orphan"),
        ];
        let repaired = repair(&messages);
        assert_eq!(repaired.len(), 1);
        assert_eq!(repaired[0].role, Role::User);
    }
}
