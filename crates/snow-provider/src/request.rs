//! Request assembly: turning a session's message history plus the resolved
//! system prompt into a dialect-ready [`ChatRequest`] (§4.1).

use snow_core::types::Message;

use crate::types::{split_tool_images, ChatRequest, SystemPromptSources, ToolDefinition};

/// Build the request sent to a dialect client. `history` is expected to
/// already be orphan-repaired (snow-orchestrator's job, run immediately
/// before every outbound request) and filtered of `sub_agent_internal`
/// messages by the caller.
pub fn build_request(
    model: impl Into<String>,
    prompt_sources: &SystemPromptSources,
    history: &[Message],
    tools: Vec<ToolDefinition>,
    max_tokens: u32,
    thinking: bool,
    cache_key: Option<String>,
) -> ChatRequest {
    let messages = split_tool_images(history);
    ChatRequest {
        model: model.into(),
        system_prompt: prompt_sources.resolve(),
        messages,
        tools,
        max_tokens,
        thinking,
        cache_key,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snow_core::types::Message;

    #[test]
    fn builds_request_with_resolved_prompt_and_split_images() {
        use snow_core::types::ImagePart;
        let mut tool_msg = Message::tool_result("c1", "done");
        tool_msg.images = Some(vec![ImagePart { mime_type: "image/png".into(), data: "x".into() }]);

        let sources = SystemPromptSources {
            main_agent_role: Some("assistant".into()),
            ..Default::default()
        };

        let req = build_request(
            "gpt-5",
            &sources,
            &[Message::user("hi"), tool_msg],
            Vec::new(),
            4096,
            false,
            None,
        );

        assert_eq!(req.model, "gpt-5");
        assert_eq!(req.system_prompt, "assistant");
        assert_eq!(req.messages.len(), 3);
    }
}
