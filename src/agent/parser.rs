//! Tool-call extraction from assistant replies.
//!
//! A reply requests a tool by embedding a fenced block:
//!
//! ````text
//! ```tool_call
//! {"tool": "read_excel", "args": {"file_path": "data.xlsx"}}
//! ```
//! ````
//!
//! Only the first block counts. Anything that does not parse into a call is
//! treated as a final answer.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::llm::Conversation;

/// One requested tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

fn fence() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)```tool_call\s*\n(.+?)\n```").expect("tool_call fence pattern is valid")
    })
}

/// The first tool call in `text`, if any. Never fails: malformed blocks
/// yield `None`.
pub fn parse_tool_call(text: &str) -> Option<ToolCall> {
    let body = fence().captures(text)?.get(1)?.as_str();
    match serde_json::from_str::<ToolCall>(body.trim()) {
        Ok(call) => Some(call),
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring malformed tool_call block");
            None
        }
    }
}

/// Tool calls of every assistant turn, in order.
pub fn extract_tool_calls(conversation: &Conversation) -> Vec<ToolCall> {
    conversation
        .assistant_turns()
        .filter_map(|message| parse_tool_call(&message.text()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Message;
    use serde_json::json;

    #[test]
    fn extracts_tool_and_args_ignoring_surrounding_text() {
        let reply = "I'll read the file first.\n```tool_call\n{\"tool\": \"read_excel\", \"args\": {\"file_path\": \"a.xlsx\"}}\n```\nThen summarize.";
        let call = parse_tool_call(reply).expect("call");
        assert_eq!(call.tool, "read_excel");
        assert_eq!(Value::Object(call.args), json!({"file_path": "a.xlsx"}));
    }

    #[test]
    fn missing_args_means_empty_map() {
        let call = parse_tool_call("```tool_call\n{\"tool\": \"get_summary\"}\n```").unwrap();
        assert!(call.args.is_empty());
    }

    #[test]
    fn whitespace_after_tag_is_allowed() {
        let call = parse_tool_call("```tool_call   \n  {\"tool\": \"auto_fit\"}  \n```").unwrap();
        assert_eq!(call.tool, "auto_fit");
    }

    #[test]
    fn no_fence_is_no_call() {
        assert_eq!(parse_tool_call("The total is 60."), None);
        assert_eq!(parse_tool_call("```json\n{\"tool\": \"read_excel\"}\n```"), None);
    }

    #[test]
    fn invalid_body_is_no_call() {
        assert_eq!(
            parse_tool_call("```tool_call\n{\"tool\": \"read_excel\", args}\n```"),
            None
        );
        assert_eq!(parse_tool_call("```tool_call\n{\"args\": {}}\n```"), None);
        assert_eq!(
            parse_tool_call("```tool_call\n{\"tool\": \"x\", \"args\": [1, 2]}\n```"),
            None
        );
    }

    #[test]
    fn first_block_wins() {
        let reply = "```tool_call\n{\"tool\": \"first\"}\n```\n```tool_call\n{\"tool\": \"second\"}\n```";
        assert_eq!(parse_tool_call(reply).unwrap().tool, "first");
    }

    #[test]
    fn multiline_body_parses() {
        let reply = "```tool_call\n{\n  \"tool\": \"write_cells\",\n  \"args\": {\"cells\": []}\n}\n```";
        let call = parse_tool_call(reply).unwrap();
        assert_eq!(call.tool, "write_cells");
        assert_eq!(call.args["cells"], json!([]));
    }

    #[test]
    fn extracts_calls_from_assistant_turns_only() {
        let mut conversation = Conversation::new("system");
        conversation.push(Message::user("```tool_call\n{\"tool\": \"from_user\"}\n```"));
        conversation.push(Message::assistant("```tool_call\n{\"tool\": \"a\"}\n```"));
        conversation.push(Message::user("Tool result:\nok"));
        conversation.push(Message::assistant("done"));
        conversation.push(Message::assistant("```tool_call\n{\"tool\": \"b\"}\n```"));

        let tools: Vec<String> = extract_tool_calls(&conversation)
            .into_iter()
            .map(|c| c.tool)
            .collect();
        assert_eq!(tools, vec!["a", "b"]);
    }
}
