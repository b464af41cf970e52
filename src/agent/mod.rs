//! Agent module - the core autonomous agent logic.
//!
//! The agent follows a "tools in a loop" pattern:
//! 1. Seed the conversation with the system prompt and the task
//! 2. Ask the model for a completion
//! 3. If the reply contains a `tool_call` block, dispatch it and feed the
//!    result back as a user turn
//! 4. Repeat until the model answers without a tool call or the step
//!    budget runs out

mod agent_loop;
mod parser;
mod prompt;

pub use agent_loop::{Agent, AgentRunResult};
pub use parser::{extract_tool_calls, parse_tool_call, ToolCall};
pub use prompt::{AgentTask, PromptProfile};
