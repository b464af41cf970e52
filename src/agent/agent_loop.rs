//! Core agent loop implementation.

use std::sync::Arc;

use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use crate::llm::{CompletionOptions, Conversation, LlmClient, LlmError, Message};
use crate::tools::ToolRegistry;

use super::parser::{parse_tool_call, ToolCall};
use super::prompt::{AgentTask, PromptProfile};

/// The autonomous agent.
pub struct Agent {
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    max_steps: Option<usize>,
    model: Option<String>,
}

/// Outcome of one run.
#[derive(Debug, Clone, Serialize)]
pub struct AgentRunResult {
    /// Final assistant text, or the last appended message when the budget
    /// ran out.
    pub response: String,
    pub conversation: Conversation,
    pub tool_calls: Vec<ToolCall>,
    /// Completions requested.
    pub steps: usize,
    pub exhausted: bool,
}

impl Agent {
    pub fn new(llm: Arc<dyn LlmClient>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            llm,
            tools,
            max_steps: None,
            model: None,
        }
    }

    /// Override the profile's default step budget.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    /// Override the client's default model.
    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    /// Run a task to completion or until the step budget is spent.
    ///
    /// Tool failures are reported back to the model; only completion errors
    /// end the run early.
    pub async fn run(&self, task: &AgentTask) -> Result<AgentRunResult, LlmError> {
        let profile = task.profile();
        let max_steps = self.max_steps.unwrap_or(profile.default_max_steps());
        let span = tracing::info_span!("agent_run", run_id = %Uuid::new_v4(), profile = ?profile);

        self.run_loop(task, profile, max_steps).instrument(span).await
    }

    async fn run_loop(
        &self,
        task: &AgentTask,
        profile: PromptProfile,
        max_steps: usize,
    ) -> Result<AgentRunResult, LlmError> {
        let mut conversation = Conversation::new(profile.system_prompt(&self.tools));
        conversation.push(Message::user(task.user_message()));

        let options = CompletionOptions::with_model(self.model.clone());
        let mut tool_calls = Vec::new();

        for step in 1..=max_steps {
            tracing::debug!(step, max_steps, "Requesting completion");

            let reply = self.llm.complete(conversation.messages(), &options).await?;
            conversation.push(Message::assistant(reply.clone()));

            let Some(call) = parse_tool_call(&reply) else {
                tracing::info!(steps = step, "Agent finished");
                return Ok(AgentRunResult {
                    response: reply,
                    conversation,
                    tool_calls,
                    steps: step,
                    exhausted: false,
                });
            };

            tracing::info!(step, tool = %call.tool, "Tool call");
            let result = match self.tools.dispatch(&call.tool, call.args.clone()).await {
                Ok(output) => output.render(),
                Err(e) => {
                    tracing::warn!(tool = %call.tool, error = %e, "Tool failed");
                    format!("{}{}", profile.error_prefix(), single_line(&e.to_string()))
                }
            };

            conversation.push(Message::user(format!(
                "{}\n{}",
                profile.result_marker(),
                result
            )));
            tool_calls.push(call);
        }

        tracing::warn!(max_steps, "Step budget exhausted");
        let response = conversation.last().map(Message::text).unwrap_or_default();
        Ok(AgentRunResult {
            response,
            conversation,
            tool_calls,
            steps: max_steps,
            exhausted: true,
        })
    }
}

fn single_line(message: &str) -> String {
    message
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
