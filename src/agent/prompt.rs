//! System prompt templates and task framing for the agent.

use crate::tools::ToolRegistry;

/// Which conversation dialect a run speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptProfile {
    /// Chinese prompt for people driving the agent directly.
    Interactive,
    /// English prompt for benchmark tasks with an answer position.
    Benchmark,
}

impl PromptProfile {
    /// Prefix of the user turn that carries a tool result.
    pub fn result_marker(&self) -> &'static str {
        match self {
            Self::Interactive => "工具执行结果:",
            Self::Benchmark => "Tool result:",
        }
    }

    /// Prefix of a failed tool result.
    pub fn error_prefix(&self) -> &'static str {
        match self {
            Self::Interactive => "错误: ",
            Self::Benchmark => "Error: ",
        }
    }

    pub fn default_max_steps(&self) -> usize {
        match self {
            Self::Interactive => 10,
            Self::Benchmark => 15,
        }
    }

    /// Full system prompt with the tool list embedded.
    pub fn system_prompt(&self, tools: &ToolRegistry) -> String {
        match self {
            Self::Interactive => interactive_prompt(&tools.describe()),
            Self::Benchmark => benchmark_prompt(&tools.describe()),
        }
    }
}

/// What the agent is asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentTask {
    Interactive {
        request: String,
        file_path: Option<String>,
    },
    Benchmark {
        instruction: String,
        file_path: String,
        instruction_type: String,
        answer_position: String,
    },
}

impl AgentTask {
    pub fn profile(&self) -> PromptProfile {
        match self {
            Self::Interactive { .. } => PromptProfile::Interactive,
            Self::Benchmark { .. } => PromptProfile::Benchmark,
        }
    }

    /// The first user turn.
    pub fn user_message(&self) -> String {
        match self {
            Self::Interactive { request, file_path } => match file_path {
                Some(path) => format!("{}\n\n目标文件: {}", request, path),
                None => request.clone(),
            },
            Self::Benchmark {
                instruction,
                file_path,
                instruction_type,
                answer_position,
            } => format!(
                "Instruction: {instruction}\n\n\
                 Spreadsheet file: {file_path}\n\
                 Instruction type: {instruction_type}\n\
                 Answer position: {answer_position}\n\n\
                 Modify the spreadsheet file in place so that the answer position holds the result."
            ),
        }
    }
}

fn interactive_prompt(tool_descriptions: &str) -> String {
    format!(
        r#"你是一个专业的电子表格操作智能体。

你可以通过调用工具来读取、创建、编辑和分析 Excel 文件。

可用工具:
{tool_descriptions}

## 调用格式

当你需要使用工具时，请输出如下 JSON 块:
```tool_call
{{"tool": "工具名", "args": {{"参数名": "参数值"}}}}
```

## 规则
1. 公式优先：始终使用 Excel 公式，不硬编码计算结果
2. 先读取再修改：修改文件前先读取了解结构
3. 一步一步来：每次只调用一个工具，等待结果后再决定下一步
4. 完成后说明：操作完成后告知用户结果"#
    )
}

fn benchmark_prompt(tool_descriptions: &str) -> String {
    format!(
        r#"You are a spreadsheet agent solving spreadsheet manipulation tasks.

Each task gives you an instruction, the path of a spreadsheet file, the instruction type and the answer position. Your job is to modify that file in place so that the cells at the answer position contain the correct result.

Available tools:
{tool_descriptions}

## Tool call format

To call a tool, output exactly one JSON block like this:
```tool_call
{{"tool": "tool_name", "args": {{"param": "value"}}}}
```

## Rules
1. Read the file before changing it, to learn its structure.
2. Write results only to the answer position. Do not move or delete other data.
3. For "Cell-Level Manipulation" tasks, fill the exact cells named by the answer position.
4. For "Sheet-Level Manipulation" tasks, apply the change across the range or sheet named by the answer position.
5. Prefer writing computed values; use formulas only when the task asks for them.
6. Call one tool at a time and wait for its result.
7. Use run_python with openpyxl when the other tools are not enough.
8. When the file is updated, reply with a short summary and no tool call."#
    )
}
