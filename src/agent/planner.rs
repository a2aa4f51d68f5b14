//! Planner：模型输出解析与提示词拼装
//!
//! 模型每一步要么给出最终回答（纯文本），要么请求一次工具调用
//! （单行 JSON：{"tool": "flight_search", "args": {...}}）；
//! parse_model_output 从文本中提取 JSON 并解析为 ToolCall 或直接回答。

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::AgentError;
use crate::llm::{ChatMessage, CompletionRequest, LlmError, ModelBackend};

/// 模型请求的工具调用（简化 JSON：{"tool": "hotel_search", "args": {"destination": "..."}}）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub tool: String,
    pub args: serde_json::Value,
}

/// 单步模型输出
#[derive(Debug, Clone)]
pub enum PlannerOutput {
    /// 最终回答，循环退出
    Answer(String),
    /// 请求执行工具
    ToolCall(ToolCallRequest),
}

/// 解析模型输出：若含有效 JSON 且 tool 非空则为 ToolCall，否则为 Answer
pub fn parse_model_output(output: &str) -> Result<PlannerOutput, AgentError> {
    let trimmed = output.trim();

    // 尝试提取 JSON 块（```json ... ``` 或纯 JSON）
    let json_str = if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        rest.find("```")
            .map(|end| rest[..end].trim())
            .unwrap_or(rest.trim())
    } else if let Some(start) = trimmed.find('{') {
        if let Some(end) = trimmed.rfind('}') {
            &trimmed[start..=end]
        } else {
            trimmed
        }
    } else {
        return Ok(PlannerOutput::Answer(trimmed.to_string()));
    };

    match serde_json::from_str::<ToolCallRequest>(json_str) {
        Ok(parsed) if !parsed.tool.is_empty() => Ok(PlannerOutput::ToolCall(parsed)),
        Ok(_) => Ok(PlannerOutput::Answer(trimmed.to_string())),
        Err(e) => {
            // 文本里恰好出现花括号但不是工具调用（如回答中引用 JSON）：
            // 只有整体看起来像对象时才判为解析错误
            if trimmed.starts_with('{') {
                Err(AgentError::Parse(format!("{}: {}", e, json_str)))
            } else {
                Ok(PlannerOutput::Answer(trimmed.to_string()))
            }
        }
    }
}

/// Planner：持有模型后端与基础 system prompt，按动态 system 发起完成调用
pub struct Planner {
    backend: Arc<dyn ModelBackend>,
    system_prompt: String,
}

impl Planner {
    pub fn new(backend: Arc<dyn ModelBackend>, system_prompt: impl Into<String>) -> Self {
        Self {
            backend,
            system_prompt: system_prompt.into(),
        }
    }

    pub fn base_system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// 使用动态拼接的 system（偏好段落、工具 schema 等）发起一次完成
    pub async fn complete_with_system(
        &self,
        messages: &[ChatMessage],
        system: &str,
    ) -> Result<String, LlmError> {
        let mut full_messages = vec![ChatMessage::system(system)];
        full_messages.extend(messages.to_vec());
        let completion = self
            .backend
            .complete(CompletionRequest::from_messages(full_messages))
            .await?;
        Ok(completion.text)
    }
}

/// Agent 模式的工具使用说明（附在 system prompt 末尾）
pub fn tool_instructions(tool_schema_json: &str) -> String {
    format!(
        "You can call tools to look up live travel data.\n\
         To call a tool, reply with ONLY one JSON object on a single line:\n\
         {{\"tool\": \"<tool name>\", \"args\": {{...}}}}\n\
         Tool results will be returned to you as observations.\n\
         When you have enough information, reply with your final answer as plain text (no JSON).\n\n\
         Available tools:\n{}",
        tool_schema_json
    )
}
