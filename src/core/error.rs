//! Agent 错误类型与面向调用方的错误码
//!
//! 组件内错误（单个工具失败）在工具层吸收为结构化结果；只有编排级致命错误
//! 才会带着 ErrorCode 到达调用方，绝不外泄原始异常字符串。

use serde::Serialize;
use thiserror::Error;

use crate::llm::LlmError;

/// 编排核心内部错误（校验、工具、模型后端、上下文存储等）
#[derive(Error, Debug)]
pub enum AgentError {
    /// 请求格式不合法（如空消息），在调用模型前直接返回
    #[error("Invalid turn input: {0}")]
    Validation(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid tool input for {tool}: {reason}")]
    InvalidToolInput { tool: String, reason: String },

    #[error("Provider timeout: {0}")]
    ProviderTimeout(String),

    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// 模型后端在重试耗尽后的终态失败
    #[error("Model backend error: {0}")]
    ModelBackend(String),

    /// 上下文存储不可用：本轮致命，但不得破坏已持久化状态
    #[error("Context store error: {0}")]
    ContextStore(String),

    #[error("Cancelled by caller")]
    Cancelled,

    /// 模型输出无法解析为回答或工具调用
    #[error("Parse error: {0}")]
    Parse(String),
}

/// 机器可读错误码，随 TurnResponse 返回给调用方
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    EmptyMessage,
    ToolNotFound,
    InvalidToolInput,
    ProviderTimeout,
    ProviderUnavailable,
    ModelBackendError,
    ContextStoreError,
    Cancelled,
    ParseError,
}

impl AgentError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AgentError::Validation(_) => ErrorCode::EmptyMessage,
            AgentError::ToolNotFound(_) => ErrorCode::ToolNotFound,
            AgentError::InvalidToolInput { .. } => ErrorCode::InvalidToolInput,
            AgentError::ProviderTimeout(_) => ErrorCode::ProviderTimeout,
            AgentError::ProviderUnavailable(_) => ErrorCode::ProviderUnavailable,
            AgentError::ModelBackend(_) => ErrorCode::ModelBackendError,
            AgentError::ContextStore(_) => ErrorCode::ContextStoreError,
            AgentError::Cancelled => ErrorCode::Cancelled,
            AgentError::Parse(_) => ErrorCode::ParseError,
        }
    }

    /// 模型后端错误到编排错误的映射（重试耗尽后的终态）
    pub fn from_llm(e: LlmError) -> Self {
        match e {
            LlmError::Timeout => AgentError::ProviderTimeout("model backend".to_string()),
            LlmError::Unavailable(msg) => AgentError::ProviderUnavailable(msg),
            LlmError::Api(msg) => AgentError::ModelBackend(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        assert_eq!(
            AgentError::Validation("empty".into()).code(),
            ErrorCode::EmptyMessage
        );
        assert_eq!(
            AgentError::ContextStore("down".into()).code(),
            ErrorCode::ContextStoreError
        );
        assert_eq!(AgentError::Cancelled.code(), ErrorCode::Cancelled);
    }

    #[test]
    fn test_from_llm_maps_transient_kinds() {
        assert_eq!(
            AgentError::from_llm(LlmError::Timeout).code(),
            ErrorCode::ProviderTimeout
        );
        assert_eq!(
            AgentError::from_llm(LlmError::Unavailable("down".into())).code(),
            ErrorCode::ProviderUnavailable
        );
        assert_eq!(
            AgentError::from_llm(LlmError::Api("bad".into())).code(),
            ErrorCode::ModelBackendError
        );
    }

    #[test]
    fn test_error_code_wire_format() {
        let json = serde_json::to_string(&ErrorCode::ModelBackendError).unwrap();
        assert_eq!(json, "\"model_backend_error\"");
    }
}
