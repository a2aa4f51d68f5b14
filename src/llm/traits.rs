//! 模型后端抽象
//!
//! 所有后端（OpenAI 兼容 / DeepSeek / Mock）实现 ModelBackend；
//! RetryingBackend 为任意后端叠加显式超时与瞬态错误的有界退避重试。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// 单条消息
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// 一次完成请求：消息序列 + 可选生成上限
#[derive(Clone, Debug, Default)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn from_messages(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            max_tokens: None,
        }
    }
}

/// 一次完成结果；工具调用请求由 agent::planner 从文本中解析
#[derive(Clone, Debug)]
pub struct Completion {
    pub text: String,
}

/// 模型后端错误；Timeout / Unavailable 为瞬态，可重试
#[derive(Error, Debug, Clone)]
pub enum LlmError {
    #[error("Model request timed out")]
    Timeout,

    #[error("Model backend unavailable: {0}")]
    Unavailable(String),

    #[error("Model API error: {0}")]
    Api(String),
}

impl LlmError {
    pub fn is_transient(&self) -> bool {
        matches!(self, LlmError::Timeout | LlmError::Unavailable(_))
    }
}

/// 模型后端 trait：非流式完成
#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, LlmError>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}

/// 重试配置：次数上限与退避基数
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
    /// 单次调用的显式超时
    pub request_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(250),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// 重试装饰器：在调用点施加超时，并对瞬态错误做 2^n 有界退避；
/// 重试耗尽后返回最后一个错误，由编排层降级。
pub struct RetryingBackend {
    inner: Arc<dyn ModelBackend>,
    config: RetryConfig,
}

impl RetryingBackend {
    pub fn new(inner: Arc<dyn ModelBackend>, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl ModelBackend for RetryingBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, LlmError> {
        let mut attempt: u32 = 0;
        loop {
            let result = tokio::time::timeout(
                self.config.request_timeout,
                self.inner.complete(request.clone()),
            )
            .await
            .map_err(|_| LlmError::Timeout)
            .and_then(|r| r);

            match result {
                Ok(completion) => return Ok(completion),
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    let delay = self.config.base_delay * 2u32.saturating_pow(attempt);
                    tracing::warn!(attempt, error = %e, delay_ms = delay.as_millis() as u64, "model retry");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn token_usage(&self) -> (u64, u64, u64) {
        self.inner.token_usage()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// 前 fail_times 次返回瞬态错误，之后成功
    struct FlakyBackend {
        fail_times: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl ModelBackend for FlakyBackend {
        async fn complete(&self, _request: CompletionRequest) -> Result<Completion, LlmError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_times {
                Err(LlmError::Unavailable("flaky".to_string()))
            } else {
                Ok(Completion {
                    text: "ok".to_string(),
                })
            }
        }
    }

    fn fast_retry(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            base_delay: Duration::from_millis(1),
            request_timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failure() {
        let backend = RetryingBackend::new(
            Arc::new(FlakyBackend {
                fail_times: 2,
                calls: AtomicU32::new(0),
            }),
            fast_retry(2),
        );
        let result = backend
            .complete(CompletionRequest::from_messages(vec![ChatMessage::user("hi")]))
            .await
            .unwrap();
        assert_eq!(result.text, "ok");
    }

    #[tokio::test]
    async fn test_retry_budget_exhausted() {
        let backend = RetryingBackend::new(
            Arc::new(FlakyBackend {
                fail_times: 10,
                calls: AtomicU32::new(0),
            }),
            fast_retry(2),
        );
        let err = backend
            .complete(CompletionRequest::from_messages(vec![ChatMessage::user("hi")]))
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }
}
