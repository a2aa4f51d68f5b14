//! LLM 层：模型后端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）

pub mod deepseek;
pub mod mock;
pub mod openai;
pub mod traits;

pub use deepseek::{create_deepseek_backend, DEEPSEEK_CHAT, DEEPSEEK_REASONER};
pub use mock::MockBackend;
pub use openai::{OpenAiBackend, TokenUsage};
pub use traits::{
    ChatMessage, Completion, CompletionRequest, LlmError, ModelBackend, RetryConfig,
    RetryingBackend, Role,
};
