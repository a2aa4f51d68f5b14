//! 核心层：错误类型、轮次 API 与会话编排器

pub mod error;
pub mod orchestrator;
pub mod turn;

pub use error::{AgentError, ErrorCode};
pub use orchestrator::{
    build_tool_registry, create_backend_from_config, create_orchestrator, Orchestrator,
    DEFAULT_SYSTEM_PROMPT,
};
pub use turn::{TurnMode, TurnRequest, TurnResponse};
