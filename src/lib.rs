//! Marco - Rust 旅行规划智能体（会话编排核心）
//!
//! 模块划分：
//! - **agent**: Planner 与有界工具循环（Agent 模式）
//! - **classify**: 复杂度分类器（简单模式 / Agent 模式路由）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、轮次 API、会话编排状态机
//! - **extract**: 偏好抽取器（消息 -> 偏好增量，纯函数）
//! - **llm**: 模型后端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）
//! - **observability**: 结构化日志初始化
//! - **respond**: 响应装配（文本 + 结构化侧通道）
//! - **session**: 会话上下文、偏好合并与存储抽象
//! - **tools**: 工具注册表、调用器与旅行搜索工具

pub mod agent;
pub mod classify;
pub mod config;
pub mod core;
pub mod extract;
pub mod llm;
pub mod observability;
pub mod respond;
pub mod session;
pub mod tools;

pub use crate::core::{Orchestrator, TurnRequest, TurnResponse};
