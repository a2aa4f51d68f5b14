//! 面向调用方的轮次 API 类型
//!
//! 请求/响应的形状是与 UI 层的契约：text 之外的结构化侧通道
//! （flights/hotels/attractions/tool_results）独立于文本存在，UI 依赖它们渲染卡片。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::ErrorCode;
use crate::tools::ToolInvocation;

/// 本轮使用的处理模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnMode {
    /// 单次直接完成，无工具
    Simple,
    /// 允许工具调用与多步推理
    Agent,
}

/// 一轮对话的请求
#[derive(Debug, Clone, Deserialize)]
pub struct TurnRequest {
    /// 会话标识；缺省时从 user_id 派生匿名标识
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    pub message: String,
    /// 强制走 Agent 模式；永远优先于分类器结果
    #[serde(default)]
    pub force_agent_mode: bool,
}

impl TurnRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            session_id: None,
            user_id: None,
            message: message.into(),
            force_agent_mode: false,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_force_agent_mode(mut self) -> Self {
        self.force_agent_mode = true;
        self
    }
}

/// 一轮对话的响应：主文本 + 结构化侧通道 + 元数据
#[derive(Debug, Serialize)]
pub struct TurnResponse {
    pub text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools_used: Vec<String>,
    /// 全部工具调用信封（含失败的），成功结果绝不丢弃
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_results: Vec<ToolInvocation>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub flights: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hotels: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attractions: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggested_actions: Vec<String>,
    pub mode: TurnMode,
    pub iterations: u32,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
}
