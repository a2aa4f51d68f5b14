//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / parameters_schema / execute），
//! 由 ToolRegistry 按名注册与查找。描述符在进程启动时注册一次，之后注册表只读，
//! 既用于模型提示词（to_schema_json），也用于直接枚举 API（descriptors）。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// 工具执行错误：输入不符合 schema 与底层 provider 失败要区分开，
/// 前者是调用方/模型的问题，后者可重试或降级
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Provider(String),
}

/// 将 JSON 参数解析为类型化输入；serde 失败（缺必填字段、类型不符）映射为 InvalidInput
pub fn parse_args<T: serde::de::DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    serde_json::from_value(args).map_err(|e| ToolError::InvalidInput(e.to_string()))
}

/// 工具 trait：名称、描述（供模型理解）、参数 schema、异步执行（args 为 JSON）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（用于模型输出 JSON 中的 "tool" 字段）
    fn name(&self) -> &str;

    /// 工具描述（供模型理解功能与参数格式）
    fn description(&self) -> &str;

    /// 参数 JSON Schema（由 schemars 从类型化输入结构派生）
    fn parameters_schema(&self) -> Value;

    /// 执行工具，返回结构化输出
    async fn execute(&self, args: Value) -> Result<Value, ToolError>;
}

/// 不可变工具描述符（名称唯一）
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// 工具注册表：按名称存储 Arc<dyn Tool>，启动后只读
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// 只读枚举：供直接调用 API 与调试端点使用
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        let mut descriptors: Vec<ToolDescriptor> = self
            .tools
            .values()
            .map(|tool| ToolDescriptor {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
            })
            .collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }

    /// 生成提示词用的工具 schema JSON（与实际注册的工具一致）
    pub fn to_schema_json(&self) -> String {
        let tools: Vec<Value> = self
            .descriptors()
            .into_iter()
            .map(|d| {
                serde_json::json!({
                    "name": d.name,
                    "description": d.description,
                    "parameters": d.parameters,
                })
            })
            .collect();
        serde_json::to_string_pretty(&tools).unwrap_or_else(|_| "[]".to_string())
    }
}
