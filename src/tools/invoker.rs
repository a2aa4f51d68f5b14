//! 工具调用器
//!
//! 持有只读注册表、全局超时与并发信号量。invoke 永不返回 Err：未知工具、
//! 输入校验失败、超时、provider 失败全部归一为结构化的 ToolInvocation 信封，
//! 由编排循环决定重试、降级还是继续 —— 单个工具失败绝不中止整轮对话。
//! 每次调用输出结构化审计日志（tool_audit）。

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::time::timeout;

use super::registry::{ToolError, ToolRegistry};

/// 失败类别（进入信封与审计日志）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    ToolNotFound,
    InvalidInput,
    Timeout,
    Provider,
}

/// 调用结果：成功带输出，失败带类别与消息
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolOutcome {
    Ok { output: Value },
    Error { kind: ToolErrorKind, message: String },
}

/// 工具调用信封：名称、回显输入、结果、耗时、时间戳；
/// 按序附加到本轮响应，也作为观察结果反馈给下一次模型调用
#[derive(Debug, Clone, Serialize)]
pub struct ToolInvocation {
    pub name: String,
    pub input: Value,
    #[serde(flatten)]
    pub outcome: ToolOutcome,
    pub elapsed_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl ToolInvocation {
    pub fn is_ok(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Ok { .. })
    }

    pub fn output(&self) -> Option<&Value> {
        match &self.outcome {
            ToolOutcome::Ok { output } => Some(output),
            ToolOutcome::Error { .. } => None,
        }
    }

    pub fn error_kind(&self) -> Option<ToolErrorKind> {
        match &self.outcome {
            ToolOutcome::Ok { .. } => None,
            ToolOutcome::Error { kind, .. } => Some(*kind),
        }
    }

    /// 渲染为反馈给模型的观察文本
    pub fn observation(&self) -> String {
        match &self.outcome {
            ToolOutcome::Ok { output } => output.to_string(),
            ToolOutcome::Error { kind, message } => {
                format!("Error ({:?}): {}", kind, message)
            }
        }
    }
}

/// 工具调用器：注册表 + 超时 + 并发许可
pub struct ToolInvoker {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
    permits: Arc<Semaphore>,
}

impl ToolInvoker {
    pub fn new(registry: Arc<ToolRegistry>, timeout_secs: u64, max_concurrent: usize) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// 执行指定工具并归一化为信封；所有失败路径都返回信封而非 Err
    pub async fn invoke(&self, name: &str, input: Value) -> ToolInvocation {
        let start = Instant::now();

        let outcome = match self.registry.get(name) {
            None => ToolOutcome::Error {
                kind: ToolErrorKind::ToolNotFound,
                message: format!("Unknown tool: {}", name),
            },
            Some(tool) => {
                // 并发许可：信号量关闭只会发生在进程退出路径，此处视为 provider 失败
                match self.permits.acquire().await {
                    Err(_) => ToolOutcome::Error {
                        kind: ToolErrorKind::Provider,
                        message: "tool permits closed".to_string(),
                    },
                    Ok(_permit) => match timeout(self.timeout, tool.execute(input.clone())).await {
                        Err(_) => ToolOutcome::Error {
                            kind: ToolErrorKind::Timeout,
                            message: format!("tool {} timed out", name),
                        },
                        Ok(Ok(output)) => ToolOutcome::Ok { output },
                        Ok(Err(ToolError::InvalidInput(reason))) => ToolOutcome::Error {
                            kind: ToolErrorKind::InvalidInput,
                            message: reason,
                        },
                        Ok(Err(ToolError::Provider(reason))) => ToolOutcome::Error {
                            kind: ToolErrorKind::Provider,
                            message: reason,
                        },
                    },
                }
            }
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;
        let (ok, outcome_label) = match &outcome {
            ToolOutcome::Ok { .. } => (true, "ok".to_string()),
            ToolOutcome::Error { kind, .. } => (false, format!("{:?}", kind)),
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": name,
            "ok": ok,
            "outcome": outcome_label,
            "duration_ms": elapsed_ms,
            "args_preview": args_preview(&input),
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        ToolInvocation {
            name: name.to_string(),
            input,
            outcome,
            elapsed_ms,
            timestamp: Utc::now(),
        }
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.len() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::registry::Tool;
    use async_trait::async_trait;

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }

        fn description(&self) -> &str {
            "sleeps"
        }

        fn parameters_schema(&self) -> Value {
            serde_json::json!({"type": "object"})
        }

        async fn execute(&self, _args: Value) -> Result<Value, ToolError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(serde_json::json!({}))
        }
    }

    struct StrictTool;

    #[async_trait]
    impl Tool for StrictTool {
        fn name(&self) -> &str {
            "strict"
        }

        fn description(&self) -> &str {
            "requires a query string"
        }

        fn parameters_schema(&self) -> Value {
            serde_json::json!({"type": "object", "required": ["query"]})
        }

        async fn execute(&self, args: Value) -> Result<Value, ToolError> {
            #[derive(serde::Deserialize)]
            struct Input {
                query: String,
            }
            let input: Input = super::super::registry::parse_args(args)?;
            Ok(serde_json::json!({"echo": input.query}))
        }
    }

    fn invoker_with(tools: Vec<Box<dyn FnOnce(&mut ToolRegistry)>>) -> ToolInvoker {
        let mut registry = ToolRegistry::new();
        for add in tools {
            add(&mut registry);
        }
        ToolInvoker::new(Arc::new(registry), 1, 2)
    }

    #[tokio::test]
    async fn test_unknown_tool_is_structured_error() {
        let invoker = invoker_with(vec![]);
        let inv = invoker.invoke("missing", serde_json::json!({})).await;
        assert!(!inv.is_ok());
        assert_eq!(inv.error_kind(), Some(ToolErrorKind::ToolNotFound));
        assert_eq!(inv.name, "missing");
    }

    #[tokio::test]
    async fn test_invalid_input_is_structured_error() {
        let invoker = invoker_with(vec![Box::new(|r| r.register(StrictTool))]);
        let inv = invoker.invoke("strict", serde_json::json!({"query": 7})).await;
        assert_eq!(inv.error_kind(), Some(ToolErrorKind::InvalidInput));

        let inv = invoker.invoke("strict", serde_json::json!({})).await;
        assert_eq!(inv.error_kind(), Some(ToolErrorKind::InvalidInput));
    }

    #[tokio::test]
    async fn test_timeout_is_structured_error() {
        let invoker = invoker_with(vec![Box::new(|r| r.register(SlowTool))]);
        let inv = invoker.invoke("slow", serde_json::json!({})).await;
        assert_eq!(inv.error_kind(), Some(ToolErrorKind::Timeout));
    }

    #[tokio::test]
    async fn test_successful_invocation_echoes_input() {
        let invoker = invoker_with(vec![Box::new(|r| r.register(StrictTool))]);
        let inv = invoker
            .invoke("strict", serde_json::json!({"query": "tokyo"}))
            .await;
        assert!(inv.is_ok());
        assert_eq!(inv.input, serde_json::json!({"query": "tokyo"}));
        assert_eq!(inv.output(), Some(&serde_json::json!({"echo": "tokyo"})));
    }
}
