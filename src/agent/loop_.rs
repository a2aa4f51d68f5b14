//! Agent 主循环
//!
//! 有界迭代：模型提议下一步动作 -> 若为工具调用则执行并把信封作为观察写回 ->
//! 若为最终回答则退出。终止条件：最终回答、迭代上限（返回尽力而为的部分回答）、
//! 模型终态失败或取消。无论跑了几轮，工具调用信封都按序累积在结果里。

use tokio_util::sync::CancellationToken;

use crate::core::AgentError;
use crate::llm::ChatMessage;
use crate::tools::{ToolInvocation, ToolInvoker};

use super::planner::{parse_model_output, Planner, PlannerOutput};

/// 模型输出连续解析失败的上限（每次失败会注入一条纠正提示并消耗一次迭代）
const MAX_PARSE_FAILURES: u32 = 2;

/// 循环结果：最终文本（或部分回答）、迭代次数、累计工具调用；
/// error 非空表示循环以失败告终，已获得的工具结果仍然保留
#[derive(Debug)]
pub struct AgentOutcome {
    pub text: String,
    pub iterations: u32,
    pub invocations: Vec<ToolInvocation>,
    pub capped: bool,
    pub error: Option<AgentError>,
}

impl AgentOutcome {
    fn finished(text: String, iterations: u32, invocations: Vec<ToolInvocation>) -> Self {
        Self {
            text,
            iterations,
            invocations,
            capped: false,
            error: None,
        }
    }

    fn failed(error: AgentError, iterations: u32, invocations: Vec<ToolInvocation>) -> Self {
        Self {
            text: String::new(),
            iterations,
            invocations,
            capped: false,
            error: Some(error),
        }
    }
}

/// 到达迭代上限时的部分回答
fn capped_answer(last_output: &str) -> String {
    if last_output.trim().is_empty() {
        "I couldn't finish the search within my reasoning budget. \
         Could you narrow the request down a little?"
            .to_string()
    } else {
        format!(
            "I ran out of reasoning steps before finishing, but here is what I have so far:\n{}",
            last_output.trim()
        )
    }
}

/// 执行 Agent 循环
///
/// messages 为已含本轮用户输入的对话窗口；system 由编排层拼好
/// （基础 prompt + 偏好段落 + 工具 schema 说明）。
/// 每轮迭代开头检查取消信号；在飞的工具调用不强行打断，其结果随取消一并丢弃。
pub async fn agent_loop(
    planner: &Planner,
    invoker: &ToolInvoker,
    system: &str,
    mut messages: Vec<ChatMessage>,
    max_iterations: u32,
    cancel: &CancellationToken,
) -> AgentOutcome {
    let mut invocations: Vec<ToolInvocation> = Vec::new();
    let mut last_output = String::new();
    let mut parse_failures: u32 = 0;
    let mut iteration: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            return AgentOutcome::failed(AgentError::Cancelled, iteration, invocations);
        }

        if iteration >= max_iterations {
            tracing::warn!(iterations = iteration, "agent loop hit iteration cap");
            let mut outcome =
                AgentOutcome::finished(capped_answer(&last_output), iteration, invocations);
            outcome.capped = true;
            return outcome;
        }

        tracing::debug!(iteration, "agent_step");
        let output = match planner.complete_with_system(&messages, system).await {
            Ok(o) => o,
            Err(e) => {
                // 重试已在 RetryingBackend 内部做过，这里是终态失败
                return AgentOutcome::failed(
                    AgentError::from_llm(e),
                    iteration,
                    invocations,
                );
            }
        };
        last_output = output.clone();

        match parse_model_output(&output) {
            Ok(PlannerOutput::Answer(answer)) => {
                return AgentOutcome::finished(answer, iteration + 1, invocations);
            }
            Ok(PlannerOutput::ToolCall(tc)) => {
                let invocation = invoker.invoke(&tc.tool, tc.args).await;
                if cancel.is_cancelled() {
                    // 调用已完成但本轮被取消：结果丢弃
                    return AgentOutcome::failed(AgentError::Cancelled, iteration + 1, invocations);
                }
                // 将工具调用与观察写回对话，供下一轮提议使用
                messages.push(ChatMessage::assistant(format!(
                    "Tool call: {} | args: {}",
                    invocation.name, invocation.input
                )));
                messages.push(ChatMessage::user(format!(
                    "Observation from {}: {}",
                    invocation.name,
                    invocation.observation()
                )));
                invocations.push(invocation);
            }
            Err(e) => {
                parse_failures += 1;
                if parse_failures > MAX_PARSE_FAILURES {
                    return AgentOutcome::failed(e, iteration + 1, invocations);
                }
                tracing::warn!(error = %e, "model output parse failed, reprompting");
                messages.push(ChatMessage::user(
                    "Your last output was not valid. To call a tool, output exactly one JSON \
                     object like {\"tool\": \"flight_search\", \"args\": {...}} and nothing else. \
                     To answer the user, output plain text without JSON."
                        .to_string(),
                ));
            }
        }

        iteration += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockBackend;
    use crate::tools::{Tool, ToolError, ToolRegistry};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::Arc;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "echoes its input"
        }

        fn parameters_schema(&self) -> Value {
            serde_json::json!({"type": "object"})
        }

        async fn execute(&self, args: Value) -> Result<Value, ToolError> {
            Ok(args)
        }
    }

    fn invoker() -> ToolInvoker {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        ToolInvoker::new(Arc::new(registry), 5, 2)
    }

    fn user_messages() -> Vec<ChatMessage> {
        vec![ChatMessage::user("plan something")]
    }

    #[tokio::test]
    async fn test_direct_answer_exits_first_iteration() {
        let backend = Arc::new(MockBackend::new().push_text("Here is your plan."));
        let planner = Planner::new(backend, "assistant");
        let outcome = agent_loop(
            &planner,
            &invoker(),
            "assistant",
            user_messages(),
            5,
            &CancellationToken::new(),
        )
        .await;
        assert_eq!(outcome.text, "Here is your plan.");
        assert_eq!(outcome.iterations, 1);
        assert!(outcome.invocations.is_empty());
        assert!(!outcome.capped);
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn test_tool_call_then_answer() {
        let backend = Arc::new(
            MockBackend::new()
                .push_text(r#"{"tool": "echo", "args": {"q": "kyoto"}}"#)
                .push_text("Done, echoed."),
        );
        let planner = Planner::new(backend, "assistant");
        let outcome = agent_loop(
            &planner,
            &invoker(),
            "assistant",
            user_messages(),
            5,
            &CancellationToken::new(),
        )
        .await;
        assert_eq!(outcome.text, "Done, echoed.");
        assert_eq!(outcome.invocations.len(), 1);
        assert!(outcome.invocations[0].is_ok());
    }

    #[tokio::test]
    async fn test_iteration_cap_returns_partial_answer() {
        // 模型永远只请求工具，循环必须在上限处停下且不丢已得结果
        let mut backend = MockBackend::new();
        for _ in 0..10 {
            backend = backend.push_text(r#"{"tool": "echo", "args": {"n": 1}}"#);
        }
        let planner = Planner::new(Arc::new(backend), "assistant");
        let outcome = agent_loop(
            &planner,
            &invoker(),
            "assistant",
            user_messages(),
            3,
            &CancellationToken::new(),
        )
        .await;
        assert!(outcome.capped);
        assert_eq!(outcome.iterations, 3);
        assert_eq!(outcome.invocations.len(), 3);
        assert!(!outcome.text.is_empty());
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn test_unknown_tool_degrades_not_aborts() {
        let backend = Arc::new(
            MockBackend::new()
                .push_text(r#"{"tool": "teleport", "args": {}}"#)
                .push_text("Sorry, I could not look that up."),
        );
        let planner = Planner::new(backend, "assistant");
        let outcome = agent_loop(
            &planner,
            &invoker(),
            "assistant",
            user_messages(),
            5,
            &CancellationToken::new(),
        )
        .await;
        assert!(outcome.error.is_none());
        assert_eq!(outcome.invocations.len(), 1);
        assert!(!outcome.invocations[0].is_ok());
        assert_eq!(outcome.text, "Sorry, I could not look that up.");
    }

    #[tokio::test]
    async fn test_cancellation_stops_loop() {
        let backend = Arc::new(MockBackend::new().push_text("never used"));
        let planner = Planner::new(backend, "assistant");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = agent_loop(
            &planner,
            &invoker(),
            "assistant",
            user_messages(),
            5,
            &cancel,
        )
        .await;
        assert!(matches!(outcome.error, Some(AgentError::Cancelled)));
        assert_eq!(outcome.iterations, 0);
    }
}
