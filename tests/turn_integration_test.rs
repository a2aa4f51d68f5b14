//! 轮次编排集成测试
//!
//! 用 Mock 模型后端按脚本驱动编排器走各条路径：简单/Agent 路由、强制模式、
//! 迭代上限、未知工具降级、模型超时回退与计数器语义。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use marco::core::{ErrorCode, Orchestrator, TurnMode, TurnRequest, DEFAULT_SYSTEM_PROMPT};
use marco::llm::{LlmError, MockBackend, ModelBackend, RetryConfig, RetryingBackend};
use marco::session::{CabinClass, ContextStore, HistoryLimits, MemoryContextStore, SearchKind};
use marco::tools::{Tool, ToolError, ToolErrorKind, ToolInvoker, ToolRegistry};

/// 固定返回一条结果的航班工具替身
struct StubFlightTool;

#[async_trait]
impl Tool for StubFlightTool {
    fn name(&self) -> &str {
        "flight_search"
    }

    fn description(&self) -> &str {
        "stub flight search"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({"type": "object", "required": ["origin", "destination"]})
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let destination = args
            .get("destination")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidInput("missing destination".to_string()))?;
        Ok(serde_json::json!({
            "destination": destination,
            "count": 1,
            "results": [{"airline": "ANA", "price": 845, "stops": 0}],
        }))
    }
}

fn test_invoker() -> ToolInvoker {
    let mut registry = ToolRegistry::new();
    registry.register(StubFlightTool);
    ToolInvoker::new(Arc::new(registry), 5, 2)
}

fn orchestrator_with(backend: Arc<dyn ModelBackend>, max_iterations: u32) -> Orchestrator {
    let store = Arc::new(MemoryContextStore::new(HistoryLimits::default()));
    Orchestrator::new(
        store,
        backend,
        test_invoker(),
        DEFAULT_SYSTEM_PROMPT,
        max_iterations,
        20,
    )
}

#[tokio::test]
async fn test_greeting_routes_to_simple_mode() {
    let backend = Arc::new(MockBackend::new().push_text("Hello! Where are you headed?"));
    let orchestrator = orchestrator_with(backend, 5);

    let response = orchestrator
        .handle_turn(TurnRequest::new("hi there").with_session("s-simple"))
        .await;

    assert_eq!(response.mode, TurnMode::Simple);
    assert_eq!(response.text, "Hello! Where are you headed?");
    assert!(response.tools_used.is_empty());
    assert!(response.error_code.is_none());
}

#[tokio::test]
async fn test_flight_request_runs_agent_loop_with_side_channels() {
    let backend = Arc::new(
        MockBackend::new()
            .push_text(r#"{"tool": "flight_search", "args": {"origin": "BOM", "destination": "Tokyo", "max_price": 900}}"#)
            .push_text("Found a nonstop ANA flight for $845."),
    );
    let orchestrator = orchestrator_with(backend, 5);

    let response = orchestrator
        .handle_turn(
            TurnRequest::new("find me flights to Tokyo under $900 departing June 2")
                .with_session("s-agent"),
        )
        .await;

    assert_eq!(response.mode, TurnMode::Agent);
    assert_eq!(response.text, "Found a nonstop ANA flight for $845.");
    assert_eq!(response.tools_used, vec!["flight_search"]);
    assert_eq!(response.flights.len(), 1);
    assert_eq!(response.flights[0]["airline"], "ANA");

    // 会话写回：搜索历史、偏好（$900 预算）、计数器
    let ctx = orchestrator.store().get("s-agent").await.unwrap();
    assert_eq!(ctx.total_interactions, 1);
    assert_eq!(ctx.search_history.len(), 1);
    assert_eq!(ctx.search_history[0].kind, SearchKind::Flight);
    assert_eq!(ctx.search_history[0].budget, Some(900.0));
    assert_eq!(ctx.preferences.budget.as_ref().map(|b| b.amount), Some(900.0));
    assert_eq!(ctx.conversation.len(), 2);
}

#[tokio::test]
async fn test_force_agent_mode_overrides_classifier() {
    // 问候语本会走简单模式；强制标志必须赢
    let backend = Arc::new(MockBackend::new().push_text("Hi! Ready to plan."));
    let orchestrator = orchestrator_with(backend, 5);

    let response = orchestrator
        .handle_turn(
            TurnRequest::new("hi there")
                .with_session("s-forced")
                .with_force_agent_mode(),
        )
        .await;

    assert_eq!(response.mode, TurnMode::Agent);
    assert!(response.error_code.is_none());
}

#[tokio::test]
async fn test_iteration_cap_returns_well_formed_response() {
    // 模型永远请求工具：循环必须停在上限，响应仍然完整
    let mut backend = MockBackend::new();
    for _ in 0..20 {
        backend = backend.push_text(
            r#"{"tool": "flight_search", "args": {"origin": "BOM", "destination": "Tokyo"}}"#,
        );
    }
    let orchestrator = orchestrator_with(Arc::new(backend), 3);

    let response = orchestrator
        .handle_turn(TurnRequest::new("find flights to Tokyo").with_session("s-cap"))
        .await;

    assert_eq!(response.iterations, 3);
    assert_eq!(response.tool_results.len(), 3);
    assert!(!response.text.is_empty());
    assert!(response.error_code.is_none());

    let ctx = orchestrator.store().get("s-cap").await.unwrap();
    assert_eq!(ctx.total_interactions, 1);
}

#[tokio::test]
async fn test_unknown_tool_degrades_turn_without_exception() {
    let backend = Arc::new(
        MockBackend::new()
            .push_text(r#"{"tool": "teleport", "args": {}}"#)
            .push_text("I couldn't use that capability, but here's general advice."),
    );
    let orchestrator = orchestrator_with(backend, 5);

    let response = orchestrator
        .handle_turn(TurnRequest::new("find flights to Tokyo").with_session("s-unknown"))
        .await;

    assert!(response.error_code.is_none());
    assert_eq!(response.tool_results.len(), 1);
    assert_eq!(
        response.tool_results[0].error_kind(),
        Some(ToolErrorKind::ToolNotFound)
    );
    assert!(response.text.contains("general advice"));
}

#[tokio::test]
async fn test_model_timeouts_fall_back_and_count_once() {
    // 三次连续超时（首次 + 两次重试）-> 固定回退文案 + 错误码，计数器恰好 +1
    let flaky = MockBackend::new()
        .push_error(LlmError::Timeout)
        .push_error(LlmError::Timeout)
        .push_error(LlmError::Timeout);
    let backend = Arc::new(RetryingBackend::new(
        Arc::new(flaky),
        RetryConfig {
            max_retries: 2,
            base_delay: std::time::Duration::from_millis(1),
            request_timeout: std::time::Duration::from_secs(5),
        },
    ));
    let orchestrator = orchestrator_with(backend, 5);

    let response = orchestrator
        .handle_turn(TurnRequest::new("hello").with_session("s-timeout"))
        .await;

    assert_eq!(response.error_code, Some(ErrorCode::ProviderTimeout));
    assert!(response.text.contains("try"));

    let ctx = orchestrator.store().get("s-timeout").await.unwrap();
    assert_eq!(ctx.total_interactions, 1);
}

#[tokio::test]
async fn test_empty_message_is_rejected_before_model() {
    let backend = Arc::new(MockBackend::new());
    let orchestrator = orchestrator_with(backend, 5);

    let response = orchestrator
        .handle_turn(TurnRequest::new("   ").with_session("s-empty"))
        .await;

    assert_eq!(response.error_code, Some(ErrorCode::EmptyMessage));

    // 校验失败不产生写入
    let ctx = orchestrator.store().get("s-empty").await.unwrap();
    assert_eq!(ctx.total_interactions, 0);
    assert!(ctx.conversation.is_empty());
}

#[tokio::test]
async fn test_preferences_persist_and_correct_across_turns() {
    let backend = Arc::new(
        MockBackend::new()
            .push_text("Noted: business class, Emirates, nonstop from Mumbai.")
            .push_text("Got it, economy and stops are fine."),
    );
    let orchestrator = orchestrator_with(backend, 5);

    // 第一轮：建立偏好（含 "direct flights only" -> Agent 分类也无妨，mock 直接作答）
    orchestrator
        .handle_turn(
            TurnRequest::new("I'm from Mumbai, prefer business class, Emirates, direct flights only")
                .with_session("s-prefs"),
        )
        .await;

    let ctx = orchestrator.store().get("s-prefs").await.unwrap();
    let flight = &ctx.preferences.flight;
    assert_eq!(flight.cabin_class, Some(CabinClass::Business));
    assert_eq!(flight.max_stops, Some(0));
    assert!(flight.preferred_airlines.contains(&"Emirates".to_string()));
    assert_eq!(ctx.preferences.home_city.as_deref(), Some("Mumbai"));

    // 第二轮：纠正式消息覆盖标量、放宽 max_stops，列表与家乡城市不动
    orchestrator
        .handle_turn(
            TurnRequest::new("actually economy is fine, any number of stops").with_session("s-prefs"),
        )
        .await;

    let ctx = orchestrator.store().get("s-prefs").await.unwrap();
    let flight = &ctx.preferences.flight;
    assert_eq!(flight.cabin_class, Some(CabinClass::Economy));
    assert_eq!(flight.max_stops, None);
    assert!(flight.preferred_airlines.contains(&"Emirates".to_string()));
    assert_eq!(ctx.preferences.home_city.as_deref(), Some("Mumbai"));
    assert_eq!(ctx.total_interactions, 2);
}

#[tokio::test]
async fn test_sessions_do_not_leak_between_each_other() {
    let backend = Arc::new(
        MockBackend::new()
            .push_text("noted")
            .push_text("hello"),
    );
    let orchestrator = orchestrator_with(backend, 5);

    orchestrator
        .handle_turn(TurnRequest::new("I prefer business class").with_session("s-a"))
        .await;
    orchestrator
        .handle_turn(TurnRequest::new("hi").with_session("s-b"))
        .await;

    let other = orchestrator.store().get("s-b").await.unwrap();
    assert!(other.preferences.flight.cabin_class.is_none());
    assert_eq!(other.total_interactions, 1);
}
