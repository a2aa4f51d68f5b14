//! 会话编排器：单轮状态机
//!
//! START -> CLASSIFY -> (SIMPLE_COMPLETE | AGENT_LOOP) -> ASSEMBLE -> DONE，
//! 任意状态可进入 ERROR 终态。职责：校验输入、加载上下文并合并偏好增量（写回推迟到
//! ASSEMBLE，本轮模型调用看到合并后的工作副本）、按分类或强制标志路由、驱动 Agent
//! 循环、一次性写回会话状态。模型终态失败降级为固定回退文案 + 错误码，绝不向调用方
//! 抛原始异常；上下文存储失败对本轮致命但不产生部分写入。

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::agent::{agent_loop, tool_instructions, Planner};
use crate::classify;
use crate::config::AppConfig;
use crate::core::{AgentError, TurnMode, TurnRequest, TurnResponse};
use crate::extract;
use crate::llm::{
    create_deepseek_backend, ChatMessage, MockBackend, ModelBackend, OpenAiBackend, RetryConfig,
    RetryingBackend,
};
use crate::respond;
use crate::session::{
    ContextStore, ContextUpdate, ConversationTurn, HistoryLimits, MemoryContextStore, SearchKind,
    SearchRecord, SessionContext,
};
use crate::tools::{
    AttractionSearchTool, FlightSearchTool, GeocodeTool, HotelSearchTool, ToolInvocation,
    ToolInvoker, ToolRegistry,
};

/// 模型后端不可用时的固定回退文案：确认收到、保留偏好、请求重试
const FALLBACK_TEXT: &str = "I'm having trouble reaching my planning service right now. \
    I've noted your preferences, so please try that again in a moment.";

/// 上下文存储失败时的通用失败文案
const STORE_FAILURE_TEXT: &str =
    "Something went wrong on my side and I couldn't process that turn. Please try again.";

/// 空消息的提示文案
const EMPTY_MESSAGE_TEXT: &str = "I didn't catch that - could you type a message?";

/// 取消后的确认文案
const CANCELLED_TEXT: &str = "Okay, I've stopped that search.";

/// 默认 system prompt（可由调用方覆盖）
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are Marco, a travel planning assistant. \
    Help the traveler plan flights, stays and activities. Be concise and concrete, \
    and respect the traveler preferences listed below when making suggestions.";

/// 根据配置与环境变量选择模型后端（DeepSeek / OpenAI 兼容 / Mock），
/// 并统一套上超时 + 有界退避重试
pub fn create_backend_from_config(cfg: &AppConfig) -> Arc<dyn ModelBackend> {
    let provider = cfg.llm.provider.to_lowercase();
    let use_deepseek = std::env::var("DEEPSEEK_API_KEY").is_ok()
        || (provider == "deepseek" && std::env::var("OPENAI_API_KEY").is_ok());
    let use_openai = std::env::var("OPENAI_API_KEY").is_ok() && provider != "deepseek";

    let inner: Arc<dyn ModelBackend> = if use_deepseek {
        tracing::info!(model = %cfg.llm.model, "Using DeepSeek backend");
        Arc::new(create_deepseek_backend(Some(&cfg.llm.model)))
    } else if use_openai {
        tracing::info!(model = %cfg.llm.model, "Using OpenAI-compatible backend");
        Arc::new(OpenAiBackend::new(
            cfg.llm.base_url.as_deref(),
            &cfg.llm.model,
            None,
        ))
    } else {
        tracing::warn!("No API key set or provider unknown, using Mock backend");
        Arc::new(MockBackend::new())
    };

    Arc::new(RetryingBackend::new(
        inner,
        RetryConfig {
            max_retries: cfg.llm.retry.max_retries,
            base_delay: std::time::Duration::from_millis(cfg.llm.retry.base_delay_ms),
            request_timeout: std::time::Duration::from_secs(cfg.llm.request_timeout_secs),
        },
    ))
}

/// 注册四个旅行工具（进程启动时一次，之后注册表只读）
pub fn build_tool_registry(cfg: &AppConfig) -> ToolRegistry {
    let timeout = cfg.tools.tool_timeout_secs;
    let providers = &cfg.tools.providers;
    let mut registry = ToolRegistry::new();
    registry.register(FlightSearchTool::new(providers.flight_base_url.clone(), timeout));
    registry.register(HotelSearchTool::new(providers.hotel_base_url.clone(), timeout));
    registry.register(AttractionSearchTool::new(
        providers.attraction_base_url.clone(),
        timeout,
    ));
    registry.register(GeocodeTool::new(providers.geocode_base_url.clone(), timeout));
    registry
}

/// 从配置组装一个可用的编排器（内存存储）
pub fn create_orchestrator(cfg: &AppConfig) -> Orchestrator {
    let limits = HistoryLimits {
        max_conversation_turns: cfg.app.max_conversation_turns,
        max_search_history: cfg.app.max_search_history,
    };
    let store = Arc::new(MemoryContextStore::new(limits));
    let backend = create_backend_from_config(cfg);
    let invoker = ToolInvoker::new(
        Arc::new(build_tool_registry(cfg)),
        cfg.tools.tool_timeout_secs,
        cfg.tools.max_concurrent_tools,
    );
    Orchestrator::new(
        store,
        backend,
        invoker,
        DEFAULT_SYSTEM_PROMPT,
        cfg.app.max_agent_iterations,
        cfg.app.max_conversation_turns,
    )
}

/// 编排器：持有存储、Planner、工具调用器与边界参数，线程安全、可跨轮共享
pub struct Orchestrator {
    store: Arc<dyn ContextStore>,
    planner: Planner,
    invoker: ToolInvoker,
    max_agent_iterations: u32,
    max_conversation_turns: usize,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn ContextStore>,
        backend: Arc<dyn ModelBackend>,
        invoker: ToolInvoker,
        system_prompt: &str,
        max_agent_iterations: u32,
        max_conversation_turns: usize,
    ) -> Self {
        Self {
            store,
            planner: Planner::new(backend, system_prompt),
            invoker,
            max_agent_iterations,
            max_conversation_turns,
        }
    }

    pub fn store(&self) -> &Arc<dyn ContextStore> {
        &self.store
    }

    /// 处理一轮对话（无取消信号）
    pub async fn handle_turn(&self, request: TurnRequest) -> TurnResponse {
        self.handle_turn_with_cancel(request, CancellationToken::new())
            .await
    }

    /// 处理一轮对话；调用方断开时 cancel 令牌让 Agent 循环尽快停止
    pub async fn handle_turn_with_cancel(
        &self,
        request: TurnRequest,
        cancel: CancellationToken,
    ) -> TurnResponse {
        let session_id = resolve_session_id(&request);
        let message = request.message.trim().to_string();

        // 校验先行：空消息不触碰模型与存储
        if message.is_empty() {
            tracing::warn!(session_id = %session_id, "turn rejected: empty message");
            return respond::assemble(
                EMPTY_MESSAGE_TEXT.to_string(),
                Vec::new(),
                TurnMode::Simple,
                0,
                session_id,
                Some(AgentError::Validation("empty message".to_string()).code()),
            );
        }

        tracing::info!(session_id = %session_id, "turn_start");

        // START：加载上下文，抽取偏好增量并合并进工作副本
        let context = match self.store.get(&session_id).await {
            Ok(ctx) => ctx,
            Err(e) => {
                tracing::error!(session_id = %session_id, error = %e, "context store get failed");
                return respond::assemble(
                    STORE_FAILURE_TEXT.to_string(),
                    Vec::new(),
                    TurnMode::Simple,
                    0,
                    session_id,
                    Some(AgentError::ContextStore(e.to_string()).code()),
                );
            }
        };
        let delta = extract::extract(&message, &context.preferences);
        let mut working = context;
        working.preferences.apply(&delta);
        if !delta.is_empty() {
            tracing::info!(session_id = %session_id, "preference delta extracted");
        }

        // CLASSIFY：强制标志永远优先
        let (mode, matched) = if request.force_agent_mode {
            (TurnMode::Agent, "forced")
        } else {
            let c = classify::classify(&message);
            (
                if c.complex { TurnMode::Agent } else { TurnMode::Simple },
                c.matched,
            )
        };
        tracing::info!(session_id = %session_id, mode = ?mode, matched, "classify");

        // SIMPLE_COMPLETE | AGENT_LOOP
        let (mut text, iterations, invocations, error) = match mode {
            TurnMode::Simple => self.run_simple(&working, &message).await,
            TurnMode::Agent => self.run_agent(&working, &message, &cancel).await,
        };

        // ERROR：终态模型失败降级为固定回退文案；取消有专属确认文案
        let error_code = error.as_ref().map(AgentError::code);
        if let Some(e) = &error {
            tracing::warn!(session_id = %session_id, error = %e, "turn degraded to fallback");
            text = match e {
                AgentError::Cancelled => CANCELLED_TEXT.to_string(),
                _ => FALLBACK_TEXT.to_string(),
            };
        }

        // ASSEMBLE：一次性写回（偏好增量 + 搜索记录 + 对话 + 计数恰好 +1）
        let update = ContextUpdate {
            preference_delta: delta,
            search_records: derive_search_records(&invocations),
            turns: vec![
                ConversationTurn::user(message),
                ConversationTurn::assistant(text.clone()),
            ],
            record_interaction: true,
        };
        if let Err(e) = self.store.update(&session_id, update).await {
            tracing::error!(session_id = %session_id, error = %e, "context store update failed");
            return respond::assemble(
                STORE_FAILURE_TEXT.to_string(),
                invocations,
                mode,
                iterations,
                session_id,
                Some(AgentError::ContextStore(e.to_string()).code()),
            );
        }

        tracing::info!(
            session_id = %session_id,
            mode = ?mode,
            iterations,
            tools = invocations.len(),
            degraded = error_code.is_some(),
            "turn_done"
        );
        respond::assemble(text, invocations, mode, iterations, session_id, error_code)
    }

    /// 简单模式：一次完成调用，system 带紧凑上下文摘要（不是原始历史），无工具
    async fn run_simple(
        &self,
        working: &SessionContext,
        message: &str,
    ) -> (String, u32, Vec<ToolInvocation>, Option<AgentError>) {
        let summary = working.summary();
        let system = if summary.is_empty() {
            self.planner.base_system_prompt().to_string()
        } else {
            format!("{}\n\n{}", self.planner.base_system_prompt(), summary)
        };
        let messages = vec![ChatMessage::user(message)];
        match self.planner.complete_with_system(&messages, &system).await {
            Ok(text) => (text, 1, Vec::new(), None),
            Err(e) => (String::new(), 1, Vec::new(), Some(AgentError::from_llm(e))),
        }
    }

    /// Agent 模式：带工具 schema 的有界循环，对话窗口 + 本轮输入
    async fn run_agent(
        &self,
        working: &SessionContext,
        message: &str,
        cancel: &CancellationToken,
    ) -> (String, u32, Vec<ToolInvocation>, Option<AgentError>) {
        let mut system = format!(
            "{}\n\n{}",
            self.planner.base_system_prompt(),
            tool_instructions(&self.invoker.registry().to_schema_json()),
        );
        let prefs = working.preferences.to_prompt_section();
        if !prefs.is_empty() {
            system.push_str("\n\n");
            system.push_str(&prefs);
        }

        let mut messages: Vec<ChatMessage> = working
            .recent_turns(self.max_conversation_turns)
            .iter()
            .map(|t| ChatMessage {
                role: t.role,
                content: t.content.clone(),
            })
            .collect();
        messages.push(ChatMessage::user(message));

        let outcome = agent_loop(
            &self.planner,
            &self.invoker,
            &system,
            messages,
            self.max_agent_iterations,
            cancel,
        )
        .await;
        (
            outcome.text,
            outcome.iterations,
            outcome.invocations,
            outcome.error,
        )
    }
}

/// 会话标识解析：显式 session_id > 从 user_id 派生 > 随机匿名标识
fn resolve_session_id(request: &TurnRequest) -> String {
    if let Some(id) = request.session_id.as_deref() {
        if !id.trim().is_empty() {
            return id.trim().to_string();
        }
    }
    if let Some(user) = request.user_id.as_deref() {
        if !user.trim().is_empty() {
            return format!("anon-{}", user.trim());
        }
    }
    format!("anon-{}", uuid::Uuid::new_v4())
}

/// 从成功的搜索信封推导搜索历史记录
fn derive_search_records(invocations: &[ToolInvocation]) -> Vec<SearchRecord> {
    invocations
        .iter()
        .filter(|inv| inv.is_ok())
        .filter_map(|inv| {
            let kind = match inv.name.as_str() {
                "flight_search" => SearchKind::Flight,
                "hotel_search" => SearchKind::Hotel,
                "attraction_search" => SearchKind::Attraction,
                _ => return None,
            };
            let get_str =
                |key: &str| inv.input.get(key).and_then(|v| v.as_str()).map(String::from);
            let budget_key = match kind {
                SearchKind::Hotel => "max_nightly_price",
                _ => "max_price",
            };
            Some(SearchRecord {
                kind,
                origin: get_str("origin"),
                destination: get_str("destination"),
                budget: inv.input.get(budget_key).and_then(|v| v.as_f64()),
                timestamp: inv.timestamp,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_session_id_precedence() {
        let explicit = TurnRequest {
            session_id: Some("s-42".to_string()),
            user_id: Some("u-1".to_string()),
            message: "hi".to_string(),
            force_agent_mode: false,
        };
        assert_eq!(resolve_session_id(&explicit), "s-42");

        let derived = TurnRequest {
            session_id: None,
            user_id: Some("u-1".to_string()),
            message: "hi".to_string(),
            force_agent_mode: false,
        };
        assert_eq!(resolve_session_id(&derived), "anon-u-1");

        let anonymous = TurnRequest::new("hi");
        assert!(resolve_session_id(&anonymous).starts_with("anon-"));
    }

    #[test]
    fn test_derive_search_records_skips_failures_and_geocode() {
        use crate::tools::{ToolErrorKind, ToolOutcome};
        use chrono::Utc;

        let invocations = vec![
            ToolInvocation {
                name: "flight_search".to_string(),
                input: serde_json::json!({"origin": "BOM", "destination": "NRT", "max_price": 900.0}),
                outcome: ToolOutcome::Ok {
                    output: serde_json::json!({"results": []}),
                },
                elapsed_ms: 1,
                timestamp: Utc::now(),
            },
            ToolInvocation {
                name: "geocode".to_string(),
                input: serde_json::json!({"query": "Tokyo"}),
                outcome: ToolOutcome::Ok {
                    output: serde_json::json!({"results": []}),
                },
                elapsed_ms: 1,
                timestamp: Utc::now(),
            },
            ToolInvocation {
                name: "hotel_search".to_string(),
                input: serde_json::json!({"destination": "Tokyo"}),
                outcome: ToolOutcome::Error {
                    kind: ToolErrorKind::Provider,
                    message: "down".to_string(),
                },
                elapsed_ms: 1,
                timestamp: Utc::now(),
            },
        ];
        let records = derive_search_records(&invocations);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, SearchKind::Flight);
        assert_eq!(records[0].origin.as_deref(), Some("BOM"));
        assert_eq!(records[0].budget, Some(900.0));
    }
}
