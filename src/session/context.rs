//! 会话上下文：偏好、搜索历史、对话历史、计数器
//!
//! 历史序列只追加、写时截断（保留最近 N 条）；total_interactions 单调递增；
//! apply_update 是纯状态变换，合并律（字段局部、幂等）可脱离存储层单测。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::llm::Role;
use crate::session::preferences::{PreferenceDelta, TravelPreferences};

/// 历史窗口边界（来自 [app] 配置段）
#[derive(Debug, Clone, Copy)]
pub struct HistoryLimits {
    pub max_conversation_turns: usize,
    pub max_search_history: usize,
}

impl Default for HistoryLimits {
    fn default() -> Self {
        Self {
            max_conversation_turns: 20,
            max_search_history: 20,
        }
    }
}

/// 搜索类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchKind {
    Flight,
    Hotel,
    Attraction,
    Geocode,
}

/// 一次搜索的描述符（追加进 search_history）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRecord {
    pub kind: SearchKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// 一条对话记录（带时间戳；模型调用只取 role + content）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// 对上下文的一次原子更新：偏好增量 + 历史追加 + 交互计数
#[derive(Debug, Clone, Default)]
pub struct ContextUpdate {
    pub preference_delta: PreferenceDelta,
    pub search_records: Vec<SearchRecord>,
    pub turns: Vec<ConversationTurn>,
    /// 每轮恰好置位一次（含降级回答的轮次）
    pub record_interaction: bool,
}

/// 会话上下文：每个 session id 一份，由 ContextStore 持有唯一权威副本
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionContext {
    pub preferences: TravelPreferences,
    pub search_history: Vec<SearchRecord>,
    pub conversation: Vec<ConversationTurn>,
    pub total_interactions: u64,
    pub last_updated: DateTime<Utc>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self {
            preferences: TravelPreferences::default(),
            search_history: Vec::new(),
            conversation: Vec::new(),
            total_interactions: 0,
            last_updated: Utc::now(),
        }
    }
}

/// 写时截断：超出上限时丢弃最旧条目
fn truncate_front<T>(items: &mut Vec<T>, max: usize) {
    if items.len() > max {
        let drop = items.len() - max;
        items.drain(..drop);
    }
}

impl SessionContext {
    /// 应用一次更新：深合并偏好、追加并截断历史、按需递增计数、刷新时间戳
    pub fn apply_update(&mut self, update: &ContextUpdate, limits: &HistoryLimits) {
        self.preferences.apply(&update.preference_delta);

        self.search_history.extend(update.search_records.iter().cloned());
        truncate_front(&mut self.search_history, limits.max_search_history);

        self.conversation.extend(update.turns.iter().cloned());
        truncate_front(&mut self.conversation, limits.max_conversation_turns * 2);

        if update.record_interaction {
            self.total_interactions += 1;
        }
        self.last_updated = Utc::now();
    }

    /// 最近 N 条对话（user/assistant 对计一轮）
    pub fn recent_turns(&self, n: usize) -> &[ConversationTurn] {
        let start = self.conversation.len().saturating_sub(n * 2);
        &self.conversation[start..]
    }

    /// 紧凑上下文摘要：偏好段落 + 最近对话摘录，供简单模式 system prompt 使用
    /// （不是原始历史全量）
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        let prefs = self.preferences.to_prompt_section();
        if !prefs.is_empty() {
            parts.push(prefs);
        }
        let recent = self.recent_turns(3);
        if !recent.is_empty() {
            let digest: Vec<String> = recent
                .iter()
                .map(|t| {
                    let content: String = t.content.chars().take(120).collect();
                    format!("{:?}: {}", t.role, content)
                })
                .collect();
            parts.push(format!("## Recent conversation\n{}", digest.join("\n")));
        }
        if let Some(last) = self.search_history.last() {
            parts.push(format!(
                "## Last search\n{:?} {} -> {}",
                last.kind,
                last.origin.as_deref().unwrap_or("-"),
                last.destination.as_deref().unwrap_or("-"),
            ));
        }
        parts.join("\n\n")
    }
}
