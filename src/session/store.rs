//! 会话上下文存储抽象层
//!
//! ContextStore 是可注入接口：同一套编排逻辑可对接内存、键值缓存或持久化存储。
//! 内存实现 get 永不失败（按需创建默认上下文）；update 在写锁内整体应用，
//! 返回新状态供本轮立即使用；过期会话由 evict_idle 按 TTL 清理。

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio::sync::RwLock;

use super::context::{ContextUpdate, HistoryLimits, SessionContext};

/// 存储层错误：对本轮致命（ContextStoreError），但不得破坏已持久化状态
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// 会话上下文存储接口
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// 读取会话上下文；不存在时创建默认初始化的上下文
    async fn get(&self, session_id: &str) -> Result<SessionContext, StoreError>;

    /// 原子应用一次更新并返回新状态
    async fn update(
        &self,
        session_id: &str,
        update: ContextUpdate,
    ) -> Result<SessionContext, StoreError>;

    /// 清理空闲超过 ttl 的会话，返回清理数量
    async fn evict_idle(&self, ttl: Duration) -> usize;
}

/// 内存实现：RwLock<HashMap<session_id, SessionContext>>
pub struct MemoryContextStore {
    sessions: RwLock<HashMap<String, SessionContext>>,
    limits: HistoryLimits,
}

impl MemoryContextStore {
    pub fn new(limits: HistoryLimits) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            limits,
        }
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl ContextStore for MemoryContextStore {
    async fn get(&self, session_id: &str) -> Result<SessionContext, StoreError> {
        {
            let sessions = self.sessions.read().await;
            if let Some(ctx) = sessions.get(session_id) {
                return Ok(ctx.clone());
            }
        }

        let mut sessions = self.sessions.write().await;
        // 写锁下二次检查，避免并发首轮重复创建
        let ctx = sessions
            .entry(session_id.to_string())
            .or_insert_with(SessionContext::default);
        Ok(ctx.clone())
    }

    async fn update(
        &self,
        session_id: &str,
        update: ContextUpdate,
    ) -> Result<SessionContext, StoreError> {
        let mut sessions = self.sessions.write().await;
        let ctx = sessions
            .entry(session_id.to_string())
            .or_insert_with(SessionContext::default);
        ctx.apply_update(&update, &self.limits);
        Ok(ctx.clone())
    }

    async fn evict_idle(&self, ttl: Duration) -> usize {
        let cutoff = Utc::now() - chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero());
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, ctx| ctx.last_updated > cutoff);
        before - sessions.len()
    }
}
