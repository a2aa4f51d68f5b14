//! Mock 模型后端（用于测试，无需 API）
//!
//! 按脚本顺序弹出预置结果；脚本耗尽后回显最后一条 User 消息，便于本地跑通编排流程。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{Completion, CompletionRequest, LlmError, ModelBackend, Role};

/// Mock 后端：预置输出序列，测试中用于驱动 Agent 循环走任意分支
#[derive(Default)]
pub struct MockBackend {
    script: Mutex<VecDeque<Result<String, LlmError>>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一条成功输出
    pub fn push_text(self, text: impl Into<String>) -> Self {
        self.script
            .lock()
            .expect("mock script lock")
            .push_back(Ok(text.into()));
        self
    }

    /// 追加一条错误
    pub fn push_error(self, err: LlmError) -> Self {
        self.script
            .lock()
            .expect("mock script lock")
            .push_back(Err(err));
        self
    }
}

#[async_trait]
impl ModelBackend for MockBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, LlmError> {
        if let Some(next) = self.script.lock().expect("mock script lock").pop_front() {
            return next.map(|text| Completion { text });
        }

        let last_user = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");

        Ok(Completion {
            text: format!("Echo from Mock: {}", last_user),
        })
    }
}
