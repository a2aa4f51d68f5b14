//! 搜索 Provider 的 HTTP 共用层
//!
//! 三个搜索工具（航班/酒店/景点）与地理编码共用：带超时的 GET + JSON 解析，
//! 以及 provider 响应的归一化（接受 {"results": [...]} 或裸数组，截断条数）。

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use super::registry::ToolError;

/// 单个 provider 响应里最多保留的结果条数
pub const MAX_RESULTS: usize = 5;

/// 带超时的 provider HTTP 客户端
pub struct ProviderClient {
    client: Client,
}

impl ProviderClient {
    pub fn new(timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent("marco/0.1")
            .build()
            .unwrap_or_default();
        Self { client }
    }

    /// GET base_url?query，期望 JSON 响应；任何失败都归为 Provider 错误
    pub async fn get_json(
        &self,
        base_url: &str,
        query: &[(&str, String)],
    ) -> Result<Value, ToolError> {
        let resp = self
            .client
            .get(base_url)
            .query(query)
            .send()
            .await
            .map_err(|e| ToolError::Provider(format!("request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ToolError::Provider(format!("HTTP {}", status)));
        }

        resp.json::<Value>()
            .await
            .map_err(|e| ToolError::Provider(format!("invalid JSON response: {}", e)))
    }
}

/// 归一化 provider 响应：取 results 字段或裸数组，截断到 limit
pub fn extract_results(body: &Value, limit: usize) -> Vec<Value> {
    let items = body
        .get("results")
        .and_then(Value::as_array)
        .or_else(|| body.as_array());
    match items {
        Some(list) => list.iter().take(limit).cloned().collect(),
        None => Vec::new(),
    }
}
