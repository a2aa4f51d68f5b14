//! 地理编码工具
//!
//! 默认对接 open-meteo 的公开 geocoding 端点（无需 API Key），
//! 归一化为 {name, latitude, longitude, country, timezone} 列表。

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use super::provider::{extract_results, ProviderClient, MAX_RESULTS};
use super::registry::{parse_args, Tool, ToolError};

/// 地理编码输入
#[derive(Debug, Deserialize, JsonSchema)]
pub struct GeocodeInput {
    /// 地名，如 "Kyoto" 或 "Mumbai"
    pub query: String,
    /// 返回条数（默认 3，上限 5）
    #[serde(default)]
    pub count: Option<u8>,
}

pub struct GeocodeTool {
    provider: ProviderClient,
    base_url: String,
}

impl GeocodeTool {
    pub fn new(base_url: String, timeout_secs: u64) -> Self {
        Self {
            provider: ProviderClient::new(timeout_secs),
            base_url,
        }
    }
}

/// 只保留下游关心的字段
fn normalize_place(raw: &Value) -> Value {
    serde_json::json!({
        "name": raw.get("name").cloned().unwrap_or(Value::Null),
        "latitude": raw.get("latitude").cloned().unwrap_or(Value::Null),
        "longitude": raw.get("longitude").cloned().unwrap_or(Value::Null),
        "country": raw.get("country").cloned().unwrap_or(Value::Null),
        "timezone": raw.get("timezone").cloned().unwrap_or(Value::Null),
    })
}

#[async_trait]
impl Tool for GeocodeTool {
    fn name(&self) -> &str {
        "geocode"
    }

    fn description(&self) -> &str {
        "Resolve a place name to coordinates and country. Args: {\"query\": \"Kyoto\"}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::to_value(schemars::schema_for!(GeocodeInput))
            .unwrap_or_else(|_| serde_json::json!({"type": "object"}))
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let input: GeocodeInput = parse_args(args)?;
        if input.query.trim().is_empty() {
            return Err(ToolError::InvalidInput("query must not be empty".to_string()));
        }
        let count = input.count.unwrap_or(3).min(MAX_RESULTS as u8);

        let query: Vec<(&str, String)> = vec![
            ("name", input.query.clone()),
            ("count", count.to_string()),
        ];
        let body = self.provider.get_json(&self.base_url, &query).await?;
        let results: Vec<Value> = extract_results(&body, count as usize)
            .iter()
            .map(normalize_place)
            .collect();

        Ok(serde_json::json!({
            "query": input.query,
            "count": results.len(),
            "results": results,
        }))
    }
}
