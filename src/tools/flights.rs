//! 航班搜索工具
//!
//! 透传到配置的航班 provider 端点；端点未配置时返回结构化 provider 错误，
//! 编排层据此降级回答而不是中止整轮。

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use super::provider::{extract_results, ProviderClient, MAX_RESULTS};
use super::registry::{parse_args, Tool, ToolError};

/// 航班搜索输入（schema 由 schemars 派生，供模型与校验共用）
#[derive(Debug, Deserialize, JsonSchema)]
pub struct FlightSearchInput {
    /// 出发城市或机场代码
    pub origin: String,
    /// 到达城市或机场代码
    pub destination: String,
    /// 出发日期（YYYY-MM-DD）
    #[serde(default)]
    pub departure_date: Option<String>,
    /// 返程日期（YYYY-MM-DD，单程省略）
    #[serde(default)]
    pub return_date: Option<String>,
    /// 舱位：economy / premium_economy / business / first
    #[serde(default)]
    pub cabin_class: Option<String>,
    /// 价格上限
    #[serde(default)]
    pub max_price: Option<f64>,
    /// 最大中转次数（0 表示直飞）
    #[serde(default)]
    pub max_stops: Option<u8>,
}

pub struct FlightSearchTool {
    provider: ProviderClient,
    base_url: Option<String>,
}

impl FlightSearchTool {
    pub fn new(base_url: Option<String>, timeout_secs: u64) -> Self {
        Self {
            provider: ProviderClient::new(timeout_secs),
            base_url,
        }
    }
}

#[async_trait]
impl Tool for FlightSearchTool {
    fn name(&self) -> &str {
        "flight_search"
    }

    fn description(&self) -> &str {
        "Search flights between two cities. Args: {\"origin\": \"BOM\", \"destination\": \"Tokyo\", \"departure_date\": \"2026-06-02\", \"max_price\": 900, \"max_stops\": 0}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::to_value(schemars::schema_for!(FlightSearchInput))
            .unwrap_or_else(|_| serde_json::json!({"type": "object"}))
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let input: FlightSearchInput = parse_args(args)?;
        let base_url = self
            .base_url
            .as_deref()
            .ok_or_else(|| ToolError::Provider("flight provider not configured".to_string()))?;

        let mut query: Vec<(&str, String)> = vec![
            ("origin", input.origin.clone()),
            ("destination", input.destination.clone()),
        ];
        if let Some(date) = &input.departure_date {
            query.push(("departure_date", date.clone()));
        }
        if let Some(date) = &input.return_date {
            query.push(("return_date", date.clone()));
        }
        if let Some(cabin) = &input.cabin_class {
            query.push(("cabin_class", cabin.clone()));
        }
        if let Some(price) = input.max_price {
            query.push(("max_price", price.to_string()));
        }
        if let Some(stops) = input.max_stops {
            query.push(("max_stops", stops.to_string()));
        }

        let body = self.provider.get_json(base_url, &query).await?;
        let results = extract_results(&body, MAX_RESULTS);
        Ok(serde_json::json!({
            "origin": input.origin,
            "destination": input.destination,
            "count": results.len(),
            "results": results,
        }))
    }
}
