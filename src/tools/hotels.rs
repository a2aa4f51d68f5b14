//! 酒店搜索工具

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use super::provider::{extract_results, ProviderClient, MAX_RESULTS};
use super::registry::{parse_args, Tool, ToolError};

/// 酒店搜索输入
#[derive(Debug, Deserialize, JsonSchema)]
pub struct HotelSearchInput {
    /// 目的地城市
    pub destination: String,
    /// 入住日期（YYYY-MM-DD）
    #[serde(default)]
    pub check_in: Option<String>,
    /// 退房日期（YYYY-MM-DD）
    #[serde(default)]
    pub check_out: Option<String>,
    /// 最低星级（1-5）
    #[serde(default)]
    pub min_stars: Option<u8>,
    /// 每晚价格上限
    #[serde(default)]
    pub max_nightly_price: Option<f64>,
    /// 期望设施，如 pool、spa、breakfast
    #[serde(default)]
    pub amenities: Option<Vec<String>>,
}

pub struct HotelSearchTool {
    provider: ProviderClient,
    base_url: Option<String>,
}

impl HotelSearchTool {
    pub fn new(base_url: Option<String>, timeout_secs: u64) -> Self {
        Self {
            provider: ProviderClient::new(timeout_secs),
            base_url,
        }
    }
}

#[async_trait]
impl Tool for HotelSearchTool {
    fn name(&self) -> &str {
        "hotel_search"
    }

    fn description(&self) -> &str {
        "Search hotels in a city. Args: {\"destination\": \"Kyoto\", \"check_in\": \"2026-06-02\", \"min_stars\": 4, \"max_nightly_price\": 150}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::to_value(schemars::schema_for!(HotelSearchInput))
            .unwrap_or_else(|_| serde_json::json!({"type": "object"}))
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let input: HotelSearchInput = parse_args(args)?;
        let base_url = self
            .base_url
            .as_deref()
            .ok_or_else(|| ToolError::Provider("hotel provider not configured".to_string()))?;

        let mut query: Vec<(&str, String)> = vec![("destination", input.destination.clone())];
        if let Some(date) = &input.check_in {
            query.push(("check_in", date.clone()));
        }
        if let Some(date) = &input.check_out {
            query.push(("check_out", date.clone()));
        }
        if let Some(stars) = input.min_stars {
            query.push(("min_stars", stars.to_string()));
        }
        if let Some(price) = input.max_nightly_price {
            query.push(("max_nightly_price", price.to_string()));
        }
        if let Some(amenities) = &input.amenities {
            query.push(("amenities", amenities.join(",")));
        }

        let body = self.provider.get_json(base_url, &query).await?;
        let results = extract_results(&body, MAX_RESULTS);
        Ok(serde_json::json!({
            "destination": input.destination,
            "count": results.len(),
            "results": results,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_provider_is_structured_error() {
        let tool = HotelSearchTool::new(None, 1);
        let err = tool
            .execute(serde_json::json!({"destination": "Kyoto"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Provider(_)));
    }

    #[tokio::test]
    async fn test_wrong_type_is_invalid_input() {
        let tool = HotelSearchTool::new(None, 1);
        let err = tool
            .execute(serde_json::json!({"destination": "Kyoto", "min_stars": "four"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }
}
