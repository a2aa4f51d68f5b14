//! 景点 / 餐厅搜索工具
//!
//! 同一个 provider 端点通过 category 参数区分景点与餐厅两类查询。

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use super::provider::{extract_results, ProviderClient, MAX_RESULTS};
use super::registry::{parse_args, Tool, ToolError};

/// 查询类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AttractionCategory {
    Attraction,
    Restaurant,
}

impl AttractionCategory {
    fn as_str(&self) -> &'static str {
        match self {
            AttractionCategory::Attraction => "attraction",
            AttractionCategory::Restaurant => "restaurant",
        }
    }
}

/// 景点/餐厅搜索输入
#[derive(Debug, Deserialize, JsonSchema)]
pub struct AttractionSearchInput {
    /// 目的地城市
    pub destination: String,
    /// 类别：attraction（默认）或 restaurant
    #[serde(default)]
    pub category: Option<AttractionCategory>,
    /// 兴趣过滤，如 museums、hiking、street food
    #[serde(default)]
    pub interests: Option<Vec<String>>,
    /// 饮食限制（餐厅查询时透传）
    #[serde(default)]
    pub dietary: Option<Vec<String>>,
}

pub struct AttractionSearchTool {
    provider: ProviderClient,
    base_url: Option<String>,
}

impl AttractionSearchTool {
    pub fn new(base_url: Option<String>, timeout_secs: u64) -> Self {
        Self {
            provider: ProviderClient::new(timeout_secs),
            base_url,
        }
    }
}

#[async_trait]
impl Tool for AttractionSearchTool {
    fn name(&self) -> &str {
        "attraction_search"
    }

    fn description(&self) -> &str {
        "Search attractions or restaurants in a city. Args: {\"destination\": \"Rome\", \"category\": \"restaurant\", \"interests\": [\"history\"], \"dietary\": [\"vegetarian\"]}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::to_value(schemars::schema_for!(AttractionSearchInput))
            .unwrap_or_else(|_| serde_json::json!({"type": "object"}))
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let input: AttractionSearchInput = parse_args(args)?;
        let base_url = self
            .base_url
            .as_deref()
            .ok_or_else(|| ToolError::Provider("attraction provider not configured".to_string()))?;

        let category = input.category.unwrap_or(AttractionCategory::Attraction);
        let mut query: Vec<(&str, String)> = vec![
            ("destination", input.destination.clone()),
            ("category", category.as_str().to_string()),
        ];
        if let Some(interests) = &input.interests {
            query.push(("interests", interests.join(",")));
        }
        if let Some(dietary) = &input.dietary {
            query.push(("dietary", dietary.join(",")));
        }

        let body = self.provider.get_json(base_url, &query).await?;
        let results = extract_results(&body, MAX_RESULTS);
        Ok(serde_json::json!({
            "destination": input.destination,
            "category": category.as_str(),
            "count": results.len(),
            "results": results,
        }))
    }
}
