//! 响应装配器
//!
//! 把模型文本、工具调用信封与元数据装配为面向调用方的 TurnResponse：
//! 按工具名把成功结果拆进 flights/hotels/attractions 侧通道，
//! 根据本轮实际执行的搜索推导后续建议动作。
//! 成功获得的工具结果即使最终文本没有引用，也必须原样带回。

use serde_json::Value;

use crate::core::{ErrorCode, TurnMode, TurnResponse};
use crate::tools::ToolInvocation;

/// 从成功信封的输出里取 results 数组
fn results_of(invocation: &ToolInvocation) -> Vec<Value> {
    invocation
        .output()
        .and_then(|o| o.get("results"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// 从信封输入里取字符串字段（用于建议动作的目的地）
fn input_str<'a>(invocation: &'a ToolInvocation, key: &str) -> Option<&'a str> {
    invocation.input.get(key).and_then(Value::as_str)
}

/// 根据本轮执行过的搜索推导建议动作
fn suggest_actions(invocations: &[ToolInvocation]) -> Vec<String> {
    let mut actions = Vec::new();
    let ran = |name: &str| invocations.iter().any(|i| i.name == name && i.is_ok());

    if ran("flight_search") && !ran("hotel_search") {
        if let Some(dest) = invocations
            .iter()
            .find(|i| i.name == "flight_search" && i.is_ok())
            .and_then(|i| input_str(i, "destination"))
        {
            actions.push(format!("Search hotels in {}", dest));
        }
    }
    if ran("hotel_search") && !ran("attraction_search") {
        if let Some(dest) = invocations
            .iter()
            .find(|i| i.name == "hotel_search" && i.is_ok())
            .and_then(|i| input_str(i, "destination"))
        {
            actions.push(format!("Find things to do in {}", dest));
        }
    }
    if ran("attraction_search") {
        actions.push("Plan a day-by-day itinerary".to_string());
    }
    actions
}

/// 装配最终响应
pub fn assemble(
    text: String,
    invocations: Vec<ToolInvocation>,
    mode: TurnMode,
    iterations: u32,
    session_id: String,
    error_code: Option<ErrorCode>,
) -> TurnResponse {
    let mut tools_used = Vec::new();
    for invocation in &invocations {
        if !tools_used.contains(&invocation.name) {
            tools_used.push(invocation.name.clone());
        }
    }

    let mut flights = Vec::new();
    let mut hotels = Vec::new();
    let mut attractions = Vec::new();
    for invocation in &invocations {
        if !invocation.is_ok() {
            continue;
        }
        match invocation.name.as_str() {
            "flight_search" => flights.extend(results_of(invocation)),
            "hotel_search" => hotels.extend(results_of(invocation)),
            "attraction_search" => attractions.extend(results_of(invocation)),
            _ => {}
        }
    }

    let suggested_actions = suggest_actions(&invocations);

    TurnResponse {
        text,
        tools_used,
        tool_results: invocations,
        flights,
        hotels,
        attractions,
        suggested_actions,
        mode,
        iterations,
        session_id,
        error_code,
    }
}
