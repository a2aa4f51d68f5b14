//! 复杂度分类器：决定一轮对话走 Agent 模式还是简单模式
//!
//! 无状态关键词启发式：需要搜索/工具能力（航班、酒店、多步行程、比价、
//! 目的地+日期+预算组合）判为复杂；问候、闲聊、澄清式提问判为简单。
//! 平局偏向简单以降低延迟与成本；调用方的 force_agent_mode 在编排层优先生效。

use once_cell::sync::Lazy;
use regex::Regex;

/// 分类结果：是否复杂 + 命中的模式族（用于结构化日志）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub complex: bool,
    pub matched: &'static str,
}

/// 搜索/预订类动词短语
const SEARCH_VERBS: &[&str] = &[
    "find", "search", "look for", "show me", "book", "get me", "recommend",
];

/// 旅行资源名词：出现即意味着需要外部数据
const TRAVEL_NOUNS: &[&str] = &[
    "flight",
    "flights",
    "airfare",
    "hotel",
    "hotels",
    "accommodation",
    "hostel",
    "attraction",
    "attractions",
    "restaurant",
    "restaurants",
    "things to do",
];

/// 多步/行程类短语
const ITINERARY_CUES: &[&str] = &[
    "itinerary",
    "plan a trip",
    "plan my trip",
    "plan a vacation",
    "day trip",
    "weekend in",
    "days in",
];

/// 比较类短语
const COMPARISON_CUES: &[&str] = &["compare", "cheapest", "best price", "cheaper", "versus", " vs "];

/// 金额模式（与目的地组合时判为复杂）
static MONEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[$€£₹¥]\s*[0-9]|[0-9]+\s*(?:usd|eur|gbp|inr|dollars?|euros?|pounds?|rupees?)")
        .expect("money pattern")
});

/// 目的地线索：to <大写开头词>（在原始消息上匹配）
static DESTINATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bto\s+[A-Z][a-zA-Z]+").expect("destination pattern"));

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// 主入口：消息 -> 分类
pub fn classify(message: &str) -> Classification {
    let lower = message.to_lowercase();

    if contains_any(&lower, TRAVEL_NOUNS) {
        return Classification {
            complex: true,
            matched: "travel_noun",
        };
    }
    if contains_any(&lower, ITINERARY_CUES) {
        return Classification {
            complex: true,
            matched: "itinerary",
        };
    }
    if contains_any(&lower, COMPARISON_CUES) && contains_any(&lower, SEARCH_VERBS) {
        return Classification {
            complex: true,
            matched: "comparison",
        };
    }
    // 预算 + 目的地组合：即使没点名航班/酒店也需要搜索能力
    if MONEY.is_match(&lower) && DESTINATION.is_match(message) {
        return Classification {
            complex: true,
            matched: "budget_destination",
        };
    }

    Classification {
        complex: false,
        matched: "none",
    }
}
