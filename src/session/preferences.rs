//! 旅行偏好与偏好增量
//!
//! 偏好合并是 merge-only：增量只新增或覆盖其提到的叶子字段，绝不清空未提到的字段；
//! 标量覆盖、列表去重追加；仅纠正式增量（如「any number of stops」）可以放宽标量。

use serde::{Deserialize, Serialize};

/// 舱位等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CabinClass {
    Economy,
    PremiumEconomy,
    Business,
    First,
}

/// 起飞时段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepartureWindow {
    Morning,
    Afternoon,
    Evening,
    RedEye,
}

/// 座位偏好
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeatPreference {
    Window,
    Aisle,
}

/// 出行风格
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TravelStyle {
    Luxury,
    Budget,
    Family,
    Business,
}

/// 预算：金额 + 币种（如 900 USD）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    pub amount: f64,
    pub currency: String,
}

/// 航班偏好子记录
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightPreferences {
    pub cabin_class: Option<CabinClass>,
    /// 最大中转次数；0 表示只接受直飞；None 表示无限制
    pub max_stops: Option<u8>,
    pub preferred_airlines: Vec<String>,
    pub avoided_airlines: Vec<String>,
    pub departure_window: Option<DepartureWindow>,
    pub seat: Option<SeatPreference>,
    pub meal: Option<String>,
}

/// 酒店偏好子记录
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotelPreferences {
    pub chain: Option<String>,
    pub min_stars: Option<u8>,
    pub amenities: Vec<String>,
    pub room_type: Option<String>,
    pub view: Option<String>,
    pub nightly_budget: Option<Budget>,
}

/// 会话级旅行偏好（通用 + 航班 + 酒店）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TravelPreferences {
    pub home_city: Option<String>,
    pub travel_style: Option<TravelStyle>,
    pub budget: Option<Budget>,
    pub interests: Vec<String>,
    pub dietary_restrictions: Vec<String>,
    pub flight: FlightPreferences,
    pub hotel: HotelPreferences,
}

/// 标量字段的三态更新：不动 / 覆盖 / 放宽（清空）
///
/// 仅 max_stops 这类可被「any number of stops」显式放宽的标量需要 Clear。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarUpdate<T> {
    #[default]
    Keep,
    Set(T),
    Clear,
}

impl<T> ScalarUpdate<T> {
    pub fn is_keep(&self) -> bool {
        matches!(self, ScalarUpdate::Keep)
    }
}

/// 单条消息抽取出的偏好增量；全部字段为空时表示「本条消息没有可抽取内容」，不是错误
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferenceDelta {
    pub home_city: Option<String>,
    pub travel_style: Option<TravelStyle>,
    pub budget: Option<Budget>,
    pub interests: Vec<String>,
    pub dietary_restrictions: Vec<String>,
    pub cabin_class: Option<CabinClass>,
    pub max_stops: ScalarUpdate<u8>,
    pub preferred_airlines: Vec<String>,
    pub avoided_airlines: Vec<String>,
    pub departure_window: Option<DepartureWindow>,
    pub seat: Option<SeatPreference>,
    pub meal: Option<String>,
    pub hotel_chain: Option<String>,
    pub hotel_min_stars: Option<u8>,
    pub hotel_amenities: Vec<String>,
    pub hotel_nightly_budget: Option<Budget>,
}

impl PreferenceDelta {
    pub fn is_empty(&self) -> bool {
        self == &PreferenceDelta::default()
    }
}

/// 去重追加：已存在（忽略大小写与首尾空白）的条目不再加入
fn append_dedup(list: &mut Vec<String>, items: &[String]) {
    for item in items {
        let needle = item.trim();
        if needle.is_empty() {
            continue;
        }
        let exists = list.iter().any(|e| e.trim().eq_ignore_ascii_case(needle));
        if !exists {
            list.push(needle.to_string());
        }
    }
}

impl TravelPreferences {
    /// 将增量合并进当前偏好：标量覆盖、列表去重追加、未提及字段保持不变。
    /// 对同一非纠正增量重复应用是幂等的。
    pub fn apply(&mut self, delta: &PreferenceDelta) {
        if let Some(ref city) = delta.home_city {
            self.home_city = Some(city.clone());
        }
        if let Some(style) = delta.travel_style {
            self.travel_style = Some(style);
        }
        if let Some(ref budget) = delta.budget {
            self.budget = Some(budget.clone());
        }
        append_dedup(&mut self.interests, &delta.interests);
        append_dedup(&mut self.dietary_restrictions, &delta.dietary_restrictions);

        if let Some(cabin) = delta.cabin_class {
            self.flight.cabin_class = Some(cabin);
        }
        match delta.max_stops {
            ScalarUpdate::Keep => {}
            ScalarUpdate::Set(n) => self.flight.max_stops = Some(n),
            ScalarUpdate::Clear => self.flight.max_stops = None,
        }
        append_dedup(&mut self.flight.preferred_airlines, &delta.preferred_airlines);
        append_dedup(&mut self.flight.avoided_airlines, &delta.avoided_airlines);
        if let Some(window) = delta.departure_window {
            self.flight.departure_window = Some(window);
        }
        if let Some(seat) = delta.seat {
            self.flight.seat = Some(seat);
        }
        if let Some(ref meal) = delta.meal {
            self.flight.meal = Some(meal.clone());
        }

        if let Some(ref chain) = delta.hotel_chain {
            self.hotel.chain = Some(chain.clone());
        }
        if let Some(stars) = delta.hotel_min_stars {
            self.hotel.min_stars = Some(stars);
        }
        append_dedup(&mut self.hotel.amenities, &delta.hotel_amenities);
        if let Some(ref budget) = delta.hotel_nightly_budget {
            self.hotel.nightly_budget = Some(budget.clone());
        }
    }

    /// 渲染为紧凑的提示词段落，供简单模式与 Agent 模式的 system prompt 使用
    pub fn to_prompt_section(&self) -> String {
        let mut lines = Vec::new();
        if let Some(ref city) = self.home_city {
            lines.push(format!("Home city: {}", city));
        }
        if let Some(style) = self.travel_style {
            lines.push(format!("Travel style: {:?}", style));
        }
        if let Some(ref b) = self.budget {
            lines.push(format!("Budget: {} {}", b.amount, b.currency));
        }
        if !self.interests.is_empty() {
            lines.push(format!("Interests: {}", self.interests.join(", ")));
        }
        if !self.dietary_restrictions.is_empty() {
            lines.push(format!(
                "Dietary restrictions: {}",
                self.dietary_restrictions.join(", ")
            ));
        }
        if let Some(cabin) = self.flight.cabin_class {
            lines.push(format!("Flight cabin: {:?}", cabin));
        }
        if let Some(stops) = self.flight.max_stops {
            lines.push(format!("Max stops: {}", stops));
        }
        if !self.flight.preferred_airlines.is_empty() {
            lines.push(format!(
                "Preferred airlines: {}",
                self.flight.preferred_airlines.join(", ")
            ));
        }
        if !self.flight.avoided_airlines.is_empty() {
            lines.push(format!(
                "Avoided airlines: {}",
                self.flight.avoided_airlines.join(", ")
            ));
        }
        if let Some(window) = self.flight.departure_window {
            lines.push(format!("Departure window: {:?}", window));
        }
        if let Some(stars) = self.hotel.min_stars {
            lines.push(format!("Hotel stars: {}+", stars));
        }
        if let Some(ref chain) = self.hotel.chain {
            lines.push(format!("Hotel chain: {}", chain));
        }
        if !self.hotel.amenities.is_empty() {
            lines.push(format!("Hotel amenities: {}", self.hotel.amenities.join(", ")));
        }
        if let Some(ref b) = self.hotel.nightly_budget {
            lines.push(format!("Hotel nightly budget: {} {}", b.amount, b.currency));
        }
        if lines.is_empty() {
            return String::new();
        }
        format!("## Traveler preferences\n{}", lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta_business_emirates() -> PreferenceDelta {
        PreferenceDelta {
            cabin_class: Some(CabinClass::Business),
            max_stops: ScalarUpdate::Set(0),
            preferred_airlines: vec!["Emirates".to_string()],
            home_city: Some("Mumbai".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_merge_is_field_local() {
        let mut prefs = TravelPreferences::default();
        prefs.apply(&delta_business_emirates());

        // 第二个增量只改预算，其它字段必须原样保留
        let d2 = PreferenceDelta {
            budget: Some(Budget {
                amount: 900.0,
                currency: "USD".to_string(),
            }),
            ..Default::default()
        };
        prefs.apply(&d2);

        assert_eq!(prefs.flight.cabin_class, Some(CabinClass::Business));
        assert_eq!(prefs.flight.max_stops, Some(0));
        assert_eq!(prefs.flight.preferred_airlines, vec!["Emirates"]);
        assert_eq!(prefs.home_city.as_deref(), Some("Mumbai"));
        assert_eq!(prefs.budget.as_ref().map(|b| b.amount), Some(900.0));
    }

    #[test]
    fn test_merge_idempotent() {
        let delta = delta_business_emirates();
        let mut once = TravelPreferences::default();
        once.apply(&delta);
        let mut twice = once.clone();
        twice.apply(&delta);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_list_append_dedup_case_insensitive() {
        let mut prefs = TravelPreferences::default();
        prefs.apply(&PreferenceDelta {
            preferred_airlines: vec!["Emirates".to_string()],
            ..Default::default()
        });
        prefs.apply(&PreferenceDelta {
            preferred_airlines: vec!["emirates".to_string(), "Qatar Airways".to_string()],
            ..Default::default()
        });
        assert_eq!(prefs.flight.preferred_airlines, vec!["Emirates", "Qatar Airways"]);
    }

    #[test]
    fn test_corrective_clears_max_stops_only() {
        let mut prefs = TravelPreferences::default();
        prefs.apply(&delta_business_emirates());

        let corrective = PreferenceDelta {
            cabin_class: Some(CabinClass::Economy),
            max_stops: ScalarUpdate::Clear,
            ..Default::default()
        };
        prefs.apply(&corrective);

        assert_eq!(prefs.flight.cabin_class, Some(CabinClass::Economy));
        assert_eq!(prefs.flight.max_stops, None);
        // 未提及的字段不受影响
        assert_eq!(prefs.flight.preferred_airlines, vec!["Emirates"]);
        assert_eq!(prefs.home_city.as_deref(), Some("Mumbai"));
    }

    #[test]
    fn test_empty_delta_is_noop() {
        let mut prefs = TravelPreferences::default();
        prefs.apply(&delta_business_emirates());
        let before = prefs.clone();
        prefs.apply(&PreferenceDelta::default());
        assert_eq!(prefs, before);
    }
}
