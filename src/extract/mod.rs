//! 偏好抽取器：从单条消息抽取偏好增量
//!
//! 纯函数、确定性、无副作用：只读当前偏好用于抑制重复识别（如预算未变则不再输出），
//! 绝不修改输入。内部按固定模式族匹配：货币/金额 → 预算；舱位词 → 舱位；航司名 →
//! 偏好航司追加；direct/nonstop → max_stops=0；星级/连锁名 → 酒店偏好；饮食词 →
//! 饮食限制。没有任何模式命中时返回空增量，不是错误。

use once_cell::sync::Lazy;
use regex::Regex;

use crate::session::preferences::{
    Budget, CabinClass, DepartureWindow, PreferenceDelta, ScalarUpdate, SeatPreference,
    TravelPreferences, TravelStyle,
};

/// 货币符号金额，如 $900、€1,200、₹50,000
static SYMBOL_AMOUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([$€£₹¥])\s*([0-9][0-9,]*(?:\.[0-9]+)?)").expect("symbol amount pattern")
});

/// 带币种词的金额，如 900 dollars、1200 usd
static WORD_AMOUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b([0-9][0-9,]*(?:\.[0-9]+)?)\s*(usd|eur|gbp|inr|cny|dollars?|euros?|pounds?|rupees?|yuan|rmb)\b")
        .expect("word amount pattern")
});

/// 家乡城市，如 I'm from Mumbai / based in Berlin（捕获到连接词、标点或句尾为止）
static HOME_CITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:i'?m from|i am from|based in|i live in)\s+([a-zA-Z][a-zA-Z\- ]{1,40}?)(?:\s+(?:and|but)\b|[,.!?;]|$)")
        .expect("home city pattern")
});

/// 最多一次中转，如 one stop / 1 stop at most
static ONE_STOP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:one|1)\s+stop\b").expect("one stop pattern"));

/// 直飞，如 direct / nonstop / non-stop
static DIRECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:direct|non-?stop)\b").expect("direct pattern"));

/// 放宽中转限制，如 any number of stops / stops are fine
static RELAX_STOPS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)any number of stops|stops (?:are|is) (?:fine|ok(?:ay)?)|don'?t mind (?:the )?stops|stops don'?t matter")
        .expect("relax stops pattern")
});

/// 酒店星级，如 4 star / 5-star
static STAR_RATING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b([1-5])[\s-]?stars?\b").expect("star rating pattern"));

/// 抽取器识别的航司名（小写形式 -> 规范写法）
const AIRLINES: &[(&str, &str)] = &[
    ("emirates", "Emirates"),
    ("qatar airways", "Qatar Airways"),
    ("etihad", "Etihad"),
    ("singapore airlines", "Singapore Airlines"),
    ("cathay pacific", "Cathay Pacific"),
    ("lufthansa", "Lufthansa"),
    ("air france", "Air France"),
    ("klm", "KLM"),
    ("british airways", "British Airways"),
    ("turkish airlines", "Turkish Airlines"),
    ("delta", "Delta"),
    ("united", "United"),
    ("american airlines", "American Airlines"),
    ("air india", "Air India"),
    ("indigo", "IndiGo"),
    ("vistara", "Vistara"),
    ("ana", "ANA"),
    ("japan airlines", "Japan Airlines"),
    ("qantas", "Qantas"),
    ("ryanair", "Ryanair"),
    ("easyjet", "EasyJet"),
];

/// 酒店连锁名
const HOTEL_CHAINS: &[(&str, &str)] = &[
    ("hilton", "Hilton"),
    ("marriott", "Marriott"),
    ("hyatt", "Hyatt"),
    ("intercontinental", "InterContinental"),
    ("holiday inn", "Holiday Inn"),
    ("sheraton", "Sheraton"),
    ("westin", "Westin"),
    ("radisson", "Radisson"),
    ("accor", "Accor"),
    ("four seasons", "Four Seasons"),
    ("ritz-carlton", "Ritz-Carlton"),
    ("taj", "Taj"),
];

/// 酒店设施关键词
const AMENITIES: &[&str] = &[
    "pool", "spa", "gym", "wifi", "breakfast", "parking", "airport shuttle", "bar",
];

/// 饮食限制关键词
const DIETARY: &[(&str, &str)] = &[
    ("vegetarian", "vegetarian"),
    ("vegan", "vegan"),
    ("halal", "halal"),
    ("kosher", "kosher"),
    ("gluten-free", "gluten-free"),
    ("gluten free", "gluten-free"),
    ("dairy-free", "dairy-free"),
    ("nut allergy", "nut allergy"),
];

/// 兴趣关键词
const INTERESTS: &[(&str, &str)] = &[
    ("museum", "museums"),
    ("museums", "museums"),
    ("hiking", "hiking"),
    ("beach", "beaches"),
    ("beaches", "beaches"),
    ("nightlife", "nightlife"),
    ("history", "history"),
    ("shopping", "shopping"),
    ("temple", "temples"),
    ("temples", "temples"),
    ("art", "art"),
    ("architecture", "architecture"),
    ("wildlife", "wildlife"),
    ("diving", "diving"),
    ("skiing", "skiing"),
    ("street food", "street food"),
    ("local food", "food"),
    ("foodie", "food"),
];

/// 词边界感知的短语匹配：needle 两侧不能紧邻字母或数字，
/// 避免 "art" 命中 "departing"、"pool" 命中 "liverpool" 这类子串误报
fn phrase_match(haystack: &str, needle: &str) -> bool {
    let mut start = 0;
    while let Some(pos) = haystack[start..].find(needle) {
        let abs = start + pos;
        let before_ok = abs == 0
            || !haystack[..abs]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric());
        let after = abs + needle.len();
        let after_ok = after >= haystack.len()
            || !haystack[after..]
                .chars()
                .next()
                .is_some_and(|c| c.is_alphanumeric());
        if before_ok && after_ok {
            return true;
        }
        start = abs + needle.len();
    }
    false
}

fn currency_from_symbol(symbol: &str) -> &'static str {
    match symbol {
        "$" => "USD",
        "€" => "EUR",
        "£" => "GBP",
        "₹" => "INR",
        "¥" => "CNY",
        _ => "USD",
    }
}

fn currency_from_word(word: &str) -> &'static str {
    match word.to_lowercase().as_str() {
        "eur" | "euro" | "euros" => "EUR",
        "gbp" | "pound" | "pounds" => "GBP",
        "inr" | "rupee" | "rupees" => "INR",
        "cny" | "yuan" | "rmb" => "CNY",
        _ => "USD",
    }
}

fn parse_amount(raw: &str) -> Option<f64> {
    raw.replace(',', "").parse::<f64>().ok()
}

/// 每个词首字母大写（家乡城市规范化）
fn title_case(raw: &str) -> String {
    raw.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn extract_budget(message: &str, lower: &str) -> Option<Budget> {
    if let Some(caps) = SYMBOL_AMOUNT.captures(message) {
        let amount = parse_amount(&caps[2])?;
        return Some(Budget {
            amount,
            currency: currency_from_symbol(&caps[1]).to_string(),
        });
    }
    if let Some(caps) = WORD_AMOUNT.captures(lower) {
        let amount = parse_amount(&caps[1])?;
        return Some(Budget {
            amount,
            currency: currency_from_word(&caps[2]).to_string(),
        });
    }
    None
}

fn extract_cabin(lower: &str) -> Option<CabinClass> {
    if phrase_match(lower, "premium economy") {
        Some(CabinClass::PremiumEconomy)
    } else if phrase_match(lower, "business class") || phrase_match(lower, "business cabin") {
        Some(CabinClass::Business)
    } else if phrase_match(lower, "first class") {
        Some(CabinClass::First)
    } else if phrase_match(lower, "economy") {
        Some(CabinClass::Economy)
    } else {
        None
    }
}

fn extract_departure_window(lower: &str) -> Option<DepartureWindow> {
    if phrase_match(lower, "red-eye")
        || phrase_match(lower, "red eye")
        || phrase_match(lower, "overnight flight")
    {
        Some(DepartureWindow::RedEye)
    } else if phrase_match(lower, "morning flight") || phrase_match(lower, "morning departure") {
        Some(DepartureWindow::Morning)
    } else if phrase_match(lower, "afternoon flight") || phrase_match(lower, "afternoon departure")
    {
        Some(DepartureWindow::Afternoon)
    } else if phrase_match(lower, "evening flight") || phrase_match(lower, "evening departure") {
        Some(DepartureWindow::Evening)
    } else {
        None
    }
}

fn extract_style(lower: &str) -> Option<TravelStyle> {
    if phrase_match(lower, "luxury") {
        Some(TravelStyle::Luxury)
    } else if phrase_match(lower, "backpacking")
        || phrase_match(lower, "backpacker")
        || phrase_match(lower, "on a budget")
        || phrase_match(lower, "budget trip")
    {
        Some(TravelStyle::Budget)
    } else if phrase_match(lower, "family trip")
        || phrase_match(lower, "with kids")
        || phrase_match(lower, "family vacation")
    {
        Some(TravelStyle::Family)
    } else if phrase_match(lower, "business trip") {
        Some(TravelStyle::Business)
    } else {
        None
    }
}

/// 主入口：消息 + 当前偏好 -> 偏好增量
pub fn extract(message: &str, current: &TravelPreferences) -> PreferenceDelta {
    let lower = message.to_lowercase();
    let mut delta = PreferenceDelta::default();

    // 预算：带 per night 语境归酒店每晚预算，否则归总预算；与已存值相同时抑制
    if let Some(budget) = extract_budget(message, &lower) {
        let per_night = phrase_match(&lower, "per night")
            || phrase_match(&lower, "a night")
            || phrase_match(&lower, "nightly");
        if per_night {
            if current.hotel.nightly_budget.as_ref() != Some(&budget) {
                delta.hotel_nightly_budget = Some(budget);
            }
        } else if current.budget.as_ref() != Some(&budget) {
            delta.budget = Some(budget);
        }
    }

    delta.cabin_class = extract_cabin(&lower);

    // 中转限制：放宽模式优先于 direct/one-stop
    if RELAX_STOPS.is_match(&lower) {
        delta.max_stops = ScalarUpdate::Clear;
    } else if DIRECT.is_match(&lower) {
        delta.max_stops = ScalarUpdate::Set(0);
    } else if ONE_STOP.is_match(&lower) {
        delta.max_stops = ScalarUpdate::Set(1);
    }

    // 航司：avoid/not/no 语境归避开列表；已记录的不再输出
    for (needle, canonical) in AIRLINES {
        if !phrase_match(&lower, needle) {
            continue;
        }
        let avoid = phrase_match(&lower, &format!("avoid {}", needle))
            || phrase_match(&lower, &format!("not {}", needle))
            || phrase_match(&lower, &format!("no {}", needle));
        let (known_list, delta_list) = if avoid {
            (&current.flight.avoided_airlines, &mut delta.avoided_airlines)
        } else {
            (&current.flight.preferred_airlines, &mut delta.preferred_airlines)
        };
        let known = known_list.iter().any(|a| a.eq_ignore_ascii_case(canonical));
        if !known && !delta_list.iter().any(|a| a == canonical) {
            delta_list.push((*canonical).to_string());
        }
    }

    if let Some(window) = extract_departure_window(&lower) {
        delta.departure_window = Some(window);
    }
    if phrase_match(&lower, "window seat") {
        delta.seat = Some(SeatPreference::Window);
    } else if phrase_match(&lower, "aisle seat") {
        delta.seat = Some(SeatPreference::Aisle);
    }

    // 酒店：星级、连锁、设施
    if let Some(caps) = STAR_RATING.captures(&lower) {
        delta.hotel_min_stars = caps[1].parse::<u8>().ok();
    }
    for (needle, canonical) in HOTEL_CHAINS {
        if phrase_match(&lower, needle) {
            delta.hotel_chain = Some((*canonical).to_string());
            break;
        }
    }
    for amenity in AMENITIES {
        if phrase_match(&lower, amenity)
            && !current
                .hotel
                .amenities
                .iter()
                .any(|a| a.eq_ignore_ascii_case(amenity))
        {
            delta.hotel_amenities.push((*amenity).to_string());
        }
    }

    // 饮食限制；同词可兼作机上餐食偏好（vegetarian meal）
    for (needle, canonical) in DIETARY {
        if phrase_match(&lower, needle)
            && !delta.dietary_restrictions.iter().any(|d| d == canonical)
        {
            delta.dietary_restrictions.push((*canonical).to_string());
        }
    }
    if let Some((_, meal)) = DIETARY
        .iter()
        .find(|(needle, _)| phrase_match(&lower, &format!("{} meal", needle)))
    {
        delta.meal = Some((*meal).to_string());
    }

    for (needle, canonical) in INTERESTS {
        if phrase_match(&lower, needle) && !delta.interests.iter().any(|i| i == canonical) {
            delta.interests.push((*canonical).to_string());
        }
    }

    delta.travel_style = extract_style(&lower);

    if let Some(caps) = HOME_CITY.captures(message) {
        delta.home_city = Some(title_case(caps[1].trim()));
    }

    delta
}
