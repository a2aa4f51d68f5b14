//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `MARCO__*` 覆盖（双下划线表示嵌套，如 `MARCO__LLM__PROVIDER=openai`）。
//! 所有边界值（历史窗口、迭代上限、超时、重试预算）都在这里显式声明默认值。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub tools: ToolsSection,
}

/// [app] 段：应用名、历史窗口与 Agent 循环上限
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    pub name: Option<String>,
    /// 对话历史保留轮数（供模型上下文使用的短窗口）
    #[serde(default = "default_max_conversation_turns")]
    pub max_conversation_turns: usize,
    /// 搜索历史保留条数（最近 N 条）
    #[serde(default = "default_max_search_history")]
    pub max_search_history: usize,
    /// Agent 模式单轮最大迭代数（到达上限时返回尽力而为的部分回答）
    #[serde(default = "default_max_agent_iterations")]
    pub max_agent_iterations: u32,
}

fn default_max_conversation_turns() -> usize {
    20
}

fn default_max_search_history() -> usize {
    20
}

fn default_max_agent_iterations() -> u32 {
    8
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            max_conversation_turns: default_max_conversation_turns(),
            max_search_history: default_max_search_history(),
            max_agent_iterations: default_max_agent_iterations(),
        }
    }
}

/// [session] 段：会话过期清理
#[derive(Debug, Clone, Deserialize)]
pub struct SessionSection {
    /// 空闲会话的 TTL（秒），由存储层的清理任务使用
    #[serde(default = "default_session_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_session_ttl_secs() -> u64 {
    1800
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            ttl_secs: default_session_ttl_secs(),
        }
    }
}

/// [llm] 段：后端选择、超时与重试
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：deepseek / openai；优先级由 API Key 与 provider 共同决定
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    /// 单次模型调用超时（秒）
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub retry: LlmRetrySection,
}

fn default_provider() -> String {
    "deepseek".to_string()
}

fn default_model() -> String {
    "deepseek-chat".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            request_timeout_secs: default_request_timeout_secs(),
            retry: LlmRetrySection::default(),
        }
    }
}

/// [llm.retry] 段：瞬态失败的有界退避重试
#[derive(Debug, Clone, Deserialize)]
pub struct LlmRetrySection {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// 首次重试前的等待（毫秒），之后按 2^n 退避
    #[serde(default = "default_retry_base_ms")]
    pub base_delay_ms: u64,
}

impl Default for LlmRetrySection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_retry_base_ms(),
        }
    }
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_base_ms() -> u64 {
    250
}

/// [tools] 段：工具超时、并发上限、各 Provider 端点
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    /// 同时在飞的工具调用上限（信号量）
    #[serde(default = "default_max_concurrent_tools")]
    pub max_concurrent_tools: usize,
    #[serde(default)]
    pub providers: ProvidersSection,
}

fn default_tool_timeout_secs() -> u64 {
    15
}

fn default_max_concurrent_tools() -> usize {
    3
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: default_tool_timeout_secs(),
            max_concurrent_tools: default_max_concurrent_tools(),
            providers: ProvidersSection::default(),
        }
    }
}

/// [tools.providers] 段：外部搜索服务端点
///
/// 航班/酒店/景点端点未配置时，对应工具返回结构化的 provider 错误，编排层据此降级回答。
/// 地理编码默认使用 open-meteo 的公开端点。
#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersSection {
    pub flight_base_url: Option<String>,
    pub hotel_base_url: Option<String>,
    pub attraction_base_url: Option<String>,
    #[serde(default = "default_geocode_base_url")]
    pub geocode_base_url: String,
}

impl Default for ProvidersSection {
    fn default() -> Self {
        Self {
            flight_base_url: None,
            hotel_base_url: None,
            attraction_base_url: None,
            geocode_base_url: default_geocode_base_url(),
        }
    }
}

fn default_geocode_base_url() -> String {
    "https://geocoding-api.open-meteo.com/v1/search".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app: AppSection::default(),
            session: SessionSection::default(),
            llm: LlmSection::default(),
            tools: ToolsSection::default(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 MARCO__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 MARCO__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("MARCO")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.app.max_conversation_turns, 20);
        assert_eq!(cfg.app.max_agent_iterations, 8);
        assert_eq!(cfg.llm.retry.max_retries, 2);
        assert!(cfg.tools.providers.flight_base_url.is_none());
        assert!(!cfg.tools.providers.geocode_base_url.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            "[app]\nmax_agent_iterations = 5\n\n[llm]\nprovider = \"openai\"\nmodel = \"gpt-4o-mini\""
        )
        .unwrap();

        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.app.max_agent_iterations, 5);
        assert_eq!(cfg.llm.provider, "openai");
        // 未覆盖的键保持默认
        assert_eq!(cfg.app.max_conversation_turns, 20);
    }
}
