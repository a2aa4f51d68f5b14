//! 可观测性
//!
//! 结构化日志在既定状态迁移点输出（turn_start / classify / agent_step /
//! tool_audit / turn_done），不散落在控制流里。

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub fn init() {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("info".parse().expect("valid directive")))
        .with(fmt::layer())
        .init();
}
