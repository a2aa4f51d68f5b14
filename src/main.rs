//! Marco - Rust 旅行规划智能体
//!
//! 入口：初始化日志与配置，创建编排器，跑一个最小的终端对话循环
//! （每行输入即一轮；/agent 前缀强制 Agent 模式；空行忽略）。

use std::io::Write;

use anyhow::Context;
use marco::config::{load_config, AppConfig};
use marco::core::create_orchestrator;
use marco::TurnRequest;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    marco::observability::init();

    let cfg = load_config(None).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });
    let session_ttl = std::time::Duration::from_secs(cfg.session.ttl_secs);

    let orchestrator = std::sync::Arc::new(create_orchestrator(&cfg));

    // 后台按 TTL 清理空闲会话
    {
        let store = orchestrator.store().clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(session_ttl / 2);
            loop {
                tick.tick().await;
                let evicted = store.evict_idle(session_ttl).await;
                if evicted > 0 {
                    tracing::info!(evicted, "idle sessions evicted");
                }
            }
        });
    }

    let session_id = format!("cli-{}", uuid::Uuid::new_v4());
    println!("Marco travel assistant. Type a message, or 'quit' to exit.");

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush().context("flush stdout")?;

        let mut line = String::new();
        if stdin.read_line(&mut line).context("read stdin")? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" || line == "exit" {
            break;
        }

        let (message, force) = match line.strip_prefix("/agent ") {
            Some(rest) => (rest.to_string(), true),
            None => (line.to_string(), false),
        };

        let mut request = TurnRequest::new(message).with_session(session_id.clone());
        if force {
            request = request.with_force_agent_mode();
        }

        let response = orchestrator.handle_turn(request).await;
        println!("{}", response.text);
        if !response.tools_used.is_empty() {
            println!("[tools: {}]", response.tools_used.join(", "));
        }
        for action in &response.suggested_actions {
            println!("[suggestion: {}]", action);
        }
    }

    Ok(())
}
