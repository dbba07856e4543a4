//! Clerk - Rust 多智能体导购对话编排
//!
//! 入口：初始化日志与配置，装上 Mock 商城后端，跑一个 stdin 对话循环。
//! 没有 API Key 时自动退到 Mock LLM，可离线体验整条路由链路。

use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use clerk::config::load_config;
use clerk::tools::MockCommerceBackend;
use clerk::workflow::UserContext;
use clerk::{create_llm_from_config, observability, Orchestrator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let config = load_config(None).context("Failed to load configuration")?;
    let llm = create_llm_from_config(&config);
    let backend = Arc::new(MockCommerceBackend::new());
    let orchestrator = Orchestrator::new(&config, llm, backend);

    let session_id = uuid::Uuid::new_v4().to_string();
    let mut history: Vec<(String, String)> = Vec::new();

    println!("Clerk shopping assistant. Type a message, or 'quit' to exit.");
    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if message.eq_ignore_ascii_case("quit") || message.eq_ignore_ascii_case("exit") {
            break;
        }

        let result = orchestrator
            .run(&session_id, message, &history, UserContext::default())
            .await;
        println!("{}", result.content);
        if let Some(agent) = result.metadata.get("final_agent").and_then(|v| v.as_str()) {
            tracing::debug!(
                "final_agent={} iterations={}",
                agent,
                result.metadata.get("iterations").cloned().unwrap_or_default()
            );
        }

        history.push(("user".to_string(), message.to_string()));
        history.push(("assistant".to_string(), result.content));
    }

    Ok(())
}
