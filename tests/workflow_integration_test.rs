//! 端到端工作流测试：脚本化 LLM + Mock 商城后端，覆盖路由、交接校验与会话演进。

use std::sync::Arc;

use clerk::config::AppConfig;
use clerk::llm::ScriptedLlmClient;
use clerk::session::{MemorySessionStore, SessionState, SessionStore};
use clerk::tools::MockCommerceBackend;
use clerk::workflow::UserContext;
use clerk::Orchestrator;

fn orchestrator_with(llm: ScriptedLlmClient, store: Arc<MemorySessionStore>) -> Orchestrator {
    let config = AppConfig::default();
    Orchestrator::with_store(
        &config,
        Arc::new(llm),
        Arc::new(MockCommerceBackend::new()),
        store,
    )
}

fn classification(agent: &str) -> String {
    format!(
        r#"{{"agent": "{agent}", "confidence": 0.9, "reason": "scripted", "needs_clarification": false}}"#
    )
}

#[tokio::test]
async fn test_empty_cart_checkout_is_rejected() {
    let store = Arc::new(MemorySessionStore::new(60, 100));
    let llm = ScriptedLlmClient::new("plain reply")
        .on("intent classifier", classification("checkout"))
        .on("checkout specialist", "should never be reached");
    let orchestrator = orchestrator_with(llm, store);

    let result = orchestrator
        .run("s1", "I want to checkout", &[], UserContext::default())
        .await;

    // 空车结账被校验器拦下，本轮以路由器的引导文案收尾
    assert_eq!(result.metadata["final_agent"], "router");
    assert_eq!(result.metadata["iterations"], 1);
    assert!(result.content.contains("browse products"));
}

#[tokio::test]
async fn test_checkout_with_items_reaches_specialist() {
    let store = Arc::new(MemorySessionStore::new(60, 100));
    let mut seeded = SessionState::new("s1");
    seeded.cart_items_count = 2;
    store.replace(seeded).await.unwrap();

    let llm = ScriptedLlmClient::new("plain reply")
        .on("intent classifier", classification("checkout"))
        .on(
            "checkout specialist",
            "Great, let's begin your checkout. Please share your shipping address.",
        );
    let orchestrator = orchestrator_with(llm, store.clone());

    let result = orchestrator
        .run("s1", "let's checkout", &[], UserContext::default())
        .await;

    assert_eq!(result.metadata["final_agent"], "checkout");
    assert_eq!(result.metadata["iterations"], 2);
    assert!(result.content.contains("shipping address"));

    let session = store.get("s1").await.unwrap();
    assert_eq!(session.agent_history.len(), 2);
    assert_eq!(session.agent_history[0].as_str(), "router");
    assert_eq!(session.agent_history[1].as_str(), "checkout");
}

#[tokio::test]
async fn test_discovery_reply_triggers_cart_handoff() {
    let store = Arc::new(MemorySessionStore::new(60, 100));
    let llm = ScriptedLlmClient::new("plain reply")
        .on("intent classifier", classification("product_discovery"))
        .on(
            "product discovery specialist",
            "The Nimbus Mouse is a great fit. I can add it to your cart right away.",
        )
        .on("cart specialist", "I've put the Nimbus Mouse in your cart.");
    let orchestrator = orchestrator_with(llm, store);

    let result = orchestrator
        .run("s1", "which mouse should I get?", &[], UserContext::default())
        .await;

    // 专家回复里的加购措辞触发二次交接；理由带 add 信号，空车也放行
    assert_eq!(result.metadata["final_agent"], "cart");
    assert_eq!(result.metadata["iterations"], 3);
    let history = result.metadata["agent_history"].as_array().unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0], "router");
    assert_eq!(history[1], "product_discovery");
    assert_eq!(history[2], "cart");
}

#[tokio::test]
async fn test_garbage_router_output_falls_back_to_keywords() {
    let store = Arc::new(MemorySessionStore::new(60, 100));
    let mut seeded = SessionState::new("s1");
    seeded.cart_items_count = 1;
    store.replace(seeded).await.unwrap();

    let llm = ScriptedLlmClient::new("plain reply")
        .on(
            "intent classifier",
            "hmm the user clearly wants their cart handled",
        )
        .on("cart specialist", "Your cart has one item: Nimbus Mouse.");
    let orchestrator = orchestrator_with(llm, store);

    let result = orchestrator
        .run("s1", "what about my stuff", &[], UserContext::default())
        .await;

    assert_eq!(result.metadata["final_agent"], "cart");
    assert!(result.content.contains("Nimbus Mouse"));
}

#[tokio::test]
async fn test_router_clarification_ends_turn() {
    let store = Arc::new(MemorySessionStore::new(60, 100));
    let llm = ScriptedLlmClient::new("plain reply").on(
        "intent classifier",
        r#"{"agent": "", "needs_clarification": true, "clarification_question": "Are you looking for a product or your cart?"}"#,
    );
    let orchestrator = orchestrator_with(llm, store.clone());

    let result = orchestrator
        .run("s1", "hmm", &[], UserContext::default())
        .await;

    assert_eq!(result.content, "Are you looking for a product or your cart?");
    assert_eq!(result.metadata["iterations"], 1);

    let session = store.get("s1").await.unwrap();
    let clarification = session.clarification_state.unwrap();
    assert_eq!(clarification.original_message, "hmm");
}

#[tokio::test]
async fn test_same_input_same_output() {
    let run = || async {
        let store = Arc::new(MemorySessionStore::new(60, 100));
        let llm = ScriptedLlmClient::new("plain reply")
            .on("intent classifier", classification("product_discovery"))
            .on(
                "product discovery specialist",
                "We carry the Aurora 14 Laptop and the Stratus Monitor.",
            );
        orchestrator_with(llm, store)
            .run("s1", "what laptops do you have?", &[], UserContext::default())
            .await
    };

    let first = run().await;
    let second = run().await;
    assert_eq!(first.content, second.content);
    assert_eq!(first.metadata, second.metadata);
}

#[tokio::test]
async fn test_agent_history_accumulates_across_turns() {
    let store = Arc::new(MemorySessionStore::new(60, 100));
    let llm = ScriptedLlmClient::new("plain reply")
        .on("intent classifier", classification("product_discovery"))
        .on("product discovery specialist", "Here are some options.");
    let orchestrator = orchestrator_with(llm, store.clone());

    orchestrator
        .run("s1", "show laptops", &[], UserContext::default())
        .await;
    orchestrator
        .run("s1", "anything cheaper?", &[], UserContext::default())
        .await;

    let session = store.get("s1").await.unwrap();
    // 每轮 Router + Discovery 各一次，跨轮累计
    assert_eq!(session.agent_history.len(), 4);
    assert_eq!(session.agent_history[0].as_str(), "router");
    assert_eq!(session.agent_history[2].as_str(), "router");
    assert_eq!(session.last_intent.as_deref(), Some("product_discovery"));
}

#[tokio::test]
async fn test_history_pairs_do_not_leak_into_matching() {
    let store = Arc::new(MemorySessionStore::new(60, 100));
    // 规则只看首条 system + 最后一条 user，历史里的旧消息不参与匹配
    let llm = ScriptedLlmClient::new("plain reply")
        .on("intent classifier", classification("product_discovery"))
        .on(
            "product discovery specialist",
            "Still thinking about the monitor?",
        );
    let orchestrator = orchestrator_with(llm, store);

    let history = vec![
        (
            "user".to_string(),
            "tell me about the Stratus Monitor".to_string(),
        ),
        ("assistant".to_string(), "It's a 27-inch display.".to_string()),
    ];
    let result = orchestrator
        .run("s1", "what was that price again?", &history, UserContext::default())
        .await;
    assert_eq!(result.content, "Still thinking about the monitor?");
}
