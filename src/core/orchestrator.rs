//! 编排器：对外的单轮入口
//!
//! 持有专家表、引擎与会话存储，把调用方的 (session_id, message, history, user_context)
//! 变成一轮工作流执行。会话存储失败在这里降级为道歉回复，不向调用方抛错。

use std::sync::Arc;

use crate::agents::specialist_table;
use crate::config::AppConfig;
use crate::llm::{create_deepseek_client, LlmClient, MockLlmClient, OpenAiClient};
use crate::memory::ConversationWindow;
use crate::session::{MemorySessionStore, SessionState, SessionStore};
use crate::tools::CommerceBackend;
use crate::workflow::{HandoffValidator, TurnContext, TurnResult, UserContext, WorkflowEngine};

/// 按配置与环境变量选择 LLM 后端：
/// DEEPSEEK_API_KEY 或 provider=deepseek → DeepSeek；OPENAI_API_KEY → OpenAI；都没有 → Mock
pub fn create_llm_from_config(config: &AppConfig) -> Arc<dyn LlmClient> {
    let has_deepseek = std::env::var("DEEPSEEK_API_KEY").is_ok();
    let has_openai = std::env::var("OPENAI_API_KEY").is_ok();

    if has_deepseek || config.llm.provider == "deepseek" {
        tracing::info!("Using DeepSeek backend (model: {})", config.llm.model);
        return Arc::new(create_deepseek_client(Some(&config.llm.model)));
    }
    if has_openai {
        tracing::info!("Using OpenAI backend (model: {})", config.llm.model);
        return Arc::new(OpenAiClient::new(
            config.llm.base_url.as_deref(),
            &config.llm.model,
            None,
        ));
    }
    tracing::warn!("No API key found, falling back to the mock LLM client");
    Arc::new(MockLlmClient)
}

/// 编排器
pub struct Orchestrator {
    engine: WorkflowEngine,
    store: Arc<dyn SessionStore>,
    max_history_turns: usize,
}

impl Orchestrator {
    /// 按配置自动选 LLM 后端并组装整条链路
    pub fn from_config(config: &AppConfig, backend: Arc<dyn CommerceBackend>) -> Self {
        let llm = create_llm_from_config(config);
        Self::new(config, llm, backend)
    }

    /// 用已有的 LLM / 后端组装整条链路；存储由这里创建并共享给引擎
    pub fn new(
        config: &AppConfig,
        llm: Arc<dyn LlmClient>,
        backend: Arc<dyn CommerceBackend>,
    ) -> Self {
        let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new(
            config.session.ttl_secs,
            config.session.max_sessions,
        ));
        Self::with_store(config, llm, backend, store)
    }

    /// 注入自定义存储（测试、或未来换 Redis 等实现）
    pub fn with_store(
        config: &AppConfig,
        llm: Arc<dyn LlmClient>,
        backend: Arc<dyn CommerceBackend>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        let specialists = specialist_table(
            llm,
            backend,
            config.tools.tool_timeout_secs,
            config.workflow.max_tool_rounds,
        );
        let engine = WorkflowEngine::new(
            specialists,
            HandoffValidator::new(),
            store.clone(),
            config.workflow.max_iterations,
        );
        Self {
            engine,
            store,
            max_history_turns: config.app.max_history_turns,
        }
    }

    /// 处理一轮用户输入。history 为调用方维护的 (role, content) 对，超窗自动剪枝。
    pub async fn run(
        &self,
        session_id: &str,
        user_message: &str,
        history: &[(String, String)],
        user_context: UserContext,
    ) -> TurnResult {
        // 轮初快照：读不到就从空状态起步，读失败降级为道歉
        let session = match self.store.get(session_id).await {
            Ok(state) => state,
            Err(e) => {
                tracing::error!("Session store unavailable for {}: {}", session_id, e);
                return apologetic_result(&e);
            }
        };

        let window = ConversationWindow::from_pairs(history, self.max_history_turns);
        let ctx = TurnContext {
            session_id: session_id.to_string(),
            user_message: user_message.to_string(),
            history: window.messages().to_vec(),
            session,
            user_context,
        };

        match self.engine.run_turn(&ctx).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("Turn failed for session {}: {}", session_id, e);
                apologetic_result(&e)
            }
        }
    }

    /// 查看某会话当前状态（只读，调试 / 演示用）
    pub async fn session_state(&self, session_id: &str) -> Option<SessionState> {
        self.store.get(session_id).await.ok()
    }

    /// 当前活跃会话数
    pub async fn active_sessions(&self) -> usize {
        self.store.active_count().await
    }
}

fn apologetic_result(error: &impl std::fmt::Display) -> TurnResult {
    let mut metadata = serde_json::Map::new();
    metadata.insert(
        "error".to_string(),
        serde_json::Value::String(error.to_string()),
    );
    TurnResult {
        content: "I'm sorry, I ran into a problem handling that request. Please try again."
            .to_string(),
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::MockCommerceBackend;

    #[tokio::test]
    async fn test_run_with_mock_stack() {
        let config = AppConfig::default();
        let llm = Arc::new(MockLlmClient);
        let backend = Arc::new(MockCommerceBackend::new());
        let orchestrator = Orchestrator::new(&config, llm, backend);

        let result = orchestrator
            .run("s1", "show me laptops", &[], UserContext::default())
            .await;
        assert!(!result.content.is_empty());
        // Mock 分类器固定路由到 product_discovery
        assert_eq!(result.metadata["final_agent"], "product_discovery");
        assert_eq!(orchestrator.active_sessions().await, 1);
    }

    #[tokio::test]
    async fn test_session_state_after_turn() {
        let config = AppConfig::default();
        let orchestrator = Orchestrator::new(
            &config,
            Arc::new(MockLlmClient),
            Arc::new(MockCommerceBackend::new()),
        );
        orchestrator
            .run("s2", "show me laptops", &[], UserContext::default())
            .await;
        let state = orchestrator.session_state("s2").await.unwrap();
        assert!(!state.agent_history.is_empty());
        assert_eq!(state.agent_history[0], crate::agents::AgentKind::Router);
    }
}
