//! 购物车专家
//!
//! 工具面：view_cart / add_to_cart / remove_from_cart / update_quantity。
//! 快速短路：结账短语（购物车非空时）→ Checkout；浏览短语 → Discovery。
//! 执行后把最新购物车数量放进 metadata，供引擎写回会话状态。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::AgentError;
use crate::llm::LlmClient;
use crate::tools::{
    AddToCartTool, CommerceBackend, RemoveFromCartTool, ToolDescriptor, ToolExecutor,
    ToolRegistry, UpdateQuantityTool, ViewCartTool,
};
use crate::workflow::types::{AgentResponse, TurnContext};

use super::phrases::{contains_any, infer_handoff_from_reply, BROWSE_PHRASES, CHECKOUT_PHRASES};
use super::{assemble_messages, complete_with_tools, AgentKind, QuickHandoff, Specialist};

/// 购物车专家
pub struct CartAgent {
    llm: Arc<dyn LlmClient>,
    backend: Arc<dyn CommerceBackend>,
    tool_timeout_secs: u64,
    max_tool_rounds: u32,
}

impl CartAgent {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        backend: Arc<dyn CommerceBackend>,
        tool_timeout_secs: u64,
        max_tool_rounds: u32,
    ) -> Self {
        Self {
            llm,
            backend,
            tool_timeout_secs,
            max_tool_rounds,
        }
    }

    fn registry(&self, session_id: &str) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(ViewCartTool::new(self.backend.clone(), session_id));
        registry.register(AddToCartTool::new(self.backend.clone(), session_id));
        registry.register(RemoveFromCartTool::new(self.backend.clone(), session_id));
        registry.register(UpdateQuantityTool::new(self.backend.clone(), session_id));
        registry
    }

    async fn respond(&self, ctx: &TurnContext) -> Result<AgentResponse, AgentError> {
        let executor = ToolExecutor::new(self.registry(&ctx.session_id), self.tool_timeout_secs);
        let messages = assemble_messages(self.build_prompt(ctx), ctx);
        let text = complete_with_tools(&self.llm, &executor, messages, self.max_tool_rounds).await?;

        let mut response = AgentResponse::text(text);
        if let Some((target, phrase)) = infer_handoff_from_reply(&response.content) {
            if target != self.kind() {
                response = response.with_handoff(target, format!("reply mentioned \"{phrase}\""));
            }
        }
        // 工具可能改了购物车，把最新数量带回给引擎合并进会话状态
        let count = self.backend.cart_items_count(&ctx.session_id).await;
        Ok(response.with_meta("cart_items_count", Value::from(count)))
    }
}

#[async_trait]
impl Specialist for CartAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Cart
    }

    fn build_prompt(&self, ctx: &TurnContext) -> String {
        format!(
            "You are the cart specialist of a shopping assistant. \
             Show the cart, add or remove products, and adjust quantities.\n\
             The cart currently has {} item(s).\n\
             Call a tool by responding with ONLY a JSON object \
             {{\"tool\": \"...\", \"args\": {{...}}}}; otherwise answer in plain text.\n\
             Available tools:\n{}",
            ctx.session.cart_items_count,
            self.registry(&ctx.session_id).to_schema_json()
        )
    }

    fn tool_set(&self) -> Vec<ToolDescriptor> {
        self.registry("").descriptors()
    }

    fn quick_handoff_check(&self, message: &str, ctx: &TurnContext) -> Option<QuickHandoff> {
        if contains_any(message, CHECKOUT_PHRASES).is_some() && ctx.session.cart_items_count > 0 {
            return Some(QuickHandoff {
                agent: AgentKind::Checkout,
                reason: "user asked to check out",
            });
        }
        if contains_any(message, BROWSE_PHRASES).is_some() {
            return Some(QuickHandoff {
                agent: AgentKind::Discovery,
                // 逆向交接：理由须带白名单短语才能过校验
                reason: "user wants to browse more products",
            });
        }
        None
    }

    async fn generate(&self, ctx: &TurnContext) -> AgentResponse {
        if let Some(quick) = self.quick_handoff_check(&ctx.user_message, ctx) {
            tracing::debug!("Cart quick handoff to {}", quick.agent.as_str());
            return AgentResponse::quick_handoff(quick.agent, quick.reason);
        }
        match self.respond(ctx).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Cart specialist degraded to apology: {}", e);
                AgentResponse::apology(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use crate::session::SessionState;
    use crate::tools::MockCommerceBackend;
    use crate::workflow::types::UserContext;

    fn agent() -> CartAgent {
        CartAgent::new(
            Arc::new(MockLlmClient),
            Arc::new(MockCommerceBackend::new()),
            5,
            4,
        )
    }

    fn ctx(cart_count: u32) -> TurnContext {
        let mut session = SessionState::new("s1");
        session.cart_items_count = cart_count;
        TurnContext {
            session_id: "s1".to_string(),
            user_message: String::new(),
            history: Vec::new(),
            session,
            user_context: UserContext::default(),
        }
    }

    #[test]
    fn test_quick_checkout_gated_on_cart() {
        let agent = agent();
        assert!(agent
            .quick_handoff_check("proceed to checkout", &ctx(0))
            .is_none());
        let quick = agent
            .quick_handoff_check("proceed to checkout", &ctx(1))
            .unwrap();
        assert_eq!(quick.agent, AgentKind::Checkout);
    }

    #[test]
    fn test_quick_browse_back_to_discovery() {
        let quick = agent()
            .quick_handoff_check("let me keep shopping", &ctx(1))
            .unwrap();
        assert_eq!(quick.agent, AgentKind::Discovery);
    }

    #[test]
    fn test_tool_set_names() {
        let mut names: Vec<String> = agent().tool_set().into_iter().map(|d| d.name).collect();
        names.sort();
        assert_eq!(
            names,
            vec!["add_to_cart", "remove_from_cart", "update_quantity", "view_cart"]
        );
    }
}
