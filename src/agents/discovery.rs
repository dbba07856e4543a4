//! 导购专家（Product-Discovery）
//!
//! 工具面：search_products / check_compatibility / get_price。
//! 快速短路：购买/结账短语（购物车非空时）→ Checkout；查看购物车短语 → Cart。

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::AgentError;
use crate::llm::LlmClient;
use crate::tools::{
    CheckCompatibilityTool, CommerceBackend, GetPriceTool, SearchProductsTool, ToolDescriptor,
    ToolExecutor, ToolRegistry,
};
use crate::workflow::types::{AgentResponse, TurnContext};

use super::phrases::{contains_any, infer_handoff_from_reply, CHECKOUT_PHRASES, VIEW_CART_PHRASES};
use super::{assemble_messages, complete_with_tools, AgentKind, QuickHandoff, Specialist};

/// 导购专家
pub struct DiscoveryAgent {
    llm: Arc<dyn LlmClient>,
    backend: Arc<dyn CommerceBackend>,
    tool_timeout_secs: u64,
    max_tool_rounds: u32,
}

impl DiscoveryAgent {
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

    fn registry(&self) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(SearchProductsTool::new(self.backend.clone()));
        registry.register(CheckCompatibilityTool::new(self.backend.clone()));
        registry.register(GetPriceTool::new(self.backend.clone()));
        registry
    }

    async fn respond(&self, ctx: &TurnContext) -> Result<AgentResponse, AgentError> {
        let executor = ToolExecutor::new(self.registry(), self.tool_timeout_secs);
        let messages = assemble_messages(self.build_prompt(ctx), ctx);
        let text = complete_with_tools(&self.llm, &executor, messages, self.max_tool_rounds).await?;

        let mut response = AgentResponse::text(text);
        if let Some((target, phrase)) = infer_handoff_from_reply(&response.content) {
            if target != self.kind() {
                response = response.with_handoff(target, format!("reply mentioned \"{phrase}\""));
            }
        }
        Ok(response)
    }
}

#[async_trait]
impl Specialist for DiscoveryAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Discovery
    }

    fn build_prompt(&self, ctx: &TurnContext) -> String {
        let viewing = match (&ctx.user_context.product_id, &ctx.user_context.category) {
            (Some(p), _) => format!("currently viewing product {p}"),
            (None, Some(c)) => format!("currently browsing the {c} category"),
            _ => format!(
                "currently on the {} page",
                ctx.user_context.page.as_deref().unwrap_or("home")
            ),
        };
        format!(
            "You are the product discovery specialist of a shopping assistant. \
             Help the user find products, compare options, check prices and compatibility.\n\
             The user is {viewing}. Their cart has {} item(s).\n\
             Call a tool by responding with ONLY a JSON object \
             {{\"tool\": \"...\", \"args\": {{...}}}}; otherwise answer in plain text.\n\
             Available tools:\n{}",
            ctx.session.cart_items_count,
            self.registry().to_schema_json()
        )
    }

    fn tool_set(&self) -> Vec<ToolDescriptor> {
        self.registry().descriptors()
    }

    fn quick_handoff_check(&self, message: &str, ctx: &TurnContext) -> Option<QuickHandoff> {
        if contains_any(message, CHECKOUT_PHRASES).is_some() && ctx.session.cart_items_count > 0 {
            return Some(QuickHandoff {
                agent: AgentKind::Checkout,
                reason: "user asked to check out",
            });
        }
        if contains_any(message, VIEW_CART_PHRASES).is_some() {
            return Some(QuickHandoff {
                agent: AgentKind::Cart,
                reason: "user asked to view the cart",
            });
        }
        None
    }

    async fn generate(&self, ctx: &TurnContext) -> AgentResponse {
        if let Some(quick) = self.quick_handoff_check(&ctx.user_message, ctx) {
            tracing::debug!("Discovery quick handoff to {}", quick.agent.as_str());
            return AgentResponse::quick_handoff(quick.agent, quick.reason);
        }
        match self.respond(ctx).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Discovery specialist degraded to apology: {}", e);
                AgentResponse::apology(e)
            }
        }
    }
}
