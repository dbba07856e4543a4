//! 结账专家
//!
//! 工具面按严格子流程排布：initiate_checkout → collect_address → select_shipping（建单）
//! → 可选 process_payment；顺序由后端强制。
//! 快速短路：购物车修改短语 → Cart；继续选购短语 → Discovery（均为逆向，理由带白名单短语）。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::AgentError;
use crate::llm::LlmClient;
use crate::session::CheckoutStage;
use crate::tools::{
    CollectAddressTool, CommerceBackend, InitiateCheckoutTool, ProcessPaymentTool,
    SelectShippingTool, ToolDescriptor, ToolExecutor, ToolRegistry,
};
use crate::workflow::types::{AgentResponse, TurnContext};

use super::phrases::{contains_any, infer_handoff_from_reply, BROWSE_PHRASES, CART_MODIFY_PHRASES};
use super::{assemble_messages, complete_with_tools, AgentKind, QuickHandoff, Specialist};

/// 结账专家
pub struct CheckoutAgent {
    llm: Arc<dyn LlmClient>,
    backend: Arc<dyn CommerceBackend>,
    tool_timeout_secs: u64,
    max_tool_rounds: u32,
}

impl CheckoutAgent {
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
        registry.register(InitiateCheckoutTool::new(self.backend.clone(), session_id));
        registry.register(CollectAddressTool::new(self.backend.clone(), session_id));
        registry.register(SelectShippingTool::new(self.backend.clone(), session_id));
        registry.register(ProcessPaymentTool::new(self.backend.clone(), session_id));
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
        let count = self.backend.cart_items_count(&ctx.session_id).await;
        response = response.with_meta("cart_items_count", Value::from(count));
        // 工具可能推进了结账阶段，带回给引擎写回会话状态
        if let Some(status) = self.backend.checkout_status(&ctx.session_id).await {
            if let Ok(value) = serde_json::to_value(&status) {
                response = response.with_meta("checkout_state", value);
            }
        }
        Ok(response)
    }

    fn stage_hint(ctx: &TurnContext) -> &'static str {
        match ctx.session.checkout_state.as_ref().map(|c| c.stage) {
            None => "not started: begin with initiate_checkout",
            Some(CheckoutStage::Initiated) => "initiated: collect the shipping address next",
            Some(CheckoutStage::AddressCollected) => {
                "address collected: select a shipping method next (this creates the order)"
            }
            Some(CheckoutStage::ShippingSelected) => {
                "order created: payment is optional, offer process_payment"
            }
            Some(CheckoutStage::PaymentProcessed) => "payment complete: the order is done",
        }
    }

    async fn generate_inner(&self, ctx: &TurnContext) -> AgentResponse {
        match self.respond(ctx).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Checkout specialist degraded to apology: {}", e);
                AgentResponse::apology(e)
            }
        }
    }
}

#[async_trait]
impl Specialist for CheckoutAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Checkout
    }

    fn build_prompt(&self, ctx: &TurnContext) -> String {
        format!(
            "You are the checkout specialist of a shopping assistant. \
             Walk the user through checkout strictly in this order: \
             initiate_checkout, then collect_address, then select_shipping \
             (which creates the order), then optionally process_payment.\n\
             Checkout progress: {}. The cart has {} item(s).\n\
             Call a tool by responding with ONLY a JSON object \
             {{\"tool\": \"...\", \"args\": {{...}}}}; otherwise answer in plain text.\n\
             Available tools:\n{}",
            Self::stage_hint(ctx),
            ctx.session.cart_items_count,
            self.registry(&ctx.session_id).to_schema_json()
        )
    }

    fn tool_set(&self) -> Vec<ToolDescriptor> {
        self.registry("").descriptors()
    }

    fn quick_handoff_check(&self, message: &str, _ctx: &TurnContext) -> Option<QuickHandoff> {
        if contains_any(message, CART_MODIFY_PHRASES).is_some() {
            return Some(QuickHandoff {
                agent: AgentKind::Cart,
                // 逆向交接：理由须带白名单短语才能过校验
                reason: "user wants to change items in the cart",
            });
        }
        if contains_any(message, BROWSE_PHRASES).is_some() {
            return Some(QuickHandoff {
                agent: AgentKind::Discovery,
                reason: "user wants to continue shopping",
            });
        }
        None
    }

    async fn generate(&self, ctx: &TurnContext) -> AgentResponse {
        if let Some(quick) = self.quick_handoff_check(&ctx.user_message, ctx) {
            tracing::debug!("Checkout quick handoff to {}", quick.agent.as_str());
            return AgentResponse::quick_handoff(quick.agent, quick.reason);
        }
        self.generate_inner(ctx).await
    }
}
