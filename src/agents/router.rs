//! 路由器：意图分类与首跳分发
//!
//! 没有工具、从不直接回答：要么交接给一个专家，要么提澄清问题结束本轮。
//! 模型输出经三级解析管道（整体 JSON → 配对片段 → 关键词兜底）吸收一切格式劣化，
//! 分类畸形从不以错误形式向上冒泡。

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::core::AgentError;
use crate::llm::LlmClient;
use crate::memory::Message;
use crate::tools::ToolDescriptor;
use crate::workflow::types::{AgentResponse, TurnContext};

use super::{
    assemble_messages, extract_balanced_object, strip_code_fence, AgentKind, QuickHandoff,
    Specialist,
};

const DEFAULT_CLARIFICATION: &str =
    "Could you tell me a bit more about what you're looking for?";

/// 路由器对用户不可见时的兜底文案（交接被拒时它会成为最终回复）
const STEERING_LINE: &str =
    "I can help you browse products, manage your cart, or check out. What would you like to do?";

/// 模型输出的结构化分类
#[derive(Debug, Clone, Deserialize)]
pub struct Classification {
    #[serde(default)]
    pub agent: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub needs_clarification: bool,
    #[serde(default)]
    pub clarification_question: Option<String>,
}

fn default_confidence() -> f64 {
    0.5
}

impl Classification {
    /// LLM 调用本身失败时的固定兜底
    fn router_error() -> Self {
        Self {
            agent: "product_discovery".to_string(),
            confidence: 0.35,
            reason: "router error".to_string(),
            needs_clarification: false,
            clarification_question: None,
        }
    }
}

/// 第 1 级：整体按 JSON 解码
fn parse_direct(raw: &str) -> Option<Classification> {
    let cleaned = strip_code_fence(raw);
    let c: Classification = serde_json::from_str(cleaned).ok()?;
    if c.agent.is_empty() && !c.needs_clarification {
        return None;
    }
    Some(c)
}

/// 第 2 级：提取第一个括号配对完整的对象片段再解码
fn parse_fragment(raw: &str) -> Option<Classification> {
    let fragment = extract_balanced_object(strip_code_fence(raw))?;
    let c: Classification = serde_json::from_str(fragment).ok()?;
    if c.agent.is_empty() && !c.needs_clarification {
        return None;
    }
    Some(c)
}

/// 第 3 级：对原始文本做关键词启发，总能给出结果
fn parse_keywords(raw: &str) -> Option<Classification> {
    let lower = raw.to_lowercase();
    let needs_clarification = lower.contains("unclear") || lower.contains("clarification");
    let agent = if lower.contains("checkout") {
        "checkout"
    } else if lower.contains("cart") {
        "cart"
    } else {
        "product_discovery"
    };
    Some(Classification {
        agent: agent.to_string(),
        confidence: default_confidence(),
        reason: "keyword fallback".to_string(),
        needs_clarification,
        clarification_question: None,
    })
}

/// 解析级列表：有序、各级独立纯函数，首个成功者生效
const PARSER_STAGES: &[(&str, fn(&str) -> Option<Classification>)] = &[
    ("json", parse_direct),
    ("fragment", parse_fragment),
    ("keywords", parse_keywords),
];

/// 对模型原始输出跑三级解析管道
pub fn classify_output(raw: &str) -> Classification {
    for (stage, parse) in PARSER_STAGES {
        if let Some(c) = parse(raw) {
            tracing::debug!("Router classification parsed at stage '{}'", stage);
            return c;
        }
    }
    // keywords 级总是 Some，到不了这里
    Classification::router_error()
}

/// 路由器专家
pub struct RouterAgent {
    llm: Arc<dyn LlmClient>,
}

impl RouterAgent {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    async fn classify(&self, ctx: &TurnContext) -> Result<Classification, AgentError> {
        let messages: Vec<Message> = assemble_messages(self.build_prompt(ctx), ctx);
        let raw = self
            .llm
            .complete(&messages)
            .await
            .map_err(AgentError::LlmError)?;
        Ok(classify_output(&raw))
    }
}

#[async_trait]
impl Specialist for RouterAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Router
    }

    fn build_prompt(&self, ctx: &TurnContext) -> String {
        let checkout_status = ctx
            .session
            .checkout_state
            .as_ref()
            .map(|c| format!("{:?}", c.stage))
            .unwrap_or_else(|| "none".to_string());
        format!(
            "You are an intent classifier for a shopping assistant. \
             Classify the user's message and pick exactly one specialist.\n\
             Specialists:\n\
             - product_discovery: finding products, comparing, prices, compatibility\n\
             - cart: viewing or changing the shopping cart\n\
             - checkout: placing the order, address, shipping, payment\n\
             Session: cart has {} item(s); checkout status: {}.\n\
             Respond with ONLY a JSON object:\n\
             {{\"agent\": \"...\", \"confidence\": 0.0-1.0, \"reason\": \"...\", \
             \"needs_clarification\": false, \"clarification_question\": null}}\n\
             Set needs_clarification to true only when the intent cannot be determined.",
            ctx.session.cart_items_count, checkout_status
        )
    }

    fn tool_set(&self) -> Vec<ToolDescriptor> {
        Vec::new()
    }

    fn quick_handoff_check(&self, _message: &str, _ctx: &TurnContext) -> Option<QuickHandoff> {
        None
    }

    async fn generate(&self, ctx: &TurnContext) -> AgentResponse {
        let classification = match self.classify(ctx).await {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("Router classification failed ({}), defaulting", e);
                Classification::router_error()
            }
        };

        if classification.needs_clarification {
            let question = classification
                .clarification_question
                .filter(|q| !q.is_empty())
                .unwrap_or_else(|| DEFAULT_CLARIFICATION.to_string());
            return AgentResponse::clarification(question)
                .with_meta("confidence", Value::from(classification.confidence));
        }

        // 分类回到 Router 自身没有意义，按默认目标处理
        let agent = AgentKind::parse_loose(&classification.agent)
            .filter(|a| *a != AgentKind::Router)
            .unwrap_or(AgentKind::Discovery);

        let reason = if classification.reason.is_empty() {
            format!("classified intent as {}", agent.as_str())
        } else {
            classification.reason.clone()
        };

        AgentResponse::text(STEERING_LINE)
            .with_handoff(agent, reason)
            .with_meta("intent", Value::from(agent.as_str()))
            .with_meta("confidence", Value::from(classification.confidence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_json_direct() {
        let raw = r#"{"agent": "cart", "confidence": 0.9, "reason": "wants cart"}"#;
        let c = parse_direct(raw).unwrap();
        assert_eq!(c.agent, "cart");
        assert!((c.confidence - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn test_stage_fragment_with_prose() {
        let raw = "Sure, here is my answer: {\"agent\": \"checkout\", \"reason\": \"pay\"} hope that helps";
        assert!(parse_direct(raw).is_none());
        let c = parse_fragment(raw).unwrap();
        assert_eq!(c.agent, "checkout");
    }

    #[test]
    fn test_stage_keywords_garbage() {
        let raw = "uhh the user probably wants the cart thing???";
        let c = parse_keywords(raw).unwrap();
        assert_eq!(c.agent, "cart");
        assert!(!c.needs_clarification);
    }

    #[test]
    fn test_stage_keywords_clarification_trigger() {
        let c = parse_keywords("the intent here is unclear to me").unwrap();
        assert!(c.needs_clarification);
    }

    #[test]
    fn test_pipeline_order_first_success_wins() {
        // 片段可解析但整体不可：应落在 fragment 级而不是 keywords 级
        let raw = "noise {\"agent\": \"product_discovery\"} noise checkout";
        let c = classify_output(raw);
        assert_eq!(c.agent, "product_discovery");
        assert_eq!(c.reason, "");
    }

    #[test]
    fn test_pipeline_total_garbage_falls_through() {
        let c = classify_output("%%% ???");
        assert_eq!(c.agent, "product_discovery");
        assert_eq!(c.reason, "keyword fallback");
    }
}
