//! 会话状态数据模型
//!
//! 跨轮持久的每会话状态：当前专家、专家执行历史（只追加）、最近一次交接上下文、
//! 购物车数量、结账进度与待澄清问题。首轮访问时创建默认值，TTL 过期或显式 clear 时消失。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::agents::AgentKind;

/// 最近一次被接受的交接（from/to/reason），随会话持久
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffContext {
    pub from_agent: AgentKind,
    pub to_agent: AgentKind,
    pub reason: String,
}

/// 结账子流程进度：initiate → collect address → select shipping（建单）→ 可选 payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStage {
    Initiated,
    AddressCollected,
    ShippingSelected,
    PaymentProcessed,
}

/// 结账状态：当前阶段与（select_shipping 后产生的）订单号
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutState {
    pub stage: CheckoutStage,
    #[serde(default)]
    pub order_id: Option<String>,
}

/// 路由器提出的澄清问题，等待用户下一轮回答
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClarificationState {
    pub question: String,
    pub original_message: String,
}

/// 每会话持久状态
///
/// extra 通过 serde flatten 吸收未建模的键，使 get_key / set_key 对任意键名可用。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: String,
    #[serde(default)]
    pub current_agent: Option<AgentKind>,
    /// 只追加：每次专家执行后追加其名字，clear 之外不缩短
    #[serde(default)]
    pub agent_history: Vec<AgentKind>,
    #[serde(default)]
    pub handoff_context: Option<HandoffContext>,
    #[serde(default)]
    pub cart_items_count: u32,
    #[serde(default)]
    pub checkout_state: Option<CheckoutState>,
    #[serde(default)]
    pub clarification_state: Option<ClarificationState>,
    #[serde(default)]
    pub last_intent: Option<String>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SessionState {
    /// 会话首轮的默认状态（缺失会话返回它而非报错）
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            current_agent: None,
            agent_history: Vec::new(),
            handoff_context: None,
            cart_items_count: 0,
            checkout_state: None,
            clarification_state: None,
            last_intent: None,
            updated_at: Utc::now(),
            extra: Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extra_keys_roundtrip() {
        let mut state = SessionState::new("s1");
        state
            .extra
            .insert("viewed_product".to_string(), Value::from("p-9"));

        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["viewed_product"], "p-9");

        let back: SessionState = serde_json::from_value(value).unwrap();
        assert_eq!(back.extra["viewed_product"], "p-9");
    }

    #[test]
    fn test_default_state_is_empty() {
        let state = SessionState::new("s1");
        assert_eq!(state.cart_items_count, 0);
        assert!(state.agent_history.is_empty());
        assert!(state.checkout_state.is_none());
    }
}
