//! 交接校验器
//!
//! 纯策略函数：静态邻接表 + 依赖会话状态的门控规则。
//! 拒绝不是错误，引擎将其视为「无进一步交接」并以现有回复终止本轮。

use crate::agents::phrases::{contains_any, ADD_SIGNALS, BACKWARD_JUSTIFICATIONS};
use crate::agents::AgentKind;
use crate::session::SessionState;

use super::types::HandoffRequest;

/// 有向邻接表：source → 允许的 target 集
const ADJACENCY: &[(AgentKind, &[AgentKind])] = &[
    (
        AgentKind::Router,
        &[AgentKind::Discovery, AgentKind::Cart, AgentKind::Checkout],
    ),
    (AgentKind::Discovery, &[AgentKind::Cart, AgentKind::Checkout]),
    (AgentKind::Cart, &[AgentKind::Discovery, AgentKind::Checkout]),
    (AgentKind::Checkout, &[AgentKind::Cart, AgentKind::Discovery]),
];

/// 逻辑流程顺位：Discovery → Cart → Checkout；Router 在流程之外
fn flow_position(agent: AgentKind) -> Option<u8> {
    match agent {
        AgentKind::Router => None,
        AgentKind::Discovery => Some(1),
        AgentKind::Cart => Some(2),
        AgentKind::Checkout => Some(3),
    }
}

/// 拒绝原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandoffRejection {
    /// target 不在 source 的允许集内（或 source 未知）
    NotAdjacent,
    /// 目标 Cart 但购物车为空且理由无加购信号（规则 1）
    EmptyCartForCart,
    /// 目标 Checkout 但购物车为空（规则 2，无例外）
    EmptyCartForCheckout,
    /// 逆向交接且理由不在白名单（规则 3）
    BackwardWithoutJustification,
}

impl std::fmt::Display for HandoffRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HandoffRejection::NotAdjacent => "target not allowed for source agent",
            HandoffRejection::EmptyCartForCart => "cart is empty and reason carries no add signal",
            HandoffRejection::EmptyCartForCheckout => "cannot check out with an empty cart",
            HandoffRejection::BackwardWithoutJustification => {
                "backward transition without a justifying reason"
            }
        };
        f.write_str(s)
    }
}

/// 被接受的交接描述
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovedHandoff {
    pub from_agent: AgentKind,
    pub to_agent: AgentKind,
    pub reason: String,
}

/// 交接校验器（无内部状态，规则全为静态表）
#[derive(Debug, Default, Clone, Copy)]
pub struct HandoffValidator;

impl HandoffValidator {
    pub fn new() -> Self {
        Self
    }

    /// 校验一次交接请求；session 为轮次开始时的快照
    pub fn validate(
        &self,
        request: &HandoffRequest,
        session: &SessionState,
    ) -> Result<ApprovedHandoff, HandoffRejection> {
        let allowed = ADJACENCY
            .iter()
            .find(|(from, _)| *from == request.from_agent)
            .map(|(_, targets)| *targets)
            .unwrap_or(&[]);
        if !allowed.contains(&request.to_agent) {
            return Err(HandoffRejection::NotAdjacent);
        }

        let reason_lower = request.reason.to_lowercase();

        // 规则 1：空车进 Cart 仅当理由带加购信号
        if request.to_agent == AgentKind::Cart
            && session.cart_items_count == 0
            && contains_any(&reason_lower, ADD_SIGNALS).is_none()
        {
            return Err(HandoffRejection::EmptyCartForCart);
        }

        // 规则 2：空车进 Checkout 一律拒绝
        if request.to_agent == AgentKind::Checkout && session.cart_items_count == 0 {
            return Err(HandoffRejection::EmptyCartForCheckout);
        }

        // 规则 3：逆向交接需白名单理由
        if let (Some(from_pos), Some(to_pos)) = (
            flow_position(request.from_agent),
            flow_position(request.to_agent),
        ) {
            if to_pos < from_pos && contains_any(&reason_lower, BACKWARD_JUSTIFICATIONS).is_none() {
                return Err(HandoffRejection::BackwardWithoutJustification);
            }
        }

        Ok(ApprovedHandoff {
            from_agent: request.from_agent,
            to_agent: request.to_agent,
            reason: request.reason.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionState;

    fn request(from: AgentKind, to: AgentKind, reason: &str) -> HandoffRequest {
        HandoffRequest {
            from_agent: from,
            to_agent: to,
            reason: reason.to_string(),
            user_message: None,
        }
    }

    fn session(cart_count: u32) -> SessionState {
        let mut s = SessionState::new("s1");
        s.cart_items_count = cart_count;
        s
    }

    #[test]
    fn test_adjacency_matrix() {
        let v = HandoffValidator::new();
        let s = session(1);

        // Router 可达所有专家
        for to in [AgentKind::Discovery, AgentKind::Cart, AgentKind::Checkout] {
            assert!(v.validate(&request(AgentKind::Router, to, "add x"), &s).is_ok());
        }
        // 没有任何 source 可达 Router
        for from in [AgentKind::Discovery, AgentKind::Cart, AgentKind::Checkout] {
            assert_eq!(
                v.validate(&request(from, AgentKind::Router, "back"), &s),
                Err(HandoffRejection::NotAdjacent)
            );
        }
        // 自交接不在邻接表
        assert_eq!(
            v.validate(&request(AgentKind::Cart, AgentKind::Cart, "loop"), &s),
            Err(HandoffRejection::NotAdjacent)
        );
    }

    #[test]
    fn test_empty_cart_to_cart_needs_add_signal() {
        let v = HandoffValidator::new();
        assert_eq!(
            v.validate(
                &request(AgentKind::Discovery, AgentKind::Cart, "user asked to view the cart"),
                &session(0)
            ),
            Err(HandoffRejection::EmptyCartForCart)
        );
        assert!(v
            .validate(
                &request(AgentKind::Discovery, AgentKind::Cart, "user wants to add this item"),
                &session(0)
            )
            .is_ok());
    }

    #[test]
    fn test_empty_cart_to_checkout_always_rejected() {
        let v = HandoffValidator::new();
        // 即使理由带 add 信号也不放行
        assert_eq!(
            v.validate(
                &request(AgentKind::Cart, AgentKind::Checkout, "add then pay"),
                &session(0)
            ),
            Err(HandoffRejection::EmptyCartForCheckout)
        );
        assert!(v
            .validate(
                &request(AgentKind::Cart, AgentKind::Checkout, "ready to pay"),
                &session(2)
            )
            .is_ok());
    }

    #[test]
    fn test_backward_needs_justification() {
        let v = HandoffValidator::new();
        let s = session(2);
        assert_eq!(
            v.validate(
                &request(AgentKind::Checkout, AgentKind::Cart, "just because"),
                &s
            ),
            Err(HandoffRejection::BackwardWithoutJustification)
        );
        assert!(v
            .validate(
                &request(AgentKind::Checkout, AgentKind::Cart, "user wants to change items"),
                &s
            )
            .is_ok());
        assert!(v
            .validate(
                &request(AgentKind::Cart, AgentKind::Discovery, "continue shopping"),
                &s
            )
            .is_ok());
        // Router 在流程之外，从 Router 出发永远不算逆向
        assert!(v
            .validate(&request(AgentKind::Router, AgentKind::Discovery, "whatever"), &s)
            .is_ok());
    }
}
