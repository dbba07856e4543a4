//! 意图与交接信号的字面短语表
//!
//! 这些短语表是契约的一部分：按原样匹配（小写包含），不做语义化改写。
//! 改动任何一张表都会改变路由行为，须连同测试一起调整。

use super::AgentKind;

/// 结账/购买意图（quick_handoff_check 用；目标 Checkout 需购物车非空）
pub const CHECKOUT_PHRASES: &[&str] = &[
    "checkout",
    "check out",
    "proceed to checkout",
    "buy now",
    "purchase",
    "place my order",
    "place the order",
    "ready to pay",
    "ready to buy",
];

/// 查看购物车意图（目标 Cart）
pub const VIEW_CART_PHRASES: &[&str] = &[
    "view cart",
    "view my cart",
    "my cart",
    "show cart",
    "show my cart",
    "what's in my cart",
    "shopping cart",
];

/// 浏览/继续选购意图（目标 Discovery）
pub const BROWSE_PHRASES: &[&str] = &[
    "browse",
    "keep shopping",
    "continue shopping",
    "look for",
    "search for",
    "show me",
    "looking for",
    "find me",
];

/// 购物车修改意图（Checkout 专家转回 Cart 用）
pub const CART_MODIFY_PHRASES: &[&str] = &[
    "remove",
    "change quantity",
    "update quantity",
    "change items",
    "modify my cart",
    "add another",
    "add more",
    "empty my cart",
];

/// 逆向交接（流程顺序上往回走）允许的理由短语
pub const BACKWARD_JUSTIFICATIONS: &[&str] = &[
    "cart empty",
    "cart is empty",
    "modify order",
    "change items",
    "continue shopping",
    "browse more",
    "add more items",
];

/// 目标为 Cart 且购物车为空时，理由里必须出现的「加购」信号
pub const ADD_SIGNALS: &[&str] = &["add"];

/// 从专家回复文本二次推断交接的信号短语（次级启发，区别于 quick_handoff_check）
pub const REPLY_HANDOFF_SIGNALS: &[(&str, AgentKind)] = &[
    ("checkout specialist", AgentKind::Checkout),
    ("proceed to checkout", AgentKind::Checkout),
    ("ready to check out", AgentKind::Checkout),
    ("complete your purchase", AgentKind::Checkout),
    ("add it to your cart", AgentKind::Cart),
    ("add them to your cart", AgentKind::Cart),
    ("added to your cart", AgentKind::Cart),
    ("cart specialist", AgentKind::Cart),
    ("review your cart", AgentKind::Cart),
    ("product specialist", AgentKind::Discovery),
    ("browse our catalog", AgentKind::Discovery),
    ("continue shopping", AgentKind::Discovery),
];

/// 小写包含匹配；命中返回匹配到的短语
pub fn contains_any<'a>(text: &str, phrases: &'a [&'a str]) -> Option<&'a str> {
    let lower = text.to_lowercase();
    phrases.iter().find(|p| lower.contains(**p)).copied()
}

/// 扫描专家自己的回复文本，推断其隐含的交接目标
pub fn infer_handoff_from_reply(reply: &str) -> Option<(AgentKind, &'static str)> {
    let lower = reply.to_lowercase();
    REPLY_HANDOFF_SIGNALS
        .iter()
        .find(|(phrase, _)| lower.contains(phrase))
        .map(|(phrase, agent)| (*agent, *phrase))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_any_case_insensitive() {
        assert_eq!(
            contains_any("I want to CHECK OUT now", CHECKOUT_PHRASES),
            Some("check out")
        );
        assert!(contains_any("just browsing images", CHECKOUT_PHRASES).is_none());
    }

    #[test]
    fn test_infer_handoff_from_reply() {
        let (agent, phrase) =
            infer_handoff_from_reply("Great choice! You can add it to your cart anytime.").unwrap();
        assert_eq!(agent, AgentKind::Cart);
        assert_eq!(phrase, "add it to your cart");

        assert!(infer_handoff_from_reply("Here are three laptops.").is_none());
    }
}
