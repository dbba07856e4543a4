//! 专家能力层
//!
//! 封闭的专家集合（Router / Discovery / Cart / Checkout）以 AgentKind 枚举表达，
//! 通过静态表映射到具体实现（无运行时反射）。共享契约 Specialist：
//! build_prompt（对相同上下文确定）、tool_set、quick_handoff_check（LLM 前的短路启发）、
//! generate（完整一跳，内部吸收一切外部调用失败）。

pub mod cart;
pub mod checkout;
pub mod discovery;
pub mod phrases;
pub mod router;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::AgentError;
use crate::llm::LlmClient;
use crate::memory::Message;
use crate::tools::{CommerceBackend, ToolDescriptor, ToolExecutor};
use crate::workflow::types::{AgentResponse, TurnContext};

pub use cart::CartAgent;
pub use checkout::CheckoutAgent;
pub use discovery::DiscoveryAgent;
pub use router::RouterAgent;

/// 专家名字（封闭集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Router,
    #[serde(rename = "product_discovery", alias = "discovery")]
    Discovery,
    Cart,
    Checkout,
}

impl AgentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Router => "router",
            AgentKind::Discovery => "product_discovery",
            AgentKind::Cart => "cart",
            AgentKind::Checkout => "checkout",
        }
    }

    /// 宽松解析：吸收模型输出里的各种别名写法；未知返回 None
    pub fn parse_loose(s: &str) -> Option<AgentKind> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "router" => Some(AgentKind::Router),
            "product_discovery" | "discovery" | "product" | "products" | "search" => {
                Some(AgentKind::Discovery)
            }
            "cart" | "shopping_cart" => Some(AgentKind::Cart),
            "checkout" | "check_out" | "payment" => Some(AgentKind::Checkout),
            _ => None,
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AgentKind::Router => "router",
            AgentKind::Discovery => "product discovery",
            AgentKind::Cart => "cart",
            AgentKind::Checkout => "checkout",
        };
        write!(f, "{name}")
    }
}

/// quick_handoff_check 命中的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuickHandoff {
    pub agent: AgentKind,
    pub reason: &'static str,
}

/// 专家共享契约
#[async_trait]
pub trait Specialist: Send + Sync {
    fn kind(&self) -> AgentKind;

    /// 系统指令：对相同上下文字段（购物车数量、结账阶段等）必须产出相同文本
    fn build_prompt(&self, ctx: &TurnContext) -> String;

    /// 本专家可调用的领域工具（Router 为空）
    fn tool_set(&self) -> Vec<ToolDescriptor>;

    /// LLM 调用前的本地短路启发：命中则直接交接，省一次模型调用
    fn quick_handoff_check(&self, message: &str, ctx: &TurnContext) -> Option<QuickHandoff>;

    /// 完整一跳：LLM + 工具往返 + 从回复文本二次推断交接。
    /// 一切外部调用失败在此边界吸收为道歉回复（metadata.error），绝不向外抛。
    async fn generate(&self, ctx: &TurnContext) -> AgentResponse;
}

/// LLM 输出中的工具调用（简化 JSON：{"tool": "view_cart", "args": {...}}）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    #[serde(default)]
    pub args: Value,
}

/// 从文本中提取第一个括号配对完整的 JSON 对象片段
pub(crate) fn extract_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// 去掉 ```json ... ``` 代码围栏（若有）
pub(crate) fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        return rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim());
    }
    if let Some(rest) = trimmed.strip_prefix("```") {
        return rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim());
    }
    trimmed
}

/// 解析 LLM 输出：若含 "tool" 字段的有效 JSON 则视为工具调用，否则为普通回复
pub(crate) fn parse_tool_call(output: &str) -> Option<ToolCall> {
    let cleaned = strip_code_fence(output);
    let fragment = extract_balanced_object(cleaned)?;
    let call: ToolCall = serde_json::from_str(fragment).ok()?;
    if call.tool.is_empty() {
        None
    } else {
        Some(call)
    }
}

/// 共享工具往返循环：模型回 JSON 工具调用则执行并把观察结果喂回，
/// 直到回纯文本或用尽轮数（用尽时请求一次纯文本收尾）。
pub(crate) async fn complete_with_tools(
    llm: &Arc<dyn LlmClient>,
    executor: &ToolExecutor,
    mut messages: Vec<Message>,
    max_rounds: u32,
) -> Result<String, AgentError> {
    for _ in 0..max_rounds {
        let raw = llm.complete(&messages).await.map_err(AgentError::LlmError)?;

        match parse_tool_call(&raw) {
            Some(call) => {
                tracing::debug!("Tool call requested: {}", call.tool);
                let observation = executor.execute(&call.tool, call.args).await?;
                messages.push(Message::assistant(raw));
                messages.push(Message::user(format!("Tool result: {observation}")));
            }
            None => return Ok(raw.trim().to_string()),
        }
    }

    messages.push(Message::user(
        "Please give your final answer in plain text without calling any more tools.",
    ));
    llm.complete(&messages)
        .await
        .map(|s| s.trim().to_string())
        .map_err(AgentError::LlmError)
}

/// 拼装一次专家调用的消息序列：system + 有界历史 + 当前消息
pub(crate) fn assemble_messages(system: String, ctx: &TurnContext) -> Vec<Message> {
    let mut messages = vec![Message::system(system)];
    messages.extend(ctx.history.iter().cloned());
    messages.push(Message::user(ctx.user_message.clone()));
    messages
}

/// 静态专家表：AgentKind → 实现（显式构造注入，无全局注册表）
pub fn specialist_table(
    llm: Arc<dyn LlmClient>,
    backend: Arc<dyn CommerceBackend>,
    tool_timeout_secs: u64,
    max_tool_rounds: u32,
) -> HashMap<AgentKind, Arc<dyn Specialist>> {
    let mut table: HashMap<AgentKind, Arc<dyn Specialist>> = HashMap::new();
    table.insert(AgentKind::Router, Arc::new(RouterAgent::new(llm.clone())));
    table.insert(
        AgentKind::Discovery,
        Arc::new(DiscoveryAgent::new(
            llm.clone(),
            backend.clone(),
            tool_timeout_secs,
            max_tool_rounds,
        )),
    );
    table.insert(
        AgentKind::Cart,
        Arc::new(CartAgent::new(
            llm.clone(),
            backend.clone(),
            tool_timeout_secs,
            max_tool_rounds,
        )),
    );
    table.insert(
        AgentKind::Checkout,
        Arc::new(CheckoutAgent::new(llm, backend, tool_timeout_secs, max_tool_rounds)),
    );
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_loose_aliases() {
        assert_eq!(AgentKind::parse_loose("Discovery"), Some(AgentKind::Discovery));
        assert_eq!(AgentKind::parse_loose("product_discovery"), Some(AgentKind::Discovery));
        assert_eq!(AgentKind::parse_loose(" checkout "), Some(AgentKind::Checkout));
        assert_eq!(AgentKind::parse_loose("warehouse"), None);
    }

    #[test]
    fn test_extract_balanced_object_nested() {
        let text = r#"Sure: {"tool": "add_to_cart", "args": {"product_id": "p-1"}} done"#;
        let fragment = extract_balanced_object(text).unwrap();
        assert!(fragment.starts_with('{') && fragment.ends_with('}'));
        let call: ToolCall = serde_json::from_str(fragment).unwrap();
        assert_eq!(call.tool, "add_to_cart");
    }

    #[test]
    fn test_extract_balanced_object_ignores_braces_in_strings() {
        let text = r#"{"tool": "echo", "args": {"text": "a } inside"}}"#;
        let fragment = extract_balanced_object(text).unwrap();
        assert_eq!(fragment, text);
    }

    #[test]
    fn test_parse_tool_call_plain_text() {
        assert!(parse_tool_call("Here are some laptops you might like.").is_none());
        assert!(parse_tool_call(r#"{"agent": "cart"}"#).is_none());
    }

    #[test]
    fn test_parse_tool_call_fenced() {
        let raw = "```json\n{\"tool\": \"view_cart\", \"args\": {}}\n```";
        let call = parse_tool_call(raw).unwrap();
        assert_eq!(call.tool, "view_cart");
    }
}
