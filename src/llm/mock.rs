//! Mock / 脚本化 LLM 客户端（用于测试与无 Key 的本地运行）
//!
//! MockLlmClient：对分类 prompt 回一个固定的导购分类 JSON，其余回显最后一条 User 消息，
//! 便于不配置 API Key 时跑通整条路由链路。
//! ScriptedLlmClient：按「首条 system + 最后一条 user 消息包含某子串」查表回放固定回复，
//! 同一轮里路由器和专家的 user 消息相同，靠 system prompt 里的角色字样区分。

use async_trait::async_trait;

use crate::llm::LlmClient;
use crate::memory::{Message, Role};

fn last_user_content(messages: &[Message]) -> &str {
    messages
        .iter()
        .rev()
        .find(|m| matches!(m.role, Role::User))
        .map(|m| m.content.as_str())
        .unwrap_or("(no input)")
}

/// Mock 客户端：分类 prompt 回固定 JSON，其余回显
#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        let is_classifier = messages
            .first()
            .map(|m| matches!(m.role, Role::System) && m.content.contains("intent classifier"))
            .unwrap_or(false);

        if is_classifier {
            return Ok(r#"{"agent": "product_discovery", "confidence": 0.5, "reason": "mock default", "needs_clarification": false}"#.to_string());
        }

        Ok(format!(
            "I'm a demo assistant without a configured model. You said: {}",
            last_user_content(messages)
        ))
    }
}

/// 脚本化客户端：(子串, 回复) 规则表，首条命中生效。
/// 匹配串 = 首条 system 消息 + 换行 + 最后一条 user 消息。
pub struct ScriptedLlmClient {
    rules: Vec<(String, String)>,
    default_reply: String,
}

impl ScriptedLlmClient {
    pub fn new(default_reply: impl Into<String>) -> Self {
        Self {
            rules: Vec::new(),
            default_reply: default_reply.into(),
        }
    }

    /// 追加一条规则：匹配串包含 needle 时返回 reply
    pub fn on(mut self, needle: impl Into<String>, reply: impl Into<String>) -> Self {
        self.rules.push((needle.into(), reply.into()));
        self
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        let system = messages
            .first()
            .filter(|m| matches!(m.role, Role::System))
            .map(|m| m.content.as_str())
            .unwrap_or("");
        let haystack = format!("{}\n{}", system, last_user_content(messages));
        for (needle, reply) in &self.rules {
            if haystack.contains(needle.as_str()) {
                return Ok(reply.clone());
            }
        }
        Ok(self.default_reply.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_classifier_reply() {
        let llm = MockLlmClient;
        let messages = vec![
            Message::system("You are an intent classifier for a shopping assistant."),
            Message::user("show me laptops"),
        ];
        let out = llm.complete(&messages).await.unwrap();
        assert!(out.contains("product_discovery"));
    }

    #[tokio::test]
    async fn test_scripted_rules_order() {
        let llm = ScriptedLlmClient::new("default")
            .on("laptop", "first")
            .on("laptop pro", "second");
        let messages = vec![Message::user("a laptop pro please")];
        assert_eq!(llm.complete(&messages).await.unwrap(), "first");

        let messages = vec![Message::user("anything else")];
        assert_eq!(llm.complete(&messages).await.unwrap(), "default");
    }

    #[tokio::test]
    async fn test_scripted_matches_system_prompt() {
        let llm = ScriptedLlmClient::new("default")
            .on("intent classifier", "classification")
            .on("checkout specialist", "final reply");

        // 两个角色收到同一条 user 消息，靠 system prompt 区分
        let router = vec![
            Message::system("You are an intent classifier."),
            Message::user("let's checkout"),
        ];
        assert_eq!(llm.complete(&router).await.unwrap(), "classification");

        let specialist = vec![
            Message::system("You are the checkout specialist of a shopping assistant."),
            Message::user("let's checkout"),
        ];
        assert_eq!(llm.complete(&specialist).await.unwrap(), "final reply");
    }
}
