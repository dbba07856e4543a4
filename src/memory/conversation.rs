//! 短期记忆：对话历史
//!
//! 保留最近 N 轮对话（user/assistant 对），超出时自动剪枝；调用方按调用契约传入
//! role/content 对，窗口内消息原样进入 LLM 上下文。

use serde::{Deserialize, Serialize};

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// 单条消息
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// 有界对话窗口：最近 N 轮（每轮含 user + assistant，故实际保留约 max_turns*2 条消息）
#[derive(Clone, Debug)]
pub struct ConversationWindow {
    messages: Vec<Message>,
    max_turns: usize,
}

impl ConversationWindow {
    pub fn new(max_turns: usize) -> Self {
        Self {
            messages: Vec::new(),
            max_turns,
        }
    }

    /// 从调用方传入的 (role, content) 对构建窗口；未知角色按 user 处理
    pub fn from_pairs(pairs: &[(String, String)], max_turns: usize) -> Self {
        let mut window = Self::new(max_turns);
        for (role, content) in pairs {
            let msg = match role.to_lowercase().as_str() {
                "assistant" => Message::assistant(content.clone()),
                "system" => Message::system(content.clone()),
                _ => Message::user(content.clone()),
            };
            window.push(msg);
        }
        window
    }

    pub fn push(&mut self, msg: Message) {
        self.messages.push(msg);
        self.prune();
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// 超出 max_turns*2 时丢弃最旧的消息，保留最近部分
    fn prune(&mut self) {
        if self.messages.len() > self.max_turns * 2 {
            let keep = self.max_turns * 2;
            self.messages.drain(..self.messages.len() - keep);
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prune_keeps_recent() {
        let mut window = ConversationWindow::new(2);
        for i in 0..10 {
            window.push(Message::user(format!("msg {i}")));
        }
        assert_eq!(window.len(), 4);
        assert_eq!(window.messages()[0].content, "msg 6");
    }

    #[test]
    fn test_from_pairs_roles() {
        let pairs = vec![
            ("user".to_string(), "hi".to_string()),
            ("assistant".to_string(), "hello".to_string()),
            ("weird".to_string(), "x".to_string()),
        ];
        let window = ConversationWindow::from_pairs(&pairs, 10);
        assert_eq!(window.messages()[1].role, Role::Assistant);
        assert_eq!(window.messages()[2].role, Role::User);
    }
}
