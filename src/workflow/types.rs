//! 工作流数据类型
//!
//! TurnContext（单轮快照）、AgentResponse（专家输出）、HandoffRequest（待校验交接）、
//! WorkflowState（循环线程态）与 TurnResult（最终结果）。

use serde_json::{Map, Value};

use crate::agents::AgentKind;
use crate::memory::Message;
use crate::session::SessionState;

/// 用户浏览上下文：当前页面 / 类目 / 正在看的商品
#[derive(Debug, Clone, Default)]
pub struct UserContext {
    pub page: Option<String>,
    pub category: Option<String>,
    pub product_id: Option<String>,
}

/// 单轮上下文（短生命周期）：会话状态为轮次开始时的快照，轮中不重读
#[derive(Debug, Clone)]
pub struct TurnContext {
    pub session_id: String,
    pub user_message: String,
    /// 有界历史：调用方提供的最近 N 轮 role/content
    pub history: Vec<Message>,
    pub session: SessionState,
    pub user_context: UserContext,
}

/// 专家单次执行的输出；每次 generate 恰好产生一个，从不为空
#[derive(Debug, Clone)]
pub struct AgentResponse {
    pub content: String,
    pub handoff_to: Option<AgentKind>,
    pub handoff_reason: Option<String>,
    pub metadata: Map<String, Value>,
    pub needs_clarification: bool,
    pub clarification_question: Option<String>,
}

impl AgentResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            handoff_to: None,
            handoff_reason: None,
            metadata: Map::new(),
            needs_clarification: false,
            clarification_question: None,
        }
    }

    pub fn with_handoff(mut self, to: AgentKind, reason: impl Into<String>) -> Self {
        self.handoff_to = Some(to);
        self.handoff_reason = Some(reason.into());
        self
    }

    pub fn with_meta(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    /// 快速交接（未调用 LLM）：过渡性文案 + metadata 标记
    pub fn quick_handoff(to: AgentKind, reason: impl Into<String>) -> Self {
        Self::text(format!("Let me hand you over to our {to} specialist."))
            .with_handoff(to, reason)
            .with_meta("quick_handoff", Value::Bool(true))
    }

    /// 专家边界的失败降级：道歉文案 + metadata.error
    pub fn apology(error: impl std::fmt::Display) -> Self {
        Self::text(
            "I'm sorry, something went wrong on my end while handling that. \
             Could you try again in a moment?",
        )
        .with_meta("error", Value::String(error.to_string()))
    }

    /// 路由器的澄清提问：立即结束本轮，不交接
    pub fn clarification(question: impl Into<String>) -> Self {
        let question = question.into();
        Self {
            content: question.clone(),
            handoff_to: None,
            handoff_reason: None,
            metadata: Map::new(),
            needs_clarification: true,
            clarification_question: Some(question),
        }
    }
}

/// 由 AgentResponse 构造出的交接请求，仅供校验，不独立持久化
#[derive(Debug, Clone)]
pub struct HandoffRequest {
    pub from_agent: AgentKind,
    pub to_agent: AgentKind,
    pub reason: String,
    pub user_message: Option<String>,
}

impl HandoffRequest {
    pub fn from_response(
        from: AgentKind,
        to: AgentKind,
        response: &AgentResponse,
        ctx: &TurnContext,
    ) -> Self {
        Self {
            from_agent: from,
            to_agent: to,
            reason: response.handoff_reason.clone().unwrap_or_default(),
            user_message: Some(ctx.user_message.clone()),
        }
    }
}

/// 循环中穿行的状态：当前专家、执行计数与上限
#[derive(Debug)]
pub struct WorkflowState {
    pub current_agent: AgentKind,
    pub iteration_count: u32,
    pub max_iterations: u32,
}

impl WorkflowState {
    /// 每轮固定从 Router 起步，与会话里存的 current_agent 无关
    pub fn new(max_iterations: u32) -> Self {
        Self {
            current_agent: AgentKind::Router,
            iteration_count: 0,
            max_iterations: max_iterations.max(1),
        }
    }
}

/// 单轮最终结果：最后一个专家的 content + 汇总 metadata
#[derive(Debug, Clone)]
pub struct TurnResult {
    pub content: String,
    pub metadata: Map<String, Value>,
}
