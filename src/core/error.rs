//! 编排错误类型
//!
//! 专家内部的 LLM / 工具失败以 AgentError 表达，在 generate 边界统一转为道歉回复；
//! 只有会话存储失败会穿透整轮，由编排器转为对用户可见的兜底消息。

use thiserror::Error;

use crate::session::SessionStoreError;

/// 单轮处理过程中可能出现的错误（LLM、解析、工具、会话存储）
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// 引擎查表查不到专家时的防御路径，正常配置下不会出现
    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    #[error("Session store error: {0}")]
    SessionStore(#[from] SessionStoreError),
}
