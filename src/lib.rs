//! Clerk - Rust 多智能体导购对话编排
//!
//! 模块划分：
//! - **agents**: 路由器与三位专家（发现 / 购物车 / 结账）、快速交接短语表
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 编排器入口与统一错误类型
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）
//! - **memory**: 有界对话历史窗口
//! - **session**: 会话状态模型与内存存储（滑动 TTL）
//! - **tools**: 商城后端抽象、导购工具箱与执行器
//! - **workflow**: 单轮工作流引擎、交接校验器与数据类型

pub mod agents;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod session;
pub mod tools;
pub mod workflow;

pub use core::{create_llm_from_config, Orchestrator};
