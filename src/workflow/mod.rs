pub mod engine;
pub mod types;
pub mod validator;

pub use engine::WorkflowEngine;
pub use types::{AgentResponse, HandoffRequest, TurnContext, TurnResult, UserContext, WorkflowState};
pub use validator::{HandoffRejection, HandoffValidator};
