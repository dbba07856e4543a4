pub mod error;
pub mod orchestrator;

pub use error::AgentError;
pub use orchestrator::{create_llm_from_config, Orchestrator};
