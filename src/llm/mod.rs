pub mod mock;
pub mod openai;
pub mod traits;

pub use mock::{MockLlmClient, ScriptedLlmClient};
pub use openai::{create_deepseek_client, OpenAiClient, TokenUsage};
pub use traits::LlmClient;
