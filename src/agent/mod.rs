pub mod agent_loop;
pub mod context;
pub mod metrics;
pub mod oneshot;
pub mod subagent;
pub mod tools;

// Re-export from providers module
pub use crate::providers::{
    LlmMessage, LlmProvider, LlmResponse, LlmRole, LlmToolCall, ProviderError,
};
pub use agent_loop::{AgentError, AgentLoop, ContextBuilder};
pub use context::{ContextBuilderConfig, ContextBuilderImpl};
pub use metrics::ResponseMetrics;
pub use oneshot::execute_one_shot;
