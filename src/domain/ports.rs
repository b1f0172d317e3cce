use crate::utils::error::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Raw output of one complete agent invocation.
#[derive(Debug, Clone, Default)]
pub struct AgentOutput {
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

/// Something that can hand a prompt to the external agent.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    /// Run the agent to completion and return everything it printed.
    async fn invoke(&self, prompt: &str) -> Result<AgentOutput>;

    /// Run the agent and yield its output line by line as it arrives.
    async fn stream(&self, prompt: &str) -> Result<BoxStream<'static, Result<String>>>;
}
