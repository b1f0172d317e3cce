pub mod api;
pub mod gateway;

pub use api::{AgentClient, JobResult, JobStatusInfo, SubmittedJob};
pub use gateway::GatewayClient;
