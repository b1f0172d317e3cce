pub mod agent_events;
pub mod extract;
pub mod jobs;
pub mod prompts;
pub mod sse;

pub use crate::domain::model::{Job, JobStatus, StreamEvent};
pub use crate::domain::ports::{AgentInvoker, AgentOutput};
pub use crate::utils::error::Result;
