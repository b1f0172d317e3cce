//! In-memory tracking of asynchronous agent jobs.
//!
//! A submitted job runs on its own tokio task. Status only moves forward:
//! `pending -> running -> completed | failed`.

use crate::core::agent_events;
use crate::domain::model::{Job, JobStatus};
use crate::domain::ports::AgentInvoker;
use crate::utils::error::{RelayError, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct JobStore {
    jobs: Arc<RwLock<HashMap<Uuid, Job>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job and start running it in the background.
    pub async fn submit(
        &self,
        input_text: String,
        job_type: String,
        invoker: Arc<dyn AgentInvoker>,
    ) -> Result<Job> {
        if input_text.trim().is_empty() {
            return Err(RelayError::validation("inputText is required"));
        }

        let job = Job::new(input_text, job_type);
        self.jobs.write().await.insert(job.id, job.clone());
        tracing::info!(job_id = %job.id, job_type = %job.job_type, "Job submitted");

        let store = self.clone();
        let job_id = job.id;
        let prompt = job.input_text.clone();
        tokio::spawn(async move {
            store.run(job_id, &prompt, invoker.as_ref()).await;
        });

        Ok(job)
    }

    async fn run(&self, job_id: Uuid, prompt: &str, invoker: &dyn AgentInvoker) {
        self.set_status(job_id, JobStatus::Running, None, None).await;

        match invoker.invoke(prompt).await {
            Ok(output) => {
                let text = agent_events::collect_text(&output.stdout);
                tracing::info!(
                    job_id = %job_id,
                    duration_ms = output.duration_ms,
                    chars = text.len(),
                    "Job completed"
                );
                self.set_status(job_id, JobStatus::Completed, Some(text), None)
                    .await;
            }
            Err(e) => {
                tracing::warn!(job_id = %job_id, error = %e, "Job failed");
                self.set_status(job_id, JobStatus::Failed, None, Some(e.to_string()))
                    .await;
            }
        }
    }

    async fn set_status(
        &self,
        job_id: Uuid,
        status: JobStatus,
        result: Option<String>,
        error: Option<String>,
    ) {
        let mut jobs = self.jobs.write().await;
        if let Some(job) = jobs.get_mut(&job_id) {
            if job.status.is_terminal() {
                return;
            }
            job.status = status;
            job.result = result;
            job.error = error;
            job.updated_at = Utc::now();
        }
    }

    pub async fn get(&self, job_id: Uuid) -> Option<Job> {
        self.jobs.read().await.get(&job_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    /// Drop finished jobs last updated more than `age` ago.
    pub async fn purge_finished_older_than(&self, age: Duration) -> usize {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(age).unwrap_or_else(|_| chrono::Duration::zero());
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, job| !(job.status.is_terminal() && job.updated_at < cutoff));
        before - jobs.len()
    }
}
