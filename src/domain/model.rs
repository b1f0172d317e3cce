use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub const DEFAULT_JOB_TYPE: &str = "agent-invocation";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One asynchronous agent invocation tracked by the backend.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: Uuid,
    pub job_type: String,
    pub input_text: String,
    pub status: JobStatus,
    pub result: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(input_text: String, job_type: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            job_type,
            input_text,
            status: JobStatus::Pending,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A filing reference as presented to users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filing {
    pub form: String,
    pub filing_date: String,
    pub accession: String,
    pub url: String,
}

/// Filings scraped out of an agent answer, split by form type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilingSet {
    pub response: String,
    #[serde(rename = "10-K", default)]
    pub ten_k: Vec<Filing>,
    #[serde(rename = "10-Q", default)]
    pub ten_q: Vec<Filing>,
}

impl FilingSet {
    pub fn is_empty(&self) -> bool {
        self.ten_k.is_empty() && self.ten_q.is_empty()
    }

    /// `"{form} filed {date}"` descriptions, 10-K entries first.
    pub fn descriptions(&self) -> impl Iterator<Item = String> + '_ {
        self.ten_k
            .iter()
            .chain(self.ten_q.iter())
            .map(|f| format!("{} filed {}", f.form, f.filing_date))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PeerAnalysis {
    pub data: Vec<serde_json::Value>,
    pub analysis: String,
    pub base_bank: String,
    pub peer_banks: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub sources: Vec<String>,
}

impl ChatResponse {
    pub fn new(response: String) -> Self {
        Self {
            response,
            sources: Vec::new(),
        }
    }
}

/// A document previously uploaded for analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalDocument {
    pub bank_name: String,
    pub form_type: String,
    pub s3_key: Option<String>,
}

/// One decoded frame of the backend's SSE stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Chunk(String),
    Done,
    Error(String),
}
