//! Client for the relay backend: job submission and polling, direct
//! invocation, and SSE streaming, plus the banking operations built on them.

use crate::config::ClientSettings;
use crate::core::sse::SseDecoder;
use crate::core::{agent_events, extract, prompts};
use crate::domain::model::{
    ChatResponse, FilingSet, JobStatus, LocalDocument, PeerAnalysis, StreamEvent, DEFAULT_JOB_TYPE,
};
use crate::utils::error::{RelayError, Result};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::time::Duration;

pub const COMPLIANCE_STREAM_TIMEOUT: Duration = Duration::from_secs(60);
pub const PEER_STREAM_TIMEOUT: Duration = Duration::from_secs(120);

/// Characters of a bad body quoted back in error messages.
const ERROR_PREVIEW_CHARS: usize = 100;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitJobRequest<'a> {
    input_text: &'a str,
    job_type: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedJob {
    pub job_id: String,
    #[serde(default)]
    pub status: Option<JobStatus>,
    #[serde(default)]
    pub job_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusInfo {
    #[serde(default)]
    pub job_id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    #[serde(default)]
    pub job_id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InvokeAgentResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AgentClient {
    http: Client,
    base_url: String,
    auth_token: Option<String>,
    poll_max_attempts: u32,
    poll_interval: Duration,
    stream_timeout: Duration,
}

impl AgentClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::from_settings(&ClientSettings {
            base_url: base_url.into(),
            ..Default::default()
        })
    }

    pub fn from_settings(settings: &ClientSettings) -> Self {
        Self {
            http: Client::new(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            auth_token: settings.auth_token.clone(),
            poll_max_attempts: settings.poll_max_attempts,
            poll_interval: settings.poll_interval(),
            stream_timeout: settings.stream_timeout(),
        }
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn with_poll_settings(mut self, max_attempts: u32, interval: Duration) -> Self {
        self.poll_max_attempts = max_attempts;
        self.poll_interval = interval;
        self
    }

    pub fn with_stream_timeout(mut self, timeout: Duration) -> Self {
        self.stream_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    pub async fn health(&self) -> Result<Value> {
        let response = self.http.get(self.url("/api/health")).send().await?;
        if !response.status().is_success() {
            return Err(api_error(response, "Health check failed").await);
        }
        safe_json(response).await
    }

    pub async fn submit_job(&self, input_text: &str, job_type: &str) -> Result<SubmittedJob> {
        tracing::debug!(job_type, prompt_chars = input_text.len(), "Submitting job");
        let request = self
            .http
            .post(self.url("/api/jobs/submit"))
            .json(&SubmitJobRequest { input_text, job_type });
        let response = self.authorized(request).send().await?;

        if !response.status().is_success() {
            return Err(api_error(response, "Job submission failed").await);
        }
        let job: SubmittedJob = safe_json(response).await?;
        tracing::info!(job_id = %job.job_id, "Job submitted");
        Ok(job)
    }

    pub async fn check_job_status(&self, job_id: &str) -> Result<JobStatusInfo> {
        let request = self.http.get(self.url(&format!("/api/jobs/{}", job_id)));
        let response = self.authorized(request).send().await?;

        if !response.status().is_success() {
            return Err(api_error(response, "Job status check failed").await);
        }
        safe_json(response).await
    }

    /// Fetch a finished job's result. A failed job is returned as an error.
    pub async fn get_job_result(&self, job_id: &str) -> Result<JobResult> {
        let request = self.http.get(self.url(&format!("/api/jobs/{}/result", job_id)));
        let response = self.authorized(request).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| error_field(&v, &["error", "message"]))
                .unwrap_or_else(|| {
                    format!(
                        "Job failed ({}): {}",
                        status.as_u16(),
                        extract::preview(&body, ERROR_PREVIEW_CHARS)
                    )
                });
            tracing::warn!(job_id, status = status.as_u16(), "Job result request failed");
            return Err(RelayError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let result: JobResult = serde_json::from_str(&body).map_err(|e| {
            tracing::error!(job_id, error = %e, body = %extract::preview(&body, 200), "Unparseable job result");
            RelayError::invalid_response("Invalid response from server")
        })?;

        if result.status == JobStatus::Failed {
            return Err(RelayError::JobFailed {
                message: result
                    .error
                    .clone()
                    .unwrap_or_else(|| "Job processing failed".to_string()),
            });
        }
        Ok(result)
    }

    pub async fn poll_job_until_complete(&self, job_id: &str) -> Result<JobResult> {
        for attempt in 1..=self.poll_max_attempts {
            let info = self.check_job_status(job_id).await?;
            tracing::debug!(job_id, attempt, status = %info.status, "Polled job");

            if info.status.is_terminal() {
                return self.get_job_result(job_id).await;
            }
            if attempt < self.poll_max_attempts {
                tokio::time::sleep(self.poll_interval).await;
            }
        }

        tracing::warn!(job_id, attempts = self.poll_max_attempts, "Gave up polling job");
        Err(RelayError::PollTimeout {
            attempts: self.poll_max_attempts,
        })
    }

    /// Submit a prompt as a job and wait for its answer text.
    pub async fn ask(&self, prompt: &str) -> Result<String> {
        let job = self.submit_job(prompt, DEFAULT_JOB_TYPE).await?;
        let result = self.poll_job_until_complete(&job.job_id).await?;
        Ok(result.result.unwrap_or_default())
    }

    /// Run a prompt through the synchronous endpoint.
    pub async fn invoke_agent(&self, prompt: &str) -> Result<String> {
        let response = self
            .http
            .post(self.url("/api/invoke-agent"))
            .json(&serde_json::json!({ "prompt": prompt }))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(api_error(response, "HTTP error! status").await);
        }

        let body: InvokeAgentResponse = safe_json(response).await?;
        if !body.success {
            return Err(RelayError::AgentInvocationFailed {
                details: body.error.unwrap_or_else(|| "Unknown error".to_string()),
            });
        }
        match body.text.filter(|t| !t.is_empty()) {
            Some(text) => Ok(text),
            None => Ok(agent_events::collect_text(&body.response.unwrap_or_default())),
        }
    }

    /// Open the SSE endpoint and decode its frames as they arrive.
    pub async fn stream_agent(&self, prompt: &str) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let response = self
            .http
            .post(self.url("/api/invoke-agent-stream"))
            .json(&serde_json::json!({ "inputText": prompt }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::StreamError {
                message: format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("")
                ),
            });
        }

        Ok(sse_events(Box::pin(response.bytes_stream())).boxed())
    }

    /// Collect a streamed answer, handing each chunk to `on_chunk` as it lands.
    pub async fn stream_to_string<F>(&self, prompt: &str, mut on_chunk: F, timeout: Duration) -> Result<String>
    where
        F: FnMut(&str),
    {
        let read = async {
            let mut events = self.stream_agent(prompt).await?;
            let mut full = String::new();
            while let Some(event) = events.next().await {
                match event? {
                    StreamEvent::Chunk(chunk) => {
                        on_chunk(&chunk);
                        full.push_str(&chunk);
                    }
                    StreamEvent::Done => break,
                    StreamEvent::Error(message) => return Err(RelayError::StreamError { message }),
                }
            }
            Ok::<_, RelayError>(full)
        };

        match tokio::time::timeout(timeout, read).await {
            Ok(result) => result,
            Err(_) => Err(RelayError::StreamTimeout {
                timeout_secs: timeout.as_secs(),
            }),
        }
    }

    /// Ask a banking question, optionally about one bank and its filings.
    pub async fn chat(
        &self,
        question: &str,
        bank_name: Option<&str>,
        reports: Option<&FilingSet>,
        streaming: bool,
    ) -> Result<ChatResponse> {
        if streaming {
            return self.chat_streaming(question, bank_name, reports, |_| {}).await;
        }
        let prompt = prompts::chat_prompt(question, bank_name, reports);
        let answer = self.ask(&prompts::wrapped_chat_prompt(&prompt, bank_name)).await?;
        Ok(ChatResponse::new(extract::clean_chat_response(&answer)))
    }

    pub async fn chat_streaming<F>(
        &self,
        question: &str,
        bank_name: Option<&str>,
        reports: Option<&FilingSet>,
        on_chunk: F,
    ) -> Result<ChatResponse>
    where
        F: FnMut(&str),
    {
        let prompt = prompts::chat_prompt(question, bank_name, reports);
        let answer = self.stream_to_string(&prompt, on_chunk, self.stream_timeout).await?;
        Ok(ChatResponse::new(extract::strip_data_lines(&answer)))
    }

    pub async fn analyze_peers(&self, base_bank: &str, peer_banks: &[String], metric: &str) -> Result<PeerAnalysis> {
        let prompt = prompts::peer_analysis_prompt(base_bank, peer_banks, metric, true);
        let answer = self.ask(&prompt).await?;
        Ok(extract::extract_peer_analysis(&answer, base_bank, peer_banks))
    }

    pub async fn stream_peer_analysis<F>(
        &self,
        base_bank: &str,
        peer_banks: &[String],
        metric: &str,
        on_chunk: F,
    ) -> Result<PeerAnalysis>
    where
        F: FnMut(&str),
    {
        let prompt = prompts::peer_analysis_prompt(base_bank, peer_banks, metric, false);
        let answer = self.stream_to_string(&prompt, on_chunk, PEER_STREAM_TIMEOUT).await?;
        Ok(extract::extract_peer_analysis(&answer, base_bank, peer_banks))
    }

    pub async fn sec_filings(&self, bank_name: &str) -> Result<FilingSet> {
        let answer = self.ask(&prompts::sec_filings_prompt(bank_name)).await?;
        Ok(extract::extract_sec_filings(&answer))
    }

    pub async fn full_report(&self, bank_name: &str) -> Result<String> {
        let answer = self.ask(&prompts::full_report_prompt(bank_name)).await?;
        Ok(extract::strip_data_lines(&answer))
    }

    /// Stream the compliance assessment and return the JSON object it contains.
    pub async fn compliance_assessment(&self, bank_name: &str) -> Result<Value> {
        let answer = self
            .stream_to_string(&prompts::compliance_prompt(bank_name), |_| {}, COMPLIANCE_STREAM_TIMEOUT)
            .await?;

        answer
            .match_indices('{')
            .find_map(|(start, _)| extract::first_json_object(&answer, start))
            .map(|(value, _)| value)
            .ok_or_else(|| {
                RelayError::invalid_response(format!(
                    "Compliance assessment returned no JSON: {}",
                    extract::preview(&answer, ERROR_PREVIEW_CHARS)
                ))
            })
    }

    /// Ask about the first uploaded document.
    pub async fn chat_with_local_document(&self, message: &str, documents: &[LocalDocument]) -> Result<ChatResponse> {
        let doc = documents
            .first()
            .ok_or_else(|| RelayError::validation("No documents available"))?;
        let s3_key = doc
            .s3_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| RelayError::validation("Document missing s3_key - please re-upload the document"))?;

        let answer = self.ask(&prompts::local_document_prompt(message, doc, s3_key)).await?;
        Ok(ChatResponse::new(answer))
    }
}

/// Decode an SSE body into events. A transport error ends the stream.
fn sse_events<S, B>(body: S) -> impl Stream<Item = Result<StreamEvent>>
where
    S: Stream<Item = reqwest::Result<B>> + Unpin,
    B: AsRef<[u8]>,
{
    struct State<S> {
        body: S,
        decoder: Option<SseDecoder>,
        pending: VecDeque<StreamEvent>,
    }

    let initial = State {
        body,
        decoder: Some(SseDecoder::new()),
        pending: VecDeque::new(),
    };

    stream::unfold(initial, |mut st| async move {
        loop {
            if let Some(event) = st.pending.pop_front() {
                return Some((Ok(event), st));
            }
            if st.decoder.is_none() {
                return None;
            }
            match st.body.next().await {
                Some(Ok(bytes)) => {
                    if let Some(decoder) = st.decoder.as_mut() {
                        st.pending.extend(decoder.push(bytes.as_ref()));
                    }
                }
                Some(Err(e)) => {
                    st.decoder = None;
                    return Some((Err(RelayError::Http(e)), st));
                }
                None => {
                    if let Some(decoder) = st.decoder.take() {
                        st.pending.extend(decoder.finish());
                    }
                }
            }
        }
    })
}

fn error_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map(String::from)
}

/// Error for a non-2xx response: the body's JSON `error` field, else `{context}: {status}`.
async fn api_error(response: Response, context: &str) -> RelayError {
    let status = response.status().as_u16();
    let message = match response.json::<Value>().await {
        Ok(body) => error_field(&body, &["error"]),
        Err(_) => None,
    };
    RelayError::ApiError {
        status,
        message: message.unwrap_or_else(|| format!("{}: {}", context, status)),
    }
}

/// Parse a JSON body, refusing HTML error pages and other non-JSON replies.
pub async fn safe_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let body = response.text().await?;

    if !content_type.contains("application/json") {
        tracing::error!(content_type = %content_type, body = %extract::preview(&body, 200), "Server returned non-JSON response");
        let shown = if content_type.is_empty() {
            "unknown content type"
        } else {
            content_type.as_str()
        };
        return Err(RelayError::invalid_response(format!(
            "Server error: Expected JSON but got {}. Response: {}",
            shown,
            extract::preview(&body, ERROR_PREVIEW_CHARS)
        )));
    }

    serde_json::from_str(&body).map_err(|e| {
        tracing::error!(error = %e, body = %extract::preview(&body, 200), "Unparseable JSON response");
        RelayError::invalid_response("Invalid JSON response from server")
    })
}
