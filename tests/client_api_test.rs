use agent_relay::client::{AgentClient, GatewayClient};
use agent_relay::domain::model::LocalDocument;
use agent_relay::RelayError;
use httpmock::prelude::*;
use serde_json::json;
use std::time::Duration;

const JOB_ID: &str = "7d1f0c2e-3a4b-4c5d-8e9f-001122334455";

fn fast_client(server: &MockServer) -> AgentClient {
    AgentClient::new(server.base_url()).with_poll_settings(3, Duration::from_millis(10))
}

#[tokio::test]
async fn test_ask_submits_and_polls_until_complete() {
    let server = MockServer::start_async().await;

    let submit = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/jobs/submit")
                .header("authorization", "Bearer relay-token")
                .json_body(json!({"inputText": "What is CET1?", "jobType": "agent-invocation"}));
            then.status(202).header("content-type", "application/json")
                .json_body(json!({"jobId": JOB_ID, "status": "pending", "jobType": "agent-invocation"}));
        })
        .await;
    let status = server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/api/jobs/{}", JOB_ID));
            then.status(200).header("content-type", "application/json").json_body(json!({"jobId": JOB_ID, "status": "completed"}));
        })
        .await;
    let result = server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/api/jobs/{}/result", JOB_ID));
            then.status(200).header("content-type", "application/json")
                .json_body(json!({"jobId": JOB_ID, "status": "completed", "result": "CET1 is 13.2%"}));
        })
        .await;

    let client = fast_client(&server).with_auth_token("relay-token");
    let answer = client.ask("What is CET1?").await.unwrap();

    assert_eq!(answer, "CET1 is 13.2%");
    submit.assert_async().await;
    status.assert_async().await;
    result.assert_async().await;
}

#[tokio::test]
async fn test_submit_error_uses_json_error_field() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/jobs/submit");
            then.status(400).json_body(json!({"error": "inputText is required", "code": "VALIDATION_ERROR"}));
        })
        .await;

    let err = fast_client(&server).submit_job("x", "agent-invocation").await.unwrap_err();
    assert!(matches!(err, RelayError::ApiError { status: 400, .. }));
    assert_eq!(err.to_string(), "inputText is required");
}

#[tokio::test]
async fn test_submit_error_without_json_uses_status() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/jobs/submit");
            then.status(503).header("content-type", "text/plain").body("unavailable");
        })
        .await;

    let err = fast_client(&server).submit_job("x", "agent-invocation").await.unwrap_err();
    assert_eq!(err.to_string(), "Job submission failed: 503");
}

#[tokio::test]
async fn test_polling_gives_up_after_max_attempts() {
    let server = MockServer::start_async().await;
    let status = server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/api/jobs/{}", JOB_ID));
            then.status(200).header("content-type", "application/json").json_body(json!({"jobId": JOB_ID, "status": "running"}));
        })
        .await;

    let err = fast_client(&server).poll_job_until_complete(JOB_ID).await.unwrap_err();

    assert!(matches!(err, RelayError::PollTimeout { attempts: 3 }));
    assert_eq!(err.to_string(), "Job polling timeout");
    assert_eq!(status.hits_async().await, 3);
}

#[tokio::test]
async fn test_failed_job_surfaces_its_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/api/jobs/{}", JOB_ID));
            then.status(200).header("content-type", "application/json").json_body(json!({"jobId": JOB_ID, "status": "failed", "error": "credentials expired"}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/api/jobs/{}/result", JOB_ID));
            then.status(200).header("content-type", "application/json").json_body(json!({"jobId": JOB_ID, "status": "failed", "error": "credentials expired"}));
        })
        .await;

    let err = fast_client(&server).poll_job_until_complete(JOB_ID).await.unwrap_err();
    assert!(matches!(err, RelayError::JobFailed { .. }));
    assert_eq!(err.to_string(), "credentials expired");
}

#[tokio::test]
async fn test_failed_job_without_message_uses_default() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/api/jobs/{}/result", JOB_ID));
            then.status(200).json_body(json!({"jobId": JOB_ID, "status": "failed"}));
        })
        .await;

    let err = fast_client(&server).get_job_result(JOB_ID).await.unwrap_err();
    assert_eq!(err.to_string(), "Job processing failed");
}

#[tokio::test]
async fn test_result_error_quotes_non_json_body() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/api/jobs/{}/result", JOB_ID));
            then.status(502).header("content-type", "text/html").body("<html>Bad gateway</html>");
        })
        .await;

    let err = fast_client(&server).get_job_result(JOB_ID).await.unwrap_err();
    assert_eq!(err.to_string(), "Job failed (502): <html>Bad gateway</html>");
}

#[tokio::test]
async fn test_result_error_prefers_json_message() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/api/jobs/{}/result", JOB_ID));
            then.status(409).json_body(json!({"message": "still running"}));
        })
        .await;

    let err = fast_client(&server).get_job_result(JOB_ID).await.unwrap_err();
    assert_eq!(err.to_string(), "still running");
}

#[tokio::test]
async fn test_result_that_is_not_json_is_invalid_response() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/api/jobs/{}/result", JOB_ID));
            then.status(200).body("done!");
        })
        .await;

    let err = fast_client(&server).get_job_result(JOB_ID).await.unwrap_err();
    assert_eq!(err.to_string(), "Invalid response from server");
}

#[tokio::test]
async fn test_html_status_page_is_rejected() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/api/jobs/{}", JOB_ID));
            then.status(200)
                .header("content-type", "text/html; charset=utf-8")
                .body("<!DOCTYPE html><html>login</html>");
        })
        .await;

    let err = fast_client(&server).check_job_status(JOB_ID).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Server error: Expected JSON but got text/html; charset=utf-8. Response: <!DOCTYPE html><html>login</html>"
    );
}

#[tokio::test]
async fn test_stream_collects_chunks_in_order() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/invoke-agent-stream")
                .json_body(json!({"inputText": "Summarise"}));
            then.status(200)
                .header("content-type", "text/event-stream")
                .body("data: {\"chunk\":\"Net income \"}\n\ndata: {\"chunk\":\"rose.\"}\n\ndata: {\"done\":true}\n\n");
        })
        .await;

    let mut seen = Vec::new();
    let text = fast_client(&server)
        .stream_to_string("Summarise", |chunk| seen.push(chunk.to_string()), Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(text, "Net income rose.");
    assert_eq!(seen, vec!["Net income ", "rose."]);
}

#[tokio::test]
async fn test_stream_error_event_fails_the_read() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/invoke-agent-stream");
            then.status(200)
                .header("content-type", "text/event-stream")
                .body("data: {\"chunk\":\"partial\"}\n\ndata: {\"error\":\"Agent invocation failed: boom\"}\n\n");
        })
        .await;

    let err = fast_client(&server)
        .stream_to_string("x", |_| {}, Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::StreamError { .. }));
    assert_eq!(err.to_string(), "Agent invocation failed: boom");
}

#[tokio::test]
async fn test_stream_http_error_reports_status() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/invoke-agent-stream");
            then.status(503);
        })
        .await;

    let err = fast_client(&server)
        .stream_to_string("x", |_| {}, Duration::from_secs(5))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "HTTP 503: Service Unavailable");
}

#[tokio::test]
async fn test_stream_timeout() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/invoke-agent-stream");
            then.status(200)
                .header("content-type", "text/event-stream")
                .delay(Duration::from_secs(2))
                .body("data: {\"done\":true}\n\n");
        })
        .await;

    let err = fast_client(&server)
        .stream_to_string("x", |_| {}, Duration::from_millis(200))
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::StreamTimeout { .. }));
    assert_eq!(err.to_string(), "Request timeout - please try again or use polling mode");
}

#[tokio::test]
async fn test_invoke_agent_decodes_raw_response_when_text_missing() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/invoke-agent").json_body(json!({"prompt": "hi"}));
            then.status(200).header("content-type", "application/json").json_body(json!({
                "success": true,
                "response": "data: {\"event\": {\"contentBlockDelta\": {\"delta\": {\"text\": \"Hello\"}}}}\ndata: {\"event\": {\"messageStop\": {}}}\n",
                "prompt": "hi"
            }));
        })
        .await;

    let text = fast_client(&server).invoke_agent("hi").await.unwrap();
    assert_eq!(text, "Hello");
}

#[tokio::test]
async fn test_sec_filings_through_job_flow() {
    let server = MockServer::start_async().await;
    let answer = "Here are the filings.\nDATA: {\"10-K\": [{\"form_type\": \"10-K\", \"filing_date\": \"2025-02-14\", \"accession_number\": \"0000831001-25-000012\", \"url\": \"https://www.sec.gov/a\"}], \"10-Q\": []}";
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/jobs/submit");
            then.status(202).header("content-type", "application/json").json_body(json!({"jobId": JOB_ID, "status": "pending"}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/api/jobs/{}", JOB_ID));
            then.status(200).header("content-type", "application/json").json_body(json!({"jobId": JOB_ID, "status": "completed"}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/api/jobs/{}/result", JOB_ID));
            then.status(200).header("content-type", "application/json").json_body(json!({"jobId": JOB_ID, "status": "completed", "result": answer}));
        })
        .await;

    let filings = fast_client(&server).sec_filings("Citigroup").await.unwrap();
    assert_eq!(filings.ten_k.len(), 1);
    assert_eq!(filings.ten_k[0].filing_date, "2025-02-14");
    assert_eq!(filings.ten_k[0].accession, "0000831001-25-000012");
    assert!(filings.ten_q.is_empty());
}

#[tokio::test]
async fn test_local_document_chat_requires_an_s3_key() {
    let client = AgentClient::new("http://127.0.0.1:9");

    let err = client.chat_with_local_document("Risks?", &[]).await.unwrap_err();
    assert!(err.to_string().contains("No documents available"));

    let doc = LocalDocument {
        bank_name: "Citigroup".to_string(),
        form_type: "10-K".to_string(),
        s3_key: None,
    };
    let err = client.chat_with_local_document("Risks?", &[doc]).await.unwrap_err();
    assert!(err.to_string().contains("Document missing s3_key"));
}

#[tokio::test]
async fn test_local_document_chat_returns_the_answer_unchanged() {
    let server = MockServer::start_async().await;
    let answer = "Let me fetch the document:\nDATA: {\"pages\": 3}\nCredit risk rose.";

    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/jobs/submit").body_contains("uploads/citi-10k.pdf");
            then.status(202).header("content-type", "application/json")
                .json_body(json!({"jobId": JOB_ID, "status": "pending", "jobType": "agent-invocation"}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/api/jobs/{}", JOB_ID));
            then.status(200).header("content-type", "application/json").json_body(json!({"jobId": JOB_ID, "status": "completed"}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/api/jobs/{}/result", JOB_ID));
            then.status(200).header("content-type", "application/json")
                .json_body(json!({"jobId": JOB_ID, "status": "completed", "result": answer}));
        })
        .await;

    let doc = LocalDocument {
        bank_name: "Citigroup".to_string(),
        form_type: "10-K".to_string(),
        s3_key: Some("uploads/citi-10k.pdf".to_string()),
    };
    let reply = fast_client(&server)
        .chat_with_local_document("Risks?", &[doc])
        .await
        .unwrap();

    assert_eq!(reply.response, answer);
    assert!(reply.sources.is_empty());
}

#[tokio::test]
async fn test_gateway_answer_is_stripped_of_markdown() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/prod/chat").json_body(json!({"prompt": "Liquidity?"}));
            then.status(200).json_body(json!({"response": "## Liquidity\n**Strong** coverage."}));
        })
        .await;

    let gateway = GatewayClient::new(server.url("/prod/chat"));
    assert_eq!(gateway.ask("Liquidity?").await.unwrap(), "Liquidity\nStrong coverage.");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_gateway_errors() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/down");
            then.status(502);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/empty");
            then.status(200).json_body(json!({}));
        })
        .await;

    let err = GatewayClient::new(server.url("/down")).ask("x").await.unwrap_err();
    assert_eq!(err.to_string(), "HTTP error! status: 502");

    let err = GatewayClient::new(server.url("/empty")).ask("x").await.unwrap_err();
    assert_eq!(err.to_string(), "Unknown error");
}
