//! Scripted in-memory transport for tests and dry runs

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use super::client::{ChatTransport, TransportError};
use super::types::{ChatRequest, HttpReply};

/// Replays a fixed script of replies, one per `send`, and records every request.
///
/// When the script runs out, `send` fails with a transport error.
#[derive(Debug, Default)]
pub struct MockTransport {
    script: Mutex<VecDeque<Result<HttpReply, TransportError>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockTransport {
    pub fn new(script: Vec<Result<HttpReply, TransportError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A well-formed completion body
    pub fn success(content: &str, reasoning: Option<&str>) -> Result<HttpReply, TransportError> {
        let mut message = json!({ "role": "assistant", "content": content });
        if let Some(reasoning) = reasoning {
            message["reasoning"] = json!(reasoning);
        }
        Ok(HttpReply::ok(json!({ "choices": [{ "message": message }] }).to_string()))
    }

    /// An embedded 429 error
    pub fn rate_limited() -> Result<HttpReply, TransportError> {
        Ok(HttpReply::ok(
            json!({ "error": { "code": 429, "message": "Rate limit exceeded" } }).to_string(),
        ))
    }

    /// An embedded non-rate-limit error
    pub fn api_error(message: &str) -> Result<HttpReply, TransportError> {
        Ok(HttpReply::ok(
            json!({ "error": { "code": 500, "message": message } }).to_string(),
        ))
    }

    /// A 200 body without `choices`
    pub fn malformed() -> Result<HttpReply, TransportError> {
        Ok(HttpReply::ok(json!({ "id": "gen-0", "object": "chat.completion" }).to_string()))
    }

    pub fn connection_refused() -> Result<HttpReply, TransportError> {
        Err(TransportError::Connect("connection refused".to_string()))
    }

    /// Add one more scripted reply
    pub fn push(&self, reply: Result<HttpReply, TransportError>) {
        self.script.lock().unwrap().push_back(reply);
    }

    /// Requests received so far, in order
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn send(&self, request: &ChatRequest) -> Result<HttpReply, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Request("mock script exhausted".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{FailureKind, Message, RequestOutcome, classify_reply};

    fn request() -> ChatRequest {
        ChatRequest::new("mock-model", vec![Message::user("hi")])
    }

    #[tokio::test]
    async fn test_replays_script_in_order() {
        let mock = MockTransport::new(vec![MockTransport::rate_limited(), MockTransport::success("ok", None)]);

        let first = mock.send(&request()).await.unwrap();
        assert_eq!(classify_reply(&first).failure_kind(), Some(FailureKind::RateLimited));

        let second = mock.send(&request()).await.unwrap();
        assert!(matches!(classify_reply(&second), RequestOutcome::Success(_)));

        assert_eq!(mock.call_count(), 2);
        assert_eq!(mock.remaining(), 0);
    }

    #[tokio::test]
    async fn test_exhausted_script_is_transport_error() {
        let mock = MockTransport::default();
        let result = mock.send(&request()).await;
        assert!(matches!(result, Err(TransportError::Request(_))));
    }

    #[tokio::test]
    async fn test_records_requests() {
        let mock = MockTransport::new(vec![]);
        mock.push(MockTransport::success("4", Some("2+2")));
        mock.send(&request()).await.unwrap();

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "mock-model");
        assert_eq!(requests[0].messages[0].content, "hi");
    }

    #[test]
    fn test_canned_replies_classify_as_named() {
        assert_eq!(
            classify_reply(&MockTransport::api_error("boom").unwrap()).failure_kind(),
            Some(FailureKind::ApiError)
        );
        assert_eq!(
            classify_reply(&MockTransport::malformed().unwrap()).failure_kind(),
            Some(FailureKind::MalformedResponse)
        );
        assert!(MockTransport::connection_refused().is_err());
    }
}
