//! Answer Endpoint Traits
//!
//! Trait definitions for the service that turns a question into an answer.
//! The session engine only depends on this abstraction, so tests and
//! alternative transports can stand in for the HTTP endpoint.
//!
//! # Response Shape
//!
//! The endpoint is expected to answer with `{"answer": "..."}` or
//! `{"response": "..."}`. Any other body is not an error: its JSON
//! serialization is shown verbatim as the answer.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Response fields that carry the answer text, in lookup order
pub const ANSWER_FIELDS: [&str; 2] = ["answer", "response"];

/// Request body sent to the endpoint
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRequest {
    /// The user's question, trimmed
    pub question: String,
}

impl AnswerRequest {
    /// Create a request for a question
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
        }
    }
}

/// Decoded response body from the endpoint
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerBody(pub serde_json::Value);

impl AnswerBody {
    /// Resolve the text to show for this body
    ///
    /// Takes the first usable field from [`ANSWER_FIELDS`]; falls back to
    /// the serialized body. A field is usable when it is truthy: a non-empty
    /// string, `true`, a non-zero number, an object or an array. Non-string
    /// values are shown as JSON.
    #[must_use]
    pub fn answer_text(&self) -> String {
        ANSWER_FIELDS
            .iter()
            .filter_map(|field| self.0.get(*field))
            .find_map(truthy_text)
            .unwrap_or_else(|| self.0.to_string())
    }
}

impl From<serde_json::Value> for AnswerBody {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

fn truthy_text(value: &serde_json::Value) -> Option<String> {
    use serde_json::Value;

    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        other => Some(other.to_string()),
    }
}

/// Errors from an answer endpoint
///
/// The session never shows these to the user; every variant becomes the
/// fixed apology message.
#[derive(Debug, Error)]
pub enum EndpointError {
    /// Network, timeout or body decoding failure in the HTTP client
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The endpoint answered with a non-success status
    #[error("endpoint returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, for logs
        body: String,
    },
    /// No answer within the configured time limit
    #[error("no answer within {0:?}")]
    Timeout(Duration),
    /// The endpoint cannot be reached or used for another reason
    #[error("endpoint unavailable: {0}")]
    Unavailable(String),
}

/// Answer endpoint trait
///
/// Implement this to plug in a different answer service.
#[async_trait]
pub trait AnswerEndpoint: Send + Sync {
    /// Endpoint name for logs (e.g., the URL)
    fn name(&self) -> &str;

    /// Ask one question; exactly one attempt, no retry
    async fn ask(&self, request: &AnswerRequest) -> Result<AnswerBody, EndpointError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_value(AnswerRequest::new("How long to boil eggs?")).unwrap();
        assert_eq!(body, json!({"question": "How long to boil eggs?"}));
    }

    #[test]
    fn test_answer_field() {
        let body = AnswerBody(json!({"answer": "Try pasta.", "status": "success"}));
        assert_eq!(body.answer_text(), "Try pasta.");
    }

    #[test]
    fn test_response_field() {
        let body = AnswerBody(json!({"response": "Bake at 350."}));
        assert_eq!(body.answer_text(), "Bake at 350.");
    }

    #[test]
    fn test_answer_preferred_over_response() {
        let body = AnswerBody(json!({"response": "second", "answer": "first"}));
        assert_eq!(body.answer_text(), "first");
    }

    #[test]
    fn test_empty_answer_falls_through() {
        let body = AnswerBody(json!({"answer": "", "response": "from response"}));
        assert_eq!(body.answer_text(), "from response");
    }

    #[test]
    fn test_unknown_shape_is_serialized() {
        let body = AnswerBody(json!({"detail": "Not Found"}));
        assert_eq!(body.answer_text(), r#"{"detail":"Not Found"}"#);

        let body = AnswerBody(json!("just a string"));
        assert_eq!(body.answer_text(), r#""just a string""#);

        let body = AnswerBody(json!({"answer": null}));
        assert_eq!(body.answer_text(), r#"{"answer":null}"#);
    }

    #[test]
    fn test_non_string_answer_shown_as_json() {
        let body = AnswerBody(json!({"answer": 42}));
        assert_eq!(body.answer_text(), "42");

        let body = AnswerBody(json!({"answer": ["salt", "pepper"]}));
        assert_eq!(body.answer_text(), r#"["salt","pepper"]"#);
    }

    #[test]
    fn test_status_error_message() {
        let err = EndpointError::Status {
            status: 500,
            body: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "endpoint returned 500: boom");
    }
}
