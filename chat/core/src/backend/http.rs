//! HTTP Answer Endpoint
//!
//! Answer endpoint backed by a JSON-over-HTTP service.
//!
//! # Protocol
//!
//! ```text
//! POST <url>
//! Content-Type: application/json
//!
//! {"question": "How do I make risotto?"}
//!
//! 200 OK
//! {"answer": "...", "status": "success"}
//! ```
//!
//! Non-success statuses, connection failures and undecodable bodies are all
//! errors. No timeout is applied unless one is configured.

use std::time::Duration;

use async_trait::async_trait;

use super::traits::{AnswerBody, AnswerEndpoint, AnswerRequest, EndpointError};
use crate::config::ChatConfig;

/// Reference deployment address
pub const DEFAULT_ENDPOINT_URL: &str = "http://localhost:8000/predict";

/// HTTP answer endpoint client
#[derive(Clone, Debug)]
pub struct HttpAnswerEndpoint {
    /// Full endpoint URL
    url: String,
    /// Per-request timeout, if any
    timeout: Option<Duration>,
    /// HTTP client
    http_client: reqwest::Client,
}

impl HttpAnswerEndpoint {
    /// Create a client for the given URL
    pub fn new(url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, EndpointError> {
        let http_client = reqwest::Client::builder().build()?;
        Ok(Self {
            url: url.into(),
            timeout,
            http_client,
        })
    }

    /// Create from session configuration
    pub fn from_config(config: &ChatConfig) -> Result<Self, EndpointError> {
        Self::new(config.endpoint_url.clone(), config.request_timeout)
    }

    /// Endpoint URL
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Configured request timeout
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

#[async_trait]
impl AnswerEndpoint for HttpAnswerEndpoint {
    fn name(&self) -> &str {
        &self.url
    }

    async fn ask(&self, request: &AnswerRequest) -> Result<AnswerBody, EndpointError> {
        let mut builder = self.http_client.post(&self.url).json(request);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await?;

        // Check for HTTP errors
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(EndpointError::Status { status, body });
        }

        let data: serde_json::Value = response.json().await?;
        Ok(AnswerBody(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};

    /// Serve `router` on an ephemeral port and return its base URL
    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_posts_question_and_decodes_answer() {
        let router = Router::new().route(
            "/predict",
            post(|Json(body): Json<Value>| async move {
                let question = body["question"].as_str().unwrap_or_default().to_string();
                Json(json!({"answer": format!("You asked: {question}"), "status": "success"}))
            }),
        );
        let base = serve(router).await;
        let endpoint = HttpAnswerEndpoint::new(format!("{base}/predict"), None).unwrap();

        let body = endpoint
            .ask(&AnswerRequest::new("What is a roux?"))
            .await
            .unwrap();

        assert_eq!(body.answer_text(), "You asked: What is a roux?");
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let router = Router::new().route(
            "/predict",
            post(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"detail": "Only recipe-related questions are supported"})),
                )
            }),
        );
        let base = serve(router).await;
        let endpoint = HttpAnswerEndpoint::new(format!("{base}/predict"), None).unwrap();

        let err = endpoint
            .ask(&AnswerRequest::new("Who won the match?"))
            .await
            .unwrap_err();

        match err {
            EndpointError::Status { status, body } => {
                assert_eq!(status, 400);
                assert!(body.contains("recipe-related"));
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_json_body_is_error() {
        let router = Router::new().route("/predict", post(|| async { "plain text" }));
        let base = serve(router).await;
        let endpoint = HttpAnswerEndpoint::new(format!("{base}/predict"), None).unwrap();

        let err = endpoint.ask(&AnswerRequest::new("hi")).await.unwrap_err();
        assert!(matches!(err, EndpointError::Transport(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_error() {
        // Bind then drop to get a port nobody listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let endpoint = HttpAnswerEndpoint::new(format!("http://{addr}/predict"), None).unwrap();
        let err = endpoint.ask(&AnswerRequest::new("hi")).await.unwrap_err();
        assert!(matches!(err, EndpointError::Transport(_)));
    }

    #[tokio::test]
    async fn test_configured_timeout_applies() {
        let router = Router::new().route(
            "/predict",
            post(|| async {
                std::future::pending::<()>().await;
                Json(json!({"answer": "never"}))
            }),
        );
        let base = serve(router).await;
        let endpoint = HttpAnswerEndpoint::new(
            format!("{base}/predict"),
            Some(Duration::from_millis(50)),
        )
        .unwrap();

        let err = endpoint.ask(&AnswerRequest::new("hi")).await.unwrap_err();
        match err {
            EndpointError::Transport(e) => assert!(e.is_timeout()),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn test_from_config() {
        let config = ChatConfig {
            endpoint_url: "http://example.com:9000/ask".to_string(),
            request_timeout: Some(Duration::from_secs(5)),
            ..ChatConfig::default()
        };

        let endpoint = HttpAnswerEndpoint::from_config(&config).unwrap();
        assert_eq!(endpoint.url(), "http://example.com:9000/ask");
        assert_eq!(endpoint.name(), "http://example.com:9000/ask");
        assert_eq!(endpoint.timeout(), Some(Duration::from_secs(5)));
    }
}
