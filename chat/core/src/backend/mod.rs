//! Answer Endpoint Integration
//!
//! Abstracted access to the service that answers cooking questions, through
//! a common trait interface.
//!
//! # Available Endpoints
//!
//! - **HTTP**: JSON `POST` to a `/predict`-style endpoint (default)
//!
//! # Usage
//!
//! ```ignore
//! use chat_core::backend::{AnswerEndpoint, AnswerRequest, HttpAnswerEndpoint};
//!
//! let endpoint = HttpAnswerEndpoint::new("http://localhost:8000/predict", None)?;
//! let body = endpoint.ask(&AnswerRequest::new("How do I poach an egg?")).await?;
//! println!("{}", body.answer_text());
//! ```

mod http;
mod traits;

pub use http::{HttpAnswerEndpoint, DEFAULT_ENDPOINT_URL};
pub use traits::{AnswerBody, AnswerEndpoint, AnswerRequest, EndpointError, ANSWER_FIELDS};
