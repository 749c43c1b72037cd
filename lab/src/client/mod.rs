//! Execution client.
//!
//! Every outbound call goes through the [`Transport`] trait, the seam where an
//! authenticated fetch plugs in. On top of it:
//!
//! - [`execute`] - synchronous execution, job submission, job polling,
//!   script and dataset fetches
//! - [`types`] - request and response bodies
//! - [`http`] - [`HttpTransport`], the reqwest implementation
//! - [`mock`] - [`MockTransport`], scripted replies for tests

pub mod execute;
pub mod http;
pub mod mock;
pub mod types;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{ClientError, ClientResult};

pub use execute::{
    execute_sync, fetch_json, fetch_script, poll_job, poll_until_done, submit_job, PollStatus,
    Submission,
};
pub use http::HttpTransport;
pub use mock::{Method, MockReply, MockTransport, RecordedRequest};
pub use types::{error_message, strip_job_id, ExecuteRequest, SubmitRequest};

/// Status and body of an HTTP exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self { status, body: body.into() }
    }

    /// 200 with a JSON body.
    pub fn json(value: &Value) -> Self {
        Self::new(200, value.to_string())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body as JSON.
    pub fn parse_json(&self) -> ClientResult<Value> {
        Ok(serde_json::from_str(&self.body)?)
    }

    /// Turn a non-success reply into an error.
    pub fn error_for_status(self) -> ClientResult<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ClientError::Status { status: self.status, body: self.body })
        }
    }
}

/// Sends requests to a lab backend.
///
/// Paths without a scheme are relative to the backend API URL and are the
/// calls that carry credentials; absolute URLs (datasets, scripts) are fetched
/// as-is. Implementations return `Ok` for any HTTP status and reserve `Err`
/// for transport failures.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, path: &str) -> ClientResult<HttpReply>;

    async fn post_json(&self, path: &str, body: &Value) -> ClientResult<HttpReply>;
}
