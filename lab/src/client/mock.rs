//! Mock transport for testing
//!
//! Returns scripted replies per route without touching the network, and
//! records every request for assertions.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{HttpReply, Transport};
use crate::error::{ClientError, ClientResult};

/// HTTP method of a recorded or routed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

/// A scripted reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Answer with this status and body.
    Reply(HttpReply),
    /// Fail at the transport level.
    Fail(String),
    /// Wait, then answer with the inner reply.
    Delayed(Duration, Box<MockReply>),
}

impl MockReply {
    pub fn json(value: Value) -> Self {
        MockReply::Reply(HttpReply::json(&value))
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        MockReply::Reply(HttpReply::new(status, body))
    }

    pub fn after(self, delay: Duration) -> Self {
        MockReply::Delayed(delay, Box::new(self))
    }
}

/// A request seen by the mock.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

/// Transport answering from per-route reply queues.
///
/// Replies for a route are consumed in order; the last one is repeated.
/// Unrouted requests get a 404.
#[derive(Clone, Default)]
pub struct MockTransport {
    routes: Arc<Mutex<HashMap<(Method, String), VecDeque<MockReply>>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for `GET path`.
    pub fn on_get(self, path: impl Into<String>, reply: MockReply) -> Self {
        self.queue(Method::Get, path, reply);
        self
    }

    /// Queue a reply for `POST path`.
    pub fn on_post(self, path: impl Into<String>, reply: MockReply) -> Self {
        self.queue(Method::Post, path, reply);
        self
    }

    /// Queue a reply on an already shared mock.
    pub fn queue(&self, method: Method, path: impl Into<String>, reply: MockReply) {
        let mut routes = self.routes.lock().unwrap_or_else(|e| e.into_inner());
        routes.entry((method, path.into())).or_default().push_back(reply);
    }

    /// All requests made so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Requests made to one path.
    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests().into_iter().filter(|r| r.path == path).collect()
    }

    fn next_reply(&self, method: Method, path: &str) -> MockReply {
        let mut routes = self.routes.lock().unwrap_or_else(|e| e.into_inner());
        match routes.get_mut(&(method, path.to_string())) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_else(not_found),
            Some(queue) => queue.front().cloned().unwrap_or_else(not_found),
            None => not_found(),
        }
    }

    async fn answer(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> ClientResult<HttpReply> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedRequest { method, path: path.to_string(), body });

        let mut reply = self.next_reply(method, path);
        loop {
            match reply {
                MockReply::Reply(r) => return Ok(r),
                MockReply::Fail(message) => return Err(ClientError::Transport(message)),
                MockReply::Delayed(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    reply = *inner;
                }
            }
        }
    }
}

fn not_found() -> MockReply {
    MockReply::text(404, "no route")
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, path: &str) -> ClientResult<HttpReply> {
        self.answer(Method::Get, path, None).await
    }

    async fn post_json(&self, path: &str, body: &Value) -> ClientResult<HttpReply> {
        self.answer(Method::Post, path, Some(body.clone())).await
    }
}
