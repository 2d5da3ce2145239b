//! Canned-reply transport for tests and offline replay.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::transport::{Transport, TransportOutput};

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Failure(String),
}

/// Answers `(server, query)` pairs from a fixed table and records every call.
/// Unknown pairs get an empty reply.
#[derive(Debug, Default)]
pub struct StubTransport {
    replies: HashMap<(String, String), Reply>,
    calls: Mutex<Vec<(String, String)>>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(mut self, server: &str, query: &str, text: &str) -> Self {
        self.replies
            .insert((server.to_string(), query.to_string()), Reply::Text(text.to_string()));
        self
    }

    /// Fail the call with a timeout after producing `partial`
    pub fn with_failure(mut self, server: &str, query: &str, partial: &str) -> Self {
        self.replies
            .insert((server.to_string(), query.to_string()), Reply::Failure(partial.to_string()));
        self
    }

    /// Every `(server, query)` sent so far, in call order
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().expect("mutex poisoned").clone()
    }

    pub fn calls_to(&self, server: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|(s, _)| s == server)
            .map(|(_, q)| q)
            .collect()
    }

    pub fn was_queried(&self, server: &str, query: &str) -> bool {
        self.calls().iter().any(|(s, q)| s == server && q == query)
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn execute(
        &self,
        server: &str,
        query: &str,
        _flag: &str,
        timeout: Duration,
    ) -> TransportOutput {
        self.calls
            .lock()
            .expect("mutex poisoned")
            .push((server.to_string(), query.to_string()));

        match self.replies.get(&(server.to_string(), query.to_string())) {
            Some(Reply::Text(text)) => TransportOutput::complete(text.clone()),
            Some(Reply::Failure(partial)) => {
                TransportOutput::partial(partial.clone(), TransportError::Timeout(timeout))
            }
            None => TransportOutput::complete(String::new()),
        }
    }
}
