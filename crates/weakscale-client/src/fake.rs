//! Scripted chat client for exercising the prober and dispatcher

use crate::{ChatClient, ChatRequest, ChatResponse, RequestError, RequestErrorKind};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy)]
pub enum Outcome {
    /// Answer with "response <call number>"
    Ok,
    /// Well-formed response whose choice has no content
    Empty,
    Fail(RequestErrorKind),
    /// Accept the request and never answer
    Hang,
}

pub struct ScriptedClient {
    script: Mutex<VecDeque<Outcome>>,
    /// Used once the script runs out
    fallback: Outcome,
    calls: AtomicUsize,
}

impl ScriptedClient {
    pub fn new(script: Vec<Outcome>, fallback: Outcome) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_then_ok(failures: usize) -> Self {
        Self::new(
            vec![Outcome::Fail(RequestErrorKind::Connect); failures],
            Outcome::Ok,
        )
    }

    pub fn always_failing() -> Self {
        Self::new(Vec::new(), Outcome::Fail(RequestErrorKind::Connect))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn error_of(kind: RequestErrorKind) -> RequestError {
    match kind {
        RequestErrorKind::Timeout => RequestError::Timeout,
        RequestErrorKind::Connect => RequestError::Connect("connection refused".to_string()),
        RequestErrorKind::Status => RequestError::Status {
            status: 503,
            body: "model loading".to_string(),
        },
        RequestErrorKind::MalformedResponse => {
            RequestError::MalformedResponse("expected value".to_string())
        }
        RequestErrorKind::Other => RequestError::Other("boom".to_string()),
    }
}

#[async_trait]
impl ChatClient for ScriptedClient {
    async fn complete(&self, _request: &ChatRequest) -> Result<ChatResponse, RequestError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback);
        match outcome {
            Outcome::Ok => Ok(ChatResponse::from_content(format!("response {}", call))),
            Outcome::Empty => Ok(ChatResponse::default()),
            Outcome::Fail(kind) => Err(error_of(kind)),
            Outcome::Hang => std::future::pending().await,
        }
    }
}
