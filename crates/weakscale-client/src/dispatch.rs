//! Sequential batch dispatch against a ready endpoint

use crate::{ChatClient, ChatRequest, HarnessConfig, RequestError, RequestErrorKind};
use std::collections::BTreeMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Prompt sent by every benchmark request
pub const DEFAULT_PROMPT: &str = "Hi, can you introduce yourself?";

/// Aggregate outcome of one batch
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    pub total: u32,
    pub succeeded: u32,
    /// Transport errors plus responses that carried no usable content
    pub failed: u32,
    /// Wall-clock time of the whole batch
    pub elapsed: Duration,
    /// Content of the first successful response
    pub first_response: Option<String>,
    pub failures_by_kind: BTreeMap<RequestErrorKind, u32>,
}

impl DispatchReport {
    /// Batch time divided evenly over all requests.
    ///
    /// Failed requests are included, so this drifts from the true
    /// per-completion latency when failures are common. Note that a reply
    /// without content counts as failed even though the server answered.
    pub fn average(&self) -> Duration {
        self.elapsed.checked_div(self.total).unwrap_or_default()
    }

    fn record_success(&mut self, content: String) {
        self.succeeded += 1;
        if self.first_response.is_none() {
            self.first_response = Some(content);
        }
    }

    fn record_failure(&mut self, kind: RequestErrorKind) {
        self.failed += 1;
        *self.failures_by_kind.entry(kind).or_default() += 1;
    }
}

impl std::fmt::Display for DispatchReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", "=".repeat(80))?;
        writeln!(f, "Summary:")?;
        writeln!(f, "  Total prompts: {}", self.total)?;
        writeln!(f, "  Successful: {}", self.succeeded)?;
        match self.failures_by_kind.get(&RequestErrorKind::MalformedResponse) {
            Some(malformed) => writeln!(
                f,
                "  Failed: {} ({} answered without usable content)",
                self.failed, malformed
            )?,
            None => writeln!(f, "  Failed: {}", self.failed)?,
        }
        for (kind, count) in &self.failures_by_kind {
            writeln!(f, "    {}: {}", kind, count)?;
        }
        writeln!(f, "  Total time: {:.2}s", self.elapsed.as_secs_f64())?;
        writeln!(
            f,
            "  Average time per prompt: {:.2}s",
            self.average().as_secs_f64()
        )?;
        write!(f, "{}", "=".repeat(80))
    }
}

/// Fires a fixed number of identical requests, one after another
pub struct BatchDispatcher {
    client: Arc<dyn ChatClient>,
    request: ChatRequest,
}

impl BatchDispatcher {
    pub fn new(client: Arc<dyn ChatClient>, config: &HarnessConfig, prompt: &str) -> Self {
        Self {
            client,
            request: config.request(prompt),
        }
    }

    /// Send `count` requests and tally the outcomes.
    ///
    /// A failed request is counted and the batch moves on; every request
    /// is always issued.
    pub async fn run(&self, count: NonZeroU32) -> DispatchReport {
        let total = count.get();
        let mut report = DispatchReport {
            total,
            ..Default::default()
        };

        info!(
            "Sending {} prompt(s) to model {}...",
            total, self.request.model
        );

        let start = Instant::now();
        for i in 1..=total {
            info!("Sending prompt {}/{}...", i, total);
            let result = self.client.complete(&self.request).await.and_then(|response| {
                response
                    .first_content()
                    .map(str::to_owned)
                    .ok_or_else(|| {
                        RequestError::MalformedResponse("first choice has no content".to_string())
                    })
            });

            match result {
                Ok(content) => {
                    if report.first_response.is_none() {
                        info!(prompt = i, "First response received");
                    }
                    report.record_success(content);
                }
                Err(err) => {
                    warn!(prompt = i, kind = %err.kind(), "Error on prompt {}: {}", i, err);
                    report.record_failure(err.kind());
                }
            }
        }
        report.elapsed = start.elapsed();

        report
    }
}
