//! Waiting for an independently starting server to accept requests
//!
//! Serving engines can spend minutes loading weights before they answer.
//! The prober sends a trivial completion, and on any failure sleeps a fixed
//! interval and tries again until the overall budget runs out.

use crate::{ChatClient, ChatRequest, HarnessConfig, RequestError};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

/// Message sent by each probe
pub const PROBE_PROMPT: &str = "hello";

/// Probe timing
#[derive(Debug, Clone)]
pub struct ReadinessSettings {
    /// Overall budget for the server to become ready
    pub timeout: Duration,
    /// Pause between failed probes
    pub check_interval: Duration,
}

impl Default for ReadinessSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(3600),
            check_interval: Duration::from_secs(10),
        }
    }
}

/// Prober state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessState {
    Waiting,
    Ready,
    TimedOut,
}

impl std::fmt::Display for ReadinessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadinessState::Waiting => write!(f, "Waiting"),
            ReadinessState::Ready => write!(f, "Ready"),
            ReadinessState::TimedOut => write!(f, "TimedOut"),
        }
    }
}

/// Result of a readiness wait
#[derive(Debug, Clone)]
pub struct ReadinessOutcome {
    /// `Ready` or `TimedOut`
    pub state: ReadinessState,
    /// Probes issued, including the successful one
    pub attempts: u32,
    pub elapsed: Duration,
}

impl ReadinessOutcome {
    pub fn is_ready(&self) -> bool {
        self.state == ReadinessState::Ready
    }
}

/// Bounded polling of an inference endpoint
pub struct ReadinessProber {
    client: Arc<dyn ChatClient>,
    request: ChatRequest,
    settings: ReadinessSettings,
}

impl ReadinessProber {
    pub fn new(
        client: Arc<dyn ChatClient>,
        config: &HarnessConfig,
        settings: ReadinessSettings,
    ) -> Self {
        Self {
            client,
            request: config.request(PROBE_PROMPT),
            settings,
        }
    }

    /// Probe until the endpoint answers or the budget is spent
    pub async fn wait_ready(&self) -> ReadinessOutcome {
        let start = Instant::now();
        let mut state = ReadinessState::Waiting;
        let mut attempts = 0u32;

        while start.elapsed() < self.settings.timeout {
            attempts += 1;
            // An attempt may not outlive the overall budget
            let remaining = self.settings.timeout.saturating_sub(start.elapsed());
            let result = timeout(remaining, self.client.complete(&self.request))
                .await
                .unwrap_or(Err(RequestError::Timeout));
            match result {
                Ok(_) => {
                    state = ReadinessState::Ready;
                    break;
                }
                Err(err) => {
                    let remaining = self.settings.timeout.saturating_sub(start.elapsed());
                    warn!(
                        attempt = attempts,
                        kind = %err.kind(),
                        error = %err,
                        "Server not ready yet, waiting time left = {}s",
                        remaining.as_secs()
                    );
                }
            }
            if start.elapsed() >= self.settings.timeout {
                break;
            }
            sleep(self.settings.check_interval).await;
        }

        if state == ReadinessState::Waiting {
            state = ReadinessState::TimedOut;
        }

        let elapsed = start.elapsed();
        debug!(state = %state, attempts = attempts, "Readiness wait finished");
        if state == ReadinessState::Ready {
            info!(
                attempts = attempts,
                elapsed_secs = elapsed.as_secs(),
                "Server is ready"
            );
        }

        ReadinessOutcome {
            state,
            attempts,
            elapsed,
        }
    }
}
