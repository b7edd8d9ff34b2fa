//! weakscale client harness
//!
//! Waits for one model-serving instance to come up, then sends it a fixed
//! batch of prompts and reports how many succeeded and how long they took.

use clap::Parser;
use std::num::{NonZeroU32, NonZeroU64};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;
use weakscale_client::{
    BatchDispatcher, ChatClient, HarnessConfig, OpenAiClient, ReadinessProber, ReadinessSettings,
    DEFAULT_API_KEY, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_PROMPT,
};
use weakscale_core::Endpoint;

/// weakscale-client - send inference prompts to a serving instance
#[derive(Parser, Debug)]
#[command(name = "weakscale-client")]
#[command(version, about, long_about = None)]
struct Args {
    /// Hostname of the inference server
    #[arg(long)]
    host: String,

    /// Model name to use
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,

    /// Port number of the inference server
    #[arg(long, default_value_t = 8000)]
    port: u16,

    /// API key for authentication
    #[arg(long, default_value = DEFAULT_API_KEY)]
    key: String,

    /// Number of prompts to send
    #[arg(long, default_value = "1")]
    num_prompts: NonZeroU32,

    /// Prompt text sent with every request
    #[arg(long, default_value = DEFAULT_PROMPT)]
    prompt: String,

    /// Token budget per completion
    #[arg(long, default_value_t = DEFAULT_MAX_TOKENS)]
    max_tokens: u32,

    /// Seconds to wait for the server to become ready
    #[arg(long, default_value_t = 3600)]
    ready_timeout_secs: u64,

    /// Seconds between readiness probes
    #[arg(long, default_value = "10")]
    check_interval_secs: NonZeroU64,

    /// Per-request deadline in seconds (no deadline if unset)
    #[arg(long)]
    request_timeout_secs: Option<u64>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn harness_config(&self) -> HarnessConfig {
        let mut config = HarnessConfig::new(Endpoint::new(self.host.clone(), self.port), &self.model);
        config.api_key = self.key.clone();
        config.max_tokens = self.max_tokens;
        config.request_timeout = self.request_timeout_secs.map(Duration::from_secs);
        config
    }

    fn readiness_settings(&self) -> ReadinessSettings {
        ReadinessSettings {
            timeout: Duration::from_secs(self.ready_timeout_secs),
            check_interval: Duration::from_secs(self.check_interval_secs.get()),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    // Initialize logging
    let log_level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let config = args.harness_config();
    let client: Arc<dyn ChatClient> = Arc::new(OpenAiClient::new(&config)?);

    info!("Waiting for server at {} to be ready...", config.endpoint);
    let outcome = ReadinessProber::new(client.clone(), &config, args.readiness_settings())
        .wait_ready()
        .await;
    if !outcome.is_ready() {
        error!(
            attempts = outcome.attempts,
            "Server at {} not ready after waiting {}s",
            config.endpoint,
            outcome.elapsed.as_secs()
        );
        return Ok(ExitCode::FAILURE);
    }

    let report = BatchDispatcher::new(client, &config, &args.prompt)
        .run(args.num_prompts)
        .await;

    if let Some(first) = &report.first_response {
        info!("First response received:");
        println!("\n{}\n", first);
    }
    for line in report.to_string().lines() {
        info!("{}", line);
    }
    info!("Done!");

    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["weakscale-client", "--host", "x1000c0s0b0n0"]).unwrap();
        assert_eq!(args.model, "meta-llama/Llama-3.1-8B-Instruct");
        assert_eq!(args.port, 8000);
        assert_eq!(args.key, "EMPTY");
        assert_eq!(args.num_prompts.get(), 1);

        let config = args.harness_config();
        assert_eq!(config.endpoint.api_base(), "http://x1000c0s0b0n0:8000/v1");
        assert_eq!(config.temperature, 0.0);
        assert!(config.request_timeout.is_none());

        let settings = args.readiness_settings();
        assert_eq!(settings.timeout, Duration::from_secs(3600));
        assert_eq!(settings.check_interval, Duration::from_secs(10));
    }

    #[test]
    fn test_host_is_required() {
        assert!(Args::try_parse_from(["weakscale-client"]).is_err());
    }

    #[test]
    fn test_zero_prompts_rejected() {
        let result =
            Args::try_parse_from(["weakscale-client", "--host", "h", "--num-prompts", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_check_interval_rejected() {
        let result = Args::try_parse_from([
            "weakscale-client",
            "--host",
            "h",
            "--check-interval-secs",
            "0",
        ]);
        assert!(result.is_err());
    }


    #[test]
    fn test_overrides() {
        let args = Args::try_parse_from([
            "weakscale-client",
            "--host",
            "h",
            "--port",
            "8003",
            "--key",
            "k",
            "--num-prompts",
            "25",
            "--request-timeout-secs",
            "30",
        ])
        .unwrap();
        let config = args.harness_config();
        assert_eq!(config.endpoint.port, 8003);
        assert_eq!(config.api_key, "k");
        assert_eq!(config.request_timeout, Some(Duration::from_secs(30)));
        assert_eq!(args.num_prompts.get(), 25);
    }
}
