pub mod doctor;
pub mod error;
pub mod validate;

use anyhow::Context;
use async_trait::async_trait;
use fleet_proto::command::{CommandRequest, CommandResponse};
use reqwest::Client;
use serde_json::Value;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{info, warn};

pub use error::{CommandError, CommandErrorCode};
pub use validate::{validate_command, validate_imei, validate_params, validate_request, ValidationResult};

pub const COMMAND_PATH: &str = "/api/devices/command";

/// Delivers a command to a device. Implementations validate the triple
/// before any I/O and report failures as [`CommandError`].
#[async_trait]
pub trait CommandDispatcher: Send + Sync {
    async fn send_device_command(
        &self,
        imei: &str,
        command: &str,
        params: Value,
    ) -> Result<CommandResponse, CommandError>;
}

fn check_request(imei: &str, command: &str, params: Value) -> Result<CommandRequest, CommandError> {
    validate_request(&Value::from(imei), &Value::from(command), &params).into_result()?;
    Ok(CommandRequest {
        imei: imei.trim().to_string(),
        command: command.trim().to_string(),
        params,
    })
}

#[derive(Debug, Clone)]
pub struct LinkHealth {
    pub rtt_ms: Option<u32>,
    pub consecutive_failures: u32,
}

impl Default for LinkHealth {
    fn default() -> Self {
        Self { rtt_ms: None, consecutive_failures: 0 }
    }
}

impl LinkHealth {
    /// Delay before a caller retries after a network failure:
    /// exponential from 1s, capped at 60s.
    pub fn recommended_backoff(&self) -> Duration {
        if self.consecutive_failures == 0 {
            return Duration::ZERO;
        }
        let secs = 1u64 << (self.consecutive_failures - 1).min(6);
        Duration::from_secs(secs.min(60))
    }
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

/// Posts commands as JSON to the device API.
pub struct HttpDispatcher {
    endpoint: String,
    token: Option<String>,
    client: Client,
    health: Mutex<LinkHealth>,
}

impl HttpDispatcher {
    pub fn new(cfg: HttpConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(cfg.timeout)
            .build()
            .context("build http client")?;

        let token = cfg.token.filter(|t| !t.is_empty());
        if token.is_none() {
            warn!("command: no api token configured, requests are unauthenticated");
        }

        Ok(Self {
            endpoint: format!("{}{}", cfg.base_url.trim_end_matches('/'), COMMAND_PATH),
            token,
            client,
            health: Mutex::new(LinkHealth::default()),
        })
    }

    pub fn link_health(&self) -> LinkHealth {
        self.health().clone()
    }

    fn health(&self) -> MutexGuard<'_, LinkHealth> {
        self.health.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn post(&self, req: &CommandRequest) -> Result<CommandResponse, CommandError> {
        let mut builder = self.client.post(&self.endpoint).json(req);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| CommandError::network(format!("request to {} failed: {}", self.endpoint, e)))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| CommandError::network(format!("read response body: {}", e)))?;

        if !status.is_success() {
            return Err(CommandError::api(format!("device API returned {}: {}", status, api_message(&body))));
        }

        let parsed = if body.trim().is_empty() {
            CommandResponse { success: true, message: None, data: None }
        } else {
            serde_json::from_str::<CommandResponse>(&body)
                .map_err(|e| CommandError::api(format!("malformed response: {}", e)))?
        };

        if !parsed.success {
            return Err(CommandError::api(
                parsed.message.unwrap_or_else(|| "device rejected the command".to_string()),
            ));
        }
        Ok(parsed)
    }
}

// Prefer the API's own message over the raw body.
fn api_message(body: &str) -> String {
    match serde_json::from_str::<CommandResponse>(body) {
        Ok(CommandResponse { message: Some(m), .. }) => m,
        _ if body.trim().is_empty() => "empty body".to_string(),
        _ => body.chars().take(200).collect(),
    }
}

#[async_trait]
impl CommandDispatcher for HttpDispatcher {
    async fn send_device_command(
        &self,
        imei: &str,
        command: &str,
        params: Value,
    ) -> Result<CommandResponse, CommandError> {
        let req = check_request(imei, command, params)?;
        let start = Instant::now();
        let result = self.post(&req).await;

        {
            let mut health = self.health();
            match &result {
                Ok(_) => {
                    let rtt = start.elapsed().as_millis() as u32;
                    health.rtt_ms = Some(rtt);
                    health.consecutive_failures = 0;
                    info!("command: {} -> {} ok (RTT: {}ms)", req.command, req.imei, rtt);
                }
                Err(e) if e.code == CommandErrorCode::Network => {
                    health.consecutive_failures += 1;
                    warn!(
                        "command: {} -> {} unreachable (failures: {}): {}",
                        req.command, req.imei, health.consecutive_failures, e
                    );
                }
                Err(e) => {
                    // the API answered, so the link itself is fine
                    health.consecutive_failures = 0;
                    warn!("command: {} -> {} rejected: {}", req.command, req.imei, e);
                }
            }
        }
        result
    }
}

/// Validates and records commands without sending them.
#[derive(Debug, Default)]
pub struct DryRunDispatcher {
    sent: Mutex<Vec<CommandRequest>>,
}

impl DryRunDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<CommandRequest> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl CommandDispatcher for DryRunDispatcher {
    async fn send_device_command(
        &self,
        imei: &str,
        command: &str,
        params: Value,
    ) -> Result<CommandResponse, CommandError> {
        let req = check_request(imei, command, params)?;
        info!("command: dry run {} -> {}", req.command, req.imei);
        let data = serde_json::to_value(&req).ok();
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).push(req);
        Ok(CommandResponse { success: true, message: Some("dry run".to_string()), data })
    }
}
