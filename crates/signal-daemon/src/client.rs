//! Signal-cli daemon HTTP client.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::DaemonConfig;
use crate::error::DaemonError;
use crate::types::{Recipient, SendParams, SendResult};

/// JSON-RPC 2.0 request structure.
#[derive(Debug, Serialize)]
struct RpcRequest<'a, T: Serialize> {
    jsonrpc: &'static str,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<T>,
    id: u64,
}

/// JSON-RPC 2.0 response structure.
#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i32,
    message: String,
}

/// Client for communicating with the signal-cli daemon.
#[derive(Clone)]
pub struct SignalClient {
    http: Client,
    config: DaemonConfig,
    request_id: Arc<AtomicU64>,
    connected: Arc<AtomicBool>,
}

impl SignalClient {
    /// Build a client without contacting the daemon.
    pub fn new(config: DaemonConfig) -> Result<Self, DaemonError> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(DaemonError::Http)?;

        Ok(Self {
            http,
            config,
            request_id: Arc::new(AtomicU64::new(1)),
            connected: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Connect to the signal-cli daemon, failing unless its health check passes.
    pub async fn connect(config: DaemonConfig) -> Result<Self, DaemonError> {
        let client = Self::new(config)?;

        if client.health_check().await? {
            info!("Connected to signal-cli daemon at {}", client.config.base_url);
            Ok(client)
        } else {
            Err(DaemonError::HealthCheckFailed)
        }
    }

    /// Whether the last health check succeeded.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Perform a health check against the daemon.
    pub async fn health_check(&self) -> Result<bool, DaemonError> {
        let url = self.config.check_url();
        debug!("Health check: {}", url);

        match self.http.get(&url).send().await {
            Ok(resp) => {
                let ok = resp.status().is_success();
                self.connected.store(ok, Ordering::SeqCst);
                Ok(ok)
            }
            Err(e) => {
                self.connected.store(false, Ordering::SeqCst);
                Err(DaemonError::Http(e))
            }
        }
    }

    /// Send a message using the full SendParams structure.
    pub async fn send(&self, mut params: SendParams) -> Result<SendResult, DaemonError> {
        if params.account.is_none() {
            params.account = self.config.account.clone();
        }

        let result: SendResult = self.rpc_call("send", Some(params)).await?;
        for failure in result.failures() {
            warn!("Daemon reported delivery failure: {}", failure.kind);
        }
        Ok(result)
    }

    /// Send a text message to a recipient.
    pub async fn send_text(&self, recipient: &str, message: &str) -> Result<SendResult, DaemonError> {
        self.send(SendParams::text(recipient, message)).await
    }

    /// Send a text message to a group.
    pub async fn send_to_group(&self, group_id: &str, message: &str) -> Result<SendResult, DaemonError> {
        self.send(SendParams::group(group_id, message)).await
    }

    /// Send a text message to a direct or group recipient.
    pub async fn send_message(&self, to: &Recipient, message: &str) -> Result<SendResult, DaemonError> {
        self.send(SendParams::to(to).with_message(message)).await
    }

    /// Send a sticker given as `packId:stickerId`.
    pub async fn send_sticker(&self, to: &Recipient, sticker: &str) -> Result<SendResult, DaemonError> {
        self.send(SendParams::to(to).with_sticker(sticker)).await
    }

    /// Start a background health monitor that periodically checks the daemon.
    pub fn start_health_monitor(&self, interval: Duration) -> JoinHandle<()> {
        let client = self.clone();

        tokio::spawn(async move {
            let mut consecutive_failures = 0u32;

            loop {
                tokio::time::sleep(interval).await;

                match client.health_check().await {
                    Ok(true) => {
                        if consecutive_failures > 0 {
                            info!("Daemon connection restored");
                        }
                        consecutive_failures = 0;
                    }
                    Ok(false) => {
                        consecutive_failures += 1;
                        warn!("Health check returned not OK (failures: {})", consecutive_failures);
                    }
                    Err(e) => {
                        consecutive_failures += 1;
                        error!("Health check failed: {} (failures: {})", e, consecutive_failures);
                    }
                }
            }
        })
    }

    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }

    /// Make a JSON-RPC call to the daemon.
    pub async fn rpc_call<P: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        params: Option<P>,
    ) -> Result<R, DaemonError> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let request = RpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id,
        };

        debug!("RPC call: {} (id={})", method, id);

        let response = self
            .http
            .post(self.config.rpc_url())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DaemonError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let rpc_response: RpcResponse<R> = response.json().await?;
        if let Some(error) = rpc_response.error {
            return Err(DaemonError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        rpc_response.result.ok_or_else(|| DaemonError::Rpc {
            code: -1,
            message: "No result in response".to_string(),
        })
    }
}

impl std::fmt::Debug for SignalClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalClient")
            .field("config", &self.config)
            .field("connected", &self.is_connected())
            .finish()
    }
}
