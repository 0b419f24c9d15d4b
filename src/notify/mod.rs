//! Outbound webhook delivery
//!
//! Generated signals fan out to registered endpoints. Each endpoint
//! filters on enabled/type/confidence and formats its own payload
//! (generic JSON, Discord embed, Slack blocks). Failed sends retry with
//! exponential backoff, honoring Retry-After on 429; exhausted retries
//! are recorded and returned, never thrown.


use crate::error::Result;
use crate::types::{SignalType, TradingSignal};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Payload shape for a destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookFormat {
    /// Raw signal JSON under an `event` envelope
    Generic,
    /// Discord embed
    Discord,
    /// Slack blocks
    Slack,
}

impl Default for WebhookFormat {
    fn default() -> Self {
        WebhookFormat::Generic
    }
}

/// One registered outbound endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub name: String,
    pub url: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub format: WebhookFormat,
    /// Signal types delivered; empty means all
    #[serde(default)]
    pub event_types: Vec<SignalType>,
    /// Minimum signal confidence to deliver
    #[serde(default)]
    pub min_confidence: u8,
    #[serde(default)]
    pub total_sent: u64,
    #[serde(default)]
    pub failure_count: u64,
    #[serde(default)]
    pub last_triggered_at: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

impl WebhookConfig {
    pub fn new(name: impl Into<String>, url: impl Into<String>, format: WebhookFormat) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            url: url.into(),
            enabled: true,
            format,
            event_types: Vec::new(),
            min_confidence: 0,
            total_sent: 0,
            failure_count: 0,
            last_triggered_at: None,
        }
    }

    fn wants(&self, signal: &TradingSignal) -> bool {
        self.enabled
            && (self.event_types.is_empty() || self.event_types.contains(&signal.signal_type))
            && signal.confidence >= self.min_confidence
    }
}

/// Retry/backoff policy for deliveries
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    pub timeout_secs: u64,
    /// Total delivery attempts per endpoint
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub backoff_multiplier: f64,
    /// Wait on 429 when no Retry-After header is present
    pub rate_limit_wait_secs: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            max_attempts: 3,
            base_delay_ms: 500,
            backoff_multiplier: 2.0,
            rate_limit_wait_secs: 5,
        }
    }
}

/// Outcome of delivering one signal to one endpoint
#[derive(Debug, Clone)]
pub struct DispatchResult {
    pub endpoint_id: Uuid,
    pub endpoint_name: String,
    pub success: bool,
    pub status: Option<u16>,
    pub error: Option<String>,
    /// Attempts made before success or giving up
    pub retry_count: u32,
}

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub retry_after_secs: Option<u64>,
}

/// HTTP seam, mockable in tests
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    async fn post(&self, url: &str, body: &Value) -> Result<TransportResponse>;
}

/// reqwest-backed transport
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl WebhookTransport for HttpTransport {
    async fn post(&self, url: &str, body: &Value) -> Result<TransportResponse> {
        let resp = self.http.post(url).json(body).send().await?;
        let retry_after_secs = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        Ok(TransportResponse {
            status: resp.status().as_u16(),
            retry_after_secs,
        })
    }
}

pub struct WebhookDispatcher {
    config: DeliveryConfig,
    endpoints: RwLock<Vec<WebhookConfig>>,
    transport: Arc<dyn WebhookTransport>,
}

impl WebhookDispatcher {
    pub fn new(config: DeliveryConfig) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(config.timeout_secs)?);
        Ok(Self::with_transport(config, transport))
    }

    pub fn with_transport(config: DeliveryConfig, transport: Arc<dyn WebhookTransport>) -> Self {
        Self {
            config,
            endpoints: RwLock::new(Vec::new()),
            transport,
        }
    }

    // ---- endpoint management ----

    pub fn add_endpoint(&self, endpoint: WebhookConfig) -> Uuid {
        let id = endpoint.id;
        info!("Registered webhook '{}' -> {}", endpoint.name, endpoint.url);
        self.endpoints.write().push(endpoint);
        id
    }

    pub fn remove_endpoint(&self, id: Uuid) -> bool {
        let mut endpoints = self.endpoints.write();
        let before = endpoints.len();
        endpoints.retain(|e| e.id != id);
        endpoints.len() != before
    }

    pub fn set_enabled(&self, id: Uuid, enabled: bool) -> bool {
        let mut endpoints = self.endpoints.write();
        match endpoints.iter_mut().find(|e| e.id == id) {
            Some(endpoint) => {
                endpoint.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn list_endpoints(&self) -> Vec<WebhookConfig> {
        self.endpoints.read().clone()
    }

    /// Replace all endpoints, used when restoring persisted state
    pub fn restore_endpoints(&self, endpoints: Vec<WebhookConfig>) {
        *self.endpoints.write() = endpoints;
    }

    // ---- delivery ----

    /// Deliver a signal to every matching endpoint. Always returns one
    /// result per attempted endpoint; never errors.
    pub async fn dispatch_signal(&self, signal: &TradingSignal) -> Vec<DispatchResult> {
        let targets: Vec<WebhookConfig> = self
            .endpoints
            .read()
            .iter()
            .filter(|e| e.wants(signal))
            .cloned()
            .collect();

        if targets.is_empty() {
            debug!("No webhook endpoints match signal {}", signal.id);
            return Vec::new();
        }

        let sends = targets.iter().map(|endpoint| {
            let payload = build_payload(endpoint.format, signal);
            async move {
                let (success, status, error, retry_count) =
                    self.send_with_retry(&endpoint.url, &payload).await;
                DispatchResult {
                    endpoint_id: endpoint.id,
                    endpoint_name: endpoint.name.clone(),
                    success,
                    status,
                    error,
                    retry_count,
                }
            }
        });
        let results: Vec<DispatchResult> = futures_util::future::join_all(sends).await;

        let now = Utc::now();
        {
            let mut endpoints = self.endpoints.write();
            for result in &results {
                if let Some(endpoint) = endpoints.iter_mut().find(|e| e.id == result.endpoint_id) {
                    endpoint.last_triggered_at = Some(now);
                    if result.success {
                        endpoint.total_sent += 1;
                    } else {
                        endpoint.failure_count += 1;
                    }
                }
            }
        }

        let delivered = results.iter().filter(|r| r.success).count();
        info!(
            "Signal {} delivered to {}/{} endpoints",
            signal.id,
            delivered,
            results.len()
        );
        results
    }

    async fn send_with_retry(
        &self,
        url: &str,
        payload: &Value,
    ) -> (bool, Option<u16>, Option<String>, u32) {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            match self.transport.post(url, payload).await {
                Ok(resp) if (200..300).contains(&resp.status) => {
                    return (true, Some(resp.status), None, attempt);
                }
                Ok(resp) if resp.status == 429 => {
                    if attempt >= self.config.max_attempts {
                        return (
                            false,
                            Some(resp.status),
                            Some("rate limited".to_string()),
                            attempt,
                        );
                    }
                    let wait = resp
                        .retry_after_secs
                        .unwrap_or(self.config.rate_limit_wait_secs);
                    warn!("Webhook rate limited, retrying in {}s", wait);
                    sleep(std::time::Duration::from_secs(wait)).await;
                }
                Ok(resp) => {
                    if attempt >= self.config.max_attempts {
                        return (
                            false,
                            Some(resp.status),
                            Some(format!("HTTP {}", resp.status)),
                            attempt,
                        );
                    }
                    self.backoff(attempt).await;
                }
                Err(e) => {
                    if attempt >= self.config.max_attempts {
                        return (false, None, Some(e.to_string()), attempt);
                    }
                    debug!("Webhook send failed ({}), retrying", e);
                    self.backoff(attempt).await;
                }
            }
        }
    }

    async fn backoff(&self, attempt: u32) {
        let delay = self.config.base_delay_ms as f64
            * self.config.backoff_multiplier.powi(attempt as i32 - 1);
        sleep(std::time::Duration::from_millis(delay as u64)).await;
    }
}

/// Build the destination-specific payload for one signal
fn build_payload(format: WebhookFormat, signal: &TradingSignal) -> Value {
    match format {
        WebhookFormat::Generic => json!({
            "event": "trading_signal",
            "signal": signal,
        }),
        WebhookFormat::Discord => {
            let color = match signal.signal_type {
                SignalType::Buy | SignalType::TakeProfit => 0x2ecc71,
                SignalType::Sell | SignalType::StopLoss => 0xe74c3c,
            };
            let mut fields = vec![
                json!({"name": "Confidence", "value": format!("{}/100", signal.confidence), "inline": true}),
                json!({"name": "Position", "value": format_position(signal), "inline": true}),
                json!({"name": "Entry", "value": format!("${}", signal.entry_price), "inline": true}),
            ];
            if let Some(target) = signal.target_price {
                fields.push(json!({"name": "Target", "value": format!("${}", target), "inline": true}));
            }
            if let Some(stop) = signal.stop_loss_price {
                fields.push(json!({"name": "Stop", "value": format!("${}", stop), "inline": true}));
            }
            json!({
                "embeds": [{
                    "title": format!("{} {} ({})", signal.signal_type, signal.symbol, signal.name),
                    "description": signal.reasons.join("\n"),
                    "color": color,
                    "fields": fields,
                    "footer": {"text": format!("mint: {}", signal.mint)},
                    "timestamp": signal.generated_at.to_rfc3339(),
                }]
            })
        }
        WebhookFormat::Slack => {
            let headline = format!(
                "*{} {}* (confidence {}/100)",
                signal.signal_type, signal.symbol, signal.confidence
            );
            let mut lines = vec![
                format!("Entry: ${}", signal.entry_price),
                format!("Position: {}", format_position(signal)),
            ];
            if let Some(target) = signal.target_price {
                lines.push(format!("Target: ${}", target));
            }
            if let Some(stop) = signal.stop_loss_price {
                lines.push(format!("Stop: ${}", stop));
            }
            for reason in &signal.reasons {
                lines.push(format!("• {}", reason));
            }
            json!({
                "text": headline,
                "blocks": [
                    {"type": "section", "text": {"type": "mrkdwn", "text": headline}},
                    {"type": "section", "text": {"type": "mrkdwn", "text": lines.join("\n")}},
                ]
            })
        }
    }
}

fn format_position(signal: &TradingSignal) -> String {
    match signal.position_size_kind {
        crate::types::PositionSizeKind::PercentOfBankroll => {
            format!("{}% of bankroll", signal.position_size)
        }
        crate::types::PositionSizeKind::FixedUnits => format!("{} SOL", signal.position_size),
    }
}
