//! Outbound WhatsApp delivery through an HTTP bridge.
//!
//! The bridge fronts the actual WhatsApp client and exposes
//! `POST {base}/send` taking `{"to", "body", "reference"}`.

use std::time::Duration;

use async_trait::async_trait;
use duebell_channels::{Channel, ChannelAddress, ChannelError, OutboundMessage};
use reqwest::StatusCode;
use serde_json::json;
use tracing::{debug, warn};

pub struct BridgeChannel {
    client: reqwest::Client,
    base_url: String,
    timeout_ms: u64,
}

impl BridgeChannel {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ChannelError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChannelError::ConfigError(format!("bridge http client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_ms: timeout.as_millis() as u64,
        })
    }
}

#[async_trait]
impl Channel for BridgeChannel {
    fn name(&self) -> &str {
        "whatsapp"
    }

    async fn send(&self, to: &ChannelAddress, msg: &OutboundMessage) -> Result<(), ChannelError> {
        let url = format!("{}/send", self.base_url);
        debug!(to = %to, "posting message to whatsapp bridge");

        let resp = self
            .client
            .post(&url)
            .json(&json!({
                "to": to.as_str(),
                "body": msg.body,
                "reference": msg.reference,
            }))
            .send()
            .await
            .map_err(|e| {
                // bridge down is the same as client not paired: retry later
                if e.is_timeout() {
                    ChannelError::Timeout { ms: self.timeout_ms }
                } else if e.is_connect() {
                    ChannelError::NotReady
                } else {
                    ChannelError::SendFailed(e.to_string())
                }
            })?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let text = resp.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), body = %text, "whatsapp bridge rejected send");
        Err(classify_status(status, &text))
    }
}

/// Map a non-2xx bridge response to a channel error.
///
/// 409 and 503 mean the client behind the bridge has no live session.
fn classify_status(status: StatusCode, body: &str) -> ChannelError {
    match status {
        StatusCode::CONFLICT | StatusCode::SERVICE_UNAVAILABLE => ChannelError::NotReady,
        _ if body.trim().is_empty() => ChannelError::SendFailed(format!("bridge returned {status}")),
        _ => ChannelError::SendFailed(format!("bridge returned {status}: {}", body.trim())),
    }
}

/// Stand-in when no bridge is configured. Nothing is ever sent, so due
/// reminders stay pending until a bridge is set up.
pub struct DisabledChannel;

#[async_trait]
impl Channel for DisabledChannel {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn send(&self, _to: &ChannelAddress, _msg: &OutboundMessage) -> Result<(), ChannelError> {
        Err(ChannelError::NotReady)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duebell_channels::normalize_phone;

    #[test]
    fn unpaired_bridge_statuses_are_retryable() {
        assert!(classify_status(StatusCode::CONFLICT, "").is_retryable());
        assert!(classify_status(StatusCode::SERVICE_UNAVAILABLE, "starting").is_retryable());
    }

    #[test]
    fn other_statuses_fail_with_body() {
        let err = classify_status(StatusCode::BAD_REQUEST, " number not on whatsapp\n");
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("number not on whatsapp"));

        let err = classify_status(StatusCode::INTERNAL_SERVER_ERROR, "");
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let ch = BridgeChannel::new("http://127.0.0.1:3000/", Duration::from_secs(1)).unwrap();
        assert_eq!(ch.base_url, "http://127.0.0.1:3000");
    }

    #[tokio::test]
    async fn unreachable_bridge_is_not_ready() {
        // port 9 (discard) is closed on test hosts; connect is refused
        let ch = BridgeChannel::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let to = normalize_phone("8888-1234", "506").unwrap();
        let msg = OutboundMessage {
            body: "hi".into(),
            reference: None,
        };
        let err = ch.send(&to, &msg).await.unwrap_err();
        assert!(err.is_retryable(), "got {err}");
    }

    #[tokio::test]
    async fn disabled_channel_never_sends() {
        let to = normalize_phone("8888-1234", "506").unwrap();
        let msg = OutboundMessage {
            body: "hi".into(),
            reference: None,
        };
        assert!(matches!(
            DisabledChannel.send(&to, &msg).await,
            Err(ChannelError::NotReady)
        ));
    }
}
