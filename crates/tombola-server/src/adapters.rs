//! Outbound HTTP adapters for the oracle and notification boundaries.
//!
//! The membership service and the delivery webhook are separate processes;
//! both adapters treat their failures the way the engine expects: the
//! oracle fails closed, the sink fails per-call.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

use tombola_engine::{
    ChannelRef, MissingChannel, NotificationSink, NotifyError, NotifyTarget, SubscriptionOracle,
    SubscriptionReport,
};
use tombola_store::UserId;

// ---------------------------------------------------------------------------
// Subscription oracle
// ---------------------------------------------------------------------------

/// Oracle backed by a membership service.  Any transport or decoding
/// failure fails closed: every queried channel is reported missing.
pub struct HttpSubscriptionOracle {
    http: Client,
    base_url: String,
}

#[derive(Serialize)]
struct CheckRequest<'a> {
    user_id: UserId,
    channels: &'a [ChannelRef],
}

#[derive(Deserialize)]
struct CheckResponse {
    all_subscribed: bool,
    #[serde(default)]
    missing: Vec<MissingChannelDto>,
}

#[derive(Deserialize)]
struct MissingChannelDto {
    channel: String,
    #[serde(default)]
    display_name: Option<String>,
}

impl HttpSubscriptionOracle {
    pub fn new(base_url: String) -> Self {
        Self {
            http: Client::new(),
            base_url,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/check", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl SubscriptionOracle for HttpSubscriptionOracle {
    async fn check_all(&self, user_id: UserId, channels: &[ChannelRef]) -> SubscriptionReport {
        if channels.is_empty() {
            return SubscriptionReport::subscribed();
        }

        let response = self
            .http
            .post(self.endpoint())
            .json(&CheckRequest { user_id, channels })
            .send()
            .await;

        let response = match response {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                warn!(status = %r.status(), "oracle returned an error, failing closed");
                return SubscriptionReport::fail_closed(channels);
            }
            Err(e) => {
                warn!(error = %e, "oracle unreachable, failing closed");
                return SubscriptionReport::fail_closed(channels);
            }
        };

        match response.json::<CheckResponse>().await {
            Ok(body) => SubscriptionReport {
                all_subscribed: body.all_subscribed,
                missing: body
                    .missing
                    .into_iter()
                    .map(|m| MissingChannel {
                        display_name: m.display_name.unwrap_or_else(|| m.channel.clone()),
                        channel: m.channel,
                    })
                    .collect(),
            },
            Err(e) => {
                warn!(error = %e, "oracle response did not decode, failing closed");
                SubscriptionReport::fail_closed(channels)
            }
        }
    }
}

/// Development oracle that treats everyone as subscribed.  Used when no
/// membership service is configured.
pub struct AllowAllOracle;

#[async_trait]
impl SubscriptionOracle for AllowAllOracle {
    async fn check_all(&self, _user_id: UserId, _channels: &[ChannelRef]) -> SubscriptionReport {
        SubscriptionReport::subscribed()
    }
}

// ---------------------------------------------------------------------------
// Notification sink
// ---------------------------------------------------------------------------

/// Sink that POSTs each notification to a delivery webhook.  With no URL
/// configured, notifications are logged and dropped.
pub struct WebhookNotifier {
    http: Client,
    base_url: Option<String>,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    target_kind: &'static str,
    target_id: i64,
    text: &'a str,
}

impl WebhookNotifier {
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            http: Client::new(),
            base_url,
        }
    }
}

#[async_trait]
impl NotificationSink for WebhookNotifier {
    async fn send(&self, target: NotifyTarget, text: &str) -> Result<(), NotifyError> {
        let Some(base) = &self.base_url else {
            warn!(?target, "NOTIFY_URL unset, dropping notification");
            return Ok(());
        };

        let (target_kind, target_id) = match target {
            NotifyTarget::Chat(chat) => ("chat", chat),
            NotifyTarget::User(user) => ("user", user),
        };

        let response = self
            .http
            .post(format!("{}/send", base.trim_end_matches('/')))
            .json(&SendRequest {
                target_kind,
                target_id,
                text,
            })
            .send()
            .await
            .map_err(|e| NotifyError(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(NotifyError(format!(
                "delivery service returned {}",
                response.status()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_oracle_fails_closed() {
        // Nothing listens on this port.
        let oracle = HttpSubscriptionOracle::new("http://127.0.0.1:1".to_string());
        let channels = vec!["announcements".to_string()];

        let report = oracle.check_all(100, &channels).await;
        assert!(!report.all_subscribed);
        assert_eq!(report.missing.len(), 1);
        assert_eq!(report.missing[0].display_name, "announcements");
    }

    #[tokio::test]
    async fn no_required_channels_short_circuits() {
        let oracle = HttpSubscriptionOracle::new("http://127.0.0.1:1".to_string());
        let report = oracle.check_all(100, &[]).await;
        assert!(report.all_subscribed);
    }

    #[tokio::test]
    async fn unset_webhook_drops_quietly() {
        let sink = WebhookNotifier::new(None);
        assert!(sink.send(NotifyTarget::Chat(-100), "hello").await.is_ok());
    }
}
