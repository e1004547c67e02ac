use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use shared_config::AppConfig;

/// Result of a delivery attempt. Never an error: a failed dispatch degrades
/// to `sent: false` and the cause is logged and carried in `detail`.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationOutcome {
    pub sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl NotificationOutcome {
    fn delivered(detail: &str) -> Self {
        Self {
            sent: true,
            detail: Some(detail.to_string()),
        }
    }

    fn failed(detail: String) -> Self {
        Self {
            sent: false,
            detail: Some(detail),
        }
    }
}

pub struct NotificationDispatcher {
    http: reqwest::Client,
    config: Arc<AppConfig>,
}

impl NotificationDispatcher {
    pub fn new(config: Arc<AppConfig>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.notify_timeout_secs))
            .build()
            .unwrap_or_default();

        Self { http, config }
    }

    /// Send the patient a booking confirmation: an email with an attached
    /// calendar event, via the configured mail gateway. When no gateway is
    /// configured the delivery is simulated as successful, so local setups
    /// behave like the real thing minus the side effect.
    pub async fn booking_confirmation(
        &self,
        patient_email: &str,
        patient_name: &str,
        doctor_name: &str,
        start_iso: &str,
        end_iso: &str,
    ) -> NotificationOutcome {
        if !self.config.is_mail_configured() {
            debug!("Mail gateway not configured, simulating booking confirmation");
            return NotificationOutcome::delivered("simulated_email");
        }

        let payload = json!({
            "to": patient_email,
            "subject": format!("Appointment with {}", doctor_name),
            "body": format!("Your appointment with {} on {}", doctor_name, start_iso),
            "calendar_event": {
                "summary": format!("Appointment: {} with {}", patient_name, doctor_name),
                "start": start_iso,
                "end": end_iso,
            }
        });

        match self.post_json(&self.config.mail_gateway_url, &payload).await {
            Ok(()) => NotificationOutcome::delivered("mail_gateway"),
            Err(cause) => {
                warn!("Booking confirmation delivery failed: {}", cause);
                NotificationOutcome::failed(cause)
            }
        }
    }

    /// Deliver a summary report to a doctor's chat-notification webhook
    /// (Slack-style `{"text": ...}` payload). Simulated when the doctor has
    /// no webhook bound.
    pub async fn summary_delivery(
        &self,
        webhook_url: Option<&str>,
        doctor_name: &str,
        summary_text: &str,
    ) -> NotificationOutcome {
        let Some(url) = webhook_url else {
            debug!("No webhook bound for {}, simulating summary delivery", doctor_name);
            return NotificationOutcome::delivered("simulated_webhook");
        };

        let payload = json!({ "text": summary_text });

        match self.post_json(url, &payload).await {
            Ok(()) => NotificationOutcome::delivered("webhook"),
            Err(cause) => {
                warn!("Summary delivery to {} failed: {}", doctor_name, cause);
                NotificationOutcome::failed(cause)
            }
        }
    }

    async fn post_json(&self, url: &str, payload: &serde_json::Value) -> Result<(), String> {
        let response = self
            .http
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    format!("delivery timed out after {}s", self.config.notify_timeout_secs)
                } else {
                    e.to_string()
                }
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(format!("delivery endpoint returned {}", response.status()))
        }
    }
}
