use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument, warn};

use super::{classify_status, transport_error};
use crate::config::TurnstileSettings;
use crate::domain::services::{CaptchaVerifier, VerificationError};
use crate::infrastructure::metrics::record_verification;

const PROVIDER: &str = "turnstile";

#[derive(Debug, Deserialize)]
struct SiteverifyResponse {
    success: bool,
    #[serde(rename = "error-codes", default)]
    error_codes: Vec<String>,
}

/// Cloudflare Turnstile siteverify client.
#[derive(Clone)]
pub struct HttpTurnstileVerifier {
    http: Client,
    settings: TurnstileSettings,
}

impl HttpTurnstileVerifier {
    pub fn new(http: Client, settings: TurnstileSettings) -> Self {
        Self { http, settings }
    }
}

fn interpret(body: SiteverifyResponse) -> Result<(), VerificationError> {
    if body.success {
        return Ok(());
    }

    // Misconfiguration on our side is an outage, not the user's fault.
    if body
        .error_codes
        .iter()
        .any(|c| c == "missing-input-secret" || c == "invalid-input-secret" || c == "internal-error")
    {
        return Err(VerificationError::Unavailable(format!(
            "turnstile error: {}",
            body.error_codes.join(",")
        )));
    }

    Err(VerificationError::Rejected(if body.error_codes.is_empty() {
        "captcha failed".to_string()
    } else {
        body.error_codes.join(",")
    }))
}

#[async_trait]
impl CaptchaVerifier for HttpTurnstileVerifier {
    #[instrument(skip(self, token))]
    async fn verify(
        &self,
        token: Option<String>,
        remote_ip: Option<String>,
    ) -> Result<(), VerificationError> {
        if !self.settings.enabled {
            record_verification(PROVIDER, "skipped");
            return Ok(());
        }

        let Some(token) = token.filter(|t| !t.trim().is_empty()) else {
            record_verification(PROVIDER, "rejected");
            return Err(VerificationError::Rejected("captcha token is required".into()));
        };

        let mut payload = json!({
            "secret": self.settings.secret,
            "response": token,
        });
        if let Some(ip) = remote_ip {
            payload["remoteip"] = json!(ip);
        }

        let result = async {
            let response = self
                .http
                .post(&self.settings.verify_url)
                .json(&payload)
                .send()
                .await
                .map_err(|e| transport_error(PROVIDER, e))?;

            if let Some(err) = classify_status(PROVIDER, response.status()) {
                return Err(err);
            }

            let body: SiteverifyResponse = response.json().await.map_err(|e| {
                VerificationError::Unavailable(format!("turnstile response was invalid: {e}"))
            })?;

            interpret(body)
        }
        .await;

        match &result {
            Ok(()) => {
                debug!("Turnstile token accepted");
                record_verification(PROVIDER, "passed");
            }
            Err(VerificationError::Rejected(reason)) => {
                debug!(%reason, "Turnstile token rejected");
                record_verification(PROVIDER, "rejected");
            }
            Err(VerificationError::Unavailable(reason)) => {
                warn!(%reason, "Turnstile unavailable");
                record_verification(PROVIDER, "unavailable");
            }
        }

        result
    }

    fn fail_open(&self) -> bool {
        self.settings.fail_open
    }
}
