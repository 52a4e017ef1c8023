use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument, warn};

use super::{classify_status, transport_error};
use crate::config::ModerationSettings;
use crate::domain::services::{ContentModerator, Likelihood, SafeSearch, VerificationError};
use crate::infrastructure::metrics::record_verification;

const PROVIDER: &str = "vision";

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateImageResponse {
    safe_search_annotation: Option<SafeSearchAnnotation>,
    error: Option<ApiStatus>,
}

#[derive(Debug, Deserialize)]
struct SafeSearchAnnotation {
    #[serde(default)]
    adult: String,
    #[serde(default)]
    violence: String,
    #[serde(default)]
    racy: String,
}

#[derive(Debug, Deserialize)]
struct ApiStatus {
    #[serde(default)]
    message: String,
}

/// Google Vision SafeSearch moderator.
#[derive(Clone)]
pub struct HttpVisionModerator {
    http: Client,
    settings: ModerationSettings,
    threshold: Likelihood,
}

impl HttpVisionModerator {
    pub fn new(http: Client, settings: ModerationSettings) -> Self {
        let threshold = match Likelihood::parse(&settings.block_threshold) {
            Likelihood::Unknown => Likelihood::Likely,
            parsed => parsed,
        };
        Self {
            http,
            settings,
            threshold,
        }
    }
}

fn interpret(body: AnnotateResponse) -> Result<SafeSearch, VerificationError> {
    let Some(first) = body.responses.into_iter().next() else {
        return Err(VerificationError::Unavailable(
            "vision returned no annotations".into(),
        ));
    };

    if let Some(error) = first.error {
        return Err(VerificationError::Unavailable(format!(
            "vision error: {}",
            error.message
        )));
    }

    Ok(first
        .safe_search_annotation
        .map(|a| SafeSearch {
            adult: Likelihood::parse(&a.adult),
            violence: Likelihood::parse(&a.violence),
            racy: Likelihood::parse(&a.racy),
        })
        .unwrap_or_default())
}

#[async_trait]
impl ContentModerator for HttpVisionModerator {
    #[instrument(skip(self, image), fields(bytes = image.len()))]
    async fn annotate(&self, image: Vec<u8>) -> Result<SafeSearch, VerificationError> {
        if !self.settings.enabled {
            record_verification(PROVIDER, "skipped");
            return Ok(SafeSearch::default());
        }

        let payload = json!({
            "requests": [{
                "image": { "content": STANDARD.encode(&image) },
                "features": [{ "type": "SAFE_SEARCH_DETECTION" }],
            }]
        });

        let result = async {
            let response = self
                .http
                .post(&self.settings.annotate_url)
                .query(&[("key", self.settings.api_key.as_str())])
                .json(&payload)
                .send()
                .await
                .map_err(|e| transport_error(PROVIDER, e))?;

            // A refused API key is our outage, not a verdict on the image.
            if let Some(err) = classify_status(PROVIDER, response.status()) {
                return Err(VerificationError::Unavailable(err.to_string()));
            }

            let body: AnnotateResponse = response.json().await.map_err(|e| {
                VerificationError::Unavailable(format!("vision response was invalid: {e}"))
            })?;

            interpret(body)
        }
        .await;

        match &result {
            Ok(safe_search) => {
                debug!(?safe_search, "SafeSearch annotation received");
                record_verification(PROVIDER, "passed");
            }
            Err(e) => {
                warn!(error = %e, "Vision moderation unavailable");
                record_verification(PROVIDER, "unavailable");
            }
        }

        result
    }

    fn threshold(&self) -> Likelihood {
        self.threshold
    }

    fn fail_open(&self) -> bool {
        self.settings.fail_open
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::verification::build_http_client;

    fn settings(threshold: &str) -> ModerationSettings {
        ModerationSettings {
            enabled: false,
            api_key: String::new(),
            annotate_url: "http://127.0.0.1:9/v1/images:annotate".into(),
            block_threshold: threshold.into(),
            fail_open: true,
        }
    }

    #[test]
    fn test_parses_annotation() {
        let body: AnnotateResponse = serde_json::from_value(json!({
            "responses": [{
                "safeSearchAnnotation": {
                    "adult": "VERY_LIKELY",
                    "spoof": "UNLIKELY",
                    "medical": "UNLIKELY",
                    "violence": "UNLIKELY",
                    "racy": "POSSIBLE"
                }
            }]
        }))
        .unwrap();

        let result = interpret(body).unwrap();
        assert_eq!(result.adult, Likelihood::VeryLikely);
        assert_eq!(result.racy, Likelihood::Possible);
        assert_eq!(result.blocking_category(Likelihood::Likely), Some("adult"));
    }

    #[test]
    fn test_per_image_error_is_unavailable() {
        let body: AnnotateResponse = serde_json::from_value(json!({
            "responses": [{ "error": { "code": 3, "message": "Bad image data." } }]
        }))
        .unwrap();
        assert!(matches!(interpret(body), Err(VerificationError::Unavailable(_))));
    }

    #[test]
    fn test_invalid_threshold_defaults_to_likely() {
        let moderator = HttpVisionModerator::new(build_http_client(1).unwrap(), settings("nope"));
        assert_eq!(moderator.threshold(), Likelihood::Likely);
    }

    #[tokio::test]
    async fn test_disabled_moderator_returns_unknown() {
        let moderator =
            HttpVisionModerator::new(build_http_client(1).unwrap(), settings("POSSIBLE"));
        let result = moderator.annotate(vec![1, 2, 3]).await.unwrap();
        assert_eq!(result, SafeSearch::default());
        assert_eq!(moderator.threshold(), Likelihood::Possible);
    }
}
