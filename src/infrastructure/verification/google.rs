use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{instrument, warn};

use super::{classify_status, transport_error};
use crate::config::GoogleSettings;
use crate::domain::services::{GoogleIdentity, IdentityVerifier, VerificationError};
use crate::infrastructure::metrics::record_verification;

const PROVIDER: &str = "google";
const ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

/// Subset of the tokeninfo payload. Google encodes booleans as strings here.
#[derive(Debug, Deserialize)]
struct TokenInfo {
    iss: String,
    aud: String,
    sub: String,
    email: Option<String>,
    email_verified: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

/// Google ID token verifier backed by the tokeninfo endpoint.
#[derive(Clone)]
pub struct HttpGoogleVerifier {
    http: Client,
    settings: GoogleSettings,
}

impl HttpGoogleVerifier {
    pub fn new(http: Client, settings: GoogleSettings) -> Self {
        Self { http, settings }
    }
}

fn check_claims(info: TokenInfo, client_ids: &[String]) -> Result<GoogleIdentity, VerificationError> {
    if !ISSUERS.contains(&info.iss.as_str()) {
        return Err(VerificationError::Rejected("unexpected token issuer".into()));
    }
    if !client_ids.iter().any(|id| id == &info.aud) {
        return Err(VerificationError::Rejected("token audience mismatch".into()));
    }
    if info.email_verified.as_deref() != Some("true") {
        return Err(VerificationError::Rejected("email is not verified".into()));
    }
    let email = info
        .email
        .filter(|e| !e.is_empty())
        .ok_or_else(|| VerificationError::Rejected("token carries no email".into()))?;

    Ok(GoogleIdentity {
        subject: info.sub,
        email,
        name: info.name,
        picture: info.picture,
    })
}

#[async_trait]
impl IdentityVerifier for HttpGoogleVerifier {
    #[instrument(skip(self, id_token))]
    async fn verify_id_token(&self, id_token: &str) -> Result<GoogleIdentity, VerificationError> {
        if !self.settings.enabled {
            record_verification(PROVIDER, "skipped");
            return Err(VerificationError::Unavailable(
                "Google sign-in is not enabled".into(),
            ));
        }

        let result = async {
            let response = self
                .http
                .get(&self.settings.tokeninfo_url)
                .query(&[("id_token", id_token)])
                .send()
                .await
                .map_err(|e| transport_error(PROVIDER, e))?;

            if let Some(err) = classify_status(PROVIDER, response.status()) {
                return Err(err);
            }

            let info: TokenInfo = response.json().await.map_err(|e| {
                VerificationError::Unavailable(format!("tokeninfo response was invalid: {e}"))
            })?;

            check_claims(info, &self.settings.client_ids)
        }
        .await;

        match &result {
            Ok(_) => record_verification(PROVIDER, "passed"),
            Err(VerificationError::Rejected(_)) => record_verification(PROVIDER, "rejected"),
            Err(VerificationError::Unavailable(reason)) => {
                warn!(%reason, "Google tokeninfo unavailable");
                record_verification(PROVIDER, "unavailable");
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn token_info() -> TokenInfo {
        TokenInfo {
            iss: "https://accounts.google.com".into(),
            aud: "client-1".into(),
            sub: "1234567890".into(),
            email: Some("ada@example.com".into()),
            email_verified: Some("true".into()),
            name: Some("Ada".into()),
            picture: None,
        }
    }

    #[test]
    fn test_valid_claims() {
        let identity = check_claims(token_info(), &["client-1".into()]).unwrap();
        assert_eq!(
            identity,
            GoogleIdentity {
                subject: "1234567890".into(),
                email: "ada@example.com".into(),
                name: Some("Ada".into()),
                picture: None,
            }
        );
    }

    #[test]
    fn test_wrong_audience_rejected() {
        let result = check_claims(token_info(), &["other-client".into()]);
        assert!(matches!(result, Err(VerificationError::Rejected(_))));
    }

    #[test]
    fn test_unverified_email_rejected() {
        let mut info = token_info();
        info.email_verified = Some("false".into());
        assert!(matches!(
            check_claims(info, &["client-1".into()]),
            Err(VerificationError::Rejected(_))
        ));
    }

    #[test]
    fn test_foreign_issuer_rejected() {
        let mut info = token_info();
        info.iss = "https://evil.example".into();
        assert!(check_claims(info, &["client-1".into()]).is_err());
    }
}
