//! Third-party verification clients.
//!
//! Thin reqwest wrappers around Cloudflare Turnstile, Google's tokeninfo
//! endpoint and Google Vision SafeSearch. Every client shares one HTTP client
//! with the configured timeout; nothing is retried.

mod google;
mod turnstile;
mod vision;

pub use google::HttpGoogleVerifier;
pub use turnstile::HttpTurnstileVerifier;
pub use vision::HttpVisionModerator;

use std::time::Duration;

use reqwest::{Client, StatusCode};

use crate::domain::services::VerificationError;

/// Builds the shared HTTP client for outbound verification calls.
pub fn build_http_client(timeout_secs: u64) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .user_agent(concat!("omsim-social/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Maps a transport error. Everything reqwest reports is treated as the
/// provider being unreachable.
fn transport_error(provider: &str, err: reqwest::Error) -> VerificationError {
    let kind = if err.is_timeout() { "timed out" } else { "request failed" };
    VerificationError::Unavailable(format!("{provider} {kind}: {err}"))
}

/// Server-side failures are outages; client errors mean the provider refused
/// what we sent.
fn classify_status(provider: &str, status: StatusCode) -> Option<VerificationError> {
    if status.is_success() {
        None
    } else if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        Some(VerificationError::Unavailable(format!(
            "{provider} returned {status}"
        )))
    } else {
        Some(VerificationError::Rejected(format!(
            "{provider} returned {status}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(StatusCode::OK, None)]
    #[test_case(StatusCode::BAD_REQUEST, Some(false))]
    #[test_case(StatusCode::UNAUTHORIZED, Some(false))]
    #[test_case(StatusCode::TOO_MANY_REQUESTS, Some(true))]
    #[test_case(StatusCode::BAD_GATEWAY, Some(true))]
    fn test_classify_status(status: StatusCode, unavailable: Option<bool>) {
        let classified = classify_status("test", status).map(|e| e.is_unavailable());
        assert_eq!(classified, unavailable);
    }

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client(5).is_ok());
    }
}
