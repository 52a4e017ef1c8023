//! Third-party verification contracts.
//!
//! Captcha, identity and image moderation checks are performed by external
//! providers. The application layer only sees these traits and the
//! `Rejected` / `Unavailable` split of [`VerificationError`]; what to do when
//! a provider is unavailable (fail open or closed) is decided by the caller.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Outcome classification shared by every provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    /// The provider answered and said no.
    #[error("verification rejected: {0}")]
    Rejected(String),

    /// Transport failure, timeout, 5xx or an unparseable answer.
    #[error("verification service unavailable: {0}")]
    Unavailable(String),
}

impl VerificationError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Identity asserted by a verified Google ID token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleIdentity {
    pub subject: String,
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

/// SafeSearch likelihood scale, ordered from least to most likely.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Likelihood {
    #[default]
    Unknown,
    VeryUnlikely,
    Unlikely,
    Possible,
    Likely,
    VeryLikely,
}

impl Likelihood {
    /// Parses the provider's wire name. Unrecognized values map to `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "VERY_UNLIKELY" => Self::VeryUnlikely,
            "UNLIKELY" => Self::Unlikely,
            "POSSIBLE" => Self::Possible,
            "LIKELY" => Self::Likely,
            "VERY_LIKELY" => Self::VeryLikely,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::VeryUnlikely => "VERY_UNLIKELY",
            Self::Unlikely => "UNLIKELY",
            Self::Possible => "POSSIBLE",
            Self::Likely => "LIKELY",
            Self::VeryLikely => "VERY_LIKELY",
        }
    }
}

/// The SafeSearch categories that gate uploads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafeSearch {
    #[serde(default)]
    pub adult: Likelihood,
    #[serde(default)]
    pub violence: Likelihood,
    #[serde(default)]
    pub racy: Likelihood,
}

impl SafeSearch {
    /// Returns the first category at or above `threshold`.
    pub fn blocking_category(&self, threshold: Likelihood) -> Option<&'static str> {
        if threshold == Likelihood::Unknown {
            return None;
        }
        [
            ("adult", self.adult),
            ("violence", self.violence),
            ("racy", self.racy),
        ]
        .into_iter()
        .find(|(_, likelihood)| *likelihood >= threshold)
        .map(|(category, _)| category)
    }
}

/// Bot check on signup (Cloudflare Turnstile).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CaptchaVerifier: Send + Sync {
    /// Verifies a client token. A disabled verifier accepts everything.
    async fn verify(&self, token: Option<String>, remote_ip: Option<String>)
        -> Result<(), VerificationError>;

    /// Whether an unavailable provider should let the request through.
    fn fail_open(&self) -> bool;
}

/// Google ID token verification.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify_id_token(&self, id_token: &str) -> Result<GoogleIdentity, VerificationError>;
}

/// Image moderation (Google Vision SafeSearch).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentModerator: Send + Sync {
    /// Annotates an image. A disabled moderator returns an all-`Unknown` result.
    async fn annotate(&self, image: Vec<u8>) -> Result<SafeSearch, VerificationError>;

    /// Likelihood at or above which an upload is blocked.
    fn threshold(&self) -> Likelihood;

    /// Whether an unavailable provider should let the upload through.
    fn fail_open(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_likelihood_ordering() {
        assert!(Likelihood::Unknown < Likelihood::VeryUnlikely);
        assert!(Likelihood::VeryUnlikely < Likelihood::Unlikely);
        assert!(Likelihood::Unlikely < Likelihood::Possible);
        assert!(Likelihood::Possible < Likelihood::Likely);
        assert!(Likelihood::Likely < Likelihood::VeryLikely);
    }

    #[test_case("VERY_LIKELY", Likelihood::VeryLikely)]
    #[test_case("likely", Likelihood::Likely)]
    #[test_case("POSSIBLE", Likelihood::Possible)]
    #[test_case("garbage", Likelihood::Unknown)]
    fn test_likelihood_parse(raw: &str, expected: Likelihood) {
        assert_eq!(Likelihood::parse(raw), expected);
    }

    #[test]
    fn test_blocking_category_at_threshold() {
        let result = SafeSearch {
            adult: Likelihood::Unlikely,
            violence: Likelihood::Likely,
            racy: Likelihood::Possible,
        };
        assert_eq!(result.blocking_category(Likelihood::Likely), Some("violence"));
        assert_eq!(result.blocking_category(Likelihood::VeryLikely), None);
    }

    #[test]
    fn test_unknown_result_never_blocks() {
        assert_eq!(SafeSearch::default().blocking_category(Likelihood::Likely), None);
    }
}
