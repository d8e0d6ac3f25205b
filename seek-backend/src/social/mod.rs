//! X (Twitter) social task verification.

mod twitter_api;

pub use twitter_api::{TwitterApiVerifier, MISSING_KEY};

use async_trait::async_trait;
use seek_types::{Verification, VerificationKind};

/// Checks a social task against X.
#[async_trait]
pub trait SocialVerifier: Send + Sync {
    /// False when no API key is available; callers answer 500 instead of verifying.
    fn is_configured(&self) -> bool;

    async fn verify(&self, handle: &str, kind: VerificationKind) -> Verification;
}

/// Strip a leading '@' and surrounding whitespace from an X handle.
pub fn normalize_handle(handle: &str) -> String {
    handle.trim().trim_start_matches('@').trim().to_string()
}
