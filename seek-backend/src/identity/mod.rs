//! Identity reconciliation: bind social identities and wallet addresses to
//! User Service records.
//!
//! [`linker`] holds the lookup-then-write flow shared by the explicit PUT
//! routes and by [`Reconciler`], which runs the whole onboarding decision for
//! one browser session.

pub mod linker;
mod reconcile;

pub use linker::{link_existing_user, link_identity, LinkResult};
pub use reconcile::{Reconciler, SyncTracker};

use seek_types::LinkProvider;

use crate::auth::SessionClaims;

/// Normalised social identities from a session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentitySet {
    pub email: Option<String>,
    pub x_handle: Option<String>,
    pub discord_handle: Option<String>,
}

fn clean(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

pub fn normalize_email(email: &str) -> Option<String> {
    clean(Some(email)).map(|e| e.to_lowercase())
}

pub fn normalize_x_handle(handle: &str) -> Option<String> {
    clean(Some(handle.trim().trim_start_matches('@')))
}

pub fn normalize_discord_handle(handle: &str) -> Option<String> {
    clean(Some(handle))
}

/// Normalise a value for `provider`.
pub fn normalize_for(provider: LinkProvider, value: &str) -> Option<String> {
    match provider {
        LinkProvider::Email => normalize_email(value),
        LinkProvider::XHandle => normalize_x_handle(value),
        LinkProvider::DiscordHandle => normalize_discord_handle(value),
    }
}

impl IdentitySet {
    pub fn from_claims(claims: &SessionClaims) -> Self {
        Self {
            email: claims.google_email.as_deref().and_then(normalize_email),
            x_handle: claims.twitter_username.as_deref().and_then(normalize_x_handle),
            discord_handle: claims.discord_username.as_deref().and_then(normalize_discord_handle),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.x_handle.is_none() && self.discord_handle.is_none()
    }

    pub fn get(&self, provider: LinkProvider) -> Option<&str> {
        match provider {
            LinkProvider::Email => self.email.as_deref(),
            LinkProvider::XHandle => self.x_handle.as_deref(),
            LinkProvider::DiscordHandle => self.discord_handle.as_deref(),
        }
    }

    /// Present identities in lookup order: email, X, Discord.
    pub fn entries(&self) -> Vec<(LinkProvider, &str)> {
        LinkProvider::ALL
            .iter()
            .filter_map(|p| self.get(*p).map(|v| (*p, v)))
            .collect()
    }

    /// Cache key for cross-identity lookups of this combination.
    pub fn combo_key(&self) -> String {
        format!(
            "combo:{}|{}|{}",
            self.email.as_deref().unwrap_or_default(),
            self.x_handle.as_deref().unwrap_or_default().to_lowercase(),
            self.discord_handle.as_deref().unwrap_or_default().to_lowercase()
        )
    }
}
