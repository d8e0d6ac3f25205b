//! Shared types for the Seek to Earn backend and its HTTP clients.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

// =====================================================
// Identity Types
// =====================================================

/// A social identity that can be bound to a user record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum LinkProvider {
    Email,
    XHandle,
    DiscordHandle,
}

impl LinkProvider {
    pub const ALL: [LinkProvider; 3] = [
        LinkProvider::Email,
        LinkProvider::XHandle,
        LinkProvider::DiscordHandle,
    ];

    /// Path segment of the upstream write endpoint (`/users/{address}/<segment>`).
    pub fn path_segment(&self) -> &'static str {
        match self {
            LinkProvider::Email => "email",
            LinkProvider::XHandle => "x-handle",
            LinkProvider::DiscordHandle => "discord-handle",
        }
    }

    /// JSON field carrying the value, both in requests and in user records.
    pub fn body_field(&self) -> &'static str {
        match self {
            LinkProvider::Email => "email",
            LinkProvider::XHandle => "xHandle",
            LinkProvider::DiscordHandle => "discordHandle",
        }
    }

    /// Path segment of the reverse lookup (`/users/<segment>/{value}`).
    pub fn lookup_segment(&self) -> &'static str {
        match self {
            LinkProvider::Email => "by-email",
            LinkProvider::XHandle => "by-x",
            LinkProvider::DiscordHandle => "by-discord",
        }
    }

    /// Human label used in error messages.
    pub fn label(&self) -> &'static str {
        match self {
            LinkProvider::Email => "email",
            LinkProvider::XHandle => "X handle",
            LinkProvider::DiscordHandle => "Discord handle",
        }
    }
}

// =====================================================
// Points Types
// =====================================================

/// Bucket of completed tasks kept per address by the User Service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletedScope {
    Daily,
    Weekly,
    #[serde(rename = "one")]
    OneTime,
}

impl CompletedScope {
    /// Parse a scope from a path segment, accepting the aliases the
    /// frontend has historically sent.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "daily" => Some(CompletedScope::Daily),
            "weekly" | "week" => Some(CompletedScope::Weekly),
            "one" | "one-time" | "onetime" => Some(CompletedScope::OneTime),
            _ => None,
        }
    }

    /// Value the upstream expects in `/player-points/{address}/completed/<scope>`.
    pub fn as_upstream(&self) -> &'static str {
        match self {
            CompletedScope::Daily => "daily",
            CompletedScope::Weekly => "weekly",
            CompletedScope::OneTime => "one",
        }
    }
}

/// One entry of a completed-task ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedTaskEntry {
    pub task_id: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// A game task shown in the static catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskCatalogEntry {
    pub id: String,
    pub title: String,
    #[serde(rename = "rewardPP")]
    pub reward_pp: u32,
    pub done: bool,
}

// =====================================================
// Social Task Types
// =====================================================

/// One-time social tasks verified against X.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr)]
pub enum SocialTaskId {
    #[serde(rename = "FOLLOW_BAKELAND_X")]
    #[strum(serialize = "FOLLOW_BAKELAND_X")]
    FollowBakelandX,
    #[serde(rename = "POST_GAMEPLAY_X")]
    #[strum(serialize = "POST_GAMEPLAY_X")]
    PostGameplayX,
}

impl SocialTaskId {
    pub fn title(&self) -> &'static str {
        match self {
            SocialTaskId::FollowBakelandX => "Follow @bakelandxyz on X",
            SocialTaskId::PostGameplayX => "Post a Gameplay Clip on X",
        }
    }

    pub fn reward(&self) -> u32 {
        match self {
            SocialTaskId::FollowBakelandX => 25,
            SocialTaskId::PostGameplayX => 150,
        }
    }

    pub fn verification(&self) -> VerificationKind {
        match self {
            SocialTaskId::FollowBakelandX => VerificationKind::Follow,
            SocialTaskId::PostGameplayX => VerificationKind::GameplayPost,
        }
    }
}

/// What a social verification checks on X.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum VerificationKind {
    Follow,
    GameplayPost,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verification {
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tweet_url: Option<String>,
}

impl Verification {
    pub fn verified() -> Self {
        Self { verified: true, ..Default::default() }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            verified: false,
            error: Some(error.into()),
            tweet_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialTaskStatus {
    pub id: SocialTaskId,
    pub title: String,
    pub reward: u32,
    pub completed: bool,
    pub can_verify: bool,
    pub x_handle: Option<String>,
}

// =====================================================
// Reconciliation Types
// =====================================================

/// Wallet state the browser reports from its wallet SDK.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclaredWalletState {
    #[serde(default)]
    pub address: Option<String>,
    /// `solana`, `eip155`, ...; inferred from the address when absent.
    #[serde(default)]
    pub chain_namespace: Option<String>,
    #[serde(default)]
    pub connected: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileRequest {
    #[serde(default)]
    pub wallet: Option<DeclaredWalletState>,
    /// Last wallet the browser used; present when the user is linking rather
    /// than switching accounts.
    #[serde(default)]
    pub saved_wallet_address: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AddressSource {
    Wallet,
    Lookup,
    Saved,
    None,
}

/// What the onboarding gate should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GateView {
    SignIn,
    CreateAccount,
    Full,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkConflict {
    pub provider: LinkProvider,
    pub handle: String,
    pub existing_address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkFailure {
    pub provider: LinkProvider,
    pub status: u16,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileOutcome {
    pub address: Option<String>,
    pub address_source: AddressSource,
    pub connected: bool,
    /// Chain id the wallet must switch to, when it is on the wrong network.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_chain: Option<String>,
    pub user_exists: Option<bool>,
    pub view: GateView,
    pub linked: Vec<LinkProvider>,
    pub conflicts: Vec<LinkConflict>,
    pub failures: Vec<LinkFailure>,
}
