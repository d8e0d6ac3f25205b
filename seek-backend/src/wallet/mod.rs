//! Wallet session layer
//!
//! The embedded/external wallet lives in the browser. This module models what
//! the backend needs from it:
//!
//! - **Address resolution**: read the connected account through a
//!   [`WalletConnector`], retrying with a [`BackoffPolicy`] while the wallet is
//!   still initialising. Solana wallets answer `getAccounts` with a
//!   `getPublicKey` fallback; EVM wallets answer `eth_accounts`.
//! - **Chain enforcement**: a connected wallet on any namespace other than the
//!   target chain's is asked to switch.
//! - **Session state**: [`WalletSession`] merges the SDK address with an
//!   address found by identity reconciliation, the latter taking precedence.

mod declared;
mod session;

pub use declared::DeclaredWallet;
pub use session::WalletSession;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::time::Duration;

/// JSON-RPC "internal error" code wallets return while still booting.
const RPC_INTERNAL_ERROR: i64 = -32603;

static SOLANA_ADDRESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[1-9A-HJ-NP-Za-km-z]{32,44}$").expect("valid regex"));
static EVM_ADDRESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainNamespace {
    Solana,
    Eip155,
    Other,
}

impl ChainNamespace {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "solana" => ChainNamespace::Solana,
            "eip155" | "evm" | "ethereum" => ChainNamespace::Eip155,
            _ => ChainNamespace::Other,
        }
    }
}

/// The chain every wallet session is forced onto.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetChain {
    pub namespace: ChainNamespace,
    pub chain_id: String,
}

impl TargetChain {
    pub fn solana(chain_id: impl Into<String>) -> Self {
        Self { namespace: ChainNamespace::Solana, chain_id: chain_id.into() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WalletError {
    pub code: Option<i64>,
    pub message: String,
}

impl WalletError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { code: None, message: message.into() }
    }

    pub fn with_code(code: i64, message: impl Into<String>) -> Self {
        Self { code: Some(code), message: message.into() }
    }

    fn is_retryable(&self) -> bool {
        self.code == Some(RPC_INTERNAL_ERROR)
    }
}

impl fmt::Display for WalletError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "wallet error {}: {}", code, self.message),
            None => write!(f, "wallet error: {}", self.message),
        }
    }
}

impl std::error::Error for WalletError {}

/// Requests a connected wallet answers.
#[async_trait]
pub trait WalletConnector: Send + Sync {
    fn is_connected(&self) -> bool;

    /// Namespace of the active chain; `None` while the wallet is initialising.
    async fn current_chain(&self) -> Option<ChainNamespace>;

    async fn get_accounts(&self) -> Result<Vec<String>, WalletError>;

    async fn get_public_key(&self) -> Result<String, WalletError>;

    async fn eth_accounts(&self) -> Result<Vec<String>, WalletError>;

    async fn switch_chain(&self, chain_id: &str) -> Result<(), WalletError>;
}

/// Retry schedule for wallet reads: `retries` extra attempts, delays doubling
/// from `initial_delay` up to `max_delay`.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    pub retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl BackoffPolicy {
    /// No retries at all.
    pub fn none() -> Self {
        Self { retries: 0, initial_delay: Duration::ZERO, max_delay: Duration::ZERO }
    }

    /// Delay before retry number `retry` (0-based).
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl Default for BackoffPolicy {
    /// Three retries, 500 ms doubling up to 1 s.
    fn default() -> Self {
        Self {
            retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_millis(1000),
        }
    }
}

enum Attempt {
    Found(String),
    Retry,
    GiveUp,
}

fn first_account(accounts: Vec<String>) -> Option<String> {
    accounts.into_iter().map(|a| a.trim().to_string()).find(|a| !a.is_empty())
}

async fn attempt_read(connector: &dyn WalletConnector) -> Attempt {
    let Some(namespace) = connector.current_chain().await else {
        return Attempt::Retry;
    };

    match namespace {
        ChainNamespace::Solana => {
            match connector.get_accounts().await {
                Ok(accounts) => {
                    if let Some(account) = first_account(accounts) {
                        return Attempt::Found(account);
                    }
                }
                Err(e) => log::debug!("[WALLET] getAccounts failed: {}", e),
            }
            match connector.get_public_key().await {
                Ok(key) if !key.trim().is_empty() => Attempt::Found(key.trim().to_string()),
                Ok(_) => Attempt::Retry,
                Err(e) => {
                    log::debug!("[WALLET] getPublicKey failed: {}", e);
                    Attempt::Retry
                }
            }
        }
        _ => match connector.eth_accounts().await {
            Ok(accounts) => first_account(accounts).map_or(Attempt::GiveUp, Attempt::Found),
            Err(e) if e.is_retryable() => Attempt::Retry,
            Err(e) => {
                log::error!("[WALLET] Error getting address: {}", e);
                Attempt::GiveUp
            }
        },
    }
}

/// Read the connected wallet's address, retrying per `policy`.
pub async fn resolve_address(connector: &dyn WalletConnector, policy: &BackoffPolicy) -> Option<String> {
    if !connector.is_connected() {
        return None;
    }

    for attempt in 0..=policy.retries {
        if attempt > 0 {
            tokio::time::sleep(policy.delay(attempt - 1)).await;
        }
        match attempt_read(connector).await {
            Attempt::Found(address) => return Some(address),
            Attempt::GiveUp => return None,
            Attempt::Retry => {
                log::debug!("[WALLET] Address not available yet (attempt {})", attempt + 1);
            }
        }
    }

    log::warn!("[WALLET] Gave up resolving wallet address after {} retries", policy.retries);
    None
}

/// Ask a connected wallet on the wrong namespace to switch to `target`.
/// Returns whether a switch was requested. Failed switches are logged only.
pub async fn enforce_chain(connector: &dyn WalletConnector, target: &TargetChain) -> bool {
    if !connector.is_connected() {
        return false;
    }
    match connector.current_chain().await {
        Some(namespace) if namespace != target.namespace => {
            if let Err(e) = connector.switch_chain(&target.chain_id).await {
                log::warn!("[WALLET] Failed to switch chain to {}: {}", target.chain_id, e);
            }
            true
        }
        _ => false,
    }
}

/// Syntactic address check for a namespace; `Other` accepts either format.
pub fn is_valid_address(namespace: ChainNamespace, address: &str) -> bool {
    match namespace {
        ChainNamespace::Solana => SOLANA_ADDRESS_RE.is_match(address),
        ChainNamespace::Eip155 => EVM_ADDRESS_RE.is_match(address),
        ChainNamespace::Other => {
            SOLANA_ADDRESS_RE.is_match(address) || EVM_ADDRESS_RE.is_match(address)
        }
    }
}
