//! [`WalletConnector`] over the wallet state a browser reports with a request.
//!
//! The backend cannot talk to the wallet itself, so a chain switch is recorded
//! and handed back to the client as an instruction.

use async_trait::async_trait;
use parking_lot::Mutex;
use seek_types::DeclaredWalletState;

use super::{is_valid_address, ChainNamespace, WalletConnector, WalletError};

pub struct DeclaredWallet {
    state: DeclaredWalletState,
    requested_chain: Mutex<Option<String>>,
}

impl DeclaredWallet {
    pub fn new(state: DeclaredWalletState) -> Self {
        Self { state, requested_chain: Mutex::new(None) }
    }

    /// Chain id passed to the last `switch_chain` call.
    pub fn requested_chain(&self) -> Option<String> {
        self.requested_chain.lock().clone()
    }

    fn address(&self) -> Result<String, WalletError> {
        self.state
            .address
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .ok_or_else(|| WalletError::new("wallet did not report an address"))
    }
}

#[async_trait]
impl WalletConnector for DeclaredWallet {
    fn is_connected(&self) -> bool {
        self.state.connected
    }

    async fn current_chain(&self) -> Option<ChainNamespace> {
        if let Some(namespace) = self.state.chain_namespace.as_deref() {
            return Some(ChainNamespace::parse(namespace));
        }
        let address = self.address().ok()?;
        if is_valid_address(ChainNamespace::Solana, &address) {
            Some(ChainNamespace::Solana)
        } else if is_valid_address(ChainNamespace::Eip155, &address) {
            Some(ChainNamespace::Eip155)
        } else {
            None
        }
    }

    async fn get_accounts(&self) -> Result<Vec<String>, WalletError> {
        self.address().map(|a| vec![a])
    }

    async fn get_public_key(&self) -> Result<String, WalletError> {
        self.address()
    }

    async fn eth_accounts(&self) -> Result<Vec<String>, WalletError> {
        Ok(self.address().map(|a| vec![a]).unwrap_or_default())
    }

    async fn switch_chain(&self, chain_id: &str) -> Result<(), WalletError> {
        *self.requested_chain.lock() = Some(chain_id.to_string());
        Ok(())
    }
}
