use seek_types::AddressSource;

/// Wallet state for one browser session.
///
/// An address found by identity lookup overrides whatever the SDK reports,
/// and counts as connected even when the SDK is not.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WalletSession {
    sdk_address: Option<String>,
    sdk_connected: bool,
    lookup_address: Option<String>,
}

impl WalletSession {
    pub fn from_sdk(address: Option<String>, connected: bool) -> Self {
        Self {
            sdk_address: address.filter(|a| !a.trim().is_empty()),
            sdk_connected: connected,
            lookup_address: None,
        }
    }

    pub fn set_lookup_address(&mut self, address: impl Into<String>) {
        let address = address.into();
        if !address.trim().is_empty() {
            self.lookup_address = Some(address);
        }
    }

    pub fn clear_lookup_address(&mut self) {
        self.lookup_address = None;
    }

    pub fn address(&self) -> Option<&str> {
        self.lookup_address.as_deref().or(self.sdk_address.as_deref())
    }

    pub fn is_connected(&self) -> bool {
        self.sdk_connected || self.lookup_address.is_some()
    }

    pub fn address_source(&self) -> AddressSource {
        if self.lookup_address.is_some() {
            AddressSource::Lookup
        } else if self.sdk_address.is_some() {
            AddressSource::Wallet
        } else {
            AddressSource::None
        }
    }
}
