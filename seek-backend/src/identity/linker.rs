//! Lookup-then-write linking of one identity to one address.

use seek_types::LinkProvider;
use serde_json::{json, Value};

use crate::normalize::extract_address;
use crate::upstream::{UpstreamError, UpstreamResponse, UserServiceClient};

#[derive(Debug, Clone, PartialEq)]
pub enum LinkResult {
    /// The write went through; carries the upstream reply.
    Linked(Value),
    /// The identity already resolves to this address. No write was issued.
    AlreadyLinked,
    /// The identity belongs to another address. No write was issued.
    Conflict { existing_address: String },
    /// No user record at the address.
    UserMissing,
    /// The upstream refused the write.
    Rejected(UpstreamResponse),
    /// The upstream could not be reached.
    Unavailable(UpstreamError),
}

impl LinkResult {
    pub fn is_linked(&self) -> bool {
        matches!(self, LinkResult::Linked(_) | LinkResult::AlreadyLinked)
    }
}

/// Check that a user exists at `address`, then link.
pub async fn link_identity(
    client: &UserServiceClient,
    address: &str,
    provider: LinkProvider,
    value: &str,
) -> LinkResult {
    match client.get_user(address).await {
        Ok(resp) if resp.is_success() => {}
        Ok(resp) => {
            log::warn!(
                "[LINK] No user at {} (status {}); refusing to link {}",
                address,
                resp.status,
                provider.label()
            );
            return LinkResult::UserMissing;
        }
        Err(e) => return LinkResult::Unavailable(e),
    }
    link_existing_user(client, address, provider, value).await
}

/// Link an identity to an address already known to have a user.
///
/// The reverse lookup runs first: a binding to another address is a conflict
/// and a binding to this address needs no write. A failed lookup does not
/// block the write.
pub async fn link_existing_user(
    client: &UserServiceClient,
    address: &str,
    provider: LinkProvider,
    value: &str,
) -> LinkResult {
    match client.get_user_by(provider, value).await {
        Ok(resp) if resp.is_success() => {
            if let Some(existing) = extract_address(&resp.body) {
                if existing.eq_ignore_ascii_case(address) {
                    log::debug!("[LINK] {} already linked to {}", provider.label(), address);
                    return LinkResult::AlreadyLinked;
                }
                log::warn!(
                    "[LINK] {} is linked to {}, not {}",
                    provider.label(),
                    existing,
                    address
                );
                return LinkResult::Conflict { existing_address: existing };
            }
        }
        Ok(resp) if resp.status == 404 => {}
        Ok(resp) => {
            log::warn!("[LINK] {} lookup returned {}; continuing", provider.label(), resp.status);
        }
        Err(e) => {
            log::warn!("[LINK] {} lookup failed: {}; continuing", provider.label(), e);
        }
    }

    match client.put_link(address, provider, value).await {
        Ok(resp) if resp.is_success() => {
            log::info!("[LINK] Linked {} to {}", provider.label(), address);
            let body = match resp.parsed() {
                Some(body) => body.clone(),
                None => json!({ "ok": true, "body": resp.text }),
            };
            LinkResult::Linked(body)
        }
        Ok(resp) => {
            log::error!(
                "[LINK] Upstream rejected {} link for {}: {} {}",
                provider.label(),
                address,
                resp.status,
                resp.text
            );
            LinkResult::Rejected(resp)
        }
        Err(e) => {
            log::error!("[LINK] {} link request failed: {}", provider.label(), e);
            LinkResult::Unavailable(e)
        }
    }
}
