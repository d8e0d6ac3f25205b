//! Onboarding decision for one browser session.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use seek_types::{
    AddressSource, GateView, LinkConflict, LinkFailure, LinkProvider, ReconcileOutcome,
    ReconcileRequest,
};
use serde_json::Value;

use super::linker::{link_existing_user, LinkResult};
use super::IdentitySet;
use crate::auth::SessionClaims;
use crate::cache::{cache_key, Clock, SystemClock, TtlCache};
use crate::normalize::extract_address;
use crate::upstream::UserServiceClient;
use crate::wallet::{
    enforce_chain, is_valid_address, resolve_address, BackoffPolicy, ChainNamespace,
    DeclaredWallet, TargetChain, WalletConnector, WalletSession,
};

/// Last value attempted per (address, provider), so an unchanged identity is
/// only pushed upstream once per TTL window.
pub struct SyncTracker {
    attempted: DashMap<(String, LinkProvider), (String, Instant)>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl SyncTracker {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { attempted: DashMap::new(), ttl, clock }
    }

    /// Record `value` and return true unless it was already attempted
    /// within the TTL.
    pub fn should_attempt(&self, address: &str, provider: LinkProvider, value: &str) -> bool {
        let now = self.clock.now();
        let key = (address.to_lowercase(), provider);

        // The read guard must be gone before the map is written.
        let seen = self
            .attempted
            .get(&key)
            .map_or(false, |entry| {
                let (previous, at) = entry.value();
                previous == value && now.duration_since(*at) < self.ttl
            });
        if seen {
            return false;
        }

        if self.attempted.len() > 512 {
            let ttl = self.ttl;
            self.attempted.retain(|_, (_, at)| now.duration_since(*at) < ttl);
        }
        self.attempted.insert(key, (value.to_string(), now));
        true
    }

    pub fn forget(&self, address: &str, provider: LinkProvider) {
        self.attempted.remove(&(address.to_lowercase(), provider));
    }

    pub fn forget_address(&self, address: &str) {
        let address = address.to_lowercase();
        self.attempted.retain(|(a, _), _| *a != address);
    }

    pub fn len(&self) -> usize {
        self.attempted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempted.is_empty()
    }
}

pub struct Reconciler {
    exists: TtlCache<bool>,
    lookups: TtlCache<Option<String>>,
    tracker: SyncTracker,
    target: TargetChain,
}

impl Reconciler {
    pub fn new(ttl: Duration, target: TargetChain) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock), target)
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>, target: TargetChain) -> Self {
        Self {
            exists: TtlCache::with_clock(ttl, clock.clone()),
            lookups: TtlCache::with_clock(ttl, clock.clone()),
            tracker: SyncTracker::new(ttl, clock),
            target,
        }
    }

    /// Drop everything known about an address, e.g. after a user is created.
    pub fn forget_address(&self, address: &str) {
        self.exists.invalidate_address(address);
        self.tracker.forget_address(address);
        self.forget_lookups();
    }

    /// Cross-identity lookups are keyed by identity combination, not address,
    /// so any successful link makes all of them suspect.
    pub fn forget_lookups(&self) {
        self.lookups.invalidate_prefix("combo");
    }

    pub async fn reconcile(
        &self,
        client: &UserServiceClient,
        read_cache: &TtlCache<Value>,
        claims: &SessionClaims,
        request: ReconcileRequest,
    ) -> ReconcileOutcome {
        let identities = IdentitySet::from_claims(claims);

        let (mut session, requested_chain) = match request.wallet {
            Some(state) => self.read_wallet(DeclaredWallet::new(state)).await,
            None => (WalletSession::default(), None),
        };

        let saved = request
            .saved_wallet_address
            .as_deref()
            .map(str::trim)
            .filter(|a| is_valid_address(ChainNamespace::Other, a))
            .map(str::to_string);

        // A saved wallet means the user is linking, not switching accounts.
        if session.address().is_none() && saved.is_none() && !identities.is_empty() {
            if let Some(found) = self.lookup_address(client, &identities).await {
                session.set_lookup_address(found);
            }
        }

        let (address, address_source) = match session.address() {
            Some(address) => (Some(address.to_string()), session.address_source()),
            None => match saved {
                Some(saved) => (Some(saved), AddressSource::Saved),
                None => (None, AddressSource::None),
            },
        };

        let mut outcome = ReconcileOutcome {
            address: address.clone(),
            address_source,
            connected: session.is_connected(),
            requested_chain,
            user_exists: None,
            view: GateView::SignIn,
            linked: Vec::new(),
            conflicts: Vec::new(),
            failures: Vec::new(),
        };

        let Some(address) = address else {
            return outcome;
        };

        let exists = self.user_exists(client, &address).await;
        outcome.user_exists = Some(exists);

        if identities.is_empty() {
            return outcome;
        }
        if !exists {
            outcome.view = GateView::CreateAccount;
            return outcome;
        }

        outcome.view = GateView::Full;
        self.link_missing(client, read_cache, &address, &identities, &mut outcome)
            .await;
        outcome
    }

    async fn read_wallet(&self, wallet: DeclaredWallet) -> (WalletSession, Option<String>) {
        let requested_chain = if enforce_chain(&wallet, &self.target).await {
            wallet.requested_chain()
        } else {
            None
        };

        let namespace = wallet.current_chain().await.unwrap_or(ChainNamespace::Other);
        // A declared wallet cannot change mid-request, so one read is enough.
        let address = resolve_address(&wallet, &BackoffPolicy::none())
            .await
            .filter(|address| {
                let valid = is_valid_address(namespace, address);
                if !valid {
                    log::warn!("[RECONCILE] Ignoring invalid wallet address {}", address);
                }
                valid
            });

        (WalletSession::from_sdk(address, wallet.is_connected()), requested_chain)
    }

    /// Find the address bound to any of the identities: email, then X,
    /// then Discord. First hit wins.
    async fn lookup_address(
        &self,
        client: &UserServiceClient,
        identities: &IdentitySet,
    ) -> Option<String> {
        let key = identities.combo_key();
        if let Some(cached) = self.lookups.get(&key) {
            return cached;
        }

        let mut found = None;
        // Only a definite miss (403/404 or an empty record) is worth remembering.
        let mut definite = true;
        for (provider, value) in identities.entries() {
            match client.get_user_by(provider, value).await {
                Ok(resp) if resp.is_success() => {
                    if let Some(address) = extract_address(&resp.body) {
                        log::info!("[RECONCILE] Found address via {}", provider.label());
                        found = Some(address);
                        break;
                    }
                }
                Ok(resp) if resp.status == 403 || resp.status == 404 => {}
                Ok(resp) => {
                    log::warn!(
                        "[RECONCILE] {} lookup returned {}",
                        provider.label(),
                        resp.status
                    );
                    definite = false;
                }
                Err(e) => {
                    // Not cached: a transport error says nothing about the binding.
                    log::error!("[RECONCILE] {} lookup failed: {}", provider.label(), e);
                    return None;
                }
            }
        }

        if found.is_some() || definite {
            self.lookups.insert(key, found.clone());
        }
        found
    }

    /// 200 means the user exists; 403 and 404 mean it does not. Anything else
    /// is treated as absent for this call and not cached.
    async fn user_exists(&self, client: &UserServiceClient, address: &str) -> bool {
        let key = cache_key("exists", address, None);
        if let Some(exists) = self.exists.get(&key) {
            return exists;
        }

        match client.get_user(address).await {
            Ok(resp) if resp.is_success() => {
                self.exists.insert(key, true);
                true
            }
            Ok(resp) if resp.status == 403 || resp.status == 404 => {
                self.exists.insert(key, false);
                false
            }
            Ok(resp) => {
                log::error!("[RECONCILE] Existence check for {} returned {}", address, resp.status);
                false
            }
            Err(e) => {
                log::error!("[RECONCILE] Existence check for {} failed: {}", address, e);
                false
            }
        }
    }

    async fn link_missing(
        &self,
        client: &UserServiceClient,
        read_cache: &TtlCache<Value>,
        address: &str,
        identities: &IdentitySet,
        outcome: &mut ReconcileOutcome,
    ) {
        let record = match client.get_user_unified(address).await {
            Ok(record) => record,
            Err(e) => {
                log::warn!("[RECONCILE] Could not read user {}: {}", address, e);
                return;
            }
        };

        let mut changed = false;
        for (provider, value) in identities.entries() {
            let on_record = record
                .get(provider.body_field())
                .and_then(Value::as_str)
                .and_then(|v| super::normalize_for(provider, v));
            if on_record.map_or(false, |v| v.eq_ignore_ascii_case(value)) {
                continue;
            }
            if !self.tracker.should_attempt(address, provider, value) {
                continue;
            }

            match link_existing_user(client, address, provider, value).await {
                LinkResult::Linked(_) => {
                    changed = true;
                    outcome.linked.push(provider);
                }
                LinkResult::AlreadyLinked => outcome.linked.push(provider),
                LinkResult::Conflict { existing_address } => {
                    outcome.conflicts.push(LinkConflict {
                        provider,
                        handle: value.to_string(),
                        existing_address,
                    });
                }
                LinkResult::UserMissing => {}
                LinkResult::Rejected(resp) => {
                    let message = resp
                        .body
                        .get("error")
                        .or_else(|| resp.body.get("message"))
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or(resp.text);
                    outcome.failures.push(LinkFailure { provider, status: resp.status, message });
                }
                LinkResult::Unavailable(e) => {
                    self.tracker.forget(address, provider);
                    outcome.failures.push(LinkFailure {
                        provider,
                        status: 502,
                        message: e.to_string(),
                    });
                }
            }
        }

        if changed {
            read_cache.invalidate_address(address);
            self.forget_lookups();
        }
    }
}
