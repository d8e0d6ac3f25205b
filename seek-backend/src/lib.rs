//! Seek to Earn backend: API proxy in front of the User, Inventory and X
//! services, social sign-in sessions, and identity reconciliation.

pub mod auth;
pub mod cache;
pub mod config;
pub mod controllers;
pub mod identity;
pub mod normalize;
pub mod social;
pub mod upstream;
pub mod wallet;

use std::sync::Arc;

use actix_web::web;
use serde_json::Value;

use crate::auth::oauth::{OAuthClient, ProfileFetcher};
use crate::auth::PendingAuthStore;
use crate::cache::TtlCache;
use crate::config::Config;
use crate::identity::Reconciler;
use crate::social::{SocialVerifier, TwitterApiVerifier};
use crate::upstream::{HttpUpstream, InventoryClient, UserServiceClient};
use crate::wallet::TargetChain;

pub struct AppState {
    pub config: Config,
    /// `Err` carries the configuration error returned to callers.
    pub user_service: Result<UserServiceClient, String>,
    pub inventory: Result<InventoryClient, String>,
    pub verifier: Arc<dyn SocialVerifier>,
    pub profile_fetcher: Arc<dyn ProfileFetcher>,
    pub pending_auth: PendingAuthStore,
    /// User Service reads keyed `endpoint:address[:extra]`.
    pub read_cache: TtlCache<Value>,
    pub reconciler: Reconciler,
}

impl AppState {
    pub fn new(config: Config, http: reqwest::Client) -> Self {
        let user_service = config
            .user_api
            .as_ref()
            .map(|api| UserServiceClient::new(Arc::new(HttpUpstream::new(api, http.clone()))))
            .map_err(Clone::clone);
        let inventory = config
            .inventory_api
            .as_ref()
            .map(|api| InventoryClient::new(Arc::new(HttpUpstream::new(api, http.clone()))))
            .map_err(Clone::clone);

        if let Ok(client) = &user_service {
            log::info!("User Service: {}", client.describe());
        }
        if let Ok(client) = &inventory {
            log::info!("Inventory Service: {}", client.describe());
        }

        let verifier = TwitterApiVerifier::new(
            http.clone(),
            config.twitter_api_key.clone(),
            &config.twitter_target_account,
        );

        Self {
            user_service,
            inventory,
            verifier: Arc::new(verifier),
            profile_fetcher: Arc::new(OAuthClient::new(http)),
            pending_auth: PendingAuthStore::new(),
            read_cache: TtlCache::new(config.cache_ttl),
            reconciler: Reconciler::new(
                config.cache_ttl,
                TargetChain::solana(config.wallet.chain_id.clone()),
            ),
            config,
        }
    }
}

/// Register every route.
pub fn configure(cfg: &mut web::ServiceConfig) {
    controllers::health::config(cfg);
    controllers::auth::config(cfg);
    controllers::users::config(cfg);
    controllers::player_points::config(cfg);
    controllers::leaderboard::config(cfg);
    controllers::social::config(cfg);
    controllers::game::config(cfg);
    controllers::inventory::config(cfg);
    controllers::identity::config(cfg);
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::auth::oauth::OAuthProvider;
    use crate::config::OAuthCredentials;
    use crate::social::fake::StaticVerifier;
    use crate::upstream::fake::FakeUpstream;
    use crate::upstream::Upstream;
    use async_trait::async_trait;
    use seek_types::Verification;

    /// Profile fetcher returning one canned profile.
    pub struct StaticProfiles(pub Result<Value, String>);

    #[async_trait]
    impl ProfileFetcher for StaticProfiles {
        async fn fetch_profile(
            &self,
            _provider: OAuthProvider,
            _credentials: &OAuthCredentials,
            _code: &str,
            _redirect_uri: &str,
            _pkce_verifier: Option<&str>,
        ) -> Result<Value, String> {
            self.0.clone()
        }
    }

    /// State with no upstreams configured.
    pub fn unconfigured_state() -> AppState {
        let config = Config::for_tests();
        AppState {
            user_service: Err("USER_API_BASE_URL or USER_API_KEY not configured".to_string()),
            inventory: Err("INVENTORY_API_URL or INVENTORY_API_KEY not configured".to_string()),
            verifier: Arc::new(StaticVerifier::unconfigured()),
            profile_fetcher: Arc::new(StaticProfiles(Err("no provider in tests".into()))),
            pending_auth: PendingAuthStore::new(),
            read_cache: TtlCache::new(config.cache_ttl),
            reconciler: Reconciler::new(
                config.cache_ttl,
                TargetChain::solana(config.wallet.chain_id.clone()),
            ),
            config,
        }
    }

    /// State whose User and Inventory services are both `upstream`.
    pub fn state_with(upstream: Arc<FakeUpstream>) -> AppState {
        let shared: Arc<dyn Upstream> = upstream;
        AppState {
            user_service: Ok(UserServiceClient::new(shared.clone())),
            inventory: Ok(InventoryClient::new(shared)),
            verifier: Arc::new(StaticVerifier::new(Verification::verified())),
            ..unconfigured_state()
        }
    }
}
