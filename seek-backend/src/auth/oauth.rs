//! OAuth2 authorization-code flows for Google, X (Twitter) and Discord.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use moka::sync::Cache;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use strum::{AsRefStr, Display, EnumString};

use crate::config::{OAuthConfig, OAuthCredentials};

/// How long a sign-in may sit on the provider's consent screen.
pub const PENDING_AUTH_TTL: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum OAuthProvider {
    Google,
    Twitter,
    Discord,
}

struct ProviderEndpoints {
    authorize_url: &'static str,
    token_url: &'static str,
    profile_url: &'static str,
    scope: &'static str,
    pkce: bool,
    /// Client credentials go in a Basic auth header instead of the form.
    basic_auth: bool,
}

impl OAuthProvider {
    fn endpoints(&self) -> ProviderEndpoints {
        match self {
            OAuthProvider::Google => ProviderEndpoints {
                authorize_url: "https://accounts.google.com/o/oauth2/v2/auth",
                token_url: "https://oauth2.googleapis.com/token",
                profile_url: "https://openidconnect.googleapis.com/v1/userinfo",
                scope: "openid email profile",
                pkce: false,
                basic_auth: false,
            },
            OAuthProvider::Twitter => ProviderEndpoints {
                authorize_url: "https://twitter.com/i/oauth2/authorize",
                token_url: "https://api.twitter.com/2/oauth2/token",
                profile_url: "https://api.twitter.com/2/users/me",
                scope: "tweet.read users.read offline.access",
                pkce: true,
                basic_auth: true,
            },
            OAuthProvider::Discord => ProviderEndpoints {
                authorize_url: "https://discord.com/oauth2/authorize",
                token_url: "https://discord.com/api/oauth2/token",
                profile_url: "https://discord.com/api/users/@me",
                scope: "identify",
                pkce: false,
                basic_auth: false,
            },
        }
    }

    pub fn credentials<'a>(&self, config: &'a OAuthConfig) -> Option<&'a OAuthCredentials> {
        match self {
            OAuthProvider::Google => config.google.as_ref(),
            OAuthProvider::Twitter => config.twitter.as_ref(),
            OAuthProvider::Discord => config.discord.as_ref(),
        }
    }

    pub fn uses_pkce(&self) -> bool {
        self.endpoints().pkce
    }
}

/// A sign-in waiting for the provider's callback.
#[derive(Debug, Clone)]
pub struct PendingAuth {
    pub provider: OAuthProvider,
    pub pkce_verifier: Option<String>,
}

/// Pending sign-ins keyed by the `state` parameter. Entries are single-use.
pub struct PendingAuthStore {
    pending: Cache<String, PendingAuth>,
}

impl PendingAuthStore {
    pub fn new() -> Self {
        Self {
            pending: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(PENDING_AUTH_TTL)
                .build(),
        }
    }

    /// Register a new sign-in. Returns the `state` value and the PKCE
    /// verifier when the provider needs one.
    pub fn begin(&self, provider: OAuthProvider) -> (String, Option<String>) {
        let state = random_token(32);
        let pkce_verifier = provider.uses_pkce().then(|| random_token(64));
        self.pending.insert(
            state.clone(),
            PendingAuth { provider, pkce_verifier: pkce_verifier.clone() },
        );
        (state, pkce_verifier)
    }

    /// Consume a pending sign-in; `None` when unknown, expired or already used.
    pub fn take(&self, state: &str) -> Option<PendingAuth> {
        self.pending.remove(state)
    }
}

impl Default for PendingAuthStore {
    fn default() -> Self {
        Self::new()
    }
}

fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// S256 code challenge for a PKCE verifier.
pub fn pkce_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

pub fn redirect_uri(public_url: &str, provider: OAuthProvider) -> String {
    format!("{}/api/auth/callback/{}", public_url.trim_end_matches('/'), provider)
}

/// Provider consent URL for a new sign-in.
pub fn authorize_url(
    provider: OAuthProvider,
    credentials: &OAuthCredentials,
    redirect_uri: &str,
    state: &str,
    pkce_verifier: Option<&str>,
) -> Result<String, String> {
    let endpoints = provider.endpoints();
    let mut url = url::Url::parse(endpoints.authorize_url)
        .map_err(|e| format!("Invalid authorize URL: {}", e))?;
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("response_type", "code")
            .append_pair("client_id", &credentials.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("scope", endpoints.scope)
            .append_pair("state", state)
            .append_pair("prompt", "select_account");
        if let Some(verifier) = pkce_verifier {
            query
                .append_pair("code_challenge", &pkce_challenge(verifier))
                .append_pair("code_challenge_method", "S256");
        }
    }
    Ok(url.to_string())
}

/// Turns an authorization code into the provider's profile JSON.
#[async_trait]
pub trait ProfileFetcher: Send + Sync {
    async fn fetch_profile(
        &self,
        provider: OAuthProvider,
        credentials: &OAuthCredentials,
        code: &str,
        redirect_uri: &str,
        pkce_verifier: Option<&str>,
    ) -> Result<Value, String>;
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

pub struct OAuthClient {
    client: reqwest::Client,
}

impl OAuthClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn exchange_code(
        &self,
        provider: OAuthProvider,
        credentials: &OAuthCredentials,
        code: &str,
        redirect_uri: &str,
        pkce_verifier: Option<&str>,
    ) -> Result<String, String> {
        let endpoints = provider.endpoints();
        let mut form: Vec<(&str, &str)> = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", credentials.client_id.as_str()),
        ];
        if let Some(verifier) = pkce_verifier {
            form.push(("code_verifier", verifier));
        }

        let mut request = self.client.post(endpoints.token_url);
        if endpoints.basic_auth {
            request = request.basic_auth(&credentials.client_id, Some(&credentials.client_secret));
        } else {
            form.push(("client_secret", credentials.client_secret.as_str()));
        }

        let resp = request
            .form(&form)
            .send()
            .await
            .map_err(|e| format!("{} token request failed: {}", provider, e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(format!("{} token exchange failed ({}): {}", provider, status, text));
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| format!("Failed to parse {} token response: {}", provider, e))?;
        Ok(token.access_token)
    }
}

#[async_trait]
impl ProfileFetcher for OAuthClient {
    async fn fetch_profile(
        &self,
        provider: OAuthProvider,
        credentials: &OAuthCredentials,
        code: &str,
        redirect_uri: &str,
        pkce_verifier: Option<&str>,
    ) -> Result<Value, String> {
        let access_token = self
            .exchange_code(provider, credentials, code, redirect_uri, pkce_verifier)
            .await?;

        let resp = self
            .client
            .get(provider.endpoints().profile_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| format!("{} profile request failed: {}", provider, e))?;

        if !resp.status().is_success() {
            return Err(format!("{} profile request returned {}", provider, resp.status()));
        }

        resp.json()
            .await
            .map_err(|e| format!("Failed to parse {} profile: {}", provider, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> OAuthCredentials {
        OAuthCredentials {
            client_id: "cid".into(),
            client_secret: "secret".into(),
        }
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!("discord".parse::<OAuthProvider>().unwrap(), OAuthProvider::Discord);
        assert_eq!(OAuthProvider::Twitter.to_string(), "twitter");
        assert!("github".parse::<OAuthProvider>().is_err());
    }

    #[test]
    fn test_pending_auth_is_single_use() {
        let store = PendingAuthStore::new();
        let (state, verifier) = store.begin(OAuthProvider::Twitter);
        assert!(verifier.is_some());
        let pending = store.take(&state).unwrap();
        assert_eq!(pending.provider, OAuthProvider::Twitter);
        assert!(store.take(&state).is_none());

        let (_, verifier) = store.begin(OAuthProvider::Google);
        assert!(verifier.is_none());
    }

    #[test]
    fn test_authorize_url_includes_pkce_for_twitter() {
        let url = authorize_url(
            OAuthProvider::Twitter,
            &creds(),
            "http://localhost:8080/api/auth/callback/twitter",
            "st",
            Some("verifier"),
        )
        .unwrap();
        let parsed = url::Url::parse(&url).unwrap();
        let pairs: std::collections::HashMap<_, _> = parsed.query_pairs().into_owned().collect();
        assert_eq!(pairs["state"], "st");
        assert_eq!(pairs["scope"], "tweet.read users.read offline.access");
        assert_eq!(pairs["code_challenge"], pkce_challenge("verifier"));
        assert_eq!(pairs["code_challenge_method"], "S256");
    }

    #[test]
    fn test_pkce_challenge_matches_rfc7636_example() {
        assert_eq!(
            pkce_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_redirect_uri() {
        assert_eq!(
            redirect_uri("https://seek.example/", OAuthProvider::Discord),
            "https://seek.example/api/auth/callback/discord"
        );
    }
}
