use std::env;
use std::time::Duration;

/// Environment variable names - single source of truth
pub mod env_vars {
    pub const PORT: &str = "PORT";
    pub const BIND_ADDR: &str = "SEEK_BIND_ADDR";
    pub const PUBLIC_URL: &str = "SEEK_PUBLIC_URL";
    // User Service (first non-empty alias wins)
    pub const USER_API_URLS: [&str; 3] = ["USER_API_URL", "USER_API_BASE_URL", "USERDB_API_URL"];
    pub const USER_API_KEYS: [&str; 2] = ["USER_API_KEY", "USERDB_API_KEY"];
    pub const USER_API_ALLOW_LOCALHOST: &str = "USER_API_ALLOW_LOCALHOST";
    // Inventory Service
    pub const INVENTORY_API_URLS: [&str; 2] = ["INVENTORY_API_BASE_URL", "INVENTORY_API_URL"];
    pub const INVENTORY_API_KEYS: [&str; 2] = ["INVENTORY_API_KEY", "INVENTORY_SERVICE_API_KEY"];
    // twitterapi.io
    pub const TWITTER_API_KEYS: [&str; 2] = ["TWITTER_API_KEY", "TWITTERAPI_IO_API_KEY"];
    pub const TWITTER_TARGET_ACCOUNT: &str = "SEEK_TWITTER_TARGET_ACCOUNT";
    // OAuth
    pub const GOOGLE_CLIENT_ID: &str = "GOOGLE_CLIENT_ID";
    pub const GOOGLE_CLIENT_SECRET: &str = "GOOGLE_CLIENT_SECRET";
    pub const TWITTER_CLIENT_ID: &str = "TWITTER_CLIENT_ID";
    pub const TWITTER_CLIENT_SECRET: &str = "TWITTER_CLIENT_SECRET";
    pub const DISCORD_CLIENT_ID: &str = "DISCORD_CLIENT_ID";
    pub const DISCORD_CLIENT_SECRET: &str = "DISCORD_CLIENT_SECRET";
    pub const SESSION_SECRETS: [&str; 2] = ["SESSION_SECRET", "NEXTAUTH_SECRET"];
    // Caching
    pub const CACHE_TTL_SECS: &str = "SEEK_CACHE_TTL_SECS";
    // Wallet
    pub const WALLET_CHAIN_ID: &str = "SEEK_WALLET_CHAIN_ID";
}

/// Default values
pub mod defaults {
    pub const PORT: u16 = 8080;
    pub const BIND_ADDR: &str = "0.0.0.0";
    pub const PUBLIC_URL: &str = "http://localhost:8080";
    pub const TWITTER_TARGET_ACCOUNT: &str = "bakelandxyz";
    pub const CACHE_TTL_SECS: u64 = 5 * 60;
    pub const WALLET_CHAIN_ID: &str = "0x1";
}

/// First non-empty value among a list of alias variables.
fn first_env(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| env::var(name).ok())
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// True when a base URL points at the local machine.
pub fn is_localhost_url(url: &str) -> bool {
    let Ok(parsed) = url::Url::parse(url) else {
        return false;
    };
    matches!(
        parsed.host_str(),
        Some("localhost") | Some("127.0.0.1") | Some("0.0.0.0") | Some("[::1]") | Some("::1")
    )
}

/// Base URL + API key of an upstream REST service.
#[derive(Clone, Debug)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub api_key: String,
}

impl UpstreamConfig {
    /// Resolve from alias lists. `Err` carries the message surfaced to API
    /// callers with a 500.
    fn resolve(
        url_vars: &[&str],
        key_vars: &[&str],
        missing_message: &str,
    ) -> Result<Self, String> {
        match (first_env(url_vars), first_env(key_vars)) {
            (Some(base_url), Some(api_key)) => Ok(Self {
                base_url: base_url.trim_end_matches('/').to_string(),
                api_key,
            }),
            _ => Err(missing_message.to_string()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl OAuthCredentials {
    fn from_env(id_var: &str, secret_var: &str) -> Option<Self> {
        let client_id = first_env(&[id_var])?;
        let client_secret = first_env(&[secret_var])?;
        Some(Self { client_id, client_secret })
    }
}

#[derive(Clone, Debug, Default)]
pub struct OAuthConfig {
    pub google: Option<OAuthCredentials>,
    pub twitter: Option<OAuthCredentials>,
    pub discord: Option<OAuthCredentials>,
}

#[derive(Clone, Debug)]
pub struct WalletConfig {
    /// Chain id wallets are asked to switch to.
    pub chain_id: String,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self { chain_id: defaults::WALLET_CHAIN_ID.to_string() }
    }
}

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub bind_addr: String,
    pub public_url: String,
    pub user_api: Result<UpstreamConfig, String>,
    pub inventory_api: Result<UpstreamConfig, String>,
    pub twitter_api_key: Option<String>,
    pub twitter_target_account: String,
    pub oauth: OAuthConfig,
    pub session_secret: Option<String>,
    pub cache_ttl: Duration,
    pub wallet: WalletConfig,
}

impl Config {
    pub fn from_env() -> Self {
        let user_api = UpstreamConfig::resolve(
            &env_vars::USER_API_URLS,
            &env_vars::USER_API_KEYS,
            "USER_API_BASE_URL or USER_API_KEY not configured",
        )
        .and_then(|cfg| {
            if is_localhost_url(&cfg.base_url) && !env_flag(env_vars::USER_API_ALLOW_LOCALHOST) {
                Err("USER_API_BASE_URL must not point to localhost".to_string())
            } else {
                Ok(cfg)
            }
        });

        let inventory_api = UpstreamConfig::resolve(
            &env_vars::INVENTORY_API_URLS,
            &env_vars::INVENTORY_API_KEYS,
            "INVENTORY_API_URL or INVENTORY_API_KEY not configured",
        );

        let oauth = OAuthConfig {
            google: OAuthCredentials::from_env(
                env_vars::GOOGLE_CLIENT_ID,
                env_vars::GOOGLE_CLIENT_SECRET,
            ),
            twitter: OAuthCredentials::from_env(
                env_vars::TWITTER_CLIENT_ID,
                env_vars::TWITTER_CLIENT_SECRET,
            ),
            discord: OAuthCredentials::from_env(
                env_vars::DISCORD_CLIENT_ID,
                env_vars::DISCORD_CLIENT_SECRET,
            ),
        };

        if oauth.discord.is_none() {
            log::error!("Missing Discord credentials; Discord sign-in is disabled");
        }
        if oauth.google.is_none() {
            log::warn!("Missing Google credentials; Google sign-in is disabled");
        }
        if let Err(e) = &user_api {
            log::warn!("User Service unavailable: {}", e);
        }

        let session_secret = first_env(&env_vars::SESSION_SECRETS);
        if session_secret.is_none() {
            log::warn!("SESSION_SECRET not set; sessions cannot be issued");
        }

        Self {
            port: env_parse(env_vars::PORT, defaults::PORT),
            bind_addr: env::var(env_vars::BIND_ADDR)
                .unwrap_or_else(|_| defaults::BIND_ADDR.to_string()),
            public_url: env::var(env_vars::PUBLIC_URL)
                .unwrap_or_else(|_| defaults::PUBLIC_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            user_api,
            inventory_api,
            twitter_api_key: first_env(&env_vars::TWITTER_API_KEYS),
            twitter_target_account: env::var(env_vars::TWITTER_TARGET_ACCOUNT)
                .unwrap_or_else(|_| defaults::TWITTER_TARGET_ACCOUNT.to_string()),
            oauth,
            session_secret,
            cache_ttl: Duration::from_secs(env_parse(
                env_vars::CACHE_TTL_SECS,
                defaults::CACHE_TTL_SECS,
            )),
            wallet: WalletConfig {
                chain_id: env::var(env_vars::WALLET_CHAIN_ID)
                    .unwrap_or_else(|_| defaults::WALLET_CHAIN_ID.to_string()),
            },
        }
    }

    /// Configuration with nothing external wired up. Tests fill in what they need.
    pub fn for_tests() -> Self {
        Self {
            port: defaults::PORT,
            bind_addr: defaults::BIND_ADDR.to_string(),
            public_url: defaults::PUBLIC_URL.to_string(),
            user_api: Err("USER_API_BASE_URL or USER_API_KEY not configured".to_string()),
            inventory_api: Err("INVENTORY_API_URL or INVENTORY_API_KEY not configured".to_string()),
            twitter_api_key: None,
            twitter_target_account: defaults::TWITTER_TARGET_ACCOUNT.to_string(),
            oauth: OAuthConfig::default(),
            session_secret: Some("test-secret".to_string()),
            cache_ttl: Duration::from_secs(defaults::CACHE_TTL_SECS),
            wallet: WalletConfig::default(),
        }
    }
}
