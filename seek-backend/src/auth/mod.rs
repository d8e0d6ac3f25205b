//! Identity session: a signed cookie carrying at most one linked handle per
//! social provider.
//!
//! Tokens are `base64url(claims JSON) "." base64url(HMAC-SHA256(payload))`.
//! Each provider's sign-in only ever writes its own field, so linking X after
//! Google keeps the Google email.

pub mod oauth;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;

pub use oauth::{OAuthProvider, PendingAuthStore};

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE: &str = "seek_session";
/// Carries the pending OAuth `state` so the callback is bound to the browser
/// that started the sign-in.
pub const OAUTH_STATE_COOKIE: &str = "seek_oauth_state";

static DISCORD_HANDLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("valid regex"));
static SNOWFLAKE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{17,20}$").expect("valid regex"));

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discord_username: Option<String>,
    /// Stable session subject, assigned on first sign-in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default)]
    pub iat: i64,
}

impl SessionClaims {
    pub fn is_empty(&self) -> bool {
        self.google_email.is_none() && self.twitter_username.is_none() && self.discord_username.is_none()
    }

    /// Public view returned by `/api/auth/session`.
    pub fn to_public_json(&self) -> Value {
        serde_json::json!({
            "googleEmail": self.google_email,
            "twitterUsername": self.twitter_username,
            "discordUsername": self.discord_username,
        })
    }
}

fn non_empty(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Merge a provider profile into the claims.
///
/// - google: email from the profile.
/// - twitter: handle fields only (`data.username`, `username`, `screen_name`,
///   `user.screen_name`), never the display `name`.
/// - discord: `username` only when handle-like, never `global_name`; also
///   clears a Discord snowflake that an older session stored as the X handle.
pub fn apply_sign_in(claims: &mut SessionClaims, provider: OAuthProvider, profile: &Value) {
    match provider {
        OAuthProvider::Google => {
            if let Some(email) = non_empty(profile.get("email")) {
                claims.google_email = Some(email);
            }
        }
        OAuthProvider::Twitter => {
            let handle = non_empty(profile.pointer("/data/username"))
                .or_else(|| non_empty(profile.get("username")))
                .or_else(|| non_empty(profile.get("screen_name")))
                .or_else(|| non_empty(profile.pointer("/user/screen_name")));
            if let Some(handle) = handle {
                claims.twitter_username = Some(handle);
            }
        }
        OAuthProvider::Discord => {
            if let Some(handle) = non_empty(profile.get("username")) {
                if DISCORD_HANDLE_RE.is_match(&handle) {
                    claims.discord_username = Some(handle);
                } else {
                    log::warn!("[AUTH] Ignoring non-handle Discord username");
                }
            }
            let stale = claims
                .twitter_username
                .as_deref()
                .map(|t| SNOWFLAKE_RE.is_match(t))
                .unwrap_or(false);
            if stale {
                claims.twitter_username = None;
            }
        }
    }

    if claims.sub.is_none() {
        claims.sub = Some(uuid::Uuid::new_v4().to_string());
    }
    claims.iat = chrono::Utc::now().timestamp();
}

fn mac(secret: &str, payload: &[u8]) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload);
    mac
}

/// Sign claims into a cookie value.
pub fn encode_session(claims: &SessionClaims, secret: &str) -> Result<String, String> {
    let json = serde_json::to_vec(claims).map_err(|e| format!("Failed to encode session: {}", e))?;
    let payload = URL_SAFE_NO_PAD.encode(json);
    let signature = mac(secret, payload.as_bytes()).finalize().into_bytes();
    Ok(format!("{}.{}", payload, URL_SAFE_NO_PAD.encode(signature)))
}

/// Verify and decode a cookie value. Any tampering or malformed input yields `None`.
pub fn decode_session(token: &str, secret: &str) -> Option<SessionClaims> {
    let (payload, signature) = token.split_once('.')?;
    let signature = URL_SAFE_NO_PAD.decode(signature).ok()?;
    mac(secret, payload.as_bytes()).verify_slice(&signature).ok()?;
    let json = URL_SAFE_NO_PAD.decode(payload).ok()?;
    serde_json::from_slice(&json).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_google_sets_email_only() {
        let mut claims = SessionClaims {
            twitter_username: Some("bar".into()),
            ..Default::default()
        };
        apply_sign_in(&mut claims, OAuthProvider::Google, &json!({"email": "a@b.co", "name": "A"}));
        assert_eq!(claims.google_email.as_deref(), Some("a@b.co"));
        assert_eq!(claims.twitter_username.as_deref(), Some("bar"));
        assert!(claims.sub.is_some());
    }

    #[test]
    fn test_twitter_never_uses_display_name() {
        let mut claims = SessionClaims::default();
        apply_sign_in(
            &mut claims,
            OAuthProvider::Twitter,
            &json!({"data": {"username": "handle", "name": "Display Name"}}),
        );
        assert_eq!(claims.twitter_username.as_deref(), Some("handle"));

        let mut claims = SessionClaims::default();
        apply_sign_in(&mut claims, OAuthProvider::Twitter, &json!({"name": "Only Display"}));
        assert_eq!(claims.twitter_username, None);

        apply_sign_in(&mut claims, OAuthProvider::Twitter, &json!({"user": {"screen_name": "legacy"}}));
        assert_eq!(claims.twitter_username.as_deref(), Some("legacy"));
    }

    #[test]
    fn test_discord_rejects_display_names_and_clears_snowflake() {
        let mut claims = SessionClaims {
            twitter_username: Some("120724898789642240".into()),
            google_email: Some("a@b.co".into()),
            ..Default::default()
        };
        apply_sign_in(
            &mut claims,
            OAuthProvider::Discord,
            &json!({"username": "Cool Name!", "global_name": "Cool Name"}),
        );
        assert_eq!(claims.discord_username, None);
        assert_eq!(claims.twitter_username, None);
        assert_eq!(claims.google_email.as_deref(), Some("a@b.co"));

        apply_sign_in(&mut claims, OAuthProvider::Discord, &json!({"username": " seeker.01 "}));
        assert_eq!(claims.discord_username.as_deref(), Some("seeker.01"));
    }

    #[test]
    fn test_discord_keeps_real_twitter_handle() {
        let mut claims = SessionClaims {
            twitter_username: Some("real_handle".into()),
            ..Default::default()
        };
        apply_sign_in(&mut claims, OAuthProvider::Discord, &json!({"username": "d"}));
        assert_eq!(claims.twitter_username.as_deref(), Some("real_handle"));
    }

    #[test]
    fn test_session_token_roundtrip_and_tamper() {
        let claims = SessionClaims {
            google_email: Some("a@b.co".into()),
            iat: 1,
            ..Default::default()
        };
        let token = encode_session(&claims, "secret").unwrap();
        assert_eq!(decode_session(&token, "secret"), Some(claims));
        assert_eq!(decode_session(&token, "other-secret"), None);

        let (payload, sig) = token.split_once('.').unwrap();
        let forged = URL_SAFE_NO_PAD.encode(br#"{"googleEmail":"evil@x.io","iat":1}"#);
        assert_eq!(decode_session(&format!("{}.{}", forged, sig), "secret"), None);
        assert_eq!(decode_session(payload, "secret"), None);
        assert_eq!(decode_session("garbage", "secret"), None);
    }
}
