//! twitterapi.io-backed verifier.

use async_trait::async_trait;
use reqwest::header;
use seek_types::{Verification, VerificationKind};
use serde_json::Value;

use super::{normalize_handle, SocialVerifier};

const FOLLOW_CHECK_URL: &str = "https://api.twitterapi.io/twitter/user/check_follow_relationship";
const V2_BASE_URL: &str = "https://twitterapi.io/v2";
const TWEET_PAGE_SIZE: u32 = 50;

const GAMEPLAY_KEYWORDS: &[&str] = &[
    "bakeland", "gameplay", "game", "playing", "play", "bakker", "footage", "clip", "video",
    "stream",
];

pub const MISSING_KEY: &str =
    "Twitter API key not configured. Please set TWITTER_API_KEY environment variable.";

pub struct TwitterApiVerifier {
    client: reqwest::Client,
    api_key: Option<String>,
    target_account: String,
}

impl TwitterApiVerifier {
    pub fn new(client: reqwest::Client, api_key: Option<String>, target_account: &str) -> Self {
        Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            target_account: normalize_handle(target_account),
        }
    }

    async fn get_json(&self, url: &str, api_key: &str) -> Result<Value, String> {
        let resp = self
            .client
            .get(url)
            .header("X-API-Key", api_key)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| e.to_string())?;
        if !status.is_success() {
            let snippet: String = text.chars().take(200).collect();
            return Err(format!("{} - {}", status.as_u16(), snippet));
        }
        serde_json::from_str(&text).map_err(|_| "Invalid response format from Twitter API".to_string())
    }

    async fn verify_follow(&self, handle: &str, api_key: &str) -> Verification {
        let url = match url::Url::parse_with_params(
            FOLLOW_CHECK_URL,
            &[("source_user_name", handle), ("target_user_name", self.target_account.as_str())],
        ) {
            Ok(url) => url,
            Err(e) => return Verification::failed(e.to_string()),
        };

        log::info!(
            "[TWITTER] Checking follow relationship {} -> {}",
            handle,
            self.target_account
        );

        match self.get_json(url.as_str(), api_key).await {
            Ok(body) => follow_verification(&body),
            Err(e) => {
                log::error!("[TWITTER] Follow check failed for {}: {}", handle, e);
                Verification::failed(format!("Failed to check follow relationship: {}", e))
            }
        }
    }

    async fn verify_gameplay_post(&self, handle: &str, api_key: &str) -> Verification {
        let user_url = format!(
            "{}/user/by/username/{}?api_key={}",
            V2_BASE_URL,
            urlencoding::encode(handle),
            urlencoding::encode(api_key)
        );
        let user = match self.get_json(&user_url, api_key).await {
            Ok(user) => user,
            Err(e) => {
                log::error!("[TWITTER] Failed to get user info for {}: {}", handle, e);
                return Verification::failed(format!("Failed to fetch user info: {}", e));
            }
        };

        let Some(user_id) = id_string(user.pointer("/data/id")).or_else(|| id_string(user.get("id")))
        else {
            return Verification::failed("Could not find user ID");
        };

        let tweets_url = format!(
            "{}/user/{}/tweets?count={}&api_key={}",
            V2_BASE_URL,
            urlencoding::encode(&user_id),
            TWEET_PAGE_SIZE,
            urlencoding::encode(api_key)
        );
        match self.get_json(&tweets_url, api_key).await {
            Ok(tweets) => gameplay_post_verification(&tweets, &self.target_account, handle),
            Err(e) => {
                log::error!("[TWITTER] Failed to get tweets for {}: {}", handle, e);
                Verification::failed(format!("Failed to fetch tweets: {}", e))
            }
        }
    }
}

#[async_trait]
impl SocialVerifier for TwitterApiVerifier {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn verify(&self, handle: &str, kind: VerificationKind) -> Verification {
        let Some(api_key) = self.api_key.as_deref() else {
            log::error!("[TWITTER] TWITTER_API_KEY is not set");
            return Verification::failed(MISSING_KEY);
        };
        let handle = normalize_handle(handle);
        match kind {
            VerificationKind::Follow => self.verify_follow(&handle, api_key).await,
            VerificationKind::GameplayPost => self.verify_gameplay_post(&handle, api_key).await,
        }
    }
}

fn id_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Interpret a `check_follow_relationship` reply.
pub(crate) fn follow_verification(body: &Value) -> Verification {
    if body.get("status").and_then(Value::as_str) == Some("error") {
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Failed to verify follow relationship");
        return Verification::failed(message);
    }
    Verification {
        verified: body.pointer("/data/following") == Some(&Value::Bool(true)),
        ..Default::default()
    }
}

/// Look for a tweet that mentions `target` and looks like gameplay: a
/// keyword in the text or attached media. The keyword scan includes the
/// mention itself, so `@bakelandxyz` alone qualifies.
pub(crate) fn gameplay_post_verification(body: &Value, target: &str, handle: &str) -> Verification {
    let target = target.to_lowercase();
    let mention = format!("@{}", target);
    let empty = Vec::new();
    let tweets = body
        .get("data")
        .and_then(Value::as_array)
        .or_else(|| body.get("tweets").and_then(Value::as_array))
        .unwrap_or(&empty);

    for tweet in tweets {
        let text = tweet
            .get("text")
            .or_else(|| tweet.get("full_text"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_lowercase();

        let mentioned = tweet
            .pointer("/entities/mentions")
            .and_then(Value::as_array)
            .map(|mentions| {
                mentions.iter().any(|m| {
                    m.get("username")
                        .or_else(|| m.get("screen_name"))
                        .and_then(Value::as_str)
                        .map(|u| u.to_lowercase() == target)
                        .unwrap_or(false)
                })
            })
            .unwrap_or(false)
            || text.contains(&mention);
        if !mentioned {
            continue;
        }

        let has_keyword = GAMEPLAY_KEYWORDS.iter().any(|k| text.contains(k));
        let has_media = tweet.pointer("/entities/media").map_or(false, |m| !m.is_null());
        if has_keyword || has_media {
            let tweet_url = id_string(tweet.get("id"))
                .or_else(|| id_string(tweet.get("id_str")))
                .map(|id| format!("https://twitter.com/{}/status/{}", handle, id));
            return Verification { verified: true, error: None, tweet_url };
        }
    }

    Verification::default()
}
