//! Typed client for the External User Service (users, points, leaderboard).

use std::future::Future;
use std::sync::Arc;

use futures_util::future::join3;
use seek_types::{CompletedScope, LinkProvider};
use serde_json::{json, Value};

use super::{segment, Upstream, UpstreamError, UpstreamRequest, UpstreamResponse};
use crate::normalize::{
    extract_discord_handle, extract_email, extract_player_points, extract_referral_count,
    extract_username, extract_x_handle,
};

type UpstreamResult = Result<UpstreamResponse, UpstreamError>;

#[derive(Clone)]
pub struct UserServiceClient {
    upstream: Arc<dyn Upstream>,
}

impl UserServiceClient {
    pub fn new(upstream: Arc<dyn Upstream>) -> Self {
        Self { upstream }
    }

    pub fn describe(&self) -> String {
        self.upstream.describe()
    }

    async fn get(&self, path: String) -> UpstreamResult {
        self.upstream.send(UpstreamRequest::get(path)).await
    }

    // -- users --

    pub async fn create_user(&self, body: Value) -> UpstreamResult {
        self.upstream.send(UpstreamRequest::post("/users", body)).await
    }

    pub async fn get_user(&self, address: &str) -> UpstreamResult {
        self.get(format!("/users/{}", segment(address))).await
    }

    pub async fn get_user_all(&self, address: &str) -> UpstreamResult {
        self.get(format!("/users/{}/all", segment(address))).await
    }

    /// Unified user view: `/users/{address}/all` with the username, referral
    /// count and points filled in from their own endpoints when missing.
    /// Only a transport failure of the `/all` call is an error.
    pub async fn get_user_unified(&self, address: &str) -> Result<Value, UpstreamError> {
        let all_resp = self.get_user_all(address).await?;
        let all = if all_resp.is_success() {
            all_resp.parsed().cloned().unwrap_or_else(|| json!({}))
        } else {
            json!({})
        };

        let mut username = extract_username(&all);
        let mut referral_count = extract_referral_count(&all);
        let mut player_points = extract_player_points(&all);

        let (user, referrals, points) = join3(
            fetch_if(username.is_none(), self.get_user(address)),
            fetch_if(referral_count.is_none(), self.get_referral_count(address)),
            fetch_if(player_points.is_none(), self.get_player_points(address)),
        )
        .await;

        if username.is_none() {
            username = user.as_ref().and_then(extract_username);
        }
        if referral_count.is_none() {
            referral_count = referrals.as_ref().and_then(extract_referral_count);
        }
        if player_points.is_none() {
            player_points = points.as_ref().and_then(extract_player_points);
        }

        Ok(json!({
            "username": username,
            "referralCount": referral_count,
            "playerPoints": player_points,
            "xHandle": extract_x_handle(&all),
            "email": extract_email(&all).or_else(|| user.as_ref().and_then(extract_email)),
            "discordHandle": extract_discord_handle(&all)
                .or_else(|| user.as_ref().and_then(extract_discord_handle)),
            "raw": {
                "all": all,
                "user": user,
                "referrals": referrals,
                "points": points,
            },
        }))
    }

    pub async fn get_referral_count(&self, address: &str) -> UpstreamResult {
        self.get(format!("/users/{}/referral-count", segment(address))).await
    }

    pub async fn get_referred_users(&self, address: &str) -> UpstreamResult {
        self.get(format!("/users/{}/referred-users", segment(address))).await
    }

    /// Reverse lookup of a user by one of its linked identities.
    pub async fn get_user_by(&self, provider: LinkProvider, value: &str) -> UpstreamResult {
        // The upstream expects the literal email (including '@') in the path.
        let value = match provider {
            LinkProvider::Email => value.to_string(),
            _ => segment(value),
        };
        self.get(format!("/users/{}/{}", provider.lookup_segment(), value)).await
    }

    /// Bind an identity to the record at `address`.
    pub async fn put_link(&self, address: &str, provider: LinkProvider, value: &str) -> UpstreamResult {
        let path = format!("/users/{}/{}", segment(address), provider.path_segment());
        let mut body = serde_json::Map::new();
        body.insert(provider.body_field().to_string(), json!(value));
        self.upstream
            .send(UpstreamRequest::put(path, Value::Object(body)))
            .await
    }

    // -- player points --

    pub async fn get_player_points(&self, address: &str) -> UpstreamResult {
        self.get(format!("/player-points/{}", segment(address))).await
    }

    pub async fn get_rank(&self, address: &str) -> UpstreamResult {
        self.get(format!("/player-points/{}/rank", segment(address))).await
    }

    pub async fn get_completed(&self, address: &str, scope: CompletedScope) -> UpstreamResult {
        self.get(format!(
            "/player-points/{}/completed/{}",
            segment(address),
            scope.as_upstream()
        ))
        .await
    }

    /// Whether a one-time task is already on the address's ledger.
    pub async fn task_completion(&self, address: &str, task_id: &str) -> UpstreamResult {
        self.get(format!(
            "/player-points/{}/tasks/{}?taskType=ONE_TIME",
            segment(address),
            segment(task_id)
        ))
        .await
    }

    pub async fn complete_task(&self, address: &str, task_id: &str, metadata: Value) -> UpstreamResult {
        let path = format!(
            "/player-points/{}/tasks/{}/complete",
            segment(address),
            segment(task_id)
        );
        self.upstream
            .send(UpstreamRequest::post(path, json!({ "metadata": metadata })))
            .await
    }

    // -- leaderboard --

    pub async fn leaderboard_overall(&self) -> UpstreamResult {
        self.get("/leaderboard/overall".to_string()).await
    }

    pub async fn player_points_leaderboard(&self) -> UpstreamResult {
        self.get("/player-points/leaderboard".to_string()).await
    }
}

/// Await `request` only when `needed`; failures and non-2xx replies become `None`.
async fn fetch_if<F>(needed: bool, request: F) -> Option<Value>
where
    F: Future<Output = UpstreamResult>,
{
    if !needed {
        return None;
    }
    match request.await {
        Ok(resp) if resp.is_success() => resp.parsed().cloned(),
        _ => None,
    }
}
