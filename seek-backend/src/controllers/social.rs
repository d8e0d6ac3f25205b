use std::collections::HashSet;

use actix_web::{web, HttpResponse, Responder};
use futures_util::future::join;
use seek_types::{CompletedScope, SocialTaskId, SocialTaskStatus, VerificationKind};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{require_param, short, status_code, user_service};
use crate::normalize::{extract_x_handle, is_dynamodb_filter_error};
use crate::social::{normalize_handle, MISSING_KEY};
use crate::AppState;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/social/twitter")
            .route("/verify", web::post().to(verify))
            .route("/tasks/status", web::get().to(task_status))
            .route("/tasks/claim", web::post().to(claim_task)),
    );
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyRequest {
    x_handle: Option<String>,
    task_type: Option<String>,
}

async fn verify(state: web::Data<AppState>, body: web::Json<VerifyRequest>) -> impl Responder {
    let handle = match body.x_handle.as_deref().map(normalize_handle).filter(|h| !h.is_empty()) {
        Some(handle) => handle,
        None => {
            return HttpResponse::BadRequest().json(json!({ "error": "xHandle is required" }));
        }
    };
    let Some(kind) = body
        .task_type
        .as_deref()
        .and_then(|t| t.parse::<VerificationKind>().ok())
    else {
        return HttpResponse::BadRequest().json(json!({
            "error": "taskType must be 'follow' or 'gameplay_post'"
        }));
    };

    if !state.verifier.is_configured() {
        log::error!("[SOCIAL] TWITTER_API_KEY is not set");
        return HttpResponse::InternalServerError().json(json!({ "error": MISSING_KEY }));
    }

    HttpResponse::Ok().json(state.verifier.verify(&handle, kind).await)
}

#[derive(Deserialize)]
struct StatusQuery {
    address: Option<String>,
}

fn completed_task_ids(body: &Value) -> HashSet<String> {
    body.get("completed")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|e| match e.get("taskId") {
                    Some(Value::String(s)) => Some(s.trim().to_string()),
                    Some(Value::Number(n)) => Some(n.to_string()),
                    _ => None,
                })
                .filter(|id| !id.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

async fn task_status(state: web::Data<AppState>, query: web::Query<StatusQuery>) -> impl Responder {
    let address = match require_param("address", query.address.as_deref()) {
        Ok(address) => address,
        Err(resp) => return resp,
    };
    let client = match user_service(&state) {
        Ok(client) => client,
        Err(resp) => return resp,
    };

    let (user, completed) = join(
        client.get_user_all(&address),
        client.get_completed(&address, CompletedScope::OneTime),
    )
    .await;

    let x_handle = match user {
        Ok(resp) if resp.is_success() => extract_x_handle(&resp.body),
        Ok(resp) => {
            log::warn!("[SOCIAL] User read for {} returned {}", short(&address), resp.status);
            None
        }
        Err(e) => {
            log::error!("[SOCIAL] User read for {} failed: {}", short(&address), e);
            None
        }
    };

    let completed_ids = match completed {
        Ok(resp) if resp.is_success() => completed_task_ids(&resp.body),
        Ok(resp) if is_dynamodb_filter_error(&resp.body, &resp.text) => {
            log::warn!("[SOCIAL] DynamoDB filter error for {}; no completed tasks", short(&address));
            HashSet::new()
        }
        Ok(resp) => {
            log::error!("[SOCIAL] Completed tasks for {} returned {}", short(&address), resp.status);
            HashSet::new()
        }
        Err(e) => {
            log::error!("[SOCIAL] Completed tasks for {} failed: {}", short(&address), e);
            HashSet::new()
        }
    };

    let tasks: Vec<SocialTaskStatus> = [SocialTaskId::FollowBakelandX, SocialTaskId::PostGameplayX]
        .into_iter()
        .map(|id| SocialTaskStatus {
            id,
            title: id.title().to_string(),
            reward: id.reward(),
            completed: completed_ids.contains(&id.to_string()),
            can_verify: id == SocialTaskId::FollowBakelandX && x_handle.is_some(),
            x_handle: x_handle.clone(),
        })
        .collect();

    HttpResponse::Ok().json(json!({ "tasks": tasks, "xHandle": x_handle }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClaimRequest {
    address: Option<String>,
    x_handle: Option<String>,
    task_id: Option<String>,
}

async fn claim_task(state: web::Data<AppState>, body: web::Json<ClaimRequest>) -> impl Responder {
    let address = match require_param("address", body.address.as_deref()) {
        Ok(address) => address,
        Err(resp) => return resp,
    };
    let Some(x_handle) = body.x_handle.as_deref().map(normalize_handle).filter(|h| !h.is_empty())
    else {
        return HttpResponse::BadRequest().json(json!({
            "error": "xHandle is required. User must connect their X account."
        }));
    };
    let Some(task_id) = body.task_id.as_deref().and_then(|t| t.parse::<SocialTaskId>().ok()) else {
        return HttpResponse::BadRequest().json(json!({
            "error": "taskId must be 'FOLLOW_BAKELAND_X' or 'POST_GAMEPLAY_X'"
        }));
    };
    let client = match user_service(&state) {
        Ok(client) => client,
        Err(resp) => return resp,
    };

    match client.task_completion(&address, task_id.as_ref()).await {
        Ok(resp) if resp.is_success() => {
            if resp.body.get("completed") == Some(&Value::Bool(true)) {
                return HttpResponse::Ok().json(json!({
                    "verified": true,
                    "completed": true,
                    "message": "Task already completed",
                    "taskId": task_id,
                }));
            }
        }
        Ok(resp) => log::warn!(
            "[SOCIAL] Completion check for {} {} returned {} (non-fatal)",
            short(&address),
            task_id,
            resp.status
        ),
        Err(e) => log::error!("[SOCIAL] Completion check failed (non-fatal): {}", e),
    }

    if !state.verifier.is_configured() {
        return HttpResponse::InternalServerError().json(json!({ "error": MISSING_KEY }));
    }
    let verification = state.verifier.verify(&x_handle, task_id.verification()).await;
    if !verification.verified {
        return HttpResponse::BadRequest().json(json!({
            "verified": false,
            "error": verification.error.unwrap_or_else(|| {
                "Task verification failed. Please ensure you've completed the requirements.".to_string()
            }),
        }));
    }

    let metadata = json!({
        "title": task_id.title(),
        "verified": true,
        "verifiedAt": chrono::Utc::now().to_rfc3339(),
        "xHandle": x_handle,
        "taskType": "ONE_TIME",
        "points": task_id.reward(),
    });

    match client.complete_task(&address, task_id.as_ref(), metadata).await {
        Ok(resp) if resp.is_success() => {
            log::info!("[SOCIAL] Completed {} for {}", task_id, short(&address));
            state.read_cache.invalidate_address(&address);
            state.read_cache.invalidate_prefix("leaderboard");
            let message = resp
                .body
                .get("message")
                .cloned()
                .unwrap_or_else(|| json!("Task verified and completed successfully"));
            HttpResponse::Ok().json(json!({
                "verified": true,
                "completed": true,
                "message": message,
                "taskId": task_id,
                "pointsEarned": resp.body.get("pointsEarned"),
                "totalPoints": resp.body.get("totalPoints"),
                "data": resp.body,
            }))
        }
        Ok(resp) => {
            log::error!(
                "[SOCIAL] Completing {} for {} returned {}: {}",
                task_id,
                short(&address),
                resp.status,
                resp.text
            );
            let parsed = resp.parsed();
            let snippet: String = resp.text.chars().take(200).collect();
            HttpResponse::build(status_code(resp.status)).json(json!({
                "verified": true,
                "completed": false,
                "message": parsed
                    .and_then(|b| b.get("message").cloned())
                    .unwrap_or_else(|| json!("Task verified but failed to complete")),
                "error": parsed
                    .and_then(|b| b.get("error").cloned())
                    .unwrap_or_else(|| json!(format!("HTTP {}: {}", resp.status, snippet))),
                "taskId": task_id,
            }))
        }
        Err(e) => {
            log::error!("[SOCIAL] Completing {} failed: {}", task_id, e);
            HttpResponse::InternalServerError().json(json!({
                "verified": true,
                "completed": false,
                "error": "Task verified but exception occurred while completing. Check backend logs.",
                "details": e.to_string(),
                "taskId": task_id,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::cache_key;
    use crate::social::fake::StaticVerifier;
    use crate::test_support::state_with;
    use crate::upstream::fake::FakeUpstream;
    use actix_web::{test, App};
    use reqwest::Method;
    use seek_types::Verification;
    use std::sync::Arc;

    macro_rules! app {
        ($state:expr) => {
            test::init_service(App::new().app_data(web::Data::new($state)).configure(config)).await
        };
    }

    #[actix_web::test]
    async fn test_verify_validates_input() {
        let app = app!(state_with(Arc::new(FakeUpstream::new())));
        let req = test::TestRequest::post()
            .uri("/api/social/twitter/verify")
            .set_json(json!({"xHandle": "seeker", "taskType": "retweet"}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 400);

        let req = test::TestRequest::post()
            .uri("/api/social/twitter/verify")
            .set_json(json!({"taskType": "follow"}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 400);

        let req = test::TestRequest::post()
            .uri("/api/social/twitter/verify")
            .set_json(json!({"xHandle": "@seeker", "taskType": "gameplay_post"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["verified"], true);
    }

    #[actix_web::test]
    async fn test_verify_without_key_is_500() {
        let mut state = state_with(Arc::new(FakeUpstream::new()));
        state.verifier = Arc::new(StaticVerifier::unconfigured());
        let app = app!(state);
        let req = test::TestRequest::post()
            .uri("/api/social/twitter/verify")
            .set_json(json!({"xHandle": "seeker", "taskType": "follow"}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 500);
    }

    #[actix_web::test]
    async fn test_status_combines_handle_and_completed() {
        let fake = Arc::new(
            FakeUpstream::new()
                .with(Method::GET, "/users/0xA/all", 200, json!({"raw": {"all": {"xHandle": "seeker"}}}))
                .with(
                    Method::GET,
                    "/player-points/0xA/completed/one",
                    200,
                    json!({"completed": [{"taskId": "FOLLOW_BAKELAND_X"}]}),
                ),
        );
        let app = app!(state_with(fake));
        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/api/social/twitter/tasks/status?address=0xA").to_request(),
        )
        .await;
        assert_eq!(resp.status(), 200);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["xHandle"], "seeker");
        assert_eq!(body["tasks"][0]["id"], "FOLLOW_BAKELAND_X");
        assert_eq!(body["tasks"][0]["completed"], true);
        assert_eq!(body["tasks"][0]["canVerify"], true);
        assert_eq!(body["tasks"][1]["completed"], false);
        assert_eq!(body["tasks"][1]["canVerify"], false);
        assert_eq!(body["tasks"][1]["reward"], 150);
    }

    #[actix_web::test]
    async fn test_status_requires_address() {
        let app = app!(state_with(Arc::new(FakeUpstream::new())));
        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/api/social/twitter/tasks/status").to_request(),
        )
        .await;
        assert_eq!(resp.status(), 400);
    }

    #[actix_web::test]
    async fn test_claim_already_completed_skips_verification() {
        let fake = Arc::new(FakeUpstream::new().with(
            Method::GET,
            "/player-points/0xA/tasks/FOLLOW_BAKELAND_X?taskType=ONE_TIME",
            200,
            json!({"completed": true}),
        ));
        let verifier = Arc::new(StaticVerifier::new(Verification::verified()));
        let mut state = state_with(fake.clone());
        state.verifier = verifier.clone();
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/api/social/twitter/tasks/claim")
            .set_json(json!({"address": "0xA", "xHandle": "seeker", "taskId": "FOLLOW_BAKELAND_X"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Task already completed");
        assert!(verifier.checks.lock().is_empty());
    }

    #[actix_web::test]
    async fn test_claim_rejects_unverified() {
        let mut state = state_with(Arc::new(FakeUpstream::new()));
        state.verifier = Arc::new(StaticVerifier::new(Verification::failed("not following")));
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/api/social/twitter/tasks/claim")
            .set_json(json!({"address": "0xA", "xHandle": "seeker", "taskId": "FOLLOW_BAKELAND_X"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "not following");
    }

    #[actix_web::test]
    async fn test_claim_completes_and_invalidates() {
        let fake = Arc::new(FakeUpstream::new().with(
            Method::POST,
            "/player-points/0xA/tasks/POST_GAMEPLAY_X/complete",
            200,
            json!({"pointsEarned": 150, "totalPoints": 160}),
        ));
        let data = web::Data::new(state_with(fake.clone()));
        data.read_cache.insert(cache_key("rank", "0xA", None), json!({"rank": 9}));
        data.read_cache.insert("leaderboard:overall".into(), json!([]));
        let app = test::init_service(App::new().app_data(data.clone()).configure(config)).await;

        let req = test::TestRequest::post()
            .uri("/api/social/twitter/tasks/claim")
            .set_json(json!({"address": "0xA", "xHandle": "@seeker", "taskId": "POST_GAMEPLAY_X"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["completed"], true);
        assert_eq!(body["pointsEarned"], 150);

        let call = fake
            .calls()
            .into_iter()
            .find(|c| c.method == Method::POST)
            .unwrap();
        let sent = call.body.unwrap();
        let metadata = &sent["metadata"];
        assert_eq!(metadata["points"], 150);
        assert_eq!(metadata["xHandle"], "seeker");
        assert_eq!(metadata["taskType"], "ONE_TIME");
        assert!(data.read_cache.is_empty());
    }

    #[actix_web::test]
    async fn test_completed_task_ids() {
        let ids = completed_task_ids(&json!({"completed": [{"taskId": " A "}, {"taskId": ""}, {"x": 1}]}));
        assert_eq!(ids.len(), 1);
        assert!(ids.contains("A"));
    }
}
