use actix_web::{web, HttpResponse, Responder};
use seek_types::CompletedScope;
use serde_json::json;

use super::{bad_gateway, require_param, short, upstream_status_error, user_service};
use crate::cache::cache_key;
use crate::normalize::is_dynamodb_filter_error;
use crate::AppState;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/player-points")
            .route("/{address}/rank", web::get().to(get_rank))
            .route("/{address}/completed/{scope}", web::get().to(get_completed)),
    );
}

async fn get_rank(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let client = match user_service(&state) {
        Ok(client) => client,
        Err(resp) => return resp,
    };
    let address = match require_param("address", Some(path.as_str())) {
        Ok(address) => address,
        Err(resp) => return resp,
    };

    let key = cache_key("rank", &address, None);
    if let Some(cached) = state.read_cache.get(&key) {
        return HttpResponse::Ok().json(cached);
    }

    match client.get_rank(&address).await {
        Ok(resp) if resp.is_success() => {
            state.read_cache.insert(key, resp.body.clone());
            HttpResponse::Ok().json(resp.body)
        }
        Ok(resp) => {
            log::error!("[POINTS] Rank for {} returned {}", short(&address), resp.status);
            upstream_status_error(&resp)
        }
        Err(e) => bad_gateway("Failed to fetch rank", &e),
    }
}

async fn get_completed(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> impl Responder {
    let client = match user_service(&state) {
        Ok(client) => client,
        Err(resp) => return resp,
    };
    let (address, scope) = path.into_inner();
    let address = match require_param("address", Some(address.as_str())) {
        Ok(address) => address,
        Err(resp) => return resp,
    };
    let Some(scope) = CompletedScope::parse(&scope) else {
        return HttpResponse::BadRequest().json(json!({
            "error": "Missing/invalid scope. Use daily | weekly | one"
        }));
    };

    let key = cache_key("completed", &address, Some(scope.as_upstream()));
    if let Some(cached) = state.read_cache.get(&key) {
        return HttpResponse::Ok().json(cached);
    }

    match client.get_completed(&address, scope).await {
        Ok(resp) if resp.is_success() => {
            state.read_cache.insert(key, resp.body.clone());
            HttpResponse::Ok().json(resp.body)
        }
        Ok(resp) if is_dynamodb_filter_error(&resp.body, &resp.text) => {
            log::warn!(
                "[POINTS] DynamoDB filter error for {} ({}); returning no completed tasks",
                short(&address),
                scope.as_upstream()
            );
            HttpResponse::Ok().json(json!({ "completed": [] }))
        }
        Ok(resp) => {
            log::error!(
                "[POINTS] Completed {} for {} returned {}",
                scope.as_upstream(),
                short(&address),
                resp.status
            );
            upstream_status_error(&resp)
        }
        Err(e) => bad_gateway("Failed to fetch completed tasks", &e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::state_with;
    use crate::upstream::fake::FakeUpstream;
    use actix_web::{test, App};
    use reqwest::Method;
    use serde_json::Value;
    use std::sync::Arc;

    macro_rules! app {
        ($state:expr) => {
            test::init_service(App::new().app_data(web::Data::new($state)).configure(config)).await
        };
    }

    #[actix_web::test]
    async fn test_scope_aliases_and_validation() {
        let fake = Arc::new(FakeUpstream::new().with(
            Method::GET,
            "/player-points/0xA/completed/one",
            200,
            json!({"completed": [{"taskId": "RAMEN_RUSH"}]}),
        ));
        let app = app!(state_with(fake.clone()));

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/api/player-points/0xA/completed/one-time").to_request(),
        )
        .await;
        assert_eq!(resp.status(), 200);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["completed"][0]["taskId"], "RAMEN_RUSH");

        // Served from cache under the canonical scope
        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/api/player-points/0xA/completed/ONETIME").to_request(),
        )
        .await;
        assert_eq!(resp.status(), 200);
        assert_eq!(fake.count(Method::GET, "/player-points/0xA/completed/one"), 1);

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/api/player-points/0xA/completed/monthly").to_request(),
        )
        .await;
        assert_eq!(resp.status(), 400);
    }

    #[actix_web::test]
    async fn test_dynamodb_error_is_suppressed() {
        let fake = Arc::new(FakeUpstream::new().with(
            Method::GET,
            "/player-points/0xA/completed/weekly",
            500,
            json!({"error": "ValidationException: Filter Expression can only contain non-primary key attributes: Primary key attribute: completionKey"}),
        ).with(Method::GET, "/player-points/0xA/completed/daily", 500, json!({"error": "Throttled"})));
        let app = app!(state_with(fake));

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/api/player-points/0xA/completed/week").to_request(),
        )
        .await;
        assert_eq!(resp.status(), 200);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({"completed": []}));

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/api/player-points/0xA/completed/daily").to_request(),
        )
        .await;
        assert_eq!(resp.status(), 502);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Upstream error 500");
    }

    #[actix_web::test]
    async fn test_rank_error_maps_to_502() {
        let fake = Arc::new(
            FakeUpstream::new()
                .with(Method::GET, "/player-points/0xA/rank", 200, json!({"rank": 3}))
                .with(Method::GET, "/player-points/0xB/rank", 404, json!({"message": "nope"})),
        );
        let app = app!(state_with(fake));

        let resp = test::call_service(&app, test::TestRequest::get().uri("/api/player-points/0xA/rank").to_request()).await;
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["rank"], 3);

        let resp = test::call_service(&app, test::TestRequest::get().uri("/api/player-points/0xB/rank").to_request()).await;
        assert_eq!(resp.status(), 502);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["details"]["message"], "nope");
    }
}
