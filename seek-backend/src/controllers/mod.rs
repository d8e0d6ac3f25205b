pub mod auth;
pub mod game;
pub mod health;
pub mod identity;
pub mod inventory;
pub mod leaderboard;
pub mod player_points;
pub mod social;
pub mod users;

use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse};
use serde_json::json;

use crate::auth::{decode_session, SessionClaims, SESSION_COOKIE};
use crate::upstream::{InventoryClient, UpstreamError, UpstreamResponse, UserServiceClient};
use crate::AppState;

/// User Service client, or the 500 explaining why it is unavailable.
pub fn user_service(state: &AppState) -> Result<&UserServiceClient, HttpResponse> {
    state.user_service.as_ref().map_err(|message| {
        HttpResponse::InternalServerError().json(json!({ "error": message }))
    })
}

pub fn inventory_service(state: &AppState) -> Result<&InventoryClient, HttpResponse> {
    state.inventory.as_ref().map_err(|message| {
        HttpResponse::InternalServerError().json(json!({ "error": message }))
    })
}

/// Trimmed, non-empty path or body parameter, or a 400 naming it.
pub fn require_param(name: &str, value: Option<&str>) -> Result<String, HttpResponse> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(value) => Ok(value.to_string()),
        None => Err(HttpResponse::BadRequest().json(json!({
            "error": format!("Missing parameter: {}", name)
        }))),
    }
}

pub fn status_code(status: u16) -> StatusCode {
    StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY)
}

/// Relay an upstream reply as-is. A JSON `null` body becomes a generic error.
pub fn passthrough(resp: &UpstreamResponse) -> HttpResponse {
    let body = if resp.body.is_null() {
        json!({ "error": "Upstream error" })
    } else {
        resp.body.clone()
    };
    HttpResponse::build(status_code(resp.status)).json(body)
}

pub fn bad_gateway(error: &str, details: &UpstreamError) -> HttpResponse {
    HttpResponse::BadGateway().json(json!({
        "error": error,
        "details": details.to_string()
    }))
}

pub fn upstream_status_error(resp: &UpstreamResponse) -> HttpResponse {
    HttpResponse::BadGateway().json(json!({
        "error": format!("Upstream error {}", resp.status),
        "details": resp.body.clone()
    }))
}

/// Session claims from the cookie; empty when absent or invalid.
pub fn session_claims(state: &AppState, req: &HttpRequest) -> SessionClaims {
    let Some(secret) = state.config.session_secret.as_deref() else {
        return SessionClaims::default();
    };
    req.cookie(SESSION_COOKIE)
        .and_then(|cookie| decode_session(cookie.value(), secret))
        .unwrap_or_default()
}

/// First ten characters of an address, for log lines.
pub fn short(address: &str) -> String {
    let prefix: String = address.chars().take(10).collect();
    format!("{}...", prefix)
}
