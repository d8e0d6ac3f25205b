use actix_web::{web, HttpResponse, Responder};
use seek_types::LinkProvider;
use serde_json::{json, Value};

use super::{bad_gateway, passthrough, require_param, status_code, user_service};
use crate::cache::cache_key;
use crate::identity::{self, link_identity, LinkResult};
use crate::normalize::with_username;
use crate::AppState;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/user")
            .route("", web::post().to(create_user))
            // Lookups first so `by-*` is never taken for an address
            .route("/by-email/{email}", web::get().to(get_by_email))
            .route("/by-x/{handle}", web::get().to(get_by_x))
            .route("/by-discord/{handle}", web::get().to(get_by_discord))
            .route("/{address}", web::get().to(get_user))
            .route("/{address}/all", web::get().to(get_user_all))
            .route("/{address}/referred-users", web::get().to(get_referred_users))
            .route("/{address}/email", web::put().to(link_email))
            .route("/{address}/x-handle", web::put().to(link_x_handle))
            .route("/{address}/discord-handle", web::put().to(link_discord_handle)),
    );
}

async fn create_user(state: web::Data<AppState>, body: web::Json<Value>) -> impl Responder {
    let client = match user_service(&state) {
        Ok(client) => client,
        Err(resp) => return resp,
    };

    let body = body.into_inner();
    let field = |name: &str| {
        body.get(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    let (Some(address), Some(_username)) = (field("userAddress"), field("username")) else {
        return HttpResponse::BadRequest().json(json!({
            "error": "userAddress and username are required"
        }));
    };

    match client.create_user(body).await {
        Ok(resp) => {
            if resp.is_success() {
                log::info!("[USERS] Created user {}", address);
                state.read_cache.invalidate_address(&address);
                state.reconciler.forget_address(&address);
            } else {
                log::error!("[USERS] Create user failed: {} {}", resp.status, resp.text);
            }
            passthrough(&resp)
        }
        Err(e) => {
            log::error!("[USERS] Create user request failed: {}", e);
            bad_gateway("Failed to create user", &e)
        }
    }
}

async fn get_user(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let client = match user_service(&state) {
        Ok(client) => client,
        Err(resp) => return resp,
    };
    let address = match require_param("address", Some(path.as_str())) {
        Ok(address) => address,
        Err(resp) => return resp,
    };

    match client.get_user(&address).await {
        Ok(resp) if resp.is_success() => HttpResponse::Ok().json(with_username(resp.body)),
        Ok(resp) => passthrough(&resp),
        Err(e) => bad_gateway("Failed to fetch user", &e),
    }
}

async fn get_user_all(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let client = match user_service(&state) {
        Ok(client) => client,
        Err(resp) => return resp,
    };
    let address = match require_param("address", Some(path.as_str())) {
        Ok(address) => address,
        Err(resp) => return resp,
    };

    let key = cache_key("all", &address, None);
    if let Some(cached) = state.read_cache.get(&key) {
        return HttpResponse::Ok().json(cached);
    }

    match client.get_user_unified(&address).await {
        Ok(unified) => {
            state.read_cache.insert(key, unified.clone());
            HttpResponse::Ok().json(unified)
        }
        Err(e) => bad_gateway("Failed to fetch user data", &e),
    }
}

async fn get_referred_users(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let client = match user_service(&state) {
        Ok(client) => client,
        Err(resp) => return resp,
    };
    let address = match require_param("address", Some(path.as_str())) {
        Ok(address) => address,
        Err(resp) => return resp,
    };

    match client.get_referred_users(&address).await {
        Ok(resp) if resp.is_success() => {
            let referred: Vec<Value> = resp
                .body
                .get("referredUserAddresses")
                .and_then(Value::as_array)
                .map(|addresses| {
                    addresses
                        .iter()
                        .filter_map(Value::as_str)
                        .map(|a| json!({ "userAddress": a }))
                        .collect()
                })
                .unwrap_or_default();
            HttpResponse::Ok().json(json!({
                "referredUsers": referred,
                "raw": resp.body
            }))
        }
        Ok(resp) => passthrough(&resp),
        Err(e) => bad_gateway("Failed to fetch referred users", &e),
    }
}

async fn lookup(state: &AppState, provider: LinkProvider, raw: &str) -> HttpResponse {
    let client = match user_service(state) {
        Ok(client) => client,
        Err(resp) => return resp,
    };
    let value = match require_param(provider.body_field(), Some(raw)) {
        Ok(value) => value,
        Err(resp) => return resp,
    };

    log::info!("[USERS] Lookup {} -> {}", provider.lookup_segment(), client.describe());
    match client.get_user_by(provider, &value).await {
        Ok(resp) => {
            if !resp.is_success() {
                log::error!("[USERS] {} lookup returned {}", provider.label(), resp.status);
            }
            passthrough(&resp)
        }
        Err(e) => bad_gateway(&format!("Failed to fetch user by {}", provider.label()), &e),
    }
}

async fn get_by_email(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    lookup(&state, LinkProvider::Email, &path).await
}

async fn get_by_x(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    lookup(&state, LinkProvider::XHandle, &path).await
}

async fn get_by_discord(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    lookup(&state, LinkProvider::DiscordHandle, &path).await
}

/// Shared body of the three link routes.
async fn link(state: &AppState, address: &str, provider: LinkProvider, body: &Value) -> HttpResponse {
    let client = match user_service(state) {
        Ok(client) => client,
        Err(resp) => return resp,
    };
    let address = match require_param("address", Some(address)) {
        Ok(address) => address,
        Err(resp) => return resp,
    };
    let Some(value) = body
        .get(provider.body_field())
        .and_then(Value::as_str)
        .and_then(|v| identity::normalize_for(provider, v))
    else {
        return HttpResponse::BadRequest().json(json!({
            "error": format!("{} is required", provider.body_field())
        }));
    };

    match link_identity(client, &address, provider, &value).await {
        LinkResult::Linked(body) => {
            state.read_cache.invalidate_address(&address);
            state.reconciler.forget_lookups();
            HttpResponse::Ok().json(body)
        }
        LinkResult::AlreadyLinked => HttpResponse::Ok().json(json!({
            "ok": true,
            "alreadyLinked": true
        })),
        LinkResult::Conflict { .. } => HttpResponse::Conflict().json(json!({
            "error": format!("This {} is already linked to another account", provider.label())
        })),
        LinkResult::UserMissing => HttpResponse::NotFound().json(json!({
            "error": "User does not exist at this address. Create the user first."
        })),
        LinkResult::Rejected(resp) if resp.status == 409 => {
            let field = |name: &str| resp.body.get(name).cloned().unwrap_or(Value::Null);
            HttpResponse::Conflict().json(json!({
                "error": resp.body.get("error").cloned().unwrap_or_else(|| {
                    json!(format!("This {} is already linked to another account", provider.label()))
                }),
                "errorCode": field("errorCode"),
                "errorMessage": field("errorMessage"),
            }))
        }
        LinkResult::Rejected(resp) => match resp.parsed() {
            Some(body) => HttpResponse::build(status_code(resp.status)).json(body),
            None => HttpResponse::BadGateway().json(json!({
                "error": format!("Failed to update {}", provider.body_field()),
                "status": resp.status,
                "body": resp.text
            })),
        },
        LinkResult::Unavailable(e) => {
            bad_gateway(&format!("Failed to update {}", provider.body_field()), &e)
        }
    }
}

async fn link_email(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<Value>,
) -> impl Responder {
    link(&state, &path, LinkProvider::Email, &body).await
}

async fn link_x_handle(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<Value>,
) -> impl Responder {
    link(&state, &path, LinkProvider::XHandle, &body).await
}

async fn link_discord_handle(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<Value>,
) -> impl Responder {
    link(&state, &path, LinkProvider::DiscordHandle, &body).await
}
