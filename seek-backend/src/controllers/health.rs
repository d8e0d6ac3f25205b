use actix_web::{web, HttpResponse, Responder};

use crate::AppState;

/// Version from Cargo.toml, available at compile time
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/health").route(web::get().to(health_check)));
    cfg.service(web::resource("/api/health/config").route(web::get().to(get_config_status)));
}

async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "version": VERSION
    }))
}

/// Which integrations are configured. Never echoes secrets.
async fn get_config_status(state: web::Data<AppState>) -> impl Responder {
    let oauth = &state.config.oauth;
    HttpResponse::Ok().json(serde_json::json!({
        "user_service_configured": state.user_service.is_ok(),
        "inventory_configured": state.inventory.is_ok(),
        "twitter_api_configured": state.verifier.is_configured(),
        "session_configured": state.config.session_secret.is_some(),
        "google_configured": oauth.google.is_some(),
        "twitter_oauth_configured": oauth.twitter.is_some(),
        "discord_configured": oauth.discord.is_some(),
        "wallet_chain_id": state.config.wallet.chain_id
    }))
}
