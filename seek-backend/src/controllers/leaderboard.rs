use actix_web::{web, HttpResponse, Responder};

use super::{bad_gateway, passthrough, user_service};
use crate::AppState;

const CACHE_KEY: &str = "leaderboard:overall";

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/leaderboard/overall").route(web::get().to(get_overall)));
}

async fn get_overall(state: web::Data<AppState>) -> impl Responder {
    let client = match user_service(&state) {
        Ok(client) => client,
        Err(resp) => return resp,
    };

    if let Some(cached) = state.read_cache.get(CACHE_KEY) {
        return HttpResponse::Ok().json(cached);
    }

    let resp = match client.leaderboard_overall().await {
        Ok(resp) if resp.is_success() => resp,
        first => {
            match &first {
                Ok(resp) => log::warn!("[LEADERBOARD] /leaderboard/overall returned {}; trying player-points", resp.status),
                Err(e) => log::warn!("[LEADERBOARD] /leaderboard/overall failed: {}; trying player-points", e),
            }
            match client.player_points_leaderboard().await {
                Ok(resp) => resp,
                Err(e) => return bad_gateway("Failed to fetch leaderboard", &e),
            }
        }
    };

    if resp.status == 200 {
        state.read_cache.insert(CACHE_KEY.to_string(), resp.body.clone());
    }
    passthrough(&resp)
}
