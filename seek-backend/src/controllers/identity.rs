use actix_web::{web, HttpRequest, HttpResponse, Responder};
use seek_types::ReconcileRequest;

use super::{session_claims, user_service};
use crate::AppState;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/identity/reconcile").route(web::post().to(reconcile)));
}

/// Decide what the onboarding gate shows and link any identities the user
/// record is missing.
async fn reconcile(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<ReconcileRequest>,
) -> impl Responder {
    let client = match user_service(&state) {
        Ok(client) => client,
        Err(resp) => return resp,
    };

    let claims = session_claims(&state, &req);
    let outcome = state
        .reconciler
        .reconcile(client, &state.read_cache, &claims, body.into_inner())
        .await;

    log::debug!(
        "[IDENTITY] view={:?} source={:?} linked={} conflicts={}",
        outcome.view,
        outcome.address_source,
        outcome.linked.len(),
        outcome.conflicts.len()
    );
    HttpResponse::Ok().json(outcome)
}
