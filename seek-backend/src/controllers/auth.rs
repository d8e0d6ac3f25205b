use actix_web::cookie::{time, Cookie, SameSite};
use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;

use super::session_claims;
use crate::auth::oauth::{authorize_url, redirect_uri, OAuthProvider, PENDING_AUTH_TTL};
use crate::auth::{apply_sign_in, encode_session, OAUTH_STATE_COOKIE, SESSION_COOKIE};
use crate::AppState;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/auth")
            .route("/signin/{provider}", web::get().to(sign_in))
            .route("/callback/{provider}", web::get().to(callback))
            .route("/session", web::get().to(get_session))
            .route("/signout", web::post().to(sign_out)),
    );
}

fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, location))
        .finish()
}

fn redirect_with_error(code: &str) -> HttpResponse {
    redirect(&format!("/?error={}", urlencoding::encode(code)))
}

fn parse_provider(raw: &str) -> Result<OAuthProvider, HttpResponse> {
    raw.parse().map_err(|_| {
        HttpResponse::NotFound().json(json!({
            "error": format!("Unknown sign-in provider: {}", raw)
        }))
    })
}

fn session_cookie(state: &AppState, value: String) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, value)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.public_url.starts_with("https://"))
        .finish()
}

fn state_cookie(state: &AppState, value: String) -> Cookie<'static> {
    Cookie::build(OAUTH_STATE_COOKIE, value)
        .path("/api/auth")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.public_url.starts_with("https://"))
        .max_age(time::Duration::seconds(PENDING_AUTH_TTL.as_secs() as i64))
        .finish()
}

async fn sign_in(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let provider = match parse_provider(&path) {
        Ok(provider) => provider,
        Err(resp) => return resp,
    };
    let Some(credentials) = provider.credentials(&state.config.oauth) else {
        return HttpResponse::InternalServerError().json(json!({
            "error": format!("{} sign-in is not configured", provider)
        }));
    };
    if state.config.session_secret.is_none() {
        return HttpResponse::InternalServerError().json(json!({
            "error": "SESSION_SECRET not configured"
        }));
    }

    let (oauth_state, pkce_verifier) = state.pending_auth.begin(provider);
    let redirect_to = redirect_uri(&state.config.public_url, provider);
    match authorize_url(provider, credentials, &redirect_to, &oauth_state, pkce_verifier.as_deref()) {
        Ok(url) => HttpResponse::Found()
            .insert_header((header::LOCATION, url))
            .cookie(state_cookie(&state, oauth_state))
            .finish(),
        Err(e) => {
            log::error!("[AUTH] {}", e);
            HttpResponse::InternalServerError().json(json!({ "error": e }))
        }
    }
}

#[derive(Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

async fn callback(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    query: web::Query<CallbackQuery>,
) -> impl Responder {
    let provider = match parse_provider(&path) {
        Ok(provider) => provider,
        Err(resp) => return resp,
    };
    if let Some(error) = query.error.as_deref() {
        log::warn!("[AUTH] {} returned error: {}", provider, error);
        return redirect_with_error(error);
    }

    // Checked before `take` so a forged callback cannot burn a real sign-in.
    let bound = req.cookie(OAUTH_STATE_COOKIE).map(|c| c.value().to_string());
    let Some(oauth_state) = query.state.as_deref().filter(|s| bound.as_deref() == Some(*s)) else {
        log::warn!("[AUTH] {} callback state does not match this browser", provider);
        return redirect_with_error("OAuthStateMismatch");
    };

    let pending = state.pending_auth.take(oauth_state);
    let Some(pending) = pending.filter(|p| p.provider == provider) else {
        log::warn!("[AUTH] Unknown or expired sign-in state for {}", provider);
        return redirect_with_error("OAuthStateMismatch");
    };
    let Some(code) = query.code.as_deref() else {
        return redirect_with_error("OAuthCallback");
    };
    let (Some(credentials), Some(secret)) = (
        provider.credentials(&state.config.oauth),
        state.config.session_secret.as_deref(),
    ) else {
        return redirect_with_error("Configuration");
    };

    let redirect_to = redirect_uri(&state.config.public_url, provider);
    let profile = match state
        .profile_fetcher
        .fetch_profile(provider, credentials, code, &redirect_to, pending.pkce_verifier.as_deref())
        .await
    {
        Ok(profile) => profile,
        Err(e) => {
            log::error!("[AUTH] {} sign-in failed: {}", provider, e);
            return redirect_with_error("OAuthCallback");
        }
    };

    let mut claims = session_claims(&state, &req);
    apply_sign_in(&mut claims, provider, &profile);

    match encode_session(&claims, secret) {
        Ok(token) => {
            log::info!("[AUTH] {} sign-in complete", provider);
            let mut spent = state_cookie(&state, String::new());
            spent.make_removal();
            HttpResponse::Found()
                .insert_header((header::LOCATION, "/"))
                .cookie(session_cookie(&state, token))
                .cookie(spent)
                .finish()
        }
        Err(e) => {
            log::error!("[AUTH] {}", e);
            HttpResponse::InternalServerError().json(json!({ "error": e }))
        }
    }
}

async fn get_session(state: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    HttpResponse::Ok().json(session_claims(&state, &req).to_public_json())
}

async fn sign_out(state: web::Data<AppState>) -> impl Responder {
    let mut cookie = session_cookie(&state, String::new());
    cookie.make_removal();
    HttpResponse::Ok().cookie(cookie).json(json!({ "ok": true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OAuthCredentials;
    use crate::test_support::{unconfigured_state, StaticProfiles};
    use actix_web::{test, App};
    use serde_json::Value;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn location(resp: &actix_web::dev::ServiceResponse) -> String {
        resp.headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }

    #[actix_web::test]
    async fn test_full_sign_in_flow_merges_providers() {
        let mut state = unconfigured_state();
        state.config.oauth.google = Some(OAuthCredentials {
            client_id: "gid".into(),
            client_secret: "gsecret".into(),
        });
        state.profile_fetcher = Arc::new(StaticProfiles(Ok(json!({"email": "a@b.co"}))));
        let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(config)).await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/api/auth/signin/google").to_request()).await;
        assert_eq!(resp.status(), 302);
        let consent = url::Url::parse(&location(&resp)).unwrap();
        let params: HashMap<_, _> = consent.query_pairs().into_owned().collect();
        assert_eq!(params["prompt"], "select_account");
        let oauth_state = params["state"].clone();
        let bound = resp
            .response()
            .cookies()
            .find(|c| c.name() == OAUTH_STATE_COOKIE)
            .unwrap()
            .into_owned();
        assert_eq!(bound.value(), oauth_state);
        assert!(bound.http_only().unwrap_or(false));

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri(&format!("/api/auth/callback/google?code=abc&state={}", oauth_state))
                .cookie(bound.clone())
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), 302);
        assert_eq!(location(&resp), "/");
        let cookie = resp
            .response()
            .cookies()
            .find(|c| c.name() == SESSION_COOKIE)
            .unwrap()
            .into_owned();
        assert!(cookie.http_only().unwrap_or(false));

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/api/auth/session").cookie(cookie).to_request(),
        )
        .await;
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["googleEmail"], "a@b.co");
        assert_eq!(body["twitterUsername"], Value::Null);

        // State is single-use
        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri(&format!("/api/auth/callback/google?code=abc&state={}", oauth_state))
                .cookie(bound)
                .to_request(),
        )
        .await;
        assert_eq!(location(&resp), "/?error=OAuthStateMismatch");
    }

    #[actix_web::test]
    async fn test_callback_requires_state_cookie_from_same_browser() {
        let mut state = unconfigured_state();
        state.config.oauth.google = Some(OAuthCredentials {
            client_id: "gid".into(),
            client_secret: "gsecret".into(),
        });
        state.profile_fetcher = Arc::new(StaticProfiles(Ok(json!({"email": "a@b.co"}))));
        let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(config)).await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/api/auth/signin/google").to_request()).await;
        let consent = url::Url::parse(&location(&resp)).unwrap();
        let params: HashMap<_, _> = consent.query_pairs().into_owned().collect();
        let oauth_state = params["state"].clone();
        let callback = format!("/api/auth/callback/google?code=abc&state={}", oauth_state);

        let resp = test::call_service(&app, test::TestRequest::get().uri(&callback).to_request()).await;
        assert_eq!(location(&resp), "/?error=OAuthStateMismatch");
        assert!(resp.response().cookies().all(|c| c.name() != SESSION_COOKIE));

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri(&callback)
                .cookie(Cookie::new(OAUTH_STATE_COOKIE, "someone-elses-state"))
                .to_request(),
        )
        .await;
        assert_eq!(location(&resp), "/?error=OAuthStateMismatch");

        // The rejected attempts did not consume the pending sign-in.
        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri(&callback)
                .cookie(Cookie::new(OAUTH_STATE_COOKIE, oauth_state))
                .to_request(),
        )
        .await;
        assert_eq!(location(&resp), "/");
    }

    #[actix_web::test]
    async fn test_unconfigured_and_unknown_providers() {
        let app = test::init_service(
            App::new().app_data(web::Data::new(unconfigured_state())).configure(config),
        )
        .await;
        let resp = test::call_service(&app, test::TestRequest::get().uri("/api/auth/signin/discord").to_request()).await;
        assert_eq!(resp.status(), 500);
        let resp = test::call_service(&app, test::TestRequest::get().uri("/api/auth/signin/github").to_request()).await;
        assert_eq!(resp.status(), 404);

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/api/auth/callback/twitter?error=access_denied").to_request(),
        )
        .await;
        assert_eq!(location(&resp), "/?error=access_denied");
    }

    #[actix_web::test]
    async fn test_tampered_cookie_is_no_session() {
        let app = test::init_service(
            App::new().app_data(web::Data::new(unconfigured_state())).configure(config),
        )
        .await;
        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/auth/session")
                .cookie(Cookie::new(SESSION_COOKIE, "e30.forged"))
                .to_request(),
        )
        .await;
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["googleEmail"], Value::Null);
    }
}
