use actix_web::{web, Responder};
use serde::Deserialize;

use super::{bad_gateway, inventory_service, passthrough, require_param};
use crate::AppState;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/inventory/wallet")
            .route("/connect", web::post().to(connect_wallet))
            .route("/{address}", web::get().to(get_wallet)),
    );
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectRequest {
    user_address: Option<String>,
}

async fn connect_wallet(state: web::Data<AppState>, body: web::Json<ConnectRequest>) -> impl Responder {
    let client = match inventory_service(&state) {
        Ok(client) => client,
        Err(resp) => return resp,
    };
    let user_address = match require_param("userAddress", body.user_address.as_deref()) {
        Ok(address) => address,
        Err(resp) => return resp,
    };

    log::info!("[INVENTORY] wallet/connect -> {}", client.describe());
    match client.connect_wallet(&user_address).await {
        Ok(resp) => {
            if !resp.is_success() {
                log::error!("[INVENTORY] wallet/connect failed: {} {}", resp.status, resp.text);
            }
            passthrough(&resp)
        }
        Err(e) => bad_gateway("Failed to connect in-app wallet", &e),
    }
}

async fn get_wallet(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let client = match inventory_service(&state) {
        Ok(client) => client,
        Err(resp) => return resp,
    };
    let address = match require_param("address", Some(path.as_str())) {
        Ok(address) => address,
        Err(resp) => return resp,
    };

    match client.get_wallet(&address).await {
        Ok(resp) => passthrough(&resp),
        Err(e) => bad_gateway("Failed to fetch in-app wallet", &e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{state_with, unconfigured_state};
    use crate::upstream::fake::FakeUpstream;
    use actix_web::{test, App};
    use reqwest::Method;
    use serde_json::{json, Value};
    use std::sync::Arc;

    #[actix_web::test]
    async fn test_connect_forwards_and_keeps_raw_errors() {
        let fake = Arc::new(
            FakeUpstream::new().with_text(Method::POST, "/wallet/connect", 500, "Internal Server Error"),
        );
        let app = test::init_service(
            App::new().app_data(web::Data::new(state_with(fake.clone()))).configure(config),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/inventory/wallet/connect")
            .set_json(json!({"userAddress": "0xA"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 500);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["raw"], "Internal Server Error");
        assert_eq!(fake.calls()[0].body, Some(json!({"userAddress": "0xA"})));

        let req = test::TestRequest::post()
            .uri("/api/inventory/wallet/connect")
            .set_json(json!({}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 400);
    }

    #[actix_web::test]
    async fn test_unconfigured_inventory() {
        let app = test::init_service(
            App::new().app_data(web::Data::new(unconfigured_state())).configure(config),
        )
        .await;
        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/api/inventory/wallet/0xA").to_request(),
        )
        .await;
        assert_eq!(resp.status(), 500);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "INVENTORY_API_URL or INVENTORY_API_KEY not configured");
    }
}
