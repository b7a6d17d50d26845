use actix_web::{
    body::MessageBody,
    http::StatusCode,
    test,
    test::TestRequest,
    web,
    web::ServiceConfig,
    App,
};
use chrono::{DateTime, Duration, Utc};
use log::debug;
use serde::Serialize;
use tracking_engine::db_types::Role;

use crate::{
    auth::{JwtClaims, TokenIssuer, TokenVerifier},
    config::AuthConfig,
    gateway::SubscriptionRegistry,
    helpers::Secret,
};

// A fixed secret for signing test tokens. DO NOT re-use this anywhere.
pub fn get_auth_config() -> AuthConfig {
    AuthConfig { jwt_secret: Secret::new("endpoint-test-secret-do-not-reuse".to_string()) }
}

pub fn issue_token(sub: i64, role: Role, pharmacy_id: Option<i64>) -> String {
    let expiry = Utc::now() + Duration::hours(1);
    issue_token_with_expiry(sub, role, pharmacy_id, expiry)
}

pub fn issue_token_with_expiry(sub: i64, role: Role, pharmacy_id: Option<i64>, expiry: DateTime<Utc>) -> String {
    let issuer = TokenIssuer::new(&get_auth_config());
    let claims = JwtClaims { sub, role, pharmacy_id, exp: expiry.timestamp() };
    issuer.issue_token(&claims).expect("Failed to sign token")
}

pub async fn get_request<F>(token: &str, path: &str, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    let mut req = TestRequest::get().uri(path);
    if !token.is_empty() {
        req = req.insert_header(("Authorization", format!("Bearer {token}")));
    }
    send(req, configure).await
}

pub async fn post_request<F, T>(token: &str, path: &str, body: &T, configure: F) -> (StatusCode, String)
where
    F: FnOnce(&mut ServiceConfig),
    T: Serialize,
{
    let mut req = TestRequest::post().uri(path).set_json(body);
    if !token.is_empty() {
        req = req.insert_header(("Authorization", format!("Bearer {token}")));
    }
    send(req, configure).await
}

async fn send<F>(req: TestRequest, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    let verifier = TokenVerifier::new(&get_auth_config());
    let registry = SubscriptionRegistry::new();
    let app = App::new()
        .app_data(web::Data::new(verifier))
        .app_data(web::Data::new(registry))
        .configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request");
    let res = test::call_service(&service, req.to_request()).await;
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    (status, body)
}
