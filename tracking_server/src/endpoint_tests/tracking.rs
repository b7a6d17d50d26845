use actix_web::{http::StatusCode, test, web, web::ServiceConfig, App};
use chrono::{Duration, Utc};
use tokio::sync::mpsc;
use tracking_engine::{
    access::Subject,
    db_types::{Coordinates, OrderStatus, OrderSummary, Role, TrackingRecord},
    TrackingApi,
};

use super::{
    helpers::{get_auth_config, get_request, issue_token, issue_token_with_expiry, post_request},
    mocks::MockTrackingBackend,
};
use crate::{
    auth::TokenVerifier,
    data_objects::{LocationSubmission, StatusChangeRequest},
    gateway::{messages::ServerEvent, SubscriptionRegistry},
    routes::{
        LatestForOrderRoute,
        OrderEtaRoute,
        SubmitLocationRoute,
        TrackingSearchRoute,
        UpdateOrderStatusRoute,
    },
};

fn order(id: i64, customer_id: i64, agent_id: Option<i64>, status: OrderStatus) -> OrderSummary {
    OrderSummary {
        id,
        customer_id,
        pharmacy_id: 9,
        assigned_agent_id: agent_id,
        status,
        destination: Some(Coordinates { lat: 5.3600, lng: -4.0000 }),
        pharmacy_location: Some(Coordinates { lat: 5.3400, lng: -4.0300 }),
    }
}

fn record(order_id: i64, agent_id: i64) -> TrackingRecord {
    let now = Utc::now();
    TrackingRecord {
        id: 1,
        order_id,
        delivery_agent_id: agent_id,
        position: Coordinates { lat: 5.3450, lng: -4.0240 },
        heading: Some(45.0),
        speed_kmh: Some(22.0),
        accuracy_meters: None,
        battery_percent: Some(80.0),
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

fn with_api(backend: MockTrackingBackend) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let api = TrackingApi::new(backend);
        cfg.app_data(web::Data::new(api))
            .service(TrackingSearchRoute::<MockTrackingBackend>::new())
            .service(SubmitLocationRoute::<MockTrackingBackend>::new())
            .service(OrderEtaRoute::<MockTrackingBackend>::new())
            .service(UpdateOrderStatusRoute::<MockTrackingBackend>::new())
            .service(LatestForOrderRoute::<MockTrackingBackend>::new());
    }
}

#[actix_web::test]
async fn requests_without_a_token_are_rejected() {
    let _ = env_logger::try_init().ok();
    let backend = MockTrackingBackend::new();
    let (status, body) = get_request("", "/tracking/order/42", with_api(backend)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("No bearer token"), "unexpected body: {body}");
}

#[actix_web::test]
async fn expired_tokens_are_rejected() {
    let backend = MockTrackingBackend::new();
    let expired = Utc::now() - Duration::hours(2);
    let token = issue_token_with_expiry(100, Role::Customer, None, expired);
    let (status, _) = get_request(&token, "/tracking/order/42", with_api(backend)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn customers_see_their_own_orders() {
    let mut backend = MockTrackingBackend::new();
    backend
        .expect_fetch_order()
        .returning(|id| Ok(Some(order(id, 100, Some(55), OrderStatus::OutForDelivery))));
    backend.expect_fetch_latest_location().returning(|id| Ok(Some(record(id, 55))));
    let token = issue_token(100, Role::Customer, None);
    let (status, body) = get_request(&token, "/tracking/order/42", with_api(backend)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""orderId":42"#), "unexpected body: {body}");
    assert!(body.contains(r#""batteryPercent":80.0"#), "unexpected body: {body}");
}

#[actix_web::test]
async fn customers_cannot_see_other_customers_orders() {
    let mut backend = MockTrackingBackend::new();
    backend
        .expect_fetch_order()
        .returning(|id| Ok(Some(order(id, 101, Some(55), OrderStatus::OutForDelivery))));
    let token = issue_token(100, Role::Customer, None);
    let (status, _) = get_request(&token, "/tracking/order/42", with_api(backend)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn customers_cannot_list_tracking_records() {
    let backend = MockTrackingBackend::new();
    let token = issue_token(100, Role::Customer, None);
    let (status, _) = get_request(&token, "/tracking", with_api(backend)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn staff_listings_are_pinned_to_their_own_pharmacy() {
    let mut backend = MockTrackingBackend::new();
    backend
        .expect_search_records()
        .withf(|filter, _page| filter.pharmacy_id == Some(9))
        .returning(|_, _| Ok(vec![]));
    let token = issue_token(200, Role::PharmacyStaff, Some(9));
    let (status, body) = get_request(&token, "/tracking", with_api(backend)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "[]");
}

#[actix_web::test]
async fn staff_cannot_request_another_pharmacys_listing() {
    let backend = MockTrackingBackend::new();
    let token = issue_token(200, Role::PharmacyStaff, Some(9));
    let (status, _) = get_request(&token, "/tracking?pharmacyId=10", with_api(backend)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn eta_without_a_destination_reports_no_data() {
    let mut backend = MockTrackingBackend::new();
    backend.expect_fetch_order().returning(|id| {
        let mut order = order(id, 100, Some(55), OrderStatus::OutForDelivery);
        order.destination = None;
        Ok(Some(order))
    });
    let token = issue_token(100, Role::Customer, None);
    let (status, body) = get_request(&token, "/tracking/order/42/eta", with_api(backend)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#""outcome":"noData""#), "unexpected body: {body}");
    assert!(body.contains("no_destination"), "unexpected body: {body}");
}

#[actix_web::test]
async fn agents_can_submit_locations_synchronously() {
    let mut backend = MockTrackingBackend::new();
    backend
        .expect_fetch_order()
        .returning(|id| Ok(Some(order(id, 100, Some(55), OrderStatus::OutForDelivery))));
    backend.expect_upsert_location().returning(|update| {
        let mut record = record(update.order_id, update.delivery_agent_id);
        record.position = update.position;
        Ok(record)
    });
    backend.expect_fetch_latest_location().returning(|id| Ok(Some(record(id, 55))));
    let body = LocationSubmission {
        order_id: 42,
        lat: 5.3450,
        lng: -4.0240,
        heading: Some(45.0),
        speed: Some(22.0),
        accuracy: None,
        battery_level: Some(80.0),
    };
    let token = issue_token(55, Role::DeliveryAgent, None);
    let (status, resp) = post_request(&token, "/tracking/location", &body, with_api(backend)).await;
    assert_eq!(status, StatusCode::OK, "unexpected response: {resp}");
    assert!(resp.contains(r#""deliveryAgentId":55"#), "unexpected body: {resp}");
}

#[actix_web::test]
async fn synchronous_updates_fan_out_a_location_then_an_eta() {
    let mut backend = MockTrackingBackend::new();
    backend
        .expect_fetch_order()
        .returning(|id| Ok(Some(order(id, 100, Some(55), OrderStatus::OutForDelivery))));
    backend.expect_upsert_location().returning(|update| {
        let mut record = record(update.order_id, update.delivery_agent_id);
        record.position = update.position;
        Ok(record)
    });
    backend.expect_fetch_latest_location().returning(|id| Ok(Some(record(id, 55))));

    let registry = web::Data::new(SubscriptionRegistry::new());
    let (watch_tx, mut watch_rx) = mpsc::unbounded_channel();
    let watcher = registry.register(Subject::new(100, Role::Customer), watch_tx);
    registry.subscribe(watcher, 42);

    let app = App::new()
        .app_data(web::Data::new(TokenVerifier::new(&get_auth_config())))
        .app_data(registry.clone())
        .app_data(web::Data::new(TrackingApi::new(backend)))
        .service(SubmitLocationRoute::<MockTrackingBackend>::new());
    let service = test::init_service(app).await;

    let body = LocationSubmission {
        order_id: 42,
        lat: 5.3450,
        lng: -4.0240,
        heading: None,
        speed: Some(22.0),
        accuracy: None,
        battery_level: None,
    };
    let token = issue_token(55, Role::DeliveryAgent, None);
    let req = test::TestRequest::post()
        .uri("/tracking/location")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .set_json(&body)
        .to_request();
    let res = test::call_service(&service, req).await;
    assert_eq!(res.status(), StatusCode::OK);

    assert!(matches!(watch_rx.try_recv(), Ok(ServerEvent::LocationUpdated(_))));
    assert!(matches!(watch_rx.try_recv(), Ok(ServerEvent::EtaUpdated(_))));
    assert!(watch_rx.try_recv().is_err(), "no further events expected for one update");
}

#[actix_web::test]
async fn unassigned_agents_cannot_submit_locations() {
    let mut backend = MockTrackingBackend::new();
    backend
        .expect_fetch_order()
        .returning(|id| Ok(Some(order(id, 100, Some(56), OrderStatus::OutForDelivery))));
    let body = LocationSubmission {
        order_id: 42,
        lat: 5.3450,
        lng: -4.0240,
        heading: None,
        speed: None,
        accuracy: None,
        battery_level: None,
    };
    let token = issue_token(55, Role::DeliveryAgent, None);
    let (status, _) = post_request(&token, "/tracking/location", &body, with_api(backend)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn status_changes_on_terminal_orders_conflict() {
    let mut backend = MockTrackingBackend::new();
    backend.expect_fetch_order().returning(|id| Ok(Some(order(id, 100, Some(55), OrderStatus::Delivered))));
    let token = issue_token(300, Role::Admin, None);
    let body = StatusChangeRequest { status: OrderStatus::OutForDelivery };
    let (status, resp) = post_request(&token, "/tracking/order/42/status", &body, with_api(backend)).await;
    assert_eq!(status, StatusCode::CONFLICT, "unexpected response: {resp}");
}

#[actix_web::test]
async fn unknown_orders_are_not_found() {
    let mut backend = MockTrackingBackend::new();
    backend.expect_fetch_order().returning(|_| Ok(None));
    let token = issue_token(300, Role::Admin, None);
    let (status, _) = get_request(&token, "/tracking/order/42", with_api(backend)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
