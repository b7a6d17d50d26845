mod support;

use support::{prepare_test_db, seed_order};
use tracking_engine::{
    access::Subject,
    db_types::{Coordinates, NewLocationUpdate, OrderStatus, Role},
    tracking_api::{EtaOutcome, NoEtaReason, Pagination, TrackingQueryFilter},
    TrackingApi,
    TrackingApiError,
    TrackingStore,
};

fn point(lat: f64, lng: f64) -> Coordinates {
    Coordinates::new(lat, lng).unwrap()
}

fn admin() -> Subject {
    Subject::new(1, Role::Admin)
}

fn agent(id: i64) -> Subject {
    Subject::new(id, Role::DeliveryAgent)
}

#[tokio::test]
async fn repeated_updates_keep_a_single_active_record() {
    let db = prepare_test_db().await;
    seed_order(&db, 42, 100, 7, Some(55), Some(point(5.3600, -4.0000))).await;
    let api = TrackingApi::new(db);

    let first = api.update_location(&agent(55), NewLocationUpdate::new(42, 55, point(5.3450, -4.0240))).await.unwrap();
    let mut second = NewLocationUpdate::new(42, 55, point(5.3500, -4.0100));
    second.speed_kmh = Some(18.0);
    second.battery_percent = Some(76.0);
    let second = api.update_location(&agent(55), second).await.unwrap();

    assert_eq!(first.id, second.id, "the active record must be updated in place");
    assert_eq!(second.position, point(5.3500, -4.0100));
    assert_eq!(second.speed_kmh, Some(18.0));
    assert!(second.updated_at >= first.updated_at);

    let history = api.history(&admin(), 42).await.unwrap();
    assert_eq!(history.len(), 1, "upsert storage keeps one row per activity period");
    assert!(history[0].is_active);
}

#[tokio::test]
async fn simultaneous_first_updates_keep_a_single_active_record() {
    let db = prepare_test_db().await;
    seed_order(&db, 70, 100, 7, Some(55), None).await;
    let api = TrackingApi::new(db);

    // Both updates race for the first insert; the unique active-record index arbitrates.
    let subject = agent(55);
    let first = api.update_location(&subject, NewLocationUpdate::new(70, 55, point(5.0, -4.0)));
    let second = api.update_location(&subject, NewLocationUpdate::new(70, 55, point(5.1, -4.1)));
    let (first, second) = tokio::join!(first, second);
    let (first, second) = (first.unwrap(), second.unwrap());
    assert_eq!(first.id, second.id, "racing first updates must converge on one record");

    let history = api.history(&admin(), 70).await.unwrap();
    assert_eq!(history.len(), 1);
    assert!(history[0].is_active);
}

#[tokio::test]
async fn reassigned_agent_takes_over_the_active_record() {
    let db = prepare_test_db().await;
    seed_order(&db, 43, 100, 7, Some(55), None).await;
    let api = TrackingApi::new(db);

    let first = api.update_location(&agent(55), NewLocationUpdate::new(43, 55, point(5.0, -4.0))).await.unwrap();

    // The order is handed to a different agent mid-delivery.
    sqlx::query("UPDATE orders SET assigned_agent_id = 56 WHERE id = 43")
        .execute(api.db().pool())
        .await
        .unwrap();

    let second = api.update_location(&agent(56), NewLocationUpdate::new(43, 56, point(5.1, -4.1))).await.unwrap();
    assert_eq!(first.id, second.id, "reassignment must not create a second active record");
    assert_eq!(second.delivery_agent_id, 56);

    let latest = api.latest_location(&admin(), 43).await.unwrap().unwrap();
    assert_eq!(latest.delivery_agent_id, 56);
}

#[tokio::test]
async fn end_tracking_deactivates_and_is_idempotent() {
    let db = prepare_test_db().await;
    seed_order(&db, 44, 100, 7, Some(55), None).await;
    let api = TrackingApi::new(db);

    api.update_location(&agent(55), NewLocationUpdate::new(44, 55, point(5.0, -4.0))).await.unwrap();
    assert!(api.latest_location(&admin(), 44).await.unwrap().is_some());

    api.end_tracking(&agent(55), 44).await.unwrap();
    assert!(api.latest_location(&admin(), 44).await.unwrap().is_none());

    // A second call is a no-op, not an error.
    api.end_tracking(&agent(55), 44).await.unwrap();

    // The record is kept, just inactive.
    let history = api.history(&admin(), 44).await.unwrap();
    assert_eq!(history.len(), 1);
    assert!(!history[0].is_active);
}

#[tokio::test]
async fn eta_reports_missing_inputs_instead_of_failing() {
    let db = prepare_test_db().await;
    seed_order(&db, 45, 100, 7, Some(55), None).await;
    seed_order(&db, 46, 100, 7, Some(55), Some(point(5.3600, -4.0000))).await;
    let api = TrackingApi::new(db);

    api.update_location(&agent(55), NewLocationUpdate::new(45, 55, point(5.3450, -4.0240))).await.unwrap();
    let eta = api.eta_for_order(&admin(), 45).await.unwrap();
    assert_eq!(eta, EtaOutcome::NoData { reason: NoEtaReason::NoDestination });

    let eta = api.eta_for_order(&admin(), 46).await.unwrap();
    assert_eq!(eta, EtaOutcome::NoData { reason: NoEtaReason::NoCurrentPosition });

    let missing = api.eta_for_order(&admin(), 999).await;
    assert!(matches!(missing, Err(TrackingApiError::OrderNotFound(999))));
}

#[tokio::test]
async fn eta_for_the_abidjan_scenario() {
    let db = prepare_test_db().await;
    seed_order(&db, 42, 100, 7, Some(55), Some(point(5.3600, -4.0000))).await;
    let api = TrackingApi::new(db);

    // No reported speed: the 20 km/h default applies.
    api.update_location(&agent(55), NewLocationUpdate::new(42, 55, point(5.3450, -4.0240))).await.unwrap();
    let before = chrono::Utc::now();
    match api.eta_for_order(&admin(), 42).await.unwrap() {
        EtaOutcome::Available { eta_timestamp, distance_km, effective_speed_kmh } => {
            assert!((3.0..3.3).contains(&distance_km), "expected roughly 3.1 km, got {distance_km}");
            assert_eq!(effective_speed_kmh, 20.0);
            let minutes = (eta_timestamp - before).num_seconds() as f64 / 60.0;
            assert!((8.5..10.5).contains(&minutes), "expected roughly 9.4 minutes, got {minutes}");
        },
        other => panic!("expected an available ETA, got {other:?}"),
    }
}

#[tokio::test]
async fn route_summary_contains_the_three_points() {
    let db = prepare_test_db().await;
    seed_order(&db, 47, 100, 7, Some(55), Some(point(5.3600, -4.0000))).await;
    let api = TrackingApi::new(db);

    api.update_location(&agent(55), NewLocationUpdate::new(47, 55, point(5.3450, -4.0240))).await.unwrap();
    let route = api.route_for_order(&admin(), 47).await.unwrap();
    assert_eq!(route.origin, Some(point(5.3400, -4.0300)));
    assert_eq!(route.destination, Some(point(5.3600, -4.0000)));
    assert_eq!(route.current_position, Some(point(5.3450, -4.0240)));
    let km = route.remaining_km.unwrap();
    assert!((3.0..3.3).contains(&km));
}

#[tokio::test]
async fn terminal_status_change_ends_tracking() {
    let db = prepare_test_db().await;
    seed_order(&db, 48, 100, 7, Some(55), None).await;
    let api = TrackingApi::new(db);

    api.update_location(&agent(55), NewLocationUpdate::new(48, 55, point(5.0, -4.0))).await.unwrap();
    let outcome = api.record_delivery_status(&admin(), 48, OrderStatus::Delivered).await.unwrap();
    assert_eq!(outcome.order.status, OrderStatus::Delivered);
    assert!(outcome.tracking_ended_at.is_some());
    assert!(api.latest_location(&admin(), 48).await.unwrap().is_none());

    // Terminal statuses may not change again.
    let err = api.record_delivery_status(&admin(), 48, OrderStatus::Pending).await;
    assert!(matches!(err, Err(TrackingApiError::StatusChangeForbidden { .. })));
}

#[tokio::test]
async fn late_samples_cannot_resurrect_ended_tracking() {
    let db = prepare_test_db().await;
    seed_order(&db, 53, 100, 7, Some(55), None).await;
    let api = TrackingApi::new(db);

    api.update_location(&agent(55), NewLocationUpdate::new(53, 55, point(5.0, -4.0))).await.unwrap();
    api.record_delivery_status(&admin(), 53, OrderStatus::Delivered).await.unwrap();

    // A sample still in flight when the order completed must be refused.
    let err = api.update_location(&agent(55), NewLocationUpdate::new(53, 55, point(5.1, -4.1))).await;
    assert!(matches!(err, Err(TrackingApiError::TrackingClosed { order_id: 53, .. })));
    assert!(api.latest_location(&admin(), 53).await.unwrap().is_none(), "tracking must stay ended");

    let history = api.history(&admin(), 53).await.unwrap();
    assert_eq!(history.len(), 1);
    assert!(!history[0].is_active);
}

#[tokio::test]
async fn unassigned_agents_and_customers_are_rejected() {
    let db = prepare_test_db().await;
    seed_order(&db, 49, 100, 7, Some(55), None).await;
    let api = TrackingApi::new(db);

    let err = api.update_location(&agent(56), NewLocationUpdate::new(49, 56, point(5.0, -4.0))).await;
    assert!(matches!(err, Err(TrackingApiError::AccessDenied(_))));

    let customer = Subject::new(100, Role::Customer);
    let err = api.update_location(&customer, NewLocationUpdate::new(49, 100, point(5.0, -4.0))).await;
    assert!(matches!(err, Err(TrackingApiError::AccessDenied(_))));

    // No record must have been created by the rejected calls.
    assert!(api.latest_location(&admin(), 49).await.unwrap().is_none());
}

#[tokio::test]
async fn search_and_statistics_are_scoped() {
    let db = prepare_test_db().await;
    seed_order(&db, 50, 100, 7, Some(55), None).await;
    seed_order(&db, 51, 101, 7, Some(55), None).await;
    seed_order(&db, 52, 102, 8, Some(56), None).await;
    let api = TrackingApi::new(db);

    api.update_location(&agent(55), NewLocationUpdate::new(50, 55, point(5.0, -4.0))).await.unwrap();
    api.update_location(&agent(55), NewLocationUpdate::new(51, 55, point(5.1, -4.1))).await.unwrap();
    api.update_location(&agent(56), NewLocationUpdate::new(52, 56, point(5.2, -4.2))).await.unwrap();

    let all = api.search(&admin(), TrackingQueryFilter::default(), Pagination::default()).await.unwrap();
    assert_eq!(all.len(), 3);

    let staff = Subject::with_pharmacy(2, 7);
    let own = api.search(&staff, TrackingQueryFilter::default(), Pagination::default()).await.unwrap();
    assert_eq!(own.len(), 2);
    assert!(own.iter().all(|r| [50, 51].contains(&r.order_id)));

    let mine = api.search(&agent(56), TrackingQueryFilter::default(), Pagination::default()).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].order_id, 52);

    let stats = api.statistics(&staff).await.unwrap();
    assert_eq!(stats.total_by_status.len(), 1);
    assert_eq!(stats.total_by_status[0].total, 2);
    assert_eq!(stats.today_count, 2);

    let global = api.statistics(&admin()).await.unwrap();
    let total: i64 = global.total_by_status.iter().map(|c| c.total).sum();
    assert_eq!(total, 3);
    assert_eq!(global.today_count, 3);

    let customer = Subject::new(100, Role::Customer);
    assert!(api.statistics(&customer).await.is_err());

    // Statistics describe live deliveries; ended tracking drops out of both figures.
    api.end_tracking(&agent(56), 52).await.unwrap();
    let global = api.statistics(&admin()).await.unwrap();
    let total: i64 = global.total_by_status.iter().map(|c| c.total).sum();
    assert_eq!(total, 2);
    assert_eq!(global.today_count, 2);
}

#[tokio::test]
async fn active_filter_and_pagination() {
    let db = prepare_test_db().await;
    seed_order(&db, 60, 100, 7, Some(55), None).await;
    seed_order(&db, 61, 100, 7, Some(55), None).await;
    let api = TrackingApi::new(db);

    api.update_location(&agent(55), NewLocationUpdate::new(60, 55, point(5.0, -4.0))).await.unwrap();
    api.update_location(&agent(55), NewLocationUpdate::new(61, 55, point(5.1, -4.1))).await.unwrap();
    api.end_tracking(&agent(55), 60).await.unwrap();

    let active = api
        .search(&admin(), TrackingQueryFilter::default().active_only(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].order_id, 61);

    let page = api
        .search(&admin(), TrackingQueryFilter::default(), Pagination::new(Some(0), Some(1)))
        .await
        .unwrap();
    assert_eq!(page.len(), 1);

    let records = api.db().fetch_active_records(Some(7)).await.unwrap();
    assert_eq!(records.len(), 1);
}
