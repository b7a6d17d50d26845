use std::time::Duration;

use actix_web::{http::KeepAlive, middleware::Logger, web, App, HttpServer};
use tracking_engine::{SqliteDatabase, TrackingApi};

use crate::{
    auth::TokenVerifier,
    config::ServerConfig,
    errors::ServerError,
    gateway::{session::tracking_ws, GatewayOptions, SubscriptionRegistry},
    routes::{
        health,
        ActiveTrackingRoute,
        EndTrackingRoute,
        LatestForOrderRoute,
        OrderEtaRoute,
        OrderHistoryRoute,
        OrderRouteRoute,
        SubmitLocationRoute,
        TrackingRecordRoute,
        TrackingSearchRoute,
        TrackingStatisticsRoute,
        UpdateOrderStatusRoute,
    },
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let srv = create_server_instance(config, db)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(config: ServerConfig, db: SqliteDatabase) -> Result<actix_web::dev::Server, ServerError> {
    // One registry for the whole server; worker threads share it so broadcasts reach watchers
    // regardless of which worker accepted their socket.
    let registry = web::Data::new(SubscriptionRegistry::new());
    let options = web::Data::new(GatewayOptions { min_update_interval: config.min_update_interval });
    let srv = HttpServer::new(move || {
        let api = TrackingApi::new(db.clone());
        let verifier = TokenVerifier::new(&config.auth);
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("dts::access_log"))
            .app_data(web::Data::new(api))
            .app_data(web::Data::new(verifier))
            .app_data(registry.clone())
            .app_data(options.clone());
        // Literal paths must register before the parameterised ones under /tracking.
        let api_scope = web::scope("/api")
            .service(TrackingSearchRoute::<SqliteDatabase>::new())
            .service(ActiveTrackingRoute::<SqliteDatabase>::new())
            .service(TrackingStatisticsRoute::<SqliteDatabase>::new())
            .service(SubmitLocationRoute::<SqliteDatabase>::new())
            .service(LatestForOrderRoute::<SqliteDatabase>::new())
            .service(OrderHistoryRoute::<SqliteDatabase>::new())
            .service(OrderEtaRoute::<SqliteDatabase>::new())
            .service(OrderRouteRoute::<SqliteDatabase>::new())
            .service(EndTrackingRoute::<SqliteDatabase>::new())
            .service(UpdateOrderStatusRoute::<SqliteDatabase>::new())
            .service(TrackingRecordRoute::<SqliteDatabase>::new());
        app.service(api_scope)
            .service(health)
            .route("/ws/tracking", web::get().to(tracking_ws::<SqliteDatabase>))
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
