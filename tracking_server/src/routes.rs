//! Request handler definitions
//!
//! Define each route and its handler here. Handlers that are more than a line or two MUST go into
//! a separate module. Keep this module neat and tidy 🙏
//!
//! Every handler extracts [`JwtClaims`] and hands the resulting subject to the engine, which owns
//! the authorization decision. Handlers never filter or deny by role themselves.

use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use tracking_engine::{
    db_types::OrderStatus,
    tracking_api::EtaOutcome,
    OrderDirectory,
    TrackingApi,
    TrackingStore,
};

use crate::{
    auth::JwtClaims,
    data_objects::{LocationSubmission, StatusChangeRequest, TrackingListParams},
    errors::ServerError,
    gateway::{
        messages::{EtaUpdated, ServerEvent, TrackingEnded},
        SubscriptionRegistry,
    },
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:path),+) => {
        paste::paste! { pub struct [<$name:camel Route>]<A>(core::marker::PhantomData<fn() -> A>);}
        paste::paste! { impl<A> [<$name:camel Route>]<A> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> A>)
            }
        }}
        paste::paste! { impl<A> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<A>
        where
            A: $($bounds +)+ 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<A>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

//----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Queries  ----------------------------------------------------

route!(tracking_search => Get "/tracking" impl TrackingStore, OrderDirectory);
/// Searches tracking records. The engine narrows the filter to the caller's scope: staff see
/// their own pharmacy, agents see themselves, and customers cannot list at all.
pub async fn tracking_search<A: TrackingStore + OrderDirectory>(
    claims: JwtClaims,
    params: web::Query<TrackingListParams>,
    api: web::Data<TrackingApi<A>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET tracking search for {} {}", claims.role, claims.sub);
    let (filter, pagination) =
        params.into_inner().into_parts().map_err(|e| ServerError::InvalidRequestBody(e.to_string()))?;
    let records = api.search(&claims.as_subject(), filter, pagination).await?;
    Ok(HttpResponse::Ok().json(records))
}

route!(active_tracking => Get "/tracking/active" impl TrackingStore, OrderDirectory);
/// All deliveries currently in motion, for the operations dashboard.
pub async fn active_tracking<A: TrackingStore + OrderDirectory>(
    claims: JwtClaims,
    api: web::Data<TrackingApi<A>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET active tracking for {} {}", claims.role, claims.sub);
    let records = api.active_records(&claims.as_subject()).await?;
    Ok(HttpResponse::Ok().json(records))
}

route!(tracking_statistics => Get "/tracking/statistics" impl TrackingStore, OrderDirectory);
pub async fn tracking_statistics<A: TrackingStore + OrderDirectory>(
    claims: JwtClaims,
    api: web::Data<TrackingApi<A>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET tracking statistics for {} {}", claims.role, claims.sub);
    let stats = api.statistics(&claims.as_subject()).await?;
    Ok(HttpResponse::Ok().json(stats))
}

route!(tracking_record => Get "/tracking/{id}" impl TrackingStore, OrderDirectory);
pub async fn tracking_record<A: TrackingStore + OrderDirectory>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<TrackingApi<A>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    debug!("💻️ GET tracking record {id}");
    let record = api.record_by_id(&claims.as_subject(), id).await?;
    Ok(HttpResponse::Ok().json(record))
}

route!(latest_for_order => Get "/tracking/order/{order_id}" impl TrackingStore, OrderDirectory);
/// The current position for an order, or 404 when nothing is being tracked.
pub async fn latest_for_order<A: TrackingStore + OrderDirectory>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<TrackingApi<A>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ GET latest location for order {order_id}");
    let record = api
        .latest_location(&claims.as_subject(), order_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("No active tracking for order {order_id}")))?;
    Ok(HttpResponse::Ok().json(record))
}

route!(order_history => Get "/tracking/order/{order_id}/history" impl TrackingStore, OrderDirectory);
pub async fn order_history<A: TrackingStore + OrderDirectory>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<TrackingApi<A>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ GET tracking history for order {order_id}");
    let history = api.history(&claims.as_subject(), order_id).await?;
    Ok(HttpResponse::Ok().json(history))
}

route!(order_eta => Get "/tracking/order/{order_id}/eta" impl TrackingStore, OrderDirectory);
/// The ETA for an order. Missing inputs produce a structured `noData` body, not an error status.
pub async fn order_eta<A: TrackingStore + OrderDirectory>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<TrackingApi<A>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ GET eta for order {order_id}");
    let outcome = api.eta_for_order(&claims.as_subject(), order_id).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

route!(order_route => Get "/tracking/order/{order_id}/route" impl TrackingStore, OrderDirectory);
pub async fn order_route<A: TrackingStore + OrderDirectory>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<TrackingApi<A>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ GET route for order {order_id}");
    let summary = api.route_for_order(&claims.as_subject(), order_id).await?;
    Ok(HttpResponse::Ok().json(summary))
}

//----------------------------------------------   Commands  ----------------------------------------------------

route!(submit_location => Post "/tracking/location" impl TrackingStore, OrderDirectory);
/// Synchronous fallback for agents without a live socket. Accepted updates fan out to the order's
/// gateway watchers exactly like socket-borne ones.
pub async fn submit_location<A: TrackingStore + OrderDirectory>(
    claims: JwtClaims,
    body: web::Json<LocationSubmission>,
    api: web::Data<TrackingApi<A>>,
    registry: web::Data<SubscriptionRegistry>,
) -> Result<HttpResponse, ServerError> {
    let update = body
        .into_inner()
        .into_new_update(claims.sub)
        .map_err(|e| ServerError::InvalidRequestBody(e.to_string()))?;
    let order_id = update.order_id;
    debug!("💻️ POST location update for order {order_id} by {} {}", claims.role, claims.sub);
    let record = api.update_location(&claims.as_subject(), update).await?;
    registry.broadcast(order_id, ServerEvent::LocationUpdated((&record).into()));
    // Watchers expect every accepted update to be followed by a fresh ETA, whichever surface
    // the update arrived on.
    match api.eta_for_order(&claims.as_subject(), order_id).await {
        Ok(EtaOutcome::Available { eta_timestamp, distance_km, .. }) => {
            registry.broadcast(order_id, ServerEvent::EtaUpdated(EtaUpdated { order_id, eta_timestamp, distance_km }));
        },
        Ok(EtaOutcome::NoData { .. }) => {},
        Err(e) => debug!("💻️ ETA for order {order_id} unavailable after update. {e}"),
    }
    Ok(HttpResponse::Ok().json(record))
}

route!(end_tracking => Post "/tracking/order/{order_id}/end" impl TrackingStore, OrderDirectory);
pub async fn end_tracking<A: TrackingStore + OrderDirectory>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<TrackingApi<A>>,
    registry: web::Data<SubscriptionRegistry>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ POST end tracking for order {order_id} by {} {}", claims.role, claims.sub);
    let ended_at = api.end_tracking(&claims.as_subject(), order_id).await?;
    registry.broadcast(order_id, ServerEvent::TrackingEnded(TrackingEnded { order_id, ended_at }));
    Ok(HttpResponse::Ok().json(serde_json::json!({ "orderId": order_id, "endedAt": ended_at })))
}

route!(update_order_status => Post "/tracking/order/{order_id}/status" impl TrackingStore, OrderDirectory);
/// Records a delivery status change. A terminal status (Delivered, Cancelled) also ends tracking
/// and notifies the order's watchers.
pub async fn update_order_status<A: TrackingStore + OrderDirectory>(
    claims: JwtClaims,
    path: web::Path<i64>,
    body: web::Json<StatusChangeRequest>,
    api: web::Data<TrackingApi<A>>,
    registry: web::Data<SubscriptionRegistry>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    let new_status: OrderStatus = body.into_inner().status;
    debug!("💻️ POST status {new_status} for order {order_id} by {} {}", claims.role, claims.sub);
    let outcome = api.record_delivery_status(&claims.as_subject(), order_id, new_status).await?;
    if let Some(ended_at) = outcome.tracking_ended_at {
        registry.broadcast(order_id, ServerEvent::TrackingEnded(TrackingEnded { order_id, ended_at }));
    }
    Ok(HttpResponse::Ok().json(outcome.order))
}
