//! The per-connection session task.
//!
//! [`tracking_ws`] is the HTTP handler that upgrades the request. Authentication happens *before*
//! the upgrade (the token travels in the `token` query parameter, since browsers cannot set an
//! `Authorization` header on a WebSocket handshake); an invalid token is a plain 401 response and
//! no socket is ever opened. After the upgrade, one task per connection owns the socket and
//! processes inbound events strictly in arrival order, interleaved with outbound broadcasts from
//! the [`SubscriptionRegistry`].

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use actix_web::{web, HttpRequest, HttpResponse};
use actix_ws::Message;
use log::*;
use serde::Deserialize;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracking_engine::{
    access::Subject,
    db_types::{Coordinates, NewLocationUpdate, Role},
    tracking_api::EtaOutcome,
    OrderDirectory,
    TrackingApi,
    TrackingStore,
};

use super::{
    messages::{Ack, ClientEvent, EtaUpdated, LocationSample, ServerEvent, TrackingEnded, TrackingInterrupted},
    registry::{ConnId, SubscriptionRegistry},
};
use crate::{auth::TokenVerifier, errors::ServerError};

/// Tuning knobs for the gateway, injected as shared application data.
#[derive(Debug, Clone, Default)]
pub struct GatewayOptions {
    /// Location updates for one order arriving faster than this are refused with a
    /// `rate_limited` ack instead of being written.
    pub min_update_interval: Option<Duration>,
}

#[derive(Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

/// Upgrades `GET /ws/tracking?token=...` to a WebSocket session.
pub async fn tracking_ws<B>(
    req: HttpRequest,
    stream: web::Payload,
    query: web::Query<WsQuery>,
    api: web::Data<TrackingApi<B>>,
    registry: web::Data<SubscriptionRegistry>,
    verifier: web::Data<TokenVerifier>,
    options: web::Data<GatewayOptions>,
) -> Result<HttpResponse, ServerError>
where B: TrackingStore + OrderDirectory + 'static
{
    let token = query.into_inner().token.ok_or_else(|| {
        ServerError::Unauthenticated("No access token was provided in the token query parameter".to_string())
    })?;
    let subject = verifier.decode(&token)?.as_subject();
    let (response, session, msg_stream) = actix_ws::handle(&req, stream)
        .map_err(|e| ServerError::InitializeError(format!("WebSocket handshake failed. {e}")))?;
    let options = options.get_ref().clone();
    actix_web::rt::spawn(run_session(subject, api, registry, options, session, msg_stream));
    Ok(response)
}

async fn run_session<B>(
    subject: Subject,
    api: web::Data<TrackingApi<B>>,
    registry: web::Data<SubscriptionRegistry>,
    options: GatewayOptions,
    mut session: actix_ws::Session,
    mut msg_stream: actix_ws::MessageStream,
) where
    B: TrackingStore + OrderDirectory + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel();
    let conn = registry.register(subject, tx.clone());
    info!("📡️ Session {conn} opened for {} {}", subject.role, subject.id);
    let mut handler =
        EventHandler { subject, conn, api, registry: registry.clone(), options, tx, last_update: HashMap::new() };
    loop {
        tokio::select! {
            msg = msg_stream.recv() => match msg {
                Some(Ok(Message::Text(text))) => handler.handle_frame(&text).await,
                Some(Ok(Message::Ping(bytes))) => {
                    if session.pong(&bytes).await.is_err() {
                        break;
                    }
                },
                Some(Ok(Message::Close(reason))) => {
                    debug!("📡️ Session {conn} closed by peer. {reason:?}");
                    break;
                },
                Some(Ok(_)) => {}, // binary, pong and continuation frames are ignored
                Some(Err(e)) => {
                    debug!("📡️ Session {conn} protocol error. {e}");
                    break;
                },
                None => break,
            },
            outbound = rx.recv() => match outbound {
                Some(event) => {
                    let frame = match serde_json::to_string(&event) {
                        Ok(frame) => frame,
                        Err(e) => {
                            error!("📡️ Could not serialize an outbound event. {e}");
                            continue;
                        },
                    };
                    if session.text(frame).await.is_err() {
                        break;
                    }
                },
                None => break,
            },
        }
    }
    let _ = session.close(None).await;
    handler.teardown();
    info!("📡️ Session {conn} closed");
}

struct EventHandler<B: TrackingStore + OrderDirectory> {
    subject: Subject,
    conn: ConnId,
    api: web::Data<TrackingApi<B>>,
    registry: web::Data<SubscriptionRegistry>,
    options: GatewayOptions,
    tx: UnboundedSender<ServerEvent>,
    /// Per-order arrival time of the last accepted location update, for throttling.
    last_update: HashMap<i64, Instant>,
}

impl<B: TrackingStore + OrderDirectory> EventHandler<B> {
    async fn handle_frame(&mut self, text: &str) {
        let event = match serde_json::from_str::<ClientEvent>(text) {
            Ok(event) => event,
            Err(e) => {
                debug!("📡️ Session {} sent an unintelligible frame. {e}", self.conn);
                self.ack(Ack::fail(format!("Could not parse the event. {e}")));
                return;
            },
        };
        match event {
            ClientEvent::SubscribeToOrder(order) => self.subscribe(order.order_id).await,
            ClientEvent::UnsubscribeFromOrder(order) => {
                self.registry.unsubscribe(self.conn, order.order_id);
                self.ack(Ack::ok());
            },
            ClientEvent::UpdateLocation(sample) => self.update_location(sample).await,
            ClientEvent::EndTracking(order) => self.end_tracking(order.order_id).await,
        }
    }

    /// Subscribes the connection to an order's broadcasts, after checking that the subject may
    /// read the order's tracking data. A successful subscription immediately pushes the current
    /// position and ETA (when there is one) so new watchers need no extra round-trip.
    async fn subscribe(&mut self, order_id: i64) {
        let record = match self.api.latest_location(&self.subject, order_id).await {
            Ok(record) => record,
            Err(e) => {
                debug!("📡️ Session {} may not watch order {order_id}. {e}", self.conn);
                self.ack(Ack::fail(e.to_string()));
                return;
            },
        };
        self.registry.subscribe(self.conn, order_id);
        self.ack(Ack::ok());
        if let Some(record) = record {
            let _ = self.tx.send(ServerEvent::LocationUpdated((&record).into()));
            self.push_eta(order_id, false).await;
        }
    }

    async fn update_location(&mut self, sample: LocationSample) {
        if self.subject.role != Role::DeliveryAgent {
            self.ack(Ack::fail("unauthorized"));
            return;
        }
        let order_id = sample.order_id;
        if let Some(min_interval) = self.options.min_update_interval {
            if let Some(last) = self.last_update.get(&order_id) {
                if last.elapsed() < min_interval {
                    self.ack(Ack::fail("rate_limited"));
                    return;
                }
            }
        }
        let position = match Coordinates::new(sample.lat, sample.lng) {
            Ok(position) => position,
            Err(e) => {
                self.ack(Ack::fail(e.to_string()));
                return;
            },
        };
        let update = NewLocationUpdate {
            order_id,
            delivery_agent_id: self.subject.id,
            position,
            heading: sample.heading,
            speed_kmh: sample.speed,
            accuracy_meters: sample.accuracy,
            battery_percent: sample.battery_level,
        };
        // The broadcast only happens after the write has been acknowledged by the store.
        match self.api.update_location(&self.subject, update).await {
            Ok(record) => {
                self.last_update.insert(order_id, Instant::now());
                self.registry.note_tracking(self.conn, order_id);
                self.ack(Ack::ok());
                self.registry.broadcast(order_id, ServerEvent::LocationUpdated((&record).into()));
                self.push_eta(order_id, true).await;
            },
            Err(e) => {
                debug!("📡️ Location update for order {order_id} refused. {e}");
                self.ack(Ack::fail(e.to_string()));
            },
        }
    }

    async fn end_tracking(&mut self, order_id: i64) {
        if self.subject.role != Role::DeliveryAgent {
            self.ack(Ack::fail("unauthorized"));
            return;
        }
        match self.api.end_tracking(&self.subject, order_id).await {
            Ok(ended_at) => {
                self.registry.clear_tracking(self.conn, order_id);
                self.last_update.remove(&order_id);
                self.ack(Ack::ok());
                self.registry.broadcast(order_id, ServerEvent::TrackingEnded(TrackingEnded { order_id, ended_at }));
            },
            Err(e) => {
                debug!("📡️ End-tracking for order {order_id} refused. {e}");
                self.ack(Ack::fail(e.to_string()));
            },
        }
    }

    /// Computes the ETA and either broadcasts it to the order's watchers or pushes it to this
    /// connection alone. An order without a destination or position simply produces no frame.
    async fn push_eta(&self, order_id: i64, broadcast: bool) {
        let outcome = match self.api.eta_for_order(&self.subject, order_id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                debug!("📡️ ETA for order {order_id} unavailable. {e}");
                return;
            },
        };
        if let EtaOutcome::Available { eta_timestamp, distance_km, .. } = outcome {
            let event = ServerEvent::EtaUpdated(EtaUpdated { order_id, eta_timestamp, distance_km });
            if broadcast {
                self.registry.broadcast(order_id, event);
            } else {
                let _ = self.tx.send(event);
            }
        }
    }

    fn ack(&self, ack: Ack) {
        let _ = self.tx.send(ServerEvent::Ack(ack));
    }

    /// Removes the connection from the registry and tells watchers about any tracking the
    /// departing agent leaves dangling.
    fn teardown(&self) {
        let Some(outcome) = self.registry.remove(self.conn) else {
            return;
        };
        for order_id in outcome.tracked_orders {
            warn!("📡️ Agent {} disconnected while tracking order {order_id}", self.subject.id);
            self.registry.broadcast(
                order_id,
                ServerEvent::TrackingInterrupted(TrackingInterrupted {
                    order_id,
                    agent_id: self.subject.id,
                    message: "Delivery agent connection lost".to_string(),
                }),
            );
        }
    }
}
