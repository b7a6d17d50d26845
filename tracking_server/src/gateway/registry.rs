//! The in-memory subscription topology.
//!
//! One [`SubscriptionRegistry`] exists per server instance. It is created explicitly and injected
//! as shared application data rather than living in a static, so it is unit-testable and a
//! multi-instance deployment (with an external pub/sub relay) stays a drop-in extension. The
//! topology is process-local and rebuilt empty on restart.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    },
};

use log::*;
use tokio::sync::mpsc::UnboundedSender;
use tracking_engine::{access::Subject, db_types::Role};

use super::messages::ServerEvent;

pub type ConnId = u64;

struct ConnectionEntry {
    subject: Subject,
    sender: UnboundedSender<ServerEvent>,
    /// Orders this connection watches.
    watching: HashSet<i64>,
    /// Orders this connection (a delivery agent) has submitted location updates for. Used to
    /// emit `tracking_interrupted` on disconnect.
    tracking: HashSet<i64>,
}

#[derive(Default)]
struct Inner {
    connections: HashMap<ConnId, ConnectionEntry>,
    /// Reverse index: order id to the set of watching connections.
    watchers: HashMap<i64, HashSet<ConnId>>,
}

/// What [`SubscriptionRegistry::remove`] found when it tore a connection down.
#[derive(Debug)]
pub struct DisconnectOutcome {
    pub subject: Subject,
    /// Orders the departing delivery agent was actively tracking.
    pub tracked_orders: Vec<i64>,
}

#[derive(Default)]
pub struct SubscriptionRegistry {
    next_id: AtomicU64,
    inner: Mutex<Inner>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an authenticated connection and returns its id. Connections that fail
    /// authentication must never reach this point.
    pub fn register(&self, subject: Subject, sender: UnboundedSender<ServerEvent>) -> ConnId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let entry =
            ConnectionEntry { subject, sender, watching: HashSet::new(), tracking: HashSet::new() };
        let mut inner = self.inner.lock().expect("subscription registry poisoned");
        inner.connections.insert(id, entry);
        debug!("📡️ Connection {id} registered for {} {}", subject.role, subject.id);
        id
    }

    /// Adds the (watcher, order) pair to the topology in both directions. Idempotent.
    pub fn subscribe(&self, conn: ConnId, order_id: i64) {
        let mut inner = self.inner.lock().expect("subscription registry poisoned");
        let inner = &mut *inner;
        if let Some(entry) = inner.connections.get_mut(&conn) {
            entry.watching.insert(order_id);
            inner.watchers.entry(order_id).or_default().insert(conn);
            trace!("📡️ Connection {conn} now watches order {order_id}");
        }
    }

    /// Symmetric removal; a no-op if the pair is absent.
    pub fn unsubscribe(&self, conn: ConnId, order_id: i64) {
        let mut inner = self.inner.lock().expect("subscription registry poisoned");
        if let Some(entry) = inner.connections.get_mut(&conn) {
            entry.watching.remove(&order_id);
        }
        if let Some(watchers) = inner.watchers.get_mut(&order_id) {
            watchers.remove(&conn);
            if watchers.is_empty() {
                inner.watchers.remove(&order_id);
            }
        }
    }

    /// Notes that the connection has an accepted location update for the order; the order will
    /// receive a `tracking_interrupted` broadcast if this connection drops.
    pub fn note_tracking(&self, conn: ConnId, order_id: i64) {
        let mut inner = self.inner.lock().expect("subscription registry poisoned");
        if let Some(entry) = inner.connections.get_mut(&conn) {
            entry.tracking.insert(order_id);
        }
    }

    /// The agent ended tracking cleanly; no interruption signal is owed any more.
    pub fn clear_tracking(&self, conn: ConnId, order_id: i64) {
        let mut inner = self.inner.lock().expect("subscription registry poisoned");
        if let Some(entry) = inner.connections.get_mut(&conn) {
            entry.tracking.remove(&order_id);
        }
    }

    /// Sends the event to every watcher of the order. Returns the number of deliveries attempted.
    /// Send failures (a watcher mid-teardown) are ignored; the watcher's own task cleans up.
    pub fn broadcast(&self, order_id: i64, event: ServerEvent) -> usize {
        let senders: Vec<UnboundedSender<ServerEvent>> = {
            let inner = self.inner.lock().expect("subscription registry poisoned");
            let Some(watchers) = inner.watchers.get(&order_id) else {
                return 0;
            };
            watchers.iter().filter_map(|id| inner.connections.get(id)).map(|e| e.sender.clone()).collect()
        };
        let count = senders.len();
        for sender in senders {
            let _ = sender.send(event.clone());
        }
        trace!("📡️ Broadcast to {count} watcher(s) of order {order_id}");
        count
    }

    /// Removes the connection from the topology. For delivery agents the caller receives the
    /// orders still being tracked, so it can emit `tracking_interrupted` exactly once per order.
    pub fn remove(&self, conn: ConnId) -> Option<DisconnectOutcome> {
        let mut inner = self.inner.lock().expect("subscription registry poisoned");
        let entry = inner.connections.remove(&conn)?;
        for order_id in &entry.watching {
            if let Some(watchers) = inner.watchers.get_mut(order_id) {
                watchers.remove(&conn);
                if watchers.is_empty() {
                    inner.watchers.remove(order_id);
                }
            }
        }
        let tracked_orders = if entry.subject.role == Role::DeliveryAgent {
            entry.tracking.iter().copied().collect()
        } else {
            Vec::new()
        };
        debug!("📡️ Connection {conn} removed ({} {})", entry.subject.role, entry.subject.id);
        Some(DisconnectOutcome { subject: entry.subject, tracked_orders })
    }

    pub fn watcher_count(&self, order_id: i64) -> usize {
        let inner = self.inner.lock().expect("subscription registry poisoned");
        inner.watchers.get(&order_id).map(HashSet::len).unwrap_or(0)
    }

    pub fn connection_count(&self) -> usize {
        let inner = self.inner.lock().expect("subscription registry poisoned");
        inner.connections.len()
    }
}
