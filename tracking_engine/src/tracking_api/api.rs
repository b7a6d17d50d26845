use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;

use crate::{
    access::{authorize, statistics_scope, AccessError, StatisticsScope, Subject, TrackingAction},
    db_types::{NewLocationUpdate, OrderStatus, OrderSummary, Role, TrackingRecord},
    geo,
    tracking_api::{
        errors::TrackingApiError,
        objects::{EtaOutcome, NoEtaReason, Pagination, RouteSummary, TrackingQueryFilter, TrackingStatistics},
    },
    traits::{OrderDirectory, TrackingStore},
};

/// The transport-free domain service for delivery location tracking.
///
/// Every method takes the authenticated [`Subject`] and consults the central policy in
/// [`crate::access`] before touching storage, so callers cannot bypass authorization by reaching
/// for a lower layer.
pub struct TrackingApi<B> {
    db: B,
}

impl<B> Debug for TrackingApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TrackingApi")
    }
}

impl<B> TrackingApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

/// What a delivery-status transition did.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChangeOutcome {
    pub order: OrderSummary,
    /// Set when the transition ended tracking for the order (terminal status).
    pub tracking_ended_at: Option<DateTime<Utc>>,
}

impl<B> TrackingApi<B>
where B: TrackingStore + OrderDirectory
{
    async fn fetch_order_or_err(&self, order_id: i64) -> Result<OrderSummary, TrackingApiError> {
        self.db.fetch_order(order_id).await?.ok_or(TrackingApiError::OrderNotFound(order_id))
    }

    /// Persist a location sample for an order, upserting the order's single active record.
    ///
    /// Only delivery agents assigned to the order (and admins) pass the policy check. Samples
    /// for orders already in a terminal status are rejected, so a late update cannot resurrect
    /// ended tracking. The write is durable before this returns, so a caller may broadcast the
    /// returned record immediately.
    pub async fn update_location(
        &self,
        subject: &Subject,
        update: NewLocationUpdate,
    ) -> Result<TrackingRecord, TrackingApiError> {
        update.validate()?;
        let order = self.fetch_order_or_err(update.order_id).await?;
        authorize(subject, TrackingAction::SubmitLocation, &order)?;
        if order.status.is_terminal() {
            warn!("📍️ Discarding location sample for order {}: order is {}", order.id, order.status);
            return Err(TrackingApiError::TrackingClosed { order_id: order.id, status: order.status.to_string() });
        }
        let record = self.db.upsert_location(update).await?;
        debug!(
            "📍️ Location for order {} updated to {} by agent {}",
            record.order_id, record.position, record.delivery_agent_id
        );
        Ok(record)
    }

    /// The latest active tracking record for the order, or `None` when tracking has not started
    /// or has ended.
    pub async fn latest_location(
        &self,
        subject: &Subject,
        order_id: i64,
    ) -> Result<Option<TrackingRecord>, TrackingApiError> {
        let order = self.fetch_order_or_err(order_id).await?;
        authorize(subject, TrackingAction::ReadTracking, &order)?;
        Ok(self.db.fetch_latest_location(order_id).await?)
    }

    /// Ends the tracking lifecycle for the order by deactivating its active record(s).
    ///
    /// Idempotent. More than one active record should never exist, but if the invariant was
    /// violated all of them are deactivated.
    pub async fn end_tracking(&self, subject: &Subject, order_id: i64) -> Result<DateTime<Utc>, TrackingApiError> {
        let order = self.fetch_order_or_err(order_id).await?;
        authorize(subject, TrackingAction::EndTracking, &order)?;
        let (rows, ended_at) = self.db.end_tracking(order_id).await?;
        debug!("📍️ Tracking ended for order {order_id}. {rows} record(s) deactivated");
        Ok(ended_at)
    }

    /// All tracking records for the order, oldest first.
    ///
    /// Note that the upsert storage strategy overwrites positions in place, so this returns at
    /// most one record per activity period rather than a breadcrumb trail.
    pub async fn history(&self, subject: &Subject, order_id: i64) -> Result<Vec<TrackingRecord>, TrackingApiError> {
        let order = self.fetch_order_or_err(order_id).await?;
        authorize(subject, TrackingAction::ReadTracking, &order)?;
        Ok(self.db.fetch_history(order_id).await?)
    }

    pub async fn record_by_id(&self, subject: &Subject, id: i64) -> Result<TrackingRecord, TrackingApiError> {
        let record = self.db.fetch_record(id).await?.ok_or(TrackingApiError::RecordNotFound(id))?;
        let order = self.fetch_order_or_err(record.order_id).await?;
        authorize(subject, TrackingAction::ReadTracking, &order)?;
        Ok(record)
    }

    /// Search tracking records. The filter is narrowed to the subject's scope before it reaches
    /// the database; out-of-scope requests are an explicit error, never a silently empty page.
    pub async fn search(
        &self,
        subject: &Subject,
        filter: TrackingQueryFilter,
        pagination: Pagination,
    ) -> Result<Vec<TrackingRecord>, TrackingApiError> {
        let filter = scope_filter(subject, filter)?;
        trace!("📍️ Tracking search by {} {}: {filter}", subject.role, subject.id);
        Ok(self.db.search_records(filter, pagination).await?)
    }

    /// Active tracking records visible to the subject: everything for admins, the pharmacy's own
    /// orders for staff.
    pub async fn active_records(&self, subject: &Subject) -> Result<Vec<TrackingRecord>, TrackingApiError> {
        let pharmacy_id = match statistics_scope(subject)? {
            StatisticsScope::Global => None,
            StatisticsScope::Pharmacy(id) => Some(id),
        };
        Ok(self.db.fetch_active_records(pharmacy_id).await?)
    }

    pub async fn statistics(&self, subject: &Subject) -> Result<TrackingStatistics, TrackingApiError> {
        let scope = statistics_scope(subject)?;
        Ok(self.db.fetch_statistics(scope).await?)
    }

    /// Estimated time of arrival for the order.
    ///
    /// Requires both the order's destination coordinates and an active tracking record; when
    /// either is missing a structured [`EtaOutcome::NoData`] is returned instead of an error.
    pub async fn eta_for_order(&self, subject: &Subject, order_id: i64) -> Result<EtaOutcome, TrackingApiError> {
        let order = self.fetch_order_or_err(order_id).await?;
        authorize(subject, TrackingAction::ReadTracking, &order)?;
        let Some(destination) = order.destination else {
            return Ok(EtaOutcome::NoData { reason: NoEtaReason::NoDestination });
        };
        let Some(record) = self.db.fetch_latest_location(order_id).await? else {
            return Ok(EtaOutcome::NoData { reason: NoEtaReason::NoCurrentPosition });
        };
        let distance_km = geo::haversine_km(record.position, destination);
        let speed = geo::effective_speed_kmh(record.speed_kmh);
        let eta_timestamp = geo::arrival_time(Utc::now(), distance_km, speed);
        Ok(EtaOutcome::Available { eta_timestamp, distance_km, effective_speed_kmh: speed })
    }

    /// The origin/destination/current-position triple for the order, with the straight-line
    /// remainder. No path routing is performed.
    pub async fn route_for_order(&self, subject: &Subject, order_id: i64) -> Result<RouteSummary, TrackingApiError> {
        let order = self.fetch_order_or_err(order_id).await?;
        authorize(subject, TrackingAction::ReadTracking, &order)?;
        let current = self.db.fetch_latest_location(order_id).await?.map(|r| r.position);
        let remaining_km = match (current, order.destination) {
            (Some(from), Some(to)) => Some(geo::haversine_km(from, to)),
            _ => None,
        };
        Ok(RouteSummary {
            order_id,
            origin: order.pharmacy_location,
            destination: order.destination,
            current_position: current,
            remaining_km,
        })
    }

    /// Transition the order's delivery status. Reaching a terminal status ends tracking as a side
    /// effect, so the streaming and synchronous surfaces stay consistent.
    pub async fn record_delivery_status(
        &self,
        subject: &Subject,
        order_id: i64,
        new_status: OrderStatus,
    ) -> Result<StatusChangeOutcome, TrackingApiError> {
        let order = self.fetch_order_or_err(order_id).await?;
        authorize(subject, TrackingAction::ChangeOrderStatus, &order)?;
        if order.status.is_terminal() {
            return Err(TrackingApiError::StatusChangeForbidden {
                order_id,
                status: order.status.to_string(),
                requested: new_status.to_string(),
            });
        }
        let order = self.db.update_order_status(order_id, new_status).await?;
        info!("📍️ Order {order_id} status changed to {new_status} by {} {}", subject.role, subject.id);
        let tracking_ended_at = if new_status.is_terminal() {
            let (rows, ended_at) = self.db.end_tracking(order_id).await?;
            debug!("📍️ Terminal status for order {order_id}: {rows} tracking record(s) deactivated");
            Some(ended_at)
        } else {
            None
        };
        Ok(StatusChangeOutcome { order, tracking_ended_at })
    }
}

/// Narrows a caller-supplied filter to what the subject may see, or rejects the request outright.
fn scope_filter(subject: &Subject, filter: TrackingQueryFilter) -> Result<TrackingQueryFilter, AccessError> {
    match subject.role {
        Role::Admin => Ok(filter),
        Role::PharmacyStaff => {
            let own = subject.pharmacy_id.ok_or(AccessError::ScopeDenied(subject.role))?;
            match filter.pharmacy_id {
                Some(requested) if requested != own => Err(AccessError::ScopeDenied(subject.role)),
                _ => Ok(filter.with_pharmacy(own)),
            }
        },
        Role::DeliveryAgent => match filter.delivery_agent_id {
            Some(requested) if requested != subject.id => Err(AccessError::ScopeDenied(subject.role)),
            _ => Ok(filter.with_agent(subject.id)),
        },
        Role::Customer => Err(AccessError::ScopeDenied(subject.role)),
    }
}
