use ulid::Ulid;

use crate::model::*;

use super::conflict::now_ms;
use super::{Engine, EngineError};

impl Engine {
    // ── Surfaces ─────────────────────────────────────────────

    pub fn get_surface(&self, id: Ulid) -> Result<SurfaceInfo, EngineError> {
        self.store
            .live_surface(&id)
            .map(|s| SurfaceInfo::from(&s))
            .ok_or(EngineError::NotFound(RecordKind::Surface, id))
    }

    pub fn list_surfaces(&self) -> Vec<SurfaceInfo> {
        self.store
            .surfaces()
            .iter()
            .filter(|s| !s.deleted)
            .map(SurfaceInfo::from)
            .collect()
    }

    // ── Courts ───────────────────────────────────────────────

    pub(super) fn court_info(&self, court: &Court) -> Result<CourtInfo, EngineError> {
        let surface = self
            .store
            .surface(&court.surface_id)
            .ok_or(EngineError::NotFound(RecordKind::Surface, court.surface_id))?;
        Ok(CourtInfo {
            id: court.id,
            name: court.name.clone(),
            surface: SurfaceInfo::from(&surface),
        })
    }

    pub async fn get_court(&self, id: Ulid) -> Result<CourtInfo, EngineError> {
        let cs = self
            .store
            .court_state(&id)
            .ok_or(EngineError::NotFound(RecordKind::Court, id))?;
        let guard = cs.read().await;
        if guard.court.deleted {
            return Err(EngineError::NotFound(RecordKind::Court, id));
        }
        self.court_info(&guard.court)
    }

    pub async fn list_courts(&self) -> Result<Vec<CourtInfo>, EngineError> {
        let mut courts = Vec::new();
        for id in self.store.court_ids() {
            let Some(cs) = self.store.court_state(&id) else {
                continue;
            };
            let guard = cs.read().await;
            if !guard.court.deleted {
                courts.push(self.court_info(&guard.court)?);
            }
        }
        Ok(courts)
    }

    // ── Customers ────────────────────────────────────────────

    pub fn get_customer(&self, id: Ulid) -> Result<CustomerInfo, EngineError> {
        self.store
            .customer(&id)
            .filter(|c| !c.deleted)
            .map(|c| CustomerInfo::from(&c))
            .ok_or(EngineError::NotFound(RecordKind::Customer, id))
    }

    pub fn find_customer_by_phone(&self, phone: &str) -> Result<CustomerInfo, EngineError> {
        self.store
            .customer_by_phone(phone)
            .map(|c| CustomerInfo::from(&c))
            .ok_or_else(|| EngineError::PhoneNotFound(phone.to_string()))
    }

    pub fn list_customers(&self) -> Vec<CustomerInfo> {
        self.store
            .customers()
            .iter()
            .filter(|c| !c.deleted)
            .map(CustomerInfo::from)
            .collect()
    }

    // ── Reservations ─────────────────────────────────────────

    /// Join a reservation with its court, surface and customer. Deleted
    /// courts, surfaces and customers are still shown.
    pub(super) fn reservation_info(
        &self,
        reservation: &Reservation,
        court: &Court,
    ) -> Result<ReservationInfo, EngineError> {
        let customer = self
            .store
            .customer(&reservation.customer_id)
            .ok_or(EngineError::NotFound(
                RecordKind::Customer,
                reservation.customer_id,
            ))?;
        Ok(ReservationInfo {
            id: reservation.id,
            doubles: reservation.doubles,
            created_at: reservation.created_at,
            starts_at: reservation.span.start,
            ends_at: reservation.span.end,
            price: reservation.price,
            customer: CustomerInfo::from(&customer),
            court: self.court_info(court)?,
        })
    }

    pub async fn get_reservation(&self, id: Ulid) -> Result<ReservationInfo, EngineError> {
        loop {
            let court_id = self
                .store
                .court_for_reservation(&id)
                .ok_or(EngineError::NotFound(RecordKind::Reservation, id))?;
            let cs = self
                .store
                .court_state(&court_id)
                .ok_or(EngineError::NotFound(RecordKind::Court, court_id))?;
            let guard = cs.read().await;
            // Moved to another court while we waited for the lock.
            if self.store.court_for_reservation(&id) != Some(court_id) {
                continue;
            }
            let reservation = guard
                .get_live(id)
                .ok_or(EngineError::NotFound(RecordKind::Reservation, id))?;
            return self.reservation_info(reservation, &guard.court);
        }
    }

    /// Every live reservation on every court, in court id then start order.
    pub async fn list_reservations(&self) -> Result<Vec<ReservationInfo>, EngineError> {
        self.collect_reservations(|_| true).await
    }

    /// Live reservations on one court ordered by creation time. Unknown
    /// courts yield an empty list.
    pub async fn reservations_by_court(
        &self,
        court_id: Ulid,
    ) -> Result<Vec<ReservationInfo>, EngineError> {
        let Some(cs) = self.store.court_state(&court_id) else {
            return Ok(Vec::new());
        };
        let guard = cs.read().await;
        let mut out = guard
            .live()
            .map(|r| self.reservation_info(r, &guard.court))
            .collect::<Result<Vec<_>, _>>()?;
        out.sort_by_key(|r| (r.created_at, r.id));
        Ok(out)
    }

    pub async fn reservations_by_phone(
        &self,
        phone: &str,
    ) -> Result<Vec<ReservationInfo>, EngineError> {
        self.reservations_by_phone_since(phone, None).await
    }

    /// Reservations for `phone` that have not started yet.
    pub async fn future_reservations_by_phone(
        &self,
        phone: &str,
    ) -> Result<Vec<ReservationInfo>, EngineError> {
        self.reservations_by_phone_since(phone, Some(now_ms())).await
    }

    pub(super) async fn reservations_by_phone_since(
        &self,
        phone: &str,
        after: Option<Ms>,
    ) -> Result<Vec<ReservationInfo>, EngineError> {
        let Some(customer) = self.store.customer_by_phone(phone) else {
            return Ok(Vec::new());
        };
        self.collect_reservations(|r| {
            r.customer_id == customer.id && after.is_none_or(|t| r.span.start > t)
        })
        .await
    }

    async fn collect_reservations<F>(&self, keep: F) -> Result<Vec<ReservationInfo>, EngineError>
    where
        F: Fn(&Reservation) -> bool,
    {
        let mut out = Vec::new();
        for court_id in self.store.court_ids() {
            let Some(cs) = self.store.court_state(&court_id) else {
                continue;
            };
            let guard = cs.read().await;
            for r in guard.live().filter(|r| keep(r)) {
                out.push(self.reservation_info(r, &guard.court)?);
            }
        }
        Ok(out)
    }
}
