use tokio::sync::OwnedRwLockWriteGuard;
use tracing::{info, warn};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability;

use super::conflict::{check_no_conflict, now_ms, validate_interval};
use super::pricing::calculate_price;
use super::{Engine, EngineError, WalCommand};

fn check_name(name: &str, missing: &'static str) -> Result<(), EngineError> {
    if name.trim().is_empty() {
        return Err(EngineError::Validation(missing));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("name too long"));
    }
    Ok(())
}

fn check_customer_name(name: Option<&String>) -> Result<(), EngineError> {
    match name {
        Some(n) if n.len() > MAX_NAME_LEN => Err(EngineError::LimitExceeded("name too long")),
        _ => Ok(()),
    }
}

fn check_phone(phone: &str) -> Result<(), EngineError> {
    if phone.trim().is_empty() {
        return Err(EngineError::Validation("phone number is required"));
    }
    if phone.len() > MAX_PHONE_LEN {
        return Err(EngineError::LimitExceeded("phone number too long"));
    }
    Ok(())
}

fn check_minute_price(price: u32) -> Result<(), EngineError> {
    if price > MAX_MINUTE_PRICE {
        return Err(EngineError::LimitExceeded("minute price too high"));
    }
    Ok(())
}

fn record_conflict(operation: &'static str, court_id: Ulid, err: &EngineError) {
    if let EngineError::Conflict(with) = err {
        warn!("{operation} rejected on court {court_id}: overlaps reservation {with}");
        metrics::counter!(observability::RESERVATION_CONFLICTS_TOTAL, "operation" => operation)
            .increment(1);
    }
}

impl Engine {
    // ── Surfaces ─────────────────────────────────────────────

    pub async fn create_surface(
        &self,
        name: String,
        minute_price: u32,
    ) -> Result<SurfaceInfo, EngineError> {
        check_name(&name, "name is required")?;
        check_minute_price(minute_price)?;
        let _gate = self.commit_gate.read().await;
        let _surfaces = self.surface_write.lock().await;
        if self.store.surface_id_by_name(&name).is_some() {
            return Err(EngineError::DuplicateSurfaceName(name));
        }

        let surface = Surface {
            id: Ulid::new(),
            name,
            minute_price,
            deleted: false,
        };
        let event = Event::SurfaceCreated {
            surface: surface.clone(),
        };
        self.persist_and_apply(&event, &mut []).await?;
        info!("surface {} created ({:?}, {}/min)", surface.id, surface.name, minute_price);
        Ok(SurfaceInfo::from(&surface))
    }

    pub async fn update_surface(
        &self,
        id: Ulid,
        name: String,
        minute_price: u32,
    ) -> Result<SurfaceInfo, EngineError> {
        self.patch_surface(id, Some(name), Some(minute_price)).await
    }

    pub async fn patch_surface(
        &self,
        id: Ulid,
        name: Option<String>,
        minute_price: Option<u32>,
    ) -> Result<SurfaceInfo, EngineError> {
        if let Some(ref n) = name {
            check_name(n, "name is required")?;
        }
        if let Some(p) = minute_price {
            check_minute_price(p)?;
        }
        let _gate = self.commit_gate.read().await;
        let _surfaces = self.surface_write.lock().await;
        let mut surface = self
            .store
            .live_surface(&id)
            .ok_or(EngineError::NotFound(RecordKind::Surface, id))?;

        if let Some(name) = name {
            if self
                .store
                .surface_id_by_name(&name)
                .is_some_and(|other| other != id)
            {
                return Err(EngineError::DuplicateSurfaceName(name));
            }
            surface.name = name;
        }
        if let Some(p) = minute_price {
            surface.minute_price = p;
        }

        let event = Event::SurfaceUpdated {
            surface: surface.clone(),
        };
        self.persist_and_apply(&event, &mut []).await?;
        info!("surface {id} updated");
        Ok(SurfaceInfo::from(&surface))
    }

    pub async fn delete_surface(&self, id: Ulid) -> Result<(), EngineError> {
        let _gate = self.commit_gate.read().await;
        let _surfaces = self.surface_write.lock().await;
        if self.store.live_surface(&id).is_none() {
            return Err(EngineError::NotFound(RecordKind::Surface, id));
        }
        self.persist_and_apply(&Event::SurfaceDeleted { id }, &mut [])
            .await?;
        info!("surface {id} deleted");
        Ok(())
    }

    // ── Courts ───────────────────────────────────────────────

    pub async fn create_court(&self, name: String, surface_id: Ulid) -> Result<CourtInfo, EngineError> {
        check_name(&name, "name is required")?;
        let _gate = self.commit_gate.read().await;
        let _surfaces = self.surface_write.lock().await;
        let surface = self
            .store
            .live_surface(&surface_id)
            .ok_or(EngineError::NotFound(RecordKind::Surface, surface_id))?;

        let court = Court {
            id: Ulid::new(),
            name,
            surface_id,
            deleted: false,
        };
        let event = Event::CourtCreated {
            court: court.clone(),
        };
        self.persist_and_apply(&event, &mut []).await?;
        info!("court {} created on surface {}", court.id, surface.name);
        Ok(CourtInfo {
            id: court.id,
            name: court.name,
            surface: SurfaceInfo::from(&surface),
        })
    }

    pub async fn update_court(
        &self,
        id: Ulid,
        name: String,
        surface_id: Ulid,
    ) -> Result<CourtInfo, EngineError> {
        self.patch_court(id, Some(name), Some(surface_id)).await
    }

    pub async fn patch_court(
        &self,
        id: Ulid,
        name: Option<String>,
        surface_id: Option<Ulid>,
    ) -> Result<CourtInfo, EngineError> {
        if let Some(ref n) = name {
            check_name(n, "name is required")?;
        }
        let _gate = self.commit_gate.read().await;
        let cs = self
            .store
            .court_state(&id)
            .ok_or(EngineError::NotFound(RecordKind::Court, id))?;
        let mut guard = cs.write().await;
        if guard.court.deleted {
            return Err(EngineError::NotFound(RecordKind::Court, id));
        }
        let _surfaces = self.surface_write.lock().await;

        let mut court = guard.court.clone();
        if let Some(sid) = surface_id {
            if self.store.live_surface(&sid).is_none() {
                return Err(EngineError::NotFound(RecordKind::Surface, sid));
            }
            court.surface_id = sid;
        }
        if let Some(n) = name {
            court.name = n;
        }

        let event = Event::CourtUpdated { court };
        self.persist_and_apply(&event, &mut [&mut *guard]).await?;
        info!("court {id} updated");
        self.court_info(&guard.court)
    }

    pub async fn delete_court(&self, id: Ulid) -> Result<(), EngineError> {
        let _gate = self.commit_gate.read().await;
        let cs = self
            .store
            .court_state(&id)
            .ok_or(EngineError::NotFound(RecordKind::Court, id))?;
        let mut guard = cs.write().await;
        if guard.court.deleted {
            return Err(EngineError::NotFound(RecordKind::Court, id));
        }
        self.persist_and_apply(&Event::CourtDeleted { id }, &mut [&mut *guard])
            .await?;
        info!("court {id} deleted");
        Ok(())
    }

    // ── Customers ────────────────────────────────────────────

    /// Existing live customer for `phone`, or a new one that is not stored yet.
    /// Caller must hold `customer_write` until the returned customer is persisted.
    fn prepare_customer(&self, phone: &str, name: Option<String>) -> (Ulid, Option<Customer>) {
        match self.store.customer_by_phone(phone) {
            Some(existing) => (existing.id, None),
            None => {
                let customer = Customer {
                    id: Ulid::new(),
                    phone_number: phone.to_string(),
                    name,
                    deleted: false,
                };
                (customer.id, Some(customer))
            }
        }
    }

    pub async fn create_customer(
        &self,
        phone_number: String,
        name: Option<String>,
    ) -> Result<CustomerInfo, EngineError> {
        check_phone(&phone_number)?;
        check_customer_name(name.as_ref())?;
        let _gate = self.commit_gate.read().await;
        let _customers = self.customer_write.lock().await;
        if self.store.customer_by_phone(&phone_number).is_some() {
            return Err(EngineError::DuplicatePhoneNumber(phone_number));
        }
        let customer = Customer {
            id: Ulid::new(),
            phone_number,
            name,
            deleted: false,
        };
        let event = Event::CustomerCreated {
            customer: customer.clone(),
        };
        self.persist_and_apply(&event, &mut []).await?;
        info!("customer {} created", customer.id);
        Ok(CustomerInfo::from(&customer))
    }

    /// Look up a customer by phone number, creating it if absent, as one atomic step.
    /// Returns the customer and whether it was created.
    pub async fn upsert_customer(
        &self,
        phone_number: String,
        name: Option<String>,
    ) -> Result<(CustomerInfo, bool), EngineError> {
        check_phone(&phone_number)?;
        check_customer_name(name.as_ref())?;
        let _gate = self.commit_gate.read().await;
        let _customers = self.customer_write.lock().await;
        let (id, new_customer) = self.prepare_customer(&phone_number, name);
        let Some(customer) = new_customer else {
            let existing = self
                .store
                .customer(&id)
                .ok_or(EngineError::NotFound(RecordKind::Customer, id))?;
            return Ok((CustomerInfo::from(&existing), false));
        };
        let event = Event::CustomerCreated {
            customer: customer.clone(),
        };
        self.persist_and_apply(&event, &mut []).await?;
        info!("customer {id} created by upsert");
        Ok((CustomerInfo::from(&customer), true))
    }

    pub async fn update_customer(
        &self,
        id: Ulid,
        phone_number: String,
        name: Option<String>,
    ) -> Result<CustomerInfo, EngineError> {
        check_customer_name(name.as_ref())?;
        let _gate = self.commit_gate.read().await;
        let _customers = self.customer_write.lock().await;
        let mut customer = self.live_customer(id)?;
        customer.name = name;
        self.store_customer_phone(customer, phone_number).await
    }

    pub async fn patch_customer(
        &self,
        id: Ulid,
        phone_number: Option<String>,
        name: Option<String>,
    ) -> Result<CustomerInfo, EngineError> {
        check_customer_name(name.as_ref())?;
        let _gate = self.commit_gate.read().await;
        let _customers = self.customer_write.lock().await;
        let mut customer = self.live_customer(id)?;
        if name.is_some() {
            customer.name = name;
        }
        let phone = phone_number.unwrap_or_else(|| customer.phone_number.clone());
        self.store_customer_phone(customer, phone).await
    }

    fn live_customer(&self, id: Ulid) -> Result<Customer, EngineError> {
        self.store
            .customer(&id)
            .filter(|c| !c.deleted)
            .ok_or(EngineError::NotFound(RecordKind::Customer, id))
    }

    /// Persist `customer` under `phone`. Caller holds `customer_write`.
    async fn store_customer_phone(
        &self,
        mut customer: Customer,
        phone: String,
    ) -> Result<CustomerInfo, EngineError> {
        check_phone(&phone)?;
        if self
            .store
            .customer_by_phone(&phone)
            .is_some_and(|other| other.id != customer.id)
        {
            return Err(EngineError::DuplicatePhoneNumber(phone));
        }
        customer.phone_number = phone;
        let event = Event::CustomerUpdated {
            customer: customer.clone(),
        };
        self.persist_and_apply(&event, &mut []).await?;
        info!("customer {} updated", customer.id);
        Ok(CustomerInfo::from(&customer))
    }

    pub async fn delete_customer(&self, id: Ulid) -> Result<(), EngineError> {
        let _gate = self.commit_gate.read().await;
        let _customers = self.customer_write.lock().await;
        self.live_customer(id)?;
        self.persist_and_apply(&Event::CustomerDeleted { id }, &mut [])
            .await?;
        info!("customer {id} deleted");
        Ok(())
    }

    // ── Reservations ─────────────────────────────────────────

    /// Book a court: overlap check, court liveness, customer upsert, pricing,
    /// then a single WAL event. The court stays write-locked throughout, so a
    /// concurrent overlapping request on the same court waits and then fails.
    pub async fn create_reservation(
        &self,
        request: NewReservation,
    ) -> Result<ReservationInfo, EngineError> {
        check_phone(&request.phone_number)?;
        check_customer_name(request.customer_name.as_ref())?;
        let span = validate_interval(request.starts_at, request.ends_at)?;
        let court_id = request.court_id;

        let _gate = self.commit_gate.read().await;
        let cs = self
            .store
            .court_state(&court_id)
            .ok_or(EngineError::NotFound(RecordKind::Court, court_id))?;
        let mut guard = cs.write().await;
        if guard.reservations.len() >= MAX_RESERVATIONS_PER_COURT {
            return Err(EngineError::LimitExceeded("too many reservations on court"));
        }

        if let Err(e) = check_no_conflict(&guard, &span, None) {
            record_conflict("create", court_id, &e);
            return Err(e);
        }
        if guard.court.deleted {
            return Err(EngineError::NotFound(RecordKind::Court, court_id));
        }
        let minute_price = self.surface_rate(&guard.court)?;

        let _customers = self.customer_write.lock().await;
        let (customer_id, new_customer) =
            self.prepare_customer(&request.phone_number, request.customer_name);

        let reservation = Reservation {
            id: Ulid::new(),
            court_id,
            customer_id,
            doubles: request.doubles,
            span,
            created_at: now_ms(),
            price: calculate_price(span.start, span.end, minute_price, request.doubles),
            deleted: false,
        };
        let event = Event::ReservationCreated {
            reservation: reservation.clone(),
            customer: new_customer,
        };
        self.persist_and_apply(&event, &mut [&mut *guard]).await?;
        metrics::counter!(observability::RESERVATIONS_CREATED_TOTAL).increment(1);
        info!(
            "reservation {} created on court {court_id} [{}, {}) price {}",
            reservation.id, span.start, span.end, reservation.price
        );
        self.reservation_info(&reservation, &guard.court)
    }

    /// Replace every client-editable field of a reservation.
    pub async fn update_reservation(
        &self,
        id: Ulid,
        request: NewReservation,
    ) -> Result<ReservationInfo, EngineError> {
        check_phone(&request.phone_number)?;
        self.patch_reservation(id, request.into()).await
    }

    /// Apply a partial edit. The price is always recomputed from the merged
    /// values; the overlap check runs when the policy asks for it.
    pub async fn patch_reservation(
        &self,
        id: Ulid,
        change: ReservationChange,
    ) -> Result<ReservationInfo, EngineError> {
        if let Some(ref phone) = change.phone_number {
            check_phone(phone)?;
        }
        check_customer_name(change.customer_name.as_ref())?;

        let _gate = self.commit_gate.read().await;
        let (mut guards, current_court_id) = self.lock_reservation_courts(id, change.court_id).await?;
        let target_court_id = change.court_id.unwrap_or(current_court_id);
        let current_idx = guards.iter().position(|g| g.court.id == current_court_id);
        let target_idx = guards.iter().position(|g| g.court.id == target_court_id);
        let (Some(current_idx), Some(target_idx)) = (current_idx, target_idx) else {
            return Err(EngineError::NotFound(RecordKind::Court, target_court_id));
        };

        let existing = guards[current_idx]
            .get_live(id)
            .cloned()
            .ok_or(EngineError::NotFound(RecordKind::Reservation, id))?;
        let target = &guards[target_idx];
        if change.court_id.is_some() && target.court.deleted {
            return Err(EngineError::NotFound(RecordKind::Court, target_court_id));
        }
        if target_court_id != current_court_id
            && target.reservations.len() >= MAX_RESERVATIONS_PER_COURT
        {
            return Err(EngineError::LimitExceeded("too many reservations on court"));
        }

        let span = validate_interval(
            change.starts_at.unwrap_or(existing.span.start),
            change.ends_at.unwrap_or(existing.span.end),
        )?;
        if self.policy.check_overlap_on_update
            && let Err(e) = check_no_conflict(target, &span, Some(id))
        {
            record_conflict("update", target_court_id, &e);
            return Err(e);
        }
        let minute_price = self.surface_rate(&target.court)?;
        let target_court = target.court.clone();

        let _customers = self.customer_write.lock().await;
        let (customer_id, new_customer) = match change.phone_number {
            Some(ref phone) => self.prepare_customer(phone, change.customer_name.clone()),
            None => (existing.customer_id, None),
        };
        let doubles = change.doubles.unwrap_or(existing.doubles);
        let reservation = Reservation {
            id,
            court_id: target_court_id,
            customer_id,
            doubles,
            span,
            created_at: change.created_at.unwrap_or(existing.created_at),
            price: calculate_price(span.start, span.end, minute_price, doubles),
            deleted: false,
        };
        let event = Event::ReservationUpdated {
            reservation: reservation.clone(),
            previous_court_id: current_court_id,
            customer: new_customer,
        };
        let mut courts: Vec<&mut CourtState> = guards.iter_mut().map(|g| &mut **g).collect();
        self.persist_and_apply(&event, &mut courts).await?;
        info!("reservation {id} updated, price {}", reservation.price);
        self.reservation_info(&reservation, &target_court)
    }

    pub async fn delete_reservation(&self, id: Ulid) -> Result<(), EngineError> {
        let _gate = self.commit_gate.read().await;
        let (mut guards, court_id) = self.lock_reservation_courts(id, None).await?;
        let Some(guard) = guards.first_mut() else {
            return Err(EngineError::NotFound(RecordKind::Reservation, id));
        };
        if guard.get_live(id).is_none() {
            return Err(EngineError::NotFound(RecordKind::Reservation, id));
        }
        let event = Event::ReservationDeleted { id, court_id };
        self.persist_and_apply(&event, &mut [&mut **guard]).await?;
        info!("reservation {id} deleted");
        Ok(())
    }

    /// Write-lock the court currently holding reservation `id` and, if given,
    /// the court it is moving to. Locks are taken in id order. Returns the
    /// guards and the current court id.
    async fn lock_reservation_courts(
        &self,
        id: Ulid,
        destination: Option<Ulid>,
    ) -> Result<(Vec<OwnedRwLockWriteGuard<CourtState>>, Ulid), EngineError> {
        loop {
            let current = self
                .store
                .court_for_reservation(&id)
                .ok_or(EngineError::NotFound(RecordKind::Reservation, id))?;
            let mut court_ids = vec![current, destination.unwrap_or(current)];
            court_ids.sort();
            court_ids.dedup();

            let mut guards = Vec::with_capacity(court_ids.len());
            for court_id in &court_ids {
                let cs = self
                    .store
                    .court_state(court_id)
                    .ok_or(EngineError::NotFound(RecordKind::Court, *court_id))?;
                guards.push(cs.write_owned().await);
            }

            // A concurrent edit may have moved the reservation while we waited.
            if self.store.court_for_reservation(&id) == Some(current) {
                return Ok((guards, current));
            }
        }
    }

    // ── Maintenance ──────────────────────────────────────────

    /// Rewrite the WAL as one create event per record. Holds `commit_gate`
    /// exclusively so no write lands between the snapshot and the swap.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let _gate = self.commit_gate.write().await;

        let mut events: Vec<Event> = self
            .store
            .surfaces()
            .into_iter()
            .map(|surface| Event::SurfaceCreated { surface })
            .collect();
        let mut reservations = Vec::new();
        for court_id in self.store.court_ids() {
            let Some(cs) = self.store.court_state(&court_id) else {
                continue;
            };
            let guard = cs.read().await;
            events.push(Event::CourtCreated {
                court: guard.court.clone(),
            });
            reservations.extend(guard.reservations.iter().cloned());
        }
        events.extend(
            self.store
                .customers()
                .into_iter()
                .map(|customer| Event::CustomerCreated { customer }),
        );
        events.extend(reservations.into_iter().map(|reservation| Event::ReservationCreated {
            reservation,
            customer: None,
        }));

        let count = events.len();
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))?;
        metrics::counter!(observability::WAL_COMPACTIONS_TOTAL).increment(1);
        info!("WAL compacted to {count} events");
        Ok(())
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = tokio::sync::oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
