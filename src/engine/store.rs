use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::RwLock;
use ulid::Ulid;

use crate::model::*;

use super::SharedCourtState;

/// Record tables and lookup indexes. Soft-deleted records stay in the tables;
/// the name and phone indexes only ever point at live records.
pub struct InMemoryStore {
    surfaces: DashMap<Ulid, Surface>,
    surface_names: DashMap<String, Ulid>,
    courts: DashMap<Ulid, SharedCourtState>,
    customers: DashMap<Ulid, Customer>,
    phone_index: DashMap<String, Ulid>,
    reservation_to_court: DashMap<Ulid, Ulid>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            surfaces: DashMap::new(),
            surface_names: DashMap::new(),
            courts: DashMap::new(),
            customers: DashMap::new(),
            phone_index: DashMap::new(),
            reservation_to_court: DashMap::new(),
        }
    }

    // ── Surfaces ─────────────────────────────────────────────

    /// Any surface, deleted or not. Courts keep pointing at deleted surfaces.
    pub fn surface(&self, id: &Ulid) -> Option<Surface> {
        self.surfaces.get(id).map(|e| e.value().clone())
    }

    pub fn live_surface(&self, id: &Ulid) -> Option<Surface> {
        self.surface(id).filter(|s| !s.deleted)
    }

    pub fn surface_id_by_name(&self, name: &str) -> Option<Ulid> {
        self.surface_names.get(name).map(|e| *e.value())
    }

    pub fn surfaces(&self) -> Vec<Surface> {
        let mut all: Vec<Surface> = self.surfaces.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|s| s.id);
        all
    }

    fn put_surface(&self, surface: &Surface) {
        let old_name = self.surfaces.get(&surface.id).map(|e| e.name.clone());
        if let Some(old) = old_name {
            self.surface_names.remove_if(&old, |_, v| *v == surface.id);
        }
        if !surface.deleted {
            self.surface_names.insert(surface.name.clone(), surface.id);
        }
        self.surfaces.insert(surface.id, surface.clone());
    }

    // ── Courts ───────────────────────────────────────────────

    pub fn court_state(&self, id: &Ulid) -> Option<SharedCourtState> {
        self.courts.get(id).map(|e| e.value().clone())
    }

    pub fn court_ids(&self) -> Vec<Ulid> {
        let mut ids: Vec<Ulid> = self.courts.iter().map(|e| *e.key()).collect();
        ids.sort();
        ids
    }

    // ── Customers ────────────────────────────────────────────

    pub fn customer(&self, id: &Ulid) -> Option<Customer> {
        self.customers.get(id).map(|e| e.value().clone())
    }

    pub fn customer_by_phone(&self, phone: &str) -> Option<Customer> {
        let id = self.phone_index.get(phone).map(|e| *e.value())?;
        self.customer(&id)
    }

    pub fn customers(&self) -> Vec<Customer> {
        let mut all: Vec<Customer> = self.customers.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|c| c.id);
        all
    }

    fn put_customer(&self, customer: &Customer) {
        let old_phone = self.customers.get(&customer.id).map(|e| e.phone_number.clone());
        if let Some(old) = old_phone {
            self.phone_index.remove_if(&old, |_, v| *v == customer.id);
        }
        if !customer.deleted {
            self.phone_index.insert(customer.phone_number.clone(), customer.id);
        }
        self.customers.insert(customer.id, customer.clone());
    }

    // ── Reservation index ────────────────────────────────────

    pub fn court_for_reservation(&self, id: &Ulid) -> Option<Ulid> {
        self.reservation_to_court.get(id).map(|e| *e.value())
    }

    // ── Event application ────────────────────────────────────

    /// Apply the parts of an event that live outside any court lock.
    /// Court-local effects go through [`apply_to_court`].
    pub fn apply_event(&self, event: &Event) {
        match event {
            Event::SurfaceCreated { surface } | Event::SurfaceUpdated { surface } => {
                self.put_surface(surface);
            }
            Event::SurfaceDeleted { id } => {
                if let Some(mut surface) = self.surface(id) {
                    surface.deleted = true;
                    self.put_surface(&surface);
                }
            }
            Event::CourtCreated { court } => {
                self.courts
                    .entry(court.id)
                    .or_insert_with(|| Arc::new(RwLock::new(CourtState::new(court.clone()))));
            }
            Event::CustomerCreated { customer } | Event::CustomerUpdated { customer } => {
                self.put_customer(customer);
            }
            Event::CustomerDeleted { id } => {
                if let Some(mut customer) = self.customer(id) {
                    customer.deleted = true;
                    self.put_customer(&customer);
                }
            }
            Event::ReservationCreated {
                reservation,
                customer,
            }
            | Event::ReservationUpdated {
                reservation,
                customer,
                ..
            } => {
                if let Some(c) = customer {
                    self.put_customer(c);
                }
                self.reservation_to_court
                    .insert(reservation.id, reservation.court_id);
            }
            Event::CourtUpdated { .. }
            | Event::CourtDeleted { .. }
            | Event::ReservationDeleted { .. } => {}
        }
    }
}

/// Apply an event to one court's state (no locking: caller holds the lock).
/// Events that do not concern this court are ignored.
pub fn apply_to_court(cs: &mut CourtState, event: &Event) {
    let court_id = cs.court.id;
    match event {
        Event::CourtUpdated { court } if court.id == court_id => {
            cs.court = court.clone();
        }
        Event::CourtDeleted { id } if *id == court_id => {
            cs.court.deleted = true;
        }
        Event::ReservationCreated { reservation, .. } if reservation.court_id == court_id => {
            cs.insert_reservation(reservation.clone());
        }
        Event::ReservationUpdated {
            reservation,
            previous_court_id,
            ..
        } => {
            if *previous_court_id == court_id {
                cs.remove_reservation(reservation.id);
            }
            if reservation.court_id == court_id {
                cs.insert_reservation(reservation.clone());
            }
        }
        Event::ReservationDeleted { id, court_id: owner } if *owner == court_id => {
            cs.mark_deleted(*id);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface(name: &str) -> Surface {
        Surface {
            id: Ulid::new(),
            name: name.into(),
            minute_price: 10,
            deleted: false,
        }
    }

    fn customer(phone: &str) -> Customer {
        Customer {
            id: Ulid::new(),
            phone_number: phone.into(),
            name: None,
            deleted: false,
        }
    }

    #[test]
    fn renaming_surface_moves_name_index() {
        let store = InMemoryStore::new();
        let mut s = surface("Clay");
        store.apply_event(&Event::SurfaceCreated { surface: s.clone() });
        assert_eq!(store.surface_id_by_name("Clay"), Some(s.id));

        s.name = "Red clay".into();
        store.apply_event(&Event::SurfaceUpdated { surface: s.clone() });
        assert_eq!(store.surface_id_by_name("Clay"), None);
        assert_eq!(store.surface_id_by_name("Red clay"), Some(s.id));
    }

    #[test]
    fn deleted_surface_frees_name_but_stays_readable() {
        let store = InMemoryStore::new();
        let s = surface("Grass");
        store.apply_event(&Event::SurfaceCreated { surface: s.clone() });
        store.apply_event(&Event::SurfaceDeleted { id: s.id });

        assert_eq!(store.surface_id_by_name("Grass"), None);
        assert!(store.live_surface(&s.id).is_none());
        assert!(store.surface(&s.id).unwrap().deleted);
    }

    #[test]
    fn phone_index_tracks_live_customers() {
        let store = InMemoryStore::new();
        let mut c = customer("111");
        store.apply_event(&Event::CustomerCreated { customer: c.clone() });
        assert_eq!(store.customer_by_phone("111").map(|c| c.id), Some(c.id));

        c.phone_number = "222".into();
        store.apply_event(&Event::CustomerUpdated { customer: c.clone() });
        assert!(store.customer_by_phone("111").is_none());
        assert!(store.customer_by_phone("222").is_some());

        store.apply_event(&Event::CustomerDeleted { id: c.id });
        assert!(store.customer_by_phone("222").is_none());
    }

    #[test]
    fn reservation_with_new_customer_indexes_both() {
        let store = InMemoryStore::new();
        let c = customer("333");
        let court_id = Ulid::new();
        let reservation = Reservation {
            id: Ulid::new(),
            court_id,
            customer_id: c.id,
            doubles: false,
            span: Span::new(0, 60_000),
            created_at: 0,
            price: 10.0,
            deleted: false,
        };
        store.apply_event(&Event::ReservationCreated {
            reservation: reservation.clone(),
            customer: Some(c.clone()),
        });
        assert_eq!(store.customer_by_phone("333").map(|c| c.id), Some(c.id));
        assert_eq!(store.court_for_reservation(&reservation.id), Some(court_id));
    }

    #[test]
    fn apply_to_court_ignores_other_courts() {
        let court = Court {
            id: Ulid::new(),
            name: "Court 1".into(),
            surface_id: Ulid::new(),
            deleted: false,
        };
        let mut cs = CourtState::new(court);
        apply_to_court(&mut cs, &Event::CourtDeleted { id: Ulid::new() });
        assert!(!cs.court.deleted);
        let own = cs.court.id;
        apply_to_court(&mut cs, &Event::CourtDeleted { id: own });
        assert!(cs.court.deleted);
    }
}
