use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds. The only time type.
pub type Ms = i64;

pub const MS_PER_MINUTE: Ms = 60_000;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// The four record kinds held by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Surface,
    Court,
    Customer,
    Reservation,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RecordKind::Surface => "surface",
            RecordKind::Court => "court",
            RecordKind::Customer => "customer",
            RecordKind::Reservation => "reservation",
        };
        f.write_str(name)
    }
}

// ── Records ──────────────────────────────────────────────────────

/// Court material with a fixed price per minute of play.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Surface {
    pub id: Ulid,
    pub name: String,
    pub minute_price: u32,
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Court {
    pub id: Ulid,
    pub name: String,
    pub surface_id: Ulid,
    pub deleted: bool,
}

/// A customer is identified by phone number; `id` is only a storage key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: Ulid,
    pub phone_number: String,
    pub name: Option<String>,
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Ulid,
    pub court_id: Ulid,
    pub customer_id: Ulid,
    pub doubles: bool,
    pub span: Span,
    pub created_at: Ms,
    pub price: f64,
    pub deleted: bool,
}

/// Everything that is locked together for one court: the court record and its reservations.
#[derive(Debug, Clone)]
pub struct CourtState {
    pub court: Court,
    /// Live and soft-deleted reservations, sorted by `span.start`.
    pub reservations: Vec<Reservation>,
}

impl CourtState {
    pub fn new(court: Court) -> Self {
        Self {
            court,
            reservations: Vec::new(),
        }
    }

    /// Insert reservation maintaining sort order by span.start.
    pub fn insert_reservation(&mut self, reservation: Reservation) {
        let pos = self
            .reservations
            .binary_search_by_key(&reservation.span.start, |r| r.span.start)
            .unwrap_or_else(|e| e);
        self.reservations.insert(pos, reservation);
    }

    pub fn remove_reservation(&mut self, id: Ulid) -> Option<Reservation> {
        let pos = self.reservations.iter().position(|r| r.id == id)?;
        Some(self.reservations.remove(pos))
    }

    pub fn mark_deleted(&mut self, id: Ulid) -> bool {
        match self.reservations.iter_mut().find(|r| r.id == id) {
            Some(r) => {
                r.deleted = true;
                true
            }
            None => false,
        }
    }

    pub fn live(&self) -> impl Iterator<Item = &Reservation> {
        self.reservations.iter().filter(|r| !r.deleted)
    }

    pub fn get_live(&self, id: Ulid) -> Option<&Reservation> {
        self.live().find(|r| r.id == id)
    }

    /// Live reservations starting before `end`; nothing starting at or after
    /// `end` can intersect an interval that ends there.
    pub fn starting_before(&self, end: Ms) -> impl Iterator<Item = &Reservation> {
        let right_bound = self.reservations.partition_point(|r| r.span.start < end);
        self.reservations[..right_bound].iter().filter(|r| !r.deleted)
    }
}

/// The event types. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    SurfaceCreated {
        surface: Surface,
    },
    SurfaceUpdated {
        surface: Surface,
    },
    SurfaceDeleted {
        id: Ulid,
    },
    CourtCreated {
        court: Court,
    },
    CourtUpdated {
        court: Court,
    },
    CourtDeleted {
        id: Ulid,
    },
    CustomerCreated {
        customer: Customer,
    },
    CustomerUpdated {
        customer: Customer,
    },
    CustomerDeleted {
        id: Ulid,
    },
    /// `customer` is set when the reservation introduced a new customer.
    ReservationCreated {
        reservation: Reservation,
        customer: Option<Customer>,
    },
    ReservationUpdated {
        reservation: Reservation,
        previous_court_id: Ulid,
        customer: Option<Customer>,
    },
    ReservationDeleted {
        id: Ulid,
        court_id: Ulid,
    },
}

impl Event {
    /// Courts whose locked state this event touches.
    pub fn court_ids(&self) -> Vec<Ulid> {
        match self {
            Event::CourtUpdated { court } => vec![court.id],
            Event::CourtDeleted { id } => vec![*id],
            Event::ReservationCreated { reservation, .. } => vec![reservation.court_id],
            Event::ReservationUpdated {
                reservation,
                previous_court_id,
                ..
            } => {
                if *previous_court_id == reservation.court_id {
                    vec![reservation.court_id]
                } else {
                    vec![*previous_court_id, reservation.court_id]
                }
            }
            Event::ReservationDeleted { court_id, .. } => vec![*court_id],
            _ => Vec::new(),
        }
    }
}

// ── Command types ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReservation {
    pub court_id: Ulid,
    pub phone_number: String,
    pub customer_name: Option<String>,
    pub doubles: bool,
    pub starts_at: Ms,
    pub ends_at: Ms,
}

/// Partial reservation edit. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReservationChange {
    pub court_id: Option<Ulid>,
    pub phone_number: Option<String>,
    pub customer_name: Option<String>,
    pub doubles: Option<bool>,
    pub starts_at: Option<Ms>,
    pub ends_at: Option<Ms>,
    pub created_at: Option<Ms>,
}

impl From<NewReservation> for ReservationChange {
    fn from(r: NewReservation) -> Self {
        Self {
            court_id: Some(r.court_id),
            phone_number: Some(r.phone_number),
            customer_name: r.customer_name,
            doubles: Some(r.doubles),
            starts_at: Some(r.starts_at),
            ends_at: Some(r.ends_at),
            created_at: None,
        }
    }
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceInfo {
    pub id: Ulid,
    pub name: String,
    pub minute_price: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourtInfo {
    pub id: Ulid,
    pub name: String,
    pub surface: SurfaceInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
    pub id: Ulid,
    pub phone_number: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationInfo {
    pub id: Ulid,
    pub doubles: bool,
    pub created_at: Ms,
    pub starts_at: Ms,
    pub ends_at: Ms,
    pub price: f64,
    pub customer: CustomerInfo,
    pub court: CourtInfo,
}

impl From<&Surface> for SurfaceInfo {
    fn from(s: &Surface) -> Self {
        Self {
            id: s.id,
            name: s.name.clone(),
            minute_price: s.minute_price,
        }
    }
}

impl From<&Customer> for CustomerInfo {
    fn from(c: &Customer) -> Self {
        Self {
            id: c.id,
            phone_number: c.phone_number.clone(),
            name: c.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn court_state() -> CourtState {
        CourtState::new(Court {
            id: Ulid::new(),
            name: "Court 1".into(),
            surface_id: Ulid::new(),
            deleted: false,
        })
    }

    fn reservation(court_id: Ulid, start: Ms, end: Ms) -> Reservation {
        Reservation {
            id: Ulid::new(),
            court_id,
            customer_id: Ulid::new(),
            doubles: false,
            span: Span::new(start, end),
            created_at: 0,
            price: 0.0,
            deleted: false,
        }
    }

    #[test]
    fn span_overlap_is_half_open() {
        let a = Span::new(100, 200);
        let b = Span::new(150, 250);
        let c = Span::new(200, 300);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert_eq!(a.duration_ms(), 100);
    }

    #[test]
    fn reservations_kept_sorted_by_start() {
        let mut cs = court_state();
        let cid = cs.court.id;
        cs.insert_reservation(reservation(cid, 300, 400));
        cs.insert_reservation(reservation(cid, 100, 200));
        cs.insert_reservation(reservation(cid, 200, 300));
        let starts: Vec<Ms> = cs.reservations.iter().map(|r| r.span.start).collect();
        assert_eq!(starts, vec![100, 200, 300]);
    }

    #[test]
    fn soft_deleted_reservations_hidden_from_live() {
        let mut cs = court_state();
        let r = reservation(cs.court.id, 100, 200);
        let id = r.id;
        cs.insert_reservation(r);
        assert!(cs.get_live(id).is_some());

        assert!(cs.mark_deleted(id));
        assert!(cs.get_live(id).is_none());
        assert_eq!(cs.live().count(), 0);
        // Still stored
        assert_eq!(cs.reservations.len(), 1);
    }

    #[test]
    fn starting_before_prunes_later_reservations() {
        let mut cs = court_state();
        let cid = cs.court.id;
        cs.insert_reservation(reservation(cid, 100, 200));
        cs.insert_reservation(reservation(cid, 500, 600));
        cs.insert_reservation(reservation(cid, 1000, 1100));

        let hits: Vec<_> = cs.starting_before(600).collect();
        assert_eq!(hits.len(), 2);
        // Starting exactly at `end` is excluded
        assert_eq!(cs.starting_before(500).count(), 1);
    }

    #[test]
    fn remove_nonexistent_returns_none() {
        let mut cs = court_state();
        cs.insert_reservation(reservation(cs.court.id, 100, 200));
        assert!(cs.remove_reservation(Ulid::new()).is_none());
        assert_eq!(cs.reservations.len(), 1);
    }

    #[test]
    fn moved_reservation_touches_both_courts() {
        let from = Ulid::new();
        let mut r = reservation(Ulid::new(), 0, 60_000);
        let event = Event::ReservationUpdated {
            reservation: r.clone(),
            previous_court_id: from,
            customer: None,
        };
        assert_eq!(event.court_ids(), vec![from, r.court_id]);

        r.court_id = from;
        let same = Event::ReservationUpdated {
            reservation: r,
            previous_court_id: from,
            customer: None,
        };
        assert_eq!(same.court_ids(), vec![from]);
    }

    #[test]
    fn event_serialization_roundtrip() {
        let event = Event::SurfaceCreated {
            surface: Surface {
                id: Ulid::new(),
                name: "Clay".into(),
                minute_price: 10,
                deleted: false,
            },
        };
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }
}
