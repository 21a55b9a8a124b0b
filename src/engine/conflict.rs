use crate::limits::*;
use crate::model::*;

use super::EngineError;

pub(crate) fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as Ms
}

/// Interval sanity for anything the store is asked to persist.
/// The overlap and price kernels themselves stay unguarded.
pub(crate) fn validate_interval(start: Ms, end: Ms) -> Result<Span, EngineError> {
    if end <= start {
        return Err(EngineError::Validation("endsAt must be after startsAt"));
    }
    if start < MIN_VALID_TIMESTAMP_MS || end > MAX_VALID_TIMESTAMP_MS {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    if end - start > MAX_RESERVATION_DURATION_MS {
        return Err(EngineError::LimitExceeded("reservation too long"));
    }
    Ok(Span::new(start, end))
}

/// First reservation in `existing` that intersects `[start, end)`.
///
/// Two intervals conflict iff `start < other.end && end > other.start`, so
/// back-to-back bookings are fine. `existing` must already be narrowed to one
/// court; nothing here looks at `court_id`. Inverted or empty candidates are
/// not rejected.
pub fn first_overlap<'a, I>(start: Ms, end: Ms, existing: I) -> Option<&'a Reservation>
where
    I: IntoIterator<Item = &'a Reservation>,
{
    let candidate = Span { start, end };
    existing.into_iter().find(|r| candidate.overlaps(&r.span))
}

pub fn is_overlapping<'a, I>(start: Ms, end: Ms, existing: I) -> bool
where
    I: IntoIterator<Item = &'a Reservation>,
{
    first_overlap(start, end, existing).is_some()
}

/// Overlap check for a write on a locked court. `ignore` skips the
/// reservation being edited.
pub(crate) fn check_no_conflict(
    cs: &CourtState,
    span: &Span,
    ignore: Option<ulid::Ulid>,
) -> Result<(), EngineError> {
    let existing = cs
        .starting_before(span.end)
        .filter(|r| Some(r.id) != ignore);
    match first_overlap(span.start, span.end, existing) {
        Some(hit) => Err(EngineError::Conflict(hit.id)),
        None => Ok(()),
    }
}
