use crate::model::Ms;

pub const MAX_NAME_LEN: usize = 256;
pub const MAX_PHONE_LEN: usize = 32;

/// 1970-01-01T00:00:00Z
pub const MIN_VALID_TIMESTAMP_MS: Ms = 0;
/// 2100-01-01T00:00:00Z
pub const MAX_VALID_TIMESTAMP_MS: Ms = 4_102_444_800_000;

/// A single reservation may not exceed 7 days.
pub const MAX_RESERVATION_DURATION_MS: Ms = 7 * 24 * 3_600_000;

/// Live + soft-deleted reservations kept on one court.
pub const MAX_RESERVATIONS_PER_COURT: usize = 100_000;

pub const MAX_MINUTE_PRICE: u32 = 1_000_000;
