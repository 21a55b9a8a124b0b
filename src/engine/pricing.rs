use crate::model::{Ms, MS_PER_MINUTE};

pub const DOUBLES_MULTIPLIER: f64 = 1.5;

/// Whole minutes between `start` and `end`, truncated toward zero.
pub fn billable_minutes(start: Ms, end: Ms) -> i64 {
    (end - start) / MS_PER_MINUTE
}

/// `minutes × minute_price`, times 1.5 for doubles.
///
/// Negative durations produce negative prices; callers validate the interval.
pub fn calculate_price(start: Ms, end: Ms, minute_price: u32, doubles: bool) -> f64 {
    let multiplier = if doubles { DOUBLES_MULTIPLIER } else { 1.0 };
    billable_minutes(start, end) as f64 * f64::from(minute_price) * multiplier
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Ms = 3_600_000;

    #[test]
    fn singles_and_doubles() {
        assert_eq!(calculate_price(0, HOUR, 10, false), 600.0);
        assert_eq!(calculate_price(0, HOUR, 10, true), 900.0);
    }

    #[test]
    fn partial_minutes_truncated() {
        // 90 seconds bills one minute
        assert_eq!(billable_minutes(0, 90_000), 1);
        assert_eq!(calculate_price(0, 90_000, 15, false), 15.0);
        assert_eq!(calculate_price(0, 59_999, 15, true), 0.0);
    }

    #[test]
    fn negative_duration_truncates_toward_zero() {
        assert_eq!(billable_minutes(90_000, 0), -1);
        assert_eq!(calculate_price(HOUR, 0, 10, false), -600.0);
    }

    #[test]
    fn recomputation_is_stable() {
        let a = calculate_price(1_000, 1_000 + 45 * 60_000, 13, true);
        let b = calculate_price(1_000, 1_000 + 45 * 60_000, 13, true);
        assert_eq!(a, b);
        assert_eq!(a, 877.5);
    }
}
