//! Charge computation for a finished rent.
//!
//! Money is a raw `f64` with no rounding; the charge is linear in elapsed
//! time and fractional units are billed as-is.

use crate::domain::types::UnitType;
use chrono::{DateTime, Utc};

const SECONDS_PER_MINUTE: f64 = 60.0;
const SECONDS_PER_DAY: f64 = 86_400.0;

/// Elapsed time between `start` and `end` in seconds, never negative.
pub fn elapsed_seconds(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let elapsed = end.signed_duration_since(start);
    let seconds = match elapsed.num_microseconds() {
        Some(micros) => micros as f64 / 1_000_000.0,
        None => elapsed.num_milliseconds() as f64 / 1_000.0,
    };
    seconds.max(0.0)
}

/// Number of (possibly fractional) billing units in the interval
pub fn elapsed_units(unit_type: UnitType, start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let seconds = elapsed_seconds(start, end);
    match unit_type {
        UnitType::Minutes => seconds / SECONDS_PER_MINUTE,
        UnitType::Days => seconds / SECONDS_PER_DAY,
    }
}

/// Charge for renting at `unit_price` per `unit_type` from `start` to `end`
pub fn price(
    unit_price: f64,
    unit_type: UnitType,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> f64 {
    unit_price * elapsed_units(unit_type, start, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 17, 8, 30, 0).unwrap()
    }

    #[test]
    fn test_minutes_pricing() {
        let end = start() + Duration::seconds(90);
        assert_eq!(price(10.0, UnitType::Minutes, start(), end), 15.0);
    }

    #[test]
    fn test_days_pricing() {
        let end = start() + Duration::hours(36);
        assert_eq!(price(100.0, UnitType::Days, start(), end), 150.0);
    }

    #[test]
    fn test_fractional_units_are_not_rounded() {
        let end = start() + Duration::seconds(1);
        let charge = price(6.0, UnitType::Minutes, start(), end);
        assert!((charge - 0.1).abs() < 1e-12);

        let end = start() + Duration::minutes(1);
        let charge = price(1440.0, UnitType::Days, start(), end);
        assert!((charge - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_elapsed_is_free() {
        assert_eq!(price(10.0, UnitType::Minutes, start(), start()), 0.0);
    }

    #[test]
    fn test_end_before_start_is_clamped() {
        let end = start() - Duration::minutes(5);
        assert_eq!(elapsed_seconds(start(), end), 0.0);
        assert_eq!(price(10.0, UnitType::Minutes, start(), end), 0.0);
    }

    #[test]
    fn test_sub_millisecond_precision() {
        let end = start() + Duration::microseconds(1_500);
        assert_eq!(elapsed_seconds(start(), end), 0.0015);
    }

    proptest! {
        #[test]
        fn prop_price_is_linear_in_unit_price(
            unit_price in 0.0f64..10_000.0,
            seconds in 0i64..10_000_000,
        ) {
            let end = start() + Duration::seconds(seconds);
            let single = price(unit_price, UnitType::Minutes, start(), end);
            let double = price(unit_price * 2.0, UnitType::Minutes, start(), end);
            prop_assert!((double - 2.0 * single).abs() <= 1e-9 * double.abs().max(1.0));
        }

        #[test]
        fn prop_day_rate_matches_minute_rate(
            unit_price in 0.0f64..10_000.0,
            seconds in 0i64..10_000_000,
        ) {
            let end = start() + Duration::seconds(seconds);
            let by_day = price(unit_price, UnitType::Days, start(), end);
            let by_minute = price(unit_price / 1440.0, UnitType::Minutes, start(), end);
            prop_assert!((by_day - by_minute).abs() <= 1e-9 * by_day.abs().max(1.0));
        }

        #[test]
        fn prop_charge_never_negative(
            unit_price in 0.0f64..10_000.0,
            seconds in -1_000_000i64..1_000_000,
        ) {
            let end = start() + Duration::seconds(seconds);
            prop_assert!(price(unit_price, UnitType::Days, start(), end) >= 0.0);
        }
    }
}
