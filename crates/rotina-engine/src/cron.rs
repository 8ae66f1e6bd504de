//! Lightweight cron expression parser for time-of-day drivers.
//! Supports: "MIN HOUR DOM MON DOW" (5-field, no seconds)
//! Wildcards: *, */N, N, comma lists — minute and hour fields only;
//! day/month fields are accepted but ignored.
//!
//! Expressions are evaluated in the engine's timezone, not UTC or the
//! host zone: "0 8 * * *" means 08:00 where the subjects live.

use chrono::{DateTime, Duration, Timelike, Utc};
use chrono_tz::Tz;

/// Compute the next fire instant strictly after `after`.
pub fn next_fire(expression: &str, after: DateTime<Utc>, tz: Tz) -> Option<DateTime<Utc>> {
    let parts: Vec<&str> = expression.split_whitespace().collect();
    if parts.len() != 5 {
        tracing::warn!(
            "Invalid cron expression: '{}' (need 5 fields: MIN HOUR DOM MON DOW)",
            expression
        );
        return None;
    }

    let minutes = parse_field(parts[0], 0, 59)?;
    let hours = parse_field(parts[1], 0, 23)?;

    let mut candidate = after.with_timezone(&tz) + Duration::minutes(1);
    candidate = candidate.with_second(0).unwrap_or(candidate);
    candidate = candidate.with_nanosecond(0).unwrap_or(candidate);

    // Try up to 48 hours ahead.
    for _ in 0..(48 * 60) {
        if minutes.contains(&candidate.minute()) && hours.contains(&candidate.hour()) {
            return Some(candidate.with_timezone(&Utc));
        }
        candidate += Duration::minutes(1);
    }

    None
}

/// Parse a cron field into the list of matching values.
fn parse_field(field: &str, min: u32, max: u32) -> Option<Vec<u32>> {
    if field == "*" {
        return Some((min..=max).collect());
    }

    // */N — every N
    if let Some(step) = field.strip_prefix("*/") {
        let n: u32 = step.parse().ok()?;
        if n == 0 {
            return None;
        }
        return Some((min..=max).step_by(n as usize).collect());
    }

    // Comma-separated: "0,15,30,45"
    if field.contains(',') {
        let vals: Result<Vec<u32>, _> = field.split(',').map(|s| s.trim().parse()).collect();
        return vals
            .ok()
            .map(|v| v.into_iter().filter(|x| *x >= min && *x <= max).collect());
    }

    // Single number
    let n: u32 = field.parse().ok()?;
    if n >= min && n <= max {
        Some(vec![n])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::America::Sao_Paulo;

    #[test]
    fn fires_in_local_time_not_utc() {
        // 10:00 UTC = 07:00 in São Paulo; "0 8 * * *" → 08:00 local = 11:00 UTC.
        let after = Utc.with_ymd_and_hms(2024, 5, 10, 10, 0, 0).unwrap();
        let next = next_fire("0 8 * * *", after, Sao_Paulo).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 5, 10, 11, 0, 0).unwrap());
    }

    #[test]
    fn rolls_to_next_day_when_past() {
        // 12:00 local is past 08:00 → tomorrow 08:00 local.
        let after = Utc.with_ymd_and_hms(2024, 5, 10, 15, 0, 0).unwrap();
        let next = next_fire("0 8 * * *", after, Sao_Paulo).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 5, 11, 11, 0, 0).unwrap());
    }

    #[test]
    fn step_and_list_fields() {
        let after = Utc.with_ymd_and_hms(2024, 5, 10, 15, 2, 0).unwrap(); // 12:02 local
        let next = next_fire("*/10 21,22 * * *", after, Sao_Paulo).unwrap();
        // Next 21:xx local slot is 21:00 local = 00:00 UTC next day.
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 5, 11, 0, 0, 0).unwrap());
    }

    #[test]
    fn invalid_expressions_are_none() {
        let after = Utc.with_ymd_and_hms(2024, 5, 10, 15, 0, 0).unwrap();
        assert!(next_fire("bad", after, Sao_Paulo).is_none());
        assert!(next_fire("*/0 * * * *", after, Sao_Paulo).is_none());
        assert!(next_fire("61 8 * * *", after, Sao_Paulo).is_none());
    }
}
