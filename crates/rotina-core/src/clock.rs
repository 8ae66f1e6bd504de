//! Wall-clock resolution against the app's fixed timezone.
//!
//! Every driver cycle starts here: a UTC instant becomes a local date,
//! day boundaries, and an hour:minute that the named time windows are
//! checked against. The zone comes from the IANA database (chrono-tz),
//! never from the host OS configuration, so window checks behave the same
//! on any server.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

/// Injectable time source. Production uses [`SystemClock`]; tests pin an
/// instant with [`FixedClock`].
pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at a single instant.
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

/// "Now" resolved into the target timezone for one evaluation cycle.
#[derive(Debug, Clone)]
pub struct TimeContext {
    pub now_utc: DateTime<Utc>,
    /// The zone everything below was resolved in.
    pub tz: Tz,
    /// Local calendar date in the target zone.
    pub date: NaiveDate,
    /// Start of the local day, as a UTC instant.
    pub day_start: DateTime<Utc>,
    /// Start of the next local day, as a UTC instant (half-open bound).
    pub day_end: DateTime<Utc>,
    pub hour: u32,
    pub minute: u32,
    /// Minutes since local midnight — the unit windows are defined in.
    pub minute_of_day: u32,
}

impl TimeContext {
    /// Resolve an instant against a timezone. Never fails: DST gaps fall
    /// forward to the earliest valid local time.
    pub fn resolve(now_utc: DateTime<Utc>, tz: Tz) -> Self {
        let local = now_utc.with_timezone(&tz);
        let date = local.date_naive();
        let day_start = local_midnight(date, tz);
        let day_end = local_midnight(date + Duration::days(1), tz);
        Self {
            now_utc,
            tz,
            date,
            day_start,
            day_end,
            hour: local.hour(),
            minute: local.minute(),
            minute_of_day: local.hour() * 60 + local.minute(),
        }
    }

    /// Current local time as "HH:MM" (suppression keys, reminder matching).
    pub fn hhmm(&self) -> String {
        format!("{:02}:{:02}", self.hour, self.minute)
    }

    /// "YYYY-MM" of the local date (finance dedup keys).
    pub fn month_key(&self) -> String {
        format!("{:04}-{:02}", self.date.year(), self.date.month())
    }

    /// First day of the current local month.
    pub fn month_start(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.date.year(), self.date.month(), 1).unwrap_or(self.date)
    }

    /// Monday of the current local week (junk-food dedup keys).
    pub fn week_start(&self) -> NaiveDate {
        self.date - Duration::days(self.date.weekday().num_days_from_monday() as i64)
    }
}

fn local_midnight(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let midnight = date.and_hms_opt(0, 0, 0).expect("00:00:00 is valid");
    match tz.from_local_datetime(&midnight) {
        chrono::LocalResult::Single(dt) => dt.with_timezone(&Utc),
        chrono::LocalResult::Ambiguous(a, _) => a.with_timezone(&Utc),
        // Spring-forward gap at midnight (e.g. old Brazilian DST rules):
        // the day starts at the first instant that exists.
        chrono::LocalResult::None => {
            let shifted = midnight + Duration::hours(1);
            tz.from_local_datetime(&shifted)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
        }
    }
}

/// A named time-of-day range, half-open (`[start, end)`), in minutes since
/// local midnight. Windows never wrap midnight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeWindow {
    pub label: String,
    pub start_min: u32,
    pub end_min: u32,
}

impl TimeWindow {
    pub fn new(label: &str, start_min: u32, end_min: u32) -> Self {
        Self {
            label: label.to_string(),
            start_min,
            end_min,
        }
    }

    pub fn contains(&self, minute_of_day: u32) -> bool {
        minute_of_day >= self.start_min && minute_of_day < self.end_min
    }
}

/// The named windows the producers gate on. Meal lookup returns the first
/// declared match or none; absence of a match is a normal result.
#[derive(Debug, Clone)]
pub struct WindowSet {
    pub meals: Vec<TimeWindow>,
    pub closing: TimeWindow,
    pub morning: TimeWindow,
}

impl WindowSet {
    pub fn meal_at(&self, minute_of_day: u32) -> Option<&TimeWindow> {
        self.meals.iter().find(|w| w.contains(minute_of_day))
    }

    pub fn in_closing(&self, minute_of_day: u32) -> bool {
        self.closing.contains(minute_of_day)
    }

    pub fn in_morning(&self, minute_of_day: u32) -> bool {
        self.morning.contains(minute_of_day)
    }
}

/// Parse "HH:MM" into minutes since midnight.
pub fn parse_hhmm(s: &str) -> Option<u32> {
    let (h, m) = s.split_once(':')?;
    let h: u32 = h.trim().parse().ok()?;
    let m: u32 = m.trim().parse().ok()?;
    if h > 23 || m > 59 {
        return None;
    }
    Some(h * 60 + m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::Sao_Paulo;

    #[test]
    fn resolves_local_date_across_utc_boundary() {
        // 01:30 UTC is still the previous day in São Paulo (UTC-3).
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 1, 30, 0).unwrap();
        let ctx = TimeContext::resolve(now, Sao_Paulo);
        assert_eq!(ctx.date, NaiveDate::from_ymd_opt(2024, 5, 9).unwrap());
        assert_eq!(ctx.hour, 22);
        assert_eq!(ctx.minute, 30);
        assert_eq!(ctx.minute_of_day, 22 * 60 + 30);
    }

    #[test]
    fn day_bounds_are_utc_instants_of_local_midnights() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 15, 0, 0).unwrap();
        let ctx = TimeContext::resolve(now, Sao_Paulo);
        // São Paulo midnight = 03:00 UTC (no DST since 2019).
        assert_eq!(ctx.day_start, Utc.with_ymd_and_hms(2024, 5, 10, 3, 0, 0).unwrap());
        assert_eq!(ctx.day_end, Utc.with_ymd_and_hms(2024, 5, 11, 3, 0, 0).unwrap());
        assert!(ctx.day_start <= now && now < ctx.day_end);
    }

    #[test]
    fn month_and_week_keys() {
        let now = Utc.with_ymd_and_hms(2024, 5, 15, 12, 0, 0).unwrap();
        let ctx = TimeContext::resolve(now, Sao_Paulo);
        assert_eq!(ctx.month_key(), "2024-05");
        assert_eq!(ctx.month_start(), NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        // 2024-05-15 is a Wednesday; the week started Monday the 13th.
        assert_eq!(ctx.week_start(), NaiveDate::from_ymd_opt(2024, 5, 13).unwrap());
    }

    #[test]
    fn window_is_half_open() {
        let w = TimeWindow::new("Almoço", 11 * 60 + 30, 14 * 60);
        assert!(!w.contains(11 * 60 + 29));
        assert!(w.contains(11 * 60 + 30));
        assert!(w.contains(13 * 60 + 59));
        assert!(!w.contains(14 * 60));
    }

    #[test]
    fn meal_lookup_first_match_or_none() {
        let set = WindowSet {
            meals: vec![
                TimeWindow::new("Café da manhã", 7 * 60, 9 * 60 + 30),
                TimeWindow::new("Almoço", 11 * 60 + 30, 14 * 60),
            ],
            closing: TimeWindow::new("Fechamento", 21 * 60 + 30, 22 * 60 + 30),
            morning: TimeWindow::new("Manhã", 8 * 60, 8 * 60 + 30),
        };
        assert_eq!(set.meal_at(12 * 60).map(|w| w.label.as_str()), Some("Almoço"));
        assert!(set.meal_at(10 * 60).is_none());
        assert!(set.in_closing(21 * 60 + 45));
        assert!(!set.in_closing(22 * 60 + 30));
    }

    #[test]
    fn hhmm_parsing() {
        assert_eq!(parse_hhmm("08:30"), Some(510));
        assert_eq!(parse_hhmm("23:59"), Some(23 * 60 + 59));
        assert_eq!(parse_hhmm("24:00"), None);
        assert_eq!(parse_hhmm("0830"), None);
    }
}
