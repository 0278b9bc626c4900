use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Result of `check_time_window`: either currently inside the sending
/// window, or the exact number of milliseconds until it next opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindowResult {
    pub in_window: bool,
    pub wait_ms: i64,
}

/// Computes whether `now` falls within the `[start, end)` local time window
/// for `timezone`, handling windows that cross midnight (e.g. 23:59–00:01).
/// `start`/`end` are "HH:MM" strings; `timezone` is an IANA name.
#[must_use]
pub fn check_time_window(start: &str, end: &str, timezone: &str, now: DateTime<Utc>) -> TimeWindowResult {
    let tz: Tz = timezone.parse().unwrap_or(chrono_tz::UTC);
    let local_now = now.with_timezone(&tz);
    let Some(start_time) = parse_hhmm(start) else {
        return TimeWindowResult { in_window: true, wait_ms: 0 };
    };
    let Some(end_time) = parse_hhmm(end) else {
        return TimeWindowResult { in_window: true, wait_ms: 0 };
    };

    let today = local_now.date_naive();
    let crosses_midnight = end_time <= start_time;

    let in_window = if crosses_midnight {
        local_now.time() >= start_time || local_now.time() < end_time
    } else {
        local_now.time() >= start_time && local_now.time() < end_time
    };

    if in_window {
        return TimeWindowResult { in_window: true, wait_ms: 0 };
    }

    // Find the next datetime (today or tomorrow) at which `start_time` occurs.
    let mut candidate = tz
        .from_local_datetime(&today.and_time(start_time))
        .single()
        .unwrap_or(local_now);
    if candidate <= local_now {
        candidate += chrono::Duration::days(1);
    }
    let wait_ms = (candidate.with_timezone(&Utc) - now).num_milliseconds().max(0);
    TimeWindowResult { in_window: false, wait_ms }
}

fn parse_hhmm(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M").ok()
}

/// Rolling-window quota check for `send_connection_request` (spec §4.4).
/// `sent_at` are timestamps of prior successful sends for one sender
/// account, used to evaluate both the 24h and 7d caps; the limiter is
/// keyed per sender account, not per organization (SPEC_FULL open
/// question #5).
#[derive(Debug, Clone, Copy)]
pub struct RateLimitCheck {
    pub can_proceed: bool,
    pub wait_until_ms: Option<i64>,
}

#[must_use]
pub fn check_connection_request_limits(
    sent_at: &[DateTime<Utc>],
    daily_cap: usize,
    weekly_cap: usize,
    now: DateTime<Utc>,
) -> RateLimitCheck {
    let day_ago = now - chrono::Duration::hours(24);
    let week_ago = now - chrono::Duration::days(7);

    let mut in_day: Vec<DateTime<Utc>> = sent_at.iter().copied().filter(|t| *t > day_ago).collect();
    let mut in_week: Vec<DateTime<Utc>> = sent_at.iter().copied().filter(|t| *t > week_ago).collect();
    in_day.sort_unstable();
    in_week.sort_unstable();

    if in_day.len() >= daily_cap {
        let resets_at = in_day[0] + chrono::Duration::hours(24);
        return RateLimitCheck {
            can_proceed: false,
            wait_until_ms: Some((resets_at - now).num_milliseconds().max(0)),
        };
    }
    if in_week.len() >= weekly_cap {
        let resets_at = in_week[0] + chrono::Duration::days(7);
        return RateLimitCheck {
            can_proceed: false,
            wait_until_ms: Some((resets_at - now).num_milliseconds().max(0)),
        };
    }
    RateLimitCheck { can_proceed: true, wait_until_ms: None }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn inside_window_returns_zero_wait() {
        let now = at(2026, 3, 10, 10, 0);
        let result = check_time_window("09:00", "17:00", "UTC", now);
        assert!(result.in_window);
        assert_eq!(result.wait_ms, 0);
    }

    #[test]
    fn before_window_waits_until_start() {
        let now = at(2026, 3, 10, 7, 0);
        let result = check_time_window("09:00", "17:00", "UTC", now);
        assert!(!result.in_window);
        assert_eq!(result.wait_ms, 2 * 3_600 * 1000);
    }

    #[test]
    fn after_window_waits_until_next_day_start() {
        let now = at(2026, 3, 10, 18, 0);
        let result = check_time_window("09:00", "17:00", "UTC", now);
        assert!(!result.in_window);
        assert_eq!(result.wait_ms, 15 * 3_600 * 1000);
    }

    #[test]
    fn window_crossing_midnight_gates_correctly() {
        // 23:59 -> 00:01 window: just after opening is in-window.
        let just_after = at(2026, 3, 10, 0, 0);
        assert!(check_time_window("23:59", "00:01", "UTC", just_after).in_window);

        // Mid-afternoon is outside a 23:59-00:01 window.
        let midday = at(2026, 3, 10, 12, 0);
        let result = check_time_window("23:59", "00:01", "UTC", midday);
        assert!(!result.in_window);

        // One minute before open.
        let just_before = at(2026, 3, 10, 23, 58);
        let result = check_time_window("23:59", "00:01", "UTC", just_before);
        assert!(!result.in_window);
        assert_eq!(result.wait_ms, 60_000);
    }

    #[test]
    fn unparseable_bounds_fail_open() {
        let now = at(2026, 3, 10, 3, 0);
        let result = check_time_window("garbage", "17:00", "UTC", now);
        assert!(result.in_window);
    }

    #[test]
    fn rate_limit_allows_when_under_both_caps() {
        let now = Utc::now();
        let check = check_connection_request_limits(&[], 20, 100, now);
        assert!(check.can_proceed);
        assert!(check.wait_until_ms.is_none());
    }

    #[test]
    fn rate_limit_blocks_on_daily_cap() {
        let now = Utc::now();
        let sent_at = vec![now - chrono::Duration::hours(1); 5];
        let check = check_connection_request_limits(&sent_at, 5, 100, now);
        assert!(!check.can_proceed);
        assert!(check.wait_until_ms.unwrap() > 0);
    }

    #[test]
    fn rate_limit_ignores_entries_outside_both_windows() {
        let now = Utc::now();
        let sent_at = vec![now - chrono::Duration::days(10)];
        let check = check_connection_request_limits(&sent_at, 5, 100, now);
        assert!(check.can_proceed);
    }

    #[test]
    fn rate_limit_wait_until_aligns_with_oldest_entry_expiry() {
        let now = Utc::now();
        let oldest = now - chrono::Duration::hours(23);
        let sent_at = vec![oldest, now - chrono::Duration::hours(1)];
        let check = check_connection_request_limits(&sent_at, 2, 100, now);
        assert!(!check.can_proceed);
        let expected = (oldest + chrono::Duration::hours(24) - now).num_milliseconds();
        assert_eq!(check.wait_until_ms.unwrap(), expected);
    }
}
