use chrono::{DateTime, Duration, NaiveTime, Utc};
use uuid::Uuid;

/// How long after a swipe it can still be taken back
pub const UNDO_WINDOW_SECS: i64 = 5 * 60;

pub fn undo_window() -> Duration {
    Duration::seconds(UNDO_WINDOW_SECS)
}

/// Oldest swipe timestamp still eligible for undo at `now`
pub fn undo_cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
    now - undo_window()
}

/// Matches store each pair once with the smaller id first
pub fn ordered_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Midnight UTC of the day containing `now`; daily quotas reset here
pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}
