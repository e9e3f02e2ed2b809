use chrono::{Duration, NaiveDateTime, Utc};
use rusqlite::Connection;

use crate::db::queries;

pub const WINDOW_SECONDS: i64 = 60;

const WINDOW_FMT: &str = "%Y-%m-%d %H:%M:00";

fn current_window() -> String {
    Utc::now().format(WINDOW_FMT).to_string()
}

/// Fixed-window counter keyed by (action, ip), stored in the database so the
/// limit holds across instances. Returns `None` when the request is allowed,
/// or the time the current window resets when it is not.
pub fn check(
    conn: &Connection,
    ip: &str,
    action: &str,
    max: i64,
) -> anyhow::Result<Option<NaiveDateTime>> {
    let window = current_window();
    let key = format!("{action}:{ip}");

    let count = queries::hit_rate_limit(conn, &key, &window)?;
    if count > max {
        let start = NaiveDateTime::parse_from_str(&window, "%Y-%m-%d %H:%M:%S")
            .unwrap_or_else(|_| Utc::now().naive_utc());
        return Ok(Some(start + Duration::seconds(WINDOW_SECONDS)));
    }

    // First hit in a window doubles as the purge point for stale windows.
    if count == 1 {
        let cutoff = (Utc::now() - Duration::minutes(5)).format(WINDOW_FMT).to_string();
        let _ = queries::cleanup_rate_windows(conn, &cutoff);
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[test]
    fn allows_up_to_the_limit() {
        let conn = db::init_db(":memory:").unwrap();
        for _ in 0..3 {
            assert!(check(&conn, "1.2.3.4", "booking_create", 3).unwrap().is_none());
        }
    }

    #[test]
    fn rejects_past_the_limit_with_future_reset() {
        let conn = db::init_db(":memory:").unwrap();
        for _ in 0..3 {
            assert!(check(&conn, "1.2.3.4", "booking_create", 3).unwrap().is_none());
        }
        let reset = check(&conn, "1.2.3.4", "booking_create", 3)
            .unwrap()
            .expect("fourth request should be limited");
        assert!(reset >= Utc::now().naive_utc() - Duration::seconds(1));
    }

    #[test]
    fn counters_are_scoped_per_ip_and_action() {
        let conn = db::init_db(":memory:").unwrap();
        for _ in 0..3 {
            assert!(check(&conn, "1.2.3.4", "booking_create", 3).unwrap().is_none());
        }
        assert!(check(&conn, "5.6.7.8", "booking_create", 3).unwrap().is_none());
        assert!(check(&conn, "1.2.3.4", "payment_initialize", 3).unwrap().is_none());
    }
}
