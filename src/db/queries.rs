use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::types::ToSql;
use rusqlite::{params, Connection};

use crate::models::{Booking, BookingStatus, Customer, Payment, PaymentProvider, PaymentStatus};
use crate::pricing::PackageId;

const TS_FMT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FMT: &str = "%Y-%m-%d";

fn ts(dt: &NaiveDateTime) -> String {
    dt.format(TS_FMT).to_string()
}

fn parse_ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, TS_FMT).unwrap_or_else(|_| Utc::now().naive_utc())
}

/// Filters shared by the admin list endpoints. `sort_by`/`sort_order` are
/// whitelisted by the handler before they reach this module; they are spliced
/// into SQL, never bound.
pub struct ListParams {
    pub page: i64,
    pub limit: i64,
    pub search: Option<String>,
    pub status: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub sort_by: String,
    pub sort_order: String,
}

impl ListParams {
    fn offset(&self) -> i64 {
        (self.page - 1).max(0) * self.limit
    }
}

// ── Customers ──

pub fn upsert_customer(conn: &Connection, email: &str, name: &str, phone: &str) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO customers (email, name, phone) VALUES (?1, ?2, ?3)
         ON CONFLICT(email) DO UPDATE SET name = excluded.name, phone = excluded.phone",
        params![email, name, phone],
    )?;
    Ok(())
}

fn parse_customer_row(row: &rusqlite::Row) -> anyhow::Result<Customer> {
    let email: String = row.get(0)?;
    let name: String = row.get(1)?;
    let phone: String = row.get(2)?;
    let created_at_str: String = row.get(3)?;

    Ok(Customer {
        email,
        name,
        phone,
        created_at: parse_ts(&created_at_str),
    })
}

pub fn list_customers(conn: &Connection, p: &ListParams) -> anyhow::Result<(Vec<Customer>, i64)> {
    let mut clauses: Vec<String> = vec![];
    let mut binds: Vec<Box<dyn ToSql>> = vec![];

    if let Some(term) = &p.search {
        let like = format!("%{term}%");
        clauses.push("(name LIKE ? OR email LIKE ? OR phone LIKE ?)".to_string());
        binds.push(Box::new(like.clone()));
        binds.push(Box::new(like.clone()));
        binds.push(Box::new(like));
    }
    if let Some(from) = &p.date_from {
        clauses.push("created_at >= ?".to_string());
        binds.push(Box::new(format!("{from} 00:00:00")));
    }
    if let Some(to) = &p.date_to {
        clauses.push("created_at <= ?".to_string());
        binds.push(Box::new(format!("{to} 23:59:59")));
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM customers {where_sql}");
    let refs: Vec<&dyn ToSql> = binds.iter().map(|b| b.as_ref()).collect();
    let total: i64 = conn.query_row(&count_sql, refs.as_slice(), |row| row.get(0))?;

    let sql = format!(
        "SELECT email, name, phone, created_at FROM customers {where_sql}
         ORDER BY {} {} LIMIT ? OFFSET ?",
        p.sort_by, p.sort_order
    );
    binds.push(Box::new(p.limit));
    binds.push(Box::new(p.offset()));
    let refs: Vec<&dyn ToSql> = binds.iter().map(|b| b.as_ref()).collect();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(refs.as_slice(), |row| Ok(parse_customer_row(row)))?;

    let mut customers = vec![];
    for row in rows {
        customers.push(row??);
    }
    Ok((customers, total))
}

// ── Bookings ──

pub fn create_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO bookings (id, package_id, customer_name, customer_email, customer_phone,
                               booking_date, booking_time, status, total_amount, people_count,
                               notes, locale, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            booking.id,
            booking.package_id.as_str(),
            booking.customer_name,
            booking.customer_email,
            booking.customer_phone,
            booking.booking_date.format(DATE_FMT).to_string(),
            booking.booking_time,
            booking.status.as_str(),
            booking.total_amount,
            booking.people_count,
            booking.notes,
            booking.locale,
            ts(&booking.created_at),
            ts(&booking.updated_at),
        ],
    )?;
    Ok(())
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let id: String = row.get(0)?;
    let package_str: String = row.get(1)?;
    let customer_name: String = row.get(2)?;
    let customer_email: String = row.get(3)?;
    let customer_phone: String = row.get(4)?;
    let booking_date_str: String = row.get(5)?;
    let booking_time: String = row.get(6)?;
    let status_str: String = row.get(7)?;
    let total_amount: f64 = row.get(8)?;
    let people_count: Option<i64> = row.get(9)?;
    let notes: Option<String> = row.get(10)?;
    let locale: String = row.get(11)?;
    let created_at_str: String = row.get(12)?;
    let updated_at_str: String = row.get(13)?;

    let booking_date = NaiveDate::parse_from_str(&booking_date_str, DATE_FMT)
        .unwrap_or_else(|_| Utc::now().date_naive());

    Ok(Booking {
        id,
        package_id: PackageId::parse(&package_str).unwrap_or(PackageId::Essential),
        customer_name,
        customer_email,
        customer_phone,
        booking_date,
        booking_time,
        status: BookingStatus::parse(&status_str),
        total_amount,
        people_count,
        notes,
        locale,
        created_at: parse_ts(&created_at_str),
        updated_at: parse_ts(&updated_at_str),
    })
}

const BOOKING_COLS: &str = "id, package_id, customer_name, customer_email, customer_phone, \
                            booking_date, booking_time, status, total_amount, people_count, \
                            notes, locale, created_at, updated_at";

pub fn get_booking_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        &format!("SELECT {BOOKING_COLS} FROM bookings WHERE id = ?1"),
        params![id],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Duplicate-submission guard: same contact, package and slot created after
/// `cutoff` (now minus the guard window).
pub fn has_recent_duplicate(
    conn: &Connection,
    email: &str,
    package: PackageId,
    date: NaiveDate,
    time: &str,
    cutoff: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM bookings
         WHERE customer_email = ?1 AND package_id = ?2 AND booking_date = ?3
           AND booking_time = ?4 AND created_at > ?5 AND status != 'cancelled'",
        params![
            email,
            package.as_str(),
            date.format(DATE_FMT).to_string(),
            time,
            ts(cutoff),
        ],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Conditional promotion to confirmed. Only drafts and pending bookings move;
/// replays and late webhooks on cancelled/completed rows are no-ops.
pub fn confirm_booking(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let now = ts(&Utc::now().naive_utc());
    let count = conn.execute(
        "UPDATE bookings SET status = 'confirmed', updated_at = ?1
         WHERE id = ?2 AND status IN ('draft', 'pending')",
        params![now, id],
    )?;
    Ok(count > 0)
}

pub fn set_booking_status(conn: &Connection, id: &str, status: BookingStatus) -> anyhow::Result<bool> {
    let now = ts(&Utc::now().naive_utc());
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now, id],
    )?;
    Ok(count > 0)
}

pub fn mark_booking_pending(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let now = ts(&Utc::now().naive_utc());
    let count = conn.execute(
        "UPDATE bookings SET status = 'pending', updated_at = ?1
         WHERE id = ?2 AND status = 'draft'",
        params![now, id],
    )?;
    Ok(count > 0)
}

pub fn list_bookings(conn: &Connection, p: &ListParams) -> anyhow::Result<(Vec<Booking>, i64)> {
    let mut clauses: Vec<String> = vec![];
    let mut binds: Vec<Box<dyn ToSql>> = vec![];

    if let Some(term) = &p.search {
        let like = format!("%{term}%");
        clauses.push(
            "(customer_name LIKE ? OR customer_email LIKE ? OR customer_phone LIKE ?)".to_string(),
        );
        binds.push(Box::new(like.clone()));
        binds.push(Box::new(like.clone()));
        binds.push(Box::new(like));
    }
    if let Some(status) = &p.status {
        clauses.push("status = ?".to_string());
        binds.push(Box::new(status.clone()));
    }
    if let Some(from) = &p.date_from {
        clauses.push("booking_date >= ?".to_string());
        binds.push(Box::new(from.clone()));
    }
    if let Some(to) = &p.date_to {
        clauses.push("booking_date <= ?".to_string());
        binds.push(Box::new(to.clone()));
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM bookings {where_sql}");
    let refs: Vec<&dyn ToSql> = binds.iter().map(|b| b.as_ref()).collect();
    let total: i64 = conn.query_row(&count_sql, refs.as_slice(), |row| row.get(0))?;

    let sql = format!(
        "SELECT {BOOKING_COLS} FROM bookings {where_sql}
         ORDER BY {} {} LIMIT ? OFFSET ?",
        p.sort_by, p.sort_order
    );
    binds.push(Box::new(p.limit));
    binds.push(Box::new(p.offset()));
    let refs: Vec<&dyn ToSql> = binds.iter().map(|b| b.as_ref()).collect();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(refs.as_slice(), |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok((bookings, total))
}

pub fn bookings_for_emails(conn: &Connection, emails: &[String]) -> anyhow::Result<Vec<Booking>> {
    if emails.is_empty() {
        return Ok(vec![]);
    }
    let placeholders = vec!["?"; emails.len()].join(", ");
    let sql = format!(
        "SELECT {BOOKING_COLS} FROM bookings WHERE customer_email IN ({placeholders})
         ORDER BY booking_date DESC"
    );
    let refs: Vec<&dyn ToSql> = emails.iter().map(|e| e as &dyn ToSql).collect();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(refs.as_slice(), |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

// ── Payments ──

pub fn insert_payment(conn: &Connection, payment: &Payment) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO payments (id, booking_id, provider, provider_order_id, conversation_id,
                               status, amount, currency, provider_response, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            payment.id,
            payment.booking_id,
            payment.provider.as_str(),
            payment.provider_order_id,
            payment.conversation_id,
            payment.status.as_str(),
            payment.amount,
            payment.currency,
            payment.provider_response,
            ts(&payment.created_at),
            ts(&payment.updated_at),
        ],
    )?;
    Ok(())
}

fn parse_payment_row(row: &rusqlite::Row) -> anyhow::Result<Payment> {
    let id: String = row.get(0)?;
    let booking_id: Option<String> = row.get(1)?;
    let provider_str: String = row.get(2)?;
    let provider_order_id: Option<String> = row.get(3)?;
    let conversation_id: Option<String> = row.get(4)?;
    let status_str: String = row.get(5)?;
    let amount: f64 = row.get(6)?;
    let currency: String = row.get(7)?;
    let provider_response: Option<String> = row.get(8)?;
    let created_at_str: String = row.get(9)?;
    let updated_at_str: String = row.get(10)?;

    Ok(Payment {
        id,
        booking_id,
        provider: PaymentProvider::parse(&provider_str),
        provider_order_id,
        conversation_id,
        status: PaymentStatus::parse(&status_str),
        amount,
        currency,
        provider_response,
        created_at: parse_ts(&created_at_str),
        updated_at: parse_ts(&updated_at_str),
    })
}

const PAYMENT_COLS: &str = "id, booking_id, provider, provider_order_id, conversation_id, \
                            status, amount, currency, provider_response, created_at, updated_at";

pub fn get_payment_by_order_id(
    conn: &Connection,
    provider_order_id: &str,
) -> anyhow::Result<Option<Payment>> {
    let result = conn.query_row(
        &format!("SELECT {PAYMENT_COLS} FROM payments WHERE provider_order_id = ?1"),
        params![provider_order_id],
        |row| Ok(parse_payment_row(row)),
    );

    match result {
        Ok(payment) => Ok(Some(payment?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Compare-and-swap completion: only a pending payment becomes successful.
/// Returns false when the row was already settled, which is how webhook
/// replays are detected.
pub fn complete_payment(
    conn: &Connection,
    provider_order_id: &str,
    provider_response: &str,
) -> anyhow::Result<bool> {
    let now = ts(&Utc::now().naive_utc());
    let count = conn.execute(
        "UPDATE payments SET status = 'success', provider_response = ?1, updated_at = ?2
         WHERE provider_order_id = ?3 AND status = 'pending'",
        params![provider_response, now, provider_order_id],
    )?;
    Ok(count > 0)
}

pub fn payments_for_booking_ids(conn: &Connection, ids: &[String]) -> anyhow::Result<Vec<Payment>> {
    if ids.is_empty() {
        return Ok(vec![]);
    }
    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!("SELECT {PAYMENT_COLS} FROM payments WHERE booking_id IN ({placeholders})");
    let refs: Vec<&dyn ToSql> = ids.iter().map(|i| i as &dyn ToSql).collect();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(refs.as_slice(), |row| Ok(parse_payment_row(row)))?;

    let mut payments = vec![];
    for row in rows {
        payments.push(row??);
    }
    Ok(payments)
}

pub fn list_payments(conn: &Connection, p: &ListParams) -> anyhow::Result<(Vec<Payment>, i64)> {
    let mut clauses: Vec<String> = vec![];
    let mut binds: Vec<Box<dyn ToSql>> = vec![];

    if let Some(term) = &p.search {
        let like = format!("%{term}%");
        clauses.push(
            "(provider_order_id LIKE ? OR conversation_id LIKE ? OR booking_id LIKE ?)".to_string(),
        );
        binds.push(Box::new(like.clone()));
        binds.push(Box::new(like.clone()));
        binds.push(Box::new(like));
    }
    if let Some(status) = &p.status {
        clauses.push("status = ?".to_string());
        binds.push(Box::new(status.clone()));
    }
    if let Some(from) = &p.date_from {
        clauses.push("created_at >= ?".to_string());
        binds.push(Box::new(format!("{from} 00:00:00")));
    }
    if let Some(to) = &p.date_to {
        clauses.push("created_at <= ?".to_string());
        binds.push(Box::new(format!("{to} 23:59:59")));
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM payments {where_sql}");
    let refs: Vec<&dyn ToSql> = binds.iter().map(|b| b.as_ref()).collect();
    let total: i64 = conn.query_row(&count_sql, refs.as_slice(), |row| row.get(0))?;

    let sql = format!(
        "SELECT {PAYMENT_COLS} FROM payments {where_sql}
         ORDER BY {} {} LIMIT ? OFFSET ?",
        p.sort_by, p.sort_order
    );
    binds.push(Box::new(p.limit));
    binds.push(Box::new(p.offset()));
    let refs: Vec<&dyn ToSql> = binds.iter().map(|b| b.as_ref()).collect();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(refs.as_slice(), |row| Ok(parse_payment_row(row)))?;

    let mut payments = vec![];
    for row in rows {
        payments.push(row??);
    }
    Ok((payments, total))
}

// ── Stats ──

pub struct AdminStats {
    pub total_bookings: i64,
    pub draft_bookings: i64,
    pub pending_bookings: i64,
    pub confirmed_bookings: i64,
    pub cancelled_bookings: i64,
    pub completed_bookings: i64,
    pub confirmed_revenue: f64,
    pub deposits_collected: f64,
    pub upcoming_confirmed: i64,
    pub total_customers: i64,
}

pub fn get_admin_stats(conn: &Connection) -> anyhow::Result<AdminStats> {
    let count_status = |status: &str| -> anyhow::Result<i64> {
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM bookings WHERE status = ?1",
            params![status],
            |row| row.get(0),
        )?)
    };

    let total_bookings: i64 =
        conn.query_row("SELECT COUNT(*) FROM bookings", [], |row| row.get(0))?;

    let confirmed_revenue: f64 = conn.query_row(
        "SELECT COALESCE(SUM(total_amount), 0) FROM bookings
         WHERE status IN ('confirmed', 'completed')",
        [],
        |row| row.get(0),
    )?;

    let deposits_collected: f64 = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0) FROM payments WHERE status = 'success'",
        [],
        |row| row.get(0),
    )?;

    let today = Utc::now().date_naive().format(DATE_FMT).to_string();
    let upcoming_confirmed: i64 = conn.query_row(
        "SELECT COUNT(*) FROM bookings WHERE status = 'confirmed' AND booking_date >= ?1",
        params![today],
        |row| row.get(0),
    )?;

    let total_customers: i64 =
        conn.query_row("SELECT COUNT(*) FROM customers", [], |row| row.get(0))?;

    Ok(AdminStats {
        total_bookings,
        draft_bookings: count_status("draft")?,
        pending_bookings: count_status("pending")?,
        confirmed_bookings: count_status("confirmed")?,
        cancelled_bookings: count_status("cancelled")?,
        completed_bookings: count_status("completed")?,
        confirmed_revenue,
        deposits_collected,
        upcoming_confirmed,
        total_customers,
    })
}

// ── Rate limits ──

pub fn hit_rate_limit(conn: &Connection, key: &str, window_start: &str) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO rate_limits (key, window_start, request_count)
         VALUES (?1, ?2, 1)
         ON CONFLICT(key, window_start) DO UPDATE SET request_count = request_count + 1",
        params![key, window_start],
    )?;

    let count: i64 = conn.query_row(
        "SELECT request_count FROM rate_limits WHERE key = ?1 AND window_start = ?2",
        params![key, window_start],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn cleanup_rate_windows(conn: &Connection, cutoff: &str) -> anyhow::Result<()> {
    conn.execute(
        "DELETE FROM rate_limits WHERE window_start < ?1",
        params![cutoff],
    )?;
    Ok(())
}
