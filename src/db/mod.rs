pub mod queries;

use anyhow::Context;
use rusqlite::Connection;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS customers (
    email       TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    phone       TEXT NOT NULL,
    created_at  TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS bookings (
    id             TEXT PRIMARY KEY,
    package_id     TEXT NOT NULL,
    customer_name  TEXT NOT NULL,
    customer_email TEXT NOT NULL,
    customer_phone TEXT NOT NULL,
    booking_date   TEXT NOT NULL,
    booking_time   TEXT NOT NULL,
    status         TEXT NOT NULL DEFAULT 'draft',
    total_amount   REAL NOT NULL,
    people_count   INTEGER,
    notes          TEXT,
    locale         TEXT NOT NULL DEFAULT 'en',
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_bookings_email ON bookings(customer_email);
CREATE INDEX IF NOT EXISTS idx_bookings_date ON bookings(booking_date);

CREATE TABLE IF NOT EXISTS payments (
    id                TEXT PRIMARY KEY,
    booking_id        TEXT,
    provider          TEXT NOT NULL,
    provider_order_id TEXT,
    conversation_id   TEXT,
    status            TEXT NOT NULL DEFAULT 'pending',
    amount            REAL NOT NULL,
    currency          TEXT NOT NULL DEFAULT 'EUR',
    provider_response TEXT,
    created_at        TEXT NOT NULL,
    updated_at        TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_payments_order ON payments(provider_order_id);
CREATE INDEX IF NOT EXISTS idx_payments_booking ON payments(booking_id);

CREATE TABLE IF NOT EXISTS rate_limits (
    key           TEXT NOT NULL,
    window_start  TEXT NOT NULL,
    request_count INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (key, window_start)
);
";

pub fn init_db(path: &str) -> anyhow::Result<Connection> {
    let conn = Connection::open(path).context("failed to open database")?;

    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
        .context("failed to set database pragmas")?;

    conn.execute_batch(SCHEMA)
        .context("failed to create schema")?;

    Ok(conn)
}
