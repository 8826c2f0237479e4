use rusqlite::Connection;

use crate::error::AppError;

/// Run the consolidated schema migration. Idempotent.
pub fn run(conn: &Connection) -> Result<(), AppError> {
    tracing::debug!("Running database migrations");

    conn.execute_batch(SCHEMA)?;

    tracing::info!("Database migrations complete");
    Ok(())
}

const SCHEMA: &str = r#"

-- ============================================================================
-- Bills (templates and concrete instances share one table)
-- ============================================================================

CREATE TABLE IF NOT EXISTS bills (
    id                          TEXT PRIMARY KEY,
    user_id                     TEXT NOT NULL,
    bill_name                   TEXT NOT NULL,
    payer_name                  TEXT,
    destination_account         TEXT,
    amount                      REAL NOT NULL DEFAULT 0,
    due_date                    TEXT NOT NULL,
    category                    TEXT,
    status                      TEXT NOT NULL DEFAULT 'active'
                                CHECK (status IN ('active', 'inactive')),
    recurrence_type             TEXT NOT NULL DEFAULT 'one_time'
                                CHECK (recurrence_type IN ('one_time', 'monthly', 'yearly', 'custom')),
    recurrence_day              INTEGER CHECK (recurrence_day BETWEEN 1 AND 31),
    recurrence_month            INTEGER CHECK (recurrence_month BETWEEN 1 AND 12),
    next_due_date               TEXT,
    is_template                 INTEGER NOT NULL DEFAULT 0,
    sync_to_google_calendar     INTEGER NOT NULL DEFAULT 0,
    google_calendar_event_id    TEXT,
    created_at                  TEXT NOT NULL,
    updated_at                  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_bills_user        ON bills(user_id);
CREATE INDEX IF NOT EXISTS idx_bills_templates   ON bills(is_template, status);
CREATE INDEX IF NOT EXISTS idx_bills_name_due    ON bills(user_id, bill_name, due_date);
-- At most one concrete instance per (bill_name, user_id, due_date).
CREATE UNIQUE INDEX IF NOT EXISTS uq_bills_instance_due
    ON bills(bill_name, user_id, due_date) WHERE is_template = 0;

-- ============================================================================
-- Reminders
-- ============================================================================

CREATE TABLE IF NOT EXISTS reminders (
    id                          TEXT PRIMARY KEY,
    user_id                     TEXT NOT NULL,
    title                       TEXT NOT NULL,
    description                 TEXT,
    remind_date                 TEXT NOT NULL,
    remind_time                 TEXT,
    sync_to_google_calendar     INTEGER NOT NULL DEFAULT 0,
    google_calendar_event_id    TEXT,
    created_at                  TEXT NOT NULL,
    updated_at                  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_reminders_user_date ON reminders(user_id, remind_date);

"#;
