use rusqlite::{params, Row};

use crate::db::models::{CreateReminderInput, Reminder, UpdateReminderInput};
use crate::db::DbPool;
use crate::error::AppError;

fn row_to_reminder(row: &Row) -> rusqlite::Result<Reminder> {
    Ok(Reminder {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        remind_date: row.get("remind_date")?,
        remind_time: row.get("remind_time")?,
        sync_to_google_calendar: row.get::<_, i32>("sync_to_google_calendar")? != 0,
        google_calendar_event_id: row.get("google_calendar_event_id")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub fn get_by_id(pool: &DbPool, id: &str) -> Result<Reminder, AppError> {
    let conn = pool.get()?;
    conn.query_row(
        "SELECT * FROM reminders WHERE id = ?1",
        params![id],
        row_to_reminder,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => AppError::NotFound(format!("Reminder {id}")),
        other => AppError::Database(other),
    })
}

pub fn get_by_user(pool: &DbPool, user_id: &str) -> Result<Vec<Reminder>, AppError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT * FROM reminders WHERE user_id = ?1 ORDER BY remind_date ASC, remind_time ASC",
    )?;
    let rows = stmt.query_map(params![user_id], row_to_reminder)?;
    let reminders = rows.collect::<Result<Vec<_>, _>>().map_err(AppError::Database)?;
    Ok(reminders)
}

pub fn create(pool: &DbPool, input: CreateReminderInput) -> Result<Reminder, AppError> {
    if input.title.trim().is_empty() {
        return Err(AppError::Validation("title must not be empty".into()));
    }

    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let sync = input.sync_to_google_calendar.unwrap_or(false) as i32;

    {
        let conn = pool.get()?;
        conn.execute(
            "INSERT INTO reminders
             (id, user_id, title, description, remind_date, remind_time,
              sync_to_google_calendar, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
            params![
                id,
                input.user_id,
                input.title,
                input.description,
                input.remind_date,
                input.remind_time,
                sync,
                now
            ],
        )?;
    }

    get_by_id(pool, &id)
}

pub fn update(
    pool: &DbPool,
    id: &str,
    input: UpdateReminderInput,
) -> Result<Reminder, AppError> {
    if let Some(ref title) = input.title {
        if title.trim().is_empty() {
            return Err(AppError::Validation("title must not be empty".into()));
        }
    }

    // Verify exists
    get_by_id(pool, id)?;

    let now = chrono::Utc::now().to_rfc3339();
    let conn = pool.get()?;

    let mut sets: Vec<String> = vec!["updated_at = ?1".into()];
    let mut param_idx = 2u32;

    push_field!(input.title, "title", sets, param_idx);
    push_field!(input.description, "description", sets, param_idx);
    push_field!(input.remind_date, "remind_date", sets, param_idx);
    push_field!(input.remind_time, "remind_time", sets, param_idx);
    push_field!(input.sync_to_google_calendar, "sync_to_google_calendar", sets, param_idx);

    let sql = format!(
        "UPDATE reminders SET {} WHERE id = ?{}",
        sets.join(", "),
        param_idx
    );

    let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(now)];
    push_value!(input.title, param_values);
    push_value!(input.description, param_values);
    push_value!(input.remind_date, param_values);
    push_value!(input.remind_time, param_values);
    push_value!(input.sync_to_google_calendar, param_values);
    param_values.push(Box::new(id.to_string()));

    let params_ref: Vec<&dyn rusqlite::types::ToSql> =
        param_values.iter().map(|p| p.as_ref()).collect();
    conn.execute(&sql, params_ref.as_slice())?;
    drop(conn);

    get_by_id(pool, id)
}

pub fn set_calendar_event_id(
    pool: &DbPool,
    id: &str,
    event_id: Option<&str>,
) -> Result<(), AppError> {
    let conn = pool.get()?;
    let rows = conn.execute(
        "UPDATE reminders SET google_calendar_event_id = ?1, updated_at = ?2 WHERE id = ?3",
        params![event_id, chrono::Utc::now().to_rfc3339(), id],
    )?;
    if rows == 0 {
        return Err(AppError::NotFound(format!("Reminder {id}")));
    }
    Ok(())
}

pub fn delete(pool: &DbPool, id: &str) -> Result<bool, AppError> {
    let conn = pool.get()?;
    let rows = conn.execute("DELETE FROM reminders WHERE id = ?1", params![id])?;
    Ok(rows > 0)
}
