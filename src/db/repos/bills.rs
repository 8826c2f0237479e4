use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::models::{Bill, NewBill, UpdateBillInput};
use crate::db::DbPool;
use crate::error::AppError;

const MAX_AMOUNT: f64 = 1_000_000_000_000.0;

fn validate_new(bill: &NewBill) -> Result<(), AppError> {
    if bill.bill_name.trim().is_empty() {
        return Err(AppError::Validation("bill_name must not be empty".into()));
    }
    if bill.user_id.trim().is_empty() {
        return Err(AppError::Validation("user_id must not be empty".into()));
    }
    if !bill.amount.is_finite() || bill.amount < 0.0 || bill.amount > MAX_AMOUNT {
        return Err(AppError::Validation(format!(
            "amount must be a non-negative number, got {}",
            bill.amount
        )));
    }
    Ok(())
}

fn row_to_bill(row: &Row) -> rusqlite::Result<Bill> {
    Ok(Bill {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        bill_name: row.get("bill_name")?,
        payer_name: row.get("payer_name")?,
        destination_account: row.get("destination_account")?,
        amount: row.get("amount")?,
        due_date: row.get("due_date")?,
        category: row.get("category")?,
        status: row.get("status")?,
        recurrence_type: row.get("recurrence_type")?,
        recurrence_day: row.get("recurrence_day")?,
        recurrence_month: row.get("recurrence_month")?,
        next_due_date: row.get("next_due_date")?,
        is_template: row.get::<_, i32>("is_template")? != 0,
        sync_to_google_calendar: row.get::<_, i32>("sync_to_google_calendar")? != 0,
        google_calendar_event_id: row.get("google_calendar_event_id")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn get_on(conn: &Connection, id: &str) -> Result<Bill, AppError> {
    conn.query_row("SELECT * FROM bills WHERE id = ?1", params![id], row_to_bill)
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => AppError::NotFound(format!("Bill {id}")),
            other => AppError::Database(other),
        })
}

fn insert_on(conn: &Connection, bill: &NewBill, now: &str) -> Result<String, AppError> {
    validate_new(bill)?;
    let id = uuid::Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO bills
         (id, user_id, bill_name, payer_name, destination_account, amount, due_date, category,
          status, recurrence_type, recurrence_day, recurrence_month, next_due_date,
          is_template, sync_to_google_calendar, google_calendar_event_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?17)",
        params![
            id,
            bill.user_id,
            bill.bill_name,
            bill.payer_name,
            bill.destination_account,
            bill.amount,
            bill.due_date,
            bill.category,
            bill.status,
            bill.recurrence_type,
            bill.recurrence_day,
            bill.recurrence_month,
            bill.next_due_date,
            bill.is_template as i32,
            bill.sync_to_google_calendar as i32,
            bill.google_calendar_event_id,
            now,
        ],
    )?;
    Ok(id)
}

fn find_instance_on(
    conn: &Connection,
    bill_name: &str,
    user_id: &str,
    due_date: NaiveDate,
) -> Result<Option<Bill>, AppError> {
    conn.query_row(
        "SELECT * FROM bills
         WHERE bill_name = ?1 AND user_id = ?2 AND due_date = ?3 AND is_template = 0",
        params![bill_name, user_id, due_date],
        row_to_bill,
    )
    .optional()
    .map_err(AppError::Database)
}

pub fn get_by_id(pool: &DbPool, id: &str) -> Result<Bill, AppError> {
    let conn = pool.get()?;
    get_on(&conn, id)
}

pub fn get_by_user(pool: &DbPool, user_id: &str) -> Result<Vec<Bill>, AppError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT * FROM bills WHERE user_id = ?1 ORDER BY is_template DESC, due_date ASC",
    )?;
    let rows = stmt.query_map(params![user_id], row_to_bill)?;
    let bills = rows.collect::<Result<Vec<_>, _>>().map_err(AppError::Database)?;
    Ok(bills)
}

/// Active templates across all users, the generator's work list.
pub fn get_active_templates(pool: &DbPool) -> Result<Vec<Bill>, AppError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT * FROM bills
         WHERE is_template = 1 AND status = 'active'
         ORDER BY user_id, bill_name",
    )?;
    let rows = stmt.query_map([], row_to_bill)?;
    let bills = rows.collect::<Result<Vec<_>, _>>().map_err(AppError::Database)?;
    Ok(bills)
}

/// The most recently due concrete instance sharing `(bill_name, user_id)`.
pub fn find_latest_instance(
    pool: &DbPool,
    bill_name: &str,
    user_id: &str,
) -> Result<Option<Bill>, AppError> {
    let conn = pool.get()?;
    conn.query_row(
        "SELECT * FROM bills
         WHERE bill_name = ?1 AND user_id = ?2 AND is_template = 0
         ORDER BY due_date DESC, created_at DESC
         LIMIT 1",
        params![bill_name, user_id],
        row_to_bill,
    )
    .optional()
    .map_err(AppError::Database)
}

pub fn exists_for_date(
    pool: &DbPool,
    bill_name: &str,
    user_id: &str,
    due_date: NaiveDate,
) -> Result<bool, AppError> {
    let conn = pool.get()?;
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM bills
            WHERE bill_name = ?1 AND user_id = ?2 AND due_date = ?3 AND is_template = 0
         )",
        params![bill_name, user_id, due_date],
        |row| row.get(0),
    )?;
    Ok(exists != 0)
}

pub fn create(pool: &DbPool, bill: NewBill) -> Result<Bill, AppError> {
    let now = chrono::Utc::now().to_rfc3339();
    let conn = pool.get()?;
    let id = insert_on(&conn, &bill, &now)?;
    get_on(&conn, &id)
}

/// Insert all rows in one transaction. Either every row lands or none does.
pub fn create_many(pool: &DbPool, bills: Vec<NewBill>) -> Result<Vec<Bill>, AppError> {
    if bills.is_empty() {
        return Ok(Vec::new());
    }

    let now = chrono::Utc::now().to_rfc3339();
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;

    let mut ids = Vec::with_capacity(bills.len());
    for bill in &bills {
        ids.push(insert_on(&tx, bill, &now)?);
    }
    let created = ids
        .iter()
        .map(|id| get_on(&tx, id))
        .collect::<Result<Vec<_>, _>>()?;

    tx.commit()?;
    Ok(created)
}

pub fn update(pool: &DbPool, id: &str, input: UpdateBillInput) -> Result<Bill, AppError> {
    if let Some(ref name) = input.bill_name {
        if name.trim().is_empty() {
            return Err(AppError::Validation("bill_name must not be empty".into()));
        }
    }
    if let Some(amount) = input.amount {
        if !amount.is_finite() || amount < 0.0 || amount > MAX_AMOUNT {
            return Err(AppError::Validation(format!(
                "amount must be a non-negative number, got {amount}"
            )));
        }
    }

    // Verify exists
    get_by_id(pool, id)?;

    let now = chrono::Utc::now().to_rfc3339();
    let conn = pool.get()?;

    let mut sets: Vec<String> = vec!["updated_at = ?1".into()];
    let mut param_idx = 2u32;

    push_field!(input.bill_name, "bill_name", sets, param_idx);
    push_field!(input.payer_name, "payer_name", sets, param_idx);
    push_field!(input.destination_account, "destination_account", sets, param_idx);
    push_field!(input.amount, "amount", sets, param_idx);
    push_field!(input.due_date, "due_date", sets, param_idx);
    push_field!(input.category, "category", sets, param_idx);
    push_field!(input.status, "status", sets, param_idx);
    push_field!(input.recurrence_type, "recurrence_type", sets, param_idx);
    push_field!(input.recurrence_day, "recurrence_day", sets, param_idx);
    push_field!(input.recurrence_month, "recurrence_month", sets, param_idx);
    push_field!(input.next_due_date, "next_due_date", sets, param_idx);
    push_field!(input.sync_to_google_calendar, "sync_to_google_calendar", sets, param_idx);

    let sql = format!(
        "UPDATE bills SET {} WHERE id = ?{}",
        sets.join(", "),
        param_idx
    );

    let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(now)];
    push_value!(input.bill_name, param_values);
    push_value!(input.payer_name, param_values);
    push_value!(input.destination_account, param_values);
    push_value!(input.amount, param_values);
    push_value!(input.due_date, param_values);
    push_value!(input.category, param_values);
    push_value!(input.status, param_values);
    push_value!(input.recurrence_type, param_values);
    push_value!(input.recurrence_day, param_values);
    push_value!(input.recurrence_month, param_values);
    push_value!(input.next_due_date, param_values);
    push_value!(input.sync_to_google_calendar, param_values);
    param_values.push(Box::new(id.to_string()));

    let params_ref: Vec<&dyn rusqlite::types::ToSql> =
        param_values.iter().map(|p| p.as_ref()).collect();
    conn.execute(&sql, params_ref.as_slice())?;

    get_on(&conn, id)
}

pub fn set_calendar_event_id(
    pool: &DbPool,
    id: &str,
    event_id: Option<&str>,
) -> Result<(), AppError> {
    let conn = pool.get()?;
    let rows = conn.execute(
        "UPDATE bills SET google_calendar_event_id = ?1, updated_at = ?2 WHERE id = ?3",
        params![event_id, chrono::Utc::now().to_rfc3339(), id],
    )?;
    if rows == 0 {
        return Err(AppError::NotFound(format!("Bill {id}")));
    }
    Ok(())
}

pub fn delete(pool: &DbPool, id: &str) -> Result<bool, AppError> {
    let conn = pool.get()?;
    let rows = conn.execute("DELETE FROM bills WHERE id = ?1", params![id])?;
    Ok(rows > 0)
}

/// Delete `old_id` and insert `successor` in a single transaction.
///
/// If a concrete instance already exists at the successor's
/// `(bill_name, user_id, due_date)` (typically one the generator created
/// ahead of time) it is returned instead of inserting a duplicate.
/// The flag is `true` when a new row was inserted.
pub fn swap_for_successor(
    pool: &DbPool,
    old_id: &str,
    successor: NewBill,
) -> Result<(Bill, bool), AppError> {
    let now = chrono::Utc::now().to_rfc3339();
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;

    let removed = tx.execute("DELETE FROM bills WHERE id = ?1", params![old_id])?;
    if removed == 0 {
        // Dropping `tx` rolls back
        return Err(AppError::NotFound(format!("Bill {old_id}")));
    }

    let existing = if successor.is_template {
        None
    } else {
        find_instance_on(&tx, &successor.bill_name, &successor.user_id, successor.due_date)?
    };

    let result = match existing {
        Some(bill) => (bill, false),
        None => {
            let id = insert_on(&tx, &successor, &now)?;
            (get_on(&tx, &id)?, true)
        }
    };

    tx.commit()?;
    Ok(result)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Datelike;
    use crate::db::init_test_db;
    use crate::db::models::{BillStatus, RecurrenceType};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    pub(crate) fn new_bill(name: &str, due: NaiveDate, kind: RecurrenceType) -> NewBill {
        NewBill {
            user_id: "user-1".into(),
            bill_name: name.into(),
            payer_name: Some("Me".into()),
            destination_account: Some("Checking".into()),
            amount: 42.5,
            due_date: due,
            category: Some("utilities".into()),
            status: BillStatus::Active,
            recurrence_type: kind,
            recurrence_day: match kind {
                RecurrenceType::Monthly | RecurrenceType::Yearly => Some(due.day()),
                _ => None,
            },
            recurrence_month: match kind {
                RecurrenceType::Yearly => Some(due.month()),
                _ => None,
            },
            next_due_date: None,
            is_template: false,
            sync_to_google_calendar: false,
            google_calendar_event_id: None,
        }
    }

    #[test]
    fn test_crud_bills() {
        let pool = init_test_db().unwrap();

        // Create
        let bill = create(&pool, new_bill("Rent", date(2024, 3, 1), RecurrenceType::Monthly)).unwrap();
        assert_eq!(bill.bill_name, "Rent");
        assert_eq!(bill.recurrence_type, RecurrenceType::Monthly);
        assert_eq!(bill.recurrence_day, Some(1));
        assert_eq!(bill.due_date, date(2024, 3, 1));
        assert!(!bill.is_template);

        // Get by ID
        let fetched = get_by_id(&pool, &bill.id).unwrap();
        assert_eq!(fetched, bill);

        // List by user
        assert_eq!(get_by_user(&pool, "user-1").unwrap().len(), 1);

        // Update
        let updated = update(
            &pool,
            &bill.id,
            UpdateBillInput {
                amount: Some(99.0),
                category: Some(None),
                status: Some(BillStatus::Inactive),
                next_due_date: Some(Some(date(2024, 4, 1))),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(updated.amount, 99.0);
        assert_eq!(updated.category, None);
        assert_eq!(updated.status, BillStatus::Inactive);
        assert_eq!(updated.next_due_date, Some(date(2024, 4, 1)));
        assert_eq!(updated.payer_name, Some("Me".into()));

        // Delete
        assert!(delete(&pool, &bill.id).unwrap());
        assert!(!delete(&pool, &bill.id).unwrap());
        assert!(matches!(get_by_id(&pool, &bill.id), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_rejects_invalid_rows() {
        let pool = init_test_db().unwrap();
        let mut bill = new_bill("", date(2024, 3, 1), RecurrenceType::OneTime);
        assert!(matches!(create(&pool, bill.clone()), Err(AppError::Validation(_))));
        bill.bill_name = "Gym".into();
        bill.amount = -1.0;
        assert!(matches!(create(&pool, bill), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_latest_and_exists_ignore_templates() {
        let pool = init_test_db().unwrap();
        let mut template = new_bill("Internet", date(2030, 1, 5), RecurrenceType::Monthly);
        template.is_template = true;
        create(&pool, template).unwrap();

        assert!(find_latest_instance(&pool, "Internet", "user-1").unwrap().is_none());
        assert!(!exists_for_date(&pool, "Internet", "user-1", date(2030, 1, 5)).unwrap());

        create(&pool, new_bill("Internet", date(2024, 1, 5), RecurrenceType::Monthly)).unwrap();
        create(&pool, new_bill("Internet", date(2024, 3, 5), RecurrenceType::Monthly)).unwrap();
        create(&pool, new_bill("Internet", date(2024, 2, 5), RecurrenceType::Monthly)).unwrap();

        let latest = find_latest_instance(&pool, "Internet", "user-1").unwrap().unwrap();
        assert_eq!(latest.due_date, date(2024, 3, 5));
        assert!(exists_for_date(&pool, "Internet", "user-1", date(2024, 2, 5)).unwrap());
        assert!(!exists_for_date(&pool, "Internet", "user-2", date(2024, 2, 5)).unwrap());

        let templates = get_active_templates(&pool).unwrap();
        assert_eq!(templates.len(), 1);
        assert!(templates[0].is_template);
    }

    #[test]
    fn test_unique_instance_per_due_date() {
        let pool = init_test_db().unwrap();
        let bill = new_bill("Water", date(2024, 5, 10), RecurrenceType::Monthly);
        create(&pool, bill.clone()).unwrap();
        assert!(matches!(create(&pool, bill), Err(AppError::Database(_))));
    }

    #[test]
    fn test_create_many_is_all_or_nothing() {
        let pool = init_test_db().unwrap();
        let a = new_bill("Phone", date(2024, 6, 1), RecurrenceType::Monthly);
        let b = new_bill("Phone", date(2024, 7, 1), RecurrenceType::Monthly);

        let created = create_many(&pool, vec![a.clone(), b]).unwrap();
        assert_eq!(created.len(), 2);

        // Second batch collides on `a` and must leave nothing behind
        let c = new_bill("Phone", date(2024, 8, 1), RecurrenceType::Monthly);
        assert!(create_many(&pool, vec![c, a]).is_err());
        assert!(!exists_for_date(&pool, "Phone", "user-1", date(2024, 8, 1)).unwrap());
        assert!(create_many(&pool, Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn test_swap_for_successor() {
        let pool = init_test_db().unwrap();
        let old = create(&pool, new_bill("Rent", date(2024, 3, 15), RecurrenceType::Monthly)).unwrap();

        let (next, inserted) = swap_for_successor(
            &pool,
            &old.id,
            old.reschedule(date(2024, 4, 15), Some(date(2024, 5, 15))),
        )
        .unwrap();
        assert!(inserted);
        assert_eq!(next.due_date, date(2024, 4, 15));
        assert!(matches!(get_by_id(&pool, &old.id), Err(AppError::NotFound(_))));

        // Unknown id rolls back without inserting anything
        let err = swap_for_successor(&pool, "missing", next.reschedule(date(2024, 5, 15), None));
        assert!(matches!(err, Err(AppError::NotFound(_))));
        assert!(!exists_for_date(&pool, "Rent", "user-1", date(2024, 5, 15)).unwrap());
    }

    #[test]
    fn test_swap_reuses_existing_successor() {
        let pool = init_test_db().unwrap();
        let old = create(&pool, new_bill("Rent", date(2024, 3, 15), RecurrenceType::Monthly)).unwrap();
        let ahead = create(&pool, new_bill("Rent", date(2024, 4, 15), RecurrenceType::Monthly)).unwrap();

        let (next, inserted) =
            swap_for_successor(&pool, &old.id, old.reschedule(date(2024, 4, 15), None)).unwrap();
        assert!(!inserted);
        assert_eq!(next.id, ahead.id);
        assert_eq!(get_by_user(&pool, "user-1").unwrap().len(), 1);
    }

    #[test]
    fn test_set_calendar_event_id() {
        let pool = init_test_db().unwrap();
        let bill = create(&pool, new_bill("Gym", date(2024, 3, 1), RecurrenceType::OneTime)).unwrap();
        set_calendar_event_id(&pool, &bill.id, Some("evt-1")).unwrap();
        assert_eq!(
            get_by_id(&pool, &bill.id).unwrap().google_calendar_event_id,
            Some("evt-1".into())
        );
        set_calendar_event_id(&pool, &bill.id, None).unwrap();
        assert_eq!(get_by_id(&pool, &bill.id).unwrap().google_calendar_event_id, None);
        assert!(set_calendar_event_id(&pool, "missing", None).is_err());
    }
}
