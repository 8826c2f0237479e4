//! Storage seam used by the generator and rollover.
//!
//! The engine never talks to `rusqlite` directly. [`SqliteBillStore`] is the
//! production implementation; tests substitute their own to inject failures.

use chrono::NaiveDate;

use crate::db::models::{Bill, NewBill};
use crate::db::repos::bills as bill_repo;
use crate::db::DbPool;
use crate::error::AppError;

pub trait BillStore: Send + Sync {
    fn get(&self, id: &str) -> Result<Bill, AppError>;

    fn insert(&self, bill: NewBill) -> Result<Bill, AppError>;

    /// All-or-nothing bulk insert.
    fn insert_many(&self, bills: Vec<NewBill>) -> Result<Vec<Bill>, AppError>;

    /// Most recently due non-template row for `(name, user_id)`.
    fn find_latest_by_name(&self, name: &str, user_id: &str) -> Result<Option<Bill>, AppError>;

    fn exists_for_date(&self, name: &str, user_id: &str, date: NaiveDate)
        -> Result<bool, AppError>;

    fn delete(&self, id: &str) -> Result<bool, AppError>;

    /// Atomically delete `old_id` and insert `successor`. Returns the
    /// successor row and whether it was newly inserted (an identical
    /// instance may already exist).
    fn replace(&self, old_id: &str, successor: NewBill) -> Result<(Bill, bool), AppError>;

    fn set_calendar_event_id(&self, id: &str, event_id: Option<&str>) -> Result<(), AppError>;

    fn active_templates(&self) -> Result<Vec<Bill>, AppError>;
}

#[derive(Clone)]
pub struct SqliteBillStore {
    pool: DbPool,
}

impl SqliteBillStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

impl BillStore for SqliteBillStore {
    fn get(&self, id: &str) -> Result<Bill, AppError> {
        bill_repo::get_by_id(&self.pool, id)
    }

    fn insert(&self, bill: NewBill) -> Result<Bill, AppError> {
        bill_repo::create(&self.pool, bill)
    }

    fn insert_many(&self, bills: Vec<NewBill>) -> Result<Vec<Bill>, AppError> {
        bill_repo::create_many(&self.pool, bills)
    }

    fn find_latest_by_name(&self, name: &str, user_id: &str) -> Result<Option<Bill>, AppError> {
        bill_repo::find_latest_instance(&self.pool, name, user_id)
    }

    fn exists_for_date(
        &self,
        name: &str,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<bool, AppError> {
        bill_repo::exists_for_date(&self.pool, name, user_id, date)
    }

    fn delete(&self, id: &str) -> Result<bool, AppError> {
        bill_repo::delete(&self.pool, id)
    }

    fn replace(&self, old_id: &str, successor: NewBill) -> Result<(Bill, bool), AppError> {
        bill_repo::swap_for_successor(&self.pool, old_id, successor)
    }

    fn set_calendar_event_id(&self, id: &str, event_id: Option<&str>) -> Result<(), AppError> {
        bill_repo::set_calendar_event_id(&self.pool, id, event_id)
    }

    fn active_templates(&self) -> Result<Vec<Bill>, AppError> {
        bill_repo::get_active_templates(&self.pool)
    }
}
