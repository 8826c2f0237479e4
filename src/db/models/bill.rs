use chrono::NaiveDate;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::engine::recurrence::RecurrenceRule;
use crate::error::AppError;

// ============================================================================
// Enums persisted as TEXT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceType {
    OneTime,
    Monthly,
    Yearly,
    Custom,
}

impl RecurrenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecurrenceType::OneTime => "one_time",
            RecurrenceType::Monthly => "monthly",
            RecurrenceType::Yearly => "yearly",
            RecurrenceType::Custom => "custom",
        }
    }
}

impl std::str::FromStr for RecurrenceType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "one_time" => Ok(RecurrenceType::OneTime),
            "monthly" => Ok(RecurrenceType::Monthly),
            "yearly" => Ok(RecurrenceType::Yearly),
            "custom" => Ok(RecurrenceType::Custom),
            other => Err(AppError::RuleValidation(format!(
                "Unknown recurrence_type '{other}'. Must be one of: one_time, monthly, yearly, custom"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillStatus {
    #[default]
    Active,
    Inactive,
}

impl BillStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillStatus::Active => "active",
            BillStatus::Inactive => "inactive",
        }
    }
}

impl std::str::FromStr for BillStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(BillStatus::Active),
            "inactive" => Ok(BillStatus::Inactive),
            other => Err(AppError::Validation(format!(
                "Invalid status '{other}'. Must be one of: active, inactive"
            ))),
        }
    }
}

macro_rules! text_enum_sql {
    ($ty:ty) => {
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: AppError| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

text_enum_sql!(RecurrenceType);
text_enum_sql!(BillStatus);

// ============================================================================
// Bills
// ============================================================================

/// A persisted bill row. Templates (`is_template = true`) seed future
/// instances and are never paid; instances are concrete, payable occurrences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    pub id: String,
    pub user_id: String,
    pub bill_name: String,
    pub payer_name: Option<String>,
    pub destination_account: Option<String>,
    pub amount: f64,
    pub due_date: NaiveDate,
    pub category: Option<String>,
    pub status: BillStatus,
    pub recurrence_type: RecurrenceType,
    pub recurrence_day: Option<u32>,
    pub recurrence_month: Option<u32>,
    pub next_due_date: Option<NaiveDate>,
    pub is_template: bool,
    pub sync_to_google_calendar: bool,
    pub google_calendar_event_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A fully-specified row ready for insertion. Produced by the generator,
/// by rollover and by `create_bill`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBill {
    pub user_id: String,
    pub bill_name: String,
    pub payer_name: Option<String>,
    pub destination_account: Option<String>,
    pub amount: f64,
    pub due_date: NaiveDate,
    pub category: Option<String>,
    pub status: BillStatus,
    pub recurrence_type: RecurrenceType,
    pub recurrence_day: Option<u32>,
    pub recurrence_month: Option<u32>,
    pub next_due_date: Option<NaiveDate>,
    pub is_template: bool,
    pub sync_to_google_calendar: bool,
    pub google_calendar_event_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBillInput {
    pub user_id: String,
    pub bill_name: String,
    pub payer_name: Option<String>,
    pub destination_account: Option<String>,
    pub amount: f64,
    /// Required for one-time bills. Recurring bills default to the first
    /// occurrence on or after today.
    pub due_date: Option<NaiveDate>,
    pub category: Option<String>,
    pub status: Option<BillStatus>,
    pub recurrence_type: Option<RecurrenceType>,
    pub recurrence_day: Option<u32>,
    pub recurrence_month: Option<u32>,
    pub is_template: Option<bool>,
    pub sync_to_google_calendar: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateBillInput {
    pub bill_name: Option<String>,
    pub payer_name: Option<Option<String>>,
    pub destination_account: Option<Option<String>>,
    pub amount: Option<f64>,
    pub due_date: Option<NaiveDate>,
    pub category: Option<Option<String>>,
    pub status: Option<BillStatus>,
    pub recurrence_type: Option<RecurrenceType>,
    pub recurrence_day: Option<Option<u32>>,
    pub recurrence_month: Option<Option<u32>>,
    pub next_due_date: Option<Option<NaiveDate>>,
    pub sync_to_google_calendar: Option<bool>,
}

impl UpdateBillInput {
    /// Whether the update touches anything that feeds `next_due_date`.
    pub fn changes_schedule(&self) -> bool {
        self.due_date.is_some()
            || self.recurrence_type.is_some()
            || self.recurrence_day.is_some()
            || self.recurrence_month.is_some()
    }
}

impl Bill {
    /// Parse the persisted recurrence triple into a validated rule.
    pub fn rule(&self) -> Result<RecurrenceRule, AppError> {
        RecurrenceRule::from_parts(
            self.recurrence_type,
            self.recurrence_day,
            self.recurrence_month,
        )
    }

    pub fn is_active_template(&self) -> bool {
        self.is_template && self.status == BillStatus::Active
    }

    /// Clone every field into an insertable row with a new schedule.
    /// The calendar link is not carried over: the event belongs to `self`.
    pub fn reschedule(&self, due_date: NaiveDate, next_due_date: Option<NaiveDate>) -> NewBill {
        NewBill {
            user_id: self.user_id.clone(),
            bill_name: self.bill_name.clone(),
            payer_name: self.payer_name.clone(),
            destination_account: self.destination_account.clone(),
            amount: self.amount,
            due_date,
            category: self.category.clone(),
            status: self.status,
            recurrence_type: self.recurrence_type,
            recurrence_day: self.recurrence_day,
            recurrence_month: self.recurrence_month,
            next_due_date,
            is_template: self.is_template,
            sync_to_google_calendar: self.sync_to_google_calendar,
            google_calendar_event_id: None,
        }
    }

    /// Stage a concrete, active instance of this template.
    pub fn instantiate(&self, due_date: NaiveDate, next_due_date: Option<NaiveDate>) -> NewBill {
        NewBill {
            is_template: false,
            status: BillStatus::Active,
            ..self.reschedule(due_date, next_due_date)
        }
    }
}
