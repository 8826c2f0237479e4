use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

// ============================================================================
// Reminders
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub remind_date: NaiveDate,
    pub remind_time: Option<NaiveTime>,
    pub sync_to_google_calendar: bool,
    pub google_calendar_event_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReminderInput {
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub remind_date: NaiveDate,
    pub remind_time: Option<NaiveTime>,
    pub sync_to_google_calendar: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateReminderInput {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub remind_date: Option<NaiveDate>,
    pub remind_time: Option<Option<NaiveTime>>,
    pub sync_to_google_calendar: Option<bool>,
}
