//! Calendar port and the best-effort sync helper built on it.
//!
//! Calendar calls always run after the database write they mirror has
//! committed. Their result is a [`SyncOutcome`] value, never an `Err`, so a
//! calendar outage can only ever produce warnings.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;

use crate::db::models::{Bill, Reminder};
use crate::error::AppError;

pub const DEFAULT_EVENT_DURATION_MINUTES: u32 = 30;

fn default_event_time() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventSpec {
    pub title: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub duration_minutes: u32,
}

impl EventSpec {
    pub fn for_bill(bill: &Bill) -> Self {
        let mut lines = vec![format!("Amount: {:.2}", bill.amount)];
        if let Some(ref payer) = bill.payer_name {
            lines.push(format!("Payer: {payer}"));
        }
        if let Some(ref account) = bill.destination_account {
            lines.push(format!("Pay to: {account}"));
        }
        if let Some(ref category) = bill.category {
            lines.push(format!("Category: {category}"));
        }
        Self {
            title: format!("Bill due: {}", bill.bill_name),
            description: Some(lines.join("\n")),
            date: bill.due_date,
            time: default_event_time(),
            duration_minutes: DEFAULT_EVENT_DURATION_MINUTES,
        }
    }

    pub fn for_reminder(reminder: &Reminder) -> Self {
        Self {
            title: reminder.title.clone(),
            description: reminder.description.clone(),
            date: reminder.remind_date,
            time: reminder.remind_time.unwrap_or_else(default_event_time),
            duration_minutes: DEFAULT_EVENT_DURATION_MINUTES,
        }
    }
}

/// External calendar collaborator. Authentication lives inside the
/// implementation; callers only observe success or failure.
#[async_trait::async_trait]
pub trait CalendarSyncAdapter: Send + Sync {
    async fn create_event(&self, spec: &EventSpec) -> Result<String, AppError>;

    async fn update_event(&self, event_id: &str, spec: &EventSpec) -> Result<(), AppError>;

    /// Deleting an event that no longer exists is not an error.
    async fn delete_event(&self, event_id: &str) -> Result<(), AppError>;
}

/// A row that can be mirrored as a calendar event.
pub trait CalendarRecord {
    fn record_id(&self) -> &str;
    fn sync_enabled(&self) -> bool;
    fn event_id(&self) -> Option<&str>;
    fn event_spec(&self) -> EventSpec;
}

impl CalendarRecord for Bill {
    fn record_id(&self) -> &str {
        &self.id
    }

    /// Templates are definitions, not payable dates; only instances sync.
    fn sync_enabled(&self) -> bool {
        self.sync_to_google_calendar && !self.is_template
    }

    fn event_id(&self) -> Option<&str> {
        self.google_calendar_event_id.as_deref()
    }

    fn event_spec(&self) -> EventSpec {
        EventSpec::for_bill(self)
    }
}

impl CalendarRecord for Reminder {
    fn record_id(&self) -> &str {
        &self.id
    }

    fn sync_enabled(&self) -> bool {
        self.sync_to_google_calendar
    }

    fn event_id(&self) -> Option<&str> {
        self.google_calendar_event_id.as_deref()
    }

    fn event_spec(&self) -> EventSpec {
        EventSpec::for_reminder(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    Create,
    Update,
    Delete,
    Link,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Sync is off for the record, or no calendar is configured.
    Disabled,
    /// Nothing to do.
    Unchanged,
    Created { event_id: String },
    Updated { event_id: String },
    Deleted { event_id: String },
    Failed { action: SyncAction, message: String },
}

impl SyncOutcome {
    fn failed(action: SyncAction, e: &AppError) -> Self {
        SyncOutcome::Failed {
            action,
            message: e.to_string(),
        }
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, SyncOutcome::Failed { .. })
    }
}

/// Every calendar step taken on behalf of one operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub outcomes: Vec<SyncOutcome>,
}

impl SyncReport {
    pub fn push(&mut self, outcome: SyncOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn has_warnings(&self) -> bool {
        self.outcomes.iter().any(SyncOutcome::is_warning)
    }

    pub fn warnings(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                SyncOutcome::Failed { action, message } => {
                    Some(format!("calendar {action:?} failed: {message}"))
                }
                _ => None,
            })
            .collect()
    }
}

impl From<SyncOutcome> for SyncReport {
    fn from(outcome: SyncOutcome) -> Self {
        Self {
            outcomes: vec![outcome],
        }
    }
}

/// Applies record lifecycle changes to the calendar.
///
/// `save` callbacks persist the event id on the record; a failure to save
/// is reported as a `Link` warning and the just-created event is deleted.
#[derive(Clone, Default)]
pub struct CalendarSync {
    adapter: Option<Arc<dyn CalendarSyncAdapter>>,
}

impl CalendarSync {
    pub fn new(adapter: Arc<dyn CalendarSyncAdapter>) -> Self {
        Self {
            adapter: Some(adapter),
        }
    }

    /// A helper with no calendar behind it; every call is `Disabled`.
    pub fn disabled() -> Self {
        Self { adapter: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.adapter.is_some()
    }

    pub async fn on_created<R, F>(&self, record: &R, save: F) -> SyncOutcome
    where
        R: CalendarRecord + Sync,
        F: FnOnce(Option<&str>) -> Result<(), AppError> + Send,
    {
        let Some(adapter) = self.adapter_for(record) else {
            return SyncOutcome::Disabled;
        };
        if record.event_id().is_some() {
            return SyncOutcome::Unchanged;
        }
        create_and_link(adapter.as_ref(), record, save).await
    }

    pub async fn on_updated<R, F>(&self, record: &R, save: F) -> SyncOutcome
    where
        R: CalendarRecord + Sync,
        F: FnOnce(Option<&str>) -> Result<(), AppError> + Send,
    {
        let Some(adapter) = self.adapter.as_ref() else {
            return SyncOutcome::Disabled;
        };

        match (record.sync_enabled(), record.event_id()) {
            (true, Some(event_id)) => {
                match adapter.update_event(event_id, &record.event_spec()).await {
                    Ok(()) => SyncOutcome::Updated {
                        event_id: event_id.to_string(),
                    },
                    Err(e) => {
                        warn_failed(record, SyncAction::Update, &e);
                        SyncOutcome::failed(SyncAction::Update, &e)
                    }
                }
            }
            (true, None) => create_and_link(adapter.as_ref(), record, save).await,
            (false, Some(event_id)) => {
                if let Err(e) = adapter.delete_event(event_id).await {
                    warn_failed(record, SyncAction::Delete, &e);
                    return SyncOutcome::failed(SyncAction::Delete, &e);
                }
                if let Err(e) = save(None) {
                    warn_failed(record, SyncAction::Link, &e);
                    return SyncOutcome::failed(SyncAction::Link, &e);
                }
                SyncOutcome::Deleted {
                    event_id: event_id.to_string(),
                }
            }
            (false, None) => SyncOutcome::Disabled,
        }
    }

    /// Delete the linked event, if any. Runs regardless of the sync flag so
    /// that disabling sync never strands an event.
    pub async fn on_deleted<R>(&self, record: &R) -> SyncOutcome
    where
        R: CalendarRecord + Sync,
    {
        let Some(adapter) = self.adapter.as_ref() else {
            return SyncOutcome::Disabled;
        };
        let Some(event_id) = record.event_id() else {
            return SyncOutcome::Unchanged;
        };
        match adapter.delete_event(event_id).await {
            Ok(()) => SyncOutcome::Deleted {
                event_id: event_id.to_string(),
            },
            Err(e) => {
                warn_failed(record, SyncAction::Delete, &e);
                SyncOutcome::failed(SyncAction::Delete, &e)
            }
        }
    }

    fn adapter_for<R: CalendarRecord>(&self, record: &R) -> Option<&Arc<dyn CalendarSyncAdapter>> {
        if !record.sync_enabled() {
            return None;
        }
        if self.adapter.is_none() {
            tracing::debug!(
                record_id = record.record_id(),
                "Calendar sync requested but no calendar is configured"
            );
        }
        self.adapter.as_ref()
    }
}

async fn create_and_link<R, F>(adapter: &dyn CalendarSyncAdapter, record: &R, save: F) -> SyncOutcome
where
    R: CalendarRecord + Sync,
    F: FnOnce(Option<&str>) -> Result<(), AppError> + Send,
{
    let event_id = match adapter.create_event(&record.event_spec()).await {
        Ok(id) => id,
        Err(e) => {
            warn_failed(record, SyncAction::Create, &e);
            return SyncOutcome::failed(SyncAction::Create, &e);
        }
    };
    if let Err(e) = save(Some(&event_id)) {
        warn_failed(record, SyncAction::Link, &e);
        // Nothing points at the event now; take it back off the calendar.
        if let Err(cleanup) = adapter.delete_event(&event_id).await {
            tracing::warn!(
                record_id = record.record_id(),
                event_id = %event_id,
                "Failed to remove unlinked calendar event: {}",
                cleanup
            );
        }
        return SyncOutcome::failed(SyncAction::Link, &e);
    }
    tracing::debug!(record_id = record.record_id(), event_id = %event_id, "Calendar event created");
    SyncOutcome::Created { event_id }
}

fn warn_failed<R: CalendarRecord>(record: &R, action: SyncAction, e: &AppError) {
    tracing::warn!(
        record_id = record.record_id(),
        action = ?action,
        "Calendar sync failed: {}",
        e
    );
}
