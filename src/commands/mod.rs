//! User-facing operations. Each one commits its database change first and
//! then mirrors it to the calendar, best-effort.

pub mod bills;
pub mod reminders;

use chrono::NaiveDate;
use serde::Serialize;

use crate::engine::calendar::{SyncOutcome, SyncReport};

/// A committed result plus whatever the calendar made of it.
#[derive(Debug, Clone, Serialize)]
pub struct Synced<T> {
    pub record: T,
    pub sync: SyncReport,
}

impl<T> Synced<T> {
    pub fn new(record: T, outcome: SyncOutcome) -> Self {
        Self {
            record,
            sync: outcome.into(),
        }
    }
}

/// Mirror a link change the sync helper already persisted onto the
/// in-memory copy of the record.
pub(crate) fn apply_link(outcome: &SyncOutcome, event_id: &mut Option<String>) {
    match outcome {
        SyncOutcome::Created { event_id: id } => *event_id = Some(id.clone()),
        SyncOutcome::Deleted { .. } => *event_id = None,
        _ => {}
    }
}

pub(crate) fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}
