//! "Mark as paid": retire an instance and, for recurring bills, put its
//! successor in place.
//!
//! The store swap commits before any calendar call is made. Calendar
//! results ride along in [`RolloverResult::sync`] and never turn a
//! committed rollover into an error.

use serde::Serialize;

use crate::db::models::Bill;
use crate::engine::calendar::{CalendarRecord, CalendarSync, SyncOutcome, SyncReport};
use crate::engine::recurrence::{DateRules, RecurrenceRule};
use crate::engine::store::BillStore;
use crate::error::AppError;

#[derive(Debug, Clone, Serialize)]
pub struct RolloverResult {
    pub deleted: bool,
    pub next_instance: Option<Bill>,
    pub sync: SyncReport,
}

pub struct PaymentRollover<'a> {
    store: &'a dyn BillStore,
    calendar: &'a CalendarSync,
    rules: DateRules,
}

impl<'a> PaymentRollover<'a> {
    pub fn new(store: &'a dyn BillStore, calendar: &'a CalendarSync, rules: DateRules) -> Self {
        Self {
            store,
            calendar,
            rules,
        }
    }

    pub async fn mark_paid_by_id(&self, id: &str) -> Result<RolloverResult, AppError> {
        let instance = self.store.get(id)?;
        self.mark_paid(&instance).await
    }

    pub async fn mark_paid(&self, instance: &Bill) -> Result<RolloverResult, AppError> {
        if instance.is_template {
            return Err(AppError::Validation(format!(
                "'{}' is a template; templates are never paid",
                instance.bill_name
            )));
        }

        let rule = instance.rule()?;
        match rule {
            RecurrenceRule::OneTime => self.retire(instance).await,
            RecurrenceRule::Monthly { .. }
            | RecurrenceRule::Yearly { .. }
            | RecurrenceRule::Custom => self.roll_forward(instance, &rule).await,
        }
    }

    async fn retire(&self, instance: &Bill) -> Result<RolloverResult, AppError> {
        if !self.store.delete(&instance.id)? {
            return Err(AppError::NotFound(format!("Bill {}", instance.id)));
        }
        tracing::info!(bill_id = %instance.id, bill = %instance.bill_name, "One-time bill paid");

        let mut sync = SyncReport::default();
        if instance.event_id().is_some() {
            sync.push(self.calendar.on_deleted(instance).await);
        }

        Ok(RolloverResult {
            deleted: true,
            next_instance: None,
            sync,
        })
    }

    async fn roll_forward(
        &self,
        instance: &Bill,
        rule: &RecurrenceRule,
    ) -> Result<RolloverResult, AppError> {
        let next_due = self
            .rules
            .next_due_date(instance.due_date, rule)
            .ok_or_else(|| {
                AppError::InvalidRecurrence(format!(
                    "'{}' has a {} rule with no computable next due date",
                    instance.bill_name,
                    rule.kind().as_str()
                ))
            })?;

        let successor = instance.reschedule(next_due, self.rules.next_due_date(next_due, rule));
        let (mut next, inserted) = self.store.replace(&instance.id, successor)?;
        tracing::info!(
            bill_id = %instance.id,
            next_id = %next.id,
            next_due = %next.due_date,
            reused = !inserted,
            "Recurring bill rolled over"
        );

        let mut sync = SyncReport::default();
        if instance.event_id().is_some() {
            sync.push(self.calendar.on_deleted(instance).await);
        }
        if next.sync_enabled() && next.event_id().is_none() {
            let store = self.store;
            let next_id = next.id.clone();
            let outcome = self
                .calendar
                .on_created(&next, |event_id| store.set_calendar_event_id(&next_id, event_id))
                .await;
            if let SyncOutcome::Created { ref event_id } = outcome {
                next.google_calendar_event_id = Some(event_id.clone());
            }
            sync.push(outcome);
        }

        Ok(RolloverResult {
            deleted: true,
            next_instance: Some(next),
            sync,
        })
    }
}
