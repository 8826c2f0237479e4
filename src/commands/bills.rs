use std::sync::Arc;

use chrono::NaiveDate;

use crate::commands::{apply_link, today, Synced};
use crate::db::models::{Bill, CreateBillInput, NewBill, RecurrenceType, UpdateBillInput};
use crate::db::repos::bills as repo;
use crate::engine::calendar::SyncOutcome;
use crate::engine::generator::{GenerationReport, RecurringBillGenerator};
use crate::engine::recurrence::RecurrenceRule;
use crate::engine::rollover::{PaymentRollover, RolloverResult};
use crate::error::AppError;
use crate::AppState;

pub fn list_bills(state: &AppState, user_id: &str) -> Result<Vec<Bill>, AppError> {
    repo::get_by_user(&state.db, user_id)
}

pub fn get_bill(state: &AppState, id: &str) -> Result<Bill, AppError> {
    repo::get_by_id(&state.db, id)
}

/// Create a bill or template. Recurring bills without a `due_date` start at
/// the first occurrence on or after today.
pub async fn create_bill(state: &AppState, input: CreateBillInput) -> Result<Synced<Bill>, AppError> {
    let kind = input.recurrence_type.unwrap_or(RecurrenceType::OneTime);
    let rule = RecurrenceRule::from_parts(kind, input.recurrence_day, input.recurrence_month)?;
    let rules = state.rules();

    let due_date = input
        .due_date
        .or_else(|| rules.initial_due_date(&rule, today()))
        .ok_or_else(|| {
            AppError::Validation(format!("due_date is required for {} bills", kind.as_str()))
        })?;

    let mut bill = repo::create(
        &state.db,
        NewBill {
            user_id: input.user_id,
            bill_name: input.bill_name,
            payer_name: input.payer_name,
            destination_account: input.destination_account,
            amount: input.amount,
            due_date,
            category: input.category,
            status: input.status.unwrap_or_default(),
            recurrence_type: kind,
            recurrence_day: input.recurrence_day,
            recurrence_month: input.recurrence_month,
            next_due_date: rules.next_due_date(due_date, &rule),
            is_template: input.is_template.unwrap_or(false),
            sync_to_google_calendar: input.sync_to_google_calendar.unwrap_or(false),
            google_calendar_event_id: None,
        },
    )?;
    tracing::info!(bill_id = %bill.id, bill = %bill.bill_name, template = bill.is_template, "Bill created");

    let outcome = state
        .calendar
        .on_created(&bill, |event_id| repo::set_calendar_event_id(&state.db, &bill.id, event_id))
        .await;
    apply_link(&outcome, &mut bill.google_calendar_event_id);

    Ok(Synced::new(bill, outcome))
}

/// Partial update. `next_due_date` is recomputed when the due date or the
/// rule changes, unless the caller sets it explicitly.
pub async fn update_bill(
    state: &AppState,
    id: &str,
    mut input: UpdateBillInput,
) -> Result<Synced<Bill>, AppError> {
    let existing = repo::get_by_id(&state.db, id)?;

    if input.changes_schedule() {
        let rule = RecurrenceRule::from_parts(
            input.recurrence_type.unwrap_or(existing.recurrence_type),
            input.recurrence_day.unwrap_or(existing.recurrence_day),
            input.recurrence_month.unwrap_or(existing.recurrence_month),
        )?;
        if input.next_due_date.is_none() {
            let due = input.due_date.unwrap_or(existing.due_date);
            input.next_due_date = Some(state.rules().next_due_date(due, &rule));
        }
    }

    let mut bill = repo::update(&state.db, id, input)?;
    tracing::debug!(bill_id = %bill.id, "Bill updated");

    let outcome = state
        .calendar
        .on_updated(&bill, |event_id| repo::set_calendar_event_id(&state.db, &bill.id, event_id))
        .await;
    apply_link(&outcome, &mut bill.google_calendar_event_id);

    Ok(Synced::new(bill, outcome))
}

pub async fn delete_bill(state: &AppState, id: &str) -> Result<Synced<bool>, AppError> {
    let bill = repo::get_by_id(&state.db, id)?;
    let deleted = repo::delete(&state.db, id)?;
    tracing::info!(bill_id = %id, "Bill deleted");

    let outcome = state.calendar.on_deleted(&bill).await;
    Ok(Synced::new(deleted, outcome))
}

pub async fn mark_paid(state: &AppState, id: &str) -> Result<RolloverResult, AppError> {
    PaymentRollover::new(&state.store, &state.calendar, state.rules())
        .mark_paid_by_id(id)
        .await
}

/// Materialize upcoming instances for every active template, then put the
/// sync-enabled ones on the calendar. `now` defaults to today's local date.
///
/// The database pass runs on the blocking pool; calendar failures land in
/// `report.sync` and never undo generated rows.
pub async fn run_generation(
    state: &Arc<AppState>,
    now: Option<NaiveDate>,
) -> Result<GenerationReport, AppError> {
    let worker = Arc::clone(state);
    let mut report = tokio::task::spawn_blocking(move || generate_instances(&worker, now))
        .await
        .map_err(|e| AppError::Internal(format!("generation task failed: {e}")))??;

    link_generated(state, &mut report).await;
    Ok(report)
}

/// The database half of [`run_generation`]. Holds the generation slot for
/// its duration and fails with `Busy` when another pass has it.
pub fn generate_instances(state: &AppState, now: Option<NaiveDate>) -> Result<GenerationReport, AppError> {
    let Some(_guard) = state.scheduler.try_begin_generation() else {
        return Err(AppError::Busy("bill generation is already running".into()));
    };

    let now = now.unwrap_or_else(today);
    let horizon = state.config.generation.horizon_days;
    let report = RecurringBillGenerator::new(&state.store, state.rules()).generate_all(horizon, now)?;
    state.scheduler.record_run(&report);

    tracing::info!(
        now = %now,
        horizon_days = horizon,
        generated = report.generated_count,
        failed = report.failed_count(),
        "Bill generation finished"
    );
    Ok(report)
}

/// Create calendar events for freshly generated instances whose template
/// asked for sync.
async fn link_generated(state: &AppState, report: &mut GenerationReport) {
    let mut created = std::mem::take(&mut report.created);
    for bill in created.iter_mut() {
        let outcome = state
            .calendar
            .on_created(&*bill, |event_id| {
                repo::set_calendar_event_id(&state.db, &bill.id, event_id)
            })
            .await;
        apply_link(&outcome, &mut bill.google_calendar_event_id);
        if outcome != SyncOutcome::Disabled {
            report.sync.push(outcome);
        }
    }
    report.created = created;
}
