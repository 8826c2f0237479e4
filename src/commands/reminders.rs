use crate::commands::{apply_link, Synced};
use crate::db::models::{CreateReminderInput, Reminder, UpdateReminderInput};
use crate::db::repos::reminders as repo;
use crate::error::AppError;
use crate::AppState;

pub fn list_reminders(state: &AppState, user_id: &str) -> Result<Vec<Reminder>, AppError> {
    repo::get_by_user(&state.db, user_id)
}

pub async fn create_reminder(
    state: &AppState,
    input: CreateReminderInput,
) -> Result<Synced<Reminder>, AppError> {
    let mut reminder = repo::create(&state.db, input)?;
    tracing::info!(reminder_id = %reminder.id, "Reminder created");

    let outcome = state
        .calendar
        .on_created(&reminder, |event_id| {
            repo::set_calendar_event_id(&state.db, &reminder.id, event_id)
        })
        .await;
    apply_link(&outcome, &mut reminder.google_calendar_event_id);

    Ok(Synced::new(reminder, outcome))
}

pub async fn update_reminder(
    state: &AppState,
    id: &str,
    input: UpdateReminderInput,
) -> Result<Synced<Reminder>, AppError> {
    let mut reminder = repo::update(&state.db, id, input)?;

    let outcome = state
        .calendar
        .on_updated(&reminder, |event_id| {
            repo::set_calendar_event_id(&state.db, &reminder.id, event_id)
        })
        .await;
    apply_link(&outcome, &mut reminder.google_calendar_event_id);

    Ok(Synced::new(reminder, outcome))
}

pub async fn delete_reminder(state: &AppState, id: &str) -> Result<Synced<bool>, AppError> {
    let reminder = repo::get_by_id(&state.db, id)?;
    let deleted = repo::delete(&state.db, id)?;
    tracing::info!(reminder_id = %id, "Reminder deleted");

    let outcome = state.calendar.on_deleted(&reminder).await;
    Ok(Synced::new(deleted, outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use chrono::{NaiveDate, NaiveTime};

    use crate::config::AppConfig;
    use crate::db::init_test_db;
    use crate::engine::calendar::tests::FakeCalendar;
    use crate::engine::calendar::{CalendarSync, SyncOutcome};

    fn input() -> CreateReminderInput {
        CreateReminderInput {
            user_id: "user-1".into(),
            title: "Renew insurance".into(),
            description: None,
            remind_date: NaiveDate::from_ymd_opt(2024, 9, 1).unwrap(),
            remind_time: None,
            sync_to_google_calendar: Some(true),
        }
    }

    #[tokio::test]
    async fn test_reminder_lifecycle_with_calendar() {
        let fake = Arc::new(FakeCalendar::default());
        let state = AppState::new(
            init_test_db().unwrap(),
            AppConfig::default(),
            CalendarSync::new(fake.clone()),
        );

        let created = create_reminder(&state, input()).await.unwrap();
        let event_id = created.record.google_calendar_event_id.clone().unwrap();
        assert_eq!(
            fake.events.lock().unwrap()[&event_id].time,
            NaiveTime::from_hms_opt(9, 0, 0).unwrap()
        );

        let updated = update_reminder(
            &state,
            &created.record.id,
            UpdateReminderInput {
                remind_time: Some(NaiveTime::from_hms_opt(17, 30, 0)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.sync.outcomes, vec![SyncOutcome::Updated { event_id: event_id.clone() }]);
        assert_eq!(
            fake.events.lock().unwrap()[&event_id].time,
            NaiveTime::from_hms_opt(17, 30, 0).unwrap()
        );

        let deleted = delete_reminder(&state, &created.record.id).await.unwrap();
        assert!(deleted.record);
        assert_eq!(fake.event_count(), 0);
        assert!(list_reminders(&state, "user-1").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_calendar_outage_keeps_reminder() {
        let fake = Arc::new(FakeCalendar::default());
        fake.fail_create.store(true, Ordering::Relaxed);
        let state = AppState::new(
            init_test_db().unwrap(),
            AppConfig::default(),
            CalendarSync::new(fake),
        );

        let created = create_reminder(&state, input()).await.unwrap();
        assert!(created.sync.has_warnings());
        assert_eq!(created.record.google_calendar_event_id, None);
        assert_eq!(list_reminders(&state, "user-1").unwrap().len(), 1);
    }
}
