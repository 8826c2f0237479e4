pub mod commands;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod logging;

use std::sync::Arc;

use config::AppConfig;
use db::DbPool;
use engine::background::SchedulerState;
use engine::calendar::CalendarSync;
use engine::google_calendar::GoogleCalendarClient;
use engine::google_oauth::GoogleCredentials;
use engine::recurrence::DateRules;
use engine::store::SqliteBillStore;
use error::AppError;

/// Shared application state handed to every command and background job.
pub struct AppState {
    pub db: DbPool,
    pub store: SqliteBillStore,
    pub calendar: CalendarSync,
    pub config: AppConfig,
    pub scheduler: Arc<SchedulerState>,
}

impl AppState {
    pub fn new(db: DbPool, config: AppConfig, calendar: CalendarSync) -> Self {
        Self {
            store: SqliteBillStore::new(db.clone()),
            db,
            calendar,
            config,
            scheduler: Arc::new(SchedulerState::new()),
        }
    }

    /// Date rules under the configured day-overflow policy.
    pub fn rules(&self) -> DateRules {
        DateRules::new(self.config.recurrence.day_overflow)
    }
}

/// Build the calendar helper from config. Missing or broken calendar
/// settings disable sync rather than failing start-up.
pub fn build_calendar(config: &AppConfig) -> CalendarSync {
    let calendar = &config.calendar;
    if !calendar.is_configured() {
        tracing::info!("Google Calendar not configured; calendar sync disabled");
        return CalendarSync::disabled();
    }
    let calendar_id = calendar.calendar_id.as_deref().unwrap_or_default();
    let refresh_token = calendar.refresh_token.clone().unwrap_or_default();

    let client = GoogleCredentials::resolve(refresh_token).and_then(|credentials| {
        GoogleCalendarClient::new(calendar_id, calendar.time_zone.clone(), credentials)
    });
    match client {
        Ok(client) => {
            tracing::info!(calendar_id, "Google Calendar sync enabled");
            CalendarSync::new(Arc::new(client))
        }
        Err(e) => {
            tracing::warn!("Google Calendar sync disabled: {}", e);
            CalendarSync::disabled()
        }
    }
}

/// Open storage and assemble the application state.
pub fn bootstrap(config: AppConfig) -> Result<Arc<AppState>, AppError> {
    std::fs::create_dir_all(&config.data_dir)?;
    let pool = db::init_db(&config.data_dir)?;
    tracing::info!(data_dir = %config.data_dir.display(), "Database pool ready");

    let calendar = build_calendar(&config);
    Ok(Arc::new(AppState::new(pool, config, calendar)))
}
