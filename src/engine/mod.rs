pub mod background;
pub mod calendar;
pub mod generator;
pub mod google_calendar;
pub mod google_oauth;
pub mod recurrence;
pub mod rollover;
pub mod store;
pub mod subscription;
