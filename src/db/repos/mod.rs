pub mod bills;
pub mod reminders;
