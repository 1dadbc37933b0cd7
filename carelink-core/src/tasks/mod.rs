// carelink-core/src/tasks/mod.rs

pub mod calendar_sync;
pub mod reminder_scheduler;

pub use reminder_scheduler::ReminderScheduler;
