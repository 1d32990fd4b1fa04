pub mod reminder_service;

pub use reminder_service::{due_event, ReminderService, SweepReport};
