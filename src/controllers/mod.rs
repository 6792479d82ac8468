// Client-side orchestration controllers

pub mod ingestion;
pub mod notify;
pub mod results;

pub use ingestion::{DataIngestionController, MappingField, MappingPhase};
pub use notify::{Notification, NotificationChannel, Severity};
pub use results::{ChatMessage, MessageRole, ResultsSessionController, SendOutcome, SessionPhase};
