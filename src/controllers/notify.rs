//! Transient user-facing status messages.
//!
//! A single most-recent-wins slot shared by the controllers and read by the
//! view layer. Emitting while a notification is visible replaces it; there is
//! no queue. Expiry happens at read time.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Error,
    Info,
    Warning,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub message: String,
    pub severity: Severity,
    expires_at: Instant,
}

#[derive(Clone)]
pub struct NotificationChannel {
    slot: Arc<Mutex<Option<Notification>>>,
    ttl: Duration,
}

impl NotificationChannel {
    pub fn new(ttl: Duration) -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
            ttl,
        }
    }

    pub fn emit(&self, severity: Severity, message: impl Into<String>) {
        self.emit_at(severity, message, Instant::now());
    }

    fn emit_at(&self, severity: Severity, message: impl Into<String>, now: Instant) {
        let notification = Notification {
            message: message.into(),
            severity,
            expires_at: now + self.ttl,
        };
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(notification);
        }
    }

    pub fn success(&self, message: impl Into<String>) {
        self.emit(Severity::Success, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(Severity::Error, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(Severity::Info, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.emit(Severity::Warning, message);
    }

    /// The notification to display right now, if one is still live.
    pub fn current(&self) -> Option<Notification> {
        self.current_at(Instant::now())
    }

    fn current_at(&self, now: Instant) -> Option<Notification> {
        let mut slot = self.slot.lock().ok()?;
        match &*slot {
            Some(n) if n.expires_at > now => Some(n.clone()),
            Some(_) => {
                *slot = None;
                None
            }
            None => None,
        }
    }

    pub fn dismiss(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
    }
}
