use std::time::{Duration, Instant};

use rand::RngCore;

pub const MAX_TOASTS: usize = 3;
pub const TOAST_LIFETIME: Duration = Duration::from_millis(3200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub id: String,
    pub title: String,
    pub message: String,
    pub kind: ToastKind,
}

impl Toast {
    pub fn new(title: &str, message: &str, kind: ToastKind) -> Self {
        Self {
            id: new_toast_id(),
            title: title.to_string(),
            message: message.to_string(),
            kind,
        }
    }

    pub fn success(title: &str, message: &str) -> Self {
        Self::new(title, message, ToastKind::Success)
    }

    pub fn error(title: &str, message: &str) -> Self {
        Self::new(title, message, ToastKind::Error)
    }
}

fn new_toast_id() -> String {
    format!("{:016x}", rand::thread_rng().next_u64())
}

/// Newest-first stack of notifications, each with its own deadline.
#[derive(Debug, Default)]
pub struct ToastQueue {
    entries: Vec<(Toast, Instant)>,
}

impl ToastQueue {
    pub fn push(&mut self, toast: Toast, now: Instant) {
        self.entries.insert(0, (toast, now + TOAST_LIFETIME));
        self.entries.truncate(MAX_TOASTS);
    }

    pub fn remove(&mut self, id: &str) {
        self.entries.retain(|(t, _)| t.id != id);
    }

    /// Drops every toast whose display window has closed.
    pub fn expire(&mut self, now: Instant) {
        self.entries.retain(|(_, deadline)| *deadline > now);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Toast> {
        self.entries.iter().map(|(t, _)| t)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
