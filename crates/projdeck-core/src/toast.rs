// Transient toast queue for short success/failure feedback.
// Toasts stack; each one fades after its own dwell time and is dropped after
// its own lifetime, independent of the others.

use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::constants::{TOAST_DWELL, TOAST_LIFETIME};

#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub id: String,
    pub message: String,
    pub success: bool,
    /// False once the exit transition has started
    pub visible: bool,
    created_at: Instant,
}

impl Toast {
    fn new(message: String, success: bool, created_at: Instant) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            message,
            success,
            visible: true,
            created_at,
        }
    }

    pub fn icon(&self) -> &'static str {
        if self.success {
            "✓"
        } else {
            "✗"
        }
    }

    pub fn age_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }
}

#[derive(Debug)]
pub struct ToastQueue {
    toasts: Vec<Toast>,
    dwell: Duration,
    lifetime: Duration,
}

impl ToastQueue {
    pub fn new() -> Self {
        Self::with_timing(TOAST_DWELL, TOAST_LIFETIME)
    }

    pub fn with_timing(dwell: Duration, lifetime: Duration) -> Self {
        Self {
            toasts: Vec::new(),
            dwell,
            lifetime: lifetime.max(dwell),
        }
    }

    /// Append a visible toast; returns its id
    pub fn notify(&mut self, message: impl Into<String>, success: bool) -> String {
        self.notify_at(message, success, Instant::now())
    }

    pub fn notify_at(&mut self, message: impl Into<String>, success: bool, now: Instant) -> String {
        let toast = Toast::new(message.into(), success, now);
        let id = toast.id.clone();
        self.toasts.push(toast);
        id
    }

    pub fn success(&mut self, message: impl Into<String>) -> String {
        self.notify(message, true)
    }

    pub fn failure(&mut self, message: impl Into<String>) -> String {
        self.notify(message, false)
    }

    pub fn remove_notification(&mut self, id: &str) -> bool {
        let before = self.toasts.len();
        self.toasts.retain(|t| t.id != id);
        self.toasts.len() != before
    }

    /// Advance timers (call each frame/tick)
    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    pub fn tick_at(&mut self, now: Instant) {
        let lifetime = self.lifetime;
        let dwell = self.dwell;
        self.toasts.retain(|t| t.age_at(now) < lifetime);
        for toast in &mut self.toasts {
            if toast.visible && toast.age_at(now) >= dwell {
                toast.visible = false;
            }
        }
    }

    pub fn toasts(&self) -> &[Toast] {
        &self.toasts
    }

    pub fn get(&self, id: &str) -> Option<&Toast> {
        self.toasts.iter().find(|t| t.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.toasts.is_empty()
    }

    /// Drop every toast and its timer
    pub fn clear(&mut self) {
        self.toasts.clear();
    }
}

impl Default for ToastQueue {
    fn default() -> Self {
        Self::new()
    }
}
