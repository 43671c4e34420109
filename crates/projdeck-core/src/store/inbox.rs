use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::watch;

use crate::api::NotificationApi;
use crate::error::CoreResult;
use crate::models::Notification;

pub type NotificationList = Arc<Vec<Notification>>;

/// Canonical list of notifications for the session, newest first.
///
/// Each mutation derives a new list from the latest snapshot inside the
/// watch channel's lock, so concurrent ingestion and backend reconciliation
/// never overwrite each other. Backend-confirmed mutations are applied
/// optimistically and reverted entry-by-entry when the backend refuses.
pub struct NotificationInbox {
    api: Arc<dyn NotificationApi>,
    items_tx: watch::Sender<NotificationList>,
    error: RwLock<Option<String>>,
}

impl NotificationInbox {
    pub fn new(api: Arc<dyn NotificationApi>) -> Self {
        let (items_tx, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            api,
            items_tx,
            error: RwLock::new(None),
        }
    }

    // ===== Getters =====

    pub fn notifications(&self) -> NotificationList {
        self.items_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<NotificationList> {
        self.items_tx.subscribe()
    }

    pub fn get(&self, id: i64) -> Option<Notification> {
        self.items_tx.borrow().iter().find(|n| n.id == id).cloned()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.items_tx.borrow().iter().any(|n| n.id == id)
    }

    pub fn unread_count(&self) -> usize {
        self.items_tx.borrow().iter().filter(|n| !n.read).count()
    }

    pub fn len(&self) -> usize {
        self.items_tx.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items_tx.borrow().is_empty()
    }

    pub fn error(&self) -> Option<String> {
        self.error.read().clone()
    }

    // ===== Mutations =====

    pub fn set_error(&self, message: impl Into<String>) {
        *self.error.write() = Some(message.into());
    }

    pub fn clear_error(&self) {
        *self.error.write() = None;
    }

    pub fn clear(&self) {
        self.update(|items| (!items.is_empty()).then(Vec::new));
        self.clear_error();
    }

    /// Prepend `notification` unless its id is already present
    pub fn add_notification(&self, notification: Notification) -> bool {
        self.update(|items| {
            if items.iter().any(|n| n.id == notification.id) {
                return None;
            }
            let mut next = Vec::with_capacity(items.len() + 1);
            next.push(notification);
            next.extend(items.iter().cloned());
            Some(next)
        })
    }

    /// Flip `id` to read and confirm with the backend. No-op when absent.
    pub async fn mark_as_read(&self, id: i64) -> CoreResult<()> {
        let mut previous = None;
        self.update(|items| {
            let entry = items.iter().find(|n| n.id == id)?;
            previous = Some(entry.read);
            Some(with_read_flag(items, |n| n.id == id, true))
        });
        let Some(was_read) = previous else {
            tracing::debug!("mark_as_read: notification {} not found", id);
            return Ok(());
        };

        if let Err(e) = self.api.mark_read(id).await {
            tracing::warn!("Failed to mark notification {} as read: {}", id, e);
            if !was_read {
                self.update(|items| {
                    items
                        .iter()
                        .any(|n| n.id == id && n.read)
                        .then(|| with_read_flag(items, |n| n.id == id, false))
                });
            }
            self.set_error(e.to_string());
            return Err(e);
        }
        Ok(())
    }

    /// Remove `id` and confirm with the backend; restored in place on failure
    pub async fn delete_notification(&self, id: i64) -> CoreResult<()> {
        let mut removed = None;
        self.update(|items| {
            let index = items.iter().position(|n| n.id == id)?;
            removed = Some((index, items[index].clone()));
            let mut next = items.to_vec();
            next.remove(index);
            Some(next)
        });

        if let Err(e) = self.api.delete(id).await {
            tracing::warn!("Failed to delete notification {}: {}", id, e);
            if let Some((index, entry)) = removed {
                self.update(|items| {
                    if items.iter().any(|n| n.id == entry.id) {
                        return None;
                    }
                    let mut next = items.to_vec();
                    next.insert(index.min(next.len()), entry);
                    Some(next)
                });
            }
            self.set_error(e.to_string());
            return Err(e);
        }

        // the same id may have been ingested again while the request was pending
        self.update(|items| {
            items
                .iter()
                .any(|n| n.id == id)
                .then(|| items.iter().filter(|n| n.id != id).cloned().collect())
        });
        Ok(())
    }

    /// Flip every entry to read and confirm with one bulk request
    pub async fn mark_all_as_read(&self) -> CoreResult<()> {
        let mut flipped: HashSet<i64> = HashSet::new();
        self.update(|items| {
            flipped = items.iter().filter(|n| !n.read).map(|n| n.id).collect();
            (!flipped.is_empty()).then(|| with_read_flag(items, |_| true, true))
        });

        if let Err(e) = self.api.mark_all_read().await {
            tracing::warn!("Failed to mark all notifications as read: {}", e);
            self.update(|items| {
                items
                    .iter()
                    .any(|n| n.read && flipped.contains(&n.id))
                    .then(|| with_read_flag(items, |n| flipped.contains(&n.id), false))
            });
            self.set_error(e.to_string());
            return Err(e);
        }
        Ok(())
    }

    /// Replace the snapshot with `f(latest)` when `f` returns a new list
    fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&[Notification]) -> Option<Vec<Notification>>,
    {
        self.items_tx.send_if_modified(|items| match f(items.as_slice()) {
            Some(next) => {
                *items = Arc::new(next);
                true
            }
            None => false,
        })
    }
}

fn with_read_flag<P>(items: &[Notification], matches: P, read: bool) -> Vec<Notification>
where
    P: Fn(&Notification) -> bool,
{
    items
        .iter()
        .map(|n| {
            if matches(n) {
                Notification { read, ..n.clone() }
            } else {
                n.clone()
            }
        })
        .collect()
}
