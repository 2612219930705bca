//! Persisted notifications with a live push channel.
//!
//! A notification is stored first and then published on an in-process
//! broadcast channel. Each `/ws` connection subscribes and forwards only the
//! notifications addressed to its user. A subscriber that falls behind skips
//! what it missed; `GET /api/notifications` is the fallback.

use std::sync::Arc;

use tokio::sync::broadcast;

use tasfiya_core::{NotificationKind, UserId};

use crate::db::{RepositoryError, Storage};
use crate::models::{NewNotification, Notification};

/// Buffered messages per subscriber before it starts lagging.
const HUB_CAPACITY: usize = 256;

/// Fan-out point for freshly stored notifications.
#[derive(Clone)]
pub struct NotificationHub {
    tx: broadcast::Sender<Arc<Notification>>,
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationHub {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(HUB_CAPACITY);
        Self { tx }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Notification>> {
        self.tx.subscribe()
    }

    /// Push to whoever is listening. Having no listeners is fine.
    pub fn publish(&self, notification: Notification) {
        let _ = self.tx.send(Arc::new(notification));
    }
}

/// Stores notifications and pushes them through the hub.
pub struct Notifier<'a> {
    storage: &'a dyn Storage,
    hub: &'a NotificationHub,
}

impl<'a> Notifier<'a> {
    #[must_use]
    pub const fn new(storage: &'a dyn Storage, hub: &'a NotificationHub) -> Self {
        Self { storage, hub }
    }

    /// Persist one notification, then push it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if it cannot be stored; nothing is pushed then.
    pub async fn notify(
        &self,
        notification: NewNotification,
    ) -> Result<Notification, RepositoryError> {
        let stored = self.storage.create_notification(notification).await?;
        self.hub.publish(stored.clone());
        Ok(stored)
    }

    /// Send the same notification to every administrator.
    ///
    /// # Errors
    ///
    /// Returns the first storage error; admins after it are not notified.
    pub async fn notify_admins(
        &self,
        kind: NotificationKind,
        title: &str,
        message: &str,
        link: Option<&str>,
    ) -> Result<usize, RepositoryError> {
        let admins = self.storage.admin_ids().await?;
        for admin in &admins {
            let mut notification = NewNotification::new(*admin, kind, title, message);
            if let Some(link) = link {
                notification = notification.with_link(link);
            }
            self.notify(notification).await?;
        }
        Ok(admins.len())
    }

    /// [`Self::notify`] for side effects that must not fail the request.
    pub async fn notify_logged(&self, notification: NewNotification) {
        let user_id = notification.user_id;
        let kind = notification.kind;
        if let Err(e) = self.notify(notification).await {
            tracing::warn!(error = %e, %user_id, %kind, "Failed to store notification");
        }
    }

    /// [`Self::notify_admins`] for side effects that must not fail the request.
    pub async fn notify_admins_logged(
        &self,
        kind: NotificationKind,
        title: &str,
        message: &str,
        link: Option<&str>,
    ) {
        if let Err(e) = self.notify_admins(kind, title, message, link).await {
            tracing::warn!(error = %e, %kind, "Failed to notify administrators");
        }
    }
}

/// Check whether a pushed notification belongs to `user`.
#[must_use]
pub fn is_for(notification: &Notification, user: UserId) -> bool {
    notification.user_id == user
}
