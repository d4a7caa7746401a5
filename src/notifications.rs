use std::collections::HashMap;

use tracing::debug;

use crate::auth::Session;
use crate::core::errors::{SocialError, SocialResult};
use crate::models::models::{id_after, Notification, NotificationId, Partitioned, Timestamp, UserId};
use crate::network::Network;

/// Append-only notification log. Only the read flag ever changes.
#[derive(Debug)]
pub struct NotificationStore {
    log: Vec<Notification>,
    by_id: HashMap<NotificationId, usize>,
    next_id: NotificationId,
}

impl Default for NotificationStore {
    fn default() -> Self {
        NotificationStore {
            log: Vec::new(),
            by_id: HashMap::new(),
            next_id: 1,
        }
    }
}

impl NotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(
        &mut self,
        user_id: UserId,
        content: String,
        priority: bool,
        now: Timestamp,
    ) -> NotificationId {
        let id = self.next_id;
        self.next_id += 1;
        debug!(notification_id = id, user_id, priority, "notification emitted");
        self.push(Notification {
            id,
            user_id,
            content,
            timestamp: now,
            priority,
            read: false,
        });
        id
    }

    /// Newest first, priority bucket ahead of regular.
    pub fn list(&self, user_id: UserId) -> Partitioned<&Notification> {
        Partitioned::split(
            self.log.iter().rev().filter(|n| n.user_id == user_id),
            |n| n.priority,
        )
    }

    /// Idempotent. Ids owned by another user are reported as missing.
    pub fn mark_read(&mut self, id: NotificationId, user_id: UserId) -> SocialResult<()> {
        let idx = *self
            .by_id
            .get(&id)
            .ok_or(SocialError::NotificationNotFound(id))?;
        let notification = &mut self.log[idx];
        if notification.user_id != user_id {
            return Err(SocialError::NotificationNotFound(id));
        }
        notification.read = true;
        Ok(())
    }

    pub fn unread_count(&self, user_id: UserId) -> usize {
        self.log
            .iter()
            .filter(|n| n.user_id == user_id && !n.read)
            .count()
    }

    pub fn get(&self, id: NotificationId) -> Option<&Notification> {
        self.by_id.get(&id).map(|&idx| &self.log[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.log.iter()
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    pub fn next_id(&self) -> NotificationId {
        self.next_id
    }

    pub(crate) fn raise_next_id(&mut self, next: NotificationId) {
        self.next_id = self.next_id.max(next);
    }

    pub(crate) fn insert(&mut self, notification: Notification) -> bool {
        if self.by_id.contains_key(&notification.id) {
            return false;
        }
        let Some(next) = id_after(notification.id) else {
            return false;
        };
        self.next_id = self.next_id.max(next);
        self.push(notification);
        true
    }

    fn push(&mut self, notification: Notification) {
        self.by_id.insert(notification.id, self.log.len());
        self.log.push(notification);
    }
}

impl Network {
    pub fn notifications_for(&self, session: &Session) -> SocialResult<Partitioned<&Notification>> {
        let user_id = self.acting_user(session)?;
        Ok(self.notifications.list(user_id))
    }

    pub fn mark_notification_read(&mut self, session: &Session, id: NotificationId) -> SocialResult<()> {
        let user_id = self.acting_user(session)?;
        self.notifications.mark_read(id, user_id)
    }

    pub fn unread_notifications(&self, session: &Session) -> SocialResult<usize> {
        let user_id = self.acting_user(session)?;
        Ok(self.notifications.unread_count(user_id))
    }
}
