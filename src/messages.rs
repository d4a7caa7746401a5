use std::collections::HashMap;

use tracing::debug;

use crate::auth::Session;
use crate::config::MAX_MESSAGE_LENGTH;
use crate::core::errors::{SocialError, SocialResult};
use crate::models::models::{id_after, Message, MessageId, Partitioned, Timestamp, UserId};
use crate::network::Network;

#[derive(Debug)]
pub struct MessageStore {
    messages: Vec<Message>,
    by_id: HashMap<MessageId, usize>,
    next_id: MessageId,
}

impl Default for MessageStore {
    fn default() -> Self {
        MessageStore {
            messages: Vec::new(),
            by_id: HashMap::new(),
            next_id: 1,
        }
    }
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(
        &mut self,
        sender_id: UserId,
        receiver_id: UserId,
        content: String,
        priority: bool,
        now: Timestamp,
    ) -> &Message {
        let message = Message {
            id: self.next_id,
            sender_id,
            receiver_id,
            content,
            timestamp: now,
            priority,
        };
        self.next_id += 1;
        let idx = self.push(message);
        &self.messages[idx]
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.by_id.get(&id).map(|&idx| &self.messages[idx])
    }

    /// Everything sent or received by `user_id`, newest first, priority first.
    pub fn list(&self, user_id: UserId) -> Partitioned<&Message> {
        Partitioned::split(
            self.messages.iter().rev().filter(|m| m.involves(user_id)),
            |m| m.priority,
        )
    }

    /// Messages exchanged by `a` and `b`, oldest first.
    pub fn conversation(&self, a: UserId, b: UserId) -> Vec<&Message> {
        let mut thread: Vec<&Message> = self.messages.iter().filter(|m| m.between(a, b)).collect();
        thread.sort_by(|x, y| x.timestamp.cmp(&y.timestamp).then(x.id.cmp(&y.id)));
        thread
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn next_id(&self) -> MessageId {
        self.next_id
    }

    pub(crate) fn raise_next_id(&mut self, next: MessageId) {
        self.next_id = self.next_id.max(next);
    }

    pub(crate) fn insert(&mut self, message: Message) -> bool {
        if message.sender_id == message.receiver_id || self.by_id.contains_key(&message.id) {
            return false;
        }
        let Some(next) = id_after(message.id) else {
            return false;
        };
        self.next_id = self.next_id.max(next);
        self.push(message);
        true
    }

    fn push(&mut self, message: Message) -> usize {
        let idx = self.messages.len();
        self.by_id.insert(message.id, idx);
        self.messages.push(message);
        idx
    }
}

impl Network {
    pub fn send_message(
        &mut self,
        session: &Session,
        receiver_id: UserId,
        content: &str,
    ) -> SocialResult<MessageId> {
        let sender_id = self.acting_user(session)?;
        if !self.users.exists(receiver_id) {
            return Err(SocialError::ReceiverNotFound(receiver_id));
        }
        if receiver_id == sender_id {
            return Err(SocialError::SelfMessage);
        }
        let content = content.trim();
        if content.is_empty() || content.chars().count() > MAX_MESSAGE_LENGTH {
            return Err(SocialError::InvalidInput(format!(
                "Message must be 1-{} characters",
                MAX_MESSAGE_LENGTH
            )));
        }

        // the receiver's list decides, not the sender's
        let priority = self.graph.is_close_friend(receiver_id, sender_id);
        let now = self.now();
        let id = self
            .messages
            .append(sender_id, receiver_id, content.to_string(), priority, now)
            .id;
        debug!(message_id = id, sender_id, receiver_id, priority, "message sent");

        let notice = format!("New message from {}", self.users.username_of(sender_id));
        self.notifications.emit(receiver_id, notice, priority, now);
        Ok(id)
    }

    pub fn list_messages(&self, session: &Session) -> SocialResult<Partitioned<&Message>> {
        let user_id = self.acting_user(session)?;
        Ok(self.messages.list(user_id))
    }

    pub fn conversation(&self, session: &Session, other_id: UserId) -> SocialResult<Vec<&Message>> {
        let user_id = self.acting_user(session)?;
        self.user(other_id)?;
        Ok(self.messages.conversation(user_id, other_id))
    }
}
