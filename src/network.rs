use std::path::PathBuf;

use serde::Serialize;

use crate::core::helpers::{Clock, SystemClock};
use crate::follow::RelationshipGraph;
use crate::media::{LocalFs, MediaFs, MediaLibrary};
use crate::messages::MessageStore;
use crate::models::models::{
    CloseFriend, Counters, Follow, Message, Notification, Post, Timestamp, User,
};
use crate::notifications::NotificationStore;
use crate::posts::ContentStore;
use crate::users::IdentityStore;

/// All in-memory state of one running network.
///
/// Acting operations live next to the store they mutate (`follow.rs`,
/// `posts.rs`, ...) as `impl Network` blocks and take the acting user as an
/// explicit [`Session`](crate::auth::Session).
pub struct Network {
    pub(crate) users: IdentityStore,
    pub(crate) graph: RelationshipGraph,
    pub(crate) posts: ContentStore,
    pub(crate) messages: MessageStore,
    pub(crate) notifications: NotificationStore,
    pub(crate) media: MediaLibrary,
    clock: Box<dyn Clock>,
}

impl Default for Network {
    fn default() -> Self {
        Network::new(crate::config::media_dir())
    }
}

impl Network {
    /// Empty network on the system clock, copying media under `media_root`.
    pub fn new(media_root: PathBuf) -> Self {
        Network::with_parts(Box::new(SystemClock), Box::new(LocalFs), media_root)
    }

    pub fn with_parts(clock: Box<dyn Clock>, fs: Box<dyn MediaFs>, media_root: PathBuf) -> Self {
        Network {
            users: IdentityStore::new(),
            graph: RelationshipGraph::new(),
            posts: ContentStore::new(),
            messages: MessageStore::new(),
            notifications: NotificationStore::new(),
            media: MediaLibrary::new(fs, media_root),
            clock,
        }
    }

    pub(crate) fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn users(&self) -> &IdentityStore {
        &self.users
    }

    pub fn graph(&self) -> &RelationshipGraph {
        &self.graph
    }

    pub fn posts(&self) -> &ContentStore {
        &self.posts
    }

    pub fn messages(&self) -> &MessageStore {
        &self.messages
    }

    pub fn notifications(&self) -> &NotificationStore {
        &self.notifications
    }

    pub fn counters(&self) -> Counters {
        Counters {
            next_user_id: self.users.next_id(),
            next_post_id: self.posts.next_id(),
            next_message_id: self.messages.next_id(),
            next_notification_id: self.notifications.next_id(),
        }
    }

    /// Counters only ever move forward, so loaded ids are never handed out again.
    pub(crate) fn raise_counters(&mut self, counters: Counters) {
        self.users.raise_next_id(counters.next_user_id);
        self.posts.raise_next_id(counters.next_post_id);
        self.messages.raise_next_id(counters.next_message_id);
        self.notifications.raise_next_id(counters.next_notification_id);
    }

    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot {
            counters: self.counters(),
            users: self.users.iter().collect(),
            posts: self.posts.iter().collect(),
            follows: self.graph.follows().collect(),
            close_friends: self.graph.close_friend_edges().collect(),
            messages: self.messages.iter().collect(),
            notifications: self.notifications.iter().collect(),
        }
    }
}

/// Serializable view of the whole state, oldest record first.
#[derive(Serialize, Debug)]
pub struct Snapshot<'a> {
    pub counters: Counters,
    pub users: Vec<&'a User>,
    pub posts: Vec<&'a Post>,
    pub follows: Vec<&'a Follow>,
    pub close_friends: Vec<&'a CloseFriend>,
    pub messages: Vec<&'a Message>,
    pub notifications: Vec<&'a Notification>,
}
