use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type UserId = u64;
pub type PostId = u64;
pub type MessageId = u64;
pub type NotificationId = u64;

pub type Timestamp = DateTime<Utc>;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub password: String,
    pub created_at: Timestamp,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[default]
    None,
    Image,
    Video,
    Audio,
}

impl MediaKind {
    /// Numeric tag used by the flat-file format.
    pub fn code(self) -> u8 {
        match self {
            MediaKind::None => 0,
            MediaKind::Image => 1,
            MediaKind::Video => 2,
            MediaKind::Audio => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<MediaKind> {
        match code {
            0 => Some(MediaKind::None),
            1 => Some(MediaKind::Image),
            2 => Some(MediaKind::Video),
            3 => Some(MediaKind::Audio),
            _ => None,
        }
    }

    /// Directory under the media root that holds files of this kind.
    pub fn dir_name(self) -> &'static str {
        match self {
            MediaKind::Image => "images",
            MediaKind::Video => "videos",
            MediaKind::Audio => "audio",
            MediaKind::None => "unknown",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MediaKind::Image => "IMAGE",
            MediaKind::Video => "VIDEO",
            MediaKind::Audio => "AUDIO",
            MediaKind::None => "NONE",
        }
    }
}

impl std::str::FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "image" | "images" => Ok(MediaKind::Image),
            "video" | "videos" => Ok(MediaKind::Video),
            "audio" => Ok(MediaKind::Audio),
            other => Err(format!("unknown media kind '{}'", other)),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Media {
    pub kind: MediaKind,
    pub path: String,
    pub description: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Post {
    pub id: PostId,
    pub author_id: UserId,
    pub content: String,
    pub media: Option<Media>,
    pub created_at: Timestamp,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Follow {
    pub follower_id: UserId,
    pub followee_id: UserId,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CloseFriend {
    pub owner_id: UserId,
    pub friend_id: UserId,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub content: String,
    pub timestamp: Timestamp,
    /// Set iff the receiver had the sender marked as close friend at send time.
    pub priority: bool,
}

impl Message {
    pub fn involves(&self, user_id: UserId) -> bool {
        self.sender_id == user_id || self.receiver_id == user_id
    }

    pub fn between(&self, a: UserId, b: UserId) -> bool {
        (self.sender_id == a && self.receiver_id == b)
            || (self.sender_id == b && self.receiver_id == a)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub content: String,
    pub timestamp: Timestamp,
    pub priority: bool,
    pub read: bool,
}

/// The counter value that follows a loaded `id`, or `None` when `id` is out
/// of range.
pub fn id_after(id: u64) -> Option<u64> {
    (id < crate::config::MAX_ID).then(|| id + 1)
}

/// The four next-id values persisted alongside the collections.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Counters {
    pub next_user_id: UserId,
    pub next_post_id: PostId,
    pub next_message_id: MessageId,
    pub next_notification_id: NotificationId,
}

impl Default for Counters {
    fn default() -> Self {
        Counters {
            next_user_id: 1,
            next_post_id: 1,
            next_message_id: 1,
            next_notification_id: 1,
        }
    }
}

/// Two-tier read-time view: everything in `priority` renders before `regular`.
/// Each bucket keeps the order of the sequence it was split from.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Partitioned<T> {
    pub priority: Vec<T>,
    pub regular: Vec<T>,
}

impl<T> Partitioned<T> {
    pub fn split<I, F>(items: I, mut is_priority: F) -> Self
    where
        I: IntoIterator<Item = T>,
        F: FnMut(&T) -> bool,
    {
        let (priority, regular) = items.into_iter().partition(|item| is_priority(item));
        Partitioned { priority, regular }
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.priority.iter().chain(self.regular.iter())
    }

    pub fn len(&self) -> usize {
        self.priority.len() + self.regular.len()
    }

    pub fn is_empty(&self) -> bool {
        self.priority.is_empty() && self.regular.is_empty()
    }
}
