use std::path::PathBuf;

pub const MAX_POST_LENGTH: usize = 5000;
pub const MAX_MESSAGE_LENGTH: usize = 3000;
pub const MAX_MEDIA_DESCRIPTION_LENGTH: usize = 500;
pub const MIN_USERNAME_LENGTH: usize = 3;
pub const MAX_USERNAME_LENGTH: usize = 50;
pub const MIN_PASSWORD_LENGTH: usize = 3;

/// Largest id a data file may carry. Leaves headroom so counters never wrap.
pub const MAX_ID: u64 = i64::MAX as u64;

pub const USERS_FILE: &str = "users.dat";
pub const POSTS_FILE: &str = "posts.dat";
pub const MESSAGES_FILE: &str = "messages.dat";
pub const FOLLOWS_FILE: &str = "follows.dat";
pub const CLOSE_FRIENDS_FILE: &str = "close_friends.dat";
pub const NOTIFICATIONS_FILE: &str = "notifications.dat";
pub const COUNTERS_FILE: &str = "counters.dat";

pub fn data_dir() -> PathBuf {
    std::env::var("SOCIAL_DATA_DIR")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn media_dir() -> PathBuf {
    std::env::var("SOCIAL_MEDIA_DIR")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("media"))
}
