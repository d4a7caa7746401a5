use serde::Serialize;
use thiserror::Error;

use crate::models::models::{NotificationId, PostId, UserId};

#[derive(Debug, Error)]
pub enum SocialError {
    #[error("Please login first")]
    NotAuthenticated,
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("User {0} not found")]
    UserNotFound(UserId),
    #[error("Receiver {0} not found")]
    ReceiverNotFound(UserId),
    #[error("Post {0} not found")]
    PostNotFound(PostId),
    #[error("Notification {0} not found or doesn't belong to you")]
    NotificationNotFound(NotificationId),
    #[error("You are not following user {0}")]
    FollowNotFound(UserId),
    #[error("User {0} is not in your close friends list")]
    CloseFriendNotFound(UserId),
    #[error("You cannot do that to yourself")]
    SelfReference,
    #[error("You cannot send a message to yourself")]
    SelfMessage,
    #[error("You are already following user {0}")]
    AlreadyFollowing(UserId),
    #[error("User {0} is already in your close friends list")]
    AlreadyCloseFriend(UserId),
    #[error("You must follow user {0} before adding them as a close friend")]
    NotFollowing(UserId),
    #[error("Username '{0}' already exists")]
    UsernameTaken(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid media: {0}")]
    InvalidMedia(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SocialError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SocialError::UserNotFound(_)
                | SocialError::ReceiverNotFound(_)
                | SocialError::PostNotFound(_)
                | SocialError::NotificationNotFound(_)
                | SocialError::FollowNotFound(_)
                | SocialError::CloseFriendNotFound(_)
        )
    }
}

pub type SocialResult<T> = Result<T, SocialError>;

/// What the presentation layer sees for a mutation: a flag and a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub ok: bool,
    pub message: String,
}

impl Outcome {
    pub fn success(message: impl Into<String>) -> Self {
        Outcome {
            ok: true,
            message: message.into(),
        }
    }
}

impl From<SocialError> for Outcome {
    fn from(err: SocialError) -> Self {
        Outcome {
            ok: false,
            message: err.to_string(),
        }
    }
}

impl<T> From<SocialResult<T>> for Outcome
where
    T: std::fmt::Display,
{
    fn from(result: SocialResult<T>) -> Self {
        match result {
            Ok(value) => Outcome::success(value.to_string()),
            Err(err) => err.into(),
        }
    }
}
