use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::config::*;
use crate::core::errors::{SocialError, SocialResult};
use crate::models::models::{id_after, Timestamp, User, UserId};
use crate::network::Network;

fn username_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.\-]+$").expect("Regex should compile"))
}

pub fn validate_username(username: &str) -> SocialResult<()> {
    let len = username.chars().count();
    if !(MIN_USERNAME_LENGTH..=MAX_USERNAME_LENGTH).contains(&len) {
        return Err(SocialError::InvalidInput(format!(
            "Username must be {}-{} characters",
            MIN_USERNAME_LENGTH, MAX_USERNAME_LENGTH
        )));
    }
    if !username_regex().is_match(username) {
        return Err(SocialError::InvalidInput(
            "Username may only contain letters, digits, '.', '_' and '-'".to_string(),
        ));
    }
    Ok(())
}

/// Users in registration order, indexed by id and by username.
#[derive(Debug)]
pub struct IdentityStore {
    users: Vec<User>,
    by_id: HashMap<UserId, usize>,
    by_username: HashMap<String, UserId>,
    next_id: UserId,
}

impl Default for IdentityStore {
    fn default() -> Self {
        IdentityStore {
            users: Vec::new(),
            by_id: HashMap::new(),
            by_username: HashMap::new(),
            next_id: 1,
        }
    }
}

impl IdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, username: &str, password: &str, now: Timestamp) -> SocialResult<User> {
        validate_username(username)?;
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(SocialError::InvalidInput(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }
        if password.contains(['\n', '\r']) {
            return Err(SocialError::InvalidInput("Password must be a single line".to_string()));
        }
        if self.by_username.contains_key(username) {
            return Err(SocialError::UsernameTaken(username.to_string()));
        }

        let user = User {
            id: self.next_id,
            username: username.to_string(),
            password: password.to_string(),
            created_at: now,
        };
        self.next_id += 1;
        self.push(user.clone());
        debug!(user_id = user.id, username = %user.username, "registered user");
        Ok(user)
    }

    /// Adds an already-built record (used when loading). Duplicates are refused.
    pub(crate) fn insert(&mut self, user: User) -> bool {
        if self.by_id.contains_key(&user.id) || self.by_username.contains_key(&user.username) {
            return false;
        }
        let Some(next) = id_after(user.id) else {
            return false;
        };
        self.next_id = self.next_id.max(next);
        self.push(user);
        true
    }

    fn push(&mut self, user: User) {
        self.by_id.insert(user.id, self.users.len());
        self.by_username.insert(user.username.clone(), user.id);
        self.users.push(user);
    }

    /// Plaintext match on username and password.
    pub fn authenticate(&self, username: &str, password: &str) -> Option<&User> {
        self.find_by_username(username)
            .filter(|user| user.password == password)
    }

    pub fn find_by_id(&self, id: UserId) -> Option<&User> {
        self.by_id.get(&id).map(|&idx| &self.users[idx])
    }

    pub fn find_by_username(&self, username: &str) -> Option<&User> {
        self.by_username
            .get(username)
            .and_then(|id| self.find_by_id(*id))
    }

    pub fn exists(&self, id: UserId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn username_of(&self, id: UserId) -> &str {
        self.find_by_id(id)
            .map(|u| u.username.as_str())
            .unwrap_or("Unknown")
    }

    /// Substring match on usernames, registration order.
    pub fn search(&self, term: &str) -> Vec<&User> {
        self.users
            .iter()
            .filter(|u| u.username.contains(term))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &User> {
        self.users.iter()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn next_id(&self) -> UserId {
        self.next_id
    }

    pub(crate) fn raise_next_id(&mut self, next: UserId) {
        self.next_id = self.next_id.max(next);
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    pub created_at: Timestamp,
    pub followers: usize,
    pub following: usize,
}

impl Network {
    pub fn register(&mut self, username: &str, password: &str) -> SocialResult<User> {
        let now = self.now();
        self.users.register(username, password, now)
    }

    pub fn user(&self, id: UserId) -> SocialResult<&User> {
        self.users.find_by_id(id).ok_or(SocialError::UserNotFound(id))
    }

    pub fn user_by_username(&self, username: &str) -> Option<&User> {
        self.users.find_by_username(username)
    }

    pub fn search_users(&self, term: &str) -> Vec<&User> {
        self.users.search(term)
    }

    pub fn profile(&self, id: UserId) -> SocialResult<UserProfile> {
        let user = self.user(id)?;
        Ok(UserProfile {
            id: user.id,
            username: user.username.clone(),
            created_at: user.created_at,
            followers: self.graph.follower_count(id),
            following: self.graph.following_count(id),
        })
    }
}
