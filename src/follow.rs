use std::collections::HashSet;

use serde::Serialize;
use tracing::debug;

use crate::auth::Session;
use crate::core::errors::{SocialError, SocialResult};
use crate::models::models::{CloseFriend, Follow, User, UserId};
use crate::network::Network;

/// Follow and close-friend edges, each kept in insertion order with a
/// membership index.
#[derive(Debug, Default)]
pub struct RelationshipGraph {
    follows: Vec<Follow>,
    follow_index: HashSet<(UserId, UserId)>,
    close_friends: Vec<CloseFriend>,
    close_index: HashSet<(UserId, UserId)>,
}

impl RelationshipGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn follow(&mut self, follower_id: UserId, followee_id: UserId) -> SocialResult<()> {
        if follower_id == followee_id {
            return Err(SocialError::SelfReference);
        }
        if self.is_following(follower_id, followee_id) {
            return Err(SocialError::AlreadyFollowing(followee_id));
        }
        self.push_follow(Follow {
            follower_id,
            followee_id,
        });
        Ok(())
    }

    pub fn unfollow(&mut self, follower_id: UserId, followee_id: UserId) -> SocialResult<()> {
        let pos = self
            .follows
            .iter()
            .position(|f| f.follower_id == follower_id && f.followee_id == followee_id)
            .ok_or(SocialError::FollowNotFound(followee_id))?;
        self.follows.remove(pos);
        self.follow_index.remove(&(follower_id, followee_id));
        Ok(())
    }

    pub fn is_following(&self, follower_id: UserId, followee_id: UserId) -> bool {
        self.follow_index.contains(&(follower_id, followee_id))
    }

    /// `friend_id` must already exist as a user; that is checked by the caller.
    pub fn add_close_friend(&mut self, owner_id: UserId, friend_id: UserId) -> SocialResult<()> {
        if owner_id == friend_id {
            return Err(SocialError::SelfReference);
        }
        if self.is_close_friend(owner_id, friend_id) {
            return Err(SocialError::AlreadyCloseFriend(friend_id));
        }
        if !self.is_following(owner_id, friend_id) {
            return Err(SocialError::NotFollowing(friend_id));
        }
        self.push_close_friend(CloseFriend { owner_id, friend_id });
        Ok(())
    }

    pub fn remove_close_friend(&mut self, owner_id: UserId, friend_id: UserId) -> SocialResult<()> {
        let pos = self
            .close_friends
            .iter()
            .position(|c| c.owner_id == owner_id && c.friend_id == friend_id)
            .ok_or(SocialError::CloseFriendNotFound(friend_id))?;
        self.close_friends.remove(pos);
        self.close_index.remove(&(owner_id, friend_id));
        Ok(())
    }

    /// Directed: `owner` marked `friend`. Says nothing about the reverse.
    pub fn is_close_friend(&self, owner_id: UserId, friend_id: UserId) -> bool {
        self.close_index.contains(&(owner_id, friend_id))
    }

    pub fn followers_of(&self, user_id: UserId) -> impl Iterator<Item = UserId> + '_ {
        self.follows
            .iter()
            .filter(move |f| f.followee_id == user_id)
            .map(|f| f.follower_id)
    }

    pub fn following_of(&self, user_id: UserId) -> impl Iterator<Item = UserId> + '_ {
        self.follows
            .iter()
            .filter(move |f| f.follower_id == user_id)
            .map(|f| f.followee_id)
    }

    pub fn close_friends_of(&self, owner_id: UserId) -> impl Iterator<Item = UserId> + '_ {
        self.close_friends
            .iter()
            .filter(move |c| c.owner_id == owner_id)
            .map(|c| c.friend_id)
    }

    pub fn follower_count(&self, user_id: UserId) -> usize {
        self.followers_of(user_id).count()
    }

    pub fn following_count(&self, user_id: UserId) -> usize {
        self.following_of(user_id).count()
    }

    pub fn follows(&self) -> impl Iterator<Item = &Follow> {
        self.follows.iter()
    }

    pub fn close_friend_edges(&self) -> impl Iterator<Item = &CloseFriend> {
        self.close_friends.iter()
    }

    /// Loader entry point: self edges and duplicates are dropped.
    pub(crate) fn insert_follow(&mut self, edge: Follow) -> bool {
        if edge.follower_id == edge.followee_id
            || self.is_following(edge.follower_id, edge.followee_id)
        {
            return false;
        }
        self.push_follow(edge);
        true
    }

    pub(crate) fn insert_close_friend(&mut self, edge: CloseFriend) -> bool {
        if edge.owner_id == edge.friend_id || self.is_close_friend(edge.owner_id, edge.friend_id) {
            return false;
        }
        self.push_close_friend(edge);
        true
    }

    fn push_follow(&mut self, edge: Follow) {
        self.follow_index.insert((edge.follower_id, edge.followee_id));
        self.follows.push(edge);
    }

    fn push_close_friend(&mut self, edge: CloseFriend) {
        self.close_index.insert((edge.owner_id, edge.friend_id));
        self.close_friends.push(edge);
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct FollowingEntry<'a> {
    pub user: &'a User,
    pub close_friend: bool,
}

impl Network {
    pub fn follow(&mut self, session: &Session, followee_id: UserId) -> SocialResult<()> {
        let follower_id = self.acting_user(session)?;
        if follower_id == followee_id {
            return Err(SocialError::SelfReference);
        }
        if !self.users.exists(followee_id) {
            return Err(SocialError::UserNotFound(followee_id));
        }
        self.graph.follow(follower_id, followee_id)?;
        debug!(follower_id, followee_id, "follow");

        let content = format!("{} started following you", self.users.username_of(follower_id));
        let now = self.now();
        self.notifications.emit(followee_id, content, false, now);
        Ok(())
    }

    pub fn unfollow(&mut self, session: &Session, followee_id: UserId) -> SocialResult<()> {
        let follower_id = self.acting_user(session)?;
        self.graph.unfollow(follower_id, followee_id)?;
        debug!(follower_id, followee_id, "unfollow");
        Ok(())
    }

    pub fn is_following(&self, follower_id: UserId, followee_id: UserId) -> bool {
        self.graph.is_following(follower_id, followee_id)
    }

    pub fn add_close_friend(&mut self, session: &Session, friend_id: UserId) -> SocialResult<()> {
        let owner_id = self.acting_user(session)?;
        if owner_id == friend_id {
            return Err(SocialError::SelfReference);
        }
        if !self.users.exists(friend_id) {
            return Err(SocialError::UserNotFound(friend_id));
        }
        self.graph.add_close_friend(owner_id, friend_id)?;
        debug!(owner_id, friend_id, "close friend added");
        Ok(())
    }

    pub fn remove_close_friend(&mut self, session: &Session, friend_id: UserId) -> SocialResult<()> {
        let owner_id = self.acting_user(session)?;
        self.graph.remove_close_friend(owner_id, friend_id)?;
        debug!(owner_id, friend_id, "close friend removed");
        Ok(())
    }

    pub fn is_close_friend(&self, owner_id: UserId, friend_id: UserId) -> bool {
        self.graph.is_close_friend(owner_id, friend_id)
    }

    pub fn followers(&self, user_id: UserId) -> SocialResult<Vec<&User>> {
        self.user(user_id)?;
        Ok(self
            .graph
            .followers_of(user_id)
            .filter_map(|id| self.users.find_by_id(id))
            .collect())
    }

    pub fn following(&self, user_id: UserId) -> SocialResult<Vec<FollowingEntry<'_>>> {
        self.user(user_id)?;
        Ok(self
            .graph
            .following_of(user_id)
            .filter_map(|id| self.users.find_by_id(id))
            .map(|user| FollowingEntry {
                user,
                close_friend: self.graph.is_close_friend(user_id, user.id),
            })
            .collect())
    }

    pub fn close_friends(&self, session: &Session) -> SocialResult<Vec<&User>> {
        let owner_id = self.acting_user(session)?;
        Ok(self
            .graph
            .close_friends_of(owner_id)
            .filter_map(|id| self.users.find_by_id(id))
            .collect())
    }
}
