use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info};

use crate::auth::Session;
use crate::config::*;
use crate::core::errors::{SocialError, SocialResult};
use crate::follow::RelationshipGraph;
use crate::models::models::{id_after, Media, MediaKind, Partitioned, Post, PostId, Timestamp, UserId};
use crate::network::Network;

/// Posts in creation order with id and author indexes.
#[derive(Debug)]
pub struct ContentStore {
    posts: Vec<Post>,
    by_id: HashMap<PostId, usize>,
    by_author: HashMap<UserId, Vec<usize>>,
    next_id: PostId,
}

impl Default for ContentStore {
    fn default() -> Self {
        ContentStore {
            posts: Vec::new(),
            by_id: HashMap::new(),
            by_author: HashMap::new(),
            next_id: 1,
        }
    }
}

impl ContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(
        &mut self,
        author_id: UserId,
        content: String,
        media: Option<Media>,
        now: Timestamp,
    ) -> &Post {
        let post = Post {
            id: self.next_id,
            author_id,
            content,
            media,
            created_at: now,
        };
        self.next_id += 1;
        let idx = self.push(post);
        &self.posts[idx]
    }

    pub fn get(&self, id: PostId) -> Option<&Post> {
        self.by_id.get(&id).map(|&idx| &self.posts[idx])
    }

    /// Posts by `author_id`, most recent first.
    pub fn by_author(&self, author_id: UserId) -> Vec<&Post> {
        self.by_author
            .get(&author_id)
            .map(|idxs| idxs.iter().rev().map(|&idx| &self.posts[idx]).collect())
            .unwrap_or_default()
    }

    /// What `viewer_id` sees: own posts and posts by followed authors, most
    /// recent first. Own posts and close friends' posts go to the priority
    /// bucket; this is a two-tier split, not a scored ranking.
    pub fn feed(&self, viewer_id: UserId, graph: &RelationshipGraph) -> Partitioned<&Post> {
        let visible = self.posts.iter().rev().filter(|p| {
            p.author_id == viewer_id || graph.is_following(viewer_id, p.author_id)
        });
        Partitioned::split(visible, |p| {
            p.author_id == viewer_id || graph.is_close_friend(viewer_id, p.author_id)
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Post> {
        self.posts.iter()
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn next_id(&self) -> PostId {
        self.next_id
    }

    pub(crate) fn raise_next_id(&mut self, next: PostId) {
        self.next_id = self.next_id.max(next);
    }

    pub(crate) fn insert(&mut self, post: Post) -> bool {
        if self.by_id.contains_key(&post.id) {
            return false;
        }
        let Some(next) = id_after(post.id) else {
            return false;
        };
        self.next_id = self.next_id.max(next);
        self.push(post);
        true
    }

    fn push(&mut self, post: Post) -> usize {
        let idx = self.posts.len();
        self.by_id.insert(post.id, idx);
        self.by_author.entry(post.author_id).or_default().push(idx);
        self.posts.push(post);
        idx
    }
}

fn validate_content(content: &str, has_media: bool) -> SocialResult<String> {
    let content = content.trim();
    if (content.is_empty() && !has_media) || content.chars().count() > MAX_POST_LENGTH {
        return Err(SocialError::InvalidInput(format!(
            "Post content must be 1-{} characters",
            MAX_POST_LENGTH
        )));
    }
    Ok(content.to_string())
}

impl Network {
    pub fn create_post(&mut self, session: &Session, content: &str) -> SocialResult<PostId> {
        let author_id = self.acting_user(session)?;
        let content = validate_content(content, false)?;
        Ok(self.publish(author_id, content, None, "created a new post"))
    }

    pub fn create_media_post(
        &mut self,
        session: &Session,
        content: &str,
        kind: MediaKind,
        source: &Path,
        description: &str,
    ) -> SocialResult<PostId> {
        let author_id = self.acting_user(session)?;
        let content = validate_content(content, true)?;
        let description = description.trim();
        if description.chars().count() > MAX_MEDIA_DESCRIPTION_LENGTH {
            return Err(SocialError::InvalidInput(format!(
                "Media description must be at most {} characters",
                MAX_MEDIA_DESCRIPTION_LENGTH
            )));
        }

        // the copy is named after the id the post is about to get
        let post_id = self.posts.next_id();
        let stored = self.media.import(source, kind, author_id, post_id)?;
        let media = Media {
            kind,
            path: stored.to_string_lossy().into_owned(),
            description: description.to_string(),
        };
        Ok(self.publish(author_id, content, Some(media), "created a new media post"))
    }

    /// Stores the post, then notifies every follower of the author. Priority
    /// is the follower's own close-friend mark on the author.
    fn publish(&mut self, author_id: UserId, content: String, media: Option<Media>, verb: &str) -> PostId {
        let now = self.now();
        let post_id = self.posts.append(author_id, content, media, now).id;

        let notice = format!("{} {}", self.users.username_of(author_id), verb);
        let followers: Vec<UserId> = self.graph.followers_of(author_id).collect();
        for follower_id in &followers {
            let priority = self.graph.is_close_friend(*follower_id, author_id);
            self.notifications.emit(*follower_id, notice.clone(), priority, now);
        }
        info!(post_id, author_id, fan_out = followers.len(), "post created");
        post_id
    }

    pub fn assemble_feed(&self, session: &Session) -> SocialResult<Partitioned<&Post>> {
        let viewer_id = self.acting_user(session)?;
        let feed = self.posts.feed(viewer_id, &self.graph);
        debug!(viewer_id, priority = feed.priority.len(), regular = feed.regular.len(), "feed assembled");
        Ok(feed)
    }

    pub fn user_posts(&self, user_id: UserId) -> SocialResult<Vec<&Post>> {
        self.user(user_id)?;
        Ok(self.posts.by_author(user_id))
    }

    pub fn post(&self, id: PostId) -> SocialResult<&Post> {
        self.posts.get(id).ok_or(SocialError::PostNotFound(id))
    }
}
