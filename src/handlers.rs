use std::fmt::Write as _;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::debug;

use crate::auth::Session;
use crate::core::db;
use crate::core::errors::{Outcome, SocialResult};
use crate::core::helpers::display_time;
use crate::models::models::{MediaKind, Message, Notification, Partitioned, Post, UserId};
use crate::network::Network;

/// One console line, parsed with the first word as the command name.
#[derive(Parser, Debug)]
#[command(multicall = true)]
pub struct Line {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Create an account
    Register { username: String, password: String },
    /// Log in as an existing user
    Login { username: String, password: String },
    Logout,
    /// Show who is logged in
    Whoami,
    /// Find users whose name contains a term
    Search { term: String },
    /// Show a profile (yours by default)
    Profile { user_id: Option<UserId> },
    Follow { user_id: UserId },
    Unfollow { user_id: UserId },
    /// List followers (yours by default)
    Followers { user_id: Option<UserId> },
    /// List followed users (yours by default)
    Following { user_id: Option<UserId> },
    /// Publish a text post
    Post {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        content: Vec<String>,
    },
    /// Publish a post with an image, video or audio file attached
    MediaPost {
        kind: MediaKind,
        path: PathBuf,
        #[arg(short, long, default_value = "")]
        description: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        content: Vec<String>,
    },
    /// Your feed, close friends first
    Feed,
    /// Posts by one user (yours by default)
    Posts { user_id: Option<UserId> },
    /// Send a direct message
    Send {
        user_id: UserId,
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        content: Vec<String>,
    },
    /// All your messages, close friends first
    Messages,
    /// Messages with one user in time order
    Conversation { user_id: UserId },
    AddCloseFriend { user_id: UserId },
    RemoveCloseFriend { user_id: UserId },
    CloseFriends,
    Notifications,
    /// Mark a notification as read
    Read { notification_id: u64 },
    /// Write all data files now
    Save,
    /// Dump the whole network as JSON
    Export { path: PathBuf },
    /// Save and leave
    #[command(alias = "quit")]
    Exit,
}

/// Splits a console line into words; double quotes group words.
pub fn split_words(line: &str) -> Result<Vec<String>, String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_word = false;
    for c in line.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                has_word = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_word {
                    words.push(std::mem::take(&mut current));
                    has_word = false;
                }
            }
            c => {
                current.push(c);
                has_word = true;
            }
        }
    }
    if in_quotes {
        return Err("unterminated quote".to_string());
    }
    if has_word {
        words.push(current);
    }
    Ok(words)
}

pub fn parse_line(line: &str) -> Result<Option<Command>, String> {
    let words = split_words(line)?;
    if words.is_empty() {
        return Ok(None);
    }
    Line::try_parse_from(words)
        .map(|parsed| Some(parsed.command))
        .map_err(|err| err.render().to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    Continue(String),
    Exit(String),
}

/// Console front end: owns the network and the session of whoever is at
/// the keyboard.
pub struct Console {
    network: Network,
    session: Session,
    data_dir: PathBuf,
}

impl Console {
    pub fn new(network: Network, data_dir: PathBuf) -> Self {
        Console {
            network,
            session: Session::anonymous(),
            data_dir,
        }
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn prompt(&self) -> String {
        match self.session.acting_user().ok().and_then(|id| self.network.user(id).ok()) {
            Some(user) => format!("@{}> ", user.username),
            None => "> ".to_string(),
        }
    }

    pub fn handle_line(&mut self, line: &str) -> Flow {
        match parse_line(line) {
            Ok(None) => Flow::Continue(String::new()),
            Ok(Some(command)) => {
                debug!(?command, "dispatch");
                let leaving = matches!(command, Command::Exit);
                let text = render_outcome(&self.dispatch(command));
                if leaving {
                    Flow::Exit(text)
                } else {
                    Flow::Continue(text)
                }
            }
            Err(message) => Flow::Continue(message.trim_end().to_string()),
        }
    }

    pub fn save(&self) -> Outcome {
        match db::save(&self.network, &self.data_dir) {
            Ok(()) => Outcome::success("Data saved successfully."),
            Err(err) => Outcome {
                ok: false,
                message: format!("{:#}", err),
            },
        }
    }

    fn export(&self, path: &Path) -> Outcome {
        let written = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))
            .and_then(|file| {
                serde_json::to_writer_pretty(BufWriter::new(file), &self.network.snapshot())
                    .context("Failed to write snapshot")
            });
        match written {
            Ok(()) => Outcome::success(format!("Exported to {}", path.display())),
            Err(err) => Outcome {
                ok: false,
                message: format!("{:#}", err),
            },
        }
    }

    /// The logged-in user, or the explicit one when given.
    fn target(&self, user_id: Option<UserId>) -> SocialResult<UserId> {
        match user_id {
            Some(id) => Ok(id),
            None => self.session.acting_user(),
        }
    }

    fn dispatch(&mut self, command: Command) -> Outcome {
        let session = self.session;
        match command {
            Command::Register { username, password } => respond(
                self.network.register(&username, &password),
                |user| format!("User registered successfully! User ID: {}", user.id),
            ),
            Command::Login { username, password } => match self.network.login(&username, &password) {
                Ok(session) => {
                    self.session = session;
                    Outcome::success(format!("Login successful! Welcome @{}!", username))
                }
                Err(err) => err.into(),
            },
            Command::Logout => {
                self.network.logout(&mut self.session);
                Outcome::success("Logged out successfully!")
            }
            Command::Whoami => respond(self.whoami(), |text| text),
            Command::Search { term } => {
                let found = self.network.search_users(&term);
                if found.is_empty() {
                    return Outcome::success(format!("No users found matching '{}'", term));
                }
                let mut out = String::from("Search Results:\n");
                for (n, user) in found.iter().enumerate() {
                    let _ = writeln!(out, "{}. @{} (ID: {})", n + 1, user.username, user.id);
                }
                Outcome::success(out)
            }
            Command::Profile { user_id } => respond(
                self.target(user_id).and_then(|id| self.network.profile(id)),
                |p| {
                    format!(
                        "=== USER PROFILE ===\nUser ID: {}\nUsername: {}\nMember since: {}\nFollowers: {}\nFollowing: {}",
                        p.id,
                        p.username,
                        display_time(&p.created_at),
                        p.followers,
                        p.following
                    )
                },
            ),
            Command::Follow { user_id } => respond(self.network.follow(&session, user_id), |_| {
                format!("You are now following @{}!", network_name(&self.network, user_id))
            }),
            Command::Unfollow { user_id } => respond(self.network.unfollow(&session, user_id), |_| {
                format!("You have unfollowed @{}", network_name(&self.network, user_id))
            }),
            Command::Followers { user_id } => respond(
                self.target(user_id).and_then(|id| self.network.followers(id)),
                |users| {
                    if users.is_empty() {
                        return "No followers found.".to_string();
                    }
                    let mut out = String::from("=== FOLLOWERS ===\n");
                    for (n, user) in users.iter().enumerate() {
                        let _ = writeln!(out, "{}. @{} (ID: {})", n + 1, user.username, user.id);
                    }
                    out
                },
            ),
            Command::Following { user_id } => respond(
                self.target(user_id).and_then(|id| self.network.following(id)),
                |entries| {
                    if entries.is_empty() {
                        return "Not following anyone.".to_string();
                    }
                    let mut out = String::from("=== FOLLOWING ===\n");
                    for (n, entry) in entries.iter().enumerate() {
                        let marker = if entry.close_friend { " [CLOSE FRIEND]" } else { "" };
                        let _ = writeln!(
                            out,
                            "{}. @{} (ID: {}){}",
                            n + 1,
                            entry.user.username,
                            entry.user.id,
                            marker
                        );
                    }
                    out
                },
            ),
            Command::Post { content } => respond(self.network.create_post(&session, &content.join(" ")), |id| {
                format!("Post created successfully! Post ID: {}", id)
            }),
            Command::MediaPost {
                kind,
                path,
                description,
                content,
            } => respond(
                self.network.create_media_post(&session, &content.join(" "), kind, &path, &description),
                |id| format!("Media post created successfully! Post ID: {}", id),
            ),
            Command::Feed => respond(self.network.assemble_feed(&session), |feed| {
                render_feed(&self.network, &feed)
            }),
            Command::Posts { user_id } => respond(
                self.target(user_id).and_then(|id| self.network.user_posts(id)),
                |posts| {
                    if posts.is_empty() {
                        return "No posts found for this user.".to_string();
                    }
                    let mut out = String::new();
                    for post in posts {
                        render_post(&mut out, &self.network, post, false);
                    }
                    out
                },
            ),
            Command::Send { user_id, content } => respond(
                self.network.send_message(&session, user_id, &content.join(" ")),
                |_| format!("Message sent to @{}!", network_name(&self.network, user_id)),
            ),
            Command::Messages => respond(
                self.session
                    .acting_user()
                    .and_then(|me| self.network.list_messages(&session).map(|view| (me, view))),
                |(me, view)| render_messages(&self.network, me, &view),
            ),
            Command::Conversation { user_id } => respond(
                self.session
                    .acting_user()
                    .and_then(|me| self.network.conversation(&session, user_id).map(|thread| (me, thread))),
                |(me, thread)| render_conversation(&self.network, me, user_id, &thread),
            ),
            Command::AddCloseFriend { user_id } => respond(self.network.add_close_friend(&session, user_id), |_| {
                format!("@{} added to your close friends list!", network_name(&self.network, user_id))
            }),
            Command::RemoveCloseFriend { user_id } => {
                respond(self.network.remove_close_friend(&session, user_id), |_| {
                    format!("@{} removed from your close friends list.", network_name(&self.network, user_id))
                })
            }
            Command::CloseFriends => respond(self.network.close_friends(&session), |friends| {
                if friends.is_empty() {
                    return "No close friends added yet.".to_string();
                }
                let mut out = String::from("=== YOUR CLOSE FRIENDS ===\n");
                for (n, user) in friends.iter().enumerate() {
                    let _ = writeln!(out, "{}. [CLOSE FRIEND] @{} (ID: {})", n + 1, user.username, user.id);
                }
                out
            }),
            Command::Notifications => respond(self.network.notifications_for(&session), |view| {
                render_notifications(&view)
            }),
            Command::Read { notification_id } => respond(
                self.network.mark_notification_read(&session, notification_id),
                |_| "Notification marked as read.".to_string(),
            ),
            Command::Save | Command::Exit => self.save(),
            Command::Export { path } => self.export(&path),
        }
    }

    fn whoami(&self) -> SocialResult<String> {
        let id = self.network.acting_user(&self.session)?;
        let unread = self.network.unread_notifications(&self.session)?;
        Ok(format!(
            "Logged in as @{} (ID: {}), {} unread notification(s)",
            self.network.users().username_of(id),
            id,
            unread
        ))
    }
}

fn network_name(network: &Network, id: UserId) -> String {
    network.users().username_of(id).to_string()
}

fn respond<T>(result: SocialResult<T>, render: impl FnOnce(T) -> String) -> Outcome {
    match result {
        Ok(value) => Outcome::success(render(value)),
        Err(err) => err.into(),
    }
}

fn render_outcome(outcome: &Outcome) -> String {
    let text = outcome.message.trim_end();
    if outcome.ok {
        text.to_string()
    } else {
        format!("Error: {}", text)
    }
}

fn render_post(out: &mut String, network: &Network, post: &Post, priority: bool) {
    let _ = writeln!(
        out,
        "[POST ID: {}] @{}",
        post.id,
        network.users().username_of(post.author_id)
    );
    if !post.content.is_empty() {
        let _ = writeln!(out, "{}", post.content);
    }
    if let Some(media) = &post.media {
        if media.kind != MediaKind::None {
            let _ = write!(out, "Media: {}", media.kind.dir_name());
            if !media.description.is_empty() {
                let _ = write!(out, " - {}", media.description);
            }
            let _ = writeln!(out, "\n   File: {}\n   [{}]", media.path, media.kind.label());
        }
    }
    let _ = writeln!(out, "Posted on: {}", display_time(&post.created_at));
    if priority {
        let _ = writeln!(out, "--- PRIORITY ---");
    }
    out.push('\n');
}

pub fn render_feed(network: &Network, feed: &Partitioned<&Post>) -> String {
    if feed.is_empty() {
        return "No posts to display. Follow some users to see their posts!".to_string();
    }
    let mut out = String::from("=== YOUR FEED ===\n--- PRIORITY POSTS (Close Friends) ---\n");
    for post in &feed.priority {
        render_post(&mut out, network, post, true);
    }
    out.push_str("--- REGULAR POSTS ---\n");
    for post in &feed.regular {
        render_post(&mut out, network, post, false);
    }
    out
}

pub fn render_messages(network: &Network, me: UserId, view: &Partitioned<&Message>) -> String {
    if view.is_empty() {
        return "No messages found.".to_string();
    }
    let line = |out: &mut String, msg: &Message| {
        let (direction, other) = if msg.sender_id == me {
            ('>', msg.receiver_id)
        } else {
            ('<', msg.sender_id)
        };
        let marker = if msg.priority { " [PRIORITY]" } else { "" };
        let _ = writeln!(
            out,
            "{} @{} [MSG ID: {}]{}\n{}\nTime: {}\n",
            direction,
            network.users().username_of(other),
            msg.id,
            marker,
            msg.content,
            display_time(&msg.timestamp)
        );
    };
    let mut out = String::from("=== YOUR MESSAGES ===\n--- PRIORITY MESSAGES (Close Friends) ---\n");
    for msg in &view.priority {
        line(&mut out, *msg);
    }
    out.push_str("--- REGULAR MESSAGES ---\n");
    for msg in &view.regular {
        line(&mut out, *msg);
    }
    out
}

pub fn render_conversation(network: &Network, me: UserId, other: UserId, thread: &[&Message]) -> String {
    if thread.is_empty() {
        return "No conversation found.".to_string();
    }
    let other_name = network.users().username_of(other);
    let mut out = format!("=== CONVERSATION WITH @{} ===\n", other_name);
    for msg in thread {
        let who = if msg.sender_id == me { "You" } else { other_name };
        let marker = if msg.priority { "*" } else { "" };
        let _ = writeln!(out, "{}{}: {}\n   {}", who, marker, msg.content, display_time(&msg.timestamp));
    }
    out
}

pub fn render_notifications(view: &Partitioned<&Notification>) -> String {
    if view.is_empty() {
        return "No notifications found.".to_string();
    }
    let line = |out: &mut String, n: &Notification, tag: &str| {
        let status = if n.read { ' ' } else { '*' };
        let _ = writeln!(
            out,
            "{} [ID: {}]{} {}\n   Time: {}",
            status,
            n.id,
            tag,
            n.content,
            display_time(&n.timestamp)
        );
    };
    let mut out = String::from("=== YOUR NOTIFICATIONS ===\n--- PRIORITY NOTIFICATIONS ---\n");
    for n in &view.priority {
        line(&mut out, *n, " [PRIORITY]");
    }
    out.push_str("--- REGULAR NOTIFICATIONS ---\n");
    for n in &view.regular {
        line(&mut out, *n, "");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_words_groups_quotes() {
        assert_eq!(
            split_words(r#"post "hello there" world"#).unwrap(),
            vec!["post", "hello there", "world"]
        );
        assert_eq!(split_words(r#"login bob """#).unwrap(), vec!["login", "bob", ""]);
        assert!(split_words(r#"post "oops"#).is_err());
        assert!(split_words("   ").unwrap().is_empty());
    }

    #[test]
    fn parse_line_maps_commands() {
        assert_eq!(
            parse_line("follow 3").unwrap(),
            Some(Command::Follow { user_id: 3 })
        );
        assert_eq!(
            parse_line(r#"post "hello there" world"#).unwrap(),
            Some(Command::Post {
                content: vec!["hello there".into(), "world".into()]
            })
        );
        assert_eq!(
            parse_line("media-post image pics/a.png -d sunset look at this").unwrap(),
            Some(Command::MediaPost {
                kind: MediaKind::Image,
                path: PathBuf::from("pics/a.png"),
                description: "sunset".into(),
                content: vec!["look".into(), "at".into(), "this".into()],
            })
        );
        assert_eq!(parse_line("quit").unwrap(), Some(Command::Exit));
        assert_eq!(parse_line("").unwrap(), None);
        assert!(parse_line("follow someone").is_err());
        assert!(parse_line("dance").is_err());
    }

    #[test]
    fn console_requires_login_for_acting_commands() {
        let dir = tempfile::tempdir().unwrap();
        let mut console = Console::new(Network::new(dir.path().join("media")), dir.path().to_path_buf());
        match console.handle_line("post hello") {
            Flow::Continue(text) => assert_eq!(text, "Error: Please login first"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn quit_saves_and_leaves() {
        let dir = tempfile::tempdir().unwrap();
        let mut console = Console::new(Network::new(dir.path().join("media")), dir.path().to_path_buf());
        assert_eq!(
            console.handle_line("register anna pw1"),
            Flow::Continue("User registered successfully! User ID: 1".to_string())
        );
        assert_eq!(
            console.handle_line("save"),
            Flow::Continue("Data saved successfully.".to_string())
        );
        assert_eq!(
            console.handle_line("quit"),
            Flow::Exit("Data saved successfully.".to_string())
        );
        assert!(dir.path().join(crate::config::USERS_FILE).exists());
    }
}
