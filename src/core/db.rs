use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use anyhow::Context;
use tracing::{info, warn};

use crate::auth::Session;
use crate::config::*;
use crate::core::errors::SocialResult;
use crate::core::helpers::checked_from_unix;
use crate::models::models::{
    CloseFriend, Counters, Follow, Media, MediaKind, Message, Notification, Post, User,
};
use crate::network::Network;

/// Makes a field safe for the `|`-delimited, line-per-record format.
pub fn escape_field(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '|' => out.push_str("\\p"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

pub fn unescape_field(field: &str) -> Option<String> {
    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            '\\' => out.push('\\'),
            'p' => out.push('|'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            _ => return None,
        }
    }
    Some(out)
}

/// Lines kept and dropped by a [`load`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: usize,
    pub skipped: usize,
}

impl LoadReport {
    fn record(&mut self, kept: bool) {
        if kept {
            self.loaded += 1;
        } else {
            self.skipped += 1;
        }
    }
}

/// Non-blank lines of `path`; `None` marks a line that is not valid UTF-8.
fn read_lines(path: &Path) -> anyhow::Result<Vec<Option<String>>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err).with_context(|| format!("Failed to read {}", path.display())),
    };
    Ok(bytes
        .split(|&b| b == b'\n')
        .map(|raw| raw.strip_suffix(b"\r").unwrap_or(raw))
        .filter(|raw| !raw.iter().all(u8::is_ascii_whitespace))
        .map(|raw| std::str::from_utf8(raw).ok().map(str::to_string))
        .collect())
}

fn flag(field: &str) -> Option<bool> {
    match field {
        "0" => Some(false),
        "1" => Some(true),
        _ => None,
    }
}

fn parse_user(line: &str) -> Option<User> {
    let f: Vec<&str> = line.split('|').collect();
    if f.len() != 4 {
        return None;
    }
    Some(User {
        id: f[0].parse().ok()?,
        username: unescape_field(f[1])?,
        password: unescape_field(f[2])?,
        created_at: checked_from_unix(f[3].parse().ok()?)?,
    })
}

/// Accepts the full seven-field form and the older four-field form without media.
fn parse_post(line: &str) -> Option<Post> {
    let f: Vec<&str> = line.split('|').collect();
    if f.len() != 7 && f.len() != 4 {
        return None;
    }
    let media = if f.len() == 7 {
        match f[4].parse::<u8>().ok().and_then(MediaKind::from_code) {
            Some(MediaKind::None) | None => None,
            Some(kind) => Some(Media {
                kind,
                path: unescape_field(f[5])?,
                description: unescape_field(f[6])?,
            }),
        }
    } else {
        None
    };
    Some(Post {
        id: f[0].parse().ok()?,
        author_id: f[1].parse().ok()?,
        content: unescape_field(f[2])?,
        created_at: checked_from_unix(f[3].parse().ok()?)?,
        media,
    })
}

fn parse_message(line: &str) -> Option<Message> {
    let f: Vec<&str> = line.split('|').collect();
    if f.len() != 6 {
        return None;
    }
    Some(Message {
        id: f[0].parse().ok()?,
        sender_id: f[1].parse().ok()?,
        receiver_id: f[2].parse().ok()?,
        content: unescape_field(f[3])?,
        timestamp: checked_from_unix(f[4].parse().ok()?)?,
        priority: flag(f[5])?,
    })
}

fn parse_pair(line: &str) -> Option<(u64, u64)> {
    let (a, b) = line.split_once('|')?;
    Some((a.parse().ok()?, b.parse().ok()?))
}

fn parse_notification(line: &str) -> Option<Notification> {
    let f: Vec<&str> = line.split('|').collect();
    if f.len() != 6 {
        return None;
    }
    Some(Notification {
        id: f[0].parse().ok()?,
        user_id: f[1].parse().ok()?,
        content: unescape_field(f[2])?,
        timestamp: checked_from_unix(f[3].parse().ok()?)?,
        priority: flag(f[4])?,
        read: flag(f[5])?,
    })
}

fn parse_counters(line: &str) -> Option<Counters> {
    let f: Vec<&str> = line.split('|').collect();
    if f.len() != 4 {
        return None;
    }
    let value = |field: &str| field.parse::<u64>().ok().filter(|&v| v <= MAX_ID);
    Some(Counters {
        next_user_id: value(f[0])?,
        next_post_id: value(f[1])?,
        next_message_id: value(f[2])?,
        next_notification_id: value(f[3])?,
    })
}

fn load_file<T>(
    dir: &Path,
    name: &str,
    parse: impl Fn(&str) -> Option<T>,
    mut accept: impl FnMut(T) -> bool,
    report: &mut LoadReport,
) -> anyhow::Result<()> {
    let path = dir.join(name);
    for (n, line) in read_lines(&path)?.iter().enumerate() {
        let kept = line
            .as_deref()
            .and_then(&parse)
            .map(&mut accept)
            .unwrap_or(false);
        if !kept {
            warn!(file = name, line = n + 1, "skipping record");
        }
        report.record(kept);
    }
    Ok(())
}

/// Fills `network` (expected to be empty) from the data files in `dir`.
/// Missing files are empty collections; bad lines are skipped.
pub fn load(network: &mut Network, dir: &Path) -> anyhow::Result<LoadReport> {
    let mut report = LoadReport::default();

    load_file(dir, USERS_FILE, parse_user, |u| network.users.insert(u), &mut report)?;

    load_file(
        dir,
        POSTS_FILE,
        parse_post,
        |p| network.users.exists(p.author_id) && network.posts.insert(p),
        &mut report,
    )?;

    load_file(
        dir,
        MESSAGES_FILE,
        parse_message,
        |m| {
            network.users.exists(m.sender_id)
                && network.users.exists(m.receiver_id)
                && network.messages.insert(m)
        },
        &mut report,
    )?;

    load_file(
        dir,
        FOLLOWS_FILE,
        parse_pair,
        |(follower_id, followee_id)| {
            network.users.exists(follower_id)
                && network.users.exists(followee_id)
                && network.graph.insert_follow(Follow {
                    follower_id,
                    followee_id,
                })
        },
        &mut report,
    )?;

    load_file(
        dir,
        CLOSE_FRIENDS_FILE,
        parse_pair,
        |(owner_id, friend_id)| {
            network.users.exists(owner_id)
                && network.users.exists(friend_id)
                && network.graph.insert_close_friend(CloseFriend {
                    owner_id,
                    friend_id,
                })
        },
        &mut report,
    )?;

    load_file(
        dir,
        NOTIFICATIONS_FILE,
        parse_notification,
        |n| network.users.exists(n.user_id) && network.notifications.insert(n),
        &mut report,
    )?;

    let counters_path = dir.join(COUNTERS_FILE);
    if let Some(line) = read_lines(&counters_path)?.into_iter().next() {
        let line = line.unwrap_or_default();
        match parse_counters(&line) {
            Some(counters) => network.raise_counters(counters),
            None => warn!(file = COUNTERS_FILE, "unreadable counters, deriving from records"),
        }
    }

    info!(
        dir = %dir.display(),
        users = network.users.len(),
        posts = network.posts.len(),
        messages = network.messages.len(),
        notifications = network.notifications.len(),
        skipped = report.skipped,
        "data loaded"
    );
    Ok(report)
}

fn write_file<I>(dir: &Path, name: &str, lines: I) -> anyhow::Result<()>
where
    I: IntoIterator<Item = String>,
{
    let path = dir.join(name);
    let file = File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    for line in lines {
        writeln!(out, "{}", line).with_context(|| format!("Failed to write {}", path.display()))?;
    }
    out.flush()
        .with_context(|| format!("Failed to flush {}", path.display()))?;
    Ok(())
}

fn bit(b: bool) -> u8 {
    u8::from(b)
}

/// Truncates and rewrites every data file, oldest record first.
pub fn save(network: &Network, dir: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    write_file(
        dir,
        USERS_FILE,
        network.users.iter().map(|u| {
            format!(
                "{}|{}|{}|{}",
                u.id,
                escape_field(&u.username),
                escape_field(&u.password),
                u.created_at.timestamp()
            )
        }),
    )?;

    write_file(
        dir,
        POSTS_FILE,
        network.posts.iter().map(|p| {
            let (kind, path, description) = match &p.media {
                Some(m) => (m.kind, escape_field(&m.path), escape_field(&m.description)),
                None => (MediaKind::None, String::new(), String::new()),
            };
            format!(
                "{}|{}|{}|{}|{}|{}|{}",
                p.id,
                p.author_id,
                escape_field(&p.content),
                p.created_at.timestamp(),
                kind.code(),
                path,
                description
            )
        }),
    )?;

    write_file(
        dir,
        MESSAGES_FILE,
        network.messages.iter().map(|m| {
            format!(
                "{}|{}|{}|{}|{}|{}",
                m.id,
                m.sender_id,
                m.receiver_id,
                escape_field(&m.content),
                m.timestamp.timestamp(),
                bit(m.priority)
            )
        }),
    )?;

    write_file(
        dir,
        FOLLOWS_FILE,
        network
            .graph
            .follows()
            .map(|f| format!("{}|{}", f.follower_id, f.followee_id)),
    )?;

    write_file(
        dir,
        CLOSE_FRIENDS_FILE,
        network
            .graph
            .close_friend_edges()
            .map(|c| format!("{}|{}", c.owner_id, c.friend_id)),
    )?;

    write_file(
        dir,
        NOTIFICATIONS_FILE,
        network.notifications.iter().map(|n| {
            format!(
                "{}|{}|{}|{}|{}|{}",
                n.id,
                n.user_id,
                escape_field(&n.content),
                n.timestamp.timestamp(),
                bit(n.priority),
                bit(n.read)
            )
        }),
    )?;

    let c = network.counters();
    write_file(
        dir,
        COUNTERS_FILE,
        std::iter::once(format!(
            "{}|{}|{}|{}",
            c.next_user_id, c.next_post_id, c.next_message_id, c.next_notification_id
        )),
    )?;

    info!(dir = %dir.display(), "data saved");
    Ok(())
}

/// Demo accounts `test`, `alice` and `bob`. Returns false when all three
/// already exist.
pub fn seed_demo_data(network: &mut Network) -> SocialResult<bool> {
    let mut created = false;
    let mut ensure = |network: &mut Network, name: &str, posts: &[&str]| -> SocialResult<u64> {
        if let Some(user) = network.user_by_username(name) {
            return Ok(user.id);
        }
        let user = network.register(name, name)?;
        let session = Session::user(user.id);
        for content in posts {
            network.create_post(&session, content)?;
        }
        created = true;
        Ok(user.id)
    };

    let test_id = ensure(network, "test", &["This is my first post!"])?;
    let alice_id = ensure(
        network,
        "alice",
        &[
            "Welcome to my board! Excited to share thoughts here.",
            "Just finished an amazing project. Feeling productive today!",
        ],
    )?;
    let bob_id = ensure(
        network,
        "bob",
        &["Hey everyone! Just joined, looking forward to connecting with you all."],
    )?;

    let test = Session::user(test_id);
    for id in [alice_id, bob_id] {
        if !network.is_following(test_id, id) {
            network.follow(&test, id)?;
        }
    }
    if !network.is_close_friend(test_id, bob_id) {
        network.add_close_friend(&test, bob_id)?;
    }

    if created {
        info!("demo data seeded");
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escaping_round_trips_delimiters() {
        let raw = "a|b\\c\nd\re";
        let escaped = escape_field(raw);
        assert!(!escaped.contains('|'));
        assert!(!escaped.contains('\n'));
        assert_eq!(unescape_field(&escaped).as_deref(), Some(raw));
    }

    #[test]
    fn unescape_rejects_dangling_escape() {
        assert_eq!(unescape_field("abc\\"), None);
        assert_eq!(unescape_field("a\\qb"), None);
    }

    #[test]
    fn parses_old_post_lines_without_media() {
        let post = parse_post("4|2|hello|1700000000").unwrap();
        assert_eq!(post.id, 4);
        assert!(post.media.is_none());

        let post = parse_post("5|2|pic|1700000000|1|media/images/x.png|cat").unwrap();
        assert_eq!(post.media.unwrap().kind, MediaKind::Image);

        // unknown kind codes degrade to no media
        let post = parse_post("6|2|odd|1700000000|9|x|y").unwrap();
        assert!(post.media.is_none());
    }

    #[test]
    fn malformed_lines_do_not_parse() {
        assert!(parse_user("1|alice|pw").is_none());
        assert!(parse_user("x|alice|pw|1").is_none());
        assert!(parse_message("1|2|3|hi|10|7").is_none());
        assert!(parse_pair("1-2").is_none());
        assert!(parse_notification("1|2|hi|10|1").is_none());
    }

    #[test]
    fn load_from_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut network = Network::new(dir.path().join("media"));
        let report = load(&mut network, &dir.path().join("nothing-here")).unwrap();
        assert_eq!(report, LoadReport::default());
        assert!(network.users().is_empty());
        assert_eq!(network.counters(), Counters::default());
    }

    #[test]
    fn load_skips_bad_and_dangling_records() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(USERS_FILE), "1|alice|pw|10\ngarbage\n2|bob|pw|11\n").unwrap();
        fs::write(dir.path().join(POSTS_FILE), "1|1|hi|12|0||\n2|9|orphan|13|0||\n").unwrap();
        fs::write(dir.path().join(FOLLOWS_FILE), "1|2\n1|1\n2|3\n").unwrap();
        fs::write(dir.path().join(COUNTERS_FILE), "1|1|1|1\n").unwrap();

        let mut network = Network::new(dir.path().join("media"));
        let report = load(&mut network, dir.path()).unwrap();
        assert_eq!(report.loaded, 4);
        assert_eq!(report.skipped, 4);
        assert!(network.is_following(1, 2));
        // stale counters never move below loaded ids
        assert_eq!(network.counters().next_user_id, 3);
        assert_eq!(network.counters().next_post_id, 2);
    }

    #[test]
    fn seed_is_idempotent() {
        let mut network = Network::new("media".into());
        assert!(seed_demo_data(&mut network).unwrap());
        let posts = network.posts().len();
        assert!(!seed_demo_data(&mut network).unwrap());
        assert_eq!(network.posts().len(), posts);

        let test = network.user_by_username("test").unwrap().id;
        let bob = network.user_by_username("bob").unwrap().id;
        assert!(network.is_close_friend(test, bob));
    }

    #[test]
    fn load_skips_lines_that_are_not_utf8() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(USERS_FILE), "1|alice|pw|10\n2|bob|pw|11\n").unwrap();
        fs::write(
            dir.path().join(POSTS_FILE),
            b"1|1|hi|12|0||\n2|2|\xff\xfe bad|13|0||\r\n3|2|fine|14|0||\r\n",
        )
        .unwrap();

        let mut network = Network::new(dir.path().join("media"));
        let report = load(&mut network, dir.path()).unwrap();
        assert_eq!((report.loaded, report.skipped), (4, 1));
        let contents: Vec<_> = network.posts().iter().map(|p| p.content.as_str()).collect();
        assert_eq!(contents, vec!["hi", "fine"]);
    }

    #[test]
    fn load_rejects_ids_at_the_top_of_the_range() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(USERS_FILE),
            "18446744073709551615|alice|pw|10\n2|bob|pw|11\n",
        )
        .unwrap();
        fs::write(dir.path().join(POSTS_FILE), format!("{}|2|hi|12\n", MAX_ID)).unwrap();
        fs::write(dir.path().join(COUNTERS_FILE), "18446744073709551615|1|1|1\n").unwrap();

        let mut network = Network::new(dir.path().join("media"));
        let report = load(&mut network, dir.path()).unwrap();
        assert_eq!((report.loaded, report.skipped), (1, 2));
        assert_eq!(network.counters(), Counters { next_user_id: 3, ..Counters::default() });
        assert_eq!(network.register("carol", "pw3").unwrap().id, 3);
        assert!(parse_counters(&format!("{}|1|1|1", MAX_ID)).is_some());
        assert!(parse_counters(&format!("{}|1|1|1", MAX_ID + 1)).is_none());
    }

    #[test]
    fn out_of_range_timestamps_do_not_parse() {
        assert!(parse_user("1|alice|pw|9223372036854775807").is_none());
        assert!(parse_message("1|2|3|hi|-9223372036854775808|0").is_none());
        assert_eq!(
            parse_user("1|alice|pw|10").unwrap().created_at,
            checked_from_unix(10).unwrap()
        );
    }
}
