use std::fs;
use std::path::Path;

use pretty_assertions::assert_eq;
use priority_social::core::db;
use priority_social::core::helpers::ManualClock;
use priority_social::media::LocalFs;
use priority_social::{Console, Flow, MediaKind, Network, Session, SocialError};

fn network_at(clock: &ManualClock, media_root: &Path) -> Network {
    Network::with_parts(Box::new(clock.clone()), Box::new(LocalFs), media_root.to_path_buf())
}

fn ids<T>(items: &[&T], id: impl Fn(&T) -> u64) -> Vec<u64> {
    items.iter().map(|item| id(*item)).collect()
}

#[test]
fn test_full_user_flow() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::starting_at(1_700_000_000);
    let mut network = network_at(&clock, &dir.path().join("media"));

    // 1. Register
    let alice = network.register("alice", "pw1").unwrap();
    let bob = network.register("bob", "pw2").unwrap();
    let carol = network.register("carol", "pw3").unwrap();
    assert_eq!((alice.id, bob.id, carol.id), (1, 2, 3));
    assert!(matches!(
        network.register("alice", "other"),
        Err(SocialError::UsernameTaken(_))
    ));

    // 2. Login
    assert!(matches!(
        network.login("alice", "wrong"),
        Err(SocialError::InvalidCredentials)
    ));
    let alice_s = network.login("alice", "pw1").unwrap();
    let bob_s = network.login("bob", "pw2").unwrap();
    let carol_s = network.login("carol", "pw3").unwrap();

    // 3. Follow and mark close friends
    network.follow(&alice_s, bob.id).unwrap();
    network.follow(&alice_s, carol.id).unwrap();
    network.add_close_friend(&alice_s, bob.id).unwrap();
    network.follow(&carol_s, bob.id).unwrap();

    // 4. Posts
    clock.advance(10);
    let bob_post = network.create_post(&bob_s, "bob here").unwrap();
    clock.advance(10);
    let carol_post = network.create_post(&carol_s, "carol here").unwrap();
    clock.advance(10);
    let alice_post = network.create_post(&alice_s, "alice here").unwrap();

    // 5. Feed: own and close-friend posts first, newest first inside each bucket
    let feed = network.assemble_feed(&alice_s).unwrap();
    assert_eq!(ids(&feed.priority, |p| p.id), vec![alice_post, bob_post]);
    assert_eq!(ids(&feed.regular, |p| p.id), vec![carol_post]);

    // 6. Fan-out: alice marked bob, carol did not
    let alice_inbox = network.notifications_for(&alice_s).unwrap();
    assert_eq!(alice_inbox.priority.len(), 1);
    assert_eq!(alice_inbox.priority[0].content, "bob created a new post");
    let carol_inbox = network.notifications_for(&carol_s).unwrap();
    let carol_texts: Vec<&str> = carol_inbox.iter().map(|n| n.content.as_str()).collect();
    assert_eq!(carol_texts, vec!["bob created a new post", "alice started following you"]);
    assert!(carol_inbox.priority.is_empty());

    // 7. Logout
    let mut session = alice_s;
    network.logout(&mut session);
    assert!(matches!(
        network.assemble_feed(&session),
        Err(SocialError::NotAuthenticated)
    ));
}

#[test]
fn test_follow_rules() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::starting_at(0);
    let mut network = network_at(&clock, dir.path());
    let a = network.register("anna", "pw1").unwrap();
    let b = network.register("ben", "pw2").unwrap();
    let a_s = Session::user(a.id);

    assert!(matches!(network.follow(&a_s, a.id), Err(SocialError::SelfReference)));
    assert!(matches!(network.follow(&a_s, 77), Err(SocialError::UserNotFound(77))));
    assert!(matches!(
        network.add_close_friend(&a_s, b.id),
        Err(SocialError::NotFollowing(_))
    ));

    network.follow(&a_s, b.id).unwrap();
    assert!(network.is_following(a.id, b.id));
    network.unfollow(&a_s, b.id).unwrap();
    assert!(!network.is_following(a.id, b.id));
    assert!(matches!(
        network.unfollow(&a_s, b.id),
        Err(SocialError::FollowNotFound(_))
    ));

    network.follow(&a_s, b.id).unwrap();
    network.add_close_friend(&a_s, b.id).unwrap();
    assert!(matches!(
        network.add_close_friend(&a_s, b.id),
        Err(SocialError::AlreadyCloseFriend(_))
    ));
    network.remove_close_friend(&a_s, b.id).unwrap();
    assert!(!network.is_close_friend(a.id, b.id));
}

#[test]
fn test_messages_and_notifications() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::starting_at(300);
    let mut network = network_at(&clock, dir.path());
    let a = network.register("anna", "pw1").unwrap();
    let b = network.register("ben", "pw2").unwrap();
    let a_s = Session::user(a.id);
    let b_s = Session::user(b.id);

    network.send_message(&a_s, b.id, "third").unwrap();
    clock.set(100);
    network.send_message(&b_s, a.id, "first").unwrap();
    clock.set(200);
    network.send_message(&a_s, b.id, "second").unwrap();

    let thread = network.conversation(&a_s, b.id).unwrap();
    let texts: Vec<&str> = thread.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(texts, vec!["first", "second", "third"]);

    let inbox = network.notifications_for(&b_s).unwrap();
    assert_eq!(inbox.len(), 2);
    let id = inbox.regular[0].id;
    assert!(matches!(
        network.mark_notification_read(&a_s, id),
        Err(SocialError::NotificationNotFound(_))
    ));
    network.mark_notification_read(&b_s, id).unwrap();
    network.mark_notification_read(&b_s, id).unwrap();
    assert_eq!(network.unread_notifications(&b_s).unwrap(), 1);
}

#[test]
fn test_save_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    let media = dir.path().join("media");
    let source = dir.path().join("holiday.PNG");
    fs::write(&source, b"not really a png").unwrap();

    let clock = ManualClock::starting_at(1_700_000_000);
    let mut network = network_at(&clock, &media);
    let a = network.register("anna", "pw1").unwrap();
    let b = network.register("ben", "pw2").unwrap();
    let a_s = Session::user(a.id);
    let b_s = Session::user(b.id);
    network.follow(&b_s, a.id).unwrap();
    network.add_close_friend(&b_s, a.id).unwrap();
    network.create_post(&a_s, "line one\nline | two").unwrap();
    let media_post = network
        .create_media_post(&a_s, "", MediaKind::Image, &source, "beach")
        .unwrap();
    network.send_message(&a_s, b.id, "hi ben").unwrap();
    db::save(&network, &data).unwrap();

    let stored = network.post(media_post).unwrap().media.clone().unwrap();
    assert!(Path::new(&stored.path).ends_with("images/user_1_post_2.PNG"));
    assert!(Path::new(&stored.path).exists());

    let mut reloaded = network_at(&clock, &media);
    let report = db::load(&mut reloaded, &data).unwrap();
    assert_eq!(report.skipped, 0);
    assert_eq!(reloaded.snapshot().users.len(), 2);
    assert_eq!(
        serde_json::to_value(reloaded.snapshot()).unwrap(),
        serde_json::to_value(network.snapshot()).unwrap()
    );

    // counters keep going after a reload
    let next = reloaded.create_post(&a_s, "after reload").unwrap();
    assert_eq!(next, 3);
    assert!(reloaded.is_close_friend(b.id, a.id));
}

#[test]
fn test_load_from_empty_dir() {
    let dir = tempfile::tempdir().unwrap();
    let mut network = Network::new(dir.path().join("media"));
    let report = db::load(&mut network, dir.path()).unwrap();
    assert_eq!((report.loaded, report.skipped), (0, 0));
    assert!(network.users().is_empty());
}

#[test]
fn test_console_session() {
    let dir = tempfile::tempdir().unwrap();
    let mut console = Console::new(Network::new(dir.path().join("media")), dir.path().to_path_buf());

    let mut run = |line: &str| match console.handle_line(line) {
        Flow::Continue(text) | Flow::Exit(text) => text,
    };

    assert_eq!(run("register anna pw1"), "User registered successfully! User ID: 1");
    assert_eq!(run("register ben pw2"), "User registered successfully! User ID: 2");
    assert_eq!(run("login ben nope"), "Error: Invalid username or password");
    assert_eq!(run("login anna pw1"), "Login successful! Welcome @anna!");
    assert_eq!(run("follow 2"), "You are now following @ben!");
    assert_eq!(run("add-close-friend 2"), "@ben added to your close friends list!");
    assert_eq!(run("send 2 \"see you at 5\""), "Message sent to @ben!");
    assert_eq!(run("logout"), "Logged out successfully!");

    assert_eq!(run("login ben pw2"), "Login successful! Welcome @ben!");
    assert!(run("notifications").contains("anna started following you"));
    assert!(run("conversation 1").contains("anna: see you at 5"));
    assert!(run("feed").starts_with("No posts to display"));

    match console.handle_line("exit") {
        Flow::Exit(text) => assert_eq!(text, "Data saved successfully."),
        other => panic!("expected exit, got {:?}", other),
    }
    assert!(dir.path().join("users.dat").exists());
}
