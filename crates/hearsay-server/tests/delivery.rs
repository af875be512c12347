//! End-to-end delivery tests: a real server on an ephemeral port, real
//! sockets, and client sessions reconciling what the server pushes.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::net::TcpListener;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout};

use hearsay_client::{ChatSession, MessageLog, RemoteLog};
use hearsay_server::api::{self, AppState};
use hearsay_server::config::ServerConfig;
use hearsay_server::hub::Hub;
use hearsay_shared::protocol::ServerEvent;
use hearsay_shared::types::UserId;
use hearsay_store::{Database, UserRecord};

struct TestServer {
    http_url: String,
    ws_url: String,
    _dir: tempfile::TempDir,
}

async fn start_server(users: &[&UserRecord]) -> TestServer {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open_at(&dir.path().join("server.db")).unwrap();
    for user in users {
        db.upsert_user(user).unwrap();
    }

    let state = AppState {
        db: Arc::new(Mutex::new(db)),
        hub: Hub::new(),
        config: Arc::new(ServerConfig::default()),
    };
    let router = api::build_router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestServer {
        http_url: format!("http://{addr}"),
        ws_url: format!("ws://{addr}/ws"),
        _dir: dir,
    }
}

fn record(name: &str) -> UserRecord {
    UserRecord {
        id: UserId::new(),
        display_name: Some(name.to_owned()),
        avatar: None,
        created_at: Utc::now(),
    }
}

fn session(server: &TestServer, user: &UserRecord) -> ChatSession {
    let log = RemoteLog::new(&server.http_url, user.id.clone());
    ChatSession::new(user.id.clone(), Box::new(log))
}

async fn next_event(rx: &mut UnboundedReceiver<ServerEvent>) -> ServerEvent {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for a server event")
        .expect("event stream closed")
}

#[tokio::test]
async fn online_receiver_reconciles_both_channels() {
    let alice = record("Alice");
    let bob = record("Bob");
    let server = start_server(&[&alice, &bob]).await;

    let mut a = session(&server, &alice);
    let mut b = session(&server, &bob);
    let _a_rx = a.connect(&server.ws_url).await.unwrap();
    let mut b_rx = b.connect(&server.ws_url).await.unwrap();
    sleep(Duration::from_millis(50)).await; // identify is fire-and-forget

    // Alice starts the chat; Bob is pushed his perspective of it.
    let chat_id = a.create_chat(&bob.id).await.unwrap();
    let pushed = next_event(&mut b_rx).await;
    assert!(matches!(pushed, ServerEvent::NewChat(_)));
    b.apply_event(pushed);
    assert_eq!(b.chat_list().chats()[0].id, chat_id);
    assert_eq!(b.chat_list().badge(), 1);

    // First message lands while Bob's window is closed: direct channel only.
    a.open_chat(&chat_id).await.unwrap();
    a.send_message("hi").await.unwrap();
    let event = next_event(&mut b_rx).await;
    assert!(matches!(event, ServerEvent::UpdateChatList(_)));
    b.apply_event(event);
    {
        let chat = b.chat_list().get(&chat_id).unwrap();
        assert_eq!(chat.last_message.as_deref(), Some("hi"));
        assert_eq!(chat.unread_count, 1);
    }
    assert_eq!(b.chat_list().chats()[0].id, chat_id);

    // Opening the chat clears the unread state.
    b.open_chat(&chat_id).await.unwrap();
    sleep(Duration::from_millis(50)).await; // let joinRoom land
    assert_eq!(b.chat_list().badge(), 0);
    assert_eq!(b.window().unwrap().messages().len(), 1);

    // Second message reaches Bob twice, room broadcast and direct notify;
    // the merged result is the same whatever the arrival order.
    a.send_message("you there?").await.unwrap();
    for _ in 0..2 {
        let event = next_event(&mut b_rx).await;
        b.apply_event(event);
    }
    assert_eq!(b.window().unwrap().messages().len(), 2);
    let chat = b.chat_list().get(&chat_id).unwrap();
    assert_eq!(chat.last_message.as_deref(), Some("you there?"));
    assert!(chat.seen_by.contains(&bob.id));
    assert_eq!(chat.unread_count, 0);
    assert_eq!(b.chat_list().badge(), 0);
}

#[tokio::test]
async fn soft_delete_reaches_the_counterpart_directly() {
    let alice = record("Alice");
    let bob = record("Bob");
    let server = start_server(&[&alice, &bob]).await;

    let mut a = session(&server, &alice);
    let mut b = session(&server, &bob);
    let _a_rx = a.connect(&server.ws_url).await.unwrap();
    let mut b_rx = b.connect(&server.ws_url).await.unwrap();
    sleep(Duration::from_millis(50)).await;

    let chat_id = a.create_chat(&bob.id).await.unwrap();
    a.open_chat(&chat_id).await.unwrap();
    a.send_message("keep").await.unwrap();
    sleep(Duration::from_millis(2)).await;
    a.send_message("regret").await.unwrap();

    // Bob saw the chat appear and both sends, then opens the window.
    for _ in 0..3 {
        let event = next_event(&mut b_rx).await;
        b.apply_event(event);
    }
    b.open_chat(&chat_id).await.unwrap();
    sleep(Duration::from_millis(50)).await;
    assert_eq!(b.window().unwrap().messages().len(), 2);

    let doomed = a.window().unwrap().messages()[1].id.clone();
    a.toggle_select(&doomed);
    a.delete_selected().await.unwrap();

    let event = next_event(&mut b_rx).await;
    match &event {
        ServerEvent::MessagesSoftDeleted {
            new_last_message, ..
        } => assert_eq!(new_last_message.as_str(), "keep"),
        other => panic!("expected a soft delete push, got {other:?}"),
    }
    b.apply_event(event);

    let window = b.window().unwrap();
    assert_eq!(window.messages().len(), 2);
    assert_eq!(window.messages()[0].text, "keep");
    assert_eq!(window.messages()[1].text, "This message was deleted");
    let chat = b.chat_list().get(&chat_id).unwrap();
    assert_eq!(chat.last_message.as_deref(), Some("keep"));

    // The deletion rides the direct channel only; no room copy follows.
    sleep(Duration::from_millis(100)).await;
    assert!(b_rx.try_recv().is_err());
}

#[tokio::test]
async fn first_connection_keeps_presence() {
    let alice = record("Alice");
    let bob = record("Bob");
    let server = start_server(&[&alice, &bob]).await;

    // Alice identifies from two sockets in turn; the first claim stands.
    let mut a1 = session(&server, &alice);
    let mut a2 = session(&server, &alice);
    let mut a1_rx = a1.connect(&server.ws_url).await.unwrap();
    sleep(Duration::from_millis(50)).await;
    let mut a2_rx = a2.connect(&server.ws_url).await.unwrap();

    let mut b = session(&server, &bob);
    let _b_rx = b.connect(&server.ws_url).await.unwrap();
    sleep(Duration::from_millis(50)).await;

    let _chat_id = b.create_chat(&alice.id).await.unwrap();

    let event = next_event(&mut a1_rx).await;
    assert!(matches!(event, ServerEvent::NewChat(_)));
    sleep(Duration::from_millis(100)).await;
    assert!(a2_rx.try_recv().is_err());
}

#[tokio::test]
async fn offline_receiver_catches_up_from_the_log() {
    let alice = record("Alice");
    let bob = record("Bob");
    let server = start_server(&[&alice, &bob]).await;

    // Alice writes while Bob has no socket at all.
    let mut a = session(&server, &alice);
    let chat_id = a.create_chat(&bob.id).await.unwrap();
    a.open_chat(&chat_id).await.unwrap();
    a.send_message("hi").await.unwrap();

    // Bob's next fetch recovers everything delivery would have pushed.
    let mut b = session(&server, &bob);
    b.load_chats().await.unwrap();
    {
        let chat = b.chat_list().get(&chat_id).unwrap();
        assert_eq!(chat.last_message.as_deref(), Some("hi"));
        assert!(!chat.seen_by.contains(&bob.id));
    }
    assert_eq!(b.chat_list().badge(), 1);

    b.open_chat(&chat_id).await.unwrap();
    assert_eq!(b.window().unwrap().messages().len(), 1);
    assert_eq!(b.chat_list().badge(), 0);
}

#[tokio::test]
async fn empty_delete_batch_is_rejected() {
    let alice = record("Alice");
    let bob = record("Bob");
    let server = start_server(&[&alice, &bob]).await;

    let log = RemoteLog::new(&server.http_url, alice.id.clone());
    let chat = log.create_chat(&bob.id).await.unwrap();

    let err = log.soft_delete_messages(&chat.id, &[]).await.unwrap_err();
    assert!(matches!(err, hearsay_client::ClientError::Http(_)));

    // The fresh chat's snippet never flipped to the placeholder.
    let chats = log.list_chats().await.unwrap();
    assert_eq!(chats[0].last_message, None);
}

#[tokio::test]
async fn foreign_messages_cannot_be_deleted() {
    let alice = record("Alice");
    let bob = record("Bob");
    let server = start_server(&[&alice, &bob]).await;

    let mut a = session(&server, &alice);
    let chat_id = a.create_chat(&bob.id).await.unwrap();
    a.open_chat(&chat_id).await.unwrap();
    a.send_message("untouchable").await.unwrap();
    let message_id = a.window().unwrap().messages()[0].id.clone();

    let bob_log = RemoteLog::new(&server.http_url, bob.id.clone());
    let err = bob_log
        .soft_delete_messages(&chat_id, &[message_id])
        .await
        .unwrap_err();
    assert!(matches!(err, hearsay_client::ClientError::Forbidden));

    let history = bob_log.fetch_chat(&chat_id).await.unwrap();
    assert_eq!(history.messages[0].text, "untouchable");
}
