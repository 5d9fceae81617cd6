//! End-to-end tests: real `ClientSession`s talking through a real relay
//! server on loopback.

use std::sync::Arc;
use std::time::Duration;

use lanchat_client::application::{ChannelSink, IncomingEvent, SinkMessage};
use lanchat_client::infrastructure::network::{ClientError, ClientSession};
use lanchat_core::{EventKind, MAX_FRAME_LEN};
use lanchat_server::infrastructure::network::{RelayServer, ServerHandle};
use lanchat_server::infrastructure::storage::ServerConfig;
use tokio::sync::mpsc::UnboundedReceiver;

const STEP: Duration = Duration::from_secs(5);

async fn start_server() -> ServerHandle {
    let mut config = ServerConfig::default();
    config.network.bind_address = "127.0.0.1".into();
    config.network.port = 0;
    config.network.bind_attempts = 1;
    RelayServer::bind(&config).await.unwrap().start()
}

struct Participant {
    session: ClientSession,
    events: UnboundedReceiver<SinkMessage>,
}

async fn join(handle: &ServerHandle, username: &str) -> Participant {
    let before = handle.relay().registry().len();
    let (sink, events) = ChannelSink::channel();
    let session = ClientSession::connect(&handle.local_addr().to_string(), username, Arc::new(sink))
        .await
        .unwrap();
    let relay = handle.relay();
    tokio::time::timeout(STEP, async {
        while relay.registry().len() <= before {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("server never registered the session");
    Participant { session, events }
}

async fn next(events: &mut UnboundedReceiver<SinkMessage>) -> SinkMessage {
    tokio::time::timeout(STEP, events.recv())
        .await
        .expect("no event in time")
        .expect("sink channel closed")
}

fn event(kind: EventKind, username: &str, text: &str) -> SinkMessage {
    SinkMessage::Event(IncomingEvent {
        kind,
        username: username.into(),
        text: text.into(),
    })
}

#[tokio::test]
async fn test_alice_and_bob_scenario() {
    // Arrange: alice speaks before bob arrives
    let server = start_server().await;
    let mut alice = join(&server, "alice").await;
    alice.session.send("hi").await.unwrap();
    let relay = server.relay();
    tokio::time::timeout(STEP, async {
        while relay.history_len() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    // Act
    let mut bob = join(&server, "bob").await;
    assert_eq!(
        next(&mut alice.events).await,
        event(EventKind::Joined, "bob", "bob joined the chat")
    );
    alice.session.send("welcome").await.unwrap();

    // Assert: bob's first event is the later message, not "hi"
    assert_eq!(
        next(&mut bob.events).await,
        event(EventKind::Text, "alice", "welcome")
    );

    bob.session.disconnect().await;
    assert_eq!(
        next(&mut alice.events).await,
        event(EventKind::Left, "bob", "bob left the chat")
    );

    alice.session.disconnect().await;
    server.stop().await;
}

#[tokio::test]
async fn test_message_with_colons_keeps_body_intact() {
    let server = start_server().await;
    let mut a = join(&server, "a").await;
    let mut b = join(&server, "b").await;
    next(&mut a.events).await;

    a.session.send("meet at 12:30: room 4").await.unwrap();

    assert_eq!(
        next(&mut b.events).await,
        event(EventKind::Text, "a", "meet at 12:30: room 4")
    );
    server.stop().await;
}

#[tokio::test]
async fn test_disconnect_twice_has_no_further_effect() {
    // Arrange
    let server = start_server().await;
    let mut watcher = join(&server, "watcher").await;
    let mut leaver = join(&server, "leaver").await;
    next(&mut watcher.events).await;

    // Act
    leaver.session.disconnect().await;
    leaver.session.disconnect().await;

    // Assert: one leave event, sending is refused, and no disconnected callback
    assert_eq!(
        next(&mut watcher.events).await,
        event(EventKind::Left, "leaver", "leaver left the chat")
    );
    assert!(matches!(
        leaver.session.send("still here?").await,
        Err(ClientError::Disconnected)
    ));
    assert!(!leaver.session.is_connected());
    assert!(leaver.events.try_recv().is_err());

    watcher.session.send("ping").await.unwrap();
    let relay = server.relay();
    tokio::time::timeout(STEP, async {
        while relay.history_len() < 4 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(relay.history().len(), 4);

    server.stop().await;
}

#[tokio::test]
async fn test_server_stop_reaches_client_sink() {
    // Arrange
    let server = start_server().await;
    let mut guest = join(&server, "guest").await;

    // Act
    server.stop().await;

    // Assert
    assert_eq!(
        next(&mut guest.events).await,
        event(EventKind::Notice, "SERVER", "server shutting down")
    );
    assert_eq!(next(&mut guest.events).await, SinkMessage::Disconnected);
    tokio::time::timeout(STEP, guest.session.closed())
        .await
        .unwrap();
    assert!(!guest.session.is_connected());
}

#[tokio::test]
async fn test_oversized_line_is_rejected_locally() {
    let server = start_server().await;
    let mut talker = join(&server, "talker").await;

    let result = talker.session.send(&"x".repeat(MAX_FRAME_LEN + 1)).await;

    assert!(matches!(result, Err(ClientError::Frame(_))));
    talker.session.send("still fine").await.unwrap();
    server.stop().await;
}
