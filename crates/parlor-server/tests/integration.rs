//! End-to-end integration tests using a real WebSocket client.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parlor_core::{ClientId, RoomId};
use parlor_rooms::{CoordinatorHandle, spawn_coordinator};
use parlor_server::config::ServerConfig;
use parlor_server::server::ParlorServer;
use parlor_server::shutdown::ShutdownCoordinator;
use parlor_settings::RoomSettings;
use serde_json::{Value, json};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};

const TIMEOUT: Duration = Duration::from_secs(5);

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Boot a test server and return its base WS URL plus the server.
async fn boot_server() -> (String, Arc<ParlorServer>) {
    let (url, server, _) = boot_server_with(ServerConfig::default()).await; // port 0 = auto-assign
    (url, server)
}

async fn boot_server_with(config: ServerConfig) -> (String, Arc<ParlorServer>, CoordinatorHandle) {
    let shutdown = Arc::new(ShutdownCoordinator::new());
    let (coordinator, _task) = spawn_coordinator(RoomSettings::default(), shutdown.token());
    let server = Arc::new(ParlorServer::new(config, coordinator.clone(), shutdown));

    let (addr, _handle) = server.listen().await.unwrap();
    (format!("ws://{addr}/ws"), server, coordinator)
}

async fn connect(url: &str, room: &str) -> WsStream {
    let (ws, _) = connect_async(format!("{url}?room={room}")).await.unwrap();
    ws
}

async fn reconnect(url: &str, room: &str, session_id: &str) -> WsStream {
    let (ws, _) = connect_async(format!("{url}?room={room}&sessionId={session_id}"))
        .await
        .unwrap();
    ws
}

/// Read the next text message as JSON.
async fn read_json(ws: &mut WsStream) -> Value {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("timeout waiting for message")
            .expect("stream ended")
            .expect("ws error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn expect(ws: &mut WsStream, kind: &str) -> Value {
    let event = read_json(ws).await;
    assert_eq!(event["type"], kind, "unexpected event: {event}");
    event
}

async fn send(ws: &mut WsStream, event: Value) {
    ws.send(Message::text(event.to_string())).await.unwrap();
}

/// Consume the join sequence; returns `(sessionId, init)`.
async fn joined(ws: &mut WsStream) -> (String, Value) {
    let session = expect(ws, "session").await;
    let init = expect(ws, "init").await;
    let _ = expect(ws, "participants").await;
    (session["sessionId"].as_str().unwrap().to_owned(), init)
}

/// Round-trip an application ping, proving nothing else was queued before it.
async fn assert_quiet(ws: &mut WsStream) {
    send(ws, json!({"type": "ping"})).await;
    let _ = expect(ws, "pong").await;
}

#[tokio::test]
async fn e2e_host_then_guest_join() {
    let (url, _server) = boot_server().await;

    let mut host = connect(&url, "lobby").await;
    let (host_token, host_init) = joined(&mut host).await;
    assert!(!host_token.is_empty());
    assert_eq!(host_init["isHost"], true);
    assert_eq!(host_init["colorIndex"], -1);

    let mut guest = connect(&url, "lobby").await;
    let (guest_token, guest_init) = joined(&mut guest).await;
    assert_ne!(guest_token, host_token);
    assert_eq!(guest_init["isHost"], false);
    assert_eq!(guest_init["colorIndex"], 0);
    assert_eq!(guest_init["participants"].as_array().unwrap().len(), 2);

    let update = expect(&mut host, "participants").await;
    let list = update["participants"].as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["isHost"], true);
    assert_eq!(list[1]["name"], "Guest 1");
    assert!(!update.to_string().contains(&guest_token));
}

#[tokio::test]
async fn e2e_chat_reaches_everyone() {
    let (url, _server) = boot_server().await;
    let mut host = connect(&url, "chat").await;
    let _ = joined(&mut host).await;
    let mut guest = connect(&url, "chat").await;
    let (_, guest_init) = joined(&mut guest).await;
    let _ = expect(&mut host, "participants").await;

    send(&mut guest, json!({"type": "message", "content": "hello"})).await;

    for ws in [&mut host, &mut guest] {
        let msg = expect(ws, "message").await;
        assert_eq!(msg["content"], "hello");
        assert_eq!(msg["senderId"], guest_init["clientId"]);
        assert_eq!(msg["senderName"], "Guest 1");
        assert_eq!(msg["isHost"], false);
        assert!(msg["timestamp"].as_i64().unwrap() > 0);
    }
}

#[tokio::test]
async fn e2e_name_change_broadcasts() {
    let (url, _server) = boot_server().await;
    let mut host = connect(&url, "names").await;
    let (_, init) = joined(&mut host).await;

    send(&mut host, json!({"type": "name_change", "name": "  Ada  "})).await;

    let list = expect(&mut host, "participants").await;
    assert_eq!(list["participants"][0]["name"], "Ada");
    let change = expect(&mut host, "name_change").await;
    assert_eq!(change["name"], "Ada");
    assert_eq!(change["clientId"], init["clientId"]);

    send(&mut host, json!({"type": "name_change", "name": "   "})).await;
    assert_quiet(&mut host).await;
}

#[tokio::test]
async fn e2e_typing_skips_sender() {
    let (url, _server) = boot_server().await;
    let mut host = connect(&url, "typing").await;
    let (_, host_init) = joined(&mut host).await;
    let mut guest = connect(&url, "typing").await;
    let _ = joined(&mut guest).await;
    let _ = expect(&mut host, "participants").await;

    send(&mut host, json!({"type": "typing"})).await;
    let typing = expect(&mut guest, "typing").await;
    assert_eq!(typing["clientId"], host_init["clientId"]);
    assert_eq!(typing["isHost"], true);
    assert_quiet(&mut host).await;

    send(&mut host, json!({"type": "stopTyping"})).await;
    let _ = expect(&mut guest, "stopTyping").await;
    assert_quiet(&mut host).await;
}

#[tokio::test]
async fn e2e_invalid_frames_are_ignored() {
    let (url, _server) = boot_server().await;
    let mut ws = connect(&url, "junk").await;
    let _ = joined(&mut ws).await;

    ws.send(Message::text("not valid json")).await.unwrap();
    send(&mut ws, json!({"type": "dance"})).await;
    send(&mut ws, json!({"type": "message", "content": "   "})).await;
    send(&mut ws, json!({"type": "keep_alive"})).await;

    // Connection survives and nothing was broadcast.
    assert_quiet(&mut ws).await;
}

#[tokio::test]
async fn e2e_host_reconnect_keeps_role() {
    let (url, _server) = boot_server().await;
    let mut host = connect(&url, "resume").await;
    let (token, init) = joined(&mut host).await;
    host.close(None).await.unwrap();
    drop(host);

    let mut again = reconnect(&url, "resume", &token).await;
    // Resumed sessions get no new token.
    let resumed = expect(&mut again, "init").await;
    assert_eq!(resumed["clientId"], init["clientId"]);
    assert_eq!(resumed["isHost"], true);
    let _ = expect(&mut again, "participants").await;
}

#[tokio::test]
async fn e2e_unknown_session_id_starts_fresh() {
    let (url, _server) = boot_server().await;
    let mut ws = reconnect(&url, "fresh", "not-a-real-token").await;
    let (token, init) = joined(&mut ws).await;
    assert_ne!(token, "not-a-real-token");
    assert_eq!(init["isHost"], true);
}

#[tokio::test]
async fn e2e_guest_leave_updates_participants() {
    let (url, _server) = boot_server().await;
    let mut host = connect(&url, "leave").await;
    let _ = joined(&mut host).await;
    let mut guest = connect(&url, "leave").await;
    let _ = joined(&mut guest).await;
    let _ = expect(&mut host, "participants").await;

    guest.close(None).await.unwrap();

    let update = expect(&mut host, "participants").await;
    let list = update["participants"].as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["isHost"], true);
}

#[tokio::test]
async fn e2e_rooms_are_isolated() {
    let (url, _server) = boot_server().await;
    let mut a = connect(&url, "room-a").await;
    let _ = joined(&mut a).await;
    let mut b = connect(&url, "room-b").await;
    let (_, b_init) = joined(&mut b).await;
    assert_eq!(b_init["isHost"], true);

    send(&mut a, json!({"type": "message", "content": "only a"})).await;
    let _ = expect(&mut a, "message").await;
    assert_quiet(&mut b).await;
}

#[tokio::test]
async fn e2e_missing_room_rejected() {
    let (url, _server) = boot_server().await;
    let err = connect_async(url.as_str()).await.unwrap_err();
    match err {
        tungstenite::Error::Http(resp) => assert_eq!(resp.status(), 400),
        other => panic!("expected HTTP 400, got {other:?}"),
    }
}

#[tokio::test]
async fn e2e_shutdown_closes_clients() {
    let (url, server) = boot_server().await;
    let mut ws = connect(&url, "bye").await;
    let _ = joined(&mut ws).await;

    server.shutdown().shutdown();

    let ended = timeout(TIMEOUT, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(ended.is_ok(), "client was not disconnected on shutdown");
}

#[tokio::test]
async fn e2e_silent_host_times_out_into_grace() {
    let config = ServerConfig {
        heartbeat_interval_secs: 1,
        heartbeat_timeout_secs: 2,
        ..ServerConfig::default()
    };
    let (url, _server, coordinator) = boot_server_with(config).await;
    let mut host = connect(&url, "quiet").await;
    let (_, host_init) = joined(&mut host).await;
    let mut guest = connect(&url, "quiet").await;
    let _ = joined(&mut guest).await;

    // The guest keeps reading, so its pings get answered. The host never
    // reads again.
    let reader = tokio::spawn(async move {
        while let Some(Ok(_)) = guest.next().await {}
    });

    let room = RoomId::from("quiet");
    let snapshot = timeout(Duration::from_secs(10), async {
        loop {
            let snapshot = coordinator.room_snapshot(room.clone()).await.unwrap().unwrap();
            if snapshot.host_in_grace {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    })
    .await
    .expect("silent host was never timed out");

    assert_eq!(
        snapshot.host.as_ref().map(ClientId::as_str),
        host_init["clientId"].as_str()
    );
    assert_eq!(snapshot.participants.len(), 2);
    assert_eq!(snapshot.connected, 1);
    reader.abort();
    drop(host);
}
