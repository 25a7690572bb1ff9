//! Room relay over real WebSocket connections.

use crate::test_utils::{setup_test_app, setup_test_app_with, wait_until, StubModerator, TestApp};
use campus_common::Role;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{client::IntoClientRequest, Message},
    MaybeTlsStream, WebSocketStream,
};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn connect(app: &TestApp) -> Client {
    let addr = app.spawn_server().await;
    let (stream, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    stream
}

async fn connect_to(addr: std::net::SocketAddr) -> Client {
    let (stream, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    stream
}

async fn send(client: &mut Client, frame: Value) {
    client.send(Message::Text(frame.to_string().into())).await.unwrap();
}

async fn join(client: &mut Client, room: &str) {
    send(client, json!({"event": "join-room", "data": room})).await;
}

async fn say(client: &mut Client, room: &str, payload: Value) {
    send(client, json!({"event": "message", "data": {"roomId": room, "payload": payload}})).await;
}

/// Next relayed text frame, parsed
async fn next_event(client: &mut Client) -> Value {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .unwrap();
        if let Message::Text(text) = message {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

/// Assert nothing arrives within a short window
async fn assert_silent(client: &mut Client) {
    let result = tokio::time::timeout(Duration::from_millis(200), client.next()).await;
    assert!(result.is_err(), "unexpected frame: {result:?}");
}

#[tokio::test]
async fn test_room_scenario() {
    let app = setup_test_app().await;
    let addr = app.spawn_server().await;
    let mut c1 = connect_to(addr).await;
    let mut c2 = connect_to(addr).await;

    join(&mut c1, "room-42").await;
    join(&mut c2, "room-42").await;
    let relay = app.state.relay.clone();
    wait_until(|| relay.members("room-42").len() == 2).await;

    say(&mut c1, "room-42", json!({"text": "hi"})).await;
    let expected = json!({"event": "message", "data": {"roomId": "room-42", "payload": {"text": "hi"}}});
    assert_eq!(next_event(&mut c1).await, expected);
    assert_eq!(next_event(&mut c2).await, expected);

    c1.close(None).await.unwrap();
    wait_until(|| relay.members("room-42").len() == 1).await;

    say(&mut c2, "room-42", json!({"text": "bye"})).await;
    assert_eq!(next_event(&mut c2).await["data"]["payload"], json!({"text": "bye"}));

    c2.close(None).await.unwrap();
    wait_until(|| relay.connection_count() == 0).await;
    assert!(!relay.has_room("room-42"));
}

#[tokio::test]
async fn test_messages_stay_in_their_room() {
    let app = setup_test_app().await;
    let addr = app.spawn_server().await;
    let mut c1 = connect_to(addr).await;
    let mut c2 = connect_to(addr).await;

    join(&mut c1, "chess").await;
    join(&mut c2, "robotics").await;
    let relay = app.state.relay.clone();
    wait_until(|| relay.room_count() == 2).await;

    say(&mut c1, "chess", json!("e4")).await;
    assert_eq!(next_event(&mut c1).await["data"]["payload"], "e4");
    assert_silent(&mut c2).await;
}

#[tokio::test]
async fn test_malformed_frames_are_dropped() {
    let app = setup_test_app().await;
    let mut client = connect(&app).await;

    client.send(Message::Text("not json".into())).await.unwrap();
    send(&mut client, json!({"event": "message", "data": {"payload": "no room"}})).await;
    assert_silent(&mut client).await;

    // The connection survives and still works
    join(&mut client, "room").await;
    let relay = app.state.relay.clone();
    wait_until(|| relay.members("room").len() == 1).await;
    say(&mut client, "room", json!(1)).await;
    assert_eq!(next_event(&mut client).await["data"]["payload"], 1);
}

#[tokio::test]
async fn test_per_sender_order_is_preserved() {
    let app = setup_test_app().await;
    let addr = app.spawn_server().await;
    let mut sender = connect_to(addr).await;
    let mut receiver = connect_to(addr).await;

    join(&mut receiver, "ordered").await;
    let relay = app.state.relay.clone();
    wait_until(|| relay.members("ordered").len() == 1).await;

    // The sender never joins: membership is not required to send
    for i in 0..50 {
        say(&mut sender, "ordered", json!(i)).await;
    }
    for i in 0..50 {
        assert_eq!(next_event(&mut receiver).await["data"]["payload"], i);
    }
    assert_silent(&mut sender).await;
}

#[tokio::test]
async fn test_sender_echo_can_be_disabled() {
    let app = setup_test_app_with(|s| s.relay.echo_to_sender = false, StubModerator::flagging()).await;
    let addr = app.spawn_server().await;
    let mut c1 = connect_to(addr).await;
    let mut c2 = connect_to(addr).await;

    join(&mut c1, "quiet").await;
    join(&mut c2, "quiet").await;
    let relay = app.state.relay.clone();
    wait_until(|| relay.members("quiet").len() == 2).await;

    say(&mut c1, "quiet", json!("hello")).await;
    assert_eq!(next_event(&mut c2).await["data"]["payload"], "hello");
    assert_silent(&mut c1).await;
}

#[tokio::test]
async fn test_relay_can_require_a_session() {
    let app = setup_test_app_with(|s| s.relay.require_session = true, StubModerator::flagging()).await;
    let addr = app.spawn_server().await;

    let err = connect_async(format!("ws://{addr}/ws")).await.unwrap_err();
    match err {
        tokio_tungstenite::tungstenite::Error::Http(response) => {
            assert_eq!(response.status(), 401);
        },
        other => panic!("expected HTTP 401, got {other:?}"),
    }

    let (_, token) = app.user_with_session("Ada", "ada@campus.edu", Role::User).await;
    let mut request = format!("ws://{addr}/ws").into_client_request().unwrap();
    request
        .headers_mut()
        .insert("Authorization", format!("Bearer {token}").parse().unwrap());
    let (mut client, _) = connect_async(request).await.unwrap();

    join(&mut client, "members-only").await;
    let relay = app.state.relay.clone();
    wait_until(|| relay.members("members-only").len() == 1).await;
}

#[tokio::test]
async fn test_relay_shutdown_closes_connections() {
    let app = setup_test_app().await;
    let mut client = connect(&app).await;
    join(&mut client, "room").await;
    let relay = app.state.relay.clone();
    wait_until(|| relay.connection_count() == 1).await;

    relay.shutdown();

    let ended = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match client.next().await {
                None | Some(Err(_)) | Some(Ok(Message::Close(_))) => break,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(ended.is_ok(), "connection was not closed after shutdown");
}
