mod common;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Next text frame as JSON, skipping pings. Panics after two seconds of silence.
async fn next_json(socket: &mut Socket) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), socket.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("socket closed")
            .expect("socket error");

        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).expect("frame is not JSON");
        }
    }
}

async fn send_json(socket: &mut Socket, value: Value) {
    socket
        .send(Message::Text(value.to_string()))
        .await
        .expect("Failed to send frame");
}

#[actix_web::test]
async fn websocket_requires_a_token() {
    let app = common::spawn_app().await;
    let url = format!("{}/ws", app.address.replacen("http://", "ws://", 1));

    assert!(connect_async(url).await.is_err());
}

#[actix_web::test]
async fn joined_connection_receives_messages_and_presence() {
    let app = common::spawn_app().await;
    let conversation_id = app.private_conversation(&app.alice, &app.bob).await;

    let (mut socket, _) = connect_async(app.ws_url(&app.bob.token))
        .await
        .expect("Failed to connect");

    let event = next_json(&mut socket).await;
    assert_eq!(event["event"], "presence.changed");
    assert_eq!(event["payload"]["userId"], app.bob.id().to_string());
    assert_eq!(event["payload"]["online"], true);

    send_json(
        &mut socket,
        json!({"type": "join", "conversationId": conversation_id}),
    )
    .await;
    let reply = next_json(&mut socket).await;
    assert_eq!(reply["type"], "ack");
    assert_eq!(reply["command"], "join");

    let response = app
        .get(&format!("/presence/{}", app.bob.id()), &app.alice.token)
        .await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["item"]["online"], true);

    let response = app
        .post(
            "/message",
            &app.alice.token,
            json!({"conversationId": conversation_id, "content": "are you there?"}),
        )
        .await;
    assert_eq!(response.status().as_u16(), 201);

    let event = next_json(&mut socket).await;
    assert_eq!(event["event"], "message.received");
    assert_eq!(event["payload"]["conversationId"], conversation_id.to_string());
    assert_eq!(event["payload"]["senderId"], app.alice.id().to_string());
    assert_eq!(event["payload"]["content"], "are you there?");

    send_json(
        &mut socket,
        json!({"type": "mark_read", "conversationId": conversation_id}),
    )
    .await;
    // the read notification and the ack race each other
    let seen = vec![next_json(&mut socket).await, next_json(&mut socket).await];
    assert!(seen.iter().any(|f| f["type"] == "ack" && f["command"] == "mark_read"));
    assert!(seen
        .iter()
        .any(|f| f["event"] == "conversation.read"
            && f["payload"]["conversationId"] == conversation_id.to_string()));

    socket.close(None).await.expect("Failed to close");

    let mut online = true;
    for _ in 0..50 {
        let response = app
            .get(&format!("/presence/{}", app.bob.id()), &app.alice.token)
            .await;
        let body: Value = response.json().await.unwrap();
        online = body["item"]["online"].as_bool().unwrap();
        if !online {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(!online);
}

#[actix_web::test]
async fn joining_a_foreign_conversation_is_refused() {
    let app = common::spawn_app().await;
    let conversation_id = app.private_conversation(&app.alice, &app.bob).await;

    let (mut socket, _) = connect_async(app.ws_url(&app.carol.token))
        .await
        .expect("Failed to connect");
    let _presence = next_json(&mut socket).await;

    send_json(
        &mut socket,
        json!({"type": "join", "conversationId": conversation_id}),
    )
    .await;
    let reply = next_json(&mut socket).await;
    assert_eq!(reply["type"], "error");

    send_json(&mut socket, json!({"type": "online_users"})).await;
    let reply = next_json(&mut socket).await;
    assert_eq!(reply["type"], "online_users");
    assert_eq!(reply["userIds"], json!([app.carol.id()]));

    send_json(&mut socket, json!({"type": "bogus"})).await;
    let reply = next_json(&mut socket).await;
    assert_eq!(reply["type"], "error");
}
