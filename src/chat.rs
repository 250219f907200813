//! Realtime chat client.
//!
//! Speaks the backend's plain-WebSocket realtime endpoint with
//! internally tagged `{"event": ..., "data": ...}` frames. On connect
//! the client joins with its display name; the server answers with
//! `messages:history` and keeps pushing `message:new` / `users:online`.
//! A dropped connection is retried a fixed number of times with a fixed
//! delay, rejoining (and so re-requesting history) each time.

use std::sync::OnceLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::config::ApiConfig;
use crate::models::ChatMessage;

const RECONNECT_ATTEMPTS: u32 = 5;
const RECONNECT_DELAY_MS: u64 = 1_000;

static BOOK_LINK_RE: OnceLock<Regex> = OnceLock::new();

/// Pull book ids out of embedded `/book?id=N` links.
pub fn extract_book_ids(text: &str) -> Vec<i64> {
    let re = BOOK_LINK_RE
        .get_or_init(|| Regex::new(r"/book\?id=(\d+)").expect("valid book link regex"));
    re.captures_iter(text)
        .filter_map(|capture| capture.get(1))
        .filter_map(|group| group.as_str().parse().ok())
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    /// The session task has ended; sends have nowhere to go.
    #[error("chat session is closed")]
    Closed,
}

/// Client-to-server events.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "user:join")]
    UserJoin { username: String },

    #[serde(rename = "message:send")]
    MessageSend {
        username: String,
        text: String,
        #[serde(rename = "bookIds", skip_serializing_if = "Option::is_none")]
        book_ids: Option<Vec<i64>>,
    },
}

/// Server-to-client events.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "message:new")]
    MessageNew(WireMessage),

    #[serde(rename = "messages:history")]
    MessagesHistory(Vec<WireMessage>),

    #[serde(rename = "users:online")]
    UsersOnline(Vec<String>),

    #[serde(rename = "error")]
    Error(WireError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireError {
    #[serde(default)]
    pub message: Option<String>,
}

/// A chat message as the wire carries it. Ids arrive as numbers or
/// strings, book ids likewise, timestamps as RFC 3339 text or unix
/// milliseconds; everything is normalized before the rest of the app
/// sees it.
#[derive(Debug, Clone, Deserialize)]
pub struct WireMessage {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub text: String,
    #[serde(rename = "bookIds", default)]
    pub book_ids: Option<Vec<Value>>,
    #[serde(default)]
    pub timestamp: Option<Value>,
}

impl WireMessage {
    pub fn into_message(self) -> ChatMessage {
        let id = self.id.and_then(|value| match value {
            Value::String(text) => Some(text),
            Value::Number(number) => Some(number.to_string()),
            _ => None,
        });
        let book_ids = self.book_ids.map(|entries| {
            entries
                .iter()
                .filter_map(|entry| match entry {
                    Value::Number(number) => number.as_i64(),
                    Value::String(text) => text.trim().parse().ok(),
                    _ => None,
                })
                .collect::<Vec<i64>>()
        });
        let book_ids = book_ids.filter(|ids| !ids.is_empty());
        ChatMessage {
            id,
            username: self.username,
            text: self.text,
            book_ids,
            timestamp: self.timestamp.and_then(parse_wire_timestamp).unwrap_or_else(Utc::now),
        }
    }
}

fn parse_wire_timestamp(value: Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(text) => DateTime::parse_from_rfc3339(&text)
            .map(|parsed| parsed.with_timezone(&Utc))
            .ok(),
        Value::Number(number) => number.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

/// State changes the session task reports back to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatUpdate {
    Connected,
    Disconnected,
    Message(ChatMessage),
    History(Vec<ChatMessage>),
    OnlineUsers(Vec<String>),
    Error(String),
}

#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub url: String,
    pub username: String,
    pub reconnect_attempts: u32,
    pub reconnect_delay: Duration,
}

impl ChatConfig {
    pub fn new(url: impl Into<String>, username: impl Into<String>) -> ChatConfig {
        ChatConfig {
            url: url.into(),
            username: username.into(),
            reconnect_attempts: RECONNECT_ATTEMPTS,
            reconnect_delay: Duration::from_millis(RECONNECT_DELAY_MS),
        }
    }

    /// `None` when the deployment profile cannot carry realtime traffic.
    pub fn from_api(config: &ApiConfig, username: impl Into<String>) -> Option<ChatConfig> {
        if !config.ws_enabled {
            return None;
        }
        Some(ChatConfig::new(config.ws_plain.clone(), username))
    }
}

/// Handle for the running session: send messages, hang up.
pub struct ChatHandle {
    username: String,
    events: UnboundedSender<ClientEvent>,
    cancel: CancellationToken,
}

impl ChatHandle {
    /// Empty and whitespace-only messages are dropped silently, the way
    /// the compose box behaves.
    pub fn send_message(&self, text: &str) -> Result<(), ChatError> {
        if text.trim().is_empty() {
            return Ok(());
        }
        let book_ids = extract_book_ids(text);
        let event = ClientEvent::MessageSend {
            username: self.username.clone(),
            text: text.to_string(),
            book_ids: if book_ids.is_empty() { None } else { Some(book_ids) },
        };
        self.events.send(event).map_err(|_| ChatError::Closed)
    }

    pub fn disconnect(&self) {
        self.cancel.cancel();
    }
}

/// Spawn the session task. Updates arrive on the returned receiver until
/// the session ends (cancelled, or reconnect attempts exhausted).
pub fn connect(config: ChatConfig) -> (ChatHandle, UnboundedReceiver<ChatUpdate>) {
    let (updates_tx, updates_rx) = mpsc::unbounded_channel();
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let handle = ChatHandle {
        username: config.username.clone(),
        events: events_tx,
        cancel: cancel.clone(),
    };
    tokio::spawn(run_session(config, updates_tx, events_rx, cancel));
    (handle, updates_rx)
}

enum SessionEnd {
    Dropped,
    Cancelled,
}

async fn run_session(
    config: ChatConfig,
    updates: UnboundedSender<ChatUpdate>,
    mut outgoing: UnboundedReceiver<ClientEvent>,
    cancel: CancellationToken,
) {
    let mut attempts_left = config.reconnect_attempts;
    loop {
        match open_socket(&config).await {
            Ok(socket) => {
                attempts_left = config.reconnect_attempts;
                let _ = updates.send(ChatUpdate::Connected);
                let end = drive(socket, &config, &updates, &mut outgoing, &cancel).await;
                let _ = updates.send(ChatUpdate::Disconnected);
                if matches!(end, SessionEnd::Cancelled) {
                    return;
                }
            }
            Err(err) => {
                log::warn!("chat connection to {} failed: {err}", config.url);
                let _ = updates.send(ChatUpdate::Error(err.to_string()));
            }
        }

        if cancel.is_cancelled() {
            return;
        }
        if attempts_left == 0 {
            log::warn!("chat reconnect attempts exhausted for {}", config.url);
            let _ = updates.send(ChatUpdate::Error("chat connection lost".to_string()));
            return;
        }
        attempts_left -= 1;
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(config.reconnect_delay) => {}
        }
    }
}

type Socket = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

async fn open_socket(config: &ChatConfig) -> Result<Socket, ChatError> {
    let client_id = uuid::Uuid::new_v4();
    let url = format!("{}?clientId={client_id}", config.url.trim_end_matches('/'));
    let (socket, _response) = connect_async(&url)
        .await
        .map_err(|err| ChatError::Connection(format!("failed to connect to {}: {err}", config.url)))?;
    log::info!("connected to chat at {} as {}", config.url, config.username);
    Ok(socket)
}

async fn drive(
    socket: Socket,
    config: &ChatConfig,
    updates: &UnboundedSender<ChatUpdate>,
    outgoing: &mut UnboundedReceiver<ClientEvent>,
    cancel: &CancellationToken,
) -> SessionEnd {
    let (mut sink, mut stream) = socket.split();

    // Joining announces the display name and asks the server to replay
    // history for this session.
    let join = ClientEvent::UserJoin { username: config.username.clone() };
    if send_event(&mut sink, &join).await.is_err() {
        return SessionEnd::Dropped;
    }

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = sink.close().await;
                return SessionEnd::Cancelled;
            }
            event = outgoing.recv() => match event {
                Some(event) => {
                    if send_event(&mut sink, &event).await.is_err() {
                        return SessionEnd::Dropped;
                    }
                }
                None => {
                    let _ = sink.close().await;
                    return SessionEnd::Cancelled;
                }
            },
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(raw))) => dispatch_frame(&raw, updates),
                Some(Ok(Message::Close(_))) | None => return SessionEnd::Dropped,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    log::warn!("chat stream error: {err}");
                    return SessionEnd::Dropped;
                }
            },
        }
    }
}

async fn send_event<S>(sink: &mut S, event: &ClientEvent) -> Result<(), ChatError>
where
    S: futures_util::Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    let raw = serde_json::to_string(event).map_err(|err| ChatError::Protocol(err.to_string()))?;
    sink.send(Message::Text(raw))
        .await
        .map_err(|err| ChatError::Connection(err.to_string()))
}

fn dispatch_frame(raw: &str, updates: &UnboundedSender<ChatUpdate>) {
    let event: ServerEvent = match serde_json::from_str(raw) {
        Ok(event) => event,
        Err(err) => {
            // Unknown event names fall out here; log and keep reading.
            log::warn!("unreadable chat frame: {err}");
            return;
        }
    };
    let update = match event {
        ServerEvent::MessageNew(message) => ChatUpdate::Message(message.into_message()),
        ServerEvent::MessagesHistory(messages) => ChatUpdate::History(
            messages.into_iter().map(WireMessage::into_message).collect(),
        ),
        ServerEvent::UsersOnline(users) => ChatUpdate::OnlineUsers(users),
        ServerEvent::Error(error) => ChatUpdate::Error(
            error.message.unwrap_or_else(|| "chat error".to_string()),
        ),
    };
    let _ = updates.send(update);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_book_ids_from_links() {
        let text = "compare /book?id=3 with /book?id=41, nothing else";
        assert_eq!(extract_book_ids(text), vec![3, 41]);
        assert!(extract_book_ids("no links here").is_empty());
    }

    #[test]
    fn join_event_serializes_to_the_wire_shape() {
        let event = ClientEvent::UserJoin { username: "Reader".to_string() };
        let raw = serde_json::to_value(&event).expect("serialize");
        assert_eq!(raw, json!({ "event": "user:join", "data": { "username": "Reader" } }));
    }

    #[test]
    fn send_event_omits_empty_book_ids() {
        let bare = ClientEvent::MessageSend {
            username: "Reader".to_string(),
            text: "hello".to_string(),
            book_ids: None,
        };
        let raw = serde_json::to_value(&bare).expect("serialize");
        assert_eq!(raw["data"], json!({ "username": "Reader", "text": "hello" }));

        let linked = ClientEvent::MessageSend {
            username: "Reader".to_string(),
            text: "see /book?id=7".to_string(),
            book_ids: Some(vec![7]),
        };
        let raw = serde_json::to_value(&linked).expect("serialize");
        assert_eq!(raw["data"]["bookIds"], json!([7]));
    }

    #[test]
    fn parses_new_message_with_mixed_id_shapes() {
        let raw = json!({
            "event": "message:new",
            "data": {
                "id": 17,
                "username": "Reader",
                "text": "see /book?id=7",
                "bookIds": ["7", 9],
                "timestamp": "2024-05-01T10:00:00+00:00",
            },
        })
        .to_string();
        let event: ServerEvent = serde_json::from_str(&raw).expect("parse");
        let message = match event {
            ServerEvent::MessageNew(message) => message.into_message(),
            other => panic!("unexpected event {other:?}"),
        };
        assert_eq!(message.id.as_deref(), Some("17"));
        assert_eq!(message.book_ids, Some(vec![7, 9]));
        assert_eq!(message.timestamp.to_rfc3339(), "2024-05-01T10:00:00+00:00");
    }

    #[test]
    fn missing_timestamp_falls_back_to_now() {
        let wire = WireMessage {
            id: None,
            username: "Reader".to_string(),
            text: "hi".to_string(),
            book_ids: None,
            timestamp: None,
        };
        let before = Utc::now();
        let message = wire.into_message();
        assert!(message.timestamp >= before);
        assert!(message.id.is_none());
    }

    #[test]
    fn millisecond_timestamps_are_understood() {
        assert_eq!(
            parse_wire_timestamp(json!(1_714_557_600_000_i64))
                .expect("parsed")
                .to_rfc3339(),
            "2024-05-01T10:00:00+00:00"
        );
    }

    #[test]
    fn parses_history_online_and_error_events() {
        let history: ServerEvent = serde_json::from_str(
            &json!({ "event": "messages:history", "data": [
                { "id": "a", "username": "u", "text": "t" },
            ]})
            .to_string(),
        )
        .expect("parse");
        assert!(matches!(history, ServerEvent::MessagesHistory(ref messages) if messages.len() == 1));

        let online: ServerEvent = serde_json::from_str(
            &json!({ "event": "users:online", "data": ["a", "b"] }).to_string(),
        )
        .expect("parse");
        assert!(matches!(online, ServerEvent::UsersOnline(ref users) if users.len() == 2));

        let error: ServerEvent = serde_json::from_str(
            &json!({ "event": "error", "data": { "message": "full" } }).to_string(),
        )
        .expect("parse");
        assert!(matches!(error, ServerEvent::Error(ref e) if e.message.as_deref() == Some("full")));
    }

    #[test]
    fn chat_config_defaults_match_the_reconnect_policy() {
        let config = ChatConfig::new("ws://backend:8082", "Reader");
        assert_eq!(config.reconnect_attempts, 5);
        assert_eq!(config.reconnect_delay, Duration::from_millis(1_000));
    }

    #[test]
    fn chat_is_disabled_when_the_profile_cannot_carry_websockets() {
        let deployed = ApiConfig::deployed("backend.local");
        assert!(ChatConfig::from_api(&deployed, "Reader").is_none());

        let development = ApiConfig::development("backend.local");
        let config = ChatConfig::from_api(&development, "Reader").expect("enabled");
        assert_eq!(config.url, "ws://backend.local:8082");
    }

    #[tokio::test]
    async fn session_joins_receives_and_sends_over_a_live_socket() {
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("addr");

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut socket = tokio_tungstenite::accept_async(stream).await.expect("handshake");

            // First frame must be the join.
            let frame = socket.next().await.expect("join frame").expect("ok");
            let join: Value = serde_json::from_str(frame.to_text().expect("text")).expect("json");
            assert_eq!(join["event"], "user:join");
            assert_eq!(join["data"]["username"], "Reader");

            let history = json!({ "event": "messages:history", "data": [
                { "id": 1, "username": "earlier", "text": "old news" },
            ]})
            .to_string();
            socket.send(Message::Text(history)).await.expect("send history");

            // Wait for the client's message, then echo it back as new.
            let frame = socket.next().await.expect("send frame").expect("ok");
            let sent: Value = serde_json::from_str(frame.to_text().expect("text")).expect("json");
            assert_eq!(sent["event"], "message:send");
            assert_eq!(sent["data"]["bookIds"], json!([7]));

            let broadcast = json!({ "event": "message:new", "data": {
                "id": 2,
                "username": "Reader",
                "text": sent["data"]["text"],
            }})
            .to_string();
            socket.send(Message::Text(broadcast)).await.expect("send new");
            socket.close(None).await.expect("close");
        });

        let mut config = ChatConfig::new(format!("ws://{address}"), "Reader");
        config.reconnect_attempts = 0;
        let (handle, mut updates) = connect(config);

        async fn recv(updates: &mut UnboundedReceiver<ChatUpdate>) -> ChatUpdate {
            tokio::time::timeout(Duration::from_secs(5), updates.recv())
                .await
                .expect("update in time")
                .expect("channel open")
        }

        assert_eq!(recv(&mut updates).await, ChatUpdate::Connected);
        match recv(&mut updates).await {
            ChatUpdate::History(messages) => {
                assert_eq!(messages.len(), 1);
                assert_eq!(messages[0].text, "old news");
            }
            other => panic!("expected history, got {other:?}"),
        }

        handle.send_message("look at /book?id=7").expect("send accepted");
        match recv(&mut updates).await {
            ChatUpdate::Message(message) => assert_eq!(message.id.as_deref(), Some("2")),
            other => panic!("expected message, got {other:?}"),
        }

        assert_eq!(recv(&mut updates).await, ChatUpdate::Disconnected);
        server.await.expect("server task");
    }
}
