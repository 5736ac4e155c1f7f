//! Listener for the hosted backend's realtime websocket.
//!
//! Every subscription joins one `postgres_changes` channel filtered to the
//! user's rows. Frames only trigger the subscriber's callback; the payload is
//! never read, the subscriber re-fetches instead.

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use quiz_core::model::UserId;
use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::protocol::Message;
use url::Url;

use crate::auth::AuthSession;
use crate::changes::{ChangeCallback, ChangeTable, RemoteChanges};
use crate::gateway::{BackendConfig, GatewayError};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);
const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

pub(crate) struct Realtime {
    socket_url: String,
    anon_key: String,
    session: watch::Receiver<Option<AuthSession>>,
}

impl Realtime {
    pub(crate) fn new(
        config: &BackendConfig,
        session: watch::Receiver<Option<AuthSession>>,
    ) -> Result<Self, GatewayError> {
        Ok(Self {
            socket_url: socket_url(config.base_url(), config.anon_key())?,
            anon_key: config.anon_key().to_owned(),
            session,
        })
    }
}

impl RemoteChanges for Realtime {
    fn listen(&self, table: ChangeTable, user_id: UserId, on_change: ChangeCallback) -> JoinHandle<()> {
        let channel = Channel {
            topic: format!("realtime:{}:{}", table.table_name(), user_id),
            table,
            user_id,
            anon_key: self.anon_key.clone(),
        };
        tokio::spawn(run(
            self.socket_url.clone(),
            channel,
            self.session.clone(),
            on_change,
        ))
    }
}

/// `https://host` becomes `wss://host/realtime/v1/websocket?apikey=..&vsn=1.0.0`.
fn socket_url(base_url: &str, anon_key: &str) -> Result<String, GatewayError> {
    let invalid = |detail: String| GatewayError::InvalidUrl(format!("{base_url}: {detail}"));
    let mut url = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
    let scheme = match url.scheme() {
        "https" => "wss",
        "http" => "ws",
        other => return Err(invalid(format!("unsupported scheme {other}"))),
    };
    url.set_scheme(scheme)
        .map_err(|()| invalid(format!("cannot switch to {scheme}")))?;
    let path = format!("{}/realtime/v1/websocket", url.path().trim_end_matches('/'));
    url.set_path(&path);
    url.query_pairs_mut()
        .append_pair("apikey", anon_key)
        .append_pair("vsn", "1.0.0");
    Ok(url.into())
}

struct Channel {
    topic: String,
    table: ChangeTable,
    user_id: UserId,
    anon_key: String,
}

impl Channel {
    fn token(&self, session: &watch::Receiver<Option<AuthSession>>) -> String {
        session
            .borrow()
            .as_ref()
            .map_or_else(|| self.anon_key.clone(), |s| s.access_token.clone())
    }

    fn join(&self, token: &str, msg_ref: u64) -> String {
        json!({
            "topic": self.topic,
            "event": "phx_join",
            "payload": {
                "config": {
                    "postgres_changes": [{
                        "event": "*",
                        "schema": "public",
                        "table": self.table.table_name(),
                        "filter": format!("user_id=eq.{}", self.user_id),
                    }]
                },
                "access_token": token,
            },
            "ref": msg_ref.to_string(),
        })
        .to_string()
    }

    fn access_token(&self, token: &str, msg_ref: u64) -> String {
        json!({
            "topic": self.topic,
            "event": "access_token",
            "payload": { "access_token": token },
            "ref": msg_ref.to_string(),
        })
        .to_string()
    }
}

fn heartbeat(msg_ref: u64) -> String {
    json!({
        "topic": "phoenix",
        "event": "heartbeat",
        "payload": {},
        "ref": msg_ref.to_string(),
    })
    .to_string()
}

#[derive(Debug, PartialEq, Eq)]
enum Frame {
    Change,
    Rejected(String),
    Other,
}

fn classify(text: &str, topic: &str) -> Frame {
    let Ok(value) = serde_json::from_str::<Value>(text) else {
        return Frame::Other;
    };
    if value.get("topic").and_then(Value::as_str) != Some(topic) {
        return Frame::Other;
    }
    match value.get("event").and_then(Value::as_str) {
        Some("postgres_changes") => Frame::Change,
        Some("phx_reply")
            if value.pointer("/payload/status").and_then(Value::as_str) == Some("error") =>
        {
            let reason = value
                .pointer("/payload/response/reason")
                .and_then(Value::as_str)
                .unwrap_or("join refused");
            Frame::Rejected(reason.to_owned())
        }
        Some("phx_error") => Frame::Rejected("channel error".to_owned()),
        _ => Frame::Other,
    }
}

/// Keep the channel joined until the task is aborted, reconnecting with
/// backoff. After a reconnect the subscriber is told to refresh once, since
/// events may have been missed while the socket was down.
async fn run(
    socket_url: String,
    channel: Channel,
    mut session: watch::Receiver<Option<AuthSession>>,
    on_change: ChangeCallback,
) {
    let mut backoff = INITIAL_BACKOFF;
    let mut reconnecting = false;
    loop {
        match connect_async(socket_url.as_str()).await {
            Ok((stream, _)) => {
                tracing::debug!(topic = %channel.topic, "realtime channel connected");
                backoff = INITIAL_BACKOFF;
                if reconnecting {
                    on_change();
                }
                match pump(stream, &channel, &mut session, &on_change).await {
                    Ok(()) => tracing::debug!(topic = %channel.topic, "realtime channel closed"),
                    Err(err) => {
                        tracing::debug!(topic = %channel.topic, error = %err, "realtime channel dropped");
                    }
                }
            }
            Err(err) => {
                tracing::debug!(topic = %channel.topic, error = %err, "realtime connect failed");
            }
        }
        reconnecting = true;
        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}

async fn pump<S>(
    stream: S,
    channel: &Channel,
    session: &mut watch::Receiver<Option<AuthSession>>,
    on_change: &ChangeCallback,
) -> Result<(), WsError>
where
    S: Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError>,
{
    let (mut write, mut read) = stream.split();
    let mut msg_ref = 1_u64;
    write
        .send(Message::Text(channel.join(&channel.token(session), msg_ref)))
        .await?;

    let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
    ticker.tick().await;
    loop {
        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => match classify(&text, &channel.topic) {
                    Frame::Change => on_change(),
                    Frame::Rejected(reason) => {
                        tracing::warn!(topic = %channel.topic, %reason, "realtime join rejected");
                        return Ok(());
                    }
                    Frame::Other => {}
                },
                Some(Ok(Message::Ping(payload))) => write.send(Message::Pong(payload)).await?,
                Some(Ok(Message::Close(_))) | None => return Ok(()),
                Some(Ok(_)) => {}
                Some(Err(err)) => return Err(err),
            },
            _ = ticker.tick() => {
                msg_ref += 1;
                write.send(Message::Text(heartbeat(msg_ref))).await?;
            }
            changed = session.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                msg_ref += 1;
                let token = channel.token(session);
                write.send(Message::Text(channel.access_token(&token, msg_ref))).await?;
            }
        }
    }
}
