//! Протокол сигнального сервера и WebSocket клиент к нему.
//!
//! Входящие сообщения: `{type: "userList", users}`, `{type: "offer"|"answer", sdp}`,
//! `{type: "left", user}` и «голый» ICE кандидат без поля `type`.

use crate::error::SignalingError;
use crate::peer::types::{IceCandidate, SdpKind, SessionDescription};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

/// Сообщение от сигнального сервера
#[derive(Debug, Clone, PartialEq)]
pub enum InboundSignal {
    UserList(Vec<String>),
    Offer(SessionDescription),
    Answer(SessionDescription),
    Candidate(IceCandidate),
    Left(String),
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum Typed {
    #[serde(rename = "userList")]
    UserList { users: Vec<String> },
    #[serde(rename = "offer")]
    Offer { sdp: String },
    #[serde(rename = "answer")]
    Answer { sdp: String },
    #[serde(rename = "left")]
    Left { user: String },
}

impl InboundSignal {
    /// Разбирает текстовый кадр. Кандидат узнаём по наличию поля `candidate`.
    pub fn parse(text: &str) -> Result<Self, SignalingError> {
        let value: Value = serde_json::from_str(text)?;

        if value.get("candidate").is_some_and(|c| !c.is_null()) {
            let candidate: IceCandidate = serde_json::from_value(value)?;
            return Ok(InboundSignal::Candidate(candidate));
        }

        let known = matches!(
            value.get("type").and_then(Value::as_str),
            Some("userList" | "offer" | "answer" | "left")
        );
        if !known {
            return Err(SignalingError::Unrecognized(truncate(text)));
        }

        Ok(match serde_json::from_value::<Typed>(value)? {
            Typed::UserList { users } => InboundSignal::UserList(users),
            Typed::Offer { sdp } => InboundSignal::Offer(SessionDescription::offer(sdp)),
            Typed::Answer { sdp } => InboundSignal::Answer(SessionDescription::answer(sdp)),
            Typed::Left { user } => InboundSignal::Left(user),
        })
    }
}

/// Сообщение, которое мы отправляем на сигнальный сервер
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundSignal {
    Join { user: String },
    Leave { user: String },
    Description(SessionDescription),
    Candidate(IceCandidate),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Presence<'a> {
    Join { user: &'a str },
    Leave { user: &'a str },
}

impl OutboundSignal {
    pub fn encode(&self) -> Result<String, SignalingError> {
        let text = match self {
            OutboundSignal::Join { user } => serde_json::to_string(&Presence::Join { user })?,
            OutboundSignal::Leave { user } => serde_json::to_string(&Presence::Leave { user })?,
            OutboundSignal::Description(desc) => serde_json::to_string(desc)?,
            OutboundSignal::Candidate(candidate) => serde_json::to_string(candidate)?,
        };
        Ok(text)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            OutboundSignal::Join { .. } => "join",
            OutboundSignal::Leave { .. } => "leave",
            OutboundSignal::Description(d) if d.kind == SdpKind::Offer => "offer",
            OutboundSignal::Description(_) => "answer",
            OutboundSignal::Candidate(_) => "candidate",
        }
    }
}

fn truncate(text: &str) -> String {
    text.chars().take(120).collect()
}

/// Исходящая сторона сигнального канала
#[async_trait]
pub trait SignalSink: Send + Sync {
    async fn send(&self, msg: OutboundSignal) -> Result<(), SignalingError>;

    /// Закрывает канал; повторный вызов ничего не делает
    async fn close(&self) -> Result<(), SignalingError>;
}

/// WebSocket к `<base>/ws/<room>`.
///
/// Чтение и запись живут в отдельных задачах; входящие кадры уже
/// разобраны и приходят через `mpsc`.
pub struct WsSignaling {
    outgoing: mpsc::UnboundedSender<Message>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
    closed: AtomicBool,
}

pub type InboundStream = mpsc::UnboundedReceiver<Result<InboundSignal, SignalingError>>;

impl WsSignaling {
    pub async fn connect(url: &Url) -> Result<(Self, InboundStream), SignalingError> {
        info!(%url, "Connecting to signaling relay");
        let (ws_stream, _) = connect_async(url.as_str()).await?;
        let (mut write, mut read) = ws_stream.split();

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
        let (in_tx, in_rx) = mpsc::unbounded_channel();

        let writer = tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if let Err(e) = write.send(msg).await {
                    warn!(error = %e, "Failed to send signaling message");
                    break;
                }
                if closing {
                    break;
                }
            }
            let _ = write.close().await;
        });

        let reader = tokio::spawn(async move {
            while let Some(frame) = read.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        debug!(len = text.len(), "Signaling frame received");
                        if in_tx.send(InboundSignal::parse(&text)).is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => {
                        info!("Signaling connection closed by server");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        let _ = in_tx.send(Err(SignalingError::WebSocket(e)));
                        break;
                    }
                }
            }
            // закрытие приёмника означает потерю канала
        });

        Ok((
            Self {
                outgoing: out_tx,
                reader,
                writer,
                closed: AtomicBool::new(false),
            },
            in_rx,
        ))
    }
}

#[async_trait]
impl SignalSink for WsSignaling {
    async fn send(&self, msg: OutboundSignal) -> Result<(), SignalingError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SignalingError::Closed);
        }
        debug!(kind = msg.kind(), "Sending signaling message");
        let text = msg.encode()?;
        self.outgoing
            .send(Message::Text(text))
            .map_err(|_| SignalingError::Closed)
    }

    async fn close(&self) -> Result<(), SignalingError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        info!("Closing signaling channel");
        // writer сам завершится после Close; reader больше не нужен
        let _ = self.outgoing.send(Message::Close(None));
        self.reader.abort();
        Ok(())
    }
}

impl Drop for WsSignaling {
    fn drop(&mut self) {
        self.reader.abort();
        if !self.closed.load(Ordering::SeqCst) {
            self.writer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_user_list() {
        let msg = InboundSignal::parse(r#"{"type":"userList","users":["bob","alice"]}"#).unwrap();
        assert_eq!(
            msg,
            InboundSignal::UserList(vec!["bob".into(), "alice".into()])
        );
    }

    #[test]
    fn parses_descriptions_and_departures() {
        let offer = InboundSignal::parse(r#"{"type":"offer","sdp":"v=0\r\n"}"#).unwrap();
        assert_eq!(offer, InboundSignal::Offer(SessionDescription::offer("v=0\r\n")));

        let answer = InboundSignal::parse(r#"{"type":"answer","sdp":"v=0"}"#).unwrap();
        assert_eq!(answer, InboundSignal::Answer(SessionDescription::answer("v=0")));

        let left = InboundSignal::parse(r#"{"type":"left","user":"bob"}"#).unwrap();
        assert_eq!(left, InboundSignal::Left("bob".into()));
    }

    #[test]
    fn bare_candidate_is_detected_without_type() {
        let msg = InboundSignal::parse(
            r#"{"candidate":"candidate:1 1 udp 1 10.0.0.1 5000 typ host","sdpMid":"0","sdpMLineIndex":0}"#,
        )
        .unwrap();
        match msg {
            InboundSignal::Candidate(c) => assert!(c.candidate.ends_with("typ host")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_shapes_are_reported() {
        assert!(matches!(
            InboundSignal::parse(r#"{"type":"chat","text":"hi"}"#),
            Err(SignalingError::Unrecognized(_))
        ));
        assert!(matches!(
            InboundSignal::parse("not json"),
            Err(SignalingError::Decode(_))
        ));
    }

    #[test]
    fn outbound_shapes_match_relay_protocol() {
        let join = OutboundSignal::Join { user: "alice".into() }.encode().unwrap();
        assert_eq!(
            serde_json::from_str::<Value>(&join).unwrap(),
            serde_json::json!({"type": "join", "user": "alice"})
        );

        let leave = OutboundSignal::Leave { user: "alice".into() }.encode().unwrap();
        assert_eq!(
            serde_json::from_str::<Value>(&leave).unwrap(),
            serde_json::json!({"type": "leave", "user": "alice"})
        );

        let cand = OutboundSignal::Candidate(IceCandidate::new("candidate:x"))
            .encode()
            .unwrap();
        let value: Value = serde_json::from_str(&cand).unwrap();
        assert!(value.get("type").is_none());
        assert_eq!(value["candidate"], "candidate:x");
    }
}
