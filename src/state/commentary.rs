use crate::state::audio::AudioCommand;
use chrono::Local;
use diamond_api::{MatchId, Side};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// System notices, including the local join line.
    Notice,
    /// Team-biased color commentary, shown to one affiliation only.
    BiasComment,
    /// Moderation bot.
    CleanBot,
    /// Assistant replies.
    AiBot,
    /// User chat from an away-side fan.
    Send,
    /// User chat from a home-side fan.
    Receive,
}

impl Category {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "notice" => Some(Category::Notice),
            "bias-comment" => Some(Category::BiasComment),
            "cleanBot" => Some(Category::CleanBot),
            "aiBot" => Some(Category::AiBot),
            "send" => Some(Category::Send),
            "receive" => Some(Category::Receive),
            _ => None,
        }
    }

    pub fn is_user_chat(self) -> bool {
        matches!(self, Category::Send | Category::Receive)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodySpan {
    Text(String),
    /// Shortcode without the colons.
    Emoji(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommentaryMessage {
    pub match_id: MatchId,
    pub category: Category,
    pub author: Option<String>,
    pub team: Option<String>,
    pub body: String,
    pub spans: Vec<BodySpan>,
    /// Only set on bias commentary.
    pub home: Option<bool>,
    pub audio: Vec<String>,
    pub received_at: String,
}

impl CommentaryMessage {
    pub fn notice(match_id: MatchId, body: impl Into<String>) -> Self {
        let body = body.into();
        Self {
            match_id,
            category: Category::Notice,
            author: None,
            team: None,
            spans: split_emoji(&body),
            body,
            home: None,
            audio: Vec::new(),
            received_at: Local::now().format("%H:%M").to_string(),
        }
    }

    /// Bias commentary is shared by both sides of the room and filtered here.
    pub fn visible_to(&self, affiliation: Side) -> bool {
        match self.category {
            Category::BiasComment => self.home == Some(affiliation == Side::Home),
            _ => true,
        }
    }
}

// ---------------------------------------------------------------------------
// Wire frames
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct InboundFrame {
    #[serde(rename = "type")]
    kind: Option<String>,
    message: Option<String>,
    name: Option<String>,
    user_team: Option<UserTeam>,
    is_home: Option<Value>,
    audio_url: Option<Value>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct UserTeam {
    name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OutboundFrame<'a> {
    user_id: &'a str,
    content: &'a str,
    align: &'a str,
}

/// `Ok(None)` for frames of a category this client does not show.
pub fn parse_frame(match_id: MatchId, text: &str) -> Result<Option<CommentaryMessage>, String> {
    let frame: InboundFrame =
        serde_json::from_str(text).map_err(|e| format!("commentary parse error: {e}"))?;

    let kind = frame.kind.as_deref().unwrap_or_default();
    let Some(category) = Category::parse(kind) else {
        debug!("dropping commentary frame of type {kind:?}");
        return Ok(None);
    };

    let body = frame.message.unwrap_or_default();
    Ok(Some(CommentaryMessage {
        match_id,
        category,
        author: frame.name.filter(|n| !n.is_empty()),
        team: frame.user_team.and_then(|t| t.name).filter(|n| !n.is_empty()),
        spans: split_emoji(&body),
        body,
        home: frame.is_home.as_ref().and_then(flag),
        audio: frame.audio_url.map(audio_urls).unwrap_or_default(),
        received_at: Local::now().format("%H:%M").to_string(),
    }))
}

fn flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        _ => None,
    }
}

fn audio_urls(value: Value) -> Vec<String> {
    match value {
        Value::String(url) if !url.is_empty() => vec![url],
        Value::Array(items) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(url) if !url.is_empty() => Some(url),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Home fans post on the left, away fans on the right.
pub fn outbound_frame(user_id: &str, body: &str, affiliation: Side) -> Result<String, String> {
    let align = match affiliation {
        Side::Home => "left",
        Side::Away => "right",
    };
    serde_json::to_string(&OutboundFrame {
        user_id,
        content: body,
        align,
    })
    .map_err(|e| e.to_string())
}

/// Split `:name:` shortcodes out of a body. Unclosed or empty colons stay text.
pub fn split_emoji(body: &str) -> Vec<BodySpan> {
    let mut spans = Vec::new();
    let mut text = String::new();
    let mut rest = body;

    while let Some(start) = rest.find(':') {
        let after = &rest[start + 1..];
        let code_len = after
            .find(':')
            .filter(|&end| end > 0 && is_shortcode(&after[..end]));
        match code_len {
            Some(end) => {
                text.push_str(&rest[..start]);
                if !text.is_empty() {
                    spans.push(BodySpan::Text(std::mem::take(&mut text)));
                }
                spans.push(BodySpan::Emoji(after[..end].to_string()));
                rest = &after[end + 1..];
            }
            None => {
                text.push_str(&rest[..=start]);
                rest = after;
            }
        }
    }
    text.push_str(rest);
    if !text.is_empty() {
        spans.push(BodySpan::Text(text));
    }
    spans
}

fn is_shortcode(name: &str) -> bool {
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '+' || c == '-')
}

// ---------------------------------------------------------------------------
// Channel worker
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentaryCommand {
    Send { body: String },
    Close,
}

#[derive(Debug, Clone)]
pub enum CommentaryEvent {
    Connected,
    Disconnected,
    Message(CommentaryMessage),
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendRejected {
    Unauthenticated,
    EmptyBody,
    Closed,
}

impl fmt::Display for SendRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendRejected::Unauthenticated => write!(f, "log in to chat"),
            SendRejected::EmptyBody => write!(f, "message is empty"),
            SendRejected::Closed => write!(f, "commentary channel is closed"),
        }
    }
}

impl std::error::Error for SendRejected {}

#[derive(Debug)]
pub struct CommentaryWorker {
    pub url: String,
    pub match_id: MatchId,
    pub affiliation: Side,
    pub user_id: Option<String>,
    pub commands: mpsc::Receiver<CommentaryCommand>,
    pub events: mpsc::Sender<CommentaryEvent>,
    pub audio: mpsc::Sender<AudioCommand>,
}

impl CommentaryWorker {
    /// Connect in the background and hand back the send side.
    pub fn open(
        url: String,
        match_id: MatchId,
        affiliation: Side,
        user_id: Option<String>,
        events: mpsc::Sender<CommentaryEvent>,
        audio: mpsc::Sender<AudioCommand>,
    ) -> CommentaryHandle {
        let (tx, rx) = mpsc::channel(32);
        let worker = CommentaryWorker {
            url,
            match_id,
            affiliation,
            user_id: user_id.clone(),
            commands: rx,
            events,
            audio,
        };
        let task = tokio::spawn(worker.run());
        CommentaryHandle {
            user_id,
            commands: Some(tx),
            task: Some(task),
        }
    }

    /// One connection per view; a dropped socket is reported, not retried.
    pub async fn run(mut self) {
        let connect = connect_async(self.url.as_str());
        tokio::pin!(connect);

        let stream = loop {
            tokio::select! {
                result = &mut connect => match result {
                    Ok((stream, _)) => break stream,
                    Err(e) => {
                        self.report(format!("commentary connect failed: {e}")).await;
                        self.teardown().await;
                        return;
                    }
                },
                command = self.commands.recv() => match command {
                    Some(CommentaryCommand::Send { .. }) => {
                        self.report("commentary not connected yet".to_string()).await;
                    }
                    Some(CommentaryCommand::Close) | None => {
                        debug!("commentary closed before connecting");
                        return;
                    }
                },
            }
        };

        let _ = self.events.send(CommentaryEvent::Connected).await;
        let (mut write, mut read) = stream.split();

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(CommentaryCommand::Send { body }) => {
                        let Some(user_id) = self.user_id.as_deref() else {
                            continue;
                        };
                        let sent = match outbound_frame(user_id, &body, self.affiliation) {
                            Ok(text) => write.send(Message::Text(text.into())).await.map_err(|e| e.to_string()),
                            Err(e) => Err(e),
                        };
                        if let Err(e) = sent {
                            self.report(format!("commentary send failed: {e}")).await;
                            break;
                        }
                    }
                    Some(CommentaryCommand::Close) | None => {
                        debug!("closing commentary for match {}", self.match_id);
                        let _ = write.send(Message::Close(None)).await;
                        let _ = write.close().await;
                        break;
                    }
                },
                inbound = read.next() => match inbound {
                    Some(Ok(Message::Text(text))) => self.ingest(&text).await,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        self.report(format!("commentary read failed: {e}")).await;
                        break;
                    }
                },
            }
        }

        self.teardown().await;
    }

    async fn ingest(&self, text: &str) {
        match parse_frame(self.match_id, text) {
            Ok(Some(message)) if message.visible_to(self.affiliation) => {
                if message.category == Category::BiasComment && !message.audio.is_empty() {
                    let _ = self
                        .audio
                        .send(AudioCommand::Enqueue(message.audio.clone()))
                        .await;
                }
                let _ = self.events.send(CommentaryEvent::Message(message)).await;
            }
            Ok(Some(_)) => debug!("bias commentary for the other side dropped"),
            Ok(None) => {}
            Err(e) => self.report(e).await,
        }
    }

    async fn report(&self, message: String) {
        warn!("{message}");
        let _ = self.events.send(CommentaryEvent::Error(message)).await;
    }

    async fn teardown(&self) {
        if let Err(e) = self.audio.send(AudioCommand::Clear).await {
            error!("Failed to clear audio queue: {e}");
        }
        let _ = self.events.send(CommentaryEvent::Disconnected).await;
    }
}

/// Send side of the channel, owned by the match view. Dropping it closes the
/// socket.
#[derive(Debug)]
pub struct CommentaryHandle {
    user_id: Option<String>,
    commands: Option<mpsc::Sender<CommentaryCommand>>,
    task: Option<JoinHandle<()>>,
}

impl CommentaryHandle {
    pub fn new(user_id: Option<String>, commands: mpsc::Sender<CommentaryCommand>) -> Self {
        Self {
            user_id,
            commands: Some(commands),
            task: None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    /// Checked locally; rejected sends never reach the socket.
    pub fn send(&self, body: &str) -> Result<(), SendRejected> {
        if self.user_id.is_none() {
            return Err(SendRejected::Unauthenticated);
        }
        let body = body.trim();
        if body.is_empty() {
            return Err(SendRejected::EmptyBody);
        }
        let commands = self.commands.as_ref().ok_or(SendRejected::Closed)?;
        commands
            .try_send(CommentaryCommand::Send {
                body: body.to_string(),
            })
            .map_err(|_| SendRejected::Closed)
    }

    pub fn close(&mut self) {
        if let Some(commands) = self.commands.take() {
            let _ = commands.try_send(CommentaryCommand::Close);
        }
    }

    /// Close and wait for the worker to write its Close frame. A worker still
    /// running after `grace` is aborted.
    pub async fn shutdown(mut self, grace: Duration) {
        self.close();
        let Some(mut task) = self.task.take() else {
            return;
        };
        match tokio::time::timeout(grace, &mut task).await {
            Ok(Ok(())) => debug!("commentary worker stopped"),
            Ok(Err(e)) => error!("commentary worker failed: {e}"),
            Err(_) => {
                warn!("commentary worker still running after {grace:?}, aborting");
                task.abort();
            }
        }
    }
}

impl Drop for CommentaryHandle {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    #[test]
    fn bias_comment_for_other_side_is_hidden() {
        let frame = r#"{"type":"bias-comment","message":"What a swing!","isHome":true}"#;
        let msg = parse_frame(3, frame).unwrap().unwrap();
        assert!(!msg.visible_to(Side::Away));
        assert!(msg.visible_to(Side::Home));

        let numeric = r#"{"type":"bias-comment","message":"Come on","isHome":0}"#;
        let msg = parse_frame(3, numeric).unwrap().unwrap();
        assert!(msg.visible_to(Side::Away));
    }

    #[test]
    fn bias_comment_without_flag_is_hidden_from_everyone() {
        let msg = parse_frame(3, r#"{"type":"bias-comment","message":"?"}"#)
            .unwrap()
            .unwrap();
        assert!(!msg.visible_to(Side::Home));
        assert!(!msg.visible_to(Side::Away));
    }

    #[test]
    fn audio_urls_accept_string_or_list() {
        let list = r#"{"type":"bias-comment","isHome":1,"audioUrl":["a.mp3","b.mp3"]}"#;
        assert_eq!(parse_frame(1, list).unwrap().unwrap().audio, vec!["a.mp3", "b.mp3"]);
        let single = r#"{"type":"bias-comment","isHome":1,"audioUrl":"a.mp3"}"#;
        assert_eq!(parse_frame(1, single).unwrap().unwrap().audio, vec!["a.mp3"]);
    }

    #[test]
    fn unknown_categories_are_dropped() {
        assert_eq!(parse_frame(1, r#"{"type":"location","latitude":1.0}"#), Ok(None));
        assert!(parse_frame(1, "not json").is_err());
    }

    #[test]
    fn user_chat_keeps_author_and_team() {
        let frame = r#"{"type":"receive","name":"minji","message":"hi :fire:","userTeam":{"name":"Tigers","idKey":"KIA"}}"#;
        let msg = parse_frame(1, frame).unwrap().unwrap();
        assert!(msg.category.is_user_chat());
        assert_eq!(msg.author.as_deref(), Some("minji"));
        assert_eq!(msg.team.as_deref(), Some("Tigers"));
        assert_eq!(
            msg.spans,
            vec![BodySpan::Text("hi ".into()), BodySpan::Emoji("fire".into())]
        );
    }

    #[test]
    fn emoji_split_leaves_stray_colons() {
        assert_eq!(
            split_emoji("score 3:2 :clap::clap: ok"),
            vec![
                BodySpan::Text("score 3:2 ".into()),
                BodySpan::Emoji("clap".into()),
                BodySpan::Emoji("clap".into()),
                BodySpan::Text(" ok".into()),
            ]
        );
        assert_eq!(split_emoji("a :: b"), vec![BodySpan::Text("a :: b".into())]);
    }

    #[test]
    fn outbound_align_follows_affiliation() {
        let home: Value = serde_json::from_str(&outbound_frame("7", "go", Side::Home).unwrap()).unwrap();
        assert_eq!(home["align"], "left");
        assert_eq!(home["userId"], "7");
        assert_eq!(home["content"], "go");
        let away: Value = serde_json::from_str(&outbound_frame("7", "go", Side::Away).unwrap()).unwrap();
        assert_eq!(away["align"], "right");
    }

    #[test]
    fn sends_are_gated_locally() {
        let (tx, mut rx) = mpsc::channel(4);
        let guest = CommentaryHandle::new(None, tx.clone());
        assert_eq!(guest.send("hello"), Err(SendRejected::Unauthenticated));

        let mut member = CommentaryHandle::new(Some("7".into()), tx);
        assert_eq!(member.send("   "), Err(SendRejected::EmptyBody));
        assert_eq!(member.send(" hello "), Ok(()));
        assert_eq!(
            rx.try_recv().unwrap(),
            CommentaryCommand::Send { body: "hello".into() }
        );
        assert!(rx.try_recv().is_err());

        member.close();
        assert_eq!(rx.try_recv().unwrap(), CommentaryCommand::Close);
        assert_eq!(member.send("again"), Err(SendRejected::Closed));
    }

    #[tokio::test]
    async fn worker_filters_queues_audio_and_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            for frame in [
                r#"{"type":"bias-comment","message":"home only","isHome":1,"audioUrl":["h.mp3"]}"#,
                r#"{"type":"bias-comment","message":"away only","isHome":0,"audioUrl":["a1.mp3","a2.mp3"]}"#,
                r#"{"type":"notice","message":"welcome"}"#,
            ] {
                ws.send(Message::Text(frame.to_string().into())).await.unwrap();
            }
            let mut received = Vec::new();
            while let Some(Ok(msg)) = ws.next().await {
                match msg {
                    Message::Text(text) => received.push(text.to_string()),
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            received
        });

        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (evt_tx, mut evt_rx) = mpsc::channel(16);
        let (audio_tx, mut audio_rx) = mpsc::channel(8);
        let worker = CommentaryWorker {
            url: format!("ws://{addr}"),
            match_id: 9,
            affiliation: Side::Away,
            user_id: Some("42".into()),
            commands: cmd_rx,
            events: evt_tx,
            audio: audio_tx,
        };
        let task = tokio::spawn(worker.run());
        let mut handle = CommentaryHandle::new(Some("42".into()), cmd_tx);

        let mut bodies = Vec::new();
        while bodies.len() < 2 {
            match evt_rx.recv().await {
                Some(CommentaryEvent::Message(msg)) => bodies.push(msg.body),
                Some(_) => {}
                None => panic!("worker stopped early"),
            }
        }
        assert_eq!(bodies, vec!["away only", "welcome"]);
        assert_eq!(
            audio_rx.recv().await,
            Some(AudioCommand::Enqueue(vec!["a1.mp3".into(), "a2.mp3".into()]))
        );

        handle.send("let's go").unwrap();
        handle.close();
        task.await.unwrap();

        let received = server.await.unwrap();
        assert_eq!(received.len(), 1);
        assert!(received[0].contains(r#""align":"right""#));
        assert_eq!(audio_rx.recv().await, Some(AudioCommand::Clear));
    }

    #[tokio::test]
    async fn shutdown_writes_close_frame() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            while let Some(Ok(msg)) = ws.next().await {
                if let Message::Close(_) = msg {
                    return true;
                }
            }
            false
        });

        let (evt_tx, mut evt_rx) = mpsc::channel(16);
        let (audio_tx, _audio_rx) = mpsc::channel(8);
        let handle = CommentaryWorker::open(
            format!("ws://{addr}"),
            5,
            Side::Home,
            None,
            evt_tx,
            audio_tx,
        );
        assert!(matches!(evt_rx.recv().await, Some(CommentaryEvent::Connected)));

        handle.shutdown(Duration::from_secs(2)).await;
        assert!(server.await.unwrap());
        assert!(matches!(evt_rx.recv().await, Some(CommentaryEvent::Disconnected)));
    }
}
