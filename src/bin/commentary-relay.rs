use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, broadcast};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::{accept_hdr_async, tungstenite::Message};

/// One broadcast channel per match.
type Rooms = Arc<Mutex<HashMap<String, broadcast::Sender<String>>>>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let addr = env::var("DIAMONDCAST_RELAY_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = TcpListener::bind(&addr).await?;
    let rooms: Rooms = Arc::default();

    eprintln!("commentary relay listening on {addr}");

    loop {
        let (stream, peer) = listener.accept().await?;
        let rooms = rooms.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_client(stream, rooms).await {
                eprintln!("client {peer} disconnected: {e}");
            }
        });
    }
}

async fn handle_client(stream: TcpStream, rooms: Rooms) -> anyhow::Result<()> {
    let mut room = String::new();
    let ws = accept_hdr_async(stream, |req: &Request, resp: Response| {
        room = simulation_id(req.uri().query()).unwrap_or_default();
        Ok::<Response, ErrorResponse>(resp)
    })
    .await?;

    let tx = {
        let mut rooms = rooms.lock().await;
        rooms
            .entry(room.clone())
            .or_insert_with(|| broadcast::channel(512).0)
            .clone()
    };
    let mut rx = tx.subscribe();
    let (mut write, mut read) = ws.split();

    loop {
        tokio::select! {
            inbound = read.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => match relay_frame(&text) {
                        Some(frame) => {
                            let _ = tx.send(frame);
                        }
                        None => eprintln!("room {room}: dropped unreadable frame"),
                    },
                    Some(Ok(Message::Binary(_))) => {}
                    Some(Ok(Message::Ping(_))) => {}
                    Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Frame(_))) => {}
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => return Err(e.into()),
                }
            }
            outbound = rx.recv() => {
                match outbound {
                    Ok(text) => {
                        write.send(Message::Text(text.into())).await?;
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    // Last one out closes the room.
    drop(rx);
    let mut rooms = rooms.lock().await;
    if tx.receiver_count() == 0 {
        rooms.remove(&room);
    }

    Ok(())
}

fn simulation_id(query: Option<&str>) -> Option<String> {
    query?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "simulationId")
        .map(|(_, value)| value.to_string())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserFrame {
    user_id: Value,
    content: String,
    align: String,
}

/// User frames become `send`/`receive` chat; typed frames pass through.
fn relay_frame(text: &str) -> Option<String> {
    let value: Value = serde_json::from_str(text).ok()?;
    if value.get("type").is_some() {
        return Some(text.to_string());
    }

    let frame: UserFrame = serde_json::from_value(value).ok()?;
    let kind = if frame.align == "left" { "receive" } else { "send" };
    let name = match frame.user_id {
        Value::String(s) => s,
        other => other.to_string(),
    };
    Some(
        json!({
            "type": kind,
            "message": frame.content,
            "name": name,
        })
        .to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_room_from_query() {
        assert_eq!(simulation_id(Some("simulationId=12")), Some("12".into()));
        assert_eq!(simulation_id(Some("a=1&simulationId=7")), Some("7".into()));
        assert_eq!(simulation_id(Some("a=1")), None);
        assert_eq!(simulation_id(None), None);
    }

    #[test]
    fn home_fans_arrive_as_receive() {
        let out = relay_frame(r#"{"userId":"42","content":"go","align":"left"}"#).unwrap();
        let value: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["type"], "receive");
        assert_eq!(value["message"], "go");
        assert_eq!(value["name"], "42");

        let out = relay_frame(r#"{"userId":7,"content":"boo","align":"right"}"#).unwrap();
        let value: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["type"], "send");
        assert_eq!(value["name"], "7");
    }

    #[test]
    fn typed_frames_pass_through() {
        let frame = r#"{"type":"bias-comment","message":"what a swing","isHome":1}"#;
        assert_eq!(relay_frame(frame).as_deref(), Some(frame));
        assert!(relay_frame("not json").is_none());
    }
}
