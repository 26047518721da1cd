//! Inbound frame sources.
//!
//! Each source runs on its own thread and forwards raw payloads to the engine
//! thread. Reconnection is left to whoever supervises the process.

use crate::config::SourceKind;
use crate::event::Frame;
use crossbeam_channel::Sender;
use std::io::{self, BufRead};
use std::net::TcpStream;
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::{debug, info, warn};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: Box<tungstenite::Error>,
    },
    #[error("failed to spawn source thread: {0}")]
    Spawn(#[from] io::Error),
}

/// Owned payload as handed over by a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Binary(Vec<u8>),
}

impl Payload {
    pub fn as_frame(&self) -> Frame<'_> {
        match self {
            Payload::Text(text) => Frame::Text(text),
            Payload::Binary(bytes) => Frame::Binary(bytes),
        }
    }
}

/// Messages from a source thread.
#[derive(Debug)]
pub enum Inbound {
    Frame(Payload),
    /// The source ended; no further frames follow.
    Closed(String),
}

/// Opens the configured source and starts forwarding frames on `tx`.
///
/// Connection errors are reported here, before any thread is spawned.
pub fn spawn(kind: &SourceKind, tx: Sender<Inbound>) -> Result<JoinHandle<()>, SourceError> {
    match kind {
        SourceKind::WebSocket(url) => {
            let socket = connect(url)?;
            info!(%url, "connected");
            let handle = thread::Builder::new()
                .name("source-ws".into())
                .spawn(move || forward_websocket(socket, tx))?;
            Ok(handle)
        }
        SourceKind::Stdin => {
            let handle = thread::Builder::new()
                .name("source-stdin".into())
                .spawn(move || {
                    let stdin = io::stdin();
                    forward_lines(stdin.lock(), tx);
                })?;
            Ok(handle)
        }
    }
}

fn connect(url: &str) -> Result<WebSocket<MaybeTlsStream<TcpStream>>, SourceError> {
    let (socket, response) = tungstenite::connect(url).map_err(|e| SourceError::Connect {
        url: url.to_string(),
        source: Box::new(e),
    })?;
    debug!(status = %response.status(), "websocket handshake complete");
    Ok(socket)
}

fn forward_websocket(mut socket: WebSocket<MaybeTlsStream<TcpStream>>, tx: Sender<Inbound>) {
    let reason = loop {
        let payload = match socket.read() {
            Ok(Message::Text(text)) => Payload::Text(text),
            Ok(Message::Binary(bytes)) => Payload::Binary(bytes),
            Ok(Message::Close(frame)) => {
                break match frame {
                    Some(frame) => format!("closed by peer: {} {}", frame.code, frame.reason),
                    None => "closed by peer".to_string(),
                };
            }
            // Pings are answered by tungstenite on the next read.
            Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => continue,
            Err(tungstenite::Error::ConnectionClosed) => break "connection closed".to_string(),
            Err(e) => {
                warn!(error = %e, "websocket read failed");
                break e.to_string();
            }
        };
        if tx.send(Inbound::Frame(payload)).is_err() {
            // Engine is gone.
            return;
        }
    };
    let _ = tx.send(Inbound::Closed(reason));
}

/// Forwards one frame per line. Lines that are not UTF-8 go out as binary.
pub fn forward_lines(mut reader: impl BufRead, tx: Sender<Inbound>) {
    let mut buf = Vec::with_capacity(256);
    let reason = loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break "end of input".to_string(),
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "stdin read failed");
                break e.to_string();
            }
        }
        while matches!(buf.last(), Some(b'\n' | b'\r')) {
            buf.pop();
        }
        if buf.is_empty() {
            continue;
        }
        let payload = match String::from_utf8(std::mem::take(&mut buf)) {
            Ok(text) => Payload::Text(text),
            Err(e) => Payload::Binary(e.into_bytes()),
        };
        if tx.send(Inbound::Frame(payload)).is_err() {
            return;
        }
    };
    let _ = tx.send(Inbound::Closed(reason));
}
