//! JSON-lines command socket.
//!
//! Each TCP connection carries one [`ClientMessage`] per line and receives
//! exactly one [`ServerMessage`] line per request, in order. Connections
//! are served on their own tasks; the coordinator calls themselves are
//! synchronous and short.

use std::sync::Arc;

use taskcrew_proto::command::{
    ClientMessage, Command, ProtocolError, ServerMessage, decode_line, encode_line,
};
use taskcrew_proto::error::{ErrorKind, OpError};
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, BufWriter,
};
use tokio::net::{TcpListener, TcpStream};

use crate::coordinator::Coordinator;
use crate::router;
use crate::translate;

/// Longest accepted request line in bytes, newline included.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Errors that end a connection or prevent the server from starting.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Binds the listener and spawns the accept loop.
///
/// Returns the bound address (useful with port `0`) and the accept loop's
/// join handle.
///
/// # Errors
///
/// Returns [`ServerError::Io`] if the listener cannot bind.
pub async fn start_server(
    addr: &str,
    coordinator: Arc<Coordinator>,
) -> Result<(std::net::SocketAddr, tokio::task::JoinHandle<()>), ServerError> {
    let listener = TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    tracing::debug!(peer = %peer, "connection accepted");
                    let coordinator = Arc::clone(&coordinator);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, coordinator).await {
                            tracing::warn!(peer = %peer, error = %e, "connection ended with error");
                        } else {
                            tracing::debug!(peer = %peer, "connection closed");
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                }
            }
        }
    });

    Ok((bound_addr, handle))
}

/// Serves one connection until the peer closes it.
///
/// Malformed lines (bad JSON, invalid UTF-8, longer than
/// [`MAX_LINE_BYTES`]) are answered with a `validation` error and the
/// connection stays open.
///
/// # Errors
///
/// Returns [`ServerError`] on socket I/O failure.
pub async fn handle_connection(
    stream: TcpStream,
    coordinator: Arc<Coordinator>,
) -> Result<(), ServerError> {
    let (read_half, write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut writer = BufWriter::new(write_half);
    let mut buf = Vec::new();

    loop {
        let reply = match read_frame(&mut reader, &mut buf).await? {
            Frame::Eof => return Ok(()),
            Frame::Oversized => {
                tracing::warn!(limit = MAX_LINE_BYTES, "client line too long");
                malformed(format!("line exceeds {MAX_LINE_BYTES} bytes"))
            }
            Frame::Line => match std::str::from_utf8(&buf) {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => match decode_line::<ClientMessage>(line) {
                    Ok(msg) => handle_message(&coordinator, msg),
                    Err(e) => {
                        tracing::warn!(error = %e, "malformed client message");
                        malformed(e.to_string())
                    }
                },
                Err(e) => {
                    tracing::warn!(error = %e, "client line is not UTF-8");
                    malformed(format!("invalid UTF-8: {e}"))
                }
            },
        };
        writer.write_all(encode_line(&reply)?.as_bytes()).await?;
        writer.flush().await?;
    }
}

fn malformed(detail: String) -> ServerMessage {
    ServerMessage::Error {
        request_id: None,
        kind: ErrorKind::Validation,
        detail: format!("malformed message: {detail}"),
    }
}

/// Outcome of reading one request line.
enum Frame {
    Eof,
    /// `buf` holds the line.
    Line,
    /// The line was longer than the cap and has been discarded.
    Oversized,
}

/// Reads one line of at most [`MAX_LINE_BYTES`] into `buf`.
///
/// An oversized line is consumed through its newline so the next read
/// starts on a fresh request.
async fn read_frame<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Frame>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let limit = MAX_LINE_BYTES as u64;
    let n = (&mut *reader).take(limit).read_until(b'\n', buf).await?;
    if n == 0 {
        return Ok(Frame::Eof);
    }
    if buf.last() == Some(&b'\n') || n < MAX_LINE_BYTES {
        return Ok(Frame::Line);
    }

    buf.clear();
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(Frame::Oversized);
        }
        let (used, done) = match available.iter().position(|b| *b == b'\n') {
            Some(i) => (i + 1, true),
            None => (available.len(), false),
        };
        reader.consume(used);
        if done {
            return Ok(Frame::Oversized);
        }
    }
}

/// Produces the reply for one decoded client message.
#[must_use]
pub fn handle_message(coordinator: &Coordinator, msg: ClientMessage) -> ServerMessage {
    match msg {
        ClientMessage::Invoke {
            request_id,
            worker,
            command,
        } => invoke(coordinator, request_id, &worker, &command),
        ClientMessage::Say {
            request_id,
            worker,
            text,
        } => match resolve_free_text(coordinator, worker.as_deref(), &text) {
            Ok((worker, command)) => invoke(coordinator, request_id, &worker, &command),
            Err(e) => ServerMessage::error(request_id, e.to_body()),
        },
        ClientMessage::Rebalance { request_id } => ServerMessage::Rebalanced {
            request_id,
            report: coordinator.rebalance(),
        },
        ClientMessage::Ping => ServerMessage::Pong,
    }
}

fn invoke(
    coordinator: &Coordinator,
    request_id: Option<u64>,
    worker: &str,
    command: &Command,
) -> ServerMessage {
    match router::route(coordinator, worker, command) {
        Ok(output) => ServerMessage::Ok {
            request_id,
            worker: worker.to_string(),
            output,
        },
        Err(e) => {
            tracing::info!(worker = %worker, operation = %command.operation, error = %e, "operation refused");
            ServerMessage::error(request_id, e.to_body())
        }
    }
}

/// Picks the worker for free text and translates it.
fn resolve_free_text(
    coordinator: &Coordinator,
    worker: Option<&str>,
    text: &str,
) -> Result<(String, Command), OpError> {
    let target = match worker {
        Some(id) => coordinator
            .worker(id)
            .ok_or_else(|| OpError::WorkerNotFound(id.to_string()))?,
        None => {
            let role = translate::infer_role(text);
            coordinator
                .first_of(role)
                .ok_or_else(|| OpError::WorkerNotFound(format!("any {role}")))?
        }
    };
    let known: Vec<&str> = coordinator.workers().iter().map(|w| w.id()).collect();
    let command = translate::translate(target.role(), text, &known).ok_or_else(|| {
        OpError::Validation(format!("no {} command recognised in {text:?}", target.role()))
    })?;
    Ok((target.id().to_string(), command))
}
