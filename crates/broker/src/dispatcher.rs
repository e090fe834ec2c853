//! Per-connection dispatcher.
//!
//! One task is spawned per accepted connection. Each connection reads one
//! framed message at a time, decrypts/authenticates/parses it, dispatches on
//! the verb, and writes exactly one reply before reading the next frame.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use broker_protocol::{codec, ProtocolError, Reply, Request, SecretKey};
use broker_queue::TaskQueue;
use broker_registry::{WorkerHandle, WorkerRegistry};

use crate::stats::Stats;

/// State shared by every connection. The queue, registry and stats locks
/// are each independent and are acquired in that order when a single verb
/// needs more than one.
pub struct SharedState {
    pub queue: Arc<TaskQueue>,
    pub registry: Arc<WorkerRegistry>,
    pub stats: Arc<Stats>,
    pub key: SecretKey,
}

/// Drive one accepted connection to completion. Never panics on a peer's
/// malformed or malicious input — those become error replies, not process
/// failures.
pub async fn handle_connection(stream: TcpStream, peer: SocketAddr, state: Arc<SharedState>) {
    let (mut read_half, write_half) = stream.into_split();
    let write_half = Arc::new(AsyncMutex::new(write_half));
    let mut worker: Option<WorkerHandle> = None;

    loop {
        let frame = match read_frame(&mut read_half).await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!(%peer, "connection closed by peer");
                break;
            }
            Err(e) => {
                warn!(%peer, error = %e, "error reading frame");
                break;
            }
        };

        let reply = match dispatch(&frame, &state, &mut worker, peer, Arc::clone(&write_half)).await {
            DispatchOutcome::Reply(reply) => reply,
            DispatchOutcome::FatalDecryptionError(reply) => {
                if let Err(e) = write_reply(&write_half, &state.key, &reply).await {
                    warn!(%peer, error = %e, "failed to write error reply");
                }
                break;
            }
        };

        if let Err(e) = write_reply(&write_half, &state.key, &reply).await {
            warn!(%peer, error = %e, "failed to write reply, closing connection");
            break;
        }
    }

    if let Some(handle) = worker {
        state.registry.deregister(handle);
        info!(%peer, worker_handle = handle, "worker disconnected");
    }
}

enum DispatchOutcome {
    Reply(Reply),
    /// The frame failed to decrypt: an unauthenticated peer cannot be
    /// trusted to frame subsequent messages. Reply, then close the
    /// connection. Format and auth failures are NOT fatal — only decryption
    /// is.
    FatalDecryptionError(Reply),
}

async fn dispatch(
    frame: &[u8],
    state: &Arc<SharedState>,
    worker: &mut Option<WorkerHandle>,
    peer: SocketAddr,
    conn: Arc<AsyncMutex<tokio::net::tcp::OwnedWriteHalf>>,
) -> DispatchOutcome {
    // Only a decryption failure terminates the connection: an
    // unauthenticated peer cannot be trusted to frame subsequent messages.
    // Format and auth failures reply and keep reading — the framing itself
    // was intact, only the content was malformed or mistagged.
    let plaintext = match codec::decrypt(&state.key, frame) {
        Ok(bytes) => bytes,
        Err(_) => {
            return DispatchOutcome::FatalDecryptionError(Reply::error("decryption failed"));
        }
    };

    let value = match codec::parse(&plaintext) {
        Ok(value) => value,
        Err(_) => {
            return DispatchOutcome::Reply(Reply::error("malformed message"));
        }
    };

    let authenticated = match codec::verify(&state.key, value) {
        Ok(value) => value,
        Err(ProtocolError::Auth) => {
            return DispatchOutcome::Reply(Reply::error("invalid hmac"));
        }
        Err(_) => {
            return DispatchOutcome::Reply(Reply::error("malformed message"));
        }
    };

    let request: Request = match serde_json::from_value(authenticated) {
        Ok(request) => request,
        Err(e) => {
            return DispatchOutcome::Reply(Reply::error(format!("unknown type: {e}")));
        }
    };

    let reply = match request {
        Request::AddTask { task, priority, timeout } => {
            match state.queue.enqueue(priority, task, timeout) {
                Ok(task_id) => {
                    state.stats.record_task_added();
                    Reply::ok_add_task(task_id.to_string())
                }
                Err(e) => {
                    warn!(error = %e, "failed to persist task");
                    Reply::error("failed to persist task")
                }
            }
        }

        Request::GetTask { worker_id: _ } => {
            let handle = *worker.get_or_insert_with(|| state.registry.register(peer, conn));
            match state.queue.dequeue() {
                Some(task) => {
                    state.registry.bump_inflight(handle);
                    state.stats.record_task_assigned();
                    Reply::ok_get_task(task.id.to_string(), task.payload)
                }
                None => Reply::empty(),
            }
        }

        Request::TaskCompleted { task_id, worker_id: _, result: _ } => match *worker {
            Some(handle) => {
                state.registry.drop_inflight(handle);
                state.stats.record_task_completed();
                debug!(%task_id, "task completion reported");
                Reply::ok_plain()
            }
            None => Reply::error("invalid task completion"),
        },

        Request::Heartbeat { worker_id: _ } => match *worker {
            Some(handle) => {
                state.registry.touch(handle);
                Reply::ok_plain()
            }
            None => Reply::error("heartbeat before registration"),
        },
    };

    DispatchOutcome::Reply(reply)
}

/// Read exactly one framed message, bounded by [`codec::FRAME_CAP`]. Returns
/// `Ok(None)` on a clean EOF before any bytes arrive.
async fn read_frame(
    read_half: &mut tokio::net::tcp::OwnedReadHalf,
) -> std::io::Result<Option<Vec<u8>>> {
    let mut buf = vec![0u8; codec::FRAME_CAP];
    let n = read_half.read(&mut buf).await?;
    if n == 0 {
        return Ok(None);
    }
    buf.truncate(n);
    Ok(Some(buf))
}

async fn write_reply(
    conn: &Arc<AsyncMutex<tokio::net::tcp::OwnedWriteHalf>>,
    key: &SecretKey,
    reply: &Reply,
) -> broker_protocol::Result<()> {
    let frame = codec::encode_reply(key, reply)?;
    let mut guard = conn.lock().await;
    guard.write_all(&frame).await?;
    Ok(())
}
