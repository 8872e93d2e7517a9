// Copyright (C) 2026 The Render Farm Client Contributors
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Owns one transport to a node: opens it, runs the read loop, demultiplexes
//! frames into reply-table resolutions and queued events, and serializes
//! writes behind a single mutex.
//!
//! `Connection` knows nothing about [`crate::node::Node`] — it only reports
//! what happened on a channel the owner polls. This keeps Connection/Node
//! from forming a reference cycle: Node owns Connection, never the reverse.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{RenderNodeError, Result};
use crate::protocol::{read_frame, write_frame, ClientRequest, Frame, ServerEvent, ServerReply, WireMessage};
use crate::wol;

/// Something the owner of a [`Connection`] needs to react to.
#[derive(Debug, Clone)]
pub enum ConnEvent {
    Connected,
    Disconnected { is_error: bool, reason: String },
    Server(ServerEvent),
}

type PendingTable = Arc<StdMutex<HashMap<u64, oneshot::Sender<Result<ServerReply>>>>>;

pub struct Connection {
    address: SocketAddr,
    mac: Option<[u8; 6]>,
    write_half: AsyncMutex<Option<OwnedWriteHalf>>,
    pending: PendingTable,
    next_id: AtomicU64,
    connected: Arc<AtomicBool>,
    events_tx: mpsc::UnboundedSender<ConnEvent>,
    read_task: StdMutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Connection {
    /// `events_tx` is owned by the caller (typically a [`crate::node::Node`]);
    /// `Connection` only ever sends on it.
    pub fn new(
        address: SocketAddr,
        mac: Option<[u8; 6]>,
        events_tx: mpsc::UnboundedSender<ConnEvent>,
    ) -> Self {
        Connection {
            address,
            mac,
            write_half: AsyncMutex::new(None),
            pending: Arc::new(StdMutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            connected: Arc::new(AtomicBool::new(false)),
            events_tx,
            read_task: StdMutex::new(None),
        }
    }

    fn connected_flag(&self) -> Arc<AtomicBool> {
        self.connected.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Opens the transport. A no-op if already connected.
    pub async fn connect(&self) -> Result<()> {
        if self.connected.load(Ordering::SeqCst) {
            return Ok(());
        }

        if let Some(mac) = self.mac {
            if let Err(e) = wol::send_magic_packet(mac).await {
                warn!(error = %e, "wake-on-LAN packet failed, attempting to connect anyway");
            }
        }

        let stream = TcpStream::connect(self.address).await?;
        stream.set_nodelay(true).ok();
        let (mut read_half, write_half) = stream.into_split();

        *self.write_half.lock().await = Some(write_half);
        self.connected.store(true, Ordering::SeqCst);

        let pending = self.pending.clone();
        let events_tx = self.events_tx.clone();
        let connected_flag = self.connected_flag();
        let handle = tokio::spawn(async move {
            read_loop(&mut read_half, pending, events_tx, connected_flag).await;
        });
        *self.read_task.lock().unwrap() = Some(handle);

        let _ = self.events_tx.send(ConnEvent::Connected);
        Ok(())
    }

    /// Closes the transport if open and fires the same disconnect event a
    /// surprise drop would, so callers only ever handle disconnect in one
    /// place.
    pub async fn disconnect(&self) {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.read_task.lock().unwrap().take() {
            handle.abort();
        }
        *self.write_half.lock().await = None;
        drain_pending(&self.pending);
        let _ = self.events_tx.send(ConnEvent::Disconnected {
            is_error: false,
            reason: "closed by caller".to_string(),
        });
    }

    pub async fn send_oneway(&self, request: ClientRequest) -> Result<()> {
        let frame = Frame::request(0, request);
        self.write_frame_locked(&frame).await
    }

    /// Sends `request` and awaits its reply, or a [`RenderNodeError::Cancelled`]
    /// if `cancel` fires first, or [`RenderNodeError::Disconnected`] if the
    /// transport drops while waiting.
    pub async fn send_request(
        &self,
        request: ClientRequest,
        cancel: &CancellationToken,
    ) -> Result<ServerReply> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().insert(id, tx);

        let frame = Frame::request(id, request);
        if let Err(e) = self.write_frame_locked(&frame).await {
            self.pending.lock().unwrap().remove(&id);
            return Err(e);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                self.pending.lock().unwrap().remove(&id);
                Err(RenderNodeError::Cancelled)
            }
            result = rx => {
                result.unwrap_or(Err(RenderNodeError::Disconnected))
            }
        }
    }

    async fn write_frame_locked(&self, frame: &Frame) -> Result<()> {
        let mut guard = self.write_half.lock().await;
        let half = guard.as_mut().ok_or(RenderNodeError::Disconnected)?;
        write_frame(half, frame).await
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.read_task.lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}

async fn read_loop(
    read_half: &mut tokio::net::tcp::OwnedReadHalf,
    pending: PendingTable,
    events_tx: mpsc::UnboundedSender<ConnEvent>,
    connected: Arc<AtomicBool>,
) {
    loop {
        match read_frame(read_half).await {
            Ok(frame) => match frame.message {
                WireMessage::Reply(reply) => {
                    let waiter = pending.lock().unwrap().remove(&frame.id);
                    if let Some(tx) = waiter {
                        let _ = tx.send(Ok(reply));
                    } else {
                        debug!(id = frame.id, "reply for unknown or already-resolved request");
                    }
                }
                WireMessage::Event(event) => {
                    let _ = events_tx.send(ConnEvent::Server(event));
                }
                WireMessage::Request(_) => {
                    connected.store(false, Ordering::SeqCst);
                    drain_pending(&pending);
                    let _ = events_tx.send(ConnEvent::Disconnected {
                        is_error: true,
                        reason: "received a request frame from the node".to_string(),
                    });
                    return;
                }
            },
            Err(RenderNodeError::Disconnected) => {
                connected.store(false, Ordering::SeqCst);
                drain_pending(&pending);
                let _ = events_tx.send(ConnEvent::Disconnected {
                    is_error: false,
                    reason: "connection closed".to_string(),
                });
                return;
            }
            Err(e) => {
                connected.store(false, Ordering::SeqCst);
                drain_pending(&pending);
                let _ = events_tx.send(ConnEvent::Disconnected {
                    is_error: true,
                    reason: e.to_string(),
                });
                return;
            }
        }
    }
}

fn drain_pending(pending: &PendingTable) {
    for (_, tx) in pending.lock().unwrap().drain() {
        let _ = tx.send(Err(RenderNodeError::Disconnected));
    }
}
