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

//! Length-framed binary encoding of [`Frame`]s onto any duplex byte stream.
//!
//! Wire shape: a 4-byte big-endian length prefix followed by that many bytes
//! of `bincode`-encoded [`Frame`]. Reply matching is by [`Frame::id`]; a
//! reply id of 0 never occurs for a real request (ids are handed out
//! starting at 1) so it is reserved for events, which carry no correlation.

use bincode::{Decode, Encode};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::events::ServerEvent;
use super::messages::{ClientRequest, ServerReply};
use crate::error::{RenderNodeError, Result};

/// Frames larger than this are refused rather than allocated; a well-formed
/// peer never sends one (the largest legitimate payload is one 10 MiB sync
/// chunk plus a small envelope).
const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024 + (1024 * 1024);

pub const EVENT_ID: u64 = 0;

#[derive(Debug, Clone, Encode, Decode)]
pub enum WireMessage {
    Request(ClientRequest),
    Reply(ServerReply),
    Event(ServerEvent),
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Frame {
    pub id: u64,
    pub message: WireMessage,
}

impl Frame {
    pub fn request(id: u64, request: ClientRequest) -> Self {
        Frame {
            id,
            message: WireMessage::Request(request),
        }
    }

    pub fn reply(id: u64, reply: ServerReply) -> Self {
        Frame {
            id,
            message: WireMessage::Reply(reply),
        }
    }

    pub fn event(event: ServerEvent) -> Self {
        Frame {
            id: EVENT_ID,
            message: WireMessage::Event(event),
        }
    }
}

pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, frame: &Frame) -> Result<()> {
    let bytes = bincode::encode_to_vec(frame, bincode::config::standard())?;
    let len: u32 = bytes
        .len()
        .try_into()
        .map_err(|_| RenderNodeError::ProtocolError("frame too large to send".into()))?;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one frame, mapping a clean EOF on the length prefix to
/// `RenderNodeError::Disconnected` rather than a raw I/O error, since that's
/// the ordinary way a node going away is observed.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Frame> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(RenderNodeError::Disconnected);
        }
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_BYTES {
        return Err(RenderNodeError::ProtocolError(format!(
            "frame of {len} bytes exceeds maximum of {MAX_FRAME_BYTES}"
        )));
    }
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    let (frame, _) = bincode::decode_from_slice(&buf, bincode::config::standard())?;
    Ok(frame)
}
