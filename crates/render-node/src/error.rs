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

use thiserror::Error;

/// Errors surfaced by a render node session, from the transport layer up
/// through task dispatch.
#[derive(Debug, Error)]
pub enum RenderNodeError {
    #[error("transport disconnected")]
    Disconnected,

    #[error("server protocol version {server_version} does not match client {client_version}")]
    OutdatedProtocol {
        server_version: u32,
        client_version: u32,
    },

    #[error("protocol error: {0}")]
    ProtocolError(String),

    #[error("authentication failed")]
    AuthFailed,

    #[error("sync failed: {0}")]
    SyncFailed(String),

    #[error("a render or peek is already in flight on this node")]
    AlreadyRendering,

    #[error("operation cancelled")]
    Cancelled,

    #[error("recovery failed: {0}")]
    RecoverFailed(String),

    #[error("recovery attempts exhausted")]
    RecoverExhausted,

    #[error("invalid MAC address: {0}")]
    InvalidMac(String),

    #[error("performance sample requires ms > 0")]
    InvalidPerformanceSample,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to encode message: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("failed to decode message: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("settings serialization error: {0}")]
    Settings(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RenderNodeError>;
