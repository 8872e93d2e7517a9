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

//! Version check plus optional password authentication, run on every fresh
//! connection and rerun verbatim by recovery.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::connection::Connection;
use crate::error::{RenderNodeError, Result};
use crate::protocol::{ClientRequest, ClientVersion, ServerReply, CLIENT_PROTOCOL_VERSION};

/// What the handshake learned about the node, to be folded into its state.
pub struct ComputerInfo {
    pub name: String,
    pub os: String,
    pub cores: i32,
}

pub const CLIENT_VERSION: ClientVersion = ClientVersion {
    major: 1,
    minor: 1,
    patch: 3,
};

/// Runs `CheckProtocol` -> (optional) `Auth` -> `ComputerInfo` against an
/// already-open connection. Idempotent: safe to call again after recovery
/// reconnects the same node.
pub async fn handshake(conn: &Connection, pass: &str) -> Result<ComputerInfo> {
    let cancel = CancellationToken::new();

    let reply = conn
        .send_request(
            ClientRequest::CheckProtocol {
                client_version: CLIENT_VERSION,
                protocol_version: CLIENT_PROTOCOL_VERSION,
            },
            &cancel,
        )
        .await?;
    let (server_protocol_version, require_auth) = match reply {
        ServerReply::CheckProtocol {
            protocol_version,
            require_auth,
        } => (protocol_version, require_auth),
        other => return Err(unexpected_reply("CheckProtocol", &other)),
    };
    if server_protocol_version != CLIENT_PROTOCOL_VERSION {
        return Err(RenderNodeError::OutdatedProtocol {
            server_version: server_protocol_version,
            client_version: CLIENT_PROTOCOL_VERSION,
        });
    }

    if require_auth {
        let reply = conn
            .send_request(
                ClientRequest::Auth {
                    pass: pass.to_string(),
                },
                &cancel,
            )
            .await?;
        match reply {
            ServerReply::Auth { is_authenticated } if is_authenticated => {
                debug!("authenticated");
            }
            ServerReply::Auth { .. } => return Err(RenderNodeError::AuthFailed),
            other => return Err(unexpected_reply("Auth", &other)),
        }
    }

    let reply = conn
        .send_request(ClientRequest::ComputerInfo, &cancel)
        .await?;
    match reply {
        ServerReply::ComputerInfo { name, os, cores } => Ok(ComputerInfo { name, os, cores }),
        other => Err(unexpected_reply("ComputerInfo", &other)),
    }
}

fn unexpected_reply(expected: &str, got: &ServerReply) -> RenderNodeError {
    RenderNodeError::ProtocolError(format!("expected reply to {expected}, got {got:?}"))
}
