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

//! Reconnect-and-resume: re-handshake, reauthenticate, reclaim named
//! sessions. Invoked by [`crate::task`] whenever a render/peek/batch request
//! observes a mid-flight disconnect.

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::RecoveryConfig;
use crate::connection::Connection;
use crate::error::{RenderNodeError, Result};
use crate::handshake;
use crate::ids::SessionId;
use crate::node::NodeState;
use crate::protocol::{ClientRequest, ServerReply};

/// Loops up to `config.attempts` times: open the transport and rerun the
/// handshake, then ask the node to reclaim `sessions`. Sleeps
/// `config.interval` between failed iterations. A recovered connection's
/// `available_versions` cache was already cleared by the disconnect event
/// that got us here; `synced_map` likewise reads false until a fresh
/// `CheckSync`/`sync` restores it (per Invariant 2).
pub async fn connect_recover(
    conn: &Connection,
    state: &NodeState,
    config: RecoveryConfig,
    sessions: &[SessionId],
) -> Result<()> {
    let pass = state.pass();
    let mut last_error = None;

    for attempt in 1..=config.attempts {
        match try_once(conn, state, &pass, sessions).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                warn!(attempt, error = %e, "recovery attempt failed");
                last_error = Some(e);
                if attempt < config.attempts {
                    tokio::time::sleep(config.interval).await;
                }
            }
        }
    }

    Err(RenderNodeError::RecoverFailed(
        last_error.map(|e| e.to_string()).unwrap_or_else(|| "no successful attempt".to_string()),
    ))
}

async fn try_once(
    conn: &Connection,
    state: &NodeState,
    pass: &str,
    sessions: &[SessionId],
) -> Result<()> {
    conn.connect().await?;
    let info = match handshake::handshake(conn, pass).await {
        Ok(info) => info,
        Err(e) => {
            conn.disconnect().await;
            return Err(e);
        }
    };
    state.set_computer_info(info.name, info.os, info.cores);
    state.set_connected(true);
    state.clear_exception();

    let cancel = CancellationToken::new();
    let reply = conn
        .send_request(
            ClientRequest::Recover {
                session_ids: sessions.to_vec(),
            },
            &cancel,
        )
        .await?;
    match reply {
        ServerReply::Recover { success: true, .. } => Ok(()),
        ServerReply::Recover { success: false, message } => Err(RenderNodeError::RecoverFailed(message)),
        other => Err(RenderNodeError::ProtocolError(format!(
            "expected reply to Recover, got {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovery_config_defaults_match_spec_literal_scenarios() {
        let cfg = RecoveryConfig::default();
        assert_eq!(cfg.attempts, 5);
        assert_eq!(cfg.interval, std::time::Duration::from_millis(1000));
    }
}
