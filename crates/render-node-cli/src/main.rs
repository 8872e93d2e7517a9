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

//! Demo CLI standing in for a real UI: drives one [`render_node::RenderNode`]
//! session and prints its change-notification stream to stdout. Not a
//! feature of the core — a thin harness to exercise it by hand.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use render_node::node::{NodeEvent, NodeIdentity};
use render_node::protocol::{Compression, RenderType};
use render_node::{RenderNode, RenderNodeConfig, SessionId, TaskId};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "render-node-cli", about = "Drive one render node session")]
struct Cli {
    /// Node's `host:port` to dial.
    #[arg(long)]
    address: String,

    /// Password to present if the node demands authentication.
    #[arg(long, default_value = "")]
    pass: String,

    /// Wake-on-LAN MAC address (any of `AA:BB:..`, `AA-BB-..`, or bare hex).
    #[arg(long)]
    mac: Option<String>,

    /// Session id this command operates under.
    #[arg(long, default_value = "default")]
    session: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Request the node provision a Blender version.
    Prepare { version: String },
    /// Upload a scene file in 10 MiB chunks.
    SyncFile {
        path: PathBuf,
        #[arg(long)]
        file_id: i64,
    },
    /// Dispatch a single-frame render.
    Render { frame: i32 },
    /// Dispatch a batch render across several frames.
    RenderBatch { frames: Vec<i32> },
    /// Query the scene without rendering.
    Peek,
    /// Ask whether the node is currently busy.
    IsBusy,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> render_node::Result<()> {
    let address = cli
        .address
        .parse()
        .map_err(|_| render_node::RenderNodeError::ProtocolError(format!("bad address: {}", cli.address)))?;
    let mac = cli.mac.as_deref().map(render_node::wol::parse_mac).transpose()?;

    let identity = NodeIdentity {
        name: cli.address.clone(),
        address,
        render_type: RenderType::Cpu,
        performance: 0.0,
        pass: cli.pass,
        mac,
    };

    let node = RenderNode::new(identity, RenderNodeConfig::default());
    let mut events = node.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                NodeEvent::Changed { field, value } => println!("[{field}] {value}"),
                NodeEvent::ConsoleLine(line) => println!("[console] {line}"),
                NodeEvent::BatchResult { task_id, frame, success } => {
                    println!("[batch] {task_id} frame {frame} success={success}")
                }
            }
        }
    });

    node.connect().await?;

    let session = SessionId::from(cli.session);
    match cli.command {
        Command::Prepare { version } => {
            let ok = node.prepare(&version).await?;
            println!("prepare({version}) -> {ok}");
        }
        Command::SyncFile { path, file_id } => {
            let file = tokio::fs::File::open(&path).await?;
            let total_len = file.metadata().await.ok().map(|m| m.len());
            node.sync_file(session, file_id, file, total_len, Compression::None)
                .await?;
            println!("sync_file({file_id}) -> synced");
        }
        Command::Render { frame } => {
            let task_id = TaskId::from(uuid::Uuid::new_v4().to_string());
            let outcome = node.render(session, task_id, frame).await?;
            println!("render(frame={frame}) -> pixels={} ms={}", outcome.pixels, outcome.render_ms);
        }
        Command::RenderBatch { frames } => {
            let task_id = TaskId::from(uuid::Uuid::new_v4().to_string());
            let outcome = node.render_batch(session, task_id, frames).await?;
            println!("render_batch -> completed {:?}", outcome.completed_frames);
        }
        Command::Peek => {
            let task_id = TaskId::from(uuid::Uuid::new_v4().to_string());
            let outcome = node.peek(session, task_id).await?;
            println!(
                "peek -> {}x{} frames {}..{}",
                outcome.resolution_x, outcome.resolution_y, outcome.frame_start, outcome.frame_end
            );
        }
        Command::IsBusy => {
            println!("is_busy -> {}", node.is_busy().await?);
        }
    }

    node.disconnect().await;
    Ok(())
}
