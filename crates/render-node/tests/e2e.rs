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

//! End-to-end scenarios against an in-process mock node, matching the
//! literal walkthroughs this crate's behavior was specified against.

mod support;

use std::sync::atomic::Ordering;
use std::time::Duration;

use pretty_assertions::assert_eq;
use render_node::config::{RecoveryConfig, RetryPolicy};
use render_node::node::NodeIdentity;
use render_node::protocol::{Compression, RenderType};
use render_node::{RenderNode, RenderNodeConfig, RenderNodeError, SessionId, TaskId};
use support::{one_mib_of, ConnectionPlan, MockServer};

fn fast_config() -> RenderNodeConfig {
    RenderNodeConfig {
        recovery: RecoveryConfig {
            attempts: 3,
            interval: Duration::from_millis(5),
        },
        ..RenderNodeConfig::default()
    }
}

fn identity(addr: std::net::SocketAddr) -> NodeIdentity {
    NodeIdentity {
        name: "node-a".to_string(),
        address: addr,
        render_type: RenderType::Cpu,
        performance: 0.0,
        pass: String::new(),
        mac: None,
    }
}

#[tokio::test]
async fn happy_render_with_sync_and_same_file_fast_path() {
    let plan = ConnectionPlan::default();
    let server = MockServer::start(vec![plan.clone()]).await;
    let node = RenderNode::new(identity(server.addr), fast_config());

    node.connect().await.unwrap();
    assert!(node.connected());

    let ok = node.prepare("3.6.0").await.unwrap();
    assert!(ok);
    assert!(node.state().has_version("3.6.0"));

    let session = SessionId::from("s1");
    node.sync_file(session.clone(), 42, one_mib_of(7), Some(1024 * 1024), Compression::None)
        .await
        .unwrap();
    assert!(node.state().is_session_synced(&session));
    assert_eq!(node.state().last_file_id(&session), Some(42));
    assert_eq!(plan.upload_count.load(Ordering::SeqCst), 1);

    // Scenario 5: repeating the sync takes the same_file branch.
    plan.sync_same_file.store(true, Ordering::SeqCst);
    node.sync_file(session.clone(), 42, one_mib_of(7), Some(1024 * 1024), Compression::None)
        .await
        .unwrap();
    assert_eq!(plan.upload_count.load(Ordering::SeqCst), 1, "same_file path sends no chunks");
    assert!(node.state().is_session_synced(&session));

    let task_id = TaskId::from("t1");
    let outcome = node.render(session, task_id, 1).await.unwrap();
    assert_eq!(outcome.pixels, 2_073_600.0);
    assert_eq!(outcome.render_ms, 1000.0);

    // Invariant 4: activity resets to empty on every exit path.
    assert_eq!(node.state().activity(), "");
    assert_eq!(node.state().current_task_id(), None);
}

#[tokio::test]
async fn auth_failure_closes_the_connection() {
    let plan = ConnectionPlan {
        require_auth: true,
        auth_ok: false,
        ..Default::default()
    };
    let server = MockServer::start(vec![plan]).await;
    let node = RenderNode::new(identity(server.addr), fast_config());

    let err = node.connect().await.unwrap_err();
    assert!(matches!(err, RenderNodeError::AuthFailed));
    assert!(!node.connected());
}

#[tokio::test]
async fn mid_render_disconnect_recovers_and_completes() {
    // First connection drops as soon as the render request arrives; every
    // subsequent connection (including the one recovery opens) behaves
    // normally, so the retried render completes.
    let dropping = ConnectionPlan {
        drop_on_request: Some("Render"),
        ..Default::default()
    };
    let normal = ConnectionPlan::default();
    let server = MockServer::start(vec![dropping, normal]).await;
    let node = RenderNode::new(identity(server.addr), fast_config());

    node.connect().await.unwrap();

    let session = SessionId::from("s1");
    let outcome = node.render(session, TaskId::from("t1"), 1).await.unwrap();
    assert_eq!(outcome.pixels, 2_073_600.0);

    // The node reconnected transparently; the caller never saw an error.
    assert!(node.connected());
}

#[tokio::test]
async fn render_retry_budget_exhausts_after_repeated_disconnects() {
    // Every connection (initial + every recovery) drops again on the next
    // render attempt. render's retry policy is bounded at 3 outer attempts,
    // so the 4th disconnect must surface RecoverExhausted rather than loop
    // forever.
    let dropping = ConnectionPlan {
        drop_on_request: Some("Render"),
        ..Default::default()
    };
    let server = MockServer::start(vec![dropping; 6]).await;
    let node = RenderNode::new(identity(server.addr), fast_config());

    node.connect().await.unwrap();

    let session = SessionId::from("s1");
    let err = node.render(session, TaskId::from("t1"), 1).await.unwrap_err();
    assert!(matches!(err, RenderNodeError::RecoverExhausted));
}

#[tokio::test]
async fn batch_render_retry_has_no_outer_cap() {
    // Six consecutive disconnects on RenderBatch, each one recovered, then
    // a seventh connection lets the batch actually complete. A bounded
    // policy would have given up after 3; render_batch's unbounded policy
    // must not.
    let dropping = ConnectionPlan {
        drop_on_request: Some("RenderBatch"),
        ..Default::default()
    };
    let mut plans = vec![dropping; 6];
    plans.push(ConnectionPlan::default());
    let server = MockServer::start(plans).await;
    let node = RenderNode::new(identity(server.addr), fast_config());

    node.connect().await.unwrap();

    let session = SessionId::from("s1");
    let outcome = node
        .render_batch(session, TaskId::from("t1"), vec![1, 2, 3])
        .await
        .unwrap();
    assert_eq!(outcome.completed_frames, vec![1, 2, 3]);
}

#[tokio::test]
async fn recover_fails_once_the_node_is_actually_gone() {
    let dropping = ConnectionPlan {
        drop_on_request: Some("Render"),
        ..Default::default()
    };
    let server = MockServer::start(vec![dropping]).await;
    let node = RenderNode::new(identity(server.addr), fast_config());

    node.connect().await.unwrap();
    server.stop();
    // Give the listener a moment to actually stop accepting.
    tokio::time::sleep(Duration::from_millis(20)).await;

    let session = SessionId::from("s1");
    let err = node.render(session, TaskId::from("t1"), 1).await.unwrap_err();
    assert!(matches!(err, RenderNodeError::RecoverFailed(_)));
}

#[tokio::test]
async fn disconnect_clears_synced_flags_per_invariant_two() {
    let plan = ConnectionPlan::default();
    let server = MockServer::start(vec![plan]).await;
    let node = RenderNode::new(identity(server.addr), fast_config());

    node.connect().await.unwrap();
    let session = SessionId::from("s1");
    node.sync_file(session.clone(), 1, one_mib_of(1), Some(1024 * 1024), Compression::None)
        .await
        .unwrap();
    assert!(node.state().is_session_synced(&session));

    node.disconnect().await;
    // Disconnect event dispatch runs on a separate task; give it a beat.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!node.state().is_session_synced(&session));
}

#[tokio::test]
async fn already_rendering_rejects_a_second_concurrent_task() {
    let plan = ConnectionPlan::default();
    let server = MockServer::start(vec![plan]).await;
    let node = RenderNode::new(identity(server.addr), fast_config());
    node.connect().await.unwrap();

    node.state().try_start_task(TaskId::from("in-flight")).unwrap();
    let err = node
        .render(SessionId::from("s1"), TaskId::from("t2"), 1)
        .await
        .unwrap_err();
    assert!(matches!(err, RenderNodeError::AlreadyRendering));
}

#[tokio::test]
async fn retry_policy_bounds_are_respected_types() {
    assert_eq!(RetryPolicy::bounded(3).max_attempts, Some(3));
    assert_eq!(RetryPolicy::unbounded().max_attempts, None);
}
