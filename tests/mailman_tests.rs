/*
 * Copyright (c) 2024. Govcraft
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */

#![allow(dead_code)]

use std::sync::Arc;

use acton_mesh::prelude::*;
use acton_mesh::wire::framing::{read_frame, FRAME_HANDSHAKE, FRAME_MESSAGE};
use tokio::io::AsyncRead;

use crate::setup::initialize_tracing;

mod setup;

const MAX_FRAME: usize = 1024 * 1024;

fn foreign_peer() -> Arc<ProcessInfo> {
    Arc::new(ProcessInfo::new(4242, NodeId::from_bytes([9; 20])))
}

fn peer_key(peer: &ProcessInfo) -> ProxyKey {
    ProxyKey {
        aid: 7,
        pid: peer.pid(),
        node: *peer.node_id(),
    }
}

async fn expect_handshake<R: AsyncRead + Unpin>(reader: &mut R, runtime: &MeshRuntime) {
    let (kind, payload) = read_frame(reader, MAX_FRAME).await.unwrap();
    assert_eq!(kind, FRAME_HANDSHAKE);
    assert_eq!(String::from_utf8(payload).unwrap(), runtime.node().to_string());
}

/// One sender, one peer, one hundred messages: the peer socket sees them
/// in enqueue order, preceded by the handshake frame.
#[tokio::test]
async fn test_mailman_preserves_fifo_order() -> anyhow::Result<()> {
    initialize_tracing();
    let runtime = MeshRuntime::launch();
    let ctx = runtime.wire_context();

    let (client, mut server) = tokio::io::duplex(1024 * 1024);
    let peer = foreign_peer();
    let proxy = runtime.proxies().get_or_create(peer_key(&peer));

    runtime.mailman().add_peer(client, peer.clone());
    for i in 0..100u32 {
        let msg = AddressedMessage::new(
            None,
            ChannelRef::Actor(proxy.clone()),
            AnyTuple::make((atom("seq"), i)),
        );
        runtime.mailman().send_to(peer.clone(), msg);
    }

    expect_handshake(&mut server, &runtime).await;
    for expected in 0..100u32 {
        let (kind, payload) = read_frame(&mut server, MAX_FRAME).await?;
        assert_eq!(kind, FRAME_MESSAGE);
        let text = String::from_utf8(payload)?;
        let parsed = from_text(&text, &ctx)?;
        let msg = parsed.get::<AddressedMessage>().unwrap();
        assert_eq!(msg.content().get::<u32>(1), Some(&expected));
    }

    runtime.shutdown().await;
    Ok(())
}

/// Sends to a peer without a registered socket are dropped; the loop
/// keeps serving other peers.
#[tokio::test]
async fn test_unknown_peer_is_dropped_not_fatal() -> anyhow::Result<()> {
    initialize_tracing();
    let runtime = MeshRuntime::launch();
    let ctx = runtime.wire_context();

    let (client, mut server) = tokio::io::duplex(64 * 1024);
    let known = foreign_peer();
    let unknown = Arc::new(ProcessInfo::new(5555, NodeId::from_bytes([3; 20])));
    let proxy = runtime.proxies().get_or_create(peer_key(&known));

    runtime.mailman().add_peer(client, known.clone());

    let lost = AddressedMessage::new(
        None,
        ChannelRef::Actor(proxy.clone()),
        AnyTuple::make((atom("lost"),)),
    );
    runtime.mailman().send_to(unknown, lost);

    let delivered = AddressedMessage::new(
        None,
        ChannelRef::Actor(proxy),
        AnyTuple::make((atom("kept"),)),
    );
    runtime.mailman().send_to(known, delivered);

    expect_handshake(&mut server, &runtime).await;
    let (kind, payload) = read_frame(&mut server, MAX_FRAME).await?;
    assert_eq!(kind, FRAME_MESSAGE);
    let parsed = from_text(&String::from_utf8(payload)?, &ctx)?;
    let msg = parsed.get::<AddressedMessage>().unwrap();
    assert_eq!(msg.content().get::<Atom>(0), Some(&atom("kept")));

    runtime.shutdown().await;
    Ok(())
}

/// A proxy's enqueue becomes an outbound send job carrying the proxy as
/// receiver.
#[tokio::test]
async fn test_proxy_enqueue_routes_through_mailman() -> anyhow::Result<()> {
    initialize_tracing();
    let runtime = MeshRuntime::launch();
    let ctx = runtime.wire_context();

    let (client, mut server) = tokio::io::duplex(64 * 1024);
    let peer = foreign_peer();
    let proxy = runtime.proxies().get_or_create(peer_key(&peer));
    runtime.mailman().add_peer(client, peer);

    let (tx, _rx) = mailbox();
    let sender = runtime.create_actor(tx);
    proxy.enqueue(Some(sender.clone()), AnyTuple::make((atom("ping"), 1u8)));

    expect_handshake(&mut server, &runtime).await;
    let (_, payload) = read_frame(&mut server, MAX_FRAME).await?;
    let parsed = from_text(&String::from_utf8(payload)?, &ctx)?;
    let msg = parsed.get::<AddressedMessage>().unwrap();
    assert_eq!(msg.sender().as_ref(), Some(&sender));
    assert_eq!(msg.receiver().as_actor(), Some(&proxy));
    assert_eq!(msg.content().get::<Atom>(0), Some(&atom("ping")));

    runtime.shutdown().await;
    Ok(())
}

/// Linking a local actor to a proxy emits a `(:Link, local)` request to
/// the proxy's node.
#[tokio::test]
async fn test_proxy_link_emits_control_message() -> anyhow::Result<()> {
    initialize_tracing();
    let runtime = MeshRuntime::launch();
    let ctx = runtime.wire_context();

    let (client, mut server) = tokio::io::duplex(64 * 1024);
    let peer = foreign_peer();
    let proxy = runtime.proxies().get_or_create(peer_key(&peer));
    runtime.mailman().add_peer(client, peer);

    let (tx, _rx) = mailbox();
    let local = runtime.create_actor(tx);
    local.link_to(&proxy);
    assert!(local.is_linked_to(&proxy));
    assert!(proxy.is_linked_to(&local));

    expect_handshake(&mut server, &runtime).await;
    let (_, payload) = read_frame(&mut server, MAX_FRAME).await?;
    let parsed = from_text(&String::from_utf8(payload)?, &ctx)?;
    let msg = parsed.get::<AddressedMessage>().unwrap();
    assert_eq!(msg.content().get::<Atom>(0), Some(&atom(":Link")));
    assert_eq!(
        msg.content().get::<Option<ActorRef>>(1).unwrap().as_ref(),
        Some(&local)
    );

    runtime.shutdown().await;
    Ok(())
}

/// `(:KillProxy, reason)` enqueued on a proxy cleans it up locally
/// instead of crossing the wire.
#[tokio::test]
async fn test_kill_proxy_is_intercepted() -> anyhow::Result<()> {
    initialize_tracing();
    let runtime = MeshRuntime::launch();

    let peer = foreign_peer();
    let proxy = runtime.proxies().get_or_create(peer_key(&peer));
    assert_eq!(runtime.proxies().len(), 1);

    proxy.enqueue(None, AnyTuple::make((atom(":KillProxy"), 42u32)));
    assert!(proxy.is_exited());
    assert_eq!(proxy.exit_reason(), Some(42));
    assert!(runtime.proxies().is_empty(), "exit erases the cache entry");

    runtime.shutdown().await;
    Ok(())
}

/// Kill drains jobs queued before it and then stops the loop.
#[tokio::test]
async fn test_kill_drains_then_stops() -> anyhow::Result<()> {
    initialize_tracing();
    let runtime = MeshRuntime::launch();

    let (client, mut server) = tokio::io::duplex(64 * 1024);
    let peer = foreign_peer();
    let proxy = runtime.proxies().get_or_create(peer_key(&peer));
    runtime.mailman().add_peer(client, peer.clone());

    let msg = AddressedMessage::new(
        None,
        ChannelRef::Actor(proxy),
        AnyTuple::make((atom("last"),)),
    );
    runtime.mailman().send_to(peer, msg);

    // shutdown sends Kill; the message queued before it still goes out
    runtime.shutdown().await;

    expect_handshake(&mut server, &runtime).await;
    let (kind, _) = read_frame(&mut server, MAX_FRAME).await?;
    assert_eq!(kind, FRAME_MESSAGE);
    Ok(())
}
