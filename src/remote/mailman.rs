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

//! The outbound side of the transport: a single-reader job queue and the
//! loop that drains it.
//!
//! Proxies (and anything else with a [`MailmanHandle`]) push jobs; one
//! dedicated task pulls them in FIFO order and writes message frames to
//! the peer sockets it has been handed via [`MailmanJob::AddPeer`]. For a
//! fixed sender task and peer, messages reach the peer socket in enqueue
//! order.
//!
//! Failure policy: a `Send` to an unregistered peer is dropped and
//! logged; a write error evicts the peer and drops subsequent jobs
//! targeting it; neither stops the loop. Only [`MailmanJob::Kill`] does.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tracing::{debug, error, instrument, trace, warn};

use crate::common::config::CONFIG;
use crate::common::envelope::AddressedMessage;
use crate::common::MeshError;
use crate::message::tuple::TupleValue;
use crate::remote::node::{NodeId, ProcessInfo};
use crate::wire::framing::{write_frame, FRAME_HANDSHAKE, FRAME_MESSAGE};
use crate::wire::serializer::WireContext;
use crate::wire::text::to_text;

/// A registered peer connection: anything the loop can write frames to.
pub type PeerConn = Box<dyn AsyncWrite + Send + Unpin>;

/// One unit of outbound work.
pub enum MailmanJob {
    /// Serialize the message and write it to the socket bound to `peer`.
    Send {
        /// The destination process.
        peer: Arc<ProcessInfo>,
        /// The envelope to deliver.
        msg: AddressedMessage,
    },
    /// Register a connection for `peer` in the peer table.
    AddPeer {
        /// Writable half of the peer connection.
        conn: PeerConn,
        /// The process reachable through `conn`.
        peer: Arc<ProcessInfo>,
    },
    /// Drain and stop the loop.
    Kill,
}

impl std::fmt::Debug for MailmanJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Send { peer, .. } => f.debug_struct("Send").field("peer", peer).finish_non_exhaustive(),
            Self::AddPeer { peer, .. } => {
                f.debug_struct("AddPeer").field("peer", peer).finish_non_exhaustive()
            }
            Self::Kill => f.write_str("Kill"),
        }
    }
}

/// Cloneable producer side of the mailman queue.
#[derive(Clone)]
pub struct MailmanHandle {
    tx: mpsc::UnboundedSender<MailmanJob>,
}

impl MailmanHandle {
    /// Creates the queue, returning the producer handle and the receiver
    /// to hand to [`mailman_loop`].
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<MailmanJob>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queues a message for delivery to `peer`.
    pub fn send_to(&self, peer: Arc<ProcessInfo>, msg: AddressedMessage) {
        self.push(MailmanJob::Send { peer, msg });
    }

    /// Registers a peer connection.
    pub fn add_peer(&self, conn: impl AsyncWrite + Send + Unpin + 'static, peer: Arc<ProcessInfo>) {
        self.push(MailmanJob::AddPeer {
            conn: Box::new(conn),
            peer,
        });
    }

    /// Asks the loop to drain pending jobs and stop.
    pub fn kill(&self) {
        self.push(MailmanJob::Kill);
    }

    fn push(&self, job: MailmanJob) {
        if self.tx.send(job).is_err() {
            warn!("mailman queue is gone, job dropped");
        }
    }
}

impl std::fmt::Debug for MailmanHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MailmanHandle")
    }
}

type PeerKey = (u32, NodeId);

fn peer_key(peer: &ProcessInfo) -> PeerKey {
    (peer.pid(), *peer.node_id())
}

fn serialize_envelope(msg: &AddressedMessage, ctx: &WireContext) -> Result<String, MeshError> {
    to_text(&TupleValue::new(msg.clone()), ctx)
}

/// Serializes and writes one envelope. A missing peer is
/// [`MeshError::PeerUnknown`]; a write failure evicts the peer before the
/// error is returned.
async fn deliver(
    peers: &mut HashMap<PeerKey, PeerConn>,
    peer: &Arc<ProcessInfo>,
    msg: &AddressedMessage,
    ctx: &WireContext,
) -> Result<(), MeshError> {
    let key = peer_key(peer);
    let conn = peers
        .get_mut(&key)
        .ok_or_else(|| MeshError::PeerUnknown(peer.to_string()))?;
    let payload = serialize_envelope(msg, ctx)?;
    if let Err(e) = write_frame(conn, FRAME_MESSAGE, payload.as_bytes()).await {
        peers.remove(&key);
        return Err(e);
    }
    Ok(())
}

/// Drains the mailman queue until a [`MailmanJob::Kill`] arrives or every
/// handle is dropped.
///
/// Run this on its own task; the runtime does so at launch.
#[instrument(skip(jobs, ctx), fields(node = %ctx.node))]
pub async fn mailman_loop(mut jobs: mpsc::UnboundedReceiver<MailmanJob>, ctx: WireContext) {
    let mut peers: HashMap<PeerKey, PeerConn> = HashMap::new();
    debug!("mailman loop started");

    while let Some(job) = jobs.recv().await {
        match job {
            MailmanJob::AddPeer { mut conn, peer } => {
                // announce ourselves before any traffic flows
                let identity = ctx.node.to_string();
                match write_frame(&mut conn, FRAME_HANDSHAKE, identity.as_bytes()).await {
                    Ok(()) => {
                        trace!(peer = %peer, "peer registered");
                        peers.insert(peer_key(&peer), conn);
                    }
                    Err(e) => {
                        error!(peer = %peer, error = %e, "handshake failed, peer not registered");
                    }
                }
            }
            MailmanJob::Send { peer, msg } => {
                if let Err(e) = deliver(&mut peers, &peer, &msg, &ctx).await {
                    error!(peer = %peer, error = %e, "outbound job failed, message dropped");
                }
            }
            MailmanJob::Kill => {
                debug!("mailman loop stopping");
                break;
            }
        }
    }
}

/// Upper bound applied by inbound readers when framing mailman traffic.
#[must_use]
pub fn max_frame_size() -> usize {
    CONFIG.limits.max_frame_size
}
