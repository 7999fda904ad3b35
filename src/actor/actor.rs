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

//! Actor identity, lifetime, linking, and message delivery.
//!
//! An [`ActorRef`] is a cloneable handle to one actor: either a local
//! actor backed by a mailbox (dequeued by whatever scheduler the embedder
//! runs) or a proxy standing in for an actor on another node, whose
//! enqueues become outbound mailman jobs.
//!
//! Control messages are interpreted at the **receiving** side: a local
//! actor's `enqueue` intercepts `(:Link, ref)` / `(:Unlink, ref)` as
//! backlink maintenance, and a proxy's `enqueue` additionally intercepts
//! `(:KillProxy, reason)` as local cleanup. Senders never interpret
//! control content.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::trace;

use crate::actor::attachable::{Attachable, Token};
use crate::actor::group::{GroupRef, GroupUnsubscriber};
use crate::common::envelope::AddressedMessage;
use crate::message::atom::atom;
use crate::message::atom::Atom;
use crate::message::tuple::AnyTuple;
use crate::remote::{MailmanHandle, ProcessInfo};

/// Well-known exit reason codes.
pub mod exit_reason {
    /// The actor is still running.
    pub const NOT_EXITED: u32 = 0x0000;
    /// Voluntary, clean termination. Linked peers are not signalled.
    pub const NORMAL: u32 = 0x0001;
    /// The actor's behavior failed.
    pub const UNHANDLED_ERROR: u32 = 0x0002;
    /// The node hosting a linked remote actor became unreachable.
    pub const REMOTE_LINK_UNREACHABLE: u32 = 0x0101;
    /// First code available for application-defined reasons.
    pub const USER_DEFINED: u32 = 0x10000;
}

/// Process-local actor id.
pub type ActorId = u32;

/// Sending half of a local actor's mailbox. Enqueue is non-blocking and
/// thread-safe; the scheduler owns the receiving half.
pub type MailboxSender = mpsc::UnboundedSender<AddressedMessage>;

/// Receiving half of a local actor's mailbox.
pub type MailboxReceiver = mpsc::UnboundedReceiver<AddressedMessage>;

/// Creates a fresh mailbox pair for a local actor.
#[must_use]
pub fn mailbox() -> (MailboxSender, MailboxReceiver) {
    mpsc::unbounded_channel()
}

enum ActorKind {
    Local(MailboxSender),
    Proxy(MailmanHandle),
}

struct ActorState {
    exit_reason: Option<u32>,
    attachables: Vec<Box<dyn Attachable>>,
    links: Vec<ActorRef>,
}

struct Actor {
    id: ActorId,
    node: Arc<ProcessInfo>,
    kind: ActorKind,
    state: Mutex<ActorState>,
}

/// Cloneable handle to one actor, local or remote.
///
/// Equality, ordering, and hashing are by instance identity: two handles
/// are equal exactly when they refer to the same actor object.
#[derive(Clone)]
pub struct ActorRef(Arc<Actor>);

enum ControlMsg {
    KillProxy(u32),
    Link(ActorRef),
    Unlink(ActorRef),
}

fn control_message(content: &AnyTuple) -> Option<ControlMsg> {
    if content.len() != 2 {
        return None;
    }
    let discriminator = *content.get::<Atom>(0)?;
    if discriminator == atom(":KillProxy") {
        return content.get::<u32>(1).map(|r| ControlMsg::KillProxy(*r));
    }
    let peer = content.get::<Option<ActorRef>>(1)?.clone()?;
    if discriminator == atom(":Link") {
        Some(ControlMsg::Link(peer))
    } else if discriminator == atom(":Unlink") {
        Some(ControlMsg::Unlink(peer))
    } else {
        None
    }
}

impl ActorRef {
    pub(crate) fn new_local(id: ActorId, node: Arc<ProcessInfo>, mailbox: MailboxSender) -> Self {
        Self(Arc::new(Actor {
            id,
            node,
            kind: ActorKind::Local(mailbox),
            state: Mutex::new(ActorState {
                exit_reason: None,
                attachables: Vec::new(),
                links: Vec::new(),
            }),
        }))
    }

    pub(crate) fn new_proxy(id: ActorId, node: Arc<ProcessInfo>, mailman: MailmanHandle) -> Self {
        Self(Arc::new(Actor {
            id,
            node,
            kind: ActorKind::Proxy(mailman),
            state: Mutex::new(ActorState {
                exit_reason: None,
                attachables: Vec::new(),
                links: Vec::new(),
            }),
        }))
    }

    /// The actor's process-local id.
    #[must_use]
    pub fn id(&self) -> ActorId {
        self.0.id
    }

    /// Identity of the process the actor lives in.
    #[must_use]
    pub fn node(&self) -> &Arc<ProcessInfo> {
        &self.0.node
    }

    /// `true` for proxies standing in for actors on other nodes.
    #[must_use]
    pub fn is_proxy(&self) -> bool {
        matches!(self.0.kind, ActorKind::Proxy(_))
    }

    /// `true` once the actor has exited.
    #[must_use]
    pub fn is_exited(&self) -> bool {
        self.0.state.lock().exit_reason.is_some()
    }

    /// The exit reason, or `None` while the actor is running.
    #[must_use]
    pub fn exit_reason(&self) -> Option<u32> {
        self.0.state.lock().exit_reason
    }

    /// `true` when `other` is in this actor's linked set.
    #[must_use]
    pub fn is_linked_to(&self, other: &Self) -> bool {
        self.0.state.lock().links.contains(other)
    }

    /// Delivers a message to this actor.
    ///
    /// Local actors push into their mailbox; proxies queue an outbound
    /// mailman job. Control messages are intercepted here instead of
    /// being delivered (see the module docs). Never blocks.
    pub fn enqueue(&self, sender: Option<ActorRef>, content: AnyTuple) {
        match &self.0.kind {
            ActorKind::Local(mailbox) => match control_message(&content) {
                Some(ControlMsg::Link(peer)) => {
                    trace!(actor = self.id(), peer = peer.id(), "installing backlink");
                    self.establish_backlink(&peer);
                }
                Some(ControlMsg::Unlink(peer)) => {
                    trace!(actor = self.id(), peer = peer.id(), "removing backlink");
                    self.remove_backlink(&peer);
                }
                Some(ControlMsg::KillProxy(_)) => {
                    trace!(actor = self.id(), "ignoring :KillProxy addressed to a local actor");
                }
                None => {
                    let msg = AddressedMessage::new(sender, ChannelRef::Actor(self.clone()), content);
                    if mailbox.send(msg).is_err() {
                        trace!(actor = self.id(), "mailbox gone, message dropped");
                    }
                }
            },
            ActorKind::Proxy(mailman) => match control_message(&content) {
                Some(ControlMsg::KillProxy(reason)) => {
                    trace!(actor = self.id(), reason, "proxy received :KillProxy");
                    self.exit(reason);
                }
                Some(ControlMsg::Link(peer)) => {
                    self.link_impl(&peer);
                }
                Some(ControlMsg::Unlink(peer)) => {
                    self.unlink_impl(&peer);
                }
                None => {
                    let msg = AddressedMessage::new(sender, ChannelRef::Actor(self.clone()), content);
                    mailman.send_to(self.0.node.clone(), msg);
                }
            },
        }
    }

    /// Attaches a callback fired at exit.
    ///
    /// Returns `false` if the actor has already exited; in that case the
    /// attachable is detached immediately with the recorded reason.
    pub fn attach(&self, attachable: Box<dyn Attachable>) -> bool {
        let mut st = self.0.state.lock();
        match st.exit_reason {
            None => {
                st.attachables.push(attachable);
                true
            }
            Some(reason) => {
                drop(st);
                let mut attachable = attachable;
                attachable.detach(reason);
                false
            }
        }
    }

    /// Attaches a closure fired at exit with the exit reason.
    pub fn attach_functor<F: FnMut(u32) + Send + 'static>(&self, functor: F) -> bool {
        self.attach(Box::new(crate::actor::attachable::FunctorAttachable::new(functor)))
    }

    /// Removes (and drops) the first attachment matching the token.
    /// No-op on exited actors.
    pub fn detach(&self, token: &Token) {
        let _removed = {
            let mut st = self.0.state.lock();
            if st.exit_reason.is_some() {
                None
            } else {
                st.attachables
                    .iter()
                    .position(|a| a.matches(token))
                    .map(|i| st.attachables.remove(i))
            }
        };
        // dropped outside the lock; RAII attachments clean up in Drop
    }

    fn link_impl(&self, other: &Self) -> bool {
        if self == other {
            return false;
        }
        let mut st = self.0.state.lock();
        if st.exit_reason.is_some() || st.links.contains(other) {
            return false;
        }
        st.links.push(other.clone());
        true
    }

    fn unlink_impl(&self, other: &Self) -> bool {
        let mut st = self.0.state.lock();
        if st.exit_reason.is_some() {
            return false;
        }
        match st.links.iter().position(|l| l == other) {
            Some(i) => {
                st.links.remove(i);
                true
            }
            None => false,
        }
    }

    /// Links this actor to `other` bidirectionally.
    ///
    /// Both linked sets record the peer. When either side exits with a
    /// non-normal reason, the other receives an `(:Exit, reason)` signal.
    /// No-op when either actor has exited.
    pub fn link_to(&self, other: &Self) {
        if self.link_impl(other) {
            if !other.establish_backlink(self) {
                // peer exited in between
                self.unlink_impl(other);
                return;
            }
            if let ActorKind::Proxy(mailman) = &self.0.kind {
                self.forward_link_control(mailman, other, ":Link");
            }
        }
    }

    /// Removes a bidirectional link. No-op when the link does not exist.
    pub fn unlink_from(&self, other: &Self) {
        if self.unlink_impl(other) {
            other.remove_backlink(self);
            if let ActorKind::Proxy(mailman) = &self.0.kind {
                self.forward_link_control(mailman, other, ":Unlink");
            }
        }
    }

    /// Records `other` in this actor's linked set, the half of
    /// [`ActorRef::link_to`] executed on the peer.
    ///
    /// Returns `false` when the actor has exited or the link already
    /// exists. Proxies additionally tell their remote actor to install
    /// the same link.
    pub fn establish_backlink(&self, other: &Self) -> bool {
        let added = self.link_impl(other);
        if added {
            if let ActorKind::Proxy(mailman) = &self.0.kind {
                self.forward_link_control(mailman, other, ":Link");
            }
        }
        added
    }

    /// Removes `other` from this actor's linked set; the peer half of
    /// [`ActorRef::unlink_from`].
    pub fn remove_backlink(&self, other: &Self) -> bool {
        let removed = self.unlink_impl(other);
        if removed {
            if let ActorKind::Proxy(mailman) = &self.0.kind {
                self.forward_link_control(mailman, other, ":Unlink");
            }
        }
        removed
    }

    fn forward_link_control(&self, mailman: &MailmanHandle, peer: &Self, which: &str) {
        trace!(actor = self.id(), peer = peer.id(), which, "forwarding link control to remote node");
        let content = AnyTuple::make((atom(which), Some(peer.clone())));
        let msg = AddressedMessage::new(Some(peer.clone()), ChannelRef::Actor(self.clone()), content);
        mailman.send_to(self.0.node.clone(), msg);
    }

    /// Subscribes this actor to a group for the rest of its lifetime.
    ///
    /// The subscription is carried by an attachment, so exiting the actor
    /// (or [`ActorRef::leave`]) unsubscribes it.
    pub fn join(&self, group: &GroupRef) {
        if group.subscribe_channel(ChannelRef::Actor(self.clone())) {
            let unsubscriber =
                GroupUnsubscriber::new(ChannelRef::Actor(self.clone()), group.clone());
            // attach failure means we exited in the meantime; dropping the
            // unsubscriber then rolls the subscription back
            let _ = self.attach(Box::new(unsubscriber));
        }
    }

    /// Leaves a previously joined group.
    pub fn leave(&self, group: &GroupRef) {
        self.detach(&Token::of::<GroupUnsubscriber>(group.token_ptr()));
    }

    /// Terminates the actor with the given reason.
    ///
    /// Every attachable receives `detach(reason)` once, in attach order.
    /// Links are torn down; peers receive an `(:Exit, reason)` signal
    /// unless the reason is [`exit_reason::NORMAL`]. Idempotent.
    pub fn exit(&self, reason: u32) {
        let (attachables, links) = {
            let mut st = self.0.state.lock();
            if st.exit_reason.is_some() {
                return;
            }
            st.exit_reason = Some(reason);
            (std::mem::take(&mut st.attachables), std::mem::take(&mut st.links))
        };
        trace!(actor = self.id(), reason, "actor exiting");
        for mut attachable in attachables {
            attachable.detach(reason);
        }
        for peer in links {
            peer.remove_backlink(self);
            if reason != exit_reason::NORMAL {
                peer.enqueue(Some(self.clone()), AnyTuple::make((atom(":Exit"), reason)));
            }
        }
    }
}

impl PartialEq for ActorRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ActorRef {}

impl Hash for ActorRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as usize).hash(state);
    }
}

impl PartialOrd for ActorRef {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ActorRef {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (Arc::as_ptr(&self.0) as usize).cmp(&(Arc::as_ptr(&other.0) as usize))
    }
}

impl fmt::Debug for ActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorRef")
            .field("id", &self.0.id)
            .field("node", &self.0.node.to_string())
            .field("proxy", &self.is_proxy())
            .finish()
    }
}

/// Anything that can receive a message: an actor or a group.
///
/// The two variants are the only channel subtypes; conversion back to the
/// concrete handle is a checked downcast via [`ChannelRef::as_actor`] /
/// [`ChannelRef::as_group`] or `TryFrom`.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum ChannelRef {
    /// A single actor, local or proxy.
    Actor(ActorRef),
    /// A multicast group.
    Group(GroupRef),
}

impl ChannelRef {
    /// Delivers a message to the channel. For groups this fans out to
    /// every current subscriber.
    pub fn enqueue(&self, sender: Option<ActorRef>, content: AnyTuple) {
        match self {
            Self::Actor(actor) => actor.enqueue(sender, content),
            Self::Group(group) => group.enqueue(sender, &content),
        }
    }

    /// The actor handle, if this channel is an actor.
    #[must_use]
    pub fn as_actor(&self) -> Option<&ActorRef> {
        match self {
            Self::Actor(actor) => Some(actor),
            Self::Group(_) => None,
        }
    }

    /// The group handle, if this channel is a group.
    #[must_use]
    pub fn as_group(&self) -> Option<&GroupRef> {
        match self {
            Self::Group(group) => Some(group),
            Self::Actor(_) => None,
        }
    }
}

impl From<ActorRef> for ChannelRef {
    fn from(actor: ActorRef) -> Self {
        Self::Actor(actor)
    }
}

impl From<GroupRef> for ChannelRef {
    fn from(group: GroupRef) -> Self {
        Self::Group(group)
    }
}

impl TryFrom<ChannelRef> for ActorRef {
    type Error = ChannelRef;

    fn try_from(channel: ChannelRef) -> Result<Self, ChannelRef> {
        match channel {
            ChannelRef::Actor(actor) => Ok(actor),
            other => Err(other),
        }
    }
}

impl TryFrom<ChannelRef> for GroupRef {
    type Error = ChannelRef;

    fn try_from(channel: ChannelRef) -> Result<Self, ChannelRef> {
        match channel {
            ChannelRef::Group(group) => Ok(group),
            other => Err(other),
        }
    }
}
