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

//! Multicast channels.
//!
//! A group is a channel whose `enqueue` fans out to every currently
//! subscribed channel. Fan-out happens under a shared lock, so
//! subscribers must not block inside their own `enqueue`, and re-entrant
//! subscribe/unsubscribe from within a subscriber's enqueue handler is
//! undefined. A subscriber added while a fan-out is in flight may or may
//! not see that message.

use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use crate::actor::actor::{ActorRef, ChannelRef};
use crate::actor::attachable::{Attachable, Token};
use crate::message::tuple::AnyTuple;

struct Group {
    module_name: String,
    identifier: String,
    subscribers: RwLock<HashSet<ChannelRef>>,
}

/// Cloneable handle to one group instance.
///
/// Instances are interned by their module: asking the same module for the
/// same identifier yields the same instance, so equality (by identity)
/// matches equality by name within a process.
#[derive(Clone)]
pub struct GroupRef(Arc<Group>);

impl GroupRef {
    pub(crate) fn new(module_name: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self(Arc::new(Group {
            module_name: module_name.into(),
            identifier: identifier.into(),
            subscribers: RwLock::new(HashSet::new()),
        }))
    }

    /// The module this group belongs to.
    #[must_use]
    pub fn module_name(&self) -> &str {
        &self.0.module_name
    }

    /// The group's identifier within its module.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.0.identifier
    }

    /// Delivers a message to every channel subscribed at call entry.
    pub fn enqueue(&self, sender: Option<ActorRef>, content: &AnyTuple) {
        let subscribers = self.0.subscribers.read();
        trace!(
            group = self.identifier(),
            count = subscribers.len(),
            "fanning out to subscribers"
        );
        for subscriber in subscribers.iter() {
            subscriber.enqueue(sender.clone(), content.clone());
        }
    }

    /// Adds a subscriber, returning a scoped handle that unsubscribes on
    /// drop. Returns `None` when the channel was already subscribed.
    #[must_use]
    pub fn subscribe(&self, channel: ChannelRef) -> Option<Subscription> {
        if self.subscribe_channel(channel.clone()) {
            Some(Subscription {
                group: self.clone(),
                channel,
            })
        } else {
            None
        }
    }

    /// Raw insert without a scope guard. Returns `false` when already
    /// subscribed.
    pub(crate) fn subscribe_channel(&self, channel: ChannelRef) -> bool {
        self.0.subscribers.write().insert(channel)
    }

    /// Removes a subscriber. Idempotent.
    pub fn unsubscribe(&self, channel: &ChannelRef) {
        self.0.subscribers.write().remove(channel);
    }

    /// `true` when the channel is currently subscribed.
    #[must_use]
    pub fn is_subscribed(&self, channel: &ChannelRef) -> bool {
        self.0.subscribers.read().contains(channel)
    }

    /// Number of current subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.0.subscribers.read().len()
    }

    /// Identity pointer for attachment tokens.
    pub(crate) fn token_ptr(&self) -> *const () {
        Arc::as_ptr(&self.0).cast()
    }
}

impl PartialEq for GroupRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for GroupRef {}

impl Hash for GroupRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as usize).hash(state);
    }
}

impl fmt::Debug for GroupRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupRef")
            .field("module", &self.0.module_name)
            .field("identifier", &self.0.identifier)
            .finish()
    }
}

/// Scoped subscription: dropping it unsubscribes the channel.
///
/// Unsubscription is idempotent, so dropping after an explicit
/// [`GroupRef::unsubscribe`] is harmless.
#[must_use = "dropping the subscription immediately unsubscribes the channel"]
pub struct Subscription {
    group: GroupRef,
    channel: ChannelRef,
}

impl Subscription {
    /// The subscribed channel.
    #[must_use]
    pub fn channel(&self) -> &ChannelRef {
        &self.channel
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.group.unsubscribe(&self.channel);
    }
}

/// Attachment backing [`ActorRef::join`]: unsubscribes the actor from its
/// group when dropped, which happens at detach-by-token
/// ([`ActorRef::leave`]) or at actor exit.
pub(crate) struct GroupUnsubscriber {
    channel: ChannelRef,
    group: GroupRef,
}

impl GroupUnsubscriber {
    pub(crate) fn new(channel: ChannelRef, group: GroupRef) -> Self {
        Self { channel, group }
    }
}

impl Drop for GroupUnsubscriber {
    fn drop(&mut self) {
        self.group.unsubscribe(&self.channel);
    }
}

impl Attachable for GroupUnsubscriber {
    fn matches(&self, token: &Token) -> bool {
        token.subtype == std::any::TypeId::of::<Self>() && token.ptr == self.group.token_ptr()
    }
}
