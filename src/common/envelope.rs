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

//! The envelope moved between actors and across nodes.

use crate::actor::{ActorRef, ChannelRef};
use crate::message::tuple::AnyTuple;

/// `(sender, receiver, content)`: one addressed message.
///
/// The sender may be absent for system-injected messages. Equality is
/// component-wise; since tuple equality is defined by type-info equality,
/// two physically distinct messages carrying equal content compare equal.
#[derive(Clone, PartialEq, Debug)]
pub struct AddressedMessage {
    sender: Option<ActorRef>,
    receiver: ChannelRef,
    content: AnyTuple,
}

impl AddressedMessage {
    /// Builds an envelope.
    #[must_use]
    pub fn new(sender: Option<ActorRef>, receiver: ChannelRef, content: AnyTuple) -> Self {
        Self {
            sender,
            receiver,
            content,
        }
    }

    /// The sending actor, if any.
    #[must_use]
    pub fn sender(&self) -> &Option<ActorRef> {
        &self.sender
    }

    /// The destination channel.
    #[must_use]
    pub fn receiver(&self) -> &ChannelRef {
        &self.receiver
    }

    /// The payload.
    #[must_use]
    pub fn content(&self) -> &AnyTuple {
        &self.content
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{mailbox, ActorRef};
    use crate::remote::ProcessInfo;

    fn local_actor(id: u32) -> ActorRef {
        let (tx, _rx) = mailbox();
        ActorRef::new_local(id, ProcessInfo::local().clone(), tx)
    }

    #[test]
    fn test_equality_is_component_wise() {
        let receiver = local_actor(1);
        let a = AddressedMessage::new(
            None,
            ChannelRef::Actor(receiver.clone()),
            AnyTuple::make((1i32, "x".to_string())),
        );
        let b = AddressedMessage::new(
            None,
            ChannelRef::Actor(receiver.clone()),
            AnyTuple::make((1i32, "x".to_string())),
        );
        assert_eq!(a, b);

        let different_content = AddressedMessage::new(
            None,
            ChannelRef::Actor(receiver.clone()),
            AnyTuple::make((2i32, "x".to_string())),
        );
        assert_ne!(a, different_content);

        let different_sender = AddressedMessage::new(
            Some(local_actor(2)),
            ChannelRef::Actor(receiver),
            AnyTuple::make((1i32, "x".to_string())),
        );
        assert_ne!(a, different_sender);
    }
}
