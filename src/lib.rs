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

#![forbid(unsafe_code)]
//! Acton Mesh
//!
//! The core of a distributed actor runtime: actors and groups with
//! linking and lifetime attachments, a self-describing typed message
//! format with a cross-platform type registry, and the proxy/mailman
//! plumbing that moves messages between nodes.
//!
//! Scheduling is deliberately left to the embedder: a local actor is
//! just an id plus a mailbox handed in at creation, and whatever
//! dequeues that mailbox runs the behavior. The same goes for the
//! inbound socket reader; this crate produces and consumes the frames
//! and envelopes, the embedder owns the sockets' read loops.

/// The actor kernel.
pub mod actor;
/// Shared building blocks.
pub mod common;
/// The typed-message data model.
pub mod message;
/// Remote plumbing.
pub mod remote;
/// Wire encodings.
pub mod wire;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::actor::{
        exit_reason, mailbox, ActorId, ActorRef, ActorRegistry, Attachable, ChannelRef,
        FunctorAttachable, GroupManager, GroupModule, GroupRef, LocalGroupModule,
        MailboxReceiver, MailboxSender, Subscription, Token,
    };
    pub use crate::common::{AddressedMessage, MeshConfig, MeshError, MeshRuntime, CONFIG};
    pub use crate::message::{
        atom, AnyTuple, Atom, IntoAnyTuple, MeshDuration, ObjectArray, PrimitiveKind,
        PrimitiveVariant, PrimitiveVisitor, TimeUnit, TupleField, TupleValue, TypeMeta,
        TypeRegistry,
    };
    pub use crate::remote::{
        mailman_loop, MailmanHandle, MailmanJob, NodeId, ProcessInfo, ProxyCache, ProxyKey,
    };
    pub use crate::wire::{
        from_bytes, from_text, to_bytes, to_text, Deserializer, Serializer, WireContext,
    };
}
