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

//! The actor kernel: identity, lifetime, linking, attachments, groups,
//! and the process-local registry.

pub use actor::{
    exit_reason, mailbox, ActorId, ActorRef, ChannelRef, MailboxReceiver, MailboxSender,
};
pub use attachable::{Attachable, FunctorAttachable, Token};
pub use group::{GroupRef, Subscription};
pub use group_manager::{GroupManager, GroupModule, LocalGroupModule};
pub use registry::ActorRegistry;

/// Actor identity, lifetime, linking, and message delivery.
pub mod actor;
/// Exit callbacks and token-based detachment.
pub mod attachable;
/// Multicast channels.
pub mod group;
/// Named group modules.
pub mod group_manager;
/// Process-local id → actor mapping and the running-count barrier.
pub mod registry;
