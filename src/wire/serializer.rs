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

//! Abstract sink and source for self-describing values.
//!
//! Type meta objects drive these traits to move values in and out of a
//! stream without knowing the concrete encoding. Two encodings ship with
//! the crate: the textual object grammar in [`crate::wire::text`] and the
//! tagged binary form in [`crate::wire::binary`].
//!
//! [`WireContext`] carries the collaborators that reference serialization
//! needs (actor registry, proxy cache, group manager, local node
//! identity). It travels explicitly with every encode/decode call; there
//! is no hidden thread-local state, so tests can run any number of
//! isolated "processes" side by side.

use std::sync::Arc;

use crate::actor::ActorRegistry;
use crate::actor::GroupManager;
use crate::common::MeshError;
use crate::message::registry::TypeRegistry;
use crate::message::variant::{PrimitiveKind, PrimitiveVariant};
use crate::remote::{ProcessInfo, ProxyCache};

/// Abstract encoder: receives a stream of structure events and values.
pub trait Serializer {
    /// Opens an object with the given uniform type name.
    fn begin_object(&mut self, name: &str) -> Result<(), MeshError>;

    /// Closes the innermost open object.
    fn end_object(&mut self) -> Result<(), MeshError>;

    /// Opens a sequence of `len` values.
    fn begin_sequence(&mut self, len: usize) -> Result<(), MeshError>;

    /// Closes the innermost open sequence.
    fn end_sequence(&mut self) -> Result<(), MeshError>;

    /// Writes a single primitive value.
    fn write_value(&mut self, value: &PrimitiveVariant) -> Result<(), MeshError>;

    /// Writes a fixed-size run of primitive values as one sequence.
    fn write_tuple(&mut self, values: &[PrimitiveVariant]) -> Result<(), MeshError>;
}

/// Abstract decoder: mirrors [`Serializer`] event for event.
pub trait Deserializer {
    /// Reads and consumes the next object's type name.
    fn seek_object(&mut self) -> Result<String, MeshError>;

    /// Reads the next object's type name without consuming it.
    fn peek_object(&mut self) -> Result<String, MeshError>;

    /// Enters an object whose name was already consumed via
    /// [`Deserializer::seek_object`].
    fn begin_object(&mut self, name: &str) -> Result<(), MeshError>;

    /// Leaves the innermost open object.
    fn end_object(&mut self) -> Result<(), MeshError>;

    /// Enters a sequence, returning the number of values it holds.
    fn begin_sequence(&mut self) -> Result<usize, MeshError>;

    /// Leaves the innermost open sequence.
    fn end_sequence(&mut self) -> Result<(), MeshError>;

    /// Reads a single primitive value of the requested kind.
    fn read_value(&mut self, kind: PrimitiveKind) -> Result<PrimitiveVariant, MeshError>;

    /// Reads a fixed-size run of primitive values with the given kinds.
    fn read_tuple(&mut self, kinds: &[PrimitiveKind]) -> Result<Vec<PrimitiveVariant>, MeshError>;
}

/// Collaborators needed to serialize and deserialize references.
///
/// Cloning is cheap (everything inside is shared). Two contexts built over
/// the same collaborators intern proxies together; contexts with distinct
/// [`ProxyCache`]s behave like independent deserialization threads.
#[derive(Clone)]
pub struct WireContext {
    /// Type meta registry driving slot encode/decode.
    pub types: Arc<TypeRegistry>,
    /// Process-local actor registry, consulted for local reference
    /// resolution and told about every actor reference that leaves the
    /// process.
    pub actors: Arc<ActorRegistry>,
    /// Group manager used to re-resolve group references by
    /// (module, identifier).
    pub groups: Arc<GroupManager>,
    /// Interning cache for remote actor proxies.
    pub proxies: ProxyCache,
    /// Identity of this process; decides local vs. remote resolution.
    pub node: Arc<ProcessInfo>,
}

impl WireContext {
    /// A context over fresh, unconnected collaborators.
    ///
    /// Reference resolution interns within the context itself, but no
    /// mailman loop is draining the queue behind its proxy cache, so
    /// proxies created through it drop outbound traffic. Meant for
    /// tools and tests; running systems get contexts from
    /// [`MeshRuntime`](crate::common::MeshRuntime).
    #[must_use]
    pub fn standalone() -> Self {
        let (mailman, _jobs) = crate::remote::MailmanHandle::channel();
        Self {
            types: Arc::new(TypeRegistry::with_builtins()),
            actors: ActorRegistry::new(),
            groups: Arc::new(GroupManager::new()),
            proxies: ProxyCache::new(mailman),
            node: ProcessInfo::local().clone(),
        }
    }
}

impl std::fmt::Debug for WireContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WireContext")
            .field("node", &self.node)
            .finish_non_exhaustive()
    }
}
