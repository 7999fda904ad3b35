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

//! The typed-message data model: primitive variants, atoms, tuples, and
//! the type meta registry that makes payloads self-describing.

pub use atom::{atom, Atom, MAX_ATOM_LEN};
pub use duration::{MeshDuration, TimeUnit};
pub use registry::TypeRegistry;
pub use tuple::{AnyTuple, IntoAnyTuple, ObjectArray, TupleValue};
pub use type_info::{PrimitiveField, TupleField, TypeMeta, NULL_TYPE_NAME};
pub use variant::{PrimitiveKind, PrimitiveVariant, PrimitiveVisitor};

/// Interned short identifiers packed into 64 bits.
pub mod atom;
/// The `@duration` value type.
pub mod duration;
/// Name-indexed registry of type meta objects.
pub mod registry;
/// Type-erased, copy-on-write message payloads.
pub mod tuple;
/// The [`TypeMeta`] trait and builtin meta objects.
pub mod type_info;
/// Tagged container for the primitive wire types.
pub mod variant;
