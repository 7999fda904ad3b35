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

//! Registry mapping type names to meta objects.
//!
//! Two parallel maps index every announced [`TypeMeta`]: one by uniform
//! name (the stable wire identity) and one by each raw-name alias.
//! Built-ins are registered once at construction; user types join through
//! [`TypeRegistry::announce`], which is append-only. After startup the
//! registry is effectively read-only, so lookups are uncontended.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::trace;

use crate::message::type_info::{
    ActorRefMeta, AtomMeta, ChannelRefMeta, DurationMeta, GroupRefMeta, MessageMeta,
    PrimitiveMeta, TupleMeta, TypeMeta, VoidMeta,
};

/// Process-wide index of type meta objects.
#[derive(Default)]
pub struct TypeRegistry {
    by_uniform: DashMap<String, Arc<dyn TypeMeta>>,
    by_raw: DashMap<String, Arc<dyn TypeMeta>>,
}

impl TypeRegistry {
    /// An empty registry. Most callers want
    /// [`TypeRegistry::with_builtins`] instead.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry preloaded with every builtin type: the primitive
    /// buckets (with their width/signedness aliases), the three string
    /// kinds, `@atom`, `@duration`, `@actor`, `@group`, `@channel`,
    /// `@tuple`, `@msg`, and `@0`.
    #[must_use]
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.announce(Arc::new(PrimitiveMeta::<i8>::new()));
        registry.announce(Arc::new(PrimitiveMeta::<i16>::new()));
        registry.announce(Arc::new(PrimitiveMeta::<i32>::new()));
        registry.announce(Arc::new(PrimitiveMeta::<i64>::new()));
        registry.announce(Arc::new(PrimitiveMeta::<u8>::new()));
        registry.announce(Arc::new(PrimitiveMeta::<u16>::new()));
        registry.announce(Arc::new(PrimitiveMeta::<u32>::new()));
        registry.announce(Arc::new(PrimitiveMeta::<u64>::new()));
        registry.announce(Arc::new(PrimitiveMeta::<f32>::new()));
        registry.announce(Arc::new(PrimitiveMeta::<f64>::new()));
        registry.announce(Arc::new(PrimitiveMeta::<String>::new()));
        registry.announce(Arc::new(PrimitiveMeta::<Vec<u16>>::new()));
        registry.announce(Arc::new(PrimitiveMeta::<Vec<char>>::new()));
        registry.announce(Arc::new(AtomMeta));
        registry.announce(Arc::new(DurationMeta));
        registry.announce(Arc::new(VoidMeta));
        registry.announce(Arc::new(ActorRefMeta));
        registry.announce(Arc::new(GroupRefMeta));
        registry.announce(Arc::new(ChannelRefMeta));
        registry.announce(Arc::new(TupleMeta));
        registry.announce(Arc::new(MessageMeta));
        registry
    }

    /// Registers a meta under its uniform name and raw-name aliases.
    ///
    /// Returns `false` and keeps the existing entry when the uniform name
    /// is already taken. Raw-name collisions also resolve in favor of the
    /// first registration.
    pub fn announce(&self, meta: Arc<dyn TypeMeta>) -> bool {
        let uniform = meta.name().to_string();
        match self.by_uniform.entry(uniform) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                trace!(name = meta.name(), "announce refused: uniform name taken");
                false
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(meta.clone());
                for raw in meta.raw_names() {
                    self.by_raw
                        .entry((*raw).to_string())
                        .or_insert_with(|| meta.clone());
                }
                true
            }
        }
    }

    /// Looks up a meta by uniform name.
    #[must_use]
    pub fn lookup(&self, uniform: &str) -> Option<Arc<dyn TypeMeta>> {
        self.by_uniform.get(uniform).map(|entry| entry.value().clone())
    }

    /// Looks up a meta by raw-name alias.
    #[must_use]
    pub fn from_raw(&self, raw: &str) -> Option<Arc<dyn TypeMeta>> {
        self.by_raw.get(raw).map(|entry| entry.value().clone())
    }

    /// Resolves a name, trying the uniform index first, then the aliases.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn TypeMeta>> {
        self.lookup(name).or_else(|| self.from_raw(name))
    }

    /// Number of registered uniform names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_uniform.len()
    }

    /// `true` when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_uniform.is_empty()
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("registered_types", &self.by_uniform.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_present() {
        let registry = TypeRegistry::with_builtins();
        for name in [
            "@i8", "@i16", "@i32", "@i64", "@u8", "@u16", "@u32", "@u64", "@f32", "@f64",
            "@str", "@str16", "@str32", "@atom", "@duration", "@actor", "@group", "@channel",
            "@tuple", "@msg", "@0",
        ] {
            assert!(registry.lookup(name).is_some(), "missing builtin {name}");
        }
    }

    #[test]
    fn test_lookup_miss_is_none() {
        let registry = TypeRegistry::with_builtins();
        assert!(registry.lookup("@mystery").is_none());
        assert!(registry.resolve("@mystery").is_none());
    }

    #[test]
    fn test_announce_duplicate_keeps_existing() {
        let registry = TypeRegistry::with_builtins();
        let before = registry.len();
        assert!(!registry.announce(Arc::new(AtomMeta)));
        assert_eq!(registry.len(), before);
    }

    #[test]
    fn test_integer_aliases_share_bucket() {
        let registry = TypeRegistry::with_builtins();
        let from_rust = registry.from_raw("i32").unwrap();
        let from_c = registry.from_raw("int").unwrap();
        assert_eq!(from_rust.name(), "@i32");
        assert_eq!(from_c.name(), "@i32");
        assert!(from_rust.equals_meta(from_c.as_ref()));

        // Same width, different signedness stays distinct.
        let unsigned = registry.from_raw("unsigned int").unwrap();
        assert_eq!(unsigned.name(), "@u32");
        assert!(!from_rust.equals_meta(unsigned.as_ref()));
    }

    #[test]
    fn test_resolve_falls_back_to_raw() {
        let registry = TypeRegistry::with_builtins();
        assert_eq!(registry.resolve("double").unwrap().name(), "@f64");
        assert_eq!(registry.resolve("long double").unwrap().name(), "@f64");
        assert_eq!(registry.resolve("@f64").unwrap().name(), "@f64");
    }
}
