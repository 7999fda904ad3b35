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

//! Named group modules and the manager that routes lookups to them.

use std::sync::Arc;

use dashmap::DashMap;

use crate::actor::group::GroupRef;
use crate::common::MeshError;

/// A family of groups sharing a lookup scheme.
pub trait GroupModule: Send + Sync {
    /// The module's name, used as the first half of a group identity.
    fn name(&self) -> &str;

    /// Returns the instance for `identifier`, creating it on first use.
    fn get(&self, identifier: &str) -> GroupRef;
}

/// The built-in `"local"` module: plain process-local multicast groups,
/// interned by identifier.
#[derive(Default)]
pub struct LocalGroupModule {
    instances: DashMap<String, GroupRef>,
}

impl LocalGroupModule {
    /// An empty module.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl GroupModule for LocalGroupModule {
    fn name(&self) -> &str {
        "local"
    }

    fn get(&self, identifier: &str) -> GroupRef {
        if let Some(existing) = self.instances.get(identifier) {
            return existing.clone();
        }
        let fresh = GroupRef::new(self.name(), identifier);
        // another thread may have inserted in between; first one wins
        match self.instances.entry(identifier.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(entry) => entry.get().clone(),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(fresh.clone());
                fresh
            }
        }
    }
}

/// Routes `(module, identifier)` lookups to the named module.
pub struct GroupManager {
    modules: DashMap<String, Arc<dyn GroupModule>>,
}

impl Default for GroupManager {
    fn default() -> Self {
        Self::new()
    }
}

impl GroupManager {
    /// A manager with the built-in `"local"` module registered.
    #[must_use]
    pub fn new() -> Self {
        let manager = Self {
            modules: DashMap::new(),
        };
        manager
            .add_module(Arc::new(LocalGroupModule::new()))
            .expect("fresh manager cannot have a module name collision");
        manager
    }

    /// Resolves a group by module name and identifier.
    ///
    /// # Errors
    ///
    /// [`MeshError::UnknownModule`] when no module with that name exists.
    pub fn get(&self, module: &str, identifier: &str) -> Result<GroupRef, MeshError> {
        self.modules
            .get(module)
            .map(|entry| entry.get(identifier))
            .ok_or_else(|| MeshError::UnknownModule(module.to_string()))
    }

    /// Registers a module.
    ///
    /// # Errors
    ///
    /// [`MeshError::ModuleNameTaken`] when a module with the same name is
    /// already registered.
    pub fn add_module(&self, module: Arc<dyn GroupModule>) -> Result<(), MeshError> {
        let name = module.name().to_string();
        match self.modules.entry(name.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(MeshError::ModuleNameTaken(name)),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(module);
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for GroupManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupManager")
            .field("modules", &self.modules.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_module_interns_instances() {
        let manager = GroupManager::new();
        let a = manager.get("local", "announcements").unwrap();
        let b = manager.get("local", "announcements").unwrap();
        let c = manager.get("local", "other").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.module_name(), "local");
        assert_eq!(a.identifier(), "announcements");
    }

    #[test]
    fn test_unknown_module() {
        let manager = GroupManager::new();
        let err = manager.get("mystery", "x").unwrap_err();
        assert!(matches!(err, MeshError::UnknownModule(name) if name == "mystery"));
    }

    #[test]
    fn test_duplicate_module_refused() {
        let manager = GroupManager::new();
        let err = manager.add_module(Arc::new(LocalGroupModule::new())).unwrap_err();
        assert!(matches!(err, MeshError::ModuleNameTaken(name) if name == "local"));
    }
}
