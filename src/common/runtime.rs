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

//! The runtime object tying the process-wide collaborators together.
//!
//! Everything the original design kept in hidden singletons — the type
//! registry, the actor registry, the group manager, the mailman — lives
//! here as an explicit object. Tests can run several runtimes side by
//! side; production code that wants the classic singleton shape uses
//! [`MeshRuntime::global`].

use std::sync::{Arc, OnceLock};

use tokio_util::task::TaskTracker;
use tracing::{debug, instrument, warn};

use crate::actor::{ActorRef, ActorRegistry, GroupManager, GroupRef, MailboxSender};
use crate::common::config::CONFIG;
use crate::message::registry::TypeRegistry;
use crate::remote::{mailman_loop, MailmanHandle, ProcessInfo, ProxyCache};
use crate::wire::serializer::WireContext;

/// One mesh runtime: the collaborators of this process's actor system.
pub struct MeshRuntime {
    types: Arc<TypeRegistry>,
    actors: Arc<ActorRegistry>,
    groups: Arc<GroupManager>,
    node: Arc<ProcessInfo>,
    proxies: ProxyCache,
    mailman: MailmanHandle,
    tracker: TaskTracker,
}

impl MeshRuntime {
    /// Builds the collaborators in dependency order and starts the
    /// mailman task.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime; the mailman loop
    /// needs one to run on.
    #[instrument]
    #[must_use]
    pub fn launch() -> Self {
        assert!(
            tokio::runtime::Handle::try_current().is_ok(),
            "MeshRuntime::launch() must be called from within a Tokio runtime \
             so the mailman task has somewhere to run"
        );

        let types = Arc::new(TypeRegistry::with_builtins());
        let actors = ActorRegistry::new();
        let groups = Arc::new(GroupManager::new());
        let node = ProcessInfo::local().clone();
        let (mailman, jobs) = MailmanHandle::channel();
        let proxies = ProxyCache::new(mailman.clone());

        let ctx = WireContext {
            types: types.clone(),
            actors: actors.clone(),
            groups: groups.clone(),
            proxies: proxies.clone(),
            node: node.clone(),
        };
        let tracker = TaskTracker::new();
        tracker.spawn(mailman_loop(jobs, ctx));
        debug!(node = %node, "mesh runtime launched");

        Self {
            types,
            actors,
            groups,
            node,
            proxies,
            mailman,
            tracker,
        }
    }

    /// The default per-process runtime, created on first use.
    ///
    /// First use must happen inside a Tokio runtime (see
    /// [`MeshRuntime::launch`]).
    pub fn global() -> &'static Self {
        static GLOBAL: OnceLock<MeshRuntime> = OnceLock::new();
        GLOBAL.get_or_init(Self::launch)
    }

    /// The type meta registry.
    #[must_use]
    pub fn types(&self) -> &Arc<TypeRegistry> {
        &self.types
    }

    /// The actor registry.
    #[must_use]
    pub fn actors(&self) -> &Arc<ActorRegistry> {
        &self.actors
    }

    /// The group manager.
    #[must_use]
    pub fn groups(&self) -> &Arc<GroupManager> {
        &self.groups
    }

    /// This process's identity.
    #[must_use]
    pub fn node(&self) -> &Arc<ProcessInfo> {
        &self.node
    }

    /// The runtime's shared proxy cache.
    #[must_use]
    pub fn proxies(&self) -> &ProxyCache {
        &self.proxies
    }

    /// Producer handle to the mailman queue.
    #[must_use]
    pub fn mailman(&self) -> &MailmanHandle {
        &self.mailman
    }

    /// Registers a new local actor backed by `mailbox`.
    ///
    /// Assigns the next id, stores the actor in the registry, and counts
    /// it as running until it exits.
    pub fn create_actor(&self, mailbox: MailboxSender) -> ActorRef {
        let id = self.actors.next_id();
        let actor = ActorRef::new_local(id, self.node.clone(), mailbox);
        self.actors.put(id, &actor);
        self.actors.inc_running();
        let registry = Arc::downgrade(&self.actors);
        actor.attach_functor(move |_reason| {
            if let Some(registry) = registry.upgrade() {
                registry.dec_running();
            }
        });
        actor
    }

    /// Resolves a group in the built-in `"local"` module.
    #[must_use]
    pub fn local_group(&self, identifier: &str) -> GroupRef {
        self.groups
            .get("local", identifier)
            .expect("the local module is always registered")
    }

    /// A wire context over this runtime's collaborators, sharing its
    /// proxy cache.
    #[must_use]
    pub fn wire_context(&self) -> WireContext {
        WireContext {
            types: self.types.clone(),
            actors: self.actors.clone(),
            groups: self.groups.clone(),
            proxies: self.proxies.clone(),
            node: self.node.clone(),
        }
    }

    /// A wire context with its own empty proxy cache, behaving like an
    /// independent deserialization thread.
    #[must_use]
    pub fn isolated_wire_context(&self) -> WireContext {
        WireContext {
            types: self.types.clone(),
            actors: self.actors.clone(),
            groups: self.groups.clone(),
            proxies: ProxyCache::new(self.mailman.clone()),
            node: self.node.clone(),
        }
    }

    /// Stops the mailman (after draining already-queued jobs) and waits
    /// for its task, bounded by the configured shutdown timeout.
    ///
    /// Callers that need actor quiescence first should use
    /// [`ActorRegistry::await_running_count_equal`] before shutting
    /// down.
    pub async fn shutdown(&self) {
        self.mailman.kill();
        self.tracker.close();
        if tokio::time::timeout(CONFIG.shutdown_timeout(), self.tracker.wait())
            .await
            .is_err()
        {
            warn!("mailman task did not stop within the shutdown timeout");
        }
    }
}

impl std::fmt::Debug for MeshRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeshRuntime")
            .field("node", &self.node)
            .finish_non_exhaustive()
    }
}
