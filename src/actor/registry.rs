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

//! Process-local id → actor mapping and the running-count barrier.
//!
//! Ids are handed out monotonically and stay "seen" forever: when an
//! actor exits, its slot is replaced with `None` instead of being
//! removed, so late senders can distinguish "exited" from "never
//! existed". The registry wires itself into actor lifetimes by attaching
//! an eraser to every actor it stores.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Condvar, Mutex, RwLock};
use tracing::trace;

use crate::actor::actor::{ActorId, ActorRef};
use crate::actor::attachable::Attachable;

/// Process-local actor registry.
pub struct ActorRegistry {
    instances: RwLock<HashMap<ActorId, Option<ActorRef>>>,
    ids: AtomicU32,
    running: AtomicUsize,
    running_mtx: Mutex<()>,
    running_cv: Condvar,
    // handed to erasers so they can find their way back without keeping
    // the registry alive
    weak_self: Weak<ActorRegistry>,
}

struct RegistryEraser {
    id: ActorId,
    registry: Weak<ActorRegistry>,
}

impl Attachable for RegistryEraser {
    fn detach(&mut self, _reason: u32) {
        if let Some(registry) = self.registry.upgrade() {
            registry.erase(self.id);
        }
    }
}

impl ActorRegistry {
    /// An empty registry. Id assignment starts at 1.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            instances: RwLock::new(HashMap::new()),
            ids: AtomicU32::new(1),
            running: AtomicUsize::new(0),
            running_mtx: Mutex::new(()),
            running_cv: Condvar::new(),
            weak_self: weak.clone(),
        })
    }

    /// Looks up an actor by id. Returns `None` both for ids never seen
    /// and for actors that have exited.
    #[must_use]
    pub fn get(&self, id: ActorId) -> Option<ActorRef> {
        self.instances.read().get(&id).and_then(Clone::clone)
    }

    /// Stores an actor under its id on first sight and attaches an
    /// eraser that nulls the slot when the actor exits.
    ///
    /// Ids that were already seen (including erased ones) are left
    /// untouched, which preserves the id-is-seen property for late
    /// senders.
    pub fn put(&self, id: ActorId, actor: &ActorRef) {
        let inserted = {
            let mut instances = self.instances.write();
            match instances.entry(id) {
                std::collections::hash_map::Entry::Occupied(_) => false,
                std::collections::hash_map::Entry::Vacant(slot) => {
                    slot.insert(Some(actor.clone()));
                    true
                }
            }
        };
        if inserted {
            trace!(id, "actor registered");
            // attach outside the map lock; an already-exited actor fires
            // the eraser immediately, nulling the fresh slot right away
            actor.attach(Box::new(RegistryEraser {
                id,
                registry: self.weak_self.clone(),
            }));
        }
    }

    /// Replaces the actor's slot with `None`, keeping the id seen.
    pub fn erase(&self, id: ActorId) {
        self.instances.write().insert(id, None);
        trace!(id, "actor erased");
    }

    /// Hands out the next actor id. Strictly monotonic.
    pub fn next_id(&self) -> ActorId {
        self.ids.fetch_add(1, Ordering::Relaxed)
    }

    /// Increments the running-actor count.
    pub fn inc_running(&self) {
        self.running.fetch_add(1, Ordering::SeqCst);
    }

    /// Decrements the running-actor count, waking barrier waiters when
    /// the count drops to one or zero.
    ///
    /// # Panics
    ///
    /// Panics on underflow; a count going below zero means lifecycle
    /// accounting is broken and nothing downstream can be trusted.
    pub fn dec_running(&self) {
        let previous = self.running.fetch_sub(1, Ordering::SeqCst);
        assert!(previous != 0, "actor registry running count underflow");
        if previous <= 2 {
            let _guard = self.running_mtx.lock();
            self.running_cv.notify_all();
        }
    }

    /// The current running-actor count.
    #[must_use]
    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Blocks the calling thread until the running count equals
    /// `expected`.
    ///
    /// This is a thread-blocking barrier for process teardown; do not
    /// call it from an async task.
    pub fn await_running_count_equal(&self, expected: usize) {
        let mut guard = self.running_mtx.lock();
        while self.running.load(Ordering::SeqCst) != expected {
            self.running_cv.wait(&mut guard);
        }
    }
}

impl std::fmt::Debug for ActorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorRegistry")
            .field("seen_ids", &self.instances.read().len())
            .field("running", &self.running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::actor::{exit_reason, mailbox};
    use crate::remote::ProcessInfo;

    fn test_actor(registry: &Arc<ActorRegistry>) -> ActorRef {
        let (tx, _rx) = mailbox();
        ActorRef::new_local(registry.next_id(), ProcessInfo::local().clone(), tx)
    }

    #[test]
    fn test_next_id_is_monotonic() {
        let registry = ActorRegistry::new();
        let first = registry.next_id();
        let second = registry.next_id();
        assert!(second > first);
    }

    #[test]
    fn test_put_get_erase() {
        let registry = ActorRegistry::new();
        let actor = test_actor(&registry);
        let id = actor.id();

        assert!(registry.get(id).is_none());
        registry.put(id, &actor);
        assert_eq!(registry.get(id), Some(actor.clone()));

        registry.erase(id);
        assert!(registry.get(id).is_none());

        // the id stays seen; a second put does not resurrect the slot
        registry.put(id, &actor);
        assert!(registry.get(id).is_none());
    }

    #[test]
    fn test_eraser_fires_on_exit() {
        let registry = ActorRegistry::new();
        let actor = test_actor(&registry);
        let id = actor.id();
        registry.put(id, &actor);

        actor.exit(exit_reason::NORMAL);
        assert!(registry.get(id).is_none());
    }

    #[test]
    fn test_put_of_exited_actor_nulls_immediately() {
        let registry = ActorRegistry::new();
        let actor = test_actor(&registry);
        actor.exit(exit_reason::NORMAL);

        registry.put(actor.id(), &actor);
        assert!(registry.get(actor.id()).is_none());
    }

    #[test]
    fn test_running_count_barrier() {
        let registry = ActorRegistry::new();
        registry.inc_running();
        registry.inc_running();

        let background = registry.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(20));
            background.dec_running();
            std::thread::sleep(std::time::Duration::from_millis(20));
            background.dec_running();
        });

        registry.await_running_count_equal(0);
        assert_eq!(registry.running(), 0);
        handle.join().unwrap();
    }

    #[test]
    #[should_panic(expected = "underflow")]
    fn test_dec_running_underflow_panics() {
        let registry = ActorRegistry::new();
        registry.dec_running();
    }
}
