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

//! Interning cache for remote-actor proxies.
//!
//! One proxy per `(aid, pid, node)` triple: deserializing the same remote
//! reference twice through the same cache yields the same handle. The
//! cache travels inside a [`WireContext`](crate::wire::WireContext), so
//! isolation is per-context rather than hidden in thread-local storage.
//!
//! The cache holds strong references. A proxy leaves the cache when it is
//! explicitly erased or when it exits (each created proxy carries a
//! cache-eraser attachment); the proxy object itself is destroyed only
//! when the last external handle drops.

use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::trace;

use crate::actor::{ActorRef, Attachable};
use crate::remote::mailman::MailmanHandle;
use crate::remote::node::{NodeId, ProcessInfo};

/// Cache key: the globally unique identity of a remote actor.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ProxyKey {
    /// The actor's id in its home process.
    pub aid: u32,
    /// Home process pid.
    pub pid: u32,
    /// Home node id.
    pub node: NodeId,
}

impl ProxyKey {
    fn for_proxy(proxy: &ActorRef) -> Self {
        Self {
            aid: proxy.id(),
            pid: proxy.node().pid(),
            node: *proxy.node().node_id(),
        }
    }
}

type NewProxyCallback = Box<dyn Fn(&ActorRef) + Send + Sync>;

struct CacheInner {
    proxies: DashMap<ProxyKey, ActorRef>,
    pinfos: DashMap<ProxyKey, Arc<ProcessInfo>>,
    mailman: MailmanHandle,
    on_new: RwLock<Option<NewProxyCallback>>,
}

struct CacheEraser {
    key: ProxyKey,
    cache: Weak<CacheInner>,
}

impl Attachable for CacheEraser {
    fn detach(&mut self, _reason: u32) {
        if let Some(cache) = self.cache.upgrade() {
            cache.proxies.remove(&self.key);
        }
    }
}

/// Cloneable handle to one proxy cache; clones share the cache.
#[derive(Clone)]
pub struct ProxyCache {
    inner: Arc<CacheInner>,
}

impl ProxyCache {
    /// A cache whose proxies route outbound traffic through `mailman`.
    #[must_use]
    pub fn new(mailman: MailmanHandle) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                proxies: DashMap::new(),
                pinfos: DashMap::new(),
                mailman,
                on_new: RwLock::new(None),
            }),
        }
    }

    /// Installs a callback fired for every proxy this cache creates or
    /// adopts.
    pub fn set_new_proxy_callback(&self, callback: impl Fn(&ActorRef) + Send + Sync + 'static) {
        *self.inner.on_new.write() = Some(Box::new(callback));
    }

    /// The interned [`ProcessInfo`] for a key, created on first use.
    #[must_use]
    pub fn interned_pinfo(&self, key: &ProxyKey) -> Arc<ProcessInfo> {
        if let Some(existing) = self.inner.pinfos.get(key) {
            return existing.clone();
        }
        self.inner
            .pinfos
            .entry(*key)
            .or_insert_with(|| Arc::new(ProcessInfo::new(key.pid, key.node)))
            .clone()
    }

    /// The cached proxy for `key`, if present.
    #[must_use]
    pub fn get(&self, key: &ProxyKey) -> Option<ActorRef> {
        self.inner.proxies.get(key).map(|entry| entry.clone())
    }

    /// Returns the proxy for `key`, creating and interning it on a miss.
    #[must_use]
    pub fn get_or_create(&self, key: ProxyKey) -> ActorRef {
        if let Some(existing) = self.get(&key) {
            return existing;
        }
        let pinfo = self.interned_pinfo(&key);
        let fresh = ActorRef::new_proxy(key.aid, pinfo, self.inner.mailman.clone());
        let (proxy, created) = match self.inner.proxies.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(entry) => (entry.get().clone(), false),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(fresh.clone());
                (fresh, true)
            }
        };
        if created {
            trace!(aid = key.aid, pid = key.pid, "created proxy");
            self.install_eraser(key, &proxy);
            self.fire_new_proxy(&proxy);
        }
        proxy
    }

    /// Seeds the cache with a proxy constructed elsewhere (the inbound
    /// path).
    pub fn add(&self, proxy: &ActorRef) {
        let key = ProxyKey::for_proxy(proxy);
        self.inner.pinfos.insert(key, proxy.node().clone());
        self.inner.proxies.insert(key, proxy.clone());
        self.install_eraser(key, proxy);
        self.fire_new_proxy(proxy);
    }

    /// Drops the cache's reference to a proxy. The proxy object lives on
    /// while external handles exist.
    pub fn erase(&self, proxy: &ActorRef) {
        self.inner.proxies.remove(&ProxyKey::for_proxy(proxy));
    }

    /// Number of cached proxies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.proxies.len()
    }

    /// `true` when no proxies are cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.proxies.is_empty()
    }

    fn install_eraser(&self, key: ProxyKey, proxy: &ActorRef) {
        let _ = proxy.attach(Box::new(CacheEraser {
            key,
            cache: Arc::downgrade(&self.inner),
        }));
    }

    fn fire_new_proxy(&self, proxy: &ActorRef) {
        if let Some(callback) = self.inner.on_new.read().as_ref() {
            callback(proxy);
        }
    }
}

impl std::fmt::Debug for ProxyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyCache")
            .field("proxies", &self.inner.proxies.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::exit_reason;

    fn cache() -> ProxyCache {
        let (mailman, _jobs) = MailmanHandle::channel();
        ProxyCache::new(mailman)
    }

    fn key(aid: u32) -> ProxyKey {
        ProxyKey {
            aid,
            pid: 4711,
            node: NodeId::from_bytes([7; 20]),
        }
    }

    #[test]
    fn test_interning() {
        let cache = cache();
        let first = cache.get_or_create(key(1));
        let second = cache.get_or_create(key(1));
        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);

        let other = cache.get_or_create(key(2));
        assert_ne!(first, other);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_pinfo_interned_per_key() {
        let cache = cache();
        let first = cache.interned_pinfo(&key(1));
        let again = cache.interned_pinfo(&key(1));
        assert!(Arc::ptr_eq(&first, &again));

        // distinct keys keep their own interned entry, even when the
        // identity value is the same
        let other = cache.interned_pinfo(&key(2));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(first, other);

        // the proxy built for a key carries that key's interned info
        let proxy = cache.get_or_create(key(1));
        assert!(Arc::ptr_eq(proxy.node(), &first));
    }

    #[test]
    fn test_new_proxy_callback_fires_once_per_proxy() {
        let cache = cache();
        let seen = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = seen.clone();
        cache.set_new_proxy_callback(move |_| {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });
        let _a = cache.get_or_create(key(1));
        let _a_again = cache.get_or_create(key(1));
        let _b = cache.get_or_create(key(2));
        assert_eq!(seen.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[test]
    fn test_exit_erases_cache_entry() {
        let cache = cache();
        let proxy = cache.get_or_create(key(1));
        assert_eq!(cache.len(), 1);
        proxy.exit(exit_reason::NORMAL);
        assert!(cache.is_empty());
        // the handle itself stays usable
        assert!(proxy.is_exited());
    }

    #[test]
    fn test_explicit_erase() {
        let cache = cache();
        let proxy = cache.get_or_create(key(1));
        cache.erase(&proxy);
        assert!(cache.is_empty());
        assert!(!proxy.is_exited());
    }
}
