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

//! Remote plumbing: node identity, proxy interning, and the outbound
//! mailman queue.

pub use mailman::{mailman_loop, MailmanHandle, MailmanJob, PeerConn};
pub use node::{NodeId, ProcessInfo};
pub use proxy_cache::{ProxyCache, ProxyKey};

/// The outbound job queue and its drain loop.
pub mod mailman;
/// Node and process identity.
pub mod node;
/// Interning cache for remote-actor proxies.
pub mod proxy_cache;
