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

//! Node and process identity.
//!
//! A node is identified by a 20-byte RIPEMD-160 digest of stable host
//! fingerprints (machine id and the first network interface's hardware
//! address); a process by that node id plus its OS pid. The pair renders
//! as `pid@node-hex` and orders lexicographically by node id, then pid.

use std::cmp::Ordering;
use std::fmt;
use std::sync::{Arc, OnceLock};

use ripemd::{Digest, Ripemd160};
use tracing::debug;

use crate::common::config::CONFIG;
use crate::common::MeshError;

/// 20-byte node identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId([u8; 20]);

impl NodeId {
    /// Size of a node id in bytes.
    pub const SIZE: usize = 20;

    /// Wraps raw digest bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// The raw digest bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Parses the 40-character hex rendering.
    ///
    /// # Errors
    ///
    /// [`MeshError::BadFormat`] when the input is not exactly 40 hex
    /// characters.
    pub fn from_hex(text: &str) -> Result<Self, MeshError> {
        let bytes = hex::decode(text)
            .map_err(|_| MeshError::BadFormat(format!("not a node id hash: {text}")))?;
        let bytes: [u8; 20] = bytes
            .try_into()
            .map_err(|_| MeshError::BadFormat(format!("node id hash has wrong length: {text}")))?;
        Ok(Self(bytes))
    }

    /// `true` when `text` is the hex rendering of this id.
    #[must_use]
    pub fn equals_hex(&self, text: &str) -> bool {
        Self::from_hex(text).is_ok_and(|other| other == *self)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({self})")
    }
}

/// Identity of one process: `(pid, node id)`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ProcessInfo {
    pid: u32,
    node: NodeId,
}

impl ProcessInfo {
    /// Builds an identity from parts.
    #[must_use]
    pub const fn new(pid: u32, node: NodeId) -> Self {
        Self { pid, node }
    }

    /// The OS process id.
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    /// The node id.
    #[must_use]
    pub const fn node_id(&self) -> &NodeId {
        &self.node
    }

    /// This process's identity, computed once per process.
    pub fn local() -> &'static Arc<Self> {
        static LOCAL: OnceLock<Arc<ProcessInfo>> = OnceLock::new();
        LOCAL.get_or_init(|| {
            let fingerprint = host_fingerprint();
            let digest: [u8; 20] = Ripemd160::digest(fingerprint.as_bytes()).into();
            let info = Self::new(std::process::id(), NodeId::from_bytes(digest));
            debug!(identity = %info, "computed local process identity");
            Arc::new(info)
        })
    }

    /// Lexicographic comparison by node id, then pid.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }
}

impl PartialOrd for ProcessInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ProcessInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        self.node
            .cmp(&other.node)
            .then_with(|| self.pid.cmp(&other.pid))
    }
}

impl fmt::Display for ProcessInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.pid, self.node)
    }
}

impl fmt::Debug for ProcessInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProcessInfo({self})")
    }
}

/// Gathers stable host fingerprints: machine id plus the first
/// non-loopback interface's hardware address. The config can pin the
/// fingerprint instead, which keeps node ids deterministic in tests.
fn host_fingerprint() -> String {
    if let Some(pinned) = &CONFIG.node.fingerprint {
        return pinned.clone();
    }

    let mut fingerprint = String::new();
    for path in ["/etc/machine-id", "/var/lib/dbus/machine-id"] {
        if let Ok(machine_id) = std::fs::read_to_string(path) {
            fingerprint.push_str(machine_id.trim());
            break;
        }
    }
    if let Some(mac) = first_interface_address() {
        fingerprint.push_str(&mac);
    }
    if fingerprint.is_empty() {
        // last resort; weaker, but better than an empty digest
        if let Ok(hostname) = std::fs::read_to_string("/proc/sys/kernel/hostname") {
            fingerprint.push_str(hostname.trim());
        }
    }
    fingerprint
}

fn first_interface_address() -> Option<String> {
    let entries = std::fs::read_dir("/sys/class/net").ok()?;
    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name != "lo")
        .collect();
    names.sort();
    for name in names {
        if let Ok(address) = std::fs::read_to_string(format!("/sys/class/net/{name}/address")) {
            let address = address.trim();
            if !address.is_empty() && address != "00:00:00:00:00:00" {
                return Some(address.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_round_trip() {
        let id = NodeId::from_bytes([0xAB; 20]);
        let hex_form = id.to_string();
        assert_eq!(hex_form.len(), 40);
        assert_eq!(NodeId::from_hex(&hex_form).unwrap(), id);
        assert!(id.equals_hex(&hex_form));
        assert!(!id.equals_hex("abcd"));
    }

    #[test]
    fn test_from_hex_rejects_garbage() {
        assert!(NodeId::from_hex("xyz").is_err());
        assert!(NodeId::from_hex(&"ab".repeat(19)).is_err());
    }

    #[test]
    fn test_ordering_is_node_then_pid() {
        let low = NodeId::from_bytes([1; 20]);
        let high = NodeId::from_bytes([2; 20]);
        let a = ProcessInfo::new(99, low);
        let b = ProcessInfo::new(1, high);
        assert_eq!(a.compare(&b), Ordering::Less);

        let c = ProcessInfo::new(1, low);
        let d = ProcessInfo::new(2, low);
        assert_eq!(c.compare(&d), Ordering::Less);
        assert_eq!(c.compare(&c.clone()), Ordering::Equal);
    }

    #[test]
    fn test_local_identity_is_stable() {
        let first = ProcessInfo::local();
        let second = ProcessInfo::local();
        assert_eq!(first, second);
        assert_eq!(first.pid(), std::process::id());
        let rendered = first.to_string();
        assert!(rendered.starts_with(&format!("{}@", first.pid())));
        assert_eq!(rendered.len(), first.pid().to_string().len() + 1 + 40);
    }
}
