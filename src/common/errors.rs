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

//! Error types shared across the mesh core.

use std::fmt;

use crate::message::variant::PrimitiveKind;

/// Error type for mesh operations.
///
/// Covers typed-getter mismatches, wire-format faults, registry lookups,
/// and transport failures. Operations whose failure mode is "refused but
/// harmless" (duplicate type announcements, attaching to an exited actor)
/// report through `bool` returns instead of this enum.
#[derive(Debug, Clone)]
pub enum MeshError {
    /// A typed getter was called on a variant holding a different kind.
    InvalidKind {
        /// The kind the caller asked for.
        expected: PrimitiveKind,
        /// The kind actually stored.
        found: PrimitiveKind,
    },

    /// Malformed input stream: mismatched delimiters, truncation,
    /// or a token that does not fit the grammar.
    BadFormat(String),

    /// A type name on the wire has no registered meta object.
    UnknownType(String),

    /// `add_module` was called with a name that is already registered.
    ModuleNameTaken(String),

    /// A group lookup named a module that does not exist.
    UnknownModule(String),

    /// The mailman was asked to send to a peer with no registered socket.
    PeerUnknown(String),

    /// Connection was closed while reading a frame.
    ConnectionClosed,

    /// Socket or I/O error.
    Io(String),
}

impl fmt::Display for MeshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidKind { expected, found } => {
                write!(f, "invalid kind: expected {}, found {}", expected.name(), found.name())
            }
            Self::BadFormat(msg) => write!(f, "malformed input: {msg}"),
            Self::UnknownType(name) => write!(f, "unknown type: {name}"),
            Self::ModuleNameTaken(name) => write!(f, "module name already taken: {name}"),
            Self::UnknownModule(name) => write!(f, "no module named: {name}"),
            Self::PeerUnknown(peer) => write!(f, "no socket registered for peer: {peer}"),
            Self::ConnectionClosed => write!(f, "connection closed"),
            Self::Io(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

impl std::error::Error for MeshError {}

impl From<std::io::Error> for MeshError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Self::ConnectionClosed
        } else {
            Self::Io(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_formats() {
        let err = MeshError::InvalidKind {
            expected: PrimitiveKind::I32,
            found: PrimitiveKind::U64,
        };
        assert_eq!(err.to_string(), "invalid kind: expected @i32, found @u64");

        let err = MeshError::UnknownType("@mystery".to_string());
        assert_eq!(err.to_string(), "unknown type: @mystery");
    }

    #[test]
    fn test_from_io_error() {
        let eof = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        assert!(matches!(MeshError::from(eof), MeshError::ConnectionClosed));

        let other = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        assert!(matches!(MeshError::from(other), MeshError::Io(_)));
    }
}
