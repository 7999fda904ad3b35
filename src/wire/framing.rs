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

//! Frame layer for peer sockets.
//!
//! Every payload crossing a peer socket is wrapped in a fixed header:
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │ Payload Length (4 bytes, big-endian u32, excludes header)     │
//! ├───────────────────────────────────────────────────────────────┤
//! │ Protocol Version (1 byte, currently 0x01)                     │
//! ├───────────────────────────────────────────────────────────────┤
//! │ Frame Kind (1 byte)                                           │
//! │   0x01 = Message   (textual addressed message)                │
//! │   0x02 = Handshake (sender's `pid@node-hex` identity)         │
//! └───────────────────────────────────────────────────────────────┘
//! ```

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::common::MeshError;

/// Protocol version byte.
pub const PROTOCOL_VERSION: u8 = 0x01;

/// Frame kind: a serialized addressed message.
pub const FRAME_MESSAGE: u8 = 0x01;

/// Frame kind: node identity announcement, written when a peer socket is
/// registered.
pub const FRAME_HANDSHAKE: u8 = 0x02;

/// Frame header size: 4 bytes length + 1 byte version + 1 byte kind.
pub const HEADER_SIZE: usize = 6;

/// Writes one frame to the stream.
///
/// # Errors
///
/// [`MeshError::BadFormat`] when the payload exceeds `u32`,
/// [`MeshError::Io`] on write failure.
pub async fn write_frame<W>(writer: &mut W, kind: u8, payload: &[u8]) -> Result<(), MeshError>
where
    W: AsyncWrite + Unpin,
{
    let length: u32 = payload
        .len()
        .try_into()
        .map_err(|_| MeshError::BadFormat("payload too large for u32".to_string()))?;

    let mut header = [0u8; HEADER_SIZE];
    header[..4].copy_from_slice(&length.to_be_bytes());
    header[4] = PROTOCOL_VERSION;
    header[5] = kind;

    writer.write_all(&header).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one frame from the stream, returning its kind and payload.
///
/// # Errors
///
/// [`MeshError::ConnectionClosed`] on end of stream,
/// [`MeshError::BadFormat`] on an unknown version, unknown kind, or a
/// frame larger than `max_size`.
pub async fn read_frame<R>(reader: &mut R, max_size: usize) -> Result<(u8, Vec<u8>), MeshError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header).await?;

    let length = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
    let version = header[4];
    let kind = header[5];

    if version != PROTOCOL_VERSION {
        return Err(MeshError::BadFormat(format!(
            "unsupported protocol version {version}, expected {PROTOCOL_VERSION}"
        )));
    }
    if !matches!(kind, FRAME_MESSAGE | FRAME_HANDSHAKE) {
        return Err(MeshError::BadFormat(format!("unknown frame kind {kind:#04x}")));
    }
    if length > max_size {
        return Err(MeshError::BadFormat(format!(
            "frame size {length} exceeds maximum {max_size}"
        )));
    }

    let mut payload = vec![0u8; length];
    reader.read_exact(&mut payload).await?;
    Ok((kind, payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn test_write_read_frame() {
        let mut buffer = Vec::new();
        write_frame(&mut buffer, FRAME_MESSAGE, b"payload").await.unwrap();

        let mut reader = Cursor::new(buffer);
        let (kind, payload) = read_frame(&mut reader, 1024).await.unwrap();
        assert_eq!(kind, FRAME_MESSAGE);
        assert_eq!(payload, b"payload");
    }

    #[tokio::test]
    async fn test_invalid_version() {
        let mut buffer = Vec::new();
        buffer.extend_from_slice(&4u32.to_be_bytes());
        buffer.push(0xFF);
        buffer.push(FRAME_MESSAGE);
        buffer.extend_from_slice(b"test");

        let mut reader = Cursor::new(buffer);
        let result = read_frame(&mut reader, 1024).await;
        assert!(matches!(result, Err(MeshError::BadFormat(_))));
    }

    #[tokio::test]
    async fn test_unknown_kind() {
        let mut buffer = Vec::new();
        buffer.extend_from_slice(&4u32.to_be_bytes());
        buffer.push(PROTOCOL_VERSION);
        buffer.push(0x7F);
        buffer.extend_from_slice(b"test");

        let mut reader = Cursor::new(buffer);
        let result = read_frame(&mut reader, 1024).await;
        assert!(matches!(result, Err(MeshError::BadFormat(_))));
    }

    #[tokio::test]
    async fn test_frame_too_large() {
        let mut buffer = Vec::new();
        buffer.extend_from_slice(&10_000u32.to_be_bytes());
        buffer.push(PROTOCOL_VERSION);
        buffer.push(FRAME_MESSAGE);

        let mut reader = Cursor::new(buffer);
        let result = read_frame(&mut reader, 100).await;
        assert!(matches!(result, Err(MeshError::BadFormat(_))));
    }

    #[tokio::test]
    async fn test_closed_on_empty_stream() {
        let mut reader = Cursor::new(Vec::<u8>::new());
        let result = read_frame(&mut reader, 1024).await;
        assert!(matches!(result, Err(MeshError::ConnectionClosed)));
    }
}
