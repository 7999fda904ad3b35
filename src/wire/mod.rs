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

//! Wire encodings: the serializer traits, the textual and binary
//! codecs, and the frame layer used on peer sockets.

pub use binary::{from_bytes, to_bytes, BinaryDeserializer, BinarySerializer};
pub use serializer::{Deserializer, Serializer, WireContext};
pub use text::{from_text, to_text, StringDeserializer, StringSerializer};

/// Tagged binary codec.
pub mod binary;
/// Frame layer for peer sockets.
pub mod framing;
/// Abstract serializer/deserializer traits and the wire context.
pub mod serializer;
/// Textual object-grammar codec.
pub mod text;
