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

//! Tagged binary rendition of the serializer traits.
//!
//! Every structure event is a one-byte tag; names and strings are
//! u32-length-prefixed UTF-8, scalars are little-endian. The encoding is
//! denser and cheaper to parse than the textual grammar but carries the
//! same information, so the same meta objects drive both.

use crate::common::MeshError;
use crate::message::tuple::TupleValue;
use crate::message::variant::{PrimitiveKind, PrimitiveVariant};
use crate::wire::serializer::{Deserializer, Serializer, WireContext};

const TAG_OBJ_BEGIN: u8 = 0x01;
const TAG_OBJ_END: u8 = 0x02;
const TAG_SEQ_BEGIN: u8 = 0x03;
const TAG_SEQ_END: u8 = 0x04;
const TAG_VALUE: u8 = 0x05;
const TAG_TUPLE: u8 = 0x06;

const fn kind_code(kind: PrimitiveKind) -> u8 {
    match kind {
        PrimitiveKind::Null => 0,
        PrimitiveKind::I8 => 1,
        PrimitiveKind::I16 => 2,
        PrimitiveKind::I32 => 3,
        PrimitiveKind::I64 => 4,
        PrimitiveKind::U8 => 5,
        PrimitiveKind::U16 => 6,
        PrimitiveKind::U32 => 7,
        PrimitiveKind::U64 => 8,
        PrimitiveKind::F32 => 9,
        PrimitiveKind::F64 => 10,
        PrimitiveKind::Str => 11,
        PrimitiveKind::Str16 => 12,
        PrimitiveKind::Str32 => 13,
    }
}

/// Renders one value as bytes.
pub fn to_bytes(value: &TupleValue, ctx: &WireContext) -> Result<Vec<u8>, MeshError> {
    let mut sink = BinarySerializer::new();
    value.meta().serialize(value.value(), &mut sink, ctx)?;
    Ok(sink.into_inner())
}

/// Parses one value from bytes produced by [`to_bytes`].
pub fn from_bytes(input: &[u8], ctx: &WireContext) -> Result<TupleValue, MeshError> {
    let mut source = BinaryDeserializer::new(input);
    let name = source.peek_object()?;
    let meta = ctx
        .types
        .resolve(&name)
        .ok_or(MeshError::UnknownType(name))?;
    let value = meta.deserialize(&mut source, ctx)?;
    Ok(TupleValue::from_parts(meta, value))
}

/// [`Serializer`] producing the tagged binary form.
#[derive(Default)]
pub struct BinarySerializer {
    out: Vec<u8>,
}

impl BinarySerializer {
    /// An empty serializer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes the serializer, returning the encoded bytes.
    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.out
    }

    fn put_str(&mut self, text: &str) -> Result<(), MeshError> {
        let len: u32 = text
            .len()
            .try_into()
            .map_err(|_| MeshError::BadFormat("string too large for u32 length".to_string()))?;
        self.out.extend_from_slice(&len.to_le_bytes());
        self.out.extend_from_slice(text.as_bytes());
        Ok(())
    }

    fn put_payload(&mut self, value: &PrimitiveVariant) -> Result<(), MeshError> {
        self.out.push(kind_code(value.kind()));
        match value {
            PrimitiveVariant::Null => {}
            PrimitiveVariant::I8(v) => self.out.extend_from_slice(&v.to_le_bytes()),
            PrimitiveVariant::I16(v) => self.out.extend_from_slice(&v.to_le_bytes()),
            PrimitiveVariant::I32(v) => self.out.extend_from_slice(&v.to_le_bytes()),
            PrimitiveVariant::I64(v) => self.out.extend_from_slice(&v.to_le_bytes()),
            PrimitiveVariant::U8(v) => self.out.extend_from_slice(&v.to_le_bytes()),
            PrimitiveVariant::U16(v) => self.out.extend_from_slice(&v.to_le_bytes()),
            PrimitiveVariant::U32(v) => self.out.extend_from_slice(&v.to_le_bytes()),
            PrimitiveVariant::U64(v) => self.out.extend_from_slice(&v.to_le_bytes()),
            PrimitiveVariant::F32(v) => self.out.extend_from_slice(&v.to_le_bytes()),
            PrimitiveVariant::F64(v) => self.out.extend_from_slice(&v.to_le_bytes()),
            PrimitiveVariant::Str(v) => self.put_str(v)?,
            PrimitiveVariant::Str16(v) => {
                self.put_len(v.len())?;
                for unit in v {
                    self.out.extend_from_slice(&unit.to_le_bytes());
                }
            }
            PrimitiveVariant::Str32(v) => {
                self.put_len(v.len())?;
                for c in v {
                    self.out.extend_from_slice(&(*c as u32).to_le_bytes());
                }
            }
        }
        Ok(())
    }

    fn put_len(&mut self, len: usize) -> Result<(), MeshError> {
        let len: u32 = len
            .try_into()
            .map_err(|_| MeshError::BadFormat("sequence too large for u32 length".to_string()))?;
        self.out.extend_from_slice(&len.to_le_bytes());
        Ok(())
    }
}

impl Serializer for BinarySerializer {
    fn begin_object(&mut self, name: &str) -> Result<(), MeshError> {
        self.out.push(TAG_OBJ_BEGIN);
        self.put_str(name)
    }

    fn end_object(&mut self) -> Result<(), MeshError> {
        self.out.push(TAG_OBJ_END);
        Ok(())
    }

    fn begin_sequence(&mut self, len: usize) -> Result<(), MeshError> {
        self.out.push(TAG_SEQ_BEGIN);
        self.put_len(len)
    }

    fn end_sequence(&mut self) -> Result<(), MeshError> {
        self.out.push(TAG_SEQ_END);
        Ok(())
    }

    fn write_value(&mut self, value: &PrimitiveVariant) -> Result<(), MeshError> {
        self.out.push(TAG_VALUE);
        self.put_payload(value)
    }

    fn write_tuple(&mut self, values: &[PrimitiveVariant]) -> Result<(), MeshError> {
        self.out.push(TAG_TUPLE);
        self.put_len(values.len())?;
        for value in values {
            self.put_payload(value)?;
        }
        Ok(())
    }
}

/// [`Deserializer`] over the tagged binary form.
pub struct BinaryDeserializer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> BinaryDeserializer<'a> {
    /// Wraps the input bytes.
    #[must_use]
    pub fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], MeshError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.input.len())
            .ok_or_else(|| MeshError::BadFormat("short read".to_string()))?;
        let slice = &self.input[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn take_u8(&mut self) -> Result<u8, MeshError> {
        Ok(self.take(1)?[0])
    }

    fn take_u32(&mut self) -> Result<u32, MeshError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn take_str(&mut self) -> Result<String, MeshError> {
        let len = self.take_u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| MeshError::BadFormat("invalid UTF-8 in string".to_string()))
    }

    fn expect_tag(&mut self, expected: u8) -> Result<(), MeshError> {
        let tag = self.take_u8()?;
        if tag != expected {
            return Err(MeshError::BadFormat(format!(
                "unexpected tag {tag:#04x}, expected {expected:#04x}"
            )));
        }
        Ok(())
    }

    fn take_payload(&mut self, kind: PrimitiveKind) -> Result<PrimitiveVariant, MeshError> {
        let code = self.take_u8()?;
        if code != kind_code(kind) {
            return Err(MeshError::BadFormat(format!(
                "value kind code {code} does not match requested {}",
                kind.name()
            )));
        }
        let value = match kind {
            PrimitiveKind::Null => PrimitiveVariant::Null,
            PrimitiveKind::I8 => PrimitiveVariant::I8(self.take_u8()? as i8),
            PrimitiveKind::I16 => {
                let b = self.take(2)?;
                PrimitiveVariant::I16(i16::from_le_bytes([b[0], b[1]]))
            }
            PrimitiveKind::I32 => {
                let b = self.take(4)?;
                PrimitiveVariant::I32(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            }
            PrimitiveKind::I64 => {
                let b = self.take(8)?;
                PrimitiveVariant::I64(i64::from_le_bytes([
                    b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
                ]))
            }
            PrimitiveKind::U8 => PrimitiveVariant::U8(self.take_u8()?),
            PrimitiveKind::U16 => {
                let b = self.take(2)?;
                PrimitiveVariant::U16(u16::from_le_bytes([b[0], b[1]]))
            }
            PrimitiveKind::U32 => PrimitiveVariant::U32(self.take_u32()?),
            PrimitiveKind::U64 => {
                let b = self.take(8)?;
                PrimitiveVariant::U64(u64::from_le_bytes([
                    b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
                ]))
            }
            PrimitiveKind::F32 => {
                let b = self.take(4)?;
                PrimitiveVariant::F32(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            }
            PrimitiveKind::F64 => {
                let b = self.take(8)?;
                PrimitiveVariant::F64(f64::from_le_bytes([
                    b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
                ]))
            }
            PrimitiveKind::Str => PrimitiveVariant::Str(self.take_str()?),
            PrimitiveKind::Str16 => {
                let len = self.take_u32()? as usize;
                let mut units = Vec::with_capacity(len);
                for _ in 0..len {
                    let b = self.take(2)?;
                    units.push(u16::from_le_bytes([b[0], b[1]]));
                }
                PrimitiveVariant::Str16(units)
            }
            PrimitiveKind::Str32 => {
                let len = self.take_u32()? as usize;
                let mut chars = Vec::with_capacity(len);
                for _ in 0..len {
                    let raw = self.take_u32()?;
                    chars.push(char::from_u32(raw).ok_or_else(|| {
                        MeshError::BadFormat(format!("invalid scalar value {raw:#x}"))
                    })?);
                }
                PrimitiveVariant::Str32(chars)
            }
        };
        Ok(value)
    }
}

impl Deserializer for BinaryDeserializer<'_> {
    fn seek_object(&mut self) -> Result<String, MeshError> {
        self.expect_tag(TAG_OBJ_BEGIN)?;
        self.take_str()
    }

    fn peek_object(&mut self) -> Result<String, MeshError> {
        let saved = self.pos;
        let name = self.seek_object();
        self.pos = saved;
        name
    }

    fn begin_object(&mut self, _name: &str) -> Result<(), MeshError> {
        // the name record was already consumed by seek_object
        Ok(())
    }

    fn end_object(&mut self) -> Result<(), MeshError> {
        self.expect_tag(TAG_OBJ_END)
    }

    fn begin_sequence(&mut self) -> Result<usize, MeshError> {
        self.expect_tag(TAG_SEQ_BEGIN)?;
        Ok(self.take_u32()? as usize)
    }

    fn end_sequence(&mut self) -> Result<(), MeshError> {
        self.expect_tag(TAG_SEQ_END)
    }

    fn read_value(&mut self, kind: PrimitiveKind) -> Result<PrimitiveVariant, MeshError> {
        self.expect_tag(TAG_VALUE)?;
        self.take_payload(kind)
    }

    fn read_tuple(&mut self, kinds: &[PrimitiveKind]) -> Result<Vec<PrimitiveVariant>, MeshError> {
        self.expect_tag(TAG_TUPLE)?;
        let len = self.take_u32()? as usize;
        if len != kinds.len() {
            return Err(MeshError::BadFormat(format!(
                "tuple length {len} does not match expected {}",
                kinds.len()
            )));
        }
        kinds.iter().map(|&kind| self.take_payload(kind)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::atom::atom;
    use crate::message::tuple::AnyTuple;

    #[test]
    fn test_binary_round_trip() {
        let ctx = WireContext::standalone();
        let inner = AnyTuple::make((atom("ping"), 9u32));
        let t = AnyTuple::make((7i32, "hi".to_string(), inner));
        let original = TupleValue::new(t);
        let bytes = to_bytes(&original, &ctx).unwrap();
        let parsed = from_bytes(&bytes, &ctx).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_truncated_input_fails() {
        let ctx = WireContext::standalone();
        let original = TupleValue::new(AnyTuple::make((7i32,)));
        let bytes = to_bytes(&original, &ctx).unwrap();
        let err = from_bytes(&bytes[..bytes.len() - 2], &ctx).unwrap_err();
        assert!(matches!(err, MeshError::BadFormat(_)));
    }

    #[test]
    fn test_atom_packed_form_survives() {
        let ctx = WireContext::standalone();
        let original = TupleValue::new(atom("quit"));
        let parsed = from_bytes(&to_bytes(&original, &ctx).unwrap(), &ctx).unwrap();
        assert_eq!(parsed.get::<crate::message::atom::Atom>(), Some(&atom("quit")));
    }
}
