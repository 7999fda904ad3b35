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

//! Tagged container for the primitive wire types.
//!
//! [`PrimitiveVariant`] is the unit of value exchange between type meta
//! objects and serializers: every scalar and string that crosses the wire
//! passes through it. The tag always names the live arm; assignment drops
//! the old arm before storing the new one.

use crate::common::MeshError;

/// Names the arms of [`PrimitiveVariant`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    /// Empty variant.
    Null,
    /// Signed 8-bit integer.
    I8,
    /// Signed 16-bit integer.
    I16,
    /// Signed 32-bit integer.
    I32,
    /// Signed 64-bit integer.
    I64,
    /// Unsigned 8-bit integer.
    U8,
    /// Unsigned 16-bit integer.
    U16,
    /// Unsigned 32-bit integer.
    U32,
    /// Unsigned 64-bit integer.
    U64,
    /// 32-bit float.
    F32,
    /// 64-bit float.
    F64,
    /// UTF-8 string.
    Str,
    /// UTF-16 code units.
    Str16,
    /// Unicode scalar values.
    Str32,
}

impl PrimitiveKind {
    /// The uniform name of this kind as it appears on the wire.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Null => "@0",
            Self::I8 => "@i8",
            Self::I16 => "@i16",
            Self::I32 => "@i32",
            Self::I64 => "@i64",
            Self::U8 => "@u8",
            Self::U16 => "@u16",
            Self::U32 => "@u32",
            Self::U64 => "@u64",
            Self::F32 => "@f32",
            Self::F64 => "@f64",
            Self::Str => "@str",
            Self::Str16 => "@str16",
            Self::Str32 => "@str32",
        }
    }
}

/// A tagged union over the primitive wire types.
///
/// `Default` is [`PrimitiveVariant::Null`]. Typed getters fail with
/// [`MeshError::InvalidKind`] when the tag does not match.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PrimitiveVariant {
    /// Empty variant.
    #[default]
    Null,
    /// Signed 8-bit integer.
    I8(i8),
    /// Signed 16-bit integer.
    I16(i16),
    /// Signed 32-bit integer.
    I32(i32),
    /// Signed 64-bit integer.
    I64(i64),
    /// Unsigned 8-bit integer.
    U8(u8),
    /// Unsigned 16-bit integer.
    U16(u16),
    /// Unsigned 32-bit integer.
    U32(u32),
    /// Unsigned 64-bit integer.
    U64(u64),
    /// 32-bit float.
    F32(f32),
    /// 64-bit float.
    F64(f64),
    /// UTF-8 string.
    Str(String),
    /// UTF-16 code units.
    Str16(Vec<u16>),
    /// Unicode scalar values.
    Str32(Vec<char>),
}

/// Visitor over the arms of [`PrimitiveVariant`].
///
/// Every method defaults to a no-op so implementors only handle the arms
/// they care about. Dispatch happens through a single match in
/// [`PrimitiveVariant::apply`].
pub trait PrimitiveVisitor {
    /// Visits the empty variant.
    fn visit_null(&mut self) {}
    /// Visits an `i8`.
    fn visit_i8(&mut self, _value: i8) {}
    /// Visits an `i16`.
    fn visit_i16(&mut self, _value: i16) {}
    /// Visits an `i32`.
    fn visit_i32(&mut self, _value: i32) {}
    /// Visits an `i64`.
    fn visit_i64(&mut self, _value: i64) {}
    /// Visits a `u8`.
    fn visit_u8(&mut self, _value: u8) {}
    /// Visits a `u16`.
    fn visit_u16(&mut self, _value: u16) {}
    /// Visits a `u32`.
    fn visit_u32(&mut self, _value: u32) {}
    /// Visits a `u64`.
    fn visit_u64(&mut self, _value: u64) {}
    /// Visits an `f32`.
    fn visit_f32(&mut self, _value: f32) {}
    /// Visits an `f64`.
    fn visit_f64(&mut self, _value: f64) {}
    /// Visits a UTF-8 string.
    fn visit_str(&mut self, _value: &str) {}
    /// Visits UTF-16 code units.
    fn visit_str16(&mut self, _value: &[u16]) {}
    /// Visits Unicode scalar values.
    fn visit_str32(&mut self, _value: &[char]) {}
}

macro_rules! typed_getter {
    ($fn_name:ident, $arm:ident, $kind:ident, $ty:ty) => {
        /// Returns the stored value if the tag matches, `InvalidKind` otherwise.
        pub fn $fn_name(&self) -> Result<$ty, MeshError> {
            match self {
                Self::$arm(v) => Ok(*v),
                other => Err(MeshError::InvalidKind {
                    expected: PrimitiveKind::$kind,
                    found: other.kind(),
                }),
            }
        }
    };
}

impl PrimitiveVariant {
    /// Returns the tag naming the live arm.
    #[must_use]
    pub const fn kind(&self) -> PrimitiveKind {
        match self {
            Self::Null => PrimitiveKind::Null,
            Self::I8(_) => PrimitiveKind::I8,
            Self::I16(_) => PrimitiveKind::I16,
            Self::I32(_) => PrimitiveKind::I32,
            Self::I64(_) => PrimitiveKind::I64,
            Self::U8(_) => PrimitiveKind::U8,
            Self::U16(_) => PrimitiveKind::U16,
            Self::U32(_) => PrimitiveKind::U32,
            Self::U64(_) => PrimitiveKind::U64,
            Self::F32(_) => PrimitiveKind::F32,
            Self::F64(_) => PrimitiveKind::F64,
            Self::Str(_) => PrimitiveKind::Str,
            Self::Str16(_) => PrimitiveKind::Str16,
            Self::Str32(_) => PrimitiveKind::Str32,
        }
    }

    typed_getter!(as_i8, I8, I8, i8);
    typed_getter!(as_i16, I16, I16, i16);
    typed_getter!(as_i32, I32, I32, i32);
    typed_getter!(as_i64, I64, I64, i64);
    typed_getter!(as_u8, U8, U8, u8);
    typed_getter!(as_u16, U16, U16, u16);
    typed_getter!(as_u32, U32, U32, u32);
    typed_getter!(as_u64, U64, U64, u64);
    typed_getter!(as_f32, F32, F32, f32);
    typed_getter!(as_f64, F64, F64, f64);

    /// Returns the stored string if the tag is `Str`, `InvalidKind` otherwise.
    pub fn as_str(&self) -> Result<&str, MeshError> {
        match self {
            Self::Str(s) => Ok(s),
            other => Err(MeshError::InvalidKind {
                expected: PrimitiveKind::Str,
                found: other.kind(),
            }),
        }
    }

    /// Consumes the variant, returning the stored string on a `Str` tag.
    pub fn into_string(self) -> Result<String, MeshError> {
        match self {
            Self::Str(s) => Ok(s),
            other => Err(MeshError::InvalidKind {
                expected: PrimitiveKind::Str,
                found: other.kind(),
            }),
        }
    }

    /// Dispatches to the visitor method matching the live arm.
    pub fn apply(&self, visitor: &mut dyn PrimitiveVisitor) {
        match self {
            Self::Null => visitor.visit_null(),
            Self::I8(v) => visitor.visit_i8(*v),
            Self::I16(v) => visitor.visit_i16(*v),
            Self::I32(v) => visitor.visit_i32(*v),
            Self::I64(v) => visitor.visit_i64(*v),
            Self::U8(v) => visitor.visit_u8(*v),
            Self::U16(v) => visitor.visit_u16(*v),
            Self::U32(v) => visitor.visit_u32(*v),
            Self::U64(v) => visitor.visit_u64(*v),
            Self::F32(v) => visitor.visit_f32(*v),
            Self::F64(v) => visitor.visit_f64(*v),
            Self::Str(v) => visitor.visit_str(v),
            Self::Str16(v) => visitor.visit_str16(v),
            Self::Str32(v) => visitor.visit_str32(v),
        }
    }
}

macro_rules! variant_from {
    ($ty:ty, $arm:ident) => {
        impl From<$ty> for PrimitiveVariant {
            fn from(value: $ty) -> Self {
                Self::$arm(value)
            }
        }
    };
}

variant_from!(i8, I8);
variant_from!(i16, I16);
variant_from!(i32, I32);
variant_from!(i64, I64);
variant_from!(u8, U8);
variant_from!(u16, U16);
variant_from!(u32, U32);
variant_from!(u64, U64);
variant_from!(f32, F32);
variant_from!(f64, F64);
variant_from!(String, Str);
variant_from!(Vec<u16>, Str16);
variant_from!(Vec<char>, Str32);

impl From<&str> for PrimitiveVariant {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_null() {
        assert_eq!(PrimitiveVariant::default().kind(), PrimitiveKind::Null);
    }

    #[test]
    fn test_deduced_tags() {
        assert_eq!(PrimitiveVariant::from(7i32).kind(), PrimitiveKind::I32);
        assert_eq!(PrimitiveVariant::from(7u64).kind(), PrimitiveKind::U64);
        assert_eq!(PrimitiveVariant::from("hi").kind(), PrimitiveKind::Str);
    }

    #[test]
    fn test_typed_getter_mismatch() {
        let v = PrimitiveVariant::from(42i32);
        assert_eq!(v.as_i32().unwrap(), 42);
        let err = v.as_u64().unwrap_err();
        assert!(matches!(
            err,
            MeshError::InvalidKind {
                expected: PrimitiveKind::U64,
                found: PrimitiveKind::I32,
            }
        ));
    }

    #[test]
    fn test_retag_by_assignment() {
        let mut v = PrimitiveVariant::from("text");
        assert_eq!(v.kind(), PrimitiveKind::Str);
        v = PrimitiveVariant::from(1.5f64);
        assert_eq!(v.kind(), PrimitiveKind::F64);
        assert_eq!(v.as_f64().unwrap(), 1.5);
    }

    #[test]
    fn test_apply_dispatches_by_tag() {
        #[derive(Default)]
        struct Probe {
            seen: Option<String>,
        }
        impl PrimitiveVisitor for Probe {
            fn visit_i32(&mut self, value: i32) {
                self.seen = Some(format!("i32:{value}"));
            }
            fn visit_str(&mut self, value: &str) {
                self.seen = Some(format!("str:{value}"));
            }
        }

        let mut probe = Probe::default();
        PrimitiveVariant::from(3i32).apply(&mut probe);
        assert_eq!(probe.seen.as_deref(), Some("i32:3"));

        PrimitiveVariant::from("x").apply(&mut probe);
        assert_eq!(probe.seen.as_deref(), Some("str:x"));
    }
}
