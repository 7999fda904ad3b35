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

//! The textual wire format.
//!
//! Objects render as `Name ( v1, v2, ... )`, sequences as `{ v1, v2, ... }`,
//! strings double-quoted with `\"` escaping the quote. Whitespace and
//! commas are interchangeable between tokens. Atom payloads render as
//! their text form instead of the packed integer; the null object renders
//! as `@0 ( )`.
//!
//! ```text
//! @tuple ( { @i32 ( 7 ), @str ( "hi, \"world\"" ) } )
//! ```

use std::fmt::Write as _;

use crate::common::MeshError;
use crate::message::atom::{Atom, MAX_ATOM_LEN};
use crate::message::tuple::TupleValue;
use crate::message::variant::{PrimitiveKind, PrimitiveVariant, PrimitiveVisitor};
use crate::wire::serializer::{Deserializer, Serializer, WireContext};

/// Renders one value as text.
pub fn to_text(value: &TupleValue, ctx: &WireContext) -> Result<String, MeshError> {
    let mut sink = StringSerializer::new();
    value.meta().serialize(value.value(), &mut sink, ctx)?;
    Ok(sink.into_inner())
}

/// Parses one value from text, resolving its type through the context's
/// registry.
///
/// # Errors
///
/// [`MeshError::UnknownType`] when the leading type name is not
/// registered, [`MeshError::BadFormat`] on any grammar violation.
pub fn from_text(input: &str, ctx: &WireContext) -> Result<TupleValue, MeshError> {
    let mut source = StringDeserializer::new(input);
    let name = source.peek_object()?;
    let meta = ctx
        .types
        .resolve(&name)
        .ok_or(MeshError::UnknownType(name))?;
    let value = meta.deserialize(&mut source, ctx)?;
    Ok(TupleValue::from_parts(meta, value))
}

fn quote_into(out: &mut String, text: &str) {
    out.push('"');
    for c in text.chars() {
        if c == '"' {
            out.push_str("\\\"");
        } else {
            out.push(c);
        }
    }
    out.push('"');
}

struct TextWriter<'a> {
    out: &'a mut String,
}

impl PrimitiveVisitor for TextWriter<'_> {
    fn visit_i8(&mut self, value: i8) {
        let _ = write!(self.out, "{value}");
    }
    fn visit_i16(&mut self, value: i16) {
        let _ = write!(self.out, "{value}");
    }
    fn visit_i32(&mut self, value: i32) {
        let _ = write!(self.out, "{value}");
    }
    fn visit_i64(&mut self, value: i64) {
        let _ = write!(self.out, "{value}");
    }
    fn visit_u8(&mut self, value: u8) {
        let _ = write!(self.out, "{value}");
    }
    fn visit_u16(&mut self, value: u16) {
        let _ = write!(self.out, "{value}");
    }
    fn visit_u32(&mut self, value: u32) {
        let _ = write!(self.out, "{value}");
    }
    fn visit_u64(&mut self, value: u64) {
        let _ = write!(self.out, "{value}");
    }
    fn visit_f32(&mut self, value: f32) {
        let _ = write!(self.out, "{value}");
    }
    fn visit_f64(&mut self, value: f64) {
        let _ = write!(self.out, "{value}");
    }
    fn visit_str(&mut self, value: &str) {
        quote_into(self.out, value);
    }
    fn visit_str16(&mut self, value: &[u16]) {
        quote_into(self.out, &String::from_utf16_lossy(value));
    }
    fn visit_str32(&mut self, value: &[char]) {
        let text: String = value.iter().collect();
        quote_into(self.out, &text);
    }
}

/// [`Serializer`] producing the textual object grammar.
pub struct StringSerializer {
    out: String,
    after_value: bool,
    obj_just_opened: bool,
    open_objects: Vec<String>,
}

impl Default for StringSerializer {
    fn default() -> Self {
        Self::new()
    }
}

impl StringSerializer {
    /// An empty serializer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            out: String::new(),
            after_value: false,
            obj_just_opened: false,
            open_objects: Vec::new(),
        }
    }

    /// Consumes the serializer, returning the rendered text.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.out
    }

    fn clear_separator(&mut self) {
        if self.after_value {
            self.out.push_str(", ");
            self.after_value = false;
        } else if self.obj_just_opened {
            self.out.push_str(" ( ");
            self.obj_just_opened = false;
        }
    }
}

impl Serializer for StringSerializer {
    fn begin_object(&mut self, name: &str) -> Result<(), MeshError> {
        self.clear_separator();
        self.open_objects.push(name.to_string());
        self.out.push_str(name);
        self.obj_just_opened = true;
        Ok(())
    }

    fn end_object(&mut self) -> Result<(), MeshError> {
        if self.obj_just_opened {
            // no value was written; still emit an empty body
            self.out.push_str(" ( )");
            self.obj_just_opened = false;
        } else {
            self.out.push_str(if self.after_value { " )" } else { ")" });
        }
        self.after_value = true;
        self.open_objects.pop();
        Ok(())
    }

    fn begin_sequence(&mut self, _len: usize) -> Result<(), MeshError> {
        self.clear_separator();
        self.out.push_str("{ ");
        Ok(())
    }

    fn end_sequence(&mut self) -> Result<(), MeshError> {
        self.out.push_str(if self.after_value { " }" } else { "}" });
        self.after_value = true;
        Ok(())
    }

    fn write_value(&mut self, value: &PrimitiveVariant) -> Result<(), MeshError> {
        self.clear_separator();
        let Some(top) = self.open_objects.last() else {
            return Err(MeshError::BadFormat(
                "write_value outside of an object".to_string(),
            ));
        };
        if top == "@atom" {
            // atoms render as their text form, not the packed integer
            let packed = value.as_u64().map_err(|_| {
                MeshError::BadFormat("expected u64 value after @atom".to_string())
            })?;
            quote_into(&mut self.out, &Atom::from_raw(packed).to_string());
        } else {
            value.apply(&mut TextWriter { out: &mut self.out });
        }
        self.after_value = true;
        Ok(())
    }

    fn write_tuple(&mut self, values: &[PrimitiveVariant]) -> Result<(), MeshError> {
        self.clear_separator();
        self.out.push_str("{ ");
        self.after_value = false;
        for value in values {
            self.write_value(value)?;
        }
        self.out.push_str(if self.after_value { " }" } else { "}" });
        self.after_value = true;
        Ok(())
    }
}

const fn is_delimiter(c: char) -> bool {
    matches!(c, '(' | ')' | '{' | '}' | ' ' | ',' | '\t' | '\n' | '\r')
}

const fn is_separator(c: char) -> bool {
    matches!(c, ' ' | ',' | '\t' | '\n' | '\r')
}

/// [`Deserializer`] over the textual object grammar.
pub struct StringDeserializer {
    input: Vec<char>,
    pos: usize,
    open_objects: Vec<String>,
    had_paren: Vec<bool>,
}

impl StringDeserializer {
    /// Wraps the input text.
    #[must_use]
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
            open_objects: Vec::new(),
            had_paren: Vec::new(),
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn skip_space_and_comma(&mut self) {
        while self.peek_char().is_some_and(is_separator) {
            self.pos += 1;
        }
    }

    fn consume(&mut self, expected: char) -> Result<(), MeshError> {
        self.skip_space_and_comma();
        match self.peek_char() {
            Some(c) if c == expected => {
                self.pos += 1;
                Ok(())
            }
            found => {
                let mut msg = match found {
                    Some(c) => format!("expected {expected:?}, found {c:?}"),
                    None => format!("expected {expected:?}, found end of input"),
                };
                if let Some(top) = self.open_objects.last() {
                    msg.push_str(&format!(" while reading an instance of {top}"));
                }
                Err(MeshError::BadFormat(msg))
            }
        }
    }

    fn try_consume(&mut self, expected: char) -> bool {
        self.skip_space_and_comma();
        if self.peek_char() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn integrity_check(&self) -> Result<(), MeshError> {
        if self.open_objects.is_empty() || self.had_paren.is_empty() {
            return Err(MeshError::BadFormat("missing begin_object".to_string()));
        }
        if self.had_paren.last() == Some(&false) {
            return Err(MeshError::BadFormat(
                "expected left parenthesis after begin_object or a void value".to_string(),
            ));
        }
        Ok(())
    }

    fn take_until_delimiter(&mut self) -> String {
        let start = self.pos;
        while self.peek_char().is_some_and(|c| !is_delimiter(c)) {
            self.pos += 1;
        }
        self.input[start..self.pos].iter().collect()
    }

    fn read_string_literal(&mut self) -> Result<String, MeshError> {
        self.skip_space_and_comma();
        if self.peek_char() != Some('"') {
            // bare token form
            let token = self.take_until_delimiter();
            if token.is_empty() {
                return Err(MeshError::BadFormat("unterminated value".to_string()));
            }
            return Ok(token);
        }
        self.pos += 1;
        let mut out = String::new();
        loop {
            let Some(c) = self.peek_char() else {
                return Err(MeshError::BadFormat("unterminated string".to_string()));
            };
            self.pos += 1;
            match c {
                '\\' if self.peek_char() == Some('"') => {
                    out.push('"');
                    self.pos += 1;
                }
                '"' => return Ok(out),
                other => out.push(other),
            }
        }
    }

    /// Counts the top-level values between the current position and the
    /// sequence's closing brace, honoring nesting and string literals.
    fn count_sequence_elements(&self) -> Result<usize, MeshError> {
        let mut i = self.pos;
        let mut depth = 0usize;
        let mut in_string = false;
        let mut prev = '\0';
        let mut in_element = false;
        let mut count = 0usize;
        loop {
            let Some(&c) = self.input.get(i) else {
                return Err(MeshError::BadFormat("unterminated sequence".to_string()));
            };
            if in_string {
                if c == '"' && prev != '\\' {
                    in_string = false;
                }
                prev = c;
                i += 1;
                continue;
            }
            match c {
                '}' | ')' if depth == 0 => {
                    if c == '}' {
                        return Ok(count);
                    }
                    return Err(MeshError::BadFormat(
                        "unbalanced parenthesis in sequence".to_string(),
                    ));
                }
                '{' | '(' => {
                    if depth == 0 && !in_element {
                        in_element = true;
                        count += 1;
                    }
                    depth += 1;
                }
                '}' | ')' => depth -= 1,
                '"' => {
                    if depth == 0 && !in_element {
                        in_element = true;
                        count += 1;
                    }
                    in_string = true;
                }
                c if is_separator(c) => {
                    if depth == 0 {
                        in_element = false;
                    }
                }
                _ => {
                    if depth == 0 && !in_element {
                        in_element = true;
                        count += 1;
                    }
                }
            }
            prev = c;
            i += 1;
        }
    }
}

impl Deserializer for StringDeserializer {
    fn seek_object(&mut self) -> Result<String, MeshError> {
        self.skip_space_and_comma();
        let name = self.take_until_delimiter();
        if name.is_empty() {
            return Err(MeshError::BadFormat(
                "could not seek object type name".to_string(),
            ));
        }
        Ok(name)
    }

    fn peek_object(&mut self) -> Result<String, MeshError> {
        let saved = self.pos;
        let name = self.seek_object();
        self.pos = saved;
        name
    }

    fn begin_object(&mut self, name: &str) -> Result<(), MeshError> {
        self.open_objects.push(name.to_string());
        let had = self.try_consume('(');
        self.had_paren.push(had);
        Ok(())
    }

    fn end_object(&mut self) -> Result<(), MeshError> {
        match self.had_paren.pop() {
            None => return Err(MeshError::BadFormat("missing begin_object".to_string())),
            Some(true) => self.consume(')')?,
            Some(false) => {}
        }
        if self.open_objects.pop().is_none() {
            return Err(MeshError::BadFormat("no object to end".to_string()));
        }
        if self.open_objects.is_empty() {
            self.skip_space_and_comma();
            if self.pos != self.input.len() {
                return Err(MeshError::BadFormat(
                    "expected end of input after outermost object".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn begin_sequence(&mut self) -> Result<usize, MeshError> {
        self.integrity_check()?;
        self.consume('{')?;
        self.count_sequence_elements()
    }

    fn end_sequence(&mut self) -> Result<(), MeshError> {
        self.integrity_check()?;
        self.consume('}')
    }

    fn read_value(&mut self, kind: PrimitiveKind) -> Result<PrimitiveVariant, MeshError> {
        self.integrity_check()?;
        if kind == PrimitiveKind::U64
            && self.open_objects.last().map(String::as_str) == Some("@atom")
        {
            let text = self.read_string_literal()?;
            if text.chars().count() > MAX_ATOM_LEN {
                return Err(MeshError::BadFormat(format!(
                    "atom string longer than {MAX_ATOM_LEN} characters"
                )));
            }
            return Ok(PrimitiveVariant::U64(Atom::parse(&text)?.raw()));
        }
        match kind {
            PrimitiveKind::Null => Ok(PrimitiveVariant::Null),
            PrimitiveKind::Str => Ok(PrimitiveVariant::Str(self.read_string_literal()?)),
            PrimitiveKind::Str16 => Ok(PrimitiveVariant::Str16(
                self.read_string_literal()?.encode_utf16().collect(),
            )),
            PrimitiveKind::Str32 => Ok(PrimitiveVariant::Str32(
                self.read_string_literal()?.chars().collect(),
            )),
            numeric => {
                self.skip_space_and_comma();
                let token = self.take_until_delimiter();
                if token.is_empty() {
                    return Err(MeshError::BadFormat("unterminated value".to_string()));
                }
                parse_numeric(numeric, &token)
            }
        }
    }

    fn read_tuple(&mut self, kinds: &[PrimitiveKind]) -> Result<Vec<PrimitiveVariant>, MeshError> {
        self.integrity_check()?;
        self.consume('{')?;
        let mut values = Vec::with_capacity(kinds.len());
        for &kind in kinds {
            values.push(self.read_value(kind)?);
        }
        self.consume('}')?;
        Ok(values)
    }
}

fn parse_numeric(kind: PrimitiveKind, token: &str) -> Result<PrimitiveVariant, MeshError> {
    fn bad(kind: PrimitiveKind, token: &str) -> MeshError {
        MeshError::BadFormat(format!("invalid {} literal: {token}", kind.name()))
    }
    match kind {
        PrimitiveKind::I8 => token.parse().map(PrimitiveVariant::I8).map_err(|_| bad(kind, token)),
        PrimitiveKind::I16 => token.parse().map(PrimitiveVariant::I16).map_err(|_| bad(kind, token)),
        PrimitiveKind::I32 => token.parse().map(PrimitiveVariant::I32).map_err(|_| bad(kind, token)),
        PrimitiveKind::I64 => token.parse().map(PrimitiveVariant::I64).map_err(|_| bad(kind, token)),
        PrimitiveKind::U8 => token.parse().map(PrimitiveVariant::U8).map_err(|_| bad(kind, token)),
        PrimitiveKind::U16 => token.parse().map(PrimitiveVariant::U16).map_err(|_| bad(kind, token)),
        PrimitiveKind::U32 => token.parse().map(PrimitiveVariant::U32).map_err(|_| bad(kind, token)),
        PrimitiveKind::U64 => token.parse().map(PrimitiveVariant::U64).map_err(|_| bad(kind, token)),
        PrimitiveKind::F32 => token.parse().map(PrimitiveVariant::F32).map_err(|_| bad(kind, token)),
        PrimitiveKind::F64 => token.parse().map(PrimitiveVariant::F64).map_err(|_| bad(kind, token)),
        _ => Err(bad(kind, token)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::atom::atom;
    use crate::message::tuple::AnyTuple;

    fn ctx() -> WireContext {
        WireContext::standalone()
    }

    #[test]
    fn test_tuple_renders_expected_text() {
        let ctx = ctx();
        let t = AnyTuple::make((7i32, "hi, \"world\"".to_string()));
        let text = to_text(&TupleValue::new(t), &ctx).unwrap();
        assert_eq!(text, "@tuple ( { @i32 ( 7 ), @str ( \"hi, \\\"world\\\"\" ) } )");
    }

    #[test]
    fn test_tuple_round_trip() {
        let ctx = ctx();
        let t = AnyTuple::make((7i32, "hi, \"world\"".to_string()));
        let original = TupleValue::new(t);
        let parsed = from_text(&to_text(&original, &ctx).unwrap(), &ctx).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_atom_renders_as_text() {
        let ctx = ctx();
        let original = TupleValue::new(atom("quit"));
        let text = to_text(&original, &ctx).unwrap();
        assert_eq!(text, "@atom ( \"quit\" )");
        let parsed = from_text(&text, &ctx).unwrap();
        assert_eq!(parsed.get::<Atom>(), Some(&atom("quit")));
    }

    #[test]
    fn test_empty_tuple_round_trip() {
        let ctx = ctx();
        let original = TupleValue::new(AnyTuple::empty());
        let text = to_text(&original, &ctx).unwrap();
        let parsed = from_text(&text, &ctx).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_nested_tuple_round_trip() {
        let ctx = ctx();
        let inner = AnyTuple::make((1u8, 2u8));
        let outer = AnyTuple::make((inner, "x,y".to_string(), 3.5f64));
        let original = TupleValue::new(outer);
        let parsed = from_text(&to_text(&original, &ctx).unwrap(), &ctx).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_every_primitive_kind_round_trips() {
        let ctx = ctx();
        let t = AnyTuple::from_slots(vec![
            TupleValue::new(-8i8),
            TupleValue::new(-1600i16),
            TupleValue::new(-320_000i32),
            TupleValue::new(-64_000_000_000i64),
            TupleValue::new(8u8),
            TupleValue::new(1600u16),
            TupleValue::new(320_000u32),
            TupleValue::new(64_000_000_000u64),
            TupleValue::new(0.5f32),
            TupleValue::new(0.25f64),
            TupleValue::new("plain".to_string()),
            TupleValue::new("wide".encode_utf16().collect::<Vec<u16>>()),
            TupleValue::new("chars".chars().collect::<Vec<char>>()),
        ]);
        let original = TupleValue::new(t);
        let parsed = from_text(&to_text(&original, &ctx).unwrap(), &ctx).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_void_renders_null_object() {
        let ctx = ctx();
        let original = TupleValue::new(());
        let text = to_text(&original, &ctx).unwrap();
        assert_eq!(text, "@0 ( )");
        let parsed = from_text(&text, &ctx).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_duration_round_trip() {
        let ctx = ctx();
        let original = TupleValue::new(crate::message::duration::MeshDuration::from_millis(250));
        let parsed = from_text(&to_text(&original, &ctx).unwrap(), &ctx).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_unknown_type_name() {
        let ctx = ctx();
        let err = from_text("@mystery ( 1 )", &ctx).unwrap_err();
        assert!(matches!(err, MeshError::UnknownType(name) if name == "@mystery"));
    }

    #[test]
    fn test_malformed_inputs() {
        let ctx = ctx();
        for input in [
            "@i32 ( 7",            // missing closing parenthesis
            "@i32 ( seven )",      // not a number
            "@i32 ( 7 ) trailing", // junk after outermost object
            "@tuple ( { @i32 ( 1 )",
            "@str ( \"unterminated )",
        ] {
            let err = from_text(input, &ctx).unwrap_err();
            assert!(
                matches!(err, MeshError::BadFormat(_)),
                "expected BadFormat for {input:?}, got {err:?}"
            );
        }
    }

    #[test]
    fn test_whitespace_and_commas_interchangeable() {
        let ctx = ctx();
        let parsed = from_text("@tuple({@i32(7),@str(\"x\")})", &ctx).unwrap();
        let spaced = from_text("@tuple ( { @i32 ( 7 )  @str ( \"x\" ) } )", &ctx).unwrap();
        assert_eq!(parsed, spaced);
    }

    #[test]
    fn test_oversized_atom_rejected() {
        let ctx = ctx();
        let err = from_text("@atom ( \"waytoolongatom\" )", &ctx).unwrap_err();
        assert!(matches!(err, MeshError::BadFormat(_)));
    }
}
