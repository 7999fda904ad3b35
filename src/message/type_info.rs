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

//! Type meta objects: the bridge between erased values and the wire.
//!
//! Every value type that can travel in an [`AnyTuple`] has a [`TypeMeta`]
//! describing it: a stable cross-platform *uniform name* (`@i32`, `@str`,
//! `@actor`, ...), platform-specific raw-name aliases, and the four
//! operations the runtime needs (serialize, deserialize, compare, clone).
//!
//! Integer buckets of equal width and signedness share one uniform name,
//! so an `int` announced by a C++ peer and a Rust `i32` resolve to the
//! same meta and compare equal.

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::trace;

use crate::actor::{ActorRef, ChannelRef};
use crate::common::envelope::AddressedMessage;
use crate::common::MeshError;
use crate::message::atom::Atom;
use crate::message::duration::{MeshDuration, TimeUnit};
use crate::message::tuple::{AnyTuple, ObjectArray, TupleValue};
use crate::message::variant::{PrimitiveKind, PrimitiveVariant};
use crate::remote::{NodeId, ProxyKey};
use crate::wire::serializer::{Deserializer, Serializer, WireContext};

/// Uniform name of the void/null type.
pub const NULL_TYPE_NAME: &str = "@0";

/// Meta object for one registered value type.
///
/// Implementations are stateless and shared behind `Arc`; two metas are
/// interchangeable when [`TypeMeta::equals_meta`] holds, which by default
/// means their uniform names agree.
pub trait TypeMeta: Send + Sync {
    /// The stable cross-platform uniform name.
    fn name(&self) -> &str;

    /// Platform-specific aliases that also resolve to this meta.
    fn raw_names(&self) -> &'static [&'static str] {
        &[]
    }

    /// Writes `value` to the sink as one complete object.
    ///
    /// # Errors
    ///
    /// [`MeshError::BadFormat`] when `value` is not of the described type,
    /// plus anything the sink reports.
    fn serialize(
        &self,
        value: &(dyn Any + Send + Sync),
        sink: &mut dyn Serializer,
        ctx: &WireContext,
    ) -> Result<(), MeshError>;

    /// Reads one complete object of this type from the source.
    fn deserialize(
        &self,
        source: &mut dyn Deserializer,
        ctx: &WireContext,
    ) -> Result<Arc<dyn Any + Send + Sync>, MeshError>;

    /// Value equality under this type.
    fn equals_value(&self, a: &(dyn Any + Send + Sync), b: &(dyn Any + Send + Sync)) -> bool;

    /// Meta equality: do `self` and `other` describe the same type?
    fn equals_meta(&self, other: &dyn TypeMeta) -> bool {
        self.name() == other.name()
    }

    /// A default-constructed instance, or `None` when the type has no
    /// natural default.
    fn new_instance(&self) -> Option<Arc<dyn Any + Send + Sync>>;

    /// A deep copy of `value`, or `None` when `value` is not of the
    /// described type.
    fn clone_value(&self, value: &(dyn Any + Send + Sync)) -> Option<Arc<dyn Any + Send + Sync>>;
}

/// Field types that know their own builtin meta.
///
/// Lets [`TupleValue::new`] and [`AnyTuple::make`] erase values without a
/// registry handle.
pub trait TupleField: Any + Send + Sync + Sized {
    /// The meta describing `Self`.
    fn meta() -> Arc<dyn TypeMeta>;
}

fn value_mismatch(name: &str) -> MeshError {
    MeshError::BadFormat(format!("value does not match type info {name}"))
}

fn wrong_name(expected: &str, found: &str) -> MeshError {
    MeshError::BadFormat(format!("expected type name {expected}, found {found}"))
}

/// Emits the null object `@0 ( )`.
pub(crate) fn serialize_null(sink: &mut dyn Serializer) -> Result<(), MeshError> {
    sink.begin_object(NULL_TYPE_NAME)?;
    sink.end_object()
}

/// Consumes a null object body. The caller has already consumed the name.
pub(crate) fn deserialize_null(source: &mut dyn Deserializer) -> Result<(), MeshError> {
    source.begin_object(NULL_TYPE_NAME)?;
    source.end_object()
}

// --- Primitive buckets ---

/// Payload types of [`PrimitiveVariant`], with their wire identity.
pub trait PrimitiveField:
    Any + Clone + PartialEq + Default + Send + Sync + Sized
{
    /// The variant tag for this payload type.
    const KIND: PrimitiveKind;
    /// The bucket's uniform name.
    const UNIFORM: &'static str;
    /// Raw-name aliases resolving to this bucket.
    const RAW_NAMES: &'static [&'static str];

    /// Wraps the value in a variant.
    fn to_variant(&self) -> PrimitiveVariant;

    /// Unwraps the variant, failing on a tag mismatch.
    fn from_variant(variant: PrimitiveVariant) -> Result<Self, MeshError>;
}

/// Meta for one primitive bucket.
pub(crate) struct PrimitiveMeta<T>(PhantomData<T>);

impl<T> PrimitiveMeta<T> {
    pub(crate) const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T: PrimitiveField> TypeMeta for PrimitiveMeta<T> {
    fn name(&self) -> &str {
        T::UNIFORM
    }

    fn raw_names(&self) -> &'static [&'static str] {
        T::RAW_NAMES
    }

    fn serialize(
        &self,
        value: &(dyn Any + Send + Sync),
        sink: &mut dyn Serializer,
        _ctx: &WireContext,
    ) -> Result<(), MeshError> {
        let concrete = value
            .downcast_ref::<T>()
            .ok_or_else(|| value_mismatch(T::UNIFORM))?;
        sink.begin_object(T::UNIFORM)?;
        sink.write_value(&concrete.to_variant())?;
        sink.end_object()
    }

    fn deserialize(
        &self,
        source: &mut dyn Deserializer,
        _ctx: &WireContext,
    ) -> Result<Arc<dyn Any + Send + Sync>, MeshError> {
        let name = source.seek_object()?;
        if name != T::UNIFORM {
            return Err(wrong_name(T::UNIFORM, &name));
        }
        source.begin_object(&name)?;
        let variant = source.read_value(T::KIND)?;
        source.end_object()?;
        Ok(Arc::new(T::from_variant(variant)?))
    }

    fn equals_value(&self, a: &(dyn Any + Send + Sync), b: &(dyn Any + Send + Sync)) -> bool {
        match (a.downcast_ref::<T>(), b.downcast_ref::<T>()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    fn new_instance(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        Some(Arc::new(T::default()))
    }

    fn clone_value(&self, value: &(dyn Any + Send + Sync)) -> Option<Arc<dyn Any + Send + Sync>> {
        value
            .downcast_ref::<T>()
            .map(|v| Arc::new(v.clone()) as Arc<dyn Any + Send + Sync>)
    }
}

macro_rules! primitive_field {
    ($ty:ty, $kind:ident, $uniform:expr, [$($raw:expr),* $(,)?]) => {
        impl PrimitiveField for $ty {
            const KIND: PrimitiveKind = PrimitiveKind::$kind;
            const UNIFORM: &'static str = $uniform;
            const RAW_NAMES: &'static [&'static str] = &[$($raw),*];

            fn to_variant(&self) -> PrimitiveVariant {
                PrimitiveVariant::from(self.clone())
            }

            fn from_variant(variant: PrimitiveVariant) -> Result<Self, MeshError> {
                match variant {
                    PrimitiveVariant::$kind(v) => Ok(v),
                    other => Err(MeshError::InvalidKind {
                        expected: PrimitiveKind::$kind,
                        found: other.kind(),
                    }),
                }
            }
        }

        impl TupleField for $ty {
            fn meta() -> Arc<dyn TypeMeta> {
                Arc::new(PrimitiveMeta::<$ty>::new())
            }
        }
    };
}

primitive_field!(i8, I8, "@i8", ["i8", "signed char", "char"]);
primitive_field!(i16, I16, "@i16", ["i16", "short", "short int", "signed short", "int16_t"]);
primitive_field!(i32, I32, "@i32", ["i32", "int", "signed int", "int32_t"]);
primitive_field!(i64, I64, "@i64", ["i64", "long", "long int", "long long", "int64_t"]);
primitive_field!(u8, U8, "@u8", ["u8", "unsigned char", "uint8_t"]);
primitive_field!(u16, U16, "@u16", ["u16", "unsigned short", "uint16_t"]);
primitive_field!(u32, U32, "@u32", ["u32", "unsigned int", "uint32_t"]);
primitive_field!(u64, U64, "@u64", ["u64", "unsigned long", "unsigned long long", "uint64_t"]);
primitive_field!(f32, F32, "@f32", ["f32", "float"]);
primitive_field!(f64, F64, "@f64", ["f64", "double", "long double"]);
primitive_field!(String, Str, "@str", ["String", "std::string"]);
primitive_field!(Vec<u16>, Str16, "@str16", ["Vec<u16>", "std::u16string"]);
primitive_field!(Vec<char>, Str32, "@str32", ["Vec<char>", "std::u32string"]);

// --- Atom ---

/// Meta for `@atom`. The in-memory form is the packed `u64`; textual
/// sinks render it back to the 10-character name.
pub(crate) struct AtomMeta;

impl TypeMeta for AtomMeta {
    fn name(&self) -> &str {
        "@atom"
    }

    fn raw_names(&self) -> &'static [&'static str] {
        &["Atom", "atom_value"]
    }

    fn serialize(
        &self,
        value: &(dyn Any + Send + Sync),
        sink: &mut dyn Serializer,
        _ctx: &WireContext,
    ) -> Result<(), MeshError> {
        let a = value
            .downcast_ref::<Atom>()
            .ok_or_else(|| value_mismatch("@atom"))?;
        sink.begin_object("@atom")?;
        sink.write_value(&PrimitiveVariant::U64(a.raw()))?;
        sink.end_object()
    }

    fn deserialize(
        &self,
        source: &mut dyn Deserializer,
        _ctx: &WireContext,
    ) -> Result<Arc<dyn Any + Send + Sync>, MeshError> {
        let name = source.seek_object()?;
        if name != "@atom" {
            return Err(wrong_name("@atom", &name));
        }
        source.begin_object(&name)?;
        let packed = source.read_value(PrimitiveKind::U64)?.as_u64()?;
        source.end_object()?;
        Ok(Arc::new(Atom::from_raw(packed)))
    }

    fn equals_value(&self, a: &(dyn Any + Send + Sync), b: &(dyn Any + Send + Sync)) -> bool {
        a.downcast_ref::<Atom>() == b.downcast_ref::<Atom>()
            && a.downcast_ref::<Atom>().is_some()
    }

    fn new_instance(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        Some(Arc::new(Atom::from_raw(0)))
    }

    fn clone_value(&self, value: &(dyn Any + Send + Sync)) -> Option<Arc<dyn Any + Send + Sync>> {
        value
            .downcast_ref::<Atom>()
            .map(|a| Arc::new(*a) as Arc<dyn Any + Send + Sync>)
    }
}

impl TupleField for Atom {
    fn meta() -> Arc<dyn TypeMeta> {
        Arc::new(AtomMeta)
    }
}

// --- Duration ---

pub(crate) struct DurationMeta;

impl TypeMeta for DurationMeta {
    fn name(&self) -> &str {
        "@duration"
    }

    fn raw_names(&self) -> &'static [&'static str] {
        &["MeshDuration", "duration"]
    }

    fn serialize(
        &self,
        value: &(dyn Any + Send + Sync),
        sink: &mut dyn Serializer,
        _ctx: &WireContext,
    ) -> Result<(), MeshError> {
        let d = value
            .downcast_ref::<MeshDuration>()
            .ok_or_else(|| value_mismatch("@duration"))?;
        sink.begin_object("@duration")?;
        sink.write_value(&PrimitiveVariant::U32(d.unit.as_u32()))?;
        sink.write_value(&PrimitiveVariant::U32(d.count))?;
        sink.end_object()
    }

    fn deserialize(
        &self,
        source: &mut dyn Deserializer,
        _ctx: &WireContext,
    ) -> Result<Arc<dyn Any + Send + Sync>, MeshError> {
        let name = source.seek_object()?;
        if name != "@duration" {
            return Err(wrong_name("@duration", &name));
        }
        source.begin_object(&name)?;
        let unit = source.read_value(PrimitiveKind::U32)?.as_u32()?;
        let count = source.read_value(PrimitiveKind::U32)?.as_u32()?;
        source.end_object()?;
        Ok(Arc::new(MeshDuration {
            unit: TimeUnit::from_u32(unit),
            count,
        }))
    }

    fn equals_value(&self, a: &(dyn Any + Send + Sync), b: &(dyn Any + Send + Sync)) -> bool {
        match (a.downcast_ref::<MeshDuration>(), b.downcast_ref::<MeshDuration>()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    fn new_instance(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        Some(Arc::new(MeshDuration::default()))
    }

    fn clone_value(&self, value: &(dyn Any + Send + Sync)) -> Option<Arc<dyn Any + Send + Sync>> {
        value
            .downcast_ref::<MeshDuration>()
            .map(|d| Arc::new(*d) as Arc<dyn Any + Send + Sync>)
    }
}

impl TupleField for MeshDuration {
    fn meta() -> Arc<dyn TypeMeta> {
        Arc::new(DurationMeta)
    }
}

// --- Void ---

pub(crate) struct VoidMeta;

impl TypeMeta for VoidMeta {
    fn name(&self) -> &str {
        NULL_TYPE_NAME
    }

    fn raw_names(&self) -> &'static [&'static str] {
        &["()", "void_type"]
    }

    fn serialize(
        &self,
        value: &(dyn Any + Send + Sync),
        sink: &mut dyn Serializer,
        _ctx: &WireContext,
    ) -> Result<(), MeshError> {
        value
            .downcast_ref::<()>()
            .ok_or_else(|| value_mismatch(NULL_TYPE_NAME))?;
        serialize_null(sink)
    }

    fn deserialize(
        &self,
        source: &mut dyn Deserializer,
        _ctx: &WireContext,
    ) -> Result<Arc<dyn Any + Send + Sync>, MeshError> {
        let name = source.seek_object()?;
        if name != NULL_TYPE_NAME {
            return Err(wrong_name(NULL_TYPE_NAME, &name));
        }
        deserialize_null(source)?;
        Ok(Arc::new(()))
    }

    fn equals_value(&self, a: &(dyn Any + Send + Sync), b: &(dyn Any + Send + Sync)) -> bool {
        a.downcast_ref::<()>().is_some() && b.downcast_ref::<()>().is_some()
    }

    fn new_instance(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        Some(Arc::new(()))
    }

    fn clone_value(&self, value: &(dyn Any + Send + Sync)) -> Option<Arc<dyn Any + Send + Sync>> {
        value
            .downcast_ref::<()>()
            .map(|_| Arc::new(()) as Arc<dyn Any + Send + Sync>)
    }
}

impl TupleField for () {
    fn meta() -> Arc<dyn TypeMeta> {
        Arc::new(VoidMeta)
    }
}

// --- Actor references ---

/// Meta for `@actor`. Wire form: `{ aid, pid, node-hex }`, or the null
/// object for an absent reference.
pub(crate) struct ActorRefMeta;

impl ActorRefMeta {
    /// Writes an actor reference. Before emission the local registry is
    /// told about the actor so the remote side can later reach it by id.
    pub(crate) fn serialize_ref(
        actor: &Option<ActorRef>,
        sink: &mut dyn Serializer,
        ctx: &WireContext,
    ) -> Result<(), MeshError> {
        let Some(actor) = actor else {
            return serialize_null(sink);
        };
        if !actor.is_proxy() {
            // make sure the remote side can later reach this instance by id;
            // proxies are registered on their home node instead
            ctx.actors.put(actor.id(), actor);
        }
        let parts = [
            PrimitiveVariant::U32(actor.id()),
            PrimitiveVariant::U32(actor.node().pid()),
            PrimitiveVariant::Str(actor.node().node_id().to_string()),
        ];
        sink.begin_object("@actor")?;
        sink.write_tuple(&parts)?;
        sink.end_object()
    }

    /// Reads an actor reference, resolving locally or through the proxy
    /// cache depending on the decoded process identity.
    pub(crate) fn deserialize_ref(
        source: &mut dyn Deserializer,
        ctx: &WireContext,
    ) -> Result<Option<ActorRef>, MeshError> {
        let cname = source.seek_object()?;
        if cname == NULL_TYPE_NAME {
            deserialize_null(source)?;
            return Ok(None);
        }
        if cname != "@actor" {
            return Err(wrong_name("@actor", &cname));
        }
        source.begin_object(&cname)?;
        let parts = source.read_tuple(&[
            PrimitiveKind::U32,
            PrimitiveKind::U32,
            PrimitiveKind::Str,
        ])?;
        source.end_object()?;
        let aid = parts[0].as_u32()?;
        let pid = parts[1].as_u32()?;
        let node_hex = parts[2].as_str()?;
        if pid == ctx.node.pid() && ctx.node.node_id().equals_hex(node_hex) {
            trace!(aid, "resolving actor reference locally");
            Ok(ctx.actors.get(aid))
        } else {
            let node = NodeId::from_hex(node_hex)?;
            trace!(aid, pid, "resolving actor reference through proxy cache");
            Ok(Some(ctx.proxies.get_or_create(ProxyKey { aid, pid, node })))
        }
    }
}

impl TypeMeta for ActorRefMeta {
    fn name(&self) -> &str {
        "@actor"
    }

    fn raw_names(&self) -> &'static [&'static str] {
        &["ActorRef", "actor_ptr"]
    }

    fn serialize(
        &self,
        value: &(dyn Any + Send + Sync),
        sink: &mut dyn Serializer,
        ctx: &WireContext,
    ) -> Result<(), MeshError> {
        let actor = value
            .downcast_ref::<Option<ActorRef>>()
            .ok_or_else(|| value_mismatch("@actor"))?;
        Self::serialize_ref(actor, sink, ctx)
    }

    fn deserialize(
        &self,
        source: &mut dyn Deserializer,
        ctx: &WireContext,
    ) -> Result<Arc<dyn Any + Send + Sync>, MeshError> {
        Ok(Arc::new(Self::deserialize_ref(source, ctx)?))
    }

    fn equals_value(&self, a: &(dyn Any + Send + Sync), b: &(dyn Any + Send + Sync)) -> bool {
        match (
            a.downcast_ref::<Option<ActorRef>>(),
            b.downcast_ref::<Option<ActorRef>>(),
        ) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    fn new_instance(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        Some(Arc::new(None::<ActorRef>))
    }

    fn clone_value(&self, value: &(dyn Any + Send + Sync)) -> Option<Arc<dyn Any + Send + Sync>> {
        value
            .downcast_ref::<Option<ActorRef>>()
            .map(|v| Arc::new(v.clone()) as Arc<dyn Any + Send + Sync>)
    }
}

impl TupleField for Option<ActorRef> {
    fn meta() -> Arc<dyn TypeMeta> {
        Arc::new(ActorRefMeta)
    }
}

// --- Group references ---

/// Meta for `@group`. Wire form: the module name and identifier; decode
/// re-resolves through the group manager so instances stay interned.
pub(crate) struct GroupRefMeta;

impl GroupRefMeta {
    pub(crate) fn serialize_ref(
        group: &Option<crate::actor::GroupRef>,
        sink: &mut dyn Serializer,
        _ctx: &WireContext,
    ) -> Result<(), MeshError> {
        let Some(group) = group else {
            return serialize_null(sink);
        };
        sink.begin_object("@group")?;
        sink.write_value(&PrimitiveVariant::Str(group.module_name().to_string()))?;
        sink.write_value(&PrimitiveVariant::Str(group.identifier().to_string()))?;
        sink.end_object()
    }

    pub(crate) fn deserialize_ref(
        source: &mut dyn Deserializer,
        ctx: &WireContext,
    ) -> Result<Option<crate::actor::GroupRef>, MeshError> {
        let cname = source.seek_object()?;
        if cname == NULL_TYPE_NAME {
            deserialize_null(source)?;
            return Ok(None);
        }
        if cname != "@group" {
            return Err(wrong_name("@group", &cname));
        }
        source.begin_object(&cname)?;
        let module = source.read_value(PrimitiveKind::Str)?.into_string()?;
        let identifier = source.read_value(PrimitiveKind::Str)?.into_string()?;
        source.end_object()?;
        Ok(Some(ctx.groups.get(&module, &identifier)?))
    }
}

impl TypeMeta for GroupRefMeta {
    fn name(&self) -> &str {
        "@group"
    }

    fn raw_names(&self) -> &'static [&'static str] {
        &["GroupRef", "group_ptr"]
    }

    fn serialize(
        &self,
        value: &(dyn Any + Send + Sync),
        sink: &mut dyn Serializer,
        ctx: &WireContext,
    ) -> Result<(), MeshError> {
        let group = value
            .downcast_ref::<Option<crate::actor::GroupRef>>()
            .ok_or_else(|| value_mismatch("@group"))?;
        Self::serialize_ref(group, sink, ctx)
    }

    fn deserialize(
        &self,
        source: &mut dyn Deserializer,
        ctx: &WireContext,
    ) -> Result<Arc<dyn Any + Send + Sync>, MeshError> {
        Ok(Arc::new(Self::deserialize_ref(source, ctx)?))
    }

    fn equals_value(&self, a: &(dyn Any + Send + Sync), b: &(dyn Any + Send + Sync)) -> bool {
        match (
            a.downcast_ref::<Option<crate::actor::GroupRef>>(),
            b.downcast_ref::<Option<crate::actor::GroupRef>>(),
        ) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    fn new_instance(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        Some(Arc::new(None::<crate::actor::GroupRef>))
    }

    fn clone_value(&self, value: &(dyn Any + Send + Sync)) -> Option<Arc<dyn Any + Send + Sync>> {
        value
            .downcast_ref::<Option<crate::actor::GroupRef>>()
            .map(|v| Arc::new(v.clone()) as Arc<dyn Any + Send + Sync>)
    }
}

impl TupleField for Option<crate::actor::GroupRef> {
    fn meta() -> Arc<dyn TypeMeta> {
        Arc::new(GroupRefMeta)
    }
}

// --- Channel references ---

/// Meta for `@channel`. The wrapper object carries the inner reference's
/// own discriminating name (`@actor`, `@group`, or `@0`).
pub(crate) struct ChannelRefMeta;

impl ChannelRefMeta {
    pub(crate) fn serialize_ref(
        channel: &Option<ChannelRef>,
        sink: &mut dyn Serializer,
        ctx: &WireContext,
    ) -> Result<(), MeshError> {
        sink.begin_object("@channel")?;
        match channel {
            None => serialize_null(sink)?,
            Some(ChannelRef::Actor(actor)) => {
                ActorRefMeta::serialize_ref(&Some(actor.clone()), sink, ctx)?;
            }
            Some(ChannelRef::Group(group)) => {
                GroupRefMeta::serialize_ref(&Some(group.clone()), sink, ctx)?;
            }
        }
        sink.end_object()
    }

    pub(crate) fn deserialize_ref(
        source: &mut dyn Deserializer,
        ctx: &WireContext,
    ) -> Result<Option<ChannelRef>, MeshError> {
        let cname = source.seek_object()?;
        if cname != "@channel" {
            return Err(wrong_name("@channel", &cname));
        }
        source.begin_object(&cname)?;
        let inner = source.peek_object()?;
        let result = match inner.as_str() {
            "@actor" | NULL_TYPE_NAME => {
                ActorRefMeta::deserialize_ref(source, ctx)?.map(ChannelRef::Actor)
            }
            "@group" => GroupRefMeta::deserialize_ref(source, ctx)?.map(ChannelRef::Group),
            other => return Err(MeshError::BadFormat(format!("unexpected type name: {other}"))),
        };
        source.end_object()?;
        Ok(result)
    }
}

impl TypeMeta for ChannelRefMeta {
    fn name(&self) -> &str {
        "@channel"
    }

    fn raw_names(&self) -> &'static [&'static str] {
        &["ChannelRef", "channel_ptr"]
    }

    fn serialize(
        &self,
        value: &(dyn Any + Send + Sync),
        sink: &mut dyn Serializer,
        ctx: &WireContext,
    ) -> Result<(), MeshError> {
        let channel = value
            .downcast_ref::<Option<ChannelRef>>()
            .ok_or_else(|| value_mismatch("@channel"))?;
        Self::serialize_ref(channel, sink, ctx)
    }

    fn deserialize(
        &self,
        source: &mut dyn Deserializer,
        ctx: &WireContext,
    ) -> Result<Arc<dyn Any + Send + Sync>, MeshError> {
        Ok(Arc::new(Self::deserialize_ref(source, ctx)?))
    }

    fn equals_value(&self, a: &(dyn Any + Send + Sync), b: &(dyn Any + Send + Sync)) -> bool {
        match (
            a.downcast_ref::<Option<ChannelRef>>(),
            b.downcast_ref::<Option<ChannelRef>>(),
        ) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    fn new_instance(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        Some(Arc::new(None::<ChannelRef>))
    }

    fn clone_value(&self, value: &(dyn Any + Send + Sync)) -> Option<Arc<dyn Any + Send + Sync>> {
        value
            .downcast_ref::<Option<ChannelRef>>()
            .map(|v| Arc::new(v.clone()) as Arc<dyn Any + Send + Sync>)
    }
}

impl TupleField for Option<ChannelRef> {
    fn meta() -> Arc<dyn TypeMeta> {
        Arc::new(ChannelRefMeta)
    }
}

// --- Any-tuple ---

/// Meta for `@tuple`: a sequence of slots, each written as its own
/// self-describing object.
pub(crate) struct TupleMeta;

impl TupleMeta {
    pub(crate) fn serialize_tuple(
        tuple: &AnyTuple,
        sink: &mut dyn Serializer,
        ctx: &WireContext,
    ) -> Result<(), MeshError> {
        sink.begin_object("@tuple")?;
        sink.begin_sequence(tuple.len())?;
        for slot in tuple.iter() {
            slot.meta().serialize(slot.value(), sink, ctx)?;
        }
        sink.end_sequence()?;
        sink.end_object()
    }

    pub(crate) fn deserialize_tuple(
        source: &mut dyn Deserializer,
        ctx: &WireContext,
    ) -> Result<AnyTuple, MeshError> {
        let name = source.seek_object()?;
        if name != "@tuple" {
            return Err(wrong_name("@tuple", &name));
        }
        source.begin_object(&name)?;
        let len = source.begin_sequence()?;
        let mut array = ObjectArray::new();
        for _ in 0..len {
            let slot_name = source.peek_object()?;
            let meta = ctx
                .types
                .resolve(&slot_name)
                .ok_or_else(|| MeshError::UnknownType(slot_name.clone()))?;
            let value = meta.deserialize(source, ctx)?;
            array.push_back(TupleValue::from_parts(meta, value));
        }
        source.end_sequence()?;
        source.end_object()?;
        Ok(array.into())
    }
}

impl TypeMeta for TupleMeta {
    fn name(&self) -> &str {
        "@tuple"
    }

    fn raw_names(&self) -> &'static [&'static str] {
        &["AnyTuple", "any_tuple"]
    }

    fn serialize(
        &self,
        value: &(dyn Any + Send + Sync),
        sink: &mut dyn Serializer,
        ctx: &WireContext,
    ) -> Result<(), MeshError> {
        let tuple = value
            .downcast_ref::<AnyTuple>()
            .ok_or_else(|| value_mismatch("@tuple"))?;
        Self::serialize_tuple(tuple, sink, ctx)
    }

    fn deserialize(
        &self,
        source: &mut dyn Deserializer,
        ctx: &WireContext,
    ) -> Result<Arc<dyn Any + Send + Sync>, MeshError> {
        Ok(Arc::new(Self::deserialize_tuple(source, ctx)?))
    }

    fn equals_value(&self, a: &(dyn Any + Send + Sync), b: &(dyn Any + Send + Sync)) -> bool {
        match (a.downcast_ref::<AnyTuple>(), b.downcast_ref::<AnyTuple>()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    fn new_instance(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        Some(Arc::new(AnyTuple::empty()))
    }

    fn clone_value(&self, value: &(dyn Any + Send + Sync)) -> Option<Arc<dyn Any + Send + Sync>> {
        value
            .downcast_ref::<AnyTuple>()
            .map(|t| Arc::new(t.clone()) as Arc<dyn Any + Send + Sync>)
    }
}

impl TupleField for AnyTuple {
    fn meta() -> Arc<dyn TypeMeta> {
        Arc::new(TupleMeta)
    }
}

// --- Addressed message ---

/// Meta for `@msg`: sender, receiver, content, nested in order.
pub(crate) struct MessageMeta;

impl TypeMeta for MessageMeta {
    fn name(&self) -> &str {
        "@msg"
    }

    fn raw_names(&self) -> &'static [&'static str] {
        &["AddressedMessage", "addressed_message"]
    }

    fn serialize(
        &self,
        value: &(dyn Any + Send + Sync),
        sink: &mut dyn Serializer,
        ctx: &WireContext,
    ) -> Result<(), MeshError> {
        let msg = value
            .downcast_ref::<AddressedMessage>()
            .ok_or_else(|| value_mismatch("@msg"))?;
        sink.begin_object("@msg")?;
        ActorRefMeta::serialize_ref(msg.sender(), sink, ctx)?;
        ChannelRefMeta::serialize_ref(&Some(msg.receiver().clone()), sink, ctx)?;
        TupleMeta::serialize_tuple(msg.content(), sink, ctx)?;
        sink.end_object()
    }

    fn deserialize(
        &self,
        source: &mut dyn Deserializer,
        ctx: &WireContext,
    ) -> Result<Arc<dyn Any + Send + Sync>, MeshError> {
        let name = source.seek_object()?;
        if name != "@msg" {
            return Err(wrong_name("@msg", &name));
        }
        source.begin_object(&name)?;
        let sender = ActorRefMeta::deserialize_ref(source, ctx)?;
        let receiver = ChannelRefMeta::deserialize_ref(source, ctx)?
            .ok_or_else(|| MeshError::BadFormat("addressed message with null receiver".to_string()))?;
        let content = TupleMeta::deserialize_tuple(source, ctx)?;
        source.end_object()?;
        Ok(Arc::new(AddressedMessage::new(sender, receiver, content)))
    }

    fn equals_value(&self, a: &(dyn Any + Send + Sync), b: &(dyn Any + Send + Sync)) -> bool {
        match (
            a.downcast_ref::<AddressedMessage>(),
            b.downcast_ref::<AddressedMessage>(),
        ) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    fn new_instance(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        None
    }

    fn clone_value(&self, value: &(dyn Any + Send + Sync)) -> Option<Arc<dyn Any + Send + Sync>> {
        value
            .downcast_ref::<AddressedMessage>()
            .map(|m| Arc::new(m.clone()) as Arc<dyn Any + Send + Sync>)
    }
}

impl TupleField for AddressedMessage {
    fn meta() -> Arc<dyn TypeMeta> {
        Arc::new(MessageMeta)
    }
}
