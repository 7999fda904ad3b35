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

//! Type-erased, self-describing message payloads.
//!
//! An [`AnyTuple`] is a reference-counted ordered sequence of slots, each
//! pairing an opaque value with the [`TypeMeta`] that knows how to
//! serialize, compare, and clone it. Tuples are immutable by default and
//! cheap to clone; mutation goes through a copy-on-write path that only
//! copies when storage is shared.
//!
//! Two concrete shapes sit behind the one interface: a flat slot vector
//! (built statically via [`AnyTuple::make`] or dynamically via
//! [`ObjectArray`]) and a decorated view ([`AnyTuple::view`]) that maps a
//! selection of another tuple's slots while sharing its storage.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::message::type_info::{TupleField, TypeMeta};
use crate::common::MeshError;

/// One slot of an [`AnyTuple`]: an opaque value plus its type meta.
#[derive(Clone)]
pub struct TupleValue {
    meta: Arc<dyn TypeMeta>,
    value: Arc<dyn Any + Send + Sync>,
}

impl TupleValue {
    /// Builds a slot from any registered field type.
    #[must_use]
    pub fn new<T: TupleField>(value: T) -> Self {
        Self {
            meta: T::meta(),
            value: Arc::new(value),
        }
    }

    /// Pairs a meta with an already-erased value. The caller vouches that
    /// the value's concrete type is the one the meta describes.
    #[must_use]
    pub fn from_parts(meta: Arc<dyn TypeMeta>, value: Arc<dyn Any + Send + Sync>) -> Self {
        Self { meta, value }
    }

    /// The slot's type meta.
    #[must_use]
    pub fn meta(&self) -> &Arc<dyn TypeMeta> {
        &self.meta
    }

    /// The erased value.
    #[must_use]
    pub fn value(&self) -> &(dyn Any + Send + Sync) {
        &*self.value
    }

    /// Checked downcast of the stored value.
    #[must_use]
    pub fn get<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Mutable checked downcast with copy-on-write.
    ///
    /// When the value is shared, a private copy is made through
    /// [`TypeMeta::clone_value`] first; the mutation never observes or
    /// affects other holders.
    pub fn get_mut<T: Any + Send + Sync>(&mut self) -> Option<&mut T> {
        if Arc::get_mut(&mut self.value).is_none() {
            let copied = self.meta.clone_value(&*self.value)?;
            self.value = copied;
        }
        Arc::get_mut(&mut self.value)?.downcast_mut::<T>()
    }
}

impl PartialEq for TupleValue {
    fn eq(&self, other: &Self) -> bool {
        self.meta.equals_meta(other.meta.as_ref())
            && self.meta.equals_value(&*self.value, &*other.value)
    }
}

impl fmt::Debug for TupleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TupleValue")
            .field("type", &self.meta.name())
            .finish_non_exhaustive()
    }
}

/// Storage behind an [`AnyTuple`]: either owned slots or a view into
/// another tuple's slots.
enum TupleRepr {
    Flat(Vec<TupleValue>),
    View {
        base: Arc<TupleRepr>,
        index: Vec<usize>,
    },
}

fn repr_len(repr: &TupleRepr) -> usize {
    match repr {
        TupleRepr::Flat(slots) => slots.len(),
        TupleRepr::View { index, .. } => index.len(),
    }
}

fn repr_slot(repr: &TupleRepr, mut i: usize) -> &TupleValue {
    let mut current = repr;
    loop {
        match current {
            TupleRepr::Flat(slots) => return &slots[i],
            TupleRepr::View { base, index } => {
                i = index[i];
                current = base;
            }
        }
    }
}

/// A heterogeneous, copy-on-write ordered sequence of typed slots.
///
/// Cloning shares storage. Equality is slot-wise: type metas must agree
/// (per [`TypeMeta::equals_meta`]) and values must compare equal under
/// their meta.
#[derive(Clone)]
pub struct AnyTuple {
    repr: Arc<TupleRepr>,
}

impl AnyTuple {
    /// The empty tuple.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            repr: Arc::new(TupleRepr::Flat(Vec::new())),
        }
    }

    /// Builds a tuple from compile-time-known element types.
    ///
    /// ```rust,ignore
    /// let t = AnyTuple::make((7i32, "hi".to_string()));
    /// ```
    #[must_use]
    pub fn make(fields: impl IntoAnyTuple) -> Self {
        fields.into_any_tuple()
    }

    /// Builds a tuple from pre-assembled slots.
    #[must_use]
    pub fn from_slots(slots: Vec<TupleValue>) -> Self {
        Self {
            repr: Arc::new(TupleRepr::Flat(slots)),
        }
    }

    /// Number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        repr_len(&self.repr)
    }

    /// `true` when the tuple has no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The slot at `i`, or `None` out of bounds.
    #[must_use]
    pub fn at(&self, i: usize) -> Option<&TupleValue> {
        if i < self.len() {
            Some(repr_slot(&self.repr, i))
        } else {
            None
        }
    }

    /// The type meta of the slot at `i`.
    #[must_use]
    pub fn type_at(&self, i: usize) -> Option<&Arc<dyn TypeMeta>> {
        self.at(i).map(TupleValue::meta)
    }

    /// Checked downcast of the value at `i`.
    #[must_use]
    pub fn get<T: Any>(&self, i: usize) -> Option<&T> {
        self.at(i).and_then(TupleValue::get::<T>)
    }

    /// Mutable checked downcast of the value at `i`.
    ///
    /// This is the copy-on-write entry point: shared storage (including
    /// view storage) is privatized before the mutable reference is handed
    /// out, so other holders of the tuple never observe the change.
    pub fn get_mut<T: Any + Send + Sync>(&mut self, i: usize) -> Option<&mut T> {
        if i >= self.len() {
            return None;
        }
        self.materialize();
        match Arc::get_mut(&mut self.repr)? {
            TupleRepr::Flat(slots) => slots.get_mut(i)?.get_mut::<T>(),
            TupleRepr::View { .. } => None,
        }
    }

    /// A decorated tuple selecting `index` positions of this tuple, in
    /// order, sharing this tuple's storage.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::BadFormat`] if any index is out of bounds.
    pub fn view(&self, index: Vec<usize>) -> Result<Self, MeshError> {
        let len = self.len();
        if let Some(&bad) = index.iter().find(|&&i| i >= len) {
            return Err(MeshError::BadFormat(format!(
                "view index {bad} out of bounds for tuple of size {len}"
            )));
        }
        Ok(Self {
            repr: Arc::new(TupleRepr::View {
                base: self.repr.clone(),
                index,
            }),
        })
    }

    /// Iterates the slots in order.
    pub fn iter(&self) -> impl Iterator<Item = &TupleValue> {
        (0..self.len()).map(move |i| repr_slot(&self.repr, i))
    }

    /// Ensures `repr` is a uniquely-owned flat vector.
    fn materialize(&mut self) {
        let flat_and_unique =
            matches!(&*self.repr, TupleRepr::Flat(_)) && Arc::strong_count(&self.repr) == 1;
        if !flat_and_unique {
            let slots: Vec<TupleValue> = self.iter().cloned().collect();
            self.repr = Arc::new(TupleRepr::Flat(slots));
        }
    }
}

impl PartialEq for AnyTuple {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other.iter()).all(|(a, b)| a == b)
    }
}

impl fmt::Debug for AnyTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for slot in self.iter() {
            list.entry(&slot.meta().name());
        }
        list.finish()
    }
}

/// Dynamically built tuple storage.
///
/// The runtime equivalent of [`AnyTuple::make`]: deserializers that learn
/// slot types one at a time push values here and convert at the end.
#[derive(Default)]
pub struct ObjectArray {
    elements: Vec<TupleValue>,
}

impl ObjectArray {
    /// Empty array.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a slot.
    pub fn push_back(&mut self, value: TupleValue) {
        self.elements.push(value);
    }

    /// Number of slots so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// `true` when nothing has been pushed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl From<ObjectArray> for AnyTuple {
    fn from(array: ObjectArray) -> Self {
        Self::from_slots(array.elements)
    }
}

/// Conversion from native Rust tuples into [`AnyTuple`].
pub trait IntoAnyTuple {
    /// Erases the elements into tuple slots.
    fn into_any_tuple(self) -> AnyTuple;
}

macro_rules! impl_into_any_tuple {
    ($($name:ident),+) => {
        impl<$($name: TupleField),+> IntoAnyTuple for ($($name,)+) {
            fn into_any_tuple(self) -> AnyTuple {
                #[allow(non_snake_case)]
                let ($($name,)+) = self;
                AnyTuple::from_slots(vec![$(TupleValue::new($name)),+])
            }
        }
    };
}

impl_into_any_tuple!(A);
impl_into_any_tuple!(A, B);
impl_into_any_tuple!(A, B, C);
impl_into_any_tuple!(A, B, C, D);
