//! Device-owned, reference-counted data arrays.
//!
//! Arrays are immutable once created. Two counters keep an array alive:
//! client references (creation plus `retain`, dropped by `release`) and
//! parameter references (one per staged or committed parameter slot that
//! points at the array). The slot is removed when both reach zero. The
//! buffer itself lives in an `Arc<ArrayData>`, so a render snapshot taken
//! before the last reference went away keeps reading valid memory.
//!
//! The optional deleter runs exactly once. Under the copy policy that is
//! right after the copy is taken; under zero-copy it is when the last
//! holder of the shared buffer lets go.

use std::fmt;
use std::sync::Arc;

use glam::{Quat, Vec3, Vec4};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use slotmap::SlotMap;
use thiserror::Error;

use crate::handle::{ArrayHandle, ObjectHandle};
use crate::types::{DataType, ObjectKind, ScalarKind};

/// Errors from array creation and lookup.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ArrayError {
    #[error("array element count must be greater than zero")]
    ZeroCount,

    #[error("{0} is not a valid array element type")]
    UnsupportedElementType(DataType),

    #[error("source data does not match element type {0}")]
    ComponentMismatch(DataType),

    #[error("{count} elements of {element_type} exceed addressable memory")]
    TooLarge { element_type: DataType, count: usize },

    #[error("source holds {found} components, expected {expected}")]
    LengthMismatch { expected: usize, found: usize },

    #[error("element {index} refers to a destroyed object")]
    StaleElement { index: usize },

    #[error("element {index} is a {found}, expected {expected}")]
    ElementKindMismatch {
        index: usize,
        expected: ObjectKind,
        found: ObjectKind,
    },

    #[error("array handle {0:?} was already released")]
    Released(ArrayHandle),
}

/// Whether caller memory is copied or shared when an array is created.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ArrayMemoryPolicy {
    #[default]
    Copy,
    ZeroCopy,
}

/// Flat component storage of an array.
#[derive(Clone, Debug, PartialEq)]
pub enum ArrayComponents {
    F32(Arc<[f32]>),
    F64(Arc<[f64]>),
    I32(Arc<[i32]>),
    U32(Arc<[u32]>),
    I64(Arc<[i64]>),
    U64(Arc<[u64]>),
    U8(Arc<[u8]>),
    Handles(Arc<[ObjectHandle]>),
}

impl ArrayComponents {
    /// Number of scalar components.
    pub fn len(&self) -> usize {
        match self {
            ArrayComponents::F32(v) => v.len(),
            ArrayComponents::F64(v) => v.len(),
            ArrayComponents::I32(v) => v.len(),
            ArrayComponents::U32(v) => v.len(),
            ArrayComponents::I64(v) => v.len(),
            ArrayComponents::U64(v) => v.len(),
            ArrayComponents::U8(v) => v.len(),
            ArrayComponents::Handles(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn scalar(&self) -> ScalarKind {
        match self {
            ArrayComponents::F32(_) => ScalarKind::F32,
            ArrayComponents::F64(_) => ScalarKind::F64,
            ArrayComponents::I32(_) => ScalarKind::I32,
            ArrayComponents::U32(_) => ScalarKind::U32,
            ArrayComponents::I64(_) => ScalarKind::I64,
            ArrayComponents::U64(_) => ScalarKind::U64,
            ArrayComponents::U8(_) => ScalarKind::U8,
            ArrayComponents::Handles(_) => ScalarKind::Handle,
        }
    }

    /// Copy into freshly allocated storage, detaching from the caller's buffer.
    fn deep_copy(&self) -> Self {
        match self {
            ArrayComponents::F32(v) => ArrayComponents::F32(Arc::from(&v[..])),
            ArrayComponents::F64(v) => ArrayComponents::F64(Arc::from(&v[..])),
            ArrayComponents::I32(v) => ArrayComponents::I32(Arc::from(&v[..])),
            ArrayComponents::U32(v) => ArrayComponents::U32(Arc::from(&v[..])),
            ArrayComponents::I64(v) => ArrayComponents::I64(Arc::from(&v[..])),
            ArrayComponents::U64(v) => ArrayComponents::U64(Arc::from(&v[..])),
            ArrayComponents::U8(v) => ArrayComponents::U8(Arc::from(&v[..])),
            ArrayComponents::Handles(v) => ArrayComponents::Handles(Arc::from(&v[..])),
        }
    }
}

type Deleter = Box<dyn FnOnce() + Send + Sync>;

/// Caller-provided memory for a new array.
pub struct ArraySource {
    components: ArrayComponents,
    deleter: Option<Deleter>,
}

impl ArraySource {
    pub fn new(components: ArrayComponents) -> Self {
        Self {
            components,
            deleter: None,
        }
    }

    /// Run `deleter` once the device frees the array's buffer.
    pub fn with_deleter(mut self, deleter: impl FnOnce() + Send + Sync + 'static) -> Self {
        self.deleter = Some(Box::new(deleter));
        self
    }

    pub fn components(&self) -> &ArrayComponents {
        &self.components
    }
}

impl fmt::Debug for ArraySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArraySource")
            .field("components", &self.components.len())
            .field("deleter", &self.deleter.is_some())
            .finish()
    }
}

macro_rules! impl_array_source {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<Vec<$ty>> for ArraySource {
                fn from(v: Vec<$ty>) -> Self {
                    ArraySource::new(ArrayComponents::$variant(Arc::from(v)))
                }
            }

            impl From<&[$ty]> for ArraySource {
                fn from(v: &[$ty]) -> Self {
                    ArraySource::new(ArrayComponents::$variant(Arc::from(v)))
                }
            }

            impl From<Arc<[$ty]>> for ArraySource {
                fn from(v: Arc<[$ty]>) -> Self {
                    ArraySource::new(ArrayComponents::$variant(v))
                }
            }
        )*
    };
}

impl_array_source!(
    f32 => F32,
    f64 => F64,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    u8 => U8,
    ObjectHandle => Handles,
);

macro_rules! impl_glam_array_source {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<&[$ty]> for ArraySource {
                fn from(v: &[$ty]) -> Self {
                    let flat: &[f32] = bytemuck::cast_slice(v);
                    ArraySource::from(flat)
                }
            }

            impl From<Vec<$ty>> for ArraySource {
                fn from(v: Vec<$ty>) -> Self {
                    ArraySource::from(v.as_slice())
                }
            }
        )*
    };
}

impl_glam_array_source!(Vec3, Vec4, Quat);

/// The immutable contents of an array.
pub struct ArrayData {
    element_type: DataType,
    count: usize,
    components: ArrayComponents,
    deleter: Option<Deleter>,
}

impl ArrayData {
    pub fn element_type(&self) -> DataType {
        self.element_type
    }

    /// Number of elements (not components).
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn components(&self) -> &ArrayComponents {
        &self.components
    }

    /// Handles of an object array.
    pub fn handles(&self) -> Option<&[ObjectHandle]> {
        match &self.components {
            ArrayComponents::Handles(v) => Some(v),
            _ => None,
        }
    }

    /// Component at flat position `flat`, as f64.
    pub fn real_component(&self, flat: usize) -> Option<f64> {
        match &self.components {
            ArrayComponents::F32(v) => v.get(flat).map(|x| f64::from(*x)),
            ArrayComponents::F64(v) => v.get(flat).copied(),
            ArrayComponents::U8(v) => v.get(flat).map(|x| f64::from(*x) / 255.0),
            _ => None,
        }
    }

    /// Component at flat position `flat`, for integer arrays.
    pub fn integer_component(&self, flat: usize) -> Option<i128> {
        match &self.components {
            ArrayComponents::I32(v) => v.get(flat).map(|x| i128::from(*x)),
            ArrayComponents::U32(v) => v.get(flat).map(|x| i128::from(*x)),
            ArrayComponents::I64(v) => v.get(flat).map(|x| i128::from(*x)),
            ArrayComponents::U64(v) => v.get(flat).map(|x| i128::from(*x)),
            _ => None,
        }
    }

    /// Scalar element `index` of a single-component real array.
    pub fn scalar_at(&self, index: usize) -> Option<f32> {
        if self.element_type.components() != 1 {
            return None;
        }
        self.real_component(index).map(|x| x as f32)
    }

    /// Element `index` of a three-component real array.
    pub fn vec3_at(&self, index: usize) -> Option<Vec3> {
        if self.element_type.components() != 3 {
            return None;
        }
        let base = index * 3;
        Some(Vec3::new(
            self.real_component(base)? as f32,
            self.real_component(base + 1)? as f32,
            self.real_component(base + 2)? as f32,
        ))
    }

    /// Element `index` of a four-component real array.
    pub fn vec4_at(&self, index: usize) -> Option<Vec4> {
        if self.element_type.components() != 4 {
            return None;
        }
        let base = index * 4;
        Some(Vec4::new(
            self.real_component(base)? as f32,
            self.real_component(base + 1)? as f32,
            self.real_component(base + 2)? as f32,
            self.real_component(base + 3)? as f32,
        ))
    }
}

impl Drop for ArrayData {
    fn drop(&mut self) {
        if let Some(deleter) = self.deleter.take() {
            deleter();
        }
    }
}

impl fmt::Debug for ArrayData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayData")
            .field("element_type", &self.element_type)
            .field("count", &self.count)
            .finish()
    }
}

impl PartialEq for ArrayData {
    fn eq(&self, other: &Self) -> bool {
        self.element_type == other.element_type
            && self.count == other.count
            && self.components == other.components
    }
}

impl Serialize for ArrayData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("ArrayData", 3)?;
        s.serialize_field("type", &self.element_type)?;
        s.serialize_field("count", &self.count)?;
        match &self.components {
            ArrayComponents::F32(v) => s.serialize_field("data", &v[..])?,
            ArrayComponents::F64(v) => s.serialize_field("data", &v[..])?,
            ArrayComponents::I32(v) => s.serialize_field("data", &v[..])?,
            ArrayComponents::U32(v) => s.serialize_field("data", &v[..])?,
            ArrayComponents::I64(v) => s.serialize_field("data", &v[..])?,
            ArrayComponents::U64(v) => s.serialize_field("data", &v[..])?,
            ArrayComponents::U8(v) => s.serialize_field("data", &v[..])?,
            ArrayComponents::Handles(v) => s.serialize_field("data", &v[..])?,
        }
        s.end()
    }
}

struct ArraySlot {
    data: Arc<ArrayData>,
    client_refs: u32,
    param_refs: u32,
}

/// Owner of every array created on a device.
pub struct ArrayStore {
    slots: SlotMap<ArrayHandle, ArraySlot>,
    policy: ArrayMemoryPolicy,
}

impl Default for ArrayStore {
    fn default() -> Self {
        Self::new(ArrayMemoryPolicy::default())
    }
}

impl ArrayStore {
    pub fn new(policy: ArrayMemoryPolicy) -> Self {
        Self {
            slots: SlotMap::with_key(),
            policy,
        }
    }

    pub fn set_policy(&mut self, policy: ArrayMemoryPolicy) {
        self.policy = policy;
    }

    /// Create a 1-D array holding one client reference.
    ///
    /// `object_kind` resolves the kind of a live object handle; it is used
    /// to check the elements of object arrays.
    pub fn create(
        &mut self,
        element_type: DataType,
        count: usize,
        source: ArraySource,
        object_kind: impl Fn(ObjectHandle) -> Option<ObjectKind>,
    ) -> Result<ArrayHandle, ArrayError> {
        if count == 0 {
            return Err(ArrayError::ZeroCount);
        }
        if !element_type.is_array_element() {
            return Err(ArrayError::UnsupportedElementType(element_type));
        }
        if source.components.scalar() != element_type.scalar() {
            return Err(ArrayError::ComponentMismatch(element_type));
        }
        let expected = count
            .checked_mul(element_type.components())
            .ok_or(ArrayError::TooLarge { element_type, count })?;
        if source.components.len() != expected {
            return Err(ArrayError::LengthMismatch {
                expected,
                found: source.components.len(),
            });
        }

        if let (Some(expected_kind), ArrayComponents::Handles(handles)) =
            (element_type.object_kind(), &source.components)
        {
            for (index, handle) in handles.iter().enumerate() {
                match object_kind(*handle) {
                    None => return Err(ArrayError::StaleElement { index }),
                    Some(found) if found != expected_kind => {
                        return Err(ArrayError::ElementKindMismatch {
                            index,
                            expected: expected_kind,
                            found,
                        })
                    }
                    Some(_) => {}
                }
            }
        }

        let ArraySource { components, deleter } = source;
        let (components, deleter) = match self.policy {
            ArrayMemoryPolicy::Copy => {
                let copied = components.deep_copy();
                // The caller's buffer is no longer needed
                drop(components);
                if let Some(deleter) = deleter {
                    deleter();
                }
                (copied, None)
            }
            ArrayMemoryPolicy::ZeroCopy => (components, deleter),
        };

        let data = Arc::new(ArrayData {
            element_type,
            count,
            components,
            deleter,
        });
        let handle = self.slots.insert(ArraySlot {
            data,
            client_refs: 1,
            param_refs: 0,
        });
        log::debug!("Created {} array {:?} with {} elements", element_type, handle, count);
        Ok(handle)
    }

    /// Client-side lookup; fails once the client released every reference.
    pub fn get(&self, handle: ArrayHandle) -> Result<&Arc<ArrayData>, ArrayError> {
        match self.slots.get(handle) {
            Some(slot) if slot.client_refs > 0 => Ok(&slot.data),
            _ => Err(ArrayError::Released(handle)),
        }
    }

    /// Lookup on behalf of a parameter that holds a reference.
    pub fn resolve(&self, handle: ArrayHandle) -> Option<&Arc<ArrayData>> {
        self.slots.get(handle).map(|slot| &slot.data)
    }

    /// Add a client reference.
    pub fn retain(&mut self, handle: ArrayHandle) -> Result<(), ArrayError> {
        match self.slots.get_mut(handle) {
            Some(slot) if slot.client_refs > 0 => {
                slot.client_refs += 1;
                Ok(())
            }
            _ => Err(ArrayError::Released(handle)),
        }
    }

    /// Drop a client reference.
    pub fn release(&mut self, handle: ArrayHandle) -> Result<(), ArrayError> {
        match self.slots.get_mut(handle) {
            Some(slot) if slot.client_refs > 0 => {
                slot.client_refs -= 1;
                self.free_if_unreferenced(handle);
                Ok(())
            }
            _ => Err(ArrayError::Released(handle)),
        }
    }

    /// Add a parameter reference. Returns false if the array no longer exists.
    pub fn add_param_ref(&mut self, handle: ArrayHandle) -> bool {
        match self.slots.get_mut(handle) {
            Some(slot) => {
                slot.param_refs += 1;
                true
            }
            None => false,
        }
    }

    /// Drop a parameter reference.
    pub fn drop_param_ref(&mut self, handle: ArrayHandle) {
        if let Some(slot) = self.slots.get_mut(handle) {
            debug_assert!(slot.param_refs > 0);
            slot.param_refs = slot.param_refs.saturating_sub(1);
            self.free_if_unreferenced(handle);
        }
    }

    /// `(client, parameter)` reference counts of a live array.
    pub fn ref_counts(&self, handle: ArrayHandle) -> Option<(u32, u32)> {
        self.slots
            .get(handle)
            .map(|slot| (slot.client_refs, slot.param_refs))
    }

    /// Number of arrays currently held by the store.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Drop every array; returns the handles the client never released.
    pub fn clear(&mut self) -> Vec<ArrayHandle> {
        let leaked = self
            .slots
            .iter()
            .filter(|(_, slot)| slot.client_refs > 0)
            .map(|(handle, _)| handle)
            .collect();
        self.slots.clear();
        leaked
    }

    fn free_if_unreferenced(&mut self, handle: ArrayHandle) {
        let unreferenced = self
            .slots
            .get(handle)
            .is_some_and(|slot| slot.client_refs == 0 && slot.param_refs == 0);
        if unreferenced {
            self.slots.remove(handle);
            log::debug!("Freed array {:?}", handle);
        }
    }
}
