//! Typed parameter values.

use glam::{Mat4, Quat, UVec2, Vec2, Vec3, Vec4};
use serde::Serialize;

use crate::handle::{ArrayHandle, ObjectHandle};
use crate::types::{DataType, ObjectKind};

/// A non-owning reference to another scene object, tagged with the kind the
/// caller declared for it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ObjectRef {
    pub kind: ObjectKind,
    pub handle: ObjectHandle,
}

/// A value stored in a parameter table.
///
/// The variant is the declared type tag; it is only checked against the
/// object's schema at commit time.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum ParamValue {
    Bool(bool),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    /// Quaternion, serialized in IJKW order.
    Quat(Quat),
    Mat4(Mat4),
    UVec2(UVec2),
    String(String),
    DataType(DataType),
    Array(ArrayHandle),
    Object(ObjectRef),
}

impl ParamValue {
    /// The type tag of this value.
    pub fn data_type(&self) -> DataType {
        match self {
            ParamValue::Bool(_) => DataType::Bool,
            ParamValue::Int32(_) => DataType::Int32,
            ParamValue::UInt32(_) => DataType::UInt32,
            ParamValue::Int64(_) => DataType::Int64,
            ParamValue::UInt64(_) => DataType::UInt64,
            ParamValue::Float32(_) => DataType::Float32,
            ParamValue::Float64(_) => DataType::Float64,
            ParamValue::Vec2(_) => DataType::Float32Vec2,
            ParamValue::Vec3(_) => DataType::Float32Vec3,
            ParamValue::Vec4(_) => DataType::Float32Vec4,
            ParamValue::Quat(_) => DataType::Float32QuatIjkw,
            ParamValue::Mat4(_) => DataType::Float32Mat4,
            ParamValue::UVec2(_) => DataType::UInt32Vec2,
            ParamValue::String(_) => DataType::String,
            ParamValue::DataType(_) => DataType::DataType,
            ParamValue::Array(_) => DataType::Array1D,
            ParamValue::Object(r) => r.kind.data_type(),
        }
    }

    /// Reference to an object of the given kind.
    pub fn object(kind: ObjectKind, handle: ObjectHandle) -> Self {
        ParamValue::Object(ObjectRef { kind, handle })
    }

    pub fn camera(handle: ObjectHandle) -> Self {
        Self::object(ObjectKind::Camera, handle)
    }

    pub fn geometry(handle: ObjectHandle) -> Self {
        Self::object(ObjectKind::Geometry, handle)
    }

    pub fn material(handle: ObjectHandle) -> Self {
        Self::object(ObjectKind::Material, handle)
    }

    pub fn surface(handle: ObjectHandle) -> Self {
        Self::object(ObjectKind::Surface, handle)
    }

    pub fn light(handle: ObjectHandle) -> Self {
        Self::object(ObjectKind::Light, handle)
    }

    pub fn group(handle: ObjectHandle) -> Self {
        Self::object(ObjectKind::Group, handle)
    }

    pub fn instance(handle: ObjectHandle) -> Self {
        Self::object(ObjectKind::Instance, handle)
    }

    pub fn world(handle: ObjectHandle) -> Self {
        Self::object(ObjectKind::World, handle)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer value, widened to i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int32(v) => Some(i64::from(*v)),
            ParamValue::UInt32(v) => Some(i64::from(*v)),
            ParamValue::Int64(v) => Some(*v),
            ParamValue::UInt64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            ParamValue::Float32(v) => Some(*v),
            ParamValue::Float64(v) => Some(*v as f32),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Float32(v) => Some(f64::from(*v)),
            ParamValue::Float64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vec3(&self) -> Option<Vec3> {
        match self {
            ParamValue::Vec3(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_mat4(&self) -> Option<Mat4> {
        match self {
            ParamValue::Mat4(m) => Some(*m),
            _ => None,
        }
    }

    pub fn as_uvec2(&self) -> Option<UVec2> {
        match self {
            ParamValue::UVec2(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<ArrayHandle> {
        match self {
            ParamValue::Array(h) => Some(*h),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<ObjectRef> {
        match self {
            ParamValue::Object(r) => Some(*r),
            _ => None,
        }
    }
}

macro_rules! impl_from_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for ParamValue {
                fn from(v: $ty) -> Self {
                    ParamValue::$variant(v)
                }
            }
        )*
    };
}

impl_from_value!(
    bool => Bool,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
    Vec2 => Vec2,
    Vec3 => Vec3,
    Vec4 => Vec4,
    Quat => Quat,
    Mat4 => Mat4,
    UVec2 => UVec2,
    String => String,
    DataType => DataType,
    ArrayHandle => Array,
    ObjectRef => Object,
);

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::String(v.to_string())
    }
}

impl From<[f32; 3]> for ParamValue {
    fn from(v: [f32; 3]) -> Self {
        ParamValue::Vec3(Vec3::from_array(v))
    }
}

impl From<[u32; 2]> for ParamValue {
    fn from(v: [u32; 2]) -> Self {
        ParamValue::UVec2(UVec2::from_array(v))
    }
}
