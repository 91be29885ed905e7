//! Data type tags for parameter values and array elements.

use std::fmt;

use serde::{Serialize, Serializer};

/// The kinds of scene object a device can create.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ObjectKind {
    Camera,
    Geometry,
    Material,
    Surface,
    Light,
    /// A set of surfaces placed into the world by instances.
    Group,
    Instance,
    World,
    Frame,
}

impl ObjectKind {
    /// Human readable kind name, also used as the default name prefix.
    pub fn name(self) -> &'static str {
        match self {
            ObjectKind::Camera => "Camera",
            ObjectKind::Geometry => "Geometry",
            ObjectKind::Material => "Material",
            ObjectKind::Surface => "Surface",
            ObjectKind::Light => "Light",
            ObjectKind::Group => "Group",
            ObjectKind::Instance => "Instance",
            ObjectKind::World => "World",
            ObjectKind::Frame => "Frame",
        }
    }

    /// The data type tag used when a handle of this kind is passed as a value.
    pub fn data_type(self) -> DataType {
        DataType::Object(self)
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Storage class of a single component of a data type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScalarKind {
    Bool,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    U8,
    Text,
    TypeTag,
    Handle,
}

/// Type tag carried by every parameter value and every array.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataType {
    Bool,
    Int32,
    Int32Vec2,
    Int32Vec3,
    Int32Vec4,
    UInt32,
    UInt32Vec2,
    UInt32Vec3,
    UInt32Vec4,
    Int64,
    UInt64,
    Float32,
    Float32Vec2,
    Float32Vec3,
    Float32Vec4,
    /// Quaternion with the real component last.
    Float32QuatIjkw,
    /// Column-major 4x4 matrix.
    Float32Mat4,
    Float64,
    Float64Vec3,
    /// Normalized 8-bit RGBA.
    UFixed8Vec4,
    String,
    /// A value that is itself a data type tag (e.g. a frame channel format).
    DataType,
    Array1D,
    Device,
    Object(ObjectKind),
}

impl DataType {
    /// Canonical upper-case name, e.g. `FLOAT32_VEC3`.
    pub fn name(self) -> &'static str {
        match self {
            DataType::Bool => "BOOL",
            DataType::Int32 => "INT32",
            DataType::Int32Vec2 => "INT32_VEC2",
            DataType::Int32Vec3 => "INT32_VEC3",
            DataType::Int32Vec4 => "INT32_VEC4",
            DataType::UInt32 => "UINT32",
            DataType::UInt32Vec2 => "UINT32_VEC2",
            DataType::UInt32Vec3 => "UINT32_VEC3",
            DataType::UInt32Vec4 => "UINT32_VEC4",
            DataType::Int64 => "INT64",
            DataType::UInt64 => "UINT64",
            DataType::Float32 => "FLOAT32",
            DataType::Float32Vec2 => "FLOAT32_VEC2",
            DataType::Float32Vec3 => "FLOAT32_VEC3",
            DataType::Float32Vec4 => "FLOAT32_VEC4",
            DataType::Float32QuatIjkw => "FLOAT32_QUAT_IJKW",
            DataType::Float32Mat4 => "FLOAT32_MAT4",
            DataType::Float64 => "FLOAT64",
            DataType::Float64Vec3 => "FLOAT64_VEC3",
            DataType::UFixed8Vec4 => "UFIXED8_VEC4",
            DataType::String => "STRING",
            DataType::DataType => "DATA_TYPE",
            DataType::Array1D => "ARRAY1D",
            DataType::Device => "DEVICE",
            DataType::Object(ObjectKind::Camera) => "CAMERA",
            DataType::Object(ObjectKind::Geometry) => "GEOMETRY",
            DataType::Object(ObjectKind::Material) => "MATERIAL",
            DataType::Object(ObjectKind::Surface) => "SURFACE",
            DataType::Object(ObjectKind::Light) => "LIGHT",
            DataType::Object(ObjectKind::Group) => "GROUP",
            DataType::Object(ObjectKind::Instance) => "INSTANCE",
            DataType::Object(ObjectKind::World) => "WORLD",
            DataType::Object(ObjectKind::Frame) => "FRAME",
        }
    }

    /// Number of components per element.
    pub fn components(self) -> usize {
        match self {
            DataType::Int32Vec2 | DataType::UInt32Vec2 | DataType::Float32Vec2 => 2,
            DataType::Int32Vec3 | DataType::UInt32Vec3 | DataType::Float32Vec3 | DataType::Float64Vec3 => 3,
            DataType::Int32Vec4
            | DataType::UInt32Vec4
            | DataType::Float32Vec4
            | DataType::Float32QuatIjkw
            | DataType::UFixed8Vec4 => 4,
            DataType::Float32Mat4 => 16,
            _ => 1,
        }
    }

    /// Storage class of each component.
    pub fn scalar(self) -> ScalarKind {
        match self {
            DataType::Bool => ScalarKind::Bool,
            DataType::Int32 | DataType::Int32Vec2 | DataType::Int32Vec3 | DataType::Int32Vec4 => ScalarKind::I32,
            DataType::UInt32 | DataType::UInt32Vec2 | DataType::UInt32Vec3 | DataType::UInt32Vec4 => {
                ScalarKind::U32
            }
            DataType::Int64 => ScalarKind::I64,
            DataType::UInt64 => ScalarKind::U64,
            DataType::Float32
            | DataType::Float32Vec2
            | DataType::Float32Vec3
            | DataType::Float32Vec4
            | DataType::Float32QuatIjkw
            | DataType::Float32Mat4 => ScalarKind::F32,
            DataType::Float64 | DataType::Float64Vec3 => ScalarKind::F64,
            DataType::UFixed8Vec4 => ScalarKind::U8,
            DataType::String => ScalarKind::Text,
            DataType::DataType => ScalarKind::TypeTag,
            DataType::Array1D | DataType::Device | DataType::Object(_) => ScalarKind::Handle,
        }
    }

    /// Whether a 1-D array may be created with this element type.
    pub fn is_array_element(self) -> bool {
        match self.scalar() {
            ScalarKind::I32
            | ScalarKind::U32
            | ScalarKind::I64
            | ScalarKind::U64
            | ScalarKind::F32
            | ScalarKind::F64
            | ScalarKind::U8 => true,
            ScalarKind::Handle => self.object_kind().is_some(),
            ScalarKind::Bool | ScalarKind::Text | ScalarKind::TypeTag => false,
        }
    }

    /// Whether elements of this type are integers usable as indices.
    pub fn is_integer(self) -> bool {
        matches!(
            self.scalar(),
            ScalarKind::I32 | ScalarKind::U32 | ScalarKind::I64 | ScalarKind::U64
        )
    }

    /// The object kind referenced by this type, if it is an object type.
    pub fn object_kind(self) -> Option<ObjectKind> {
        match self {
            DataType::Object(kind) => Some(kind),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for DataType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// Render a list of accepted types as `A|B|C` for diagnostics.
pub(crate) fn type_list(types: &[DataType]) -> String {
    types.iter().map(|t| t.name()).collect::<Vec<_>>().join("|")
}
