//! Recognized parameters of every object subtype.
//!
//! A schema is a list of [`ParamSpec`] groups: the parameters shared by all
//! objects, those shared by a kind and those specific to one subtype.

use glam::{Mat4, UVec2, Vec3, Vec4};

use crate::types::{DataType, ObjectKind};
use crate::value::ParamValue;

/// Value used when a parameter is not set.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParamDefault {
    Bool(bool),
    Int(i32),
    Float(f32),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    UVec2([u32; 2]),
    /// Column-major matrix.
    Mat4([f32; 16]),
    Str(&'static str),
    DataType(DataType),
}

impl ParamDefault {
    pub fn to_value(self) -> ParamValue {
        match self {
            ParamDefault::Bool(b) => ParamValue::Bool(b),
            ParamDefault::Int(i) => ParamValue::Int32(i),
            ParamDefault::Float(f) => ParamValue::Float32(f),
            ParamDefault::Vec3(v) => ParamValue::Vec3(Vec3::from_array(v)),
            ParamDefault::Vec4(v) => ParamValue::Vec4(Vec4::from_array(v)),
            ParamDefault::UVec2(v) => ParamValue::UVec2(UVec2::from_array(v)),
            ParamDefault::Mat4(m) => ParamValue::Mat4(Mat4::from_cols_array(&m)),
            ParamDefault::Str(s) => ParamValue::String(s.to_string()),
            ParamDefault::DataType(t) => ParamValue::DataType(t),
        }
    }
}

/// Constraint on a parameter's value, checked at commit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ValueRule {
    Any,
    /// Strictly greater than zero.
    Positive,
    NonNegative,
    /// Inside `[0, 1]`.
    UnitInterval,
    /// Inside the open interval `(min, max)`.
    Between(f32, f32),
    AtLeast(f32),
    /// Vector with a non-zero length.
    NonZero,
    /// Every component strictly greater than zero.
    PositiveComponents,
    /// One of a fixed set of strings.
    OneOf(&'static [&'static str]),
}

impl ValueRule {
    /// Check `value`; returns a description of the violated constraint.
    ///
    /// Values of a type the rule does not apply to pass, e.g. a material
    /// `color` given as an attribute name.
    pub fn check(self, value: &ParamValue) -> Result<(), String> {
        let ok = match self {
            ValueRule::Any => true,
            ValueRule::Positive => value.as_f64().is_none_or(|v| v > 0.0),
            ValueRule::NonNegative => value.as_f64().is_none_or(|v| v >= 0.0),
            ValueRule::UnitInterval => value.as_f64().is_none_or(|v| (0.0..=1.0).contains(&v)),
            ValueRule::Between(min, max) => value
                .as_f64()
                .is_none_or(|v| v > f64::from(min) && v < f64::from(max)),
            ValueRule::AtLeast(min) => value.as_f64().is_none_or(|v| v >= f64::from(min)),
            ValueRule::NonZero => value.as_vec3().is_none_or(|v| v.length_squared() > 0.0),
            ValueRule::PositiveComponents => value.as_uvec2().is_none_or(|v| v.x > 0 && v.y > 0),
            ValueRule::OneOf(allowed) => value.as_str().is_none_or(|s| allowed.contains(&s)),
        };
        if ok {
            Ok(())
        } else {
            Err(self.describe())
        }
    }

    fn describe(self) -> String {
        match self {
            ValueRule::Any => "any value".to_string(),
            ValueRule::Positive => "must be greater than 0".to_string(),
            ValueRule::NonNegative => "must not be negative".to_string(),
            ValueRule::UnitInterval => "must be within [0, 1]".to_string(),
            ValueRule::Between(min, max) => format!("must be within ({}, {})", min, max),
            ValueRule::AtLeast(min) => format!("must be at least {}", min),
            ValueRule::NonZero => "must have non-zero length".to_string(),
            ValueRule::PositiveComponents => "every component must be greater than 0".to_string(),
            ValueRule::OneOf(allowed) => format!("must be one of {}", allowed.join(", ")),
        }
    }
}

/// One recognized parameter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    /// Accepted value types.
    pub types: &'static [DataType],
    /// Accepted element types when the value is an array.
    pub elements: &'static [DataType],
    pub required: bool,
    pub default: Option<ParamDefault>,
    pub rule: ValueRule,
}

impl ParamSpec {
    const fn value(name: &'static str, types: &'static [DataType]) -> Self {
        Self {
            name,
            types,
            elements: &[],
            required: false,
            default: None,
            rule: ValueRule::Any,
        }
    }

    const fn array(name: &'static str, elements: &'static [DataType]) -> Self {
        Self {
            name,
            types: &[DataType::Array1D],
            elements,
            required: false,
            default: None,
            rule: ValueRule::Any,
        }
    }

    const fn required(self) -> Self {
        Self { required: true, ..self }
    }

    const fn default(self, default: ParamDefault) -> Self {
        Self {
            default: Some(default),
            ..self
        }
    }

    const fn rule(self, rule: ValueRule) -> Self {
        Self { rule, ..self }
    }

    pub fn accepts(&self, data_type: DataType) -> bool {
        self.types.contains(&data_type)
    }

    pub fn accepts_element(&self, data_type: DataType) -> bool {
        self.elements.contains(&data_type)
    }

    /// Whether the value is an array whose arity follows the vertex count.
    pub fn is_vertex_array(&self) -> bool {
        self.name.starts_with("vertex.")
    }

    /// Whether the value is a per-primitive array other than the index.
    pub fn is_primitive_array(&self) -> bool {
        self.name.starts_with("primitive.") && self.name != INDEX
    }
}

/// Parameters of one object subtype.
#[derive(Debug)]
pub struct Schema {
    groups: &'static [&'static [ParamSpec]],
}

impl Schema {
    pub fn find(&self, name: &str) -> Option<&'static ParamSpec> {
        self.iter().find(|spec| spec.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static ParamSpec> {
        self.groups.iter().flat_map(|group| group.iter())
    }
}

pub(crate) const POSITION: &str = "vertex.position";
pub(crate) const INDEX: &str = "primitive.index";
pub(crate) const TIME: &str = "usd::time";
pub(crate) const TIME_VARYING: &str = "usd::timeVarying";
pub(crate) const TRANSFORM: &str = "transform";

const SCALAR_INDEX: &[DataType] = &[DataType::UInt32, DataType::Int32, DataType::UInt64, DataType::Int64];
const COLOR_ELEMENTS: &[DataType] = &[DataType::Float32Vec3, DataType::Float32Vec4, DataType::UFixed8Vec4];
const POSITION_ELEMENTS: &[DataType] = &[DataType::Float32Vec3, DataType::Float64Vec3];
const REAL: &[DataType] = &[DataType::Float32, DataType::Float64];
const VEC3: &[DataType] = &[DataType::Float32Vec3];
const VEC3_OR_NAME: &[DataType] = &[DataType::Float32Vec3, DataType::String];
const FLOAT_OR_NAME: &[DataType] = &[DataType::Float32, DataType::String];
const FLOAT: &[DataType] = &[DataType::Float32];
const TEXT: &[DataType] = &[DataType::String];
const INT: &[DataType] = &[DataType::Int32];

/// Every attribute varies over time.
const ALL_VARYING: ParamDefault = ParamDefault::Int(-1);
const IDENTITY: [f32; 16] = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

const ALPHA_MODES: &[&str] = &["opaque", "blend", "mask"];
const GLYPH_SHAPES: &[&str] = &["sphere", "cylinder", "cone"];

const COMMON: &[ParamSpec] = &[ParamSpec::value("name", TEXT)];

const CAMERA: &[ParamSpec] = &[
    ParamSpec::value("position", VEC3).default(ParamDefault::Vec3([0.0, 0.0, 0.0])),
    ParamSpec::value("direction", VEC3)
        .default(ParamDefault::Vec3([0.0, 0.0, -1.0]))
        .rule(ValueRule::NonZero),
    ParamSpec::value("up", VEC3)
        .default(ParamDefault::Vec3([0.0, 1.0, 0.0]))
        .rule(ValueRule::NonZero),
    ParamSpec::value("aspect", FLOAT)
        .default(ParamDefault::Float(1.0))
        .rule(ValueRule::Positive),
    ParamSpec::value("near", FLOAT)
        .default(ParamDefault::Float(1.0))
        .rule(ValueRule::NonNegative),
    ParamSpec::value("far", FLOAT)
        .default(ParamDefault::Float(10000.0))
        .rule(ValueRule::Positive),
    ParamSpec::value("imageRegion", &[DataType::Float32Vec4]).default(ParamDefault::Vec4([0.0, 0.0, 1.0, 1.0])),
];

const PERSPECTIVE: &[ParamSpec] = &[ParamSpec::value("fovy", FLOAT)
    .default(ParamDefault::Float(std::f32::consts::FRAC_PI_3))
    .rule(ValueRule::Between(0.0, std::f32::consts::PI))];

const ORTHOGRAPHIC: &[ParamSpec] = &[ParamSpec::value("height", FLOAT)
    .default(ParamDefault::Float(1.0))
    .rule(ValueRule::Positive)];

const GEOMETRY: &[ParamSpec] = &[
    ParamSpec::value(TIME, &[DataType::Float64]),
    ParamSpec::value(TIME_VARYING, INT).default(ALL_VARYING),
    ParamSpec::array(POSITION, POSITION_ELEMENTS).required(),
    ParamSpec::array("vertex.color", COLOR_ELEMENTS),
    ParamSpec::array("primitive.color", COLOR_ELEMENTS),
    ParamSpec::array("primitive.id", SCALAR_INDEX),
];

const GLYPH: &[ParamSpec] = &[
    ParamSpec::array(INDEX, SCALAR_INDEX),
    ParamSpec::value("shapeType", TEXT)
        .default(ParamDefault::Str("sphere"))
        .rule(ValueRule::OneOf(GLYPH_SHAPES)),
    ParamSpec::array("vertex.orientation", &[DataType::Float32QuatIjkw, DataType::Float32Vec4]),
    ParamSpec::array("vertex.scale", &[DataType::Float32, DataType::Float32Vec3]),
];

const RADIUS: &[ParamSpec] = &[
    ParamSpec::array("vertex.radius", REAL),
    ParamSpec::value("radius", FLOAT)
        .default(ParamDefault::Float(1.0))
        .rule(ValueRule::Positive),
];

const SPHERE: &[ParamSpec] = &[ParamSpec::array(INDEX, SCALAR_INDEX)];

const SEGMENT: &[ParamSpec] = &[ParamSpec::array(INDEX, &[DataType::UInt32Vec2, DataType::Int32Vec2])];

const TRIANGLE: &[ParamSpec] = &[
    ParamSpec::array(INDEX, &[DataType::UInt32Vec3, DataType::Int32Vec3]),
    ParamSpec::array("vertex.normal", POSITION_ELEMENTS),
];

const QUAD: &[ParamSpec] = &[
    ParamSpec::array(INDEX, &[DataType::UInt32Vec4, DataType::Int32Vec4]),
    ParamSpec::array("vertex.normal", POSITION_ELEMENTS),
];

const MATERIAL: &[ParamSpec] = &[
    ParamSpec::value(TIME, &[DataType::Float64]),
    ParamSpec::value(TIME_VARYING, INT).default(ParamDefault::Int(0)),
    ParamSpec::value("opacity", FLOAT_OR_NAME)
        .default(ParamDefault::Float(1.0))
        .rule(ValueRule::UnitInterval),
    ParamSpec::value("alphaMode", TEXT)
        .default(ParamDefault::Str("opaque"))
        .rule(ValueRule::OneOf(ALPHA_MODES)),
    ParamSpec::value("alphaCutoff", FLOAT)
        .default(ParamDefault::Float(0.5))
        .rule(ValueRule::UnitInterval),
];

const MATTE: &[ParamSpec] = &[ParamSpec::value("color", VEC3_OR_NAME).default(ParamDefault::Vec3([0.8, 0.8, 0.8]))];

const PHYSICALLY_BASED: &[ParamSpec] = &[
    ParamSpec::value("baseColor", VEC3_OR_NAME).default(ParamDefault::Vec3([1.0, 1.0, 1.0])),
    ParamSpec::value("metallic", FLOAT_OR_NAME)
        .default(ParamDefault::Float(1.0))
        .rule(ValueRule::UnitInterval),
    ParamSpec::value("roughness", FLOAT_OR_NAME)
        .default(ParamDefault::Float(1.0))
        .rule(ValueRule::UnitInterval),
    ParamSpec::value("emissive", VEC3_OR_NAME).default(ParamDefault::Vec3([0.0, 0.0, 0.0])),
    ParamSpec::value("ior", FLOAT)
        .default(ParamDefault::Float(1.5))
        .rule(ValueRule::AtLeast(1.0)),
];

const SURFACE: &[ParamSpec] = &[
    ParamSpec::value("geometry", &[DataType::Object(ObjectKind::Geometry)]).required(),
    ParamSpec::value("material", &[DataType::Object(ObjectKind::Material)]).required(),
];

const LIGHT: &[ParamSpec] = &[
    ParamSpec::value(TIME_VARYING, INT).default(ALL_VARYING),
    ParamSpec::value("color", VEC3).default(ParamDefault::Vec3([1.0, 1.0, 1.0])),
];

const DIRECTIONAL: &[ParamSpec] = &[
    ParamSpec::value("direction", VEC3)
        .default(ParamDefault::Vec3([0.0, 0.0, -1.0]))
        .rule(ValueRule::NonZero),
    ParamSpec::value("irradiance", FLOAT)
        .default(ParamDefault::Float(1.0))
        .rule(ValueRule::NonNegative),
];

const POINT: &[ParamSpec] = &[
    ParamSpec::value("position", VEC3).default(ParamDefault::Vec3([0.0, 0.0, 0.0])),
    ParamSpec::value("intensity", FLOAT)
        .default(ParamDefault::Float(1.0))
        .rule(ValueRule::NonNegative),
    ParamSpec::value("power", FLOAT).rule(ValueRule::NonNegative),
];

const GROUP: &[ParamSpec] = &[
    ParamSpec::value(TIME_VARYING, INT).default(ALL_VARYING),
    ParamSpec::array("surface", &[DataType::Object(ObjectKind::Surface)]),
];

const INSTANCE: &[ParamSpec] = &[
    ParamSpec::value(TIME_VARYING, INT).default(ALL_VARYING),
    ParamSpec::value("group", &[DataType::Object(ObjectKind::Group)]).required(),
    ParamSpec::value(TRANSFORM, &[DataType::Float32Mat4]).default(ParamDefault::Mat4(IDENTITY)),
];

const WORLD: &[ParamSpec] = &[
    ParamSpec::value(TIME_VARYING, INT).default(ALL_VARYING),
    ParamSpec::array("instance", &[DataType::Object(ObjectKind::Instance)]),
    ParamSpec::array("surface", &[DataType::Object(ObjectKind::Surface)]),
    ParamSpec::array("light", &[DataType::Object(ObjectKind::Light)]),
];

const FRAME: &[ParamSpec] = &[
    ParamSpec::value("world", &[DataType::Object(ObjectKind::World)]).required(),
    ParamSpec::value("camera", &[DataType::Object(ObjectKind::Camera)]),
    ParamSpec::value("size", &[DataType::UInt32Vec2])
        .default(ParamDefault::UVec2([1024, 768]))
        .rule(ValueRule::PositiveComponents),
    ParamSpec::value("channel.color", &[DataType::DataType]).default(ParamDefault::DataType(DataType::UFixed8Vec4)),
];

pub(crate) static PERSPECTIVE_SCHEMA: Schema = Schema {
    groups: &[COMMON, CAMERA, PERSPECTIVE],
};
pub(crate) static ORTHOGRAPHIC_SCHEMA: Schema = Schema {
    groups: &[COMMON, CAMERA, ORTHOGRAPHIC],
};
pub(crate) static GLYPH_SCHEMA: Schema = Schema {
    groups: &[COMMON, GEOMETRY, GLYPH],
};
pub(crate) static SPHERE_SCHEMA: Schema = Schema {
    groups: &[COMMON, GEOMETRY, SPHERE, RADIUS],
};
pub(crate) static SEGMENT_SCHEMA: Schema = Schema {
    groups: &[COMMON, GEOMETRY, SEGMENT, RADIUS],
};
pub(crate) static TRIANGLE_SCHEMA: Schema = Schema {
    groups: &[COMMON, GEOMETRY, TRIANGLE],
};
pub(crate) static QUAD_SCHEMA: Schema = Schema {
    groups: &[COMMON, GEOMETRY, QUAD],
};
pub(crate) static MATTE_SCHEMA: Schema = Schema {
    groups: &[COMMON, MATERIAL, MATTE],
};
pub(crate) static PHYSICALLY_BASED_SCHEMA: Schema = Schema {
    groups: &[COMMON, MATERIAL, PHYSICALLY_BASED],
};
pub(crate) static SURFACE_SCHEMA: Schema = Schema {
    groups: &[COMMON, SURFACE],
};
pub(crate) static DIRECTIONAL_SCHEMA: Schema = Schema {
    groups: &[COMMON, LIGHT, DIRECTIONAL],
};
pub(crate) static POINT_SCHEMA: Schema = Schema {
    groups: &[COMMON, LIGHT, POINT],
};
pub(crate) static GROUP_SCHEMA: Schema = Schema {
    groups: &[COMMON, GROUP],
};
pub(crate) static INSTANCE_SCHEMA: Schema = Schema {
    groups: &[COMMON, INSTANCE],
};
pub(crate) static WORLD_SCHEMA: Schema = Schema {
    groups: &[COMMON, WORLD],
};
pub(crate) static FRAME_SCHEMA: Schema = Schema {
    groups: &[COMMON, FRAME],
};
