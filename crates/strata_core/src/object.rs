//! Scene object kinds, subtypes and per-object state.

use std::fmt;

use serde::Serialize;

use crate::params::{ObjectParams, ObjectState};
use crate::schema::{self, Schema};
use crate::types::ObjectKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum CameraType {
    Perspective,
    Orthographic,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum GeometryType {
    /// Instanced shapes, one per point.
    Glyph,
    Sphere,
    Cylinder,
    Cone,
    Triangle,
    Quad,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum MaterialType {
    Matte,
    PhysicallyBased,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum LightType {
    Directional,
    Point,
}

/// Concrete type of a scene object: its kind plus subtype.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ObjectType {
    Camera(CameraType),
    Geometry(GeometryType),
    Material(MaterialType),
    Surface,
    Light(LightType),
    Group,
    Instance,
    World,
    Frame,
}

impl ObjectType {
    /// Resolve a subtype name for `kind`.
    ///
    /// Kinds without subtypes only accept the empty string.
    pub fn parse(kind: ObjectKind, subtype: &str) -> Option<Self> {
        let ty = match (kind, subtype) {
            (ObjectKind::Camera, "perspective") => ObjectType::Camera(CameraType::Perspective),
            (ObjectKind::Camera, "orthographic") => ObjectType::Camera(CameraType::Orthographic),
            (ObjectKind::Geometry, "glyph") => ObjectType::Geometry(GeometryType::Glyph),
            (ObjectKind::Geometry, "sphere") => ObjectType::Geometry(GeometryType::Sphere),
            (ObjectKind::Geometry, "cylinder") => ObjectType::Geometry(GeometryType::Cylinder),
            (ObjectKind::Geometry, "cone") => ObjectType::Geometry(GeometryType::Cone),
            (ObjectKind::Geometry, "triangle") => ObjectType::Geometry(GeometryType::Triangle),
            (ObjectKind::Geometry, "quad") => ObjectType::Geometry(GeometryType::Quad),
            (ObjectKind::Material, "matte") => ObjectType::Material(MaterialType::Matte),
            (ObjectKind::Material, "physicallyBased") => ObjectType::Material(MaterialType::PhysicallyBased),
            (ObjectKind::Surface, "") => ObjectType::Surface,
            (ObjectKind::Light, "directional") => ObjectType::Light(LightType::Directional),
            (ObjectKind::Light, "point") => ObjectType::Light(LightType::Point),
            (ObjectKind::Group, "") => ObjectType::Group,
            (ObjectKind::Instance, "") => ObjectType::Instance,
            (ObjectKind::World, "") => ObjectType::World,
            (ObjectKind::Frame, "") => ObjectType::Frame,
            _ => return None,
        };
        Some(ty)
    }

    pub fn kind(self) -> ObjectKind {
        match self {
            ObjectType::Camera(_) => ObjectKind::Camera,
            ObjectType::Geometry(_) => ObjectKind::Geometry,
            ObjectType::Material(_) => ObjectKind::Material,
            ObjectType::Surface => ObjectKind::Surface,
            ObjectType::Light(_) => ObjectKind::Light,
            ObjectType::Group => ObjectKind::Group,
            ObjectType::Instance => ObjectKind::Instance,
            ObjectType::World => ObjectKind::World,
            ObjectType::Frame => ObjectKind::Frame,
        }
    }

    /// Subtype name as accepted by [`ObjectType::parse`].
    pub fn subtype(self) -> &'static str {
        match self {
            ObjectType::Camera(CameraType::Perspective) => "perspective",
            ObjectType::Camera(CameraType::Orthographic) => "orthographic",
            ObjectType::Geometry(GeometryType::Glyph) => "glyph",
            ObjectType::Geometry(GeometryType::Sphere) => "sphere",
            ObjectType::Geometry(GeometryType::Cylinder) => "cylinder",
            ObjectType::Geometry(GeometryType::Cone) => "cone",
            ObjectType::Geometry(GeometryType::Triangle) => "triangle",
            ObjectType::Geometry(GeometryType::Quad) => "quad",
            ObjectType::Material(MaterialType::Matte) => "matte",
            ObjectType::Material(MaterialType::PhysicallyBased) => "physicallyBased",
            ObjectType::Light(LightType::Directional) => "directional",
            ObjectType::Light(LightType::Point) => "point",
            ObjectType::Surface
            | ObjectType::Group
            | ObjectType::Instance
            | ObjectType::World
            | ObjectType::Frame => "",
        }
    }

    pub fn schema(self) -> &'static Schema {
        match self {
            ObjectType::Camera(CameraType::Perspective) => &schema::PERSPECTIVE_SCHEMA,
            ObjectType::Camera(CameraType::Orthographic) => &schema::ORTHOGRAPHIC_SCHEMA,
            ObjectType::Geometry(GeometryType::Glyph) => &schema::GLYPH_SCHEMA,
            ObjectType::Geometry(GeometryType::Sphere) => &schema::SPHERE_SCHEMA,
            ObjectType::Geometry(GeometryType::Cylinder | GeometryType::Cone) => &schema::SEGMENT_SCHEMA,
            ObjectType::Geometry(GeometryType::Triangle) => &schema::TRIANGLE_SCHEMA,
            ObjectType::Geometry(GeometryType::Quad) => &schema::QUAD_SCHEMA,
            ObjectType::Material(MaterialType::Matte) => &schema::MATTE_SCHEMA,
            ObjectType::Material(MaterialType::PhysicallyBased) => &schema::PHYSICALLY_BASED_SCHEMA,
            ObjectType::Surface => &schema::SURFACE_SCHEMA,
            ObjectType::Light(LightType::Directional) => &schema::DIRECTIONAL_SCHEMA,
            ObjectType::Light(LightType::Point) => &schema::POINT_SCHEMA,
            ObjectType::Group => &schema::GROUP_SCHEMA,
            ObjectType::Instance => &schema::INSTANCE_SCHEMA,
            ObjectType::World => &schema::WORLD_SCHEMA,
            ObjectType::Frame => &schema::FRAME_SCHEMA,
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.subtype() {
            "" => write!(f, "{}", self.kind()),
            subtype => write!(f, "{}({})", self.kind(), subtype),
        }
    }
}

/// A scene object owned by the device.
#[derive(Debug)]
pub struct SceneObject {
    object_type: ObjectType,
    default_name: String,
    pub(crate) name_index: usize,
    pub(crate) params: ObjectParams,
}

impl SceneObject {
    pub(crate) fn new(object_type: ObjectType, name_index: usize) -> Self {
        Self {
            object_type,
            default_name: format!("{}_{}", object_type.kind(), name_index),
            name_index,
            params: ObjectParams::default(),
        }
    }

    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    pub fn kind(&self) -> ObjectKind {
        self.object_type.kind()
    }

    pub fn params(&self) -> &ObjectParams {
        &self.params
    }

    pub fn state(&self) -> ObjectState {
        self.params.state()
    }

    /// Device-unique name assigned at creation.
    pub fn default_name(&self) -> &str {
        &self.default_name
    }

    /// Name used in snapshots: the committed `name` parameter if set,
    /// otherwise the default name. Always a valid identifier.
    pub fn name(&self) -> String {
        let committed = self
            .params
            .committed()
            .and_then(|table| table.get("name"))
            .and_then(|value| value.as_str());
        match committed {
            Some(name) => usd_identifier(name),
            None => self.default_name.clone(),
        }
    }
}

/// Sanitize `name` into a scene-description identifier.
///
/// Characters other than ASCII letters, digits and `_` become `_`, and a
/// leading character that is not a letter is replaced by `_`.
pub fn usd_identifier(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    match out.chars().next() {
        None => "_".to_string(),
        Some(first) if !first.is_ascii_alphabetic() => {
            out.replace_range(..1, "_");
            out
        }
        Some(_) => out,
    }
}
