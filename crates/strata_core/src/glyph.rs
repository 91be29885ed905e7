//! Per-instance data of glyph geometry.
//!
//! A glyph geometry draws one shape per instance. Without
//! `primitive.index` every vertex is an instance; with it, instance `i` uses
//! the vertex named by element `i` of the index.

use glam::{Vec3, Vec4};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use strata_math::{Aabb, InstanceScale, InstanceTransform};

use crate::array::{ArrayData, ArrayStore};
use crate::params::ParameterTable;
use crate::schema::{INDEX, POSITION};
use crate::types::DataType;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GlyphShape {
    #[default]
    Sphere,
    Cylinder,
    Cone,
}

impl GlyphShape {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "sphere" => Some(GlyphShape::Sphere),
            "cylinder" => Some(GlyphShape::Cylinder),
            "cone" => Some(GlyphShape::Cone),
            _ => None,
        }
    }
}

/// One placed shape.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlyphInstance {
    pub transform: InstanceTransform,
    pub color: Option<Vec4>,
}

impl Serialize for GlyphInstance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let t = &self.transform;
        let mut s = serializer.serialize_struct("GlyphInstance", 4)?;
        s.serialize_field("position", &t.position.to_array())?;
        // Quat::to_array is [x, y, z, w], i.e. IJKW
        s.serialize_field("orientation", &t.orientation.to_array())?;
        s.serialize_field("scale", &t.scale.to_vec3().to_array())?;
        s.serialize_field("color", &self.color.map(|c| c.to_array()))?;
        s.end()
    }
}

/// Every instance of one glyph geometry.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct GlyphSet {
    pub shape: GlyphShape,
    pub instances: Vec<GlyphInstance>,
}

impl GlyphSet {
    /// Expand committed glyph parameters into instances.
    ///
    /// Returns `None` when `vertex.position` is missing, which validation
    /// rules out for committed geometry.
    pub fn from_params(table: &ParameterTable, arrays: &ArrayStore) -> Option<Self> {
        let array = |name: &str| {
            table
                .get(name)
                .and_then(|value| value.as_array())
                .and_then(|handle| arrays.resolve(handle))
        };

        let positions = array(POSITION)?;
        let orientations = array("vertex.orientation");
        let scales = array("vertex.scale");
        let vertex_colors = array("vertex.color");
        let primitive_colors = array("primitive.color");

        let vertices: Vec<usize> = match array(INDEX) {
            Some(index) => (0..index.len())
                .filter_map(|i| index.integer_component(i))
                .filter_map(|v| usize::try_from(v).ok())
                .collect(),
            None => (0..positions.len()).collect(),
        };

        let shape = table
            .get("shapeType")
            .and_then(|value| value.as_str())
            .and_then(GlyphShape::parse)
            .unwrap_or_default();

        let instances = vertices
            .iter()
            .enumerate()
            .filter_map(|(instance, &vertex)| {
                let position = positions.vec3_at(vertex)?;
                let orientation = orientations
                    .and_then(|o| o.vec4_at(vertex))
                    .map(|q| InstanceTransform::quat_from_ijkw(q.to_array()))
                    .unwrap_or_default();
                let scale = scales.and_then(|s| instance_scale(s, vertex)).unwrap_or_default();
                let color = primitive_colors
                    .and_then(|c| color_at(c, instance))
                    .or_else(|| vertex_colors.and_then(|c| color_at(c, vertex)));
                Some(GlyphInstance {
                    transform: InstanceTransform {
                        position,
                        orientation,
                        scale,
                    },
                    color,
                })
            })
            .collect();

        Some(Self { shape, instances })
    }

    /// World bounds of every instance's unit shape.
    pub fn bounds(&self) -> Aabb {
        self.instances
            .iter()
            .fold(Aabb::EMPTY, |bounds, glyph| {
                Aabb::surrounding(&bounds, &glyph.transform.unit_shape_bounds())
            })
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

fn instance_scale(scales: &ArrayData, vertex: usize) -> Option<InstanceScale> {
    match scales.element_type() {
        DataType::Float32Vec3 => scales.vec3_at(vertex).map(InstanceScale::PerAxis),
        _ => scales.scalar_at(vertex).map(InstanceScale::Uniform),
    }
}

/// RGBA colour of element `index`; three-component colours are opaque.
fn color_at(colors: &ArrayData, index: usize) -> Option<Vec4> {
    match colors.element_type() {
        DataType::Float32Vec3 => colors.vec3_at(index).map(|c: Vec3| c.extend(1.0)),
        _ => colors.vec4_at(index),
    }
}
