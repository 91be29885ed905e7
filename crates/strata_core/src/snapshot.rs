//! Immutable scene snapshots handed to serialization backends.
//!
//! A snapshot is built synchronously when a render is dispatched. It holds
//! resolved values only: object references become object names, arrays are
//! shared through `Arc`, and unset parameters carry their schema defaults.
//! Later edits on the device never reach a snapshot that was already taken.
//!
//! Surfaces reach the world directly or through instances, each of which
//! places a group of surfaces under a transform.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use glam::{Mat4, Vec3};
use serde::{Serialize, Serializer};
use strata_math::Aabb;

use crate::array::{ArrayData, ArrayStore};
use crate::diagnostics::{Severity, StatusSource};
use crate::glyph::GlyphSet;
use crate::handle::ObjectHandle;
use crate::object::{GeometryType, MaterialType, ObjectType, SceneObject};
use crate::params::ParameterTable;
use crate::registry::ObjectRegistry;
use crate::schema::{POSITION, TIME, TRANSFORM};
use crate::settings::DeviceSettings;
use crate::types::ObjectKind;
use crate::value::ParamValue;

/// An array shared with the device.
#[derive(Clone, Debug)]
pub struct ArrayView(pub Arc<ArrayData>);

impl PartialEq for ArrayView {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || *self.0 == *other.0
    }
}

impl Serialize for ArrayView {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

/// A resolved parameter value.
#[derive(Clone, Debug, PartialEq)]
pub enum SnapshotValue {
    Value(ParamValue),
    Array(ArrayView),
    /// Name of a referenced object.
    Reference(String),
    /// Names of the objects in an object array.
    References(Vec<String>),
}

impl Serialize for SnapshotValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SnapshotValue::Value(value) => match value {
                ParamValue::Bool(v) => serializer.serialize_bool(*v),
                ParamValue::Int32(v) => serializer.serialize_i32(*v),
                ParamValue::UInt32(v) => serializer.serialize_u32(*v),
                ParamValue::Int64(v) => serializer.serialize_i64(*v),
                ParamValue::UInt64(v) => serializer.serialize_u64(*v),
                ParamValue::Float32(v) => serializer.serialize_f32(*v),
                ParamValue::Float64(v) => serializer.serialize_f64(*v),
                ParamValue::Vec2(v) => v.to_array().serialize(serializer),
                ParamValue::Vec3(v) => v.to_array().serialize(serializer),
                ParamValue::Vec4(v) => v.to_array().serialize(serializer),
                ParamValue::Quat(v) => v.to_array().serialize(serializer),
                ParamValue::Mat4(v) => v.to_cols_array().serialize(serializer),
                ParamValue::UVec2(v) => v.to_array().serialize(serializer),
                ParamValue::String(v) => serializer.serialize_str(v),
                ParamValue::DataType(v) => serializer.serialize_str(v.name()),
                ParamValue::Array(_) | ParamValue::Object(_) => serializer.serialize_none(),
            },
            SnapshotValue::Array(view) => view.serialize(serializer),
            SnapshotValue::Reference(name) => serializer.serialize_str(name),
            SnapshotValue::References(names) => names.serialize(serializer),
        }
    }
}

impl SnapshotValue {
    pub fn as_value(&self) -> Option<&ParamValue> {
        match self {
            SnapshotValue::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Arc<ArrayData>> {
        match self {
            SnapshotValue::Array(view) => Some(&view.0),
            _ => None,
        }
    }
}

/// Committed state of one object.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ObjectSnapshot {
    pub name: String,
    pub kind: ObjectKind,
    pub subtype: &'static str,
    /// The object's own `usd::time`, else the device time.
    pub time: f64,
    pub params: BTreeMap<String, SnapshotValue>,
}

impl ObjectSnapshot {
    pub fn get(&self, name: &str) -> Option<&SnapshotValue> {
        self.params.get(name)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SurfaceSnapshot {
    pub surface: ObjectSnapshot,
    pub geometry: ObjectSnapshot,
    /// Absent when material output is disabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material: Option<ObjectSnapshot>,
    /// Preview shading inputs, when requested by the device.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<PreviewSurface>,
    /// Expanded instances of glyph geometry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub glyphs: Option<GlyphSet>,
}

/// Inputs of a preview surface shader derived from a material.
///
/// Inputs bound to a geometry attribute keep the attribute name.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewSurface {
    pub diffuse_color: SnapshotValue,
    pub emissive_color: SnapshotValue,
    pub opacity: SnapshotValue,
    pub metallic: SnapshotValue,
    pub roughness: SnapshotValue,
    pub ior: SnapshotValue,
}

impl PreviewSurface {
    fn from_material(material_type: MaterialType, material: &ObjectSnapshot) -> Self {
        let input = |name: &str, fallback: f32| {
            material
                .get(name)
                .cloned()
                .unwrap_or(SnapshotValue::Value(ParamValue::Float32(fallback)))
        };
        let color = |name: &str, fallback: Vec3| {
            material
                .get(name)
                .cloned()
                .unwrap_or(SnapshotValue::Value(ParamValue::Vec3(fallback)))
        };
        let diffuse = match material_type {
            MaterialType::Matte => "color",
            MaterialType::PhysicallyBased => "baseColor",
        };
        // Matte surfaces are fully rough dielectrics
        Self {
            diffuse_color: color(diffuse, Vec3::splat(0.8)),
            emissive_color: color("emissive", Vec3::ZERO),
            opacity: input("opacity", 1.0),
            metallic: input("metallic", 0.0),
            roughness: input("roughness", 1.0),
            ior: input("ior", 1.5),
        }
    }
}

/// A group and the surfaces it holds.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GroupSnapshot {
    pub group: ObjectSnapshot,
    pub surfaces: Vec<SurfaceSnapshot>,
}

/// A group placed into the world; the transform is the instance's
/// `transform` parameter.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InstanceSnapshot {
    pub instance: ObjectSnapshot,
    pub group: GroupSnapshot,
}

impl InstanceSnapshot {
    pub fn transform(&self) -> Mat4 {
        self.instance
            .get(TRANSFORM)
            .and_then(SnapshotValue::as_value)
            .and_then(ParamValue::as_mat4)
            .unwrap_or(Mat4::IDENTITY)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WorldSnapshot {
    pub world: ObjectSnapshot,
    pub instances: Vec<InstanceSnapshot>,
    pub surfaces: Vec<SurfaceSnapshot>,
    pub lights: Vec<ObjectSnapshot>,
}

/// Where and how a backend writes a snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputSettings {
    pub location: PathBuf,
    pub binary: bool,
    pub enable_saving: bool,
    /// Start a new numbered session instead of reusing the latest one.
    pub new_session: bool,
}

impl From<&DeviceSettings> for OutputSettings {
    fn from(settings: &DeviceSettings) -> Self {
        Self {
            location: settings.serialize_location.clone(),
            binary: settings.output_binary,
            enable_saving: settings.enable_saving,
            new_session: settings.new_session,
        }
    }
}

/// Everything a backend needs to write one rendered frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SceneSnapshot {
    pub frame: ObjectSnapshot,
    pub time: f64,
    pub camera: Option<ObjectSnapshot>,
    pub world: WorldSnapshot,
    /// `[min, max]` corners of the scene bounds, if anything is visible.
    pub extent: Option<[[f32; 3]; 2]>,
    #[serde(skip)]
    pub output: OutputSettings,
}

impl SceneSnapshot {
    /// Name of the rendered frame, used as the output file stem.
    pub fn name(&self) -> &str {
        &self.frame.name
    }
}

/// A problem found while snapshotting; the device reports these.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotIssue {
    pub severity: Severity,
    pub source: StatusSource,
    pub message: String,
}

/// Walks committed state from a frame down to geometry and materials, both
/// directly and through instanced groups.
pub struct SnapshotBuilder<'a> {
    arrays: &'a ArrayStore,
    objects: &'a ObjectRegistry,
    settings: &'a DeviceSettings,
    issues: Vec<SnapshotIssue>,
}

impl<'a> SnapshotBuilder<'a> {
    pub fn new(arrays: &'a ArrayStore, objects: &'a ObjectRegistry, settings: &'a DeviceSettings) -> Self {
        Self {
            arrays,
            objects,
            settings,
            issues: Vec::new(),
        }
    }

    /// Snapshot the committed frame `frame`.
    ///
    /// Fails when the frame or its world cannot be resolved; broken
    /// surfaces, lights and cameras are skipped and recorded as issues.
    pub fn build(mut self, frame: ObjectHandle) -> Result<(SceneSnapshot, Vec<SnapshotIssue>), String> {
        let frame_object = self.objects.get(frame).ok_or("frame was destroyed")?;
        let frame_table = frame_object.params().committed().ok_or("frame is not committed")?;
        let frame_snapshot = self.object_snapshot(frame_object, frame_table);

        let world_handle = frame_table
            .get("world")
            .and_then(ParamValue::as_object)
            .map(|r| r.handle)
            .ok_or("frame has no world")?;
        let world_object = self
            .objects
            .get(world_handle)
            .ok_or_else(|| format!("world of frame '{}' was destroyed", frame_object.name()))?;
        let world_table = world_object
            .params()
            .committed()
            .ok_or_else(|| format!("world '{}' is not committed", world_object.name()))?;

        let camera = frame_table
            .get("camera")
            .and_then(ParamValue::as_object)
            .and_then(|r| self.committed((frame, frame_object), "camera", r.handle))
            .map(|(object, table)| self.object_snapshot(object, table));

        let mut extent = Aabb::EMPTY;
        let mut instances = Vec::new();
        for handle in self.object_array(world_table, "instance") {
            if let Some((instance, bounds)) = self.instance_snapshot((world_handle, world_object), handle) {
                extent = Aabb::surrounding(&extent, &bounds);
                instances.push(instance);
            }
        }

        let mut surfaces = Vec::new();
        for handle in self.object_array(world_table, "surface") {
            if let Some((surface, bounds)) = self.surface_snapshot((world_handle, world_object), handle) {
                extent = Aabb::surrounding(&extent, &bounds);
                surfaces.push(surface);
            }
        }

        let mut lights = Vec::new();
        for handle in self.object_array(world_table, "light") {
            if let Some((light, table)) = self.committed((world_handle, world_object), "light", handle) {
                lights.push(self.object_snapshot(light, table));
            }
        }

        let snapshot = SceneSnapshot {
            frame: frame_snapshot,
            time: self.settings.time,
            camera,
            world: WorldSnapshot {
                world: self.object_snapshot(world_object, world_table),
                instances,
                surfaces,
                lights,
            },
            extent: extent.to_corners(),
            output: OutputSettings::from(self.settings),
        };
        log::debug!(
            "Snapshot of frame '{}': {} instances, {} surfaces, {} lights",
            snapshot.name(),
            snapshot.world.instances.len(),
            snapshot.world.surfaces.len(),
            snapshot.world.lights.len()
        );
        Ok((snapshot, self.issues))
    }

    /// Snapshot an instance and its group; the bounds are in world space.
    fn instance_snapshot(
        &mut self,
        world: (ObjectHandle, &SceneObject),
        handle: ObjectHandle,
    ) -> Option<(InstanceSnapshot, Aabb)> {
        let (instance, instance_table) = self.committed(world, "instance", handle)?;
        let group_handle = instance_table.get("group").and_then(ParamValue::as_object)?.handle;
        let (group, group_table) = self.committed((handle, instance), "group", group_handle)?;

        let mut bounds = Aabb::EMPTY;
        let mut surfaces = Vec::new();
        for surface in self.object_array(group_table, "surface") {
            if let Some((snapshot, surface_bounds)) = self.surface_snapshot((group_handle, group), surface) {
                bounds = Aabb::surrounding(&bounds, &surface_bounds);
                surfaces.push(snapshot);
            }
        }

        let snapshot = InstanceSnapshot {
            instance: self.object_snapshot(instance, instance_table),
            group: GroupSnapshot {
                group: self.object_snapshot(group, group_table),
                surfaces,
            },
        };
        let bounds = bounds.transformed(&snapshot.transform());
        Some((snapshot, bounds))
    }

    fn surface_snapshot(
        &mut self,
        holder: (ObjectHandle, &SceneObject),
        handle: ObjectHandle,
    ) -> Option<(SurfaceSnapshot, Aabb)> {
        let (surface, surface_table) = self.committed(holder, "surface", handle)?;
        let geometry_handle = surface_table.get("geometry").and_then(ParamValue::as_object)?.handle;
        let material_handle = surface_table.get("material").and_then(ParamValue::as_object)?.handle;
        let (geometry, geometry_table) = self.committed((handle, surface), "geometry", geometry_handle)?;
        let (material, material_table) = self.committed((handle, surface), "material", material_handle)?;

        let glyphs = match geometry.object_type() {
            ObjectType::Geometry(GeometryType::Glyph) => GlyphSet::from_params(geometry_table, self.arrays),
            _ => None,
        };
        let bounds = match &glyphs {
            Some(glyphs) => glyphs.bounds(),
            None => self.geometry_bounds(geometry.object_type(), geometry_table),
        };

        let material_snapshot = self
            .settings
            .output_material
            .then(|| self.object_snapshot(material, material_table));
        let preview = match (&material_snapshot, material.object_type()) {
            (Some(snapshot), ObjectType::Material(material_type)) if self.settings.preview_surface_shader => {
                Some(PreviewSurface::from_material(material_type, snapshot))
            }
            _ => None,
        };

        let snapshot = SurfaceSnapshot {
            surface: self.object_snapshot(surface, surface_table),
            geometry: self.object_snapshot(geometry, geometry_table),
            material: material_snapshot,
            preview,
            glyphs,
        };
        Some((snapshot, bounds))
    }

    /// Resolve a reference held by `holder`, recording an issue when the
    /// target is gone or was never committed.
    fn committed(
        &mut self,
        holder: (ObjectHandle, &SceneObject),
        param: &str,
        handle: ObjectHandle,
    ) -> Option<(&'a SceneObject, &'a ParameterTable)> {
        let Some(object) = self.objects.get(handle) else {
            self.issue(
                Severity::Error,
                holder,
                format!("'{}' refers to a destroyed object; skipped", param),
            );
            return None;
        };
        match object.params().committed() {
            Some(table) => Some((object, table)),
            None => {
                self.issue(
                    Severity::Warning,
                    holder,
                    format!(
                        "'{}' refers to {} '{}' which was never committed; skipped",
                        param,
                        object.kind(),
                        object.name()
                    ),
                );
                None
            }
        }
    }

    fn issue(&mut self, severity: Severity, (handle, holder): (ObjectHandle, &SceneObject), message: String) {
        self.issues.push(SnapshotIssue {
            severity,
            source: StatusSource::Object {
                kind: holder.kind(),
                handle,
                name: holder.name(),
            },
            message,
        });
    }

    fn object_array(&self, table: &ParameterTable, name: &str) -> Vec<ObjectHandle> {
        table
            .get(name)
            .and_then(ParamValue::as_array)
            .and_then(|handle| self.arrays.resolve(handle))
            .and_then(|data| data.handles())
            .map(|handles| handles.to_vec())
            .unwrap_or_default()
    }

    fn object_snapshot(&self, object: &SceneObject, table: &ParameterTable) -> ObjectSnapshot {
        let mut params = BTreeMap::new();
        for spec in object.object_type().schema().iter() {
            if spec.name == "name" || spec.name == TIME {
                continue;
            }
            let value = match table.get(spec.name) {
                Some(value) => self.resolve_value(value),
                None => spec.default.map(|d| SnapshotValue::Value(d.to_value())),
            };
            if let Some(value) = value {
                params.insert(spec.name.to_string(), value);
            }
        }
        ObjectSnapshot {
            name: object.name(),
            kind: object.kind(),
            subtype: object.object_type().subtype(),
            time: self.object_time(object, table),
            params,
        }
    }

    fn object_time(&self, object: &SceneObject, table: &ParameterTable) -> f64 {
        let own = match object.object_type().schema().find(TIME) {
            Some(_) => table.get(TIME).and_then(ParamValue::as_f64),
            None => None,
        };
        own.unwrap_or(self.settings.time)
    }

    fn resolve_value(&self, value: &ParamValue) -> Option<SnapshotValue> {
        match value {
            ParamValue::Array(handle) => {
                let data = self.arrays.resolve(*handle)?;
                match data.handles() {
                    Some(handles) => Some(SnapshotValue::References(
                        handles
                            .iter()
                            .filter_map(|h| self.objects.get(*h))
                            .map(SceneObject::name)
                            .collect(),
                    )),
                    None => Some(SnapshotValue::Array(ArrayView(data.clone()))),
                }
            }
            ParamValue::Object(reference) => self
                .objects
                .get(reference.handle)
                .map(|object| SnapshotValue::Reference(object.name())),
            other => Some(SnapshotValue::Value(other.clone())),
        }
    }

    /// Bounds of non-glyph geometry: vertex positions, padded by the
    /// radius for sphere geometry.
    fn geometry_bounds(&self, object_type: ObjectType, table: &ParameterTable) -> Aabb {
        let Some(positions) = table
            .get(POSITION)
            .and_then(ParamValue::as_array)
            .and_then(|h| self.arrays.resolve(h))
        else {
            return Aabb::EMPTY;
        };

        let radii = table
            .get("vertex.radius")
            .and_then(ParamValue::as_array)
            .and_then(|h| self.arrays.resolve(h));
        let radius = table.get("radius").and_then(ParamValue::as_f32).unwrap_or(1.0);
        let padded = matches!(object_type, ObjectType::Geometry(GeometryType::Sphere));

        (0..positions.len())
            .filter_map(|i| positions.vec3_at(i).map(|p| (i, p)))
            .fold(Aabb::EMPTY, |bounds, (i, p)| {
                if padded {
                    let r = radii.and_then(|r| r.scalar_at(i)).unwrap_or(radius);
                    let shape = Aabb::from_points(p - Vec3::splat(r), p + Vec3::splat(r));
                    Aabb::surrounding(&bounds, &shape)
                } else {
                    bounds.include_point(p)
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::ArraySource;
    use crate::types::DataType;
    use glam::UVec2;

    struct Scene {
        arrays: ArrayStore,
        objects: ObjectRegistry,
    }

    impl Scene {
        fn object(&mut self, ty: ObjectType, params: Vec<(&str, ParamValue)>) -> ObjectHandle {
            let handle = self.objects.create(ty);
            let object = self.objects.get_mut(handle).unwrap();
            for (name, value) in params {
                object.params.set(name, value, &mut self.arrays);
            }
            object.params.publish(&mut self.arrays);
            handle
        }

        fn array(&mut self, ty: DataType, count: usize, source: ArraySource) -> ParamValue {
            let objects = &self.objects;
            ParamValue::Array(self.arrays.create(ty, count, source, |h| objects.kind_of(h)).unwrap())
        }
    }

    impl Scene {
        fn new() -> Self {
            Self {
                arrays: ArrayStore::default(),
                objects: ObjectRegistry::new(),
            }
        }

        /// Two spheres of radius 0.5 at the origin and at x = 4.
        fn sphere_surface(&mut self, geometry_params: Vec<(&str, ParamValue)>) -> (ObjectHandle, ObjectHandle) {
            let positions = self.array(
                DataType::Float32Vec3,
                2,
                ArraySource::from(vec![Vec3::ZERO, Vec3::new(4.0, 0.0, 0.0)]),
            );
            let mut params = vec![(POSITION, positions), ("radius", ParamValue::Float32(0.5))];
            params.extend(geometry_params);
            let geometry = self.object(ObjectType::Geometry(GeometryType::Sphere), params);
            let material = self.object(ObjectType::Material(MaterialType::Matte), vec![]);
            let surface = self.object(
                ObjectType::Surface,
                vec![
                    ("geometry", ParamValue::geometry(geometry)),
                    ("material", ParamValue::material(material)),
                ],
            );
            (surface, material)
        }

        fn frame(&mut self, world_params: Vec<(&str, ParamValue)>) -> ObjectHandle {
            let world = self.object(ObjectType::World, world_params);
            self.object(ObjectType::Frame, vec![("world", ParamValue::world(world))])
        }
    }

    fn sphere_scene() -> (Scene, ObjectHandle, ObjectHandle) {
        let mut scene = Scene::new();
        let (surface, material) = scene.sphere_surface(vec![]);
        let surfaces = scene.array(DataType::Object(ObjectKind::Surface), 1, ArraySource::from(vec![surface]));
        let frame = scene.frame(vec![("surface", surfaces)]);
        (scene, frame, material)
    }

    #[test]
    fn test_snapshot_resolves_references_and_defaults() {
        let (scene, frame, _) = sphere_scene();
        let settings = DeviceSettings::default();
        let (snapshot, issues) = SnapshotBuilder::new(&scene.arrays, &scene.objects, &settings)
            .build(frame)
            .unwrap();

        assert!(issues.is_empty());
        assert_eq!(snapshot.name(), "Frame_0");
        assert_eq!(
            snapshot.frame.get("size"),
            Some(&SnapshotValue::Value(ParamValue::UVec2(UVec2::new(1024, 768))))
        );
        assert_eq!(snapshot.frame.get("world"), Some(&SnapshotValue::Reference("World_0".into())));
        assert_eq!(
            snapshot.world.world.get("surface"),
            Some(&SnapshotValue::References(vec!["Surface_0".into()]))
        );

        let surface = &snapshot.world.surfaces[0];
        assert_eq!(surface.geometry.name, "Geometry_0");
        assert!(surface.glyphs.is_none());
        assert_eq!(
            surface.material.as_ref().and_then(|m| m.get("color")),
            Some(&SnapshotValue::Value(ParamValue::Vec3(Vec3::splat(0.8))))
        );
        assert_eq!(snapshot.extent, Some([[-0.5, -0.5, -0.5], [4.5, 0.5, 0.5]]));
    }

    #[test]
    fn test_material_output_toggle() {
        let (scene, frame, _) = sphere_scene();
        let settings = DeviceSettings {
            output_material: false,
            ..DeviceSettings::default()
        };
        let (snapshot, _) = SnapshotBuilder::new(&scene.arrays, &scene.objects, &settings)
            .build(frame)
            .unwrap();
        assert!(snapshot.world.surfaces[0].material.is_none());
    }

    #[test]
    fn test_dangling_material_skips_surface() {
        let (mut scene, frame, material) = sphere_scene();
        let mut removed = scene.objects.remove(material).unwrap();
        removed.params.clear(&mut scene.arrays);

        let settings = DeviceSettings::default();
        let (snapshot, issues) = SnapshotBuilder::new(&scene.arrays, &scene.objects, &settings)
            .build(frame)
            .unwrap();
        assert!(snapshot.world.surfaces.is_empty());
        assert_eq!(snapshot.extent, None);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Error);
    }

    #[test]
    fn test_instances_place_groups_in_world() {
        let mut scene = Scene::new();
        let (surface, _) = scene.sphere_surface(vec![]);
        let surfaces = scene.array(DataType::Object(ObjectKind::Surface), 1, ArraySource::from(vec![surface]));
        let group = scene.object(ObjectType::Group, vec![("surface", surfaces)]);
        let moved = Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0));
        let instance = scene.object(
            ObjectType::Instance,
            vec![("group", ParamValue::group(group)), (TRANSFORM, ParamValue::Mat4(moved))],
        );
        let instances = scene.array(DataType::Object(ObjectKind::Instance), 1, ArraySource::from(vec![instance]));
        let frame = scene.frame(vec![("instance", instances)]);

        let settings = DeviceSettings::default();
        let (snapshot, issues) = SnapshotBuilder::new(&scene.arrays, &scene.objects, &settings)
            .build(frame)
            .unwrap();

        assert!(issues.is_empty());
        assert!(snapshot.world.surfaces.is_empty());
        let instance = &snapshot.world.instances[0];
        assert_eq!(instance.transform(), moved);
        assert_eq!(instance.group.group.name, "Group_0");
        assert_eq!(instance.group.surfaces[0].surface.name, "Surface_0");
        assert_eq!(snapshot.extent, Some([[9.5, -0.5, -0.5], [14.5, 0.5, 0.5]]));
    }

    #[test]
    fn test_instance_of_uncommitted_group_is_skipped() {
        let mut scene = Scene::new();
        let group = scene.objects.create(ObjectType::Group);
        let instance = scene.object(ObjectType::Instance, vec![("group", ParamValue::group(group))]);
        let instances = scene.array(DataType::Object(ObjectKind::Instance), 1, ArraySource::from(vec![instance]));
        let frame = scene.frame(vec![("instance", instances)]);

        let settings = DeviceSettings::default();
        let (snapshot, issues) = SnapshotBuilder::new(&scene.arrays, &scene.objects, &settings)
            .build(frame)
            .unwrap();
        assert!(snapshot.world.instances.is_empty());
        assert_eq!(snapshot.extent, None);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Warning);
    }

    #[test]
    fn test_object_time_overrides_device_time() {
        let mut scene = Scene::new();
        let (surface, _) = scene.sphere_surface(vec![(TIME, ParamValue::Float64(5.0))]);
        let surfaces = scene.array(DataType::Object(ObjectKind::Surface), 1, ArraySource::from(vec![surface]));
        let frame = scene.frame(vec![("surface", surfaces)]);

        let settings = DeviceSettings {
            time: 2.0,
            ..DeviceSettings::default()
        };
        let (snapshot, _) = SnapshotBuilder::new(&scene.arrays, &scene.objects, &settings)
            .build(frame)
            .unwrap();

        let surface = &snapshot.world.surfaces[0];
        assert_eq!(snapshot.time, 2.0);
        assert_eq!(surface.surface.time, 2.0);
        assert_eq!(surface.geometry.time, 5.0);
        assert_eq!(surface.material.as_ref().map(|m| m.time), Some(2.0));
        assert!(surface.geometry.get(TIME).is_none());
        assert_eq!(
            surface.geometry.get("usd::timeVarying"),
            Some(&SnapshotValue::Value(ParamValue::Int32(-1)))
        );
    }

    #[test]
    fn test_preview_surface_toggle() {
        let (scene, frame, _) = sphere_scene();
        let settings = DeviceSettings::default();
        let (snapshot, _) = SnapshotBuilder::new(&scene.arrays, &scene.objects, &settings)
            .build(frame)
            .unwrap();
        assert!(snapshot.world.surfaces[0].preview.is_none());

        let settings = DeviceSettings {
            preview_surface_shader: true,
            ..DeviceSettings::default()
        };
        let (snapshot, _) = SnapshotBuilder::new(&scene.arrays, &scene.objects, &settings)
            .build(frame)
            .unwrap();
        let preview = snapshot.world.surfaces[0].preview.as_ref().unwrap();
        assert_eq!(preview.diffuse_color, SnapshotValue::Value(ParamValue::Vec3(Vec3::splat(0.8))));
        assert_eq!(preview.metallic, SnapshotValue::Value(ParamValue::Float32(0.0)));
        assert_eq!(preview.opacity, SnapshotValue::Value(ParamValue::Float32(1.0)));

        let json = serde_json::to_value(preview).unwrap();
        assert_eq!(json["diffuseColor"].as_array().map(Vec::len), Some(3));
        assert_eq!(json["roughness"].as_f64(), Some(1.0));
    }

    #[test]
    fn test_uncommitted_frame_fails() {
        let mut scene = Scene::new();
        let frame = scene.objects.create(ObjectType::Frame);
        let settings = DeviceSettings::default();
        let result = SnapshotBuilder::new(&scene.arrays, &scene.objects, &settings).build(frame);
        assert!(result.is_err());
    }
}
