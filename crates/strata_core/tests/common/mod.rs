//! Shared fixtures: the glyph tutorial scene built through the device API.

#![allow(dead_code)]

use std::sync::Arc;

use strata_core::{
    ArrayHandle, CollectingSink, DataType, Device, DeviceSettings, ObjectHandle, ObjectKind, ParamValue,
    SerializationBackend,
};

pub const POSITIONS: [f32; 12] = [-1.0, -1.0, 3.0, -1.0, 1.0, 3.0, 1.0, -1.0, 3.0, 0.1, 0.1, 0.3];
pub const COLORS: [f32; 16] = [
    0.9, 0.5, 0.5, 1.0, //
    0.8, 0.8, 0.8, 1.0, //
    0.8, 0.8, 0.8, 1.0, //
    0.5, 0.9, 0.5, 1.0,
];
pub const ORIENTATIONS: [f32; 16] = [
    0.0, 0.0, 0.0, 1.0, //
    0.0, 0.707031, 0.0, 0.707031, //
    -0.707031, 0.00282288, 0.0, 0.707031, //
    0.96582, 0.00946808, 0.0, 0.258789,
];
pub const SCALES: [f32; 4] = [2.0, 0.5, 0.3, 1.0];
pub const INDEX: [u32; 4] = [0, 1, 2, 3];

pub struct GlyphScene {
    pub device: Device,
    pub sink: Arc<CollectingSink>,
    pub camera: ObjectHandle,
    pub geometry: ObjectHandle,
    pub material: ObjectHandle,
    pub surface: ObjectHandle,
    pub light: ObjectHandle,
    pub world: ObjectHandle,
    pub frame: ObjectHandle,
    pub positions: ArrayHandle,
}

pub fn device(backend: Arc<dyn SerializationBackend>) -> (Device, Arc<CollectingSink>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let sink = Arc::new(CollectingSink::new());
    let settings = DeviceSettings {
        render_threads: 2,
        ..DeviceSettings::default()
    };
    let device = Device::with_settings(backend, sink.clone(), settings).unwrap();
    (device, sink)
}

/// Build and commit the whole tutorial scene: four cone glyphs, a matte
/// material, a directional light and a perspective camera.
pub fn glyph_scene(backend: Arc<dyn SerializationBackend>) -> GlyphScene {
    let (mut device, sink) = device(backend);

    let camera = device.new_camera("perspective").unwrap();
    device.set_param(camera, "aspect", 1024.0f32 / 768.0).unwrap();
    device.set_param(camera, "position", [0.0f32, 0.0, -100.0]).unwrap();
    device.set_param(camera, "direction", [0.1f32, 0.0, 1.0]).unwrap();
    device.set_param(camera, "up", [0.0f32, 1.0, 0.0]).unwrap();
    device.commit(camera).unwrap();

    let geometry = device.new_geometry("glyph").unwrap();
    let positions = device.new_array1d(DataType::Float32Vec3, 4, &POSITIONS[..]).unwrap();
    let colors = device.new_array1d(DataType::Float32Vec4, 4, &COLORS[..]).unwrap();
    let orientations = device
        .new_array1d(DataType::Float32QuatIjkw, 4, &ORIENTATIONS[..])
        .unwrap();
    let scales = device.new_array1d(DataType::Float32, 4, &SCALES[..]).unwrap();
    let index = device.new_array1d(DataType::UInt32, 4, &INDEX[..]).unwrap();

    device.set_param(geometry, "vertex.position", positions).unwrap();
    device.set_param(geometry, "vertex.color", colors).unwrap();
    device.set_param(geometry, "vertex.orientation", orientations).unwrap();
    device.set_param(geometry, "vertex.scale", scales).unwrap();
    device.set_param(geometry, "primitive.index", index).unwrap();
    device.set_param(geometry, "shapeType", "cone").unwrap();
    device.commit(geometry).unwrap();

    for array in [colors, orientations, scales, index] {
        device.release_array(array).unwrap();
    }

    let material = device.new_material("matte").unwrap();
    device.set_param(material, "color", [0.8f32, 0.8, 0.8]).unwrap();
    device.commit(material).unwrap();

    let surface = device.new_surface().unwrap();
    device.set_param(surface, "geometry", ParamValue::geometry(geometry)).unwrap();
    device.set_param(surface, "material", ParamValue::material(material)).unwrap();
    device.commit(surface).unwrap();

    let light = device.new_light("directional").unwrap();
    device.set_param(light, "direction", [0.0f32, 0.0, 1.0]).unwrap();
    device.commit(light).unwrap();

    let world = device.new_world().unwrap();
    let surfaces = device
        .new_array1d(DataType::Object(ObjectKind::Surface), 1, vec![surface])
        .unwrap();
    let lights = device
        .new_array1d(DataType::Object(ObjectKind::Light), 1, vec![light])
        .unwrap();
    device.set_param(world, "surface", surfaces).unwrap();
    device.set_param(world, "light", lights).unwrap();
    device.commit(world).unwrap();
    device.release_array(surfaces).unwrap();
    device.release_array(lights).unwrap();

    let frame = device.new_frame().unwrap();
    device.set_param(frame, "name", "glyphs").unwrap();
    device.set_param(frame, "world", ParamValue::world(world)).unwrap();
    device.set_param(frame, "camera", ParamValue::camera(camera)).unwrap();
    device.set_param(frame, "size", [1024u32, 768]).unwrap();
    device.set_param(frame, "channel.color", DataType::UFixed8Vec4).unwrap();
    device.commit(frame).unwrap();

    GlyphScene {
        device,
        sink,
        camera,
        geometry,
        material,
        surface,
        light,
        world,
        frame,
        positions,
    }
}
