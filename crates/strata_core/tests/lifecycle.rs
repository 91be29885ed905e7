//! Object lifecycle and array ownership through the device API.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::{device, glyph_scene};
use strata_core::{
    ArraySource, CommitRule, DataType, DeviceError, ObjectState, ParamValue, RecordingBackend, Severity,
    StaleHandle, WaitMode,
};

#[test]
fn test_staged_and_committed_isolation_for_every_kind() {
    let (mut device, _) = device(Arc::new(RecordingBackend::new()));
    let objects = [
        device.new_camera("orthographic").unwrap(),
        device.new_geometry("sphere").unwrap(),
        device.new_material("physicallyBased").unwrap(),
        device.new_surface().unwrap(),
        device.new_light("point").unwrap(),
        device.new_group().unwrap(),
        device.new_instance().unwrap(),
        device.new_world().unwrap(),
        device.new_frame().unwrap(),
    ];

    for object in objects {
        assert_eq!(device.object_state(object).unwrap(), ObjectState::Uninitialized);
        device.set_param(object, "name", "staged").unwrap();
        assert_eq!(device.object_state(object).unwrap(), ObjectState::Staged);
        assert_eq!(device.get_param(object, "name").unwrap(), None);
        assert_eq!(
            device.get_staged_param(object, "name").unwrap(),
            Some(ParamValue::from("staged"))
        );
        assert!(device.object_name(object).unwrap().ends_with("_0"));
    }
}

#[test]
fn test_recommit_is_idempotent() {
    let backend = Arc::new(RecordingBackend::new());
    let mut scene = glyph_scene(backend);
    let before = scene.device.get_param(scene.geometry, "vertex.position").unwrap();
    let counts = scene.device.array_ref_count(scene.positions);
    scene.sink.take();

    scene.device.commit(scene.geometry).unwrap();
    // Setting an identical value does not dirty the object either
    scene.device.set_param(scene.geometry, "shapeType", "cone").unwrap();
    scene.device.commit(scene.geometry).unwrap();

    assert_eq!(scene.device.get_param(scene.geometry, "vertex.position").unwrap(), before);
    assert_eq!(scene.device.array_ref_count(scene.positions), counts);
    assert_eq!(scene.device.object_state(scene.geometry).unwrap(), ObjectState::Committed);
    assert!(scene.sink.is_empty());
}

#[test]
fn test_arity_failure_preserves_committed_state() {
    let backend = Arc::new(RecordingBackend::new());
    let mut scene = glyph_scene(backend);
    let committed_scale = scene.device.get_param(scene.geometry, "vertex.scale").unwrap();

    let short = scene
        .device
        .new_array1d(DataType::Float32, 3, vec![1.0f32, 1.0, 1.0])
        .unwrap();
    scene.device.set_param(scene.geometry, "vertex.scale", short).unwrap();

    let err = scene.device.commit(scene.geometry).unwrap_err();
    match err {
        DeviceError::Commit(err) => {
            assert_eq!(err.object, scene.geometry);
            assert_eq!(err.param, "vertex.scale");
            assert_eq!(
                err.rule,
                CommitRule::ArityMismatch {
                    expected: 4,
                    found: 3,
                    against: "vertex.position",
                }
            );
        }
        other => panic!("unexpected error {:?}", other),
    }

    assert_eq!(scene.device.get_param(scene.geometry, "vertex.scale").unwrap(), committed_scale);
    assert_eq!(scene.device.object_state(scene.geometry).unwrap(), ObjectState::Staged);
}

#[test]
fn test_arity_failure_on_first_commit_stays_uninitialized() {
    let (mut device, sink) = device(Arc::new(RecordingBackend::new()));
    let geometry = device.new_geometry("glyph").unwrap();
    let positions = device.new_array1d(DataType::Float32Vec3, 2, vec![0.0f32; 6]).unwrap();
    let colors = device.new_array1d(DataType::Float32Vec3, 1, vec![1.0f32; 3]).unwrap();
    device.set_param(geometry, "vertex.position", positions).unwrap();
    device.set_param(geometry, "vertex.color", colors).unwrap();

    assert!(matches!(device.commit(geometry), Err(DeviceError::Commit(_))));
    assert_eq!(device.get_param(geometry, "vertex.position").unwrap(), None);
    assert_eq!(sink.count(Severity::Error), 1);
}

#[test]
fn test_array_freed_exactly_once_after_last_reference() {
    let (mut device, _) = device(Arc::new(RecordingBackend::new()));
    device.set_device_param("memory.zeroCopy", true).unwrap();
    device.commit_device().unwrap();
    let frees = Arc::new(AtomicUsize::new(0));
    let counter = frees.clone();
    let source = ArraySource::from(vec![0.5f32, 1.0]).with_deleter(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let geometry = device.new_geometry("sphere").unwrap();
    let radii = device.new_array1d(DataType::Float32, 2, source).unwrap();
    let positions = device.new_array1d(DataType::Float32Vec3, 2, vec![0.0f32; 6]).unwrap();
    device.set_param(geometry, "vertex.position", positions).unwrap();
    device.set_param(geometry, "vertex.radius", radii).unwrap();
    device.commit(geometry).unwrap();
    device.release_array(radii).unwrap();

    // Staged and committed tables both still reference it
    assert_eq!(device.array_ref_count(radii), Some((0, 2)));
    assert_eq!(frees.load(Ordering::SeqCst), 0);

    device.unset_param(geometry, "vertex.radius").unwrap();
    assert_eq!(frees.load(Ordering::SeqCst), 0);

    device.commit(geometry).unwrap();
    assert_eq!(device.array_ref_count(radii), None);
    assert_eq!(frees.load(Ordering::SeqCst), 1);

    assert!(matches!(
        device.release_array(radii),
        Err(DeviceError::UseAfterFree(StaleHandle::Array(_)))
    ));
    drop(device);
    assert_eq!(frees.load(Ordering::SeqCst), 1);
}

#[test]
fn test_destroy_releases_array_references() {
    let (mut device, _) = device(Arc::new(RecordingBackend::new()));
    let geometry = device.new_geometry("glyph").unwrap();
    let positions = device.new_array1d(DataType::Float32Vec3, 1, vec![0.0f32; 3]).unwrap();
    device.set_param(geometry, "vertex.position", positions).unwrap();
    device.commit(geometry).unwrap();
    device.release_array(positions).unwrap();
    assert_eq!(device.array_count(), 1);

    device.destroy(geometry).unwrap();
    assert_eq!(device.array_count(), 0);
    assert_eq!(device.object_count(), 0);
    assert!(matches!(
        device.object_state(geometry),
        Err(DeviceError::UseAfterFree(StaleHandle::Object(_)))
    ));
}

#[test]
fn test_in_flight_render_keeps_arrays_alive() {
    let backend = Arc::new(RecordingBackend::new());
    let mut scene = glyph_scene(backend.clone());

    scene.device.render_frame(scene.frame).unwrap();
    scene.device.destroy(scene.geometry).unwrap();
    scene.device.release_array(scene.positions).unwrap();
    scene.device.frame_ready(scene.frame, WaitMode::Wait).unwrap();

    let snapshot = backend.last().unwrap();
    let positions = snapshot.world.surfaces[0]
        .geometry
        .get("vertex.position")
        .and_then(|v| v.as_array())
        .unwrap();
    assert_eq!(positions.len(), 4);
    assert_eq!(positions.vec3_at(0).map(|p| p.to_array()), Some([-1.0, -1.0, 3.0]));
}

#[test]
fn test_invalid_array_arguments() {
    let (mut device, sink) = device(Arc::new(RecordingBackend::new()));
    assert!(matches!(
        device.new_array1d(DataType::Float32, 0, Vec::<f32>::new()),
        Err(DeviceError::InvalidArgument(_))
    ));
    assert!(matches!(
        device.new_array1d(DataType::String, 1, vec![0u8]),
        Err(DeviceError::InvalidArgument(_))
    ));
    assert!(matches!(
        device.new_array1d(DataType::Float32Vec3, 2, vec![0.0f32; 3]),
        Err(DeviceError::InvalidArgument(_))
    ));
    // The component count overflows instead of mismatching
    assert!(matches!(
        device.new_array1d(DataType::Float32Vec3, usize::MAX, vec![0.0f32; 3]),
        Err(DeviceError::InvalidArgument(_))
    ));
    assert_eq!(sink.count(Severity::Error), 4);
    assert_eq!(device.array_count(), 0);
}

#[test]
fn test_zero_copy_shares_caller_memory() {
    let (mut device, _) = device(Arc::new(RecordingBackend::new()));
    device.set_device_param("usd::serialize.location", ".").unwrap();
    device.set_device_param("memory.zeroCopy", true).unwrap();
    device.commit_device().unwrap();

    let data: Arc<[f32]> = Arc::from(vec![1.0f32, 2.0, 3.0]);
    let handle = device.new_array1d(DataType::Float32, 3, data.clone()).unwrap();
    match device.array(handle).unwrap().components() {
        strata_core::ArrayComponents::F32(shared) => assert!(Arc::ptr_eq(shared, &data)),
        other => panic!("unexpected components {:?}", other),
    }
}

#[test]
fn test_retained_array_survives_one_release() {
    let (mut device, sink) = device(Arc::new(RecordingBackend::new()));
    device.set_device_param("memory.zeroCopy", true).unwrap();
    device.commit_device().unwrap();
    let frees = Arc::new(AtomicUsize::new(0));
    let counter = frees.clone();
    let source = ArraySource::from(vec![0.0f32; 6]).with_deleter(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let positions = device.new_array1d(DataType::Float32Vec3, 2, source).unwrap();
    device.retain_array(positions).unwrap();
    assert_eq!(device.array_ref_count(positions), Some((2, 0)));

    device.release_array(positions).unwrap();
    assert_eq!(device.array_element_count(positions).unwrap(), 2);

    let geometry = device.new_geometry("sphere").unwrap();
    device.set_param(geometry, "vertex.position", positions).unwrap();
    device.release_array(positions).unwrap();

    // The client let go, the staged parameter did not
    assert!(matches!(
        device.array(positions),
        Err(DeviceError::UseAfterFree(StaleHandle::Array(_)))
    ));
    assert_eq!(device.array_ref_count(positions), Some((0, 1)));
    assert_eq!(frees.load(Ordering::SeqCst), 0);
    assert!(matches!(
        device.retain_array(positions),
        Err(DeviceError::UseAfterFree(StaleHandle::Array(_)))
    ));
    assert_eq!(sink.count(Severity::FatalError), 2);

    device.unset_param(geometry, "vertex.position").unwrap();
    assert_eq!(device.array_ref_count(positions), None);
    assert_eq!(frees.load(Ordering::SeqCst), 1);
}

#[test]
fn test_copy_policy_frees_caller_buffer_at_creation() {
    let (mut device, _) = device(Arc::new(RecordingBackend::new()));
    let frees = Arc::new(AtomicUsize::new(0));
    let counter = frees.clone();
    let source = ArraySource::from(vec![1.0f32, 2.0]).with_deleter(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let radii = device.new_array1d(DataType::Float32, 2, source).unwrap();
    assert_eq!(frees.load(Ordering::SeqCst), 1);
    assert_eq!(device.array(radii).unwrap().scalar_at(1), Some(2.0));

    device.release_array(radii).unwrap();
    drop(device);
    assert_eq!(frees.load(Ordering::SeqCst), 1);
}
