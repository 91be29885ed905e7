//! The device: owner of every object and array, and the entry point for
//! all client operations.
//!
//! All mutation goes through `&mut Device` and is synchronous. Only
//! [`Device::render_frame`] does work in the background, on snapshots that
//! no later edit can reach.

use std::sync::Arc;

use crate::array::{ArrayData, ArrayError, ArraySource, ArrayStore};
use crate::backend::SerializationBackend;
use crate::diagnostics::{Severity, Status, StatusCode, StatusSink, StatusSource};
use crate::error::{DeviceError, DeviceResult, StaleHandle};
use crate::handle::{ArrayHandle, ObjectHandle};
use crate::object::{ObjectType, SceneObject};
use crate::params::{ObjectState, ParameterTable};
use crate::registry::ObjectRegistry;
use crate::render::{FrameRenderer, ReadyError, WaitMode};
use crate::settings::{device_param_key, DeviceSettings, RENDER_THREADS};
use crate::snapshot::SnapshotBuilder;
use crate::types::{DataType, ObjectKind};
use crate::validate::CommitValidator;
use crate::value::ParamValue;

pub struct Device {
    settings: DeviceSettings,
    device_params: ParameterTable,
    device_committed: bool,
    warned_uncommitted: bool,
    arrays: ArrayStore,
    objects: ObjectRegistry,
    renderer: FrameRenderer,
    backend: Arc<dyn SerializationBackend>,
    sink: Arc<dyn StatusSink>,
}

impl Device {
    /// Create a device with default settings.
    ///
    /// The device still expects its parameters to be committed with
    /// [`Device::commit_device`] before objects are created.
    pub fn new(backend: Arc<dyn SerializationBackend>, sink: Arc<dyn StatusSink>) -> DeviceResult<Self> {
        let mut device = Self::with_settings(backend, sink, DeviceSettings::default())?;
        device.device_committed = false;
        Ok(device)
    }

    /// Create a device from already resolved settings.
    pub fn with_settings(
        backend: Arc<dyn SerializationBackend>,
        sink: Arc<dyn StatusSink>,
        settings: DeviceSettings,
    ) -> DeviceResult<Self> {
        let renderer = FrameRenderer::new(settings.render_threads)?;
        log::debug!("Device created with {} render threads", renderer.thread_count());
        Ok(Self {
            arrays: ArrayStore::new(settings.memory_policy()),
            settings,
            device_params: ParameterTable::new(),
            device_committed: true,
            warned_uncommitted: false,
            objects: ObjectRegistry::new(),
            renderer,
            backend,
            sink,
        })
    }

    // ---- Diagnostics ----

    fn report(&self, severity: Severity, code: StatusCode, source: StatusSource, message: impl Into<String>) {
        self.sink.report(&Status {
            severity,
            code,
            source,
            message: message.into(),
        });
    }

    /// Report `err` through the sink and return it.
    fn fail<T>(&self, source: StatusSource, err: DeviceError) -> DeviceResult<T> {
        let severity = match err {
            DeviceError::UseAfterFree(_) => Severity::FatalError,
            _ => Severity::Error,
        };
        self.report(severity, err.status_code(), source, err.to_string());
        Err(err)
    }

    fn source_of(handle: ObjectHandle, object: &SceneObject) -> StatusSource {
        StatusSource::Object {
            kind: object.kind(),
            handle,
            name: object.name(),
        }
    }

    fn object(&self, handle: ObjectHandle) -> DeviceResult<&SceneObject> {
        match self.objects.get(handle) {
            Some(object) => Ok(object),
            None => self.fail(
                StatusSource::Device,
                DeviceError::UseAfterFree(StaleHandle::Object(handle)),
            ),
        }
    }

    // ---- Device parameters ----

    /// Stage a device parameter. Names match case-insensitively.
    pub fn set_device_param(&mut self, name: &str, value: impl Into<ParamValue>) -> DeviceResult<()> {
        let value = value.into();
        if matches!(value, ParamValue::Array(_) | ParamValue::Object(_)) {
            return self.fail(
                StatusSource::Device,
                DeviceError::InvalidArgument(format!(
                    "device parameter '{}' cannot hold a {}",
                    name,
                    value.data_type()
                )),
            );
        }
        self.device_params.insert(device_param_key(name), value);
        Ok(())
    }

    pub fn unset_device_param(&mut self, name: &str) {
        self.device_params.remove(&device_param_key(name));
    }

    /// Resolve staged device parameters into the active settings.
    ///
    /// On failure the previous settings stay active.
    pub fn commit_device(&mut self) -> DeviceResult<()> {
        let resolved = match DeviceSettings::resolve(&self.device_params) {
            Ok(resolved) => resolved,
            Err(message) => return self.fail(StatusSource::Device, DeviceError::InvalidArgument(message)),
        };
        for (severity, message) in resolved.notes {
            self.report(severity, StatusCode::NoError, StatusSource::Device, message);
        }

        let mut settings = resolved.settings;
        if self.device_params.contains(RENDER_THREADS) && settings.render_threads != self.settings.render_threads {
            self.report(
                Severity::Warning,
                StatusCode::InvalidOperation,
                StatusSource::Device,
                "render.threads only applies when the device is created; keeping the current pool",
            );
        }
        settings.render_threads = self.settings.render_threads;

        self.arrays.set_policy(settings.memory_policy());
        self.settings = settings;
        self.device_committed = true;
        log::debug!("Device settings committed: {:?}", self.settings);
        Ok(())
    }

    pub fn settings(&self) -> &DeviceSettings {
        &self.settings
    }

    // ---- Arrays ----

    /// Create a 1-D array of `count` elements of `element_type`.
    pub fn new_array1d(
        &mut self,
        element_type: DataType,
        count: usize,
        source: impl Into<ArraySource>,
    ) -> DeviceResult<ArrayHandle> {
        let objects = &self.objects;
        match self
            .arrays
            .create(element_type, count, source.into(), |h| objects.kind_of(h))
        {
            Ok(handle) => Ok(handle),
            Err(err) => {
                let err = array_error(err);
                self.fail(StatusSource::Device, err)
            }
        }
    }

    pub fn retain_array(&mut self, handle: ArrayHandle) -> DeviceResult<()> {
        match self.arrays.retain(handle) {
            Ok(()) => Ok(()),
            Err(err) => {
                let err = array_error(err);
                self.fail(StatusSource::Array(handle), err)
            }
        }
    }

    /// Drop a client reference; the array lives on while parameters use it.
    pub fn release_array(&mut self, handle: ArrayHandle) -> DeviceResult<()> {
        match self.arrays.release(handle) {
            Ok(()) => Ok(()),
            Err(err) => {
                let err = array_error(err);
                self.fail(StatusSource::Array(handle), err)
            }
        }
    }

    /// Contents of an array the client still holds.
    pub fn array(&self, handle: ArrayHandle) -> DeviceResult<Arc<ArrayData>> {
        match self.arrays.get(handle) {
            Ok(data) => Ok(data.clone()),
            Err(err) => self.fail(StatusSource::Array(handle), array_error(err)),
        }
    }

    pub fn array_element_count(&self, handle: ArrayHandle) -> DeviceResult<usize> {
        self.array(handle).map(|data| data.len())
    }

    pub fn array_element_type(&self, handle: ArrayHandle) -> DeviceResult<DataType> {
        self.array(handle).map(|data| data.element_type())
    }

    /// `(client, parameter)` references of an array that still exists.
    pub fn array_ref_count(&self, handle: ArrayHandle) -> Option<(u32, u32)> {
        self.arrays.ref_counts(handle)
    }

    pub fn array_count(&self) -> usize {
        self.arrays.len()
    }

    // ---- Objects ----

    /// Create an object of `kind` with the given subtype.
    pub fn new_object(&mut self, kind: ObjectKind, subtype: &str) -> DeviceResult<ObjectHandle> {
        let Some(object_type) = ObjectType::parse(kind, subtype) else {
            return self.fail(
                StatusSource::Device,
                DeviceError::UnsupportedSubtype {
                    kind,
                    subtype: subtype.to_string(),
                },
            );
        };

        if !self.device_committed && !self.warned_uncommitted {
            self.warned_uncommitted = true;
            self.report(
                Severity::Warning,
                StatusCode::InvalidOperation,
                StatusSource::Device,
                "objects created before the device was committed; default settings apply",
            );
        }

        let handle = self.objects.create(object_type);
        log::debug!("Created {} {:?}", object_type, handle);
        Ok(handle)
    }

    pub fn new_camera(&mut self, subtype: &str) -> DeviceResult<ObjectHandle> {
        self.new_object(ObjectKind::Camera, subtype)
    }

    pub fn new_geometry(&mut self, subtype: &str) -> DeviceResult<ObjectHandle> {
        self.new_object(ObjectKind::Geometry, subtype)
    }

    pub fn new_material(&mut self, subtype: &str) -> DeviceResult<ObjectHandle> {
        self.new_object(ObjectKind::Material, subtype)
    }

    pub fn new_light(&mut self, subtype: &str) -> DeviceResult<ObjectHandle> {
        self.new_object(ObjectKind::Light, subtype)
    }

    pub fn new_surface(&mut self) -> DeviceResult<ObjectHandle> {
        self.new_object(ObjectKind::Surface, "")
    }

    pub fn new_group(&mut self) -> DeviceResult<ObjectHandle> {
        self.new_object(ObjectKind::Group, "")
    }

    /// An instance places a group into the world under a transform.
    pub fn new_instance(&mut self) -> DeviceResult<ObjectHandle> {
        self.new_object(ObjectKind::Instance, "")
    }

    pub fn new_world(&mut self) -> DeviceResult<ObjectHandle> {
        self.new_object(ObjectKind::World, "")
    }

    pub fn new_frame(&mut self) -> DeviceResult<ObjectHandle> {
        self.new_object(ObjectKind::Frame, "")
    }

    /// Stage a parameter value. Types are only checked at commit.
    pub fn set_param(&mut self, handle: ObjectHandle, name: &str, value: impl Into<ParamValue>) -> DeviceResult<()> {
        let value = value.into();
        self.object(handle)?;
        if let Some(array) = value.as_array() {
            if let Err(err) = self.arrays.get(array) {
                let err = array_error(err);
                return self.fail(StatusSource::Array(array), err);
            }
        }

        let Some(object) = self.objects.get_mut(handle) else {
            return Err(DeviceError::UseAfterFree(StaleHandle::Object(handle)));
        };
        object.params.set(name, value, &mut self.arrays);
        Ok(())
    }

    /// Remove a staged parameter value.
    pub fn unset_param(&mut self, handle: ObjectHandle, name: &str) -> DeviceResult<()> {
        self.object(handle)?;
        if let Some(object) = self.objects.get_mut(handle) {
            object.params.unset(name, &mut self.arrays);
        }
        Ok(())
    }

    /// Validate staged parameters and publish them as the committed state.
    ///
    /// All-or-nothing: on failure the committed state is untouched. A clean
    /// object that is already committed is left alone.
    pub fn commit(&mut self, handle: ObjectHandle) -> DeviceResult<()> {
        let object = self.object(handle)?;
        if object.state() == ObjectState::Committed {
            return Ok(());
        }

        let source = Self::source_of(handle, object);
        let report = match CommitValidator::new(&self.arrays, &self.objects).validate(handle, object) {
            Ok(report) => report,
            Err(err) => return self.fail(source, DeviceError::Commit(err)),
        };
        for warning in report.warnings {
            self.report(Severity::Warning, StatusCode::NoError, source.clone(), warning);
        }

        if let Some(object) = self.objects.get_mut(handle) {
            object.params.publish(&mut self.arrays);
            log::debug!("Committed {} '{}'", object.object_type(), object.name());
        }
        Ok(())
    }

    /// Destroy an object, releasing the arrays its parameters reference.
    pub fn destroy(&mut self, handle: ObjectHandle) -> DeviceResult<()> {
        let Some(mut object) = self.objects.remove(handle) else {
            return self.fail(
                StatusSource::Device,
                DeviceError::UseAfterFree(StaleHandle::Object(handle)),
            );
        };
        object.params.clear(&mut self.arrays);
        if object.kind() == ObjectKind::Frame {
            self.renderer.forget(handle);
        }
        log::debug!("Destroyed {} '{}'", object.object_type(), object.default_name());
        Ok(())
    }

    /// Committed value of a parameter.
    pub fn get_param(&self, handle: ObjectHandle, name: &str) -> DeviceResult<Option<ParamValue>> {
        let object = self.object(handle)?;
        Ok(object.params().committed().and_then(|t| t.get(name)).cloned())
    }

    /// Staged value of a parameter.
    pub fn get_staged_param(&self, handle: ObjectHandle, name: &str) -> DeviceResult<Option<ParamValue>> {
        let object = self.object(handle)?;
        Ok(object.params().staged().get(name).cloned())
    }

    pub fn object_state(&self, handle: ObjectHandle) -> DeviceResult<ObjectState> {
        self.object(handle).map(SceneObject::state)
    }

    pub fn object_kind(&self, handle: ObjectHandle) -> DeviceResult<ObjectKind> {
        self.object(handle).map(SceneObject::kind)
    }

    pub fn object_type(&self, handle: ObjectHandle) -> DeviceResult<ObjectType> {
        self.object(handle).map(SceneObject::object_type)
    }

    /// Name the object is serialized under.
    pub fn object_name(&self, handle: ObjectHandle) -> DeviceResult<String> {
        self.object(handle).map(SceneObject::name)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    // ---- Rendering ----

    /// Snapshot the committed state reachable from `frame` and hand it to
    /// the backend in the background.
    pub fn render_frame(&mut self, frame: ObjectHandle) -> DeviceResult<()> {
        let object = self.object(frame)?;
        let source = Self::source_of(frame, object);
        if object.kind() != ObjectKind::Frame {
            return self.fail(
                source,
                DeviceError::InvalidArgument(format!("cannot render a {}", object.kind())),
            );
        }
        if object.params().committed().is_none() {
            return self.fail(
                source,
                DeviceError::InvalidState("frame must be committed before rendering".to_string()),
            );
        }

        let built = SnapshotBuilder::new(&self.arrays, &self.objects, &self.settings).build(frame);
        let (snapshot, issues) = match built {
            Ok(built) => built,
            Err(message) => return self.fail(source, DeviceError::InvalidState(message)),
        };
        for issue in issues {
            let code = match issue.severity {
                Severity::Error => StatusCode::InvalidOperation,
                _ => StatusCode::NoError,
            };
            self.report(issue.severity, code, issue.source, issue.message);
        }

        log::debug!("Dispatching render of frame '{}'", snapshot.name());
        self.renderer.dispatch(frame, snapshot, self.backend.clone());
        Ok(())
    }

    /// Whether every render dispatched on `frame` has finished.
    ///
    /// With [`WaitMode::Wait`] this blocks until they have, and returns
    /// `true`.
    pub fn frame_ready(&mut self, frame: ObjectHandle, mode: WaitMode) -> DeviceResult<bool> {
        let source = Self::source_of(frame, self.object(frame)?);
        match self.renderer.ready(frame, mode) {
            Ok(ready) => Ok(ready),
            Err(ReadyError::NeverDispatched) => self.fail(
                source,
                DeviceError::InvalidState("no render was dispatched on this frame".to_string()),
            ),
            Err(ReadyError::Failed(message)) => {
                let frame = match &source {
                    StatusSource::Object { name, .. } => name.clone(),
                    _ => String::new(),
                };
                self.fail(source, DeviceError::RenderFailed { frame, message })
            }
        }
    }
}

fn array_error(err: ArrayError) -> DeviceError {
    match err {
        ArrayError::Released(handle) => DeviceError::UseAfterFree(StaleHandle::Array(handle)),
        other => DeviceError::InvalidArgument(other.to_string()),
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.renderer.wait_all();

        for handle in self.objects.handles() {
            if let Some(mut object) = self.objects.remove(handle) {
                object.params.clear(&mut self.arrays);
            }
        }

        for handle in self.arrays.clear() {
            self.report(
                Severity::Debug,
                StatusCode::NoError,
                StatusSource::Array(handle),
                "array was never released by the client",
            );
        }
        log::debug!("Device destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RecordingBackend;
    use crate::diagnostics::CollectingSink;
    use crate::error::CommitRule;

    fn device() -> (Device, Arc<CollectingSink>) {
        let sink = Arc::new(CollectingSink::new());
        let device = Device::with_settings(
            Arc::new(RecordingBackend::new()),
            sink.clone(),
            DeviceSettings {
                render_threads: 1,
                ..DeviceSettings::default()
            },
        )
        .unwrap();
        (device, sink)
    }

    #[test]
    fn test_unsupported_subtype() {
        let (mut device, sink) = device();
        let result = device.new_geometry("teapot");
        assert!(matches!(result, Err(DeviceError::UnsupportedSubtype { .. })));
        assert_eq!(sink.count(Severity::Error), 1);
        assert_eq!(device.object_count(), 0);
    }

    #[test]
    fn test_uncommitted_device_warns_once() {
        let sink = Arc::new(CollectingSink::new());
        let mut device = Device::new(Arc::new(RecordingBackend::new()), sink.clone()).unwrap();
        device.new_world().unwrap();
        device.new_world().unwrap();
        assert_eq!(sink.count(Severity::Warning), 1);
    }

    #[test]
    fn test_commit_device_applies_settings() {
        let (mut device, sink) = device();
        device.set_device_param("usd::serialize.location", "/tmp/strata").unwrap();
        device.set_device_param("USD::Serialize.OutputBinary", true).unwrap();
        device.set_device_param("memory.zeroCopy", true).unwrap();
        device.commit_device().unwrap();

        assert!(device.settings().output_binary);
        assert!(device.settings().zero_copy);
        assert_eq!(device.settings().render_threads, 1);
        assert!(sink.is_empty());

        device.set_device_param("usd::time", "soon").unwrap();
        assert!(matches!(device.commit_device(), Err(DeviceError::InvalidArgument(_))));
        assert!(device.settings().output_binary);
    }

    #[test]
    fn test_staged_values_are_invisible_until_commit() {
        let (mut device, _) = device();
        let camera = device.new_camera("perspective").unwrap();
        device.set_param(camera, "aspect", 2.0f32).unwrap();

        assert_eq!(device.get_param(camera, "aspect").unwrap(), None);
        assert_eq!(device.get_staged_param(camera, "aspect").unwrap(), Some(ParamValue::Float32(2.0)));
        assert_eq!(device.object_state(camera).unwrap(), ObjectState::Staged);

        device.commit(camera).unwrap();
        assert_eq!(device.get_param(camera, "aspect").unwrap(), Some(ParamValue::Float32(2.0)));
        assert_eq!(device.object_state(camera).unwrap(), ObjectState::Committed);
    }

    #[test]
    fn test_failed_commit_reports_and_keeps_state() {
        let (mut device, sink) = device();
        let surface = device.new_surface().unwrap();
        let err = device.commit(surface).unwrap_err();
        match err {
            DeviceError::Commit(err) => {
                assert_eq!(err.param, "geometry");
                assert_eq!(err.rule, CommitRule::MissingRequired);
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(device.object_state(surface).unwrap(), ObjectState::Uninitialized);
        assert_eq!(sink.count(Severity::Error), 1);
    }

    #[test]
    fn test_destroyed_handle_is_use_after_free() {
        let (mut device, sink) = device();
        let light = device.new_light("directional").unwrap();
        device.destroy(light).unwrap();

        assert!(matches!(
            device.set_param(light, "irradiance", 2.0f32),
            Err(DeviceError::UseAfterFree(StaleHandle::Object(h))) if h == light
        ));
        assert!(matches!(device.commit(light), Err(DeviceError::UseAfterFree(_))));
        assert!(matches!(device.destroy(light), Err(DeviceError::UseAfterFree(_))));
        assert_eq!(sink.count(Severity::FatalError), 3);
    }

    #[test]
    fn test_set_rejects_released_array() {
        let (mut device, _) = device();
        let geometry = device.new_geometry("glyph").unwrap();
        let positions = device.new_array1d(DataType::Float32Vec3, 1, vec![0.0f32; 3]).unwrap();
        device.release_array(positions).unwrap();

        assert!(matches!(
            device.set_param(geometry, "vertex.position", positions),
            Err(DeviceError::UseAfterFree(StaleHandle::Array(_)))
        ));
        assert_eq!(device.array_count(), 0);
    }

    #[test]
    fn test_render_requires_committed_frame() {
        let (mut device, _) = device();
        let frame = device.new_frame().unwrap();
        assert!(matches!(device.render_frame(frame), Err(DeviceError::InvalidState(_))));
        assert!(matches!(
            device.frame_ready(frame, WaitMode::NoWait),
            Err(DeviceError::InvalidState(_))
        ));

        let world = device.new_world().unwrap();
        assert!(matches!(device.render_frame(world), Err(DeviceError::InvalidArgument(_))));
    }

    #[test]
    fn test_teardown_reports_leaked_arrays() {
        let (mut device, sink) = device();
        device.new_array1d(DataType::Float32, 2, vec![1.0f32, 2.0]).unwrap();
        drop(device);
        assert_eq!(sink.count(Severity::Debug), 1);
    }
}
