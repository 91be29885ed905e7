//! Strata core: a scene description device.
//!
//! Clients create typed scene objects (camera, geometry, material, surface,
//! light, group, instance, world, frame) through a [`Device`], stage
//! parameters on them and commit them through a validating two-phase
//! lifecycle. Rendering a frame snapshots the committed scene graph and
//! hands it to a [`SerializationBackend`] on a background thread.
//!
//! ```no_run
//! use std::sync::Arc;
//! use strata_core::{Device, LogSink, RecordingBackend, WaitMode};
//!
//! # fn main() -> strata_core::DeviceResult<()> {
//! let mut device = Device::new(Arc::new(RecordingBackend::new()), Arc::new(LogSink))?;
//! device.commit_device()?;
//! let world = device.new_world()?;
//! device.commit(world)?;
//! let frame = device.new_frame()?;
//! device.set_param(frame, "world", strata_core::ParamValue::world(world))?;
//! device.commit(frame)?;
//! device.render_frame(frame)?;
//! device.frame_ready(frame, WaitMode::Wait)?;
//! # Ok(())
//! # }
//! ```

pub mod array;
pub mod backend;
pub mod device;
pub mod diagnostics;
pub mod error;
pub mod glyph;
pub mod handle;
pub mod object;
pub mod params;
pub mod registry;
pub mod render;
pub mod schema;
pub mod settings;
pub mod snapshot;
pub mod types;
pub mod validate;
pub mod value;

pub use array::{ArrayComponents, ArrayData, ArrayMemoryPolicy, ArraySource};
pub use backend::{JsonFileBackend, RecordingBackend, SerializationBackend};
pub use device::Device;
pub use diagnostics::{CollectingSink, LogSink, Severity, Status, StatusCode, StatusSink, StatusSource};
pub use error::{BackendError, CommitError, CommitRule, DeviceError, DeviceResult, StaleHandle};
pub use glyph::{GlyphInstance, GlyphSet, GlyphShape};
pub use handle::{ArrayHandle, ObjectHandle};
pub use object::{usd_identifier, CameraType, GeometryType, LightType, MaterialType, ObjectType};
pub use params::ObjectState;
pub use render::WaitMode;
pub use settings::DeviceSettings;
pub use snapshot::{
    GroupSnapshot, InstanceSnapshot, ObjectSnapshot, OutputSettings, PreviewSurface, SceneSnapshot, SnapshotValue,
    SurfaceSnapshot, WorldSnapshot,
};
pub use types::{DataType, ObjectKind};
pub use value::{ObjectRef, ParamValue};
