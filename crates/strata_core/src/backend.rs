//! Serialization backends: the consumers of scene snapshots.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::BackendError;
use crate::snapshot::{OutputSettings, SceneSnapshot};

/// Receives one fully resolved snapshot per render.
///
/// Called from render threads; several frames may be written concurrently.
pub trait SerializationBackend: Send + Sync {
    fn write_snapshot(&self, snapshot: &SceneSnapshot) -> Result<(), BackendError>;
}

/// Keeps every snapshot in memory.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    snapshots: Mutex<Vec<Arc<SceneSnapshot>>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshots(&self) -> Vec<Arc<SceneSnapshot>> {
        self.snapshots.lock().clone()
    }

    pub fn last(&self) -> Option<Arc<SceneSnapshot>> {
        self.snapshots.lock().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.snapshots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.lock().is_empty()
    }
}

impl SerializationBackend for RecordingBackend {
    fn write_snapshot(&self, snapshot: &SceneSnapshot) -> Result<(), BackendError> {
        self.snapshots.lock().push(Arc::new(snapshot.clone()));
        Ok(())
    }
}

/// Directory name prefix of numbered output sessions.
pub const SESSION_PREFIX: &str = "Session_";

/// Writes each snapshot as `<location>/Session_<n>/<frame name>.json`.
///
/// Output is pretty-printed unless the device asked for binary output, in
/// which case the compact encoding is used. The session directory is picked
/// on the first write to a location and kept for the backend's lifetime:
/// one past the highest existing session when a new session is requested,
/// otherwise the highest existing one.
#[derive(Debug, Default)]
pub struct JsonFileBackend {
    sessions: Mutex<HashMap<PathBuf, PathBuf>>,
}

impl JsonFileBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session directory for `output`, created on first use.
    pub fn session_dir(&self, output: &OutputSettings) -> Result<PathBuf, BackendError> {
        let mut sessions = self.sessions.lock();
        if let Some(dir) = sessions.get(&output.location) {
            return Ok(dir.clone());
        }

        let number = match (latest_session(&output.location)?, output.new_session) {
            (Some(latest), true) => latest + 1,
            (Some(latest), false) => latest,
            (None, _) => 0,
        };
        let dir = output.location.join(format!("{}{}", SESSION_PREFIX, number));
        fs::create_dir_all(&dir)?;
        log::debug!("Opened output session {}", dir.display());
        sessions.insert(output.location.clone(), dir.clone());
        Ok(dir)
    }

    /// Path the frame named `frame` is written to.
    pub fn output_path(&self, output: &OutputSettings, frame: &str) -> Result<PathBuf, BackendError> {
        Ok(self.session_dir(output)?.join(format!("{}.json", frame)))
    }

    /// Encode the snapshot the way it is written to disk.
    pub fn encode(snapshot: &SceneSnapshot) -> Result<Vec<u8>, BackendError> {
        let bytes = if snapshot.output.binary {
            serde_json::to_vec(snapshot)?
        } else {
            serde_json::to_vec_pretty(snapshot)?
        };
        Ok(bytes)
    }
}

impl SerializationBackend for JsonFileBackend {
    fn write_snapshot(&self, snapshot: &SceneSnapshot) -> Result<(), BackendError> {
        if !snapshot.output.enable_saving {
            log::debug!("Saving disabled, skipping frame '{}'", snapshot.name());
            return Ok(());
        }

        let bytes = Self::encode(snapshot)?;
        let path = self.output_path(&snapshot.output, snapshot.name())?;
        fs::write(&path, bytes)?;
        log::debug!("Wrote frame '{}' to {}", snapshot.name(), path.display());
        Ok(())
    }
}

/// Highest `Session_<n>` directory under `location`, if any.
fn latest_session(location: &Path) -> io::Result<Option<u32>> {
    let entries = match fs::read_dir(location) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err),
    };

    let mut latest = None;
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let number = entry
            .file_name()
            .to_str()
            .and_then(|name| name.strip_prefix(SESSION_PREFIX))
            .and_then(|n| n.parse::<u32>().ok());
        latest = latest.max(number);
    }
    Ok(latest)
}
