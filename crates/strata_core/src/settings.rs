//! Device-level configuration.
//!
//! Device parameters are staged like object parameters (names match
//! case-insensitively) and resolved into a [`DeviceSettings`] value when the
//! device itself is committed.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::array::ArrayMemoryPolicy;
use crate::diagnostics::Severity;
use crate::params::ParameterTable;
use crate::value::ParamValue;

/// Environment variable consulted when no output location is set.
pub const LOCATION_ENV: &str = "STRATA_SERIALIZE_LOCATION";

pub const SERIALIZE_LOCATION: &str = "usd::serialize.location";
pub const OUTPUT_BINARY: &str = "usd::serialize.outputbinary";
pub const NEW_SESSION: &str = "usd::serialize.newsession";
pub const PREVIEW_SURFACE_SHADER: &str = "usd::output.previewsurfaceshader";
pub const OUTPUT_MATERIAL: &str = "usd::output.material";
pub const TIME: &str = "usd::time";
pub const ENABLE_SAVING: &str = "usd::enablesaving";
pub const ZERO_COPY: &str = "memory.zerocopy";
pub const RENDER_THREADS: &str = "render.threads";

const KNOWN: &[&str] = &[
    SERIALIZE_LOCATION,
    OUTPUT_BINARY,
    NEW_SESSION,
    PREVIEW_SURFACE_SHADER,
    OUTPUT_MATERIAL,
    TIME,
    ENABLE_SAVING,
    ZERO_COPY,
    RENDER_THREADS,
    "name",
];

/// Canonical (lower-case) form of a device parameter name.
pub fn device_param_key(name: &str) -> String {
    name.to_ascii_lowercase()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeviceSettings {
    /// Directory snapshots are written to.
    pub serialize_location: PathBuf,
    /// Compact instead of human-readable output.
    pub output_binary: bool,
    /// Write into a fresh numbered session directory.
    pub new_session: bool,
    /// Attach preview shading inputs to every surface with a material.
    pub preview_surface_shader: bool,
    /// Serialize surface materials.
    pub output_material: bool,
    /// Timestep stamped on every snapshot.
    pub time: f64,
    /// Backends skip writing when false.
    pub enable_saving: bool,
    /// Share caller array memory instead of copying it.
    pub zero_copy: bool,
    /// Render thread count; 0 picks one per core.
    pub render_threads: usize,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            serialize_location: PathBuf::from("./"),
            output_binary: false,
            new_session: true,
            preview_surface_shader: false,
            output_material: true,
            time: 0.0,
            enable_saving: true,
            zero_copy: false,
            render_threads: 0,
        }
    }
}

/// Settings resolved from device parameters, plus the diagnostics raised
/// while resolving them.
#[derive(Debug)]
pub struct ResolvedSettings {
    pub settings: DeviceSettings,
    pub notes: Vec<(Severity, String)>,
}

impl DeviceSettings {
    pub fn memory_policy(&self) -> ArrayMemoryPolicy {
        if self.zero_copy {
            ArrayMemoryPolicy::ZeroCopy
        } else {
            ArrayMemoryPolicy::Copy
        }
    }

    /// Resolve committed device parameters, falling back to the process
    /// environment for the output location.
    pub fn resolve(params: &ParameterTable) -> Result<ResolvedSettings, String> {
        Self::resolve_with_env(params, |key| std::env::var(key).ok())
    }

    /// Like [`DeviceSettings::resolve`] with an explicit environment lookup.
    pub fn resolve_with_env(
        params: &ParameterTable,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<ResolvedSettings, String> {
        let mut settings = DeviceSettings::default();
        let mut notes = Vec::new();

        for (name, _) in params.iter() {
            if !KNOWN.contains(&name) {
                notes.push((Severity::Warning, format!("ignoring unrecognized device parameter '{}'", name)));
            }
        }

        match string_param(params, SERIALIZE_LOCATION)? {
            Some(location) => settings.serialize_location = PathBuf::from(location),
            None => match env(LOCATION_ENV).filter(|v| !v.is_empty()) {
                Some(location) => {
                    notes.push((
                        Severity::Info,
                        format!("serialize location taken from {}: {}", LOCATION_ENV, location),
                    ));
                    settings.serialize_location = PathBuf::from(location);
                }
                None => notes.push((
                    Severity::Warning,
                    format!(
                        "no serialize location set and {} is empty, writing to {}",
                        LOCATION_ENV,
                        settings.serialize_location.display()
                    ),
                )),
            },
        }

        if let Some(v) = bool_param(params, OUTPUT_BINARY)? {
            settings.output_binary = v;
        }
        if let Some(v) = bool_param(params, NEW_SESSION)? {
            settings.new_session = v;
        }
        if let Some(v) = bool_param(params, PREVIEW_SURFACE_SHADER)? {
            settings.preview_surface_shader = v;
        }
        if let Some(v) = bool_param(params, OUTPUT_MATERIAL)? {
            settings.output_material = v;
        }
        if let Some(value) = params.get(TIME) {
            settings.time = value
                .as_f64()
                .ok_or_else(|| type_error(TIME, "FLOAT64|FLOAT32", value))?;
        }
        if let Some(v) = bool_param(params, ENABLE_SAVING)? {
            settings.enable_saving = v;
        }
        if let Some(v) = bool_param(params, ZERO_COPY)? {
            settings.zero_copy = v;
        }
        if let Some(v) = int_param(params, RENDER_THREADS)? {
            settings.render_threads =
                usize::try_from(v).map_err(|_| format!("'{}' must not be negative, got {}", RENDER_THREADS, v))?;
        }

        Ok(ResolvedSettings { settings, notes })
    }
}

fn type_error(name: &str, expected: &str, value: &ParamValue) -> String {
    format!("'{}' expects {}, got {}", name, expected, value.data_type())
}

fn bool_param(params: &ParameterTable, name: &str) -> Result<Option<bool>, String> {
    params
        .get(name)
        .map(|value| value.as_bool().ok_or_else(|| type_error(name, "BOOL", value)))
        .transpose()
}

fn string_param<'a>(params: &'a ParameterTable, name: &str) -> Result<Option<&'a str>, String> {
    params
        .get(name)
        .map(|value| value.as_str().ok_or_else(|| type_error(name, "STRING", value)))
        .transpose()
}

fn int_param(params: &ParameterTable, name: &str) -> Result<Option<i64>, String> {
    params
        .get(name)
        .map(|value| match value {
            ParamValue::Int32(_) | ParamValue::UInt32(_) => value.as_i64().ok_or_else(|| type_error(name, "INT32|UINT32", value)),
            _ => Err(type_error(name, "INT32|UINT32", value)),
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(entries: &[(&str, ParamValue)]) -> ParameterTable {
        let mut table = ParameterTable::new();
        for (name, value) in entries {
            table.insert(device_param_key(name), value.clone());
        }
        table
    }

    #[test]
    fn test_defaults_warn_about_location() {
        let resolved = DeviceSettings::resolve_with_env(&ParameterTable::new(), |_| None).unwrap();
        assert_eq!(resolved.settings, DeviceSettings::default());
        assert_eq!(resolved.notes.len(), 1);
        assert_eq!(resolved.notes[0].0, Severity::Warning);
    }

    #[test]
    fn test_location_from_environment() {
        let resolved = DeviceSettings::resolve_with_env(&ParameterTable::new(), |key| {
            (key == LOCATION_ENV).then(|| "/tmp/out".to_string())
        })
        .unwrap();
        assert_eq!(resolved.settings.serialize_location, PathBuf::from("/tmp/out"));
        assert_eq!(resolved.notes[0].0, Severity::Info);
    }

    #[test]
    fn test_parameters_override_defaults() {
        let params = table(&[
            ("usd::serialize.location", ParamValue::from("/data/scenes")),
            ("usd::serialize.outputBinary", ParamValue::Bool(true)),
            ("usd::output.material", ParamValue::Bool(false)),
            ("usd::time", ParamValue::Float64(2.5)),
            ("render.threads", ParamValue::UInt32(2)),
            ("usd::serialize.newSession", ParamValue::Bool(false)),
            ("usd::output.previewSurfaceShader", ParamValue::Bool(true)),
        ]);
        let resolved = DeviceSettings::resolve_with_env(&params, |_| None).unwrap();
        let settings = resolved.settings;

        assert_eq!(settings.serialize_location, PathBuf::from("/data/scenes"));
        assert!(settings.output_binary);
        assert!(!settings.output_material);
        assert_eq!(settings.time, 2.5);
        assert_eq!(settings.render_threads, 2);
        assert!(!settings.new_session);
        assert!(settings.preview_surface_shader);
        assert!(resolved.notes.is_empty());
    }

    #[test]
    fn test_invalid_parameters() {
        let params = table(&[("usd::enableSaving", ParamValue::from("yes"))]);
        let err = DeviceSettings::resolve_with_env(&params, |_| None).unwrap_err();
        assert!(err.contains("BOOL"));

        let params = table(&[("render.threads", ParamValue::Int32(-2))]);
        assert!(DeviceSettings::resolve_with_env(&params, |_| None).is_err());
    }

    #[test]
    fn test_unknown_parameter_warns() {
        let params = table(&[
            ("usd::serialize.location", ParamValue::from(".")),
            ("usd::garbageCollect", ParamValue::Bool(true)),
        ]);
        let resolved = DeviceSettings::resolve_with_env(&params, |_| None).unwrap();
        assert_eq!(resolved.notes.len(), 1);
        assert!(resolved.notes[0].1.contains("usd::garbagecollect"));
    }

    #[test]
    fn test_remote_connection_parameters_are_not_recognized() {
        let params = table(&[
            ("usd::serialize.location", ParamValue::from(".")),
            ("usd::serialize.hostName", ParamValue::from("render-farm")),
            ("usd::connection.logVerbosity", ParamValue::Int32(3)),
        ]);
        let resolved = DeviceSettings::resolve_with_env(&params, |_| None).unwrap();
        assert_eq!(resolved.notes.len(), 2);
        assert!(resolved.notes.iter().all(|(severity, _)| *severity == Severity::Warning));
    }

    #[test]
    fn test_settings_serde() {
        let settings: DeviceSettings = serde_json::from_str(r#"{"outputBinary": true}"#).unwrap();
        assert!(settings.output_binary);
        assert!(settings.enable_saving);
    }
}
