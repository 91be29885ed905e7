//! Commit-time validation of staged parameters.
//!
//! Validation reads the staged table of one object and the current state of
//! the arrays and objects it references. It never mutates anything, so a
//! failed commit leaves the committed table exactly as it was.

use crate::array::{ArrayData, ArrayStore};
use crate::error::{CommitError, CommitRule};
use crate::handle::ObjectHandle;
use crate::object::{GeometryType, ObjectType, SceneObject};
use crate::params::ParameterTable;
use crate::registry::ObjectRegistry;
use crate::schema::{ParamSpec, Schema, INDEX, POSITION};
use crate::types::type_list;
use crate::value::ParamValue;

/// Non-fatal findings of a successful validation.
#[derive(Debug, Default, PartialEq)]
pub struct CommitReport {
    pub warnings: Vec<String>,
}

pub struct CommitValidator<'a> {
    arrays: &'a ArrayStore,
    objects: &'a ObjectRegistry,
}

impl<'a> CommitValidator<'a> {
    pub fn new(arrays: &'a ArrayStore, objects: &'a ObjectRegistry) -> Self {
        Self { arrays, objects }
    }

    /// Check the staged parameters of `object` against its schema.
    pub fn validate(&self, handle: ObjectHandle, object: &SceneObject) -> Result<CommitReport, CommitError> {
        let fail = |param: &str, rule: CommitRule| CommitError {
            object: handle,
            kind: object.kind(),
            name: object.name(),
            param: param.to_string(),
            rule,
        };

        let object_type = object.object_type();
        let schema = object_type.schema();
        let staged = object.params().staged();
        let mut report = CommitReport::default();

        for (name, value) in staged.iter() {
            let Some(spec) = schema.find(name) else {
                report.warnings.push(format!(
                    "ignoring unrecognized parameter '{}' of type {}",
                    name,
                    value.data_type()
                ));
                continue;
            };
            self.check_value(spec, value).map_err(|rule| fail(name, rule))?;
        }

        if let Some(spec) = schema.iter().find(|spec| spec.required && !staged.contains(spec.name)) {
            return Err(fail(spec.name, CommitRule::MissingRequired));
        }

        match object_type {
            ObjectType::Camera(_) => {
                let near = real_or_default(staged, schema, "near");
                let far = real_or_default(staged, schema, "far");
                if near >= far {
                    return Err(fail(
                        "near",
                        CommitRule::ValueOutOfRange(format!("{} must be less than far ({})", near, far)),
                    ));
                }
            }
            ObjectType::Geometry(geometry) => {
                self.check_geometry(geometry, staged, schema, &mut report)
                    .map_err(|(param, rule)| fail(param, rule))?;
            }
            _ => {}
        }

        Ok(report)
    }

    fn check_value(&self, spec: &ParamSpec, value: &ParamValue) -> Result<(), CommitRule> {
        let found = value.data_type();
        if !spec.accepts(found) {
            return Err(CommitRule::TypeMismatch {
                expected: type_list(spec.types),
                found,
            });
        }

        match value {
            ParamValue::Array(handle) => {
                let data = self
                    .arrays
                    .resolve(*handle)
                    .ok_or_else(|| CommitRule::DanglingReference("array".to_string()))?;
                if !spec.accepts_element(data.element_type()) {
                    return Err(CommitRule::ElementTypeMismatch {
                        expected: type_list(spec.elements),
                        found: data.element_type(),
                    });
                }
                self.check_object_elements(data)
            }
            ParamValue::Object(reference) => match self.objects.kind_of(reference.handle) {
                None => Err(CommitRule::DanglingReference(reference.kind.to_string())),
                Some(found) if found != reference.kind => Err(CommitRule::ReferenceKindMismatch {
                    expected: reference.kind,
                    found,
                }),
                Some(_) => Ok(()),
            },
            _ => spec.rule.check(value).map_err(CommitRule::ValueOutOfRange),
        }
    }

    /// Elements of object arrays may have been destroyed since the array
    /// was created.
    fn check_object_elements(&self, data: &ArrayData) -> Result<(), CommitRule> {
        let (Some(expected), Some(handles)) = (data.element_type().object_kind(), data.handles()) else {
            return Ok(());
        };
        for (index, handle) in handles.iter().enumerate() {
            match self.objects.kind_of(*handle) {
                None => {
                    return Err(CommitRule::DanglingReference(format!("{} at element {}", expected, index)));
                }
                Some(found) if found != expected => {
                    return Err(CommitRule::ReferenceKindMismatch { expected, found });
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    fn check_geometry(
        &self,
        geometry: GeometryType,
        staged: &ParameterTable,
        schema: &Schema,
        report: &mut CommitReport,
    ) -> Result<(), (&'static str, CommitRule)> {
        let Some(positions) = self.staged_array(staged, POSITION) else {
            return Err((POSITION, CommitRule::MissingRequired));
        };
        let vertex_count = positions.len();
        let index = self.staged_array(staged, INDEX);
        let (primitive_count, primitive_basis) = match index {
            Some(index) => (index.len(), INDEX),
            None => (vertex_count, POSITION),
        };

        for spec in schema.iter() {
            let Some(data) = self.staged_array(staged, spec.name) else {
                continue;
            };
            let (expected, against) = if spec.is_vertex_array() {
                (vertex_count, POSITION)
            } else if spec.is_primitive_array() {
                (primitive_count, primitive_basis)
            } else {
                continue;
            };
            if data.len() != expected {
                return Err((
                    spec.name,
                    CommitRule::ArityMismatch {
                        expected,
                        found: data.len(),
                        against,
                    },
                ));
            }
        }

        if let Some(index) = index {
            let components = index.element_type().components();
            for flat in 0..index.len() * components {
                let Some(value) = index.integer_component(flat) else {
                    continue;
                };
                if value < 0 || value >= vertex_count as i128 {
                    return Err((
                        INDEX,
                        CommitRule::IndexOutOfRange {
                            element: flat / components,
                            value,
                            bound: vertex_count,
                        },
                    ));
                }
            }
            if geometry == GeometryType::Sphere {
                report
                    .warnings
                    .push("primitive.index is ignored by sphere geometry; every vertex is drawn".to_string());
            }
        }

        Ok(())
    }

    fn staged_array(&self, staged: &ParameterTable, name: &str) -> Option<&'a ArrayData> {
        let handle = staged.get(name)?.as_array()?;
        self.arrays.resolve(handle).map(|data| data.as_ref())
    }
}

fn real_or_default(table: &ParameterTable, schema: &Schema, name: &str) -> f64 {
    table
        .get(name)
        .and_then(ParamValue::as_f64)
        .or_else(|| {
            schema
                .find(name)
                .and_then(|spec| spec.default)
                .and_then(|default| default.to_value().as_f64())
        })
        .unwrap_or_default()
}
