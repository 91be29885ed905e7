//! Staged and committed parameter tables.
//!
//! Every object owns two tables. `set`/`unset` write only the staged table;
//! readers (dependents, snapshots, `get_param`) only see the committed one,
//! which is replaced wholesale when a commit succeeds.

use std::collections::BTreeMap;

use crate::array::ArrayStore;
use crate::handle::ArrayHandle;
use crate::value::ParamValue;

/// A name -> value mapping with deterministic iteration order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParameterTable {
    values: BTreeMap<String, ParamValue>,
}

impl ParameterTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Store `value`, returning the value it replaced.
    pub fn insert(&mut self, name: impl Into<String>, value: ParamValue) -> Option<ParamValue> {
        self.values.insert(name.into(), value)
    }

    pub fn remove(&mut self, name: &str) -> Option<ParamValue> {
        self.values.remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Every array referenced by a value in the table.
    pub fn array_handles(&self) -> impl Iterator<Item = ArrayHandle> + '_ {
        self.values.values().filter_map(ParamValue::as_array)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn take(&mut self) -> Self {
        std::mem::take(self)
    }
}

/// Lifecycle state of a scene object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub enum ObjectState {
    /// Never set nor committed.
    Uninitialized,
    /// Holds edits that are not committed yet.
    Staged,
    /// The committed table reflects every staged edit.
    Committed,
}

/// The pair of tables owned by one object, plus change tracking.
///
/// Both tables hold a parameter reference on every array they point at, so
/// the owning [`ArrayStore`] is passed to each mutating call.
#[derive(Debug, Default)]
pub struct ObjectParams {
    staged: ParameterTable,
    committed: Option<ParameterTable>,
    dirty: bool,
}

impl ObjectParams {
    pub fn staged(&self) -> &ParameterTable {
        &self.staged
    }

    /// The committed table, if the object was ever committed successfully.
    pub fn committed(&self) -> Option<&ParameterTable> {
        self.committed.as_ref()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn state(&self) -> ObjectState {
        match (&self.committed, self.dirty) {
            (_, true) => ObjectState::Staged,
            (Some(_), false) => ObjectState::Committed,
            (None, false) => ObjectState::Uninitialized,
        }
    }

    /// Stage a value. The caller has checked that an array value is live.
    ///
    /// Returns whether the staged table changed.
    pub fn set(&mut self, name: &str, value: ParamValue, arrays: &mut ArrayStore) -> bool {
        if self.staged.get(name) == Some(&value) {
            return false;
        }
        if let Some(handle) = value.as_array() {
            arrays.add_param_ref(handle);
        }
        if let Some(old) = self.staged.insert(name, value) {
            release_value(&old, arrays);
        }
        self.dirty = true;
        true
    }

    /// Remove a staged value. Returns whether anything was removed.
    pub fn unset(&mut self, name: &str, arrays: &mut ArrayStore) -> bool {
        match self.staged.remove(name) {
            Some(old) => {
                release_value(&old, arrays);
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    /// Replace the committed table with a copy of the staged one.
    pub fn publish(&mut self, arrays: &mut ArrayStore) {
        for handle in self.staged.array_handles() {
            arrays.add_param_ref(handle);
        }
        if let Some(mut old) = self.committed.replace(self.staged.clone()) {
            release_table(&mut old, arrays);
        }
        self.dirty = false;
    }

    /// Drop both tables, releasing every array they reference.
    pub fn clear(&mut self, arrays: &mut ArrayStore) {
        release_table(&mut self.staged, arrays);
        if let Some(mut committed) = self.committed.take() {
            release_table(&mut committed, arrays);
        }
        self.dirty = false;
    }
}

fn release_value(value: &ParamValue, arrays: &mut ArrayStore) {
    if let Some(handle) = value.as_array() {
        arrays.drop_param_ref(handle);
    }
}

fn release_table(table: &mut ParameterTable, arrays: &mut ArrayStore) {
    for handle in table.take().array_handles() {
        arrays.drop_param_ref(handle);
    }
}
