//! Object registry: owns every scene object and hands out unique names.

use std::collections::{BTreeSet, HashMap};

use slotmap::SlotMap;

use crate::handle::ObjectHandle;
use crate::object::{ObjectType, SceneObject};
use crate::types::ObjectKind;

/// Per-kind postfix allocator for default names (`Geometry_0`, ...).
///
/// Postfixes freed by destroyed objects are reused lowest first.
#[derive(Debug, Default)]
struct NamePostfixes {
    next: usize,
    free: BTreeSet<usize>,
}

impl NamePostfixes {
    fn acquire(&mut self) -> usize {
        if let Some(index) = self.free.pop_first() {
            return index;
        }
        self.next += 1;
        self.next - 1
    }

    fn release(&mut self, index: usize) {
        self.free.insert(index);
    }
}

#[derive(Debug, Default)]
pub struct ObjectRegistry {
    objects: SlotMap<ObjectHandle, SceneObject>,
    names: HashMap<ObjectKind, NamePostfixes>,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, object_type: ObjectType) -> ObjectHandle {
        let index = self.names.entry(object_type.kind()).or_default().acquire();
        self.objects.insert(SceneObject::new(object_type, index))
    }

    pub fn get(&self, handle: ObjectHandle) -> Option<&SceneObject> {
        self.objects.get(handle)
    }

    pub fn get_mut(&mut self, handle: ObjectHandle) -> Option<&mut SceneObject> {
        self.objects.get_mut(handle)
    }

    /// Kind of a live object.
    pub fn kind_of(&self, handle: ObjectHandle) -> Option<ObjectKind> {
        self.objects.get(handle).map(SceneObject::kind)
    }

    /// Remove an object, freeing its default name. The caller releases the
    /// arrays its parameters reference.
    pub fn remove(&mut self, handle: ObjectHandle) -> Option<SceneObject> {
        let object = self.objects.remove(handle)?;
        if let Some(names) = self.names.get_mut(&object.kind()) {
            names.release(object.name_index);
        }
        Some(object)
    }

    /// Handles of every live object, oldest slot first.
    pub fn handles(&self) -> Vec<ObjectHandle> {
        self.objects.keys().collect()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
