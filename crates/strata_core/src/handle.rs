//! Generational handles for device-owned objects and arrays.
//!
//! A handle stays comparable after its object is destroyed, but lookups
//! through it fail because the slot generation has moved on. This is what
//! makes use-after-free detection deterministic.

use slotmap::new_key_type;

new_key_type! {
    /// Handle to a scene object (camera, geometry, material, ...).
    pub struct ObjectHandle;
}

new_key_type! {
    /// Handle to a data array.
    pub struct ArrayHandle;
}
