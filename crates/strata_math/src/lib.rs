// Re-export glam for convenience
pub use glam::*;

// Strata math types
mod aabb;
mod instance;
mod interval;

pub use aabb::Aabb;
pub use instance::{InstanceScale, InstanceTransform};
pub use interval::Interval;
