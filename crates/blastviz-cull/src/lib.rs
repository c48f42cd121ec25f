//! View-frustum visibility for cached object bounds.
//!
//! [`Frustum`] extracts six planes from a view-projection matrix and tests
//! spheres and boxes conservatively. [`FrustumCuller`] keeps a caller-keyed
//! [`BoundsCache`] and turns each frustum update into per-object visibility
//! flags without touching the objects' geometry.

mod bounds;
mod culler;
mod frustum;

pub use bounds::{Aabb, Bounds, BoundsCache, Sphere};
pub use culler::{CullStats, FrustumCuller};
pub use frustum::Frustum;
