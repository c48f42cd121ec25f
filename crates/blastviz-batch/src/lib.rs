//! Draw-call reduction for blast-hole scenes.
//!
//! Two builders live here:
//!
//! - [`InstancedMeshManager`]: hole parts as instances in growable,
//!   capacity-managed transform buffers, with an owner registry and reverse
//!   slot lookup for picking.
//! - [`LineBatcher`] / [`PointBatcher`]: vector geometry accumulated per
//!   canonical (color, width) key and materialized into one primitive per key
//!   on `flush`.

mod accumulator;
pub mod color;
pub mod instanced;
pub mod key;
pub mod lines;
pub mod points;
pub mod registry;
pub mod scene;

pub use accumulator::BatchStats;
pub use color::{ColorError, ColorValue};
pub use instanced::{
    BufferId, GroupEvent, HoleInstances, InstanceGroup, InstanceShape, InstanceStats,
    InstancedMeshManager, OFFSCREEN_POSITION, OFFSCREEN_TRANSFORM, ShapeKind, instance_transform,
};
pub use key::{BatchKey, KeyPolicy};
pub use lines::LineBatcher;
pub use points::PointBatcher;
pub use registry::{GroupKey, InstancePart, OwnerHandles, SlotHandle, SlotIndex};
pub use scene::{
    LinePrimitive, MemoryScene, PickMeta, PointBatchKey, PointPrimitive, PointSizing, Primitive,
    PrimitiveId, SceneContainer,
};
