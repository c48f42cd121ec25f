//! Instanced hole rendering: capacity-managed, growable transform buffers.
//!
//! Every hole part (collar, grade, toe) becomes one instance in a group chosen
//! by the caller, typically "part × diameter class". A group owns a
//! fixed-capacity transform buffer; when it fills up it is replaced by one of
//! twice the capacity with every existing transform copied over. Slots are
//! never reused implicitly: removing an owner parks its instances at
//! [`OFFSCREEN_TRANSFORM`] because instancing has no per-instance visibility
//! flag. [`InstancedMeshManager::compact_group`] is the explicit reclamation
//! pass.
//!
//! The renderer mirrors GPU buffers from [`InstancedMeshManager::drain_events`]
//! and uploads groups whose [`InstanceGroup::needs_upload`] is set.

use std::sync::Arc;

use blastviz_config::BatchConfig;
use glam::{Mat4, Vec3, Vec4};
use rustc_hash::FxHashMap;

use crate::registry::{GroupKey, InstancePart, OwnerHandles, SlotHandle, SlotIndex};

/// Coordinate used on every axis for hidden instances.
pub const OFFSCREEN_COORD: f32 = 1.0e9;

/// Where hidden instances are parked.
pub const OFFSCREEN_POSITION: Vec3 = Vec3::splat(OFFSCREEN_COORD);

/// Transform written to hidden or removed instances.
pub const OFFSCREEN_TRANSFORM: Mat4 = Mat4::from_cols(
    Vec4::X,
    Vec4::Y,
    Vec4::Z,
    Vec4::new(OFFSCREEN_COORD, OFFSCREEN_COORD, OFFSCREEN_COORD, 1.0),
);

/// Capacity used when none is configured.
pub const DEFAULT_CAPACITY: u32 = 1000;

/// Rigid instance transform: translation plus uniform scale.
pub fn instance_transform(position: Vec3, scale: f32) -> Mat4 {
    Mat4::from_scale_rotation_translation(Vec3::splat(scale), glam::Quat::IDENTITY, position)
}

/// Geometry kind of an instanced shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    /// Flat disc facing the viewer (collars in plan view).
    Disc,
    /// Sphere.
    Sphere,
    /// Ring outline.
    Ring,
    /// Short cylinder (3D collars).
    Cylinder,
    /// Square marker.
    Square,
}

/// Shape and material shared by every instance of a group.
///
/// Held behind `Arc`; groups created from the same shape share it, and
/// [`InstancedMeshManager::grow`] swaps only the transform buffer, so a
/// shape is released exactly once, when its last group goes away.
#[derive(Clone, Debug, PartialEq)]
pub struct InstanceShape {
    /// Geometry kind.
    pub kind: ShapeKind,
    /// Base radius in world units before instance scale.
    pub radius: f32,
    /// Packed `0xRRGGBB` material color.
    pub color: u32,
    /// Tessellation used when the renderer builds the geometry.
    pub segments: u32,
}

impl Default for InstanceShape {
    fn default() -> Self {
        Self {
            kind: ShapeKind::Sphere,
            radius: 0.5,
            color: 0xffffff,
            segments: 16,
        }
    }
}

/// Identity of one concrete buffer; changes whenever a group is regrown.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u64);

/// Buffer lifecycle notifications for the rendering layer.
#[derive(Clone, Debug, PartialEq)]
pub enum GroupEvent {
    /// A group was created with a fresh buffer.
    Created {
        /// Group key.
        key: GroupKey,
        /// New buffer.
        buffer: BufferId,
        /// Slot capacity.
        capacity: u32,
    },
    /// A group's buffer was replaced by a larger one.
    Replaced {
        /// Group key.
        key: GroupKey,
        /// Buffer to release.
        old: BufferId,
        /// Buffer to allocate.
        new: BufferId,
        /// New slot capacity.
        capacity: u32,
    },
    /// A group and its buffer were destroyed.
    Destroyed {
        /// Group key.
        key: GroupKey,
        /// Buffer to release.
        buffer: BufferId,
    },
}

/// One capacity buffer of instance transforms.
#[derive(Debug)]
pub struct InstanceGroup {
    key: GroupKey,
    buffer: BufferId,
    shape: Arc<InstanceShape>,
    transforms: Vec<Mat4>,
    next_free: u32,
    active_count: u32,
    needs_upload: bool,
}

impl InstanceGroup {
    fn new(key: GroupKey, buffer: BufferId, shape: Arc<InstanceShape>, capacity: u32) -> Self {
        Self {
            key,
            buffer,
            shape,
            transforms: vec![OFFSCREEN_TRANSFORM; capacity as usize],
            next_free: 0,
            active_count: 0,
            needs_upload: true,
        }
    }

    /// Group key.
    pub fn key(&self) -> &GroupKey {
        &self.key
    }

    /// Current buffer identity.
    pub fn buffer(&self) -> BufferId {
        self.buffer
    }

    /// Shared shape.
    pub fn shape(&self) -> &Arc<InstanceShape> {
        &self.shape
    }

    /// Slot capacity of the current buffer.
    pub fn capacity(&self) -> u32 {
        self.transforms.len() as u32
    }

    /// Next slot that `add_instance` will hand out.
    pub fn next_free(&self) -> u32 {
        self.next_free
    }

    /// Number of instances the renderer must draw.
    pub fn instance_count(&self) -> u32 {
        self.active_count
    }

    /// Transforms of the drawn range `[0, instance_count)`.
    pub fn transforms(&self) -> &[Mat4] {
        &self.transforms[..self.active_count as usize]
    }

    /// The drawn range as raw bytes, column-major `f32`, ready for a GPU upload.
    pub fn transform_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.transforms())
    }

    /// Transform stored in `slot`.
    pub fn transform(&self, slot: u32) -> Option<Mat4> {
        self.transforms.get(slot as usize).copied()
    }

    /// Whether transforms changed since the last [`InstancedMeshManager::mark_uploaded`].
    pub fn needs_upload(&self) -> bool {
        self.needs_upload
    }

    fn write(&mut self, slot: u32, transform: Mat4) {
        self.transforms[slot as usize] = transform;
        self.needs_upload = true;
    }
}

/// Counters reported by [`InstancedMeshManager::stats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InstanceStats {
    /// Number of groups (one draw call each).
    pub groups: usize,
    /// Registered owners.
    pub owners: usize,
    /// Sum of group capacities.
    pub capacity: usize,
    /// Slots handed out so far.
    pub allocated: usize,
    /// Slots bound to a live owner.
    pub live: usize,
    /// Slots parked off-screen by removal.
    pub hidden: usize,
}

/// Positions of the parts of one hole.
#[derive(Clone, Debug, Default)]
pub struct HoleInstances {
    /// Collar group and position.
    pub collar: Option<(GroupKey, Vec3)>,
    /// Grade group and position.
    pub grade: Option<(GroupKey, Vec3)>,
    /// Toe group and position.
    pub toe: Option<(GroupKey, Vec3)>,
    /// Uniform scale applied to every part.
    pub scale: f32,
}

/// Allocator of instance slots across growable groups.
#[derive(Debug)]
pub struct InstancedMeshManager {
    default_capacity: u32,
    groups: FxHashMap<GroupKey, InstanceGroup>,
    index: SlotIndex,
    next_buffer: u64,
    events: Vec<GroupEvent>,
}

impl Default for InstancedMeshManager {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl InstancedMeshManager {
    /// Create a manager whose groups start with `default_capacity` slots.
    pub fn new(default_capacity: u32) -> Self {
        Self {
            default_capacity: default_capacity.max(1),
            groups: FxHashMap::default(),
            index: SlotIndex::new(),
            next_buffer: 0,
            events: Vec::new(),
        }
    }

    /// Create a manager from configuration.
    pub fn from_config(config: &BatchConfig) -> Self {
        Self::new(config.default_capacity)
    }

    /// Return the group for `key`, creating it with `shape` on first use.
    ///
    /// Later calls return the existing group and ignore `shape`.
    pub fn get_or_create_group(
        &mut self,
        key: &GroupKey,
        shape: impl Into<Arc<InstanceShape>>,
    ) -> &InstanceGroup {
        let Self {
            default_capacity,
            groups,
            next_buffer,
            events,
            ..
        } = self;
        groups
            .entry(key.clone())
            .or_insert_with(|| create_group(key, shape.into(), *default_capacity, next_buffer, events))
    }

    /// Place `owner`'s `part` in group `key`.
    ///
    /// Unknown groups are created with the default shape, and a full group is
    /// grown first. Adding a part the owner already has in the same group
    /// overwrites it in place and keeps the handle; in a different group the
    /// old slot is hidden and a new one allocated.
    pub fn add_instance(
        &mut self,
        owner: &str,
        part: InstancePart,
        key: &GroupKey,
        transform: Mat4,
    ) -> SlotHandle {
        if let Some(existing) = self.index.handle(owner, part).cloned() {
            if existing.group_key == *key {
                self.write_slot(&existing, transform);
                return existing;
            }
            self.write_slot(&existing, OFFSCREEN_TRANSFORM);
        }

        let Self {
            default_capacity,
            groups,
            index,
            next_buffer,
            events,
        } = self;
        let group = groups.entry(key.clone()).or_insert_with(|| {
            create_group(
                key,
                Arc::new(InstanceShape::default()),
                *default_capacity,
                next_buffer,
                events,
            )
        });
        if group.next_free >= group.capacity() {
            grow_group(group, next_buffer, events);
        }

        let slot = group.next_free;
        group.next_free += 1;
        group.write(slot, transform);
        group.active_count = group.active_count.max(slot + 1);

        let handle = SlotHandle {
            group_key: key.clone(),
            slot,
        };
        index.bind(owner, part, handle.clone());
        handle
    }

    /// Add every present part of a hole; returns how many parts were placed.
    pub fn add_hole(&mut self, owner: &str, hole: &HoleInstances) -> usize {
        let scale = if hole.scale.is_finite() && hole.scale > 0.0 {
            hole.scale
        } else {
            1.0
        };
        let parts = [
            (InstancePart::Collar, &hole.collar),
            (InstancePart::Grade, &hole.grade),
            (InstancePart::Toe, &hole.toe),
        ];
        let mut placed = 0;
        for (part, entry) in parts {
            if let Some((key, position)) = entry {
                self.add_instance(owner, part, key, instance_transform(*position, scale));
                placed += 1;
            }
        }
        placed
    }

    /// Overwrite the transform of `owner`'s `part` in place.
    ///
    /// Unknown owners or parts are ignored (returns `false`). Neither the
    /// handle nor the group's instance count changes.
    pub fn update_instance(&mut self, owner: &str, part: InstancePart, transform: Mat4) -> bool {
        let Some(handle) = self.index.handle(owner, part).cloned() else {
            return false;
        };
        self.write_slot(&handle, transform);
        true
    }

    /// Park `owner`'s `part` at [`OFFSCREEN_TRANSFORM`].
    pub fn hide_instance(&mut self, owner: &str, part: InstancePart) -> bool {
        self.update_instance(owner, part, OFFSCREEN_TRANSFORM)
    }

    /// Restore a hidden instance to `transform`.
    pub fn show_instance(&mut self, owner: &str, part: InstancePart, transform: Mat4) -> bool {
        self.update_instance(owner, part, transform)
    }

    /// Hide every part of `owner` and drop it from the registry.
    ///
    /// The slots stay allocated until [`compact_group`](Self::compact_group).
    pub fn remove_owner(&mut self, owner: &str) -> bool {
        let Some(handles) = self.index.unbind_owner(owner) else {
            return false;
        };
        for (_, handle) in handles.iter() {
            self.write_slot(handle, OFFSCREEN_TRANSFORM);
        }
        true
    }

    fn write_slot(&mut self, handle: &SlotHandle, transform: Mat4) {
        if let Some(group) = self.groups.get_mut(&handle.group_key)
            && handle.slot < group.capacity()
        {
            group.write(handle.slot, transform);
        }
    }

    /// Replace `key`'s buffer by one of twice the capacity.
    ///
    /// Slots `[0, old_capacity)`, the counters and the owner index carry over
    /// unchanged; the shape `Arc` stays with the group. Returns `false` for an
    /// unknown key.
    pub fn grow(&mut self, key: &GroupKey) -> bool {
        let Some(group) = self.groups.get_mut(key) else {
            return false;
        };
        grow_group(group, &mut self.next_buffer, &mut self.events);
        true
    }

    /// Move live slots of `key` to the front and release the rest.
    ///
    /// Live instances keep their transforms; their handles are rewritten, so
    /// this is the one operation that changes slot indices. Capacity is kept.
    /// Returns the number of reclaimed slots.
    pub fn compact_group(&mut self, key: &GroupKey) -> usize {
        let Some(group) = self.groups.get_mut(key) else {
            return 0;
        };
        let used = group.next_free;
        let mut remap = vec![None; used as usize];
        let mut live = 0u32;
        for slot in 0..used {
            if self.index.is_bound(key, slot) {
                remap[slot as usize] = Some(live);
                group.transforms[live as usize] = group.transforms[slot as usize];
                live += 1;
            }
        }
        for slot in live..used {
            group.transforms[slot as usize] = OFFSCREEN_TRANSFORM;
        }
        group.next_free = live;
        group.active_count = live;
        group.needs_upload = true;

        self.index.remap_group(key, &remap);
        let reclaimed = (used - live) as usize;
        if reclaimed > 0 {
            tracing::debug!("compacted instance group {key}: reclaimed {reclaimed} slots");
        }
        reclaimed
    }

    /// Destroy every group and forget every owner.
    pub fn clear_all(&mut self) {
        for (key, group) in self.groups.drain() {
            self.events.push(GroupEvent::Destroyed {
                key,
                buffer: group.buffer,
            });
        }
        self.index.clear();
    }

    /// Part handles of `owner`, or `None` if unknown.
    pub fn owner_info(&self, owner: &str) -> Option<&OwnerHandles> {
        self.index.handles(owner)
    }

    /// Owner and part drawn at `slot` of `key`, for hit-testing.
    pub fn owner_at(&self, key: &GroupKey, slot: u32) -> Option<(&str, InstancePart)> {
        self.index.owner_at(key, slot)
    }

    /// Transform currently stored at `handle`.
    pub fn slot_transform(&self, handle: &SlotHandle) -> Option<Mat4> {
        self.groups.get(&handle.group_key)?.transform(handle.slot)
    }

    /// Group for `key`.
    pub fn group(&self, key: &GroupKey) -> Option<&InstanceGroup> {
        self.groups.get(key)
    }

    /// All groups in no particular order.
    pub fn groups(&self) -> impl Iterator<Item = &InstanceGroup> {
        self.groups.values()
    }

    /// Buffer lifecycle events since the last drain, oldest first.
    pub fn drain_events(&mut self) -> std::vec::Drain<'_, GroupEvent> {
        self.events.drain(..)
    }

    /// Clear every group's upload flag after the renderer copied transforms.
    pub fn mark_uploaded(&mut self) {
        for group in self.groups.values_mut() {
            group.needs_upload = false;
        }
    }

    /// Current counters.
    pub fn stats(&self) -> InstanceStats {
        let mut stats = InstanceStats {
            groups: self.groups.len(),
            owners: self.index.owner_count(),
            ..InstanceStats::default()
        };
        for group in self.groups.values() {
            stats.capacity += group.capacity() as usize;
            stats.allocated += group.next_free as usize;
            stats.live += self.index.bound_in_group(&group.key);
        }
        stats.hidden = stats.allocated.saturating_sub(stats.live);
        stats
    }
}

fn next_buffer_id(counter: &mut u64) -> BufferId {
    let id = BufferId(*counter);
    *counter += 1;
    id
}

fn create_group(
    key: &GroupKey,
    shape: Arc<InstanceShape>,
    capacity: u32,
    counter: &mut u64,
    events: &mut Vec<GroupEvent>,
) -> InstanceGroup {
    let buffer = next_buffer_id(counter);
    tracing::debug!("creating instance group {key} with capacity {capacity}");
    events.push(GroupEvent::Created {
        key: key.clone(),
        buffer,
        capacity,
    });
    InstanceGroup::new(key.clone(), buffer, shape, capacity)
}

/// Swap in a buffer of twice the capacity; the old one is dropped here.
fn grow_group(group: &mut InstanceGroup, counter: &mut u64, events: &mut Vec<GroupEvent>) {
    let old_capacity = group.capacity();
    let capacity = old_capacity.saturating_mul(2).max(1);

    let mut transforms = Vec::with_capacity(capacity as usize);
    transforms.extend_from_slice(&group.transforms);
    transforms.resize(capacity as usize, OFFSCREEN_TRANSFORM);
    group.transforms = transforms;

    let old = group.buffer;
    group.buffer = next_buffer_id(counter);
    group.needs_upload = true;

    tracing::debug!("grew instance group {}: {old_capacity} -> {capacity}", group.key);
    events.push(GroupEvent::Replaced {
        key: group.key.clone(),
        old,
        new: group.buffer,
        capacity,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(x: f32) -> Mat4 {
        Mat4::from_translation(Vec3::new(x, x * 2.0, -x))
    }

    #[test]
    fn test_growth_preserves_every_transform() {
        let mut manager = InstancedMeshManager::default();
        let key = GroupKey::new("collar:0.115");
        let mut handles = Vec::new();
        for i in 0..1500 {
            handles.push(manager.add_instance(&format!("A:::{i}"), InstancePart::Collar, &key, at(i as f32)));
        }

        let group = manager.group(&key).unwrap();
        assert_eq!(group.capacity(), 2000);
        assert_eq!(group.instance_count(), 1500);
        assert_eq!(manager.slot_transform(&handles[999]), Some(at(999.0)));
        for (i, handle) in handles.iter().enumerate() {
            assert_eq!(handle.slot, i as u32);
            assert_eq!(manager.slot_transform(handle), Some(at(i as f32)));
        }
    }

    #[test]
    fn test_growth_keeps_reverse_lookup() {
        let mut manager = InstancedMeshManager::new(4);
        let key = GroupKey::new("g");
        for i in 0..9 {
            manager.add_instance(&format!("H{i}"), InstancePart::Toe, &key, at(1.0));
        }
        assert_eq!(manager.group(&key).unwrap().capacity(), 16);
        assert_eq!(manager.owner_at(&key, 2), Some(("H2", InstancePart::Toe)));
        assert_eq!(manager.owner_at(&key, 8), Some(("H8", InstancePart::Toe)));
    }

    #[test]
    fn test_growth_emits_replacement_and_shares_shape() {
        let mut manager = InstancedMeshManager::new(2);
        let key = GroupKey::new("g");
        let shape = Arc::new(InstanceShape::default());
        let created = manager.get_or_create_group(&key, Arc::clone(&shape)).buffer();
        for i in 0..3 {
            manager.add_instance(&format!("H{i}"), InstancePart::Collar, &key, at(0.0));
        }
        let events: Vec<_> = manager.drain_events().collect();
        assert_eq!(events.len(), 2);
        match &events[1] {
            GroupEvent::Replaced { old, new, capacity, .. } => {
                assert_eq!(*old, created);
                assert_ne!(*new, created);
                assert_eq!(*capacity, 4);
            }
            other => panic!("expected Replaced, got {other:?}"),
        }
        // Test handle plus the one live group: the old buffer released nothing extra.
        assert_eq!(Arc::strong_count(&shape), 2);
        assert!(manager.drain_events().next().is_none());
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let mut manager = InstancedMeshManager::default();
        let key = GroupKey::new("g");
        let first = manager.get_or_create_group(&key, InstanceShape::default()).buffer();
        let other_shape = InstanceShape {
            kind: ShapeKind::Ring,
            ..InstanceShape::default()
        };
        let second = manager.get_or_create_group(&key, other_shape);
        assert_eq!(second.buffer(), first);
        assert_eq!(second.shape().kind, ShapeKind::Sphere);
        assert_eq!(second.capacity(), DEFAULT_CAPACITY);
    }

    #[test]
    fn test_update_keeps_handle_and_count() {
        let mut manager = InstancedMeshManager::default();
        let key = GroupKey::new("g");
        let handle = manager.add_instance("A:::1", InstancePart::Collar, &key, at(1.0));
        manager.add_instance("A:::2", InstancePart::Collar, &key, at(2.0));

        assert!(manager.update_instance("A:::1", InstancePart::Collar, at(9.0)));
        assert_eq!(manager.owner_info("A:::1").unwrap().get(InstancePart::Collar), Some(&handle));
        assert_eq!(manager.slot_transform(&handle), Some(at(9.0)));
        assert_eq!(manager.group(&key).unwrap().instance_count(), 2);
    }

    #[test]
    fn test_update_unknown_is_noop() {
        let mut manager = InstancedMeshManager::default();
        assert!(!manager.update_instance("nobody", InstancePart::Toe, at(1.0)));
        manager.add_instance("A", InstancePart::Collar, &GroupKey::new("g"), at(1.0));
        assert!(!manager.update_instance("A", InstancePart::Toe, at(1.0)));
    }

    #[test]
    fn test_re_adding_same_part_reuses_slot() {
        let mut manager = InstancedMeshManager::default();
        let key = GroupKey::new("g");
        let first = manager.add_instance("A", InstancePart::Collar, &key, at(1.0));
        let again = manager.add_instance("A", InstancePart::Collar, &key, at(3.0));
        assert_eq!(first, again);
        assert_eq!(manager.group(&key).unwrap().next_free(), 1);
        assert_eq!(manager.slot_transform(&first), Some(at(3.0)));
    }

    #[test]
    fn test_moving_part_to_other_group_hides_old_slot() {
        let mut manager = InstancedMeshManager::default();
        let small = GroupKey::new("collar:0.1");
        let large = GroupKey::new("collar:0.3");
        let old = manager.add_instance("A", InstancePart::Collar, &small, at(1.0));
        let new = manager.add_instance("A", InstancePart::Collar, &large, at(1.0));
        assert_eq!(new.group_key, large);
        assert_eq!(manager.slot_transform(&old), Some(OFFSCREEN_TRANSFORM));
        assert!(manager.owner_at(&small, 0).is_none());
    }

    #[test]
    fn test_hide_and_show() {
        let mut manager = InstancedMeshManager::default();
        let key = GroupKey::new("g");
        let handle = manager.add_instance("A", InstancePart::Grade, &key, at(4.0));
        manager.add_instance("B", InstancePart::Grade, &key, at(5.0));
        assert!(manager.hide_instance("A", InstancePart::Grade));
        assert_eq!(manager.slot_transform(&handle), Some(OFFSCREEN_TRANSFORM));
        assert_eq!(manager.group(&key).unwrap().instance_count(), 2);
        assert!(manager.show_instance("A", InstancePart::Grade, at(4.0)));
        assert_eq!(manager.slot_transform(&handle), Some(at(4.0)));
        assert_eq!(manager.group(&key).unwrap().instance_count(), 2);
    }

    #[test]
    fn test_remove_owner_parks_slot_offscreen() {
        let mut manager = InstancedMeshManager::default();
        let key = GroupKey::new("collar");
        let handle = manager.add_instance("A:::1", InstancePart::Collar, &key, at(5.0));

        assert!(manager.remove_owner("A:::1"));
        assert!(manager.owner_info("A:::1").is_none());
        let parked = manager.slot_transform(&handle).unwrap();
        assert_eq!(parked, OFFSCREEN_TRANSFORM);
        assert_eq!(parked.w_axis.truncate(), OFFSCREEN_POSITION);
        assert!(manager.owner_at(&key, handle.slot).is_none());
        assert!(!manager.remove_owner("A:::1"));
    }

    #[test]
    fn test_removed_slots_are_not_reused() {
        let mut manager = InstancedMeshManager::default();
        let key = GroupKey::new("g");
        manager.add_instance("A", InstancePart::Collar, &key, at(1.0));
        manager.remove_owner("A");
        let next = manager.add_instance("B", InstancePart::Collar, &key, at(2.0));
        assert_eq!(next.slot, 1);
        let stats = manager.stats();
        assert_eq!((stats.allocated, stats.live, stats.hidden), (2, 1, 1));
    }

    #[test]
    fn test_add_hole_places_all_parts() {
        let mut manager = InstancedMeshManager::default();
        let hole = HoleInstances {
            collar: Some((GroupKey::new("collar"), Vec3::new(0.0, 0.0, 10.0))),
            grade: Some((GroupKey::new("grade"), Vec3::new(0.0, 0.0, 0.0))),
            toe: Some((GroupKey::new("toe"), Vec3::new(0.0, 0.0, -1.0))),
            scale: 0.5,
        };
        assert_eq!(manager.add_hole("P:::7", &hole), 3);
        let info = manager.owner_info("P:::7").unwrap();
        assert_eq!(info.len(), 3);
        let toe = info.get(InstancePart::Toe).unwrap().clone();
        assert_eq!(
            manager.slot_transform(&toe),
            Some(instance_transform(Vec3::new(0.0, 0.0, -1.0), 0.5))
        );
    }

    #[test]
    fn test_compact_group_reclaims_hidden_slots() {
        let mut manager = InstancedMeshManager::default();
        let key = GroupKey::new("g");
        for i in 0..5 {
            manager.add_instance(&format!("H{i}"), InstancePart::Collar, &key, at(i as f32));
        }
        manager.remove_owner("H1");
        manager.remove_owner("H3");

        assert_eq!(manager.compact_group(&key), 2);
        let group = manager.group(&key).unwrap();
        assert_eq!(group.instance_count(), 3);
        assert_eq!(group.next_free(), 3);

        let h4 = manager.owner_info("H4").unwrap().get(InstancePart::Collar).unwrap().clone();
        assert_eq!(h4.slot, 2);
        assert_eq!(manager.slot_transform(&h4), Some(at(4.0)));
        assert_eq!(manager.owner_at(&key, 1), Some(("H2", InstancePart::Collar)));
        assert_eq!(group.transform(3), Some(OFFSCREEN_TRANSFORM));
    }

    #[test]
    fn test_clear_all_destroys_groups() {
        let mut manager = InstancedMeshManager::default();
        manager.add_instance("A", InstancePart::Collar, &GroupKey::new("a"), at(1.0));
        manager.add_instance("B", InstancePart::Collar, &GroupKey::new("b"), at(1.0));
        manager.drain_events().for_each(drop);

        manager.clear_all();
        let destroyed = manager
            .drain_events()
            .filter(|e| matches!(e, GroupEvent::Destroyed { .. }))
            .count();
        assert_eq!(destroyed, 2);
        assert_eq!(manager.stats(), InstanceStats::default());
        assert!(manager.owner_info("A").is_none());
    }

    #[test]
    fn test_upload_flag() {
        let mut manager = InstancedMeshManager::default();
        let key = GroupKey::new("g");
        manager.add_instance("A", InstancePart::Collar, &key, at(1.0));
        assert!(manager.group(&key).unwrap().needs_upload());
        manager.mark_uploaded();
        assert!(!manager.group(&key).unwrap().needs_upload());
        manager.update_instance("A", InstancePart::Collar, at(2.0));
        assert!(manager.group(&key).unwrap().needs_upload());
    }

    #[test]
    fn test_transform_bytes_cover_drawn_range() {
        let mut manager = InstancedMeshManager::new(8);
        let key = GroupKey::new("g");
        manager.add_instance("A", InstancePart::Collar, &key, at(1.0));
        manager.add_instance("B", InstancePart::Collar, &key, at(2.0));
        let group = manager.group(&key).unwrap();
        let bytes = group.transform_bytes();
        assert_eq!(bytes.len(), 2 * 16 * 4);
        let floats: &[f32] = bytemuck::cast_slice(bytes);
        // Translation of the second instance sits in its fourth column.
        assert_eq!(floats[16 + 12], group.transform(1).unwrap().w_axis.x);
    }

    #[test]
    fn test_unknown_lookups_return_none() {
        let manager = InstancedMeshManager::default();
        assert!(manager.owner_info("missing").is_none());
        assert!(manager.owner_at(&GroupKey::new("missing"), 0).is_none());
        assert!(manager.group(&GroupKey::new("missing")).is_none());
    }
}
