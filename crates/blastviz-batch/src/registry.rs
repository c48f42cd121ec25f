//! Bidirectional owner ↔ slot index for instanced groups.
//!
//! Forward: owner id → up to three part handles (collar, grade, toe).
//! Reverse: (group, slot) → (owner, part), used for hit-testing an instance
//! index back to the hole it belongs to. Both directions live in one struct
//! and are only mutated together.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

/// Caller-chosen key of an instance group, e.g. `"collar:0.115"`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey(String);

impl GroupKey {
    /// Wrap a key string.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key for `part` in diameter class `size_class`, e.g. `collar:0.115`.
    pub fn for_part(part: InstancePart, size_class: f32) -> Self {
        Self(format!("{}:{size_class}", part.name()))
    }

    /// The key string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for GroupKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Named sub-handle of an owner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InstancePart {
    /// Hole collar (start) marker.
    Collar,
    /// Grade (floor) marker.
    Grade,
    /// Toe (end) marker.
    Toe,
}

impl InstancePart {
    /// All parts in storage order.
    pub const ALL: [InstancePart; 3] = [InstancePart::Collar, InstancePart::Grade, InstancePart::Toe];

    fn index(self) -> usize {
        match self {
            InstancePart::Collar => 0,
            InstancePart::Grade => 1,
            InstancePart::Toe => 2,
        }
    }

    /// Lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            InstancePart::Collar => "collar",
            InstancePart::Grade => "grade",
            InstancePart::Toe => "toe",
        }
    }
}

/// Location of one instance: group key plus slot index.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SlotHandle {
    /// Group the slot lives in.
    pub group_key: GroupKey,
    /// Index within the group's buffer; stable until an explicit compaction.
    pub slot: u32,
}

/// The part handles registered for one owner.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OwnerHandles {
    parts: [Option<SlotHandle>; 3],
}

impl OwnerHandles {
    /// Handle of `part`, if registered.
    pub fn get(&self, part: InstancePart) -> Option<&SlotHandle> {
        self.parts[part.index()].as_ref()
    }

    /// Registered parts with their handles.
    pub fn iter(&self) -> impl Iterator<Item = (InstancePart, &SlotHandle)> {
        InstancePart::ALL
            .into_iter()
            .filter_map(|part| self.get(part).map(|handle| (part, handle)))
    }

    /// Number of registered parts.
    pub fn len(&self) -> usize {
        self.parts.iter().flatten().count()
    }

    /// Whether no part is registered.
    pub fn is_empty(&self) -> bool {
        self.parts.iter().all(Option::is_none)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct SlotOwner {
    owner: Arc<str>,
    part: InstancePart,
}

/// Owner registry with reverse slot lookup.
///
/// Invariant: an owner with no registered part is absent, and every forward
/// handle has exactly one matching reverse entry.
#[derive(Debug, Default)]
pub struct SlotIndex {
    owners: FxHashMap<Arc<str>, OwnerHandles>,
    slots: FxHashMap<GroupKey, Vec<Option<SlotOwner>>>,
}

impl SlotIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `owner`'s `part` at `handle`.
    ///
    /// An owner already occupying that slot loses its handle for it.
    /// Returns the handle previously registered for that part, whose reverse
    /// entry is cleared.
    pub fn bind(&mut self, owner: &str, part: InstancePart, handle: SlotHandle) -> Option<SlotHandle> {
        let owner: Arc<str> = match self.owners.get_key_value(owner) {
            Some((existing, _)) => Arc::clone(existing),
            None => Arc::from(owner),
        };

        let reverse = self.slots.entry(handle.group_key.clone()).or_default();
        let slot = handle.slot as usize;
        if reverse.len() <= slot {
            reverse.resize(slot + 1, None);
        }
        let displaced = reverse[slot].replace(SlotOwner {
            owner: Arc::clone(&owner),
            part,
        });
        if let Some(displaced) = displaced
            && (displaced.part != part || displaced.owner != owner)
        {
            self.evict(&displaced, &handle);
        }

        let entry = self.owners.entry(owner).or_default();
        let previous = entry.parts[part.index()].replace(handle.clone());
        if let Some(old) = &previous
            && *old != handle
        {
            self.clear_reverse(old);
        }
        previous
    }

    /// Drop the forward handle of an owner whose slot was taken over.
    fn evict(&mut self, displaced: &SlotOwner, handle: &SlotHandle) {
        let name = &*displaced.owner;
        if let Some(entry) = self.owners.get_mut(name)
            && entry.parts[displaced.part.index()].as_ref() == Some(handle)
        {
            entry.parts[displaced.part.index()] = None;
            if entry.is_empty() {
                self.owners.remove(name);
            }
        }
    }

    /// Remove one part of an owner; the owner disappears with its last part.
    pub fn unbind(&mut self, owner: &str, part: InstancePart) -> Option<SlotHandle> {
        let entry = self.owners.get_mut(owner)?;
        let handle = entry.parts[part.index()].take()?;
        if entry.is_empty() {
            self.owners.remove(owner);
        }
        self.clear_reverse(&handle);
        Some(handle)
    }

    /// Remove an owner with all its parts.
    pub fn unbind_owner(&mut self, owner: &str) -> Option<OwnerHandles> {
        let handles = self.owners.remove(owner)?;
        for (_, handle) in handles.iter() {
            self.clear_reverse(handle);
        }
        Some(handles)
    }

    fn clear_reverse(&mut self, handle: &SlotHandle) {
        if let Some(entry) = self
            .slots
            .get_mut(&handle.group_key)
            .and_then(|reverse| reverse.get_mut(handle.slot as usize))
        {
            *entry = None;
        }
    }

    /// Handles registered for `owner`.
    pub fn handles(&self, owner: &str) -> Option<&OwnerHandles> {
        self.owners.get(owner)
    }

    /// Handle of one part of `owner`.
    pub fn handle(&self, owner: &str, part: InstancePart) -> Option<&SlotHandle> {
        self.owners.get(owner)?.get(part)
    }

    /// Owner and part occupying `slot` of `group_key`.
    pub fn owner_at(&self, group_key: &GroupKey, slot: u32) -> Option<(&str, InstancePart)> {
        self.slots
            .get(group_key)?
            .get(slot as usize)?
            .as_ref()
            .map(|entry| (&*entry.owner, entry.part))
    }

    /// Whether `slot` of `group_key` belongs to a live owner.
    pub fn is_bound(&self, group_key: &GroupKey, slot: u32) -> bool {
        self.owner_at(group_key, slot).is_some()
    }

    /// Number of live slots in `group_key`.
    pub fn bound_in_group(&self, group_key: &GroupKey) -> usize {
        self.slots
            .get(group_key)
            .map_or(0, |reverse| reverse.iter().flatten().count())
    }

    /// Number of registered owners.
    pub fn owner_count(&self) -> usize {
        self.owners.len()
    }

    /// Rewrite slot indices of `group_key` after compaction.
    ///
    /// `remap[old]` is the new slot of a live entry; dead entries map to `None`.
    pub fn remap_group(&mut self, group_key: &GroupKey, remap: &[Option<u32>]) {
        let Some(reverse) = self.slots.get_mut(group_key) else {
            return;
        };
        let mut compacted: Vec<Option<SlotOwner>> = Vec::with_capacity(reverse.len());
        for (old, entry) in reverse.drain(..).enumerate() {
            let (Some(entry), Some(Some(new))) = (entry, remap.get(old).copied()) else {
                continue;
            };
            let new = new as usize;
            if compacted.len() <= new {
                compacted.resize(new + 1, None);
            }
            if let Some(handles) = self.owners.get_mut(&*entry.owner)
                && let Some(handle) = handles.parts[entry.part.index()].as_mut()
            {
                handle.slot = new as u32;
            }
            compacted[new] = Some(entry);
        }
        *reverse = compacted;
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.owners.clear();
        self.slots.clear();
    }
}
