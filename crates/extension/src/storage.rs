//! Per-object slot storage and the set of live objects.
//!
//! Every object registered with an index space owns one [`ObjectStorage`]: a
//! vector of optional slot entries, one column per slot the bitmap has ever
//! handed out. The [`LiveObjects`] set is the registration list used to grow
//! every storage in lockstep with the bitmap.

use std::any::Any;
use std::fmt;

use slab::Slab;

use crate::key::TypeKey;
use crate::slot::{SlotIndex, SlotRef};

/// Identifies a live object within one index space.
///
/// The serial distinguishes a recycled live-set key from the object that held
/// it before, so ids of destroyed objects never resolve again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId {
	key: usize,
	serial: u64,
}

impl ObjectId {
	pub fn serial(self) -> u64 {
		self.serial
	}
}

/// An occupied slot: the instance plus the tenancy it was stored under.
pub(crate) struct SlotEntry {
	pub(crate) key: TypeKey,
	pub(crate) slot: SlotRef,
	/// Dropping the box runs the extension's teardown.
	pub(crate) value: Box<dyn Any>,
}

impl fmt::Debug for SlotEntry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SlotEntry")
			.field("key", &self.key)
			.field("slot", &self.slot)
			.finish_non_exhaustive()
	}
}

/// Slot storage owned by one object.
#[derive(Debug)]
pub struct ObjectStorage {
	serial: u64,
	slots: Vec<Option<SlotEntry>>,
}

impl ObjectStorage {
	fn with_len(serial: u64, len: usize) -> Self {
		let mut slots = Vec::with_capacity(len);
		slots.resize_with(len, || None);
		Self { serial, slots }
	}

	pub fn len(&self) -> usize {
		self.slots.len()
	}

	pub fn is_empty(&self) -> bool {
		self.slots.is_empty()
	}

	/// Number of slots holding an instance.
	pub fn occupied(&self) -> usize {
		self.slots.iter().filter(|s| s.is_some()).count()
	}

	pub fn is_occupied(&self, index: SlotIndex) -> bool {
		self.slots.get(index).is_some_and(Option::is_some)
	}

	pub(crate) fn grow_to(&mut self, len: usize) {
		if self.slots.len() < len {
			self.slots.resize_with(len, || None);
		}
	}

	#[inline]
	pub(crate) fn entry(&self, index: SlotIndex) -> Option<&SlotEntry> {
		self.slots.get(index)?.as_ref()
	}

	#[inline]
	pub(crate) fn entry_mut(&mut self, index: SlotIndex) -> Option<&mut SlotEntry> {
		self.slots.get_mut(index)?.as_mut()
	}

	/// Stores an entry in an empty slot. Returns `None` when the slot is out of
	/// range or occupied.
	pub(crate) fn put(&mut self, entry: SlotEntry) -> Option<&mut SlotEntry> {
		let slot = self.slots.get_mut(entry.slot.index)?;
		if slot.is_some() {
			return None;
		}
		Some(slot.insert(entry))
	}

	pub(crate) fn take(&mut self, index: SlotIndex) -> Option<SlotEntry> {
		self.slots.get_mut(index)?.take()
	}

	pub(crate) fn into_entries(self) -> impl Iterator<Item = SlotEntry> {
		self.slots.into_iter().flatten()
	}
}

/// Registration list of every live object in an index space.
#[derive(Debug, Default)]
pub struct LiveObjects {
	objects: Slab<ObjectStorage>,
	next_serial: u64,
}

impl LiveObjects {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a new object whose storage starts at `len` empty slots.
	pub(crate) fn register(&mut self, len: usize) -> ObjectId {
		let serial = self.next_serial;
		self.next_serial += 1;
		let key = self.objects.insert(ObjectStorage::with_len(serial, len));
		ObjectId { key, serial }
	}

	pub(crate) fn deregister(&mut self, id: ObjectId) -> Option<ObjectStorage> {
		self.get(id)?;
		Some(self.objects.remove(id.key))
	}

	#[inline]
	pub fn get(&self, id: ObjectId) -> Option<&ObjectStorage> {
		self.objects.get(id.key).filter(|s| s.serial == id.serial)
	}

	#[inline]
	pub(crate) fn get_mut(&mut self, id: ObjectId) -> Option<&mut ObjectStorage> {
		self.objects
			.get_mut(id.key)
			.filter(|s| s.serial == id.serial)
	}

	/// Grows every live storage to at least `len` slots.
	pub(crate) fn grow_all(&mut self, len: usize) {
		for (_, storage) in self.objects.iter_mut() {
			storage.grow_to(len);
		}
	}

	pub fn len(&self) -> usize {
		self.objects.len()
	}

	pub fn is_empty(&self) -> bool {
		self.objects.is_empty()
	}

	pub fn ids(&self) -> Vec<ObjectId> {
		self.objects
			.iter()
			.map(|(key, storage)| ObjectId {
				key,
				serial: storage.serial,
			})
			.collect()
	}
}
