//! Index space container: slot bitmap, type table, and live objects.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{ObjectError, ReleaseError};
use crate::key::{BaseKind, TypeKey};
use crate::record::TypeRecord;
use crate::slot::{SlotBitmap, SlotRef};
use crate::storage::{LiveObjects, ObjectId, ObjectStorage};
use crate::types::TypeTable;

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

/// Extension registry for one kind of base object.
///
/// Owns the slot bitmap, the registration records, and the storage of every
/// live object of its kind. Storage of all live objects is grown before any
/// allocating call returns, so an object can be queried at any allocated
/// index immediately.
#[derive(Debug)]
pub struct ExtensionRegistry {
	id: u64,
	kind: BaseKind,
	bitmap: SlotBitmap,
	types: TypeTable,
	pub(crate) objects: LiveObjects,
}

/// Summary of what was still alive when a registry shut down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
	pub kind: BaseKind,
	/// Objects that were never deregistered.
	pub leaked_objects: usize,
	/// Instances dropped while tearing down leaked objects.
	pub dropped_instances: usize,
	/// Keys that still held a record after teardown, in slot order.
	pub remaining_keys: Vec<TypeKey>,
}

impl ShutdownReport {
	pub fn is_clean(&self) -> bool {
		self.leaked_objects == 0 && self.remaining_keys.is_empty()
	}
}

impl ExtensionRegistry {
	/// Creates an empty registry for `kind`.
	pub fn initialize(kind: BaseKind) -> Self {
		let id = NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed);
		tracing::debug!(%kind, registry = id, "extension registry initialized");
		Self {
			id,
			kind,
			bitmap: SlotBitmap::new(),
			types: TypeTable::new(),
			objects: LiveObjects::new(),
		}
	}

	/// Tears the registry down, dropping every instance still stored.
	pub fn shutdown(mut self) -> ShutdownReport {
		let leaked = self.objects.ids();
		let mut dropped_instances = 0;
		for id in &leaked {
			if let Ok(dropped) = self.deregister_object(*id) {
				dropped_instances += dropped;
			}
		}
		let remaining_keys: Vec<_> = self.types.iter().map(|(key, _)| key.clone()).collect();

		if !leaked.is_empty() || !remaining_keys.is_empty() {
			tracing::warn!(
				kind = %self.kind,
				leaked_objects = leaked.len(),
				dropped_instances,
				remaining = remaining_keys.len(),
				"extension registry shut down with live state"
			);
		} else {
			tracing::debug!(kind = %self.kind, "extension registry shut down");
		}

		ShutdownReport {
			kind: self.kind,
			leaked_objects: leaked.len(),
			dropped_instances,
			remaining_keys,
		}
	}

	#[inline]
	pub fn id(&self) -> u64 {
		self.id
	}

	pub fn kind(&self) -> BaseKind {
		self.kind
	}

	/// Number of slots allocated over the registry's lifetime.
	pub fn slot_count(&self) -> usize {
		self.bitmap.len()
	}

	pub fn bitmap(&self) -> &SlotBitmap {
		&self.bitmap
	}

	#[inline]
	pub fn epoch(&self) -> u64 {
		self.types.epoch()
	}

	/// Adds an object to the live set with storage covering every slot.
	pub fn register_object(&mut self) -> ObjectId {
		let id = self.objects.register(self.bitmap.len());
		tracing::trace!(kind = %self.kind, serial = id.serial(), "object registered");
		id
	}

	/// Removes an object from the live set.
	///
	/// Instances still stored on the object are dropped and their types'
	/// reference counts decremented. Returns the number of instances dropped.
	pub fn deregister_object(&mut self, id: ObjectId) -> Result<usize, ObjectError> {
		let storage = self
			.objects
			.deregister(id)
			.ok_or(ObjectError::Unknown(id))?;

		let mut dropped = 0;
		for entry in storage.into_entries() {
			let key = entry.key;
			let slot = entry.slot;
			drop(entry.value);
			self.release_instance(&key, slot);
			dropped += 1;
		}
		tracing::trace!(kind = %self.kind, serial = id.serial(), dropped, "object deregistered");
		Ok(dropped)
	}

	pub fn object(&self, id: ObjectId) -> Option<&ObjectStorage> {
		self.objects.get(id)
	}

	pub fn storage_len(&self, id: ObjectId) -> Option<usize> {
		self.objects.get(id).map(ObjectStorage::len)
	}

	pub fn live_objects(&self) -> usize {
		self.objects.len()
	}

	pub fn objects(&self) -> Vec<ObjectId> {
		self.objects.ids()
	}

	#[inline]
	pub fn lookup(&self, key: &TypeKey) -> Option<&TypeRecord> {
		self.types.lookup(key)
	}

	/// Records in slot order.
	pub fn records(&self) -> impl Iterator<Item = (&TypeKey, &TypeRecord)> {
		self.types.iter()
	}

	/// Returns the record for `key`, allocating a slot for it when absent.
	pub fn get_or_create(&mut self, key: &TypeKey) -> &TypeRecord {
		self.record_mut(key)
	}

	pub(crate) fn record_mut(&mut self, key: &TypeKey) -> &mut TypeRecord {
		let kind = self.kind;
		let bitmap = &mut self.bitmap;
		let objects = &mut self.objects;
		self.types.get_or_insert_with(key, || {
			let allocation = bitmap.allocate();
			if allocation.grew {
				objects.grow_all(bitmap.len());
			}
			tracing::debug!(
				%kind,
				key = %key,
				index = allocation.slot.index,
				generation = allocation.slot.generation,
				grew = allocation.grew,
				"allocated extension slot"
			);
			allocation.slot
		})
	}

	/// Frees the slot held by `key` and drops its record.
	///
	/// Refused while any object still stores an instance of the type.
	pub fn release(&mut self, key: &TypeKey) -> Result<SlotRef, ReleaseError> {
		let record = self
			.types
			.lookup(key)
			.ok_or_else(|| ReleaseError::NotRegistered(key.clone()))?;
		if record.ref_count != 0 {
			return Err(ReleaseError::InUse {
				key: key.clone(),
				ref_count: record.ref_count,
			});
		}
		let slot = record.slot();
		self.bitmap.free(slot.index)?;
		self.types.remove(key);
		tracing::debug!(
			kind = %self.kind,
			key = %key,
			index = slot.index,
			"released extension slot"
		);
		Ok(slot)
	}

	/// Clears failure flags on `key`, releasing its slot if nothing uses it.
	pub fn reset(&mut self, key: &TypeKey) -> Result<(), ReleaseError> {
		let record = self
			.types
			.lookup_mut(key)
			.ok_or_else(|| ReleaseError::NotRegistered(key.clone()))?;
		record.failed = false;
		record.plugin_construct_failed = false;
		let unused = record.ref_count == 0;
		self.types.bump_epoch();
		tracing::debug!(kind = %self.kind, key = %key, "extension type reset");
		if unused {
			self.release(key)?;
		}
		Ok(())
	}

	/// Flags that the plugin owning `key` failed to start. Returns false when
	/// no record exists for the key.
	pub fn mark_plugin_failed(&mut self, key: &TypeKey) -> bool {
		match self.types.lookup_mut(key) {
			Some(record) => {
				record.plugin_construct_failed = true;
				true
			}
			None => false,
		}
	}

	pub(crate) fn mark_failed(&mut self, key: &TypeKey) {
		if let Some(record) = self.types.lookup_mut(key) {
			record.failed = true;
			self.types.bump_epoch();
		}
	}

	pub(crate) fn storage_mut(&mut self, id: ObjectId) -> Option<&mut ObjectStorage> {
		self.objects.get_mut(id)
	}

	/// Accounts for one instance of `key` leaving an object.
	pub(crate) fn release_instance(&mut self, key: &TypeKey, slot: SlotRef) {
		let Some(record) = self.types.lookup_mut(key) else {
			tracing::warn!(kind = %self.kind, key = %key, "instance dropped for unregistered type");
			return;
		};
		if record.slot() != slot {
			tracing::warn!(
				kind = %self.kind,
				key = %key,
				index = slot.index,
				"instance dropped for a stale slot tenancy"
			);
			return;
		}
		record.ref_count = record.ref_count.saturating_sub(1);
		if record.ref_count == 0
			&& !record.failed
			&& let Err(error) = self.release(key)
		{
			tracing::warn!(kind = %self.kind, key = %key, %error, "failed to release slot");
		}
	}
}
