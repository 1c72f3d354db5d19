//! Typed access to extension instances.

use std::any::Any;
use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;

use crate::error::{ConstructError, DestroyError, ReleaseError};
use crate::key::TypeKey;
use crate::record::HandleState;
use crate::registry::ExtensionRegistry;
use crate::slot::{SlotIndex, SlotRef};
use crate::storage::{ObjectId, SlotEntry};

/// Cached key-to-slot resolution, valid while the registry and epoch match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Binding {
	registry: u64,
	epoch: u64,
	slot: SlotRef,
	failed: bool,
}

/// Typed accessor for extensions of type `T` registered under one [`TypeKey`].
///
/// The handle is the only way plugin code reaches slot storage. After the
/// first access it caches the slot binding for its key; the cache is reused
/// for as long as the registry's epoch is unchanged, so repeated access costs
/// one vector index plus the tenancy check.
pub struct ExtensionHandle<T> {
	key: TypeKey,
	cache: Cell<Option<Binding>>,
	_marker: PhantomData<fn() -> T>,
}

impl<T: Any> ExtensionHandle<T> {
	/// Handle keyed by the Rust type name of `T` and `abi`.
	pub fn new(abi: u32) -> Self {
		Self::with_key(TypeKey::of::<T>(abi))
	}

	/// Handle keyed by an explicit type name and `abi`.
	pub fn named(name: &'static str, abi: u32) -> Self {
		Self::with_key(TypeKey::new(name, abi))
	}

	pub fn with_key(key: TypeKey) -> Self {
		Self {
			key,
			cache: Cell::new(None),
			_marker: PhantomData,
		}
	}

	pub fn key(&self) -> &TypeKey {
		&self.key
	}

	fn binding(&self, registry: &ExtensionRegistry) -> Option<Binding> {
		if let Some(binding) = self.cache.get()
			&& binding.registry == registry.id()
			&& binding.epoch == registry.epoch()
		{
			return Some(binding);
		}

		let Some(record) = registry.lookup(&self.key) else {
			self.cache.set(None);
			return None;
		};
		let binding = Binding {
			registry: registry.id(),
			epoch: registry.epoch(),
			slot: record.slot(),
			failed: record.failed,
		};
		tracing::trace!(key = %self.key, index = binding.slot.index, "refreshed extension binding");
		self.cache.set(Some(binding));
		Some(binding)
	}

	/// Slot index currently assigned to this handle's key.
	pub fn index(&self, registry: &ExtensionRegistry) -> Option<SlotIndex> {
		self.binding(registry).map(|b| b.slot.index)
	}

	/// Returns the instance stored on `object`, if any.
	///
	/// Returns `None` when nothing was constructed, when the key has failed,
	/// or when the slot belongs to a different tenancy.
	pub fn get<'r>(&self, registry: &'r ExtensionRegistry, object: ObjectId) -> Option<&'r T> {
		let binding = self.binding(registry)?;
		if binding.failed {
			return None;
		}
		let entry = registry.objects.get(object)?.entry(binding.slot.index)?;
		if entry.slot != binding.slot {
			return None;
		}
		entry.value.downcast_ref::<T>()
	}

	pub fn get_mut<'r>(
		&self,
		registry: &'r mut ExtensionRegistry,
		object: ObjectId,
	) -> Option<&'r mut T> {
		let binding = self.binding(registry)?;
		if binding.failed {
			return None;
		}
		let entry = registry
			.storage_mut(object)?
			.entry_mut(binding.slot.index)?;
		if entry.slot != binding.slot {
			return None;
		}
		entry.value.downcast_mut::<T>()
	}

	/// Builds an instance with `init` and stores it on `object`.
	///
	/// A failing `init` marks the key failed; later calls are refused with
	/// [`ConstructError::Failed`] until [`Self::reset`].
	pub fn construct<'r, E>(
		&self,
		registry: &'r mut ExtensionRegistry,
		object: ObjectId,
		init: impl FnOnce() -> Result<T, E>,
	) -> Result<&'r mut T, ConstructError>
	where
		E: fmt::Display,
	{
		if registry.lookup(&self.key).is_some_and(|r| r.failed) {
			return Err(ConstructError::Failed(self.key.clone()));
		}
		if registry.object(object).is_none() {
			return Err(ConstructError::UnknownObject(object));
		}

		let slot = registry.record_mut(&self.key).slot();
		if registry
			.object(object)
			.is_some_and(|s| s.is_occupied(slot.index))
		{
			tracing::warn!(
				key = %self.key,
				serial = object.serial(),
				"rejected double construction"
			);
			return Err(ConstructError::AlreadyConstructed {
				key: self.key.clone(),
				object,
			});
		}

		let value = match init() {
			Ok(value) => value,
			Err(error) => {
				registry.mark_failed(&self.key);
				tracing::warn!(key = %self.key, %error, "extension construction failed");
				return Err(ConstructError::InitFailed {
					key: self.key.clone(),
					message: error.to_string(),
				});
			}
		};

		let entry = SlotEntry {
			key: self.key.clone(),
			slot,
			value: Box::new(value),
		};
		let storage = registry
			.storage_mut(object)
			.ok_or(ConstructError::UnknownObject(object))?;
		match storage.put(entry).map(|stored| stored.value.is::<T>()) {
			Some(true) => {}
			Some(false) => {
				storage.take(slot.index);
				return Err(ConstructError::TypeMismatch(self.key.clone()));
			}
			None => {
				return Err(ConstructError::AlreadyConstructed {
					key: self.key.clone(),
					object,
				});
			}
		}

		// Counted only once the instance is stored.
		let record = registry.record_mut(&self.key);
		record.ref_count += 1;
		record.initiated = true;
		tracing::trace!(
			key = %self.key,
			index = slot.index,
			ref_count = record.ref_count,
			"extension constructed"
		);

		registry
			.storage_mut(object)
			.and_then(|storage| storage.entry_mut(slot.index))
			.and_then(|entry| entry.value.downcast_mut::<T>())
			.ok_or_else(|| ConstructError::TypeMismatch(self.key.clone()))
	}

	/// Drops the instance stored on `object` and clears its slot.
	///
	/// When the last instance of the key is destroyed, the slot index returns
	/// to the free list and the record is removed.
	pub fn destroy(
		&self,
		registry: &mut ExtensionRegistry,
		object: ObjectId,
	) -> Result<(), DestroyError> {
		let not_constructed = || DestroyError::NotConstructed {
			key: self.key.clone(),
			object,
		};
		let binding = self.binding(registry).ok_or_else(not_constructed)?;
		let storage = registry
			.storage_mut(object)
			.ok_or(DestroyError::UnknownObject(object))?;
		if storage
			.entry(binding.slot.index)
			.is_none_or(|entry| entry.slot != binding.slot)
		{
			return Err(not_constructed());
		}

		if let Some(entry) = storage.take(binding.slot.index) {
			drop(entry.value);
		}
		registry.release_instance(&self.key, binding.slot);
		tracing::trace!(key = %self.key, index = binding.slot.index, "extension destroyed");
		Ok(())
	}

	pub fn state(&self, registry: &ExtensionRegistry) -> HandleState {
		registry
			.lookup(&self.key)
			.map(HandleState::from)
			.unwrap_or_default()
	}

	/// Clears the failed state of the key so construction may be retried.
	pub fn reset(&self, registry: &mut ExtensionRegistry) -> Result<(), ReleaseError> {
		self.cache.set(None);
		registry.reset(&self.key)
	}

	/// Records that the plugin wrapping this type failed to start.
	pub fn mark_plugin_failed(&self, registry: &mut ExtensionRegistry) -> bool {
		registry.mark_plugin_failed(&self.key)
	}
}

impl<T> fmt::Debug for ExtensionHandle<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ExtensionHandle")
			.field("key", &self.key)
			.field("cached", &self.cache.get().map(|b| b.slot))
			.finish()
	}
}
