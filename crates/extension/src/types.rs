use std::collections::hash_map::Entry;

use rustc_hash::FxHashMap;

use crate::key::TypeKey;
use crate::record::TypeRecord;
use crate::slot::SlotRef;

/// Table of registration records keyed by [`TypeKey`].
///
/// The epoch advances whenever a record appears, disappears, or changes in a
/// way cached handle bindings depend on. A binding taken at the current epoch
/// is still valid.
#[derive(Debug, Default)]
pub struct TypeTable {
	records: FxHashMap<TypeKey, TypeRecord>,
	epoch: u64,
}

impl TypeTable {
	pub fn new() -> Self {
		Self::default()
	}

	#[inline]
	pub fn lookup(&self, key: &TypeKey) -> Option<&TypeRecord> {
		self.records.get(key)
	}

	pub(crate) fn lookup_mut(&mut self, key: &TypeKey) -> Option<&mut TypeRecord> {
		self.records.get_mut(key)
	}

	/// Returns the record for `key`, inserting one at the slot produced by
	/// `alloc` when absent.
	pub(crate) fn get_or_insert_with(
		&mut self,
		key: &TypeKey,
		alloc: impl FnOnce() -> SlotRef,
	) -> &mut TypeRecord {
		match self.records.entry(key.clone()) {
			Entry::Occupied(entry) => entry.into_mut(),
			Entry::Vacant(entry) => {
				self.epoch += 1;
				entry.insert(TypeRecord::new(alloc()))
			}
		}
	}

	pub(crate) fn remove(&mut self, key: &TypeKey) -> Option<TypeRecord> {
		let removed = self.records.remove(key);
		if removed.is_some() {
			self.epoch += 1;
		}
		removed
	}

	pub(crate) fn bump_epoch(&mut self) {
		self.epoch += 1;
	}

	#[inline]
	pub fn epoch(&self) -> u64 {
		self.epoch
	}

	pub fn len(&self) -> usize {
		self.records.len()
	}

	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}

	/// Records sorted by slot index.
	pub fn iter(&self) -> impl Iterator<Item = (&TypeKey, &TypeRecord)> {
		let mut records: Vec<_> = self.records.iter().collect();
		records.sort_by_key(|(_, r)| r.index);
		records.into_iter()
	}
}
