use crate::slot::{SlotIndex, SlotRef};

/// Bookkeeping for one registered extension type within an index space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRecord {
	/// Slot column assigned to the type.
	pub index: SlotIndex,
	/// Tenancy of `index` this record holds.
	pub generation: u32,
	/// Number of objects currently storing an instance of the type.
	pub ref_count: usize,
	/// Set by the first successful construction.
	pub initiated: bool,
	/// Set when a construction attempt fails; blocks further attempts until reset.
	pub failed: bool,
	/// Set when the plugin owning the type failed to start.
	pub plugin_construct_failed: bool,
}

impl TypeRecord {
	pub(crate) fn new(slot: SlotRef) -> Self {
		Self {
			index: slot.index,
			generation: slot.generation,
			ref_count: 0,
			initiated: false,
			failed: false,
			plugin_construct_failed: false,
		}
	}

	pub fn slot(&self) -> SlotRef {
		SlotRef {
			index: self.index,
			generation: self.generation,
		}
	}

	pub fn lifecycle(&self) -> Lifecycle {
		if self.failed {
			Lifecycle::Failed
		} else if self.initiated {
			Lifecycle::Initiated
		} else {
			Lifecycle::Uninitiated
		}
	}
}

/// Construction state of an extension type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
	#[default]
	Uninitiated,
	Initiated,
	/// Terminal until the key is explicitly reset.
	Failed,
}

/// Diagnostic view of a type's state, distinguishing which layer failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HandleState {
	pub lifecycle: Lifecycle,
	pub plugin_construct_failed: bool,
}

impl From<&TypeRecord> for HandleState {
	fn from(record: &TypeRecord) -> Self {
		Self {
			lifecycle: record.lifecycle(),
			plugin_construct_failed: record.plugin_construct_failed,
		}
	}
}
