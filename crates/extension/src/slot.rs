//! Process-wide slot bitmap for one index space.
//!
//! Slots are handed out first-fit: the lowest free slot is reused before the
//! bitmap grows. Each slot carries a generation that advances whenever the
//! slot is freed, so a `(index, generation)` pair names one tenancy of the
//! slot and a holder of an older pair can tell it has been reassigned.

use crate::error::SlotError;

/// Column index shared by the storage of every object in an index space.
pub type SlotIndex = usize;

/// One tenancy of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotRef {
	pub index: SlotIndex,
	pub generation: u32,
}

/// Result of [`SlotBitmap::allocate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
	pub slot: SlotRef,
	/// True when the bitmap appended a slot rather than reusing a free one.
	pub grew: bool,
}

#[derive(Debug, Clone, Copy)]
struct SlotState {
	used: bool,
	generation: u32,
}

/// Free-list of allocated and free slot indices.
#[derive(Debug, Default)]
pub struct SlotBitmap {
	slots: Vec<SlotState>,
}

impl SlotBitmap {
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of slots ever appended. Never shrinks.
	pub fn len(&self) -> usize {
		self.slots.len()
	}

	pub fn is_empty(&self) -> bool {
		self.slots.is_empty()
	}

	/// Number of slots currently marked used.
	pub fn used(&self) -> usize {
		self.slots.iter().filter(|s| s.used).count()
	}

	/// Claims the lowest free slot, appending one if none is free.
	pub fn allocate(&mut self) -> Allocation {
		if let Some(index) = self.slots.iter().position(|s| !s.used) {
			let state = &mut self.slots[index];
			state.used = true;
			return Allocation {
				slot: SlotRef {
					index,
					generation: state.generation,
				},
				grew: false,
			};
		}

		let index = self.slots.len();
		self.slots.push(SlotState {
			used: true,
			generation: 0,
		});
		Allocation {
			slot: SlotRef {
				index,
				generation: 0,
			},
			grew: true,
		}
	}

	/// Returns a slot to the free list and advances its generation.
	pub fn free(&mut self, index: SlotIndex) -> Result<(), SlotError> {
		let len = self.slots.len();
		let state = self
			.slots
			.get_mut(index)
			.ok_or(SlotError::OutOfRange { index, len })?;
		if !state.used {
			return Err(SlotError::AlreadyFree { index });
		}
		state.used = false;
		state.generation = state.generation.wrapping_add(1);
		Ok(())
	}

	pub fn is_used(&self, index: SlotIndex) -> bool {
		self.slots.get(index).is_some_and(|s| s.used)
	}

	/// Returns the current tenancy of a used slot.
	pub fn current(&self, index: SlotIndex) -> Option<SlotRef> {
		let state = self.slots.get(index)?;
		state.used.then_some(SlotRef {
			index,
			generation: state.generation,
		})
	}
}
