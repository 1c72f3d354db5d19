//! Error types for slot allocation and extension lifecycle operations.

use thiserror::Error;

use crate::key::TypeKey;
use crate::slot::SlotIndex;
use crate::storage::ObjectId;

/// Errors returned by the slot bitmap.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlotError {
	/// The index was never allocated.
	#[error("slot {index} out of range (bitmap holds {len} slots)")]
	OutOfRange { index: SlotIndex, len: usize },
	/// The index is already on the free list.
	#[error("slot {index} is already free")]
	AlreadyFree { index: SlotIndex },
}

/// Errors returned when giving a type's slot index back to the bitmap.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReleaseError {
	/// No record exists for the key.
	#[error("no registration for {0}")]
	NotRegistered(TypeKey),
	/// Instances of the type are still stored on live objects.
	#[error("{key} still has {ref_count} live instance(s)")]
	InUse { key: TypeKey, ref_count: usize },
	#[error(transparent)]
	Slot(#[from] SlotError),
}

/// Errors returned by [`crate::ExtensionHandle::construct`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstructError {
	/// A previous construction of this type failed and the key was not reset.
	#[error("construction of {0} previously failed")]
	Failed(TypeKey),
	/// The object is not registered with the registry.
	#[error("object {0:?} is not registered")]
	UnknownObject(ObjectId),
	/// The object already carries an instance of this type.
	#[error("{key} already constructed on {object:?}")]
	AlreadyConstructed { key: TypeKey, object: ObjectId },
	/// The extension's own initializer reported an error.
	#[error("initializer for {key} failed: {message}")]
	InitFailed { key: TypeKey, message: String },
	/// The slot holds a value of another type.
	#[error("slot for {0} holds a value of a different type")]
	TypeMismatch(TypeKey),
}

/// Errors returned by [`crate::ExtensionHandle::destroy`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DestroyError {
	#[error("object {0:?} is not registered")]
	UnknownObject(ObjectId),
	/// Nothing of this type is stored on the object.
	#[error("{key} is not constructed on {object:?}")]
	NotConstructed { key: TypeKey, object: ObjectId },
}

/// Errors returned by live-object bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObjectError {
	#[error("object {0:?} is not registered")]
	Unknown(ObjectId),
}
