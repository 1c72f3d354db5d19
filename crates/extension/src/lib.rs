//! Slot-indexed extension storage for compositor core objects.
//!
//! # Purpose
//!
//! Plugins attach per-instance data to long-lived core objects (screens,
//! windows, displays) that know nothing about them. Each extension type is
//! assigned a slot column; every object of that kind reserves one storage cell
//! per column, so typed access is a vector index.
//!
//! # Mental Model
//!
//! 1. **Index space:** one [`ExtensionRegistry`] per [`BaseKind`], holding a
//!    [`SlotBitmap`], a [`TypeTable`] of [`TypeRecord`]s, and the
//!    [`LiveObjects`] set.
//! 2. **Registration:** objects call [`ExtensionRegistry::register_object`] on
//!    creation and [`ExtensionRegistry::deregister_object`] on destruction.
//! 3. **Access:** plugin code holds an [`ExtensionHandle`] per extension type
//!    and uses `construct`, `get`, `get_mut`, and `destroy`.
//! 4. **Reuse:** when the last instance of a type is destroyed its slot returns
//!    to the bitmap and may be claimed by an unrelated type. Slot generations
//!    keep handles bound to the old tenancy from reaching the new one.
//!
//! # Invariants
//!
//! - Must assign each live record a unique slot index.
//!   - Enforced in: [`SlotBitmap::allocate`], [`ExtensionRegistry::release`].
//!   - Tested by: `registry::tests::indices_are_dense_in_allocation_order`.
//! - Must grow every live object's storage before an allocating call returns.
//!   - Enforced in: [`ExtensionRegistry::get_or_create`].
//!   - Tested by: `registry::tests::growth_reaches_every_live_object`.
//! - Must not free a slot while instances of its type are stored.
//!   - Enforced in: [`ExtensionRegistry::release`].
//!   - Tested by: `registry::tests::release_refused_while_in_use`.
//! - Must not retry construction of a failed key until it is reset.
//!   - Enforced in: [`ExtensionHandle::construct`].
//!   - Tested by: `handle::tests::failed_key_is_not_retried`.
//!
//! # Concurrency
//!
//! Single-threaded. All mutation goes through `&mut ExtensionRegistry`.

pub mod error;
pub mod handle;
pub mod key;
pub mod record;
pub mod registry;
pub mod slot;
pub mod storage;
pub mod types;

pub use error::{ConstructError, DestroyError, ObjectError, ReleaseError, SlotError};
pub use handle::ExtensionHandle;
pub use key::{BaseKind, TypeKey};
pub use record::{HandleState, Lifecycle, TypeRecord};
pub use registry::{ExtensionRegistry, ShutdownReport};
pub use slot::{Allocation, SlotBitmap, SlotIndex, SlotRef};
pub use storage::{LiveObjects, ObjectId, ObjectStorage};
pub use types::TypeTable;
