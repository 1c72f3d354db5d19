//! Named scalar values shared between plugins.
//!
//! Plugins publish small facts under well-known names, such as their ABI
//! version under `<name>_ABI`, so peers can check compatibility before
//! touching each other's extension types.

use rustc_hash::FxHashMap;

/// A stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
	Uint(u64),
	Str(String),
}

impl Value {
	pub fn as_uint(&self) -> Option<u64> {
		match self {
			Value::Uint(value) => Some(*value),
			Value::Str(_) => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::Str(value) => Some(value),
			Value::Uint(_) => None,
		}
	}
}

impl From<u64> for Value {
	fn from(value: u64) -> Self {
		Value::Uint(value)
	}
}

impl From<u32> for Value {
	fn from(value: u32) -> Self {
		Value::Uint(value.into())
	}
}

impl From<&str> for Value {
	fn from(value: &str) -> Self {
		Value::Str(value.to_owned())
	}
}

impl From<String> for Value {
	fn from(value: String) -> Self {
		Value::Str(value)
	}
}

/// String-keyed value store.
#[derive(Debug, Default)]
pub struct ValueStore {
	values: FxHashMap<String, Value>,
}

impl ValueStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Stores `value` under `name`, returning the previous value.
	pub fn store_value(
		&mut self,
		name: impl Into<String>,
		value: impl Into<Value>,
	) -> Option<Value> {
		self.values.insert(name.into(), value.into())
	}

	pub fn has_value(&self, name: &str) -> bool {
		self.values.contains_key(name)
	}

	pub fn get_value(&self, name: &str) -> Option<&Value> {
		self.values.get(name)
	}

	pub fn erase_value(&mut self, name: &str) -> Option<Value> {
		self.values.remove(name)
	}

	pub fn len(&self) -> usize {
		self.values.len()
	}

	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}
}
