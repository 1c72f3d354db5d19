use std::borrow::Cow;
use std::fmt;

/// Kind of core object an index space serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseKind {
	/// The managed screen.
	Screen,
	/// Top-level client windows.
	Window,
	/// The display connection.
	Display,
}

impl BaseKind {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Screen => "screen",
			Self::Window => "window",
			Self::Display => "display",
		}
	}
}

impl fmt::Display for BaseKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Identifies one registrable extension type.
///
/// Two keys with the same name but different ABI versions are unrelated and
/// receive independent slot indices, so incompatible builds of one plugin type
/// can coexist in a single process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey {
	name: Cow<'static, str>,
	abi: u32,
}

impl TypeKey {
	/// Creates a key from a static type name.
	pub const fn new(name: &'static str, abi: u32) -> Self {
		Self {
			name: Cow::Borrowed(name),
			abi,
		}
	}

	/// Creates a key from a runtime-provided type name.
	pub fn owned(name: impl Into<String>, abi: u32) -> Self {
		Self {
			name: Cow::Owned(name.into()),
			abi,
		}
	}

	/// Creates a key named after the Rust type `T`.
	pub fn of<T: ?Sized + 'static>(abi: u32) -> Self {
		Self::new(std::any::type_name::<T>(), abi)
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn abi(&self) -> u32 {
		self.abi
	}

	/// Returns the diagnostic name `"<name>_index_<abi>"`.
	pub fn key_name(&self) -> String {
		format!("{}_index_{}", self.name, self.abi)
	}
}

impl fmt::Display for TypeKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}_index_{}", self.name, self.abi)
	}
}
