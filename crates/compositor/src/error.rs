//! Error types for plugin lifecycle and configuration.

use std::path::PathBuf;

use lumen_extension::{ConstructError, DestroyError, TypeKey};
use thiserror::Error;

/// Errors raised by a plugin's own init/fini hooks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookError {
	#[error(transparent)]
	Construct(#[from] ConstructError),

	#[error(transparent)]
	Destroy(#[from] DestroyError),

	#[error("{0}")]
	Message(String),
}

impl HookError {
	pub fn msg(message: impl Into<String>) -> Self {
		Self::Message(message.into())
	}
}

/// Stage of plugin startup that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
	Init,
	Display,
	Screen,
	Window(u64),
}

impl std::fmt::Display for Stage {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Stage::Init => f.write_str("init"),
			Stage::Display => f.write_str("init_display"),
			Stage::Screen => f.write_str("init_screen"),
			Stage::Window(xid) => write!(f, "init_window({xid:#x})"),
		}
	}
}

/// Errors raised by the plugin manager.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PluginError {
	/// A plugin of the same name is already on the stack.
	#[error("plugin '{0}' already active")]
	AlreadyActive(String),

	/// No builtin plugin has the requested name.
	#[error("plugin '{0}' not found")]
	NotFound(String),

	/// The plugin is not on the stack.
	#[error("plugin '{0}' not loaded")]
	NotLoaded(String),

	/// `pop` was called with no active plugins.
	#[error("no plugin is active")]
	Empty,

	/// A startup hook failed and the plugin was rolled back.
	#[error("failed to start plugin '{name}' during {stage}: {source}")]
	StartFailed {
		name: String,
		stage: Stage,
		source: HookError,
	},

	/// The plugin's ABI differs from the one the caller was built against.
	#[error("plugin '{name}' has ABI version {found}, expected {expected}")]
	AbiMismatch {
		name: String,
		expected: u32,
		found: u32,
	},

	/// A popped plugin left extension instances on live objects.
	#[error("plugin '{name}' left {} extension type(s) constructed", .keys.len())]
	LeakedExtensions { name: String, keys: Vec<TypeKey> },
}

/// Errors raised by window bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WindowError {
	#[error("window {0:#x} already managed")]
	Duplicate(u64),
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("I/O error reading {path}: {error}")]
	Io {
		path: PathBuf,
		error: std::io::Error,
	},

	#[error("TOML parse error: {0}")]
	Parse(#[from] toml::de::Error),
}
