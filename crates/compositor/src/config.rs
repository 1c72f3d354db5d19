//! Compositor startup configuration.
//!
//! Configuration is written in TOML:
//!
//! ```toml
//! # Builtin plugins pushed at startup, in order.
//! plugins = ["decor", "fade"]
//!
//! # Treat extensions left behind by a popped plugin as an error.
//! strict_unload = true
//!
//! [screen]
//! width = 2560
//! height = 1440
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompositorConfig {
	/// Plugins to push at startup, oldest first.
	pub plugins: Vec<String>,
	/// Report leaked extensions on pop as an error instead of a warning.
	pub strict_unload: bool,
	pub screen: ScreenConfig,
}

impl Default for CompositorConfig {
	fn default() -> Self {
		Self {
			plugins: Vec::new(),
			strict_unload: true,
			screen: ScreenConfig::default(),
		}
	}
}

/// Geometry of the managed screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScreenConfig {
	pub width: u32,
	pub height: u32,
}

impl Default for ScreenConfig {
	fn default() -> Self {
		Self {
			width: 1920,
			height: 1080,
		}
	}
}

impl CompositorConfig {
	/// Parses configuration from a TOML string.
	pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
		Ok(toml::from_str(input)?)
	}

	/// Reads and parses a configuration file.
	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		let input = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::from_toml_str(&input)
	}
}
