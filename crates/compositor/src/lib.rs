//! Minimal compositor core hosting plugins through extension storage.
//!
//! # Purpose
//!
//! Owns the display, the screen, and the managed windows, and runs a stack of
//! plugins that attach their own data to those objects via
//! [`lumen_extension`].
//!
//! # Mental Model
//!
//! - [`Core`]: the objects and one extension space per [`BaseKind`].
//! - [`Plugin`]: hooks called when a plugin starts or stops and when windows
//!   come and go. Builtins are collected with `inventory` and loaded by name.
//! - [`Compositor`]: the plugin stack, configured by [`CompositorConfig`].
//!
//! [`BaseKind`]: lumen_extension::BaseKind

pub mod compositor;
pub mod config;
pub mod error;
pub mod objects;
pub mod plugin;
pub mod plugins;
pub mod values;

pub use compositor::{Compositor, abi_value_name};
pub use config::{CompositorConfig, ScreenConfig};
pub use error::{ConfigError, HookError, PluginError, Stage, WindowError};
pub use objects::{Core, Display, Screen, Window};
pub use plugin::{Plugin, PluginDef, PluginReg, all_plugins, find_plugin, load};
pub use values::{Value, ValueStore};
