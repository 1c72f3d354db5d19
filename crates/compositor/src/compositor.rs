//! Plugin stack and window lifecycle.
//!
//! # Purpose
//!
//! Drives plugins through their hooks against the [`Core`] objects and keeps
//! the extension spaces consistent while plugins come and go.
//!
//! # Mental Model
//!
//! - Plugins form a stack. [`Compositor::push`] starts a plugin against the
//!   display, the screen, and every managed window; [`Compositor::pop`] stops
//!   the most recently pushed one.
//! - A plugin that fails to start is rolled back: hooks that succeeded are
//!   undone in reverse and `fini` runs. Its records are flagged
//!   `plugin_construct_failed`; those left without instances are reset so
//!   their slots are freed and the plugin can be pushed again.
//! - Windows mapped while plugins are active get `init_window` from every
//!   plugin, oldest first; unmapping runs `fini_window` newest first.
//!
//! # Invariants
//!
//! - Must not start two plugins with the same name.
//!   - Enforced in: [`Compositor::push`].
//!   - Tested by: `tests/plugins.rs::duplicate_push_is_rejected`.
//! - Must leave no hook half-applied when startup fails.
//!   - Enforced in: `start_plugin`.
//!   - Tested by: `tests/plugins.rs::failed_start_rolls_back_windows`.
//! - Must free the slots of a failed plugin's unused records.
//!   - Enforced in: `release_unused`.
//!   - Tested by: `tests/plugins.rs::failed_plugin_can_be_pushed_again`.
//! - Must publish `<name>_ABI` exactly while the plugin is active.
//!   - Enforced in: [`Compositor::push`], [`Compositor::pop`].
//!   - Tested by: `tests/plugins.rs::abi_value_tracks_plugin_lifetime`.

use lumen_extension::{ShutdownReport, TypeKey};

use crate::config::CompositorConfig;
use crate::error::{HookError, PluginError, Stage, WindowError};
use crate::objects::{Core, Window};
use crate::plugin::{self, Plugin};
use crate::values::Value;

/// Name of the value a plugin's ABI version is published under.
pub fn abi_value_name(plugin: &str) -> String {
	format!("{plugin}_ABI")
}

/// Compositor state: core objects plus the active plugin stack.
pub struct Compositor {
	core: Core,
	/// Active plugins in push order.
	plugins: Vec<Box<dyn Plugin>>,
	config: CompositorConfig,
}

impl std::fmt::Debug for Compositor {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Compositor")
			.field("core", &self.core)
			.field("plugins", &self.active())
			.finish_non_exhaustive()
	}
}

impl Default for Compositor {
	fn default() -> Self {
		Self::new(CompositorConfig::default())
	}
}

impl Compositor {
	/// Creates core objects without starting any plugin.
	pub fn new(config: CompositorConfig) -> Self {
		Self {
			core: Core::new(config.screen),
			plugins: Vec::new(),
			config,
		}
	}

	/// Creates core objects and pushes every configured builtin plugin.
	///
	/// Plugins that are unknown or fail to start are logged and skipped.
	pub fn from_config(config: CompositorConfig) -> Self {
		let names = config.plugins.clone();
		let mut compositor = Self::new(config);
		for name in names {
			if let Err(error) = compositor.push_named(&name) {
				tracing::warn!(plugin = %name, %error, "skipping configured plugin");
			}
		}
		compositor
	}

	pub fn core(&self) -> &Core {
		&self.core
	}

	pub fn core_mut(&mut self) -> &mut Core {
		&mut self.core
	}

	pub fn config(&self) -> &CompositorConfig {
		&self.config
	}

	/// Loads the builtin plugin `name` and pushes it.
	pub fn push_named(&mut self, name: &str) -> Result<(), PluginError> {
		let plugin = plugin::load(name).ok_or_else(|| PluginError::NotFound(name.to_owned()))?;
		self.push(plugin)
	}

	/// Starts `plugin` and puts it on top of the stack.
	pub fn push(&mut self, mut plugin: Box<dyn Plugin>) -> Result<(), PluginError> {
		let name = plugin.name().to_owned();
		if self.find(&name).is_some() {
			tracing::warn!(plugin = %name, "plugin already active");
			return Err(PluginError::AlreadyActive(name));
		}

		if let Err((stage, source)) = start_plugin(&mut self.core, plugin.as_mut()) {
			let flagged = flag_construct_failed(&mut self.core, plugin.as_ref());
			let released = release_unused(&mut self.core, plugin.as_ref());
			tracing::error!(
				plugin = %name,
				%stage,
				error = %source,
				flagged,
				released,
				"plugin failed to start"
			);
			return Err(PluginError::StartFailed { name, stage, source });
		}

		let abi = plugin.abi();
		self.core.values_mut().store_value(abi_value_name(&name), abi);
		tracing::info!(plugin = %name, abi, "plugin started");
		self.plugins.push(plugin);
		Ok(())
	}

	/// Stops the most recently pushed plugin and returns its name.
	///
	/// The plugin is removed even when it leaked extension instances; with
	/// `strict_unload` the leak is reported as [`PluginError::LeakedExtensions`].
	pub fn pop(&mut self) -> Result<String, PluginError> {
		let mut plugin = self.plugins.pop().ok_or(PluginError::Empty)?;
		let name = plugin.name().to_owned();
		stop_plugin(&mut self.core, plugin.as_mut());
		self.core.values_mut().erase_value(&abi_value_name(&name));
		tracing::info!(plugin = %name, "plugin stopped");

		let leaked = leaked_keys(&self.core, plugin.as_ref());
		if leaked.is_empty() {
			return Ok(name);
		}
		let leaked_names: Vec<_> = leaked.iter().map(TypeKey::key_name).collect();
		if self.config.strict_unload {
			tracing::error!(
				plugin = %name,
				leaked = ?leaked_names,
				"plugin left extensions constructed"
			);
			return Err(PluginError::LeakedExtensions { name, keys: leaked });
		}
		tracing::warn!(
			plugin = %name,
			leaked = ?leaked_names,
			"plugin left extensions constructed"
		);
		Ok(name)
	}

	/// Finds an active plugin by name.
	pub fn find(&self, name: &str) -> Option<&dyn Plugin> {
		self.plugins
			.iter()
			.find(|p| p.name() == name)
			.map(|p| p.as_ref())
	}

	/// Names of active plugins, most recently pushed first.
	pub fn active(&self) -> Vec<&str> {
		self.plugins.iter().rev().map(|p| p.name()).collect()
	}

	/// Checks that plugin `name` is active with ABI version `abi`.
	pub fn check_plugin_abi(&self, name: &str, abi: u32) -> Result<(), PluginError> {
		let found = self
			.core
			.values()
			.get_value(&abi_value_name(name))
			.and_then(Value::as_uint)
			.ok_or_else(|| PluginError::NotLoaded(name.to_owned()))?;
		if found != u64::from(abi) {
			tracing::warn!(plugin = %name, expected = abi, found, "plugin ABI mismatch");
			return Err(PluginError::AbiMismatch {
				name: name.to_owned(),
				expected: abi,
				found: u32::try_from(found).unwrap_or(u32::MAX),
			});
		}
		Ok(())
	}

	/// Starts managing window `xid` and runs every plugin's `init_window`.
	///
	/// A failing hook is logged; the window stays managed.
	pub fn add_window(&mut self, xid: u64) -> Result<Window, WindowError> {
		if self.core.find_window(xid).is_some() {
			return Err(WindowError::Duplicate(xid));
		}
		let window = self.core.attach_window(xid);
		tracing::debug!(xid, object = window.object.serial(), "window added");

		for plugin in &mut self.plugins {
			if let Err(error) = plugin.init_window(&mut self.core, window) {
				tracing::warn!(plugin = %plugin.name(), xid, %error, "init_window failed");
			}
		}
		Ok(window)
	}

	/// Runs every plugin's `fini_window` for `xid`, then forgets the window.
	///
	/// Returns false if the window is not managed.
	pub fn remove_window(&mut self, xid: u64) -> bool {
		let Some(window) = self.core.find_window(xid) else {
			return false;
		};
		for plugin in self.plugins.iter_mut().rev() {
			plugin.fini_window(&mut self.core, window);
		}
		self.core.detach_window(xid);
		tracing::debug!(xid, "window removed");
		true
	}

	/// Stops every plugin, newest first, and tears down the extension spaces.
	pub fn shutdown(mut self) -> Vec<ShutdownReport> {
		while !self.plugins.is_empty() {
			if let Err(error) = self.pop() {
				tracing::warn!(%error, "plugin did not stop cleanly");
			}
		}
		self.core.into_reports()
	}
}

/// Runs startup hooks, undoing completed ones if a later hook fails.
fn start_plugin(core: &mut Core, plugin: &mut dyn Plugin) -> Result<(), (Stage, HookError)> {
	plugin.init(core).map_err(|e| (Stage::Init, e))?;

	let display = core.display();
	if let Err(e) = plugin.init_display(core, display) {
		plugin.fini(core);
		return Err((Stage::Display, e));
	}

	let screen = core.screen();
	if let Err(e) = plugin.init_screen(core, screen) {
		plugin.fini_display(core, display);
		plugin.fini(core);
		return Err((Stage::Screen, e));
	}

	let windows = core.windows().to_vec();
	for (done, window) in windows.iter().enumerate() {
		if let Err(e) = plugin.init_window(core, *window) {
			for started in windows[..done].iter().rev() {
				plugin.fini_window(core, *started);
			}
			plugin.fini_screen(core, screen);
			plugin.fini_display(core, display);
			plugin.fini(core);
			return Err((Stage::Window(window.xid), e));
		}
	}
	Ok(())
}

fn stop_plugin(core: &mut Core, plugin: &mut dyn Plugin) {
	let windows = core.windows().to_vec();
	for window in windows.into_iter().rev() {
		plugin.fini_window(core, window);
	}
	let screen = core.screen();
	plugin.fini_screen(core, screen);
	let display = core.display();
	plugin.fini_display(core, display);
	plugin.fini(core);
}

/// Flags records a failed start left behind. Returns how many were flagged.
fn flag_construct_failed(core: &mut Core, plugin: &dyn Plugin) -> usize {
	plugin
		.extension_keys()
		.into_iter()
		.filter(|(kind, key)| core.extensions_mut(*kind).mark_plugin_failed(key))
		.count()
}

/// Resets records of `plugin` that hold no instances, freeing their slots so
/// the plugin can be pushed again. Returns how many were released.
fn release_unused(core: &mut Core, plugin: &dyn Plugin) -> usize {
	let mut released = 0;
	for (kind, key) in plugin.extension_keys() {
		let space = core.extensions_mut(kind);
		if !space.lookup(&key).is_some_and(|record| record.ref_count == 0) {
			continue;
		}
		match space.reset(&key) {
			Ok(()) => released += 1,
			Err(error) => {
				tracing::warn!(%kind, key = %key, %error, "failed to reset extension type");
			}
		}
	}
	released
}

/// Keys of `plugin` that still have instances stored.
fn leaked_keys(core: &Core, plugin: &dyn Plugin) -> Vec<TypeKey> {
	plugin
		.extension_keys()
		.into_iter()
		.filter(|(kind, key)| {
			core.extensions(*kind)
				.lookup(key)
				.is_some_and(|record| record.ref_count > 0)
		})
		.map(|(_, key)| key)
		.collect()
}
