//! Plugin vtable and the link-time catalog of builtin plugins.
//!
//! Builtin plugins describe themselves with a static [`PluginDef`] and submit
//! it with `inventory::submit!`. The compositor instantiates them by name
//! through [`load`].

use std::collections::HashMap;
use std::sync::LazyLock;

use lumen_extension::{BaseKind, TypeKey};

use crate::error::HookError;
use crate::objects::{Core, Display, Screen, Window};

/// Lifecycle hooks a plugin implements.
///
/// Every hook defaults to a successful no-op. Startup hooks run in the order
/// `init`, `init_display`, `init_screen`, `init_window`; teardown runs the
/// matching `fini_*` hooks in reverse.
pub trait Plugin {
	fn name(&self) -> &str;

	/// Version published under `<name>_ABI` while the plugin is active.
	fn abi(&self) -> u32 {
		0
	}

	/// Extension types this plugin constructs, checked for leaks on unload.
	fn extension_keys(&self) -> Vec<(BaseKind, TypeKey)> {
		Vec::new()
	}

	fn init(&mut self, _core: &mut Core) -> Result<(), HookError> {
		Ok(())
	}

	fn fini(&mut self, _core: &mut Core) {}

	fn init_display(&mut self, _core: &mut Core, _display: Display) -> Result<(), HookError> {
		Ok(())
	}

	fn fini_display(&mut self, _core: &mut Core, _display: Display) {}

	fn init_screen(&mut self, _core: &mut Core, _screen: Screen) -> Result<(), HookError> {
		Ok(())
	}

	fn fini_screen(&mut self, _core: &mut Core, _screen: Screen) {}

	fn init_window(&mut self, _core: &mut Core, _window: Window) -> Result<(), HookError> {
		Ok(())
	}

	fn fini_window(&mut self, _core: &mut Core, _window: Window) {}
}

/// A builtin plugin definition.
pub struct PluginDef {
	/// Name used in configuration and for lookup.
	pub name: &'static str,
	/// Human-readable description.
	pub description: &'static str,
	/// Creates a fresh plugin instance.
	pub build: fn() -> Box<dyn Plugin>,
}

impl std::fmt::Debug for PluginDef {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("PluginDef")
			.field("name", &self.name)
			.field("description", &self.description)
			.finish_non_exhaustive()
	}
}

/// Registry wrapper for builtin plugin definitions.
pub struct PluginReg(pub &'static PluginDef);
inventory::collect!(PluginReg);

static PLUGIN_INDEX: LazyLock<HashMap<&'static str, &'static PluginDef>> = LazyLock::new(|| {
	let mut map = HashMap::new();
	for reg in inventory::iter::<PluginReg> {
		if map.insert(reg.0.name, reg.0).is_some() {
			tracing::warn!(name = reg.0.name, "duplicate builtin plugin definition");
		}
	}
	map
});

/// Finds a builtin plugin definition by name.
pub fn find_plugin(name: &str) -> Option<&'static PluginDef> {
	PLUGIN_INDEX.get(name).copied()
}

/// All builtin plugin definitions, sorted by name.
pub fn all_plugins() -> Vec<&'static PluginDef> {
	let mut defs: Vec<_> = PLUGIN_INDEX.values().copied().collect();
	defs.sort_by_key(|def| def.name);
	defs
}

/// Instantiates the builtin plugin called `name`.
pub fn load(name: &str) -> Option<Box<dyn Plugin>> {
	find_plugin(name).map(|def| (def.build)())
}
