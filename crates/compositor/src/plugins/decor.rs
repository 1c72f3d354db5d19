//! Window decorations.
//!
//! Attaches a [`Decoration`] to every managed window and a [`Theme`] to the
//! screen. Decorations are sized from the theme when the window is mapped.

use lumen_extension::{BaseKind, ExtensionHandle, TypeKey};

use crate::error::HookError;
use crate::objects::{Core, Screen, Window};
use crate::plugin::{Plugin, PluginDef, PluginReg};

pub const NAME: &str = "decor";
pub const ABI: u32 = 1;

const THEME_KEY: TypeKey = TypeKey::new("decor::Theme", ABI);
const DECORATION_KEY: TypeKey = TypeKey::new("decor::Decoration", ABI);

/// Screen-wide decoration settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme {
	pub title_height: u32,
	pub border_width: u32,
}

/// Frame drawn around one window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoration {
	pub title: String,
	pub title_height: u32,
	pub border_width: u32,
}

pub struct Decor {
	theme: ExtensionHandle<Theme>,
	decoration: ExtensionHandle<Decoration>,
}

impl Default for Decor {
	fn default() -> Self {
		Self {
			theme: ExtensionHandle::with_key(THEME_KEY),
			decoration: ExtensionHandle::with_key(DECORATION_KEY),
		}
	}
}

impl Plugin for Decor {
	fn name(&self) -> &str {
		NAME
	}

	fn abi(&self) -> u32 {
		ABI
	}

	fn extension_keys(&self) -> Vec<(BaseKind, TypeKey)> {
		vec![(BaseKind::Screen, THEME_KEY), (BaseKind::Window, DECORATION_KEY)]
	}

	fn init_screen(&mut self, core: &mut Core, screen: Screen) -> Result<(), HookError> {
		// Thin borders on small screens.
		let border_width = if screen.width < 1280 { 1 } else { 2 };
		self.theme.construct(core.extensions_mut(BaseKind::Screen), screen.object, || {
			Ok::<_, HookError>(Theme {
				title_height: 24,
				border_width,
			})
		})?;
		Ok(())
	}

	fn fini_screen(&mut self, core: &mut Core, screen: Screen) {
		let space = core.extensions_mut(BaseKind::Screen);
		if let Err(error) = self.theme.destroy(space, screen.object) {
			tracing::debug!(%error, "no theme to destroy");
		}
	}

	fn init_window(&mut self, core: &mut Core, window: Window) -> Result<(), HookError> {
		let screen = core.screen();
		let theme = self
			.theme
			.get(core.extensions(BaseKind::Screen), screen.object)
			.cloned()
			.ok_or_else(|| HookError::msg("screen theme missing"))?;

		self.decoration.construct(core.extensions_mut(BaseKind::Window), window.object, || {
			Ok::<_, HookError>(Decoration {
				title: format!("window {:#x}", window.xid),
				title_height: theme.title_height,
				border_width: theme.border_width,
			})
		})?;
		Ok(())
	}

	fn fini_window(&mut self, core: &mut Core, window: Window) {
		let space = core.extensions_mut(BaseKind::Window);
		if let Err(error) = self.decoration.destroy(space, window.object) {
			tracing::debug!(xid = window.xid, %error, "no decoration to destroy");
		}
	}
}

fn decoration_handle() -> ExtensionHandle<Decoration> {
	ExtensionHandle::with_key(DECORATION_KEY)
}

/// The decoration attached to `window`, if the plugin is active.
pub fn decoration(core: &Core, window: Window) -> Option<&Decoration> {
	decoration_handle().get(core.extensions(BaseKind::Window), window.object)
}

/// Sets the title shown in `window`'s decoration. Returns false if undecorated.
pub fn set_title(core: &mut Core, window: Window, title: impl Into<String>) -> bool {
	let space = core.extensions_mut(BaseKind::Window);
	match decoration_handle().get_mut(space, window.object) {
		Some(decoration) => {
			decoration.title = title.into();
			true
		}
		None => false,
	}
}

fn build() -> Box<dyn Plugin> {
	Box::new(Decor::default())
}

static DECOR: PluginDef = PluginDef {
	name: NAME,
	description: "Frames windows with a title bar and border",
	build,
};

inventory::submit! { PluginReg(&DECOR) }
