//! Window fading.
//!
//! Windows fade in from transparent when mapped. Each window carries a
//! [`FadeState`]; the display carries the shared [`FadeClock`] that advances
//! every fade by one step per tick.

use lumen_extension::{BaseKind, ExtensionHandle, TypeKey};

use crate::error::HookError;
use crate::objects::{Core, Display, Window};
use crate::plugin::{Plugin, PluginDef, PluginReg};

pub const NAME: &str = "fade";
pub const ABI: u32 = 2;

/// Opacity is a percentage.
pub const OPAQUE: u8 = 100;

const CLOCK_KEY: TypeKey = TypeKey::new("fade::FadeClock", ABI);
const FADE_KEY: TypeKey = TypeKey::new("fade::FadeState", ABI);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FadeClock {
	/// Opacity change per tick.
	pub step: u8,
	pub ticks: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FadeState {
	pub opacity: u8,
	pub target: u8,
}

impl FadeState {
	pub fn is_settled(&self) -> bool {
		self.opacity == self.target
	}

	fn advance(&mut self, step: u8) {
		if self.opacity < self.target {
			self.opacity = self.opacity.saturating_add(step).min(self.target);
		} else {
			self.opacity = self.opacity.saturating_sub(step).max(self.target);
		}
	}
}

pub struct Fade {
	clock: ExtensionHandle<FadeClock>,
	state: ExtensionHandle<FadeState>,
}

impl Default for Fade {
	fn default() -> Self {
		Self {
			clock: ExtensionHandle::with_key(CLOCK_KEY),
			state: ExtensionHandle::with_key(FADE_KEY),
		}
	}
}

impl Plugin for Fade {
	fn name(&self) -> &str {
		NAME
	}

	fn abi(&self) -> u32 {
		ABI
	}

	fn extension_keys(&self) -> Vec<(BaseKind, TypeKey)> {
		vec![(BaseKind::Display, CLOCK_KEY), (BaseKind::Window, FADE_KEY)]
	}

	fn init_display(&mut self, core: &mut Core, display: Display) -> Result<(), HookError> {
		self.clock.construct(core.extensions_mut(BaseKind::Display), display.object, || {
			Ok::<_, HookError>(FadeClock { step: 25, ticks: 0 })
		})?;
		Ok(())
	}

	fn fini_display(&mut self, core: &mut Core, display: Display) {
		let space = core.extensions_mut(BaseKind::Display);
		if let Err(error) = self.clock.destroy(space, display.object) {
			tracing::debug!(%error, "no fade clock to destroy");
		}
	}

	fn init_window(&mut self, core: &mut Core, window: Window) -> Result<(), HookError> {
		self.state.construct(core.extensions_mut(BaseKind::Window), window.object, || {
			Ok::<_, HookError>(FadeState {
				opacity: 0,
				target: OPAQUE,
			})
		})?;
		Ok(())
	}

	fn fini_window(&mut self, core: &mut Core, window: Window) {
		let space = core.extensions_mut(BaseKind::Window);
		if let Err(error) = self.state.destroy(space, window.object) {
			tracing::debug!(xid = window.xid, %error, "no fade state to destroy");
		}
	}
}

fn state_handle() -> ExtensionHandle<FadeState> {
	ExtensionHandle::with_key(FADE_KEY)
}

/// Fade state of `window`, if the plugin is active.
pub fn fade_state(core: &Core, window: Window) -> Option<&FadeState> {
	state_handle().get(core.extensions(BaseKind::Window), window.object)
}

/// Starts fading `window` towards `target` percent opacity.
pub fn fade_to(core: &mut Core, window: Window, target: u8) -> bool {
	match state_handle().get_mut(core.extensions_mut(BaseKind::Window), window.object) {
		Some(state) => {
			state.target = target.min(OPAQUE);
			true
		}
		None => false,
	}
}

/// Advances every window's fade by one clock step.
///
/// Returns the number of windows still fading, or `None` if the plugin is not
/// active on the display.
pub fn tick(core: &mut Core) -> Option<usize> {
	let display = core.display();
	let clock = ExtensionHandle::<FadeClock>::with_key(CLOCK_KEY);
	let step = {
		let clock = clock.get_mut(core.extensions_mut(BaseKind::Display), display.object)?;
		clock.ticks += 1;
		clock.step
	};

	let handle = state_handle();
	let windows = core.windows().to_vec();
	let space = core.extensions_mut(BaseKind::Window);
	let mut fading = 0;
	for window in windows {
		if let Some(state) = handle.get_mut(space, window.object) {
			state.advance(step);
			if !state.is_settled() {
				fading += 1;
			}
		}
	}
	Some(fading)
}

fn build() -> Box<dyn Plugin> {
	Box::new(Fade::default())
}

static FADE: PluginDef = PluginDef {
	name: NAME,
	description: "Fades windows in when they are mapped",
	build,
};

inventory::submit! { PluginReg(&FADE) }
