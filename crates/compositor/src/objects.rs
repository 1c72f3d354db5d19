//! Core objects and the extension spaces that host plugin data on them.

use lumen_extension::{BaseKind, ExtensionRegistry, ObjectId, ShutdownReport};

use crate::config::ScreenConfig;
use crate::values::ValueStore;

/// The managed screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Screen {
	pub object: ObjectId,
	pub width: u32,
	pub height: u32,
}

/// The display connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Display {
	pub object: ObjectId,
}

/// A managed client window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
	pub object: ObjectId,
	pub xid: u64,
}

/// Core state handed to plugin hooks.
///
/// Owns one [`ExtensionRegistry`] per [`BaseKind`]. Every core object is
/// registered in its kind's space for its whole lifetime.
#[derive(Debug)]
pub struct Core {
	display_space: ExtensionRegistry,
	screen_space: ExtensionRegistry,
	window_space: ExtensionRegistry,
	display: Display,
	screen: Screen,
	windows: Vec<Window>,
	values: ValueStore,
}

impl Core {
	pub fn new(geometry: ScreenConfig) -> Self {
		let mut display_space = ExtensionRegistry::initialize(BaseKind::Display);
		let mut screen_space = ExtensionRegistry::initialize(BaseKind::Screen);
		let window_space = ExtensionRegistry::initialize(BaseKind::Window);

		let display = Display {
			object: display_space.register_object(),
		};
		let screen = Screen {
			object: screen_space.register_object(),
			width: geometry.width,
			height: geometry.height,
		};

		Self {
			display_space,
			screen_space,
			window_space,
			display,
			screen,
			windows: Vec::new(),
			values: ValueStore::new(),
		}
	}

	pub fn display(&self) -> Display {
		self.display
	}

	pub fn screen(&self) -> Screen {
		self.screen
	}

	/// Managed windows in mapping order.
	pub fn windows(&self) -> &[Window] {
		&self.windows
	}

	pub fn find_window(&self, xid: u64) -> Option<Window> {
		self.windows.iter().find(|w| w.xid == xid).copied()
	}

	pub fn extensions(&self, kind: BaseKind) -> &ExtensionRegistry {
		match kind {
			BaseKind::Display => &self.display_space,
			BaseKind::Screen => &self.screen_space,
			BaseKind::Window => &self.window_space,
		}
	}

	pub fn extensions_mut(&mut self, kind: BaseKind) -> &mut ExtensionRegistry {
		match kind {
			BaseKind::Display => &mut self.display_space,
			BaseKind::Screen => &mut self.screen_space,
			BaseKind::Window => &mut self.window_space,
		}
	}

	pub fn values(&self) -> &ValueStore {
		&self.values
	}

	pub fn values_mut(&mut self) -> &mut ValueStore {
		&mut self.values
	}

	/// Registers a window object without running plugin hooks.
	pub(crate) fn attach_window(&mut self, xid: u64) -> Window {
		let window = Window {
			object: self.window_space.register_object(),
			xid,
		};
		self.windows.push(window);
		window
	}

	/// Forgets a window and drops whatever extension data it still holds.
	pub(crate) fn detach_window(&mut self, xid: u64) -> Option<Window> {
		let pos = self.windows.iter().position(|w| w.xid == xid)?;
		let window = self.windows.remove(pos);
		match self.window_space.deregister_object(window.object) {
			Ok(0) => {}
			Ok(dropped) => {
				tracing::warn!(xid, dropped, "window destroyed with extension data attached");
			}
			Err(error) => tracing::warn!(xid, %error, "window object already gone"),
		}
		Some(window)
	}

	/// Deregisters every core object and tears down the extension spaces.
	pub(crate) fn into_reports(mut self) -> Vec<ShutdownReport> {
		let xids: Vec<_> = self.windows.iter().map(|w| w.xid).collect();
		for xid in xids {
			self.detach_window(xid);
		}
		for (kind, object) in [
			(BaseKind::Screen, self.screen.object),
			(BaseKind::Display, self.display.object),
		] {
			match self.extensions_mut(kind).deregister_object(object) {
				Ok(0) => {}
				Ok(dropped) => {
					tracing::warn!(%kind, dropped, "core object dropped with extensions");
				}
				Err(error) => tracing::warn!(%kind, %error, "core object already gone"),
			}
		}

		vec![
			self.window_space.shutdown(),
			self.screen_space.shutdown(),
			self.display_space.shutdown(),
		]
	}
}
