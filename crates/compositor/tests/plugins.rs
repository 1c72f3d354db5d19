use std::cell::RefCell;
use std::rc::Rc;

use lumen_compositor::plugins::{decor, fade};
use lumen_compositor::{
	Compositor, CompositorConfig, Core, Display, HookError, Plugin, PluginError, Screen, Stage,
	Window, WindowError, abi_value_name, find_plugin, load,
};
use lumen_extension::{BaseKind, ExtensionHandle, Lifecycle, TypeKey};

type Log = Rc<RefCell<Vec<String>>>;

fn compositor(config: CompositorConfig) -> Compositor {
	let _ = tracing_subscriber::fmt::try_init();
	Compositor::new(config)
}

/// Logs every hook as `<name>:<hook>` and fails the one named in `fail`.
struct Recorder {
	name: &'static str,
	log: Log,
	fail: Option<&'static str>,
}

impl Recorder {
	fn boxed(name: &'static str, log: &Log) -> Box<Self> {
		Box::new(Self {
			name,
			log: log.clone(),
			fail: None,
		})
	}

	fn failing(name: &'static str, log: &Log, hook: &'static str) -> Box<Self> {
		Box::new(Self {
			name,
			log: log.clone(),
			fail: Some(hook),
		})
	}

	fn hook(&self, hook: String) -> Result<(), HookError> {
		let refused = self.fail == Some(hook.as_str());
		self.log.borrow_mut().push(format!("{}:{hook}", self.name));
		if refused {
			return Err(HookError::msg(format!("{hook} refused")));
		}
		Ok(())
	}

	fn note(&self, hook: String) {
		self.log.borrow_mut().push(format!("{}:{hook}", self.name));
	}
}

impl Plugin for Recorder {
	fn name(&self) -> &str {
		self.name
	}

	fn init(&mut self, _: &mut Core) -> Result<(), HookError> {
		self.hook("init".into())
	}

	fn fini(&mut self, _: &mut Core) {
		self.note("fini".into());
	}

	fn init_display(&mut self, _: &mut Core, _: Display) -> Result<(), HookError> {
		self.hook("init_display".into())
	}

	fn fini_display(&mut self, _: &mut Core, _: Display) {
		self.note("fini_display".into());
	}

	fn init_screen(&mut self, _: &mut Core, _: Screen) -> Result<(), HookError> {
		self.hook("init_screen".into())
	}

	fn fini_screen(&mut self, _: &mut Core, _: Screen) {
		self.note("fini_screen".into());
	}

	fn init_window(&mut self, _: &mut Core, window: Window) -> Result<(), HookError> {
		self.hook(format!("init_window({})", window.xid))
	}

	fn fini_window(&mut self, _: &mut Core, window: Window) {
		self.note(format!("fini_window({})", window.xid));
	}
}

struct Marker;

const MARKER_KEY: TypeKey = TypeKey::new("test::Marker", 0);

/// Constructs a marker on every window; construction fails for `refuse`.
/// With `leak` set, `fini_window` leaves the marker behind.
struct Marking {
	handle: ExtensionHandle<Marker>,
	refuse: Option<u64>,
	leak: bool,
	log: Log,
}

impl Marking {
	fn boxed(refuse: Option<u64>, leak: bool, log: &Log) -> Box<Self> {
		Box::new(Self {
			handle: ExtensionHandle::with_key(MARKER_KEY),
			refuse,
			leak,
			log: log.clone(),
		})
	}
}

impl Plugin for Marking {
	fn name(&self) -> &str {
		"marking"
	}

	fn extension_keys(&self) -> Vec<(BaseKind, TypeKey)> {
		vec![(BaseKind::Window, MARKER_KEY)]
	}

	fn fini(&mut self, _: &mut Core) {
		self.log.borrow_mut().push("fini".into());
	}

	fn init_window(&mut self, core: &mut Core, window: Window) -> Result<(), HookError> {
		self.log.borrow_mut().push(format!("init_window({})", window.xid));
		let refuse = self.refuse == Some(window.xid);
		self.handle
			.construct(core.extensions_mut(BaseKind::Window), window.object, || {
				if refuse { Err("no visual") } else { Ok(Marker) }
			})?;
		Ok(())
	}

	fn fini_window(&mut self, core: &mut Core, window: Window) {
		self.log.borrow_mut().push(format!("fini_window({})", window.xid));
		if !self.leak {
			let _ = self.handle.destroy(core.extensions_mut(BaseKind::Window), window.object);
		}
	}
}

fn marker_record(compositor: &Compositor) -> Option<lumen_extension::TypeRecord> {
	compositor
		.core()
		.extensions(BaseKind::Window)
		.lookup(&MARKER_KEY)
		.cloned()
}

#[test]
fn builtins_are_in_catalog() {
	assert_eq!(find_plugin("decor").map(|def| def.name), Some("decor"));
	assert_eq!(find_plugin("fade").map(|def| def.name), Some("fade"));
	assert!(find_plugin("missing").is_none());

	let names: Vec<_> = lumen_compositor::all_plugins().iter().map(|def| def.name).collect();
	assert_eq!(names, vec!["decor", "fade"]);
	assert_eq!(load("fade").map(|p| p.abi()), Some(fade::ABI));
}

#[test]
fn from_config_pushes_in_order_and_skips_unknown() {
	let _ = tracing_subscriber::fmt::try_init();
	let config =
		CompositorConfig::from_toml_str(r#"plugins = ["decor", "missing", "fade"]"#).unwrap();
	let compositor = Compositor::from_config(config);

	assert_eq!(compositor.active(), vec!["fade", "decor"]);
	assert!(compositor.find("missing").is_none());
	assert_eq!(compositor.find("decor").map(|p| p.abi()), Some(decor::ABI));
}

#[test]
fn duplicate_push_is_rejected() {
	let log = Log::default();
	let mut compositor = compositor(CompositorConfig::default());
	compositor.push(Recorder::boxed("a", &log)).unwrap();
	log.borrow_mut().clear();

	assert_eq!(
		compositor.push(Recorder::boxed("a", &log)),
		Err(PluginError::AlreadyActive("a".into()))
	);
	assert!(log.borrow().is_empty(), "rejected plugin must not run hooks");
	assert_eq!(compositor.active(), vec!["a"]);
}

#[test]
fn pop_on_empty_stack_is_an_error() {
	let mut compositor = compositor(CompositorConfig::default());
	assert_eq!(compositor.pop(), Err(PluginError::Empty));
	assert_eq!(compositor.push_named("nope"), Err(PluginError::NotFound("nope".into())));
}

#[test]
fn hooks_run_in_lifecycle_order() {
	let log = Log::default();
	let mut compositor = compositor(CompositorConfig::default());
	compositor.add_window(1).unwrap();
	compositor.add_window(2).unwrap();

	compositor.push(Recorder::boxed("a", &log)).unwrap();
	assert_eq!(compositor.pop(), Ok("a".to_string()));

	assert_eq!(
		*log.borrow(),
		vec![
			"a:init",
			"a:init_display",
			"a:init_screen",
			"a:init_window(1)",
			"a:init_window(2)",
			"a:fini_window(2)",
			"a:fini_window(1)",
			"a:fini_screen",
			"a:fini_display",
			"a:fini",
		]
	);
}

#[test]
fn failed_init_runs_nothing_else() {
	let log = Log::default();
	let mut compositor = compositor(CompositorConfig::default());

	let err = compositor.push(Recorder::failing("a", &log, "init")).unwrap_err();
	assert!(matches!(err, PluginError::StartFailed { stage: Stage::Init, .. }));
	assert_eq!(*log.borrow(), vec!["a:init"]);
	assert!(compositor.active().is_empty());
}

#[test]
fn failed_screen_hook_undoes_display() {
	let log = Log::default();
	let mut compositor = compositor(CompositorConfig::default());

	let err = compositor.push(Recorder::failing("a", &log, "init_screen")).unwrap_err();
	assert!(matches!(err, PluginError::StartFailed { stage: Stage::Screen, .. }));
	assert_eq!(
		*log.borrow(),
		vec!["a:init", "a:init_display", "a:init_screen", "a:fini_display", "a:fini"]
	);
	assert!(!compositor.core().values().has_value(&abi_value_name("a")));
}

#[test]
fn failed_start_rolls_back_windows() {
	let log = Log::default();
	let mut compositor = compositor(CompositorConfig::default());
	let first = compositor.add_window(1).unwrap();
	compositor.add_window(2).unwrap();
	compositor.add_window(3).unwrap();

	let err = compositor.push(Marking::boxed(Some(2), false, &log)).unwrap_err();
	match err {
		PluginError::StartFailed { name, stage, source } => {
			assert_eq!(name, "marking");
			assert_eq!(stage, Stage::Window(2));
			assert!(matches!(source, HookError::Construct(_)));
		}
		other => panic!("expected StartFailed, got {other:?}"),
	}
	assert_eq!(
		*log.borrow(),
		vec!["init_window(1)", "init_window(2)", "fini_window(1)", "fini"]
	);

	// The marker built on window 1 was torn down and the unused record reset.
	let space = compositor.core().extensions(BaseKind::Window);
	assert_eq!(space.object(first.object).map(|s| s.occupied()), Some(0));
	assert!(marker_record(&compositor).is_none());
	assert_eq!(space.bitmap().used(), 0);
	assert!(compositor.active().is_empty());
}

#[test]
fn failed_start_flags_records_left_in_use() {
	let log = Log::default();
	let mut compositor = compositor(CompositorConfig::default());
	compositor.add_window(1).unwrap();
	compositor.add_window(2).unwrap();

	// Window 1 keeps its marker through rollback, so the record survives.
	assert!(compositor.push(Marking::boxed(Some(2), true, &log)).is_err());
	let record = marker_record(&compositor).unwrap();
	assert_eq!(record.ref_count, 1);
	assert_eq!(record.lifecycle(), Lifecycle::Failed);
	assert!(record.plugin_construct_failed);
}

#[test]
fn abi_value_tracks_plugin_lifetime() {
	let mut compositor = compositor(CompositorConfig::default());
	assert_eq!(
		compositor.check_plugin_abi(decor::NAME, decor::ABI),
		Err(PluginError::NotLoaded("decor".into()))
	);

	compositor.push_named(decor::NAME).unwrap();
	assert!(compositor.core().values().has_value("decor_ABI"));
	assert_eq!(compositor.core().values().len(), 1, "only the ABI version is published");
	assert_eq!(compositor.check_plugin_abi(decor::NAME, decor::ABI), Ok(()));
	assert_eq!(
		compositor.check_plugin_abi(decor::NAME, 7),
		Err(PluginError::AbiMismatch {
			name: "decor".into(),
			expected: 7,
			found: decor::ABI,
		})
	);

	assert_eq!(compositor.pop(), Ok("decor".to_string()));
	assert!(!compositor.core().values().has_value("decor_ABI"));
	assert!(compositor.check_plugin_abi(decor::NAME, decor::ABI).is_err());
}

#[test]
fn strict_unload_reports_leaks() {
	let log = Log::default();
	let mut compositor = compositor(CompositorConfig::default());
	compositor.add_window(1).unwrap();
	compositor.push(Marking::boxed(None, true, &log)).unwrap();

	assert_eq!(
		compositor.pop(),
		Err(PluginError::LeakedExtensions {
			name: "marking".into(),
			keys: vec![MARKER_KEY],
		})
	);
	assert!(compositor.active().is_empty());
	assert_eq!(marker_record(&compositor).map(|r| r.ref_count), Some(1));

	// Destroying the window drops the leftover instance and frees the slot.
	assert!(compositor.remove_window(1));
	assert!(marker_record(&compositor).is_none());
}

#[test]
fn lenient_unload_only_warns() {
	let log = Log::default();
	let config = CompositorConfig {
		strict_unload: false,
		..CompositorConfig::default()
	};
	let mut compositor = compositor(config);
	compositor.add_window(1).unwrap();
	compositor.push(Marking::boxed(None, true, &log)).unwrap();

	assert_eq!(compositor.pop(), Ok("marking".to_string()));
}

#[test]
fn windows_run_hooks_oldest_first_and_fini_newest_first() {
	let log = Log::default();
	let mut compositor = compositor(CompositorConfig::default());
	compositor.push(Recorder::boxed("a", &log)).unwrap();
	compositor.push(Recorder::boxed("b", &log)).unwrap();
	log.borrow_mut().clear();

	compositor.add_window(7).unwrap();
	assert!(compositor.remove_window(7));
	assert_eq!(
		*log.borrow(),
		vec!["a:init_window(7)", "b:init_window(7)", "b:fini_window(7)", "a:fini_window(7)"]
	);

	assert!(!compositor.remove_window(7));
	assert!(compositor.core().find_window(7).is_none());
}

#[test]
fn duplicate_window_is_rejected() {
	let mut compositor = compositor(CompositorConfig::default());
	let window = compositor.add_window(0x40).unwrap();
	assert_eq!(compositor.add_window(0x40), Err(WindowError::Duplicate(0x40)));
	assert_eq!(compositor.core().windows(), &[window]);
}

#[test]
fn failing_window_hook_keeps_window_managed() {
	let log = Log::default();
	let mut compositor = compositor(CompositorConfig::default());
	compositor.push(Recorder::failing("a", &log, "init_window(5)")).unwrap();
	compositor.push(Recorder::boxed("b", &log)).unwrap();

	let window = compositor.add_window(5).unwrap();
	assert_eq!(compositor.core().find_window(5), Some(window));
	assert!(log.borrow().contains(&"b:init_window(5)".to_string()));
}

#[test]
fn decor_decorates_existing_and_new_windows() {
	let mut compositor = compositor(CompositorConfig::default());
	let early = compositor.add_window(0x100).unwrap();
	compositor.push_named(decor::NAME).unwrap();
	let late = compositor.add_window(0x200).unwrap();

	let decoration = decor::decoration(compositor.core(), early).unwrap();
	assert_eq!(decoration.title, "window 0x100");
	assert_eq!(decoration.border_width, 2);
	assert!(decor::decoration(compositor.core(), late).is_some());

	assert!(decor::set_title(compositor.core_mut(), late, "terminal"));
	assert_eq!(
		decor::decoration(compositor.core(), late).map(|d| d.title.as_str()),
		Some("terminal")
	);

	compositor.pop().unwrap();
	assert!(decor::decoration(compositor.core(), early).is_none());
	assert!(!decor::set_title(compositor.core_mut(), early, "gone"));
}

#[test]
fn decor_uses_thin_borders_on_small_screens() {
	let config = CompositorConfig::from_toml_str("[screen]\nwidth = 1024\nheight = 768").unwrap();
	let mut compositor = compositor(config);
	compositor.push_named(decor::NAME).unwrap();
	let window = compositor.add_window(1).unwrap();

	assert_eq!(decor::decoration(compositor.core(), window).map(|d| d.border_width), Some(1));
}

#[test]
fn fade_ticks_windows_to_target() {
	let mut compositor = compositor(CompositorConfig::default());
	assert_eq!(fade::tick(compositor.core_mut()), None);

	compositor.push_named(fade::NAME).unwrap();
	let window = compositor.add_window(1).unwrap();
	assert_eq!(fade::fade_state(compositor.core(), window).map(|s| s.opacity), Some(0));

	for _ in 0..3 {
		assert_eq!(fade::tick(compositor.core_mut()), Some(1));
	}
	assert_eq!(fade::tick(compositor.core_mut()), Some(0));
	assert_eq!(fade::fade_state(compositor.core(), window).map(|s| s.opacity), Some(fade::OPAQUE));

	assert!(fade::fade_to(compositor.core_mut(), window, 50));
	assert_eq!(fade::tick(compositor.core_mut()), Some(1));
	assert_eq!(fade::tick(compositor.core_mut()), Some(0));
	assert_eq!(fade::fade_state(compositor.core(), window).map(|s| s.opacity), Some(50));
}

#[test]
fn plugins_share_window_slots_without_interfering() {
	let mut compositor = compositor(CompositorConfig::default());
	compositor.push_named(decor::NAME).unwrap();
	compositor.push_named(fade::NAME).unwrap();
	let window = compositor.add_window(9).unwrap();

	let space = compositor.core().extensions(BaseKind::Window);
	assert_eq!(space.slot_count(), 2);
	assert_eq!(space.object(window.object).map(|s| s.occupied()), Some(2));

	// Unloading fade frees its slot; decor's data is untouched.
	compositor.pop().unwrap();
	assert!(fade::fade_state(compositor.core(), window).is_none());
	assert!(decor::decoration(compositor.core(), window).is_some());
	assert_eq!(compositor.core().extensions(BaseKind::Window).bitmap().used(), 1);
}

#[test]
fn shutdown_is_clean_after_builtins() {
	let _ = tracing_subscriber::fmt::try_init();
	let config = CompositorConfig::from_toml_str(r#"plugins = ["decor", "fade"]"#).unwrap();
	let mut compositor = Compositor::from_config(config);
	compositor.add_window(1).unwrap();
	compositor.add_window(2).unwrap();

	let reports = compositor.shutdown();
	assert_eq!(reports.len(), 3);
	assert!(reports.iter().all(|r| r.is_clean()), "{reports:?}");
}

#[test]
fn failed_plugin_can_be_pushed_again() {
	let log = Log::default();
	let mut compositor = compositor(CompositorConfig::default());
	let window = compositor.add_window(1).unwrap();
	assert!(compositor.push(Marking::boxed(Some(1), false, &log)).is_err());
	assert_eq!(compositor.core().extensions(BaseKind::Window).bitmap().used(), 0);

	compositor.push(Marking::boxed(None, false, &log)).unwrap();
	let record = marker_record(&compositor).unwrap();
	assert_eq!(record.lifecycle(), Lifecycle::Initiated);
	assert!(!record.plugin_construct_failed);
	let space = compositor.core().extensions(BaseKind::Window);
	assert_eq!(space.object(window.object).map(|s| s.occupied()), Some(1));

	assert_eq!(compositor.pop(), Ok("marking".to_string()));
	assert_eq!(compositor.core().extensions(BaseKind::Window).bitmap().used(), 0);

	let reports = compositor.shutdown();
	assert!(reports.iter().all(|r| r.is_clean()), "{reports:?}");
}
