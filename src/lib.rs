pub mod choreographer;
pub mod dom;
pub mod errors;
pub mod host;
pub mod model;
pub mod profile;
pub mod timeline;

use std::{cell::RefCell, sync::Once, time::Duration};

use anyhow::{Context, Result, anyhow};
use log::{debug, error, info, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{JsFuture, spawn_local};
use web_sys::Response;

pub use choreographer::{MAX_FLIGHT_RETRIES, Phase, TourChoreographer};
pub use errors::TourError;
pub use host::{Effect, Host, HostCall, RecordingHost};
pub use model::{CameraPose, Control, MapInteraction, Page, TourState};
pub use profile::SiteProfile;

const PROFILE_URL: &str = "/site-profile.json";

// Granularity of the virtual clock in the browser.
const TICK_MS: i32 = 20;


struct App {
	choreographer: TourChoreographer,
	host: dom::DomHost,
	window: web_sys::Window,
	origin_ms: f64,
}

impl App {
	fn elapsed(&self) -> Duration {
		let now = self.window.performance().map(|p| p.now()).unwrap_or(self.origin_ms);
		Duration::from_secs_f64((now - self.origin_ms).max(0.0) / 1000.0)
	}

	fn tick(&mut self) {
		let now = self.elapsed();
		self.choreographer.advance(now, &mut self.host);
	}

	fn dispatch(&mut self, control: Control) {
		// catch up first so new delays start from the real "now"
		self.tick();
		self.choreographer.handle(control, &mut self.host);
	}
}

thread_local! {
	static APP: RefCell<Option<App>> = const { RefCell::new(None) };
}

fn with_app(f: impl FnOnce(&mut App)) {
	APP.with(|app| match app.try_borrow_mut() {
		Ok(mut guard) => match guard.as_mut() {
			Some(app) => f(app),
			None => warn!("tour is not started yet"),
		},
		// a synthetic event fired while a step was running
		Err(_) => debug!("tour busy, dropping re-entrant call"),
	});
}


pub async fn load_profile_raw() -> Result<String, JsValue> {
	let window = web_sys::window().ok_or_else(|| JsValue::from_str("no global `window` exists"))?;
	let resp_value = JsFuture::from(window.fetch_with_str(PROFILE_URL)).await?;

	let resp: Response = resp_value.dyn_into()?;
	if !resp.ok() {
		return Err(JsValue::from_str(&format!("HTTP {}", resp.status())));
	}
	let text = JsFuture::from(resp.text()?).await?;
	text.as_string().ok_or_else(|| JsValue::from_str("site profile is not text"))
}


/// Boot with the profile served at `/site-profile.json`, or the estate preset
/// when there is none.
#[wasm_bindgen]
pub fn start() {
	set_panic_hook();
	init_logging();
	info!("Starting tour choreography...");
	spawn_local(async {
		let profile = match load_profile_raw().await {
			Ok(raw) => SiteProfile::from_json(&raw).unwrap_or_else(|err| {
				warn!("Ignoring site profile: {}", err);
				SiteProfile::estate()
			}),
			Err(err) => {
				debug!("No site profile served ({:?}), using estate defaults", err);
				SiteProfile::estate()
			},
		};
		if let Err(err) = boot(profile) {
			error!("Tour start-up error: {:#}", err);
		}
	});
}

#[wasm_bindgen]
pub fn start_with_profile(json: &str) -> Result<(), JsValue> {
	set_panic_hook();
	init_logging();
	let profile = SiteProfile::from_json(json).map_err(|e| JsValue::from_str(&e.to_string()))?;
	boot(profile).map_err(|e| JsValue::from_str(&format!("{:#}", e)))
}

/// Called by the page once the 3D map widget has loaded.
#[wasm_bindgen]
pub fn map_ready() {
	with_app(|app| {
		app.tick();
		app.choreographer.map_ready(&mut app.host);
	});
}


fn boot(profile: SiteProfile) -> Result<()> {
	if APP.with(|app| app.borrow().is_some()) {
		warn!("Tour already started");
		return Ok(());
	}

	let window = window()?;
	let document = window.document().context("window has no document")?;
	let host = dom::DomHost::new(window.clone(), &profile.tour_title)?;

	dom::bind_controls(&document, |control| with_app(|app| app.dispatch(control)))?;
	dom::bind_hover_lift(&document)?;
	dom::bind_parallax(&window, &document)?;

	let origin_ms = window.performance().map(|p| p.now()).unwrap_or_default();
	info!("Using {} profile", profile.name);
	APP.with(|app| {
		*app.borrow_mut() = Some(App {
			choreographer: TourChoreographer::new(profile),
			host,
			window: window.clone(),
			origin_ms,
		})
	});

	let tick_closure = Closure::<dyn FnMut()>::new(|| with_app(App::tick));
	window
		.set_interval_with_callback_and_timeout_and_arguments_0(tick_closure.as_ref().unchecked_ref(), TICK_MS)
		.map_err(|err| anyhow!("could not register tick interval: {:?}", err))?;

	tick_closure.forget(); // Prevent closure from being dropped

	Ok(())
}


fn window() -> Result<web_sys::Window> {
	web_sys::window().context("no global `window` exists")
}


pub fn set_panic_hook() {
	// When the `console_error_panic_hook` feature is enabled, we can call the
	// `set_panic_hook` function at least once during initialization, and then
	// we will get better error messages if our code ever panics.
	//
	// For more details see
	// https://github.com/rustwasm/console_error_panic_hook#readme
	#[cfg(feature = "console_error_panic_hook")]
	console_error_panic_hook::set_once();
}

pub fn init_logging() {
	static INIT: Once = Once::new();
	INIT.call_once(|| {
		#[cfg(target_arch = "wasm32")]
		{
			console_log::init_with_level(log::Level::Debug).expect("Failed to initialize console_log");
		}

		#[cfg(not(target_arch = "wasm32"))]
		{
			env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
		}
	});
}
