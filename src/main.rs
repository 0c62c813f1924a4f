//! Headless replay of the tour choreography.
//!
//! Drives the choreographer against a [`RecordingHost`] on a virtual clock and
//! prints every host call with its timestamp:
//!
//! ```text
//! estate-tour [estate | restaurant | profile.json] [--no-fly]
//! ```
//!
//! `--no-fly` simulates a map widget that never exposes `flyCameraTo`.

use std::{env, fs, time::Duration};

use anyhow::{Context, Result};
use estate_tour::{Control, HostCall, Page, Phase, RecordingHost, SiteProfile, TourChoreographer, init_logging};

const STEP: Duration = Duration::from_millis(100);
const FOCUS_AFTER: Duration = Duration::from_secs(1);
const MAX_STEPS: usize = 600;

fn main() -> Result<()> {
	init_logging();

	let args: Vec<String> = env::args().skip(1).collect();
	let no_fly = args.iter().any(|a| a == "--no-fly");
	let source = args.iter().find(|a| !a.starts_with("--")).map(String::as_str).unwrap_or("estate");
	let profile = load_profile(source)?;
	println!("Profile: {} (featured: {})", profile.name, profile.featured_property);

	let mut choreo = TourChoreographer::new(profile);
	let mut host = RecordingHost::new(Page::Welcome);
	host.fly_capable = !no_fly;

	choreo.map_ready(&mut host);
	choreo.handle(Control::StartTour, &mut host);
	run_until_settled(&mut choreo, &mut host);

	choreo.handle(Control::ExploreProperty, &mut host);
	let mut shown_at = None;
	for _ in 0..MAX_STEPS {
		choreo.advance_by(STEP, &mut host);
		print_calls(&choreo, &mut host);

		// the visitor clicks into the tour a second after it appears
		if choreo.phase() == Phase::AwaitingFocus {
			let shown = *shown_at.get_or_insert(choreo.now());
			if choreo.now() - shown >= FOCUS_AFTER {
				host.focused = true;
			}
		}
		if choreo.phase() == Phase::Handed || (choreo.phase() == Phase::Idle && choreo.is_settled()) {
			break;
		}
	}

	if choreo.phase() == Phase::Handed {
		println!("-- tour handed off, returning to map");
		choreo.handle(Control::ReturnToMap, &mut host);
		run_until_settled(&mut choreo, &mut host);
	}

	let state = choreo.state();
	println!(
		"Finished at {} ms on {:?} page (iframe active: {}, map initialized: {})",
		choreo.now().as_millis(),
		state.current_page,
		state.iframe_active,
		state.map_initialized
	);
	Ok(())
}

fn load_profile(source: &str) -> Result<SiteProfile> {
	if let Some(profile) = SiteProfile::preset(source) {
		return Ok(profile);
	}
	let raw = fs::read_to_string(source).with_context(|| format!("Failed to read site profile: {}", source))?;
	SiteProfile::from_json(&raw).with_context(|| format!("Error loading site profile: {}", source))
}

fn run_until_settled(choreo: &mut TourChoreographer, host: &mut RecordingHost) {
	print_calls(choreo, host);
	while let Some(deadline) = choreo.next_deadline() {
		choreo.advance(deadline, host);
		print_calls(choreo, host);
	}
}

fn print_calls(choreo: &TourChoreographer, host: &mut RecordingHost) {
	for call in host.take_calls() {
		println!("{:>7} ms  {}", choreo.now().as_millis(), describe(&call));
	}
}

fn describe(call: &HostCall) -> String {
	match call {
		HostCall::Effect(effect) => format!("{:?}", effect),
		HostCall::Fly { pose, duration } => format!(
			"flyCameraTo lat={} lng={} alt={} tilt={} range={} heading={} over {} ms",
			pose.lat,
			pose.lng,
			pose.altitude,
			pose.tilt,
			pose.range,
			pose.heading,
			duration.as_millis()
		),
		HostCall::Camera(pose) => format!("camera reset to lat={} lng={} range={}", pose.lat, pose.lng, pose.range),
		HostCall::Interaction(flags) => format!("map interaction {:?}", flags),
		HostCall::RecreateIframe { src, .. } => format!("tour frame recreated ({})", src),
		HostCall::ClickPress => "synthetic press on tour frame".into(),
		HostCall::ClickRelease => "synthetic release on tour frame".into(),
		HostCall::Reload => "page reload".into(),
	}
}
