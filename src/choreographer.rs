//! Page transitions and the map → tour hand-off.
//!
//! [`TourChoreographer`] is a plain state machine. User actions come in through
//! [`TourChoreographer::handle`] (or the individual operations), time comes in
//! through [`TourChoreographer::advance`], and everything visible goes out as
//! [`Effect`]s on a [`Host`]. Each delayed continuation is a `Step` on the
//! [`Timeline`]; a step runs, applies its effects and schedules the next one.
//!
//! The hand-off runs through these phases:
//!
//! ```text
//! Idle -> Unblurring -> Flying -> AwaitingFocus -> HandingOff -> Handed
//!           (1.6s)        |  (5.5s)     (poll 100ms)    (2s + 1s)
//!                         +-- no flyCameraTo after 3 retries --> Idle (tour page)
//! ```
//!
//! `teardown_and_reset` brings any phase back to `Idle`.

use std::time::Duration;

use log::{debug, error, info, warn};

use crate::{
	host::{Effect, Host},
	model::{Control, Page, TourState},
	profile::SiteProfile,
	timeline::Timeline,
};

pub const MAX_FLIGHT_RETRIES: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
	Idle,
	/// Map blur is lifting; the camera flight follows.
	Unblurring,
	/// Waiting for `flyCameraTo`, or for the flight to finish.
	Flying,
	/// Small tour frame is showing and the focus poll is running.
	AwaitingFocus,
	HandingOff,
	/// The tour fills the viewport with the top bar showing.
	Handed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollHandle(u64);

#[derive(Debug, Clone, PartialEq)]
enum Step {
	SettleNavigation,
	AnimateMapTitles,
	FadeInTourContainer,
	TourIframeLoaded,
	ReleaseClick,
	RevealTourIframe,
	CameraFlight { property: String, retries: u8 },
	RevealIframe,
	PollFocus(PollHandle),
	BlurPage,
	ExpandIframe,
	SlideInTopBar,
	RemoveTopBar,
	HideIframe,
}

pub struct TourChoreographer {
	profile: SiteProfile,
	state: TourState,
	phase: Phase,
	timeline: Timeline<Step>,
	/// Target of the page transition waiting on its settle delay.
	pending_page: Option<Page>,
	poll: Option<PollHandle>,
	next_poll: u64,
	/// The top bar removal and frame hide queued by a reset have not run yet.
	teardown_tail: bool,
}

impl TourChoreographer {
	pub fn new(profile: SiteProfile) -> Self {
		Self {
			profile,
			state: TourState::default(),
			phase: Phase::Idle,
			timeline: Timeline::new(),
			pending_page: None,
			poll: None,
			next_poll: 0,
			teardown_tail: false,
		}
	}

	pub fn state(&self) -> &TourState {
		&self.state
	}

	pub fn phase(&self) -> Phase {
		self.phase
	}

	pub fn profile(&self) -> &SiteProfile {
		&self.profile
	}

	pub fn now(&self) -> Duration {
		self.timeline.now()
	}

	pub fn is_polling(&self) -> bool {
		self.poll.is_some()
	}

	/// True once no continuation is left to run.
	pub fn is_settled(&self) -> bool {
		self.timeline.is_empty()
	}

	pub fn next_deadline(&self) -> Option<Duration> {
		self.timeline.next_deadline()
	}

	// --------------------------------------------------
	// Time
	// --------------------------------------------------

	/// Run every continuation due at or before `now`, including the ones that
	/// earlier continuations schedule inside the window.
	pub fn advance<H: Host>(&mut self, now: Duration, host: &mut H) {
		while let Some(step) = self.timeline.pop_due(now) {
			self.run(step, host);
		}
		self.timeline.settle(now);
	}

	pub fn advance_by<H: Host>(&mut self, dt: Duration, host: &mut H) {
		let until = self.now().saturating_add(dt);
		self.advance(until, host);
	}

	// --------------------------------------------------
	// User-facing controls
	// --------------------------------------------------

	pub fn handle<H: Host>(&mut self, control: Control, host: &mut H) {
		debug!("control: {:?}", control);
		match control {
			Control::StartTour | Control::BackToMap => self.navigate_to_page(Page::Map, host),
			Control::ExploreProperty => {
				let property = self.profile.featured_property.clone();
				self.fly_to_property(&property, host);
			},
			Control::ReturnToMap => self.teardown_and_reset(host),
			Control::ExitFullscreen => {
				self.teardown_and_reset(host);
				host.reload();
			},
			// the contact handler lives outside the choreography
			Control::SubmitContact => info!("contact form submitted"),
		}
	}

	/// The map widget finished loading.
	pub fn map_ready<H: Host>(&mut self, host: &mut H) {
		self.state.map_initialized = true;
		if let Err(err) = host.set_map_interaction(&self.profile.interaction) {
			debug!("map interaction flags not applied: {}", err);
		}
		info!("map widget ready");
	}

	// --------------------------------------------------
	// Page navigation
	// --------------------------------------------------

	pub fn navigate_to_page<H: Host>(&mut self, target: Page, host: &mut H) {
		if let Some(pending) = self.pending_page {
			// one settle is already queued; it will land on the latest target
			if pending != target {
				debug!("retargeting page transition {:?} -> {:?}", pending, target);
				self.pending_page = Some(target);
			}
			return;
		}
		if self.state.current_page == target {
			return;
		}

		debug!("leaving {:?} for {:?}", self.state.current_page, target);
		host.apply(Effect::PageExit(self.state.current_page));
		self.pending_page = Some(target);
		self.timeline.schedule(self.profile.timings.settle, Step::SettleNavigation);
	}

	fn settle_navigation<H: Host>(&mut self, host: &mut H) {
		let Some(target) = self.pending_page.take() else { return };
		let previous = self.state.current_page;
		if previous == target {
			host.apply(Effect::PageRestore(previous));
			return;
		}

		host.apply(Effect::PageDeactivate(previous));
		host.apply(Effect::PageActivate(target));
		self.state.current_page = target;
		info!("now on {:?} page", target);

		match target {
			Page::Map => self.enter_map_page(host),
			Page::Tour => self.enter_tour_page(host),
			Page::Welcome => {},
		}
	}

	fn enter_map_page<H: Host>(&mut self, host: &mut H) {
		// a flight started before the page settled owns the map and the frame
		if self.phase == Phase::Idle {
			host.apply(Effect::MapBlur);
			host.apply(Effect::IframeShrink);
			host.apply(Effect::IframeHide);
		}
		host.apply(Effect::MapTitlesClear);
		self.timeline.schedule(self.profile.timings.entry_animation, Step::AnimateMapTitles);
	}

	fn enter_tour_page<H: Host>(&mut self, host: &mut H) {
		let timings = self.profile.timings;
		host.apply(Effect::TourContainerHide);
		self.timeline.schedule(timings.entry_animation, Step::FadeInTourContainer);
		self.timeline.schedule(timings.tour_load_grace, Step::TourIframeLoaded);
	}

	fn tour_iframe_loaded<H: Host>(&mut self, host: &mut H) {
		let timings = self.profile.timings;
		match host.simulate_center_click() {
			Ok(()) => {
				debug!("synthetic click dispatched to tour frame");
				self.timeline.schedule(timings.click_release, Step::ReleaseClick);
			},
			Err(err) => debug!("could not simulate click on tour frame: {}", err),
		}
		// shown whether or not the click got through
		self.timeline.schedule(timings.tour_reveal, Step::RevealTourIframe);
	}

	// --------------------------------------------------
	// Camera flight
	// --------------------------------------------------

	pub fn fly_to_property<H: Host>(&mut self, property_id: &str, host: &mut H) {
		if self.phase != Phase::Idle {
			debug!("ignoring flight to {}: already {:?}", property_id, self.phase);
			return;
		}
		self.flush_teardown_tail(host);
		self.phase = Phase::Unblurring;
		host.apply(Effect::MapUnblur);
		self.timeline.schedule(self.profile.timings.unblur, Step::CameraFlight {
			property: property_id.to_owned(),
			retries: 0,
		});
	}

	/// Entry point for a new flight request. Only accepted while idle; the
	/// retries of an accepted request are scheduled internally.
	pub fn attempt_camera_flight<H: Host>(&mut self, property_id: &str, retry_count: u8, host: &mut H) {
		if self.phase != Phase::Idle {
			debug!("dropping flight request for {}: already {:?}", property_id, self.phase);
			return;
		}
		self.flush_teardown_tail(host);
		self.camera_flight(property_id, retry_count, host);
	}

	fn camera_flight<H: Host>(&mut self, property_id: &str, retry_count: u8, host: &mut H) {
		let timings = self.profile.timings;
		self.phase = Phase::Flying;

		if host.can_fly() {
			let pose = self.profile.resolve_pose(property_id);
			match host.fly_camera_to(&pose, timings.flight) {
				Ok(()) => {
					info!("flying camera to {}", property_id);
					self.timeline.schedule(timings.reveal_after_flight, Step::RevealIframe);
				},
				Err(err) => {
					error!("camera flight to {} failed: {}", property_id, err);
					self.abandon_flight(host);
				},
			}
		} else if retry_count < MAX_FLIGHT_RETRIES {
			debug!("flyCameraTo not available yet (attempt {})", retry_count + 1);
			self.timeline.schedule(timings.retry_backoff, Step::CameraFlight {
				property: property_id.to_owned(),
				retries: retry_count + 1,
			});
		} else {
			warn!("flyCameraTo still missing after {} retries, going to the tour page", MAX_FLIGHT_RETRIES);
			self.abandon_flight(host);
		}
	}

	fn abandon_flight<H: Host>(&mut self, host: &mut H) {
		self.phase = Phase::Idle;
		self.navigate_to_page(Page::Tour, host);
	}

	fn reveal_iframe<H: Host>(&mut self, host: &mut H) {
		self.phase = Phase::AwaitingFocus;
		host.apply(Effect::IframeShow);
		self.start_active_element_monitoring(host);
	}

	// --------------------------------------------------
	// Focus detection and hand-off
	// --------------------------------------------------

	/// Poll the document's active element until the small tour frame has it.
	/// The first check runs right away.
	pub fn start_active_element_monitoring<H: Host>(&mut self, host: &mut H) {
		if self.poll.is_some() {
			return;
		}
		let handle = PollHandle(self.next_poll);
		self.next_poll += 1;
		self.poll = Some(handle);
		self.check_focus(handle, host);
	}

	fn check_focus<H: Host>(&mut self, handle: PollHandle, host: &mut H) {
		if self.poll != Some(handle) {
			return;
		}
		if !host.iframe_focused() {
			self.timeline.schedule(self.profile.timings.poll_interval, Step::PollFocus(handle));
			return;
		}

		self.poll = None;
		if self.state.iframe_active {
			return;
		}
		self.state.iframe_active = true;
		info!("tour frame has focus, handing off");
		self.start_iframe_transition();
	}

	pub fn start_iframe_transition(&mut self) {
		self.phase = Phase::HandingOff;
		self.timeline.schedule(self.profile.timings.blur_delay, Step::BlurPage);
	}

	// --------------------------------------------------
	// Teardown
	// --------------------------------------------------

	pub fn teardown_and_reset<H: Host>(&mut self, host: &mut H) {
		let timings = self.profile.timings;
		let dropped = self.timeline.invalidate();
		debug!("reset dropped {} pending steps", dropped);

		if self.pending_page.take().is_some() {
			host.apply(Effect::PageRestore(self.state.current_page));
		}

		host.apply(Effect::TopBarHide);
		self.timeline.schedule(timings.top_bar_hide, Step::RemoveTopBar);
		host.apply(Effect::IframeShrink);
		host.apply(Effect::PageUnblur);
		self.timeline.schedule(timings.iframe_shrink, Step::HideIframe);

		if let Err(err) = host.recreate_iframe(&self.profile.tour_src, &self.profile.tour_allow) {
			warn!("could not recreate tour frame: {}", err);
		}

		host.apply(Effect::MapBlur);
		if let Err(err) = host.set_map_interaction(&self.profile.interaction) {
			debug!("map interaction flags not reset: {}", err);
		}
		if let Err(err) = host.set_camera(&self.profile.overview) {
			debug!("camera not reset: {}", err);
		}

		self.poll = None;
		self.state.iframe_active = false;
		self.phase = Phase::Idle;
		self.teardown_tail = true;
		info!("tour reset");
	}

	/// Land the delayed half of a reset now, so a new flight never sees it.
	fn flush_teardown_tail<H: Host>(&mut self, host: &mut H) {
		if std::mem::take(&mut self.teardown_tail) {
			debug!("finishing reset early");
			host.apply(Effect::TopBarRemove);
			host.apply(Effect::IframeHide);
		}
	}

	// --------------------------------------------------
	// Step dispatch
	// --------------------------------------------------

	fn run<H: Host>(&mut self, step: Step, host: &mut H) {
		let timings = self.profile.timings;
		match step {
			Step::SettleNavigation => self.settle_navigation(host),
			Step::AnimateMapTitles => host.apply(Effect::MapTitlesAnimate),
			Step::FadeInTourContainer => host.apply(Effect::TourContainerFadeIn),
			Step::TourIframeLoaded => self.tour_iframe_loaded(host),
			Step::ReleaseClick => {
				if let Err(err) = host.release_center_click() {
					debug!("could not release synthetic click: {}", err);
				}
			},
			Step::RevealTourIframe => host.apply(Effect::TourIframeReveal),
			Step::CameraFlight { property, retries } => self.camera_flight(&property, retries, host),
			Step::RevealIframe => self.reveal_iframe(host),
			Step::PollFocus(handle) => self.check_focus(handle, host),
			Step::BlurPage => {
				host.apply(Effect::PageBlur);
				self.timeline.schedule(timings.expand_delay, Step::ExpandIframe);
			},
			Step::ExpandIframe => {
				host.apply(Effect::IframeExpand);
				host.apply(Effect::PageUnblur);
				host.apply(Effect::TopBarShow);
				self.timeline.schedule(timings.top_bar_slide, Step::SlideInTopBar);
			},
			Step::SlideInTopBar => {
				host.apply(Effect::TopBarSlideIn);
				self.phase = Phase::Handed;
			},
			Step::RemoveTopBar => {
				if self.teardown_tail {
					host.apply(Effect::TopBarRemove);
				}
			},
			Step::HideIframe => {
				if std::mem::take(&mut self.teardown_tail) {
					host.apply(Effect::IframeHide);
				}
			},
		}
	}
}


#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		host::{HostCall, RecordingHost},
		model::{CameraPose, MapInteraction},
	};

	fn ms(n: u64) -> Duration {
		Duration::from_millis(n)
	}

	fn on_map() -> (TourChoreographer, RecordingHost) {
		let mut choreo = TourChoreographer::new(SiteProfile::estate());
		let mut host = RecordingHost::new(Page::Welcome);
		choreo.handle(Control::StartTour, &mut host);
		choreo.advance_by(ms(1000), &mut host);
		assert_eq!(choreo.state().current_page, Page::Map);
		host.calls.clear();
		(choreo, host)
	}

	/// Explore, wait out the flight, focus the frame and let the hand-off
	/// finish. Returns the calls made along the way.
	fn run_hand_off(choreo: &mut TourChoreographer, host: &mut RecordingHost) -> Vec<HostCall> {
		choreo.handle(Control::ExploreProperty, host);
		choreo.advance_by(ms(1600 + 5500), host);
		assert_eq!(choreo.phase(), Phase::AwaitingFocus);
		choreo.advance_by(ms(350), host);
		host.focused = true;
		choreo.advance_by(ms(100), host);
		choreo.advance_by(ms(5000), host);
		assert_eq!(choreo.phase(), Phase::Handed);
		host.take_calls()
	}

	#[test]
	fn navigation_swaps_pages_after_settle() {
		let mut choreo = TourChoreographer::new(SiteProfile::estate());
		let mut host = RecordingHost::new(Page::Welcome);

		choreo.navigate_to_page(Page::Map, &mut host);
		assert_eq!(host.effects(), vec![Effect::PageExit(Page::Welcome)]);

		choreo.advance(ms(399), &mut host);
		assert_eq!(choreo.state().current_page, Page::Welcome);
		assert_eq!(host.visual.active_pages.len(), 1);

		choreo.advance(ms(400), &mut host);
		assert_eq!(choreo.state().current_page, Page::Map);
		assert_eq!(host.visual.active_pages.iter().copied().collect::<Vec<_>>(), vec![Page::Map]);
		assert!(host.visual.exiting_pages.is_empty());
	}

	#[test]
	fn navigating_to_current_page_is_a_no_op() {
		let (mut choreo, mut host) = on_map();
		choreo.navigate_to_page(Page::Map, &mut host);
		assert!(host.calls.is_empty());
		assert!(choreo.is_settled());
	}

	#[test]
	fn at_most_one_active_page_for_any_navigation_sequence() {
		let sequences: &[&[Page]] = &[
			&[Page::Map, Page::Tour, Page::Map],
			&[Page::Map, Page::Map, Page::Welcome],
			&[Page::Tour, Page::Welcome],
			&[Page::Map, Page::Tour, Page::Welcome, Page::Tour, Page::Map],
		];
		// gaps shorter, equal to and longer than the settle delay
		for gap in [0, 150, 400, 900] {
			for sequence in sequences {
				let mut choreo = TourChoreographer::new(SiteProfile::estate());
				let mut host = RecordingHost::new(Page::Welcome);
				for &page in *sequence {
					choreo.navigate_to_page(page, &mut host);
					choreo.advance_by(ms(gap), &mut host);
				}
				choreo.advance_by(ms(10_000), &mut host);

				let active: Vec<Page> = host.visual.active_pages.iter().copied().collect();
				assert_eq!(active, vec![choreo.state().current_page], "gap {gap} sequence {sequence:?}");
				assert!(host.visual.exiting_pages.is_empty());
			}
		}
	}

	#[test]
	fn later_request_wins_while_a_transition_is_pending() {
		let mut choreo = TourChoreographer::new(SiteProfile::estate());
		let mut host = RecordingHost::new(Page::Welcome);
		choreo.navigate_to_page(Page::Map, &mut host);
		choreo.advance_by(ms(100), &mut host);
		choreo.navigate_to_page(Page::Tour, &mut host);
		choreo.advance_by(ms(300), &mut host);
		assert_eq!(choreo.state().current_page, Page::Tour);
		assert_eq!(host.count(&HostCall::Effect(Effect::PageActivate(Page::Map))), 0);
	}

	#[test]
	fn map_entry_resets_and_restarts_title_animations() {
		let mut choreo = TourChoreographer::new(SiteProfile::estate());
		let mut host = RecordingHost::new(Page::Welcome);
		choreo.navigate_to_page(Page::Map, &mut host);
		choreo.advance_by(ms(400), &mut host);
		assert_eq!(host.effects().last(), Some(&Effect::MapTitlesClear));
		choreo.advance_by(ms(100), &mut host);
		assert_eq!(host.effects().last(), Some(&Effect::MapTitlesAnimate));
	}

	#[test]
	fn flight_uses_resolved_pose_and_reveals_iframe() {
		let (mut choreo, mut host) = on_map();
		choreo.fly_to_property("property-1", &mut host);
		assert_eq!(host.effects(), vec![Effect::MapUnblur]);
		assert!(host.visual.map_unblurred);

		choreo.advance_by(ms(1599), &mut host);
		assert_eq!(host.probes, 0);
		choreo.advance_by(ms(1), &mut host);

		let expected = CameraPose {
			lat: 40.7128,
			lng: -74.0060,
			altitude: 10.0,
			tilt: 70.0,
			range: 1000.0,
			heading: 0.0,
		};
		assert_eq!(host.count(&HostCall::Fly { pose: expected, duration: ms(5000) }), 1);

		choreo.advance_by(ms(5499), &mut host);
		assert!(!host.visual.iframe_shown);
		choreo.advance_by(ms(1), &mut host);
		assert!(host.visual.iframe_shown);
		assert!(choreo.is_polling());
		assert_eq!(choreo.phase(), Phase::AwaitingFocus);
	}

	#[test]
	fn missing_fly_capability_retries_three_times_then_falls_back() {
		let (mut choreo, mut host) = on_map();
		host.fly_capable = false;

		choreo.attempt_camera_flight("property-1", 0, &mut host);
		assert_eq!(host.probes, 1);
		for retry in 1..=3 {
			choreo.advance_by(ms(499), &mut host);
			assert_eq!(host.probes, retry);
			choreo.advance_by(ms(1), &mut host);
			assert_eq!(host.probes, retry + 1);
		}
		assert_eq!(host.effects(), vec![Effect::PageExit(Page::Map)]);

		choreo.advance_by(ms(10_000), &mut host);
		assert_eq!(host.probes, 4);
		assert_eq!(choreo.state().current_page, Page::Tour);
		assert_eq!(choreo.phase(), Phase::Idle);
		assert!(host.calls.iter().all(|c| !matches!(c, HostCall::Fly { .. })));
	}

	#[test]
	fn throwing_flight_falls_back_immediately() {
		let (mut choreo, mut host) = on_map();
		host.fly_fails = true;
		choreo.attempt_camera_flight("property-1", 0, &mut host);
		assert_eq!(host.probes, 1);
		choreo.advance_by(ms(400), &mut host);
		assert_eq!(choreo.state().current_page, Page::Tour);
	}

	#[test]
	fn only_one_retry_chain_per_request() {
		let (mut choreo, mut host) = on_map();
		host.fly_capable = false;
		choreo.fly_to_property("property-1", &mut host);
		choreo.advance_by(ms(1600), &mut host);
		choreo.attempt_camera_flight("property-1", 0, &mut host);
		choreo.fly_to_property("property-1", &mut host);
		choreo.advance_by(ms(1500), &mut host);
		assert_eq!(host.probes, 4);
		assert_eq!(host.count(&HostCall::Effect(Effect::MapUnblur)), 1);
	}

	#[test]
	fn flight_request_is_dropped_once_the_frame_is_up() {
		let (mut choreo, mut host) = on_map();
		choreo.fly_to_property("property-1", &mut host);
		choreo.advance_by(ms(1600 + 5500), &mut host);
		assert_eq!(choreo.phase(), Phase::AwaitingFocus);

		choreo.attempt_camera_flight("property-1", 0, &mut host);
		assert_eq!(choreo.phase(), Phase::AwaitingFocus);
		host.focused = true;
		choreo.advance_by(ms(10_000), &mut host);
		assert_eq!(choreo.phase(), Phase::Handed);
		choreo.attempt_camera_flight("property-1", 0, &mut host);
		choreo.advance_by(ms(10_000), &mut host);

		assert_eq!(choreo.phase(), Phase::Handed);
		assert_eq!(host.probes, 1);
		assert_eq!(host.count(&HostCall::Effect(Effect::IframeShow)), 1);
		assert!(host.visual.iframe_expanded);
	}

	#[test]
	fn explore_before_the_map_settles_keeps_the_map_unblurred() {
		let mut choreo = TourChoreographer::new(SiteProfile::estate());
		let mut host = RecordingHost::new(Page::Welcome);
		choreo.handle(Control::StartTour, &mut host);
		choreo.advance_by(ms(100), &mut host);
		choreo.handle(Control::ExploreProperty, &mut host);

		choreo.advance_by(ms(300), &mut host);
		assert_eq!(choreo.state().current_page, Page::Map);
		assert!(host.visual.map_unblurred);
		assert_eq!(host.count(&HostCall::Effect(Effect::MapBlur)), 0);
		assert_eq!(host.effects().last(), Some(&Effect::MapTitlesClear));

		choreo.advance_by(ms(1600 + 5500 - 300), &mut host);
		assert_eq!(choreo.phase(), Phase::AwaitingFocus);
		assert!(host.visual.iframe_shown);
	}

	#[test]
	fn focus_poll_stops_after_first_match() {
		let (mut choreo, mut host) = on_map();
		choreo.fly_to_property("property-1", &mut host);
		choreo.advance_by(ms(1600 + 5500), &mut host);
		// first check runs as soon as the frame is shown
		assert_eq!(host.focus_checks, 1);

		choreo.advance_by(ms(300), &mut host);
		assert_eq!(host.focus_checks, 4);

		host.focused = true;
		choreo.advance_by(ms(100), &mut host);
		assert_eq!(host.focus_checks, 5);
		assert!(!choreo.is_polling());
		assert!(choreo.state().iframe_active);

		choreo.advance_by(ms(10_000), &mut host);
		assert_eq!(host.focus_checks, 5);
		assert_eq!(host.count(&HostCall::Effect(Effect::PageBlur)), 1);
		assert_eq!(host.count(&HostCall::Effect(Effect::TopBarShow)), 1);

		choreo.start_active_element_monitoring(&mut host);
		choreo.advance_by(ms(10_000), &mut host);
		assert_eq!(host.count(&HostCall::Effect(Effect::PageBlur)), 1);
	}

	#[test]
	fn hand_off_stages_run_in_order() {
		let (mut choreo, mut host) = on_map();
		choreo.fly_to_property("property-1", &mut host);
		choreo.advance_by(ms(1600 + 5500), &mut host);
		host.focused = true;
		choreo.advance_by(ms(100), &mut host);
		host.calls.clear();

		choreo.advance_by(ms(1999), &mut host);
		assert!(host.calls.is_empty());
		choreo.advance_by(ms(1), &mut host);
		assert_eq!(host.effects(), vec![Effect::PageBlur]);
		assert!(host.visual.page_blurred);

		choreo.advance_by(ms(1000), &mut host);
		assert_eq!(host.effects(), vec![
			Effect::PageBlur,
			Effect::IframeExpand,
			Effect::PageUnblur,
			Effect::TopBarShow
		]);
		assert!(!host.visual.page_blurred);
		assert!(host.visual.iframe_expanded);

		choreo.advance_by(ms(100), &mut host);
		assert_eq!(host.effects().last(), Some(&Effect::TopBarSlideIn));
		assert_eq!(choreo.phase(), Phase::Handed);
	}

	#[test]
	fn teardown_restores_overview_and_recreates_iframe() {
		let (mut choreo, mut host) = on_map();
		run_hand_off(&mut choreo, &mut host);

		choreo.handle(Control::ReturnToMap, &mut host);
		assert!(!choreo.state().iframe_active);
		assert!(!choreo.is_polling());
		assert_eq!(choreo.phase(), Phase::Idle);
		assert!(!host.visual.iframe_expanded);
		assert!(!host.visual.map_unblurred);
		assert_eq!(host.count(&HostCall::Camera(CameraPose::OVERVIEW)), 1);
		assert_eq!(host.count(&HostCall::Interaction(choreo.profile().interaction)), 1);
		assert!(host.calls.iter().any(|c| matches!(c, HostCall::RecreateIframe { allow, .. } if allow.contains("xr-spatial-tracking"))));

		choreo.advance_by(ms(300), &mut host);
		assert!(!host.visual.top_bar_visible);
		assert!(host.visual.iframe_shown);
		choreo.advance_by(ms(500), &mut host);
		assert!(!host.visual.iframe_shown);
		assert!(choreo.is_settled());
	}

	#[test]
	fn teardown_cancels_stale_continuations() {
		let (mut choreo, mut host) = on_map();
		choreo.fly_to_property("property-1", &mut host);
		choreo.advance_by(ms(1600 + 5500), &mut host);
		host.focused = true;
		choreo.advance_by(ms(100), &mut host);
		// blur stage is still pending
		choreo.teardown_and_reset(&mut host);
		host.calls.clear();

		choreo.advance_by(ms(10_000), &mut host);
		assert_eq!(host.effects(), vec![Effect::TopBarRemove, Effect::IframeHide]);
		assert!(!host.visual.page_blurred);
	}

	#[test]
	fn teardown_while_polling_cancels_the_poll() {
		let (mut choreo, mut host) = on_map();
		choreo.fly_to_property("property-1", &mut host);
		choreo.advance_by(ms(1600 + 5500), &mut host);
		assert!(choreo.is_polling());

		choreo.teardown_and_reset(&mut host);
		let checks = host.focus_checks;
		choreo.advance_by(ms(5000), &mut host);
		assert_eq!(host.focus_checks, checks);
		assert!(!choreo.state().iframe_active);
	}

	#[test]
	fn reset_then_rerun_reproduces_the_same_trace() {
		let (mut choreo, mut host) = on_map();
		let first = run_hand_off(&mut choreo, &mut host);

		choreo.teardown_and_reset(&mut host);
		choreo.advance_by(ms(10_000), &mut host);
		host.calls.clear();

		let second = run_hand_off(&mut choreo, &mut host);
		assert_eq!(first, second);
		assert_eq!(host.focus_checks, 2 * 5);
	}

	#[test]
	fn rerun_right_after_reset_finishes_the_reset_first() {
		let (mut choreo, mut host) = on_map();
		let first = run_hand_off(&mut choreo, &mut host);
		let handed = host.visual.clone();

		choreo.teardown_and_reset(&mut host);
		host.calls.clear();
		choreo.handle(Control::ExploreProperty, &mut host);
		assert_eq!(host.effects(), vec![Effect::TopBarRemove, Effect::IframeHide, Effect::MapUnblur]);
		assert!(!host.visual.iframe_shown);
		assert!(!host.visual.top_bar_visible);
		assert!(!host.visual.iframe_expanded);

		// the reset's own delayed steps find nothing left to do
		choreo.advance_by(ms(1000), &mut host);
		assert_eq!(host.effects().len(), 3);
		assert!(!host.visual.iframe_shown);
		assert_eq!(choreo.phase(), Phase::Unblurring);

		choreo.teardown_and_reset(&mut host);
		host.calls.clear();
		let second = run_hand_off(&mut choreo, &mut host);
		assert_eq!(second[..2], [HostCall::Effect(Effect::TopBarRemove), HostCall::Effect(Effect::IframeHide)]);
		assert_eq!(second[2..], first[..]);
		assert_eq!(host.visual, handed);
	}

	#[test]
	fn tour_page_reveals_frame_even_when_click_is_refused() {
		let mut choreo = TourChoreographer::new(SiteProfile::estate());
		let mut host = RecordingHost::new(Page::Welcome);
		host.click_blocked = true;
		choreo.navigate_to_page(Page::Tour, &mut host);
		choreo.advance_by(ms(400), &mut host);
		assert!(!host.visual.tour_iframe_visible);

		choreo.advance_by(ms(2000), &mut host);
		assert_eq!(host.count(&HostCall::ClickPress), 1);
		assert!(!host.visual.tour_iframe_visible);
		choreo.advance_by(ms(500), &mut host);
		assert!(host.visual.tour_iframe_visible);
		assert_eq!(host.count(&HostCall::ClickRelease), 0);
	}

	#[test]
	fn accepted_click_is_released_after_a_short_delay() {
		let mut choreo = TourChoreographer::new(SiteProfile::estate());
		let mut host = RecordingHost::new(Page::Welcome);
		host.click_blocked = false;
		choreo.navigate_to_page(Page::Tour, &mut host);
		choreo.advance_by(ms(400 + 2000 + 49), &mut host);
		assert_eq!(host.count(&HostCall::ClickRelease), 0);
		choreo.advance_by(ms(1), &mut host);
		assert_eq!(host.count(&HostCall::ClickRelease), 1);
	}

	#[test]
	fn exit_fullscreen_resets_then_reloads() {
		let (mut choreo, mut host) = on_map();
		run_hand_off(&mut choreo, &mut host);
		choreo.handle(Control::ExitFullscreen, &mut host);
		assert_eq!(host.calls.last(), Some(&HostCall::Reload));
		assert!(!choreo.state().iframe_active);
	}

	#[test]
	fn map_ready_locks_interaction() {
		let mut choreo = TourChoreographer::new(SiteProfile::estate());
		let mut host = RecordingHost::new(Page::Welcome);
		choreo.map_ready(&mut host);
		assert!(choreo.state().map_initialized);
		assert_eq!(host.calls, vec![HostCall::Interaction(MapInteraction::LOCKED)]);
	}
}
