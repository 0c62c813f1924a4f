//! The seam between the choreographer and the page it drives.
//!
//! The choreographer only ever talks to a [`Host`]. In the browser that is the
//! `web-sys` backed `DomHost`; the headless runner and the tests use
//! [`RecordingHost`], which keeps a trace of every call and a small model of
//! the resulting visual state.

use std::{collections::BTreeSet, time::Duration};

use crate::{
	errors::TourError,
	model::{CameraPose, MapInteraction, Page},
};

/// A single visual mutation. Hosts must treat a missing element as a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
	/// Start the blur-out of a page that is being left.
	PageExit(Page),
	/// Undo a blur-out whose transition was abandoned.
	PageRestore(Page),
	PageDeactivate(Page),
	PageActivate(Page),

	/// Blur the map and put its overlay back.
	MapBlur,
	MapUnblur,
	MapTitlesClear,
	MapTitlesAnimate,

	TourContainerHide,
	TourContainerFadeIn,
	TourIframeReveal,

	/// Show the small tour frame on the map and make it focusable.
	IframeShow,
	IframeHide,
	IframeExpand,
	IframeShrink,

	PageBlur,
	PageUnblur,

	TopBarShow,
	TopBarSlideIn,
	TopBarHide,
	TopBarRemove,
}

pub trait Host {
	fn apply(&mut self, effect: Effect);

	/// Feature probe for the widget's `flyCameraTo`.
	fn can_fly(&mut self) -> bool;

	fn fly_camera_to(&mut self, pose: &CameraPose, duration: Duration) -> Result<(), TourError>;

	fn set_camera(&mut self, pose: &CameraPose) -> Result<(), TourError>;

	fn set_map_interaction(&mut self, interaction: &MapInteraction) -> Result<(), TourError>;

	/// Whether the small tour frame is the document's active element.
	fn iframe_focused(&mut self) -> bool;

	/// Replace the small tour frame with a fresh element.
	fn recreate_iframe(&mut self, src: &str, allow: &str) -> Result<(), TourError>;

	/// Press at the centre of the tour frame. Best effort only.
	fn simulate_center_click(&mut self) -> Result<(), TourError>;

	/// Release the press started by [`Host::simulate_center_click`].
	fn release_center_click(&mut self) -> Result<(), TourError>;

	fn reload(&mut self);
}

#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
	Effect(Effect),
	Fly { pose: CameraPose, duration: Duration },
	Camera(CameraPose),
	Interaction(MapInteraction),
	RecreateIframe { src: String, allow: String },
	ClickPress,
	ClickRelease,
	Reload,
}

/// What the page would look like after the recorded effects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisualState {
	pub active_pages: BTreeSet<Page>,
	pub exiting_pages: BTreeSet<Page>,
	pub map_unblurred: bool,
	pub page_blurred: bool,
	pub iframe_shown: bool,
	pub iframe_expanded: bool,
	pub top_bar_visible: bool,
	pub tour_iframe_visible: bool,
}

impl VisualState {
	fn apply(&mut self, effect: Effect) {
		match effect {
			Effect::PageExit(page) => {
				self.exiting_pages.insert(page);
			},
			Effect::PageRestore(page) => {
				self.exiting_pages.remove(&page);
			},
			Effect::PageDeactivate(page) => {
				self.exiting_pages.remove(&page);
				self.active_pages.remove(&page);
			},
			Effect::PageActivate(page) => {
				self.active_pages.insert(page);
			},
			Effect::MapBlur => self.map_unblurred = false,
			Effect::MapUnblur => self.map_unblurred = true,
			Effect::IframeShow => self.iframe_shown = true,
			Effect::IframeHide => self.iframe_shown = false,
			Effect::IframeExpand => self.iframe_expanded = true,
			Effect::IframeShrink => self.iframe_expanded = false,
			Effect::PageBlur => self.page_blurred = true,
			Effect::PageUnblur => self.page_blurred = false,
			Effect::TopBarShow | Effect::TopBarSlideIn => self.top_bar_visible = true,
			Effect::TopBarHide | Effect::TopBarRemove => self.top_bar_visible = false,
			Effect::TourIframeReveal => self.tour_iframe_visible = true,
			Effect::MapTitlesClear | Effect::MapTitlesAnimate | Effect::TourContainerHide | Effect::TourContainerFadeIn => {},
		}
	}
}

/// In-memory host used by the headless runner and the tests.
#[derive(Debug, Clone)]
pub struct RecordingHost {
	pub calls: Vec<HostCall>,
	pub visual: VisualState,
	/// Answer for the `flyCameraTo` probe.
	pub fly_capable: bool,
	/// Make the next `flyCameraTo` call throw.
	pub fly_fails: bool,
	pub focused: bool,
	pub click_blocked: bool,
	pub probes: usize,
	pub focus_checks: usize,
}

impl RecordingHost {
	pub fn new(initial: Page) -> Self {
		let mut visual = VisualState::default();
		visual.active_pages.insert(initial);
		Self {
			calls: Vec::new(),
			visual,
			fly_capable: true,
			fly_fails: false,
			focused: false,
			click_blocked: true,
			probes: 0,
			focus_checks: 0,
		}
	}

	pub fn effects(&self) -> Vec<Effect> {
		self.calls
			.iter()
			.filter_map(|call| match call {
				HostCall::Effect(effect) => Some(*effect),
				_ => None,
			})
			.collect()
	}

	pub fn count(&self, wanted: &HostCall) -> usize {
		self.calls.iter().filter(|call| *call == wanted).count()
	}

	/// Hand the trace over, leaving the host empty.
	pub fn take_calls(&mut self) -> Vec<HostCall> {
		std::mem::take(&mut self.calls)
	}
}

impl Host for RecordingHost {
	fn apply(&mut self, effect: Effect) {
		self.visual.apply(effect);
		self.calls.push(HostCall::Effect(effect));
	}

	fn can_fly(&mut self) -> bool {
		self.probes += 1;
		self.fly_capable
	}

	fn fly_camera_to(&mut self, pose: &CameraPose, duration: Duration) -> Result<(), TourError> {
		if !self.fly_capable {
			return Err(TourError::MissingCapability("flyCameraTo"));
		}
		if std::mem::take(&mut self.fly_fails) {
			return Err(TourError::Js("flyCameraTo threw".into()));
		}
		self.calls.push(HostCall::Fly { pose: *pose, duration });
		Ok(())
	}

	fn set_camera(&mut self, pose: &CameraPose) -> Result<(), TourError> {
		self.calls.push(HostCall::Camera(*pose));
		Ok(())
	}

	fn set_map_interaction(&mut self, interaction: &MapInteraction) -> Result<(), TourError> {
		self.calls.push(HostCall::Interaction(*interaction));
		Ok(())
	}

	fn iframe_focused(&mut self) -> bool {
		self.focus_checks += 1;
		self.focused
	}

	fn recreate_iframe(&mut self, src: &str, allow: &str) -> Result<(), TourError> {
		// a fresh element never starts out focused
		self.focused = false;
		self.calls.push(HostCall::RecreateIframe {
			src: src.to_owned(),
			allow: allow.to_owned(),
		});
		Ok(())
	}

	fn simulate_center_click(&mut self) -> Result<(), TourError> {
		self.calls.push(HostCall::ClickPress);
		if self.click_blocked {
			return Err(TourError::CrossOrigin("frame refused synthetic click".into()));
		}
		Ok(())
	}

	fn release_center_click(&mut self) -> Result<(), TourError> {
		self.calls.push(HostCall::ClickRelease);
		Ok(())
	}

	fn reload(&mut self) {
		self.calls.push(HostCall::Reload);
	}
}
