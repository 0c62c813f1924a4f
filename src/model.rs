use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Page {
	Welcome,
	Map,
	Tour,
}

impl Page {
	pub fn element_id(self) -> &'static str {
		match self {
			Page::Welcome => "welcome-page",
			Page::Map => "map-page",
			Page::Tour => "tour-page",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TourState {
	pub current_page: Page,
	pub iframe_active: bool,
	pub map_initialized: bool,
}

impl Default for TourState {
	fn default() -> Self {
		Self {
			current_page: Page::Welcome,
			iframe_active: false,
			map_initialized: false,
		}
	}
}

/// Target orientation handed to the map widget.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
	pub lat: f64,
	pub lng: f64,
	pub altitude: f64,
	pub tilt: f64,
	pub range: f64,
	pub heading: f64,
}

impl CameraPose {
	/// Wide view over lower Manhattan, used whenever the map is reset.
	pub const OVERVIEW: CameraPose = CameraPose {
		lat: 40.7128,
		lng: -74.0060,
		altitude: 0.0,
		tilt: 45.0,
		range: 5000.0,
		heading: 0.0,
	};
}

/// Interaction flags pushed onto the map widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapInteraction {
	pub draggable: bool,
	pub scrollwheel: bool,
	pub disable_double_click_zoom: bool,
	pub disable_keyboard_shortcuts: bool,
}

impl MapInteraction {
	/// The map sits blurred behind its overlay, so nothing reaches it.
	pub const LOCKED: MapInteraction = MapInteraction {
		draggable: false,
		scrollwheel: false,
		disable_double_click_zoom: true,
		disable_keyboard_shortcuts: true,
	};
}

impl Default for MapInteraction {
	fn default() -> Self {
		Self::LOCKED
	}
}

/// Named actions exposed to the page markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
	StartTour,
	ExploreProperty,
	BackToMap,
	ReturnToMap,
	ExitFullscreen,
	SubmitContact,
}

impl Control {
	pub const ALL: [Control; 6] = [
		Control::StartTour,
		Control::ExploreProperty,
		Control::BackToMap,
		Control::ReturnToMap,
		Control::ExitFullscreen,
		Control::SubmitContact,
	];

	pub fn element_id(self) -> &'static str {
		match self {
			Control::StartTour => "start-tour-btn",
			Control::ExploreProperty => "explore-property-btn",
			Control::BackToMap => "back-to-map-btn",
			Control::ReturnToMap => "back-to-map-from-iframe",
			Control::ExitFullscreen => "exit-fullscreen-btn",
			Control::SubmitContact => "contact-form",
		}
	}

	pub fn from_element_id(id: &str) -> Option<Control> {
		Control::ALL.into_iter().find(|c| c.element_id() == id)
	}
}
