//! Site configuration.
//!
//! One choreographer serves every site; what differs between the estate tour
//! and the restaurant page (locations, tour source, top bar title, timings)
//! lives in a [`SiteProfile`]. Profiles can be loaded from JSON, and any field
//! left out falls back to the estate defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
	errors::TourError,
	model::{CameraPose, MapInteraction},
};

pub const TOUR_ALLOW: &str = "autoplay; fullscreen; web-share; xr-spatial-tracking";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyLocation {
	pub id: String,
	pub pose: CameraPose,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SiteProfile {
	pub name: String,
	/// Property flown to by the explore button.
	pub featured_property: String,
	/// The first entry doubles as the fallback for unknown ids.
	pub properties: Vec<PropertyLocation>,
	pub overview: CameraPose,
	pub interaction: MapInteraction,
	pub tour_src: String,
	pub tour_allow: String,
	pub tour_title: String,
	pub timings: Timings,
}

impl Default for SiteProfile {
	fn default() -> Self {
		Self::estate()
	}
}

impl SiteProfile {
	pub fn estate() -> Self {
		Self {
			name: "estate".into(),
			featured_property: "property-1".into(),
			properties: vec![PropertyLocation {
				id: "property-1".into(),
				pose: CameraPose {
					lat: 40.7128,
					lng: -74.0060,
					altitude: 10.0,
					tilt: 70.0,
					range: 1000.0,
					heading: 0.0,
				},
			}],
			overview: CameraPose::OVERVIEW,
			interaction: MapInteraction::LOCKED,
			tour_src: "https://my.matterport.com/show/?m=SxQL3iGyoDo&play=1".into(),
			tour_allow: TOUR_ALLOW.into(),
			tour_title: "Property Tour".into(),
			timings: Timings::default(),
		}
	}

	pub fn restaurant() -> Self {
		Self {
			name: "restaurant".into(),
			featured_property: "dining-room".into(),
			properties: vec![PropertyLocation {
				id: "dining-room".into(),
				pose: CameraPose {
					lat: 40.7411,
					lng: -73.9897,
					altitude: 25.0,
					tilt: 65.0,
					range: 600.0,
					heading: 30.0,
				},
			}],
			overview: CameraPose {
				lat: 40.7411,
				lng: -73.9897,
				altitude: 0.0,
				tilt: 45.0,
				range: 4000.0,
				heading: 0.0,
			},
			tour_title: "Restaurant Tour".into(),
			..Self::estate()
		}
	}

	/// Look up a built-in profile by name.
	pub fn preset(name: &str) -> Option<Self> {
		match name {
			"estate" => Some(Self::estate()),
			"restaurant" => Some(Self::restaurant()),
			_ => None,
		}
	}

	pub fn from_json(raw: &str) -> Result<Self, TourError> {
		let profile: SiteProfile = serde_json::from_str(raw)?;
		profile.validate()?;
		Ok(profile)
	}

	fn validate(&self) -> Result<(), TourError> {
		if self.properties.is_empty() {
			return Err(TourError::Profile("no property locations".into()));
		}
		if self.tour_src.is_empty() {
			return Err(TourError::Profile("tour source is empty".into()));
		}
		Ok(())
	}

	/// Unknown ids resolve to the first configured location.
	pub fn resolve_pose(&self, property_id: &str) -> CameraPose {
		self.properties
			.iter()
			.find(|p| p.id == property_id)
			.or_else(|| self.properties.first())
			.map(|p| p.pose)
			.unwrap_or(self.overview)
	}
}

/// Every fixed delay of the choreography. Serialized as milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Timings {
	/// Page blur-out before the active page swaps.
	#[serde(with = "millis")]
	pub settle: Duration,
	/// Delay before a page's entry animation restarts.
	#[serde(with = "millis")]
	pub entry_animation: Duration,
	#[serde(with = "millis")]
	pub unblur: Duration,
	#[serde(with = "millis")]
	pub flight: Duration,
	#[serde(with = "millis")]
	pub reveal_after_flight: Duration,
	#[serde(with = "millis")]
	pub retry_backoff: Duration,
	#[serde(with = "millis")]
	pub poll_interval: Duration,
	#[serde(with = "millis")]
	pub blur_delay: Duration,
	#[serde(with = "millis")]
	pub expand_delay: Duration,
	#[serde(with = "millis")]
	pub top_bar_slide: Duration,
	#[serde(with = "millis")]
	pub top_bar_hide: Duration,
	#[serde(with = "millis")]
	pub iframe_shrink: Duration,
	/// Grace period for the cross-origin tour to load. Its load event is not
	/// reliable.
	#[serde(with = "millis")]
	pub tour_load_grace: Duration,
	#[serde(with = "millis")]
	pub tour_reveal: Duration,
	#[serde(with = "millis")]
	pub click_release: Duration,
}

impl Default for Timings {
	fn default() -> Self {
		let ms = Duration::from_millis;
		Self {
			settle: ms(400),
			entry_animation: ms(100),
			unblur: ms(1600),
			flight: ms(5000),
			reveal_after_flight: ms(5500),
			retry_backoff: ms(500),
			poll_interval: ms(100),
			blur_delay: ms(2000),
			expand_delay: ms(1000),
			top_bar_slide: ms(100),
			top_bar_hide: ms(300),
			iframe_shrink: ms(800),
			tour_load_grace: ms(2000),
			tour_reveal: ms(500),
			click_release: ms(50),
		}
	}
}

mod millis {
	use std::time::Duration;

	use serde::{Deserialize, Deserializer, Serializer};

	pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_u64(value.as_millis() as u64)
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
		u64::deserialize(deserializer).map(Duration::from_millis)
	}
}
