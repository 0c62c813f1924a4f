use thiserror::Error;

#[derive(Debug, Error)]
pub enum TourError {
	/// The map widget (or one of its properties) is not there yet.
	#[error("map widget does not expose `{0}`")]
	MissingCapability(&'static str),

	#[error("element `{0}` not found")]
	MissingElement(String),

	/// Browsers refuse most interaction with a cross-origin frame.
	#[error("cross-origin restriction: {0}")]
	CrossOrigin(String),

	#[error("javascript error: {0}")]
	Js(String),

	#[error("invalid site profile: {0}")]
	Profile(String),
}

impl From<serde_json::Error> for TourError {
	fn from(err: serde_json::Error) -> Self {
		TourError::Profile(err.to_string())
	}
}
