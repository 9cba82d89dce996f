//! Presentation layer
//!
//! Turns search results into result cards and map markers. The map itself is
//! behind the [`MapView`] trait and the user's position behind
//! [`Geolocator`], so the widget logic runs without a browser.

pub mod finder;
pub mod markers;
pub mod presenter;
pub mod render;
pub mod sequence;

pub use finder::{ClinicFinder, ClinicSource, HttpAssistantClient, HttpClinicSource, SearchOutcome};
pub use markers::{LatLng, MapView, Marker, MarkerHandle, MarkerKind, MarkerSet, MarkerSpec};
pub use presenter::{GeolocationError, Geolocator, LocateOutcome, Presenter};
pub use render::{ClinicCard, ResultsView};
pub use sequence::{ResponseOrdering, SearchSequencer, SearchTicket};
