use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::markers::{LatLng, MapView, MarkerKind, MarkerSet, MarkerSpec};
use super::render::{ResultsView, card_id, popup_html};
use crate::models::ClinicRecord;

/// Map center before any search: Austin, TX
pub const DEFAULT_CENTER: LatLng = LatLng::new(30.2672, -97.7431);
pub const DEFAULT_ZOOM: u8 = 6;
/// Zoom applied when recentering on the first result
pub const RESULTS_ZOOM: u8 = 10;
/// Zoom applied when focusing a single point
pub const FOCUS_ZOOM: u8 = 12;
pub const HIGHLIGHT_DURATION: Duration = Duration::from_secs(2);

pub const USER_LOCATION_POPUP: &str = "📍 You are here";
pub const LOCATION_UNAVAILABLE: &str = "Unable to retrieve your location.";
pub const GEOLOCATION_UNSUPPORTED: &str = "Geolocation is not supported by your browser.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeolocationError {
    Unsupported,
    Unavailable(String),
}

/// Source of the user's current position
pub trait Geolocator {
    fn current_position(&self) -> Result<LatLng, GeolocationError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum LocateOutcome {
    Located(LatLng),
    Alert(&'static str),
}

#[derive(Debug, Clone)]
struct Highlight {
    card_id: String,
    until: Instant,
}

/// Owns the map view and every marker placed on it.
pub struct Presenter<M> {
    view: M,
    markers: MarkerSet,
    highlight: Option<Highlight>,
    located: usize,
}

impl<M: MapView> Presenter<M> {
    /// Wrap `view`, centering it on the default location.
    pub fn new(mut view: M) -> Self {
        view.set_view(DEFAULT_CENTER, DEFAULT_ZOOM);
        Self {
            view,
            markers: MarkerSet::new(),
            highlight: None,
            located: 0,
        }
    }

    pub fn view(&self) -> &M {
        &self.view
    }

    pub fn markers(&self) -> &MarkerSet {
        &self.markers
    }

    /// Show a result set: every existing marker is removed first, then one
    /// marker is placed per mappable result. Unmappable results are listed
    /// without a marker.
    pub fn display(&mut self, clinics: &[ClinicRecord]) -> ResultsView {
        let specs = clinics.iter().enumerate().filter_map(|(index, clinic)| {
            clinic.coordinates().map(|position| MarkerSpec {
                id: card_id(index),
                position: position.into(),
                popup: popup_html(clinic),
                kind: MarkerKind::Clinic { card_index: index },
            })
        });
        self.markers.replace(&mut self.view, specs);
        debug!(
            "Displaying {} results with {} markers",
            clinics.len(),
            self.markers.len()
        );

        if let Some(first) = clinics.first().and_then(ClinicRecord::coordinates) {
            self.view.set_view(first.into(), RESULTS_ZOOM);
        }
        ResultsView::from_results(clinics)
    }

    /// Inline error after a failed fetch. Markers are left as they were.
    pub fn display_error(&mut self) -> ResultsView {
        ResultsView::Error
    }

    /// React to a click on a clinic marker: highlight its card for
    /// [`HIGHLIGHT_DURATION`] and zoom in. Returns the card id to scroll to.
    pub fn select_marker(&mut self, marker_id: &str, now: Instant) -> Option<String> {
        let marker = self.markers.find(marker_id)?;
        let MarkerKind::Clinic { card_index } = marker.kind else {
            return None;
        };
        let position = marker.position;
        let id = card_id(card_index);

        self.highlight = Some(Highlight {
            card_id: id.clone(),
            until: now + HIGHLIGHT_DURATION,
        });
        self.view.set_view(position, FOCUS_ZOOM);
        Some(id)
    }

    /// Card currently highlighted at `now`, if the highlight has not expired
    pub fn highlighted(&self, now: Instant) -> Option<&str> {
        self.highlight
            .as_ref()
            .filter(|h| now < h.until)
            .map(|h| h.card_id.as_str())
    }

    /// Center on the user's position and pin it with an open popup. On
    /// failure nothing changes and an alert message is returned.
    pub fn locate_user<G: Geolocator + ?Sized>(&mut self, geolocator: &G) -> LocateOutcome {
        let position = match geolocator.current_position() {
            Ok(position) => position,
            Err(GeolocationError::Unsupported) => {
                return LocateOutcome::Alert(GEOLOCATION_UNSUPPORTED);
            }
            Err(GeolocationError::Unavailable(reason)) => {
                warn!("Geolocation error: {}", reason);
                return LocateOutcome::Alert(LOCATION_UNAVAILABLE);
            }
        };

        self.view.set_view(position, FOCUS_ZOOM);
        self.located += 1;
        let handle = self
            .markers
            .push(
                &mut self.view,
                MarkerSpec {
                    id: format!("user-location-{}", self.located),
                    position,
                    popup: USER_LOCATION_POPUP.to_string(),
                    kind: MarkerKind::UserLocation,
                },
            )
            .handle;
        self.view.open_popup(handle);
        LocateOutcome::Located(position)
    }
}
