//! Map markers and the mapping-library seam

use serde::{Deserialize, Serialize};

/// A point on the map
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl From<(f64, f64)> for LatLng {
    fn from((lat, lng): (f64, f64)) -> Self {
        Self { lat, lng }
    }
}

/// Opaque handle a [`MapView`] hands out for a placed marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MarkerHandle(pub u64);

/// Whatever actually draws the map.
pub trait MapView {
    fn add_marker(&mut self, position: LatLng, popup: &str) -> MarkerHandle;
    fn remove_marker(&mut self, handle: MarkerHandle);
    fn set_view(&mut self, center: LatLng, zoom: u8);
    fn open_popup(&mut self, handle: MarkerHandle);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    /// Pin for a result card (0-based position in the result list)
    Clinic { card_index: usize },
    UserLocation,
}

/// A marker not yet placed on the map
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerSpec {
    pub id: String,
    pub position: LatLng,
    pub popup: String,
    pub kind: MarkerKind,
}

/// A marker currently on the map
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub id: String,
    pub position: LatLng,
    pub popup: String,
    pub kind: MarkerKind,
    pub handle: MarkerHandle,
}

/// The markers currently placed on a view.
///
/// Every marker in the set is on the view and every marker this set placed
/// on the view is in the set.
#[derive(Debug, Default)]
pub struct MarkerSet {
    markers: Vec<Marker>,
}

impl MarkerSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every marker, then place `specs`.
    pub fn replace<V, I>(&mut self, view: &mut V, specs: I)
    where
        V: MapView + ?Sized,
        I: IntoIterator<Item = MarkerSpec>,
    {
        self.clear(view);
        for spec in specs {
            self.push(view, spec);
        }
    }

    pub fn push<V: MapView + ?Sized>(&mut self, view: &mut V, spec: MarkerSpec) -> &Marker {
        let handle = view.add_marker(spec.position, &spec.popup);
        self.markers.push(Marker {
            id: spec.id,
            position: spec.position,
            popup: spec.popup,
            kind: spec.kind,
            handle,
        });
        &self.markers[self.markers.len() - 1]
    }

    pub fn clear<V: MapView + ?Sized>(&mut self, view: &mut V) {
        for marker in self.markers.drain(..) {
            view.remove_marker(marker.handle);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Marker> {
        self.markers.iter()
    }

    #[must_use]
    pub fn find(&self, id: &str) -> Option<&Marker> {
        self.markers.iter().find(|m| m.id == id)
    }
}
