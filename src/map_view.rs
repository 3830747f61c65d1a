use crate::reconciler::{
    Bounds, Glyph, MapSurface, MarkerReconciler, Padding, Popup, ReconcileReport, ViewportChange,
};
use crate::types::{BusSnapshot, Position};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

pub type MarkerId = u64;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MarkerView {
    pub marker_id: MarkerId,
    pub position: Position,
    pub glyph: Glyph,
    pub popup: Popup,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct FittedViewport {
    pub bounds: Bounds,
    pub padding: Padding,
}

/// Marker state the browser map renders from. Marker ids are never reused,
/// so a client can keep popups attached across refreshes.
#[derive(Debug, Default)]
pub struct MapView {
    next_id: MarkerId,
    markers: BTreeMap<MarkerId, MarkerView>,
    viewport: Option<FittedViewport>,
}

#[derive(Debug, Serialize)]
pub struct MapPayload<'a> {
    pub revision: u64,
    pub marker_count: usize,
    pub markers: Vec<&'a MarkerView>,
    pub viewport: Option<FittedViewport>,
}

impl MapView {
    pub fn marker(&self, id: MarkerId) -> Option<&MarkerView> {
        self.markers.get(&id)
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    pub fn viewport(&self) -> Option<FittedViewport> {
        self.viewport
    }
}

impl MapSurface for MapView {
    type Handle = MarkerId;

    fn place_marker(&mut self, position: Position, glyph: Glyph, popup: Popup) -> MarkerId {
        self.next_id += 1;
        let marker_id = self.next_id;
        self.markers.insert(
            marker_id,
            MarkerView {
                marker_id,
                position,
                glyph,
                popup,
            },
        );
        marker_id
    }

    fn update_marker(&mut self, handle: &MarkerId, position: Position, glyph: Glyph, popup: Popup) {
        if let Some(m) = self.markers.get_mut(handle) {
            m.position = position;
            m.glyph = glyph;
            m.popup = popup;
        }
    }

    fn remove_marker(&mut self, handle: MarkerId) {
        self.markers.remove(&handle);
    }

    fn fit_bounds(&mut self, bounds: Bounds, padding: Padding) {
        self.viewport = Some(FittedViewport { bounds, padding });
    }
}

/// The reconciler paired with the surface it draws on.
#[derive(Debug, Default)]
pub struct LiveMap {
    reconciler: MarkerReconciler<MarkerId>,
    view: MapView,
    revision: u64,
}

impl LiveMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refresh(&mut self, snapshots: &[BusSnapshot], revision: u64) -> ReconcileReport {
        let report = self.reconciler.reconcile(&mut self.view, snapshots);
        self.revision = revision;

        for e in &report.skipped {
            warn!(error = %e, "skipped bus snapshot");
        }
        debug!(
            revision,
            created = report.created(),
            updated = report.updated(),
            removed = report.removed(),
            refit = matches!(report.viewport, ViewportChange::Fit(_)),
            markers = self.reconciler.len(),
            "map reconciled"
        );
        report
    }

    pub fn marker_for(&self, bus_id: &str) -> Option<&MarkerView> {
        self.reconciler
            .get(bus_id)
            .and_then(|m| self.view.marker(m.handle))
    }

    pub fn payload(&self) -> MapPayload<'_> {
        MapPayload {
            revision: self.revision,
            marker_count: self.view.marker_count(),
            markers: self.view.markers.values().collect(),
            viewport: self.view.viewport(),
        }
    }
}
