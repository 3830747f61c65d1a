//! Keeps one map marker per bus in step with the latest snapshot list.
//!
//! Markers are created on first sighting of a bus id, updated in place on
//! every later pass that still lists the id, and removed once a pass no
//! longer does. The viewport is refitted around every real GPS fix; a pass
//! with no fixes at all leaves it alone.

use crate::availability::{Tier, UNKNOWN_COLOR, classify, seat_count_color};
use crate::error::SnapshotError;
use crate::types::{BusSnapshot, LatLng, Position};
use compact_str::CompactString;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

pub const FIT_PADDING: Padding = Padding { x: 50, y: 50 };

const BUS_SYMBOL: &str = "🚌";
const NO_FIX_SYMBOL: &str = "❓";

/// Pixel padding kept between the fitted bounds and the map edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Padding {
    pub x: u32,
    pub y: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl Bounds {
    /// Smallest box holding every point, or `None` for no points.
    pub fn around<I: IntoIterator<Item = LatLng>>(points: I) -> Option<Bounds> {
        let mut bounds: Option<Bounds> = None;
        for p in points {
            let b = bounds.get_or_insert(Bounds {
                south: p.latitude,
                west: p.longitude,
                north: p.latitude,
                east: p.longitude,
            });
            b.south = b.south.min(p.latitude);
            b.north = b.north.max(p.latitude);
            b.west = b.west.min(p.longitude);
            b.east = b.east.max(p.longitude);
        }
        bounds
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "tier", rename_all = "snake_case")]
pub enum VisualState {
    /// No GPS fix yet.
    Unknown,
    Classified(Tier),
}

impl VisualState {
    pub fn for_snapshot(snapshot: &BusSnapshot) -> Self {
        match &snapshot.location {
            Some(l) => VisualState::Classified(classify(l.available_seats, snapshot.capacity).tier),
            None => VisualState::Unknown,
        }
    }

    pub fn glyph(self) -> Glyph {
        match self {
            VisualState::Unknown => Glyph {
                symbol: NO_FIX_SYMBOL,
                color: UNKNOWN_COLOR,
                pulse: false,
            },
            VisualState::Classified(tier) => Glyph {
                symbol: BUS_SYMBOL,
                color: tier.color(),
                pulse: true,
            },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Glyph {
    pub symbol: &'static str,
    pub color: &'static str,
    pub pulse: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Popup {
    pub bus_number: String,
    pub route_name: String,
    /// `None` renders as "No GPS yet".
    pub available_seats: Option<i32>,
    pub seat_color: Option<&'static str>,
}

impl Popup {
    pub fn for_snapshot(snapshot: &BusSnapshot) -> Self {
        let seats = snapshot.location.as_ref().map(|l| l.available_seats);
        Self {
            bus_number: snapshot.bus_number.clone(),
            route_name: snapshot.route_name.clone(),
            available_seats: seats,
            seat_color: seats.map(seat_count_color),
        }
    }
}

/// Drawing primitives the reconciler drives. Handles stay owned by the
/// reconciler, so an update always reaches the marker that was placed.
pub trait MapSurface {
    type Handle;

    fn place_marker(&mut self, position: Position, glyph: Glyph, popup: Popup) -> Self::Handle;
    fn update_marker(&mut self, handle: &Self::Handle, position: Position, glyph: Glyph, popup: Popup);
    fn remove_marker(&mut self, handle: Self::Handle);
    fn fit_bounds(&mut self, bounds: Bounds, padding: Padding);
}

#[derive(Debug)]
pub struct RenderedMarker<H> {
    pub bus_id: CompactString,
    pub position: Position,
    pub visual: VisualState,
    pub handle: H,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MarkerOp {
    Create(CompactString),
    Update(CompactString),
    Remove(CompactString),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ViewportChange {
    Unchanged,
    Fit(Bounds),
}

#[derive(Debug)]
pub struct ReconcileReport {
    pub ops: Vec<MarkerOp>,
    pub skipped: Vec<SnapshotError>,
    pub viewport: ViewportChange,
}

impl ReconcileReport {
    pub fn created(&self) -> usize {
        self.count(|op| matches!(op, MarkerOp::Create(_)))
    }

    pub fn updated(&self) -> usize {
        self.count(|op| matches!(op, MarkerOp::Update(_)))
    }

    pub fn removed(&self) -> usize {
        self.count(|op| matches!(op, MarkerOp::Remove(_)))
    }

    fn count(&self, f: impl Fn(&MarkerOp) -> bool) -> usize {
        self.ops.iter().filter(|op| f(op)).count()
    }
}

/// Checks the fields a marker cannot do without.
pub fn validate(snapshot: &BusSnapshot) -> Result<(), SnapshotError> {
    if snapshot.id.trim().is_empty() {
        return Err(SnapshotError::MissingId);
    }
    if snapshot.capacity <= 0 {
        return Err(SnapshotError::InvalidCapacity {
            id: snapshot.id.clone(),
            capacity: snapshot.capacity,
        });
    }
    if let Some(l) = &snapshot.location {
        if !l.latitude.is_finite() || !l.longitude.is_finite() {
            return Err(SnapshotError::InvalidLocation {
                id: snapshot.id.clone(),
            });
        }
    }
    Ok(())
}

/// Owns the bus id -> marker map. Not reentrant: callers run one pass at a
/// time against the same surface.
#[derive(Debug)]
pub struct MarkerReconciler<H> {
    markers: HashMap<CompactString, RenderedMarker<H>>,
}

impl<H> Default for MarkerReconciler<H> {
    fn default() -> Self {
        Self {
            markers: HashMap::new(),
        }
    }
}

impl<H> MarkerReconciler<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, bus_id: &str) -> Option<&RenderedMarker<H>> {
        self.markers.get(bus_id)
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn reconcile<S>(&mut self, surface: &mut S, snapshots: &[BusSnapshot]) -> ReconcileReport
    where
        S: MapSurface<Handle = H>,
    {
        let mut ops = Vec::new();
        let mut skipped = Vec::new();
        let mut seen: HashSet<CompactString> = HashSet::new();
        // Last valid position per id; a later duplicate overrides an earlier fix.
        let mut placed: HashMap<CompactString, Position> = HashMap::new();

        for snapshot in snapshots {
            if let Err(e) = validate(snapshot) {
                // A bad row for a bus we already show keeps its last good marker.
                if !snapshot.id.trim().is_empty() {
                    seen.insert(snapshot.id.clone());
                }
                skipped.push(e);
                continue;
            }
            seen.insert(snapshot.id.clone());

            let position = snapshot.position();
            let visual = VisualState::for_snapshot(snapshot);
            let popup = Popup::for_snapshot(snapshot);
            placed.insert(snapshot.id.clone(), position);

            match self.markers.get_mut(&snapshot.id) {
                Some(marker) => {
                    surface.update_marker(&marker.handle, position, visual.glyph(), popup);
                    marker.position = position;
                    marker.visual = visual;
                    ops.push(MarkerOp::Update(snapshot.id.clone()));
                }
                None => {
                    let handle = surface.place_marker(position, visual.glyph(), popup);
                    self.markers.insert(
                        snapshot.id.clone(),
                        RenderedMarker {
                            bus_id: snapshot.id.clone(),
                            position,
                            visual,
                            handle,
                        },
                    );
                    ops.push(MarkerOp::Create(snapshot.id.clone()));
                }
            }
        }

        let mut gone: Vec<CompactString> = self
            .markers
            .keys()
            .filter(|id| !seen.contains(*id))
            .cloned()
            .collect();
        gone.sort();
        for id in gone {
            if let Some(marker) = self.markers.remove(&id) {
                surface.remove_marker(marker.handle);
                ops.push(MarkerOp::Remove(id));
            }
        }

        let viewport = match Bounds::around(placed.values().filter_map(Position::fix)) {
            Some(bounds) => {
                surface.fit_bounds(bounds, FIT_PADDING);
                ViewportChange::Fit(bounds)
            }
            None => ViewportChange::Unchanged,
        };

        ReconcileReport {
            ops,
            skipped,
            viewport,
        }
    }
}
