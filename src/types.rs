use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bus {
    pub id: CompactString,
    pub bus_number: String,
    pub route_name: String,
    pub capacity: i32,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub id: CompactString,
    pub name: String,
    pub phone: String,
    pub bus_id: CompactString,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

// One row per bus, overwritten by each driver update.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BusLocation {
    pub bus_id: CompactString,
    pub latitude: f64,
    pub longitude: f64,
    pub available_seats: i32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub latitude: f64,
    pub longitude: f64,
}

impl LatLng {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Where a marker sits. `NoFix` is its own state so a bus without GPS
/// is never mistaken for one reporting from (0, 0).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Position {
    NoFix,
    Fix(LatLng),
}

impl Position {
    pub fn fix(&self) -> Option<LatLng> {
        match self {
            Position::NoFix => None,
            Position::Fix(ll) => Some(*ll),
        }
    }
}

/// Last reported fix and seat count of a bus.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub available_seats: i32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotDriver {
    pub name: String,
    pub phone: String,
}

/// Point-in-time view of one bus, as handed to the list view and the map.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BusSnapshot {
    pub id: CompactString,
    pub bus_number: String,
    pub route_name: String,
    pub capacity: i32,
    pub location: Option<SnapshotLocation>,
    pub driver: Option<SnapshotDriver>,
}

impl BusSnapshot {
    pub fn from_parts(bus: &Bus, location: Option<&BusLocation>, driver: Option<&Driver>) -> Self {
        Self {
            id: bus.id.clone(),
            bus_number: bus.bus_number.clone(),
            route_name: bus.route_name.clone(),
            capacity: bus.capacity,
            location: location.map(|l| SnapshotLocation {
                latitude: l.latitude,
                longitude: l.longitude,
                available_seats: l.available_seats,
                updated_at: l.updated_at,
            }),
            driver: driver.map(|d| SnapshotDriver {
                name: d.name.clone(),
                phone: d.phone.clone(),
            }),
        }
    }

    pub fn position(&self) -> Position {
        match &self.location {
            Some(l) => Position::Fix(LatLng::new(l.latitude, l.longitude)),
            None => Position::NoFix,
        }
    }
}
