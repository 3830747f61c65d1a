use crate::map_view::LiveMap;
use crate::types::{Bus, BusLocation, Driver};
use compact_str::CompactString;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tokio::sync::{Mutex, watch};

/// Owned copy of every fleet table, used for disk snapshots and remote sync.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FleetTables {
    pub buses: Vec<Bus>,
    pub drivers: Vec<Driver>,
    pub locations: Vec<BusLocation>,
}

pub struct AppState {
    // Map BusID -> Bus
    pub buses: DashMap<CompactString, Bus>,

    // Map DriverID -> Driver
    pub drivers: DashMap<CompactString, Driver>,

    // Map BusID -> last reported location (at most one per bus)
    pub locations: DashMap<CompactString, BusLocation>,

    pub live_map: Mutex<LiveMap>,

    // Bumped on every fleet change; the map task reconciles on each bump.
    revision: watch::Sender<u64>,

    // Set while a remote feed owns the tables.
    read_only: bool,
}

impl AppState {
    pub fn new(read_only: bool) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            buses: DashMap::new(),
            drivers: DashMap::new(),
            locations: DashMap::new(),
            live_map: Mutex::new(LiveMap::new()),
            revision,
            read_only,
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn notify_changed(&self) {
        self.revision.send_modify(|r| *r += 1);
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn tables(&self) -> FleetTables {
        FleetTables {
            buses: self.buses.iter().map(|r| r.value().clone()).collect(),
            drivers: self.drivers.iter().map(|r| r.value().clone()).collect(),
            locations: self.locations.iter().map(|r| r.value().clone()).collect(),
        }
    }

    /// Brings every table in line with `tables`. Locations for unknown buses
    /// are dropped. Incoming rows are upserted before stale keys are removed,
    /// so a concurrent reader never sees a bus vanish that is present in both
    /// generations. Returns whether anything changed; readers are only
    /// notified when it did.
    pub fn replace_tables(&self, tables: FleetTables) -> bool {
        let bus_ids: HashSet<CompactString> = tables.buses.iter().map(|b| b.id.clone()).collect();
        let driver_ids: HashSet<CompactString> =
            tables.drivers.iter().map(|d| d.id.clone()).collect();
        let mut location_ids = HashSet::new();
        let mut changed = false;

        for bus in tables.buses {
            changed |= upsert(&self.buses, bus.id.clone(), bus);
        }
        for driver in tables.drivers {
            changed |= upsert(&self.drivers, driver.id.clone(), driver);
        }
        for loc in tables.locations {
            if bus_ids.contains(&loc.bus_id) {
                location_ids.insert(loc.bus_id.clone());
                changed |= upsert(&self.locations, loc.bus_id.clone(), loc);
            }
        }

        let before = self.buses.len() + self.drivers.len() + self.locations.len();
        self.locations.retain(|k, _| location_ids.contains(k));
        self.drivers.retain(|k, _| driver_ids.contains(k));
        self.buses.retain(|k, _| bus_ids.contains(k));
        changed |= before != self.buses.len() + self.drivers.len() + self.locations.len();

        if changed {
            self.notify_changed();
        }
        changed
    }
}

fn upsert<V: PartialEq>(table: &DashMap<CompactString, V>, key: CompactString, value: V) -> bool {
    if table.get(&key).is_some_and(|current| *current == value) {
        return false;
    }
    table.insert(key, value);
    true
}
