//! Driver and admin write paths over the fleet tables, and the join that
//! turns them into bus snapshots.

use crate::error::FleetError;
use crate::state::AppState;
use crate::types::{Bus, BusLocation, BusSnapshot, Driver};
use chrono::Utc;
use compact_str::CompactString;
use serde::Deserialize;
use tracing::info;

#[derive(Clone, Debug, Deserialize)]
pub struct LocationUpdate {
    pub bus_id: CompactString,
    pub latitude: f64,
    pub longitude: f64,
    pub available_seats: i32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewBus {
    pub bus_number: String,
    pub route_name: String,
    pub capacity: i32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewDriver {
    pub name: String,
    pub phone: String,
    pub bus_id: CompactString,
}

fn ensure_writable(state: &AppState) -> Result<(), FleetError> {
    if state.is_read_only() {
        return Err(FleetError::ReadOnly);
    }
    Ok(())
}

fn required(field: &str, value: &str) -> Result<String, FleetError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(FleetError::Invalid(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

/// Records a driver's fix and seat count. Last write wins.
pub fn update_location(state: &AppState, update: LocationUpdate) -> Result<BusLocation, FleetError> {
    ensure_writable(state)?;

    // Held until the insert, so a concurrent delete_bus cannot orphan the row.
    let bus = state
        .buses
        .get(&update.bus_id)
        .ok_or_else(|| FleetError::BusNotFound(update.bus_id.clone()))?;
    let capacity = bus.capacity;

    if !update.latitude.is_finite() || !(-90.0..=90.0).contains(&update.latitude) {
        return Err(FleetError::Invalid(format!(
            "latitude {} out of range",
            update.latitude
        )));
    }
    if !update.longitude.is_finite() || !(-180.0..=180.0).contains(&update.longitude) {
        return Err(FleetError::Invalid(format!(
            "longitude {} out of range",
            update.longitude
        )));
    }
    if update.available_seats < 0 || update.available_seats > capacity {
        return Err(FleetError::Invalid(format!(
            "available seats must be between 0 and {}",
            capacity
        )));
    }

    let location = BusLocation {
        bus_id: update.bus_id.clone(),
        latitude: update.latitude,
        longitude: update.longitude,
        available_seats: update.available_seats,
        updated_at: Utc::now(),
    };
    state.locations.insert(update.bus_id, location.clone());
    drop(bus);
    state.notify_changed();

    info!(
        bus_id = %location.bus_id,
        seats = location.available_seats,
        "driver location updated"
    );
    Ok(location)
}

pub fn add_bus(state: &AppState, new: NewBus) -> Result<Bus, FleetError> {
    ensure_writable(state)?;
    let bus_number = required("bus_number", &new.bus_number)?;
    let route_name = required("route_name", &new.route_name)?;
    if new.capacity <= 0 {
        return Err(FleetError::Invalid("capacity must be positive".to_string()));
    }

    let bus = Bus {
        id: CompactString::from(uuid::Uuid::new_v4().to_string()),
        bus_number,
        route_name,
        capacity: new.capacity,
        created_at: Some(Utc::now()),
    };
    state.buses.insert(bus.id.clone(), bus.clone());
    state.notify_changed();

    info!(bus_id = %bus.id, bus_number = %bus.bus_number, "bus added");
    Ok(bus)
}

pub fn add_driver(state: &AppState, new: NewDriver) -> Result<Driver, FleetError> {
    ensure_writable(state)?;
    let name = required("name", &new.name)?;
    let phone = required("phone", &new.phone)?;
    let bus_id = CompactString::from(required("bus_id", &new.bus_id)?);
    if !state.buses.contains_key(&bus_id) {
        return Err(FleetError::BusNotFound(bus_id));
    }

    let driver = Driver {
        id: CompactString::from(uuid::Uuid::new_v4().to_string()),
        name,
        phone,
        bus_id,
        created_at: Some(Utc::now()),
    };
    state.drivers.insert(driver.id.clone(), driver.clone());
    state.notify_changed();

    info!(driver_id = %driver.id, bus_id = %driver.bus_id, "driver added");
    Ok(driver)
}

/// Rewrites an existing driver's name, phone and bus assignment.
pub fn update_driver(state: &AppState, driver_id: &str, edit: NewDriver) -> Result<Driver, FleetError> {
    ensure_writable(state)?;
    let name = required("name", &edit.name)?;
    let phone = required("phone", &edit.phone)?;
    let bus_id = CompactString::from(required("bus_id", &edit.bus_id)?);
    // Held across the write, like update_location.
    let bus = state
        .buses
        .get(&bus_id)
        .ok_or_else(|| FleetError::BusNotFound(bus_id.clone()))?;

    let mut driver = state
        .drivers
        .get_mut(driver_id)
        .ok_or_else(|| FleetError::DriverNotFound(driver_id.into()))?;
    driver.name = name;
    driver.phone = phone;
    driver.bus_id = bus_id;
    let updated = driver.clone();
    drop(driver);
    drop(bus);
    state.notify_changed();

    info!(driver_id = %updated.id, bus_id = %updated.bus_id, "driver updated");
    Ok(updated)
}

/// Removes a bus together with its location and assigned drivers.
pub fn delete_bus(state: &AppState, bus_id: &str) -> Result<Bus, FleetError> {
    ensure_writable(state)?;
    let (_, bus) = state
        .buses
        .remove(bus_id)
        .ok_or_else(|| FleetError::BusNotFound(bus_id.into()))?;

    state.locations.remove(bus_id);
    let before = state.drivers.len();
    state.drivers.retain(|_, d| d.bus_id.as_str() != bus_id);
    let dropped_drivers = before - state.drivers.len();
    state.notify_changed();

    info!(bus_id = %bus.id, dropped_drivers, "bus deleted");
    Ok(bus)
}

pub fn delete_driver(state: &AppState, driver_id: &str) -> Result<Driver, FleetError> {
    ensure_writable(state)?;
    let (_, driver) = state
        .drivers
        .remove(driver_id)
        .ok_or_else(|| FleetError::DriverNotFound(driver_id.into()))?;
    state.notify_changed();

    info!(driver_id = %driver.id, "driver deleted");
    Ok(driver)
}

/// Drivers ordered by name.
pub fn list_drivers(state: &AppState) -> Vec<Driver> {
    let mut drivers: Vec<Driver> = state.drivers.iter().map(|r| r.value().clone()).collect();
    drivers.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    drivers
}

/// Current snapshot of every bus, ordered by bus number then id.
pub fn snapshots(state: &AppState) -> Vec<BusSnapshot> {
    let mut out: Vec<BusSnapshot> = state
        .buses
        .iter()
        .map(|r| {
            let bus = r.value();
            let location = state.locations.get(&bus.id);
            // First driver by id, so the pick is stable across calls.
            let driver = state
                .drivers
                .iter()
                .filter(|d| d.bus_id == bus.id)
                .min_by(|a, b| a.id.cmp(&b.id))
                .map(|d| d.value().clone());
            BusSnapshot::from_parts(bus, location.as_deref(), driver.as_ref())
        })
        .collect();
    out.sort_by(|a, b| {
        a.bus_number
            .cmp(&b.bus_number)
            .then_with(|| a.id.cmp(&b.id))
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with_bus(capacity: i32) -> (AppState, Bus) {
        let state = AppState::new(false);
        let bus = add_bus(
            &state,
            NewBus {
                bus_number: "12".to_string(),
                route_name: "Campus Loop".to_string(),
                capacity,
            },
        )
        .unwrap();
        (state, bus)
    }

    fn update(bus_id: &str, seats: i32) -> LocationUpdate {
        LocationUpdate {
            bus_id: bus_id.into(),
            latitude: 40.758,
            longitude: -73.9855,
            available_seats: seats,
        }
    }

    #[test]
    fn test_location_upsert_is_last_write_wins() {
        let (state, bus) = state_with_bus(40);
        update_location(&state, update(&bus.id, 25)).unwrap();
        update_location(&state, update(&bus.id, 8)).unwrap();

        assert_eq!(state.locations.len(), 1);
        assert_eq!(state.locations.get(&bus.id).unwrap().available_seats, 8);
    }

    #[test]
    fn test_location_validation() {
        let (state, bus) = state_with_bus(40);
        assert_eq!(
            update_location(&state, update("missing", 3)),
            Err(FleetError::BusNotFound("missing".into()))
        );
        assert!(matches!(
            update_location(&state, update(&bus.id, 41)),
            Err(FleetError::Invalid(_))
        ));
        assert!(matches!(
            update_location(&state, update(&bus.id, -1)),
            Err(FleetError::Invalid(_))
        ));
        let mut bad = update(&bus.id, 3);
        bad.latitude = f64::NAN;
        assert!(matches!(update_location(&state, bad), Err(FleetError::Invalid(_))));
        let mut bad = update(&bus.id, 3);
        bad.longitude = 200.0;
        assert!(matches!(update_location(&state, bad), Err(FleetError::Invalid(_))));
        assert!(state.locations.is_empty());
    }

    #[test]
    fn test_add_bus_requires_fields() {
        let state = AppState::new(false);
        let blank = NewBus {
            bus_number: "  ".to_string(),
            route_name: "North".to_string(),
            capacity: 30,
        };
        assert!(matches!(add_bus(&state, blank), Err(FleetError::Invalid(_))));
        let zero = NewBus {
            bus_number: "7".to_string(),
            route_name: "North".to_string(),
            capacity: 0,
        };
        assert!(matches!(add_bus(&state, zero), Err(FleetError::Invalid(_))));
        assert!(state.buses.is_empty());
    }

    #[test]
    fn test_add_driver_needs_existing_bus() {
        let (state, bus) = state_with_bus(40);
        let err = add_driver(
            &state,
            NewDriver {
                name: "Sam".to_string(),
                phone: "555-0100".to_string(),
                bus_id: "nope".into(),
            },
        );
        assert_eq!(err, Err(FleetError::BusNotFound("nope".into())));

        let driver = add_driver(
            &state,
            NewDriver {
                name: "Sam".to_string(),
                phone: "555-0100".to_string(),
                bus_id: bus.id.clone(),
            },
        )
        .unwrap();
        assert_eq!(list_drivers(&state), vec![driver]);
    }

    #[test]
    fn test_delete_bus_cascades() {
        let (state, bus) = state_with_bus(40);
        update_location(&state, update(&bus.id, 10)).unwrap();
        add_driver(
            &state,
            NewDriver {
                name: "Sam".to_string(),
                phone: "555-0100".to_string(),
                bus_id: bus.id.clone(),
            },
        )
        .unwrap();

        delete_bus(&state, &bus.id).unwrap();
        assert!(state.buses.is_empty());
        assert!(state.locations.is_empty());
        assert!(state.drivers.is_empty());
        assert_eq!(
            delete_bus(&state, &bus.id),
            Err(FleetError::BusNotFound(bus.id.clone()))
        );
    }

    #[test]
    fn test_update_driver() {
        let (state, bus) = state_with_bus(40);
        let other = add_bus(
            &state,
            NewBus {
                bus_number: "14".to_string(),
                route_name: "South".to_string(),
                capacity: 20,
            },
        )
        .unwrap();
        let driver = add_driver(
            &state,
            NewDriver {
                name: "Sam".to_string(),
                phone: "555-0100".to_string(),
                bus_id: bus.id.clone(),
            },
        )
        .unwrap();
        let edit = |bus_id: &str| NewDriver {
            name: " Sam Lee ".to_string(),
            phone: "555-0111".to_string(),
            bus_id: bus_id.into(),
        };

        let updated = update_driver(&state, &driver.id, edit(&other.id)).unwrap();
        assert_eq!(updated.id, driver.id);
        assert_eq!(updated.name, "Sam Lee");
        assert_eq!(updated.created_at, driver.created_at);
        assert_eq!(state.drivers.get(&driver.id).unwrap().bus_id, other.id);
        let snaps = snapshots(&state);
        let on_other = snaps.iter().find(|s| s.id == other.id).unwrap();
        assert_eq!(on_other.driver.as_ref().unwrap().phone, "555-0111");

        assert_eq!(
            update_driver(&state, "nobody", edit(&bus.id)),
            Err(FleetError::DriverNotFound("nobody".into()))
        );
        assert_eq!(
            update_driver(&state, &driver.id, edit("ghost")),
            Err(FleetError::BusNotFound("ghost".into()))
        );
        let mut blank = edit(&bus.id);
        blank.phone = " ".to_string();
        assert!(matches!(
            update_driver(&state, &driver.id, blank),
            Err(FleetError::Invalid(_))
        ));
        assert_eq!(state.drivers.get(&driver.id).unwrap().bus_id, other.id);
        assert_eq!(
            update_driver(&AppState::new(true), &driver.id, edit(&bus.id)),
            Err(FleetError::ReadOnly)
        );
    }

    #[test]
    fn test_location_never_outlives_a_concurrent_delete() {
        for _ in 0..200 {
            let (state, bus) = state_with_bus(40);
            std::thread::scope(|s| {
                s.spawn(|| {
                    while update_location(&state, update(&bus.id, 10)).is_ok() {}
                });
                s.spawn(|| {
                    std::thread::yield_now();
                    delete_bus(&state, &bus.id).unwrap();
                });
            });
            assert!(state.buses.is_empty());
            assert!(state.locations.is_empty());
        }
    }

    #[test]
    fn test_delete_driver() {
        let (state, bus) = state_with_bus(40);
        let driver = add_driver(
            &state,
            NewDriver {
                name: "Sam".to_string(),
                phone: "555-0100".to_string(),
                bus_id: bus.id.clone(),
            },
        )
        .unwrap();
        assert_eq!(delete_driver(&state, &driver.id), Ok(driver.clone()));
        assert_eq!(
            delete_driver(&state, &driver.id),
            Err(FleetError::DriverNotFound(driver.id.clone()))
        );
        assert_eq!(state.buses.len(), 1);
    }

    #[test]
    fn test_writes_bump_revision() {
        let (state, bus) = state_with_bus(40);
        let before = state.revision();
        update_location(&state, update(&bus.id, 10)).unwrap();
        assert_eq!(state.revision(), before + 1);
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let state = AppState::new(true);
        let err = add_bus(
            &state,
            NewBus {
                bus_number: "1".to_string(),
                route_name: "North".to_string(),
                capacity: 10,
            },
        );
        assert_eq!(err, Err(FleetError::ReadOnly));
        assert_eq!(delete_driver(&state, "x"), Err(FleetError::ReadOnly));
    }

    #[test]
    fn test_snapshots_join_and_order() {
        let state = AppState::new(false);
        let b2 = add_bus(
            &state,
            NewBus {
                bus_number: "B2".to_string(),
                route_name: "South".to_string(),
                capacity: 20,
            },
        )
        .unwrap();
        let b1 = add_bus(
            &state,
            NewBus {
                bus_number: "B1".to_string(),
                route_name: "North".to_string(),
                capacity: 40,
            },
        )
        .unwrap();
        update_location(&state, update(&b1.id, 30)).unwrap();
        add_driver(
            &state,
            NewDriver {
                name: "Ana".to_string(),
                phone: "555-0199".to_string(),
                bus_id: b2.id.clone(),
            },
        )
        .unwrap();

        let snaps = snapshots(&state);
        assert_eq!(snaps.len(), 2);
        assert_eq!(snaps[0].id, b1.id);
        assert_eq!(snaps[0].location.as_ref().unwrap().available_seats, 30);
        assert!(snaps[0].driver.is_none());
        assert_eq!(snaps[1].id, b2.id);
        assert!(snaps[1].location.is_none());
        assert_eq!(snaps[1].driver.as_ref().unwrap().name, "Ana");
    }
}
