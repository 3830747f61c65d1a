use crate::state::{AppState, FleetTables};
use crate::vehicle_feed::build_feed;
use crate::fleet::snapshots;

use anyhow::{Context, Result};
use prost::Message;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::info;

const FLEET_FILE: &str = "fleet.bin";
const POSITIONS_FILE: &str = "vehicle_positions.pb";

pub fn save_state(state: &AppState, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating data dir {}", dir.display()))?;

    // 1. Fleet tables (Bincode)
    let tables = state.tables();
    write_atomic(dir, FLEET_FILE, |f| Ok(bincode::serialize_into(f, &tables)?))?;

    // 2. Last published vehicle positions (Protobuf), for offline inspection
    let feed = build_feed(&snapshots(state), chrono::Utc::now());
    let buf = feed.encode_to_vec();
    write_atomic(dir, POSITIONS_FILE, |f| Ok(f.write_all(&buf)?))?;

    Ok(())
}

/// Writes beside the target then renames over it, so readers see either the
/// previous file or the complete new one.
fn write_atomic<F>(dir: &Path, name: &str, write: F) -> Result<()>
where
    F: FnOnce(&mut NamedTempFile) -> Result<()>,
{
    let mut tmp = NamedTempFile::new_in(dir)?;
    write(&mut tmp)?;
    tmp.flush()?;
    tmp.persist(dir.join(name))
        .map_err(|e| e.error)
        .with_context(|| format!("replacing {}", name))?;
    Ok(())
}

/// Restores fleet tables saved by `save_state`. A missing file is not an error.
pub fn load_state(state: &AppState, dir: &Path) -> Result<()> {
    let path = dir.join(FLEET_FILE);
    if !path.exists() {
        return Ok(());
    }

    let f = File::open(&path).with_context(|| format!("opening {}", path.display()))?;
    let tables: FleetTables =
        bincode::deserialize_from(f).with_context(|| format!("decoding {}", path.display()))?;
    info!(
        buses = tables.buses.len(),
        drivers = tables.drivers.len(),
        locations = tables.locations.len(),
        "loaded fleet from disk"
    );
    state.replace_tables(tables);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::{LocationUpdate, NewBus, NewDriver, add_bus, add_driver, update_location};

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(false);
        let bus = add_bus(
            &state,
            NewBus {
                bus_number: "12".to_string(),
                route_name: "Campus Loop".to_string(),
                capacity: 40,
            },
        )
        .unwrap();
        add_driver(
            &state,
            NewDriver {
                name: "Sam".to_string(),
                phone: "555-0100".to_string(),
                bus_id: bus.id.clone(),
            },
        )
        .unwrap();
        let loc = update_location(
            &state,
            LocationUpdate {
                bus_id: bus.id.clone(),
                latitude: 40.758,
                longitude: -73.9855,
                available_seats: 12,
            },
        )
        .unwrap();

        save_state(&state, dir.path()).unwrap();
        let positions = std::fs::read(dir.path().join(POSITIONS_FILE)).unwrap();
        let feed = gtfs_realtime::FeedMessage::decode(positions.as_slice()).unwrap();
        assert_eq!(feed.entity.len(), 1);
        // Only the two targets remain; no temp files are left behind.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);

        let restored = AppState::new(false);
        load_state(&restored, dir.path()).unwrap();
        assert_eq!(restored.buses.get(&bus.id).unwrap().clone(), bus);
        assert_eq!(restored.locations.get(&bus.id).unwrap().clone(), loc);
        assert_eq!(restored.drivers.len(), 1);
        assert!(restored.revision() > 0);
    }

    #[test]
    fn test_load_without_file_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(false);
        load_state(&state, dir.path()).unwrap();
        assert!(state.buses.is_empty());
        assert_eq!(state.revision(), 0);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(FLEET_FILE), b"\xff\xff\xff\xff\xff\xff\xff\xff\xff").unwrap();
        let state = AppState::new(false);
        assert!(load_state(&state, dir.path()).is_err());
    }
}
