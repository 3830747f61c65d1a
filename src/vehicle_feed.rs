use crate::availability::{Tier, classify};
use crate::types::BusSnapshot;
use chrono::{DateTime, Utc};
use gtfs_realtime::{
    FeedEntity, FeedHeader, FeedMessage, Position, TripDescriptor, VehicleDescriptor,
    VehiclePosition, feed_header::Incrementality, vehicle_position::OccupancyStatus,
};

pub fn occupancy_status(available_seats: i32, capacity: i32) -> OccupancyStatus {
    if available_seats <= 0 {
        return OccupancyStatus::Full;
    }
    match classify(available_seats, capacity).tier {
        Tier::Ample => OccupancyStatus::ManySeatsAvailable,
        Tier::Filling => OccupancyStatus::FewSeatsAvailable,
        Tier::Critical => OccupancyStatus::StandingRoomOnly,
    }
}

/// Share of seats taken, clamped to 0..=100.
pub fn occupancy_percentage(available_seats: i32, capacity: i32) -> u32 {
    if capacity <= 0 {
        return 0;
    }
    let occupied = (capacity - available_seats).clamp(0, capacity);
    (occupied as u64 * 100 / capacity as u64) as u32
}

/// VehiclePositions feed with one entity per bus that has a fix.
pub fn build_feed(snapshots: &[BusSnapshot], now: DateTime<Utc>) -> FeedMessage {
    let mut msg = FeedMessage::default();
    let mut header = FeedHeader::default();
    header.gtfs_realtime_version = "2.0".to_string();
    header.incrementality = Some(Incrementality::FullDataset as i32);
    header.timestamp = Some(now.timestamp() as u64);
    msg.header = header;

    for snapshot in snapshots {
        let Some(loc) = &snapshot.location else {
            continue;
        };
        if snapshot.capacity <= 0 {
            continue;
        }

        let mut vp = VehiclePosition::default();

        let mut position = Position::default();
        position.latitude = loc.latitude as f32;
        position.longitude = loc.longitude as f32;
        vp.position = Some(position);
        vp.timestamp = Some(loc.updated_at.timestamp() as u64);

        let mut vehicle = VehicleDescriptor::default();
        vehicle.id = Some(snapshot.id.to_string());
        vehicle.label = Some(snapshot.bus_number.clone());
        vp.vehicle = Some(vehicle);

        let mut trip = TripDescriptor::default();
        trip.route_id = Some(snapshot.route_name.clone());
        vp.trip = Some(trip);

        vp.occupancy_status =
            Some(occupancy_status(loc.available_seats, snapshot.capacity) as i32);
        vp.occupancy_percentage = Some(occupancy_percentage(
            loc.available_seats,
            snapshot.capacity,
        ));

        let mut fe = FeedEntity::default();
        fe.id = snapshot.id.to_string();
        fe.vehicle = Some(vp);
        msg.entity.push(fe);
    }

    msg
}
