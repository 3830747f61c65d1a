use crate::availability::classify;
use crate::types::BusSnapshot;
use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Badge {
    pub label: &'static str,
    pub variant: &'static str,
    pub color: &'static str,
}

/// One card of the "Active Buses" list.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BusListEntry {
    pub id: CompactString,
    pub bus_number: String,
    pub route_name: String,
    pub capacity: i32,
    pub badge: Option<Badge>,
    /// "25 / 40", or `None` when the bus has no location yet.
    pub seats: Option<String>,
    /// Four decimals, "40.7580, -73.9855".
    pub coordinates: Option<String>,
    /// "Updated 3 minutes ago".
    pub updated: Option<String>,
    pub driver: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct BusList {
    pub count: usize,
    pub buses: Vec<BusListEntry>,
}

pub fn build(snapshots: &[BusSnapshot], now: DateTime<Utc>) -> BusList {
    let buses: Vec<BusListEntry> = snapshots.iter().map(|s| entry(s, now)).collect();
    BusList {
        count: buses.len(),
        buses,
    }
}

fn entry(snapshot: &BusSnapshot, now: DateTime<Utc>) -> BusListEntry {
    let loc = snapshot.location.as_ref();
    BusListEntry {
        id: snapshot.id.clone(),
        bus_number: snapshot.bus_number.clone(),
        route_name: snapshot.route_name.clone(),
        capacity: snapshot.capacity,
        badge: loc.map(|l| {
            let availability = classify(l.available_seats, snapshot.capacity);
            Badge {
                label: availability.label,
                variant: availability.tier.badge(),
                color: availability.color,
            }
        }),
        seats: loc.map(|l| format!("{} / {}", l.available_seats, snapshot.capacity)),
        coordinates: loc.map(|l| format!("{:.4}, {:.4}", l.latitude, l.longitude)),
        updated: loc.map(|l| format!("Updated {}", time_ago(l.updated_at, now))),
        driver: snapshot.driver.as_ref().map(|d| d.name.clone()),
    }
}

/// Human distance between `then` and `now`, e.g. "5 minutes ago" or
/// "about 2 hours ago". Future timestamps read as "in ...".
pub fn time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = now.signed_duration_since(then);
    let secs = delta.num_seconds();
    let text = distance(secs.unsigned_abs());
    if secs < 0 {
        format!("in {}", text)
    } else {
        format!("{} ago", text)
    }
}

fn distance(secs: u64) -> String {
    const MINUTE: u64 = 60;
    const HOUR: u64 = 60 * MINUTE;
    const DAY: u64 = 24 * HOUR;
    const MONTH: u64 = 30 * DAY;
    const YEAR: u64 = 365 * DAY;

    // Round to the nearest minute before bucketing.
    let minutes = (secs + 30) / MINUTE;
    if minutes == 0 {
        return "less than a minute".to_string();
    }
    if minutes == 1 {
        return "1 minute".to_string();
    }
    if minutes < 45 {
        return format!("{} minutes", minutes);
    }
    if minutes < 90 {
        return "about 1 hour".to_string();
    }
    if secs < DAY - 30 {
        return format!("about {} hours", (secs + HOUR / 2) / HOUR);
    }
    if secs < 42 * HOUR - 30 {
        return "1 day".to_string();
    }
    if secs < MONTH {
        return format!("{} days", (secs + DAY / 2) / DAY);
    }
    if secs < YEAR {
        let months = ((secs + MONTH / 2) / MONTH).max(1);
        return if months == 1 {
            "about 1 month".to_string()
        } else {
            format!("{} months", months)
        };
    }
    let years = secs / YEAR;
    if years == 1 {
        "about 1 year".to_string()
    } else {
        format!("about {} years", years)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SnapshotDriver, SnapshotLocation};
    use chrono::Duration;

    #[test]
    fn test_entry_with_location() {
        let now = Utc::now();
        let snap = BusSnapshot {
            id: "a".into(),
            bus_number: "12".to_string(),
            route_name: "Campus Loop".to_string(),
            capacity: 40,
            location: Some(SnapshotLocation {
                latitude: 40.758,
                longitude: -73.9855,
                available_seats: 25,
                updated_at: now - Duration::minutes(3),
            }),
            driver: Some(SnapshotDriver {
                name: "Sam".to_string(),
                phone: "555-0100".to_string(),
            }),
        };
        let list = build(&[snap], now);
        assert_eq!(list.count, 1);
        let e = &list.buses[0];
        assert_eq!(
            e.badge,
            Some(Badge {
                label: "Available",
                variant: "success",
                color: "#22c55e",
            })
        );
        assert_eq!(e.seats.as_deref(), Some("25 / 40"));
        assert_eq!(e.coordinates.as_deref(), Some("40.7580, -73.9855"));
        assert_eq!(e.updated.as_deref(), Some("Updated 3 minutes ago"));
        assert_eq!(e.driver.as_deref(), Some("Sam"));
    }

    #[test]
    fn test_entry_without_location_has_no_badge() {
        let snap = BusSnapshot {
            id: "b".into(),
            bus_number: "7".to_string(),
            route_name: "North".to_string(),
            capacity: 30,
            location: None,
            driver: None,
        };
        let list = build(&[snap], Utc::now());
        let e = &list.buses[0];
        assert!(e.badge.is_none());
        assert!(e.seats.is_none());
        assert!(e.updated.is_none());
    }

    #[test]
    fn test_time_ago_buckets() {
        let now = Utc::now();
        let ago = |d: Duration| time_ago(now - d, now);
        assert_eq!(ago(Duration::seconds(10)), "less than a minute ago");
        assert_eq!(ago(Duration::seconds(40)), "1 minute ago");
        assert_eq!(ago(Duration::minutes(12)), "12 minutes ago");
        assert_eq!(ago(Duration::minutes(50)), "about 1 hour ago");
        assert_eq!(ago(Duration::hours(5)), "about 5 hours ago");
        assert_eq!(ago(Duration::hours(30)), "1 day ago");
        assert_eq!(ago(Duration::days(4)), "4 days ago");
        assert_eq!(ago(Duration::days(70)), "2 months ago");
        assert_eq!(ago(Duration::days(800)), "about 2 years ago");
        assert_eq!(time_ago(now + Duration::minutes(5), now), "in 5 minutes");
    }
}
