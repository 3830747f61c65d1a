//! Seat availability tiers shared by the bus list and the map markers.

use serde::Serialize;

pub const AMPLE_COLOR: &str = "#22c55e";
pub const FILLING_COLOR: &str = "#f59e0b";
pub const CRITICAL_COLOR: &str = "#ef4444";
pub const UNKNOWN_COLOR: &str = "#9ca3af";

/// Ordered worst to best, so `Critical < Filling < Ample`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Critical,
    Filling,
    Ample,
}

impl Tier {
    pub fn label(self) -> &'static str {
        match self {
            Tier::Ample => "Available",
            Tier::Filling => "Filling Up",
            Tier::Critical => "Almost Full",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Tier::Ample => AMPLE_COLOR,
            Tier::Filling => FILLING_COLOR,
            Tier::Critical => CRITICAL_COLOR,
        }
    }

    /// Badge variant used by the list view.
    pub fn badge(self) -> &'static str {
        match self {
            Tier::Ample => "success",
            Tier::Filling => "warning",
            Tier::Critical => "destructive",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Availability {
    pub tier: Tier,
    pub label: &'static str,
    pub color: &'static str,
}

/// Classifies `available_seats` out of `capacity`.
///
/// Above 50% is ample, above 20% is filling, anything else is critical.
/// Both thresholds are strict, so exactly 50% is filling and exactly 20% is
/// critical. Seat counts outside `0..=capacity` still classify. A
/// non-positive capacity is the caller's problem: the percentage is then
/// infinite or NaN, which still lands in some tier instead of panicking.
pub fn classify(available_seats: i32, capacity: i32) -> Availability {
    // Scale before dividing so exact boundaries such as 8/40 stay exact.
    let percentage = available_seats as f64 * 100.0 / capacity as f64;
    let tier = if percentage > 50.0 {
        Tier::Ample
    } else if percentage > 20.0 {
        Tier::Filling
    } else {
        Tier::Critical
    };
    Availability {
        tier,
        label: tier.label(),
        color: tier.color(),
    }
}

/// Color for the raw seat count shown in a marker popup. This goes by
/// absolute seats, not by share of capacity.
pub fn seat_count_color(available_seats: i32) -> &'static str {
    if available_seats > 10 {
        AMPLE_COLOR
    } else if available_seats > 5 {
        FILLING_COLOR
    } else {
        CRITICAL_COLOR
    }
}
