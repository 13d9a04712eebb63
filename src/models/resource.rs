//! Reservable resource model
//!
//! Resources (rooms, parking spaces) are owned by the facilities-management
//! side of the system; the core only references them by id and fails with
//! `UnknownResource` when an id is not registered.

use serde::{Deserialize, Serialize};

/// Kind of bookable resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceKind {
    Room,
    ParkingSpace,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ResourceKind::Room => "room",
            ResourceKind::ParkingSpace => "parking space",
        };
        write!(f, "{}", label)
    }
}

/// A bookable entity as published by the external facilities store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservableResource {
    /// Opaque identifier assigned by the facilities store
    pub id: String,
    pub kind: ResourceKind,
    /// Display name (building + room number, lot + space number)
    pub name: Option<String>,
    /// Seat capacity, for rooms
    pub capacity: Option<i32>,
    /// Vehicle-type restriction, for parking spaces
    pub vehicle_type: Option<String>,
}
