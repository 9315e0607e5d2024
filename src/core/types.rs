//! Core data types for the positioning engine

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Independent ranging modality with its own anchor layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Technology {
    /// Short-range radio beacons
    Ble,
    /// Wireless-network access points (signal-strength ranging)
    Wifi,
}

impl Technology {
    pub const ALL: [Technology; 2] = [Technology::Ble, Technology::Wifi];

    pub fn as_str(&self) -> &'static str {
        match self {
            Technology::Ble => "ble",
            Technology::Wifi => "wifi",
        }
    }
}

impl fmt::Display for Technology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed anchor with a known position in the room frame
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorPosition {
    pub id: String,
    pub position: Vector3<f64>,
    /// Physical address (MAC) the anchor reports under, if any
    pub address: Option<String>,
}

impl AnchorPosition {
    pub fn new(id: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        Self {
            id: id.into(),
            position: Vector3::new(x, y, z),
            address: None,
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }
}

/// One decoded tag-to-anchor distance report
#[derive(Debug, Clone, PartialEq)]
pub struct RangeObservation {
    pub technology: Technology,
    pub anchor_id: String,
    pub tag_id: String,
    /// Distance in the unit of the anchor coordinates
    pub distance: f64,
    pub received_at: Instant,
}

impl RangeObservation {
    pub fn new(
        technology: Technology,
        anchor_id: impl Into<String>,
        tag_id: impl Into<String>,
        distance: f64,
    ) -> Self {
        Self {
            technology,
            anchor_id: anchor_id.into(),
            tag_id: tag_id.into(),
            distance,
            received_at: Instant::now(),
        }
    }

    pub fn received_at(mut self, instant: Instant) -> Self {
        self.received_at = instant;
        self
    }
}

/// Position estimate for one tag under one technology
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    pub tag_id: String,
    pub technology: Technology,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub closest_anchor: String,
    /// Address of the closest anchor when the anchor table carries one
    pub closest_address: Option<String>,
    pub closest_distance: f64,
}

impl Fix {
    pub fn position(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }
}
