//! Latest merged position per tag, as served to display clients

use super::sink::PositionDrain;
use crate::core::{Fix, Technology};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One tag's row: coordinates of the newest fix plus the nearest anchor of each technology
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedPosition {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub closest_ble_mac: String,
    pub closest_ble_distance: f64,
    pub closest_wifi_mac: String,
    pub closest_wifi_distance: f64,
}

impl MergedPosition {
    fn empty(id: &str) -> Self {
        Self {
            id: id.to_string(),
            x: 0.0,
            y: 0.0,
            z: 0.0,
            closest_ble_mac: String::new(),
            closest_ble_distance: 0.0,
            closest_wifi_mac: String::new(),
            closest_wifi_distance: 0.0,
        }
    }
}

#[derive(Debug, Default)]
pub struct PositionBoard {
    positions: BTreeMap<String, MergedPosition>,
}

impl PositionBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one fix into its tag's row
    pub fn update(&mut self, fix: &Fix) {
        let entry = self
            .positions
            .entry(fix.tag_id.clone())
            .or_insert_with(|| MergedPosition::empty(&fix.tag_id));

        entry.x = fix.x;
        entry.y = fix.y;
        entry.z = fix.z;

        // Address when the anchor has one, otherwise its id.
        let anchor = fix.closest_address.clone().unwrap_or_else(|| fix.closest_anchor.clone());
        match fix.technology {
            Technology::Ble => {
                entry.closest_ble_mac = anchor;
                entry.closest_ble_distance = fix.closest_distance;
            }
            Technology::Wifi => {
                entry.closest_wifi_mac = anchor;
                entry.closest_wifi_distance = fix.closest_distance;
            }
        }
    }

    /// Pull every queued fix from `drain`; returns how many were merged
    pub fn absorb(&mut self, drain: &PositionDrain) -> usize {
        let fixes = drain.drain();
        for fix in &fixes {
            self.update(fix);
        }
        fixes.len()
    }

    pub fn get(&self, tag_id: &str) -> Option<&MergedPosition> {
        self.positions.get(tag_id)
    }

    /// Rows ordered by tag id
    pub fn positions(&self) -> Vec<MergedPosition> {
        self.positions.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
