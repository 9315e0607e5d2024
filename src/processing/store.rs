//! Per-technology range sample store
//!
//! Holds the latest distance reported for every (anchor, tag) pair. Samples are
//! last-write-wins and never expire on their own; staleness is a readiness
//! concern.

use crate::core::{RangeObservation, Technology};
use crate::utils::ConfigError;
use std::collections::HashMap;
use std::time::Instant;

/// Latest distance for one (anchor, tag) pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeSample {
    pub distance: f64,
    pub received_at: Instant,
}

/// One anchor's entry in a snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotEntry {
    pub anchor_id: String,
    pub distance: f64,
    pub received_at: Instant,
}

/// Point-in-time copy of a tag's samples, in configured anchor order
#[derive(Debug, Clone, PartialEq)]
pub struct RangeSnapshot {
    pub technology: Technology,
    pub tag_id: String,
    pub entries: Vec<SnapshotEntry>,
}

impl RangeSnapshot {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, anchor_id: &str) -> bool {
        self.entries.iter().any(|e| e.anchor_id == anchor_id)
    }

    pub fn distance(&self, anchor_id: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| e.anchor_id == anchor_id)
            .map(|e| e.distance)
    }

    pub fn distances(&self) -> Vec<f64> {
        self.entries.iter().map(|e| e.distance).collect()
    }

    /// Drop entries older than `max_age` relative to `now`
    pub fn retain_fresh(&mut self, now: Instant, max_age: std::time::Duration) {
        self.entries
            .retain(|e| now.saturating_duration_since(e.received_at) <= max_age);
    }
}

#[derive(Debug, Default)]
struct TechnologyRanges {
    anchor_ids: Vec<String>,
    index: HashMap<String, usize>,
    /// `samples[i]` maps tag id to the latest sample from `anchor_ids[i]`
    samples: Vec<HashMap<String, RangeSample>>,
}

/// Owned store of the latest range samples, one table per technology
#[derive(Debug, Default)]
pub struct RangeSampleStore {
    ranges: HashMap<Technology, TechnologyRanges>,
}

impl RangeSampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the anchor set of a technology; order is kept for snapshots
    pub fn register(&mut self, technology: Technology, anchor_ids: &[String]) -> Result<(), ConfigError> {
        if self.ranges.contains_key(&technology) {
            return Err(ConfigError::InvalidParameter {
                parameter: "technology".to_string(),
                value: technology.to_string(),
                reason: "technology registered twice".to_string(),
            });
        }

        let mut ranges = TechnologyRanges::default();
        for (i, id) in anchor_ids.iter().enumerate() {
            if ranges.index.insert(id.clone(), i).is_some() {
                return Err(ConfigError::AnchorConflict {
                    technology,
                    anchor_id: id.clone(),
                    reason: "duplicate anchor id".to_string(),
                });
            }
            ranges.anchor_ids.push(id.clone());
            ranges.samples.push(HashMap::new());
        }

        self.ranges.insert(technology, ranges);
        Ok(())
    }

    pub fn is_registered(&self, technology: Technology) -> bool {
        self.ranges.contains_key(&technology)
    }

    /// Store or overwrite a sample received now
    pub fn record(&mut self, technology: Technology, anchor_id: &str, tag_id: &str, distance: f64) -> bool {
        self.record_at(technology, anchor_id, tag_id, distance, Instant::now())
    }

    /// Store or overwrite a sample; false when the anchor is not registered
    pub fn record_at(
        &mut self,
        technology: Technology,
        anchor_id: &str,
        tag_id: &str,
        distance: f64,
        received_at: Instant,
    ) -> bool {
        let Some(ranges) = self.ranges.get_mut(&technology) else {
            return false;
        };
        let Some(&slot) = ranges.index.get(anchor_id) else {
            return false;
        };

        ranges.samples[slot].insert(tag_id.to_string(), RangeSample { distance, received_at });
        true
    }

    pub fn record_observation(&mut self, observation: &RangeObservation) -> bool {
        self.record_at(
            observation.technology,
            &observation.anchor_id,
            &observation.tag_id,
            observation.distance,
            observation.received_at,
        )
    }

    pub fn sample(&self, technology: Technology, anchor_id: &str, tag_id: &str) -> Option<RangeSample> {
        let ranges = self.ranges.get(&technology)?;
        let slot = *ranges.index.get(anchor_id)?;
        ranges.samples[slot].get(tag_id).copied()
    }

    /// Copy of every sample held for `tag_id`, in registration order
    pub fn snapshot(&self, technology: Technology, tag_id: &str) -> RangeSnapshot {
        let entries = self
            .ranges
            .get(&technology)
            .map(|ranges| {
                ranges
                    .anchor_ids
                    .iter()
                    .zip(&ranges.samples)
                    .filter_map(|(anchor_id, by_tag)| {
                        by_tag.get(tag_id).map(|sample| SnapshotEntry {
                            anchor_id: anchor_id.clone(),
                            distance: sample.distance,
                            received_at: sample.received_at,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        RangeSnapshot {
            technology,
            tag_id: tag_id.to_string(),
            entries,
        }
    }

    /// Number of distinct tags with at least one sample
    pub fn tag_count(&self, technology: Technology) -> usize {
        self.ranges
            .get(&technology)
            .map(|ranges| {
                let mut tags: Vec<&String> = ranges.samples.iter().flat_map(|m| m.keys()).collect();
                tags.sort();
                tags.dedup();
                tags.len()
            })
            .unwrap_or(0)
    }
}
