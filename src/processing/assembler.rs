//! Builds emitted [`Fix`] records from solved positions

use super::store::RangeSnapshot;
use crate::algorithms::SolveError;
use crate::core::{round_fixed, Fix, MIN_ANCHORS_3D};
use crate::utils::AnchorLayout;
use nalgebra::Vector3;

#[derive(Debug, Clone, Default)]
pub struct FixAssembler;

impl FixAssembler {
    pub fn new() -> Self {
        Self
    }

    /// Round the solved point and attach the nearest anchor of `snapshot`.
    ///
    /// Ties on distance go to the first entry in snapshot order. An empty
    /// snapshot has no nearest anchor and is reported as too few anchors.
    pub fn assemble(
        &self,
        point: &Vector3<f64>,
        snapshot: &RangeSnapshot,
        layout: &AnchorLayout,
    ) -> Result<Fix, SolveError> {
        let closest = snapshot
            .entries
            .iter()
            .reduce(|best, entry| if entry.distance < best.distance { entry } else { best })
            .ok_or(SolveError::TooFewAnchors {
                available: 0,
                required: MIN_ANCHORS_3D,
            })?;

        let closest_address = layout
            .anchor(&closest.anchor_id)
            .and_then(|anchor| anchor.address.clone());

        Ok(Fix {
            tag_id: snapshot.tag_id.clone(),
            technology: snapshot.technology,
            x: round_fixed(point.x),
            y: round_fixed(point.y),
            z: round_fixed(point.z),
            closest_anchor: closest.anchor_id.clone(),
            closest_address,
            closest_distance: round_fixed(closest.distance),
        })
    }
}
