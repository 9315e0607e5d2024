//! Decides when a tag has enough anchor coverage to attempt a solve

use super::store::{RangeSampleStore, RangeSnapshot};
use crate::core::Technology;
use crate::utils::AnchorLayout;
use std::time::{Duration, Instant};

/// Outcome of a readiness check
#[derive(Debug, Clone, PartialEq)]
pub enum Readiness {
    /// Snapshot to hand to the solver
    Ready(RangeSnapshot),
    NotReady { present: usize, required: usize },
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Readiness::Ready(_))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReadinessEvaluator {
    /// Ignore samples older than this; `None` keeps stale samples usable
    pub max_sample_age: Option<Duration>,
}

impl ReadinessEvaluator {
    pub fn new(max_sample_age: Option<Duration>) -> Self {
        Self { max_sample_age }
    }

    /// Check coverage of `tag_id` against the layout of `technology`.
    ///
    /// With full coverage required the snapshot key set must equal the
    /// configured anchor set; otherwise at least `required_anchors` configured
    /// anchors must be present.
    pub fn evaluate(
        &self,
        store: &RangeSampleStore,
        technology: Technology,
        tag_id: &str,
        layout: &AnchorLayout,
        now: Instant,
    ) -> Readiness {
        let mut snapshot = store.snapshot(technology, tag_id);
        if let Some(max_age) = self.max_sample_age {
            snapshot.retain_fresh(now, max_age);
        }

        let present = layout.anchor_ids().filter(|id| snapshot.contains(id)).count();
        let required = layout.required_anchors;

        let ready = if layout.requires_full_coverage() {
            snapshot.len() == layout.len() && present == layout.len()
        } else {
            present >= required
        };

        if ready {
            Readiness::Ready(snapshot)
        } else {
            log::debug!(
                "{} tag {} not ready: {}/{} anchors",
                technology,
                tag_id,
                present,
                required
            );
            Readiness::NotReady { present, required }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AnchorPosition;

    fn layout(required: usize) -> AnchorLayout {
        AnchorLayout {
            technology: Technology::Ble,
            topic: "ble".to_string(),
            anchors: vec![
                AnchorPosition::new("A", 0.0, 0.0, 0.0),
                AnchorPosition::new("B", 5.0, 0.0, 0.0),
                AnchorPosition::new("C", 0.0, 5.0, 0.0),
                AnchorPosition::new("D", 2.5, 2.5, 3.0),
            ],
            required_anchors: required,
        }
    }

    fn store_for(layout: &AnchorLayout) -> RangeSampleStore {
        let mut store = RangeSampleStore::new();
        let ids: Vec<String> = layout.anchor_ids().map(String::from).collect();
        store.register(layout.technology, &ids).unwrap();
        store
    }

    #[test]
    fn test_full_coverage_required() {
        let layout = layout(4);
        let mut store = store_for(&layout);
        let evaluator = ReadinessEvaluator::default();

        for (anchor, d) in [("A", 1.0), ("B", 2.0), ("C", 3.0)] {
            store.record(Technology::Ble, anchor, "T1", d);
            let readiness = evaluator.evaluate(&store, Technology::Ble, "T1", &layout, Instant::now());
            assert!(!readiness.is_ready());
        }
        assert_eq!(
            evaluator.evaluate(&store, Technology::Ble, "T1", &layout, Instant::now()),
            Readiness::NotReady { present: 3, required: 4 }
        );

        store.record(Technology::Ble, "D", "T1", 4.0);
        match evaluator.evaluate(&store, Technology::Ble, "T1", &layout, Instant::now()) {
            Readiness::Ready(snapshot) => assert_eq!(snapshot.distances(), vec![1.0, 2.0, 3.0, 4.0]),
            other => panic!("expected ready, got {other:?}"),
        }
    }

    #[test]
    fn test_partial_coverage_when_configured() {
        let layout = layout(3);
        let mut store = store_for(&layout);
        let evaluator = ReadinessEvaluator::default();

        store.record(Technology::Ble, "A", "T1", 1.0);
        store.record(Technology::Ble, "D", "T1", 2.0);
        assert!(!evaluator
            .evaluate(&store, Technology::Ble, "T1", &layout, Instant::now())
            .is_ready());

        store.record(Technology::Ble, "B", "T1", 3.0);
        assert!(evaluator
            .evaluate(&store, Technology::Ble, "T1", &layout, Instant::now())
            .is_ready());
    }

    #[test]
    fn test_stale_samples_filtered() {
        let layout = layout(4);
        let mut store = store_for(&layout);
        let now = Instant::now();
        let Some(old) = now.checked_sub(Duration::from_secs(30)) else {
            return;
        };

        store.record_at(Technology::Ble, "A", "T1", 1.0, old);
        for anchor in ["B", "C", "D"] {
            store.record_at(Technology::Ble, anchor, "T1", 1.0, now);
        }

        // Stale samples stay usable by default.
        assert!(ReadinessEvaluator::default()
            .evaluate(&store, Technology::Ble, "T1", &layout, now)
            .is_ready());

        let strict = ReadinessEvaluator::new(Some(Duration::from_secs(5)));
        assert_eq!(
            strict.evaluate(&store, Technology::Ble, "T1", &layout, now),
            Readiness::NotReady { present: 3, required: 4 }
        );
    }
}
