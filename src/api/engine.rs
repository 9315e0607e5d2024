//! Positioning engine: the single ingestion path
//!
//! Each message runs parse, validate, store, readiness, solve, assemble and
//! publish synchronously, in arrival order. The engine owns its sample store
//! outright; only the [`PositionPublisher`] crosses thread boundaries.

use super::sink::PositionPublisher;
use super::types::{EngineStats, IngestError, PumpSummary};
use crate::algorithms::{Multilaterator, SolveError};
use crate::core::{AnchorPosition, Fix, RangeObservation, Technology};
use crate::processing::{FixAssembler, MessageParser, RangeSampleStore, RangeSnapshot, Readiness, ReadinessEvaluator};
use crate::transport::{TelemetryMessage, TelemetrySource, TransportResult};
use crate::utils::{AnchorLayout, ConfigError, EngineConfig};
use crate::validation::DataValidator;
use nalgebra::Vector3;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;

/// What happened to one message or observation
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// Rejected before touching the store
    Dropped(IngestError),
    /// Stored; not enough anchors yet
    Pending { present: usize, required: usize },
    /// Stored and solved, but the solver gave no position
    SolveFailed(SolveError),
    /// A fix was published
    Fixed(Fix),
}

impl IngestOutcome {
    pub fn fix(&self) -> Option<&Fix> {
        match self {
            IngestOutcome::Fixed(fix) => Some(fix),
            _ => None,
        }
    }
}

/// Anchor entry of the beacon table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BeaconEntry {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub position: [f64; 3],
}

pub struct PositioningEngine {
    layouts: BTreeMap<Technology, AnchorLayout>,
    parser: MessageParser,
    validator: DataValidator,
    store: RangeSampleStore,
    readiness: ReadinessEvaluator,
    solver: Multilaterator,
    assembler: FixAssembler,
    publisher: PositionPublisher,
    stats: EngineStats,
}

impl PositioningEngine {
    /// Build an engine from a configuration; any configuration error is fatal
    pub fn new(config: &EngineConfig, publisher: PositionPublisher) -> Result<Self, ConfigError> {
        for warning in config.validate().into_result()? {
            log::warn!("{}", warning);
        }

        let layouts = config.layouts();
        let mut store = RangeSampleStore::new();
        for (technology, layout) in &layouts {
            let ids: Vec<String> = layout.anchor_ids().map(String::from).collect();
            store.register(*technology, &ids)?;
        }

        log::info!(
            "positioning engine ready: {} technologies, strategy {:?}",
            layouts.len(),
            config.solver.strategy
        );

        Ok(Self {
            parser: MessageParser::new(layouts.clone()),
            layouts,
            validator: DataValidator::new(config.validation.clone()),
            store,
            readiness: ReadinessEvaluator::new(config.max_sample_age()),
            solver: Multilaterator::new(&config.solver),
            assembler: FixAssembler::new(),
            publisher,
            stats: EngineStats::default(),
        })
    }

    /// Decode and ingest one raw telemetry message
    pub fn handle_message(&mut self, message: &TelemetryMessage) -> IngestOutcome {
        self.stats.messages_received += 1;

        match self.parser.parse(message) {
            Ok(observation) => self.ingest(observation),
            Err(err) => {
                log::debug!("dropped message on '{}': {}", message.topic, err);
                self.stats.observations_dropped += 1;
                IngestOutcome::Dropped(err.into())
            }
        }
    }

    /// Ingest one typed observation: store, check readiness, solve, publish
    pub fn ingest(&mut self, observation: RangeObservation) -> IngestOutcome {
        if let Err(err) = self.validator.validate(&observation) {
            log::debug!("dropped observation: {}", err);
            self.stats.observations_dropped += 1;
            return IngestOutcome::Dropped(err.into());
        }

        let technology = observation.technology;
        let layout = match self.layouts.get(&technology) {
            Some(layout) if self.store.record_observation(&observation) => layout,
            _ => {
                log::debug!("dropped observation for unknown anchor {}", observation.anchor_id);
                self.stats.observations_dropped += 1;
                return IngestOutcome::Dropped(IngestError::UnregisteredAnchor {
                    technology,
                    anchor_id: observation.anchor_id,
                });
            }
        };
        self.stats.observations_recorded += 1;

        let snapshot = match self
            .readiness
            .evaluate(&self.store, technology, &observation.tag_id, layout, Instant::now())
        {
            Readiness::Ready(snapshot) => snapshot,
            Readiness::NotReady { present, required } => return IngestOutcome::Pending { present, required },
        };

        let (anchors, distances) = solver_inputs(&snapshot, layout);
        self.stats.solve_attempts += 1;
        let solution = match self.solver.solve(&anchors, &distances) {
            Ok(solution) => solution,
            Err(err) => {
                log::warn!("{} solve failed for tag {}: {}", technology, snapshot.tag_id, err);
                self.stats.solve_failures += 1;
                return IngestOutcome::SolveFailed(err);
            }
        };

        let fix = match self.assembler.assemble(&solution.point, &snapshot, layout) {
            Ok(fix) => fix,
            Err(err) => {
                log::warn!("{} fix for tag {} not assembled: {}", technology, snapshot.tag_id, err);
                self.stats.solve_failures += 1;
                return IngestOutcome::SolveFailed(err);
            }
        };

        log::debug!(
            "{} fix for {}: ({}, {}, {}) via {:?}, rms {:.3}",
            technology,
            fix.tag_id,
            fix.x,
            fix.y,
            fix.z,
            solution.kind,
            solution.rms_residual
        );
        self.stats.fixes_emitted += 1;
        if !self.publisher.publish(fix.clone()) {
            self.stats.fixes_undelivered += 1;
        }
        IngestOutcome::Fixed(fix)
    }

    /// Feed every message currently available from `source`.
    ///
    /// Stops at the first `Ok(None)`. Malformed frames are skipped; any other
    /// transport error ends the pump and is returned.
    pub fn pump(&mut self, source: &mut dyn TelemetrySource) -> TransportResult<PumpSummary> {
        let mut summary = PumpSummary::default();
        loop {
            match source.poll_message() {
                Ok(Some(message)) => {
                    summary.messages += 1;
                    match self.handle_message(&message) {
                        IngestOutcome::Fixed(_) => summary.fixes += 1,
                        IngestOutcome::Dropped(_) => summary.dropped += 1,
                        _ => {}
                    }
                }
                Ok(None) => return Ok(summary),
                Err(err) if err.is_recoverable() => {
                    log::warn!("{}: {}", source.source_id(), err);
                    self.stats.transport_errors += 1;
                    summary.skipped_frames += 1;
                }
                Err(err) => {
                    self.stats.transport_errors += 1;
                    return Err(err);
                }
            }
        }
    }

    /// Configured anchors of one technology, in configured order
    pub fn anchor_positions(&self, technology: Technology) -> Option<&[AnchorPosition]> {
        self.layouts.get(&technology).map(|layout| layout.anchors.as_slice())
    }

    /// Static anchor table of every technology, for display
    pub fn beacon_table(&self) -> BTreeMap<Technology, Vec<BeaconEntry>> {
        self.layouts
            .iter()
            .map(|(technology, layout)| {
                let entries = layout
                    .anchors
                    .iter()
                    .map(|anchor| BeaconEntry {
                        id: anchor.id.clone(),
                        address: anchor.address.clone(),
                        position: [anchor.position.x, anchor.position.y, anchor.position.z],
                    })
                    .collect();
                (*technology, entries)
            })
            .collect()
    }

    pub fn snapshot(&self, technology: Technology, tag_id: &str) -> RangeSnapshot {
        self.store.snapshot(technology, tag_id)
    }

    pub fn layouts(&self) -> &BTreeMap<Technology, AnchorLayout> {
        &self.layouts
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }
}

/// Pair each snapshot entry with its anchor position
fn solver_inputs(snapshot: &RangeSnapshot, layout: &AnchorLayout) -> (Vec<Vector3<f64>>, Vec<f64>) {
    snapshot
        .entries
        .iter()
        .filter_map(|entry| {
            layout
                .anchor(&entry.anchor_id)
                .map(|anchor| (anchor.position, entry.distance))
        })
        .unzip()
}
