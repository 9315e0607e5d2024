//! Synthetic range generator
//!
//! Produces comma-form range reports for a fixed set of tags against every
//! configured anchor. One cycle covers every (technology, tag, anchor)
//! combination; between cycles the source reports no pending message.

use super::{TelemetryMessage, TelemetrySource, TransportResult};
use crate::core::Technology;
use crate::utils::AnchorLayout;
use nalgebra::Vector3;
use rand::distr::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{BTreeMap, VecDeque};

/// Tag with a known true position
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedTag {
    pub id: String,
    pub position: Vector3<f64>,
}

impl SimulatedTag {
    pub fn new(id: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        Self {
            id: id.into(),
            position: Vector3::new(x, y, z),
        }
    }
}

pub struct Simulator {
    layouts: BTreeMap<Technology, AnchorLayout>,
    tags: Vec<SimulatedTag>,
    noise: Option<Uniform<f64>>,
    rng: StdRng,
    pending: VecDeque<TelemetryMessage>,
    max_cycles: Option<usize>,
    cycles: usize,
    between_cycles: bool,
}

impl Simulator {
    pub fn new(layouts: BTreeMap<Technology, AnchorLayout>, tags: Vec<SimulatedTag>, seed: u64) -> Self {
        Self {
            layouts,
            tags,
            noise: None,
            rng: StdRng::seed_from_u64(seed),
            pending: VecDeque::new(),
            max_cycles: None,
            cycles: 0,
            between_cycles: false,
        }
    }

    /// Add uniform noise in `[-amplitude, amplitude]` to every distance
    pub fn with_noise(mut self, amplitude: f64) -> Self {
        self.noise = if amplitude > 0.0 {
            Uniform::new_inclusive(-amplitude, amplitude).ok()
        } else {
            None
        };
        self
    }

    /// Stop after this many cycles
    pub fn with_max_cycles(mut self, cycles: usize) -> Self {
        self.max_cycles = Some(cycles);
        self
    }

    /// The four demo tags of the reference installation
    pub fn default_tags() -> Vec<SimulatedTag> {
        vec![
            SimulatedTag::new("TAG1", 0.1, 0.2, 3.0),
            SimulatedTag::new("TAG2", 0.25, 0.42, 4.0),
            SimulatedTag::new("TAG3", 0.69, 0.42, 2.0),
            SimulatedTag::new("TAG4", 0.8, 0.7, 3.0),
        ]
    }

    pub fn tags(&self) -> &[SimulatedTag] {
        &self.tags
    }

    pub fn cycles(&self) -> usize {
        self.cycles
    }

    /// True once the cycle limit is reached and every message was delivered
    pub fn is_finished(&self) -> bool {
        self.pending.is_empty() && self.max_cycles.is_some_and(|max| self.cycles >= max)
    }

    fn generate_cycle(&mut self) {
        for (technology, layout) in &self.layouts {
            for tag in &self.tags {
                for anchor in &layout.anchors {
                    let mut distance = (tag.position - anchor.position).norm();
                    if let Some(noise) = &self.noise {
                        distance = (distance + noise.sample(&mut self.rng)).max(0.0);
                    }

                    let key = anchor.address.as_deref().unwrap_or(&anchor.id);
                    let payload = format!("{},{},{:.4}", key, tag.id, distance);
                    log::trace!("simulated {} {}", technology, payload);
                    self.pending.push_back(TelemetryMessage::new(layout.topic.clone(), payload));
                }
            }
        }
        self.cycles += 1;
    }
}

impl TelemetrySource for Simulator {
    fn poll_message(&mut self) -> TransportResult<Option<TelemetryMessage>> {
        if let Some(message) = self.pending.pop_front() {
            return Ok(Some(message));
        }
        if self.between_cycles {
            self.between_cycles = false;
            return Ok(None);
        }
        if self.is_finished() {
            return Ok(None);
        }

        self.generate_cycle();
        self.between_cycles = true;
        Ok(self.pending.pop_front())
    }

    fn is_connected(&self) -> bool {
        !self.is_finished()
    }

    fn source_id(&self) -> &str {
        "simulator"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::EngineConfig;

    fn drain_cycle(simulator: &mut Simulator) -> Vec<TelemetryMessage> {
        let mut messages = Vec::new();
        while let Some(message) = simulator.poll_message().unwrap() {
            messages.push(message);
        }
        messages
    }

    #[test]
    fn test_cycle_covers_every_anchor() {
        let mut simulator = Simulator::new(EngineConfig::default().layouts(), Simulator::default_tags(), 7);

        let cycle = drain_cycle(&mut simulator);
        assert_eq!(cycle.len(), 2 * 4 * 4);
        assert_eq!(simulator.cycles(), 1);
        assert!(cycle.iter().any(|m| m.topic == "ble"));
        assert!(cycle.iter().any(|m| m.topic == "wifi"));

        // TAG1 at (0.1, 0.2, 3) to BEACON1 at the origin
        assert_eq!(cycle[0].payload, b"AA:BB:CC:DD:EE:01,TAG1,3.0083".to_vec());

        assert_eq!(drain_cycle(&mut simulator).len(), 32);
        assert_eq!(simulator.cycles(), 2);
    }

    #[test]
    fn test_cycle_limit() {
        let mut simulator =
            Simulator::new(EngineConfig::default().layouts(), Simulator::default_tags(), 7).with_max_cycles(1);

        assert_eq!(drain_cycle(&mut simulator).len(), 32);
        assert!(simulator.is_finished());
        assert!(!simulator.is_connected());
        assert!(simulator.poll_message().unwrap().is_none());
    }

    #[test]
    fn test_seeded_noise_is_reproducible() {
        let make = || {
            Simulator::new(EngineConfig::default().layouts(), Simulator::default_tags(), 42).with_noise(0.05)
        };
        let payloads = |messages: &[TelemetryMessage]| messages.iter().map(|m| m.payload.clone()).collect::<Vec<_>>();

        let first = drain_cycle(&mut make());
        let second = drain_cycle(&mut make());
        assert_eq!(payloads(&first), payloads(&second));

        let exact = drain_cycle(&mut Simulator::new(
            EngineConfig::default().layouts(),
            Simulator::default_tags(),
            42,
        ));
        assert_ne!(payloads(&first), payloads(&exact));
    }
}
