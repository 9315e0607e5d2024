//! Decoding of telemetry messages into typed range observations
//!
//! Two payload encodings are accepted:
//!
//! - colon form: the topic names an anchor (id or address) and the payload is
//!   `tag:distance`
//! - comma form: the topic names a technology and the payload is
//!   `anchor,tag,distance`, where the anchor is given by address or id

use crate::core::{RangeObservation, Technology};
use crate::transport::TelemetryMessage;
use crate::utils::AnchorLayout;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Errors that can occur during message parsing
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("payload on '{topic}' is not valid UTF-8")]
    NotUtf8 { topic: String },
    #[error("empty payload on '{topic}'")]
    EmptyPayload { topic: String },
    #[error("expected {expected} fields, got {actual} in '{payload}'")]
    FieldCount { expected: usize, actual: usize, payload: String },
    #[error("distance '{value}' is not a number")]
    InvalidDistance { value: String },
    #[error("no technology or anchor is routed on topic '{topic}'")]
    UnknownTopic { topic: String },
    #[error("anchor '{anchor}' is not configured for {technology}")]
    UnknownAnchor { technology: Technology, anchor: String },
    #[error("topic '{topic}' names an anchor in more than one technology")]
    AmbiguousTopic { topic: String },
}

/// Parser for converting raw telemetry into [`RangeObservation`]s
pub struct MessageParser {
    layouts: BTreeMap<Technology, AnchorLayout>,
    /// Technology topic -> technology (comma form)
    technology_topics: HashMap<String, Technology>,
    /// Anchor id or upper-cased address -> owning anchors (colon form)
    anchor_topics: HashMap<String, Vec<(Technology, String)>>,
}

impl MessageParser {
    pub fn new(layouts: BTreeMap<Technology, AnchorLayout>) -> Self {
        let mut technology_topics = HashMap::new();
        let mut anchor_topics: HashMap<String, Vec<(Technology, String)>> = HashMap::new();

        for (technology, layout) in &layouts {
            technology_topics.insert(layout.topic.clone(), *technology);

            for anchor in &layout.anchors {
                let keys = std::iter::once(anchor.id.clone())
                    .chain(anchor.address.as_ref().map(|a| a.to_ascii_uppercase()));
                for key in keys {
                    let owners = anchor_topics.entry(key).or_default();
                    let owner = (*technology, anchor.id.clone());
                    if !owners.contains(&owner) {
                        owners.push(owner);
                    }
                }
            }
        }

        Self {
            layouts,
            technology_topics,
            anchor_topics,
        }
    }

    /// Parse one message into an observation stamped with its receive time
    pub fn parse(&self, message: &TelemetryMessage) -> Result<RangeObservation, ParseError> {
        let topic = message.topic.trim();
        let payload = std::str::from_utf8(&message.payload).map_err(|_| ParseError::NotUtf8 {
            topic: topic.to_string(),
        })?;
        let payload = payload.trim();
        if payload.is_empty() {
            return Err(ParseError::EmptyPayload {
                topic: topic.to_string(),
            });
        }

        let observation = match self.technology_topics.get(topic) {
            Some(&technology) => self.parse_comma_form(technology, payload)?,
            None => self.parse_colon_form(topic, payload)?,
        };

        Ok(observation.received_at(message.received_at))
    }

    fn parse_comma_form(&self, technology: Technology, payload: &str) -> Result<RangeObservation, ParseError> {
        let fields: Vec<&str> = payload.split(',').map(str::trim).collect();
        if fields.len() != 3 {
            return Err(ParseError::FieldCount {
                expected: 3,
                actual: fields.len(),
                payload: payload.to_string(),
            });
        }

        let anchor = self
            .layouts
            .get(&technology)
            .and_then(|layout| layout.resolve(fields[0]))
            .ok_or_else(|| ParseError::UnknownAnchor {
                technology,
                anchor: fields[0].to_string(),
            })?;
        let distance = parse_distance(fields[2])?;

        Ok(RangeObservation::new(technology, anchor.id.clone(), fields[1], distance))
    }

    fn parse_colon_form(&self, topic: &str, payload: &str) -> Result<RangeObservation, ParseError> {
        let owners = self
            .anchor_topics
            .get(topic)
            .or_else(|| self.anchor_topics.get(&topic.to_ascii_uppercase()))
            .ok_or_else(|| ParseError::UnknownTopic {
                topic: topic.to_string(),
            })?;

        let (technology, anchor_id) = match owners.as_slice() {
            [single] => single,
            _ => {
                return Err(ParseError::AmbiguousTopic {
                    topic: topic.to_string(),
                })
            }
        };

        // Split on the last colon so MAC-style tag ids survive.
        let (tag, distance) = payload.rsplit_once(':').ok_or_else(|| ParseError::FieldCount {
            expected: 2,
            actual: 1,
            payload: payload.to_string(),
        })?;
        let distance = parse_distance(distance.trim())?;

        Ok(RangeObservation::new(*technology, anchor_id.clone(), tag.trim(), distance))
    }

    pub fn layouts(&self) -> &BTreeMap<Technology, AnchorLayout> {
        &self.layouts
    }
}

fn parse_distance(value: &str) -> Result<f64, ParseError> {
    value.parse::<f64>().map_err(|_| ParseError::InvalidDistance {
        value: value.to_string(),
    })
}
