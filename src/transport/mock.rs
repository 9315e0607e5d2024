//! Scripted in-memory source for testing

use super::{TelemetryMessage, TelemetrySource, TransportError, TransportResult};
use rand::Rng;
use std::collections::VecDeque;

/// Message source fed by the test itself
pub struct ScriptedSource {
    id: String,
    queue: VecDeque<TelemetryMessage>,
    connected: bool,
    error_probability: f32,
    delivered: usize,
    error_count: usize,
}

impl ScriptedSource {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            queue: VecDeque::new(),
            connected: true,
            error_probability: 0.0,
            delivered: 0,
            error_count: 0,
        }
    }

    /// Queue a message with the given topic and payload
    pub fn push(&mut self, topic: impl Into<String>, payload: impl Into<Vec<u8>>) {
        self.queue.push_back(TelemetryMessage::new(topic, payload));
    }

    pub fn push_message(&mut self, message: TelemetryMessage) {
        self.queue.push_back(message);
    }

    /// Fail reads with a malformed-frame error at the given rate (0.0 to 1.0)
    pub fn simulate_errors(&mut self, probability: f32) {
        self.error_probability = probability.clamp(0.0, 1.0);
    }

    pub fn disconnect(&mut self) {
        self.connected = false;
    }

    pub fn reconnect(&mut self) {
        self.connected = true;
    }

    pub fn queued_count(&self) -> usize {
        self.queue.len()
    }

    pub fn delivered_count(&self) -> usize {
        self.delivered
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    fn should_simulate_error(&self) -> bool {
        self.error_probability > 0.0 && rand::rng().random::<f32>() < self.error_probability
    }
}

impl TelemetrySource for ScriptedSource {
    fn poll_message(&mut self) -> TransportResult<Option<TelemetryMessage>> {
        if !self.connected {
            return Err(TransportError::ConnectionLost {
                source_id: self.id.clone(),
            });
        }

        if self.should_simulate_error() {
            self.error_count += 1;
            return Err(TransportError::MalformedFrame {
                line: self.delivered + self.error_count,
                reason: "simulated corruption".to_string(),
            });
        }

        let message = self.queue.pop_front();
        if message.is_some() {
            self.delivered += 1;
        }
        Ok(message)
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn source_id(&self) -> &str {
        &self.id
    }
}
