//! # Simulated Reader
//!
//! In-process stand-in for the vendor service. It answers the same
//! commands with the same event sequence, paced by a configurable delay,
//! and produces random templates with correct hashes.

use std::collections::VecDeque;
use std::time::Duration;

use uuid::Uuid;

use crate::protocol::{template_hash, CaptureResult, Command, DeviceInfo, Event};

/// Identifier reported by the simulated reader.
pub const SIMULATED_DEVICE_ID: &str = "SIM-0001";

/// Scripted reader that turns commands into queued events.
#[derive(Debug)]
pub struct Simulator {
    pending: VecDeque<Event>,
    step_delay: Duration,
}

impl Simulator {
    /// Create a simulator that waits `step_delay` before each event.
    pub fn new(step_delay: Duration) -> Self {
        Self {
            pending: VecDeque::new(),
            step_delay,
        }
    }

    /// The single reader this simulator exposes.
    pub fn device() -> DeviceInfo {
        DeviceInfo {
            id: SIMULATED_DEVICE_ID.to_string(),
            name: "Simulated fingerprint reader".to_string(),
            model: Some("simulator".to_string()),
        }
    }

    /// React to a command by queueing the events the real service would send.
    pub fn handle(&mut self, command: &Command) {
        match command {
            Command::GetDevices => {
                self.pending.push_back(Event::DeviceConnected {
                    device: Self::device(),
                });
            }
            Command::CaptureFingerprint { .. } => {
                self.pending.clear();
                self.pending.push_back(Event::DeviceConnected {
                    device: Self::device(),
                });
                self.pending.push_back(Event::FingerDetected);
                self.pending.push_back(Event::Processing);
                self.pending
                    .push_back(Event::CaptureComplete(synthetic_capture()));
            }
            Command::CancelCapture => self.pending.clear(),
        }
    }

    /// Next queued event. Waits forever when nothing is queued, like an idle socket.
    pub async fn next_event(&mut self) -> Event {
        match self.pending.pop_front() {
            Some(event) => {
                if !self.step_delay.is_zero() {
                    tokio::time::sleep(self.step_delay).await;
                }
                event
            }
            None => std::future::pending().await,
        }
    }
}

fn synthetic_capture() -> CaptureResult {
    let template: String = (0..4).map(|_| Uuid::new_v4().simple().to_string()).collect();
    CaptureResult {
        hash: template_hash(&template),
        template,
        image: None,
        quality: Some(85),
        device_id: Some(SIMULATED_DEVICE_ID.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn capture_follows_reader_sequence() {
        let mut sim = Simulator::new(Duration::ZERO);
        sim.handle(&Command::CaptureFingerprint { timeout: None });

        assert!(matches!(sim.next_event().await, Event::DeviceConnected { .. }));
        assert_eq!(sim.next_event().await, Event::FingerDetected);
        assert_eq!(sim.next_event().await, Event::Processing);
        match sim.next_event().await {
            Event::CaptureComplete(result) => {
                assert!(result.verify());
                assert_eq!(result.template.len(), 128);
                assert_eq!(result.device_id.as_deref(), Some(SIMULATED_DEVICE_ID));
            }
            other => panic!("expected captureComplete, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancel_drops_pending_events() {
        let mut sim = Simulator::new(Duration::ZERO);
        sim.handle(&Command::CaptureFingerprint { timeout: None });
        sim.handle(&Command::CancelCapture);
        let idle = tokio::time::timeout(Duration::from_millis(50), sim.next_event()).await;
        assert!(idle.is_err(), "no events expected after cancel");
    }

    #[test]
    fn each_capture_has_a_fresh_template() {
        assert_ne!(synthetic_capture().template, synthetic_capture().template);
    }
}
