//! Shared test fixtures

// Each test binary compiles this module separately and uses a subset.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use uecs_ccm_bridge::error::Result;
use uecs_ccm_bridge::protocol::{CcmPacket, CcmValue};
use uecs_ccm_bridge::sender::PacketTransport;

/// Transport that records every payload instead of touching the network.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn sent_as_text(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|p| String::from_utf8_lossy(p).into_owned())
            .collect()
    }
}

impl PacketTransport for RecordingTransport {
    fn transmit(&self, payload: &[u8]) -> Result<()> {
        self.sent.lock().unwrap().push(payload.to_vec());
        Ok(())
    }
}

/// Packet with sensible telemetry defaults for cache tests.
pub fn make_packet(ccm_type: &str, value: f64, room: u32) -> CcmPacket {
    let mut packet = CcmPacket::new(ccm_type, CcmValue::Number(value));
    packet.room = room;
    packet.source_ip = "192.168.1.70".to_string();
    packet
}
