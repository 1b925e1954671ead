//! Safety-guarded CCM actuator command sender
//!
//! Sends UECS-CCM control packets via UDP multicast (TTL 1, so commands
//! never leave the local segment) behind three guardrails:
//!
//! - allowlisted actuator types only
//! - minimum interval between sends, checked atomically under one lock
//! - capped auto-OFF duration for irrigation-class actuators
//!
//! Auto-OFF timers are keyed by (room, type); scheduling a new one
//! cancel-replaces any prior timer for the same key under the sender lock,
//! so a superseded timer can never fire its delayed send.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::error::{CcmError, Result};
use crate::protocol::{
    build_ccm_xml, detect_local_ip, ControlParams, MULTICAST_ADDR, MULTICAST_PORT,
};

/// Safety guardrails for actuator control, immutable after construction.
#[derive(Debug, Clone)]
pub struct SafetyLimits {
    /// Normalized actuator types eligible for outbound control
    pub allowed_actuators: HashSet<String>,
    /// Minimum interval between successful sends
    pub min_send_interval: Duration,
    /// Maximum auto-OFF duration for irrigation-class actuators
    pub max_irrigation_duration: Duration,
}

impl Default for SafetyLimits {
    fn default() -> Self {
        let allowed = [
            // ON/OFF switch actuators
            "Irri",        // irrigation valve
            "VenFan",      // ventilation fan
            "CirHoriFan",  // circulation fan
            "AirHeatBurn", // burner heater
            "AirHeatHP",   // heat pump
            "CO2Burn",     // CO2 generator
            // Position-controlled actuators (0-100%)
            "VenRfWin",  // roof window
            "VenSdWin",  // side window
            "ThCrtn",    // thermal curtain
            "LsCrtn",    // shading curtain
            "AirCoolHP", // cooling heat pump
            "AirHumFog", // humidifying fog
        ];
        Self {
            allowed_actuators: allowed.iter().map(|s| s.to_string()).collect(),
            min_send_interval: Duration::from_secs(1),
            max_irrigation_duration: Duration::from_secs(3600),
        }
    }
}

/// Outbound transmission seam, mockable in tests.
pub trait PacketTransport: Send + Sync {
    fn transmit(&self, payload: &[u8]) -> Result<()>;
}

/// Production transport: one datagram per command, multicast TTL 1.
#[derive(Debug, Default)]
pub struct MulticastTransport;

impl PacketTransport for MulticastTransport {
    fn transmit(&self, payload: &[u8]) -> Result<()> {
        let socket = std::net::UdpSocket::bind("0.0.0.0:0")?;
        socket.set_multicast_ttl_v4(1)?;
        socket.send_to(payload, (MULTICAST_ADDR, MULTICAST_PORT))?;
        Ok(())
    }
}

/// Per-command attributes with control-packet defaults.
#[derive(Debug, Clone)]
pub struct SendOptions {
    pub room: u32,
    pub region: u32,
    pub order: u32,
    pub priority: u32,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            room: 1,
            region: 1,
            order: 1,
            priority: 10,
        }
    }
}

/// Rate-limit clock and pending auto-OFF handles, one lock domain.
struct SenderState {
    last_send: Option<Instant>,
    off_timers: HashMap<(u32, String), JoinHandle<()>>,
}

struct SenderInner {
    limits: SafetyLimits,
    local_ip: String,
    transport: Box<dyn PacketTransport>,
    state: Mutex<SenderState>,
}

/// Guarded CCM control-packet sender. Cheap to clone; clones share the
/// rate-limit clock and timer map.
#[derive(Clone)]
pub struct CcmSender {
    inner: Arc<SenderInner>,
}

impl CcmSender {
    pub fn new(limits: SafetyLimits) -> Self {
        Self::with_transport(limits, Box::new(MulticastTransport))
    }

    /// Construct with a custom transport (used by tests).
    pub fn with_transport(limits: SafetyLimits, transport: Box<dyn PacketTransport>) -> Self {
        Self {
            inner: Arc::new(SenderInner {
                limits,
                local_ip: detect_local_ip(),
                transport,
                state: Mutex::new(SenderState {
                    last_send: None,
                    off_timers: HashMap::new(),
                }),
            }),
        }
    }

    pub fn limits(&self) -> &SafetyLimits {
        &self.inner.limits
    }

    /// Send a control packet.
    ///
    /// Fails with a validation error when the type is not allowlisted
    /// (message enumerates the allowed set) or when the minimum send
    /// interval has not elapsed (message states elapsed vs required).
    pub async fn send(&self, ccm_type: &str, value: f64, opts: &SendOptions) -> Result<String> {
        let mut state = self.inner.state.lock().await;
        self.send_locked(&mut state, ccm_type, value, opts)
    }

    /// Validation, transmit, and clock update under the caller-held lock,
    /// keeping the rate-limit check-and-act atomic.
    fn send_locked(
        &self,
        state: &mut SenderState,
        ccm_type: &str,
        value: f64,
        opts: &SendOptions,
    ) -> Result<String> {
        if !self.inner.limits.allowed_actuators.contains(ccm_type) {
            let mut allowed: Vec<&str> = self
                .inner
                .limits
                .allowed_actuators
                .iter()
                .map(String::as_str)
                .collect();
            allowed.sort_unstable();
            return Err(CcmError::invalid_input(format!(
                "actuator '{ccm_type}' not in allowed list: {allowed:?}"
            )));
        }

        if let Some(last) = state.last_send {
            let elapsed = last.elapsed();
            if elapsed < self.inner.limits.min_send_interval {
                return Err(CcmError::rate_limit(format!(
                    "{:.1}s since last send, minimum is {}s",
                    elapsed.as_secs_f64(),
                    self.inner.limits.min_send_interval.as_secs_f64()
                )));
            }
        }

        let params = ControlParams {
            room: opts.room,
            region: opts.region,
            order: opts.order,
            priority: opts.priority,
            ..ControlParams::default()
        };
        let payload = build_ccm_xml(ccm_type, value, &params, Some(&self.inner.local_ip));
        self.inner.transport.transmit(&payload)?;
        state.last_send = Some(Instant::now());

        let state_str = if value != 0.0 { "ON" } else { "OFF" };
        let msg = format!(
            "Sent {ccm_type}={state_str} (priority={}, room={})",
            opts.priority, opts.room
        );
        info!("{msg}");
        Ok(msg)
    }

    /// Send a command and, for truthy values, schedule an auto-OFF send
    /// after `duration_seconds`.
    ///
    /// Irrigation-class types (name containing `Irri`) are rejected before
    /// any transmission when the duration exceeds the configured cap. Any
    /// pending timer for the same (room, type) key is cancelled first; a
    /// cancelled timer never sends.
    pub async fn send_with_duration(
        &self,
        ccm_type: &str,
        value: f64,
        duration_seconds: u64,
        opts: &SendOptions,
    ) -> Result<String> {
        if ccm_type.contains("Irri")
            && Duration::from_secs(duration_seconds) > self.inner.limits.max_irrigation_duration
        {
            return Err(CcmError::invalid_input(format!(
                "irrigation duration {duration_seconds}s exceeds max {}s",
                self.inner.limits.max_irrigation_duration.as_secs()
            )));
        }

        let key = (opts.room, ccm_type.to_string());
        let mut state = self.inner.state.lock().await;

        if let Some(existing) = state.off_timers.remove(&key) {
            existing.abort();
        }

        let mut msg = self.send_locked(&mut state, ccm_type, value, opts)?;

        if value != 0.0 {
            let sender = self.clone();
            let off_type = ccm_type.to_string();
            let off_opts = opts.clone();
            let handle = tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(duration_seconds)).await;
                match sender.send(&off_type, 0.0, &off_opts).await {
                    Ok(_) => info!("auto-OFF: {off_type} after {duration_seconds}s"),
                    Err(e) => warn!("auto-OFF send failed for {off_type}: {e}"),
                }
            });
            state.off_timers.insert(key, handle);
            msg.push_str(&format!(" (auto-OFF in {duration_seconds}s)"));
        }

        Ok(msg)
    }

    /// Abort every pending auto-OFF timer. Called on shutdown so no timer
    /// outlives the service.
    pub async fn cancel_all_timers(&self) {
        let mut state = self.inner.state.lock().await;
        for (_, handle) in state.off_timers.drain() {
            handle.abort();
        }
    }
}
