//! Collaborator-facing bridge facade
//!
//! [`BridgeService`] is the contract consumed by the HTTP layer (and any
//! other boundary layer): categorized snapshot queries, node listing,
//! health, and the guarded actuator command. Everything it returns is an
//! owned, serializable snapshot; absence is an empty map or list, never an
//! error.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::{CacheEntry, Category, NodeInfo, SensorCache};
use crate::error::Result;
use crate::protocol::CcmValue;
use crate::sender::{CcmSender, SendOptions};

/// One cached value shaped for API consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryView {
    pub ccm_type: String,
    pub value: CcmValue,
    pub room: u32,
    pub region: u32,
    pub priority: u32,
    pub level: String,
    pub source_ip: String,
    pub updated_at: DateTime<Utc>,
    pub data_age_seconds: f64,
}

impl EntryView {
    fn from_entry(ccm_type: &str, entry: &CacheEntry, now: DateTime<Utc>) -> Self {
        let age = (now - entry.updated_at).num_milliseconds() as f64 / 1000.0;
        Self {
            ccm_type: ccm_type.to_string(),
            value: entry.packet.value.clone(),
            room: entry.packet.room,
            region: entry.packet.region,
            priority: entry.packet.priority,
            level: entry.packet.level.clone(),
            source_ip: entry.packet.source_ip.clone(),
            updated_at: entry.updated_at,
            data_age_seconds: (age * 10.0).round() / 10.0,
        }
    }
}

/// Snapshot of one category for one house.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorySnapshot {
    pub house_id: String,
    pub category: Category,
    pub timestamp: DateTime<Utc>,
    pub entries: HashMap<String, EntryView>,
    pub count: usize,
}

/// One known node shaped for API consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeView {
    pub ip: String,
    pub last_seen: DateTime<Utc>,
    pub ccm_types: Vec<String>,
    pub node_type: Category,
}

impl From<NodeInfo> for NodeView {
    fn from(node: NodeInfo) -> Self {
        let node_type = node.node_type();
        Self {
            ip: node.ip,
            last_seen: node.last_seen,
            ccm_types: node.ccm_types.into_iter().collect(),
            node_type,
        }
    }
}

/// Snapshot of the node registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodesSnapshot {
    pub active_only: bool,
    pub timestamp: DateTime<Utc>,
    pub nodes: Vec<NodeView>,
    pub count: usize,
}

/// Liveness summary for the bridge process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthView {
    pub status: String,
    pub uptime_seconds: u64,
    pub cached_entries: usize,
    pub known_nodes: usize,
    pub timestamp: DateTime<Utc>,
}

/// Actuator command request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetActuatorRequest {
    /// Normalized actuator type (e.g. "Irri", "VenFan")
    pub actuator: String,
    /// true = ON/OPEN, false = OFF/CLOSE
    pub state: bool,
    #[serde(default = "default_priority")]
    pub priority: u32,
    #[serde(default = "default_house_id")]
    pub house_id: String,
    /// When set, the actuator is switched OFF again after this many seconds
    #[serde(default)]
    pub duration_seconds: Option<u64>,
}

fn default_priority() -> u32 {
    10
}

fn default_house_id() -> String {
    "h1".to_string()
}

/// Actuator command confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetActuatorResponse {
    pub status: String,
    pub message: String,
    pub actuator: String,
    pub state: bool,
    pub priority: u32,
    pub duration_seconds: Option<u64>,
}

/// Room number behind a house id ("hN" -> N); anything else is room 1.
fn room_from_house_id(house_id: &str) -> u32 {
    house_id
        .strip_prefix('h')
        .and_then(|n| n.parse().ok())
        .unwrap_or(1)
}

/// Service facade over the cache and the guarded sender.
///
/// Constructed once at startup and shared by reference; holds no state of
/// its own beyond the start time used for uptime reporting.
pub struct BridgeService {
    cache: Arc<SensorCache>,
    sender: CcmSender,
    node_timeout_secs: i64,
    started_at: Instant,
}

impl BridgeService {
    pub fn new(cache: Arc<SensorCache>, sender: CcmSender, node_timeout_secs: i64) -> Self {
        Self {
            cache,
            sender,
            node_timeout_secs,
            started_at: Instant::now(),
        }
    }

    async fn category_snapshot(&self, house_id: &str, category: Category) -> CategorySnapshot {
        let now = Utc::now();
        let entries: HashMap<String, EntryView> = self
            .cache
            .get_by_category(house_id, category)
            .await
            .iter()
            .map(|(ctype, entry)| (ctype.clone(), EntryView::from_entry(ctype, entry, now)))
            .collect();
        let count = entries.len();
        CategorySnapshot {
            house_id: house_id.to_string(),
            category,
            timestamp: now,
            entries,
            count,
        }
    }

    /// Latest indoor sensor values for a house.
    pub async fn get_sensors(&self, house_id: &str) -> CategorySnapshot {
        self.category_snapshot(house_id, Category::Sensor).await
    }

    /// Latest actuator states for a house.
    pub async fn get_actuators(&self, house_id: &str) -> CategorySnapshot {
        self.category_snapshot(house_id, Category::Actuator).await
    }

    /// Latest weather-station values for a house.
    pub async fn get_weather(&self, house_id: &str) -> CategorySnapshot {
        self.category_snapshot(house_id, Category::Weather).await
    }

    /// Known broadcasting nodes, optionally restricted to live ones.
    pub async fn list_nodes(&self, active_only: bool) -> NodesSnapshot {
        let nodes: Vec<NodeView> = self
            .cache
            .list_nodes(active_only, self.node_timeout_secs)
            .await
            .into_iter()
            .map(NodeView::from)
            .collect();
        let count = nodes.len();
        NodesSnapshot {
            active_only,
            timestamp: Utc::now(),
            nodes,
            count,
        }
    }

    /// Uptime and cache occupancy.
    pub async fn health(&self) -> HealthView {
        HealthView {
            status: "ok".to_string(),
            uptime_seconds: self.started_at.elapsed().as_secs(),
            cached_entries: self.cache.len().await,
            known_nodes: self.cache.node_count().await,
            timestamp: Utc::now(),
        }
    }

    /// Issue a guarded actuator command, optionally with auto-OFF.
    ///
    /// Validation failures (allowlist, rate limit, duration cap) come back
    /// as errors carrying a human-readable reason.
    pub async fn set_actuator(&self, request: SetActuatorRequest) -> Result<SetActuatorResponse> {
        let opts = SendOptions {
            room: room_from_house_id(&request.house_id),
            priority: request.priority,
            ..SendOptions::default()
        };
        let value = if request.state { 1.0 } else { 0.0 };

        let message = match request.duration_seconds {
            Some(duration) => {
                self.sender
                    .send_with_duration(&request.actuator, value, duration, &opts)
                    .await?
            }
            None => self.sender.send(&request.actuator, value, &opts).await?,
        };

        Ok(SetActuatorResponse {
            status: "ok".to_string(),
            message,
            actuator: request.actuator,
            state: request.state,
            priority: request.priority,
            duration_seconds: request.duration_seconds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn house_id_maps_to_room() {
        assert_eq!(room_from_house_id("h1"), 1);
        assert_eq!(room_from_house_id("h12"), 12);
        assert_eq!(room_from_house_id("greenhouse"), 1);
        assert_eq!(room_from_house_id(""), 1);
    }
}
