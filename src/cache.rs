//! Concurrent latest-value cache for UECS-CCM packets
//!
//! Stores the most recent packet per (house, ccm_type) key and tracks which
//! network nodes broadcast which types. One lock domain guards both maps;
//! reads hand back owned snapshots so nothing aliases across the lock
//! boundary.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::protocol::CcmPacket;

/// Default node-liveness window in seconds
pub const DEFAULT_NODE_TIMEOUT_SECS: i64 = 300;

static SENSOR_TYPES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "InAirTemp",
        "InAirHumid",
        "InAirCO2",
        "SoilTemp",
        "InRadiation",
        "SoilEC",
        "SoilWC",
        "Pulse",
        "InAirHD",
        "InAirAbsHumid",
        "InAirDP",
        "IntgRadiation",
    ])
});

static ACTUATOR_TYPES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "Irri",
        "VenFan",
        "CirHoriFan",
        "AirHeatBurn",
        "AirHeatHP",
        "CO2Burn",
        "VenRfWin",
        "VenSdWin",
        "ThCrtn",
        "LsCrtn",
        "AirCoolHP",
        "AirHumFog",
    ])
});

static WEATHER_TYPES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "WAirTemp",
        "WAirHumid",
        "WWindSpeed",
        "WWindDir16",
        "WRainfall",
        "WRainfallAmt",
        "WLUX",
    ])
});

/// Static classification of a normalized CCM type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Sensor,
    Actuator,
    Weather,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sensor => "sensor",
            Self::Actuator => "actuator",
            Self::Weather => "weather",
            Self::Other => "other",
        }
    }
}

/// Classify a normalized CCM type into sensor/actuator/weather/other.
pub fn classify_ccm_type(ccm_type: &str) -> Category {
    if SENSOR_TYPES.contains(ccm_type) {
        Category::Sensor
    } else if ACTUATOR_TYPES.contains(ccm_type) {
        Category::Actuator
    } else if WEATHER_TYPES.contains(ccm_type) {
        Category::Weather
    } else {
        Category::Other
    }
}

/// Single cached value with staleness metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub packet: CcmPacket,
    pub updated_at: DateTime<Utc>,
}

/// Tracked UECS node, keyed by source address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInfo {
    pub ip: String,
    /// Distinct normalized types ever seen from this address, sorted
    pub ccm_types: BTreeSet<String>,
    pub last_seen: DateTime<Utc>,
}

impl NodeInfo {
    /// Dominant category of a node's observed types, checked in priority
    /// order: actuator > weather > sensor > other.
    pub fn node_type(&self) -> Category {
        let categories: HashSet<Category> = self
            .ccm_types
            .iter()
            .map(|t| classify_ccm_type(t))
            .collect();
        if categories.contains(&Category::Actuator) {
            Category::Actuator
        } else if categories.contains(&Category::Weather) {
            Category::Weather
        } else if categories.contains(&Category::Sensor) {
            Category::Sensor
        } else {
            Category::Other
        }
    }
}

#[derive(Debug, Default)]
struct CacheState {
    data: HashMap<(String, String), CacheEntry>,
    nodes: HashMap<String, NodeInfo>,
}

/// Concurrent cache of the latest CCM value per (house, type) key.
///
/// Safe for unbounded concurrent callers; the receiver updates it while
/// query paths read snapshots.
#[derive(Debug, Default)]
pub struct SensorCache {
    state: RwLock<CacheState>,
}

impl SensorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert the (house, type) entry and refresh the node record.
    /// Last write wins unconditionally; entries are never deleted.
    pub async fn update(&self, packet: CcmPacket) {
        let key = (packet.house_id(), packet.ccm_type.clone());
        let now = Utc::now();

        let mut state = self.state.write().await;
        if !packet.source_ip.is_empty() {
            let node = state
                .nodes
                .entry(packet.source_ip.clone())
                .or_insert_with(|| NodeInfo {
                    ip: packet.source_ip.clone(),
                    ccm_types: BTreeSet::new(),
                    last_seen: now,
                });
            node.ccm_types.insert(packet.ccm_type.clone());
            node.last_seen = now;
        }
        state.data.insert(
            key,
            CacheEntry {
                packet,
                updated_at: now,
            },
        );
    }

    /// Get a single cached entry.
    pub async fn get(&self, house_id: &str, ccm_type: &str) -> Option<CacheEntry> {
        let state = self.state.read().await;
        state
            .data
            .get(&(house_id.to_string(), ccm_type.to_string()))
            .cloned()
    }

    /// All entries for a house matching a category.
    ///
    /// Copies the house's entries under the read lock and classifies
    /// outside it, so the lock is never held across the category scan.
    pub async fn get_by_category(
        &self,
        house_id: &str,
        category: Category,
    ) -> HashMap<String, CacheEntry> {
        let house_entries: Vec<(String, CacheEntry)> = {
            let state = self.state.read().await;
            state
                .data
                .iter()
                .filter(|((hid, _), _)| hid == house_id)
                .map(|((_, ctype), entry)| (ctype.clone(), entry.clone()))
                .collect()
        };

        house_entries
            .into_iter()
            .filter(|(ctype, _)| classify_ccm_type(ctype) == category)
            .collect()
    }

    pub async fn get_sensors(&self, house_id: &str) -> HashMap<String, CacheEntry> {
        self.get_by_category(house_id, Category::Sensor).await
    }

    pub async fn get_actuators(&self, house_id: &str) -> HashMap<String, CacheEntry> {
        self.get_by_category(house_id, Category::Actuator).await
    }

    pub async fn get_weather(&self, house_id: &str) -> HashMap<String, CacheEntry> {
        self.get_by_category(house_id, Category::Weather).await
    }

    /// List tracked nodes, newest snapshot per address.
    ///
    /// With `active_only`, nodes whose last packet is older than
    /// `timeout_seconds` are excluded (strict `<` comparison, so a zero
    /// timeout excludes everything).
    pub async fn list_nodes(&self, active_only: bool, timeout_seconds: i64) -> Vec<NodeInfo> {
        let now = Utc::now();
        let mut nodes: Vec<NodeInfo> = {
            let state = self.state.read().await;
            state.nodes.values().cloned().collect()
        };

        if active_only {
            nodes.retain(|n| (now - n.last_seen).num_seconds() < timeout_seconds);
        }
        nodes.sort_by(|a, b| a.ip.cmp(&b.ip));
        nodes
    }

    /// Number of cached (house, type) entries.
    pub async fn len(&self) -> usize {
        self.state.read().await.data.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Number of known nodes, active or not.
    pub async fn node_count(&self) -> usize {
        self.state.read().await.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_covers_all_tables() {
        assert_eq!(classify_ccm_type("InAirTemp"), Category::Sensor);
        assert_eq!(classify_ccm_type("Irri"), Category::Actuator);
        assert_eq!(classify_ccm_type("WAirTemp"), Category::Weather);
        assert_eq!(classify_ccm_type("testFLOW"), Category::Other);
        assert_eq!(classify_ccm_type("cnd"), Category::Other);
    }

    #[test]
    fn node_type_prefers_actuator_over_weather_over_sensor() {
        let mut node = NodeInfo {
            ip: "192.168.1.70".to_string(),
            ccm_types: BTreeSet::from(["InAirTemp".to_string()]),
            last_seen: Utc::now(),
        };
        assert_eq!(node.node_type(), Category::Sensor);

        node.ccm_types.insert("WAirTemp".to_string());
        assert_eq!(node.node_type(), Category::Weather);

        node.ccm_types.insert("Irri".to_string());
        assert_eq!(node.node_type(), Category::Actuator);
    }
}
