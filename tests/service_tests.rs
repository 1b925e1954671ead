//! Facade tests: end-to-end inbound scenario, snapshot shaping, health,
//! and the guarded command path.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{make_packet, RecordingTransport};
use uecs_ccm_bridge::cache::SensorCache;
use uecs_ccm_bridge::error::CcmError;
use uecs_ccm_bridge::protocol::{parse_ccm_xml, CcmValue};
use uecs_ccm_bridge::sender::{CcmSender, SafetyLimits};
use uecs_ccm_bridge::service::{BridgeService, SetActuatorRequest};

fn service_with(
    cache: Arc<SensorCache>,
    min_send_interval: Duration,
) -> (BridgeService, RecordingTransport) {
    let limits = SafetyLimits {
        min_send_interval,
        ..SafetyLimits::default()
    };
    let transport = RecordingTransport::new();
    let sender = CcmSender::with_transport(limits, Box::new(transport.clone()));
    (BridgeService::new(cache, sender, 300), transport)
}

fn actuator_request(actuator: &str, state: bool) -> SetActuatorRequest {
    SetActuatorRequest {
        actuator: actuator.to_string(),
        state,
        priority: 10,
        house_id: "h1".to_string(),
        duration_seconds: None,
    }
}

#[tokio::test]
async fn inbound_multicast_payload_reaches_the_query_path() {
    let payload =
        br#"<UECS ver="1.00-E10"><DATA type="InAirTemp.mC" room="1" priority="29">22.5</DATA></UECS>"#;
    let cache = Arc::new(SensorCache::new());
    for packet in parse_ccm_xml(payload, "192.168.1.70") {
        cache.update(packet).await;
    }

    let (service, _) = service_with(Arc::clone(&cache), Duration::from_secs(1));

    let sensors = service.get_sensors("h1").await;
    assert_eq!(sensors.count, 1);
    let entry = &sensors.entries["InAirTemp"];
    assert_eq!(entry.value, CcmValue::Number(22.5));
    assert_eq!(entry.source_ip, "192.168.1.70");
    assert_eq!(entry.priority, 29);

    let nodes = service.list_nodes(true).await;
    assert_eq!(nodes.count, 1);
    assert_eq!(nodes.nodes[0].ip, "192.168.1.70");
    assert!(nodes.nodes[0]
        .ccm_types
        .contains(&"InAirTemp".to_string()));
}

#[tokio::test]
async fn snapshots_are_empty_for_unknown_houses() {
    let cache = Arc::new(SensorCache::new());
    let (service, _) = service_with(cache, Duration::from_secs(1));

    let sensors = service.get_sensors("h9").await;
    assert_eq!(sensors.count, 0);
    assert!(sensors.entries.is_empty());

    let nodes = service.list_nodes(true).await;
    assert_eq!(nodes.count, 0);
}

#[tokio::test]
async fn weather_and_actuator_views_are_disjoint() {
    let cache = Arc::new(SensorCache::new());
    cache.update(make_packet("WAirTemp", 12.0, 1)).await;
    cache.update(make_packet("Irri", 1.0, 1)).await;
    let (service, _) = service_with(Arc::clone(&cache), Duration::from_secs(1));

    let weather = service.get_weather("h1").await;
    assert!(weather.entries.contains_key("WAirTemp"));
    assert!(!weather.entries.contains_key("Irri"));

    let actuators = service.get_actuators("h1").await;
    assert!(actuators.entries.contains_key("Irri"));
    assert!(!actuators.entries.contains_key("WAirTemp"));
}

#[tokio::test]
async fn node_view_carries_dominant_type() {
    let cache = Arc::new(SensorCache::new());
    cache.update(make_packet("InAirTemp", 22.0, 1)).await;
    cache.update(make_packet("Irri", 1.0, 1)).await;
    let (service, _) = service_with(Arc::clone(&cache), Duration::from_secs(1));

    let nodes = service.list_nodes(true).await;
    assert_eq!(nodes.nodes[0].node_type.as_str(), "actuator");
}

#[tokio::test]
async fn health_reports_cache_occupancy() {
    let cache = Arc::new(SensorCache::new());
    cache.update(make_packet("InAirTemp", 22.0, 1)).await;
    cache.update(make_packet("WAirTemp", 12.0, 2)).await;
    let (service, _) = service_with(Arc::clone(&cache), Duration::from_secs(1));

    let health = service.health().await;
    assert_eq!(health.status, "ok");
    assert_eq!(health.cached_entries, 2);
    assert_eq!(health.known_nodes, 1);
}

#[tokio::test(start_paused = true)]
async fn immediate_second_command_is_rate_limited() {
    let cache = Arc::new(SensorCache::new());
    let (service, transport) = service_with(cache, Duration::from_secs(1));

    service
        .set_actuator(actuator_request("Irri", true))
        .await
        .unwrap();
    let err = service
        .set_actuator(actuator_request("Irri", false))
        .await
        .unwrap_err();

    assert!(matches!(err, CcmError::RateLimit(_)));
    assert_eq!(transport.sent_count(), 1);
}

#[tokio::test]
async fn set_actuator_routes_room_and_state() {
    let cache = Arc::new(SensorCache::new());
    let (service, transport) = service_with(cache, Duration::from_secs(0));

    let response = service
        .set_actuator(SetActuatorRequest {
            actuator: "VenFan".to_string(),
            state: true,
            priority: 5,
            house_id: "h3".to_string(),
            duration_seconds: None,
        })
        .await
        .unwrap();

    assert_eq!(response.status, "ok");
    assert!(response.message.contains("VenFan=ON"));
    assert!(response.message.contains("room=3"));
    let payload = &transport.sent_as_text()[0];
    assert!(payload.contains("room=\"3\""));
    assert!(payload.contains("priority=\"5\""));
}

#[tokio::test(start_paused = true)]
async fn set_actuator_with_duration_schedules_auto_off() {
    let cache = Arc::new(SensorCache::new());
    let (service, transport) = service_with(cache, Duration::from_secs(0));

    let response = service
        .set_actuator(SetActuatorRequest {
            actuator: "Irri".to_string(),
            state: true,
            priority: 10,
            house_id: "h1".to_string(),
            duration_seconds: Some(30),
        })
        .await
        .unwrap();
    assert!(response.message.contains("auto-OFF in 30s"));

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(transport.sent_count(), 2);
    assert!(transport.sent_as_text()[1].contains(">0</DATA>"));
}

#[tokio::test]
async fn disallowed_actuator_surfaces_validation_error() {
    let cache = Arc::new(SensorCache::new());
    let (service, transport) = service_with(cache, Duration::from_secs(0));

    let err = service
        .set_actuator(actuator_request("SelfDestruct", true))
        .await
        .unwrap_err();
    assert!(err.is_validation());
    assert!(err.to_string().contains("not in allowed list"));
    assert_eq!(transport.sent_count(), 0);
}

#[tokio::test]
async fn snapshot_serializes_with_expected_fields() {
    let cache = Arc::new(SensorCache::new());
    cache.update(make_packet("InAirTemp", 22.5, 1)).await;
    let (service, _) = service_with(Arc::clone(&cache), Duration::from_secs(1));

    let value = serde_json::to_value(service.get_sensors("h1").await).unwrap();
    assert_eq!(value["house_id"], "h1");
    assert_eq!(value["category"], "sensor");
    assert_eq!(value["count"], 1);
    assert_eq!(value["entries"]["InAirTemp"]["value"], 22.5);
    assert!(value["entries"]["InAirTemp"]["data_age_seconds"].is_number());
}
