use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::{Indicator, Tank};

/// Plant state pushed to dashboards.
pub const DATA_MONITOR: &str = "data_monitor";
/// Operator emergency stop.
pub const EMERGENCY: &str = "emergency";
pub const EMERGENCY_STATUS: &str = "emergency";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One named event as it travels over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    DataMonitor(PlantReading),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientRequest {
    Emergency(EmergencyCommand),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyCommand {
    pub status: String,
}

impl EmergencyCommand {
    pub fn engage() -> Self {
        Self {
            status: EMERGENCY_STATUS.to_string(),
        }
    }

    pub fn is_emergency(&self) -> bool {
        self.status == EMERGENCY_STATUS
    }
}

/// Full plant record as published by the plant feed.
///
/// Levels are already scaled to percent of tank height; flags are 0/1.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlantReading {
    pub id: u64,
    pub timestamp: String,
    pub level1: i64,
    pub level2: i64,
    #[serde(rename = "tdsValue")]
    pub tds_value: i64,
    #[serde(rename = "flowRate")]
    pub flow_rate: i64,
    #[serde(rename = "pressureValue")]
    pub pressure_value: i64,
    #[serde(rename = "levelSwitch")]
    pub level_switch: u8,
    pub mode_standby: u8,
    pub mode_filtering: u8,
    pub mode_backwash: u8,
    pub mode_drain: u8,
    pub mode_override: u8,
    pub emergency_stop: u8,
    pub solenoid1: u8,
    pub solenoid2: u8,
    pub solenoid3: u8,
    pub solenoid4: u8,
    pub solenoid5: u8,
    pub solenoid6: u8,
    pub pump1: u8,
    pub pump2: u8,
    pub pump3: u8,
}

impl PlantReading {
    pub fn to_snapshot(&self) -> Snapshot {
        serde_json::to_value(self)
            .map(Snapshot::from_value)
            .unwrap_or_default()
    }
}

pub fn format_timestamp(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Inbound `data_monitor` payload as seen by a dashboard.
///
/// Values stay raw JSON so that `1`, `"1"` and `true` remain distinguishable.
/// Any subset of fields may be present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(Map<String, Value>);

impl Snapshot {
    /// Non-object payloads become an empty snapshot.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self(fields),
            _ => Self::default(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn level(&self, tank: Tank) -> Option<&Value> {
        self.get(tank.key())
    }

    pub fn indicator(&self, indicator: Indicator) -> Option<&Value> {
        self.get(indicator.key())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn server_event_uses_named_event_envelope() {
        let reading = PlantReading {
            id: 7,
            level1: 40,
            pump2: 1,
            ..PlantReading::default()
        };
        let wire = serde_json::to_value(ServerEvent::DataMonitor(reading)).expect("json");
        assert_eq!(wire["event"], DATA_MONITOR);
        assert_eq!(wire["data"]["level1"], 40);
        assert_eq!(wire["data"]["tdsValue"], 0);
        assert_eq!(wire["data"]["pump2"], 1);

        let envelope: Envelope = serde_json::from_value(wire).expect("envelope");
        assert_eq!(envelope.event, DATA_MONITOR);
    }

    #[test]
    fn emergency_request_matches_dashboard_payload() {
        let wire = serde_json::to_value(ClientRequest::Emergency(EmergencyCommand::engage()))
            .expect("json");
        assert_eq!(wire, json!({ "event": "emergency", "data": { "status": "emergency" } }));
    }

    #[test]
    fn envelope_without_data_defaults_to_null() {
        let envelope: Envelope = serde_json::from_str(r#"{"event":"ping"}"#).expect("envelope");
        assert_eq!(envelope.data, Value::Null);
    }

    #[test]
    fn snapshot_from_non_object_is_empty() {
        assert!(Snapshot::from_value(json!([1, 2])).is_empty());
        assert!(Snapshot::from_value(json!(null)).is_empty());
    }

    #[test]
    fn snapshot_keeps_raw_values() {
        let snapshot = Snapshot::from_value(json!({ "level1": 55, "pump1": "1", "foo": 1 }));
        assert_eq!(snapshot.level(Tank::Level1), Some(&json!(55)));
        assert_eq!(snapshot.indicator(Indicator::Pump1), Some(&json!("1")));
        assert_eq!(snapshot.indicator(Indicator::Pump2), None);
        assert_eq!(snapshot.len(), 3);
    }

    #[test]
    fn reading_snapshot_carries_every_indicator() {
        let snapshot = PlantReading::default().to_snapshot();
        for indicator in Indicator::ALL {
            assert_eq!(snapshot.indicator(*indicator), Some(&json!(0)));
        }
    }
}
