//! Zigbee device representation

use crate::action::Action;
use crate::property::Property;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

/// IEEE address (EUI-64), stored in over-the-air byte order
pub type IeeeAddress = [u8; 8];

/// Mains-independent power source code from the Basic cluster
pub const POWER_SOURCE_BATTERY: u8 = 0x03;

/// Format an IEEE address as colon-separated hex for logs
#[must_use]
pub fn format_ieee(ieee: &IeeeAddress) -> String {
    ieee.iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}

/// Zigbee logical device types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalType {
    Coordinator,
    Router,
    EndDevice,
}

/// IAS Zone enrollment progress for one endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZoneStatus {
    #[default]
    Unknown,
    SetAddress,
    Enroll,
    Enrolled,
}

/// A device on the network
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub ieee_address: IeeeAddress,
    pub network_address: u16,
    pub logical_type: LogicalType,
    /// User-assigned friendly name
    pub name: Option<String>,
    #[serde(default)]
    pub manufacturer_name: String,
    #[serde(default)]
    pub model_name: String,
    /// Application version from the Basic cluster
    #[serde(default)]
    pub version: u8,
    #[serde(default)]
    pub power_source: u8,
    #[serde(default)]
    pub manufacturer_code: u16,
    #[serde(default)]
    pub interview_finished: bool,
    #[serde(default)]
    pub descriptor_received: bool,
    #[serde(default)]
    pub endpoints_received: bool,
    #[serde(default)]
    pub endpoints: BTreeMap<u8, Endpoint>,
    /// Unix timestamp of the last frame seen from this device
    #[serde(default)]
    pub last_seen: i64,
    /// Endpoint currently being interviewed when the peer omits its id
    #[serde(skip)]
    pub interview_endpoint_id: u8,
    #[serde(skip)]
    pub neighbors: HashMap<u16, u8>,
    #[serde(skip)]
    pub link_quality: u8,
    #[serde(skip)]
    pub removed: bool,
    #[serde(skip)]
    pub interview_deadline: Option<Instant>,
}

impl Device {
    #[must_use]
    pub fn new(ieee_address: IeeeAddress, network_address: u16) -> Self {
        Self {
            ieee_address,
            network_address,
            logical_type: LogicalType::EndDevice,
            name: None,
            manufacturer_name: String::new(),
            model_name: String::new(),
            version: 0,
            power_source: 0,
            manufacturer_code: 0,
            interview_finished: false,
            descriptor_received: false,
            endpoints_received: false,
            endpoints: BTreeMap::new(),
            last_seen: 0,
            interview_endpoint_id: 0,
            neighbors: HashMap::new(),
            link_quality: 0,
            removed: false,
            interview_deadline: None,
        }
    }

    /// Display name: the friendly name, or the hex address
    #[must_use]
    pub fn name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format_ieee(&self.ieee_address))
    }

    pub fn update_last_seen(&mut self) {
        self.last_seen = chrono::Utc::now().timestamp();
    }

    /// Endpoint by id, created on first reference
    pub fn endpoint(&mut self, endpoint_id: u8) -> &mut Endpoint {
        self.endpoints
            .entry(endpoint_id)
            .or_insert_with(|| Endpoint::new(endpoint_id))
    }
}

/// A device endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: u8,
    #[serde(default)]
    pub profile_id: u16,
    #[serde(default)]
    pub device_id: u16,
    #[serde(default)]
    pub in_clusters: Vec<u16>,
    #[serde(default)]
    pub out_clusters: Vec<u16>,
    #[serde(default)]
    pub descriptor_received: bool,
    #[serde(skip)]
    pub zone_status: ZoneStatus,
    /// Set when a property value changed while handling the current frame
    #[serde(skip)]
    pub updated: bool,
    #[serde(skip)]
    pub properties: Vec<Property>,
    #[serde(skip)]
    pub reportings: Vec<Reporting>,
    #[serde(skip)]
    pub actions: Vec<Action>,
    #[serde(skip)]
    pub polls: Vec<Poll>,
}

impl Endpoint {
    #[must_use]
    pub fn new(id: u8) -> Self {
        Self {
            id,
            profile_id: 0,
            device_id: 0,
            in_clusters: Vec::new(),
            out_clusters: Vec::new(),
            descriptor_received: false,
            zone_status: ZoneStatus::Unknown,
            updated: false,
            properties: Vec::new(),
            reportings: Vec::new(),
            actions: Vec::new(),
            polls: Vec::new(),
        }
    }

    #[must_use]
    pub fn has_in_cluster(&self, cluster_id: u16) -> bool {
        self.in_clusters.contains(&cluster_id)
    }
}

/// Node-side attribute reporting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reporting {
    pub name: String,
    pub cluster_id: u16,
    pub data_type: u8,
    pub attributes: Vec<u16>,
    pub min_interval: u16,
    pub max_interval: u16,
    pub value_change: u64,
}

impl Reporting {
    #[must_use]
    pub fn new(
        name: &str,
        cluster_id: u16,
        data_type: u8,
        attributes: Vec<u16>,
        min_interval: u16,
        max_interval: u16,
        value_change: u64,
    ) -> Self {
        Self {
            name: name.to_string(),
            cluster_id,
            data_type,
            attributes,
            min_interval,
            max_interval,
            value_change,
        }
    }
}

/// Periodic attribute re-read for devices that do not report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Poll {
    pub name: String,
    pub cluster_id: u16,
    pub attributes: Vec<u16>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_falls_back_to_address() {
        let mut device = Device::new([0x00, 0x15, 0x8D, 0x00, 0x01, 0x02, 0x03, 0x04], 0x1234);
        assert_eq!(device.name(), "00:15:8d:00:01:02:03:04");

        device.name = Some("kitchen sensor".to_string());
        assert_eq!(device.name(), "kitchen sensor");
    }

    #[test]
    fn endpoint_created_on_reference() {
        let mut device = Device::new([0u8; 8], 0x0001);
        assert!(device.endpoints.is_empty());

        device.endpoint(0x01).profile_id = 0x0104;
        assert_eq!(device.endpoints.len(), 1);
        assert_eq!(device.endpoint(0x01).profile_id, 0x0104);
    }

    #[test]
    fn serialized_device_skips_runtime_state() {
        let mut device = Device::new([1u8; 8], 0x0002);
        device.neighbors.insert(0x1234, 80);
        device.interview_deadline = Some(Instant::now());

        let json = serde_json::to_value(&device).unwrap();
        assert!(json.get("neighbors").is_none());
        assert!(json.get("interview_deadline").is_none());

        let restored: Device = serde_json::from_value(json).unwrap();
        assert!(restored.neighbors.is_empty());
        assert!(restored.interview_deadline.is_none());
    }
}
