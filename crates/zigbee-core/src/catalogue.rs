//! Device catalogue: the IEEE-address-keyed map of everything known,
//! plus the (manufacturer, model) setup registry

use crate::action::Action;
use crate::device::{format_ieee, Device, Endpoint, IeeeAddress, LogicalType, Reporting};
use crate::persistence::{self, Database};
use crate::property::Property;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::path::Path;
use zcl::{cluster, data_type};

/// The device map, exclusively owned by the event loop
#[derive(Debug, Default)]
pub struct DeviceCatalogue {
    devices: HashMap<IeeeAddress, Device>,
    permit_join: bool,
    adapter_type: String,
    adapter_version: String,
}

impl DeviceCatalogue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn load(&mut self, path: &Path) {
        let database = persistence::load_database(path).await;

        self.permit_join = database.permit_join;

        for mut device in database.devices {
            if device.interview_finished {
                setup_device(&mut device);
            }
            self.devices.insert(device.ieee_address, device);
        }
    }

    pub async fn store_database(&self, path: &Path) {
        let database = Database {
            permit_join: self.permit_join,
            adapter_type: self.adapter_type.clone(),
            adapter_version: self.adapter_version.clone(),
            devices: self
                .devices
                .values()
                .filter(|device| !device.removed)
                .cloned()
                .collect(),
        };

        if let Err(e) = persistence::save_database(path, &database).await {
            tracing::warn!("Failed to save device database: {}", e);
        }
    }

    pub async fn store_properties(&self, path: &Path) {
        let mut snapshot = Map::new();

        for device in self.devices.values() {
            let mut endpoints = Map::new();

            for endpoint in device.endpoints.values() {
                let mut values = Map::new();

                for property in &endpoint.properties {
                    if !property.value().is_null() {
                        values.insert(property.name().to_string(), property.value().clone());
                    }
                }

                if !values.is_empty() {
                    endpoints.insert(endpoint.id.to_string(), Value::Object(values));
                }
            }

            if !endpoints.is_empty() {
                snapshot.insert(format_ieee(&device.ieee_address), Value::Object(endpoints));
            }
        }

        if let Err(e) = persistence::save_properties(path, &Value::Object(snapshot)).await {
            tracing::warn!("Failed to save property snapshot: {}", e);
        }
    }

    #[must_use]
    pub fn get(&self, ieee: &IeeeAddress) -> Option<&Device> {
        self.devices.get(ieee)
    }

    pub fn get_mut(&mut self, ieee: &IeeeAddress) -> Option<&mut Device> {
        self.devices.get_mut(ieee)
    }

    pub fn insert(&mut self, device: Device) {
        self.devices.insert(device.ieee_address, device);
    }

    pub fn remove(&mut self, ieee: &IeeeAddress) -> Option<Device> {
        self.devices.remove(ieee)
    }

    /// Resolve a device by friendly name or formatted address
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<IeeeAddress> {
        self.devices
            .values()
            .find(|device| device.name() == name)
            .map(|device| device.ieee_address)
    }

    #[must_use]
    pub fn ieee_by_network(&self, network_address: u16) -> Option<IeeeAddress> {
        self.devices
            .values()
            .find(|device| device.network_address == network_address && !device.removed)
            .map(|device| device.ieee_address)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Device> {
        self.devices.values_mut()
    }

    /// Purge stale coordinator entries before re-inserting the current one
    pub fn purge_coordinators(&mut self, ieee: &IeeeAddress) {
        self.devices.retain(|address, device| {
            address != ieee && device.logical_type != LogicalType::Coordinator
        });
    }

    #[must_use]
    pub fn permit_join(&self) -> bool {
        self.permit_join
    }

    pub fn set_permit_join(&mut self, enabled: bool) {
        self.permit_join = enabled;
    }

    pub fn set_adapter_info(&mut self, adapter_type: &str, adapter_version: &str) {
        self.adapter_type = adapter_type.to_string();
        self.adapter_version = adapter_version.to_string();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

/// Attach properties, reportings, actions and polls to every endpoint
/// according to the device identity.
///
/// Vendor rows first; anything unmatched falls back to a cluster-driven
/// setup. The full product database is the host's concern, this covers
/// the dialects the engine understands.
pub fn setup_device(device: &mut Device) {
    let manufacturer = device.manufacturer_name.clone();
    let model = device.model_name.clone();
    let version = device.version;

    for endpoint in device.endpoints.values_mut() {
        endpoint.properties.clear();
        endpoint.reportings.clear();
        endpoint.actions.clear();
        endpoint.polls.clear();

        setup_endpoint(endpoint, &manufacturer, &model, version);
    }
}

fn setup_endpoint(endpoint: &mut Endpoint, manufacturer: &str, model: &str, version: u8) {
    match (manufacturer, model) {
        ("LUMI", m) if m.starts_with("lumi.sensor_magnet") => {
            endpoint.properties.push(Property::contact());
            endpoint.properties.push(Property::lumi_battery_voltage());
        }

        ("LUMI", m) if m.starts_with("lumi.sensor_switch") => {
            endpoint.properties.push(Property::lumi_button_action());
            endpoint.properties.push(Property::lumi_battery_voltage());
        }

        ("LUMI", m) if m.starts_with("lumi.sensor_cube") => {
            endpoint.properties.push(Property::lumi_cube_movement());
            endpoint.properties.push(Property::lumi_cube_rotation());
            endpoint.properties.push(Property::lumi_battery_voltage());
        }

        ("LUMI", m) if m.starts_with("lumi.sensor_motion") => {
            endpoint.properties.push(Property::occupancy());
            endpoint.properties.push(Property::illuminance());
            endpoint.properties.push(Property::lumi_battery_voltage());
        }

        ("LUMI", "lumi.motion.ac01" | "lumi.sen_ill.mgl01" | "lumi.remote.b686opcn01") => {
            endpoint.properties.push(Property::lumi_data(model, version));

            if model == "lumi.remote.b686opcn01" {
                endpoint.properties.push(Property::lumi_switch_action());
            }
        }

        ("LUMI", m) if m.starts_with("lumi.plug") => {
            endpoint.properties.push(Property::status());
            endpoint.properties.push(Property::lumi_power());
            endpoint.properties.push(Property::lumi_data(model, version));
            endpoint.actions.push(Action::status());
        }

        ("TUYA", "_TZE200_d0yu2xgi") => {
            endpoint.properties.push(Property::tuya_neo_siren());
        }

        ("TUYA", "_TZE200_ikvncluo" | "_TZE204_ztc6ggyl" | "_TZE200_ztc6ggyl") => {
            endpoint.properties.push(Property::tuya_presence_sensor());
        }

        ("TUYA", "TS0202") => {
            endpoint.properties.push(Property::ias_zone_status("occupancy"));
            endpoint.properties.push(Property::battery_percentage());
        }

        ("TUYA", "TS0203") => {
            endpoint.properties.push(Property::ias_zone_status("contact"));
            endpoint.properties.push(Property::battery_percentage());
        }

        ("TUYA", m) if m.starts_with("TS001") || m.starts_with("TS000") => {
            endpoint.properties.push(Property::status());
            endpoint.properties.push(Property::tuya_power_on_status());
            endpoint.properties.push(Property::tuya_switch_type());
            endpoint.actions.push(Action::status());
        }

        ("Konke", _) => {
            endpoint.properties.push(Property::konke_button_action());
            endpoint.properties.push(Property::battery_voltage());
        }

        ("LifeControl", "MCLH-08") => {
            endpoint.properties.push(Property::life_control_air_quality());
            endpoint
                .properties
                .push(Property::battery_percentage().with_option("batteryUndivided", json!(true)));
        }

        ("PERENIO", "PEHPL0X") => {
            endpoint.properties.push(Property::status());
            endpoint.properties.push(Property::perenio_smart_plug());
            endpoint.actions.push(Action::status());
        }

        (_, m) if m.starts_with("ptvo.switch") => {
            if endpoint.has_in_cluster(cluster::ANALOG_INPUT) {
                endpoint.properties.push(Property::ptvo_co2());
                endpoint.properties.push(Property::ptvo_temperature());
            }
            if endpoint.has_in_cluster(cluster::MULTISTATE_INPUT) {
                endpoint.properties.push(Property::ptvo_switch_action());
            }
            if endpoint.has_in_cluster(cluster::ON_OFF) {
                endpoint.properties.push(Property::ptvo_change_pattern());
            }
        }

        _ => setup_generic(endpoint),
    }
}

fn setup_generic(endpoint: &mut Endpoint) {
    if endpoint.has_in_cluster(cluster::ON_OFF) {
        endpoint.properties.push(Property::status());
        endpoint.properties.push(Property::power_on_status());
        endpoint.actions.push(Action::status());
    }

    if endpoint.out_clusters.contains(&cluster::ON_OFF) {
        endpoint.properties.push(Property::switch_action());
    }

    if endpoint.has_in_cluster(cluster::LEVEL_CONTROL) {
        endpoint.properties.push(Property::level());
        endpoint.actions.push(Action::level());
    }

    if endpoint.out_clusters.contains(&cluster::LEVEL_CONTROL) {
        endpoint.properties.push(Property::level_action());
    }

    if endpoint.has_in_cluster(cluster::COLOR_CONTROL) {
        endpoint.properties.push(Property::color_xy());
        endpoint.properties.push(Property::color_temperature());
        endpoint.actions.push(Action::color_xy());
        endpoint.actions.push(Action::color_temperature());
    }

    if endpoint.out_clusters.contains(&cluster::SCENES) {
        endpoint.properties.push(Property::scene());
    }

    if endpoint.out_clusters.contains(&cluster::IDENTIFY) {
        endpoint.properties.push(Property::identify_action());
    }

    if endpoint.has_in_cluster(cluster::POWER_CONFIGURATION) {
        endpoint.properties.push(Property::battery_percentage());
        endpoint.reportings.push(Reporting::new(
            "battery",
            cluster::POWER_CONFIGURATION,
            data_type::UNSIGNED_8BIT,
            vec![0x0021],
            3600,
            43200,
            0,
        ));
    }

    if endpoint.has_in_cluster(cluster::ILLUMINANCE_MEASUREMENT) {
        endpoint.properties.push(Property::illuminance());
        endpoint.reportings.push(Reporting::new(
            "illuminance",
            cluster::ILLUMINANCE_MEASUREMENT,
            data_type::UNSIGNED_16BIT,
            vec![0x0000],
            10,
            600,
            100,
        ));
    }

    if endpoint.has_in_cluster(cluster::TEMPERATURE_MEASUREMENT) {
        endpoint.properties.push(Property::temperature());
        endpoint.reportings.push(Reporting::new(
            "temperature",
            cluster::TEMPERATURE_MEASUREMENT,
            data_type::SIGNED_16BIT,
            vec![0x0000],
            10,
            600,
            50,
        ));
    }

    if endpoint.has_in_cluster(cluster::HUMIDITY_MEASUREMENT) {
        endpoint.properties.push(Property::humidity());
        endpoint.reportings.push(Reporting::new(
            "humidity",
            cluster::HUMIDITY_MEASUREMENT,
            data_type::UNSIGNED_16BIT,
            vec![0x0000],
            10,
            600,
            100,
        ));
    }

    if endpoint.has_in_cluster(cluster::OCCUPANCY_SENSING) {
        endpoint.properties.push(Property::occupancy());
    }

    if endpoint.has_in_cluster(cluster::SMART_ENERGY_METERING) {
        endpoint.properties.push(Property::energy());
        endpoint.reportings.push(Reporting::new(
            "energy",
            cluster::SMART_ENERGY_METERING,
            data_type::UNSIGNED_48BIT,
            vec![0x0000],
            10,
            600,
            1,
        ));
        endpoint.polls.push(crate::device::Poll {
            name: "energy".to_string(),
            cluster_id: cluster::SMART_ENERGY_METERING,
            attributes: vec![0x0000, 0x0301, 0x0302],
        });
    }

    if endpoint.has_in_cluster(cluster::ELECTRICAL_MEASUREMENT) {
        endpoint.properties.push(Property::power());
        endpoint.reportings.push(Reporting::new(
            "power",
            cluster::ELECTRICAL_MEASUREMENT,
            data_type::SIGNED_16BIT,
            vec![0x050B],
            10,
            600,
            1,
        ));
        endpoint.polls.push(crate::device::Poll {
            name: "power".to_string(),
            cluster_id: cluster::ELECTRICAL_MEASUREMENT,
            attributes: vec![0x050B, 0x0604, 0x0605],
        });
    }

    if endpoint.has_in_cluster(cluster::IAS_ZONE) {
        endpoint.properties.push(Property::ias_zone_status("alarm"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device_with_clusters(in_clusters: Vec<u16>, out_clusters: Vec<u16>) -> Device {
        let mut device = Device::new([9u8; 8], 0x0009);
        let endpoint = device.endpoint(0x01);
        endpoint.in_clusters = in_clusters;
        endpoint.out_clusters = out_clusters;
        device
    }

    #[test]
    fn generic_setup_follows_clusters() {
        let mut device = device_with_clusters(
            vec![cluster::ON_OFF, cluster::LEVEL_CONTROL],
            vec![cluster::SCENES],
        );
        device.manufacturer_name = "Acme".to_string();
        device.model_name = "bulb-1".to_string();

        setup_device(&mut device);

        let endpoint = device.endpoint(0x01);
        let names: Vec<&str> = endpoint.properties.iter().map(|p| p.name()).collect();
        assert!(names.contains(&"status"));
        assert!(names.contains(&"level"));
        assert!(names.contains(&"scene"));
        assert_eq!(endpoint.actions.len(), 2);
    }

    #[test]
    fn vendor_rows_override_generic() {
        let mut device = device_with_clusters(vec![cluster::ON_OFF], vec![]);
        device.manufacturer_name = "LUMI".to_string();
        device.model_name = "lumi.sensor_magnet.aq2".to_string();

        setup_device(&mut device);

        let endpoint = device.endpoint(0x01);
        let names: Vec<&str> = endpoint.properties.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["contact", "battery"]);
    }

    #[test]
    fn setup_replaces_previous_objects() {
        let mut device = device_with_clusters(vec![cluster::TEMPERATURE_MEASUREMENT], vec![]);
        device.manufacturer_name = "Acme".to_string();
        device.model_name = "sensor-2".to_string();

        setup_device(&mut device);
        setup_device(&mut device);

        let endpoint = device.endpoint(0x01);
        assert_eq!(endpoint.properties.len(), 1);
        assert_eq!(endpoint.reportings.len(), 1);
    }

    #[test]
    fn by_name_resolves_friendly_and_address() {
        let mut catalogue = DeviceCatalogue::new();
        let mut device = Device::new([0, 0, 0, 0, 0, 0, 0, 0x42], 0x0042);
        device.name = Some("hall motion".to_string());
        catalogue.insert(device);

        assert_eq!(
            catalogue.by_name("hall motion"),
            Some([0, 0, 0, 0, 0, 0, 0, 0x42])
        );
        assert!(catalogue.by_name("00:00:00:00:00:00:00:42").is_none());

        let unnamed = Device::new([1, 0, 0, 0, 0, 0, 0, 0], 0x0001);
        catalogue.insert(unnamed);
        assert_eq!(
            catalogue.by_name("01:00:00:00:00:00:00:00"),
            Some([1, 0, 0, 0, 0, 0, 0, 0])
        );
    }

    #[test]
    fn purge_coordinators_keeps_other_devices() {
        let mut catalogue = DeviceCatalogue::new();

        let mut old_coordinator = Device::new([2u8; 8], 0x0000);
        old_coordinator.logical_type = LogicalType::Coordinator;
        catalogue.insert(old_coordinator);
        catalogue.insert(Device::new([3u8; 8], 0x1111));

        catalogue.purge_coordinators(&[4u8; 8]);

        assert!(catalogue.get(&[2u8; 8]).is_none());
        assert!(catalogue.get(&[3u8; 8]).is_some());
    }
}
