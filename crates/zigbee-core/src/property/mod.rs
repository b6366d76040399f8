//! Property parsers: cluster attributes and commands to semantic values
//!
//! Every parser validates the exact (attribute id, data type, length)
//! triple it consumes; anything else is a silent no-op, so a property
//! value never turns invalid, it just does not move.

mod general;
mod ias;
mod lumi;
mod other;
mod ptvo;
mod tuya;

use serde_json::{Map, Value};
use zcl::cluster;

/// One typed property attached to an endpoint
#[derive(Debug, Clone)]
pub struct Property {
    name: &'static str,
    cluster_id: u16,
    value: Value,
    options: Map<String, Value>,
    kind: PropertyKind,
}

/// Closed set of parser variants
#[derive(Debug, Clone)]
pub enum PropertyKind {
    BatteryVoltage,
    BatteryPercentage,
    Status,
    Contact,
    PowerOnStatus,
    Level,
    ColorHs { hue: Option<u8>, saturation: Option<u8> },
    ColorXy { x: Option<f64>, y: Option<f64> },
    ColorTemperature,
    Illuminance,
    Temperature,
    Humidity,
    Occupancy,
    Energy { multiplier: u32, divider: u32 },
    Power { multiplier: u32, divider: u32 },
    Scene,
    IdentifyAction,
    SwitchAction,
    LevelAction,
    IasZoneStatus,
    LumiData { model_name: String, version: u8 },
    LumiBatteryVoltage,
    LumiPower,
    LumiButtonAction,
    LumiSwitchAction,
    LumiCubeRotation,
    LumiCubeMovement,
    TuyaNeoSiren,
    TuyaPresenceSensor,
    TuyaPowerOnStatus,
    TuyaSwitchType,
    PtvoCo2 { buffer: Option<f64> },
    PtvoTemperature { buffer: Option<f64> },
    PtvoChangePattern,
    PtvoPattern,
    PtvoSwitchAction,
    KonkeButtonAction,
    LifeControlAirQuality,
    PerenioSmartPlug,
}

impl Property {
    #[must_use]
    pub fn new(name: &'static str, cluster_id: u16, kind: PropertyKind) -> Self {
        Self {
            name,
            cluster_id,
            value: Value::Null,
            options: Map::new(),
            kind,
        }
    }

    #[must_use]
    pub fn with_option(mut self, key: &str, value: Value) -> Self {
        self.options.insert(key.to_string(), value);
        self
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn cluster_id(&self) -> u16 {
        self.cluster_id
    }

    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Feed one attribute record; returns true when the value changed
    pub fn parse_attribute(&mut self, attribute_id: u16, data_type: u8, data: &[u8]) -> bool {
        let update = match &mut self.kind {
            PropertyKind::BatteryVoltage => general::battery_voltage(attribute_id, data_type, data),
            PropertyKind::BatteryPercentage => {
                general::battery_percentage(&self.options, attribute_id, data_type, data)
            }
            PropertyKind::Status => general::status(attribute_id, data_type, data),
            PropertyKind::Contact => general::contact(attribute_id, data_type, data),
            PropertyKind::PowerOnStatus => general::power_on_status(attribute_id, data_type, data),
            PropertyKind::Level => general::level(attribute_id, data_type, data),
            PropertyKind::ColorHs { hue, saturation } => {
                general::color_hs(hue, saturation, attribute_id, data_type, data)
            }
            PropertyKind::ColorXy { x, y } => general::color_xy(x, y, attribute_id, data_type, data),
            PropertyKind::ColorTemperature => {
                general::color_temperature(attribute_id, data_type, data)
            }
            PropertyKind::Illuminance => general::illuminance(attribute_id, data_type, data),
            PropertyKind::Temperature => general::temperature(attribute_id, data_type, data),
            PropertyKind::Humidity => general::humidity(attribute_id, data_type, data),
            PropertyKind::Occupancy => general::occupancy(attribute_id, data_type, data),
            PropertyKind::Energy { multiplier, divider } => {
                general::energy(multiplier, divider, attribute_id, data_type, data)
            }
            PropertyKind::Power { multiplier, divider } => {
                general::power(multiplier, divider, attribute_id, data_type, data)
            }
            PropertyKind::LumiData { model_name, version } => {
                lumi::data(model_name, *version, &self.value, attribute_id, data_type, data)
            }
            PropertyKind::LumiBatteryVoltage => {
                lumi::battery_voltage(attribute_id, data_type, data)
            }
            PropertyKind::LumiPower => lumi::power(attribute_id, data_type, data),
            PropertyKind::LumiButtonAction => lumi::button_action(attribute_id, data_type, data),
            PropertyKind::LumiSwitchAction => lumi::switch_action(attribute_id, data_type, data),
            PropertyKind::LumiCubeRotation => lumi::cube_rotation(attribute_id, data_type, data),
            PropertyKind::LumiCubeMovement => lumi::cube_movement(attribute_id, data_type, data),
            PropertyKind::TuyaPowerOnStatus => {
                tuya::power_on_status(attribute_id, data_type, data)
            }
            PropertyKind::TuyaSwitchType => tuya::switch_type(attribute_id, data_type, data),
            PropertyKind::PtvoCo2 { buffer } => {
                ptvo::buffered_analog(buffer, "ppm", attribute_id, data_type, data)
            }
            PropertyKind::PtvoTemperature { buffer } => {
                ptvo::buffered_analog(buffer, "C", attribute_id, data_type, data)
            }
            PropertyKind::PtvoChangePattern => ptvo::change_pattern(attribute_id, data_type, data),
            PropertyKind::PtvoPattern => ptvo::pattern(attribute_id, data_type, data),
            PropertyKind::PtvoSwitchAction => ptvo::switch_action(attribute_id, data_type, data),
            PropertyKind::KonkeButtonAction => {
                other::konke_button_action(attribute_id, data_type, data)
            }
            PropertyKind::LifeControlAirQuality => {
                other::life_control_air_quality(&self.value, attribute_id, data_type, data)
            }
            PropertyKind::PerenioSmartPlug => {
                other::perenio_smart_plug(&self.value, attribute_id, data_type, data)
            }
            _ => None,
        };

        self.apply(update)
    }

    /// Feed one cluster-specific command; returns true when the value changed
    pub fn parse_command(&mut self, command_id: u8, payload: &[u8]) -> bool {
        let update = match &self.kind {
            PropertyKind::Scene => general::scene(&self.options, command_id, payload),
            PropertyKind::IdentifyAction => general::identify_action(command_id),
            PropertyKind::SwitchAction => general::switch_action(command_id),
            PropertyKind::LevelAction => general::level_action(command_id),
            PropertyKind::IasZoneStatus => {
                ias::zone_status(self.name, &self.value, command_id, payload)
            }
            PropertyKind::TuyaNeoSiren => tuya::command(command_id, payload)
                .and_then(|(data_point, value)| tuya::neo_siren(&self.value, data_point, &value)),
            PropertyKind::TuyaPresenceSensor => {
                tuya::command(command_id, payload).and_then(|(data_point, value)| {
                    tuya::presence_sensor(&self.value, data_point, &value)
                })
            }
            _ => None,
        };

        self.apply(update)
    }

    fn apply(&mut self, update: Option<Value>) -> bool {
        match update {
            Some(value) if value != self.value => {
                self.value = value;
                true
            }
            _ => false,
        }
    }
}

// constructors used by the device setup registry
impl Property {
    #[must_use]
    pub fn battery_voltage() -> Self {
        Self::new("battery", cluster::POWER_CONFIGURATION, PropertyKind::BatteryVoltage)
    }

    #[must_use]
    pub fn battery_percentage() -> Self {
        Self::new("battery", cluster::POWER_CONFIGURATION, PropertyKind::BatteryPercentage)
    }

    #[must_use]
    pub fn status() -> Self {
        Self::new("status", cluster::ON_OFF, PropertyKind::Status)
    }

    #[must_use]
    pub fn contact() -> Self {
        Self::new("contact", cluster::ON_OFF, PropertyKind::Contact)
    }

    #[must_use]
    pub fn power_on_status() -> Self {
        Self::new("powerOnStatus", cluster::ON_OFF, PropertyKind::PowerOnStatus)
    }

    #[must_use]
    pub fn level() -> Self {
        Self::new("level", cluster::LEVEL_CONTROL, PropertyKind::Level)
    }

    #[must_use]
    pub fn color_hs() -> Self {
        Self::new(
            "color",
            cluster::COLOR_CONTROL,
            PropertyKind::ColorHs { hue: None, saturation: None },
        )
    }

    #[must_use]
    pub fn color_xy() -> Self {
        Self::new(
            "color",
            cluster::COLOR_CONTROL,
            PropertyKind::ColorXy { x: None, y: None },
        )
    }

    #[must_use]
    pub fn color_temperature() -> Self {
        Self::new("colorTemperature", cluster::COLOR_CONTROL, PropertyKind::ColorTemperature)
    }

    #[must_use]
    pub fn illuminance() -> Self {
        Self::new("illuminance", cluster::ILLUMINANCE_MEASUREMENT, PropertyKind::Illuminance)
    }

    #[must_use]
    pub fn temperature() -> Self {
        Self::new("temperature", cluster::TEMPERATURE_MEASUREMENT, PropertyKind::Temperature)
    }

    #[must_use]
    pub fn humidity() -> Self {
        Self::new("humidity", cluster::HUMIDITY_MEASUREMENT, PropertyKind::Humidity)
    }

    #[must_use]
    pub fn occupancy() -> Self {
        Self::new("occupancy", cluster::OCCUPANCY_SENSING, PropertyKind::Occupancy)
    }

    #[must_use]
    pub fn energy() -> Self {
        Self::new(
            "energy",
            cluster::SMART_ENERGY_METERING,
            PropertyKind::Energy { multiplier: 0, divider: 0 },
        )
    }

    #[must_use]
    pub fn power() -> Self {
        Self::new(
            "power",
            cluster::ELECTRICAL_MEASUREMENT,
            PropertyKind::Power { multiplier: 0, divider: 0 },
        )
    }

    #[must_use]
    pub fn scene() -> Self {
        Self::new("scene", cluster::SCENES, PropertyKind::Scene)
    }

    #[must_use]
    pub fn identify_action() -> Self {
        Self::new("action", cluster::IDENTIFY, PropertyKind::IdentifyAction)
    }

    #[must_use]
    pub fn switch_action() -> Self {
        Self::new("action", cluster::ON_OFF, PropertyKind::SwitchAction)
    }

    #[must_use]
    pub fn level_action() -> Self {
        Self::new("action", cluster::LEVEL_CONTROL, PropertyKind::LevelAction)
    }

    /// IAS zone parser; `name` is the semantic boolean the zone reports
    #[must_use]
    pub fn ias_zone_status(name: &'static str) -> Self {
        Self::new(name, cluster::IAS_ZONE, PropertyKind::IasZoneStatus)
    }

    #[must_use]
    pub fn lumi_data(model_name: &str, version: u8) -> Self {
        Self::new(
            "lumi",
            cluster::LUMI,
            PropertyKind::LumiData { model_name: model_name.to_string(), version },
        )
    }

    #[must_use]
    pub fn lumi_battery_voltage() -> Self {
        Self::new("battery", cluster::POWER_CONFIGURATION, PropertyKind::LumiBatteryVoltage)
    }

    #[must_use]
    pub fn lumi_power() -> Self {
        Self::new("power", cluster::ANALOG_INPUT, PropertyKind::LumiPower)
    }

    #[must_use]
    pub fn lumi_button_action() -> Self {
        Self::new("action", cluster::ON_OFF, PropertyKind::LumiButtonAction)
    }

    #[must_use]
    pub fn lumi_switch_action() -> Self {
        Self::new("action", cluster::MULTISTATE_INPUT, PropertyKind::LumiSwitchAction)
    }

    #[must_use]
    pub fn lumi_cube_rotation() -> Self {
        Self::new("action", cluster::ANALOG_INPUT, PropertyKind::LumiCubeRotation)
    }

    #[must_use]
    pub fn lumi_cube_movement() -> Self {
        Self::new("action", cluster::MULTISTATE_INPUT, PropertyKind::LumiCubeMovement)
    }

    #[must_use]
    pub fn tuya_neo_siren() -> Self {
        Self::new("siren", cluster::TUYA_DATA, PropertyKind::TuyaNeoSiren)
    }

    #[must_use]
    pub fn tuya_presence_sensor() -> Self {
        Self::new("presence", cluster::TUYA_DATA, PropertyKind::TuyaPresenceSensor)
    }

    #[must_use]
    pub fn tuya_power_on_status() -> Self {
        Self::new("powerOnStatus", cluster::ON_OFF, PropertyKind::TuyaPowerOnStatus)
    }

    #[must_use]
    pub fn tuya_switch_type() -> Self {
        Self::new("switchType", cluster::TUYA_SWITCH_MODE, PropertyKind::TuyaSwitchType)
    }

    #[must_use]
    pub fn ptvo_co2() -> Self {
        Self::new("co2", cluster::ANALOG_INPUT, PropertyKind::PtvoCo2 { buffer: None })
    }

    #[must_use]
    pub fn ptvo_temperature() -> Self {
        Self::new(
            "temperature",
            cluster::ANALOG_INPUT,
            PropertyKind::PtvoTemperature { buffer: None },
        )
    }

    #[must_use]
    pub fn ptvo_change_pattern() -> Self {
        Self::new("changePattern", cluster::ON_OFF, PropertyKind::PtvoChangePattern)
    }

    #[must_use]
    pub fn ptvo_pattern() -> Self {
        Self::new("pattern", cluster::ANALOG_INPUT, PropertyKind::PtvoPattern)
    }

    #[must_use]
    pub fn ptvo_switch_action() -> Self {
        Self::new("action", cluster::MULTISTATE_INPUT, PropertyKind::PtvoSwitchAction)
    }

    #[must_use]
    pub fn konke_button_action() -> Self {
        Self::new("action", cluster::ON_OFF, PropertyKind::KonkeButtonAction)
    }

    #[must_use]
    pub fn life_control_air_quality() -> Self {
        Self::new(
            "airQuality",
            cluster::TEMPERATURE_MEASUREMENT,
            PropertyKind::LifeControlAirQuality,
        )
    }

    #[must_use]
    pub fn perenio_smart_plug() -> Self {
        Self::new("smartPlug", cluster::PERENIO, PropertyKind::PerenioSmartPlug)
    }
}

/// Map a value onto 0..=100 percent of the given range, clipped
pub(crate) fn percentage(min: f64, max: f64, value: f64) -> u8 {
    let value = value.clamp(min, max);
    ((value - min) / (max - min) * 100.0) as u8
}

pub(crate) fn read_u16_le(data: &[u8]) -> u16 {
    u16::from_le_bytes([data[0], data[1]])
}

pub(crate) fn read_i16_le(data: &[u8]) -> i16 {
    i16::from_le_bytes([data[0], data[1]])
}

pub(crate) fn read_u24_le(data: &[u8]) -> u32 {
    u32::from_le_bytes([data[0], data[1], data[2], 0])
}

pub(crate) fn read_u32_le(data: &[u8]) -> u32 {
    u32::from_le_bytes([data[0], data[1], data[2], data[3]])
}

pub(crate) fn read_u48_le(data: &[u8]) -> u64 {
    u64::from_le_bytes([data[0], data[1], data[2], data[3], data[4], data[5], 0, 0])
}

pub(crate) fn read_f32_le(data: &[u8]) -> f32 {
    f32::from_le_bytes([data[0], data[1], data[2], data[3]])
}

/// Current value as a map, shared by the accumulating parsers
pub(crate) fn value_map(value: &Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use zcl::data_type;

    #[test]
    fn mismatched_triple_is_silent() {
        let mut property = Property::battery_voltage();

        // wrong attribute, wrong type, wrong length
        assert!(!property.parse_attribute(0x0021, data_type::UNSIGNED_8BIT, &[0x1D]));
        assert!(!property.parse_attribute(0x0020, data_type::UNSIGNED_16BIT, &[0x1D]));
        assert!(!property.parse_attribute(0x0020, data_type::UNSIGNED_8BIT, &[0x1D, 0x00]));
        assert_eq!(property.value(), &Value::Null);
    }

    #[test]
    fn unchanged_value_reports_no_update() {
        let mut property = Property::status();
        assert!(property.parse_attribute(0x0000, data_type::BOOLEAN, &[0x01]));
        assert!(!property.parse_attribute(0x0000, data_type::BOOLEAN, &[0x01]));
        assert_eq!(property.value(), &json!("on"));
    }

    #[test]
    fn percentage_clips() {
        assert_eq!(percentage(2850.0, 3200.0, 2000.0), 0);
        assert_eq!(percentage(2850.0, 3200.0, 9000.0), 100);
        assert_eq!(percentage(2850.0, 3200.0, 2900.0), 14);
    }
}
