//! Konke, LifeControl and Perenio parsers

use super::{read_i16_le, read_u16_le, read_u32_le, value_map};
use serde_json::{json, Value};
use zcl::data_type;

pub(super) fn konke_button_action(attribute_id: u16, data_type: u8, data: &[u8]) -> Option<Value> {
    if attribute_id != 0x0000 || data_type != data_type::BOOLEAN || data.len() != 1 {
        return None;
    }

    match data[0] {
        0x80 => Some(json!("singleClick")),
        0x81 => Some(json!("doubleClick")),
        0x82 => Some(json!("longClick")),
        _ => None,
    }
}

pub(super) fn life_control_air_quality(
    current: &Value,
    attribute_id: u16,
    data_type: u8,
    data: &[u8],
) -> Option<Value> {
    if (data_type != data_type::UNSIGNED_16BIT && data_type != data_type::SIGNED_16BIT)
        || data.len() != 2
    {
        return None;
    }

    let mut map = value_map(current);

    match attribute_id {
        0x0000 => {
            map.insert("temperature".to_string(), json!(f64::from(read_i16_le(data)) / 100.0));
        }
        0x0001 => {
            map.insert("humidity".to_string(), json!(f64::from(read_u16_le(data)) / 100.0));
        }
        0x0002 => {
            map.insert("eco2".to_string(), json!(read_u16_le(data)));
        }
        0x0003 => {
            map.insert("voc".to_string(), json!(read_u16_le(data)));
        }
        _ => return None,
    }

    Some(Value::Object(map))
}

pub(super) fn perenio_smart_plug(
    current: &Value,
    attribute_id: u16,
    data_type: u8,
    data: &[u8],
) -> Option<Value> {
    let mut map = value_map(current);

    match attribute_id {
        0x0000 => {
            if data_type != data_type::UNSIGNED_8BIT || data.len() != 1 {
                return None;
            }

            let status = match data[0] {
                0x00 => "off",
                0x01 => "on",
                0x02 => "previous",
                _ => return None,
            };
            map.insert("powerOnStatus".to_string(), json!(status));
        }

        0x0001 => {
            if data_type != data_type::UNSIGNED_8BIT || data.len() != 1 {
                return None;
            }

            map.insert("alarmVoltageMin".to_string(), json!(data[0] & 0x01 != 0));
            map.insert("alarmVoltageMax".to_string(), json!(data[0] & 0x02 != 0));
            map.insert("alarmPowerMax".to_string(), json!(data[0] & 0x04 != 0));
            map.insert("alarmEnergyLimit".to_string(), json!(data[0] & 0x08 != 0));
        }

        0x000E => {
            if data_type != data_type::UNSIGNED_32BIT || data.len() != 4 {
                return None;
            }

            map.insert("energy".to_string(), json!(f64::from(read_u32_le(data)) / 1000.0));
        }

        _ => {
            if data_type != data_type::UNSIGNED_16BIT || data.len() != 2 {
                return None;
            }

            let key = match attribute_id {
                0x0003 => "voltage",
                0x0004 => "voltageMin",
                0x0005 => "voltageMax",
                0x000A => "power",
                0x000B => "powerMax",
                0x000F => "energyLimit",
                _ => return None,
            };
            map.insert(key.to_string(), json!(read_u16_le(data)));
        }
    }

    Some(Value::Object(map))
}

#[cfg(test)]
mod tests {
    use super::super::Property;
    use serde_json::json;
    use zcl::data_type;

    #[test]
    fn konke_clicks() {
        let mut property = Property::konke_button_action();
        property.parse_attribute(0x0000, data_type::BOOLEAN, &[0x81]);
        assert_eq!(property.value(), &json!("doubleClick"));
        assert!(!property.parse_attribute(0x0000, data_type::BOOLEAN, &[0x01]));
    }

    #[test]
    fn air_quality_accumulates() {
        let mut property = Property::life_control_air_quality();
        property.parse_attribute(0x0000, data_type::SIGNED_16BIT, &2150i16.to_le_bytes());
        property.parse_attribute(0x0002, data_type::UNSIGNED_16BIT, &800u16.to_le_bytes());
        assert_eq!(property.value(), &json!({"temperature": 21.5, "eco2": 800}));
    }

    #[test]
    fn smart_plug_alarm_bits() {
        let mut property = Property::perenio_smart_plug();
        property.parse_attribute(0x0001, data_type::UNSIGNED_8BIT, &[0x05]);
        assert_eq!(
            property.value(),
            &json!({
                "alarmVoltageMin": true,
                "alarmVoltageMax": false,
                "alarmPowerMax": true,
                "alarmEnergyLimit": false,
            })
        );

        property.parse_attribute(0x000E, data_type::UNSIGNED_32BIT, &1500u32.to_le_bytes());
        assert_eq!(property.value().get("energy"), Some(&json!(1.5)));
    }
}
