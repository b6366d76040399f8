//! TUYA vendor parsers

use super::value_map;
use serde_json::{json, Value};
use zcl::{data_type, TuyaEnvelope};

/// Decode a TUYA data-report command into (datapoint, value).
///
/// Value types: 0x01 bool, 0x02 u32 big-endian, 0x04 u8. Anything else
/// is dropped.
pub(super) fn command(command_id: u8, payload: &[u8]) -> Option<(u8, Value)> {
    if command_id != 0x01 && command_id != 0x02 {
        return None;
    }

    let envelope = TuyaEnvelope::parse(payload)?;

    let value = match envelope.data_type {
        0x01 if envelope.value.len() == 1 => json!(envelope.value[0] != 0),
        0x02 if envelope.value.len() == 4 => {
            json!(u32::from_be_bytes([
                envelope.value[0],
                envelope.value[1],
                envelope.value[2],
                envelope.value[3],
            ]))
        }
        0x04 if envelope.value.len() == 1 => json!(envelope.value[0]),
        _ => return None,
    };

    Some((envelope.data_point, value))
}

pub(super) fn neo_siren(current: &Value, data_point: u8, value: &Value) -> Option<Value> {
    let mut map = value_map(current);

    match data_point {
        0x05 => {
            let volume = ["low", "medium", "high"]
                .get(value.as_u64()? as usize)
                .copied()
                .unwrap_or("unknown");
            map.insert("volume".to_string(), json!(volume));
        }
        0x07 => {
            map.insert("duration".to_string(), value.clone());
        }
        0x0D => {
            map.insert("alarm".to_string(), value.clone());
        }
        0x0F => {
            map.insert("battery".to_string(), value.clone());
        }
        0x15 => {
            map.insert("melody".to_string(), value.clone());
        }
        _ => return None,
    }

    Some(Value::Object(map))
}

pub(super) fn presence_sensor(current: &Value, data_point: u8, value: &Value) -> Option<Value> {
    let mut map = value_map(current);

    match data_point {
        0x01 => {
            map.insert("occupancy".to_string(), value.clone());
        }
        0x02 => {
            map.insert("sensitivity".to_string(), value.clone());
        }
        0x03 => {
            map.insert("distanceMin".to_string(), json!(value.as_f64()? / 100.0));
        }
        0x04 => {
            map.insert("distanceMax".to_string(), json!(value.as_f64()? / 100.0));
        }
        0x65 => {
            map.insert("detectionDelay".to_string(), value.clone());
        }
        0x68 => {
            map.insert("illuminance".to_string(), value.clone());
        }
        _ => return None,
    }

    Some(Value::Object(map))
}

pub(super) fn power_on_status(attribute_id: u16, data_type: u8, data: &[u8]) -> Option<Value> {
    if attribute_id != 0x8002 || data_type != data_type::ENUM_8BIT || data.len() != 1 {
        return None;
    }

    match data[0] {
        0x00 => Some(json!("off")),
        0x01 => Some(json!("on")),
        0x02 => Some(json!("previous")),
        _ => None,
    }
}

pub(super) fn switch_type(attribute_id: u16, data_type: u8, data: &[u8]) -> Option<Value> {
    if attribute_id != 0x0030 || data_type != data_type::ENUM_8BIT || data.len() != 1 {
        return None;
    }

    match data[0] {
        0x00 => Some(json!("toggle")),
        0x01 => Some(json!("state")),
        0x02 => Some(json!("momentary")),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::super::Property;
    use serde_json::json;

    fn envelope(data_point: u8, data_type: u8, value: &[u8]) -> Vec<u8> {
        let mut payload = vec![0x00, 0x01, data_point, data_type];
        payload.extend_from_slice(&(value.len() as u16).to_be_bytes());
        payload.extend_from_slice(value);
        payload
    }

    #[test]
    fn siren_duration_from_u32_big_endian() {
        let mut property = Property::tuya_neo_siren();
        assert!(property.parse_command(0x01, &envelope(0x07, 0x02, &[0x00, 0x00, 0x00, 0x2A])));
        assert_eq!(property.value(), &json!({"duration": 42}));

        property.parse_command(0x02, &envelope(0x0D, 0x01, &[0x01]));
        assert_eq!(property.value(), &json!({"duration": 42, "alarm": true}));

        property.parse_command(0x01, &envelope(0x05, 0x04, &[0x02]));
        assert_eq!(
            property.value(),
            &json!({"duration": 42, "alarm": true, "volume": "high"})
        );
    }

    #[test]
    fn presence_sensor_distance_scaling() {
        let mut property = Property::tuya_presence_sensor();
        property.parse_command(0x01, &envelope(0x01, 0x01, &[0x01]));
        property.parse_command(0x01, &envelope(0x04, 0x02, &[0x00, 0x00, 0x02, 0x58]));
        assert_eq!(property.value(), &json!({"occupancy": true, "distanceMax": 6.0}));
    }

    #[test]
    fn unknown_value_type_ignored() {
        let mut property = Property::tuya_presence_sensor();
        assert!(!property.parse_command(0x01, &envelope(0x01, 0x03, &[0x01])));
        // wrong command id
        assert!(!property.parse_command(0x03, &envelope(0x01, 0x01, &[0x01])));
    }

    #[test]
    fn switch_type_enum() {
        let mut property = Property::tuya_switch_type();
        property.parse_attribute(0x0030, zcl::data_type::ENUM_8BIT, &[0x02]);
        assert_eq!(property.value(), &json!("momentary"));
    }
}
