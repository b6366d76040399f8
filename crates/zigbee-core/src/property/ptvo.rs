//! PTVO custom-firmware parsers

use super::read_f32_le;
use serde_json::{json, Value};
use zcl::data_type;

/// Analog channel with a unit string: the float at 0x0055 is buffered
/// and only committed when the matching unit arrives at 0x001C.
pub(super) fn buffered_analog(
    buffer: &mut Option<f64>,
    unit: &str,
    attribute_id: u16,
    data_type: u8,
    data: &[u8],
) -> Option<Value> {
    match attribute_id {
        0x0055 => {
            if data_type != data_type::SINGLE_PRECISION || data.len() != 4 {
                return None;
            }

            *buffer = Some(f64::from(read_f32_le(data)));
            None
        }

        0x001C => {
            if data_type != data_type::CHARACTER_STRING || data != unit.as_bytes() {
                return None;
            }

            buffer.map(|value| json!(value))
        }

        _ => None,
    }
}

pub(super) fn change_pattern(attribute_id: u16, data_type: u8, data: &[u8]) -> Option<Value> {
    if attribute_id != 0x0000 || data_type != data_type::BOOLEAN || data.len() != 1 {
        return None;
    }

    Some(json!(if data[0] != 0 { "on" } else { "off" }))
}

pub(super) fn pattern(attribute_id: u16, data_type: u8, data: &[u8]) -> Option<Value> {
    if attribute_id != 0x0055 || data_type != data_type::SINGLE_PRECISION || data.len() != 4 {
        return None;
    }

    Some(json!(read_f32_le(data) as u8))
}

pub(super) fn switch_action(attribute_id: u16, data_type: u8, data: &[u8]) -> Option<Value> {
    if attribute_id != 0x0055 || data_type != data_type::UNSIGNED_8BIT || data.len() != 1 {
        return None;
    }

    Some(json!(if data[0] != 0 { "on" } else { "off" }))
}

#[cfg(test)]
mod tests {
    use super::super::Property;
    use serde_json::json;
    use zcl::data_type;

    #[test]
    fn co2_committed_by_unit_string() {
        let mut property = Property::ptvo_co2();

        // the float alone does not publish
        assert!(!property.parse_attribute(0x0055, data_type::SINGLE_PRECISION, &650f32.to_le_bytes()));
        assert_eq!(property.value(), &serde_json::Value::Null);

        // wrong unit keeps it buffered
        assert!(!property.parse_attribute(0x001C, data_type::CHARACTER_STRING, b"C"));

        assert!(property.parse_attribute(0x001C, data_type::CHARACTER_STRING, b"ppm"));
        assert_eq!(property.value(), &json!(650.0));
    }

    #[test]
    fn pattern_truncates_float() {
        let mut property = Property::ptvo_pattern();
        property.parse_attribute(0x0055, data_type::SINGLE_PRECISION, &3.7f32.to_le_bytes());
        assert_eq!(property.value(), &json!(3));
    }
}
