//! Standard cluster parsers

use super::{percentage, read_i16_le, read_u16_le, read_u24_le, read_u48_le};
use serde_json::{json, Map, Value};
use zcl::data_type;

pub(super) fn battery_voltage(attribute_id: u16, data_type: u8, data: &[u8]) -> Option<Value> {
    if attribute_id != 0x0020 || data_type != data_type::UNSIGNED_8BIT || data.len() != 1 {
        return None;
    }

    Some(json!(percentage(2850.0, 3200.0, f64::from(data[0]) * 100.0)))
}

pub(super) fn battery_percentage(
    options: &Map<String, Value>,
    attribute_id: u16,
    data_type: u8,
    data: &[u8],
) -> Option<Value> {
    if attribute_id != 0x0021 || data_type != data_type::UNSIGNED_8BIT || data.len() != 1 {
        return None;
    }

    let undivided = options
        .get("batteryUndivided")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    Some(json!(f64::from(data[0]) / if undivided { 1.0 } else { 2.0 }))
}

pub(super) fn status(attribute_id: u16, data_type: u8, data: &[u8]) -> Option<Value> {
    if attribute_id != 0x0000
        || (data_type != data_type::BOOLEAN && data_type != data_type::UNSIGNED_8BIT)
        || data.len() != 1
    {
        return None;
    }

    Some(json!(if data[0] != 0 { "on" } else { "off" }))
}

pub(super) fn contact(attribute_id: u16, data_type: u8, data: &[u8]) -> Option<Value> {
    if attribute_id != 0x0000 || data_type != data_type::BOOLEAN || data.len() != 1 {
        return None;
    }

    Some(json!(data[0] != 0))
}

pub(super) fn power_on_status(attribute_id: u16, data_type: u8, data: &[u8]) -> Option<Value> {
    if attribute_id != 0x4003 || data_type != data_type::ENUM_8BIT || data.len() != 1 {
        return None;
    }

    match data[0] {
        0x00 => Some(json!("off")),
        0x01 => Some(json!("on")),
        0x02 => Some(json!("toggle")),
        0xFF => Some(json!("previous")),
        _ => None,
    }
}

pub(super) fn level(attribute_id: u16, data_type: u8, data: &[u8]) -> Option<Value> {
    if attribute_id != 0x0000 || data_type != data_type::UNSIGNED_8BIT || data.len() != 1 {
        return None;
    }

    Some(json!(data[0]))
}

pub(super) fn color_hs(
    hue: &mut Option<u8>,
    saturation: &mut Option<u8>,
    attribute_id: u16,
    data_type: u8,
    data: &[u8],
) -> Option<Value> {
    if data_type != data_type::UNSIGNED_8BIT || data.len() != 1 {
        return None;
    }

    match attribute_id {
        0x0000 => *hue = Some(data[0]),
        0x0001 => *saturation = Some(data[0]),
        _ => return None,
    }

    // emit only once both components have been seen
    Some(json!([(*hue)?, (*saturation)?]))
}

pub(super) fn color_xy(
    x: &mut Option<f64>,
    y: &mut Option<f64>,
    attribute_id: u16,
    data_type: u8,
    data: &[u8],
) -> Option<Value> {
    if data_type != data_type::UNSIGNED_16BIT || data.len() != 2 {
        return None;
    }

    let value = f64::from(read_u16_le(data)) / f64::from(0xFFFFu16);

    match attribute_id {
        0x0003 => *x = Some(value),
        0x0004 => *y = Some(value),
        _ => return None,
    }

    Some(json!([(*x)?, (*y)?]))
}

pub(super) fn color_temperature(attribute_id: u16, data_type: u8, data: &[u8]) -> Option<Value> {
    if attribute_id != 0x0007 || data_type != data_type::UNSIGNED_16BIT || data.len() != 2 {
        return None;
    }

    Some(json!(read_u16_le(data)))
}

pub(super) fn illuminance(attribute_id: u16, data_type: u8, data: &[u8]) -> Option<Value> {
    if attribute_id != 0x0000 || data_type != data_type::UNSIGNED_16BIT || data.len() != 2 {
        return None;
    }

    let raw = read_u16_le(data);
    let lux = if raw != 0 {
        10f64.powf((f64::from(raw) - 1.0) / 10000.0) as u32
    } else {
        0
    };

    Some(json!(lux))
}

pub(super) fn temperature(attribute_id: u16, data_type: u8, data: &[u8]) -> Option<Value> {
    if attribute_id != 0x0000 || data_type != data_type::SIGNED_16BIT || data.len() != 2 {
        return None;
    }

    Some(json!(f64::from(read_i16_le(data)) / 100.0))
}

pub(super) fn humidity(attribute_id: u16, data_type: u8, data: &[u8]) -> Option<Value> {
    if attribute_id != 0x0000 || data_type != data_type::UNSIGNED_16BIT || data.len() != 2 {
        return None;
    }

    Some(json!(f64::from(read_u16_le(data)) / 100.0))
}

pub(super) fn occupancy(attribute_id: u16, data_type: u8, data: &[u8]) -> Option<Value> {
    if attribute_id != 0x0000 || data_type != data_type::BITMAP_8BIT || data.len() != 1 {
        return None;
    }

    Some(json!(data[0] != 0))
}

pub(super) fn energy(
    multiplier: &mut u32,
    divider: &mut u32,
    attribute_id: u16,
    data_type: u8,
    data: &[u8],
) -> Option<Value> {
    match attribute_id {
        0x0000 => {
            if data_type != data_type::UNSIGNED_48BIT
                || data.len() != 6
                || *multiplier == 0
                || *divider == 0
            {
                return None;
            }

            Some(scaled(read_u48_le(data) as f64, *multiplier, *divider))
        }
        0x0301 | 0x0302 => {
            if data_type != data_type::UNSIGNED_24BIT || data.len() != 3 {
                return None;
            }

            if attribute_id == 0x0301 {
                *multiplier = read_u24_le(data);
            } else {
                *divider = read_u24_le(data);
            }

            None
        }
        _ => None,
    }
}

pub(super) fn power(
    multiplier: &mut u32,
    divider: &mut u32,
    attribute_id: u16,
    data_type: u8,
    data: &[u8],
) -> Option<Value> {
    match attribute_id {
        0x050B => {
            if data_type != data_type::SIGNED_16BIT
                || data.len() != 2
                || *multiplier == 0
                || *divider == 0
            {
                return None;
            }

            Some(scaled(f64::from(read_i16_le(data)), *multiplier, *divider))
        }
        0x0604 | 0x0605 => {
            if data_type != data_type::UNSIGNED_16BIT || data.len() != 2 {
                return None;
            }

            if attribute_id == 0x0604 {
                *multiplier = u32::from(read_u16_le(data));
            } else {
                *divider = u32::from(read_u16_le(data));
            }

            None
        }
        _ => None,
    }
}

fn scaled(raw: f64, multiplier: u32, divider: u32) -> Value {
    if multiplier > 1 || divider > 1 {
        json!(raw * f64::from(multiplier) / f64::from(divider))
    } else {
        json!(raw as i64)
    }
}

pub(super) fn scene(
    options: &Map<String, Value>,
    command_id: u8,
    payload: &[u8],
) -> Option<Value> {
    if command_id != 0x05 || payload.len() < 3 {
        return None;
    }

    let scene_id = payload[2]; // recall: groupId u16, sceneId u8

    match options
        .get("scenes")
        .and_then(Value::as_object)
        .and_then(|scenes| scenes.get(&scene_id.to_string()))
    {
        Some(label) => Some(label.clone()),
        None => Some(json!(scene_id)),
    }
}

pub(super) fn identify_action(command_id: u8) -> Option<Value> {
    (command_id == 0x01).then(|| json!("identify"))
}

pub(super) fn switch_action(command_id: u8) -> Option<Value> {
    match command_id {
        0x00 => Some(json!("off")),
        0x01 => Some(json!("on")),
        0x02 => Some(json!("toggle")),
        _ => None,
    }
}

pub(super) fn level_action(command_id: u8) -> Option<Value> {
    match command_id {
        0x01 => Some(json!("moveDown")),
        0x05 => Some(json!("moveUp")),
        0x07 => Some(json!("moveStop")),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::super::Property;
    use serde_json::json;
    use zcl::data_type;

    #[test]
    fn battery_voltage_range() {
        let mut property = Property::battery_voltage();
        assert!(property.parse_attribute(0x0020, data_type::UNSIGNED_8BIT, &[0x1D]));
        assert_eq!(property.value(), &json!(14));

        // clipped at both ends
        property.parse_attribute(0x0020, data_type::UNSIGNED_8BIT, &[20]);
        assert_eq!(property.value(), &json!(0));
        property.parse_attribute(0x0020, data_type::UNSIGNED_8BIT, &[40]);
        assert_eq!(property.value(), &json!(100));
    }

    #[test]
    fn battery_percentage_divides_by_default() {
        let mut property = Property::battery_percentage();
        property.parse_attribute(0x0021, data_type::UNSIGNED_8BIT, &[0xC8]);
        assert_eq!(property.value(), &json!(100.0));

        let mut undivided = Property::battery_percentage().with_option("batteryUndivided", json!(true));
        undivided.parse_attribute(0x0021, data_type::UNSIGNED_8BIT, &[0x64]);
        assert_eq!(undivided.value(), &json!(100.0));
    }

    #[test]
    fn power_on_status_enum() {
        let mut property = Property::power_on_status();
        for (raw, expected) in [(0u8, "off"), (1, "on"), (2, "toggle"), (0xFF, "previous")] {
            property.parse_attribute(0x4003, data_type::ENUM_8BIT, &[raw]);
            assert_eq!(property.value(), &json!(expected));
        }
    }

    #[test]
    fn color_hs_waits_for_both_components() {
        let mut property = Property::color_hs();
        assert!(!property.parse_attribute(0x0000, data_type::UNSIGNED_8BIT, &[120]));
        assert_eq!(property.value(), &serde_json::Value::Null);

        assert!(property.parse_attribute(0x0001, data_type::UNSIGNED_8BIT, &[200]));
        assert_eq!(property.value(), &json!([120, 200]));
    }

    #[test]
    fn color_xy_scales_to_unit_range() {
        let mut property = Property::color_xy();
        property.parse_attribute(0x0003, data_type::UNSIGNED_16BIT, &[0xFF, 0x7F]);
        assert!(property.parse_attribute(0x0004, data_type::UNSIGNED_16BIT, &[0x00, 0x40]));

        let value = property.value().as_array().unwrap();
        assert!((value[0].as_f64().unwrap() - 0.499_992_4).abs() < 1e-6);
        assert!((value[1].as_f64().unwrap() - 0.250_003_81).abs() < 1e-6);
    }

    #[test]
    fn illuminance_is_logarithmic() {
        let mut property = Property::illuminance();
        property.parse_attribute(0x0000, data_type::UNSIGNED_16BIT, &[0x00, 0x00]);
        assert_eq!(property.value(), &json!(0));

        // raw 30001 -> 10^3 = 1000 lux
        property.parse_attribute(0x0000, data_type::UNSIGNED_16BIT, &[0x31, 0x75]);
        assert_eq!(property.value(), &json!(1000));
    }

    #[test]
    fn temperature_is_signed_centi() {
        let mut property = Property::temperature();
        property.parse_attribute(0x0000, data_type::SIGNED_16BIT, &[0x98, 0xF8]);
        assert_eq!(property.value(), &json!(-18.96));
    }

    #[test]
    fn energy_waits_for_scaling_attributes() {
        let mut property = Property::energy();
        assert!(!property.parse_attribute(
            0x0000,
            data_type::UNSIGNED_48BIT,
            &[0x10, 0x27, 0x00, 0x00, 0x00, 0x00],
        ));

        property.parse_attribute(0x0301, data_type::UNSIGNED_24BIT, &[0x01, 0x00, 0x00]);
        property.parse_attribute(0x0302, data_type::UNSIGNED_24BIT, &[0xE8, 0x03, 0x00]);

        assert!(property.parse_attribute(
            0x0000,
            data_type::UNSIGNED_48BIT,
            &[0x10, 0x27, 0x00, 0x00, 0x00, 0x00],
        ));
        assert_eq!(property.value(), &json!(10.0)); // 10000 / 1000
    }

    #[test]
    fn power_plain_when_unscaled() {
        let mut property = Property::power();
        property.parse_attribute(0x0604, data_type::UNSIGNED_16BIT, &[0x01, 0x00]);
        property.parse_attribute(0x0605, data_type::UNSIGNED_16BIT, &[0x01, 0x00]);
        property.parse_attribute(0x050B, data_type::SIGNED_16BIT, &[0x2C, 0x01]);
        assert_eq!(property.value(), &json!(300));
    }

    #[test]
    fn scene_recall_uses_label_when_configured() {
        let mut property = Property::scene().with_option("scenes", json!({"2": "movie"}));
        assert!(property.parse_command(0x05, &[0x00, 0x00, 0x02]));
        assert_eq!(property.value(), &json!("movie"));

        property.parse_command(0x05, &[0x00, 0x00, 0x07]);
        assert_eq!(property.value(), &json!(7));
    }

    #[test]
    fn action_commands() {
        let mut property = Property::level_action();
        property.parse_command(0x05, &[]);
        assert_eq!(property.value(), &json!("moveUp"));
        property.parse_command(0x07, &[]);
        assert_eq!(property.value(), &json!("moveStop"));
    }
}
