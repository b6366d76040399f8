//! LUMI (Xiaomi/Aqara) vendor parsers

use super::{percentage, read_f32_le, read_u16_le, read_u32_le, value_map};
use serde_json::{json, Map, Value};
use zcl::data_type;

/// Models with per-datapoint special cases
const REMOTE_B686OPCN01: &str = "lumi.remote.b686opcn01";
const ILLUMINANCE_MGL01: &str = "lumi.sen_ill.mgl01";
const MOTION_AC01: &str = "lumi.motion.ac01";

/// The 0xF7 aggregate attribute and its loose datapoint cousins.
///
/// The octet string is a sequence of (datapoint, item type, value)
/// records whose value length follows ZCL data-type sizing. Direct
/// attributes are treated as a single record keyed by the attribute id.
pub(super) fn data(
    model_name: &str,
    version: u8,
    current: &Value,
    attribute_id: u16,
    data_type: u8,
    data: &[u8],
) -> Option<Value> {
    let mut map = value_map(current);

    if attribute_id == 0x00F7 {
        if data_type != data_type::OCTET_STRING {
            return None;
        }

        let mut index = 0;
        while index + 1 < data.len() {
            let item_type = data[index + 1];
            let mut offset = index + 2;
            let size = zcl::data_size(item_type, data, &mut offset);

            if size == 0 || data.len() < offset + size {
                break;
            }

            parse_data(
                u16::from(data[index]),
                item_type,
                &data[offset..offset + size],
                model_name,
                version,
                &mut map,
            );
            index = offset + size;
        }
    } else {
        parse_data(attribute_id, data_type, data, model_name, version, &mut map);
    }

    if map.is_empty() {
        return None;
    }

    Some(Value::Object(map))
}

fn parse_data(
    data_point: u16,
    data_type: u8,
    data: &[u8],
    model_name: &str,
    version: u8,
    map: &mut Map<String, Value>,
) {
    match data_point {
        0x0003 => {
            if model_name != REMOTE_B686OPCN01 && model_name != ILLUMINANCE_MGL01 {
                if data_type != data_type::SIGNED_8BIT || data.len() != 1 {
                    return;
                }

                map.insert("temperature".to_string(), json!(data[0] as i8));
            }
        }

        0x0005 => {
            if data_type != data_type::UNSIGNED_16BIT || data.len() != 2 {
                return;
            }

            map.insert("outageCount".to_string(), json!(read_u16_le(data).saturating_sub(1)));
        }

        0x0009 => {
            if model_name == REMOTE_B686OPCN01 {
                if data_type != data_type::UNSIGNED_8BIT || data.len() != 1 {
                    return;
                }

                let mode = ["command", "event"].get(data[0] as usize).copied().unwrap_or("unknown");
                map.insert("mode".to_string(), json!(mode));
            }
        }

        0x0064 => {
            if model_name == ILLUMINANCE_MGL01 {
                if data_type != data_type::UNSIGNED_32BIT || data.len() != 4 {
                    return;
                }

                map.insert("illuminance".to_string(), json!(read_u32_le(data)));
            }
        }

        0x0065 | 0x0142 => {
            if model_name == MOTION_AC01 {
                if data_type != data_type::SIGNED_8BIT || data.len() != 1 {
                    return;
                }

                map.insert("occupancy".to_string(), json!(data[0] != 0));
            }
        }

        0x0066 | 0x010C | 0x0143 => {
            if model_name == MOTION_AC01 {
                if data_type != data_type::UNSIGNED_8BIT || data.len() != 1 {
                    return;
                }

                // datapoint 0x0066 switched meaning at firmware 50
                let sensitivity = match data_point {
                    0x0066 => version < 50,
                    other => other == 0x010C,
                };

                if sensitivity {
                    let level = ["low", "medium", "high"]
                        .get((data[0] as usize).wrapping_sub(1))
                        .copied()
                        .unwrap_or("unknown");
                    map.insert("sensitivity".to_string(), json!(level));
                } else {
                    let event = [
                        "enter",
                        "leave",
                        "enterLeft",
                        "leaveRight",
                        "enterRight",
                        "leaveLeft",
                        "approach",
                        "absent",
                    ]
                    .get(data[0] as usize)
                    .copied()
                    .unwrap_or("unknown");
                    map.insert("event".to_string(), json!(event));
                    map.insert("occupancy".to_string(), json!(data[0] != 0x01));
                }
            }
        }

        0x0067 | 0x0144 => {
            if model_name == MOTION_AC01 {
                if data_type != data_type::UNSIGNED_8BIT || data.len() != 1 {
                    return;
                }

                let mode = ["undirected", "directed"].get(data[0] as usize).copied().unwrap_or("unknown");
                map.insert("mode".to_string(), json!(mode));
            }
        }

        0x0069 | 0x0146 => {
            if model_name == MOTION_AC01 {
                if data_type != data_type::UNSIGNED_8BIT || data.len() != 1 {
                    return;
                }

                let distance = ["far", "middle", "near"].get(data[0] as usize).copied().unwrap_or("unknown");
                map.insert("distance".to_string(), json!(distance));
            }
        }

        0x0095 => {
            if data_type != data_type::SINGLE_PRECISION || data.len() != 4 {
                return;
            }

            map.insert("energy".to_string(), json!(round_to(f64::from(read_f32_le(data)), 100.0)));
        }

        0x0096 => {
            if data_type != data_type::SINGLE_PRECISION || data.len() != 4 {
                return;
            }

            map.insert("voltage".to_string(), json!(f64::from(read_f32_le(data)).round() / 10.0));
        }

        0x0097 => {
            if data_type != data_type::SINGLE_PRECISION || data.len() != 4 {
                return;
            }

            map.insert("current".to_string(), json!(f64::from(read_f32_le(data)).round() / 1000.0));
        }

        0x0098 => {
            if data_type != data_type::SINGLE_PRECISION || data.len() != 4 {
                return;
            }

            map.insert("power".to_string(), json!(round_to(f64::from(read_f32_le(data)), 100.0)));
        }

        _ => {}
    }
}

fn round_to(value: f64, scale: f64) -> f64 {
    (value * scale).round() / scale
}

pub(super) fn battery_voltage(attribute_id: u16, data_type: u8, data: &[u8]) -> Option<Value> {
    match attribute_id {
        0xFF01 => {
            if data_type != data_type::CHARACTER_STRING || data.len() < 4 {
                return None;
            }

            Some(json!(percentage(2850.0, 3200.0, f64::from(read_u16_le(&data[2..4])))))
        }

        0xFF02 => {
            if data_type != data_type::STRUCTURE || data.len() < 7 {
                return None;
            }

            Some(json!(percentage(2850.0, 3200.0, f64::from(read_u16_le(&data[5..7])))))
        }

        _ => None,
    }
}

pub(super) fn power(attribute_id: u16, data_type: u8, data: &[u8]) -> Option<Value> {
    if attribute_id != 0x0055 || data_type != data_type::SINGLE_PRECISION || data.len() != 4 {
        return None;
    }

    Some(json!(round_to(f64::from(read_f32_le(data)), 100.0)))
}

pub(super) fn button_action(attribute_id: u16, data_type: u8, data: &[u8]) -> Option<Value> {
    let valid = (attribute_id == 0x0000 && data_type == data_type::BOOLEAN)
        || (attribute_id == 0x8000 && data_type == data_type::UNSIGNED_8BIT);

    if !valid || data.len() != 1 {
        return None;
    }

    match data[0] {
        0x00 => Some(json!("on")),
        0x01 => Some(json!("off")),
        0x02 => Some(json!("doubleClick")),
        0x03 => Some(json!("tripleClick")),
        0x04 => Some(json!("quadrupleClick")),
        0x80 => Some(json!("multipleClick")),
        _ => None,
    }
}

pub(super) fn switch_action(attribute_id: u16, data_type: u8, data: &[u8]) -> Option<Value> {
    if attribute_id != 0x0055 || data_type != data_type::UNSIGNED_16BIT || data.len() != 2 {
        return None;
    }

    match read_u16_le(data) {
        0x0000 => Some(json!("longClick")),
        0x0001 => Some(json!("singleClick")),
        0x0002 => Some(json!("doubleClick")),
        0x0003 => Some(json!("tripleClick")),
        0x00FF => Some(json!("release")),
        _ => None,
    }
}

pub(super) fn cube_rotation(attribute_id: u16, data_type: u8, data: &[u8]) -> Option<Value> {
    if attribute_id != 0x0055 || data_type != data_type::SINGLE_PRECISION || data.len() != 4 {
        return None;
    }

    Some(json!(if read_f32_le(data) < 0.0 { "rotateLeft" } else { "rotateRight" }))
}

pub(super) fn cube_movement(attribute_id: u16, data_type: u8, data: &[u8]) -> Option<Value> {
    if attribute_id != 0x0055 || data_type != data_type::UNSIGNED_16BIT || data.len() != 2 {
        return None;
    }

    let value = read_u16_le(data);

    let action = if value == 0 {
        "shake"
    } else if value == 2 {
        "wake"
    } else if value == 3 {
        "fall"
    } else if value >= 512 {
        "tap"
    } else if value >= 256 {
        "slide"
    } else if value >= 128 {
        "flip"
    } else if value >= 64 {
        "drop"
    } else {
        return None;
    };

    Some(json!(action))
}
