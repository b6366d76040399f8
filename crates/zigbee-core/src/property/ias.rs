//! IAS Zone status-change parser

use super::{read_u16_le, value_map};
use serde_json::{json, Value};

/// Zone status change notification (command 0x00).
///
/// Bit 0 carries the zone's semantic boolean under the property name;
/// tamper and low-battery flags are only ever set, matching the peers
/// that report them edge-triggered.
pub(super) fn zone_status(
    name: &str,
    current: &Value,
    command_id: u8,
    payload: &[u8],
) -> Option<Value> {
    if command_id != 0x00 || payload.len() < 2 {
        return None;
    }

    let status = read_u16_le(payload);
    let mut map = value_map(current);

    map.insert(name.to_string(), json!(status & 0x0001 != 0));

    if status & 0x0004 != 0 {
        map.insert("tamper".to_string(), json!(true));
    }

    if status & 0x0008 != 0 {
        map.insert("batteryLow".to_string(), json!(true));
    }

    Some(Value::Object(map))
}
