//! Outgoing device actions: named verbs the outer API can invoke

use serde_json::Value;
use zcl::frame::frame_control;
use zcl::{cluster, commands, data_type, zcl_header};

/// An invokable verb attached to an endpoint
#[derive(Debug, Clone)]
pub struct Action {
    name: &'static str,
    cluster_id: u16,
    attribute_id: u16,
    manufacturer_code: u16,
    poll: bool,
    kind: ActionKind,
}

#[derive(Debug, Clone, Copy)]
enum ActionKind {
    Status,
    Level,
    ColorHs,
    ColorXy,
    ColorTemperature,
    PowerOnStatus,
}

impl Action {
    #[must_use]
    pub fn status() -> Self {
        Self {
            name: "status",
            cluster_id: cluster::ON_OFF,
            attribute_id: 0x0000,
            manufacturer_code: 0,
            poll: true,
            kind: ActionKind::Status,
        }
    }

    #[must_use]
    pub fn level() -> Self {
        Self {
            name: "level",
            cluster_id: cluster::LEVEL_CONTROL,
            attribute_id: 0x0000,
            manufacturer_code: 0,
            poll: true,
            kind: ActionKind::Level,
        }
    }

    #[must_use]
    pub fn color_hs() -> Self {
        Self {
            name: "color",
            cluster_id: cluster::COLOR_CONTROL,
            attribute_id: 0x0000,
            manufacturer_code: 0,
            poll: false,
            kind: ActionKind::ColorHs,
        }
    }

    #[must_use]
    pub fn color_xy() -> Self {
        Self {
            name: "color",
            cluster_id: cluster::COLOR_CONTROL,
            attribute_id: 0x0003,
            manufacturer_code: 0,
            poll: false,
            kind: ActionKind::ColorXy,
        }
    }

    #[must_use]
    pub fn color_temperature() -> Self {
        Self {
            name: "colorTemperature",
            cluster_id: cluster::COLOR_CONTROL,
            attribute_id: 0x0007,
            manufacturer_code: 0,
            poll: false,
            kind: ActionKind::ColorTemperature,
        }
    }

    #[must_use]
    pub fn power_on_status() -> Self {
        Self {
            name: "powerOnStatus",
            cluster_id: cluster::ON_OFF,
            attribute_id: 0x4003,
            manufacturer_code: 0,
            poll: true,
            kind: ActionKind::PowerOnStatus,
        }
    }

    /// Transient action for group requests, resolved by name
    #[must_use]
    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "status" => Some(Self::status()),
            "level" => Some(Self::level()),
            "color" => Some(Self::color_xy()),
            "colorTemperature" => Some(Self::color_temperature()),
            _ => None,
        }
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
    pub fn attribute_id(&self) -> u16 {
        self.attribute_id
    }

    #[must_use]
    pub fn manufacturer_code(&self) -> u16 {
        self.manufacturer_code
    }

    /// Whether the action is followed by an attribute re-read
    #[must_use]
    pub fn poll(&self) -> bool {
        self.poll
    }

    /// Build the outgoing frame for this action; `None` when the
    /// argument does not fit the verb.
    #[must_use]
    pub fn request(&self, transaction_id: u8, value: &Value) -> Option<Vec<u8>> {
        match self.kind {
            ActionKind::Status => {
                let command_id = match value.as_str()? {
                    "off" => 0x00,
                    "on" => 0x01,
                    "toggle" => 0x02,
                    _ => return None,
                };
                Some(zcl_header(frame_control::CLUSTER_SPECIFIC, transaction_id, command_id))
            }

            ActionKind::Level => match value {
                Value::Number(_) => {
                    let level = value.as_u64()?.min(0xFF) as u8;
                    let mut request =
                        zcl_header(frame_control::CLUSTER_SPECIFIC, transaction_id, 0x00);
                    request.push(level);
                    request.extend_from_slice(&0u16.to_le_bytes()); // transition time
                    Some(request)
                }
                Value::String(direction) => {
                    let (command_id, payload): (u8, &[u8]) = match direction.as_str() {
                        "moveUp" => (0x01, &[0x00, 0x55]),
                        "moveDown" => (0x01, &[0x01, 0x55]),
                        "moveStop" => (0x07, &[]),
                        _ => return None,
                    };
                    let mut request =
                        zcl_header(frame_control::CLUSTER_SPECIFIC, transaction_id, command_id);
                    request.extend_from_slice(payload);
                    Some(request)
                }
                _ => None,
            },

            ActionKind::ColorHs => {
                let components = value.as_array()?;
                let hue = components.first()?.as_u64()?.min(0xFF) as u8;
                let saturation = components.get(1)?.as_u64()?.min(0xFF) as u8;
                let mut request = zcl_header(frame_control::CLUSTER_SPECIFIC, transaction_id, 0x06);
                request.push(hue);
                request.push(saturation);
                request.extend_from_slice(&0u16.to_le_bytes());
                Some(request)
            }

            ActionKind::ColorXy => {
                let components = value.as_array()?;
                let x = (components.first()?.as_f64()?.clamp(0.0, 1.0) * 65535.0) as u16;
                let y = (components.get(1)?.as_f64()?.clamp(0.0, 1.0) * 65535.0) as u16;
                let mut request = zcl_header(frame_control::CLUSTER_SPECIFIC, transaction_id, 0x07);
                request.extend_from_slice(&x.to_le_bytes());
                request.extend_from_slice(&y.to_le_bytes());
                request.extend_from_slice(&0u16.to_le_bytes());
                Some(request)
            }

            ActionKind::ColorTemperature => {
                let mireds = value.as_u64()?.min(0xFFFF) as u16;
                let mut request = zcl_header(frame_control::CLUSTER_SPECIFIC, transaction_id, 0x0A);
                request.extend_from_slice(&mireds.to_le_bytes());
                request.extend_from_slice(&0u16.to_le_bytes());
                Some(request)
            }

            ActionKind::PowerOnStatus => {
                let mode = match value.as_str()? {
                    "off" => 0x00,
                    "on" => 0x01,
                    "toggle" => 0x02,
                    "previous" => 0xFF,
                    _ => return None,
                };
                let mut request =
                    zcl_header(0x00, transaction_id, zcl::global::WRITE_ATTRIBUTES);
                request.extend_from_slice(&commands::write_attribute_record(
                    0x4003,
                    data_type::ENUM_8BIT,
                    &[mode],
                ));
                Some(request)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_commands() {
        let action = Action::status();
        assert_eq!(action.request(0x10, &json!("toggle")), Some(vec![0x01, 0x10, 0x02]));
        assert_eq!(action.request(0x10, &json!("dim")), None);
    }

    #[test]
    fn level_argument_forms() {
        let action = Action::level();
        assert_eq!(
            action.request(0x02, &json!(128)),
            Some(vec![0x01, 0x02, 0x00, 0x80, 0x00, 0x00])
        );
        assert_eq!(
            action.request(0x03, &json!("moveStop")),
            Some(vec![0x01, 0x03, 0x07])
        );
    }

    #[test]
    fn color_xy_scales() {
        let action = Action::color_xy();
        let request = action.request(0x01, &json!([0.5, 0.25])).unwrap();
        assert_eq!(&request[..3], &[0x01, 0x01, 0x07]);
        assert_eq!(u16::from_le_bytes([request[3], request[4]]), 32767);
        assert_eq!(u16::from_le_bytes([request[5], request[6]]), 16383);
    }

    #[test]
    fn power_on_status_writes_attribute() {
        let action = Action::power_on_status();
        let request = action.request(0x05, &json!("previous")).unwrap();
        assert_eq!(request, vec![0x00, 0x05, 0x02, 0x03, 0x40, 0x30, 0xFF]);
    }
}
