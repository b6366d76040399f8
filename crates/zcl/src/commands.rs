//! ZCL global command ids, body builders and record walkers

use crate::frame::{zcl_header, zcl_header_manufacturer};
use crate::types::{data_size, fixed_data_size};
use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// Global (profile-wide) command ids
pub mod global {
    pub const READ_ATTRIBUTES: u8 = 0x00;
    pub const READ_ATTRIBUTES_RESPONSE: u8 = 0x01;
    pub const WRITE_ATTRIBUTES: u8 = 0x02;
    pub const WRITE_ATTRIBUTES_RESPONSE: u8 = 0x04;
    pub const CONFIGURE_REPORTING: u8 = 0x06;
    pub const CONFIGURE_REPORTING_RESPONSE: u8 = 0x07;
    pub const REPORT_ATTRIBUTES: u8 = 0x0A;
    pub const DEFAULT_RESPONSE: u8 = 0x0B;
}

/// Build a READ_ATTRIBUTES body for the given attribute list.
///
/// A zero `manufacturer_code` produces a plain header.
#[must_use]
pub fn read_attributes_request(
    transaction_id: u8,
    attributes: &[u16],
    manufacturer_code: u16,
) -> Vec<u8> {
    let mut request = if manufacturer_code != 0 {
        zcl_header_manufacturer(0x00, manufacturer_code, transaction_id, global::READ_ATTRIBUTES)
    } else {
        zcl_header(0x00, transaction_id, global::READ_ATTRIBUTES)
    };

    for &attribute_id in attributes {
        let mut bytes = [0u8; 2];
        LittleEndian::write_u16(&mut bytes, attribute_id);
        request.extend_from_slice(&bytes);
    }

    request
}

/// Build one WRITE_ATTRIBUTES record: attribute id, data type, raw value
#[must_use]
pub fn write_attribute_record(attribute_id: u16, data_type: u8, value: &[u8]) -> Vec<u8> {
    let mut record = Vec::with_capacity(3 + value.len());
    let mut bytes = [0u8; 2];
    LittleEndian::write_u16(&mut bytes, attribute_id);
    record.extend_from_slice(&bytes);
    record.push(data_type);
    record.extend_from_slice(value);
    record
}

/// Build one CONFIGURE_REPORTING record.
///
/// The reportable-change field is truncated to the data type's on-wire
/// width, matching what the node expects for analog types.
#[must_use]
pub fn configure_reporting_record(
    attribute_id: u16,
    data_type: u8,
    min_interval: u16,
    max_interval: u16,
    value_change: u64,
) -> Vec<u8> {
    let mut record = Vec::with_capacity(16);
    record.push(0x00); // direction: reported
    let mut bytes = [0u8; 2];
    LittleEndian::write_u16(&mut bytes, attribute_id);
    record.extend_from_slice(&bytes);
    record.push(data_type);
    LittleEndian::write_u16(&mut bytes, min_interval);
    record.extend_from_slice(&bytes);
    LittleEndian::write_u16(&mut bytes, max_interval);
    record.extend_from_slice(&bytes);

    let mut change = [0u8; 8];
    LittleEndian::write_u64(&mut change, value_change);
    record.extend_from_slice(&change[..fixed_data_size(data_type)]);
    record
}

/// Build a DEFAULT_RESPONSE body: the echoed command id and a status
#[must_use]
pub fn default_response(command_id: u8, status: u8) -> Vec<u8> {
    vec![command_id, status]
}

/// One attribute record from a REPORT_ATTRIBUTES or
/// READ_ATTRIBUTES_RESPONSE payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeRecord<'a> {
    pub attribute_id: u16,
    pub data_type: u8,
    pub value: &'a [u8],
}

/// Walks the record sequence of an attribute report or read response.
///
/// Failed (non-success) read-response records are skipped. A record with
/// an unknown data type stops the walk; `failure()` then names it.
pub struct AttributeRecords<'a> {
    payload: &'a [u8],
    with_status: bool,
    failed: Option<(u16, u8)>,
}

impl<'a> AttributeRecords<'a> {
    /// `command_id` must be REPORT_ATTRIBUTES or READ_ATTRIBUTES_RESPONSE
    #[must_use]
    pub fn new(command_id: u8, payload: &'a [u8]) -> Self {
        Self {
            payload,
            with_status: command_id == global::READ_ATTRIBUTES_RESPONSE,
            failed: None,
        }
    }

    /// The (attribute id, data type) pair that stopped the walk, if any
    #[must_use]
    pub fn failure(&self) -> Option<(u16, u8)> {
        self.failed
    }
}

impl<'a> Iterator for AttributeRecords<'a> {
    type Item = AttributeRecord<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        use crate::types::data_type;

        loop {
            if self.failed.is_some() || self.payload.len() <= 2 {
                return None;
            }

            let attribute_id = LittleEndian::read_u16(&self.payload[0..2]);

            let (data_type, mut offset) = if self.with_status {
                if self.payload[2] != 0 {
                    self.payload = &self.payload[3..];
                    continue;
                }
                if self.payload.len() < 4 {
                    return None;
                }
                (self.payload[3], 4usize)
            } else {
                (self.payload[2], 3usize)
            };

            let size = data_size(data_type, self.payload, &mut offset);

            if size == 0
                && data_type != data_type::OCTET_STRING
                && data_type != data_type::CHARACTER_STRING
            {
                self.failed = Some((attribute_id, data_type));
                return None;
            }

            if self.payload.len() < offset + size {
                self.failed = Some((attribute_id, data_type));
                return None;
            }

            let value = &self.payload[offset..offset + size];
            self.payload = &self.payload[offset + size..];

            return Some(AttributeRecord {
                attribute_id,
                data_type,
                value,
            });
        }
    }
}

/// Append a successful READ_ATTRIBUTES_RESPONSE record
pub fn push_read_response_success(
    response: &mut Vec<u8>,
    attribute_id: u16,
    data_type: u8,
    value: &[u8],
) {
    let mut bytes = [0u8; 2];
    LittleEndian::write_u16(&mut bytes, attribute_id);
    response.extend_from_slice(&bytes);
    response.push(crate::types::status::SUCCESS);
    response.push(data_type);
    response.extend_from_slice(value);
}

/// Append a failed READ_ATTRIBUTES_RESPONSE record
pub fn push_read_response_error(response: &mut Vec<u8>, attribute_id: u16, status: u8) {
    let mut bytes = [0u8; 2];
    LittleEndian::write_u16(&mut bytes, attribute_id);
    response.extend_from_slice(&bytes);
    response.push(status);
}

/// TUYA private-cluster envelope: the one place a big-endian field
/// appears on the wire.
///
/// ```text
/// [Status: 1 byte] [Transaction Id: 1 byte]
/// [Data Point: 1 byte] [Data Type: 1 byte]
/// [Length: 2 bytes BE] [Value: length bytes]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TuyaEnvelope<'a> {
    pub status: u8,
    pub transaction_id: u8,
    pub data_point: u8,
    pub data_type: u8,
    pub value: &'a [u8],
}

impl<'a> TuyaEnvelope<'a> {
    #[must_use]
    pub fn parse(payload: &'a [u8]) -> Option<Self> {
        if payload.len() < 6 {
            return None;
        }

        let length = BigEndian::read_u16(&payload[4..6]) as usize;

        if payload.len() < 6 + length {
            return None;
        }

        Some(Self {
            status: payload[0],
            transaction_id: payload[1],
            data_point: payload[2],
            data_type: payload[3],
            value: &payload[6..6 + length],
        })
    }
}

/// TouchLink scan-request body: transaction id plus the fixed
/// zigbee/touchlink information bytes
#[must_use]
pub fn touchlink_scan_payload(transaction_id: u32) -> Vec<u8> {
    let mut payload = vec![0u8; 4];
    LittleEndian::write_u32(&mut payload, transaction_id);
    payload.push(0x04); // zigbee information: router, rx on when idle
    payload.push(0x12); // touchlink information: address assignment, initiator
    payload
}
