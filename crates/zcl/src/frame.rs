//! ZCL frame header encode/parse

use crate::Error;
use byteorder::{ByteOrder, LittleEndian};

/// Frame-control field bits
pub mod frame_control {
    pub const CLUSTER_SPECIFIC: u8 = 0x01;
    pub const MANUFACTURER_SPECIFIC: u8 = 0x04;
    pub const SERVER_TO_CLIENT: u8 = 0x08;
    pub const DISABLE_DEFAULT_RESPONSE: u8 = 0x10;
}

/// ZCL frame header
///
/// ```text
/// [Frame Control: 1 byte]
/// [Manufacturer Code: 2 bytes LE] (only when MANUFACTURER_SPECIFIC is set)
/// [Transaction Id: 1 byte]
/// [Command Id: 1 byte]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZclHeader {
    pub frame_control: u8,
    pub manufacturer_code: Option<u16>,
    pub transaction_id: u8,
    pub command_id: u8,
}

impl ZclHeader {
    #[must_use]
    pub fn new(frame_control: u8, transaction_id: u8, command_id: u8) -> Self {
        Self {
            frame_control: frame_control & !frame_control::MANUFACTURER_SPECIFIC,
            manufacturer_code: None,
            transaction_id,
            command_id,
        }
    }

    #[must_use]
    pub fn manufacturer_specific(
        frame_control: u8,
        manufacturer_code: u16,
        transaction_id: u8,
        command_id: u8,
    ) -> Self {
        Self {
            frame_control: frame_control | frame_control::MANUFACTURER_SPECIFIC,
            manufacturer_code: Some(manufacturer_code),
            transaction_id,
            command_id,
        }
    }

    #[must_use]
    pub fn cluster_specific(&self) -> bool {
        self.frame_control & frame_control::CLUSTER_SPECIFIC != 0
    }

    #[must_use]
    pub fn disable_default_response(&self) -> bool {
        self.frame_control & frame_control::DISABLE_DEFAULT_RESPONSE != 0
    }

    /// Serialize the header, ready for the payload to be appended
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(5);
        data.push(self.frame_control);

        if let Some(code) = self.manufacturer_code {
            let mut bytes = [0u8; 2];
            LittleEndian::write_u16(&mut bytes, code);
            data.extend_from_slice(&bytes);
        }

        data.push(self.transaction_id);
        data.push(self.command_id);
        data
    }

    /// Parse a header from the start of an incoming frame.
    ///
    /// Returns the header and the number of bytes consumed; the payload
    /// is everything after that.
    pub fn parse(data: &[u8]) -> Result<(Self, usize), Error> {
        if data.len() < 3 {
            return Err(Error::FrameTooShort(data.len()));
        }

        let control = data[0];
        let mut offset = 1;

        let manufacturer_code = if control & frame_control::MANUFACTURER_SPECIFIC != 0 {
            if data.len() < 5 {
                return Err(Error::FrameTooShort(data.len()));
            }
            let code = LittleEndian::read_u16(&data[offset..offset + 2]);
            offset += 2;
            Some(code)
        } else {
            None
        };

        let transaction_id = data[offset];
        offset += 1;
        let command_id = data[offset];
        offset += 1;

        Ok((
            Self {
                frame_control: control,
                manufacturer_code,
                transaction_id,
                command_id,
            },
            offset,
        ))
    }
}

/// Header bytes for a plain (non manufacturer-specific) frame
#[must_use]
pub fn zcl_header(frame_control: u8, transaction_id: u8, command_id: u8) -> Vec<u8> {
    ZclHeader::new(frame_control, transaction_id, command_id).encode()
}

/// Header bytes for a manufacturer-specific frame
#[must_use]
pub fn zcl_header_manufacturer(
    frame_control: u8,
    manufacturer_code: u16,
    transaction_id: u8,
    command_id: u8,
) -> Vec<u8> {
    ZclHeader::manufacturer_specific(frame_control, manufacturer_code, transaction_id, command_id)
        .encode()
}
