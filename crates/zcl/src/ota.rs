//! OTA upgrade cluster (0x0019) wire format

use byteorder::{ByteOrder, LittleEndian};

/// Cluster-specific command ids
pub mod command {
    pub const IMAGE_NOTIFY: u8 = 0x00;
    pub const IMAGE_REQUEST: u8 = 0x01;
    pub const IMAGE_RESPONSE: u8 = 0x02;
    pub const IMAGE_BLOCK_REQUEST: u8 = 0x03;
    pub const IMAGE_BLOCK_RESPONSE: u8 = 0x05;
    pub const UPGRADE_END_REQUEST: u8 = 0x06;
    pub const UPGRADE_END_RESPONSE: u8 = 0x07;
}

/// Magic number at the start of every upgrade image file
pub const FILE_IDENTIFIER: u32 = 0x0BEE_F11E;

/// Fixed OTA file header (the first 56 bytes of the image file)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub manufacturer_code: u16,
    pub image_type: u16,
    pub file_version: u32,
    pub image_size: u32,
}

impl FileHeader {
    pub const SIZE: usize = 56;

    #[must_use]
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SIZE || LittleEndian::read_u32(&data[0..4]) != FILE_IDENTIFIER {
            return None;
        }

        Some(Self {
            manufacturer_code: LittleEndian::read_u16(&data[10..12]),
            image_type: LittleEndian::read_u16(&data[12..14]),
            file_version: LittleEndian::read_u32(&data[14..18]),
            image_size: LittleEndian::read_u32(&data[52..56]),
        })
    }
}

/// QueryNextImageRequest (0x01) body
#[derive(Debug, Clone, Copy)]
pub struct ImageRequest {
    pub field_control: u8,
    pub manufacturer_code: u16,
    pub image_type: u16,
    pub file_version: u32,
}

impl ImageRequest {
    #[must_use]
    pub fn parse(payload: &[u8]) -> Option<Self> {
        if payload.len() < 9 {
            return None;
        }

        Some(Self {
            field_control: payload[0],
            manufacturer_code: LittleEndian::read_u16(&payload[1..3]),
            image_type: LittleEndian::read_u16(&payload[3..5]),
            file_version: LittleEndian::read_u32(&payload[5..9]),
        })
    }
}

/// QueryNextImageResponse (0x02) body with an image on offer
#[must_use]
pub fn image_response(header: &FileHeader) -> Vec<u8> {
    let mut body = vec![crate::types::status::SUCCESS];
    push_image_fields(&mut body, header.manufacturer_code, header.image_type, header.file_version);
    let mut size = [0u8; 4];
    LittleEndian::write_u32(&mut size, header.image_size);
    body.extend_from_slice(&size);
    body
}

/// ImageBlockRequest (0x03) body
#[derive(Debug, Clone, Copy)]
pub struct BlockRequest {
    pub field_control: u8,
    pub manufacturer_code: u16,
    pub image_type: u16,
    pub file_version: u32,
    pub file_offset: u32,
    pub data_size_max: u8,
}

impl BlockRequest {
    #[must_use]
    pub fn parse(payload: &[u8]) -> Option<Self> {
        if payload.len() < 14 {
            return None;
        }

        Some(Self {
            field_control: payload[0],
            manufacturer_code: LittleEndian::read_u16(&payload[1..3]),
            image_type: LittleEndian::read_u16(&payload[3..5]),
            file_version: LittleEndian::read_u32(&payload[5..9]),
            file_offset: LittleEndian::read_u32(&payload[9..13]),
            data_size_max: payload[13],
        })
    }
}

/// ImageBlockResponse (0x05) body carrying one block
#[must_use]
pub fn block_response(request: &BlockRequest, block: &[u8]) -> Vec<u8> {
    let mut body = vec![crate::types::status::SUCCESS];
    push_image_fields(&mut body, request.manufacturer_code, request.image_type, request.file_version);
    let mut offset = [0u8; 4];
    LittleEndian::write_u32(&mut offset, request.file_offset);
    body.extend_from_slice(&offset);
    body.push(block.len() as u8);
    body.extend_from_slice(block);
    body
}

/// UpgradeEndRequest (0x06) body
#[derive(Debug, Clone, Copy)]
pub struct UpgradeEndRequest {
    pub status: u8,
    pub manufacturer_code: u16,
    pub image_type: u16,
    pub file_version: u32,
}

impl UpgradeEndRequest {
    #[must_use]
    pub fn parse(payload: &[u8]) -> Option<Self> {
        if payload.is_empty() {
            return None;
        }

        if payload[0] != 0 {
            // failed upgrades may carry only the status byte
            return Some(Self {
                status: payload[0],
                manufacturer_code: 0,
                image_type: 0,
                file_version: 0,
            });
        }

        if payload.len() < 9 {
            return None;
        }

        Some(Self {
            status: payload[0],
            manufacturer_code: LittleEndian::read_u16(&payload[1..3]),
            image_type: LittleEndian::read_u16(&payload[3..5]),
            file_version: LittleEndian::read_u32(&payload[5..9]),
        })
    }
}

/// UpgradeEndResponse (0x07) body; both times zeroed means "upgrade now"
#[must_use]
pub fn upgrade_end_response(request: &UpgradeEndRequest) -> Vec<u8> {
    let mut body = Vec::with_capacity(16);
    push_image_fields(&mut body, request.manufacturer_code, request.image_type, request.file_version);
    body.extend_from_slice(&[0u8; 4]); // current time
    body.extend_from_slice(&[0u8; 4]); // upgrade time
    body
}

/// ImageNotify (0x00) body: query-jitter payload type
#[must_use]
pub fn image_notify() -> Vec<u8> {
    vec![0x00, 0x64]
}

fn push_image_fields(body: &mut Vec<u8>, manufacturer_code: u16, image_type: u16, file_version: u32) {
    let mut bytes = [0u8; 4];
    LittleEndian::write_u16(&mut bytes[..2], manufacturer_code);
    body.extend_from_slice(&bytes[..2]);
    LittleEndian::write_u16(&mut bytes[..2], image_type);
    body.extend_from_slice(&bytes[..2]);
    LittleEndian::write_u32(&mut bytes, file_version);
    body.extend_from_slice(&bytes);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header_bytes() -> Vec<u8> {
        let mut data = vec![0u8; FileHeader::SIZE];
        LittleEndian::write_u32(&mut data[0..4], FILE_IDENTIFIER);
        LittleEndian::write_u16(&mut data[10..12], 0x1037);
        LittleEndian::write_u16(&mut data[12..14], 0x0001);
        LittleEndian::write_u32(&mut data[14..18], 0x0001_0002);
        LittleEndian::write_u32(&mut data[52..56], 1024);
        data
    }

    #[test]
    fn parse_file_header() {
        let header = FileHeader::parse(&sample_header_bytes()).unwrap();
        assert_eq!(header.manufacturer_code, 0x1037);
        assert_eq!(header.image_type, 0x0001);
        assert_eq!(header.file_version, 0x0001_0002);
        assert_eq!(header.image_size, 1024);
    }

    #[test]
    fn reject_bad_magic() {
        let mut data = sample_header_bytes();
        data[0] = 0xFF;
        assert!(FileHeader::parse(&data).is_none());
        assert!(FileHeader::parse(&data[..40]).is_none());
    }

    #[test]
    fn block_response_layout() {
        let request = BlockRequest {
            field_control: 0,
            manufacturer_code: 0x1037,
            image_type: 0x0001,
            file_version: 0x0001_0002,
            file_offset: 0x0000_0040,
            data_size_max: 4,
        };
        let body = block_response(&request, &[0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(
            body,
            vec![
                0x00, // status
                0x37, 0x10, 0x01, 0x00, 0x02, 0x00, 0x01, 0x00, // image fields
                0x40, 0x00, 0x00, 0x00, // file offset
                0x04, // data size
                0xDE, 0xAD, 0xBE, 0xEF,
            ]
        );
    }

    #[test]
    fn upgrade_end_round() {
        let request = UpgradeEndRequest::parse(&[
            0x00, 0x37, 0x10, 0x01, 0x00, 0x02, 0x00, 0x01, 0x00,
        ])
        .unwrap();
        assert_eq!(request.manufacturer_code, 0x1037);

        let body = upgrade_end_response(&request);
        assert_eq!(body.len(), 16);
        assert_eq!(&body[8..16], &[0u8; 8]);

        // failure status alone is accepted
        let failed = UpgradeEndRequest::parse(&[0x95]).unwrap();
        assert_eq!(failed.status, 0x95);
    }
}
