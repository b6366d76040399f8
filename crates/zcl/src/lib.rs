//! Zigbee Cluster Library wire codec
//!
//! Pure encode/decode for ZCL frames: headers, attribute records,
//! reporting configuration, the TUYA private envelope and the OTA
//! upgrade file format. No I/O lives here.

pub mod commands;
pub mod frame;
pub mod ota;
pub mod types;

pub use commands::{
    global, read_attributes_request, AttributeRecord, AttributeRecords, TuyaEnvelope,
};
pub use frame::{frame_control, zcl_header, zcl_header_manufacturer, ZclHeader};
pub use types::{cluster, data_size, data_type, fixed_data_size, status};

use thiserror::Error;

/// Codec errors
///
/// Unknown data types are not an error at this layer: `data_size`
/// reports them as zero-length and the caller decides what to drop.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Frame too short: {0} bytes")]
    FrameTooShort(usize),
}
