//! Narrow contract between the core and a radio adapter driver
//!
//! The EZSP and ZNP drivers live outside this crate; the core only sees
//! their request surface and the event stream they feed back. Request
//! calls return `false` when the adapter refuses the operation, which
//! the scheduler turns into an aborted request.

use crate::device::{IeeeAddress, LogicalType};
use crate::error::ControllerError;
use async_trait::async_trait;
use std::str::FromStr;
use tokio::sync::mpsc;

/// Adapter families a host can configure.
///
/// An unrecognized family is the one error that terminates
/// initialisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterKind {
    Ezsp,
    Znp,
}

impl FromStr for AdapterKind {
    type Err = ControllerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "ezsp" => Ok(AdapterKind::Ezsp),
            "znp" => Ok(AdapterKind::Znp),
            other => Err(ControllerError::UnknownAdapterType(other.to_string())),
        }
    }
}

/// Destination of an inter-PAN or group data request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendedDestination {
    Group(u16),
    Broadcast,
    Ieee(IeeeAddress),
}

/// Radio adapter request surface
#[async_trait]
pub trait Adapter: Send {
    /// Adapter family name ("ezsp", "znp")
    fn adapter_type(&self) -> &str;

    /// Firmware/stack version string
    fn version(&self) -> String;

    /// Coordinator IEEE address, little-endian u64
    fn ieee_address(&self) -> u64;

    async fn set_permit_join(&mut self, enabled: bool) -> bool;

    async fn node_descriptor_request(&mut self, id: u8, network_address: u16) -> bool;

    async fn active_endpoints_request(&mut self, id: u8, network_address: u16) -> bool;

    async fn simple_descriptor_request(
        &mut self,
        id: u8,
        network_address: u16,
        endpoint_id: u8,
    ) -> bool;

    #[allow(clippy::too_many_arguments)]
    async fn bind_request(
        &mut self,
        id: u8,
        network_address: u16,
        src_address: IeeeAddress,
        endpoint_id: u8,
        cluster_id: u16,
        dst_address: &[u8],
        dst_endpoint_id: u8,
        unbind: bool,
    ) -> bool;

    async fn data_request(
        &mut self,
        id: u8,
        network_address: u16,
        endpoint_id: u8,
        cluster_id: u16,
        data: &[u8],
    ) -> bool;

    #[allow(clippy::too_many_arguments)]
    async fn extended_data_request(
        &mut self,
        id: u8,
        destination: ExtendedDestination,
        dst_endpoint_id: u8,
        dst_pan_id: u16,
        src_endpoint_id: u8,
        cluster_id: u16,
        data: &[u8],
    ) -> bool;

    async fn leave_request(&mut self, id: u8, network_address: u16, ieee_address: IeeeAddress)
        -> bool;

    async fn lqi_request(&mut self, id: u8, network_address: u16) -> bool;

    async fn set_inter_pan_endpoint(&mut self, endpoint_id: u8) -> bool;

    async fn set_inter_pan_channel(&mut self, channel: u8) -> bool;

    async fn reset_inter_pan(&mut self);
}

/// Events the adapter driver feeds into the core
#[derive(Debug, Clone)]
pub enum AdapterEvent {
    /// The coordinator formed/joined its network and is operational
    CoordinatorReady,
    /// Permit-join state changed on the radio
    PermitJoinUpdated { enabled: bool },
    /// A previously issued request completed; non-zero status is a failure
    RequestFinished { id: u8, status: u8 },
    DeviceJoined {
        ieee_address: IeeeAddress,
        network_address: u16,
    },
    DeviceLeft {
        ieee_address: IeeeAddress,
    },
    NodeDescriptorReceived {
        network_address: u16,
        logical_type: LogicalType,
        manufacturer_code: u16,
    },
    ActiveEndpointsReceived {
        network_address: u16,
        endpoints: Vec<u8>,
    },
    SimpleDescriptorReceived {
        network_address: u16,
        endpoint_id: u8,
        profile_id: u16,
        device_id: u16,
        in_clusters: Vec<u16>,
        out_clusters: Vec<u16>,
    },
    NeighborRecordReceived {
        network_address: u16,
        neighbor_address: u16,
        link_quality: u8,
        start: bool,
    },
    /// An in-network ZCL frame addressed to the coordinator
    MessageReceived {
        network_address: u16,
        endpoint_id: u8,
        cluster_id: u16,
        link_quality: u8,
        data: Vec<u8>,
    },
    /// An inter-PAN frame (TouchLink scans)
    ExtendedMessageReceived {
        ieee_address: IeeeAddress,
        endpoint_id: u8,
        cluster_id: u16,
        link_quality: u8,
        data: Vec<u8>,
    },
}

/// Channel pair handed to an adapter driver for feeding events in
#[must_use]
pub fn event_channel(capacity: usize) -> (mpsc::Sender<AdapterEvent>, mpsc::Receiver<AdapterEvent>) {
    mpsc::channel(capacity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_kind_from_config_string() {
        assert_eq!("ezsp".parse::<AdapterKind>().unwrap(), AdapterKind::Ezsp);
        assert_eq!("znp".parse::<AdapterKind>().unwrap(), AdapterKind::Znp);

        let error = "conbee".parse::<AdapterKind>().unwrap_err();
        assert_eq!(error.to_string(), "Unrecognized adapter type: conbee");
    }
}
