//! Scripted adapter for driving the controller in tests

use crate::adapter::{Adapter, ExtendedDestination};
use crate::device::IeeeAddress;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterCall {
    PermitJoin(bool),
    NodeDescriptor {
        id: u8,
        network_address: u16,
    },
    ActiveEndpoints {
        id: u8,
        network_address: u16,
    },
    SimpleDescriptor {
        id: u8,
        network_address: u16,
        endpoint_id: u8,
    },
    Bind {
        id: u8,
        network_address: u16,
        endpoint_id: u8,
        cluster_id: u16,
        dst_address: Vec<u8>,
        dst_endpoint_id: u8,
        unbind: bool,
    },
    Data {
        id: u8,
        network_address: u16,
        endpoint_id: u8,
        cluster_id: u16,
        data: Vec<u8>,
    },
    Extended {
        id: u8,
        destination: ExtendedDestination,
        dst_endpoint_id: u8,
        dst_pan_id: u16,
        src_endpoint_id: u8,
        cluster_id: u16,
        data: Vec<u8>,
    },
    Leave {
        id: u8,
        network_address: u16,
    },
    Lqi {
        id: u8,
        network_address: u16,
    },
    InterPanEndpoint(u8),
    InterPanChannel(u8),
    ResetInterPan,
}

pub type CallLog = Arc<Mutex<Vec<AdapterCall>>>;

pub struct MockAdapter {
    ieee: u64,
    refuse: Arc<Mutex<bool>>,
    calls: CallLog,
}

impl MockAdapter {
    pub fn new(ieee: u64) -> (Self, CallLog, Arc<Mutex<bool>>) {
        let calls: CallLog = Arc::new(Mutex::new(Vec::new()));
        let refuse = Arc::new(Mutex::new(false));

        (
            Self {
                ieee,
                refuse: refuse.clone(),
                calls: calls.clone(),
            },
            calls,
            refuse,
        )
    }

    fn record(&self, call: AdapterCall) -> bool {
        self.calls.lock().unwrap().push(call);
        !*self.refuse.lock().unwrap()
    }
}

#[async_trait]
impl Adapter for MockAdapter {
    fn adapter_type(&self) -> &str {
        "mock"
    }

    fn version(&self) -> String {
        "0.0.0".to_string()
    }

    fn ieee_address(&self) -> u64 {
        self.ieee
    }

    async fn set_permit_join(&mut self, enabled: bool) -> bool {
        self.record(AdapterCall::PermitJoin(enabled))
    }

    async fn node_descriptor_request(&mut self, id: u8, network_address: u16) -> bool {
        self.record(AdapterCall::NodeDescriptor {
            id,
            network_address,
        })
    }

    async fn active_endpoints_request(&mut self, id: u8, network_address: u16) -> bool {
        self.record(AdapterCall::ActiveEndpoints {
            id,
            network_address,
        })
    }

    async fn simple_descriptor_request(
        &mut self,
        id: u8,
        network_address: u16,
        endpoint_id: u8,
    ) -> bool {
        self.record(AdapterCall::SimpleDescriptor {
            id,
            network_address,
            endpoint_id,
        })
    }

    async fn bind_request(
        &mut self,
        id: u8,
        network_address: u16,
        _src_address: IeeeAddress,
        endpoint_id: u8,
        cluster_id: u16,
        dst_address: &[u8],
        dst_endpoint_id: u8,
        unbind: bool,
    ) -> bool {
        self.record(AdapterCall::Bind {
            id,
            network_address,
            endpoint_id,
            cluster_id,
            dst_address: dst_address.to_vec(),
            dst_endpoint_id,
            unbind,
        })
    }

    async fn data_request(
        &mut self,
        id: u8,
        network_address: u16,
        endpoint_id: u8,
        cluster_id: u16,
        data: &[u8],
    ) -> bool {
        self.record(AdapterCall::Data {
            id,
            network_address,
            endpoint_id,
            cluster_id,
            data: data.to_vec(),
        })
    }

    async fn extended_data_request(
        &mut self,
        id: u8,
        destination: ExtendedDestination,
        dst_endpoint_id: u8,
        dst_pan_id: u16,
        src_endpoint_id: u8,
        cluster_id: u16,
        data: &[u8],
    ) -> bool {
        self.record(AdapterCall::Extended {
            id,
            destination,
            dst_endpoint_id,
            dst_pan_id,
            src_endpoint_id,
            cluster_id,
            data: data.to_vec(),
        })
    }

    async fn leave_request(
        &mut self,
        id: u8,
        network_address: u16,
        _ieee_address: IeeeAddress,
    ) -> bool {
        self.record(AdapterCall::Leave {
            id,
            network_address,
        })
    }

    async fn lqi_request(&mut self, id: u8, network_address: u16) -> bool {
        self.record(AdapterCall::Lqi {
            id,
            network_address,
        })
    }

    async fn set_inter_pan_endpoint(&mut self, endpoint_id: u8) -> bool {
        self.record(AdapterCall::InterPanEndpoint(endpoint_id))
    }

    async fn set_inter_pan_channel(&mut self, channel: u8) -> bool {
        self.record(AdapterCall::InterPanChannel(channel))
    }

    async fn reset_inter_pan(&mut self) {
        self.record(AdapterCall::ResetInterPan);
    }
}
