//! Outstanding-request table keyed by the rolling transaction id

use crate::device::IeeeAddress;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Pending,
    Sent,
    Finished,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestType {
    Binding,
    Data,
    Remove,
    Lqi,
    Interview,
}

#[derive(Debug, Clone)]
pub enum RequestPayload {
    Binding {
        endpoint_id: u8,
        cluster_id: u16,
        dst_address: Vec<u8>,
        dst_endpoint_id: u8,
        unbind: bool,
    },
    Data {
        endpoint_id: u8,
        cluster_id: u16,
        data: Vec<u8>,
        name: Option<String>,
    },
    Remove,
    Lqi,
    Interview,
}

impl RequestPayload {
    #[must_use]
    pub fn request_type(&self) -> RequestType {
        match self {
            RequestPayload::Binding { .. } => RequestType::Binding,
            RequestPayload::Data { .. } => RequestType::Data,
            RequestPayload::Remove => RequestType::Remove,
            RequestPayload::Lqi => RequestType::Lqi,
            RequestPayload::Interview => RequestType::Interview,
        }
    }
}

/// One queued adapter operation.
///
/// Holds the device's IEEE address only; the device is re-resolved on
/// every touch and may have disappeared in the meantime.
#[derive(Debug, Clone)]
pub struct Request {
    pub device: IeeeAddress,
    pub payload: RequestPayload,
    pub status: RequestStatus,
}

/// Request table with free-running u8 id allocation.
///
/// The peer-visible ZCL transaction id is the same u8 as the table key,
/// so responses correlate. Allocation skips ids still present in the
/// table; a full table falls back to overwriting the slot at the
/// counter.
#[derive(Debug, Default)]
pub struct RequestQueue {
    slots: HashMap<u8, Request>,
    counter: u8,
}

impl RequestQueue {
    /// The id the next enqueue will use. Stable between a peek and the
    /// following enqueue, so callers can bake it into the frame first.
    #[must_use]
    pub fn next_id(&self) -> u8 {
        let mut id = self.counter;

        for _ in 0..=u8::MAX {
            if !self.slots.contains_key(&id) {
                return id;
            }
            id = id.wrapping_add(1);
        }

        self.counter
    }

    pub fn enqueue(&mut self, device: IeeeAddress, payload: RequestPayload) -> u8 {
        let id = self.next_id();

        if self.slots.contains_key(&id) {
            tracing::warn!("Request table full, overwriting request {id}");
        }

        self.slots.insert(
            id,
            Request {
                device,
                payload,
                status: RequestStatus::Pending,
            },
        );
        self.counter = id.wrapping_add(1);
        id
    }

    #[must_use]
    pub fn get(&self, id: u8) -> Option<&Request> {
        self.slots.get(&id)
    }

    pub fn get_mut(&mut self, id: u8) -> Option<&mut Request> {
        self.slots.get_mut(&id)
    }

    pub fn set_status(&mut self, id: u8, status: RequestStatus) {
        if let Some(request) = self.slots.get_mut(&id) {
            request.status = status;
        }
    }

    /// Ids of entries the next tick has to dispatch, in id order
    #[must_use]
    pub fn pending_ids(&self) -> Vec<u8> {
        let mut ids: Vec<u8> = self
            .slots
            .iter()
            .filter(|(_, request)| request.status == RequestStatus::Pending)
            .map(|(&id, _)| id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Whether an interview request for this device is already queued
    #[must_use]
    pub fn has_interview(&self, device: &IeeeAddress) -> bool {
        self.slots.values().any(|request| {
            request.device == *device
                && request.payload.request_type() == RequestType::Interview
                && matches!(request.status, RequestStatus::Pending | RequestStatus::Sent)
        })
    }

    /// Move every request of the given type for this device to a
    /// terminal status
    pub fn close_for_device(&mut self, device: &IeeeAddress, request_type: RequestType, status: RequestStatus) {
        for request in self.slots.values_mut() {
            if request.device == *device
                && request.payload.request_type() == request_type
                && !matches!(request.status, RequestStatus::Finished | RequestStatus::Aborted)
            {
                request.status = status;
            }
        }
    }

    /// Drop Finished and Aborted entries
    pub fn sweep(&mut self) {
        self.slots.retain(|_, request| {
            !matches!(request.status, RequestStatus::Finished | RequestStatus::Aborted)
        });
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }
}
