//! Device interview: node descriptor, endpoints, identity attributes
//! and the IAS Zone enrollment handshake

use crate::catalogue::setup_device;
use crate::controller::{Controller, DeviceEventKind};
use crate::device::{IeeeAddress, ZoneStatus, POWER_SOURCE_BATTERY};
use crate::request::{RequestPayload, RequestStatus, RequestType};
use std::time::Instant;
use zcl::frame::frame_control;
use zcl::{cluster, commands, data_type, global, zcl_header};

/// Models reported by TUYA hardware under assorted manufacturer strings
const TUYA_MODELS: &[&str] = &[
    "TS0001", "TS0002", "TS0004", "TS0011", "TS0012", "TS0013", "TS0014", "TS0201", "TS0202",
    "TS0203", "TS0204", "TS0205", "TS0207", "TS0601",
];

/// Models whose manufacturer string is the real model identity
const TUYA_PROMOTED_MODELS: &[&str] = &["TS0001", "TS0011", "TS0201", "TS0202", "TS0207", "TS0601"];

/// What the FSM wants to do next for one device
enum InterviewStep {
    NodeDescriptor,
    ActiveEndpoints,
    SimpleDescriptor(u8),
    BasicAttributes(u8),
    NoBasicCluster,
    IasRead(u8),
    IasWriteAddress(u8),
    IasEnroll(u8),
    Finished,
}

impl Controller {
    /// (Re)arm the interview: ensures one queued Interview request and a
    /// fresh deadline. Progress events call this after every state
    /// change.
    pub(crate) fn interview_device(&mut self, ieee: IeeeAddress) {
        let timeout = self.config.interview_timeout();

        {
            let Some(device) = self.devices.get_mut(&ieee) else {
                return;
            };

            if device.interview_finished {
                return;
            }

            device.interview_deadline = Some(Instant::now() + timeout);
        }

        if !self.requests.has_interview(&ieee) {
            self.requests.enqueue(ieee, RequestPayload::Interview);
        }
    }

    /// One scheduler-driven FSM step. Returns false when the step could
    /// not be launched; the request is then aborted.
    pub(crate) async fn interview_request(&mut self, id: u8, ieee: IeeeAddress) -> bool {
        let step = {
            let Some(device) = self.devices.get(&ieee) else {
                return false;
            };

            if device.manufacturer_name.is_empty() || device.model_name.is_empty() {
                if !device.descriptor_received {
                    InterviewStep::NodeDescriptor
                } else if !device.endpoints_received {
                    InterviewStep::ActiveEndpoints
                } else if let Some(endpoint) = device
                    .endpoints
                    .values()
                    .find(|endpoint| !endpoint.descriptor_received)
                {
                    InterviewStep::SimpleDescriptor(endpoint.id)
                } else if let Some(endpoint) = device
                    .endpoints
                    .values()
                    .find(|endpoint| endpoint.has_in_cluster(cluster::BASIC))
                {
                    InterviewStep::BasicAttributes(endpoint.id)
                } else {
                    InterviewStep::NoBasicCluster
                }
            } else if let Some(endpoint) = device
                .endpoints
                .values()
                .filter(|endpoint| endpoint.has_in_cluster(cluster::IAS_ZONE))
                .find(|endpoint| endpoint.zone_status != ZoneStatus::Enrolled)
            {
                match endpoint.zone_status {
                    ZoneStatus::Unknown => InterviewStep::IasRead(endpoint.id),
                    ZoneStatus::SetAddress => InterviewStep::IasWriteAddress(endpoint.id),
                    ZoneStatus::Enroll => InterviewStep::IasEnroll(endpoint.id),
                    ZoneStatus::Enrolled => unreachable!(),
                }
            } else {
                for endpoint in device
                    .endpoints
                    .values()
                    .filter(|endpoint| endpoint.has_in_cluster(cluster::IAS_ZONE))
                {
                    tracing::info!(
                        "Device {} endpoint 0x{:02X} IAS zone enrolled",
                        device.name(),
                        endpoint.id
                    );
                }

                InterviewStep::Finished
            }
        };

        let network_address = match self.devices.get(&ieee) {
            Some(device) => device.network_address,
            None => return false,
        };

        match step {
            InterviewStep::NodeDescriptor => {
                if self.adapter.node_descriptor_request(id, network_address).await {
                    return true;
                }

                self.interview_error(ieee, "node descriptor request failed");
                false
            }

            InterviewStep::ActiveEndpoints => {
                if self.adapter.active_endpoints_request(id, network_address).await {
                    return true;
                }

                self.interview_error(ieee, "active endpoints request failed");
                false
            }

            InterviewStep::SimpleDescriptor(endpoint_id) => {
                if let Some(device) = self.devices.get_mut(&ieee) {
                    device.interview_endpoint_id = endpoint_id;
                }

                if self
                    .adapter
                    .simple_descriptor_request(id, network_address, endpoint_id)
                    .await
                {
                    return true;
                }

                self.interview_error(
                    ieee,
                    &format!("endpoint 0x{endpoint_id:02X} simple descriptor request failed"),
                );
                false
            }

            InterviewStep::BasicAttributes(endpoint_id) => {
                let request =
                    commands::read_attributes_request(id, &[0x0001, 0x0004, 0x0005, 0x0007], 0);

                if self
                    .adapter
                    .data_request(id, network_address, endpoint_id, cluster::BASIC, &request)
                    .await
                {
                    return true;
                }

                self.interview_error(ieee, "read basic attributes request failed");
                false
            }

            InterviewStep::NoBasicCluster => {
                self.interview_error(ieee, "device has empty manufacturer name or model name");
                false
            }

            InterviewStep::IasRead(endpoint_id) => {
                let request = commands::read_attributes_request(id, &[0x0000, 0x0010], 0);

                if self
                    .adapter
                    .data_request(id, network_address, endpoint_id, cluster::IAS_ZONE, &request)
                    .await
                {
                    return true;
                }

                self.interview_error(ieee, "read current IAS zone status request failed");
                false
            }

            InterviewStep::IasWriteAddress(endpoint_id) => {
                let mut request = zcl_header(
                    frame_control::DISABLE_DEFAULT_RESPONSE,
                    id,
                    global::WRITE_ATTRIBUTES,
                );
                request.extend_from_slice(&commands::write_attribute_record(
                    0x0010,
                    data_type::IEEE_ADDRESS,
                    &self.adapter.ieee_address().to_le_bytes(),
                ));

                if self
                    .adapter
                    .data_request(id, network_address, endpoint_id, cluster::IAS_ZONE, &request)
                    .await
                {
                    return true;
                }

                self.interview_error(ieee, "write IAS zone CIE address request failed");
                false
            }

            InterviewStep::IasEnroll(endpoint_id) => {
                let mut enroll = zcl_header(
                    frame_control::CLUSTER_SPECIFIC | frame_control::DISABLE_DEFAULT_RESPONSE,
                    id,
                    0x00,
                );
                enroll.push(0x00); // response code: success
                enroll.push(0x42); // zone id

                let verify = commands::read_attributes_request(id, &[0x0000, 0x0010], 0);

                if self
                    .adapter
                    .data_request(id, network_address, endpoint_id, cluster::IAS_ZONE, &enroll)
                    .await
                    && self
                        .adapter
                        .data_request(id, network_address, endpoint_id, cluster::IAS_ZONE, &verify)
                        .await
                {
                    return true;
                }

                self.interview_error(ieee, "enroll IAS zone request failed");
                false
            }

            InterviewStep::Finished => {
                self.interview_finished(ieee).await;
                true
            }
        }
    }

    pub(crate) async fn interview_finished(&mut self, ieee: IeeeAddress) {
        {
            let Some(device) = self.devices.get_mut(&ieee) else {
                return;
            };

            tracing::info!(
                "Device {} manufacturer name is \"{}\" and model name is \"{}\"",
                device.name(),
                device.manufacturer_name,
                device.model_name
            );

            setup_device(device);
        }

        self.configure_device_reportings(ieee);

        if let Some(device) = self.devices.get_mut(&ieee) {
            tracing::info!("Device {} interview finished successfully", device.name());
            device.interview_deadline = None;
            device.interview_finished = true;
        }

        self.emit_device_event(ieee, DeviceEventKind::InterviewFinished);
        self.requests
            .close_for_device(&ieee, RequestType::Interview, RequestStatus::Finished);

        self.store_database().await;
    }

    pub(crate) fn interview_error(&mut self, ieee: IeeeAddress, reason: &str) {
        let Some(device) = self.devices.get_mut(&ieee) else {
            return;
        };

        if device.interview_deadline.is_none() {
            return;
        }

        tracing::warn!("Device {} interview error: {}", device.name(), reason);
        device.interview_deadline = None;

        self.emit_device_event(ieee, DeviceEventKind::InterviewError);
    }

    /// One-second sweep over per-device interview deadlines
    pub(crate) fn check_interview_timeouts(&mut self) {
        let now = Instant::now();

        let expired: Vec<IeeeAddress> = self
            .devices
            .iter()
            .filter(|device| device.interview_deadline.is_some_and(|deadline| deadline <= now))
            .map(|device| device.ieee_address)
            .collect();

        for ieee in expired {
            if let Some(device) = self.devices.get_mut(&ieee) {
                tracing::warn!("Device {} interview timed out", device.name());
                device.interview_deadline = None;
            }

            self.emit_device_event(ieee, DeviceEventKind::InterviewTimeout);
            self.requests
                .close_for_device(&ieee, RequestType::Interview, RequestStatus::Aborted);
        }
    }

    /// Attribute intake. Basic and IAS Zone always feed the interview
    /// FSM; everything else goes to the property parsers once the
    /// interview is done.
    pub(crate) async fn parse_attribute(
        &mut self,
        ieee: IeeeAddress,
        endpoint_id: u8,
        cluster_id: u16,
        attribute_id: u16,
        record_type: u8,
        data: &[u8],
    ) {
        if cluster_id == cluster::BASIC {
            self.parse_basic_attribute(ieee, attribute_id, record_type, data)
                .await;
            return;
        }

        if cluster_id == cluster::IAS_ZONE && (attribute_id == 0x0000 || attribute_id == 0x0010) {
            self.parse_ias_attribute(ieee, endpoint_id, attribute_id, record_type, data);
            return;
        }

        let Some(device) = self.devices.get(&ieee) else {
            return;
        };

        if !device.interview_finished {
            return;
        }

        let device_name = device.name();
        let mut matched = false;
        let mut updated = false;

        if let Some(device) = self.devices.get_mut(&ieee) {
            let endpoint = device.endpoint(endpoint_id);

            for property in &mut endpoint.properties {
                if property.cluster_id() == cluster_id {
                    matched = true;
                    updated |= property.parse_attribute(attribute_id, record_type, data);
                }
            }

            if updated {
                endpoint.updated = true;
            }
        }

        if !matched {
            tracing::warn!(
                "No property found for device {} endpoint 0x{:02X} cluster 0x{:04X} attribute 0x{:04X} with data type 0x{:02X} and data {:02X?}",
                device_name,
                endpoint_id,
                cluster_id,
                attribute_id,
                record_type,
                data
            );
        }
    }

    async fn parse_basic_attribute(
        &mut self,
        ieee: IeeeAddress,
        attribute_id: u16,
        record_type: u8,
        data: &[u8],
    ) {
        let mut finish_now = false;
        let mut kick = false;

        {
            let Some(device) = self.devices.get_mut(&ieee) else {
                return;
            };

            match attribute_id {
                0x0001 => {
                    if record_type != data_type::UNSIGNED_8BIT || data.is_empty() {
                        return;
                    }

                    device.version = data[0];
                }

                0x0004 => {
                    if record_type != data_type::CHARACTER_STRING {
                        return;
                    }

                    device.manufacturer_name =
                        String::from_utf8_lossy(data).trim().to_string();
                }

                0x0005 => {
                    if record_type != data_type::CHARACTER_STRING {
                        return;
                    }

                    device.model_name = String::from_utf8_lossy(data).trim().to_string();

                    // some LUMI sensors volunteer their model on join
                    if device.manufacturer_name.is_empty()
                        && device.model_name.starts_with("lumi.sensor")
                    {
                        device.power_source = POWER_SOURCE_BATTERY;
                        device.manufacturer_name = "LUMI".to_string();
                        finish_now = true;
                    }
                }

                0x0007 => {
                    if (record_type != data_type::UNSIGNED_8BIT
                        && record_type != data_type::ENUM_8BIT)
                        || data.is_empty()
                    {
                        return;
                    }

                    device.power_source = data[0];
                }

                _ => {}
            }

            if !finish_now
                && !device.interview_finished
                && !device.manufacturer_name.is_empty()
                && !device.model_name.is_empty()
                && (attribute_id == 0x0004 || attribute_id == 0x0005)
            {
                if TUYA_MODELS.contains(&device.model_name.as_str()) {
                    if TUYA_PROMOTED_MODELS.contains(&device.model_name.as_str()) {
                        device.model_name = device.manufacturer_name.clone();
                    }

                    device.manufacturer_name = "TUYA".to_string();
                }

                kick = true;
            }
        }

        if finish_now {
            self.interview_finished(ieee).await;
        } else if kick {
            self.interview_device(ieee);
        }
    }

    fn parse_ias_attribute(
        &mut self,
        ieee: IeeeAddress,
        endpoint_id: u8,
        attribute_id: u16,
        record_type: u8,
        data: &[u8],
    ) {
        let coordinator_address = self.adapter.ieee_address();
        let mut kick = false;

        {
            let Some(device) = self.devices.get_mut(&ieee) else {
                return;
            };

            match attribute_id {
                0x0000 => {
                    if record_type != data_type::ENUM_8BIT || data.is_empty() {
                        return;
                    }

                    device.endpoint(endpoint_id).zone_status = if data[0] != 0 {
                        ZoneStatus::Enrolled
                    } else {
                        ZoneStatus::Enroll
                    };
                }

                0x0010 => {
                    if record_type != data_type::IEEE_ADDRESS || data.len() != 8 {
                        return;
                    }

                    let reported = u64::from_le_bytes([
                        data[0], data[1], data[2], data[3], data[4], data[5], data[6], data[7],
                    ]);

                    if reported != coordinator_address {
                        device.endpoint(endpoint_id).zone_status = ZoneStatus::SetAddress;
                    }

                    kick = true;
                }

                _ => return,
            }
        }

        if kick {
            self.interview_device(ieee);
        }
    }
}
