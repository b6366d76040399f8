//! The coordinator core: adapter event dispatch, request scheduling and
//! the downward control API
//!
//! Everything here runs on one event-loop task; mutual exclusion is the
//! single-thread invariant, no data is shared across tasks.

use crate::adapter::{Adapter, AdapterEvent, ExtendedDestination};
use crate::catalogue::{setup_device, DeviceCatalogue};
use crate::config::Config;
use crate::device::{format_ieee, Device, IeeeAddress, LogicalType, Reporting, ZoneStatus};
use crate::request::{RequestPayload, RequestQueue, RequestStatus, RequestType};
use serde_json::Value;
use std::path::PathBuf;
use tokio::sync::{broadcast, mpsc};
use zcl::frame::frame_control;
use zcl::{cluster, commands, data_type, global, status, zcl_header, AttributeRecords, ZclHeader};

/// Upward signals to the surrounding code
#[derive(Debug, Clone)]
pub enum Event {
    Device {
        ieee_address: IeeeAddress,
        kind: DeviceEventKind,
    },
    EndpointUpdated {
        ieee_address: IeeeAddress,
        endpoint_id: u8,
    },
    PermitJoinUpdated {
        enabled: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEventKind {
    DeviceJoined,
    DeviceLeft,
    InterviewFinished,
    InterviewError,
    InterviewTimeout,
}

/// Destination of a binding request
#[derive(Debug, Clone)]
pub enum BindingDestination {
    Group(u16),
    Device(String),
}

/// Downward API commands, one per outer-surface verb
#[derive(Debug, Clone)]
pub enum Command {
    SetPermitJoin {
        enabled: bool,
    },
    SetDeviceName {
        device: String,
        name: String,
        store: bool,
    },
    RemoveDevice {
        device: String,
        force: bool,
    },
    UpdateDevice {
        device: String,
        reportings: bool,
    },
    UpdateReporting {
        device: String,
        endpoint_id: u8,
        reporting: String,
        min_interval: u16,
        max_interval: u16,
        value_change: u64,
    },
    BindingControl {
        device: String,
        endpoint_id: u8,
        cluster_id: u16,
        destination: BindingDestination,
        dst_endpoint_id: u8,
        unbind: bool,
    },
    GroupControl {
        device: String,
        endpoint_id: u8,
        group_id: u16,
        remove: bool,
    },
    RemoveAllGroups {
        device: String,
        endpoint_id: u8,
    },
    OtaUpgrade {
        device: String,
        endpoint_id: u8,
        file_name: PathBuf,
    },
    TouchLinkRequest {
        ieee_address: Option<IeeeAddress>,
        channel: u8,
        reset: bool,
    },
    DeviceAction {
        device: String,
        endpoint_id: u8,
        action: String,
        data: Value,
    },
    GroupAction {
        group_id: u16,
        action: String,
        data: Value,
    },
}

/// Cloneable handle for issuing commands to a running controller
#[derive(Debug, Clone)]
pub struct ZigBee {
    command_tx: mpsc::Sender<Command>,
}

impl ZigBee {
    pub async fn send(&self, command: Command) {
        if self.command_tx.send(command).await.is_err() {
            tracing::warn!("Controller is gone, command dropped");
        }
    }
}

/// Create the command channel for a controller
#[must_use]
pub fn command_channel() -> (ZigBee, mpsc::Receiver<Command>) {
    let (command_tx, command_rx) = mpsc::channel(16);
    (ZigBee { command_tx }, command_rx)
}

pub struct Controller {
    pub(crate) config: Config,
    pub(crate) adapter: Box<dyn Adapter>,
    pub(crate) devices: DeviceCatalogue,
    pub(crate) requests: RequestQueue,
    pub(crate) event_tx: broadcast::Sender<Event>,
    pub(crate) ota_upgrade_file: Option<PathBuf>,
    pub(crate) inter_pan_channel: u8,
    pub(crate) coordinator_ready: bool,
}

impl Controller {
    #[must_use]
    pub fn new(config: Config, adapter: Box<dyn Adapter>) -> (Self, broadcast::Receiver<Event>) {
        let (event_tx, event_rx) = broadcast::channel(64);

        (
            Self {
                config,
                adapter,
                devices: DeviceCatalogue::new(),
                requests: RequestQueue::default(),
                event_tx,
                ota_upgrade_file: None,
                inter_pan_channel: 0,
                coordinator_ready: false,
            },
            event_rx,
        )
    }

    /// Drive the controller until the adapter event stream closes
    pub async fn run(
        mut self,
        mut adapter_events: mpsc::Receiver<AdapterEvent>,
        mut commands: mpsc::Receiver<Command>,
    ) {
        let database_file = self.config.database_file.clone();
        self.devices.load(&database_file).await;

        let mut request_tick = tokio::time::interval(self.config.request_interval());
        let mut neighbors_tick = tokio::time::interval(self.config.neighbors_interval());
        let mut poll_tick = tokio::time::interval(self.config.poll_interval());
        let mut interview_tick = tokio::time::interval(std::time::Duration::from_secs(1));

        loop {
            tokio::select! {
                event = adapter_events.recv() => match event {
                    Some(event) => self.handle_adapter_event(event).await,
                    None => break,
                },
                command = commands.recv() => {
                    if let Some(command) = command {
                        self.handle_command(command).await;
                    }
                },
                _ = request_tick.tick() => self.handle_requests().await,
                _ = neighbors_tick.tick() => self.update_neighbors(),
                _ = poll_tick.tick() => self.poll_devices(),
                _ = interview_tick.tick() => self.check_interview_timeouts(),
            }
        }

        tracing::info!("Adapter event stream closed, controller stopping");
    }

    pub async fn handle_adapter_event(&mut self, event: AdapterEvent) {
        match event {
            AdapterEvent::CoordinatorReady => self.coordinator_ready().await,
            AdapterEvent::PermitJoinUpdated { enabled } => self.permit_join_updated(enabled).await,
            AdapterEvent::RequestFinished { id, status } => self.request_finished(id, status).await,
            AdapterEvent::DeviceJoined {
                ieee_address,
                network_address,
            } => self.device_joined(ieee_address, network_address),
            AdapterEvent::DeviceLeft { ieee_address } => self.device_left(ieee_address).await,
            AdapterEvent::NodeDescriptorReceived {
                network_address,
                logical_type,
                manufacturer_code,
            } => self.node_descriptor_received(network_address, logical_type, manufacturer_code),
            AdapterEvent::ActiveEndpointsReceived {
                network_address,
                endpoints,
            } => self.active_endpoints_received(network_address, &endpoints),
            AdapterEvent::SimpleDescriptorReceived {
                network_address,
                endpoint_id,
                profile_id,
                device_id,
                in_clusters,
                out_clusters,
            } => self.simple_descriptor_received(
                network_address,
                endpoint_id,
                profile_id,
                device_id,
                in_clusters,
                out_clusters,
            ),
            AdapterEvent::NeighborRecordReceived {
                network_address,
                neighbor_address,
                link_quality,
                start,
            } => self.neighbor_record_received(network_address, neighbor_address, link_quality, start),
            AdapterEvent::MessageReceived {
                network_address,
                endpoint_id,
                cluster_id,
                link_quality,
                data,
            } => {
                self.message_received(network_address, endpoint_id, cluster_id, link_quality, &data)
                    .await;
            }
            AdapterEvent::ExtendedMessageReceived {
                ieee_address,
                endpoint_id,
                cluster_id,
                data,
                ..
            } => self.extended_message_received(ieee_address, endpoint_id, cluster_id, &data),
        }
    }

    pub async fn handle_command(&mut self, command: Command) {
        match command {
            Command::SetPermitJoin { enabled } => self.set_permit_join(enabled).await,
            Command::SetDeviceName { device, name, store } => {
                self.set_device_name(&device, &name, store).await;
            }
            Command::RemoveDevice { device, force } => self.remove_device(&device, force).await,
            Command::UpdateDevice { device, reportings } => {
                self.update_device(&device, reportings);
            }
            Command::UpdateReporting {
                device,
                endpoint_id,
                reporting,
                min_interval,
                max_interval,
                value_change,
            } => self.update_reporting(
                &device,
                endpoint_id,
                &reporting,
                min_interval,
                max_interval,
                value_change,
            ),
            Command::BindingControl {
                device,
                endpoint_id,
                cluster_id,
                destination,
                dst_endpoint_id,
                unbind,
            } => self.binding_control(&device, endpoint_id, cluster_id, &destination, dst_endpoint_id, unbind),
            Command::GroupControl {
                device,
                endpoint_id,
                group_id,
                remove,
            } => self.group_control(&device, endpoint_id, group_id, remove),
            Command::RemoveAllGroups { device, endpoint_id } => {
                self.remove_all_groups(&device, endpoint_id);
            }
            Command::OtaUpgrade {
                device,
                endpoint_id,
                file_name,
            } => self.ota_upgrade(&device, endpoint_id, file_name).await,
            Command::TouchLinkRequest {
                ieee_address,
                channel,
                reset,
            } => self.touchlink_request(ieee_address, channel, reset).await,
            Command::DeviceAction {
                device,
                endpoint_id,
                action,
                data,
            } => self.device_action(&device, endpoint_id, &action, &data),
            Command::GroupAction {
                group_id,
                action,
                data,
            } => self.group_action(group_id, &action, &data).await,
        }
    }

    // ---- adapter lifecycle -------------------------------------------------

    pub(crate) async fn coordinator_ready(&mut self) {
        let ieee = self.adapter.ieee_address().to_be_bytes();

        tracing::info!("Coordinator ready, address: {}", format_ieee(&ieee));

        self.devices.purge_coordinators(&ieee);

        let mut coordinator = Device::new(ieee, 0x0000);
        coordinator.name = Some(self.config.coordinator_name.clone());
        coordinator.logical_type = LogicalType::Coordinator;
        coordinator.interview_finished = true;
        self.devices.insert(coordinator);

        let adapter_type = self.adapter.adapter_type().to_string();
        let adapter_version = self.adapter.version();
        self.devices.set_adapter_info(&adapter_type, &adapter_version);

        self.coordinator_ready = true;

        let permit_join = self.devices.permit_join();
        self.adapter.set_permit_join(permit_join).await;

        self.store_database().await;
    }

    pub(crate) async fn permit_join_updated(&mut self, enabled: bool) {
        self.devices.set_permit_join(enabled);
        self.store_database().await;
        let _ = self.event_tx.send(Event::PermitJoinUpdated { enabled });
    }

    pub(crate) async fn request_finished(&mut self, id: u8, request_status: u8) {
        let Some(request) = self.requests.get(id) else {
            return;
        };

        if request.status == RequestStatus::Finished {
            return;
        }

        let ieee = request.device;
        let payload = request.payload.clone();
        let device_name = self
            .devices
            .get(&ieee)
            .map(Device::name)
            .unwrap_or_else(|| format_ieee(&ieee));

        match &payload {
            RequestPayload::Binding {
                endpoint_id,
                cluster_id,
                dst_address,
                unbind,
                ..
            } => {
                let verb = if *unbind { "unbinding" } else { "binding" };

                if request_status != 0 {
                    tracing::warn!(
                        "Device {} endpoint 0x{:02X} cluster 0x{:04X} {} failed, status code: {:02X}",
                        device_name,
                        endpoint_id,
                        cluster_id,
                        verb,
                        request_status
                    );
                } else if !dst_address.is_empty() {
                    tracing::info!("Device {} {} finished successfully", device_name, verb);
                }
            }

            RequestPayload::Data { name, .. } => {
                let label = name.as_deref().unwrap_or("data request");

                if request_status != 0 {
                    tracing::warn!(
                        "Device {} {} failed, status code: {:02X}",
                        device_name,
                        label,
                        request_status
                    );
                } else if name.is_some() {
                    tracing::info!("Device {} {} finished successfully", device_name, label);
                }
            }

            RequestPayload::Remove => {
                if request_status != 0 {
                    tracing::warn!(
                        "Device {} leave request failed, status code: {:02X}",
                        device_name,
                        request_status
                    );
                }

                if self.devices.get(&ieee).is_some_and(|device| !device.removed) {
                    tracing::info!("Device {} removed", device_name);
                    self.devices.remove(&ieee);
                    self.store_database().await;
                }
            }

            _ => {}
        }

        self.requests.set_status(id, RequestStatus::Finished);
    }

    pub(crate) fn device_joined(&mut self, ieee: IeeeAddress, network_address: u16) {
        let mut start_interview = false;

        match self.devices.get_mut(&ieee) {
            Some(device) => {
                if device.removed {
                    device.removed = false;
                }

                tracing::info!(
                    "Device {} rejoined network with address 0x{:04X}",
                    device.name(),
                    network_address
                );
            }
            None => {
                tracing::info!(
                    "Device {} joined network with address 0x{:04X}",
                    format_ieee(&ieee),
                    network_address
                );
                self.devices.insert(Device::new(ieee, network_address));
            }
        }

        if let Some(device) = self.devices.get_mut(&ieee) {
            device.update_last_seen();

            if device.network_address != network_address {
                tracing::info!("Device {} network address updated", device.name());
                device.network_address = network_address;
            }

            if !device.interview_finished && device.interview_deadline.is_none() {
                tracing::info!("Device {} interview started...", device.name());
                start_interview = true;
            }
        }

        if start_interview {
            self.interview_device(ieee);
        }

        self.emit_device_event(ieee, DeviceEventKind::DeviceJoined);
    }

    pub(crate) async fn device_left(&mut self, ieee: IeeeAddress) {
        let Some(device) = self.devices.get_mut(&ieee) else {
            return;
        };

        if device.removed {
            return;
        }

        device.interview_deadline = None;
        let name = device.name();

        tracing::info!("Device {} left network", name);
        self.emit_device_event(ieee, DeviceEventKind::DeviceLeft);

        self.devices.remove(&ieee);
        self.store_database().await;
    }

    pub(crate) fn node_descriptor_received(
        &mut self,
        network_address: u16,
        logical_type: LogicalType,
        manufacturer_code: u16,
    ) {
        let Some(ieee) = self.devices.ieee_by_network(network_address) else {
            return;
        };

        if let Some(device) = self.devices.get_mut(&ieee) {
            tracing::info!(
                "Device {} node descriptor received, manufacturer code is 0x{:04X} and logical type is {}",
                device.name(),
                manufacturer_code,
                if logical_type == LogicalType::Router { "router" } else { "end device" }
            );

            device.logical_type = logical_type;
            device.manufacturer_code = manufacturer_code;
            device.descriptor_received = true;
            device.update_last_seen();
        }

        self.interview_device(ieee);
    }

    pub(crate) fn active_endpoints_received(&mut self, network_address: u16, endpoints: &[u8]) {
        let Some(ieee) = self.devices.ieee_by_network(network_address) else {
            return;
        };

        if let Some(device) = self.devices.get_mut(&ieee) {
            let list: Vec<String> = endpoints.iter().map(|id| format!("0x{id:02X}")).collect();

            for &endpoint_id in endpoints {
                device.endpoint(endpoint_id);
            }

            tracing::info!(
                "Device {} active endpoints received: {}",
                device.name(),
                list.join(", ")
            );

            device.endpoints_received = true;
            device.update_last_seen();
        }

        self.interview_device(ieee);
    }

    pub(crate) fn simple_descriptor_received(
        &mut self,
        network_address: u16,
        endpoint_id: u8,
        profile_id: u16,
        device_id: u16,
        in_clusters: Vec<u16>,
        out_clusters: Vec<u16>,
    ) {
        let Some(ieee) = self.devices.ieee_by_network(network_address) else {
            return;
        };

        if let Some(device) = self.devices.get_mut(&ieee) {
            let endpoint_id = if endpoint_id != 0 {
                endpoint_id
            } else {
                device.interview_endpoint_id
            };
            let name = device.name();

            let endpoint = device.endpoint(endpoint_id);
            endpoint.profile_id = profile_id;
            endpoint.device_id = device_id;
            endpoint.in_clusters = in_clusters;
            endpoint.out_clusters = out_clusters;
            endpoint.descriptor_received = true;

            tracing::info!(
                "Device {} endpoint 0x{:02X} simple descriptor received",
                name,
                endpoint_id
            );

            device.update_last_seen();
        }

        self.interview_device(ieee);
    }

    pub(crate) fn neighbor_record_received(
        &mut self,
        network_address: u16,
        neighbor_address: u16,
        link_quality: u8,
        start: bool,
    ) {
        let Some(ieee) = self.devices.ieee_by_network(network_address) else {
            return;
        };

        let Some(device) = self.devices.get_mut(&ieee) else {
            return;
        };

        if start {
            tracing::info!("Device {} neighbors list received", device.name());
            device.neighbors.clear();
        }

        device.neighbors.insert(neighbor_address, link_quality);
        device.update_last_seen();

        // the LQI request did its job
        self.requests
            .close_for_device(&ieee, RequestType::Lqi, RequestStatus::Finished);
    }

    // ---- incoming frames ---------------------------------------------------

    pub(crate) async fn message_received(
        &mut self,
        network_address: u16,
        endpoint_id: u8,
        cluster_id: u16,
        link_quality: u8,
        data: &[u8],
    ) {
        let Some(ieee) = self.devices.ieee_by_network(network_address) else {
            return;
        };

        let (header, used) = match ZclHeader::parse(data) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(
                    "Malformed frame received from 0x{:04X}: {}",
                    network_address,
                    e
                );
                return;
            }
        };
        let payload = &data[used..];

        if let Some(device) = self.devices.get_mut(&ieee) {
            device.endpoint(endpoint_id).updated = false;
        }

        if header.cluster_specific() {
            self.cluster_command_received(
                ieee,
                endpoint_id,
                cluster_id,
                header.transaction_id,
                header.command_id,
                payload,
            )
            .await;
        } else {
            self.global_command_received(
                ieee,
                endpoint_id,
                cluster_id,
                header.transaction_id,
                header.command_id,
                payload,
            )
            .await;
        }

        let mut endpoint_updated = false;

        if let Some(device) = self.devices.get_mut(&ieee) {
            device.link_quality = link_quality;
            device.update_last_seen();
            endpoint_updated = device.endpoint(endpoint_id).updated;
        }

        if endpoint_updated {
            self.store_properties().await;
            let _ = self.event_tx.send(Event::EndpointUpdated {
                ieee_address: ieee,
                endpoint_id,
            });
        }

        if (header.cluster_specific() || header.command_id == global::REPORT_ATTRIBUTES)
            && !header.disable_default_response()
        {
            let mut response = zcl_header(
                frame_control::SERVER_TO_CLIENT | frame_control::DISABLE_DEFAULT_RESPONSE,
                header.transaction_id,
                global::DEFAULT_RESPONSE,
            );
            response.extend_from_slice(&commands::default_response(header.command_id, status::SUCCESS));

            self.enqueue_data_request(ieee, endpoint_id, cluster_id, response, None);
        }
    }

    pub(crate) fn extended_message_received(
        &mut self,
        ieee: IeeeAddress,
        endpoint_id: u8,
        cluster_id: u16,
        data: &[u8],
    ) {
        if cluster_id == cluster::TOUCHLINK && data.len() > 2 && data[2] == 0x01 {
            tracing::info!(
                "TouchLink scan response received from device {} at channel {}",
                format_ieee(&ieee),
                self.inter_pan_channel
            );
            return;
        }

        tracing::warn!(
            "Unrecognized extended message received from {} endpoint 0x{:02X} cluster 0x{:04X} with payload: {:02X?}",
            format_ieee(&ieee),
            endpoint_id,
            cluster_id,
            data
        );
    }

    pub(crate) async fn cluster_command_received(
        &mut self,
        ieee: IeeeAddress,
        endpoint_id: u8,
        cluster_id: u16,
        transaction_id: u8,
        command_id: u8,
        payload: &[u8],
    ) {
        let Some(device) = self.devices.get(&ieee) else {
            return;
        };

        if !device.interview_finished {
            return;
        }

        let device_name = device.name();

        if cluster_id == cluster::GROUPS {
            self.groups_command_received(&device_name, endpoint_id, command_id, payload);
            return;
        }

        if cluster_id == cluster::OTA_UPGRADE {
            self.ota_command_received(ieee, endpoint_id, transaction_id, command_id, payload)
                .await;
            return;
        }

        let mut matched = false;
        let mut updated = false;

        if let Some(device) = self.devices.get_mut(&ieee) {
            let endpoint = device.endpoint(endpoint_id);

            for property in &mut endpoint.properties {
                if property.cluster_id() == cluster_id {
                    matched = true;
                    updated |= property.parse_command(command_id, payload);
                }
            }

            if updated {
                endpoint.updated = true;
            }
        }

        if !matched {
            tracing::warn!(
                "No property found for device {} endpoint 0x{:02X} cluster 0x{:04X} command 0x{:02X} with payload {:02X?}",
                device_name,
                endpoint_id,
                cluster_id,
                command_id,
                payload
            );
        }
    }

    fn groups_command_received(
        &mut self,
        device_name: &str,
        endpoint_id: u8,
        command_id: u8,
        payload: &[u8],
    ) {
        match command_id {
            0x00 | 0x03 => {
                if payload.len() < 3 {
                    return;
                }

                let response_status = payload[0];
                let group_id = u16::from_le_bytes([payload[1], payload[2]]);
                let verb = if command_id != 0 { "removed" } else { "added" };

                match response_status {
                    status::SUCCESS => tracing::info!(
                        "Device {} endpoint 0x{:02X} group {} successfully {}",
                        device_name,
                        endpoint_id,
                        group_id,
                        verb
                    ),
                    status::INSUFFICIENT_SPACE => tracing::warn!(
                        "Device {} endpoint 0x{:02X} group {} not added, no free space available",
                        device_name,
                        endpoint_id,
                        group_id
                    ),
                    status::DUPLICATE_EXISTS => tracing::warn!(
                        "Device {} endpoint 0x{:02X} group {} already exists",
                        device_name,
                        endpoint_id,
                        group_id
                    ),
                    status::NOT_FOUND => tracing::warn!(
                        "Device {} endpoint 0x{:02X} group {} not found",
                        device_name,
                        endpoint_id,
                        group_id
                    ),
                    other => tracing::warn!(
                        "Device {} endpoint 0x{:02X} group {} command status 0x{:02X} unrecognized",
                        device_name,
                        endpoint_id,
                        group_id,
                        other
                    ),
                }
            }

            other => tracing::warn!(
                "Unrecognized group control command 0x{:02X} received from device {} with payload: {:02X?}",
                other,
                device_name,
                payload
            ),
        }
    }

    pub(crate) async fn global_command_received(
        &mut self,
        ieee: IeeeAddress,
        endpoint_id: u8,
        cluster_id: u16,
        transaction_id: u8,
        command_id: u8,
        payload: &[u8],
    ) {
        let Some(device) = self.devices.get(&ieee) else {
            return;
        };
        let device_name = device.name();

        match command_id {
            global::CONFIGURE_REPORTING_RESPONSE | global::DEFAULT_RESPONSE => {}

            global::READ_ATTRIBUTES => {
                let response =
                    self.read_attributes_requested(&device_name, cluster_id, transaction_id, payload);
                self.enqueue_data_request(ieee, endpoint_id, cluster_id, response, None);
            }

            global::READ_ATTRIBUTES_RESPONSE | global::REPORT_ATTRIBUTES => {
                let records: Vec<(u16, u8, Vec<u8>)> = {
                    let mut walker = AttributeRecords::new(command_id, payload);
                    let mut records = Vec::new();

                    for record in walker.by_ref() {
                        records.push((record.attribute_id, record.data_type, record.value.to_vec()));
                    }

                    if let Some((attribute_id, bad_type)) = walker.failure() {
                        tracing::warn!(
                            "Unrecognized attribute 0x{:04X} data type 0x{:02X} received from device {} endpoint 0x{:02X} cluster 0x{:04X}",
                            attribute_id,
                            bad_type,
                            device_name,
                            endpoint_id,
                            cluster_id
                        );
                    }

                    records
                };

                for (attribute_id, record_type, value) in records {
                    self.parse_attribute(ieee, endpoint_id, cluster_id, attribute_id, record_type, &value)
                        .await;
                }
            }

            global::WRITE_ATTRIBUTES_RESPONSE => {
                if cluster_id == cluster::IAS_ZONE && payload.first() == Some(&0) {
                    if let Some(device) = self.devices.get_mut(&ieee) {
                        device.endpoint(endpoint_id).zone_status = ZoneStatus::Enroll;
                    }
                    self.interview_device(ieee);
                }
            }

            other => tracing::warn!(
                "Unrecognized command 0x{:02X} received from device {} endpoint 0x{:02X} cluster 0x{:04X} with payload: {:02X?}",
                other,
                device_name,
                endpoint_id,
                cluster_id,
                payload
            ),
        }
    }

    /// Serve a peer's READ_ATTRIBUTES; only the Time cluster has
    /// answerable attributes
    fn read_attributes_requested(
        &self,
        device_name: &str,
        cluster_id: u16,
        transaction_id: u8,
        payload: &[u8],
    ) -> Vec<u8> {
        let mut response = zcl_header(
            frame_control::SERVER_TO_CLIENT | frame_control::DISABLE_DEFAULT_RESPONSE,
            transaction_id,
            global::READ_ATTRIBUTES_RESPONSE,
        );

        let now = chrono::Local::now();
        let zigbee_epoch = now.timestamp() - 946_684_800; // 2000-01-01 UTC
        let utc_offset = i64::from(now.offset().local_minus_utc());

        for pair in payload.chunks_exact(2) {
            let attribute_id = u16::from_le_bytes([pair[0], pair[1]]);

            if cluster_id == cluster::TIME {
                match attribute_id {
                    0x0000 => {
                        tracing::info!("Device {} requested UTC time", device_name);
                        commands::push_read_response_success(
                            &mut response,
                            attribute_id,
                            data_type::UTC_TIME,
                            &(zigbee_epoch as u32).to_le_bytes(),
                        );
                        continue;
                    }
                    0x0002 => {
                        tracing::info!("Device {} requested time zone", device_name);
                        commands::push_read_response_success(
                            &mut response,
                            attribute_id,
                            data_type::SIGNED_32BIT,
                            &(utc_offset as i32).to_le_bytes(),
                        );
                        continue;
                    }
                    0x0007 => {
                        tracing::info!("Device {} requested local time", device_name);
                        commands::push_read_response_success(
                            &mut response,
                            attribute_id,
                            data_type::UNSIGNED_32BIT,
                            &((zigbee_epoch + utc_offset) as u32).to_le_bytes(),
                        );
                        continue;
                    }
                    _ => {}
                }
            }

            tracing::warn!(
                "Device {} requested unrecognized attribute 0x{:04X} from cluster 0x{:04X}",
                device_name,
                attribute_id,
                cluster_id
            );
            commands::push_read_response_error(&mut response, attribute_id, status::UNSUPPORTED_ATTRIBUTE);
        }

        response
    }

    // ---- scheduler ---------------------------------------------------------

    pub(crate) async fn handle_requests(&mut self) {
        if !self.coordinator_ready || self.requests.is_empty() {
            return;
        }

        for id in self.requests.pending_ids() {
            let Some(request) = self.requests.get(id) else {
                continue;
            };

            let ieee = request.device;
            let payload = request.payload.clone();

            let Some(device) = self.devices.get(&ieee) else {
                self.requests.set_status(id, RequestStatus::Aborted);
                continue;
            };

            if device.removed {
                self.requests.set_status(id, RequestStatus::Aborted);
                continue;
            }

            let network_address = device.network_address;
            let device_name = device.name();
            let interview_done = device.interview_finished;

            let next_status = match payload {
                RequestPayload::Binding {
                    endpoint_id,
                    cluster_id,
                    dst_address,
                    dst_endpoint_id,
                    unbind,
                } => {
                    if self
                        .adapter
                        .bind_request(
                            id,
                            network_address,
                            ieee,
                            endpoint_id,
                            cluster_id,
                            &dst_address,
                            dst_endpoint_id,
                            unbind,
                        )
                        .await
                    {
                        RequestStatus::Sent
                    } else {
                        tracing::warn!(
                            "Device {} {} aborted",
                            device_name,
                            if unbind { "unbinding" } else { "binding" }
                        );
                        RequestStatus::Aborted
                    }
                }

                RequestPayload::Data {
                    endpoint_id,
                    cluster_id,
                    data,
                    name,
                } => {
                    if self
                        .adapter
                        .data_request(id, network_address, endpoint_id, cluster_id, &data)
                        .await
                    {
                        RequestStatus::Sent
                    } else {
                        tracing::warn!(
                            "Device {} {} aborted",
                            device_name,
                            name.as_deref().unwrap_or("data request")
                        );
                        RequestStatus::Aborted
                    }
                }

                RequestPayload::Remove => {
                    if self.adapter.leave_request(id, network_address, ieee).await {
                        RequestStatus::Sent
                    } else {
                        tracing::warn!("Device {} leave request aborted", device_name);
                        RequestStatus::Aborted
                    }
                }

                RequestPayload::Lqi => {
                    // stays pending until the neighbour records arrive
                    if self.adapter.lqi_request(id, network_address).await {
                        RequestStatus::Pending
                    } else {
                        RequestStatus::Aborted
                    }
                }

                RequestPayload::Interview => {
                    if interview_done {
                        RequestStatus::Finished
                    } else if self.interview_request(id, ieee).await {
                        // re-driven every tick until the interview converges
                        if self
                            .devices
                            .get(&ieee)
                            .is_some_and(|device| device.interview_finished)
                        {
                            RequestStatus::Finished
                        } else {
                            RequestStatus::Pending
                        }
                    } else {
                        RequestStatus::Aborted
                    }
                }
            };

            self.requests.set_status(id, next_status);
        }

        self.requests.sweep();
    }

    pub(crate) fn update_neighbors(&mut self) {
        if !self.coordinator_ready {
            return;
        }

        let targets: Vec<IeeeAddress> = self
            .devices
            .iter()
            .filter(|device| device.logical_type != LogicalType::EndDevice && !device.removed)
            .map(|device| device.ieee_address)
            .collect();

        for ieee in targets {
            self.requests.enqueue(ieee, RequestPayload::Lqi);
        }
    }

    pub(crate) fn poll_devices(&mut self) {
        if !self.coordinator_ready {
            return;
        }

        let mut reads: Vec<(IeeeAddress, u8, u16, Vec<u16>)> = Vec::new();

        for device in self.devices.iter() {
            if !device.interview_finished || device.removed {
                continue;
            }

            for endpoint in device.endpoints.values() {
                for poll in &endpoint.polls {
                    reads.push((
                        device.ieee_address,
                        endpoint.id,
                        poll.cluster_id,
                        poll.attributes.clone(),
                    ));
                }
            }
        }

        for (ieee, endpoint_id, cluster_id, attributes) in reads {
            let id = self.requests.next_id();
            let data = commands::read_attributes_request(id, &attributes, 0);
            self.enqueue_data_request(ieee, endpoint_id, cluster_id, data, None);
        }
    }

    // ---- downward API ------------------------------------------------------

    pub(crate) async fn set_permit_join(&mut self, enabled: bool) {
        if !self.coordinator_ready {
            return;
        }

        self.adapter.set_permit_join(enabled).await;
    }

    pub(crate) async fn set_device_name(&mut self, device_name: &str, new_name: &str, store: bool) {
        let Some(ieee) = self.controllable_device(device_name) else {
            return;
        };

        if let Some(device) = self.devices.get_mut(&ieee) {
            device.name = Some(new_name.to_string());
        }

        if store {
            self.store_database().await;
        }
    }

    pub(crate) async fn remove_device(&mut self, device_name: &str, force: bool) {
        let Some(ieee) = self.controllable_device(device_name) else {
            return;
        };

        if !force {
            self.requests.enqueue(ieee, RequestPayload::Remove);
            return;
        }

        tracing::info!("Device {} removed (force)", device_name);
        self.devices.remove(&ieee);
        self.store_database().await;
    }

    pub(crate) fn update_device(&mut self, device_name: &str, reportings: bool) {
        let Some(ieee) = self.controllable_device(device_name) else {
            return;
        };

        if let Some(device) = self.devices.get_mut(&ieee) {
            setup_device(device);
        }

        if !reportings {
            tracing::info!(
                "Device {} configuration updated without reportings",
                device_name
            );
            return;
        }

        self.configure_device_reportings(ieee);
        tracing::info!("Device {} configuration updated", device_name);
    }

    pub(crate) fn update_reporting(
        &mut self,
        device_name: &str,
        endpoint_id: u8,
        reporting_name: &str,
        min_interval: u16,
        max_interval: u16,
        value_change: u64,
    ) {
        let Some(ieee) = self.controllable_device(device_name) else {
            return;
        };

        let mut updates: Vec<(u8, Reporting)> = Vec::new();

        if let Some(device) = self.devices.get_mut(&ieee) {
            for endpoint in device.endpoints.values_mut() {
                if endpoint_id != 0 && endpoint.id != endpoint_id {
                    continue;
                }

                for reporting in &mut endpoint.reportings {
                    if !reporting_name.is_empty() && reporting.name != reporting_name {
                        continue;
                    }

                    if min_interval != 0 {
                        reporting.min_interval = min_interval;
                    }

                    if max_interval != 0 {
                        reporting.max_interval = max_interval;
                    }

                    if value_change != 0 {
                        reporting.value_change = value_change;
                    }

                    updates.push((endpoint.id, reporting.clone()));
                }
            }
        }

        for (endpoint_id, reporting) in updates {
            self.configure_reporting(ieee, endpoint_id, &reporting);
        }
    }

    pub(crate) fn binding_control(
        &mut self,
        device_name: &str,
        endpoint_id: u8,
        cluster_id: u16,
        destination: &BindingDestination,
        dst_endpoint_id: u8,
        unbind: bool,
    ) {
        let Some(ieee) = self.controllable_device(device_name) else {
            return;
        };

        match destination {
            BindingDestination::Group(group_id) => {
                if *group_id != 0 {
                    self.enqueue_binding_request(
                        ieee,
                        endpoint_id,
                        cluster_id,
                        group_id.to_le_bytes().to_vec(),
                        0xFF,
                        unbind,
                    );
                }
            }

            BindingDestination::Device(dst_name) => {
                let Some(dst_ieee) = self.controllable_device(dst_name) else {
                    return;
                };

                self.enqueue_binding_request(
                    ieee,
                    endpoint_id,
                    cluster_id,
                    dst_ieee.to_vec(),
                    dst_endpoint_id,
                    unbind,
                );
            }
        }
    }

    pub(crate) fn group_control(
        &mut self,
        device_name: &str,
        endpoint_id: u8,
        group_id: u16,
        remove: bool,
    ) {
        let Some(ieee) = self.controllable_device(device_name) else {
            return;
        };

        let id = self.requests.next_id();
        let mut data = zcl_header(
            frame_control::CLUSTER_SPECIFIC,
            id,
            if remove { 0x03 } else { 0x00 },
        );
        data.extend_from_slice(&group_id.to_le_bytes());

        if !remove {
            data.push(0x00); // empty group name
        }

        self.enqueue_data_request(
            ieee,
            if endpoint_id != 0 { endpoint_id } else { 1 },
            cluster::GROUPS,
            data,
            None,
        );
    }

    pub(crate) fn remove_all_groups(&mut self, device_name: &str, endpoint_id: u8) {
        let Some(ieee) = self.controllable_device(device_name) else {
            return;
        };

        let id = self.requests.next_id();
        let data = zcl_header(frame_control::CLUSTER_SPECIFIC, id, 0x04);

        self.enqueue_data_request(
            ieee,
            if endpoint_id != 0 { endpoint_id } else { 1 },
            cluster::GROUPS,
            data,
            Some("remove all groups request"),
        );
    }

    pub(crate) fn device_action(
        &mut self,
        device_name: &str,
        endpoint_id: u8,
        action_name: &str,
        data: &Value,
    ) {
        let Some(ieee) = self.controllable_device(device_name) else {
            return;
        };

        let Some(device) = self.devices.get(&ieee) else {
            return;
        };

        for endpoint in device.endpoints.values() {
            if endpoint_id != 0 && endpoint.id != endpoint_id {
                continue;
            }

            if let Some(action) = endpoint.actions.iter().find(|a| a.name() == action_name) {
                let id = self.requests.next_id();

                if let Some(request) = action.request(id, data) {
                    self.requests.enqueue(
                        ieee,
                        RequestPayload::Data {
                            endpoint_id: endpoint.id,
                            cluster_id: action.cluster_id(),
                            data: request,
                            name: Some(format!("{} action", action.name())),
                        },
                    );
                }

                if action.poll() {
                    let id = self.requests.next_id();
                    self.requests.enqueue(
                        ieee,
                        RequestPayload::Data {
                            endpoint_id: endpoint.id,
                            cluster_id: action.cluster_id(),
                            data: commands::read_attributes_request(
                                id,
                                &[action.attribute_id()],
                                action.manufacturer_code(),
                            ),
                            name: None,
                        },
                    );
                }

                break;
            }
        }
    }

    pub(crate) async fn group_action(&mut self, group_id: u16, action_name: &str, data: &Value) {
        let Some(action) = crate::action::Action::by_name(action_name) else {
            return;
        };

        let id = self.requests.next_id();
        let Some(request) = action.request(id, data) else {
            return;
        };

        // bypasses the scheduler: groups have no unicast confirmation
        self.adapter
            .extended_data_request(
                id,
                ExtendedDestination::Group(group_id),
                0xFF,
                0x0000,
                0x01,
                action.cluster_id(),
                &request,
            )
            .await;
    }

    // ---- shared helpers ----------------------------------------------------

    /// Resolve an API target; the coordinator and removed devices are
    /// not controllable
    pub(crate) fn controllable_device(&self, device_name: &str) -> Option<IeeeAddress> {
        let ieee = self.devices.by_name(device_name)?;
        let device = self.devices.get(&ieee)?;

        if device.removed || device.logical_type == LogicalType::Coordinator {
            return None;
        }

        Some(ieee)
    }

    pub(crate) fn configure_device_reportings(&mut self, ieee: IeeeAddress) {
        let mut reportings: Vec<(u8, Reporting)> = Vec::new();

        if let Some(device) = self.devices.get(&ieee) {
            for endpoint in device.endpoints.values() {
                for reporting in &endpoint.reportings {
                    reportings.push((endpoint.id, reporting.clone()));
                }
            }
        }

        for (endpoint_id, reporting) in reportings {
            self.configure_reporting(ieee, endpoint_id, &reporting);
        }
    }

    /// Bind the cluster to the coordinator and push one
    /// configure-reporting record per attribute
    pub(crate) fn configure_reporting(
        &mut self,
        ieee: IeeeAddress,
        endpoint_id: u8,
        reporting: &Reporting,
    ) {
        self.enqueue_binding_request(ieee, endpoint_id, reporting.cluster_id, Vec::new(), 0, false);

        let id = self.requests.next_id();
        let mut request = zcl_header(0x00, id, global::CONFIGURE_REPORTING);

        for &attribute_id in &reporting.attributes {
            request.extend_from_slice(&commands::configure_reporting_record(
                attribute_id,
                reporting.data_type,
                reporting.min_interval,
                reporting.max_interval,
                reporting.value_change,
            ));
        }

        let name = format!("{} reporting configuration", reporting.name);
        self.enqueue_data_request(ieee, endpoint_id, reporting.cluster_id, request, Some(&name));
    }

    pub(crate) fn enqueue_data_request(
        &mut self,
        ieee: IeeeAddress,
        endpoint_id: u8,
        cluster_id: u16,
        data: Vec<u8>,
        name: Option<&str>,
    ) -> u8 {
        self.requests.enqueue(
            ieee,
            RequestPayload::Data {
                endpoint_id,
                cluster_id,
                data,
                name: name.map(str::to_string),
            },
        )
    }

    pub(crate) fn enqueue_binding_request(
        &mut self,
        ieee: IeeeAddress,
        endpoint_id: u8,
        cluster_id: u16,
        dst_address: Vec<u8>,
        dst_endpoint_id: u8,
        unbind: bool,
    ) -> u8 {
        self.requests.enqueue(
            ieee,
            RequestPayload::Binding {
                endpoint_id,
                cluster_id,
                dst_address,
                dst_endpoint_id,
                unbind,
            },
        )
    }

    pub(crate) fn emit_device_event(&self, ieee: IeeeAddress, kind: DeviceEventKind) {
        let _ = self.event_tx.send(Event::Device {
            ieee_address: ieee,
            kind,
        });
    }

    pub(crate) async fn store_database(&self) {
        self.devices.store_database(&self.config.database_file).await;
    }

    pub(crate) async fn store_properties(&self) {
        self.devices
            .store_properties(&self.config.properties_file)
            .await;
    }
}
