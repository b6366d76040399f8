//! OTA upgrade responder: serves a configured image file over cluster
//! 0x0019
//!
//! The image file is opened, read and released per incoming command; no
//! handle survives between block requests.

use crate::controller::Controller;
use crate::device::IeeeAddress;
use std::path::PathBuf;
use tokio::fs;
use zcl::frame::frame_control;
use zcl::ota::{
    block_response, command, image_notify, image_response, upgrade_end_response, BlockRequest,
    FileHeader, ImageRequest, UpgradeEndRequest,
};
use zcl::{cluster, status, zcl_header};

const RESPONSE_CONTROL: u8 = frame_control::CLUSTER_SPECIFIC
    | frame_control::SERVER_TO_CLIENT
    | frame_control::DISABLE_DEFAULT_RESPONSE;

impl Controller {
    /// Arm the responder with an image file and nudge the device with an
    /// ImageNotify
    pub(crate) async fn ota_upgrade(
        &mut self,
        device_name: &str,
        endpoint_id: u8,
        file_name: PathBuf,
    ) {
        let Some(ieee) = self.controllable_device(device_name) else {
            return;
        };

        if fs::metadata(&file_name).await.is_err() {
            tracing::warn!("OTA upgrade file {:?} is not readable", file_name);
            return;
        }

        self.ota_upgrade_file = Some(file_name);

        let id = self.requests.next_id();
        let mut notify = zcl_header(
            frame_control::CLUSTER_SPECIFIC | frame_control::SERVER_TO_CLIENT,
            id,
            command::IMAGE_NOTIFY,
        );
        notify.extend_from_slice(&image_notify());

        self.enqueue_data_request(
            ieee,
            if endpoint_id != 0 { endpoint_id } else { 1 },
            cluster::OTA_UPGRADE,
            notify,
            None,
        );
    }

    pub(crate) async fn ota_command_received(
        &mut self,
        ieee: IeeeAddress,
        endpoint_id: u8,
        transaction_id: u8,
        command_id: u8,
        payload: &[u8],
    ) {
        let device_name = self
            .devices
            .get(&ieee)
            .map(crate::device::Device::name)
            .unwrap_or_default();

        // fresh read per command; a vanished file degrades to "no image"
        let contents = match &self.ota_upgrade_file {
            Some(path) => fs::read(path).await.ok(),
            None => None,
        };
        let header = contents.as_deref().and_then(FileHeader::parse);

        match command_id {
            command::IMAGE_REQUEST => {
                let request = ImageRequest::parse(payload);

                let response = match (request, header) {
                    (Some(request), Some(header))
                        if request.manufacturer_code == header.manufacturer_code
                            && request.image_type == header.image_type =>
                    {
                        if request.file_version == header.file_version {
                            tracing::info!(
                                "Device {} OTA upgrade not started, version match: 0x{:08X}",
                                device_name,
                                request.file_version
                            );
                            vec![status::NO_IMAGE_AVAILABLE]
                        } else {
                            tracing::info!("Device {} OTA upgrade started...", device_name);
                            image_response(&header)
                        }
                    }
                    _ => vec![status::NO_IMAGE_AVAILABLE],
                };

                self.enqueue_ota_response(ieee, endpoint_id, transaction_id, command::IMAGE_RESPONSE, &response);
            }

            command::IMAGE_BLOCK_REQUEST => {
                let request = BlockRequest::parse(payload);

                let response = match (request, header, contents.as_deref()) {
                    (Some(request), Some(header), Some(contents))
                        if request.manufacturer_code == header.manufacturer_code
                            && request.image_type == header.image_type
                            && request.file_version == header.file_version =>
                    {
                        let offset = (request.file_offset as usize).min(contents.len());
                        let end = offset
                            .saturating_add(request.data_size_max as usize)
                            .min(contents.len());
                        let block = &contents[offset..end];

                        tracing::info!(
                            "Device {} OTA upgrade writing {} bytes with offset 0x{:08X}",
                            device_name,
                            block.len(),
                            request.file_offset
                        );

                        block_response(&request, block)
                    }
                    _ => vec![status::NO_IMAGE_AVAILABLE],
                };

                self.enqueue_ota_response(
                    ieee,
                    endpoint_id,
                    transaction_id,
                    command::IMAGE_BLOCK_RESPONSE,
                    &response,
                );
            }

            command::UPGRADE_END_REQUEST => {
                self.ota_upgrade_file = None;

                let Some(request) = UpgradeEndRequest::parse(payload) else {
                    return;
                };

                if request.status != 0 {
                    tracing::warn!(
                        "Device {} OTA upgrade failed, status code: {:02X}",
                        device_name,
                        request.status
                    );
                    return;
                }

                tracing::info!("Device {} OTA upgrade finished successfully", device_name);

                self.enqueue_ota_response(
                    ieee,
                    endpoint_id,
                    transaction_id,
                    command::UPGRADE_END_RESPONSE,
                    &upgrade_end_response(&request),
                );
            }

            other => tracing::warn!(
                "Unrecognized OTA upgrade command 0x{:02X} received from device {} with payload: {:02X?}",
                other,
                device_name,
                payload
            ),
        }
    }

    fn enqueue_ota_response(
        &mut self,
        ieee: IeeeAddress,
        endpoint_id: u8,
        transaction_id: u8,
        command_id: u8,
        body: &[u8],
    ) {
        let mut response = zcl_header(RESPONSE_CONTROL, transaction_id, command_id);
        response.extend_from_slice(body);
        self.enqueue_data_request(ieee, endpoint_id, cluster::OTA_UPGRADE, response, None);
    }
}
