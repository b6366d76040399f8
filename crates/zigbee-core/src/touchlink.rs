//! TouchLink commissioning over inter-PAN frames

use crate::adapter::ExtendedDestination;
use crate::controller::Controller;
use crate::device::IeeeAddress;
use zcl::commands::touchlink_scan_payload;
use zcl::frame::frame_control;
use zcl::{cluster, zcl_header};

const INTER_PAN_ENDPOINT: u8 = 0x0C;
const SCAN_CONTROL: u8 =
    frame_control::CLUSTER_SPECIFIC | frame_control::DISABLE_DEFAULT_RESPONSE;

impl Controller {
    pub(crate) async fn touchlink_request(
        &mut self,
        ieee_address: Option<IeeeAddress>,
        channel: u8,
        reset: bool,
    ) {
        if !self.adapter.set_inter_pan_endpoint(INTER_PAN_ENDPOINT).await {
            return;
        }

        if reset {
            if let Some(ieee_address) = ieee_address {
                self.touchlink_reset(ieee_address, channel).await;
            }
        } else {
            self.touchlink_scan().await;
        }

        self.adapter.reset_inter_pan().await;
    }

    async fn touchlink_reset(&mut self, ieee_address: IeeeAddress, channel: u8) {
        let transaction_id: u32 = rand::random();
        let id = self.requests.next_id();

        if !self.adapter.set_inter_pan_channel(channel).await {
            return;
        }

        let mut scan = zcl_header(SCAN_CONTROL, id, 0x00);
        scan.extend_from_slice(&touchlink_scan_payload(transaction_id));

        if !self
            .adapter
            .extended_data_request(
                id,
                ExtendedDestination::Broadcast,
                0xFE,
                0xFFFF,
                INTER_PAN_ENDPOINT,
                cluster::TOUCHLINK,
                &scan,
            )
            .await
        {
            tracing::warn!("TouchLink scan request failed");
            return;
        }

        // reset-to-factory carries the transaction id alone
        let mut reset = zcl_header(SCAN_CONTROL, id, 0x07);
        reset.extend_from_slice(&transaction_id.to_le_bytes());

        if !self
            .adapter
            .extended_data_request(
                id,
                ExtendedDestination::Ieee(ieee_address),
                0xFE,
                0xFFFF,
                INTER_PAN_ENDPOINT,
                cluster::TOUCHLINK,
                &reset,
            )
            .await
        {
            tracing::warn!("TouchLink reset request failed");
            return;
        }

        tracing::info!("TouchLink reset finished successfully");
    }

    async fn touchlink_scan(&mut self) {
        let transaction_id: u32 = rand::random();
        let id = self.requests.next_id();

        let mut request = zcl_header(SCAN_CONTROL, id, 0x00);
        request.extend_from_slice(&touchlink_scan_payload(transaction_id));

        tracing::info!("TouchLink scan started...");

        for channel in 11..=26 {
            self.inter_pan_channel = channel;

            if !self.adapter.set_inter_pan_channel(channel).await {
                return;
            }

            if !self
                .adapter
                .extended_data_request(
                    id,
                    ExtendedDestination::Broadcast,
                    0xFE,
                    0xFFFF,
                    INTER_PAN_ENDPOINT,
                    cluster::TOUCHLINK,
                    &request,
                )
                .await
            {
                tracing::warn!("TouchLink scan request failed");
                return;
            }
        }

        tracing::info!("TouchLink scan finished successfully");
    }
}
