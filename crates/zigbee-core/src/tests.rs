//! End-to-end scenarios driven through the scripted adapter

use crate::adapter::{AdapterEvent, ExtendedDestination};
use crate::config::Config;
use crate::controller::{Controller, DeviceEventKind, Event};
use crate::device::{Device, IeeeAddress, LogicalType, ZoneStatus};
use crate::testutil::{AdapterCall, CallLog, MockAdapter};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::broadcast;
use zcl::frame::frame_control;
use zcl::{cluster, data_type, global, status, zcl_header};

const COORDINATOR_IEEE: u64 = 0x00124B_00AA_BBCC;
const DEVICE_IEEE: IeeeAddress = [0xAA, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07];
const NWK: u16 = 0x1234;

async fn ready_controller(
    tag: &str,
) -> (
    Controller,
    CallLog,
    Arc<Mutex<bool>>,
    broadcast::Receiver<Event>,
) {
    let (adapter, calls, refuse) = MockAdapter::new(COORDINATOR_IEEE);

    let dir = std::env::temp_dir().join(format!("zigbee-core-{}-{}", tag, std::process::id()));
    let config = Config {
        database_file: dir.join("database.json"),
        properties_file: dir.join("properties.json"),
        ..Config::default()
    };

    let (mut controller, events) = Controller::new(config, Box::new(adapter));
    controller
        .handle_adapter_event(AdapterEvent::CoordinatorReady)
        .await;
    calls.lock().unwrap().clear();

    (controller, calls, refuse, events)
}

fn drain_device_events(events: &mut broadcast::Receiver<Event>) -> Vec<DeviceEventKind> {
    let mut kinds = Vec::new();

    while let Ok(event) = events.try_recv() {
        if let Event::Device { kind, .. } = event {
            kinds.push(kind);
        }
    }

    kinds
}

fn take_calls(calls: &CallLog) -> Vec<AdapterCall> {
    std::mem::take(&mut *calls.lock().unwrap())
}

/// READ_ATTRIBUTES_RESPONSE frame; string values carry their own length
/// prefix
fn read_response_frame(transaction_id: u8, records: &[(u16, u8, &[u8])]) -> Vec<u8> {
    let mut frame = zcl_header(
        frame_control::SERVER_TO_CLIENT | frame_control::DISABLE_DEFAULT_RESPONSE,
        transaction_id,
        global::READ_ATTRIBUTES_RESPONSE,
    );

    for (attribute_id, record_type, value) in records {
        frame.extend_from_slice(&attribute_id.to_le_bytes());
        frame.push(status::SUCCESS);
        frame.push(*record_type);
        frame.extend_from_slice(value);
    }

    frame
}

fn report_frame(transaction_id: u8, records: &[(u16, u8, &[u8])]) -> Vec<u8> {
    let mut frame = zcl_header(
        frame_control::SERVER_TO_CLIENT | frame_control::DISABLE_DEFAULT_RESPONSE,
        transaction_id,
        global::REPORT_ATTRIBUTES,
    );

    for (attribute_id, record_type, value) in records {
        frame.extend_from_slice(&attribute_id.to_le_bytes());
        frame.push(*record_type);
        frame.extend_from_slice(value);
    }

    frame
}

async fn deliver(controller: &mut Controller, cluster_id: u16, frame: &[u8]) {
    controller
        .message_received(NWK, 0x01, cluster_id, 200, frame)
        .await;
}

fn insert_ready_device(controller: &mut Controller, name: &str, in_clusters: Vec<u16>) {
    let mut device = Device::new(DEVICE_IEEE, NWK);
    device.name = Some(name.to_string());
    device.manufacturer_name = "Acme".to_string();
    device.model_name = "unit-1".to_string();
    device.interview_finished = true;
    device.endpoint(0x01).in_clusters = in_clusters;
    controller.devices.insert(device);
}

#[tokio::test]
async fn interview_walks_to_enrolled() {
    let (mut controller, calls, _, mut events) = ready_controller("interview").await;

    controller.device_joined(DEVICE_IEEE, NWK);
    assert!(controller.requests.has_interview(&DEVICE_IEEE));

    // 1: node descriptor
    controller.handle_requests().await;
    let id = match take_calls(&calls).as_slice() {
        [AdapterCall::NodeDescriptor { id, network_address }] => {
            assert_eq!(*network_address, NWK);
            *id
        }
        other => panic!("expected node descriptor request, got {other:?}"),
    };

    controller.node_descriptor_received(NWK, LogicalType::EndDevice, 0x1037);

    // 2: active endpoints
    controller.handle_requests().await;
    assert!(matches!(
        take_calls(&calls).as_slice(),
        [AdapterCall::ActiveEndpoints { .. }]
    ));

    controller.active_endpoints_received(NWK, &[0x01]);

    // 3: simple descriptor
    controller.handle_requests().await;
    assert!(matches!(
        take_calls(&calls).as_slice(),
        [AdapterCall::SimpleDescriptor { endpoint_id: 0x01, .. }]
    ));

    controller.simple_descriptor_received(
        NWK,
        0x01,
        0x0104,
        0x0402,
        vec![cluster::BASIC, cluster::IAS_ZONE],
        vec![],
    );

    // 4: basic identity attributes
    controller.handle_requests().await;
    match take_calls(&calls).as_slice() {
        [AdapterCall::Data { cluster_id, data, .. }] => {
            assert_eq!(*cluster_id, cluster::BASIC);
            assert_eq!(data, &zcl::read_attributes_request(id, &[0x0001, 0x0004, 0x0005, 0x0007], 0));
        }
        other => panic!("expected basic attributes read, got {other:?}"),
    }

    deliver(
        &mut controller,
        cluster::BASIC,
        &read_response_frame(
            id,
            &[
                (0x0001, data_type::UNSIGNED_8BIT, &[0x05]),
                (0x0004, data_type::CHARACTER_STRING, b"\x04Acme"),
                (0x0005, data_type::CHARACTER_STRING, b"\x08sensor-1"),
                (0x0007, data_type::ENUM_8BIT, &[0x03]),
            ],
        ),
    )
    .await;

    {
        let device = controller.devices.get(&DEVICE_IEEE).unwrap();
        assert_eq!(device.manufacturer_name, "Acme");
        assert_eq!(device.model_name, "sensor-1");
        assert_eq!(device.version, 5);
    }

    // 5: IAS zone state read
    controller.handle_requests().await;
    match take_calls(&calls).as_slice() {
        [AdapterCall::Data { cluster_id, .. }] => assert_eq!(*cluster_id, cluster::IAS_ZONE),
        other => panic!("expected IAS read, got {other:?}"),
    }

    // zone reports unenrolled with a foreign CIE address
    deliver(
        &mut controller,
        cluster::IAS_ZONE,
        &read_response_frame(
            id,
            &[
                (0x0000, data_type::ENUM_8BIT, &[0x00]),
                (0x0010, data_type::IEEE_ADDRESS, &[0u8; 8]),
            ],
        ),
    )
    .await;

    assert_eq!(
        controller.devices.get(&DEVICE_IEEE).unwrap().endpoints[&0x01].zone_status,
        ZoneStatus::SetAddress
    );

    // 6: CIE address write carries the coordinator address
    controller.handle_requests().await;
    match take_calls(&calls).as_slice() {
        [AdapterCall::Data { cluster_id, data, .. }] => {
            assert_eq!(*cluster_id, cluster::IAS_ZONE);

            let mut expected = zcl_header(
                frame_control::DISABLE_DEFAULT_RESPONSE,
                data[1],
                global::WRITE_ATTRIBUTES,
            );
            expected.extend_from_slice(&[0x10, 0x00, data_type::IEEE_ADDRESS]);
            expected.extend_from_slice(&COORDINATOR_IEEE.to_le_bytes());
            assert_eq!(data, &expected);
        }
        other => panic!("expected CIE address write, got {other:?}"),
    }

    let mut write_response = zcl_header(
        frame_control::SERVER_TO_CLIENT | frame_control::DISABLE_DEFAULT_RESPONSE,
        id,
        global::WRITE_ATTRIBUTES_RESPONSE,
    );
    write_response.push(status::SUCCESS);
    deliver(&mut controller, cluster::IAS_ZONE, &write_response).await;

    assert_eq!(
        controller.devices.get(&DEVICE_IEEE).unwrap().endpoints[&0x01].zone_status,
        ZoneStatus::Enroll
    );

    // 7: enroll response plus verification read
    controller.handle_requests().await;
    match take_calls(&calls).as_slice() {
        [AdapterCall::Data { data: enroll, .. }, AdapterCall::Data { .. }] => {
            assert_eq!(enroll[2], 0x00); // zone enroll response
            assert_eq!(&enroll[3..], &[0x00, 0x42]); // success, zone id
        }
        other => panic!("expected enroll plus verify, got {other:?}"),
    }

    deliver(
        &mut controller,
        cluster::IAS_ZONE,
        &read_response_frame(
            id,
            &[
                (0x0000, data_type::ENUM_8BIT, &[0x01]),
                (0x0010, data_type::IEEE_ADDRESS, &COORDINATOR_IEEE.to_le_bytes()),
            ],
        ),
    )
    .await;

    // 8: converged
    controller.handle_requests().await;

    let device = controller.devices.get(&DEVICE_IEEE).unwrap();
    assert!(device.interview_finished);
    assert!(!device.manufacturer_name.is_empty());
    assert!(!device.model_name.is_empty());
    assert_eq!(device.endpoints[&0x01].zone_status, ZoneStatus::Enrolled);
    assert!(device.interview_deadline.is_none());

    let kinds = drain_device_events(&mut events);
    assert!(kinds.contains(&DeviceEventKind::DeviceJoined));
    assert!(kinds.contains(&DeviceEventKind::InterviewFinished));

    // the interview entry is gone within the final tick
    controller.handle_requests().await;
    assert!(!controller.requests.has_interview(&DEVICE_IEEE));
}

#[tokio::test]
async fn interview_times_out_and_resumes_partial() {
    let (mut controller, _, _, mut events) = ready_controller("interview-timeout").await;

    controller.device_joined(DEVICE_IEEE, NWK);

    if let Some(device) = controller.devices.get_mut(&DEVICE_IEEE) {
        device.interview_deadline = Some(Instant::now());
    }

    controller.check_interview_timeouts();
    controller.handle_requests().await;

    let kinds = drain_device_events(&mut events);
    assert!(kinds.contains(&DeviceEventKind::InterviewTimeout));
    assert!(!controller.requests.has_interview(&DEVICE_IEEE));

    // the device keeps its partial state and a rejoin restarts the walk
    assert!(controller.devices.get(&DEVICE_IEEE).is_some());
    controller.device_joined(DEVICE_IEEE, NWK);
    assert!(controller.requests.has_interview(&DEVICE_IEEE));
}

#[tokio::test]
async fn tuya_identity_rewrite() {
    let (mut controller, _, _, _) = ready_controller("tuya-rewrite").await;

    controller.device_joined(DEVICE_IEEE, NWK);

    deliver(
        &mut controller,
        cluster::BASIC,
        &read_response_frame(
            0x01,
            &[
                (0x0004, data_type::CHARACTER_STRING, b"\x10_TZE200_d0yu2xgi"),
                (0x0005, data_type::CHARACTER_STRING, b"\x06TS0601"),
            ],
        ),
    )
    .await;

    let device = controller.devices.get(&DEVICE_IEEE).unwrap();
    assert_eq!(device.manufacturer_name, "TUYA");
    assert_eq!(device.model_name, "_TZE200_d0yu2xgi");
}

#[tokio::test]
async fn lumi_join_shortcut_finishes_interview() {
    let (mut controller, _, _, mut events) = ready_controller("lumi-shortcut").await;

    controller.device_joined(DEVICE_IEEE, NWK);

    deliver(
        &mut controller,
        cluster::BASIC,
        &report_frame(
            0x01,
            &[(0x0005, data_type::CHARACTER_STRING, b"\x16lumi.sensor_magnet.aq2")],
        ),
    )
    .await;

    let device = controller.devices.get(&DEVICE_IEEE).unwrap();
    assert!(device.interview_finished);
    assert_eq!(device.manufacturer_name, "LUMI");
    assert_eq!(device.power_source, crate::device::POWER_SOURCE_BATTERY);

    let kinds = drain_device_events(&mut events);
    assert!(kinds.contains(&DeviceEventKind::InterviewFinished));
}

#[tokio::test]
async fn time_cluster_read_is_answered() {
    let (mut controller, calls, _, _) = ready_controller("time-cluster").await;
    insert_ready_device(&mut controller, "clock", vec![]);

    let mut frame = zcl_header(0x00, 0x7E, global::READ_ATTRIBUTES);
    frame.extend_from_slice(&0x0000u16.to_le_bytes());
    frame.extend_from_slice(&0x0009u16.to_le_bytes());
    deliver(&mut controller, cluster::TIME, &frame).await;

    let before = chrono::Local::now().timestamp() - 946_684_800;
    controller.handle_requests().await;

    match take_calls(&calls).as_slice() {
        [AdapterCall::Data { cluster_id, data, .. }] => {
            assert_eq!(*cluster_id, cluster::TIME);
            assert_eq!(
                &data[..3],
                &[
                    frame_control::SERVER_TO_CLIENT | frame_control::DISABLE_DEFAULT_RESPONSE,
                    0x7E,
                    global::READ_ATTRIBUTES_RESPONSE,
                ]
            );

            // attr 0x0000: success, UTC time in the 2000 epoch
            assert_eq!(&data[3..5], &[0x00, 0x00]);
            assert_eq!(data[5], status::SUCCESS);
            assert_eq!(data[6], data_type::UTC_TIME);
            let reported = i64::from(u32::from_le_bytes([data[7], data[8], data[9], data[10]]));
            assert!((reported - before).abs() <= 2);

            // attr 0x0009 is unsupported
            assert_eq!(&data[11..], &[0x09, 0x00, status::UNSUPPORTED_ATTRIBUTE]);
        }
        other => panic!("expected time response, got {other:?}"),
    }
}

#[tokio::test]
async fn report_updates_property_and_emits_event() {
    let (mut controller, _, _, mut events) = ready_controller("report").await;
    insert_ready_device(
        &mut controller,
        "thermometer",
        vec![cluster::TEMPERATURE_MEASUREMENT],
    );
    controller.update_device("thermometer", false);

    deliver(
        &mut controller,
        cluster::TEMPERATURE_MEASUREMENT,
        &report_frame(0x11, &[(0x0000, data_type::SIGNED_16BIT, &2345i16.to_le_bytes())]),
    )
    .await;

    let device = controller.devices.get(&DEVICE_IEEE).unwrap();
    let property = device.endpoints[&0x01]
        .properties
        .iter()
        .find(|p| p.name() == "temperature")
        .unwrap();
    assert_eq!(property.value(), &json!(23.45));

    let mut updated = false;
    while let Ok(event) = events.try_recv() {
        if matches!(event, Event::EndpointUpdated { endpoint_id: 0x01, .. }) {
            updated = true;
        }
    }
    assert!(updated);
}

#[tokio::test]
async fn default_response_follows_undisabled_report() {
    let (mut controller, calls, _, _) = ready_controller("default-response").await;
    insert_ready_device(
        &mut controller,
        "thermometer",
        vec![cluster::TEMPERATURE_MEASUREMENT],
    );
    controller.update_device("thermometer", false);

    // frame control without DISABLE_DEFAULT_RESPONSE
    let mut frame = zcl_header(
        frame_control::SERVER_TO_CLIENT,
        0x33,
        global::REPORT_ATTRIBUTES,
    );
    frame.extend_from_slice(&0x0000u16.to_le_bytes());
    frame.push(data_type::SIGNED_16BIT);
    frame.extend_from_slice(&100i16.to_le_bytes());

    deliver(&mut controller, cluster::TEMPERATURE_MEASUREMENT, &frame).await;
    controller.handle_requests().await;

    let sent = take_calls(&calls);
    let default_response = sent.iter().find_map(|call| match call {
        AdapterCall::Data { data, .. } if data.get(2) == Some(&global::DEFAULT_RESPONSE) => {
            Some(data.clone())
        }
        _ => None,
    });

    let data = default_response.expect("default response not sent");
    assert_eq!(data[0], frame_control::SERVER_TO_CLIENT | frame_control::DISABLE_DEFAULT_RESPONSE);
    assert_eq!(data[1], 0x33); // echoes the peer transaction id
    assert_eq!(&data[3..], &[global::REPORT_ATTRIBUTES, status::SUCCESS]);
}

#[tokio::test]
async fn refused_request_is_aborted_and_swept() {
    let (mut controller, calls, refuse, _) = ready_controller("refusal").await;
    insert_ready_device(&mut controller, "plug", vec![cluster::ON_OFF]);

    *refuse.lock().unwrap() = true;
    controller.enqueue_data_request(DEVICE_IEEE, 0x01, cluster::ON_OFF, vec![0x01, 0x00, 0x02], None);

    controller.handle_requests().await;

    assert_eq!(take_calls(&calls).len(), 1);
    assert!(controller.requests.is_empty());
}

#[tokio::test]
async fn finished_request_disappears_within_one_tick() {
    let (mut controller, _, _, _) = ready_controller("finish-sweep").await;
    insert_ready_device(&mut controller, "plug", vec![cluster::ON_OFF]);

    let id = controller.enqueue_data_request(
        DEVICE_IEEE,
        0x01,
        cluster::ON_OFF,
        vec![0x01, 0x00, 0x02],
        Some("status action"),
    );

    controller.handle_requests().await;
    assert_eq!(controller.requests.len(), 1); // sent, awaiting confirmation

    controller.request_finished(id, 0).await;
    controller.handle_requests().await;
    assert!(controller.requests.is_empty());
}

#[tokio::test]
async fn request_for_vanished_device_aborts() {
    let (mut controller, calls, _, _) = ready_controller("vanished").await;

    controller.enqueue_data_request([9u8; 8], 0x01, cluster::ON_OFF, vec![0x00], None);
    controller.handle_requests().await;

    assert!(take_calls(&calls).is_empty());
    assert!(controller.requests.is_empty());
}

#[tokio::test]
async fn remove_device_waits_for_leave_confirmation() {
    let (mut controller, calls, _, _) = ready_controller("remove").await;
    insert_ready_device(&mut controller, "old-sensor", vec![]);

    controller.remove_device("old-sensor", false).await;
    controller.handle_requests().await;

    let id = match take_calls(&calls).as_slice() {
        [AdapterCall::Leave { id, network_address }] => {
            assert_eq!(*network_address, NWK);
            *id
        }
        other => panic!("expected leave request, got {other:?}"),
    };

    assert!(controller.devices.get(&DEVICE_IEEE).is_some());

    controller.request_finished(id, 0).await;
    assert!(controller.devices.get(&DEVICE_IEEE).is_none());
}

#[tokio::test]
async fn reporting_configuration_binds_then_configures() {
    let (mut controller, calls, _, _) = ready_controller("reporting").await;
    insert_ready_device(
        &mut controller,
        "thermometer",
        vec![cluster::TEMPERATURE_MEASUREMENT],
    );

    controller.update_device("thermometer", true);
    controller.handle_requests().await;

    let sent = take_calls(&calls);

    let bind = sent.iter().find(|call| matches!(call, AdapterCall::Bind { .. }));
    match bind {
        Some(AdapterCall::Bind { cluster_id, dst_address, unbind, .. }) => {
            assert_eq!(*cluster_id, cluster::TEMPERATURE_MEASUREMENT);
            assert!(dst_address.is_empty()); // bind to the coordinator
            assert!(!unbind);
        }
        other => panic!("expected bind request, got {other:?}"),
    }

    let configure = sent.iter().find_map(|call| match call {
        AdapterCall::Data { id, data, .. } if data.get(2) == Some(&global::CONFIGURE_REPORTING) => {
            Some((*id, data.clone()))
        }
        _ => None,
    });

    let (id, data) = configure.expect("configure reporting not sent");
    assert_eq!(data[1], id); // peer-visible tid is the request id
    assert_eq!(
        &data[3..],
        &[
            0x00, // direction
            0x00, 0x00, // attribute
            data_type::SIGNED_16BIT,
            0x0A, 0x00, // min 10
            0x58, 0x02, // max 600
            0x32, 0x00, // change 50
        ]
    );
}

#[tokio::test]
async fn binding_control_resolves_destination_by_name() {
    let (mut controller, calls, _, _) = ready_controller("binding").await;
    insert_ready_device(&mut controller, "remote", vec![cluster::ON_OFF]);

    let mut target = Device::new([0xBB; 8], 0x4321);
    target.name = Some("lamp".to_string());
    target.interview_finished = true;
    controller.devices.insert(target);

    controller.binding_control(
        "remote",
        0x01,
        cluster::ON_OFF,
        &crate::controller::BindingDestination::Device("lamp".to_string()),
        0x01,
        false,
    );
    controller.handle_requests().await;

    match take_calls(&calls).as_slice() {
        [AdapterCall::Bind { dst_address, dst_endpoint_id, .. }] => {
            assert_eq!(dst_address, &[0xBB; 8].to_vec());
            assert_eq!(*dst_endpoint_id, 0x01);
        }
        other => panic!("expected bind to lamp, got {other:?}"),
    }
}

#[tokio::test]
async fn touchlink_scan_sweeps_all_channels() {
    let (mut controller, calls, _, _) = ready_controller("touchlink").await;

    controller.touchlink_request(None, 0, false).await;

    let sent = take_calls(&calls);
    assert_eq!(sent.first(), Some(&AdapterCall::InterPanEndpoint(0x0C)));
    assert_eq!(sent.last(), Some(&AdapterCall::ResetInterPan));

    let channels: Vec<u8> = sent
        .iter()
        .filter_map(|call| match call {
            AdapterCall::InterPanChannel(channel) => Some(*channel),
            _ => None,
        })
        .collect();
    assert_eq!(channels, (11..=26).collect::<Vec<u8>>());

    for call in &sent {
        if let AdapterCall::Extended {
            destination,
            dst_pan_id,
            src_endpoint_id,
            cluster_id,
            data,
            ..
        } = call
        {
            assert_eq!(*destination, ExtendedDestination::Broadcast);
            assert_eq!(*dst_pan_id, 0xFFFF);
            assert_eq!(*src_endpoint_id, 0x0C);
            assert_eq!(*cluster_id, cluster::TOUCHLINK);
            assert_eq!(data[2], 0x00); // scan request
            assert_eq!(&data[7..9], &[0x04, 0x12]);
        }
    }
}

#[tokio::test]
async fn group_action_bypasses_the_scheduler() {
    let (mut controller, calls, _, _) = ready_controller("group-action").await;

    controller.group_action(0x0002, "status", &json!("on")).await;

    assert!(controller.requests.is_empty());
    match take_calls(&calls).as_slice() {
        [AdapterCall::Extended { destination, dst_endpoint_id, cluster_id, data, .. }] => {
            assert_eq!(*destination, ExtendedDestination::Group(0x0002));
            assert_eq!(*dst_endpoint_id, 0xFF);
            assert_eq!(*cluster_id, cluster::ON_OFF);
            assert_eq!(data[2], 0x01); // on
        }
        other => panic!("expected group request, got {other:?}"),
    }
}

#[tokio::test]
async fn device_action_sends_request_and_poll() {
    let (mut controller, calls, _, _) = ready_controller("device-action").await;
    insert_ready_device(&mut controller, "plug", vec![cluster::ON_OFF]);
    controller.update_device("plug", false);

    controller.device_action("plug", 0x01, "status", &json!("toggle"));
    controller.handle_requests().await;

    let sent = take_calls(&calls);
    assert_eq!(sent.len(), 2);

    match (&sent[0], &sent[1]) {
        (
            AdapterCall::Data { data: command, .. },
            AdapterCall::Data { id, data: poll, .. },
        ) => {
            assert_eq!(command[2], 0x02); // toggle
            assert_eq!(poll[1], *id); // the poll correlates by its own id
            assert_eq!(poll[2], global::READ_ATTRIBUTES);
            assert_eq!(&poll[3..5], &[0x00, 0x00]);
        }
        other => panic!("expected action plus poll, got {other:?}"),
    }
}

async fn write_ota_image(tag: &str, file_version: u32, image_size: u32) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("zigbee-core-ota-{}-{}", tag, std::process::id()));
    tokio::fs::create_dir_all(&dir).await.unwrap();
    let path = dir.join("firmware.ota");

    let mut contents = vec![0u8; zcl::ota::FileHeader::SIZE];
    contents[0..4].copy_from_slice(&zcl::ota::FILE_IDENTIFIER.to_le_bytes());
    contents[10..12].copy_from_slice(&0x1037u16.to_le_bytes());
    contents[12..14].copy_from_slice(&0x0001u16.to_le_bytes());
    contents[14..18].copy_from_slice(&file_version.to_le_bytes());
    contents[52..56].copy_from_slice(&image_size.to_le_bytes());

    // pad the body out to the advertised size
    contents.resize(image_size as usize, 0x5A);

    tokio::fs::write(&path, &contents).await.unwrap();
    path
}

fn ota_frame(transaction_id: u8, command_id: u8, body: &[u8]) -> Vec<u8> {
    let mut frame = zcl_header(
        frame_control::CLUSTER_SPECIFIC | frame_control::DISABLE_DEFAULT_RESPONSE,
        transaction_id,
        command_id,
    );
    frame.extend_from_slice(body);
    frame
}

#[tokio::test]
async fn ota_block_request_serves_file_bytes() {
    let (mut controller, calls, _, _) = ready_controller("ota-block").await;
    insert_ready_device(&mut controller, "bulb", vec![cluster::OTA_UPGRADE]);

    let path = write_ota_image("block", 0x0001_0002, 1024).await;
    let contents = tokio::fs::read(&path).await.unwrap();
    controller.ota_upgrade("bulb", 0x01, path).await;
    controller.handle_requests().await;
    take_calls(&calls); // drop the image notify

    // block request: offset 0, up to 64 bytes
    let mut body = vec![0x00];
    body.extend_from_slice(&0x1037u16.to_le_bytes());
    body.extend_from_slice(&0x0001u16.to_le_bytes());
    body.extend_from_slice(&0x0001_0002u32.to_le_bytes());
    body.extend_from_slice(&0u32.to_le_bytes());
    body.push(64);

    deliver(&mut controller, cluster::OTA_UPGRADE, &ota_frame(0x21, 0x03, &body)).await;
    controller.handle_requests().await;

    match take_calls(&calls).as_slice() {
        [AdapterCall::Data { cluster_id, data, .. }] => {
            assert_eq!(*cluster_id, cluster::OTA_UPGRADE);
            assert_eq!(&data[..3], &[0x19, 0x21, 0x05]); // server-to-client block response
            assert_eq!(data[3], status::SUCCESS);
            assert_eq!(data[16], 64); // data size
            assert_eq!(&data[17..], &contents[..64]);
        }
        other => panic!("expected block response, got {other:?}"),
    }
}

#[tokio::test]
async fn ota_image_request_version_match_offers_nothing() {
    let (mut controller, calls, _, _) = ready_controller("ota-match").await;
    insert_ready_device(&mut controller, "bulb", vec![cluster::OTA_UPGRADE]);

    let path = write_ota_image("match", 0x0001_0002, 256).await;
    controller.ota_upgrade("bulb", 0x01, path).await;
    controller.handle_requests().await;
    take_calls(&calls);

    // the node already runs the offered version
    let mut body = vec![0x00];
    body.extend_from_slice(&0x1037u16.to_le_bytes());
    body.extend_from_slice(&0x0001u16.to_le_bytes());
    body.extend_from_slice(&0x0001_0002u32.to_le_bytes());

    deliver(&mut controller, cluster::OTA_UPGRADE, &ota_frame(0x22, 0x01, &body)).await;
    controller.handle_requests().await;

    match take_calls(&calls).as_slice() {
        [AdapterCall::Data { data, .. }] => {
            assert_eq!(&data[..3], &[0x19, 0x22, 0x02]);
            assert_eq!(&data[3..], &[status::NO_IMAGE_AVAILABLE]);
        }
        other => panic!("expected image response, got {other:?}"),
    }
}

#[tokio::test]
async fn ota_upgrade_end_clears_the_pending_file() {
    let (mut controller, calls, _, _) = ready_controller("ota-end").await;
    insert_ready_device(&mut controller, "bulb", vec![cluster::OTA_UPGRADE]);

    let path = write_ota_image("end", 0x0001_0003, 256).await;
    controller.ota_upgrade("bulb", 0x01, path).await;
    controller.handle_requests().await;
    take_calls(&calls);

    let mut body = vec![0x00];
    body.extend_from_slice(&0x1037u16.to_le_bytes());
    body.extend_from_slice(&0x0001u16.to_le_bytes());
    body.extend_from_slice(&0x0001_0003u32.to_le_bytes());

    deliver(&mut controller, cluster::OTA_UPGRADE, &ota_frame(0x23, 0x06, &body)).await;
    controller.handle_requests().await;

    assert!(controller.ota_upgrade_file.is_none());

    match take_calls(&calls).as_slice() {
        [AdapterCall::Data { data, .. }] => {
            assert_eq!(&data[..3], &[0x19, 0x23, 0x07]);
            // current and upgrade time both zero: upgrade immediately
            assert_eq!(&data[11..], &[0u8; 8]);
        }
        other => panic!("expected upgrade end response, got {other:?}"),
    }
}

#[tokio::test]
async fn unknown_cluster_command_is_dropped() {
    let (mut controller, calls, _, _) = ready_controller("unknown-command").await;
    insert_ready_device(&mut controller, "mystery", vec![]);

    let frame = zcl_header(
        frame_control::CLUSTER_SPECIFIC | frame_control::DISABLE_DEFAULT_RESPONSE,
        0x01,
        0x42,
    );
    deliver(&mut controller, 0x1234, &frame).await;
    controller.handle_requests().await;

    // logged and dropped, nothing goes out
    assert!(take_calls(&calls).is_empty());
}
