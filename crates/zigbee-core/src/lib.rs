//! Zigbee coordinator core
//!
//! Device lifecycle (join, interview, IAS enrollment, removal), the ZCL
//! message engine with its per-vendor property parsers, the outstanding
//! request scheduler, and the OTA / Time / Groups / TouchLink
//! responders. Radio drivers plug in through the [`adapter::Adapter`]
//! contract; everything else runs on one event-loop task.

pub mod action;
pub mod adapter;
pub mod catalogue;
pub mod config;
pub mod controller;
pub mod device;
pub mod error;
mod interview;
mod ota;
pub mod persistence;
pub mod property;
pub mod request;
mod touchlink;

#[cfg(test)]
mod testutil;
#[cfg(test)]
mod tests;

pub use adapter::{Adapter, AdapterEvent, AdapterKind, ExtendedDestination};
pub use catalogue::DeviceCatalogue;
pub use config::Config;
pub use controller::{
    command_channel, BindingDestination, Command, Controller, DeviceEventKind, Event, ZigBee,
};
pub use device::{Device, Endpoint, IeeeAddress, LogicalType, Poll, Reporting, ZoneStatus};
pub use error::ControllerError;
pub use property::Property;
