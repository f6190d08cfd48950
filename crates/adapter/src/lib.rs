//! USB2LPT adapter access
//!
//! Host-side driver for the USB2LPT USB-to-parallel-port adapter. It finds
//! the adapter on the bus, keeps a claimed transfer session alive across
//! unplug/replug, and issues register reads and writes through the
//! [`protocol`] wire format.
//!
//! Layers, bottom up:
//! - [`descriptor`]: pure interface/endpoint selection over descriptor data
//! - [`backend`]: the [`UsbBackend`]/[`BulkHandle`] seam and its `rusb` implementation
//! - [`locator`]: discovery of the adapter by vendor id
//! - [`session`]: an opened, interface-claimed handle with raw bulk transfers
//! - [`adapter`]: [`LptAdapter`], which recovers from transfer failures by
//!   rediscovering the device and retrying once
//!
//! Device presence is tracked reactively: there is no hot-plug listener, a
//! vanished adapter is noticed when a transfer fails.

pub mod adapter;
pub mod backend;
pub mod descriptor;
pub mod error;
pub mod locator;
pub mod session;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use adapter::{AdapterOptions, DeviceState, LptAdapter, Outcome};
pub use backend::{BulkHandle, RusbBackend, RusbHandle, UsbBackend};
pub use descriptor::{
    DeviceIdentity, EndpointInfo, EndpointPair, InterfaceInfo, MismatchReason, PRINTER_CLASS,
    VENDOR_CLASS, VENDOR_ID,
};
pub use error::{AdapterError, Result};
pub use locator::{Located, discover};
pub use session::TransferSession;
