//! Descriptor model and interface/endpoint selection
//!
//! These types are plain snapshots of the USB descriptors we care about, so
//! that selection logic does not depend on a live `rusb` device.

use std::fmt;

/// USB vendor id of the USB2LPT adapter
pub const VENDOR_ID: u16 = 0x5348;

/// Interface class used for general-purpose parallel port access
pub const VENDOR_CLASS: u8 = 0xff;

/// Printer-class interface the adapter also exposes (unused here)
pub const PRINTER_CLASS: u8 = 0x07;

/// Identifies one enumerated device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DeviceIdentity {
    pub vendor_id: u16,
    pub product_id: u16,
    pub bus_number: u8,
    pub address: u8,
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04x}:{:04x} (bus {:03} device {:03})",
            self.vendor_id, self.product_id, self.bus_number, self.address
        )
    }
}

/// One endpoint of an interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointInfo {
    pub address: u8,
    pub max_packet_size: u16,
}

impl EndpointInfo {
    /// Device-to-host endpoints have bit 7 of the address set
    pub fn is_in(&self) -> bool {
        self.address >= 0x80
    }
}

/// One interface alternate setting of the first configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceInfo {
    pub number: u8,
    pub alt_setting: u8,
    pub class_code: u8,
    pub endpoints: Vec<EndpointInfo>,
}

/// The bulk endpoints used for register traffic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointPair {
    /// Host-to-device endpoint, carries command frames
    pub out_ep: EndpointInfo,
    /// Device-to-host endpoint, carries read responses
    pub in_ep: EndpointInfo,
}

/// Why a device does not fit the adapter's interface layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MismatchReason {
    NoVendorInterface,
    MissingOutEndpoint,
    MissingInEndpoint,
}

impl fmt::Display for MismatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MismatchReason::NoVendorInterface => write!(
                f,
                "first configuration has no vendor-class ({:#04x}) interface",
                VENDOR_CLASS
            ),
            MismatchReason::MissingOutEndpoint => write!(f, "interface has no OUT endpoint"),
            MismatchReason::MissingInEndpoint => write!(f, "interface has no IN endpoint"),
        }
    }
}

/// Pick the first vendor-class interface
pub fn select_interface(interfaces: &[InterfaceInfo]) -> Result<&InterfaceInfo, MismatchReason> {
    interfaces
        .iter()
        .find(|interface| interface.class_code == VENDOR_CLASS)
        .ok_or(MismatchReason::NoVendorInterface)
}

/// Pick the first OUT and the first IN endpoint of an interface
pub fn select_endpoints(interface: &InterfaceInfo) -> Result<EndpointPair, MismatchReason> {
    let out_ep = interface
        .endpoints
        .iter()
        .find(|ep| !ep.is_in())
        .copied()
        .ok_or(MismatchReason::MissingOutEndpoint)?;
    let in_ep = interface
        .endpoints
        .iter()
        .find(|ep| ep.is_in())
        .copied()
        .ok_or(MismatchReason::MissingInEndpoint)?;

    Ok(EndpointPair { out_ep, in_ep })
}
