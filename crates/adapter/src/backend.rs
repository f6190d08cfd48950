//! USB backend abstraction
//!
//! [`UsbBackend`] enumerates devices and opens them; [`BulkHandle`] is an
//! opened device. The production implementation wraps `rusb`; tests use the
//! scripted backend in [`crate::test_utils`].

use crate::descriptor::{DeviceIdentity, EndpointInfo, InterfaceInfo};
use crate::error::{AdapterError, Result};
use rusb::{Context, Device, DeviceHandle, UsbContext};
use std::time::Duration;
use tracing::{debug, warn};

/// Device enumeration and opening
pub trait UsbBackend {
    /// Reference to an enumerated (not yet opened) device
    type Device;
    /// Opened device
    type Handle: BulkHandle;

    /// Enumerate all buses and return the first device with `vendor_id`
    fn find_by_vendor(
        &mut self,
        vendor_id: u16,
    ) -> rusb::Result<Option<(Self::Device, DeviceIdentity)>>;

    /// Interfaces (all alternate settings) of the device's first configuration
    fn interfaces(&self, device: &Self::Device) -> rusb::Result<Vec<InterfaceInfo>>;

    /// Open the device
    fn open(&mut self, device: &Self::Device) -> rusb::Result<Self::Handle>;
}

/// Raw operations on an opened device
pub trait BulkHandle {
    fn claim_interface(&mut self, interface: u8) -> rusb::Result<()>;

    fn release_interface(&mut self, interface: u8) -> rusb::Result<()>;

    /// Returns the number of bytes actually written
    fn write_bulk(&mut self, endpoint: u8, data: &[u8], timeout: Duration) -> rusb::Result<usize>;

    /// Returns the number of bytes actually read into `buf`
    fn read_bulk(&mut self, endpoint: u8, buf: &mut [u8], timeout: Duration)
    -> rusb::Result<usize>;

    /// USB port reset
    fn reset(&mut self) -> rusb::Result<()>;
}

/// `rusb`-backed device enumeration
pub struct RusbBackend {
    context: Context,
}

impl RusbBackend {
    /// Create a new libusb context
    pub fn new() -> Result<Self> {
        let context = Context::new().map_err(AdapterError::Context)?;
        Ok(Self { context })
    }
}

impl UsbBackend for RusbBackend {
    type Device = Device<Context>;
    type Handle = RusbHandle;

    fn find_by_vendor(
        &mut self,
        vendor_id: u16,
    ) -> rusb::Result<Option<(Self::Device, DeviceIdentity)>> {
        let devices = self.context.devices()?;

        for device in devices.iter() {
            let descriptor = match device.device_descriptor() {
                Ok(d) => d,
                Err(e) => {
                    debug!(
                        "Skipping device on bus {} addr {}: {}",
                        device.bus_number(),
                        device.address(),
                        e
                    );
                    continue;
                }
            };

            if descriptor.vendor_id() != vendor_id {
                continue;
            }

            let identity = DeviceIdentity {
                vendor_id: descriptor.vendor_id(),
                product_id: descriptor.product_id(),
                bus_number: device.bus_number(),
                address: device.address(),
            };
            return Ok(Some((device, identity)));
        }

        Ok(None)
    }

    fn interfaces(&self, device: &Self::Device) -> rusb::Result<Vec<InterfaceInfo>> {
        let config = device.config_descriptor(0)?;

        let mut interfaces = Vec::new();
        for interface in config.interfaces() {
            for descriptor in interface.descriptors() {
                interfaces.push(InterfaceInfo {
                    number: descriptor.interface_number(),
                    alt_setting: descriptor.setting_number(),
                    class_code: descriptor.class_code(),
                    endpoints: descriptor
                        .endpoint_descriptors()
                        .map(|ep| EndpointInfo {
                            address: ep.address(),
                            max_packet_size: ep.max_packet_size(),
                        })
                        .collect(),
                });
            }
        }

        Ok(interfaces)
    }

    fn open(&mut self, device: &Self::Device) -> rusb::Result<Self::Handle> {
        let handle = device.open()?;
        Ok(RusbHandle {
            handle,
            detached: Vec::new(),
        })
    }
}

/// Opened `rusb` device handle
///
/// Remembers which interfaces had a kernel driver detached so it can be
/// reattached on release.
pub struct RusbHandle {
    handle: DeviceHandle<Context>,
    detached: Vec<u8>,
}

impl BulkHandle for RusbHandle {
    fn claim_interface(&mut self, interface: u8) -> rusb::Result<()> {
        match self.handle.kernel_driver_active(interface) {
            Ok(true) => {
                debug!("Detaching kernel driver from interface {}", interface);
                match self.handle.detach_kernel_driver(interface) {
                    Ok(()) => self.detached.push(interface),
                    // Claiming will most likely fail next and report why
                    Err(e) => warn!(
                        "Failed to detach kernel driver from interface {}: {}",
                        interface, e
                    ),
                }
            }
            Ok(false) => {}
            Err(e) => {
                debug!(
                    "Could not check kernel driver status for interface {}: {}",
                    interface, e
                );
            }
        }

        self.handle.claim_interface(interface)?;
        debug!("Claimed interface {}", interface);
        Ok(())
    }

    fn release_interface(&mut self, interface: u8) -> rusb::Result<()> {
        let result = self.handle.release_interface(interface);

        if let Some(pos) = self.detached.iter().position(|&i| i == interface) {
            self.detached.swap_remove(pos);
            if let Err(e) = self.handle.attach_kernel_driver(interface) {
                debug!(
                    "Could not reattach kernel driver to interface {}: {}",
                    interface, e
                );
            }
        }

        result
    }

    fn write_bulk(&mut self, endpoint: u8, data: &[u8], timeout: Duration) -> rusb::Result<usize> {
        self.handle.write_bulk(endpoint, data, timeout)
    }

    fn read_bulk(
        &mut self,
        endpoint: u8,
        buf: &mut [u8],
        timeout: Duration,
    ) -> rusb::Result<usize> {
        self.handle.read_bulk(endpoint, buf, timeout)
    }

    fn reset(&mut self) -> rusb::Result<()> {
        self.handle.reset()
    }
}
