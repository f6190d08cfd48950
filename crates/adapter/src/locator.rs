//! Adapter discovery
//!
//! Finds the adapter by vendor id and resolves the interface and endpoints
//! used for register traffic.

use crate::backend::UsbBackend;
use crate::descriptor::{
    DeviceIdentity, EndpointPair, InterfaceInfo, select_endpoints, select_interface,
};
use crate::error::{AdapterError, Result};
use tracing::debug;

/// A discovered adapter, fixed until the next discovery
#[derive(Debug, Clone)]
pub struct Located<D> {
    pub device: D,
    pub identity: DeviceIdentity,
    pub interface: InterfaceInfo,
    pub endpoints: EndpointPair,
}

/// Look for the adapter on all buses
///
/// `Ok(None)` means no device with `vendor_id` is plugged in. A device that
/// is present but lacks the vendor-class interface or its endpoints yields
/// [`AdapterError::ProtocolMismatch`].
pub fn discover<B: UsbBackend>(
    backend: &mut B,
    vendor_id: u16,
) -> Result<Option<Located<B::Device>>> {
    let found = backend
        .find_by_vendor(vendor_id)
        .map_err(|source| AdapterError::Io {
            during: "device enumeration",
            source,
        })?;

    let Some((device, identity)) = found else {
        debug!("No device with vendor id {:#06x} on any bus", vendor_id);
        return Ok(None);
    };

    let interfaces = backend
        .interfaces(&device)
        .map_err(|source| AdapterError::Io {
            during: "reading configuration descriptor",
            source,
        })?;

    let mismatch = |reason| AdapterError::ProtocolMismatch {
        device: identity,
        reason,
    };
    let interface = select_interface(&interfaces).map_err(mismatch)?.clone();
    let endpoints = select_endpoints(&interface).map_err(mismatch)?;

    debug!(
        "Found adapter {}: interface {} alt {}, out ep {:#04x} ({} bytes), in ep {:#04x} ({} bytes)",
        identity,
        interface.number,
        interface.alt_setting,
        endpoints.out_ep.address,
        endpoints.out_ep.max_packet_size,
        endpoints.in_ep.address,
        endpoints.in_ep.max_packet_size
    );

    Ok(Some(Located {
        device,
        identity,
        interface,
        endpoints,
    }))
}
