//! Transfer session
//!
//! Owns at most one opened, interface-claimed handle and performs raw bulk
//! transfers through it. Opening while a handle is live closes the old one
//! first, so a device never has two claims from us.

use crate::backend::{BulkHandle, UsbBackend};
use crate::descriptor::DeviceIdentity;
use crate::error::{AdapterError, Result};
use crate::locator::Located;
use bytes::{Bytes, BytesMut};
use std::time::Duration;
use tracing::{debug, warn};

/// Claimed connection to the adapter
pub struct TransferSession<H: BulkHandle> {
    /// Present only while the interface is claimed
    handle: Option<H>,
    interface: u8,
    device: Option<DeviceIdentity>,
    timeout: Duration,
}

impl<H: BulkHandle> TransferSession<H> {
    /// Create a closed session; `timeout` applies to every bulk transfer
    pub fn new(timeout: Duration) -> Self {
        Self {
            handle: None,
            interface: 0,
            device: None,
            timeout,
        }
    }

    /// Check if the session holds a claimed interface
    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Open the located device and claim its vendor interface
    ///
    /// A failed claim is reported as [`AdapterError::PermissionDenied`]; the
    /// OS refusing the claim is the common cause and retrying will not help.
    pub fn open<B>(&mut self, backend: &mut B, located: &Located<B::Device>) -> Result<()>
    where
        B: UsbBackend<Handle = H>,
    {
        self.close();

        let device = located.identity;
        let mut handle = backend.open(&located.device).map_err(|source| match source {
            rusb::Error::Access => AdapterError::PermissionDenied { device, source },
            _ => AdapterError::Io {
                during: "opening device",
                source,
            },
        })?;

        let interface = located.interface.number;
        if let Err(source) = handle.claim_interface(interface) {
            warn!(
                "Failed to claim interface {} on {}: {}",
                interface, device, source
            );
            return Err(AdapterError::PermissionDenied { device, source });
        }

        debug!("Opened session on {} interface {}", device, interface);
        self.handle = Some(handle);
        self.interface = interface;
        self.device = Some(device);
        Ok(())
    }

    /// Release the claimed interface and drop the handle
    ///
    /// Safe to call on a closed session.
    pub fn close(&mut self) {
        let Some(mut handle) = self.handle.take() else {
            return;
        };

        if let Err(e) = handle.release_interface(self.interface) {
            debug!("Failed to release interface {}: {}", self.interface, e);
        }

        if let Some(device) = self.device.take() {
            debug!("Closed session on {}", device);
        }
    }

    /// Write `data` to `endpoint` in a single bulk transfer
    pub fn bulk_write(&mut self, endpoint: u8, data: &[u8]) -> Result<()> {
        let timeout = self.timeout;
        let handle = self.live_handle("bulk write")?;

        let written = handle
            .write_bulk(endpoint, data, timeout)
            .map_err(|source| AdapterError::Io {
                during: "bulk write",
                source,
            })?;

        if written != data.len() {
            warn!(
                "Short bulk write on endpoint {:#04x}: {} of {} bytes",
                endpoint,
                written,
                data.len()
            );
        }

        debug!("Bulk write: endpoint={:#04x}, len={}", endpoint, written);
        Ok(())
    }

    /// Read up to `len` bytes from `endpoint` in a single bulk transfer
    pub fn bulk_read(&mut self, endpoint: u8, len: usize) -> Result<Bytes> {
        let timeout = self.timeout;
        let handle = self.live_handle("bulk read")?;

        let mut buf = BytesMut::zeroed(len);
        let read = handle
            .read_bulk(endpoint, &mut buf, timeout)
            .map_err(|source| AdapterError::Io {
                during: "bulk read",
                source,
            })?;
        buf.truncate(read);

        debug!("Bulk read: endpoint={:#04x}, len={}", endpoint, read);
        Ok(buf.freeze())
    }

    /// Issue a USB port reset
    ///
    /// The handle is unusable afterwards; the caller closes the session and
    /// rediscovers the device.
    pub fn reset(&mut self) -> Result<()> {
        let handle = self.live_handle("device reset")?;

        match handle.reset() {
            // Device re-enumerated; expected after a port reset
            Ok(()) | Err(rusb::Error::NotFound) => Ok(()),
            Err(source) => Err(AdapterError::Io {
                during: "device reset",
                source,
            }),
        }
    }

    fn live_handle(&mut self, during: &'static str) -> Result<&mut H> {
        self.handle.as_mut().ok_or(AdapterError::Io {
            during,
            source: rusb::Error::NoDevice,
        })
    }
}

impl<H: BulkHandle> Drop for TransferSession<H> {
    fn drop(&mut self) {
        self.close();
    }
}
