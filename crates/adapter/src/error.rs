//! Adapter error types

use crate::descriptor::{DeviceIdentity, MismatchReason};
use protocol::ProtocolError;
use thiserror::Error;

/// Errors raised while talking to the adapter
///
/// An absent adapter is not an error; see [`crate::Outcome::DeviceAbsent`].
#[derive(Debug, Error)]
pub enum AdapterError {
    /// libusb could not be initialised
    #[error("Failed to initialize USB context: {0}")]
    Context(#[source] rusb::Error),

    /// A device with the adapter's vendor id lacks the expected interface shape
    #[error("Device {device} is not a usable USB2LPT adapter: {reason}")]
    ProtocolMismatch {
        device: DeviceIdentity,
        reason: MismatchReason,
    },

    /// The OS refused to let us open or claim the device
    #[error(
        "You don't have permission to use USB device {device} ({source}); \
         grant access with a udev rule or run as a user that owns the device"
    )]
    PermissionDenied {
        device: DeviceIdentity,
        #[source]
        source: rusb::Error,
    },

    /// Transport-level failure; usually the device was unplugged
    #[error("USB I/O error during {during}: {source}")]
    Io {
        during: &'static str,
        #[source]
        source: rusb::Error,
    },

    /// Malformed request or response frame
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl AdapterError {
    /// Whether the failure may clear up after rediscovering the device
    pub fn is_transient(&self) -> bool {
        matches!(self, AdapterError::Io { .. })
    }
}

/// Type alias for adapter results
pub type Result<T> = std::result::Result<T, AdapterError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> DeviceIdentity {
        DeviceIdentity {
            vendor_id: 0x5348,
            product_id: 0x2131,
            bus_number: 1,
            address: 7,
        }
    }

    #[test]
    fn test_only_io_is_transient() {
        let io = AdapterError::Io {
            during: "bulk write",
            source: rusb::Error::NoDevice,
        };
        assert!(io.is_transient());

        let denied = AdapterError::PermissionDenied {
            device: identity(),
            source: rusb::Error::Access,
        };
        assert!(!denied.is_transient());

        let mismatch = AdapterError::ProtocolMismatch {
            device: identity(),
            reason: MismatchReason::NoVendorInterface,
        };
        assert!(!mismatch.is_transient());
        assert!(!AdapterError::Context(rusb::Error::Other).is_transient());
    }

    #[test]
    fn test_permission_denied_names_device() {
        let err = AdapterError::PermissionDenied {
            device: identity(),
            source: rusb::Error::Access,
        };
        let msg = err.to_string();
        assert!(msg.contains("5348:2131"));
        assert!(msg.contains("permission"));
    }
}
