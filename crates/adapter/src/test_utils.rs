//! Test utilities for the adapter
//!
//! [`MockBackend`] stands in for the USB bus. It exposes one adapter-shaped
//! device that can be unplugged, replugged, denied access, or made to fail
//! transfers on demand, and it records every successful bulk transfer.
//!
//! # Example
//!
//! ```
//! use adapter::test_utils::{MockBackend, OUT_ENDPOINT, Transfer};
//! use adapter::{AdapterOptions, LptAdapter, Outcome};
//!
//! let backend = MockBackend::with_adapter();
//! let mut lpt = LptAdapter::with_backend(backend.clone(), AdapterOptions::default()).unwrap();
//!
//! assert_eq!(lpt.write_one(0u8, 0xff).unwrap(), Outcome::Delivered(()));
//! assert_eq!(
//!     backend.transfers(),
//!     vec![Transfer::Write { endpoint: OUT_ENDPOINT, data: vec![0, 0xff] }]
//! );
//! ```

use crate::backend::{BulkHandle, UsbBackend};
use crate::descriptor::{
    DeviceIdentity, EndpointInfo, InterfaceInfo, PRINTER_CLASS, VENDOR_CLASS, VENDOR_ID,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Interface number of the mock adapter's vendor-class interface
pub const VENDOR_INTERFACE: u8 = 1;

/// Bulk OUT endpoint of the mock adapter
pub const OUT_ENDPOINT: u8 = 0x02;

/// Bulk IN endpoint of the mock adapter
pub const IN_ENDPOINT: u8 = 0x82;

/// Product id reported by the mock adapter
pub const PRODUCT_ID: u16 = 0x2131;

/// A completed bulk transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transfer {
    Write { endpoint: u8, data: Vec<u8> },
    Read { endpoint: u8, len: usize },
}

/// Shared, inspectable state of the mock bus
#[derive(Debug, Default)]
pub struct MockState {
    pub plugged: bool,
    pub identity: DeviceIdentity,
    pub interfaces: Vec<InterfaceInfo>,
    /// Bumped on every replug; handles from an older plug-in are dead
    pub generation: u32,
    pub deny_claim: bool,
    pub deny_open: bool,
    /// Errors returned by the next bulk transfers, one per attempt
    pub transfer_failures: VecDeque<rusb::Error>,
    pub read_responses: VecDeque<Vec<u8>>,
    /// Error reported by the next port reset, after it took effect
    pub reset_failure: Option<rusb::Error>,
    pub transfers: Vec<Transfer>,
    pub enumerations: usize,
    pub opens: usize,
    pub claims: usize,
    pub releases: usize,
    pub resets: usize,
}

impl MockState {
    /// Check a bulk transfer against scripted failures and device liveness
    fn check_transfer(&mut self, generation: u32) -> rusb::Result<()> {
        if let Some(err) = self.transfer_failures.pop_front() {
            return Err(err);
        }
        if !self.plugged || generation != self.generation {
            return Err(rusb::Error::NoDevice);
        }
        Ok(())
    }
}

/// Descriptor layout of a real adapter: printer interface 0, vendor interface 1
pub fn adapter_interfaces() -> Vec<InterfaceInfo> {
    vec![
        InterfaceInfo {
            number: 0,
            alt_setting: 0,
            class_code: PRINTER_CLASS,
            endpoints: vec![
                EndpointInfo {
                    address: 0x01,
                    max_packet_size: 64,
                },
                EndpointInfo {
                    address: 0x81,
                    max_packet_size: 64,
                },
            ],
        },
        InterfaceInfo {
            number: VENDOR_INTERFACE,
            alt_setting: 0,
            class_code: VENDOR_CLASS,
            endpoints: vec![
                EndpointInfo {
                    address: OUT_ENDPOINT,
                    max_packet_size: 64,
                },
                EndpointInfo {
                    address: IN_ENDPOINT,
                    max_packet_size: 64,
                },
            ],
        },
    ]
}

/// Scripted USB bus holding at most one adapter
///
/// Clones share state, so a test keeps one clone for assertions after
/// handing the other to an adapter.
#[derive(Debug, Clone)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    /// Bus with an adapter plugged in
    pub fn with_adapter() -> Self {
        let backend = Self::empty();
        {
            let mut state = backend.state();
            state.plugged = true;
        }
        backend
    }

    /// Bus with the adapter unplugged
    pub fn empty() -> Self {
        let state = MockState {
            identity: DeviceIdentity {
                vendor_id: VENDOR_ID,
                product_id: PRODUCT_ID,
                bus_number: 1,
                address: 4,
            },
            interfaces: adapter_interfaces(),
            ..MockState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Lock the shared state for inspection or scripting
    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().expect("mock state poisoned")
    }

    /// Pull the adapter off the bus
    pub fn unplug(&self) {
        self.state().plugged = false;
    }

    /// Plug the adapter back in; it gets a new bus address
    pub fn replug(&self) {
        let mut state = self.state();
        state.plugged = true;
        state.generation += 1;
        state.identity.address = state.identity.address.wrapping_add(1);
    }

    /// Make the next bulk transfers fail, one error per attempt
    pub fn fail_next_transfers(&self, errors: impl IntoIterator<Item = rusb::Error>) {
        self.state().transfer_failures.extend(errors);
    }

    /// Make the next port reset re-enumerate the device but report `error`
    pub fn fail_next_reset(&self, error: rusb::Error) {
        self.state().reset_failure = Some(error);
    }

    /// Refuse interface claims
    pub fn deny_claim(&self) {
        self.state().deny_claim = true;
    }

    /// Refuse opening the device
    pub fn deny_open(&self) {
        self.state().deny_open = true;
    }

    /// Replace the descriptor layout (e.g. to model foreign firmware)
    pub fn set_interfaces(&self, interfaces: Vec<InterfaceInfo>) {
        self.state().interfaces = interfaces;
    }

    /// Queue the payload returned by the next bulk read
    pub fn queue_read(&self, response: impl Into<Vec<u8>>) {
        self.state().read_responses.push_back(response.into());
    }

    /// All completed transfers, in order
    pub fn transfers(&self) -> Vec<Transfer> {
        self.state().transfers.clone()
    }

    /// Concatenation of every byte written to the device
    pub fn written_bytes(&self) -> Vec<u8> {
        self.state()
            .transfers
            .iter()
            .filter_map(|t| match t {
                Transfer::Write { data, .. } => Some(data.as_slice()),
                Transfer::Read { .. } => None,
            })
            .flatten()
            .copied()
            .collect()
    }
}

/// Enumerated mock device
#[derive(Debug, Clone, Copy)]
pub struct MockDevice {
    generation: u32,
}

impl UsbBackend for MockBackend {
    type Device = MockDevice;
    type Handle = MockHandle;

    fn find_by_vendor(
        &mut self,
        vendor_id: u16,
    ) -> rusb::Result<Option<(Self::Device, DeviceIdentity)>> {
        let mut state = self.state();
        state.enumerations += 1;

        if state.plugged && state.identity.vendor_id == vendor_id {
            let device = MockDevice {
                generation: state.generation,
            };
            Ok(Some((device, state.identity)))
        } else {
            Ok(None)
        }
    }

    fn interfaces(&self, _device: &Self::Device) -> rusb::Result<Vec<InterfaceInfo>> {
        Ok(self.state().interfaces.clone())
    }

    fn open(&mut self, device: &Self::Device) -> rusb::Result<Self::Handle> {
        let mut state = self.state();
        if !state.plugged || device.generation != state.generation {
            return Err(rusb::Error::NoDevice);
        }
        if state.deny_open {
            return Err(rusb::Error::Access);
        }
        state.opens += 1;

        Ok(MockHandle {
            state: Arc::clone(&self.state),
            generation: device.generation,
        })
    }
}

/// Opened mock device
#[derive(Debug)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
    generation: u32,
}

impl MockHandle {
    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().expect("mock state poisoned")
    }
}

impl BulkHandle for MockHandle {
    fn claim_interface(&mut self, _interface: u8) -> rusb::Result<()> {
        let mut state = self.state();
        if state.deny_claim {
            return Err(rusb::Error::Access);
        }
        state.claims += 1;
        Ok(())
    }

    fn release_interface(&mut self, _interface: u8) -> rusb::Result<()> {
        self.state().releases += 1;
        Ok(())
    }

    fn write_bulk(&mut self, endpoint: u8, data: &[u8], _timeout: Duration) -> rusb::Result<usize> {
        let mut state = self.state();
        state.check_transfer(self.generation)?;
        state.transfers.push(Transfer::Write {
            endpoint,
            data: data.to_vec(),
        });
        Ok(data.len())
    }

    fn read_bulk(
        &mut self,
        endpoint: u8,
        buf: &mut [u8],
        _timeout: Duration,
    ) -> rusb::Result<usize> {
        let mut state = self.state();
        state.check_transfer(self.generation)?;
        let response = state
            .read_responses
            .pop_front()
            .ok_or(rusb::Error::Timeout)?;

        let len = response.len().min(buf.len());
        buf[..len].copy_from_slice(&response[..len]);
        state.transfers.push(Transfer::Read { endpoint, len });
        Ok(len)
    }

    fn reset(&mut self) -> rusb::Result<()> {
        let mut state = self.state();
        state.check_transfer(self.generation)?;
        state.resets += 1;
        // A port reset makes the device re-enumerate
        state.generation += 1;
        match state.reset_failure.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
