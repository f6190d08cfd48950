//! Resilient adapter
//!
//! [`LptAdapter`] wraps a [`TransferSession`] with recovery from unplug and
//! replug. The adapter is either bound to a discovered device or unbound.
//! A transfer that fails at the transport level is taken to mean the
//! device went away:
//!
//! 1. attempt the transfer (opening the session lazily)
//! 2. on a transient failure, rediscover the device in place
//! 3. nothing found: the operation ends as [`Outcome::DeviceAbsent`]
//! 4. device found: reopen and retry once; a second failure is returned
//!
//! Permission and descriptor problems are never retried.

use crate::backend::{RusbBackend, UsbBackend};
use crate::descriptor::{DeviceIdentity, EndpointPair, VENDOR_ID};
use crate::error::{AdapterError, Result};
use crate::locator::{Located, discover};
use crate::session::TransferSession;
use bytes::Bytes;
use protocol::{chunks, decode_read_response, encode_pairs, encode_read, encode_write};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Adapter construction options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterOptions {
    /// USB vendor id to look for
    pub vendor_id: u16,
    /// Timeout applied to each bulk transfer
    pub transfer_timeout: Duration,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            vendor_id: VENDOR_ID,
            transfer_timeout: Duration::from_secs(1),
        }
    }
}

/// Result of an operation that did not fail
///
/// Keeps "the adapter is not plugged in" apart from errors: writes to an
/// absent adapter are dropped and reads yield nothing.
#[must_use = "DeviceAbsent means nothing reached the hardware"]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The transfer reached the adapter
    Delivered(T),
    /// No adapter is present; nothing was transferred
    DeviceAbsent,
}

impl<T> Outcome<T> {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Outcome::Delivered(_))
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Outcome::DeviceAbsent)
    }

    /// The delivered value, if any
    pub fn delivered(self) -> Option<T> {
        match self {
            Outcome::Delivered(value) => Some(value),
            Outcome::DeviceAbsent => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Delivered(value) => Outcome::Delivered(f(value)),
            Outcome::DeviceAbsent => Outcome::DeviceAbsent,
        }
    }
}

/// Whether a device is currently known
///
/// `Bound` is optimistic: a device that vanished stays bound until a
/// transfer fails and rediscovery comes up empty.
#[derive(Debug)]
pub enum DeviceState<D> {
    Unbound,
    Bound(Located<D>),
}

/// USB2LPT adapter with automatic recovery
pub struct LptAdapter<B: UsbBackend> {
    backend: B,
    options: AdapterOptions,
    state: DeviceState<B::Device>,
    session: TransferSession<B::Handle>,
}

impl LptAdapter<RusbBackend> {
    /// Create an adapter on the system's USB buses
    pub fn open(options: AdapterOptions) -> Result<Self> {
        Self::with_backend(RusbBackend::new()?, options)
    }
}

impl<B: UsbBackend> LptAdapter<B> {
    /// Create an adapter and look for the device once
    ///
    /// If a device is found, a session is opened and closed again so that
    /// missing access rights are reported now rather than on first use.
    pub fn with_backend(backend: B, options: AdapterOptions) -> Result<Self> {
        let mut adapter = Self {
            backend,
            options,
            state: DeviceState::Unbound,
            session: TransferSession::new(options.transfer_timeout),
        };

        if adapter.rediscover()? {
            match adapter.open_session() {
                Ok(()) => adapter.session.close(),
                Err(e) if e.is_transient() => {
                    warn!("Adapter found but could not be opened yet: {}", e);
                }
                Err(e) => return Err(e),
            }
        } else {
            info!(
                "No USB2LPT adapter (vendor {:#06x}) plugged in",
                options.vendor_id
            );
        }

        Ok(adapter)
    }

    /// Check if a device is bound
    pub fn is_bound(&self) -> bool {
        matches!(self.state, DeviceState::Bound(_))
    }

    /// Identity of the bound device
    pub fn identity(&self) -> Option<DeviceIdentity> {
        match &self.state {
            DeviceState::Bound(located) => Some(located.identity),
            DeviceState::Unbound => None,
        }
    }

    /// Endpoints of the bound device
    pub fn endpoints(&self) -> Option<EndpointPair> {
        match &self.state {
            DeviceState::Bound(located) => Some(located.endpoints),
            DeviceState::Unbound => None,
        }
    }

    pub fn options(&self) -> &AdapterOptions {
        &self.options
    }

    /// Rediscover only if no device is bound
    ///
    /// Returns whether a device is bound afterwards.
    pub fn look_for_device(&mut self) -> Result<bool> {
        if self.is_bound() {
            return Ok(true);
        }
        self.rediscover()
    }

    /// Drop the session and run discovery again
    ///
    /// Returns whether a device was found.
    pub fn rediscover(&mut self) -> Result<bool> {
        self.session.close();

        let previous = self.identity();
        self.state = DeviceState::Unbound;

        let found = discover(&mut self.backend, self.options.vendor_id)?;
        match (&previous, &found) {
            (None, Some(located)) => info!("Adapter bound: {}", located.identity),
            (Some(old), Some(located)) if *old != located.identity => {
                info!("Adapter rebound: {} -> {}", old, located.identity)
            }
            (Some(old), None) => info!("Adapter unbound: {} is gone", old),
            _ => {}
        }

        if let Some(located) = found {
            self.state = DeviceState::Bound(located);
        }
        Ok(self.is_bound())
    }

    /// Write `value` to register `address`
    pub fn write_one(&mut self, address: impl Into<u8>, value: u8) -> Result<Outcome<()>> {
        let frame = encode_write(address.into(), value);
        self.transfer(|session, endpoints| session.bulk_write(endpoints.out_ep.address, &frame))
    }

    /// Read register `address`
    pub fn read_one(&mut self, address: impl Into<u8>) -> Result<Outcome<u8>> {
        let request = encode_read(address.into());
        self.transfer(|session, endpoints| {
            session.bulk_write(endpoints.out_ep.address, &request)?;
            let response = session.bulk_read(endpoints.in_ep.address, 1)?;
            Ok(decode_read_response(&response)?)
        })
    }

    /// Write a sequence of `(address, value)` pairs as one burst
    pub fn write_many<I>(&mut self, pairs: I) -> Result<Outcome<()>>
    where
        I: IntoIterator<Item = (u8, u8)>,
    {
        let payload = encode_pairs(pairs);
        Ok(self.write_raw(&payload, 0)?.map(|_| ()))
    }

    /// Send a raw payload in chunks, then optionally read `expect_in` bytes
    ///
    /// Each chunk is its own protected transfer. If the adapter disappears
    /// part way, the remaining chunks are dropped and the outcome is
    /// [`Outcome::DeviceAbsent`]. With `expect_in == 0` the delivered value
    /// is empty.
    pub fn write_raw(&mut self, payload: &[u8], expect_in: usize) -> Result<Outcome<Bytes>> {
        if !self.is_bound() {
            return Ok(Outcome::DeviceAbsent);
        }

        for chunk in chunks(payload) {
            let sent = self.transfer(|session, endpoints| {
                session.bulk_write(endpoints.out_ep.address, chunk)
            })?;
            if sent.is_absent() {
                return Ok(Outcome::DeviceAbsent);
            }
        }

        if expect_in == 0 {
            return Ok(Outcome::Delivered(Bytes::new()));
        }
        self.transfer(|session, endpoints| session.bulk_read(endpoints.in_ep.address, expect_in))
    }

    /// USB port reset followed by rediscovery
    pub fn reset(&mut self) -> Result<Outcome<()>> {
        let outcome = self.transfer(|session, _| session.reset())?;
        if outcome.is_delivered() {
            // The reset invalidates the handle and device reference
            self.rediscover()?;
        }
        Ok(outcome)
    }

    /// Release the session; the device stays bound
    pub fn close(&mut self) {
        self.session.close();
    }

    /// Run `op` with one recovery cycle on transient failure
    fn transfer<T, F>(&mut self, mut op: F) -> Result<Outcome<T>>
    where
        F: FnMut(&mut TransferSession<B::Handle>, &EndpointPair) -> Result<T>,
    {
        let first = match self.attempt(&mut op) {
            None => return Ok(Outcome::DeviceAbsent),
            Some(result) => result,
        };

        match first {
            Ok(value) => return Ok(Outcome::Delivered(value)),
            Err(e) if !e.is_transient() => return Err(e),
            Err(e) => warn!("Transfer failed ({}), rediscovering adapter", e),
        }

        if !self.rediscover()? {
            info!("Adapter not found after transfer failure, dropping operation");
            return Ok(Outcome::DeviceAbsent);
        }

        debug!("Retrying transfer once on {:?}", self.identity());
        match self.attempt(&mut op) {
            Some(result) => result.map(Outcome::Delivered),
            None => Ok(Outcome::DeviceAbsent),
        }
    }

    /// One unprotected attempt; `None` when unbound
    ///
    /// Any failure closes the session so the next attempt starts fresh.
    fn attempt<T, F>(&mut self, op: &mut F) -> Option<Result<T>>
    where
        F: FnMut(&mut TransferSession<B::Handle>, &EndpointPair) -> Result<T>,
    {
        let DeviceState::Bound(located) = &self.state else {
            return None;
        };

        if !self.session.is_open()
            && let Err(e) = self.session.open(&mut self.backend, located)
        {
            return Some(Err(e));
        }

        let result = op(&mut self.session, &located.endpoints);
        if result.is_err() {
            self.session.close();
        }
        Some(result)
    }

    fn open_session(&mut self) -> Result<()> {
        match &self.state {
            DeviceState::Bound(located) => self.session.open(&mut self.backend, located),
            DeviceState::Unbound => Ok(()),
        }
    }
}

impl<B: UsbBackend> std::fmt::Debug for LptAdapter<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LptAdapter")
            .field("options", &self.options)
            .field("device", &self.identity())
            .field("session_open", &self.session.is_open())
            .finish()
    }
}
