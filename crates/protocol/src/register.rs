//! Parallel-port register map
//!
//! Addresses follow the classic PC parallel port layout (SPP data/status/
//! control, EPP address and data cycles, ECP FIFO and configuration
//! registers) as exposed by the adapter firmware.

use crate::error::{ProtocolError, Result};
use std::fmt;

/// Functional register of the adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Register {
    /// SPP data port (8 output lines)
    Data = 0,
    /// Status port: Busy, Acknowledge, Paper End, ... (read-only)
    Status = 1,
    /// Control port: Strobe, AutoFeed, data direction, ...
    Control = 2,
    /// EPP address cycle
    EppAddress = 3,
    /// EPP data cycle (addresses 5..=7 are data cycles too)
    EppData = 4,
    /// ECP FIFO, or Configuration Register A when read
    EcpFifo = 8,
    /// Configuration Register B (read-only, always 0)
    ConfigB = 9,
    /// ECP Extended Control Register
    Ecr = 10,
}

impl Register {
    /// Wire address of this register
    pub const fn address(self) -> u8 {
        self as u8
    }

    /// Whether the adapter accepts writes to this register
    pub const fn is_writable(self) -> bool {
        !matches!(self, Register::Status | Register::ConfigB)
    }
}

impl From<Register> for u8 {
    fn from(register: Register) -> Self {
        register.address()
    }
}

impl TryFrom<u8> for Register {
    type Error = ProtocolError;

    fn try_from(address: u8) -> Result<Self> {
        match address {
            0 => Ok(Register::Data),
            1 => Ok(Register::Status),
            2 => Ok(Register::Control),
            3 => Ok(Register::EppAddress),
            4..=7 => Ok(Register::EppData),
            8 => Ok(Register::EcpFifo),
            9 => Ok(Register::ConfigB),
            10 => Ok(Register::Ecr),
            other => Err(ProtocolError::UnknownRegister(other)),
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Register::Data => "data",
            Register::Status => "status",
            Register::Control => "control",
            Register::EppAddress => "epp-address",
            Register::EppData => "epp-data",
            Register::EcpFifo => "ecp-fifo",
            Register::ConfigB => "config-b",
            Register::Ecr => "ecr",
        };
        write!(f, "{} ({})", name, self.address())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_addresses() {
        assert_eq!(Register::Data.address(), 0);
        assert_eq!(Register::Control.address(), 2);
        assert_eq!(Register::EcpFifo.address(), 8);
        assert_eq!(u8::from(Register::Ecr), 10);
    }

    #[test]
    fn test_epp_data_aliases() {
        for address in 4..=7 {
            assert_eq!(Register::try_from(address), Ok(Register::EppData));
        }
    }

    #[test]
    fn test_unknown_register() {
        assert_eq!(
            Register::try_from(11),
            Err(ProtocolError::UnknownRegister(11))
        );
        assert!(Register::try_from(0x10).is_err());
    }

    #[test]
    fn test_read_only_registers() {
        assert!(!Register::Status.is_writable());
        assert!(!Register::ConfigB.is_writable());
        assert!(Register::Data.is_writable());
        assert!(Register::Ecr.is_writable());
    }

    #[test]
    fn test_display() {
        assert_eq!(Register::Data.to_string(), "data (0)");
        assert_eq!(Register::Ecr.to_string(), "ecr (10)");
    }
}
