//! Probe operations
//!
//! Operations are given on the command line as short tokens:
//!
//! | token      | effect                                          |
//! |------------|-------------------------------------------------|
//! | `out:A:V`  | write `V` to register `A`                       |
//! | `in:A`     | read register `A`                               |
//! | `count`    | write 0..=255 to the data register in one burst |
//! | `reset`    | reset the adapter's USB port                    |
//! | `sleep:MS` | pause for `MS` milliseconds                     |
//!
//! Numbers are decimal or `0x` hex.

use adapter::{AdapterError, LptAdapter, Outcome, UsbBackend};
use common::{parse_u8, parse_u16};
use protocol::Register;
use std::fmt;
use std::str::FromStr;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOp {
    Out { address: u8, value: u8 },
    In { address: u8 },
    Count,
    Reset,
    Sleep(Duration),
}

#[derive(Debug, Error)]
pub enum ParseOpError {
    #[error("unknown operation '{0}' (expected out:A:V, in:A, count, reset or sleep:MS)")]
    Unknown(String),

    #[error("'{op}' expects the form {usage}")]
    Malformed { op: String, usage: &'static str },

    #[error(transparent)]
    Number(#[from] common::Error),
}

impl FromStr for ProbeOp {
    type Err = ParseOpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        let malformed = |usage| ParseOpError::Malformed {
            op: s.to_string(),
            usage,
        };

        match parts.as_slice() {
            ["out", address, value] => Ok(Self::Out {
                address: parse_u8(address)?,
                value: parse_u8(value)?,
            }),
            ["out", ..] => Err(malformed("out:A:V")),
            ["in", address] => Ok(Self::In {
                address: parse_u8(address)?,
            }),
            ["in", ..] => Err(malformed("in:A")),
            ["count"] => Ok(Self::Count),
            ["reset"] => Ok(Self::Reset),
            ["sleep", ms] => Ok(Self::Sleep(Duration::from_millis(
                parse_u16(ms)?.into(),
            ))),
            ["sleep", ..] => Err(malformed("sleep:MS")),
            _ => Err(ParseOpError::Unknown(s.to_string())),
        }
    }
}

/// What a single operation produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpResult {
    Ok,
    Absent,
    Value(u8),
    Slept,
}

impl fmt::Display for OpResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Absent => write!(f, "absent"),
            Self::Value(v) => write!(f, "{:#04x}", v),
            Self::Slept => write!(f, "slept"),
        }
    }
}

impl From<Outcome<()>> for OpResult {
    fn from(outcome: Outcome<()>) -> Self {
        match outcome {
            Outcome::Delivered(()) => Self::Ok,
            Outcome::DeviceAbsent => Self::Absent,
        }
    }
}

/// Run one operation against the adapter
pub fn execute<B: UsbBackend>(
    lpt: &mut LptAdapter<B>,
    op: &ProbeOp,
) -> Result<OpResult, AdapterError> {
    debug!("Executing {:?}", op);

    match *op {
        ProbeOp::Out { address, value } => {
            if let Ok(register) = Register::try_from(address)
                && !register.is_writable()
            {
                warn!("Register {} is read-only on real hardware", register);
            }
            lpt.look_for_device()?;
            Ok(lpt.write_one(address, value)?.into())
        }
        ProbeOp::In { address } => {
            lpt.look_for_device()?;
            Ok(match lpt.read_one(address)? {
                Outcome::Delivered(value) => OpResult::Value(value),
                Outcome::DeviceAbsent => OpResult::Absent,
            })
        }
        ProbeOp::Count => {
            lpt.look_for_device()?;
            let data = u8::from(Register::Data);
            Ok(lpt.write_many((0..=u8::MAX).map(|i| (data, i)))?.into())
        }
        ProbeOp::Reset => {
            lpt.look_for_device()?;
            Ok(lpt.reset()?.into())
        }
        ProbeOp::Sleep(duration) => {
            thread::sleep(duration);
            Ok(OpResult::Slept)
        }
    }
}

/// Run operations in order, stopping at the first error
pub fn execute_all<B: UsbBackend>(
    lpt: &mut LptAdapter<B>,
    ops: &[ProbeOp],
) -> Result<Vec<OpResult>, AdapterError> {
    ops.iter().map(|op| execute(lpt, op)).collect()
}

/// Comma-separated result line
pub fn format_results(results: &[OpResult]) -> String {
    results
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
