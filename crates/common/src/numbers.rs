//! Numeric argument parsing
//!
//! Register addresses, values, and USB vendor ids are written either in
//! decimal (`21320`) or hex with a `0x` prefix (`0x5348`).

use crate::error::{Error, Result};

fn parse_with_radix(input: &str) -> Result<u64> {
    let trimmed = input.trim();
    let parsed = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => trimmed.parse::<u64>(),
    };

    parsed.map_err(|e| Error::InvalidNumber {
        input: input.to_string(),
        reason: e.to_string(),
    })
}

fn parse_bounded(input: &str, max: u64) -> Result<u64> {
    let value = parse_with_radix(input)?;
    if value > max {
        return Err(Error::InvalidNumber {
            input: input.to_string(),
            reason: format!("must be at most {}", max),
        });
    }
    Ok(value)
}

/// Parse a byte-sized value (register address or value)
pub fn parse_u8(input: &str) -> Result<u8> {
    parse_bounded(input, u8::MAX as u64).map(|v| v as u8)
}

/// Parse a 16-bit value (USB vendor or product id)
pub fn parse_u16(input: &str) -> Result<u16> {
    parse_bounded(input, u16::MAX as u64).map(|v| v as u16)
}
