//! Nspire Backlight - text endpoint for the screen backlight level
//!
//! # Purpose
//! Exposes the contrast block's level register as a small text file named
//! `backlight`: reading it reports the current level, writing a decimal
//! number sets it.
//!
//! # Integration Points
//! - Depends on: `nspire_board` (register map, mapped APB window)
//! - Provides to: whatever virtual filesystem serves board status files
//!
//! # Example
//! ```text
//! $ cat /proc/backlight
//! Screen backlight is 120.
//! $ echo 200 > /proc/backlight
//! ```

#![no_std]

#[cfg(test)]
#[macro_use]
extern crate std;

extern crate alloc;

use alloc::format;
use alloc::string::String;
use core::str;
use log::{debug, info, warn};
use thiserror::Error;

use nspire_board::resources::{APB_CONTRAST, APB_REGION, APB_SLOT_SIZE, CONTRAST_LEVEL};
use nspire_board::{MappedRegions, MmioRegisters, RegisterAccessor};

/// Name the endpoint is published under
pub const ENDPOINT_NAME: &str = "backlight";

/// Rejected write to the endpoint
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Input is not valid UTF-8")]
    NotUtf8,

    #[error("Invalid backlight level: {0:?}")]
    Invalid(String),
}

/// The backlight status file, backed by the contrast block
pub struct BacklightEndpoint<R: RegisterAccessor> {
    contrast: R,
}

impl BacklightEndpoint<MmioRegisters> {
    /// Endpoint over the contrast block of the mapped APB window
    ///
    /// # Safety
    /// The APB window must be live in the current address space.
    pub unsafe fn from_mapped(mapped: &MappedRegions) -> nspire_board::Result<Self> {
        // SAFETY: forwarded to the caller
        let contrast = unsafe { mapped.registers(APB_REGION, APB_CONTRAST, APB_SLOT_SIZE)? };
        Ok(Self::new(contrast))
    }
}

impl<R: RegisterAccessor> BacklightEndpoint<R> {
    /// `contrast` must address the contrast register block
    pub fn new(contrast: R) -> Self {
        info!("Contrast settings mapped to /proc/{}", ENDPOINT_NAME);
        Self { contrast }
    }

    pub fn name(&self) -> &'static str {
        ENDPOINT_NAME
    }

    /// Current level as stored in the hardware
    pub fn value(&self) -> u32 {
        self.contrast.read32(CONTRAST_LEVEL)
    }

    /// Full contents of the file
    pub fn status(&self) -> String {
        format!("Screen backlight is {}.\n", self.value())
    }

    /// Copy the contents starting at `offset` into `buf`
    ///
    /// Returns the number of bytes copied; 0 once `offset` reaches the end.
    pub fn read(&self, offset: usize, buf: &mut [u8]) -> usize {
        let status = self.status();
        let Some(rest) = status.as_bytes().get(offset..) else {
            return 0;
        };
        let n = rest.len().min(buf.len());
        buf[..n].copy_from_slice(&rest[..n]);
        n
    }

    /// Set the level from a decimal string
    ///
    /// Accepts 0-255 with at most one trailing newline and stores it
    /// unchanged. Returns the number of bytes consumed.
    ///
    /// # Errors
    /// `ParseError` for anything else; the register is not touched.
    pub fn write(&self, input: &[u8]) -> Result<usize, ParseError> {
        let text = str::from_utf8(input).map_err(|_| ParseError::NotUtf8)?;
        let digits = text.strip_suffix('\n').unwrap_or(text);

        let level: u8 = digits.parse().map_err(|_| {
            warn!("Rejected backlight level {:?}", digits);
            ParseError::Invalid(String::from(digits))
        })?;

        self.contrast.write32(CONTRAST_LEVEL, u32::from(level));
        debug!("Backlight set to {}", level);
        Ok(input.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nspire_board::mock::MockRegisters;

    #[test]
    fn test_status_reports_register() {
        let regs = MockRegisters::new().with(CONTRAST_LEVEL, 120);
        let endpoint = BacklightEndpoint::new(&regs);
        assert_eq!(endpoint.name(), "backlight");
        assert_eq!(endpoint.status(), "Screen backlight is 120.\n");
    }

    #[test]
    fn test_write_then_read() {
        let regs = MockRegisters::new();
        let endpoint = BacklightEndpoint::new(&regs);

        assert_eq!(endpoint.write(b"200\n"), Ok(4));
        assert_eq!(endpoint.value(), 200);
        assert_eq!(regs.writes(), vec![(CONTRAST_LEVEL, 200)]);
        assert_eq!(endpoint.status(), "Screen backlight is 200.\n");

        assert_eq!(endpoint.write(b"0"), Ok(1));
        assert_eq!(endpoint.value(), 0);
    }

    #[test]
    fn test_rejected_writes_leave_level() {
        let regs = MockRegisters::new().with(CONTRAST_LEVEL, 50);
        let endpoint = BacklightEndpoint::new(&regs);

        let inputs: [&[u8]; 8] = [b"999", b"abc", b"", b"\n", b"-1", b"12\n\n", b" 12", &[0xff, 0xfe]];
        for input in inputs {
            assert!(endpoint.write(input).is_err(), "accepted {:?}", input);
        }
        assert_eq!(endpoint.write(b"256"), Err(ParseError::Invalid("256".into())));
        assert_eq!(endpoint.write(&[0xff]), Err(ParseError::NotUtf8));

        assert_eq!(endpoint.value(), 50);
        assert!(regs.writes().is_empty());
    }

    #[test]
    fn test_read_with_offset() {
        let regs = MockRegisters::new().with(CONTRAST_LEVEL, 7);
        let endpoint = BacklightEndpoint::new(&regs);
        let full = "Screen backlight is 7.\n";

        let mut buf = [0u8; 64];
        let n = endpoint.read(0, &mut buf);
        assert_eq!(&buf[..n], full.as_bytes());

        let n = endpoint.read(20, &mut buf);
        assert_eq!(&buf[..n], b"7.\n");

        assert_eq!(endpoint.read(full.len(), &mut buf), 0);
        assert_eq!(endpoint.read(full.len() + 10, &mut buf), 0);
    }

    #[test]
    fn test_read_into_short_buffer() {
        let regs = MockRegisters::new().with(CONTRAST_LEVEL, 255);
        let endpoint = BacklightEndpoint::new(&regs);

        let mut buf = [0u8; 8];
        let mut offset = 0;
        let mut out = std::vec::Vec::new();
        loop {
            let n = endpoint.read(offset, &mut buf);
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
            offset += n;
        }
        assert_eq!(out, b"Screen backlight is 255.\n");
    }
}
