// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use core::fmt;

/// pzem-core Error
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The underlying transport failed to write or read
    Transport,
    /// The deadline elapsed before a complete frame arrived
    Timeout(usize),
    /// Invalid CRC
    Crc(u16, u16),
    /// The device did not echo the request byte for byte
    Verification,
    /// Slave address outside of the addressable range
    Address(u8),
    /// Invalid buffer size
    BufferSize,
    /// Invalid function code
    FnCode(u8),
    /// Invalid byte count
    ByteCount(u8),
    /// Length Mismatch
    LengthMismatch(usize, usize),
    /// The device answered with an exception code
    Exception(u8),
}

impl Error {
    /// Returns `true` if a response could not be read at all.
    ///
    /// A frame that never completed and a frame with a broken checksum
    /// are indistinguishable on the wire, both end up here.
    #[must_use]
    pub const fn is_read_failure(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Crc(_, _))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Error::*;

        match self {
            Transport => write!(f, "Transport failure"),
            Timeout(received) => write!(f, "Timeout after receiving {received} byte(s)"),
            Crc(expected, actual) => write!(
                f,
                "Invalid CRC: expected = 0x{expected:0>4X}, actual = 0x{actual:0>4X}"
            ),
            Verification => write!(f, "Response does not echo the request"),
            Address(addr) => write!(f, "Invalid slave address: 0x{addr:0>2X}"),
            BufferSize => write!(f, "Invalid buffer size"),
            FnCode(fn_code) => write!(f, "Invalid function code: 0x{fn_code:0>2X}"),
            ByteCount(cnt) => write!(f, "Invalid byte count: {cnt}"),
            LengthMismatch(expected, actual) => write!(
                f,
                "Length Mismatch: expected {expected} byte(s), received {actual}"
            ),
            Exception(code) => write!(f, "Device exception: 0x{code:0>2X}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
