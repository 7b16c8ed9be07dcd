// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use core::ops::RangeInclusive;

mod measurements;

pub use self::measurements::*;

/// Slave ID
pub type SlaveId = u8;

/// Factory default address of every meter.
///
/// A meter always answers on this address, regardless of the address
/// stored in its configuration register.
pub const DEFAULT_SLAVE: SlaveId = 0xF8;

/// Addresses a meter can be configured to.
pub const SLAVE_RANGE: RangeInclusive<SlaveId> = 0x01..=0xF7;

/// Line speed of the meter's serial interface (8N1).
pub const BAUD_RATE: u32 = 9600;

/// Input register holding the line voltage (the first of the measurement block).
pub const REG_VOLTAGE: u16 = 0x0000;

/// Number of input registers that make up one measurement block.
pub const MEASUREMENT_REGISTERS: u16 = 10;

/// Holding register of the power alarm threshold in watts.
pub const REG_ALARM_THRESHOLD: u16 = 0x0001;

/// Holding register of the slave address.
pub const REG_SLAVE_ADDRESS: u16 = 0x0002;

/// Returns `true` if `slave` can be assigned to a meter.
#[must_use]
pub const fn is_valid_slave(slave: SlaveId) -> bool {
    *SLAVE_RANGE.start() <= slave && slave <= *SLAVE_RANGE.end()
}

/// A function code understood by the meter.
///
/// It is represented by an unsigned 8 bit integer.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionCode {
    /// Function Code: `03` (`0x03`).
    ReadHoldingRegisters,

    /// Function Code: `04` (`0x04`).
    ReadInputRegisters,

    /// Function Code: `06` (`0x06`).
    WriteSingleRegister,

    /// Vendor specific calibration, function code `0x41`.
    Calibration,

    /// Vendor specific energy counter reset, function code `0x42`.
    ResetEnergy,

    /// Any other function code.
    Custom(u8),
}

impl FunctionCode {
    /// Create a new [`FunctionCode`] with `value`.
    #[must_use]
    pub const fn new(value: u8) -> Self {
        match value {
            0x03 => Self::ReadHoldingRegisters,
            0x04 => Self::ReadInputRegisters,
            0x06 => Self::WriteSingleRegister,
            0x41 => Self::Calibration,
            0x42 => Self::ResetEnergy,
            code => Self::Custom(code),
        }
    }

    /// Get the [`u8`] value of the current [`FunctionCode`].
    #[must_use]
    pub const fn value(self) -> u8 {
        match self {
            Self::ReadHoldingRegisters => 0x03,
            Self::ReadInputRegisters => 0x04,
            Self::WriteSingleRegister => 0x06,
            Self::Calibration => 0x41,
            Self::ResetEnergy => 0x42,
            Self::Custom(code) => code,
        }
    }

    /// Returns `true` if a response carrying this code reports an exception.
    #[must_use]
    pub const fn is_exception(self) -> bool {
        self.value() & 0x80 != 0
    }
}

impl From<u8> for FunctionCode {
    fn from(value: u8) -> Self {
        Self::new(value)
    }
}

impl From<FunctionCode> for u8 {
    fn from(code: FunctionCode) -> Self {
        code.value()
    }
}

/// Register address
pub type Address = u16;

/// A single register value
pub type Word = u16;

/// Number of registers
pub type Quantity = u16;

/// A request sent to a meter.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    ReadHoldingRegisters(Address, Quantity),
    ReadInputRegisters(Address, Quantity),
    WriteSingleRegister(Address, Word),
    /// Calibrate the meter (factory use). The payload is the unlock word.
    Calibration(Word),
    ResetEnergy,
}

impl Request {
    /// The function code of this request.
    #[must_use]
    pub const fn function_code(&self) -> FunctionCode {
        match self {
            Self::ReadHoldingRegisters(_, _) => FunctionCode::ReadHoldingRegisters,
            Self::ReadInputRegisters(_, _) => FunctionCode::ReadInputRegisters,
            Self::WriteSingleRegister(_, _) => FunctionCode::WriteSingleRegister,
            Self::Calibration(_) => FunctionCode::Calibration,
            Self::ResetEnergy => FunctionCode::ResetEnergy,
        }
    }

    /// Number of bytes of the complete frame including address and CRC.
    #[must_use]
    pub const fn frame_len(&self) -> usize {
        match self {
            Self::ReadHoldingRegisters(_, _)
            | Self::ReadInputRegisters(_, _)
            | Self::WriteSingleRegister(_, _) => 8,
            Self::Calibration(_) => 6,
            Self::ResetEnergy => 4,
        }
    }
}

/// Header
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub slave: SlaveId,
}

/// Request ADU
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestAdu {
    pub hdr: Header,
    pub pdu: Request,
}
