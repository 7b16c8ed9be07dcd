// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{error::*, frame::*};
use byteorder::{BigEndian, ByteOrder, LittleEndian};

pub mod client;

type Result<T> = core::result::Result<T, Error>;

/// Reflected CRC-16/MODBUS polynomial.
const CRC_POLY: u16 = 0xA001;

static CRC_TABLE: [u16; 256] = crc_table();

const fn crc_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u16;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x0001 != 0 {
                (crc >> 1) ^ CRC_POLY
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Calculate the CRC (Cyclic Redundancy Check) sum.
///
/// The result is transmitted low byte first.
#[must_use]
pub fn crc16(data: &[u8]) -> u16 {
    data.iter().fold(0xFFFF, |crc, x| {
        (crc >> 8) ^ CRC_TABLE[usize::from((crc ^ u16::from(*x)) as u8)]
    })
}

/// Check the trailing CRC of a complete frame.
///
/// Frames of two bytes or less never pass.
#[must_use]
pub fn validate(buf: &[u8]) -> bool {
    check_crc(buf).is_ok()
}

/// Like [`validate`] but reports the mismatching sums.
pub fn check_crc(buf: &[u8]) -> Result<()> {
    if buf.len() <= 2 {
        return Err(Error::BufferSize);
    }
    let (data, crc_buf) = buf.split_at(buf.len() - 2);
    let expected_crc = LittleEndian::read_u16(crc_buf);
    let actual_crc = crc16(data);
    if expected_crc != actual_crc {
        return Err(Error::Crc(expected_crc, actual_crc));
    }
    Ok(())
}

/// Store the CRC of everything but the last two bytes in the last two bytes.
pub fn write_crc(buf: &mut [u8]) -> Result<()> {
    if buf.len() <= 2 {
        return Err(Error::BufferSize);
    }
    let len = buf.len() - 2;
    let crc = crc16(&buf[..len]);
    LittleEndian::write_u16(&mut buf[len..], crc);
    Ok(())
}

impl Request {
    /// Encode the PDU (everything between slave address and CRC).
    pub(crate) fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let len = self.frame_len() - 3;
        if buf.len() < len {
            return Err(Error::BufferSize);
        }
        buf[0] = self.function_code().value();
        match *self {
            Self::ReadHoldingRegisters(address, payload)
            | Self::ReadInputRegisters(address, payload)
            | Self::WriteSingleRegister(address, payload) => {
                BigEndian::write_u16(&mut buf[1..], address);
                BigEndian::write_u16(&mut buf[3..], payload);
            }
            Self::Calibration(password) => {
                BigEndian::write_u16(&mut buf[1..], password);
            }
            Self::ResetEnergy => {}
        }
        Ok(len)
    }
}

/// Combine a register pair that the meter sends low word first.
fn read_u32_low_word_first(buf: &[u8]) -> u32 {
    let low = BigEndian::read_u16(&buf[0..2]);
    let high = BigEndian::read_u16(&buf[2..4]);
    (u32::from(high) << 16) | u32::from(low)
}

fn scaled(raw: u32, divisor: f32) -> f32 {
    raw as f32 / divisor
}

impl TryFrom<&[u8]> for Measurements {
    type Error = Error;

    /// Decode a complete (CRC checked) response to a measurement block read.
    fn try_from(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != MEASUREMENTS_RESPONSE_LEN {
            return Err(Error::LengthMismatch(
                MEASUREMENTS_RESPONSE_LEN,
                bytes.len(),
            ));
        }
        let fn_code = bytes[1];
        if FunctionCode::new(fn_code) != FunctionCode::ReadInputRegisters {
            return Err(Error::FnCode(fn_code));
        }
        let byte_count = bytes[2];
        if usize::from(byte_count) != usize::from(MEASUREMENT_REGISTERS) * 2 {
            return Err(Error::ByteCount(byte_count));
        }
        let data = &bytes[3..];
        Ok(Measurements {
            voltage: scaled(u32::from(BigEndian::read_u16(&data[0..2])), 10.0),
            current: scaled(read_u32_low_word_first(&data[2..6]), 1000.0),
            power: scaled(read_u32_low_word_first(&data[6..10]), 10.0),
            energy: scaled(read_u32_low_word_first(&data[10..14]), 1000.0),
            frequency: scaled(u32::from(BigEndian::read_u16(&data[14..16])), 10.0),
            power_factor: scaled(u32::from(BigEndian::read_u16(&data[16..18])), 100.0),
            alarms: BigEndian::read_u16(&data[18..20]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calc_crc16() {
        assert_eq!(crc16(&[]), 0xFFFF);

        let msg = &[0x01, 0x03, 0x00, 0x00, 0x00, 0x0A];
        assert_eq!(crc16(msg), 0xCDC5);

        let msg = &[0x01, 0x03, 0x08, 0x2B, 0x00, 0x02];
        assert_eq!(crc16(msg), 0x63B6);

        let msg = &[0x01, 0x03, 0x04, 0x00, 0x20, 0x00, 0x00];
        assert_eq!(crc16(msg), 0xF9FB);

        assert_eq!(crc16(b"123456789"), 0x4B37);
    }

    #[test]
    fn crc_table_is_derived_from_polynomial() {
        assert_eq!(CRC_TABLE[0x00], 0x0000);
        assert_eq!(CRC_TABLE[0x01], 0xC0C1);
        assert_eq!(CRC_TABLE[0x80], 0xA001);
        assert_eq!(CRC_TABLE[0xFF], 0x4040);
    }

    #[test]
    fn validate_frames() {
        assert!(!validate(&[]));
        assert!(!validate(&[0xFF, 0xFF]));
        assert!(validate(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x0A, 0xC5, 0xCD]));
        // CRC bytes swapped
        assert!(!validate(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x0A, 0xCD, 0xC5]));
        assert!(validate(&[0xF8, 0x42, 0xC2, 0x41]));
        // three bytes: one data byte plus CRC
        let mut buf = [0x07, 0, 0];
        write_crc(&mut buf).unwrap();
        assert!(validate(&buf));
    }

    #[test]
    fn check_crc_reports_sums() {
        assert_eq!(
            check_crc(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x0A, 0x00, 0x00]),
            Err(Error::Crc(0x0000, 0xCDC5))
        );
        assert_eq!(check_crc(&[0x01, 0x02]), Err(Error::BufferSize));
    }

    #[test]
    fn write_crc_low_byte_first() {
        let buf = &mut [0xF8, 0x04, 0x00, 0x00, 0x00, 0x0A, 0x00, 0x00];
        write_crc(buf).unwrap();
        assert_eq!(&buf[6..], &[0x64, 0x64]);

        let buf = &mut [0x12, 0x06, 0x22, 0x22, 0xAB, 0xCD, 0x00, 0x00];
        write_crc(buf).unwrap();
        assert_eq!(&buf[6..], &[0x9F, 0xBE]);

        assert_eq!(write_crc(&mut [0, 0]), Err(Error::BufferSize));
    }

    mod measurements_decoder {

        use super::*;

        const RESPONSE: [u8; 25] = [
            0xF8, // slave address
            0x04, // function code
            0x14, // byte count
            0x00, 0xE6, // voltage
            0x03, 0xE8, 0x00, 0x00, // current (low word, high word)
            0x08, 0xFC, 0x00, 0x00, // power
            0x04, 0xD2, 0x00, 0x00, // energy
            0x01, 0xF4, // frequency
            0x00, 0x64, // power factor
            0x00, 0x00, // alarm
            0x59, 0x8B, // crc
        ];

        #[test]
        fn decode_measurements_response() {
            assert!(validate(&RESPONSE));
            let values = Measurements::try_from(&RESPONSE[..]).unwrap();
            assert_eq!(values.voltage, 23.0);
            assert_eq!(values.current, 1.0);
            assert_eq!(values.power, 230.0);
            assert_eq!(values.energy, 1.234);
            assert_eq!(values.frequency, 50.0);
            assert_eq!(values.power_factor, 1.0);
            assert_eq!(values.alarms, 0);
            assert!(!values.power_alarm());
        }

        #[test]
        fn decode_values_spanning_both_words() {
            let rsp = &[
                0x01, 0x04, 0x14, //
                0x09, 0x29, // 234.5 V
                0x86, 0xA0, 0x00, 0x01, // 100.000 A
                0x00, 0x00, 0x00, 0x01, // 6553.6 W
                0x00, 0x00, 0x00, 0x02, // 131.072 kWh
                0x02, 0x58, // 60.0 Hz
                0x00, 0x5F, // 0.95
                0xFF, 0xFF, // alarm
                0x5B, 0xB1,
            ];
            assert!(validate(rsp));
            let values = Measurements::try_from(&rsp[..]).unwrap();
            assert_eq!(values.voltage, 234.5);
            assert_eq!(values.current, 100.0);
            assert_eq!(values.power, 6553.6);
            assert_eq!(values.energy, 131.072);
            assert_eq!(values.frequency, 60.0);
            assert_eq!(values.power_factor, 0.95);
            assert_eq!(values.alarms, 0xFFFF);
            assert!(values.power_alarm());
        }

        #[test]
        fn reject_malformed_responses() {
            assert_eq!(
                Measurements::try_from(&RESPONSE[..24]),
                Err(Error::LengthMismatch(25, 24))
            );

            let mut rsp = RESPONSE;
            rsp[1] = 0x03;
            assert_eq!(Measurements::try_from(&rsp[..]), Err(Error::FnCode(0x03)));

            let mut rsp = RESPONSE;
            rsp[2] = 0x12;
            assert_eq!(Measurements::try_from(&rsp[..]), Err(Error::ByteCount(0x12)));
        }
    }
}
