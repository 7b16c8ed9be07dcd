// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client (master) side frame encoding and response decoding.
use super::*;

/// Length of an exception response: address, function code, exception code and CRC.
pub const EXCEPTION_RESPONSE_LEN: usize = 5;

/// Encode a request.
///
/// Returns the number of bytes of the frame.
pub fn encode_request(adu: RequestAdu, buf: &mut [u8]) -> Result<usize> {
    let RequestAdu { hdr, pdu } = adu;
    if buf.len() < 2 {
        return Err(Error::BufferSize);
    }
    let len = pdu.encode(&mut buf[1..])?;
    if buf.len() < len + 3 {
        return Err(Error::BufferSize);
    }
    buf[0] = hdr.slave;
    write_crc(&mut buf[..len + 3])?;
    Ok(len + 3)
}

/// Build an 8 byte command frame.
///
/// `fn_code` is not checked against the register/value layout.
#[must_use]
pub fn encode_write_single_register(
    slave: SlaveId,
    fn_code: FunctionCode,
    address: Address,
    value: Word,
) -> [u8; 8] {
    let mut buf = [0; 8];
    buf[0] = slave;
    buf[1] = fn_code.value();
    BigEndian::write_u16(&mut buf[2..], address);
    BigEndian::write_u16(&mut buf[4..], value);
    let crc = crc16(&buf[..6]);
    LittleEndian::write_u16(&mut buf[6..], crc);
    buf
}

/// Decode the exception code of a CRC checked response, if it is one.
#[must_use]
pub fn decode_exception(buf: &[u8]) -> Option<u8> {
    if buf.len() != EXCEPTION_RESPONSE_LEN {
        return None;
    }
    FunctionCode::new(buf[1]).is_exception().then_some(buf[2])
}

/// Decode the response to a measurement block read.
pub fn decode_measurements(buf: &[u8]) -> Result<Measurements> {
    check_crc(buf)?;
    if let Some(code) = decode_exception(buf) {
        return Err(Error::Exception(code));
    }
    Measurements::try_from(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_read_input_registers_request() {
        let mut buf = [0u8; 8];
        let sz = encode_request(
            RequestAdu {
                hdr: Header { slave: DEFAULT_SLAVE },
                pdu: Request::ReadInputRegisters(REG_VOLTAGE, MEASUREMENT_REGISTERS),
            },
            &mut buf,
        )
        .expect("Error encoding request");

        assert_eq!(
            &buf[..sz],
            &[
                0xF8, // slave address
                0x04, // function code
                0x00, // addr
                0x00, // addr
                0x00, // quantity
                0x0A, // quantity
                0x64, // crc
                0x64, // crc
            ]
        );
    }

    #[test]
    fn encode_write_single_register_request() {
        let mut buf = [0u8; 255];
        let sz = encode_request(
            RequestAdu {
                hdr: Header { slave: 0x12 },
                pdu: Request::WriteSingleRegister(0x2222, 0xABCD),
            },
            &mut buf,
        )
        .expect("Error encoding request");

        assert_eq!(
            &buf[..sz],
            &[0x12, 0x06, 0x22, 0x22, 0xAB, 0xCD, 0x9F, 0xBE]
        );
        assert_eq!(
            encode_write_single_register(0x12, FunctionCode::WriteSingleRegister, 0x2222, 0xABCD),
            buf[..8]
        );
    }

    #[test]
    fn encode_reset_energy_request() {
        let mut buf = [0u8; 8];
        let sz = encode_request(
            RequestAdu {
                hdr: Header { slave: DEFAULT_SLAVE },
                pdu: Request::ResetEnergy,
            },
            &mut buf,
        )
        .unwrap();
        assert_eq!(&buf[..sz], &[0xF8, 0x42, 0xC2, 0x41]);

        let sz = encode_request(
            RequestAdu {
                hdr: Header { slave: 0x01 },
                pdu: Request::ResetEnergy,
            },
            &mut buf,
        )
        .unwrap();
        assert_eq!(&buf[..sz], &[0x01, 0x42, 0x80, 0x11]);
    }

    #[test]
    fn encode_calibration_request() {
        let mut buf = [0u8; 8];
        let sz = encode_request(
            RequestAdu {
                hdr: Header { slave: DEFAULT_SLAVE },
                pdu: Request::Calibration(0x3721),
            },
            &mut buf,
        )
        .unwrap();
        assert_eq!(sz, 6);
        assert_eq!(&buf[..4], &[0xF8, 0x41, 0x37, 0x21]);
        assert!(validate(&buf[..sz]));
    }

    #[test]
    fn encode_into_short_buffer() {
        let adu = RequestAdu {
            hdr: Header { slave: 0x01 },
            pdu: Request::ReadInputRegisters(0, 1),
        };
        assert_eq!(encode_request(adu, &mut [0; 1]), Err(Error::BufferSize));
        assert_eq!(encode_request(adu, &mut [0; 7]), Err(Error::BufferSize));
        assert_eq!(encode_request(adu, &mut [0; 8]), Ok(8));
    }

    #[test]
    fn every_encoded_frame_validates() {
        let frame = encode_write_single_register(0xF7, FunctionCode::Custom(0x41), 0xFFFF, 0);
        assert!(validate(&frame));
        let frame = encode_write_single_register(0x01, FunctionCode::ReadInputRegisters, 0, 1);
        assert!(validate(&frame));
    }

    #[test]
    fn decode_exception_response() {
        let rsp = &[0xF8, 0x84, 0x02, 0x12, 0xF0];
        assert_eq!(decode_exception(rsp), Some(0x02));
        assert_eq!(decode_measurements(rsp), Err(Error::Exception(0x02)));

        // a regular 5 byte frame is not an exception
        assert_eq!(decode_exception(&[0xF8, 0x04, 0x02, 0x00, 0x00]), None);
    }

    #[test]
    fn decode_measurements_with_bad_crc() {
        let rsp = &[0xF8, 0x84, 0x02, 0x12, 0xF1];
        assert_eq!(decode_measurements(rsp), Err(Error::Crc(0xF112, 0xF012)));
    }
}
