// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deadline bounded frame reception.

use crate::{
    codec::check_crc,
    error::Error,
    transport::{Clock, Transport},
};

/// Receive a frame of at most `buf.len()` bytes within `timeout_ms`.
///
/// Bytes are read one at a time until the buffer is full or the deadline
/// has passed, then the CRC of whatever arrived is checked. A frame that
/// is shorter than the buffer but carries a valid CRC is accepted, the
/// returned length tells the caller how much was received.
pub fn receive<T, C>(
    io: &mut T,
    clock: &C,
    buf: &mut [u8],
    timeout_ms: u64,
) -> Result<usize, Error>
where
    T: Transport + ?Sized,
    C: Clock + ?Sized,
{
    let start = clock.millis();
    let mut len = 0;
    while len < buf.len() {
        let elapsed = clock.millis().saturating_sub(start);
        if elapsed >= timeout_ms {
            break;
        }
        match io.read_byte(timeout_ms - elapsed) {
            Ok(Some(byte)) => {
                buf[len] = byte;
                len += 1;
            }
            Ok(None) => {}
            Err(_err) => {
                #[cfg(feature = "log")]
                log::error!("Failed to read from transport: {_err:?}");
                return Err(Error::Transport);
            }
        }
        clock.yield_now();
    }

    let frame = &buf[..len];
    #[cfg(feature = "log")]
    log::trace!("Received {len} of {} byte(s): {frame:02X?}", buf.len());
    match check_crc(frame) {
        Ok(()) => Ok(len),
        Err(err) => {
            let err = if len < buf.len() {
                Error::Timeout(len)
            } else {
                err
            };
            #[cfg(feature = "log")]
            log::warn!("Failed to receive frame: {err}");
            Err(err)
        }
    }
}
