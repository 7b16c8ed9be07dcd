// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Serial line and time source abstractions.

use core::fmt;

/// A half-duplex byte channel to the meter, usually a serial port.
///
/// The engine borrows the channel for one request/response exchange
/// and never has more than one request in flight.
pub trait Transport {
    type Error: fmt::Debug;

    /// Write a frame, returns the number of bytes accepted.
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error>;

    /// Wait at most `timeout_ms` for the next byte.
    ///
    /// Returns `Ok(None)` if nothing arrived in time.
    fn read_byte(&mut self, timeout_ms: u64) -> Result<Option<u8>, Self::Error>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    type Error = T::Error;

    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        (**self).write(buf)
    }

    fn read_byte(&mut self, timeout_ms: u64) -> Result<Option<u8>, Self::Error> {
        (**self).read_byte(timeout_ms)
    }
}

/// Monotonic millisecond time source.
pub trait Clock {
    /// Milliseconds since an arbitrary but fixed epoch.
    fn millis(&self) -> u64;

    /// Give other work sharing the execution context a chance to run.
    ///
    /// Called between two byte reads. Schedulers that preempt don't need it.
    fn yield_now(&self) {}
}

impl<C: Clock + ?Sized> Clock for &C {
    fn millis(&self) -> u64 {
        (**self).millis()
    }

    fn yield_now(&self) {
        (**self).yield_now();
    }
}

#[cfg(feature = "std")]
pub use self::io::*;


#[cfg(feature = "std")]
mod io {
    use super::{Clock, Transport};
    use std::{
        io::{self, Read, Write},
        thread,
        time::{Duration, Instant},
    };

    /// [`Clock`] backed by [`Instant`].
    #[derive(Debug, Clone, Copy)]
    pub struct StdClock {
        epoch: Instant,
    }

    impl StdClock {
        /// Start counting from now.
        #[must_use]
        pub fn new() -> Self {
            Self {
                epoch: Instant::now(),
            }
        }
    }

    impl Default for StdClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Clock for StdClock {
        fn millis(&self) -> u64 {
            u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
        }

        fn yield_now(&self) {
            thread::yield_now();
        }
    }

    /// [`Transport`] on top of a blocking byte stream.
    ///
    /// Configure the stream with a short read timeout (a few milliseconds),
    /// every read that returns without data is retried until the deadline.
    #[derive(Debug)]
    pub struct IoTransport<T> {
        inner: T,
    }

    impl<T> IoTransport<T> {
        /// Wrap an already configured stream.
        pub const fn new(inner: T) -> Self {
            Self { inner }
        }

        /// The underlying stream.
        pub const fn get_ref(&self) -> &T {
            &self.inner
        }

        /// Give the underlying stream back.
        pub fn into_inner(self) -> T {
            self.inner
        }
    }

    impl<T: Read + Write> Transport for IoTransport<T> {
        type Error = io::Error;

        /// Write the whole frame, a partial frame would corrupt the bus.
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.inner.write_all(buf)?;
            self.inner.flush()?;
            Ok(buf.len())
        }

        fn read_byte(&mut self, timeout_ms: u64) -> io::Result<Option<u8>> {
            let deadline = Instant::now() + Duration::from_millis(timeout_ms);
            let mut byte = [0u8; 1];
            loop {
                match self.inner.read(&mut byte) {
                    Ok(1) => return Ok(Some(byte[0])),
                    Ok(_) => {}
                    Err(err)
                        if matches!(
                            err.kind(),
                            io::ErrorKind::TimedOut
                                | io::ErrorKind::WouldBlock
                                | io::ErrorKind::Interrupted
                        ) => {}
                    Err(err) => return Err(err),
                }
                if Instant::now() >= deadline {
                    return Ok(None);
                }
                thread::yield_now();
            }
        }
    }

}
