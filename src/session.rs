// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Meter session: command dispatch and the measurement cache.

use crate::{
    codec::client::{decode_exception, decode_measurements, encode_request},
    error::Error,
    frame::*,
    receive::receive,
    transport::{Clock, Transport},
};

type Result<T> = core::result::Result<T, Error>;

/// Largest frame the session ever sends.
const MAX_REQUEST_LEN: usize = 8;

/// Reply length of a single register read: address, function code,
/// byte count, one word and CRC.
const SINGLE_REGISTER_RESPONSE_LEN: usize = 7;

/// Timing and limits of a [`Session`].
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Measurements younger than this are served from the cache.
    pub update_interval_ms: u64,
    /// Deadline for receiving one complete frame.
    pub read_timeout_ms: u64,
    /// Power alarm thresholds above this are clamped.
    pub max_alarm_watts: u16,
}

impl Config {
    /// The meter's timing as documented by the vendor.
    pub const DEFAULT: Self = Self {
        update_interval_ms: 200,
        read_timeout_ms: 100,
        max_alarm_watts: 25_000,
    };
}

impl Default for Config {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// The state kept for one meter on the bus.
///
/// A session never owns the serial line. Each call borrows it for a
/// single request/response exchange, so a session must only be used by
/// one task at a time.
#[derive(Debug, Clone)]
pub struct Session<C> {
    slave: SlaveId,
    last_read: Option<u64>,
    values: Option<Measurements>,
    config: Config,
    clock: C,
}

impl<C: Clock> Session<C> {
    /// Create a session for the meter at `slave`.
    ///
    /// Addresses outside of `0x01..=0xF8` fall back to [`DEFAULT_SLAVE`].
    pub fn new(clock: C, slave: SlaveId) -> Self {
        Self::with_config(clock, slave, Config::DEFAULT)
    }

    /// Like [`new`](Self::new) with custom timing and limits.
    pub fn with_config(clock: C, slave: SlaveId, config: Config) -> Self {
        let slave = if is_valid_slave(slave) {
            slave
        } else {
            DEFAULT_SLAVE
        };
        Self {
            slave,
            last_read: None,
            values: None,
            config,
            clock,
        }
    }

    /// The address requests are sent to.
    #[must_use]
    pub const fn slave(&self) -> SlaveId {
        self.slave
    }

    /// Timing and limits in use.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// The last measurements read successfully, without touching the line.
    #[must_use]
    pub const fn snapshot(&self) -> Option<&Measurements> {
        self.values.as_ref()
    }

    /// Returns `true` if the cached measurements can be served without a read.
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        self.last_read.is_some_and(|last_read| {
            self.clock.millis().saturating_sub(last_read) < self.config.update_interval_ms
        })
    }

    /// Force the next [`update_values`](Self::update_values) to query the meter.
    ///
    /// The cached measurements stay available as fallback.
    pub fn invalidate(&mut self) {
        self.last_read = None;
    }

    fn target(&self, slave: Option<SlaveId>) -> SlaveId {
        slave.filter(|s| is_valid_slave(*s)).unwrap_or(self.slave)
    }

    fn write<T: Transport + ?Sized>(io: &mut T, frame: &[u8]) -> Result<()> {
        #[cfg(feature = "log")]
        log::trace!("Sending {frame:02X?}");
        match io.write(frame) {
            Ok(len) if len == frame.len() => Ok(()),
            Ok(_len) => {
                #[cfg(feature = "log")]
                log::error!("Short write: {_len} of {} byte(s)", frame.len());
                Err(Error::Transport)
            }
            Err(_err) => {
                #[cfg(feature = "log")]
                log::error!("Failed to write to transport: {_err:?}");
                Err(Error::Transport)
            }
        }
    }

    /// Send a request to the meter.
    ///
    /// `slave` overrides the session address for this request only, and
    /// only if it is a valid address. With `verify` the meter has to echo
    /// the request byte for byte.
    pub fn send_request<T: Transport + ?Sized>(
        &self,
        io: &mut T,
        request: Request,
        verify: bool,
        slave: Option<SlaveId>,
    ) -> Result<()> {
        let hdr = Header {
            slave: self.target(slave),
        };
        let mut buf = [0; MAX_REQUEST_LEN];
        let len = encode_request(RequestAdu { hdr, pdu: request }, &mut buf)?;
        let frame = &buf[..len];
        Self::write(io, frame)?;
        if !verify {
            return Ok(());
        }
        let mut rsp = [0; MAX_REQUEST_LEN];
        let rsp = &mut rsp[..len];
        let rsp_len = receive(io, &self.clock, rsp, self.config.read_timeout_ms)?;
        if rsp_len != len || rsp[..] != frame[..] {
            #[cfg(feature = "log")]
            log::warn!(
                "Request {frame:02X?} not confirmed, got {:02X?}",
                &rsp[..rsp_len]
            );
            return Err(Error::Verification);
        }
        Ok(())
    }

    /// Write a holding register, the meter has to confirm it.
    pub fn write_single_register<T: Transport + ?Sized>(
        &self,
        io: &mut T,
        address: Address,
        value: Word,
    ) -> Result<()> {
        self.send_request(io, Request::WriteSingleRegister(address, value), true, None)
    }

    /// Assign a new address to the meter.
    ///
    /// The session follows the meter to its new address. The address is
    /// not persisted anywhere else, a session created with the old address
    /// will fail after a restart.
    pub fn set_slave<T: Transport + ?Sized>(&mut self, io: &mut T, slave: SlaveId) -> Result<()> {
        if !is_valid_slave(slave) {
            return Err(Error::Address(slave));
        }
        self.write_single_register(io, REG_SLAVE_ADDRESS, u16::from(slave))?;
        #[cfg(feature = "log")]
        log::info!("Meter 0x{:02X} moved to 0x{slave:02X}", self.slave);
        self.slave = slave;
        Ok(())
    }

    /// Set the power alarm threshold in watts.
    ///
    /// Values above [`Config::max_alarm_watts`] are clamped.
    pub fn set_power_alarm<T: Transport + ?Sized>(&self, io: &mut T, watts: u16) -> Result<()> {
        let watts = watts.min(self.config.max_alarm_watts);
        self.write_single_register(io, REG_ALARM_THRESHOLD, watts)
    }

    /// Reset the energy counter of the meter.
    ///
    /// Any reply but an empty or a 5 byte one counts as success. A 5 byte
    /// reply is the meter refusing the reset.
    pub fn reset_energy<T: Transport + ?Sized>(&self, io: &mut T) -> Result<()> {
        self.send_request(io, Request::ResetEnergy, false, None)?;
        let mut rsp = [0; 5];
        let len = receive(io, &self.clock, &mut rsp, self.config.read_timeout_ms)?;
        if len == rsp.len() {
            return Err(decode_exception(&rsp).map_or(Error::Verification, Error::Exception));
        }
        Ok(())
    }

    /// Read all measurements from the meter unless the cache is fresh.
    ///
    /// On failure the cache is left as it was.
    pub fn update_values<T: Transport + ?Sized>(&mut self, io: &mut T) -> Result<()> {
        if self.is_fresh() {
            #[cfg(feature = "log")]
            log::debug!("Serving measurements of 0x{:02X} from cache", self.slave);
            return Ok(());
        }
        self.send_request(
            io,
            Request::ReadInputRegisters(REG_VOLTAGE, MEASUREMENT_REGISTERS),
            false,
            None,
        )?;
        let mut rsp = [0; MEASUREMENTS_RESPONSE_LEN];
        let len = receive(io, &self.clock, &mut rsp, self.config.read_timeout_ms)?;
        let values = decode_measurements(&rsp[..len])?;
        #[cfg(feature = "log")]
        log::debug!("Meter 0x{:02X}: {values}", self.slave);
        self.values = Some(values);
        self.last_read = Some(self.clock.millis());
        Ok(())
    }

    /// Current measurements.
    ///
    /// If the meter cannot be read the last known values are returned.
    /// Fails only if there never was a successful read.
    pub fn measurements<T: Transport + ?Sized>(&mut self, io: &mut T) -> Result<Measurements> {
        match self.update_values(io) {
            Ok(()) => self.values.ok_or(Error::Timeout(0)),
            Err(err) => match self.values {
                Some(values) => {
                    #[cfg(feature = "log")]
                    log::warn!("Using stale measurements of 0x{:02X}: {err}", self.slave);
                    Ok(values)
                }
                None => Err(err),
            },
        }
    }

    /// Line voltage in V
    pub fn voltage<T: Transport + ?Sized>(&mut self, io: &mut T) -> Result<f32> {
        self.measurements(io).map(|m| m.voltage)
    }

    /// Line current in A
    pub fn current<T: Transport + ?Sized>(&mut self, io: &mut T) -> Result<f32> {
        self.measurements(io).map(|m| m.current)
    }

    /// Active power in W
    pub fn power<T: Transport + ?Sized>(&mut self, io: &mut T) -> Result<f32> {
        self.measurements(io).map(|m| m.power)
    }

    /// Active energy in kWh
    pub fn energy<T: Transport + ?Sized>(&mut self, io: &mut T) -> Result<f32> {
        self.measurements(io).map(|m| m.energy)
    }

    /// Line frequency in Hz
    pub fn frequency<T: Transport + ?Sized>(&mut self, io: &mut T) -> Result<f32> {
        self.measurements(io).map(|m| m.frequency)
    }

    /// Power factor, 0.00 to 1.00
    pub fn power_factor<T: Transport + ?Sized>(&mut self, io: &mut T) -> Result<f32> {
        self.measurements(io).map(|m| m.power_factor)
    }

    /// Returns `true` if the power alarm is triggered.
    pub fn power_alarm<T: Transport + ?Sized>(&mut self, io: &mut T) -> Result<bool> {
        self.measurements(io).map(|m| m.power_alarm())
    }

    /// Probe every configurable address and report the ones that answer.
    ///
    /// Meant for commissioning a bus, it takes up to a read timeout per
    /// address. The measurement cache is not touched.
    pub fn search<T, F>(&self, io: &mut T, mut on_found: F) -> Result<()>
    where
        T: Transport + ?Sized,
        F: FnMut(SlaveId),
    {
        for slave in SLAVE_RANGE {
            self.send_request(
                io,
                Request::ReadInputRegisters(REG_VOLTAGE, 1),
                false,
                Some(slave),
            )?;
            let mut rsp = [0; SINGLE_REGISTER_RESPONSE_LEN];
            match receive(io, &self.clock, &mut rsp, self.config.read_timeout_ms) {
                Ok(len) if len == rsp.len() => {
                    #[cfg(feature = "log")]
                    log::info!("Found meter at 0x{slave:02X}");
                    on_found(slave);
                }
                Ok(_) => {}
                Err(err) if err.is_read_failure() => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }
}
