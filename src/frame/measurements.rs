// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use core::fmt;

/// Length of the response to a full measurement block read.
pub const MEASUREMENTS_RESPONSE_LEN: usize = 25;

/// One consistent set of values read from a meter.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Measurements {
    /// Line voltage in V
    pub voltage: f32,
    /// Line current in A
    pub current: f32,
    /// Active power in W
    pub power: f32,
    /// Active energy in kWh since the last reset
    pub energy: f32,
    /// Line frequency in Hz
    pub frequency: f32,
    /// Power factor of the load
    pub power_factor: f32,
    /// Raw alarm status, `0x0000` if the power alarm is off
    pub alarms: u16,
}

impl Measurements {
    /// Returns `true` if the power alarm threshold is exceeded.
    #[must_use]
    pub const fn power_alarm(&self) -> bool {
        self.alarms != 0x0000
    }
}

impl fmt::Display for Measurements {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:.1} V, {:.3} A, {:.1} W, {:.3} kWh, {:.1} Hz, PF {:.2}",
            self.voltage, self.current, self.power, self.energy, self.frequency, self.power_factor
        )?;
        if self.power_alarm() {
            write!(f, ", ALARM")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::format;

    #[test]
    fn power_alarm_state() {
        let mut values = Measurements::default();
        assert!(!values.power_alarm());
        values.alarms = 0xFFFF;
        assert!(values.power_alarm());
    }

    #[test]
    fn display() {
        let values = Measurements {
            voltage: 230.1,
            current: 1.5,
            power: 345.0,
            energy: 12.345,
            frequency: 50.0,
            power_factor: 1.0,
            alarms: 0,
        };
        assert_eq!(
            format!("{values}"),
            "230.1 V, 1.500 A, 345.0 W, 12.345 kWh, 50.0 Hz, PF 1.00"
        );
        let values = Measurements {
            alarms: 0xFFFF,
            ..values
        };
        assert!(format!("{values}").ends_with(", ALARM"));
    }
}
