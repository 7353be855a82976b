//! Pulse wave channel (both pulse 1 and pulse 2)

use crate::apu::components::{Envelope, LengthCounter, Sweep, Timer};
use crate::apu::constants::DUTY_TABLE;

/// Square wave generator: duty sequencer, envelope, sweep, length counter
#[derive(Debug, Clone)]
pub struct Pulse {
    /// Enabled flag from $4015
    pub(crate) enabled: bool,
    /// Duty pattern select (0-3)
    duty_mode: u8,
    /// Position within the 8-step duty sequence
    duty_value: u8,
    pub(crate) timer: Timer,
    pub(crate) envelope: Envelope,
    pub(crate) sweep: Sweep,
    pub(crate) length: LengthCounter,
}

impl Pulse {
    /// `channel` is 1 or 2; pulse 1 sweeps down by one extra step
    pub fn new(channel: u8) -> Self {
        Pulse {
            enabled: false,
            duty_mode: 0,
            duty_value: 0,
            timer: Timer::new(),
            envelope: Envelope::new(),
            sweep: Sweep::new(channel),
            length: LengthCounter::new(),
        }
    }

    /// $4000/$4004: duty, halt/loop, envelope
    pub fn write_control(&mut self, value: u8) {
        self.duty_mode = (value >> 6) & 0x03;
        self.length.set_halt((value >> 5) & 1 != 0);
        self.envelope.write_control(value);
        self.envelope.restart();
    }

    /// $4001/$4005: sweep unit
    pub fn write_sweep(&mut self, value: u8) {
        self.sweep.write_control(value);
    }

    /// $4002/$4006: timer low byte
    pub fn write_timer_low(&mut self, value: u8) {
        self.timer.set_period_low(value);
    }

    /// $4003/$4007: timer high bits plus length load; restarts the
    /// envelope and the duty sequence
    pub fn write_timer_high(&mut self, value: u8) {
        self.timer.set_period_high(value);
        self.length.load(value >> 3);
        self.envelope.restart();
        self.duty_value = 0;
    }

    /// $4015 enable; disabling clears the length counter
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.length.counter = 0;
        }
    }

    /// Advance the duty sequencer (every other CPU cycle)
    pub fn clock_timer(&mut self) {
        if self.timer.clock() {
            self.duty_value = (self.duty_value + 1) % 8;
        }
    }

    pub fn clock_envelope(&mut self) {
        self.envelope.clock();
    }

    pub fn clock_length(&mut self) {
        self.length.clock();
    }

    /// Sweep tick; applies the computed period back into the timer
    pub fn clock_sweep(&mut self) {
        if let Some(period) = self.sweep.clock(self.timer.period) {
            self.timer.period = period;
        }
    }

    /// Current sample (0-15)
    ///
    /// Silent when disabled, when the length counter has run out, when the
    /// duty sequencer is in a low step, or when the period has swept
    /// outside the playable 8..=0x7FF range.
    pub fn output(&self) -> u8 {
        if !self.enabled {
            return 0;
        }
        if !self.length.is_active() {
            return 0;
        }
        if DUTY_TABLE[self.duty_mode as usize][self.duty_value as usize] == 0 {
            return 0;
        }
        if self.timer.period < 8 || self.timer.period > 0x7FF {
            return 0;
        }
        self.envelope.output()
    }
}
