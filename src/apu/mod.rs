// APU module - Audio Processing Unit (2A03) implementation
//
// The APU is cycle-stepped: `step` advances one CPU cycle. The pulse,
// noise, and DMC timers tick every other cycle; the triangle ticks every
// cycle. A 240 Hz frame sequencer derived from the CPU clock drives
// envelopes, length counters, sweeps, and the linear counter, and a
// fractional down-sampler emits one mixed sample to the registered sink
// whenever the cycle count crosses a host sample boundary.
//
// # Register map
//
// | Address       | Channel / unit                  |
// |---------------|---------------------------------|
// | $4000-$4003   | Pulse 1                         |
// | $4004-$4007   | Pulse 2                         |
// | $4008-$400B   | Triangle                        |
// | $400C-$400F   | Noise                           |
// | $4010-$4013   | DMC                             |
// | $4015         | Channel enables / status (R/W)  |
// | $4017         | Frame counter (write only)      |
//
// $4015 is the only readable register; reading it clears the frame IRQ
// flag. DMC memory fetches go through the CPU bus via the handshake on
// `Dmc`, each costing the CPU a four-cycle stall.

pub mod channels;
pub mod components;
pub mod constants;

use crate::cpu::CPU_FREQUENCY;
use channels::{Dmc, Noise, Pulse, Triangle};
use constants::FRAME_COUNTER_RATE;

/// Audio sample sink registered by the host
///
/// Called from inside the VM step loop, so it must be non-blocking; a host
/// feeding a bounded FIFO should drop samples when full.
pub type AudioSink = Box<dyn FnMut(f32) + Send>;

/// APU state: five channels, frame sequencer, mixer, and down-sampler
pub struct Apu {
    pub(crate) pulse1: Pulse,
    pub(crate) pulse2: Pulse,
    pub(crate) triangle: Triangle,
    pub(crate) noise: Noise,
    pub(crate) dmc: Dmc,

    /// CPU cycles elapsed
    cycle: u64,
    /// Cycle of the last frame-sequencer tick
    last_frame_tick: u64,
    /// Frame sequencer step counter
    frame_counter: u64,
    /// Frame sequencer mode: 0 = 4-step, 1 = 5-step
    frame_mode: u8,
    /// IRQ inhibit flag from $4017 bit 6
    irq_inhibit: bool,
    /// Frame IRQ flag, visible in $4015 bit 6 until read
    frame_irq: bool,
    /// Edge waiting to be drained into the CPU IRQ line
    irq_line: bool,

    /// CPU cycles per host audio sample; zero disables output
    sample_period: f64,
    sink: Option<AudioSink>,

    /// Nonlinear mixer lookups, computed once at construction
    pulse_table: [f32; 31],
    tnd_table: [f32; 203],
}

impl Apu {
    pub fn new() -> Self {
        let mut pulse_table = [0.0f32; 31];
        for (i, entry) in pulse_table.iter_mut().enumerate().skip(1) {
            *entry = 95.52 / (8128.0 / i as f32 + 100.0);
        }
        let mut tnd_table = [0.0f32; 203];
        for (i, entry) in tnd_table.iter_mut().enumerate().skip(1) {
            *entry = 163.67 / (24329.0 / i as f32 + 100.0);
        }

        Apu {
            pulse1: Pulse::new(1),
            pulse2: Pulse::new(2),
            triangle: Triangle::new(),
            noise: Noise::new(),
            dmc: Dmc::new(),
            cycle: 0,
            last_frame_tick: 0,
            frame_counter: 0,
            frame_mode: 0,
            irq_inhibit: false,
            frame_irq: false,
            irq_line: false,
            sample_period: 0.0,
            sink: None,
            pulse_table,
            tnd_table,
        }
    }

    /// Register the host sample sink
    pub fn set_audio_sink(&mut self, sink: AudioSink) {
        self.sink = Some(sink);
    }

    /// Set the host sample rate in Hz; derives the down-sampler period
    pub fn set_sample_rate(&mut self, rate: f64) {
        self.sample_period = if rate > 0.0 {
            CPU_FREQUENCY as f64 / rate
        } else {
            0.0
        };
    }

    /// Poll and clear the IRQ edge (frame or DMC)
    pub fn take_irq(&mut self) -> bool {
        let line = self.irq_line;
        self.irq_line = false;
        line
    }

    /// Advance one CPU cycle
    ///
    /// The bus completes any pending DMC fetch (see `dmc_fetch_address`)
    /// before calling this.
    pub fn step(&mut self) {
        self.clock_timers();

        // 240 Hz frame sequencer off the CPU clock
        if (self.cycle - self.last_frame_tick) as f64 >= CPU_FREQUENCY as f64 / FRAME_COUNTER_RATE
        {
            self.clock_frame_sequencer();
            self.last_frame_tick = self.cycle;
        }

        if self.sample_period > 0.0 {
            let s1 = (self.cycle as f64 / self.sample_period) as u64;
            let s2 = ((self.cycle + 1) as f64 / self.sample_period) as u64;
            if s1 != s2 {
                let sample = self.output();
                if let Some(sink) = self.sink.as_mut() {
                    sink(sample);
                }
            }
        }

        self.cycle += 1;
    }

    /// Where the DMC wants a byte fetched this cycle, if anywhere
    ///
    /// The reader runs at the half-rate timer cadence; the bus performs
    /// the read, charges the 4-cycle stall, and calls `dmc_load_sample`.
    pub fn dmc_fetch_address(&self) -> Option<u16> {
        if self.cycle % 2 == 0 {
            self.dmc.fetch_address()
        } else {
            None
        }
    }

    /// Hand a fetched byte to the DMC sample reader
    ///
    /// A completion IRQ raised by this byte also pulses the CPU IRQ line;
    /// the status flag itself stays visible in $4015 until cleared.
    pub fn dmc_load_sample(&mut self, value: u8) {
        let was_pending = self.dmc.irq_pending;
        self.dmc.load_sample(value);
        if self.dmc.irq_pending && !was_pending {
            self.irq_line = true;
        }
    }

    /// Per-cycle channel timers: triangle at full rate, the rest halved
    fn clock_timers(&mut self) {
        if self.cycle % 2 == 0 {
            self.pulse1.clock_timer();
            self.pulse2.clock_timer();
            self.noise.clock_timer();
            self.dmc.clock_timer();
        }
        self.triangle.clock_timer();
    }

    /// One 240 Hz frame sequencer tick
    ///
    /// 4-step mode: envelopes every step, lengths and sweeps on steps 1
    /// and 3, frame IRQ on step 3. 5-step mode: envelopes on steps 0-3,
    /// lengths and sweeps on steps 0 and 2, never an IRQ.
    fn clock_frame_sequencer(&mut self) {
        if self.frame_mode == 0 {
            self.clock_envelopes();
            match self.frame_counter % 4 {
                1 => {
                    self.clock_lengths();
                    self.clock_sweeps();
                }
                3 => {
                    self.clock_lengths();
                    self.clock_sweeps();
                    if !self.irq_inhibit {
                        self.frame_irq = true;
                        self.irq_line = true;
                    }
                }
                _ => {}
            }
        } else {
            match self.frame_counter % 5 {
                0 | 2 => {
                    self.clock_envelopes();
                    self.clock_lengths();
                    self.clock_sweeps();
                }
                1 | 3 => self.clock_envelopes(),
                _ => {}
            }
        }
        self.frame_counter += 1;
    }

    fn clock_envelopes(&mut self) {
        self.pulse1.clock_envelope();
        self.pulse2.clock_envelope();
        self.noise.clock_envelope();
        self.triangle.clock_linear();
    }

    fn clock_lengths(&mut self) {
        self.pulse1.clock_length();
        self.pulse2.clock_length();
        self.triangle.clock_length();
        self.noise.clock_length();
    }

    fn clock_sweeps(&mut self) {
        self.pulse1.clock_sweep();
        self.pulse2.clock_sweep();
    }

    /// Mix the five channels through the nonlinear lookup tables
    pub fn output(&self) -> f32 {
        let p1 = self.pulse1.output() as usize;
        let p2 = self.pulse2.output() as usize;
        let t = self.triangle.output() as usize;
        let n = self.noise.output() as usize;
        let d = self.dmc.output() as usize;

        self.pulse_table[p1 + p2] + self.tnd_table[3 * t + 2 * n + d]
    }

    // ========================================
    // Registers
    // ========================================

    /// Write an APU register ($4000-$4013, $4015, $4017)
    pub fn write_register(&mut self, address: u16, value: u8) {
        match address {
            0x4000 => self.pulse1.write_control(value),
            0x4001 => self.pulse1.write_sweep(value),
            0x4002 => self.pulse1.write_timer_low(value),
            0x4003 => self.pulse1.write_timer_high(value),
            0x4004 => self.pulse2.write_control(value),
            0x4005 => self.pulse2.write_sweep(value),
            0x4006 => self.pulse2.write_timer_low(value),
            0x4007 => self.pulse2.write_timer_high(value),
            0x4008 => self.triangle.write_control(value),
            0x4009 => {} // unused
            0x400A => self.triangle.write_timer_low(value),
            0x400B => self.triangle.write_timer_high(value),
            0x400C => self.noise.write_control(value),
            0x400D => {} // unused
            0x400E => self.noise.write_period(value),
            0x400F => self.noise.write_length(value),
            0x4010 => self.dmc.write_control(value),
            0x4011 => self.dmc.write_value(value),
            0x4012 => self.dmc.write_sample_address(value),
            0x4013 => self.dmc.write_sample_length(value),
            0x4015 => self.write_status(value),
            0x4017 => self.write_frame_counter(value),
            _ => {}
        }
    }

    /// Read an APU register; only $4015 is readable
    pub fn read_register(&mut self, address: u16) -> u8 {
        if address == 0x4015 {
            self.read_status()
        } else {
            0
        }
    }

    /// $4015 read: channel activity plus IRQ flags; clears the frame IRQ
    fn read_status(&mut self) -> u8 {
        let mut status = 0u8;
        if self.pulse1.length.is_active() {
            status |= 1 << 0;
        }
        if self.pulse2.length.is_active() {
            status |= 1 << 1;
        }
        if self.triangle.length.is_active() {
            status |= 1 << 2;
        }
        if self.noise.length.is_active() {
            status |= 1 << 3;
        }
        if self.dmc.is_active() {
            status |= 1 << 4;
        }
        if self.frame_irq {
            status |= 1 << 6;
        }
        if self.dmc.irq_pending {
            status |= 1 << 7;
        }
        self.frame_irq = false;
        status
    }

    /// $4015 write: channel enables
    fn write_status(&mut self, value: u8) {
        self.pulse1.set_enabled(value & 0x01 != 0);
        self.pulse2.set_enabled(value & 0x02 != 0);
        self.triangle.set_enabled(value & 0x04 != 0);
        self.noise.set_enabled(value & 0x08 != 0);
        self.dmc.set_enabled(value & 0x10 != 0);
        self.dmc.irq_pending = false;
    }

    /// $4017 write: frame counter mode and IRQ inhibit
    ///
    /// Selecting 5-step mode immediately clocks every sequenced unit once;
    /// setting the inhibit bit clears a held frame IRQ.
    fn write_frame_counter(&mut self, value: u8) {
        self.frame_mode = (value >> 7) & 1;
        self.irq_inhibit = (value >> 6) & 1 != 0;
        if self.irq_inhibit {
            self.frame_irq = false;
        }
        if self.frame_mode == 1 {
            self.clock_envelopes();
            self.clock_sweeps();
            self.clock_lengths();
        }
    }
}

impl Default for Apu {
    fn default() -> Self {
        Self::new()
    }
}
