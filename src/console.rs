// Console module - ownership wiring and the outer step loop
//
// The console owns the CPU and the bus (which in turn owns the PPU, APU,
// controllers, and mapper) and enforces the canonical coupling: for every
// CPU cycle consumed, the PPU advances three dots with the mapper
// observing each one, and the APU advances one step. Interrupt edges and
// DMA stalls raised inside a step are drained into the CPU before the
// next instruction.
//
// This is the entire host-facing surface: the host feeds it ROM bytes,
// button snapshots, and wall-clock time, and pulls frames and audio
// samples back out. Errors can only come out of `new`; a constructed
// console never fails.

use crate::apu::AudioSink;
use crate::bus::Bus;
use crate::cartridge::{create_mapper, Cartridge, LoadError};
use crate::cpu::{Cpu, CPU_FREQUENCY};

/// A complete NES: CPU plus the bus-owned components
pub struct Console {
    cpu: Cpu,
    bus: Bus,
}

impl Console {
    /// Build a console around an iNES ROM image
    pub fn new(rom: &[u8]) -> Result<Console, LoadError> {
        let cartridge = Cartridge::from_bytes(rom)?;
        let mapper = create_mapper(cartridge)?;
        let mut bus = Bus::new(mapper);
        let mut cpu = Cpu::new();
        cpu.reset(&mut bus);
        Ok(Console { cpu, bus })
    }

    /// Press the reset button
    pub fn reset(&mut self) {
        self.cpu.reset(&mut self.bus);
        self.bus.ppu.reset();
    }

    /// Execute one CPU instruction and keep every component in lockstep
    ///
    /// Returns the CPU cycles consumed. Each CPU cycle costs three PPU
    /// dots (each observed by the mapper) and one APU step.
    pub fn step(&mut self) -> u64 {
        let cpu_cycles = self.cpu.step(&mut self.bus);

        for _ in 0..cpu_cycles * 3 {
            self.bus.step_ppu();
        }
        for _ in 0..cpu_cycles {
            self.bus.step_apu();
        }

        if self.bus.take_nmi() {
            self.cpu.trigger_nmi();
        }
        if self.bus.take_irq() {
            self.cpu.trigger_irq();
        }
        self.cpu.add_stall(self.bus.take_stall());

        cpu_cycles
    }

    /// Advance the machine by a wall-clock duration
    pub fn step_seconds(&mut self, seconds: f64) {
        let mut budget = (CPU_FREQUENCY as f64 * seconds) as i64;
        while budget > 0 {
            budget -= self.step() as i64;
        }
    }

    /// Replace the controller 1 button snapshot
    pub fn set_button1(&mut self, buttons: [bool; 8]) {
        self.bus.controller1.set_buttons(buttons);
    }

    /// Replace the controller 2 button snapshot
    pub fn set_button2(&mut self, buttons: [bool; 8]) {
        self.bus.controller2.set_buttons(buttons);
    }

    /// Register the audio sample sink; it must not block
    pub fn set_audio_sink(&mut self, sink: AudioSink) {
        self.bus.apu.set_audio_sink(sink);
    }

    /// Tell the down-sampler the host audio rate in Hz
    pub fn set_audio_sample_rate(&mut self, rate: f64) {
        self.bus.apu.set_sample_rate(rate);
    }

    /// The front frame buffer: 256x240 RGBA bytes of the last completed
    /// frame, swapped atomically at vblank
    pub fn frame(&self) -> &[u8] {
        self.bus.ppu.frame_buffer().as_bytes()
    }

    /// Whether the cartridge declares battery-backed SRAM
    pub fn has_battery(&self) -> bool {
        self.bus.mapper.cartridge().has_battery
    }

    /// Borrow the SRAM for host-side persistence
    pub fn sram(&self) -> &[u8] {
        self.bus.mapper.cartridge().sram()
    }

    /// Restore a persisted SRAM image
    pub fn restore_sram(&mut self, data: &[u8]) {
        self.bus.mapper.cartridge_mut().restore_sram(data);
    }

    /// CPU state, for hosts with debugging front-ends
    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    /// Bus (and through it PPU/APU) state
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Mutable bus access
    pub fn bus_mut(&mut self) -> &mut Bus {
        &mut self.bus
    }
}
