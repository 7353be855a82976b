// famicore - a cycle-stepped NES (Famicom) console core
//
// The crate is a pure virtual machine: it takes ROM bytes, button
// snapshots, and wall-clock time from a host and produces RGBA frames and
// audio samples. Windowing, audio devices, and file I/O live in the host.

pub mod apu;
pub mod bus;
pub mod cartridge;
pub mod console;
pub mod cpu;
pub mod input;
pub mod ppu;

// Re-export the main types for convenience
pub use apu::{Apu, AudioSink};
pub use bus::Bus;
pub use cartridge::{create_mapper, Cartridge, LoadError, Mapper, Mirroring};
pub use console::Console;
pub use cpu::{Cpu, CPU_FREQUENCY};
pub use input::{Button, Controller};
pub use ppu::{Ppu, SCREEN_HEIGHT, SCREEN_WIDTH};
