// Mappers module - cartridge bank-switching boards
//
// A mapper mediates every bus access into the cartridge. It sees two address
// windows through the same operation surface: PPU pattern-table fetches at
// $0000-$1FFF, and CPU accesses at $6000-$FFFF (SRAM plus the PRG windows,
// whose writes drive the board's bank registers).
//
// MMC3 additionally observes one PPU dot per call to `step` so it can run
// its scanline counter, and may assert the CPU IRQ line; the other boards
// use the default no-op implementations.

mod mapper0;
mod mapper1;
mod mapper3;
mod mapper4;

use super::{Cartridge, LoadError, Mirroring};
use log::warn;

pub use mapper0::Mapper0;
pub use mapper1::Mapper1;
pub use mapper3::Mapper3;
pub use mapper4::Mapper4;

/// Uniform operation surface over the supported cartridge boards
///
/// `read`/`write` decode both bus windows: pattern tables below $2000 and
/// the CPU's cartridge space from $6000 up. Addresses outside those windows
/// read as zero and drop writes; the bus never routes them here in normal
/// operation.
pub trait Mapper {
    /// Read a byte through the board's current banking
    fn read(&self, address: u16) -> u8;

    /// Write a byte; PRG-window writes reach the board's registers
    fn write(&mut self, address: u16, value: u8);

    /// Current nametable mirroring (boards may rewrite the cartridge's mode)
    fn mirroring(&self) -> Mirroring;

    /// Observe one PPU dot (called 3x per CPU cycle, after the PPU advances)
    ///
    /// Only MMC3 cares; `rendering` is true when background or sprite
    /// rendering is enabled.
    fn step(&mut self, _scanline: u16, _dot: u16, _rendering: bool) {}

    /// Poll and clear the board's IRQ line
    fn take_irq(&mut self) -> bool {
        false
    }

    /// Borrow the cartridge this board owns
    fn cartridge(&self) -> &Cartridge;

    /// Mutably borrow the cartridge this board owns
    fn cartridge_mut(&mut self) -> &mut Cartridge;
}

/// Create the board implementation for a parsed cartridge
///
/// Mapper numbers 0 and 2 are folded into one NROM/UxROM board: NROM images
/// simply never write the bank-select register.
pub fn create_mapper(cartridge: Cartridge) -> Result<Box<dyn Mapper>, LoadError> {
    match cartridge.mapper_id {
        0 | 2 => Ok(Box::new(Mapper0::new(cartridge))),
        1 => Ok(Box::new(Mapper1::new(cartridge))),
        3 => Ok(Box::new(Mapper3::new(cartridge))),
        4 => Ok(Box::new(Mapper4::new(cartridge))),
        id => {
            warn!("mapper {} is not supported", id);
            Err(LoadError::UnsupportedMapper(id))
        }
    }
}

/// Resolve a possibly negative bank index into a byte offset
///
/// Bank registers on MMC1 and MMC3 address banks from the end of ROM with
/// indices like -1 (last bank) and -2 (second to last); positive indices
/// wrap modulo the bank count. `bank_size` must evenly divide `rom_len`.
pub(crate) fn bank_offset(rom_len: usize, index: isize, bank_size: usize) -> usize {
    let count = (rom_len / bank_size) as isize;
    (index.rem_euclid(count) as usize) * bank_size
}
