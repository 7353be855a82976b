// Mapper 0/2 (NROM and UxROM, folded into one board)
//
// Memory layout:
// - PPU $0000-$1FFF: 8KB CHR-ROM, or CHR-RAM on boards with no CHR banks
// - CPU $6000-$7FFF: SRAM
// - CPU $8000-$BFFF: switchable 16KB PRG bank (NROM never switches it)
// - CPU $C000-$FFFF: fixed to the last 16KB PRG bank
//
// NROM-128 carries a single 16KB PRG bank, so both windows resolve to it.
// UxROM selects the low window by writing the bank number anywhere in
// $8000-$FFFF; the value wraps modulo the bank count.

use super::Mapper;
use crate::cartridge::{Cartridge, Mirroring, PRG_BANK_SIZE};
use log::trace;

/// NROM/UxROM board state
pub struct Mapper0 {
    cartridge: Cartridge,
    /// Number of 16KB PRG banks
    prg_banks: usize,
    /// Switchable bank mapped at $8000-$BFFF
    prg_bank_low: usize,
    /// Fixed bank mapped at $C000-$FFFF (always the last)
    prg_bank_high: usize,
}

impl Mapper0 {
    pub fn new(cartridge: Cartridge) -> Self {
        let prg_banks = cartridge.prg.len() / PRG_BANK_SIZE;
        Mapper0 {
            cartridge,
            prg_banks,
            prg_bank_low: 0,
            prg_bank_high: prg_banks.saturating_sub(1),
        }
    }
}

impl Mapper for Mapper0 {
    fn read(&self, address: u16) -> u8 {
        match address {
            0x0000..=0x1FFF => self.cartridge.chr[address as usize],
            0xC000..=0xFFFF => {
                let index = self.prg_bank_high * PRG_BANK_SIZE + (address - 0xC000) as usize;
                self.cartridge.prg[index]
            }
            0x8000..=0xBFFF => {
                let index = self.prg_bank_low * PRG_BANK_SIZE + (address - 0x8000) as usize;
                self.cartridge.prg[index]
            }
            0x6000..=0x7FFF => self.cartridge.sram[(address - 0x6000) as usize],
            _ => {
                trace!("unhandled mapper0 read at {:04X}", address);
                0
            }
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        match address {
            0x0000..=0x1FFF => {
                if self.cartridge.chr_is_ram {
                    self.cartridge.chr[address as usize] = value;
                }
            }
            0x8000..=0xFFFF => {
                // UxROM bank select; harmless on NROM where there is
                // nothing to switch to
                self.prg_bank_low = value as usize % self.prg_banks;
            }
            0x6000..=0x7FFF => self.cartridge.sram[(address - 0x6000) as usize] = value,
            _ => trace!("unhandled mapper0 write at {:04X}", address),
        }
    }

    fn mirroring(&self) -> Mirroring {
        self.cartridge.mirroring
    }

    fn cartridge(&self) -> &Cartridge {
        &self.cartridge
    }

    fn cartridge_mut(&mut self) -> &mut Cartridge {
        &mut self.cartridge
    }
}
