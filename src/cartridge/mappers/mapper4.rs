// Mapper 4 (MMC3)
//
// Eight internal bank registers R0-R7 drive four 8KB PRG windows and a
// CHR arrangement of two 2KB plus four 1KB banks. A bank-select register at
// even addresses in $8000-$9FFE picks which register the next odd-address
// write updates, and carries the PRG mode (bit 6) and CHR A12 inversion
// (bit 7). Even $A000 writes set mirroring.
//
// The IRQ unit is a scanline counter clocked by the PPU: at dot 260 of
// every visible or pre-render line with rendering enabled, the counter
// reloads from its latch when zero, otherwise decrements; a decrement to
// zero with IRQs enabled asserts the CPU IRQ line.
//
// Register map ($8000-$FFFF, by address parity):
// - $8000-$9FFE even: bank select    / odd: bank data
// - $A000-$BFFE even: mirroring      / odd: PRG RAM protect (ignored)
// - $C000-$DFFE even: IRQ latch      / odd: IRQ reload request
// - $E000-$FFFE even: IRQ disable    / odd: IRQ enable

use super::{bank_offset, Mapper};
use crate::cartridge::{Cartridge, Mirroring};

/// 1KB CHR bank granularity used by the offset table
const CHR_WINDOW: usize = 0x0400;

/// 8KB PRG bank granularity used by the offset table
const PRG_WINDOW: usize = 0x2000;

/// MMC3 board state
pub struct Mapper4 {
    cartridge: Cartridge,
    /// Which of R0-R7 the next bank-data write updates
    register_index: u8,
    /// R0-R7 bank registers
    registers: [u8; 8],
    /// PRG bank mode (bank-select bit 6)
    prg_mode: u8,
    /// CHR A12 inversion (bank-select bit 7)
    chr_mode: u8,
    /// IRQ latch (counter reload value)
    irq_latch: u8,
    /// Scanline counter
    counter: u8,
    irq_enabled: bool,
    irq_pending: bool,
    /// Byte offsets of the four 8KB PRG windows from $8000
    prg_offsets: [usize; 4],
    /// Byte offsets of the eight 1KB CHR windows
    chr_offsets: [usize; 8],
}

impl Mapper4 {
    pub fn new(cartridge: Cartridge) -> Self {
        let mut mapper = Mapper4 {
            cartridge,
            register_index: 0,
            registers: [0; 8],
            prg_mode: 0,
            chr_mode: 0,
            irq_latch: 0,
            counter: 0,
            irq_enabled: false,
            irq_pending: false,
            prg_offsets: [0; 4],
            chr_offsets: [0; 8],
        };
        // Power-on PRG map: R6, R7, second-to-last, last
        mapper.prg_offsets[0] = mapper.prg_offset(0);
        mapper.prg_offsets[1] = mapper.prg_offset(1);
        mapper.prg_offsets[2] = mapper.prg_offset(-2);
        mapper.prg_offsets[3] = mapper.prg_offset(-1);
        mapper
    }

    fn write_register(&mut self, address: u16, value: u8) {
        let even = address % 2 == 0;
        match (address, even) {
            (0x8000..=0x9FFF, true) => self.set_bank_select(value),
            (0x8000..=0x9FFF, false) => self.set_bank_data(value),
            (0xA000..=0xBFFF, true) => self.set_mirroring(value),
            (0xA000..=0xBFFF, false) => {} // PRG RAM protect, not implemented
            (0xC000..=0xDFFF, true) => self.irq_latch = value,
            (0xC000..=0xDFFF, false) => self.counter = 0, // reload on next clock
            (0xE000..=0xFFFF, true) => self.irq_enabled = false,
            (0xE000..=0xFFFF, false) => self.irq_enabled = true,
            _ => {}
        }
    }

    fn set_bank_select(&mut self, value: u8) {
        self.register_index = value & 0x07;
        self.prg_mode = (value >> 6) & 1;
        self.chr_mode = (value >> 7) & 1;
        self.update_offsets();
    }

    fn set_bank_data(&mut self, value: u8) {
        self.registers[self.register_index as usize] = value;
        self.update_offsets();
    }

    fn set_mirroring(&mut self, value: u8) {
        self.cartridge.mirroring = if value & 1 != 0 {
            Mirroring::Horizontal
        } else {
            Mirroring::Vertical
        };
    }

    /// Clock the scanline counter (dot 260 of a rendering line)
    fn clock_scanline_counter(&mut self) {
        if self.counter == 0 {
            self.counter = self.irq_latch;
        } else {
            self.counter -= 1;
            if self.counter == 0 && self.irq_enabled {
                self.irq_pending = true;
            }
        }
    }

    fn prg_offset(&self, mut index: isize) -> usize {
        if index >= 0x80 {
            index -= 0x100;
        }
        bank_offset(self.cartridge.prg.len(), index, PRG_WINDOW)
    }

    fn chr_offset(&self, mut index: isize) -> usize {
        if index >= 0x80 {
            index -= 0x100;
        }
        bank_offset(self.cartridge.chr.len(), index, CHR_WINDOW)
    }

    fn update_offsets(&mut self) {
        let r = self.registers;
        if self.prg_mode == 0 {
            self.prg_offsets[0] = self.prg_offset(r[6] as isize);
            self.prg_offsets[1] = self.prg_offset(r[7] as isize);
            self.prg_offsets[2] = self.prg_offset(-2);
            self.prg_offsets[3] = self.prg_offset(-1);
        } else {
            self.prg_offsets[0] = self.prg_offset(-2);
            self.prg_offsets[1] = self.prg_offset(r[7] as isize);
            self.prg_offsets[2] = self.prg_offset(r[6] as isize);
            self.prg_offsets[3] = self.prg_offset(-1);
        }

        // R0/R1 are 2KB banks (even/odd 1KB pair); R2-R5 are 1KB banks.
        // CHR mode swaps which half of the pattern space gets which set.
        if self.chr_mode == 0 {
            self.chr_offsets[0] = self.chr_offset((r[0] & !1) as isize);
            self.chr_offsets[1] = self.chr_offset((r[0] | 1) as isize);
            self.chr_offsets[2] = self.chr_offset((r[1] & !1) as isize);
            self.chr_offsets[3] = self.chr_offset((r[1] | 1) as isize);
            self.chr_offsets[4] = self.chr_offset(r[2] as isize);
            self.chr_offsets[5] = self.chr_offset(r[3] as isize);
            self.chr_offsets[6] = self.chr_offset(r[4] as isize);
            self.chr_offsets[7] = self.chr_offset(r[5] as isize);
        } else {
            self.chr_offsets[0] = self.chr_offset(r[2] as isize);
            self.chr_offsets[1] = self.chr_offset(r[3] as isize);
            self.chr_offsets[2] = self.chr_offset(r[4] as isize);
            self.chr_offsets[3] = self.chr_offset(r[5] as isize);
            self.chr_offsets[4] = self.chr_offset((r[0] & !1) as isize);
            self.chr_offsets[5] = self.chr_offset((r[0] | 1) as isize);
            self.chr_offsets[6] = self.chr_offset((r[1] & !1) as isize);
            self.chr_offsets[7] = self.chr_offset((r[1] | 1) as isize);
        }
    }
}

impl Mapper for Mapper4 {
    fn read(&self, address: u16) -> u8 {
        match address {
            0x0000..=0x1FFF => {
                let bank = (address / 0x0400) as usize;
                let offset = (address % 0x0400) as usize;
                self.cartridge.chr[self.chr_offsets[bank] + offset]
            }
            0x8000..=0xFFFF => {
                let address = address - 0x8000;
                let bank = (address / 0x2000) as usize;
                let offset = (address % 0x2000) as usize;
                self.cartridge.prg[self.prg_offsets[bank] + offset]
            }
            0x6000..=0x7FFF => self.cartridge.sram[(address - 0x6000) as usize],
            _ => 0,
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        match address {
            0x0000..=0x1FFF => {
                if self.cartridge.chr_is_ram {
                    let bank = (address / 0x0400) as usize;
                    let offset = (address % 0x0400) as usize;
                    self.cartridge.chr[self.chr_offsets[bank] + offset] = value;
                }
            }
            0x8000..=0xFFFF => self.write_register(address, value),
            0x6000..=0x7FFF => self.cartridge.sram[(address - 0x6000) as usize] = value,
            _ => {}
        }
    }

    fn mirroring(&self) -> Mirroring {
        self.cartridge.mirroring
    }

    fn step(&mut self, scanline: u16, dot: u16, rendering: bool) {
        // Only visible and pre-render lines clock the counter
        if (240..261).contains(&scanline) {
            return;
        }
        if !rendering || dot != 260 {
            return;
        }
        self.clock_scanline_counter();
    }

    fn take_irq(&mut self) -> bool {
        let pending = self.irq_pending;
        self.irq_pending = false;
        pending
    }

    fn cartridge(&self) -> &Cartridge {
        &self.cartridge
    }

    fn cartridge_mut(&mut self) -> &mut Cartridge {
        &mut self.cartridge
    }
}
