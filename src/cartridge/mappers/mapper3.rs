// Mapper 3 (CNROM)
//
// PRG is fixed exactly like NROM (first bank at $8000, last at $C000); the
// board only switches its 8KB CHR bank. Writes anywhere in $8000-$FFFF
// select one of up to four CHR banks from the low two bits.

use super::Mapper;
use crate::cartridge::{Cartridge, Mirroring, CHR_BANK_SIZE, PRG_BANK_SIZE};
use log::trace;

/// CNROM board state
pub struct Mapper3 {
    cartridge: Cartridge,
    /// Selected 8KB CHR bank
    chr_bank: usize,
    /// Fixed bank mapped at $8000-$BFFF
    prg_bank_low: usize,
    /// Fixed bank mapped at $C000-$FFFF
    prg_bank_high: usize,
}

impl Mapper3 {
    pub fn new(cartridge: Cartridge) -> Self {
        let prg_banks = cartridge.prg.len() / PRG_BANK_SIZE;
        Mapper3 {
            cartridge,
            chr_bank: 0,
            prg_bank_low: 0,
            prg_bank_high: prg_banks.saturating_sub(1),
        }
    }
}

impl Mapper for Mapper3 {
    fn read(&self, address: u16) -> u8 {
        match address {
            0x0000..=0x1FFF => {
                let index = self.chr_bank * CHR_BANK_SIZE + address as usize;
                self.cartridge.chr[index % self.cartridge.chr.len()]
            }
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
                trace!("unhandled mapper3 read at {:04X}", address);
                0
            }
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        match address {
            0x0000..=0x1FFF => {
                if self.cartridge.chr_is_ram {
                    let index = self.chr_bank * CHR_BANK_SIZE + address as usize;
                    let len = self.cartridge.chr.len();
                    self.cartridge.chr[index % len] = value;
                }
            }
            0x8000..=0xFFFF => self.chr_bank = (value & 0x03) as usize,
            0x6000..=0x7FFF => self.cartridge.sram[(address - 0x6000) as usize] = value,
            _ => trace!("unhandled mapper3 write at {:04X}", address),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::SRAM_SIZE;

    fn build(chr_banks: usize) -> Mapper3 {
        let mut chr = vec![0u8; chr_banks * CHR_BANK_SIZE];
        for bank in 0..chr_banks {
            chr[bank * CHR_BANK_SIZE] = bank as u8;
        }
        let mut prg = vec![0u8; 2 * PRG_BANK_SIZE];
        prg[0] = 0xA0;
        prg[PRG_BANK_SIZE] = 0xA1;
        Mapper3::new(Cartridge {
            prg,
            chr,
            sram: vec![0u8; SRAM_SIZE],
            mapper_id: 3,
            mirroring: Mirroring::Vertical,
            chr_is_ram: false,
            has_battery: false,
        })
    }

    #[test]
    fn test_prg_windows_fixed() {
        let mapper = build(4);
        assert_eq!(mapper.read(0x8000), 0xA0);
        assert_eq!(mapper.read(0xC000), 0xA1);
    }

    #[test]
    fn test_chr_bank_select() {
        let mut mapper = build(4);
        assert_eq!(mapper.read(0x0000), 0);

        mapper.write(0x8000, 2);
        assert_eq!(mapper.read(0x0000), 2);

        // Only the low two bits participate
        mapper.write(0x8000, 0xFF);
        assert_eq!(mapper.read(0x0000), 3);
    }

    #[test]
    fn test_prg_unaffected_by_bank_select() {
        let mut mapper = build(4);
        mapper.write(0x8000, 1);
        assert_eq!(mapper.read(0x8000), 0xA0);
        assert_eq!(mapper.read(0xC000), 0xA1);
    }
}
