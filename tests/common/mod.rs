// Common test utilities - synthetic iNES image builders
//
// Integration tests drive the console through its public surface only, so
// each test assembles a small ROM image in memory instead of loading one
// from disk.

#![allow(dead_code)]

/// Builder for minimal iNES v1 images
pub struct RomBuilder {
    prg_banks: u8,
    chr_banks: u8,
    mapper: u8,
    flags6_low: u8,
    program: Vec<u8>,
    /// (vector address, target) patches applied into the last PRG bank
    vectors: Vec<(u16, u16)>,
    /// (PRG offset, bytes) patches anywhere in PRG
    patches: Vec<(usize, Vec<u8>)>,
}

impl RomBuilder {
    pub fn new() -> Self {
        RomBuilder {
            prg_banks: 1,
            chr_banks: 1,
            mapper: 0,
            flags6_low: 0,
            program: Vec::new(),
            vectors: vec![(0xFFFC, 0x8000)],
            patches: Vec::new(),
        }
    }

    pub fn prg_banks(mut self, banks: u8) -> Self {
        self.prg_banks = banks;
        self
    }

    pub fn chr_banks(mut self, banks: u8) -> Self {
        self.chr_banks = banks;
        self
    }

    pub fn mapper(mut self, mapper: u8) -> Self {
        self.mapper = mapper;
        self
    }

    /// Code placed at $8000 (the default reset target)
    pub fn program(mut self, code: &[u8]) -> Self {
        self.program = code.to_vec();
        self
    }

    /// Point an interrupt vector somewhere
    pub fn vector(mut self, address: u16, target: u16) -> Self {
        self.vectors.retain(|(a, _)| *a != address);
        self.vectors.push((address, target));
        self
    }

    /// Write raw bytes at a PRG offset
    pub fn patch(mut self, offset: usize, bytes: &[u8]) -> Self {
        self.patches.push((offset, bytes.to_vec()));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let prg_size = self.prg_banks as usize * 16 * 1024;
        let mut prg = vec![0u8; prg_size];
        prg[..self.program.len()].copy_from_slice(&self.program);

        // Vectors live in the last 16KB bank, which every supported mapper
        // keeps fixed at $C000-$FFFF at power-on
        for (address, target) in &self.vectors {
            let offset = prg_size - (0x10000 - *address as usize);
            prg[offset] = (*target & 0xFF) as u8;
            prg[offset + 1] = (*target >> 8) as u8;
        }
        for (offset, bytes) in &self.patches {
            prg[*offset..*offset + bytes.len()].copy_from_slice(bytes);
        }

        let mut rom = vec![0u8; 16];
        rom[0..4].copy_from_slice(b"NES\x1A");
        rom[4] = self.prg_banks;
        rom[5] = self.chr_banks;
        rom[6] = (self.mapper << 4) | self.flags6_low;
        rom[7] = self.mapper & 0xF0;
        rom.extend(prg);
        rom.extend(vec![0u8; self.chr_banks as usize * 8 * 1024]);
        rom
    }
}

impl Default for RomBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A one-bank NROM image that executes `code` from $8000
pub fn nrom_with_program(code: &[u8]) -> Vec<u8> {
    RomBuilder::new().program(code).build()
}
