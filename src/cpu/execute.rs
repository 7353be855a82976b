// Instruction implementations and dispatch for the 6502
//
// Dispatch is a single match over the opcode byte, grouped by mnemonic.
// Every one of the 256 slots decodes: the documented instructions run
// their semantics, and the undocumented slots fall through to NOP with the
// size and cycle count their table entries already charged.

use crate::bus::Bus;
use crate::cpu::addressing::AddressingMode;
use crate::cpu::{vectors, Cpu, StepContext};

impl Cpu {
    /// Run the instruction for one fetched opcode
    pub(crate) fn execute(&mut self, bus: &mut Bus, opcode: u8, ctx: &StepContext) {
        match opcode {
            // Load
            0xA9 | 0xA5 | 0xB5 | 0xAD | 0xBD | 0xB9 | 0xA1 | 0xB1 => self.lda(bus, ctx),
            0xA2 | 0xA6 | 0xB6 | 0xAE | 0xBE => self.ldx(bus, ctx),
            0xA0 | 0xA4 | 0xB4 | 0xAC | 0xBC => self.ldy(bus, ctx),

            // Store
            0x85 | 0x95 | 0x8D | 0x9D | 0x99 | 0x81 | 0x91 => self.sta(bus, ctx),
            0x86 | 0x96 | 0x8E => self.stx(bus, ctx),
            0x84 | 0x94 | 0x8C => self.sty(bus, ctx),

            // Arithmetic
            0x69 | 0x65 | 0x75 | 0x6D | 0x7D | 0x79 | 0x61 | 0x71 => self.adc(bus, ctx),
            0xE9 | 0xE5 | 0xF5 | 0xED | 0xFD | 0xF9 | 0xE1 | 0xF1 => self.sbc(bus, ctx),
            0xE6 | 0xF6 | 0xEE | 0xFE => self.inc(bus, ctx),
            0xC6 | 0xD6 | 0xCE | 0xDE => self.dec(bus, ctx),
            0xE8 => self.inx(),
            0xC8 => self.iny(),
            0xCA => self.dex(),
            0x88 => self.dey(),

            // Logic
            0x29 | 0x25 | 0x35 | 0x2D | 0x3D | 0x39 | 0x21 | 0x31 => self.and(bus, ctx),
            0x09 | 0x05 | 0x15 | 0x0D | 0x1D | 0x19 | 0x01 | 0x11 => self.ora(bus, ctx),
            0x49 | 0x45 | 0x55 | 0x4D | 0x5D | 0x59 | 0x41 | 0x51 => self.eor(bus, ctx),
            0x24 | 0x2C => self.bit(bus, ctx),

            // Shifts and rotates
            0x0A | 0x06 | 0x16 | 0x0E | 0x1E => self.asl(bus, ctx),
            0x4A | 0x46 | 0x56 | 0x4E | 0x5E => self.lsr(bus, ctx),
            0x2A | 0x26 | 0x36 | 0x2E | 0x3E => self.rol(bus, ctx),
            0x6A | 0x66 | 0x76 | 0x6E | 0x7E => self.ror(bus, ctx),

            // Compare
            0xC9 | 0xC5 | 0xD5 | 0xCD | 0xDD | 0xD9 | 0xC1 | 0xD1 => self.cmp(bus, ctx),
            0xE0 | 0xE4 | 0xEC => self.cpx(bus, ctx),
            0xC0 | 0xC4 | 0xCC => self.cpy(bus, ctx),

            // Branches
            0x10 => self.bpl(ctx),
            0x30 => self.bmi(ctx),
            0x50 => self.bvc(ctx),
            0x70 => self.bvs(ctx),
            0x90 => self.bcc(ctx),
            0xB0 => self.bcs(ctx),
            0xD0 => self.bne(ctx),
            0xF0 => self.beq(ctx),

            // Jumps and subroutines
            0x4C | 0x6C => self.jmp(ctx),
            0x20 => self.jsr(bus, ctx),
            0x60 => self.rts(bus),

            // Stack
            0x48 => self.pha(bus),
            0x68 => self.pla(bus),
            0x08 => self.php(bus),
            0x28 => self.plp(bus),

            // Interrupt instructions
            0x00 => self.brk(bus),
            0x40 => self.rti(bus),

            // Flag operations
            0x18 => self.c = 0,
            0x38 => self.c = 1,
            0x58 => self.i = 0,
            0x78 => self.i = 1,
            0xB8 => self.v = 0,
            0xD8 => self.d = 0,
            0xF8 => self.d = 1,

            // Transfers
            0xAA => self.tax(),
            0x8A => self.txa(),
            0xA8 => self.tay(),
            0x98 => self.tya(),
            0xBA => self.tsx(),
            0x9A => self.sp = self.x,

            // NOP, plus every undocumented slot
            _ => {}
        }
    }

    // ========================================
    // Load / store
    // ========================================

    fn lda(&mut self, bus: &mut Bus, ctx: &StepContext) {
        self.a = bus.read(ctx.address);
        self.set_zn(self.a);
    }

    fn ldx(&mut self, bus: &mut Bus, ctx: &StepContext) {
        self.x = bus.read(ctx.address);
        self.set_zn(self.x);
    }

    fn ldy(&mut self, bus: &mut Bus, ctx: &StepContext) {
        self.y = bus.read(ctx.address);
        self.set_zn(self.y);
    }

    fn sta(&mut self, bus: &mut Bus, ctx: &StepContext) {
        bus.write(ctx.address, self.a);
    }

    fn stx(&mut self, bus: &mut Bus, ctx: &StepContext) {
        bus.write(ctx.address, self.x);
    }

    fn sty(&mut self, bus: &mut Bus, ctx: &StepContext) {
        bus.write(ctx.address, self.y);
    }

    // ========================================
    // Arithmetic
    // ========================================

    /// ADC - A = A + M + C
    ///
    /// Carry is set on unsigned overflow past 0xFF; overflow is set when
    /// two operands of the same sign produce a result of the other sign.
    fn adc(&mut self, bus: &mut Bus, ctx: &StepContext) {
        let a = self.a;
        let b = bus.read(ctx.address);
        let c = self.c;
        self.a = a.wrapping_add(b).wrapping_add(c);
        self.set_zn(self.a);
        self.c = if a as u16 + b as u16 + c as u16 > 0xFF { 1 } else { 0 };
        self.v = if (a ^ b) & 0x80 == 0 && (a ^ self.a) & 0x80 != 0 { 1 } else { 0 };
    }

    /// SBC - A = A - M - (1 - C)
    fn sbc(&mut self, bus: &mut Bus, ctx: &StepContext) {
        let a = self.a;
        let b = bus.read(ctx.address);
        let c = self.c;
        self.a = a.wrapping_sub(b).wrapping_sub(1 - c);
        self.set_zn(self.a);
        self.c = if a as i16 - b as i16 - (1 - c) as i16 >= 0 { 1 } else { 0 };
        self.v = if (a ^ b) & 0x80 != 0 && (a ^ self.a) & 0x80 != 0 { 1 } else { 0 };
    }

    fn inc(&mut self, bus: &mut Bus, ctx: &StepContext) {
        let value = bus.read(ctx.address).wrapping_add(1);
        bus.write(ctx.address, value);
        self.set_zn(value);
    }

    fn dec(&mut self, bus: &mut Bus, ctx: &StepContext) {
        let value = bus.read(ctx.address).wrapping_sub(1);
        bus.write(ctx.address, value);
        self.set_zn(value);
    }

    fn inx(&mut self) {
        self.x = self.x.wrapping_add(1);
        self.set_zn(self.x);
    }

    fn iny(&mut self) {
        self.y = self.y.wrapping_add(1);
        self.set_zn(self.y);
    }

    fn dex(&mut self) {
        self.x = self.x.wrapping_sub(1);
        self.set_zn(self.x);
    }

    fn dey(&mut self) {
        self.y = self.y.wrapping_sub(1);
        self.set_zn(self.y);
    }

    // ========================================
    // Logic
    // ========================================

    fn and(&mut self, bus: &mut Bus, ctx: &StepContext) {
        self.a &= bus.read(ctx.address);
        self.set_zn(self.a);
    }

    fn ora(&mut self, bus: &mut Bus, ctx: &StepContext) {
        self.a |= bus.read(ctx.address);
        self.set_zn(self.a);
    }

    fn eor(&mut self, bus: &mut Bus, ctx: &StepContext) {
        self.a ^= bus.read(ctx.address);
        self.set_zn(self.a);
    }

    /// BIT - Z from A & M, V and N copied from bits 6 and 7 of M
    fn bit(&mut self, bus: &mut Bus, ctx: &StepContext) {
        let value = bus.read(ctx.address);
        self.z = if self.a & value == 0 { 1 } else { 0 };
        self.v = (value >> 6) & 1;
        self.n = (value >> 7) & 1;
    }

    // ========================================
    // Shifts and rotates
    // ========================================

    fn asl(&mut self, bus: &mut Bus, ctx: &StepContext) {
        if ctx.mode == AddressingMode::Accumulator {
            self.c = (self.a >> 7) & 1;
            self.a <<= 1;
            self.set_zn(self.a);
        } else {
            let mut value = bus.read(ctx.address);
            self.c = (value >> 7) & 1;
            value <<= 1;
            bus.write(ctx.address, value);
            self.set_zn(value);
        }
    }

    fn lsr(&mut self, bus: &mut Bus, ctx: &StepContext) {
        if ctx.mode == AddressingMode::Accumulator {
            self.c = self.a & 1;
            self.a >>= 1;
            self.set_zn(self.a);
        } else {
            let mut value = bus.read(ctx.address);
            self.c = value & 1;
            value >>= 1;
            bus.write(ctx.address, value);
            self.set_zn(value);
        }
    }

    fn rol(&mut self, bus: &mut Bus, ctx: &StepContext) {
        let carry_in = self.c;
        if ctx.mode == AddressingMode::Accumulator {
            self.c = (self.a >> 7) & 1;
            self.a = (self.a << 1) | carry_in;
            self.set_zn(self.a);
        } else {
            let mut value = bus.read(ctx.address);
            self.c = (value >> 7) & 1;
            value = (value << 1) | carry_in;
            bus.write(ctx.address, value);
            self.set_zn(value);
        }
    }

    fn ror(&mut self, bus: &mut Bus, ctx: &StepContext) {
        let carry_in = self.c;
        if ctx.mode == AddressingMode::Accumulator {
            self.c = self.a & 1;
            self.a = (self.a >> 1) | (carry_in << 7);
            self.set_zn(self.a);
        } else {
            let mut value = bus.read(ctx.address);
            self.c = value & 1;
            value = (value >> 1) | (carry_in << 7);
            bus.write(ctx.address, value);
            self.set_zn(value);
        }
    }

    // ========================================
    // Compare
    // ========================================

    /// Shared compare: Z/N from the difference, C when minuend >= subtrahend
    fn compare(&mut self, a: u8, b: u8) {
        self.set_zn(a.wrapping_sub(b));
        self.c = if a >= b { 1 } else { 0 };
    }

    fn cmp(&mut self, bus: &mut Bus, ctx: &StepContext) {
        let value = bus.read(ctx.address);
        self.compare(self.a, value);
    }

    fn cpx(&mut self, bus: &mut Bus, ctx: &StepContext) {
        let value = bus.read(ctx.address);
        self.compare(self.x, value);
    }

    fn cpy(&mut self, bus: &mut Bus, ctx: &StepContext) {
        let value = bus.read(ctx.address);
        self.compare(self.y, value);
    }

    // ========================================
    // Branches
    // ========================================

    fn bpl(&mut self, ctx: &StepContext) {
        if self.n == 0 {
            self.pc = ctx.address;
            self.add_branch_cycles(ctx);
        }
    }

    fn bmi(&mut self, ctx: &StepContext) {
        if self.n != 0 {
            self.pc = ctx.address;
            self.add_branch_cycles(ctx);
        }
    }

    fn bvc(&mut self, ctx: &StepContext) {
        if self.v == 0 {
            self.pc = ctx.address;
            self.add_branch_cycles(ctx);
        }
    }

    fn bvs(&mut self, ctx: &StepContext) {
        if self.v != 0 {
            self.pc = ctx.address;
            self.add_branch_cycles(ctx);
        }
    }

    fn bcc(&mut self, ctx: &StepContext) {
        if self.c == 0 {
            self.pc = ctx.address;
            self.add_branch_cycles(ctx);
        }
    }

    fn bcs(&mut self, ctx: &StepContext) {
        if self.c != 0 {
            self.pc = ctx.address;
            self.add_branch_cycles(ctx);
        }
    }

    fn bne(&mut self, ctx: &StepContext) {
        if self.z == 0 {
            self.pc = ctx.address;
            self.add_branch_cycles(ctx);
        }
    }

    fn beq(&mut self, ctx: &StepContext) {
        if self.z != 0 {
            self.pc = ctx.address;
            self.add_branch_cycles(ctx);
        }
    }

    // ========================================
    // Jumps, subroutines, interrupts
    // ========================================

    fn jmp(&mut self, ctx: &StepContext) {
        self.pc = ctx.address;
    }

    /// JSR pushes the address of its own last byte
    fn jsr(&mut self, bus: &mut Bus, ctx: &StepContext) {
        self.push16(bus, self.pc.wrapping_sub(1));
        self.pc = ctx.address;
    }

    fn rts(&mut self, bus: &mut Bus) {
        self.pc = self.pull16(bus).wrapping_add(1);
    }

    /// BRK - software interrupt through the IRQ vector
    fn brk(&mut self, bus: &mut Bus) {
        self.push16(bus, self.pc);
        let flags = self.flags();
        self.push(bus, flags);
        self.pc = self.read16(bus, vectors::IRQ);
    }

    fn rti(&mut self, bus: &mut Bus) {
        let flags = self.pull(bus);
        self.set_flags(flags);
        self.pc = self.pull16(bus);
    }

    // ========================================
    // Stack register ops
    // ========================================

    fn pha(&mut self, bus: &mut Bus) {
        self.push(bus, self.a);
    }

    fn pla(&mut self, bus: &mut Bus) {
        self.a = self.pull(bus);
        self.set_zn(self.a);
    }

    fn php(&mut self, bus: &mut Bus) {
        let flags = self.flags();
        self.push(bus, flags);
    }

    /// PLP restores the six architectural flags; the stacked B bit is
    /// discarded and U always reads back as set
    fn plp(&mut self, bus: &mut Bus) {
        let flags = self.pull(bus);
        self.set_flags(flags & 0xEF | 0x20);
    }

    // ========================================
    // Transfers
    // ========================================

    fn tax(&mut self) {
        self.x = self.a;
        self.set_zn(self.x);
    }

    fn txa(&mut self) {
        self.a = self.x;
        self.set_zn(self.a);
    }

    fn tay(&mut self) {
        self.y = self.a;
        self.set_zn(self.y);
    }

    fn tya(&mut self) {
        self.a = self.y;
        self.set_zn(self.a);
    }

    fn tsx(&mut self) {
        self.x = self.sp;
        self.set_zn(self.x);
    }
}
