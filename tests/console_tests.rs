// Console integration tests
//
// Everything here goes through the public facade: ROM bytes in, frames,
// CPU state, and bus accesses out.

mod common;

use common::{nrom_with_program, RomBuilder};
use famicore::{Console, LoadError, CPU_FREQUENCY, SCREEN_HEIGHT, SCREEN_WIDTH};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[test]
fn test_reset_behavior() {
    // Reset vector -> $8000 holding a NOP
    let rom = nrom_with_program(&[0xEA]);
    let mut console = Console::new(&rom).unwrap();

    let cycles = console.step();
    assert_eq!(cycles, 2);

    let cpu = console.cpu();
    assert_eq!(cpu.pc, 0x8001);
    assert_eq!(cpu.a, 0);
    assert_eq!(cpu.x, 0);
    assert_eq!(cpu.y, 0);
    assert_eq!(cpu.sp, 0xFD);
    assert_eq!(cpu.flags(), 0x24);
    assert_eq!(cpu.cycles, 2);
}

#[test]
fn test_unsupported_mapper_rejected() {
    let rom = RomBuilder::new().mapper(7).build();
    assert_eq!(
        Console::new(&rom).err(),
        Some(LoadError::UnsupportedMapper(7))
    );
}

#[test]
fn test_malformed_rom_rejected() {
    assert!(Console::new(b"NE").is_err());
    assert!(Console::new(b"XYZ\x1A_not_a_rom_____").is_err());
}

#[test]
fn test_ppu_advances_three_dots_per_cpu_cycle() {
    // Infinite NOP slide; rendering stays off so frames are constant-length
    let rom = nrom_with_program(&[0xEA; 64]);
    let mut console = Console::new(&rom).unwrap();

    let position = |console: &Console| -> u64 {
        let ppu = console.bus().ppu();
        ppu.frame * (341 * 262) + ppu.scanline as u64 * 341 + ppu.dot as u64
    };

    let before = position(&console);
    let mut cycles = 0;
    for _ in 0..32 {
        cycles += console.step();
    }
    assert_eq!(position(&console) - before, 3 * cycles);
}

#[test]
fn test_step_seconds_spends_the_cycle_budget() {
    let rom = nrom_with_program(&[0xEA; 64]);
    let mut console = Console::new(&rom).unwrap();

    console.step_seconds(0.001);
    let budget = (CPU_FREQUENCY as f64 * 0.001) as u64;
    let spent = console.cpu().cycles;
    assert!(
        spent >= budget && spent < budget + 16,
        "spent {} of a {} cycle budget",
        spent,
        budget
    );
}

#[test]
fn test_controller_shift_sequence() {
    let rom = nrom_with_program(&[0xEA; 4]);
    let mut console = Console::new(&rom).unwrap();
    console.set_button1([true, true, false, false, false, false, false, false]);

    let bus = console.bus_mut();
    bus.write(0x4016, 1);
    bus.write(0x4016, 0);
    let bits: Vec<u8> = (0..8).map(|_| bus.read(0x4016)).collect();
    assert_eq!(bits, vec![1, 1, 0, 0, 0, 0, 0, 0]);
}

#[test]
fn test_frame_buffer_shape() {
    let rom = nrom_with_program(&[0xEA; 4]);
    let console = Console::new(&rom).unwrap();

    let frame = console.frame();
    assert_eq!(frame.len(), SCREEN_WIDTH * SCREEN_HEIGHT * 4);
    // Alpha channel is fully opaque everywhere
    assert!(frame.iter().skip(3).step_by(4).all(|&a| a == 0xFF));
}

#[test]
fn test_nmi_reaches_the_program() {
    // Reset routine enables NMI output, then spins; the NMI handler
    // counts into $10
    let program = [
        0xA9, 0x80, // LDA #$80
        0x8D, 0x00, 0x20, // STA $2000
        0x4C, 0x05, 0x80, // JMP $8005
    ];
    let handler = [
        0xE6, 0x10, // INC $10
        0x40, // RTI
    ];
    let rom = RomBuilder::new()
        .program(&program)
        .patch(0x0100, &handler)
        .vector(0xFFFA, 0x8100)
        .build();
    let mut console = Console::new(&rom).unwrap();

    // Two frames of wall-clock is enough for at least one vblank
    console.step_seconds(2.0 / 60.0);
    let count = console.bus_mut().read(0x0010);
    assert!(count >= 1, "NMI handler never ran");
}

#[test]
fn test_audio_sink_receives_samples() {
    let rom = nrom_with_program(&[0xEA; 64]);
    let mut console = Console::new(&rom).unwrap();

    let count = Arc::new(AtomicUsize::new(0));
    let sink_count = count.clone();
    console.set_audio_sink(Box::new(move |_| {
        sink_count.fetch_add(1, Ordering::Relaxed);
    }));
    console.set_audio_sample_rate(44_100.0);

    console.step_seconds(0.1);
    let samples = count.load(Ordering::Relaxed);
    assert!(
        (4300..=4500).contains(&samples),
        "0.1s produced {} samples",
        samples
    );
}

#[test]
fn test_oam_dma_stalls_the_cpu() {
    let rom = nrom_with_program(&[
        0xA9, 0x02, // LDA #$02
        0x8D, 0x14, 0x40, // STA $4014
        0xEA, 0xEA, // NOPs
    ]);
    let mut console = Console::new(&rom).unwrap();

    console.step(); // LDA
    console.step(); // STA triggers the DMA
    let before = console.cpu().cycles;

    // The stall is burned one cycle per step before the next instruction
    let mut stalled = 0;
    while console.step() == 1 {
        stalled += 1;
    }
    assert_eq!(stalled, 513);
    assert!(console.cpu().cycles > before + 513);
}

#[test]
fn test_sram_round_trip() {
    let rom = RomBuilder::new().program(&[0xEA; 4]).build();
    let mut console = Console::new(&rom).unwrap();

    console.restore_sram(&[0xDE, 0xAD, 0xBE, 0xEF]);
    assert_eq!(&console.sram()[..4], &[0xDE, 0xAD, 0xBE, 0xEF]);

    // Visible to the program at $6000
    assert_eq!(console.bus_mut().read(0x6000), 0xDE);
}
